use crate::pages::Pacing;
use crate::poll::PollOptions;
use crate::sequence::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_common::catalog::{ReportFormat, ReportTab, ReportType};
use tally_common::report::{DEFAULT_ERP_BASE, REQUEST_ACCEPTED_MESSAGE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub report: ReportDefaults,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl TallyConfig {
    pub fn login_url(&self) -> String {
        format!(
            "{}{}",
            self.portal.site_url.trim_end_matches('/'),
            self.portal.login_path
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    pub fn poll_options(&self, index: usize) -> PollOptions {
        PollOptions {
            index,
            interval: Duration::from_millis(self.poll.interval_ms),
            max_polls: self.poll.max_polls,
            response_timeout: Duration::from_millis(self.poll.response_timeout_ms),
            base_url: self.portal.erp_base.clone(),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            after_tab_switch: Duration::from_millis(self.portal.tab_settle_ms),
            after_select: Duration::from_millis(self.portal.select_settle_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_erp_base")]
    pub erp_base: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Substring identifying the report-request response.
    #[serde(default = "default_request_url_pattern")]
    pub request_url_pattern: String,
    /// Substring identifying the report-list response.
    #[serde(default = "default_status_url_pattern")]
    pub status_url_pattern: String,
    #[serde(default = "default_accepted_message")]
    pub accepted_message: String,
    #[serde(default = "default_response_timeout_ms")]
    pub submit_response_timeout_ms: u64,
    #[serde(default = "default_tab_settle_ms")]
    pub tab_settle_ms: u64,
    #[serde(default = "default_select_settle_ms")]
    pub select_settle_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            erp_base: default_erp_base(),
            login_path: default_login_path(),
            request_url_pattern: default_request_url_pattern(),
            status_url_pattern: default_status_url_pattern(),
            accepted_message: default_accepted_message(),
            submit_response_timeout_ms: default_response_timeout_ms(),
            tab_settle_ms: default_tab_settle_ms(),
            select_settle_ms: default_select_settle_ms(),
        }
    }
}

fn default_site_url() -> String {
    "https://etivity.comops.biz".into()
}

fn default_erp_base() -> String {
    DEFAULT_ERP_BASE.into()
}

fn default_login_path() -> String {
    "/Account/Login?ReturnUrl=%2fEtivity".into()
}

fn default_request_url_pattern() -> String {
    "RequestReport".into()
}

fn default_status_url_pattern() -> String {
    "RequestPreview/RequestPreview".into()
}

fn default_accepted_message() -> String {
    REQUEST_ACCEPTED_MESSAGE.into()
}

fn default_response_timeout_ms() -> u64 {
    30000
}

fn default_tab_settle_ms() -> u64 {
    5000
}

fn default_select_settle_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: 0,
        }
    }
}

fn default_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_polls() -> u32 {
    150
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefaults {
    #[serde(default = "default_tab")]
    pub tab: ReportTab,
    #[serde(default = "default_report_type")]
    pub report_type: ReportType,
    #[serde(default = "default_format")]
    pub format: ReportFormat,
    /// Saved organisation template in `#ddlOrgProfile`.
    #[serde(default)]
    pub org_template: Option<String>,
    /// Units ticked in the organisation tree when no template is set.
    #[serde(default)]
    pub org_units: Vec<String>,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for ReportDefaults {
    fn default() -> Self {
        Self {
            tab: default_tab(),
            report_type: default_report_type(),
            format: default_format(),
            org_template: None,
            org_units: Vec::new(),
            download_dir: default_download_dir(),
        }
    }
}

fn default_tab() -> ReportTab {
    ReportTab::TimeAttendance
}

fn default_report_type() -> ReportType {
    ReportType::TotalHoursWorked
}

fn default_format() -> ReportFormat {
    ReportFormat::Excel
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub visible: bool,
    /// Pause after every browser action.
    #[serde(default)]
    pub slow_mo_ms: u64,
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
    #[serde(default = "default_quiescence_timeout_ms")]
    pub quiescence_timeout_ms: u64,
    /// How long the network must stay idle to count as quiet.
    #[serde(default = "default_idle_window_ms")]
    pub idle_window_ms: u64,
    /// Chromium executable; found on the PATH when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
    /// Persistent profile directory. A throwaway one is used when unset.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    /// Log every request and response the page makes.
    #[serde(default)]
    pub network_log: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            visible: false,
            slow_mo_ms: 0,
            action_timeout_ms: default_action_timeout_ms(),
            quiescence_timeout_ms: default_quiescence_timeout_ms(),
            idle_window_ms: default_idle_window_ms(),
            chrome_path: None,
            user_data_dir: None,
            network_log: false,
        }
    }
}

fn default_action_timeout_ms() -> u64 {
    30000
}

fn default_quiescence_timeout_ms() -> u64 {
    30000
}

fn default_idle_window_ms() -> u64 {
    500
}
