mod prompt;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tally_common::catalog::{ReportFormat, ReportTab, ReportType};
use tally_engine::config::{ConfigLoader, TallyConfig};
use tally_engine::dates::{DateRange, parse_date, resolve_date_range};
use tally_engine::portal::{Credentials, Portal, PortalError};
use tally_engine::workflow::{JobOutcome, OrgScope, ReportJob, run_report_job};
use tally_h::{HeadlessOptions, HeadlessPortal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Request a report from the Tambla portal and download it"
)]
struct Args {
    /// First day of the report (YYYY-MM-DD); prompted for when omitted
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,

    /// Last day of the report (YYYY-MM-DD); prompted for when omitted
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,

    /// Report type, by name (e.g. TotalHoursWorked) or option code (e.g. 11)
    #[arg(long)]
    report_type: Option<ReportType>,

    /// Output format: pdf, excel, doc, rtf or csv
    #[arg(long)]
    format: Option<ReportFormat>,

    /// Report tab the report type lives on: timeattendance or schedule
    #[arg(long, value_parser = ReportTab::parse_form_tab)]
    tab: Option<ReportTab>,

    /// Saved organisation template to report on
    #[arg(long, conflicts_with = "org_unit")]
    org_template: Option<String>,

    /// Organisation unit to tick; repeat for several
    #[arg(long)]
    org_unit: Vec<String>,

    /// Position in the report list to download, 0 being the newest request
    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Where to write the report; defaults to the configured download dir
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Launch browser in visible mode (not headless)
    #[arg(long)]
    visible: bool,

    /// Config file; defaults to $TALLY_CONFIG, ./tally.yaml, then ~/.tally/config.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "TAMBLA_USER")]
    username: Option<String>,

    #[arg(long, env = "TAMBLA_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Args {
    fn credentials(&self) -> anyhow::Result<Credentials> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Ok(Credentials::new(user, password)),
            _ => bail!("Portal credentials missing: pass --username/--password or set TAMBLA_USER and TAMBLA_PASSWORD"),
        }
    }

    /// Command-line choices, falling back to the configured report defaults.
    fn job(&self, config: &TallyConfig, range: DateRange) -> ReportJob {
        let defaults = &config.report;
        let org = if self.org_template.is_some() || !self.org_unit.is_empty() {
            OrgScope::from_parts(self.org_template.clone(), self.org_unit.clone())
        } else {
            OrgScope::from_parts(defaults.org_template.clone(), defaults.org_units.clone())
        };

        ReportJob {
            tab: self.tab.unwrap_or(defaults.tab),
            report_type: self.report_type.unwrap_or(defaults.report_type),
            format: self.format.unwrap_or(defaults.format),
            range,
            org,
            index: self.index,
            output: self.output.clone(),
        }
    }
}

/// What to check next, tagged with the stable error code.
fn hint_line(err: &PortalError) -> String {
    format!("[{}] {}", err.code(), err.recovery_hint())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries prompts and results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ConfigLoader::new()
        .load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    let credentials = args.credentials()?;

    let today = chrono::Local::now().date_naive();
    let range = resolve_date_range(args.start, args.end, today, prompt::ask_date)?;
    let job = args.job(&config, range);

    let mut browser = config.browser.clone();
    browser.visible |= args.visible;
    let mut portal = HeadlessPortal::new(HeadlessOptions::from(&browser));
    if let Err(e) = portal.launch().await {
        error!(code = e.code(), "{}", hint_line(&e));
        return Err(e).context("Failed to launch browser");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            interrupt.cancel();
        }
    });

    let outcome = run_report_job(&mut portal, &config, &credentials, &job, &cancel).await;

    if let Err(e) = portal.close().await {
        warn!("Failed to close browser: {}", e);
    }

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(cause) = e.portal_error() {
                error!(code = cause.code(), "{}", hint_line(cause));
            }
            return Err(e.into());
        }
    };

    match outcome {
        JobOutcome::SubmissionRejected => println!("Failed to run report."),
        JobOutcome::Downloaded { report, path } => {
            info!("Saved to {}", path.display());
            println!("{} downloaded successfully", report.filename_ext);
        }
        JobOutcome::DownloadFailed { report } => {
            println!("{} failed to download", report.filename_ext);
        }
    }
    Ok(())
}
