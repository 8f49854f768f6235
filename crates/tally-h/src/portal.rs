use crate::cdp::CdpClient;
use crate::dom::{DomOp, DomOutcome, run_dom_op};
use crate::fetch::{cookie_header, fetch_with_cookies};
use crate::network::NetworkMonitor;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tally_engine::config::schema::BrowserConfig;
use tally_engine::portal::{
    Credentials, FetchedResource, Locator, NavigationResult, Portal, PortalError,
    ResponseCallback,
};
use tracing::info;

/// Delay between lookups of an element that has not rendered yet.
const LOOKUP_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Path fragment of the login page; still seeing it after submitting means the login failed.
const LOGIN_PATH_MARKER: &str = "/Account/Login";

#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub visible: bool,
    /// Pause after every browser action.
    pub slow_mo: Duration,
    /// How long an action keeps looking for its element.
    pub action_timeout: Duration,
    pub idle_window: Duration,
    pub quiescence_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
    /// Kept between runs when set; otherwise each launch gets a fresh profile.
    pub user_data_dir: Option<PathBuf>,
    pub network_log: bool,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        HeadlessOptions::from(&BrowserConfig::default())
    }
}

impl From<&BrowserConfig> for HeadlessOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            visible: config.visible,
            slow_mo: Duration::from_millis(config.slow_mo_ms),
            action_timeout: Duration::from_millis(config.action_timeout_ms),
            idle_window: Duration::from_millis(config.idle_window_ms),
            quiescence_timeout: Duration::from_millis(config.quiescence_timeout_ms),
            chrome_path: config.chrome_path.clone(),
            user_data_dir: config.user_data_dir.clone(),
            network_log: config.network_log,
        }
    }
}

struct Session {
    client: CdpClient,
    network: NetworkMonitor,
}

/// Portal session driven through a Chromium instance over CDP.
pub struct HeadlessPortal {
    session: Option<Session>,
    options: HeadlessOptions,
    http: reqwest::Client,
}

impl HeadlessPortal {
    pub fn new(options: HeadlessOptions) -> Self {
        Self {
            session: None,
            options,
            http: reqwest::Client::new(),
        }
    }

    pub fn options(&self) -> &HeadlessOptions {
        &self.options
    }

    fn session(&self) -> Result<&Session, PortalError> {
        self.session.as_ref().ok_or(PortalError::NotReady)
    }

    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, PortalError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }

    /// Run a DOM operation, waiting up to the action timeout for the element to appear.
    async fn act(&self, locator: &Locator, op: DomOp, value: &str) -> Result<(), PortalError> {
        let session = self.session()?;
        let deadline = Instant::now() + self.options.action_timeout;

        loop {
            let outcome = run_dom_op(
                &session.client.page,
                locator,
                op,
                value,
                self.options.action_timeout,
            )
            .await?;

            match outcome {
                DomOutcome::Done => break,
                _ if Instant::now() < deadline => {
                    tokio::time::sleep(LOOKUP_RETRY_DELAY).await;
                }
                DomOutcome::Missing => {
                    return Err(PortalError::ElementNotFound {
                        locator: locator.to_string(),
                    });
                }
                DomOutcome::MissingOption => {
                    return Err(PortalError::OptionNotFound {
                        locator: locator.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }

        self.slow_mo().await;
        Ok(())
    }

    async fn slow_mo(&self) {
        if !self.options.slow_mo.is_zero() {
            tokio::time::sleep(self.options.slow_mo).await;
        }
    }
}

impl Default for HeadlessPortal {
    fn default() -> Self {
        Self::new(HeadlessOptions::default())
    }
}

#[async_trait]
impl Portal for HeadlessPortal {
    async fn launch(&mut self) -> Result<(), PortalError> {
        info!("Launching headless portal (Chromium)...");
        let client = CdpClient::launch(&self.options).await?;
        let network = NetworkMonitor::attach(&client.page).await?;
        self.session = Some(Session { client, network });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PortalError> {
        if let Some(Session { client, network }) = self.session.take() {
            drop(network);
            client.close().await?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, PortalError> {
        let session = self.session()?;

        info!("Navigating to: {}", url);
        session
            .client
            .page
            .goto(url)
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;

        let result = Self::get_navigation_result(&session.client.page).await?;
        self.slow_mo().await;
        Ok(result)
    }

    async fn login(
        &mut self,
        login_url: &str,
        credentials: &Credentials,
    ) -> Result<(), PortalError> {
        self.navigate(login_url).await?;
        self.set_field(&Locator::placeholder("USERNAME"), &credentials.username)
            .await?;
        self.set_field(&Locator::placeholder("PASSWORD"), &credentials.password)
            .await?;
        self.click(&Locator::text("button", "Login")).await?;
        self.wait_for_network_quiescence().await?;

        let landed = Self::get_navigation_result(&self.session()?.client.page).await?;
        if landed.url.contains(LOGIN_PATH_MARKER) {
            return Err(PortalError::Login(format!(
                "still on the login page as {}",
                credentials.username
            )));
        }
        info!("Logged in, now at {}", landed.url);
        Ok(())
    }

    async fn set_field(&mut self, locator: &Locator, value: &str) -> Result<(), PortalError> {
        self.act(locator, DomOp::Set, value).await
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> Result<(), PortalError> {
        self.act(locator, DomOp::Select, value).await
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), PortalError> {
        self.act(locator, DomOp::Click, "").await
    }

    async fn wait_for_network_quiescence(&mut self) -> Result<(), PortalError> {
        self.session()?
            .network
            .wait_for_quiescence(self.options.idle_window, self.options.quiescence_timeout)
            .await
    }

    async fn observe_responses(
        &mut self,
        url_pattern: &str,
        on_match: ResponseCallback,
    ) -> Result<(), PortalError> {
        info!("Observing responses matching {}", url_pattern);
        self.session()?.network.observe(url_pattern, on_match);
        Ok(())
    }

    async fn get(&mut self, url: &str) -> Result<FetchedResource, PortalError> {
        let session = self.session()?;
        let cookies = session
            .client
            .page
            .get_cookies()
            .await
            .map_err(|e| PortalError::Fetch(format!("Get cookies failed: {}", e)))?;
        let header = cookie_header(
            cookies
                .iter()
                .map(|c| (c.name.as_str(), c.value.as_str())),
        );
        fetch_with_cookies(&self.http, url, &header).await
    }
}
