use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
pub use tally_common::error::portal_error::PortalError;
pub use tally_common::locator::Locator;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16,
}

/// A network response the browser received for a URL matching an observer's pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Result of an authenticated fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedResource {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Callback invoked by the portal for every response matching an observer's pattern.
///
/// It runs on the driver's event task, not on the caller's control flow.
pub type ResponseCallback = Arc<dyn Fn(ObservedResponse) + Send + Sync>;

/// A stateful, navigable session on the reporting portal.
#[async_trait]
pub trait Portal: Send + Sync {
    /// Start the browser session.
    async fn launch(&mut self) -> Result<(), PortalError>;

    /// Close the session and release its resources.
    async fn close(&mut self) -> Result<(), PortalError>;

    async fn is_ready(&self) -> bool;

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, PortalError>;

    /// Log in through the portal's login form.
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
        self.wait_for_network_quiescence().await
    }

    async fn set_field(&mut self, locator: &Locator, value: &str) -> Result<(), PortalError>;

    async fn select_option(&mut self, locator: &Locator, value: &str) -> Result<(), PortalError>;

    async fn click(&mut self, locator: &Locator) -> Result<(), PortalError>;

    /// Block until the page has had no requests in flight for a short idle window.
    async fn wait_for_network_quiescence(&mut self) -> Result<(), PortalError>;

    /// Register a persistent listener for responses whose URL contains `url_pattern`.
    async fn observe_responses(
        &mut self,
        url_pattern: &str,
        on_match: ResponseCallback,
    ) -> Result<(), PortalError>;

    /// Fetch a URL with the session's cookies.
    async fn get(&mut self, url: &str) -> Result<FetchedResource, PortalError>;
}
