/// Errors raised by a portal session driver.
#[derive(thiserror::Error, Debug, Clone)]
pub enum PortalError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Login failed: {0}")]
    Login(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Option {value} not found in {locator}")]
    OptionNotFound { locator: String, value: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    Script(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Not ready")]
    NotReady,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        PortalError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Serialization(err.to_string())
    }
}

impl PortalError {
    pub fn timeout(operation: impl Into<String>) -> Self {
        PortalError::Timeout {
            operation: operation.into(),
        }
    }

    /// Stable error code, used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Navigation(_) => "NAVIGATION_ERROR",
            PortalError::Login(_) => "LOGIN_ERROR",
            PortalError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            PortalError::OptionNotFound { .. } => "OPTION_NOT_FOUND",
            PortalError::Script(_) => "SCRIPT_ERROR",
            PortalError::Timeout { .. } => "TIMEOUT",
            PortalError::Fetch(_) => "FETCH_ERROR",
            PortalError::NotReady => "NOT_READY",
            PortalError::Io(_) => "IO_ERROR",
            PortalError::Serialization(_) => "SERIALIZATION_ERROR",
            PortalError::NotSupported(_) => "NOT_SUPPORTED",
            PortalError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            PortalError::ElementNotFound { .. } | PortalError::OptionNotFound { .. } => {
                "The portal markup may have changed; check the selector"
            }
            PortalError::Timeout { .. } => "Increase the timeout or check connectivity",
            PortalError::Login(_) => "Check TAMBLA_USER and TAMBLA_PASSWORD",
            PortalError::Navigation(_) | PortalError::Fetch(_) => {
                "Check the portal URL and network connectivity"
            }
            PortalError::NotReady => "Launch the browser session first",
            _ => "Check the command parameters",
        }
    }
}
