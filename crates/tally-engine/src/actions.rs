use crate::portal::{Credentials, Locator, Portal};
use crate::sequence::{ActionError, Step};
use crate::slot::ResponseSlot;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A single portal call bound to its arguments.
#[derive(Debug, Clone)]
pub enum PortalAction {
    Navigate {
        url: String,
    },
    Login {
        login_url: String,
        credentials: Credentials,
    },
    SetField {
        locator: Locator,
        value: String,
    },
    SelectOption {
        locator: Locator,
        value: String,
    },
    Click {
        locator: Locator,
    },
    WaitForNetworkQuiescence,
    /// Fixed settle time for widgets that animate after the network is idle.
    Pause(Duration),
    /// Drop whatever an observer left in the slot.
    ClearSlot(ResponseSlot<String>),
    /// Wait for the slot to be filled, consume it, and return whether it equals `expected`.
    CheckResponse {
        slot: ResponseSlot<String>,
        expected: String,
        timeout: Duration,
    },
}

impl PortalAction {
    pub fn navigate(url: impl Into<String>) -> Self {
        PortalAction::Navigate { url: url.into() }
    }

    pub fn click(locator: Locator) -> Self {
        PortalAction::Click { locator }
    }

    pub fn select(locator: Locator, value: impl Into<String>) -> Self {
        PortalAction::SelectOption {
            locator,
            value: value.into(),
        }
    }

    pub fn set_field(locator: Locator, value: impl Into<String>) -> Self {
        PortalAction::SetField {
            locator,
            value: value.into(),
        }
    }

    pub fn check_response(
        slot: &ResponseSlot<String>,
        expected: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        PortalAction::CheckResponse {
            slot: slot.clone(),
            expected: expected.into(),
            timeout,
        }
    }

    /// Run the action against a portal.
    pub async fn perform<P: Portal + ?Sized>(&self, portal: &mut P) -> Result<Value, ActionError> {
        match self {
            PortalAction::Navigate { url } => {
                let res = portal.navigate(url).await?;
                Ok(Value::String(res.url))
            }
            PortalAction::Login {
                login_url,
                credentials,
            } => {
                portal.login(login_url, credentials).await?;
                Ok(Value::Null)
            }
            PortalAction::SetField { locator, value } => {
                portal.set_field(locator, value).await?;
                Ok(Value::Null)
            }
            PortalAction::SelectOption { locator, value } => {
                portal.select_option(locator, value).await?;
                Ok(Value::Null)
            }
            PortalAction::Click { locator } => {
                portal.click(locator).await?;
                Ok(Value::Null)
            }
            PortalAction::WaitForNetworkQuiescence => {
                portal.wait_for_network_quiescence().await?;
                Ok(Value::Null)
            }
            PortalAction::Pause(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Value::Null)
            }
            PortalAction::ClearSlot(slot) => {
                slot.clear();
                Ok(Value::Null)
            }
            PortalAction::CheckResponse {
                slot,
                expected,
                timeout,
            } => {
                let observed = slot.wait_take(*timeout).await;
                tracing::debug!("Observed response {:?}, expected {:?}", observed, expected);
                Ok(Value::Bool(observed.as_deref() == Some(expected.as_str())))
            }
        }
    }
}

#[async_trait]
impl<P: Portal + ?Sized + 'static> Step<P> for PortalAction {
    fn name(&self) -> String {
        match self {
            PortalAction::Navigate { url } => format!("navigate({})", url),
            PortalAction::Login { credentials, .. } => format!("login({})", credentials.username),
            PortalAction::SetField { locator, .. } => format!("set_field({})", locator),
            PortalAction::SelectOption { locator, value } => {
                format!("select_option({}, {})", locator, value)
            }
            PortalAction::Click { locator } => format!("click({})", locator),
            PortalAction::WaitForNetworkQuiescence => "wait_for_network_quiescence".into(),
            PortalAction::Pause(d) => format!("pause({:?})", d),
            PortalAction::ClearSlot(_) => "clear_slot".into(),
            PortalAction::CheckResponse { expected, .. } => format!("check_response({})", expected),
        }
    }

    async fn execute(&self, ctx: &mut P) -> Result<Value, ActionError> {
        self.perform(ctx).await
    }
}
