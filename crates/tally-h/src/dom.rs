use chromiumoxide::Page;
use std::time::Duration;
use tally_engine::portal::{Locator, PortalError};

const DOM_JS: &str = include_str!("dom.js");

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomOp {
    Click,
    Set,
    Select,
}

impl DomOp {
    fn as_str(self) -> &'static str {
        match self {
            DomOp::Click => "click",
            DomOp::Set => "set",
            DomOp::Select => "select",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomOutcome {
    Done,
    Missing,
    MissingOption,
}

impl DomOutcome {
    fn parse(value: &serde_json::Value) -> Result<Self, PortalError> {
        match value.as_str() {
            Some("ok") => Ok(DomOutcome::Done),
            Some("missing") => Ok(DomOutcome::Missing),
            Some("missing-option") => Ok(DomOutcome::MissingOption),
            _ => Err(PortalError::Script(format!(
                "Unexpected DOM script result: {}",
                value
            ))),
        }
    }
}

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

pub fn build_expression(locator: &Locator, op: DomOp, value: &str) -> Result<String, PortalError> {
    Ok(format!(
        "{}({}, {}, {})",
        DOM_JS.trim_end(),
        serde_json::to_string(locator)?,
        serde_json::to_string(op.as_str())?,
        serde_json::to_string(value)?
    ))
}

/// Run one DOM operation, retrying while the page is between documents.
pub async fn run_dom_op(
    page: &Page,
    locator: &Locator,
    op: DomOp,
    value: &str,
    eval_timeout: Duration,
) -> Result<DomOutcome, PortalError> {
    let expression = build_expression(locator, op, value)?;
    tracing::debug!("{} {}", op.as_str(), locator);

    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match evaluate_with_timeout(page, &expression, eval_timeout).await {
            Ok(value) => return DomOutcome::parse(&value),
            Err(EvalError::Timeout) => {
                return Err(PortalError::timeout(format!(
                    "{} {} (possibly blocked by a dialog)",
                    op.as_str(),
                    locator
                )));
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during {} (attempt {}/{}), retrying...",
                    op.as_str(),
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err_str)) => {
                return Err(PortalError::Script(err_str));
            }
        }
    }

    Err(PortalError::Script(last_error.unwrap_or_else(|| {
        format!("Failed to {} {} after retries", op.as_str(), locator)
    })))
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(
    page: &Page,
    expression: &str,
    timeout: Duration,
) -> Result<serde_json::Value, EvalError> {
    let eval_result = tokio::time::timeout(timeout, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        Ok(Ok(remote_object)) => remote_object
            .into_value::<serde_json::Value>()
            .map_err(|e| EvalError::Other(format!("Failed to get result: {}", e))),
    }
}
