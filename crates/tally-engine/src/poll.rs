use crate::portal::Portal;
use crate::sequence::{ActionError, Step};
use crate::slot::ResponseSlot;
use std::time::Duration;
use tally_common::report::{DEFAULT_ERP_BASE, ReportDescriptor, ReportError, select_report};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Reload failed: {0}")]
    Trigger(#[from] ActionError),

    #[error("No report list response within {0:?}")]
    ResponseTimeout(Duration),

    #[error(transparent)]
    Malformed(#[from] ReportError),

    #[error("Report still processing after {polls} polls")]
    Exhausted { polls: u32 },

    #[error("Polling cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Position in the report list; 0 is the most recent request.
    pub index: usize,
    pub interval: Duration,
    /// Upper bound on reloads; values below 1 are raised to 1.
    pub max_polls: u32,
    pub response_timeout: Duration,
    pub base_url: String,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            index: 0,
            interval: Duration::from_secs(2),
            max_polls: 150,
            response_timeout: Duration::from_secs(30),
            base_url: DEFAULT_ERP_BASE.to_string(),
        }
    }
}

/// Reload the report list until the selected report has left `Processing`.
///
/// Each poll clears `bodies`, runs `reload`, and waits for the portal's
/// observer to deliver the list response into `bodies`. A missing response,
/// a malformed body or a failed reload ends the loop with an error.
pub async fn poll_until_ready<P, S>(
    portal: &mut P,
    reload: &S,
    bodies: &ResponseSlot<String>,
    options: &PollOptions,
    cancel: &CancellationToken,
) -> Result<ReportDescriptor, PollError>
where
    P: Portal + ?Sized + 'static,
    S: Step<P> + ?Sized,
{
    let max_polls = options.max_polls.max(1);

    for poll in 1..=max_polls {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        bodies.clear();
        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            result = reload.execute(portal) => { result?; }
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            body = bodies.wait_take(options.response_timeout) => {
                body.ok_or(PollError::ResponseTimeout(options.response_timeout))?
            }
        };

        let report = select_report(&body, options.index, &options.base_url)?;
        debug!("Report {} URL: {}", report.id, report.download_url);

        if report.is_ready() {
            info!(
                "Report {} is {} after {} poll(s)",
                report.filename_ext, report.status, poll
            );
            return Ok(report);
        }

        info!(
            "Report {} still processing (poll {}/{})",
            report.filename_ext, poll, max_polls
        );

        if poll < max_polls {
            tokio::select! {
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(options.interval) => {}
            }
        }
    }

    Err(PollError::Exhausted { polls: max_polls })
}
