//! End-to-end report run: log in, request a report, wait for it, download it.

use crate::actions::PortalAction;
use crate::config::TallyConfig;
use crate::dates::DateRange;
use crate::download::{DownloadError, download_report};
use crate::pages::{self, PageStep};
use crate::poll::{PollError, poll_until_ready};
use crate::portal::{Credentials, ObservedResponse, Portal, PortalError, ResponseCallback};
use crate::sequence::{ActionError, Sequence};
use crate::slot::ResponseSlot;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tally_common::catalog::{ReportFormat, ReportTab, ReportType};
use tally_common::report::{ReportDescriptor, parse_request_message};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Portal error: {0}")]
    Portal(#[from] PortalError),

    #[error("Step failed: {0}")]
    Action(#[from] ActionError),

    #[error(transparent)]
    Poll(PollError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("Invalid report job: {0}")]
    InvalidJob(String),

    #[error("Report run cancelled")]
    Cancelled,
}

impl WorkflowError {
    /// The portal failure underneath, however deeply it is wrapped.
    pub fn portal_error(&self) -> Option<&PortalError> {
        match self {
            WorkflowError::Portal(e) => Some(e),
            WorkflowError::Action(e) | WorkflowError::Poll(PollError::Trigger(e)) => {
                e.portal_error()
            }
            WorkflowError::Download(DownloadError::Portal(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<PollError> for WorkflowError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Cancelled => WorkflowError::Cancelled,
            other => WorkflowError::Poll(other),
        }
    }
}

/// Which organisation units the report covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgScope {
    /// A saved template from the organisation-profile dropdown.
    Template(String),
    /// Units ticked one by one in the organisation tree.
    Units(Vec<String>),
    /// Whatever the portal has selected already.
    Unchanged,
}

impl OrgScope {
    pub fn from_parts(template: Option<String>, units: Vec<String>) -> Self {
        match template {
            Some(t) => OrgScope::Template(t),
            None if !units.is_empty() => OrgScope::Units(units),
            None => OrgScope::Unchanged,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportJob {
    pub tab: ReportTab,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub range: DateRange,
    pub org: OrgScope,
    /// Position in the report list to download; 0 is the newest.
    pub index: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The portal never confirmed the report request.
    SubmissionRejected,
    Downloaded {
        report: ReportDescriptor,
        path: PathBuf,
    },
    /// The report was ready but the download was refused.
    DownloadFailed { report: ReportDescriptor },
}

/// Observer feeding the `Message` of each report-request response into `slot`.
pub fn request_message_observer(slot: &ResponseSlot<String>) -> ResponseCallback {
    let slot = slot.clone();
    Arc::new(move |response: ObservedResponse| {
        info!("Observed report request response from {}", response.url);
        match parse_request_message(&response.body) {
            Ok(Some(message)) => slot.set(message),
            Ok(None) => warn!("Report request response had no Message"),
            Err(e) => warn!("Failed to read report request response: {}", e),
        }
    })
}

/// Observer feeding every matching response body into `slot`.
pub fn body_observer(slot: &ResponseSlot<String>) -> ResponseCallback {
    let slot = slot.clone();
    Arc::new(move |response: ObservedResponse| {
        if response.status == 200 {
            slot.set(response.body);
        } else {
            warn!("Ignoring {} response from {}", response.status, response.url);
        }
    })
}

/// The retryable part of a run: configure the report form and submit it.
pub fn submission_sequence<P: Portal + ?Sized + 'static>(
    job: &ReportJob,
    config: &TallyConfig,
    request_messages: &ResponseSlot<String>,
) -> Sequence<P> {
    let pacing = config.pacing();
    let mut seq = Sequence::new();

    seq.add(pages::switch_report_tab(job.tab, &pacing))
        .add(pages::select_report_type(job.report_type, &pacing))
        .add(pages::select_report_format(job.format, &pacing))
        .add(pages::select_date_range(&job.range));

    match &job.org {
        OrgScope::Template(template) => {
            seq.add(pages::select_org_template(template, &pacing));
        }
        OrgScope::Units(units) => {
            seq.add(pages::select_org_units(units, &pacing));
        }
        OrgScope::Unchanged => {}
    }

    seq.add(pages::click_background())
        .add(PortalAction::ClearSlot(request_messages.clone()))
        .add(pages::run_report())
        .add_expecting(
            PortalAction::check_response(
                request_messages,
                config.portal.accepted_message.clone(),
                Duration::from_millis(config.portal.submit_response_timeout_ms),
            ),
            true,
        );
    seq
}

/// Resolve `work` unless `cancel` fires first; the abandoned future is dropped.
async fn cancellable<T, E, F>(cancel: &CancellationToken, work: F) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, E>>,
    WorkflowError: From<E>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(WorkflowError::Cancelled),
        result = work => result.map_err(WorkflowError::from),
    }
}

/// Drive one report from login to file on disk.
///
/// The portal must already be launched. It is left open for the caller to close.
/// Cancelling `cancel` stops the run at whichever phase it is in.
pub async fn run_report_job<P: Portal + ?Sized + 'static>(
    portal: &mut P,
    config: &TallyConfig,
    credentials: &Credentials,
    job: &ReportJob,
    cancel: &CancellationToken,
) -> Result<JobOutcome, WorkflowError> {
    if !job.tab.has_report_form() {
        return Err(WorkflowError::InvalidJob(format!(
            "the {:?} tab has no report form",
            job.tab
        )));
    }
    if cancel.is_cancelled() {
        return Err(WorkflowError::Cancelled);
    }

    let request_messages = ResponseSlot::new();
    let report_lists = ResponseSlot::new();

    portal
        .observe_responses(
            &config.portal.request_url_pattern,
            request_message_observer(&request_messages),
        )
        .await?;
    portal
        .observe_responses(&config.portal.status_url_pattern, body_observer(&report_lists))
        .await?;

    info!("Logging in as {}", credentials.username);
    cancellable(cancel, async {
        portal.login(&config.login_url(), credentials).await?;
        pages::goto_reports_page().perform(portal).await?;
        Ok::<_, WorkflowError>(())
    })
    .await?;

    info!(
        "Requesting {} as {} for {}",
        job.report_type, job.format, job.range
    );
    let submission = submission_sequence::<P>(job, config, &request_messages);
    let policy = config.retry_policy();
    let report = cancellable(cancel, async {
        Ok::<_, WorkflowError>(submission.run_with_report(portal, &policy).await)
    })
    .await?;
    if !report.succeeded {
        if let Some(failure) = &report.last_failure {
            warn!("Report request not confirmed: {}", failure);
        }
        return Ok(JobOutcome::SubmissionRejected);
    }

    let pacing = config.pacing();
    let open_list: PageStep = pages::switch_report_tab(ReportTab::Reports, &pacing);
    cancellable(cancel, open_list.perform(portal)).await?;

    let ready = poll_until_ready(
        portal,
        &pages::reload_report_list(),
        &report_lists,
        &config.poll_options(job.index),
        cancel,
    )
    .await?;
    info!("Report URL: {}", ready.download_url);

    let saved = cancellable(
        cancel,
        download_report(
            portal,
            &ready,
            job.output.as_deref(),
            &config.report.download_dir,
        ),
    )
    .await?;
    match saved {
        Some(path) => Ok(JobOutcome::Downloaded {
            report: ready,
            path,
        }),
        None => Ok(JobOutcome::DownloadFailed { report: ready }),
    }
}
