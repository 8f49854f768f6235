//! Network event tracking on top of the CDP `Network` domain.
//!
//! One background task follows every request of the page. It keeps the set of
//! requests in flight, for quiescence waits, and hands the bodies of responses
//! matching a registered pattern to that pattern's callback. Matched responses
//! whose body never arrives are dropped when the main frame navigates, or once
//! too many pile up.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::EventFrameNavigated;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tally_engine::portal::{ObservedResponse, PortalError, ResponseCallback};
use tokio::task::JoinHandle;

const QUIESCENCE_POLL: Duration = Duration::from_millis(50);

/// Matched responses held while their body loads; the oldest goes first past this.
pub const MAX_PENDING_BODIES: usize = 64;

/// Requests the page has started but not yet finished.
#[derive(Debug)]
pub struct InFlight {
    pending: HashSet<String>,
    last_change: Instant,
}

impl InFlight {
    pub fn new(now: Instant) -> Self {
        Self {
            pending: HashSet::new(),
            last_change: now,
        }
    }

    pub fn started(&mut self, id: String, now: Instant) {
        self.pending.insert(id);
        self.last_change = now;
    }

    pub fn finished(&mut self, id: &str, now: Instant) {
        if self.pending.remove(id) {
            self.last_change = now;
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Nothing in flight and no activity for `idle` since both the last
    /// change and `since`.
    pub fn is_quiet(&self, now: Instant, since: Instant, idle: Duration) -> bool {
        let reference = self.last_change.max(since);
        self.pending.is_empty() && now.saturating_duration_since(reference) >= idle
    }
}

#[derive(Debug)]
struct PendingBody {
    url: String,
    status: u16,
    seq: u64,
}

/// Matched responses waiting for their body to finish loading.
#[derive(Debug, Default)]
pub struct PendingBodies {
    entries: HashMap<String, PendingBody>,
    next_seq: u64,
}

impl PendingBodies {
    pub fn insert(&mut self, id: String, url: String, status: u16) {
        if self.entries.len() >= MAX_PENDING_BODIES && !self.entries.contains_key(&id) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, pending)| pending.seq)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                if let Some(dropped) = self.entries.remove(&oldest) {
                    tracing::debug!("Dropping unfinished response {}", dropped.url);
                }
            }
        }
        self.next_seq += 1;
        self.entries.insert(
            id,
            PendingBody {
                url,
                status,
                seq: self.next_seq,
            },
        );
    }

    /// URL and status of `id`, which stops being tracked.
    pub fn take(&mut self, id: &str) -> Option<(String, u16)> {
        self.entries
            .remove(id)
            .map(|pending| (pending.url, pending.status))
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Observer {
    pattern: String,
    callback: ResponseCallback,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct NetworkMonitor {
    in_flight: Arc<Mutex<InFlight>>,
    observers: Arc<Mutex<Vec<Observer>>>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    pub async fn attach(page: &Page) -> Result<Self, PortalError> {
        let subscribe_err = |e: chromiumoxide::error::CdpError| {
            PortalError::Other(format!("Failed to subscribe to network events: {}", e))
        };
        let mut sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(subscribe_err)?;
        let mut received = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(subscribe_err)?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(subscribe_err)?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(subscribe_err)?;
        let mut navigated = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(subscribe_err)?;

        let in_flight = Arc::new(Mutex::new(InFlight::new(Instant::now())));
        let observers: Arc<Mutex<Vec<Observer>>> = Arc::new(Mutex::new(Vec::new()));

        let task_in_flight = in_flight.clone();
        let task_observers = observers.clone();
        let page = page.clone();
        let task = tokio::spawn(async move {
            let mut matched = PendingBodies::default();
            loop {
                tokio::select! {
                    Some(event) = sent.next() => {
                        lock(&task_in_flight).started(event.request_id.inner().clone(), Instant::now());
                    }
                    Some(event) = received.next() => {
                        let url = &event.response.url;
                        let wanted = lock(&task_observers)
                            .iter()
                            .any(|o| url.contains(o.pattern.as_str()));
                        if wanted {
                            let status = u16::try_from(event.response.status).unwrap_or(0);
                            matched.insert(event.request_id.inner().clone(), url.clone(), status);
                        }
                    }
                    Some(event) = finished.next() => {
                        let id = event.request_id.inner().clone();
                        lock(&task_in_flight).finished(&id, Instant::now());
                        if let Some((url, status)) = matched.take(&id) {
                            tokio::spawn(deliver(
                                page.clone(),
                                event.request_id.clone(),
                                url,
                                status,
                                task_observers.clone(),
                            ));
                        }
                    }
                    Some(event) = failed.next() => {
                        let id = event.request_id.inner();
                        lock(&task_in_flight).finished(id, Instant::now());
                        matched.take(id);
                    }
                    Some(event) = navigated.next() => {
                        if event.frame.parent_id.is_none() {
                            let dropped = matched.clear();
                            if dropped > 0 {
                                tracing::debug!("Main frame navigated, dropped {} unfinished response(s)", dropped);
                            }
                        }
                    }
                    else => break,
                }
            }
            tracing::debug!("Network monitor ended");
        });

        Ok(Self {
            in_flight,
            observers,
            task,
        })
    }

    pub fn observe(&self, pattern: &str, callback: ResponseCallback) {
        lock(&self.observers).push(Observer {
            pattern: pattern.to_string(),
            callback,
        });
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Wait until no request has been in flight for `idle`.
    pub async fn wait_for_quiescence(
        &self,
        idle: Duration,
        timeout: Duration,
    ) -> Result<(), PortalError> {
        let since = Instant::now();
        let deadline = since + timeout;
        loop {
            let now = Instant::now();
            if lock(&self.in_flight).is_quiet(now, since, idle) {
                return Ok(());
            }
            if now >= deadline {
                tracing::warn!(
                    "Network still busy after {:?} ({} in flight)",
                    timeout,
                    self.in_flight()
                );
                return Err(PortalError::timeout("network quiescence"));
            }
            tokio::time::sleep(QUIESCENCE_POLL).await;
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn deliver(
    page: Page,
    request_id: RequestId,
    url: String,
    status: u16,
    observers: Arc<Mutex<Vec<Observer>>>,
) {
    let body = match page.execute(GetResponseBodyParams::new(request_id)).await {
        Ok(response) => decode_body(&response.result.body, response.result.base64_encoded),
        Err(e) => {
            tracing::warn!("Failed to read response body of {}: {}", url, e);
            return;
        }
    };

    let callbacks: Vec<ResponseCallback> = lock(&observers)
        .iter()
        .filter(|o| url.contains(o.pattern.as_str()))
        .map(|o| o.callback.clone())
        .collect();

    tracing::debug!("Delivering {} ({} bytes) to {} observer(s)", url, body.len(), callbacks.len());
    for callback in callbacks {
        callback(ObservedResponse {
            url: url.clone(),
            status,
            body: body.clone(),
        });
    }
}

/// Response body as text; CDP ships binary bodies base64-encoded.
pub fn decode_body(body: &str, base64_encoded: bool) -> String {
    if !base64_encoded {
        return body.to_string();
    }
    match STANDARD.decode(body) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("Response body is not valid base64: {}", e);
            body.to_string()
        }
    }
}

pub async fn enable_network_logging(page: &Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut request_events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| format!("Failed to subscribe to network events: {}", e))?;

    tokio::spawn(async move {
        while let Some(event) = request_events.next().await {
            tracing::info!(
                "Network Request: [{}] {}",
                event.request.method,
                event.request.url
            );
        }
    });

    Ok(())
}
