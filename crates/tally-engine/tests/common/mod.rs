#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tally_engine::portal::{
    FetchedResource, Locator, NavigationResult, ObservedResponse, Portal, PortalError,
    ResponseCallback,
};

pub const REQUEST_URL: &str = "https://portal.test/ERP/Report/RequestReport";
pub const LIST_URL: &str = "https://portal.test/ERP/RequestPreview/RequestPreview";

/// Portal double that records every call and replays scripted network responses.
#[derive(Default)]
pub struct MockPortal {
    pub calls: Vec<String>,
    observers: Vec<(String, ResponseCallback)>,
    responses_on_click: HashMap<String, VecDeque<ObservedResponse>>,
    pub downloads: HashMap<String, FetchedResource>,
    failing_clicks: HashMap<String, usize>,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response the browser "receives" the next time `locator` is clicked.
    pub fn respond_on_click(&mut self, locator: &Locator, url: &str, body: impl Into<String>) {
        self.responses_on_click
            .entry(locator.to_string())
            .or_default()
            .push_back(ObservedResponse {
                url: url.to_string(),
                status: 200,
                body: body.into(),
            });
    }

    /// Make the next `times` clicks on `locator` fail as if the element were missing.
    pub fn fail_clicks(&mut self, locator: &Locator, times: usize) {
        self.failing_clicks.insert(locator.to_string(), times);
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn dispatch(&self, response: &ObservedResponse) {
        for (pattern, callback) in &self.observers {
            if response.url.contains(pattern.as_str()) {
                callback(response.clone());
            }
        }
    }
}

#[async_trait]
impl Portal for MockPortal {
    async fn launch(&mut self) -> Result<(), PortalError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PortalError> {
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, PortalError> {
        self.calls.push(format!("navigate({})", url));
        Ok(NavigationResult {
            url: url.to_string(),
            title: "Mock".to_string(),
            status: 200,
        })
    }

    async fn set_field(&mut self, locator: &Locator, _value: &str) -> Result<(), PortalError> {
        self.calls.push(format!("set_field({})", locator));
        Ok(())
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> Result<(), PortalError> {
        self.calls.push(format!("select_option({}, {})", locator, value));
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), PortalError> {
        let key = locator.to_string();
        self.calls.push(format!("click({})", key));

        if let Some(remaining) = self.failing_clicks.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PortalError::ElementNotFound { locator: key });
            }
        }

        let next = self
            .responses_on_click
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());
        if let Some(response) = next {
            self.dispatch(&response);
        }
        Ok(())
    }

    async fn wait_for_network_quiescence(&mut self) -> Result<(), PortalError> {
        Ok(())
    }

    async fn observe_responses(
        &mut self,
        url_pattern: &str,
        on_match: ResponseCallback,
    ) -> Result<(), PortalError> {
        self.calls.push(format!("observe({})", url_pattern));
        self.observers.push((url_pattern.to_string(), on_match));
        Ok(())
    }

    async fn get(&mut self, url: &str) -> Result<FetchedResource, PortalError> {
        self.calls.push(format!("get({})", url));
        Ok(self.downloads.get(url).cloned().unwrap_or(FetchedResource {
            status: 404,
            body: Vec::new(),
        }))
    }
}

pub fn report_list(entries: &[(&str, &str, &str)]) -> String {
    let data: Vec<_> = entries
        .iter()
        .map(|(id, file, status)| {
            serde_json::json!({
                "Id": id,
                "ReportFileName": file,
                "ReportName": "Total Hours Worked",
                "ReportStatus": status,
                "ReportDateStr": "09/12/2024",
                "ErrorMessage": null,
            })
        })
        .collect();
    serde_json::json!({ "Data": data }).to_string()
}

pub fn request_message(message: &str) -> String {
    serde_json::json!({ "Message": message }).to_string()
}
