//! Direct HTTP downloads that reuse the browser session's cookies.

use reqwest::header::COOKIE;
use tally_engine::portal::{FetchedResource, PortalError};

/// `name=value` pairs joined the way a `Cookie` request header expects.
pub fn cookie_header<'a, I>(cookies: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    cookies
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn fetch_with_cookies(
    client: &reqwest::Client,
    url: &str,
    cookies: &str,
) -> Result<FetchedResource, PortalError> {
    let mut request = client.get(url);
    if !cookies.is_empty() {
        request = request.header(COOKIE, cookies);
    }

    let response = request
        .send()
        .await
        .map_err(|e| PortalError::Fetch(format!("GET {} failed: {}", url, e)))?;
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| PortalError::Fetch(format!("Reading {} failed: {}", url, e)))?;

    tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
    Ok(FetchedResource {
        status,
        body: body.to_vec(),
    })
}
