use httpmock::prelude::*;
use tally_h::fetch::fetch_with_cookies;

#[tokio::test]
async fn test_fetch_sends_session_cookies() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/ERP/RequestPreview/PrintPreview")
                .query_param("reportRequestId", "1204")
                .header("cookie", "ASP.NET_SessionId=abc; .ASPXAUTH=xyz");
            then.status(200).body("col1,col2\n1,2\n");
        })
        .await;

    let url = server.url("/ERP/RequestPreview/PrintPreview?reportRequestId=1204");
    let client = reqwest::Client::new();
    let resource = fetch_with_cookies(&client, &url, "ASP.NET_SessionId=abc; .ASPXAUTH=xyz")
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(resource.is_success());
    assert_eq!(resource.body, b"col1,col2\n1,2\n");
}

#[tokio::test]
async fn test_fetch_reports_refusal_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ERP/RequestPreview/PrintPreview");
            then.status(500).body("Server Error");
        })
        .await;

    let url = server.url("/ERP/RequestPreview/PrintPreview");
    let resource = fetch_with_cookies(&reqwest::Client::new(), &url, "")
        .await
        .unwrap();

    assert_eq!(resource.status, 500);
    assert!(!resource.is_success());
}

#[tokio::test]
async fn test_unreachable_host_is_fetch_error() {
    let result = fetch_with_cookies(&reqwest::Client::new(), "http://127.0.0.1:1/report", "").await;
    assert!(matches!(
        result,
        Err(tally_engine::portal::PortalError::Fetch(_))
    ));
}
