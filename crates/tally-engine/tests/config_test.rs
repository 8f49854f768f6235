use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_common::catalog::{ReportFormat, ReportTab, ReportType};
use tally_engine::config::{ConfigError, ConfigLoader, TallyConfig};
use tempfile::NamedTempFile;

/// Loader that sees only `vars` and searches no default locations.
fn isolated(vars: &[(&str, &str)]) -> ConfigLoader {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigLoader::new()
        .with_env(move |name| vars.get(name).cloned())
        .with_search_paths(Vec::new())
}

#[tokio::test]
async fn test_load_partial_config() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
portal:
  site_url: "https://staging.example.test/"
  tab_settle_ms: 250
retry:
  attempts: 5
  delay_ms: 1500
report:
  report_type: ScheduleAndTimeSheetComparison
  format: CSV
  org_units:
    - Laundry
    - Transport
"#
    )
    .unwrap();

    let config = ConfigLoader::read(file.path()).await.unwrap();

    assert_eq!(
        config.login_url(),
        "https://staging.example.test/Account/Login?ReturnUrl=%2fEtivity"
    );
    assert_eq!(config.pacing().after_tab_switch, Duration::from_millis(250));
    assert_eq!(config.pacing().after_select, Duration::from_secs(1));

    let policy = config.retry_policy();
    assert_eq!(policy.attempts(), 5);
    assert_eq!(policy.delay(), Duration::from_millis(1500));

    assert_eq!(
        config.report.report_type,
        ReportType::ScheduleAndTimeSheetComparison
    );
    assert_eq!(config.report.format, ReportFormat::Csv);
    assert_eq!(config.report.org_units, vec!["Laundry", "Transport"]);
    assert_eq!(config.report.tab, ReportTab::TimeAttendance);
}

#[tokio::test]
async fn test_defaults() {
    let config = TallyConfig::default();
    assert_eq!(config.retry.attempts, 3);
    assert_eq!(config.poll.max_polls, 150);

    let poll = config.poll_options(2);
    assert_eq!(poll.index, 2);
    assert_eq!(poll.interval, Duration::from_secs(2));
    assert_eq!(poll.base_url, "https://etivity.comops.biz/ERP");
    assert_eq!(config.portal.accepted_message, "Your request is being processed");
    assert!(!config.browser.visible);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let result = isolated(&[])
        .load(Some(Path::new("/nonexistent/tally.yaml")))
        .await;
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[tokio::test]
async fn test_invalid_yaml_is_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "retry: [unterminated").unwrap();
    let result = ConfigLoader::read(file.path()).await;
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[tokio::test]
async fn test_env_overrides_file_values() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "report:\n  download_dir: /srv/reports\nretry:\n  attempts: 2").unwrap();
    let path = file.path().display().to_string();

    let loader = isolated(&[
        ("TALLY_CONFIG", path.as_str()),
        ("TALLY_DOWNLOAD_DIR", "/tmp/tally-out"),
        ("TALLY_RETRY_ATTEMPTS", "7"),
        ("TALLY_VISIBLE", "yes"),
        ("TALLY_USER_DATA_DIR", ""),
        ("CHROME_BIN", "/opt/chromium/chrome"),
    ]);
    assert_eq!(loader.locate(None), Some(file.path().to_path_buf()));

    let config = loader.load(None).await.unwrap();
    assert_eq!(config.report.download_dir, PathBuf::from("/tmp/tally-out"));
    assert_eq!(config.retry.attempts, 7);
    assert!(config.browser.visible);
    assert_eq!(config.browser.user_data_dir, None);
    assert_eq!(
        config.browser.chrome_path,
        Some(PathBuf::from("/opt/chromium/chrome"))
    );
}

#[tokio::test]
async fn test_explicit_path_beats_env_path() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "retry:\n  attempts: 4").unwrap();

    let loader = isolated(&[("TALLY_CONFIG", "/nonexistent/other.yaml")]);
    let config = loader.load(Some(file.path())).await.unwrap();
    assert_eq!(config.retry.attempts, 4);
}

#[tokio::test]
async fn test_search_paths_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loader = isolated(&[]).with_search_paths(vec![dir.path().join("tally.yaml")]);
    assert_eq!(loader.locate(None), None);
    assert_eq!(loader.load(None).await.unwrap().retry.attempts, 3);

    std::fs::write(dir.path().join("tally.yaml"), "poll:\n  max_polls: 9\n").unwrap();
    assert_eq!(loader.load(None).await.unwrap().poll.max_polls, 9);
}

#[tokio::test]
async fn test_bad_env_values_are_rejected() {
    let result = isolated(&[("TALLY_VISIBLE", "sometimes")]).load(None).await;
    assert!(matches!(
        result,
        Err(ConfigError::Env { var: "TALLY_VISIBLE", .. })
    ));

    let result = isolated(&[("TALLY_RETRY_ATTEMPTS", "many")]).load(None).await;
    assert!(matches!(result, Err(ConfigError::Env { .. })));
}

#[tokio::test]
async fn test_reports_tab_is_not_a_request_tab() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "report:\n  tab: Reports").unwrap();

    let result = isolated(&[]).load(Some(file.path())).await;
    assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("Reports")));
}
