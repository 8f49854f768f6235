//! The Chromium process, its CDP event loop and the one page the portal drives.

use crate::portal::HeadlessOptions;
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tally_engine::portal::PortalError;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Name prefix of throwaway profile directories.
pub const PROFILE_PREFIX: &str = "tally-chromium-profile-";

/// Chromium's profile directory for one session.
#[derive(Debug)]
pub enum ProfileDir {
    /// Configured by the user; kept between runs.
    Persistent(PathBuf),
    /// Created for this session and deleted when dropped.
    Throwaway(TempDir),
}

impl ProfileDir {
    /// The configured directory, or a throwaway one under the system temp dir.
    pub fn resolve(configured: Option<&Path>) -> Result<Self, PortalError> {
        match configured {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                info!("Using browser profile {}", dir.display());
                Ok(ProfileDir::Persistent(dir.to_path_buf()))
            }
            None => Self::throwaway_in(&std::env::temp_dir()),
        }
    }

    pub fn throwaway_in(parent: &Path) -> Result<Self, PortalError> {
        let dir = tempfile::Builder::new()
            .prefix(PROFILE_PREFIX)
            .tempdir_in(parent)?;
        debug!("Using throwaway browser profile {}", dir.path().display());
        Ok(ProfileDir::Throwaway(dir))
    }

    pub fn path(&self) -> &Path {
        match self {
            ProfileDir::Persistent(path) => path,
            ProfileDir::Throwaway(dir) => dir.path(),
        }
    }
}

pub struct CdpClient {
    browser: Browser,
    pub page: Page,
    events: JoinHandle<()>,
    // Last, so the directory goes only after the browser is dropped.
    profile: ProfileDir,
}

impl CdpClient {
    pub async fn launch(options: &HeadlessOptions) -> Result<Self, PortalError> {
        let profile = ProfileDir::resolve(options.user_data_dir.as_deref())?;
        Self::launch_with_profile(options, profile).await
    }

    /// Start Chromium on `profile`. Any failure drops the profile with it.
    pub async fn launch_with_profile(
        options: &HeadlessOptions,
        profile: ProfileDir,
    ) -> Result<Self, PortalError> {
        let browser_config = chrome_config(options, profile.path())?;
        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PortalError::Other(format!("Failed to launch browser: {}", e)))?;
        let events = drive_events(handler);

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(PortalError::Other(format!("Failed to open page: {}", e)));
            }
        };
        accept_dialogs(&page).await?;

        if options.network_log {
            if let Err(e) = crate::network::enable_network_logging(&page).await {
                warn!("Failed to enable network logging: {}", e);
            }
        }

        Ok(Self {
            browser,
            page,
            events,
            profile,
        })
    }

    /// Shut Chromium down. The throwaway profile is removed whatever the outcome.
    pub async fn close(self) -> Result<(), PortalError> {
        let CdpClient {
            mut browser,
            page,
            events,
            profile,
        } = self;
        drop(page);

        let closed = browser.close().await;
        match &closed {
            Ok(_) => {
                if let Err(e) = events.await {
                    warn!("Browser event loop ended abnormally: {}", e);
                }
            }
            Err(_) => events.abort(),
        }
        drop(browser);
        drop(profile);

        closed
            .map(|_| ())
            .map_err(|e| PortalError::Other(format!("Error closing browser: {}", e)))
    }
}

fn chrome_config(options: &HeadlessOptions, profile: &Path) -> Result<BrowserConfig, PortalError> {
    // Navigation waits ride on the CDP request timeout; keep it above both action waits.
    let command_timeout = options.action_timeout.max(options.quiescence_timeout);
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .user_data_dir(profile)
        .request_timeout(command_timeout);

    if options.visible {
        info!("Launching browser in visible mode");
        builder = builder.with_head();
    } else {
        info!("Launching browser in headless mode");
    }
    if let Some(chrome) = &options.chrome_path {
        info!("Using Chromium at {}", chrome.display());
        builder = builder.chrome_executable(chrome);
    }

    builder
        .build()
        .map_err(|e| PortalError::Other(format!("Invalid browser config: {}", e)))
}

fn drive_events(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                error!("Browser handler error (ignoring): {}", e);
            }
        }
        debug!("Browser event loop ended");
    })
}

/// The portal confirms some actions with alert() boxes; accept every one.
async fn accept_dialogs(page: &Page) -> Result<(), PortalError> {
    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| PortalError::Other(format!("Failed to watch dialogs: {}", e)))?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(dialog) = dialogs.next().await {
            info!("Accepting {:?} dialog: {}", dialog.r#type, dialog.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                error!("Failed to accept dialog: {}", e);
            }
        }
    });
    Ok(())
}
