//! Browser session lifecycle
//!
//! One session = one browser instance + one page, scoped to exactly one
//! scenario run. Sessions are never pooled or shared: cross-scenario state
//! (shared login, shared storage) is a known source of flakiness, so each
//! scenario pays the launch cost for a clean slate.

use crate::error::{Error, Result, SessionError};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// iOS Safari user agent used for iPhone emulation
const IPHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Viewport and emulation profile for a session.
///
/// Replaces the ambient device tables of the original scripts: the profile is
/// explicit configuration passed into session acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceProfile {
    /// Desktop viewport with explicit dimensions
    Desktop {
        /// Viewport width in CSS pixels
        width: u32,
        /// Viewport height in CSS pixels
        height: u32,
    },
    /// Generic mobile phone (375x812), mobile emulation + touch
    Phone,
    /// iPhone 14 Pro (393x852, scale factor 3), for safe-area-inset layouts
    IPhone14Pro,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceProfile::Desktop {
            width: 1920,
            height: 1080,
        }
    }
}

impl DeviceProfile {
    /// Viewport dimensions for this profile
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DeviceProfile::Desktop { width, height } => (*width, *height),
            DeviceProfile::Phone => (375, 812),
            DeviceProfile::IPhone14Pro => (393, 852),
        }
    }

    /// Whether this profile emulates a mobile device
    pub fn is_mobile(&self) -> bool {
        !matches!(self, DeviceProfile::Desktop { .. })
    }

    /// Device scale factor, if overridden by the profile
    pub fn scale_factor(&self) -> Option<f64> {
        match self {
            DeviceProfile::Desktop { .. } => None,
            DeviceProfile::Phone => Some(2.0),
            DeviceProfile::IPhone14Pro => Some(3.0),
        }
    }

    /// User agent override, if the profile carries one
    pub fn user_agent(&self) -> Option<&'static str> {
        match self {
            DeviceProfile::Desktop { .. } => None,
            DeviceProfile::Phone | DeviceProfile::IPhone14Pro => Some(IPHONE_USER_AGENT),
        }
    }
}

/// Which web storage area a seed is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorageArea {
    /// `window.localStorage`
    Local,
    /// `window.sessionStorage`
    Session,
}

impl StorageArea {
    fn js_object(&self) -> &'static str {
        match self {
            StorageArea::Local => "localStorage",
            StorageArea::Session => "sessionStorage",
        }
    }
}

/// A key/value pair seeded into web storage after the first navigation.
///
/// Storage is origin-scoped, so seeds cannot be applied before the page has
/// landed on the target application.
#[derive(Debug, Clone, Serialize)]
pub struct StorageSeed {
    /// Target storage area
    pub area: StorageArea,
    /// Storage key
    pub key: String,
    /// Stored value
    pub value: String,
}

impl StorageSeed {
    /// Seed a `sessionStorage` entry
    pub fn session<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            area: StorageArea::Session,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Seed a `localStorage` entry
    pub fn local<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            area: StorageArea::Local,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Configuration for session acquisition
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Viewport/emulation profile (default: 1920x1080 desktop)
    pub device: DeviceProfile,
    /// Enable the Chromium sandbox (default: true)
    pub sandbox: bool,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Storage entries applied after the first navigation
    pub storage_seeds: Vec<StorageSeed>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
    /// Navigation timeout in milliseconds (default: 30000)
    pub nav_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            device: DeviceProfile::default(),
            sandbox: true,
            chrome_path: None,
            storage_seeds: Vec::new(),
            extra_args: Vec::new(),
            nav_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    /// Create a new config builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for [`SessionConfig`]
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set the device/viewport profile
    pub fn device(mut self, device: DeviceProfile) -> Self {
        self.config.device = device;
        self
    }

    /// Enable/disable the Chromium sandbox
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    /// Set the Chrome executable path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Add a storage seed
    pub fn seed(mut self, seed: StorageSeed) -> Self {
        self.config.storage_seeds.push(seed);
        self
    }

    /// Add an extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Set the navigation timeout
    pub fn nav_timeout_ms(mut self, ms: u64) -> Self {
        self.config.nav_timeout_ms = ms;
        self
    }

    /// Build the config
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// An acquired browser session: one browser, one page, one scenario run.
pub struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    config: SessionConfig,
    seeded: AtomicBool,
}

impl Session {
    /// Launch the browser and create the scenario page.
    ///
    /// Launch failure is fatal for the scenario: it indicates environment
    /// misconfiguration (no Chrome, bad path), not transient state, and is
    /// never retried.
    #[instrument(skip(config), fields(device = ?config.device))]
    pub async fn acquire(config: SessionConfig) -> Result<Self> {
        info!(
            "Launching browser: headless={}, device={:?}",
            config.headless, config.device
        );

        let (width, height) = config.device.dimensions();
        let mut builder = CdpBrowserConfig::builder().viewport(
            chromiumoxide::handler::viewport::Viewport {
                width,
                height,
                device_scale_factor: config.device.scale_factor(),
                emulating_mobile: config.device.is_mobile(),
                is_landscape: !config.device.is_mobile(),
                has_touch: config.device.is_mobile(),
            },
        );

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.arg("--no-sandbox");
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(SessionError::ConfigError)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::PageCreationFailed(e.to_string()))?;

        if let Some(ua) = config.device.user_agent() {
            page.set_user_agent(ua)
                .await
                .map_err(|e| SessionError::PageCreationFailed(e.to_string()))?;
        }

        info!("Browser launched");

        Ok(Self {
            browser,
            handler: handler_task,
            page,
            config,
            seeded: AtomicBool::new(false),
        })
    }

    /// The single page driven by this session
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// The session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current page URL, as reported by the browser
    pub async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?
            .unwrap_or_default())
    }

    /// Apply configured storage seeds. Idempotent: runs once per session,
    /// after the first navigation has established an origin.
    pub(crate) async fn apply_storage_seeds(&self) -> Result<()> {
        if self.config.storage_seeds.is_empty() || self.seeded.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for seed in &self.config.storage_seeds {
            let script = format!(
                "{}.setItem({}, {})",
                seed.area.js_object(),
                crate::wait::js_string(&seed.key),
                crate::wait::js_string(&seed.value),
            );
            self.page
                .evaluate(script.as_str())
                .await
                .map_err(|e| Error::cdp(e.to_string()))?;
            debug!("Seeded {:?} storage: {}", seed.area, seed.key);
        }
        Ok(())
    }

    /// Close the browser and join the handler task.
    ///
    /// Called exactly once per scenario run, on every terminal path. The
    /// browser process is also killed on drop as a backstop, but an explicit
    /// release gives an orderly shutdown.
    #[instrument(skip(self))]
    pub async fn release(mut self) -> Result<()> {
        info!("Releasing session");

        self.browser
            .close()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;

        let _ = tokio::time::timeout(Duration::from_secs(5), self.handler).await;

        info!("Session released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert!(config.headless);
        assert!(config.sandbox);
        assert_eq!(config.device, DeviceProfile::default());
        assert!(config.storage_seeds.is_empty());
        assert_eq!(config.nav_timeout_ms, 30_000);
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::builder()
            .headless(false)
            .device(DeviceProfile::Phone)
            .sandbox(false)
            .chrome_path("/usr/bin/chromium")
            .seed(StorageSeed::session("LIFEBALANCE_TEST_MODE", "true"))
            .arg("--disable-gpu")
            .nav_timeout_ms(60_000)
            .build();

        assert!(!config.headless);
        assert_eq!(config.device, DeviceProfile::Phone);
        assert!(!config.sandbox);
        assert_eq!(config.chrome_path, Some("/usr/bin/chromium".to_string()));
        assert_eq!(config.storage_seeds.len(), 1);
        assert_eq!(config.extra_args, vec!["--disable-gpu"]);
        assert_eq!(config.nav_timeout_ms, 60_000);
    }

    #[test]
    fn test_device_profile_dimensions() {
        assert_eq!(DeviceProfile::default().dimensions(), (1920, 1080));
        assert_eq!(DeviceProfile::Phone.dimensions(), (375, 812));
        assert_eq!(DeviceProfile::IPhone14Pro.dimensions(), (393, 852));
        assert_eq!(
            DeviceProfile::Desktop {
                width: 1280,
                height: 800
            }
            .dimensions(),
            (1280, 800)
        );
    }

    #[test]
    fn test_device_profile_emulation() {
        assert!(!DeviceProfile::default().is_mobile());
        assert!(DeviceProfile::Phone.is_mobile());
        assert!(DeviceProfile::IPhone14Pro.is_mobile());

        assert!(DeviceProfile::default().user_agent().is_none());
        assert!(DeviceProfile::IPhone14Pro
            .user_agent()
            .unwrap()
            .contains("iPhone"));

        assert_eq!(DeviceProfile::IPhone14Pro.scale_factor(), Some(3.0));
        assert_eq!(DeviceProfile::default().scale_factor(), None);
    }

    #[test]
    fn test_storage_seed_constructors() {
        let seed = StorageSeed::session("LIFEBALANCE_TEST_MODE", "true");
        assert_eq!(seed.area, StorageArea::Session);
        assert_eq!(seed.key, "LIFEBALANCE_TEST_MODE");
        assert_eq!(seed.value, "true");

        let seed = StorageSeed::local("theme", "dark");
        assert_eq!(seed.area, StorageArea::Local);
    }

    #[test]
    fn test_storage_area_js_object() {
        assert_eq!(StorageArea::Local.js_object(), "localStorage");
        assert_eq!(StorageArea::Session.js_object(), "sessionStorage");
    }
}
