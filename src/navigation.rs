//! Navigation and settle detection
//!
//! Drives the session to a target URL and decides when the page has settled
//! enough for the next assertion to be meaningful. The target application is
//! hash-routed, so route and query encoding must match its router exactly or
//! navigation silently lands on the wrong logical route.

use crate::error::{Error, NavigationError, Result};
use crate::session::Session;
use crate::wait::{poll_until, WaitCondition, Waiter};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A navigation destination: base URL, optional hash route, query flags.
///
/// Query parameters attach to the hash fragment when a route is present
/// (`/#/login?bypass=true`), matching the application's HashRouter. With no
/// route they form an ordinary query string.
#[derive(Debug, Clone)]
pub struct NavigationTarget {
    base: String,
    route: Option<String>,
    query: Vec<(String, String)>,
}

impl NavigationTarget {
    /// Create a target for the application base URL
    pub fn base<S: Into<String>>(base: S) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            base,
            route: None,
            query: Vec::new(),
        }
    }

    /// Set the hash route, e.g. `/login` or `/settings`
    pub fn route<S: Into<String>>(mut self, route: S) -> Self {
        let route = route.into();
        self.route = Some(if route.starts_with('/') {
            route
        } else {
            format!("/{route}")
        });
        self
    }

    /// Append a query parameter, e.g. a feature flag like `bypass=true`
    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Render the full URL
    pub fn url(&self) -> String {
        let mut url = self.base.clone();
        if let Some(ref route) = self.route {
            url.push_str("/#");
            url.push_str(route);
        }
        if !self.query.is_empty() {
            url.push('?');
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            url.push_str(&pairs.join("&"));
        }
        url
    }

    /// Validate the base URL
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base)
            .map_err(|e| NavigationError::InvalidTarget(format!("{}: {e}", self.base)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(NavigationError::InvalidTarget(format!(
                "unsupported scheme {other:?} in {}",
                self.base
            ))
            .into()),
        }
    }
}

/// How to decide a page has settled after navigation.
///
/// A known marker is preferred over the idle heuristic: network-idle style
/// detection is unreliable against applications with long-polling or
/// background requests.
#[derive(Debug, Clone)]
pub enum SettlePolicy {
    /// Wait until `document.readyState` is complete and the resource entry
    /// count has been stable for a quiet window, bounded by `timeout`.
    ///
    /// On timeout this warns and proceeds: it is a readiness heuristic, not
    /// an assertion.
    NetworkIdle {
        /// Quiet window with no new resource entries
        quiet: Duration,
        /// Overall bound
        timeout: Duration,
    },
    /// Delegate to the condition waiter for a known post-load marker.
    /// Deterministic; timeout propagates as an error.
    Marker {
        /// Condition that marks the page as settled
        condition: WaitCondition,
        /// Overall bound
        timeout: Duration,
    },
    /// Fixed-duration pause. Degraded fallback only: it both under-waits
    /// and over-waits relative to actual state changes.
    Pause(Duration),
}

impl SettlePolicy {
    /// Idle-based settling with default quiet window and bound
    pub fn network_idle() -> Self {
        SettlePolicy::NetworkIdle {
            quiet: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }

    /// Marker-based settling with the given condition and bound
    pub fn marker(condition: WaitCondition, timeout: Duration) -> Self {
        SettlePolicy::Marker { condition, timeout }
    }
}

/// Page navigator
pub struct Navigator;

impl Navigator {
    /// Navigate the session to `target` and return the post-navigation URL.
    ///
    /// Storage seeds from the session config are applied after the first
    /// navigation, once an origin exists.
    #[instrument(skip(session, target), fields(url = %target.url()))]
    pub async fn goto(session: &Session, target: &NavigationTarget) -> Result<String> {
        target.validate()?;
        let url = target.url();
        info!("Navigating to {url}");

        let timeout = Duration::from_millis(session.config().nav_timeout_ms);
        tokio::time::timeout(timeout, session.page().goto(url.as_str()))
            .await
            .map_err(|_| NavigationError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| NavigationError::LoadFailed(e.to_string()))?;

        session.apply_storage_seeds().await?;

        let landed = session.current_url().await?;
        debug!("Navigation complete: {url} -> {landed}");
        Ok(landed)
    }

    /// Wait for the page to settle according to `policy`
    #[instrument(skip(session, policy))]
    pub async fn settle(session: &Session, policy: &SettlePolicy) -> Result<()> {
        match policy {
            SettlePolicy::NetworkIdle { quiet, timeout } => {
                Self::settle_idle(session, *quiet, *timeout).await
            }
            SettlePolicy::Marker { condition, timeout } => {
                Waiter::wait_for(session.page(), condition, *timeout).await
            }
            SettlePolicy::Pause(duration) => {
                warn!(
                    "Settling with a fixed {}ms pause; prefer a marker condition",
                    duration.as_millis()
                );
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }

    /// Reload the current page
    #[instrument(skip(session))]
    pub async fn reload(session: &Session) -> Result<()> {
        session
            .page()
            .reload()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }

    /// Idle heuristic: readyState complete, then no new resource entries
    /// across one quiet window.
    async fn settle_idle(session: &Session, quiet: Duration, timeout: Duration) -> Result<()> {
        let page = session.page();
        let settled = poll_until(quiet, timeout, || async move {
            let before = Self::resource_count(page).await;
            if !Self::ready(page).await {
                return Ok(false);
            }
            tokio::time::sleep(quiet).await;
            let after = Self::resource_count(page).await;
            Ok(Self::ready(page).await && before == after)
        })
        .await?;

        if !settled {
            warn!(
                "Network idle not reached within {}ms, proceeding",
                timeout.as_millis()
            );
        }
        Ok(())
    }

    async fn ready(page: &chromiumoxide::Page) -> bool {
        page.evaluate("document.readyState === 'complete'")
            .await
            .ok()
            .and_then(|v| v.into_value::<bool>().ok())
            .unwrap_or(false)
    }

    async fn resource_count(page: &chromiumoxide::Page) -> u64 {
        page.evaluate("performance.getEntriesByType('resource').length")
            .await
            .ok()
            .and_then(|v| v.into_value::<u64>().ok())
            .unwrap_or(0)
    }
}
