//! Bounded condition waiting
//!
//! The central primitive every scenario composes: poll a page-state predicate
//! at a short fixed interval until it holds or a timeout elapses. This
//! replaces the fixed-duration sleeps of ad hoc verification scripts. The
//! contract is "block until observable state satisfies the predicate, bounded
//! by T", never "block for D seconds and hope".

use crate::error::{Result, WaitError};
use chromiumoxide::Page;
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, trace};

/// Default polling interval for condition evaluation
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default timeout for wait operations
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// JavaScript fragment defining `__lbvVisible(el)`, the visibility check
/// shared by DOM predicates and selector resolution.
pub(crate) const IS_VISIBLE_FN: &str = r#"
    const __lbvVisible = (el) => {
        if (!el || !el.getBoundingClientRect) return false;
        const r = el.getBoundingClientRect();
        if (r.width <= 0 || r.height <= 0) return false;
        const s = window.getComputedStyle(el);
        return s.visibility !== 'hidden' && s.display !== 'none' && s.opacity !== '0';
    };
"#;

/// Encode a Rust string as a JavaScript string literal.
///
/// JSON string syntax is valid JavaScript, so this is a safe way to embed
/// arbitrary selector/text values in generated scripts.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// A pattern over the page URL
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// The URL equals this string exactly
    Exact(String),
    /// The URL ends with this suffix (e.g. `/login` for the auth redirect)
    EndsWith(String),
    /// The URL contains this substring
    Contains(String),
    /// The URL matches this regular expression
    Matches(Regex),
}

impl UrlPattern {
    /// Check whether a URL satisfies this pattern
    pub fn is_match(&self, url: &str) -> bool {
        match self {
            UrlPattern::Exact(s) => url == s,
            UrlPattern::EndsWith(s) => url.ends_with(s.as_str()),
            UrlPattern::Contains(s) => url.contains(s.as_str()),
            UrlPattern::Matches(re) => re.is_match(url),
        }
    }

    /// Human-readable description for logs and timeout errors
    pub fn describe(&self) -> String {
        match self {
            UrlPattern::Exact(s) => format!("url == {s:?}"),
            UrlPattern::EndsWith(s) => format!("url ends with {s:?}"),
            UrlPattern::Contains(s) => format!("url contains {s:?}"),
            UrlPattern::Matches(re) => format!("url matches /{}/", re.as_str()),
        }
    }
}

/// A predicate over page state, evaluated repeatedly until true or timeout
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// At least one element matching the CSS selector is visible
    ElementVisible {
        /// CSS selector to match
        selector: String,
    },
    /// The given text is visible somewhere on the page
    TextVisible {
        /// Text to look for
        text: String,
        /// Require the element's trimmed text to equal `text` exactly,
        /// rather than contain it
        exact: bool,
    },
    /// The page URL matches a pattern
    UrlMatches(UrlPattern),
    /// An element matching the selector carries the given attribute
    AttributePresent {
        /// CSS selector to match
        selector: String,
        /// Attribute that must be present
        attribute: String,
    },
}

impl WaitCondition {
    /// Wait for an element matching `selector` to be visible
    pub fn element_visible<S: Into<String>>(selector: S) -> Self {
        WaitCondition::ElementVisible {
            selector: selector.into(),
        }
    }

    /// Wait for `text` to be visible (substring match)
    pub fn text<S: Into<String>>(text: S) -> Self {
        WaitCondition::TextVisible {
            text: text.into(),
            exact: false,
        }
    }

    /// Wait for an element whose trimmed text equals `text` to be visible
    pub fn text_exact<S: Into<String>>(text: S) -> Self {
        WaitCondition::TextVisible {
            text: text.into(),
            exact: true,
        }
    }

    /// Wait for the page URL to match `pattern`
    pub fn url(pattern: UrlPattern) -> Self {
        WaitCondition::UrlMatches(pattern)
    }

    /// Wait for `attribute` to be present on an element matching `selector`
    pub fn attribute<S: Into<String>, A: Into<String>>(selector: S, attribute: A) -> Self {
        WaitCondition::AttributePresent {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }

    /// Human-readable description for logs and timeout errors
    pub fn describe(&self) -> String {
        match self {
            WaitCondition::ElementVisible { selector } => {
                format!("element {selector:?} visible")
            }
            WaitCondition::TextVisible { text, exact } => {
                if *exact {
                    format!("exact text {text:?} visible")
                } else {
                    format!("text {text:?} visible")
                }
            }
            WaitCondition::UrlMatches(pattern) => pattern.describe(),
            WaitCondition::AttributePresent {
                selector,
                attribute,
            } => format!("attribute {attribute:?} present on {selector:?}"),
        }
    }

    /// Compile the condition to a boolean JavaScript expression, or `None`
    /// when the condition is matched on the Rust side (URL patterns).
    pub(crate) fn js_predicate(&self) -> Option<String> {
        match self {
            WaitCondition::ElementVisible { selector } => Some(format!(
                r#"(() => {{
                    {IS_VISIBLE_FN}
                    return Array.from(document.querySelectorAll({sel})).some(__lbvVisible);
                }})()"#,
                sel = js_string(selector),
            )),
            WaitCondition::TextVisible { text, exact } => {
                let matcher = if *exact {
                    "el.textContent.trim() === needle"
                } else {
                    "el.textContent.includes(needle)"
                };
                // textContent includes hidden descendants, so narrow to the
                // innermost matching elements and require one of those to be
                // visible itself.
                Some(format!(
                    r#"(() => {{
                        {IS_VISIBLE_FN}
                        const needle = {needle};
                        if (!document.body) return false;
                        const all = Array.from(document.body.querySelectorAll('*'))
                            .filter((el) => {matcher});
                        return all
                            .filter((el) => !all.some((o) => o !== el && el.contains(o)))
                            .some(__lbvVisible);
                    }})()"#,
                    needle = js_string(text),
                ))
            }
            WaitCondition::UrlMatches(_) => None,
            WaitCondition::AttributePresent {
                selector,
                attribute,
            } => Some(format!(
                r#"(() => {{
                    const el = document.querySelector({sel});
                    return !!el && el.hasAttribute({attr});
                }})()"#,
                sel = js_string(selector),
                attr = js_string(attribute),
            )),
        }
    }
}

/// Poll an async probe at `interval` until it reports true or `timeout`
/// elapses.
///
/// Returns `Ok(true)` when the probe succeeded, `Ok(false)` on timeout, and
/// `Err` only when the probe itself fails. The probe is evaluated once
/// immediately, so a condition that already holds resolves without sleeping.
pub(crate) async fn poll_until<F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe().await? {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Condition waiter over a live page
pub struct Waiter;

impl Waiter {
    /// Wait for `condition` to hold, polling at the default interval.
    ///
    /// Timeout is terminal for the condition: the caller either propagates
    /// the error or maps it to a scenario outcome, it is never retried here.
    #[instrument(skip(page), fields(condition = %condition.describe()))]
    pub async fn wait_for(page: &Page, condition: &WaitCondition, timeout: Duration) -> Result<()> {
        Self::wait_for_with_interval(
            page,
            condition,
            timeout,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
        .await
    }

    /// Wait for `condition` with an explicit polling interval
    pub async fn wait_for_with_interval(
        page: &Page,
        condition: &WaitCondition,
        timeout: Duration,
        interval: Duration,
    ) -> Result<()> {
        debug!(
            "Waiting up to {}ms for {}",
            timeout.as_millis(),
            condition.describe()
        );

        let satisfied = poll_until(interval, timeout, || Self::evaluate(page, condition)).await?;

        if satisfied {
            debug!("Condition satisfied: {}", condition.describe());
            Ok(())
        } else {
            Err(WaitError::Timeout {
                condition: condition.describe(),
                timeout_ms: timeout.as_millis() as u64,
            }
            .into())
        }
    }

    /// Evaluate the condition once.
    ///
    /// Evaluation failures count as "not yet": while a navigation or redirect
    /// is in flight the execution context can vanish mid-poll, and that must
    /// not surface as an engine error.
    async fn evaluate(page: &Page, condition: &WaitCondition) -> Result<bool> {
        match condition.js_predicate() {
            Some(script) => match page.evaluate(script.as_str()).await {
                Ok(value) => Ok(value.into_value::<bool>().unwrap_or(false)),
                Err(e) => {
                    trace!("Predicate evaluation not ready: {e}");
                    Ok(false)
                }
            },
            None => {
                let WaitCondition::UrlMatches(pattern) = condition else {
                    return Ok(false);
                };
                match page.url().await {
                    Ok(Some(url)) => Ok(pattern.is_match(&url)),
                    Ok(None) => Ok(false),
                    Err(e) => {
                        trace!("URL not readable yet: {e}");
                        Ok(false)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ========================================================================
    // UrlPattern Tests
    // ========================================================================

    #[test]
    fn test_url_pattern_exact() {
        let p = UrlPattern::Exact("http://localhost:3000/#/login".to_string());
        assert!(p.is_match("http://localhost:3000/#/login"));
        assert!(!p.is_match("http://localhost:3000/#/login?bypass=true"));
    }

    #[test]
    fn test_url_pattern_ends_with() {
        let p = UrlPattern::EndsWith("/login".to_string());
        assert!(p.is_match("http://localhost:3000/#/login"));
        assert!(p.is_match("http://localhost:3000/login"));
        assert!(!p.is_match("http://localhost:3000/#/login/reset"));
    }

    #[test]
    fn test_url_pattern_contains() {
        let p = UrlPattern::Contains("bypass=true".to_string());
        assert!(p.is_match("http://localhost:3000/#/login?bypass=true"));
        assert!(!p.is_match("http://localhost:3000/#/login"));
    }

    #[test]
    fn test_url_pattern_regex() {
        let p = UrlPattern::Matches(Regex::new(r"#/(login|signup)$").unwrap());
        assert!(p.is_match("http://localhost:3000/#/login"));
        assert!(p.is_match("http://localhost:3000/#/signup"));
        assert!(!p.is_match("http://localhost:3000/#/dashboard"));
    }

    #[test]
    fn test_url_pattern_describe() {
        assert_eq!(
            UrlPattern::EndsWith("/login".to_string()).describe(),
            "url ends with \"/login\""
        );
    }

    // ========================================================================
    // WaitCondition Tests
    // ========================================================================

    #[test]
    fn test_condition_constructors() {
        let c = WaitCondition::text("TEST MODE ENABLED");
        assert!(matches!(c, WaitCondition::TextVisible { exact: false, .. }));

        let c = WaitCondition::text_exact("Analytics");
        assert!(matches!(c, WaitCondition::TextVisible { exact: true, .. }));

        let c = WaitCondition::element_visible("header");
        assert!(matches!(c, WaitCondition::ElementVisible { .. }));
    }

    #[test]
    fn test_condition_describe() {
        assert_eq!(
            WaitCondition::element_visible("header").describe(),
            "element \"header\" visible"
        );
        assert_eq!(
            WaitCondition::text("Safe to Spend").describe(),
            "text \"Safe to Spend\" visible"
        );
        assert_eq!(
            WaitCondition::text_exact("Analytics").describe(),
            "exact text \"Analytics\" visible"
        );
    }

    #[test]
    fn test_js_predicate_element_visible() {
        let js = WaitCondition::element_visible("div[style*=\"safe-area-inset-top\"]")
            .js_predicate()
            .unwrap();
        assert!(js.contains("querySelectorAll"));
        assert!(js.contains("safe-area-inset-top"));
        assert!(js.contains("__lbvVisible"));
    }

    #[test]
    fn test_js_predicate_text_exact_vs_substring() {
        let exact = WaitCondition::text_exact("Analytics").js_predicate().unwrap();
        assert!(exact.contains("=== needle"));

        let sub = WaitCondition::text("Analytics").js_predicate().unwrap();
        assert!(sub.contains("includes(needle)"));
    }

    #[test]
    fn test_text_predicate_requires_innermost_match_visible() {
        // A visible container whose hidden child holds the text must not
        // satisfy the condition: the check narrows to innermost matches
        // before testing visibility.
        for condition in [
            WaitCondition::text("TEST MODE ENABLED"),
            WaitCondition::text_exact("TEST MODE ENABLED"),
        ] {
            let js = condition.js_predicate().unwrap();
            assert!(js.contains("el.contains(o)"));
            assert!(js.contains(".some(__lbvVisible)"));
        }
    }

    #[test]
    fn test_js_predicate_url_is_rust_side() {
        let c = WaitCondition::url(UrlPattern::EndsWith("/login".to_string()));
        assert!(c.js_predicate().is_none());
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("it's"), "\"it's\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
    }

    // ========================================================================
    // poll_until Timing Tests
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_immediate_success_does_not_sleep() {
        let start = tokio::time::Instant::now();
        let ok = poll_until(
            Duration::from_millis(250),
            Duration::from_secs(10),
            || async { Ok(true) },
        )
        .await
        .unwrap();
        assert!(ok);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_timeout_bounds() {
        // Condition never holds: must resolve no earlier than T and no later
        // than T + one interval.
        let interval = Duration::from_millis(250);
        let timeout = Duration::from_secs(10);
        let start = tokio::time::Instant::now();
        let ok = poll_until(interval, timeout, || async { Ok(false) })
            .await
            .unwrap();
        assert!(!ok);
        let elapsed = start.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed <= timeout + interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_succeeds_mid_way() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let ok = poll_until(
            Duration::from_millis(100),
            Duration::from_secs(5),
            || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 3) },
        )
        .await
        .unwrap();
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_propagates_probe_error() {
        let result = poll_until(
            Duration::from_millis(100),
            Duration::from_secs(5),
            || async { Err::<bool, _>(Error::cdp("connection lost")) },
        )
        .await;
        assert!(result.is_err());
    }
}
