//! Selector resolution with ordered fallback
//!
//! A semantic UI target ("the Analytics button") is described as an ordered
//! list of locating strategies. Accessible role/name comes first for
//! robustness to markup changes; attribute and class-based CSS lookups are
//! explicit, worse fallbacks kept only because parts of the application's
//! markup are not yet instrumented with stable accessible names.
//!
//! Resolution works by compiling each strategy to a JavaScript probe that
//! filters visible matches and tags the first one with a unique
//! `data-lbv-target` token; the element handle is then fetched by token so
//! interactions go through the engine's real input pipeline.

use crate::error::{Error, Result};
use crate::wait::{js_string, poll_until, DEFAULT_POLL_INTERVAL_MS, IS_VISIBLE_FN};
use chromiumoxide::Page;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

/// Attribute used to hand a matched element from the JS probe back to CDP
const MARKER_ATTR: &str = "data-lbv-target";

/// One strategy for locating a semantic UI target
#[derive(Debug, Clone)]
pub enum SelectorStrategy {
    /// Accessible role + name. The name is matched against `aria-label`,
    /// trimmed text content, or input value.
    Role {
        /// ARIA role (e.g. `button`, `link`)
        role: String,
        /// Accessible name to match
        name: String,
    },
    /// Exact `aria-label` attribute value
    AriaLabel(String),
    /// Exact attribute name/value pair
    Attribute {
        /// Attribute name
        name: String,
        /// Required attribute value
        value: String,
    },
    /// Visible text content
    Text {
        /// Text to match
        text: String,
        /// Require trimmed equality instead of substring
        exact: bool,
    },
    /// Raw CSS selector. Last resort: class-based selectors couple the
    /// scenario to presentation details.
    Css(String),
}

impl SelectorStrategy {
    /// Human-readable description for logs and reports
    pub fn describe(&self) -> String {
        match self {
            SelectorStrategy::Role { role, name } => format!("role={role} name={name:?}"),
            SelectorStrategy::AriaLabel(label) => format!("aria-label={label:?}"),
            SelectorStrategy::Attribute { name, value } => format!("[{name}={value:?}]"),
            SelectorStrategy::Text { text, exact } => {
                if *exact {
                    format!("exact text {text:?}")
                } else {
                    format!("text {text:?}")
                }
            }
            SelectorStrategy::Css(css) => format!("css {css:?}"),
        }
    }

    /// Elements considered for a given ARIA role, beyond `[role=...]`
    fn role_selector(role: &str) -> String {
        match role {
            "button" => {
                "button, [role=\"button\"], input[type=\"button\"], input[type=\"submit\"]"
                    .to_string()
            }
            "link" => "a[href], [role=\"link\"]".to_string(),
            "textbox" => "input, textarea, [role=\"textbox\"]".to_string(),
            other => format!("[role={}]", js_string(other)),
        }
    }

    /// Compile this strategy to a JS probe that tags the first visible match
    /// with `token` and returns whether a match was found.
    pub(crate) fn probe_js(&self, token: &str) -> String {
        let collector = match self {
            SelectorStrategy::Role { role, name } => format!(
                r#"Array.from(document.querySelectorAll({sel})).filter((el) => {{
                    const needle = {name};
                    const label = el.getAttribute('aria-label');
                    if (label && label.trim() === needle) return true;
                    if (el.textContent && el.textContent.trim() === needle) return true;
                    return el.value !== undefined && String(el.value).trim() === needle;
                }})"#,
                sel = js_string(&Self::role_selector(role)),
                name = js_string(name),
            ),
            SelectorStrategy::AriaLabel(label) => format!(
                "Array.from(document.querySelectorAll('[aria-label=' + JSON.stringify({label}) + ']'))",
                label = js_string(label),
            ),
            SelectorStrategy::Attribute { name, value } => format!(
                "Array.from(document.querySelectorAll('[' + {name} + '=' + JSON.stringify({value}) + ']'))",
                name = js_string(name),
                value = js_string(value),
            ),
            SelectorStrategy::Text { text, exact } => {
                let matcher = if *exact {
                    "el.textContent && el.textContent.trim() === needle"
                } else {
                    "el.textContent && el.textContent.includes(needle)"
                };
                // Keep only innermost matches so a click lands on the actual
                // control, not an ancestor container.
                format!(
                    r#"(() => {{
                        const needle = {needle};
                        const all = Array.from(document.body ? document.body.querySelectorAll('*') : [])
                            .filter((el) => {matcher});
                        return all.filter((el) => !all.some((o) => o !== el && el.contains(o)));
                    }})()"#,
                    needle = js_string(text),
                )
            }
            SelectorStrategy::Css(css) => format!(
                "Array.from(document.querySelectorAll({sel}))",
                sel = js_string(css),
            ),
        };

        format!(
            r#"(() => {{
                {IS_VISIBLE_FN}
                const candidates = ({collector}).filter(__lbvVisible);
                if (candidates.length === 0) return false;
                candidates[0].setAttribute({attr}, {token});
                return true;
            }})()"#,
            attr = js_string(MARKER_ATTR),
            token = js_string(token),
        )
    }
}

/// A semantic UI target: description plus ordered strategy candidates.
///
/// List order is trial order; the first strategy with a visible match wins.
#[derive(Debug, Clone)]
pub struct UiTarget {
    /// What this target is, for logs and NotFound reports
    pub description: String,
    /// Ordered locating strategies
    pub candidates: Vec<SelectorStrategy>,
}

impl UiTarget {
    /// Create an empty target description
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
            candidates: Vec::new(),
        }
    }

    /// Add a role+name candidate
    pub fn role<R: Into<String>, N: Into<String>>(mut self, role: R, name: N) -> Self {
        self.candidates.push(SelectorStrategy::Role {
            role: role.into(),
            name: name.into(),
        });
        self
    }

    /// Add an aria-label candidate
    pub fn aria_label<S: Into<String>>(mut self, label: S) -> Self {
        self.candidates.push(SelectorStrategy::AriaLabel(label.into()));
        self
    }

    /// Add an attribute candidate
    pub fn attribute<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.candidates.push(SelectorStrategy::Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a visible-text candidate (substring match)
    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.candidates.push(SelectorStrategy::Text {
            text: text.into(),
            exact: false,
        });
        self
    }

    /// Add a CSS selector candidate
    pub fn css<S: Into<String>>(mut self, css: S) -> Self {
        self.candidates.push(SelectorStrategy::Css(css.into()));
        self
    }
}

/// A resolved, visible element handle
pub struct ResolvedElement {
    element: chromiumoxide::Element,
    /// Index of the winning strategy in the candidate list
    pub strategy_index: usize,
    /// Description of the winning strategy
    pub strategy: String,
}

impl ResolvedElement {
    /// Click the element
    pub async fn click(&self) -> Result<()> {
        self.element
            .click()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }

    /// Focus the element
    pub async fn focus(&self) -> Result<()> {
        self.element
            .focus()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }

    /// Click the element and type text into it
    pub async fn fill(&self, text: &str) -> Result<()> {
        self.element
            .click()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        self.element
            .type_str(text)
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }

    /// Scroll the element into view
    pub async fn scroll_into_view(&self) -> Result<()> {
        self.element
            .scroll_into_view()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }
}

/// Outcome of a resolution attempt.
///
/// `NotFound` is a legitimate scenario outcome (e.g. a feature gated behind
/// auth), distinct from an engine-level error.
pub enum Resolution {
    /// A candidate strategy produced a visible match
    Found(ResolvedElement),
    /// Every candidate strategy failed
    NotFound,
}

impl Resolution {
    /// Whether a match was found
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// Try `count` candidates in order against an async probe; short-circuits on
/// the first hit. Split out from [`Resolver`] so the ordering contract is
/// testable without a browser.
pub(crate) async fn first_match<H, F, Fut>(count: usize, mut probe: F) -> Result<Option<(usize, H)>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Option<H>>>,
{
    for index in 0..count {
        if let Some(hit) = probe(index).await? {
            return Ok(Some((index, hit)));
        }
    }
    Ok(None)
}

/// Selector resolver over a live page
pub struct Resolver;

impl Resolver {
    /// Run one pass over the target's candidates, in order.
    #[instrument(skip(page, target), fields(target = %target.description))]
    pub async fn resolve(page: &Page, target: &UiTarget) -> Result<Resolution> {
        let hit = first_match(target.candidates.len(), |index| {
            Self::try_strategy(page, &target.candidates[index], index)
        })
        .await?;

        match hit {
            Some((index, element)) => {
                let strategy = target.candidates[index].describe();
                debug!("Resolved {:?} via {}", target.description, strategy);
                Ok(Resolution::Found(ResolvedElement {
                    element,
                    strategy_index: index,
                    strategy,
                }))
            }
            None => {
                debug!("No candidate matched for {:?}", target.description);
                Ok(Resolution::NotFound)
            }
        }
    }

    /// Poll the whole candidate list until a match appears or `timeout`
    /// elapses. Timeout resolves as `NotFound`, not as an error.
    #[instrument(skip(page, target), fields(target = %target.description))]
    pub async fn resolve_within(
        page: &Page,
        target: &UiTarget,
        timeout: Duration,
    ) -> Result<Resolution> {
        let mut found: Option<ResolvedElement> = None;
        let satisfied = poll_until(
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout,
            || async move {
                Ok(matches!(Self::resolve(page, target).await?, Resolution::Found(_)))
            },
        )
        .await?;

        // Re-resolve once after the poll hit so the returned handle is fresh.
        if satisfied {
            if let Resolution::Found(element) = Self::resolve(page, target).await? {
                found = Some(element);
            }
        }

        Ok(match found {
            Some(element) => Resolution::Found(element),
            None => Resolution::NotFound,
        })
    }

    /// Describe all elements matching a CSS selector, for NotFound diagnosis.
    ///
    /// Returns one line per element: tag, id/class, and a style excerpt.
    pub async fn describe_matches(page: &Page, css: &str) -> Result<Vec<String>> {
        let script = format!(
            r#"(() => {{
                return Array.from(document.querySelectorAll({sel})).slice(0, 50).map((el) => {{
                    const id = el.id ? '#' + el.id : '';
                    const cls = el.className && el.className.baseVal === undefined
                        ? '.' + String(el.className).trim().split(/\s+/).join('.')
                        : '';
                    const style = el.getAttribute('style') || '';
                    return el.tagName.toLowerCase() + id + cls + (style ? ' style=' + style : '');
                }});
            }})()"#,
            sel = js_string(css),
        );

        let value = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(value.into_value::<Vec<String>>().unwrap_or_default())
    }

    /// Evaluate a single strategy: tag a visible match, then fetch its handle.
    async fn try_strategy(
        page: &Page,
        strategy: &SelectorStrategy,
        index: usize,
    ) -> Result<Option<chromiumoxide::Element>> {
        let token = Uuid::new_v4().simple().to_string();
        let script = strategy.probe_js(&token);

        let matched = match page.evaluate(script.as_str()).await {
            Ok(value) => value.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                trace!("Strategy {} probe not ready: {e}", strategy.describe());
                false
            }
        };
        if !matched {
            trace!("Candidate {index} missed: {}", strategy.describe());
            return Ok(None);
        }

        let element = page
            .find_element(format!("[{MARKER_ATTR}=\"{token}\"]"))
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(Some(element))
    }
}
