//! Scenario orchestration
//!
//! A scenario is a finite step sequence (navigate, settle, resolve,
//! interact, wait, capture) ending in exactly one named terminal outcome.
//! Every terminal path captures diagnostics before the session is released,
//! and release happens exactly once regardless of how the run ends.
//!
//! State machine:
//!
//! ```text
//! Start -> Navigating -> Settling -> Resolving -> Interacting -> Waiting -> Capturing
//!     -> { Success | Blocked | Timeout | NotFound | Error }
//! ```

use crate::capture::{LogSink, Recorder};
use crate::error::{Error, Result, WaitError};
use crate::navigation::{NavigationTarget, Navigator, SettlePolicy};
use crate::selector::{Resolution, Resolver, UiTarget};
use crate::session::{DeviceProfile, Session, SessionConfig};
use crate::wait::{UrlPattern, WaitCondition, Waiter};
use chrono::{DateTime, Utc};
use clap::Parser;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Exit code for a fatal environment failure (browser launch)
pub const EXIT_LAUNCH_FAILURE: i32 = 2;

/// The step a scenario is currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Before the first navigation
    Start,
    /// Driving the page to a target URL
    Navigating,
    /// Waiting for the page to settle
    Settling,
    /// Resolving a semantic UI target
    Resolving,
    /// Clicking/focusing/filling a resolved element
    Interacting,
    /// Waiting for a state-change condition
    Waiting,
    /// Capturing artifacts
    Capturing,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Start => "start",
            Step::Navigating => "navigating",
            Step::Settling => "settling",
            Step::Resolving => "resolving",
            Step::Interacting => "interacting",
            Step::Waiting => "waiting",
            Step::Capturing => "capturing",
        };
        write!(f, "{name}")
    }
}

/// The single terminal outcome of a scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ScenarioOutcome {
    /// The behavior under test was verified
    Success,
    /// The application redirected away from the intended flow (e.g. to the
    /// login route) before the behavior could be exercised. Not a failure.
    Blocked {
        /// What blocked the flow
        reason: String,
    },
    /// A wait condition never became true within its bound
    Timeout {
        /// The condition that timed out
        condition: String,
    },
    /// Every selector candidate for a target failed
    NotFound {
        /// The target that could not be resolved
        target: String,
    },
    /// An engine-level error not covered above
    Error {
        /// Error description
        message: String,
    },
}

impl ScenarioOutcome {
    /// Screenshot label for this outcome's terminal capture
    fn capture_label(&self) -> &'static str {
        match self {
            ScenarioOutcome::Success => "success",
            ScenarioOutcome::Blocked { .. } => "blocked",
            ScenarioOutcome::Timeout { .. } => "error",
            ScenarioOutcome::NotFound { .. } => "debug",
            ScenarioOutcome::Error { .. } => "error",
        }
    }

    /// Short tag for logs
    pub fn tag(&self) -> &'static str {
        match self {
            ScenarioOutcome::Success => "success",
            ScenarioOutcome::Blocked { .. } => "blocked",
            ScenarioOutcome::Timeout { .. } => "timeout",
            ScenarioOutcome::NotFound { .. } => "not-found",
            ScenarioOutcome::Error { .. } => "error",
        }
    }
}

/// Whether a blocked-by-redirect outcome fails the run.
///
/// The original scripts were inconsistent about this; it is an explicit
/// configuration choice here, never inferred per scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockedPolicy {
    /// Blocked is acceptable: report it, exit 0
    #[default]
    Tolerate,
    /// Blocked fails the run: exit 1
    Fail,
}

/// Map an error from scenario steps to its terminal outcome
pub(crate) fn outcome_from_error(err: &Error) -> ScenarioOutcome {
    match err {
        Error::Wait(WaitError::Timeout { condition, .. }) => ScenarioOutcome::Timeout {
            condition: condition.clone(),
        },
        other => ScenarioOutcome::Error {
            message: other.to_string(),
        },
    }
}

/// Terminal sequence shared by every run: map a step error to its outcome,
/// capture evidence unless the success path already left some, then release
/// the session. Both hooks are `FnOnce`, so capture and release each run at
/// most once, and release runs unconditionally, even when capture fails.
/// Split out from [`Scenario::finish`] so the ordering contract is testable
/// without a browser.
pub(crate) async fn terminate<C, Cf, R, Rf>(
    scenario: &str,
    step: Step,
    outcome: Result<ScenarioOutcome>,
    has_artifacts: bool,
    capture: C,
    release: R,
) -> ScenarioOutcome
where
    C: FnOnce(&'static str) -> Cf,
    Cf: Future<Output = Result<()>>,
    R: FnOnce() -> Rf,
    Rf: Future<Output = Result<()>>,
{
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Scenario {scenario} failed at step {step}: {err}");
            outcome_from_error(&err)
        }
    };

    // The success path usually captured its own evidence already; only
    // capture here if it did not.
    let needs_capture = !matches!(outcome, ScenarioOutcome::Success) || !has_artifacts;
    if needs_capture {
        if let Err(e) = capture(outcome.capture_label()).await {
            warn!("Terminal screenshot failed: {e}");
        }
    }

    if let Err(e) = release().await {
        warn!("Session release reported an error: {e}");
    }

    outcome
}

/// The report produced by exactly one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub scenario: String,
    /// Terminal outcome
    #[serde(flatten)]
    pub outcome: ScenarioOutcome,
    /// Step at which the run terminated
    pub step: Step,
    /// URL the page was on when the run terminated
    pub final_url: Option<String>,
    /// Artifacts written during the run
    pub artifacts: Vec<PathBuf>,
    /// Page errors recorded by the log sink
    pub page_errors: usize,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl ScenarioResult {
    /// Whether the behavior under test was verified
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ScenarioOutcome::Success)
    }

    /// Process exit code under the given blocked policy
    pub fn exit_code(&self, policy: BlockedPolicy) -> i32 {
        match &self.outcome {
            ScenarioOutcome::Success => 0,
            ScenarioOutcome::Blocked { .. } => match policy {
                BlockedPolicy::Tolerate => 0,
                BlockedPolicy::Fail => 1,
            },
            ScenarioOutcome::Timeout { .. } | ScenarioOutcome::NotFound { .. } => 1,
            ScenarioOutcome::Error { .. } => 2,
        }
    }
}

/// Command-line arguments shared by every scenario executable
#[derive(Parser, Debug)]
#[command(version)]
pub struct RunArgs {
    /// Base URL of the running LifeBalance app
    #[arg(long, env = "VERIFY_BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Directory for screenshots and run summaries
    #[arg(long, env = "VERIFY_OUT_DIR", default_value = "verification")]
    pub out_dir: PathBuf,

    /// Run with a visible browser window
    #[arg(long)]
    pub headed: bool,

    /// Treat a blocked-by-login outcome as a failure
    #[arg(long)]
    pub fail_on_blocked: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long, env = "VERIFY_CHROME_PATH")]
    pub chrome_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunArgs {
    /// Initialize tracing for a scenario process
    pub fn init_tracing(&self) {
        let filter = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
            )
            .init();
    }

    /// Blocked policy selected by the flags
    pub fn blocked_policy(&self) -> BlockedPolicy {
        if self.fail_on_blocked {
            BlockedPolicy::Fail
        } else {
            BlockedPolicy::Tolerate
        }
    }

    /// Session config for the given device profile
    pub fn session_config(&self, device: DeviceProfile) -> SessionConfig {
        let mut builder = SessionConfig::builder()
            .headless(!self.headed)
            .device(device);
        if let Some(ref path) = self.chrome_path {
            builder = builder.chrome_path(path.clone());
        }
        builder.build()
    }
}

/// One scenario run: owns the session, recorder, and log sink, tracks the
/// current step, and guarantees capture-then-release on every terminal path.
pub struct Scenario {
    name: String,
    base_url: String,
    session: Session,
    recorder: Recorder,
    logs: LogSink,
    step: Mutex<Step>,
}

impl Scenario {
    /// Acquire a session and attach diagnostics.
    ///
    /// A launch failure here is fatal for the scenario process; callers exit
    /// with [`EXIT_LAUNCH_FAILURE`] and do not retry.
    pub async fn start(name: &str, args: &RunArgs, config: SessionConfig) -> Result<Self> {
        info!("Scenario {name} starting against {}", args.base_url);
        let session = Session::acquire(config).await?;
        let logs = LogSink::attach(session.page()).await?;
        Ok(Self {
            name: name.to_string(),
            base_url: args.base_url.clone(),
            session,
            recorder: Recorder::new(name, args.out_dir.clone()),
            logs,
            step: Mutex::new(Step::Start),
        })
    }

    /// Scenario name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The session driving this run
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// A navigation target rooted at the configured base URL
    pub fn target(&self) -> NavigationTarget {
        NavigationTarget::base(self.base_url.clone())
    }

    /// Navigate to a target and return the post-navigation URL
    pub async fn navigate(&self, target: &NavigationTarget) -> Result<String> {
        self.set_step(Step::Navigating);
        Navigator::goto(&self.session, target).await
    }

    /// Wait for the page to settle under a policy
    pub async fn settle(&self, policy: &SettlePolicy) -> Result<()> {
        self.set_step(Step::Settling);
        Navigator::settle(&self.session, policy).await
    }

    /// Reload the page and settle under the same policy
    pub async fn reload(&self, policy: &SettlePolicy) -> Result<()> {
        self.set_step(Step::Navigating);
        Navigator::reload(&self.session).await?;
        self.settle(policy).await
    }

    /// Detect the auth redirect: a URL ending in `/login` means the flow
    /// under test is unreachable, a distinct outcome from failure.
    pub async fn guard_login_redirect(&self) -> Result<Option<ScenarioOutcome>> {
        let url = self.session.current_url().await?;
        if UrlPattern::EndsWith("/login".to_string()).is_match(&url) {
            warn!("Redirected to login at {url}; flow is blocked");
            return Ok(Some(ScenarioOutcome::Blocked {
                reason: format!("redirected to login at {url}"),
            }));
        }
        Ok(None)
    }

    /// Wait for a condition with an explicit bound
    pub async fn wait_for(&self, condition: &WaitCondition, timeout: Duration) -> Result<()> {
        self.set_step(Step::Waiting);
        Waiter::wait_for(self.session.page(), condition, timeout).await
    }

    /// Resolve a semantic target with one pass over its candidates
    pub async fn resolve(&self, target: &UiTarget) -> Result<Resolution> {
        self.set_step(Step::Resolving);
        Resolver::resolve(self.session.page(), target).await
    }

    /// Resolve a semantic target, polling until `timeout`
    pub async fn resolve_within(&self, target: &UiTarget, timeout: Duration) -> Result<Resolution> {
        self.set_step(Step::Resolving);
        Resolver::resolve_within(self.session.page(), target, timeout).await
    }

    /// Mark the run as interacting (click/focus/fill on a resolved element)
    pub fn interacting(&self) {
        self.set_step(Step::Interacting);
    }

    /// Capture a screenshot artifact
    pub async fn screenshot(&self, label: &str, full_page: bool) -> Result<PathBuf> {
        self.set_step(Step::Capturing);
        self.recorder
            .screenshot(self.session.page(), label, full_page)
            .await
    }

    /// Log candidate elements matching a CSS selector, for NotFound diagnosis
    pub async fn dump_candidates(&self, css: &str) -> Result<()> {
        let matches = Resolver::describe_matches(self.session.page(), css).await?;
        info!("{} candidate element(s) for {css:?}", matches.len());
        for m in &matches {
            info!("  candidate: {m}");
        }
        Ok(())
    }

    /// Build a NotFound outcome for a target, after capturing a debug shot.
    pub async fn not_found(&self, target: &UiTarget) -> Result<ScenarioOutcome> {
        warn!("Target not found: {}", target.description);
        self.screenshot("debug", false).await?;
        Ok(ScenarioOutcome::NotFound {
            target: target.description.clone(),
        })
    }

    /// Terminate the run: map errors to outcomes, capture terminal
    /// diagnostics, write the summary, and release the session.
    ///
    /// This is the single release point. It runs for every outcome,
    /// including unexpected errors, and the error is reflected in the
    /// result (and exit code) after capture, never swallowed.
    pub async fn finish(self, outcome: Result<ScenarioOutcome>) -> ScenarioResult {
        let step = *self.step.lock();

        let final_url = match self.session.current_url().await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Could not read final URL: {e}");
                None
            }
        };

        let page_errors = self.logs.error_count();
        if page_errors > 0 {
            warn!("{page_errors} page error(s) recorded during the run");
            for entry in self.logs.entries() {
                if entry.source == crate::capture::LogSource::PageError {
                    warn!("  {}", entry.message);
                }
            }
        }

        let page = self.session.page().clone();
        let recorder = &self.recorder;
        let outcome = terminate(
            &self.name,
            step,
            outcome,
            !recorder.artifacts().is_empty(),
            |label| async move {
                recorder.screenshot(&page, label, false).await.map(|_| ())
            },
            || async move { self.session.release().await },
        )
        .await;

        let mut result = ScenarioResult {
            scenario: self.name.clone(),
            outcome,
            step,
            final_url: final_url.clone(),
            artifacts: self.recorder.artifacts().into_iter().map(|a| a.path).collect(),
            page_errors,
            finished_at: Utc::now(),
        };

        // The summary is a plain file write and needs no browser, so it
        // lands after release; its own path joins the artifact list.
        if let Err(e) = self.recorder.write_summary(&result).await {
            warn!("Could not write run summary: {e}");
        } else {
            result.artifacts = self
                .recorder
                .artifacts()
                .into_iter()
                .map(|a| a.path)
                .collect();
        }

        info!(
            "Scenario {} finished: {} (step {step}, url {})",
            result.scenario,
            result.outcome.tag(),
            final_url.as_deref().unwrap_or("<unknown>"),
        );
        result
    }

    fn set_step(&self, step: Step) {
        *self.step.lock() = step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StorageSeed;
    use pretty_assertions::assert_eq;

    fn result_with(outcome: ScenarioOutcome) -> ScenarioResult {
        ScenarioResult {
            scenario: "bypass".to_string(),
            outcome,
            step: Step::Waiting,
            final_url: Some("http://localhost:3000/#/login".to_string()),
            artifacts: vec![PathBuf::from("verification/bypass_error.png")],
            page_errors: 0,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            result_with(ScenarioOutcome::Success).exit_code(BlockedPolicy::Tolerate),
            0
        );
        assert_eq!(
            result_with(ScenarioOutcome::Timeout {
                condition: "text visible".to_string()
            })
            .exit_code(BlockedPolicy::Tolerate),
            1
        );
        assert_eq!(
            result_with(ScenarioOutcome::NotFound {
                target: "Export button".to_string()
            })
            .exit_code(BlockedPolicy::Tolerate),
            1
        );
        assert_eq!(
            result_with(ScenarioOutcome::Error {
                message: "cdp".to_string()
            })
            .exit_code(BlockedPolicy::Tolerate),
            2
        );
    }

    #[test]
    fn test_blocked_policy_decides_exit_code() {
        let blocked = result_with(ScenarioOutcome::Blocked {
            reason: "redirected to login".to_string(),
        });
        assert_eq!(blocked.exit_code(BlockedPolicy::Tolerate), 0);
        assert_eq!(blocked.exit_code(BlockedPolicy::Fail), 1);
    }

    #[test]
    fn test_outcome_from_wait_timeout() {
        let err: Error = WaitError::Timeout {
            condition: "text \"TEST MODE ENABLED\" visible".to_string(),
            timeout_ms: 10_000,
        }
        .into();
        let outcome = outcome_from_error(&err);
        assert_eq!(
            outcome,
            ScenarioOutcome::Timeout {
                condition: "text \"TEST MODE ENABLED\" visible".to_string()
            }
        );
    }

    #[test]
    fn test_outcome_from_other_error() {
        let outcome = outcome_from_error(&Error::cdp("connection lost"));
        assert!(matches!(outcome, ScenarioOutcome::Error { .. }));
    }

    #[test]
    fn test_capture_labels() {
        assert_eq!(ScenarioOutcome::Success.capture_label(), "success");
        assert_eq!(
            ScenarioOutcome::Blocked {
                reason: String::new()
            }
            .capture_label(),
            "blocked"
        );
        assert_eq!(
            ScenarioOutcome::Timeout {
                condition: String::new()
            }
            .capture_label(),
            "error"
        );
        assert_eq!(
            ScenarioOutcome::NotFound {
                target: String::new()
            }
            .capture_label(),
            "debug"
        );
    }

    #[test]
    fn test_result_serialization() {
        let result = result_with(ScenarioOutcome::Blocked {
            reason: "redirected to login".to_string(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scenario"], "bypass");
        assert_eq!(json["outcome"], "blocked");
        assert_eq!(json["reason"], "redirected to login");
        assert_eq!(json["step"], "waiting");
    }

    #[tokio::test]
    async fn test_terminate_captures_then_releases_once_on_mid_run_error() {
        // A step that throws mid-run must still produce exactly one capture
        // and exactly one release, in that order.
        let events = Mutex::new(Vec::new());
        let events = &events;
        let err: Error = WaitError::Timeout {
            condition: "text \"TEST MODE ENABLED\" visible".to_string(),
            timeout_ms: 10_000,
        }
        .into();

        let outcome = terminate(
            "bypass",
            Step::Waiting,
            Err(err),
            true,
            |label| async move {
                events.lock().push(format!("capture:{label}"));
                Ok(())
            },
            || async move {
                events.lock().push("release".to_string());
                Ok(())
            },
        )
        .await;

        assert!(matches!(outcome, ScenarioOutcome::Timeout { .. }));
        assert_eq!(*events.lock(), vec!["capture:error", "release"]);
    }

    #[tokio::test]
    async fn test_terminate_releases_even_when_capture_fails() {
        let released = Mutex::new(0u32);
        let released = &released;

        let outcome = terminate(
            "export",
            Step::Capturing,
            Ok(ScenarioOutcome::NotFound {
                target: "Export button".to_string(),
            }),
            false,
            |_| async move { Err(Error::cdp("screenshot failed")) },
            || async move {
                *released.lock() += 1;
                Ok(())
            },
        )
        .await;

        assert!(matches!(outcome, ScenarioOutcome::NotFound { .. }));
        assert_eq!(*released.lock(), 1);
    }

    #[tokio::test]
    async fn test_terminate_success_with_artifacts_skips_duplicate_capture() {
        let events = Mutex::new(Vec::new());
        let events = &events;

        let outcome = terminate(
            "bypass",
            Step::Capturing,
            Ok(ScenarioOutcome::Success),
            true,
            |label| async move {
                events.lock().push(format!("capture:{label}"));
                Ok(())
            },
            || async move {
                events.lock().push("release".to_string());
                Ok(())
            },
        )
        .await;

        assert_eq!(outcome, ScenarioOutcome::Success);
        assert_eq!(*events.lock(), vec!["release"]);
    }

    #[tokio::test]
    async fn test_terminate_success_without_artifacts_captures() {
        let events = Mutex::new(Vec::new());
        let events = &events;

        terminate(
            "header",
            Step::Capturing,
            Ok(ScenarioOutcome::Success),
            false,
            |label| async move {
                events.lock().push(format!("capture:{label}"));
                Ok(())
            },
            || async move {
                events.lock().push("release".to_string());
                Ok(())
            },
        )
        .await;

        assert_eq!(*events.lock(), vec!["capture:success", "release"]);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Navigating.to_string(), "navigating");
        assert_eq!(Step::Capturing.to_string(), "capturing");
    }

    #[test]
    fn test_run_args_defaults() {
        let args = RunArgs::parse_from(["verify-x"]);
        assert_eq!(args.base_url, "http://localhost:3000");
        assert_eq!(args.out_dir, PathBuf::from("verification"));
        assert!(!args.headed);
        assert!(!args.fail_on_blocked);
        assert_eq!(args.blocked_policy(), BlockedPolicy::Tolerate);
    }

    #[test]
    fn test_run_args_overrides() {
        let args = RunArgs::parse_from([
            "verify-x",
            "--base-url",
            "http://localhost:3001",
            "--fail-on-blocked",
            "--headed",
        ]);
        assert_eq!(args.base_url, "http://localhost:3001");
        assert!(args.headed);
        assert_eq!(args.blocked_policy(), BlockedPolicy::Fail);

        let config = args.session_config(DeviceProfile::Phone);
        assert!(!config.headless);
        assert_eq!(config.device, DeviceProfile::Phone);
    }

    #[test]
    fn test_session_config_uses_storage_seed() {
        let args = RunArgs::parse_from(["verify-x"]);
        let config = args.session_config(DeviceProfile::default());
        assert!(config.headless);
        assert!(config.storage_seeds.is_empty());

        let seeded = SessionConfig::builder()
            .seed(StorageSeed::session("LIFEBALANCE_TEST_MODE", "true"))
            .build();
        assert_eq!(seeded.storage_seeds.len(), 1);
    }
}
