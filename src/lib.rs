//! LifeBalance Verify - Browser-Driven UI Verification Harness
//!
//! This crate drives a headless Chromium (via ChromiumOxide/CDP) through the
//! LifeBalance web application to prove or disprove specific UI behaviors.
//! The app has no in-process test runner, so verification happens externally,
//! end-to-end, against a live dev server.
//!
//! # Features
//!
//! - **Session Management**: one browser + one page per scenario, released on
//!   every exit path
//! - **Bounded Waiting**: poll page-state predicates with explicit timeouts
//!   instead of fixed sleeps
//! - **Selector Fallback**: ordered strategy chains (role/name first, class
//!   CSS last) with `NotFound` as a first-class outcome
//! - **Diagnostic Capture**: screenshots, console logs, and page errors,
//!   tagged by scenario and outcome
//!
//! # Architecture
//!
//! ```text
//! Scenario Script ──▶ Session ──▶ Navigator (goto/settle)
//!        │               │             │
//!        │               ▼             ▼
//!        │          ┌─────────┐  ┌───────────┐
//!        ├─────────▶│ Waiter  │  │ Resolver  │
//!        │          └─────────┘  └───────────┘
//!        ▼
//!  ┌──────────────────┐
//!  │ Recorder/LogSink │──▶ screenshots, console logs, run summary
//!  └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome};
//! use lifebalance_verify::session::DeviceProfile;
//! use lifebalance_verify::wait::WaitCondition;
//! use clap::Parser;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let args = RunArgs::parse();
//!     args.init_tracing();
//!
//!     let config = args.session_config(DeviceProfile::default());
//!     let scenario = match Scenario::start("smoke", &args, config).await {
//!         Ok(s) => s,
//!         Err(e) => {
//!             tracing::error!("Browser launch failed: {e}");
//!             std::process::exit(lifebalance_verify::scenario::EXIT_LAUNCH_FAILURE);
//!         }
//!     };
//!
//!     let outcome = async {
//!         scenario.navigate(&scenario.target()).await?;
//!         scenario
//!             .wait_for(&WaitCondition::element_visible("header"), Duration::from_secs(10))
//!             .await?;
//!         scenario.screenshot("success", false).await?;
//!         Ok(ScenarioOutcome::Success)
//!     }
//!     .await;
//!
//!     let result = scenario.finish(outcome).await;
//!     std::process::exit(result.exit_code(args.blocked_policy()));
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod capture;
pub mod error;
pub mod navigation;
pub mod scenario;
pub mod selector;
pub mod session;
pub mod wait;

// Re-exports for convenience
pub use error::{Error, Result};
pub use navigation::{NavigationTarget, Navigator, SettlePolicy};
pub use scenario::{BlockedPolicy, RunArgs, Scenario, ScenarioOutcome, ScenarioResult};
pub use selector::{Resolution, Resolver, SelectorStrategy, UiTarget};
pub use session::{DeviceProfile, Session, SessionConfig, StorageSeed};
pub use wait::{UrlPattern, WaitCondition, Waiter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
