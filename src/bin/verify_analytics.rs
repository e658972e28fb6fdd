//! Verifies the analytics modal on the dashboard.
//!
//! The Analytics button is icon-only and currently lacks an accessible name
//! in the markup, so the candidate chain falls back to the known class-based
//! selector after trying role/name and aria-label.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::selector::{Resolution, UiTarget};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::wait::WaitCondition;
use lifebalance_verify::Result;
use std::time::Duration;
use tracing::info;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target()).await?;
    s.settle(&SettlePolicy::network_idle()).await?;

    if let Some(blocked) = s.guard_login_redirect().await? {
        return Ok(blocked);
    }

    let button = UiTarget::new("Analytics button")
        .role("button", "Analytics")
        .aria_label("Open analytics")
        .css("button.p-3.bg-white.text-brand-600");

    match s.resolve_within(&button, Duration::from_secs(5)).await? {
        Resolution::Found(element) => {
            info!("Analytics button resolved via {}", element.strategy);
            s.interacting();
            element.click().await?;

            s.wait_for(&WaitCondition::text_exact("Analytics"), Duration::from_secs(5))
                .await?;

            s.screenshot("modal", false).await?;
            Ok(ScenarioOutcome::Success)
        }
        Resolution::NotFound => s.not_found(&button).await,
    }
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::default());
    let scenario = match Scenario::start("analytics", &args, config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Browser launch failed: {e}");
            std::process::exit(EXIT_LAUNCH_FAILURE);
        }
    };

    let outcome = script(&scenario).await;
    let result = scenario.finish(outcome).await;
    std::process::exit(result.exit_code(args.blocked_policy()));
}
