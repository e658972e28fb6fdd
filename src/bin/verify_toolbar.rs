//! Verifies that the top toolbar controls are accessible buttons.
//!
//! Both toolbar clusters carry explicit aria-labels; the Safe to Spend button
//! must open its breakdown modal, and the points cluster must be focusable.
//! Runs against the `/#/test-toolbar` fixture route.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::selector::{Resolution, UiTarget};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::wait::WaitCondition;
use lifebalance_verify::Result;
use std::time::Duration;

fn header_settle() -> SettlePolicy {
    SettlePolicy::marker(
        WaitCondition::element_visible("header"),
        Duration::from_secs(10),
    )
}

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target().route("/test-toolbar")).await?;
    s.settle(&header_settle()).await?;

    let safe_spend = UiTarget::new("Safe to Spend toolbar button")
        .aria_label("View Safe to Spend details")
        .role("button", "View Safe to Spend details");
    let Resolution::Found(button) = s.resolve(&safe_spend).await? else {
        return s.not_found(&safe_spend).await;
    };
    s.interacting();
    button.click().await?;

    s.wait_for(
        &WaitCondition::text("Safe to Spend Breakdown"),
        Duration::from_secs(5),
    )
    .await?;

    // Reload to close the modal and reset toolbar state.
    s.reload(&header_settle()).await?;

    let points = UiTarget::new("Points cluster button")
        .aria_label("View Rewards and Points breakdown")
        .role("button", "View Rewards and Points breakdown");
    let Resolution::Found(button) = s.resolve(&points).await? else {
        return s.not_found(&points).await;
    };
    s.interacting();
    // Focus rather than click so the screenshot shows the focus ring.
    button.focus().await?;

    s.screenshot("accessibility", false).await?;
    Ok(ScenarioOutcome::Success)
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::default());
    let scenario = match Scenario::start("toolbar", &args, config).await {
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
