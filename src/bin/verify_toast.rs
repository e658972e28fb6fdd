//! Verifies that the toast container respects the iOS safe area.
//!
//! On notched phones the toaster must offset itself with
//! `env(safe-area-inset-top)` so toasts are not clipped by the notch. The
//! container carries the offset in an inline style, which is what we probe.

use clap::Parser;
use lifebalance_verify::navigation::SettlePolicy;
use lifebalance_verify::scenario::{RunArgs, Scenario, ScenarioOutcome, EXIT_LAUNCH_FAILURE};
use lifebalance_verify::selector::{Resolution, UiTarget};
use lifebalance_verify::session::DeviceProfile;
use lifebalance_verify::Result;
use std::time::Duration;
use tracing::info;

async fn script(s: &Scenario) -> Result<ScenarioOutcome> {
    s.navigate(&s.target()).await?;
    s.settle(&SettlePolicy::network_idle()).await?;

    let toaster = UiTarget::new("safe-area toaster container")
        .css("div[style*=\"safe-area-inset-top\"]");

    match s.resolve_within(&toaster, Duration::from_secs(5)).await? {
        Resolution::Found(_) => {
            info!("Toaster container carries the safe-area offset");
            s.screenshot("success", false).await?;
            Ok(ScenarioOutcome::Success)
        }
        Resolution::NotFound => {
            // Dump the inline-styled divs so the log shows what the page
            // actually rendered in place of the expected container.
            s.dump_candidates("div[style]").await?;
            s.not_found(&toaster).await
        }
    }
}

#[tokio::main]
async fn main() {
    let args = RunArgs::parse();
    args.init_tracing();

    let config = args.session_config(DeviceProfile::IPhone14Pro);
    let scenario = match Scenario::start("toast", &args, config).await {
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
