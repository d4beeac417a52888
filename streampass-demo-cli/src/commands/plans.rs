//! Plans command - list purchasable passes

use anyhow::Result;
use std::path::Path;

use super::Backend;
use crate::ui;

/// List the plan catalog with the action each plan offers
pub async fn run(storage_dir: &Path, backend: &Backend, verbose: bool) -> Result<()> {
    ui::header("Available Plans");

    let engine = super::connect(storage_dir, backend).await?;
    let view = engine.current_view_model();

    if view.plans.is_empty() {
        ui::info("No plans available");
    } else {
        ui::view_model(&view);
        ui::separator();
        ui::info("Buy or extend with: streampass-demo buy <plan-id>");
    }

    if verbose {
        for plan in engine.plans() {
            ui::key_value(&plan.plan_id, &format!("{} seconds", plan.duration_seconds));
        }
    }

    engine.dispose();
    Ok(())
}
