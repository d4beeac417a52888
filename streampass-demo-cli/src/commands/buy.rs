//! Buy command - purchase or extend a pass

use anyhow::{bail, Result};
use std::path::Path;
use streampass_sync::{PurchaseKind, ViewModel};

use super::Backend;
use crate::ui;

/// Choose the action when the user did not name one.
pub fn resolve_kind(requested: Option<&str>, view: &ViewModel) -> Result<PurchaseKind> {
    match requested {
        Some(kind) => Ok(kind.parse()?),
        None if view.is_active => Ok(PurchaseKind::Extend),
        None => Ok(PurchaseKind::Purchase),
    }
}

/// Purchase or extend with the given plan
pub async fn run(
    storage_dir: &Path,
    backend: &Backend,
    plan_id: &str,
    kind: Option<&str>,
    verbose: bool,
) -> Result<()> {
    ui::header("StreamPass Purchase");

    let engine = super::connect(storage_dir, backend).await?;
    let before = engine.current_view_model();
    if !before.plans.iter().any(|p| p.plan_id == plan_id) {
        let known: Vec<&str> = before.plans.iter().map(|p| p.plan_id.as_str()).collect();
        bail!(
            "Unknown plan '{}'. Available: {}",
            plan_id,
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        );
    }

    let kind = resolve_kind(kind, &before)?;
    ui::key_value("Before", &ui::countdown_line(&before));

    let handle = engine.begin_transaction(kind, plan_id)?;
    ui::key_value("Optimistic", &ui::countdown_line(&engine.current_view_model()));
    if verbose {
        ui::key_value("Transaction", &handle.id().to_string());
    }

    let spinner = ui::spinner(&format!("Submitting {} of {}...", kind, plan_id));
    let settled = handle.settled().await;
    spinner.finish_and_clear();

    let after = engine.current_view_model();
    let outcome = match settled {
        Ok(status) => {
            ui::success(&format!("{} confirmed by server", kind));
            ui::key_value("Remaining", &ui::countdown_line(&after));
            if verbose {
                ui::key_value("Server seconds", &status.remaining_seconds.to_string());
            }
            Ok(())
        }
        Err(e) => {
            ui::error(&format!("{} failed: {}", kind, e));
            ui::key_value("Restored", &ui::countdown_line(&after));
            Err(e.into())
        }
    };

    engine.dispose();
    outcome
}
