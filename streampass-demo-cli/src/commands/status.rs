//! Status command - show time remaining on the pass

use anyhow::Result;
use std::path::Path;

use super::Backend;
use crate::ui;

/// Display the current subscription status
pub async fn run(storage_dir: &Path, backend: &Backend, verbose: bool) -> Result<()> {
    ui::header("StreamPass Status");

    let engine = super::connect(storage_dir, backend).await?;
    let view = engine.current_view_model();

    ui::key_value("Remaining", &ui::countdown_line(&view));
    if let Some(status) = engine.status() {
        if let Some(expires_at) = status.expires_at {
            ui::key_value(
                "Expires",
                &expires_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            );
        }
    } else {
        ui::info("Status unknown; the backend could not be reached");
    }

    if verbose {
        ui::separator();
        ui::json(&serde_json::to_value(&view)?);
    }

    engine.dispose();
    Ok(())
}
