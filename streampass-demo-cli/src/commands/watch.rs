//! Watch command - live countdown

use anyhow::Result;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::Backend;
use crate::ui;
use streampass_sync::EngineEvent;

/// Render the countdown once per tick until Ctrl-C or `seconds` elapse
pub async fn run(
    storage_dir: &Path,
    backend: &Backend,
    seconds: Option<u64>,
    verbose: bool,
) -> Result<()> {
    ui::header("StreamPass Live Countdown");

    let engine = super::connect(storage_dir, backend).await?;
    engine.on_event(Arc::new(move |event: &EngineEvent| {
        ui::clear_line();
        ui::event(event);
        if verbose {
            tracing::debug!(?event, "engine event");
        }
    }));
    ui::info("Press Ctrl-C to stop");

    let deadline = seconds.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut redraw = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = redraw.tick() => {
                let view = engine.current_view_model();
                ui::clear_line();
                print!("\r  {}", ui::countdown_line(&view));
                std::io::stdout().flush()?;

                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    println!();

    if verbose {
        if let Some(drift) = engine.last_drift() {
            ui::key_value("Last drift", &format!("{}s", drift));
        }
    }

    engine.dispose();
    ui::success("Stopped");
    Ok(())
}
