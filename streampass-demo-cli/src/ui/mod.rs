//! Terminal UI utilities

use colored::Colorize;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use streampass_sync::{Affordance, EngineEvent, ViewModel};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a section header
pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Create a spinner progress indicator
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a separator line
pub fn separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// Print JSON prettily
pub fn json(value: &serde_json::Value) {
    if let Ok(pretty) = serde_json::to_string_pretty(value) {
        println!("{}", pretty);
    }
}

/// One-line countdown, colored by state
pub fn countdown_line(view: &ViewModel) -> String {
    let clock = if !view.known {
        view.formatted.dimmed()
    } else if view.is_active {
        view.formatted.green().bold()
    } else {
        view.formatted.red().bold()
    };
    let state = match (view.known, view.is_active) {
        (false, _) => "unknown".dimmed(),
        (true, true) => "active".green(),
        (true, false) => "expired".red(),
    };
    let updating = if view.updating {
        format!(" {}", "updating…".yellow())
    } else {
        String::new()
    };
    format!("{} [{}]{}", clock, state, updating)
}

/// Print the full view model
pub fn view_model(view: &ViewModel) {
    key_value("Remaining", &countdown_line(view));
    if view.plans.is_empty() {
        key_value("Plans", "none available");
        return;
    }
    for plan in &view.plans {
        let action = match plan.affordance {
            Affordance::Purchase => "buy",
            Affordance::Extend => "extend",
        };
        let action = if plan.enabled {
            action.normal()
        } else {
            action.dimmed()
        };
        println!(
            "  {} {:<12} {:>10} {:>6} {:<4} ({})",
            "•".cyan(),
            plan.plan_id,
            plan.duration,
            plan.price,
            plan.currency,
            action
        );
    }
}

/// Describe an engine event for the watch log
pub fn event(event: &EngineEvent) {
    match event {
        EngineEvent::StatusChanged(status) => info(&format!(
            "status: {}s remaining",
            status.remaining_seconds
        )),
        EngineEvent::Expired => warning("pass expired"),
        EngineEvent::SyncFailed(e) => error(&format!("sync failed: {}", e)),
        EngineEvent::TransactionConfirmed { kind, plan_id, .. } => {
            success(&format!("{} of {} confirmed", kind, plan_id))
        }
        EngineEvent::TransactionRolledBack { kind, plan_id, error: e } => {
            error(&format!("{} of {} rolled back: {}", kind, plan_id, e))
        }
        EngineEvent::PlansUpdated(plans) => info(&format!("{} plan(s) loaded", plans.len())),
        EngineEvent::Disposed => {}
    }
}

/// Clear the current terminal line
pub fn clear_line() {
    let _ = Term::stdout().clear_line();
}
