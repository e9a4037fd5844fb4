//! Output formatting for CLI responses

use anyhow::{Error, Result};
use colored::*;
use powershelf_errors::ErrorCategory;
use powershelf_firmware::{FirmwareState, FirmwareUpdate};
use powershelf_types::PmcAccess;
use serde_json::{Value, json};

use crate::error::CliError;

fn print_json(value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(CliError::from)?;
    println!("{text}");
    Ok(())
}

/// Print error in JSON format
pub fn print_error_json(error: &Error, category: ErrorCategory) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "category": format!("{category:?}"),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

/// Print the firmware manager summary
pub fn print_summary(summary: &str, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "success": true,
            "summary": summary,
        }));
    }
    println!("{summary}");
    Ok(())
}

/// Print whether `access` may move to `target`
pub fn print_can_upgrade(
    access: &PmcAccess,
    target: &str,
    allowed: bool,
    json: bool,
) -> Result<()> {
    if json {
        return print_json(&json!({
            "success": true,
            "pmc": access.pmc,
            "target": target,
            "can_upgrade": allowed,
        }));
    }

    let verdict = if allowed {
        "allowed".green().bold()
    } else {
        "not allowed".red().bold()
    };
    println!(
        "Upgrade of {} ({}, {}) to {}: {}",
        access.mac().to_string().bold(),
        access.pmc.ip,
        access.pmc.vendor,
        target.cyan(),
        verdict
    );
    Ok(())
}

/// Print an upgrade record
pub fn print_update(record: &FirmwareUpdate, dry: bool, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "success": record.state != FirmwareState::Failed,
            "dry_run": dry,
            "update": record,
        }));
    }

    let state = match record.state {
        FirmwareState::Completed => record.state.as_str().green(),
        FirmwareState::Failed => record.state.as_str().red(),
        FirmwareState::Queued | FirmwareState::Verifying => record.state.as_str().yellow(),
    };
    println!("{}", "Firmware Update:".bold());
    println!("  PMC:        {}", record.mac);
    println!("  Component:  {}", record.component);
    println!("  Version:    {} -> {}", record.version_from, record.version_to.to_string().cyan());
    println!("  State:      {state}");
    println!("  Changed:    {}", record.last_transition_time.to_rfc3339());
    if let Some(job) = &record.job_id {
        println!("  Job:        {job}");
    }
    if let Some(message) = &record.error_message {
        println!("  {} {}", "Error:".red(), message);
    }
    if dry {
        println!("{}", "Dry run: no image was uploaded".dimmed());
    }
    Ok(())
}
