//! Binary entry point: argument parsing and command dispatch.
//!
//! All application logic lives in the library; this file maps a parsed
//! [`CliAction`] onto it and turns failures into structured error output
//! with a nonzero exit.

use anyhow::Result;

use geowake::args::{CliAction, ParsedArgs, print_help, print_version};
use geowake::commands;
use geowake::constants::EXIT_FAILURE;
use geowake::{Geowake, log_end, log_error_exit, log_pipe};

fn main() {
    let parsed = ParsedArgs::parse(std::env::args());

    if let Err(e) = run_action(parsed.action) {
        log_pipe!();
        log_error_exit!("{e:#}");
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }
}

fn run_action(action: CliAction) -> Result<()> {
    // Make the custom config directory visible to everything downstream
    // before any path is resolved.
    if let Some(dir) = action_config_dir(&action) {
        geowake::config::set_config_dir(Some(dir.to_string()))?;
    }

    match action {
        CliAction::Run { debug_enabled, .. } => Geowake::new(debug_enabled).run(),
        CliAction::AlarmAdd {
            debug_enabled,
            time,
            location,
            sound,
            ..
        } => commands::alarm::run_add(
            time.as_deref(),
            location.as_deref(),
            sound.as_deref(),
            debug_enabled,
        ),
        CliAction::AlarmRemove {
            debug_enabled, id, ..
        } => commands::alarm::run_remove(&id, debug_enabled),
        CliAction::AlarmToggle {
            debug_enabled, id, ..
        } => commands::alarm::run_toggle(&id, debug_enabled),
        CliAction::LocationAdd {
            debug_enabled,
            name,
            lat,
            lon,
            ..
        } => commands::location::run_add(&name, lat, lon, debug_enabled),
        CliAction::LocationHere {
            debug_enabled,
            name,
            ..
        } => commands::location::run_here(name.as_deref(), debug_enabled),
        CliAction::LocationRemove {
            debug_enabled,
            query,
            ..
        } => commands::location::run_remove(&query, debug_enabled),
        CliAction::Status { debug_enabled, .. } => commands::status::run(debug_enabled),
        CliAction::Dismiss { debug_enabled, .. } => commands::dismiss::run(debug_enabled),
        CliAction::Stop { debug_enabled, .. } => commands::stop::run(debug_enabled),
        CliAction::Simulate {
            debug_enabled,
            track,
            start,
            end,
            multiplier,
            log_to_file,
            ..
        } => commands::simulate::run(&track, &start, &end, multiplier, log_to_file, debug_enabled),
        CliAction::ShowHelp => {
            print_help();
            Ok(())
        }
        CliAction::ShowVersion => {
            print_version();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            print_help();
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn action_config_dir(action: &CliAction) -> Option<&str> {
    match action {
        CliAction::Run { config_dir, .. }
        | CliAction::AlarmAdd { config_dir, .. }
        | CliAction::AlarmRemove { config_dir, .. }
        | CliAction::AlarmToggle { config_dir, .. }
        | CliAction::LocationAdd { config_dir, .. }
        | CliAction::LocationHere { config_dir, .. }
        | CliAction::LocationRemove { config_dir, .. }
        | CliAction::Status { config_dir, .. }
        | CliAction::Dismiss { config_dir, .. }
        | CliAction::Stop { config_dir, .. }
        | CliAction::Simulate { config_dir, .. } => config_dir.as_deref(),
        CliAction::ShowHelp | CliAction::ShowVersion | CliAction::ShowHelpDueToError => None,
    }
}
