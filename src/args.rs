//! Command-line argument parsing.
//!
//! Hand-rolled parsing into a [`CliAction`]: global flags (`--debug`,
//! `--config`, `--help`, `--version`) may appear anywhere; the first
//! remaining token selects a subcommand. Unknown input degrades to help
//! with a nonzero exit rather than guessing.

/// The parsed command-line action.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon in the foreground.
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    AlarmAdd {
        debug_enabled: bool,
        config_dir: Option<String>,
        time: Option<String>,
        location: Option<String>,
        sound: Option<String>,
    },
    AlarmRemove {
        debug_enabled: bool,
        config_dir: Option<String>,
        id: String,
    },
    AlarmToggle {
        debug_enabled: bool,
        config_dir: Option<String>,
        id: String,
    },
    LocationAdd {
        debug_enabled: bool,
        config_dir: Option<String>,
        name: String,
        lat: f64,
        lon: f64,
    },
    LocationHere {
        debug_enabled: bool,
        config_dir: Option<String>,
        name: Option<String>,
    },
    LocationRemove {
        debug_enabled: bool,
        config_dir: Option<String>,
        query: String,
    },
    Status {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    Dismiss {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    Stop {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    Simulate {
        debug_enabled: bool,
        config_dir: Option<String>,
        track: String,
        start: String,
        end: String,
        multiplier: Option<f64>,
        log_to_file: bool,
    },
    ShowHelp,
    ShowVersion,
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments (including argv\[0\]).
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut config_dir: Option<String> = None;
        let mut log_to_file = false;
        let mut rest: Vec<String> = Vec::new();

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        // First pass: strip global flags, keep everything else in order
        let mut idx = 0;
        while idx < args_vec.len() {
            match args_vec[idx].as_str() {
                "--debug" | "-d" => debug_enabled = true,
                "--help" | "-h" => return ParsedArgs { action: CliAction::ShowHelp },
                "--version" | "-V" => return ParsedArgs { action: CliAction::ShowVersion },
                "--log" | "-l" => log_to_file = true,
                "--config" | "-c" => {
                    idx += 1;
                    match args_vec.get(idx) {
                        Some(dir) => config_dir = Some(dir.clone()),
                        None => return ParsedArgs { action: CliAction::ShowHelpDueToError },
                    }
                }
                other => rest.push(other.to_string()),
            }
            idx += 1;
        }

        let action = Self::parse_command(&rest, debug_enabled, config_dir, log_to_file);
        ParsedArgs { action }
    }

    fn parse_command(
        rest: &[String],
        debug_enabled: bool,
        config_dir: Option<String>,
        log_to_file: bool,
    ) -> CliAction {
        let Some(command) = rest.first() else {
            return CliAction::Run {
                debug_enabled,
                config_dir,
            };
        };

        match command.as_str() {
            "alarm" => Self::parse_alarm(&rest[1..], debug_enabled, config_dir),
            "location" => Self::parse_location(&rest[1..], debug_enabled, config_dir),
            "status" if rest.len() == 1 => CliAction::Status {
                debug_enabled,
                config_dir,
            },
            "dismiss" if rest.len() == 1 => CliAction::Dismiss {
                debug_enabled,
                config_dir,
            },
            "stop" if rest.len() == 1 => CliAction::Stop {
                debug_enabled,
                config_dir,
            },
            "simulate" if (4..=5).contains(&rest.len()) => {
                let multiplier = match rest.get(4) {
                    Some(raw) => match raw.parse::<f64>() {
                        Ok(m) if m >= 1.0 => Some(m),
                        _ => return CliAction::ShowHelpDueToError,
                    },
                    None => None,
                };
                CliAction::Simulate {
                    debug_enabled,
                    config_dir,
                    track: rest[1].clone(),
                    start: rest[2].clone(),
                    end: rest[3].clone(),
                    multiplier,
                    log_to_file,
                }
            }
            "help" => CliAction::ShowHelp,
            _ => CliAction::ShowHelpDueToError,
        }
    }

    fn parse_alarm(
        rest: &[String],
        debug_enabled: bool,
        config_dir: Option<String>,
    ) -> CliAction {
        match rest.first().map(String::as_str) {
            Some("add") => {
                let mut time: Option<String> = None;
                let mut location: Option<String> = None;
                let mut sound: Option<String> = None;

                let mut idx = 1;
                while idx < rest.len() {
                    match rest[idx].as_str() {
                        "--location" => {
                            idx += 1;
                            match rest.get(idx) {
                                Some(value) => location = Some(value.clone()),
                                None => return CliAction::ShowHelpDueToError,
                            }
                        }
                        "--sound" => {
                            idx += 1;
                            match rest.get(idx) {
                                Some(value) => sound = Some(value.clone()),
                                None => return CliAction::ShowHelpDueToError,
                            }
                        }
                        value if time.is_none() && !value.starts_with('-') => {
                            time = Some(value.to_string());
                        }
                        _ => return CliAction::ShowHelpDueToError,
                    }
                    idx += 1;
                }

                CliAction::AlarmAdd {
                    debug_enabled,
                    config_dir,
                    time,
                    location,
                    sound,
                }
            }
            Some("remove") if rest.len() == 2 => CliAction::AlarmRemove {
                debug_enabled,
                config_dir,
                id: rest[1].clone(),
            },
            Some("toggle") if rest.len() == 2 => CliAction::AlarmToggle {
                debug_enabled,
                config_dir,
                id: rest[1].clone(),
            },
            _ => CliAction::ShowHelpDueToError,
        }
    }

    fn parse_location(
        rest: &[String],
        debug_enabled: bool,
        config_dir: Option<String>,
    ) -> CliAction {
        match rest.first().map(String::as_str) {
            Some("add") if rest.len() == 4 => {
                let (Ok(lat), Ok(lon)) = (rest[2].parse::<f64>(), rest[3].parse::<f64>()) else {
                    return CliAction::ShowHelpDueToError;
                };
                CliAction::LocationAdd {
                    debug_enabled,
                    config_dir,
                    name: rest[1].clone(),
                    lat,
                    lon,
                }
            }
            Some("here") if rest.len() <= 2 => CliAction::LocationHere {
                debug_enabled,
                config_dir,
                name: rest.get(1).cloned(),
            },
            Some("remove") if rest.len() == 2 => CliAction::LocationRemove {
                debug_enabled,
                config_dir,
                query: rest[1].clone(),
            },
            _ => CliAction::ShowHelpDueToError,
        }
    }
}

/// Print usage information.
pub fn print_help() {
    log_version!();
    log_block_start!("Usage: geowake [OPTIONS] [COMMAND]");
    log_block_start!("Commands:");
    log_indented!("(none)                          run the daemon in the foreground");
    log_indented!("alarm add [HH:MM] [--location <name|id>] [--sound <name>]");
    log_indented!("alarm remove <id>               delete an alarm");
    log_indented!("alarm toggle <id>               arm or disarm an alarm");
    log_indented!("location add <name> <lat> <lon> save a place");
    log_indented!("location here [name]            save the current position");
    log_indented!("location remove <name|id>       delete a place (disarms bound alarms)");
    log_indented!("status                          show daemon state, alarms, locations");
    log_indented!("dismiss                         silence the ringing alarm");
    log_indented!("stop                            terminate the running daemon");
    log_indented!("simulate <track.toml> <start> <end> [multiplier]");
    log_indented!("                                replay a track under accelerated time");
    log_block_start!("Options:");
    log_indented!("-d, --debug         enable detailed debug output");
    log_indented!("-c, --config <dir>  use an alternate configuration directory");
    log_indented!("-l, --log           write simulation output to a log file");
    log_indented!("-h, --help          display this help and exit");
    log_indented!("-V, --version       display version information and exit");
    log_block_start!("Examples:");
    log_indented!("geowake alarm add 07:30 --location Office");
    log_indented!("geowake simulate track.toml \"2025-03-01 07:45:00\" \"2025-03-01 08:15:00\" 120");
    log_end!();
}

/// Print version information.
pub fn print_version() {
    log_version!();
    log_block_start!("geowake: alarms that stand down when you arrive");
    log_indented!("version {}", env!("CARGO_PKG_VERSION"));
    log_indented!("{}", env!("CARGO_PKG_REPOSITORY"));
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        let mut argv = vec!["geowake"];
        argv.extend(args);
        ParsedArgs::parse(argv).action
    }

    #[test]
    fn bare_invocation_runs_the_daemon() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None
            }
        );
    }

    #[test]
    fn global_flags_combine_with_commands() {
        assert_eq!(
            parse(&["--debug", "status"]),
            CliAction::Status {
                debug_enabled: true,
                config_dir: None
            }
        );
        assert_eq!(
            parse(&["status", "-d", "-c", "/tmp/geowake"]),
            CliAction::Status {
                debug_enabled: true,
                config_dir: Some("/tmp/geowake".to_string())
            }
        );
    }

    #[test]
    fn help_and_version_win() {
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["status", "-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        assert_eq!(parse(&["help"]), CliAction::ShowHelp);
    }

    #[test]
    fn alarm_add_variants() {
        assert_eq!(
            parse(&["alarm", "add"]),
            CliAction::AlarmAdd {
                debug_enabled: false,
                config_dir: None,
                time: None,
                location: None,
                sound: None
            }
        );
        assert_eq!(
            parse(&["alarm", "add", "07:30", "--location", "Office", "--sound", "chime"]),
            CliAction::AlarmAdd {
                debug_enabled: false,
                config_dir: None,
                time: Some("07:30".to_string()),
                location: Some("Office".to_string()),
                sound: Some("chime".to_string())
            }
        );
        // Option missing its value
        assert_eq!(
            parse(&["alarm", "add", "--location"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn alarm_remove_and_toggle_need_an_id() {
        assert_eq!(
            parse(&["alarm", "toggle", "abc"]),
            CliAction::AlarmToggle {
                debug_enabled: false,
                config_dir: None,
                id: "abc".to_string()
            }
        );
        assert_eq!(parse(&["alarm", "toggle"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["alarm", "remove"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn location_add_parses_coordinates() {
        assert_eq!(
            parse(&["location", "add", "Office", "34.05", "-118.24"]),
            CliAction::LocationAdd {
                debug_enabled: false,
                config_dir: None,
                name: "Office".to_string(),
                lat: 34.05,
                lon: -118.24
            }
        );
        assert_eq!(
            parse(&["location", "add", "Office", "north", "-118.24"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn simulate_takes_optional_multiplier() {
        assert_eq!(
            parse(&[
                "simulate",
                "track.toml",
                "2025-03-01 07:45:00",
                "2025-03-01 08:15:00"
            ]),
            CliAction::Simulate {
                debug_enabled: false,
                config_dir: None,
                track: "track.toml".to_string(),
                start: "2025-03-01 07:45:00".to_string(),
                end: "2025-03-01 08:15:00".to_string(),
                multiplier: None,
                log_to_file: false
            }
        );
        assert_eq!(
            parse(&["simulate", "t.toml", "a", "b", "0.5"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn unknown_commands_show_help_with_error() {
        assert_eq!(parse(&["frobnicate"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["alarm", "explode"]), CliAction::ShowHelpDueToError);
    }
}
