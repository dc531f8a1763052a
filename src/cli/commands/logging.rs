use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_DEBUG: &str = "debug";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

/// `DEBUG=1` (or the bare flag) turns debug on; any other value leaves it off.
#[must_use]
pub fn validator_debug() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<bool, String> {
        Ok(value == "1" || value.eq_ignore_ascii_case("true"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("TRACEGATE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_DEBUG)
                .long("debug")
                .help("Debug mode, equivalent to DEBUG log level")
                .env("DEBUG")
                .action(ArgAction::SetTrue)
                .value_parser(validator_debug()),
        )
}
