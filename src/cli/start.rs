use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch::handler,
    telemetry,
};
use anyhow::Result;
use tracing::Level;

fn get_verbosity_level(verbosity: u8, debug: bool) -> Level {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // More verbose levels compare greater.
    if debug {
        level.max(Level::DEBUG)
    } else {
        level
    }
}

/// Start the CLI
///
/// # Errors
/// Returns an error if telemetry fails to initialize or arguments are invalid.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches
        .get_one::<u8>(logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);
    let debug = matches
        .get_one::<bool>(logging::ARG_DEBUG)
        .copied()
        .unwrap_or(false);

    telemetry::init(&telemetry::TelemetryConfig::from_env(
        get_verbosity_level(verbosity, debug),
        debug,
    ))?;

    let action = handler(&matches)?;

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_verbosity_level() {
        assert_eq!(get_verbosity_level(0, false), Level::ERROR);
        assert_eq!(get_verbosity_level(1, false), Level::WARN);
        assert_eq!(get_verbosity_level(2, false), Level::INFO);
        assert_eq!(get_verbosity_level(3, false), Level::DEBUG);
        assert_eq!(get_verbosity_level(4, false), Level::TRACE);
        assert_eq!(get_verbosity_level(9, false), Level::TRACE);
    }

    #[test]
    fn test_debug_raises_to_debug() {
        assert_eq!(get_verbosity_level(0, true), Level::DEBUG);
        assert_eq!(get_verbosity_level(2, true), Level::DEBUG);
        assert_eq!(get_verbosity_level(4, true), Level::TRACE);
    }
}
