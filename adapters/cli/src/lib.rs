#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Protocol boundary between the game server and the Gemrunner agent.

use std::path::Path;

use anyhow::Context;
use gemrunner_core::AgentTuning;

pub mod protocol;
pub mod session;

pub use protocol::{ProtocolError, WireObservation};
pub use session::{Session, SessionSummary};

/// Parses agent tuning from TOML. Missing keys keep their defaults.
pub fn parse_tuning(text: &str) -> Result<AgentTuning, toml::de::Error> {
    toml::from_str(text)
}

/// Loads tuning from `path`, or the defaults when no path is given.
pub fn load_tuning(path: Option<&Path>) -> anyhow::Result<AgentTuning> {
    let Some(path) = path else {
        return Ok(AgentTuning::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tuning file {}", path.display()))?;
    parse_tuning(&text).with_context(|| format!("invalid tuning file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemrunner_core::{CoverMode, RouteMode};

    #[test]
    fn partial_tuning_keeps_defaults() {
        let tuning = parse_tuning(
            r#"
            [patrol]
            cover = "exact"
            route = "ant_colony"

            [stuck]
            replan_threshold = 9
            "#,
        )
        .expect("valid tuning");

        assert_eq!(tuning.patrol.cover, CoverMode::Exact);
        assert_eq!(tuning.patrol.route, RouteMode::AntColony);
        assert_eq!(tuning.stuck.replan_threshold, 9);
        assert_eq!(tuning.stuck.window, AgentTuning::default().stuck.window);
        assert_eq!(tuning.ant_colony, AgentTuning::default().ant_colony);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(parse_tuning("[patrol]\ncover = \"psychic\"\n").is_err());
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(
            load_tuning(None).expect("defaults"),
            AgentTuning::default()
        );
    }
}
