//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod config;
mod logging;
mod run;
mod version;

pub use config::{handle_config_command, ConfigSubcommand};
pub use logging::*;
pub use run::{handle_candidates, handle_generate, handle_pick, GenerateArgs, PickArgs};
pub use version::display_version;
