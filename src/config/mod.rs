//! Configuration
//!
//! Loads ~/.config/rosterwatch/config.yaml (or a path given on the command
//! line), then applies environment overrides. A `.env` file in the working
//! directory is read into the environment first.

mod settings;
pub mod validation;

pub use settings::{Settings, DEFAULT_TITLE, TOKEN_ENV_VARS};
pub use validation::{validate_settings, ValidationError};
