//! # Utility Functions and Helpers
//!
//! - [`logging`]: tracing subscriber and color setup
//! - [`settings`]: configuration loading with CLI overrides

pub mod logging;
pub mod settings;

pub use logging::initialize_logging;
pub use settings::load_config;
