#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod notify;
pub mod oracle;
pub mod orchestrator;
pub mod registry;
pub mod routing;
pub mod server;
pub mod synthesis;
pub mod util;

pub use config::Config;
pub use error::{ConductorError, Result};
