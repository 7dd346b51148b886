#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod install;
pub mod paths;
pub mod restore;
pub mod scoring;
pub mod store;
pub mod transcript;
pub mod types;
pub mod util;

pub use config::ContextConfig;
pub use error::{ContextError, Result};
