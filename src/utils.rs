//! Utility functions and helpers.

pub mod preflight;
pub mod settings;

pub use preflight::{check_credentials, credentials_from, CredentialInfo};
pub use settings::{get_env_var, Settings};
