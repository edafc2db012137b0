//! # omni-gen
//!
//! Client toolkit for asynchronous media generation services that answer
//! a submission with either a finished result or a job id to poll.
//!
//! ## Features
//!
//! - One classification rule for submit, poll and webhook payloads
//! - Deadline-bounded polling with cooperative cancellation
//! - Exponential backoff for transport failures
//! - Embedded endpoint catalog with per-media polling defaults
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omni_gen::job::{AsyncJobClient, ClientConfig, GenerationRequest};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = ClientConfig::new("https://modelslab.com/api/v6").with_api_key("secret");
//! let client = AsyncJobClient::with_http(config)?;
//! let request = GenerationRequest::new("/images/text2img").param("prompt", "a lighthouse");
//! let outputs = client.run_default(&request).await?.into_outputs()?;
//! println!("{outputs:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod job;
pub mod profiles;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of omni-gen.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
