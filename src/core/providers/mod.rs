//! Text generation across several LLM providers.
//!
//! Failover happens at two levels: [`AIProvider`] rotates through its own
//! keys, and [`AIService`] retries a failed provider once against the
//! default.

mod client;
mod credentials;
mod error;
mod family;
mod provider;
mod rotator;
mod service;

pub use client::{CompletionBackend, ProviderClient};
pub use credentials::{collect_api_keys, collect_api_keys_from_env};
pub use error::{summarize_api_error, AttemptError, GenerationError, ProviderError};
pub use family::ProviderFamily;
pub use provider::AIProvider;
pub use rotator::KeyRotator;
pub use service::{AIModel, AIService, Completion};
