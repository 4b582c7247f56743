//! multichat is a terminal chat client that spreads conversations across
//! several LLM providers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns provider failover and key rotation, the conversation
//!   session, the typing reveal, persistence and sign-in.
//! - [`cli`] parses arguments and runs the line-oriented chat loop and the
//!   one-shot commands.
//! - [`api`] defines the wire payloads for each provider family.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
