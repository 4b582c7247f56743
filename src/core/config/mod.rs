pub mod data;
pub mod io;

pub use data::{Config, ImageConfig, ProviderConfig, RemoteConfig};
pub use io::ConfigError;

#[cfg(test)]
mod tests;
