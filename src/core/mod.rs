pub mod attachments;
pub mod auth;
pub mod builtin_providers;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod image;
pub mod keyring;
pub mod message;
pub mod persistence;
pub mod providers;
pub mod session;
pub mod settings;
pub mod speech;
pub mod typing;
