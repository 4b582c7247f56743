//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod account;
pub mod history;
pub mod keys;
pub mod model_list;
pub mod repl;

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::account::{run_login, run_logout, run_register};
use crate::cli::history::show_history;
use crate::cli::keys::{clear_keys, set_keys};
use crate::cli::model_list::list_models;
use crate::cli::repl::{run_ask, run_chat};
use crate::core::auth::{AuthClient, AuthState};
use crate::core::config::Config;
use crate::core::persistence::{
    FileStore, HttpRemoteBackend, LocalBackend, PersistenceGateway, RemoteBackend,
};

/// Environment variable holding the `tracing` filter, e.g. `multichat=debug`.
pub const LOG_FILTER_ENV: &str = "MULTICHAT_LOG";

#[derive(Parser)]
#[command(name = "multichat")]
#[command(about = "A terminal chat client that spreads requests across several AI providers")]
#[command(
    long_about = "multichat sends each message to one of several AI providers (Gemini, Groq, \
DeepSeek, Hugging Face), rotating through every API key a provider has before falling back \
to the default model.\n\n\
Credentials:\n\
  Keys come from the config file, then environment variables (e.g. GROQ_API_KEY, \
GROQ_API_KEY_2), then the system keyring ('multichat auth set <provider>').\n\n\
Commands inside the chat:\n\
  /stop             Stop the reply being typed (an empty line does the same)\n\
  /regen            Ask again for the last reply\n\
  /retry            Retry after an error\n\
  /new              Save this conversation and start a new one\n\
  /model <KEY>      Switch model; /models lists them\n\
  /image on|off     Toggle image generation for \"draw ...\" requests\n\
  /attach <PATH>    Attach a file to the next message\n\
  /react <N> <KIND> React to message N (like, dislike, love, laugh, wow, sad, angry)\n\
  /log [FILE]       Log the transcript to FILE, or toggle logging\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model key to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,

    /// Show replies at once instead of typing them out
    #[arg(long, global = true)]
    pub no_typing: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send one prompt and print the reply
    Ask {
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// List models and whether they have credentials
    Models,
    /// Manage provider API keys in the system keyring
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Sign in to the account backend
    Login { email: String },
    /// Create an account on the account backend
    Register { email: String },
    /// Sign out of the account backend
    Logout,
    /// List saved conversations, or search them
    History { query: Option<String> },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store keys for a provider, read one per line from stdin
    Set { provider: String },
    /// Remove stored keys for a provider
    Clear { provider: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second initialisation (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::load()?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let context = AppContext::build(config).await?;
            run_chat(context, args.model, args.log, !args.no_typing).await
        }
        Commands::Ask { prompt } => run_ask(&config, prompt.join(" "), args.model).await,
        Commands::Models => list_models(&config),
        Commands::Auth { command } => match command {
            AuthCommands::Set { provider } => set_keys(&config, &provider),
            AuthCommands::Clear { provider } => clear_keys(&config, &provider),
        },
        Commands::Login { email } => {
            let context = AppContext::build(config).await?;
            run_login(&context, &email).await
        }
        Commands::Register { email } => {
            let context = AppContext::build(config).await?;
            run_register(&context, &email).await
        }
        Commands::Logout => {
            let context = AppContext::build(config).await?;
            run_logout(&context);
            Ok(())
        }
        Commands::History { query } => {
            let context = AppContext::build(config).await?;
            show_history(&context, query.as_deref()).await
        }
    }
}

/// Storage, sign-in state and HTTP client shared by the commands that touch
/// the user's profile.
pub struct AppContext {
    pub config: Config,
    pub http: reqwest::Client,
    pub auth: AuthState,
    pub auth_client: AuthClient,
    pub gateway: PersistenceGateway,
}

impl AppContext {
    /// Opens local storage and restores a stored sign-in, if any.
    pub async fn build(config: Config) -> Result<Self, Box<dyn Error>> {
        let local = LocalBackend::new(Arc::new(FileStore::new(config.resolve_data_dir()?)));
        Self::with_local(config, local).await
    }

    pub async fn with_local(config: Config, local: LocalBackend) -> Result<Self, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let remote_url = config.remote.as_ref().map(|remote| remote.base_url.clone());

        let auth = AuthState::default();
        let auth_client = AuthClient::new(http.clone(), remote_url.clone(), local.clone(), auth.clone());
        if remote_url.is_some() {
            auth_client.restore().await;
        }

        let remote = remote_url.map(|url| {
            Arc::new(HttpRemoteBackend::new(http.clone(), &url)) as Arc<dyn RemoteBackend>
        });
        let gateway = PersistenceGateway::new(local, remote, auth.clone());

        Ok(Self {
            config,
            http,
            auth,
            auth_client,
            gateway,
        })
    }
}
