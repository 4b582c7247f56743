//! Line-based chat loop and the one-shot `ask` command.

use std::error::Error;
use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cli::AppContext;
use crate::core::attachments::{load_attachment, Attachment};
use crate::core::chat::{ChatController, ChatOptions};
use crate::core::config::Config;
use crate::core::image::ImageGenerator;
use crate::core::keyring::SystemKeyStore;
use crate::core::message::{Message, ReactionKind, Role};
use crate::core::providers::AIService;
use crate::core::session::{Applied, PendingTurn, StopOutcome, SubmitError, TurnOutcome};
use crate::core::speech::Speaker;
use crate::core::typing::RevealEvent;
use crate::utils::logging::LoggingState;

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    /// An empty line; stops a running reveal.
    Empty,
    Stop,
    Regenerate,
    Retry,
    New,
    Model(String),
    Models,
    Image(bool),
    Attach(String),
    React { index: usize, kind: ReactionKind },
    Log(Option<String>),
    Quit,
    Invalid(String),
}

pub fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ReplCommand::Send(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|arg| !arg.is_empty());

    match (name, arg) {
        ("stop", None) => ReplCommand::Stop,
        ("regen" | "regenerate", None) => ReplCommand::Regenerate,
        ("retry", None) => ReplCommand::Retry,
        ("new", None) => ReplCommand::New,
        ("models", None) => ReplCommand::Models,
        ("model", Some(key)) => ReplCommand::Model(key.to_string()),
        ("image", Some("on")) => ReplCommand::Image(true),
        ("image", Some("off")) => ReplCommand::Image(false),
        ("attach", Some(path)) => ReplCommand::Attach(path.to_string()),
        ("react", Some(arg)) => parse_reaction(arg),
        ("log", arg) => ReplCommand::Log(arg.map(str::to_string)),
        ("quit" | "exit", None) => ReplCommand::Quit,
        _ => ReplCommand::Invalid(format!("Unknown or malformed command: /{rest}")),
    }
}

fn parse_reaction(arg: &str) -> ReplCommand {
    let mut parts = arg.split_whitespace();
    let index = parts.next().and_then(|n| n.parse::<usize>().ok());
    let kind = parts.next().and_then(ReactionKind::parse);
    match (index, kind, parts.next()) {
        (Some(index), Some(kind), None) if index > 0 => ReplCommand::React { index, kind },
        _ => ReplCommand::Invalid(
            "Usage: /react <N> <like|dislike|love|laugh|wow|sad|angry>".to_string(),
        ),
    }
}

type TurnFuture = Pin<Box<dyn Future<Output = TurnOutcome> + Send>>;

struct InFlight {
    turn_id: u64,
    future: TurnFuture,
}

async fn await_turn(in_flight: &mut Option<InFlight>) -> (u64, TurnOutcome) {
    match in_flight {
        Some(turn) => (turn.turn_id, turn.future.as_mut().await),
        None => std::future::pending().await,
    }
}

struct Repl {
    chat: ChatController,
    logging: LoggingState,
    in_flight: Option<InFlight>,
    attachments: Vec<Attachment>,
    /// Bytes of the current reveal already printed.
    printed: usize,
}

pub async fn run_chat(
    context: AppContext,
    model: Option<String>,
    log: Option<String>,
    animate: bool,
) -> Result<(), Box<dyn Error>> {
    let AppContext {
        config,
        http,
        auth,
        gateway,
        ..
    } = context;

    let service = AIService::from_config(&config, &SystemKeyStore)?.shared();
    if service.list_models().is_empty() {
        return Err(no_models_error().into());
    }
    let images = ImageGenerator::new(http, config.image.clone());
    let speaker = config.speech_command.clone().map(Speaker::new);
    let mut chat = ChatController::new(
        service,
        images,
        gateway,
        auth.clone(),
        speaker,
        ChatOptions::from_config(&config, animate),
    );
    chat.restore().await;

    if let Some(model) = model {
        if !chat.set_model(&model).await {
            eprintln!("⚠️  Unknown model '{model}', using the default");
        }
    }

    let mut repl = Repl {
        chat,
        logging: LoggingState::new(log)?,
        in_flight: None,
        attachments: Vec::new(),
        printed: 0,
    };
    repl.print_banner();

    let mut identity = auth.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !repl.handle_command(parse_command(&line)).await {
                    break;
                }
            }
            (turn_id, outcome) = await_turn(&mut repl.in_flight) => {
                repl.in_flight = None;
                repl.finish_turn(turn_id, outcome).await;
            }
            Some(event) = repl.chat.next_reveal_event() => {
                repl.on_reveal_event(event).await;
            }
            Some(changed) = identity.changed() => {
                repl.in_flight = None;
                repl.chat.on_identity_changed(changed).await;
                repl.print_banner();
            }
        }
    }

    repl.chat.stop().await;
    Ok(())
}

impl Repl {
    fn print_banner(&self) {
        let label = self.chat.active_model_label().unwrap_or("default model");
        println!("💬 multichat ({label}). Type /quit to leave.");
        if let Some(identity) = self.chat.auth().current() {
            println!("👤 Signed in as {}", identity.user.email);
        }
        println!();
        for message in self.chat.session().messages() {
            print_message(message);
        }
    }

    /// Returns false when the loop should end.
    async fn handle_command(&mut self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Quit => return false,
            ReplCommand::Empty => {
                if self.chat.session().is_revealing() {
                    self.stop().await;
                }
            }
            ReplCommand::Stop => self.stop().await,
            ReplCommand::Send(text) => {
                let attachments = std::mem::take(&mut self.attachments);
                let result = self.chat.send(&text, attachments).await;
                if result.is_ok() {
                    self.log_last_message();
                }
                self.start_turn(result);
            }
            ReplCommand::Regenerate => {
                let result = self.chat.regenerate().await;
                if result.is_ok() {
                    self.rewrite_log();
                }
                self.start_turn(result);
            }
            ReplCommand::Retry => {
                let result = self.chat.retry();
                self.start_turn(result);
            }
            ReplCommand::New => {
                self.in_flight = None;
                match self.chat.new_conversation().await {
                    Some(saved) => println!("💾 Saved \"{}\"", saved.title),
                    None => println!("Started a new conversation"),
                }
                println!();
                if let Some(welcome) = self.chat.session().messages().first() {
                    print_message(welcome);
                }
            }
            ReplCommand::Model(key) => {
                if self.chat.set_model(&key).await {
                    println!("✅ Using {}", self.chat.active_model_label().unwrap_or(&key));
                } else {
                    eprintln!("❌ Unknown model '{key}'. Use /models to list them.");
                }
            }
            ReplCommand::Models => {
                for model in self.chat.service().list_models() {
                    let marker = if model.key == self.chat.settings().ai_model {
                        "*"
                    } else {
                        " "
                    };
                    println!("{marker} {:<18} {}", model.key, model.display_name);
                }
            }
            ReplCommand::Image(enabled) => {
                self.chat.set_image_generation(enabled).await;
                println!(
                    "🎨 Image generation {}",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            ReplCommand::Attach(path) => match load_attachment(Path::new(&path)) {
                Ok(attachment) => {
                    println!("📎 Attached {} ({})", attachment.name, attachment.mime_type);
                    self.attachments.push(attachment);
                }
                Err(err) => eprintln!("❌ {err}"),
            },
            ReplCommand::React { index, kind } => {
                let message_id = self
                    .chat
                    .session()
                    .messages()
                    .get(index - 1)
                    .map(|message| message.id.clone());
                match message_id {
                    Some(id) => {
                        self.chat.toggle_reaction(&id, kind).await;
                        if let Some(message) = self.chat.session().message(&id) {
                            println!("{} × {}", kind.as_str(), message.reaction_count(kind));
                        }
                    }
                    None => eprintln!("❌ No message #{index}"),
                }
            }
            ReplCommand::Log(Some(path)) => match self.logging.set_log_file(path) {
                Ok(status) => println!("{status}"),
                Err(err) => eprintln!("❌ {err}"),
            },
            ReplCommand::Log(None) => match self.logging.toggle_logging() {
                Ok(status) => println!("{status}"),
                Err(err) => eprintln!("❌ {err}"),
            },
            ReplCommand::Invalid(message) => eprintln!("{message}"),
        }
        true
    }

    fn start_turn(&mut self, result: Result<PendingTurn, SubmitError>) {
        match result {
            Ok(turn) => {
                let future = Box::pin(self.chat.turn_task(&turn));
                self.in_flight = Some(InFlight {
                    turn_id: turn.turn_id,
                    future,
                });
                println!("…");
            }
            Err(err) => eprintln!("⚠️  {err}"),
        }
    }

    async fn finish_turn(&mut self, turn_id: u64, outcome: TurnOutcome) {
        match self.chat.finish_turn(turn_id, outcome).await {
            Applied::Reveal(controller) => {
                let label = self
                    .chat
                    .session()
                    .messages()
                    .last()
                    .and_then(|message| message.model_label.as_deref());
                if let Some(label) = label {
                    println!("[{label}]");
                }
                if controller.is_completed() {
                    println!("{}", controller.full_text());
                    println!();
                    self.log_last_message();
                } else {
                    self.printed = 0;
                }
            }
            Applied::Appended { message_id } => {
                if let Some(message) = self.chat.session().message(&message_id) {
                    print_message(message);
                }
                self.log_last_message();
            }
            Applied::Failed => {
                if let Some(error) = self.chat.session().error() {
                    eprintln!("❌ {error}");
                    eprintln!("   /retry to try again");
                }
            }
            Applied::Ignored => {}
        }
    }

    async fn on_reveal_event(&mut self, event: RevealEvent) {
        match &event {
            RevealEvent::Progress { revealed, .. } if self.chat.session().is_revealing() => {
                self.print_reveal(revealed);
            }
            RevealEvent::Completed { text, .. } => {
                if self.chat.handle_reveal_event(&event).await.is_some() {
                    self.print_reveal(text);
                    println!();
                    println!();
                    self.log_last_message();
                }
            }
            _ => {
                self.chat.handle_reveal_event(&event).await;
            }
        }
    }

    fn print_reveal(&mut self, revealed: &str) {
        if let Some(tail) = revealed.get(self.printed..) {
            print!("{tail}");
            let _ = io::stdout().flush();
            self.printed = revealed.len();
        }
    }

    async fn stop(&mut self) {
        match self.chat.stop().await {
            StopOutcome::Truncated { .. } => {
                println!(" [stopped]");
                println!();
                self.log_last_message();
            }
            StopOutcome::Abandoned => {
                self.in_flight = None;
                println!("[cancelled]");
            }
            StopOutcome::Idle => {}
        }
    }

    fn log_last_message(&self) {
        if let Some(message) = self.chat.session().messages().last() {
            if let Err(err) = self.logging.log_message(message) {
                warn!("failed to write transcript: {err}");
            }
        }
    }

    fn rewrite_log(&self) {
        if let Err(err) = self.logging.rewrite_log(self.chat.session().messages()) {
            warn!("failed to rewrite transcript: {err}");
        }
    }
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("You: {}", message.text),
        Role::Assistant => {
            if let Some(label) = &message.model_label {
                println!("[{label}]");
            }
            println!("{}", message.text);
            if let Some(url) = &message.image_url {
                println!("🖼  {url}");
            }
        }
    }
    println!();
}

fn no_models_error() -> String {
    "❌ No provider has an API key.\n\nSet one of GEMINI_API_KEY, GROQ_API_KEY, DEEPSEEK_API_KEY or HUGGINGFACE_API_KEY, or run 'multichat auth set <provider>'.".to_string()
}

/// One prompt, one reply, nothing saved.
pub async fn run_ask(
    config: &Config,
    prompt: String,
    model: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        return Err("Usage: multichat ask <prompt>".into());
    }

    let service = AIService::from_config(config, &SystemKeyStore)?;
    let Some(default_key) = service.default_model_key().map(str::to_string) else {
        return Err(no_models_error().into());
    };
    let model_key = model.unwrap_or(default_key);

    let completion = service
        .generate_response(&prompt, &model_key)
        .await?;
    println!("{}", completion.text);
    Ok(())
}
