//! State machine for the active conversation.
//!
//! The session never performs I/O. `submit`, `retry` and `regenerate` hand
//! back a [`PendingTurn`] describing the request to run; the caller runs it
//! and reports back through [`ConversationSession::apply_outcome`]. Outcomes
//! for a turn the session has since abandoned are ignored by turn id.

use std::error::Error;
use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use crate::core::attachments::{contextualize_prompt, Attachment};
use crate::core::classifier::{extract_image_prompt, is_image_request};
use crate::core::conversation::Conversation;
use crate::core::message::{Message, ReactionKind};
use crate::core::providers::Completion;
use crate::core::typing::{RevealEvent, TypingController};
use crate::utils::ids::new_id;

pub const WELCOME_MESSAGE: &str = "Hello! I'm your AI assistant with multi-model support. I can help you with questions, creative tasks, problem-solving, generate images, and much more. You can switch between different AI models in settings, use voice input/output, attach files, and generate images. How can I assist you today?";
pub const WELCOME_LABEL: &str = "AI Assistant";
pub const IMAGE_MODEL_LABEL: &str = "AI Image Generator";

pub fn image_reply_text(prompt: &str) -> String {
    format!("I've generated an image based on your request: \"{prompt}\"")
}

pub fn image_apology_text(prompt: &str) -> String {
    format!(
        "Sorry, I couldn't generate an image for \"{prompt}\". The image generation service might be temporarily unavailable. Please try again later."
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// A turn is already awaiting a reply or being revealed.
    Busy,
    EmptyMessage,
    NothingToRegenerate,
    NothingToRetry,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Busy => write!(f, "Still working on the previous message"),
            SubmitError::EmptyMessage => write!(f, "Message is empty"),
            SubmitError::NothingToRegenerate => write!(f, "There is no reply to regenerate"),
            SubmitError::NothingToRetry => write!(f, "There is no failed message to retry"),
        }
    }
}

impl Error for SubmitError {}

/// What the caller must run for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnKind {
    Text { prompt: String, model_key: String },
    Image { prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub turn_id: u64,
    pub kind: TurnKind,
}

/// Result of running a [`PendingTurn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Text(Completion),
    TextFailed(String),
    Image { url: String },
    ImageFailed,
}

/// How the session changed in response to an outcome.
#[derive(Debug, Clone)]
pub enum Applied {
    /// The turn was abandoned (stopped or superseded); nothing changed.
    Ignored,
    /// An assistant reply was appended and its reveal is ready to run.
    Reveal(TypingController),
    /// An image reply (or apology) was appended; no reveal.
    Appended { message_id: String },
    /// The turn failed; the session now carries an error.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// A reveal was cut short; the message now holds `text`.
    Truncated { message_id: String, text: String },
    /// A request was still in flight; its result will be discarded.
    Abandoned,
    Idle,
}

#[derive(Debug, Clone)]
struct ActiveReveal {
    message_id: String,
    controller: TypingController,
}

#[derive(Debug)]
pub struct ConversationSession {
    messages: Vec<Message>,
    conversation_id: Option<String>,
    is_loading: bool,
    is_generating_image: bool,
    error: Option<String>,
    next_turn_id: u64,
    pending: Option<PendingTurn>,
    last_turn: Option<TurnKind>,
    reveal: Option<ActiveReveal>,
    next_reveal_id: u64,
    typing_chunk: usize,
    reveal_events: mpsc::UnboundedSender<RevealEvent>,
}

impl ConversationSession {
    /// A fresh conversation holding only the welcome message.
    pub fn new(reveal_events: mpsc::UnboundedSender<RevealEvent>, typing_chunk: usize) -> Self {
        Self {
            messages: vec![welcome_message()],
            conversation_id: None,
            is_loading: false,
            is_generating_image: false,
            error: None,
            next_turn_id: 0,
            pending: None,
            last_turn: None,
            reveal: None,
            next_reveal_id: 0,
            typing_chunk,
            reveal_events,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn set_conversation_id(&mut self, id: Option<String>) {
        self.conversation_id = id;
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_generating_image(&self) -> bool {
        self.is_generating_image
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_generating_image || self.reveal.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn pending_turn(&self) -> Option<&PendingTurn> {
        self.pending.as_ref()
    }

    /// True once the user has said something worth saving.
    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }

    /// Appends the user's message and returns the request to run.
    ///
    /// Image requests (when enabled) go to the image path, everything else to
    /// text generation with attachments folded into the prompt.
    pub fn submit(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
        model_key: &str,
        image_generation: bool,
    ) -> Result<PendingTurn, SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }

        let kind = classify_turn(text, &attachments, model_key, image_generation);
        self.messages.push(Message::user(text, attachments));
        Ok(self.dispatch(kind))
    }

    /// Clears the error and re-runs the last turn without re-appending the
    /// user's message.
    pub fn retry(&mut self) -> Result<PendingTurn, SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }
        if self.error.is_none() {
            return Err(SubmitError::NothingToRetry);
        }
        let kind = self.last_turn.clone().ok_or(SubmitError::NothingToRetry)?;
        Ok(self.dispatch(kind))
    }

    /// Drops the trailing assistant reply and asks again for the user message
    /// that produced it.
    pub fn regenerate(
        &mut self,
        model_key: &str,
        image_generation: bool,
    ) -> Result<PendingTurn, SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }

        let reply_index = self
            .messages
            .len()
            .checked_sub(1)
            .filter(|&index| self.messages[index].is_assistant())
            .ok_or(SubmitError::NothingToRegenerate)?;
        let user_index = self.messages[..reply_index]
            .iter()
            .rposition(Message::is_user)
            .ok_or(SubmitError::NothingToRegenerate)?;

        let removed = self.messages.remove(reply_index);
        debug!(message_id = %removed.id, "regenerating reply");

        let user = &self.messages[user_index];
        let kind = classify_turn(&user.text, &user.attachments, model_key, image_generation);
        Ok(self.dispatch(kind))
    }

    fn dispatch(&mut self, kind: TurnKind) -> PendingTurn {
        self.error = None;
        match kind {
            TurnKind::Text { .. } => self.is_loading = true,
            TurnKind::Image { .. } => self.is_generating_image = true,
        }
        self.next_turn_id += 1;
        let turn = PendingTurn {
            turn_id: self.next_turn_id,
            kind: kind.clone(),
        };
        self.last_turn = Some(kind);
        self.pending = Some(turn.clone());
        turn
    }

    /// Applies the result of a turn. Results for anything but the current
    /// pending turn are dropped.
    pub fn apply_outcome(&mut self, turn_id: u64, outcome: TurnOutcome) -> Applied {
        let Some(pending) = self.pending.take_if(|pending| pending.turn_id == turn_id) else {
            debug!(turn_id, "ignoring outcome for abandoned turn");
            return Applied::Ignored;
        };
        self.is_loading = false;
        self.is_generating_image = false;

        let image_prompt = match &pending.kind {
            TurnKind::Image { prompt } => prompt.clone(),
            TurnKind::Text { .. } => String::new(),
        };

        match outcome {
            TurnOutcome::Text(completion) => {
                let message = Message::assistant(completion.text, completion.model_label);
                self.next_reveal_id += 1;
                let controller = TypingController::new(
                    self.next_reveal_id,
                    &message.text,
                    self.typing_chunk,
                    self.reveal_events.clone(),
                );
                self.reveal = Some(ActiveReveal {
                    message_id: message.id.clone(),
                    controller: controller.clone(),
                });
                self.messages.push(message);
                Applied::Reveal(controller)
            }
            TurnOutcome::TextFailed(error) => {
                self.error = Some(error);
                Applied::Failed
            }
            TurnOutcome::Image { url } => {
                let mut message =
                    Message::assistant(image_reply_text(&image_prompt), IMAGE_MODEL_LABEL);
                message.image_url = Some(url);
                message.image_prompt = Some(image_prompt);
                let message_id = message.id.clone();
                self.messages.push(message);
                Applied::Appended { message_id }
            }
            TurnOutcome::ImageFailed => {
                let message =
                    Message::assistant(image_apology_text(&image_prompt), IMAGE_MODEL_LABEL);
                let message_id = message.id.clone();
                self.messages.push(message);
                Applied::Appended { message_id }
            }
        }
    }

    /// Handles an event from the active reveal. Returns the id of the
    /// revealed message once its reveal completes.
    pub fn on_reveal_event(&mut self, event: &RevealEvent) -> Option<String> {
        let active = self.reveal.as_ref()?;
        if active.controller.reveal_id() != event.reveal_id() {
            return None;
        }
        match event {
            RevealEvent::Completed { .. } => self.reveal.take().map(|active| active.message_id),
            RevealEvent::Progress { .. } | RevealEvent::Stopped { .. } => None,
        }
    }

    /// The text currently visible for the message being revealed.
    pub fn revealed_text(&self) -> Option<String> {
        self.reveal
            .as_ref()
            .map(|active| active.controller.revealed())
    }

    /// Stops whatever the session is doing.
    ///
    /// A running reveal is halted and the message keeps exactly the text
    /// shown so far. An in-flight request is abandoned and its result will
    /// be ignored.
    pub fn stop_generation(&mut self) -> StopOutcome {
        if let Some(active) = self.reveal.take() {
            let text = active.controller.stop();
            if let Some(message) = self.messages.iter_mut().find(|m| m.id == active.message_id) {
                message.text = text.clone();
            }
            return StopOutcome::Truncated {
                message_id: active.message_id,
                text,
            };
        }

        if self.pending.take().is_some() {
            self.is_loading = false;
            self.is_generating_image = false;
            return StopOutcome::Abandoned;
        }

        StopOutcome::Idle
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn toggle_reaction(&mut self, message_id: &str, kind: ReactionKind) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.toggle_reaction(kind);
                true
            }
            None => false,
        }
    }

    /// Replaces the session with stored messages, e.g. after loading a
    /// profile or selecting a saved conversation. Anything in flight is
    /// abandoned.
    pub fn load(&mut self, messages: Vec<Message>, conversation_id: Option<String>) {
        self.stop_generation();
        self.messages = if messages.is_empty() {
            vec![welcome_message()]
        } else {
            messages
        };
        self.conversation_id = conversation_id;
        self.error = None;
        self.last_turn = None;
    }

    /// Starts over with a fresh welcome conversation.
    pub fn reset(&mut self) {
        self.load(Vec::new(), None);
    }

    /// Snapshot of the session as a saved conversation, or `None` when the
    /// user has not said anything yet. A new id is assigned on first save.
    pub fn to_conversation(&mut self, owner_id: Option<String>) -> Option<Conversation> {
        if !self.has_user_messages() {
            return None;
        }
        let id = self.conversation_id.get_or_insert_with(new_id).clone();
        Some(Conversation::from_messages(
            id,
            self.messages.clone(),
            owner_id,
        ))
    }
}

pub fn welcome_message() -> Message {
    Message::assistant(WELCOME_MESSAGE, WELCOME_LABEL)
}

fn classify_turn(
    text: &str,
    attachments: &[Attachment],
    model_key: &str,
    image_generation: bool,
) -> TurnKind {
    if image_generation && is_image_request(text) {
        TurnKind::Image {
            prompt: extract_image_prompt(text),
        }
    } else {
        TurnKind::Text {
            prompt: contextualize_prompt(text, attachments),
            model_key: model_key.to_string(),
        }
    }
}
