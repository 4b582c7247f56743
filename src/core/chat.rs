//! The running chat: one session wired to generation, persistence and voice.
//!
//! A turn is split in three so the caller can race it against a stop
//! request: [`ChatController::send`] (or `regenerate`/`retry`) records the
//! user's side, [`ChatController::turn_task`] returns a detached future doing
//! the network work, and [`ChatController::finish_turn`] applies its result.
//! [`ChatController::ask`] runs all three back to back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::attachments::Attachment;
use crate::core::auth::{AuthState, Identity};
use crate::core::config::Config;
use crate::core::conversation::{search_conversations, Conversation, ConversationPatch, SearchHit};
use crate::core::image::ImageGenerator;
use crate::core::message::ReactionKind;
use crate::core::persistence::PersistenceGateway;
use crate::core::providers::AIService;
use crate::core::session::{
    Applied, ConversationSession, PendingTurn, StopOutcome, SubmitError, TurnKind, TurnOutcome,
};
use crate::core::settings::Settings;
use crate::core::speech::{Speaker, SpeechOptions};
use crate::core::typing::RevealEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    pub typing_interval: Duration,
    pub typing_chunk: usize,
    /// When false replies appear in full as soon as they arrive.
    pub animate: bool,
}

impl ChatOptions {
    pub fn from_config(config: &Config, animate: bool) -> Self {
        Self {
            typing_interval: config.typing_interval(),
            typing_chunk: config.typing_chunk,
            animate,
        }
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            typing_interval: Duration::from_millis(30),
            typing_chunk: 1,
            animate: true,
        }
    }
}

pub struct ChatController {
    session: ConversationSession,
    service: Arc<AIService>,
    images: ImageGenerator,
    gateway: PersistenceGateway,
    auth: AuthState,
    speaker: Option<Speaker>,
    settings: Settings,
    conversations: Vec<Conversation>,
    reveal_events: mpsc::UnboundedReceiver<RevealEvent>,
    options: ChatOptions,
}

impl ChatController {
    pub fn new(
        service: Arc<AIService>,
        images: ImageGenerator,
        gateway: PersistenceGateway,
        auth: AuthState,
        speaker: Option<Speaker>,
        options: ChatOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: ConversationSession::new(tx, options.typing_chunk),
            service,
            images,
            gateway,
            auth,
            speaker,
            settings: Settings::default(),
            conversations: Vec::new(),
            reveal_events: rx,
            options,
        }
    }

    /// Loads settings, saved conversations and the scratch conversation for
    /// whoever is signed in now. Anything in flight is abandoned.
    pub async fn restore(&mut self) {
        let profile = self.gateway.load_profile().await;
        debug!(
            remote = self.gateway.is_remote_active(),
            conversations = profile.conversations.len(),
            messages = profile.active_messages.len(),
            "profile loaded"
        );
        self.settings = profile.settings;
        self.conversations = profile.conversations;
        self.session.load(profile.active_messages, None);
    }

    /// Sign-in loads the account's profile once, replacing what is on
    /// screen; local-only history is not merged into it. Sign-out keeps the
    /// local settings but starts a fresh conversation, so nothing from the
    /// account stays visible.
    pub async fn on_identity_changed(&mut self, identity: Option<Identity>) {
        self.stop().await;
        match &identity {
            Some(identity) => {
                info!(user = %identity.user.email, "signed in, reloading profile");
                self.restore().await;
            }
            None => {
                info!("signed out, starting a fresh conversation");
                self.settings = self.gateway.load_profile().await.settings;
                self.conversations.clear();
                self.gateway.clear_active_messages().await;
                self.session.reset();
            }
        }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn service(&self) -> &AIService {
        &self.service
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub async fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
        self.gateway.save_settings(&self.settings).await;
    }

    /// Selects the model for later text turns. Returns false for keys the
    /// service does not know.
    pub async fn set_model(&mut self, model_key: &str) -> bool {
        if !self.service.has_model(model_key) {
            return false;
        }
        let mut settings = self.settings.clone();
        settings.ai_model = model_key.to_string();
        self.update_settings(settings).await;
        true
    }

    pub async fn set_image_generation(&mut self, enabled: bool) {
        let mut settings = self.settings.clone();
        settings.image_generation = enabled;
        self.update_settings(settings).await;
    }

    /// The label shown for the model text turns currently go to.
    pub fn active_model_label(&self) -> Option<&str> {
        self.service
            .display_name_for(&self.settings.ai_model)
            .or_else(|| {
                self.service
                    .default_model_key()
                    .and_then(|key| self.service.display_name_for(key))
            })
    }

    pub async fn send(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<PendingTurn, SubmitError> {
        let turn = self.session.submit(
            text,
            attachments,
            &self.settings.ai_model,
            self.settings.image_generation,
        )?;
        self.persist_active().await;
        Ok(turn)
    }

    pub async fn regenerate(&mut self) -> Result<PendingTurn, SubmitError> {
        let turn = self
            .session
            .regenerate(&self.settings.ai_model, self.settings.image_generation)?;
        self.persist_active().await;
        Ok(turn)
    }

    pub fn retry(&mut self) -> Result<PendingTurn, SubmitError> {
        self.session.retry()
    }

    /// The network half of a turn. The future owns everything it needs, so
    /// it can be dropped or raced without touching the session.
    pub fn turn_task(&self, turn: &PendingTurn) -> impl Future<Output = TurnOutcome> + Send + 'static {
        let service = Arc::clone(&self.service);
        let images = self.images.clone();
        let kind = turn.kind.clone();
        async move {
            match kind {
                TurnKind::Text { prompt, model_key } => {
                    match service.generate_response(&prompt, &model_key).await {
                        Ok(completion) => TurnOutcome::Text(completion),
                        Err(err) => {
                            warn!("generation failed: {err}");
                            TurnOutcome::TextFailed(err.to_string())
                        }
                    }
                }
                TurnKind::Image { prompt } => match images.generate_image(&prompt).await {
                    Ok(url) => TurnOutcome::Image { url },
                    Err(err) => {
                        warn!("image generation failed: {err}");
                        TurnOutcome::ImageFailed
                    }
                },
            }
        }
    }

    /// Applies a finished turn and starts revealing a text reply.
    pub async fn finish_turn(&mut self, turn_id: u64, outcome: TurnOutcome) -> Applied {
        let applied = self.session.apply_outcome(turn_id, outcome);
        match &applied {
            Applied::Reveal(controller) => {
                self.persist_active().await;
                if self.options.animate {
                    controller.run(self.options.typing_interval);
                } else {
                    controller.finish();
                    self.drain_reveal_events().await;
                }
            }
            Applied::Appended { .. } => self.persist_active().await,
            Applied::Failed | Applied::Ignored => {}
        }
        applied
    }

    /// Sends `text` and waits for the reply to be applied.
    pub async fn ask(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Applied, SubmitError> {
        let turn = self.send(text, attachments).await?;
        let outcome = self.turn_task(&turn).await;
        Ok(self.finish_turn(turn.turn_id, outcome).await)
    }

    /// Waits for the next typing event.
    pub async fn next_reveal_event(&mut self) -> Option<RevealEvent> {
        self.reveal_events.recv().await
    }

    /// Feeds a typing event to the session. Returns the message id when a
    /// reveal has just completed.
    pub async fn handle_reveal_event(&mut self, event: &RevealEvent) -> Option<String> {
        let message_id = self.session.on_reveal_event(event)?;
        self.persist_active().await;
        self.speak(&message_id).await;
        Some(message_id)
    }

    async fn drain_reveal_events(&mut self) {
        while let Ok(event) = self.reveal_events.try_recv() {
            self.handle_reveal_event(&event).await;
        }
    }

    async fn speak(&self, message_id: &str) {
        if !self.settings.voice_enabled {
            return;
        }
        let (Some(speaker), Some(message)) = (&self.speaker, self.session.message(message_id))
        else {
            return;
        };
        let options = SpeechOptions::from_settings(&self.settings);
        if let Err(err) = speaker.speak(&message.text, &options).await {
            warn!("speech failed: {err}");
        }
    }

    /// Stops the running reveal or abandons the request in flight. A
    /// truncated reply is saved with exactly the text shown.
    pub async fn stop(&mut self) -> StopOutcome {
        if let Some(speaker) = &self.speaker {
            speaker.stop().await;
        }
        let outcome = self.session.stop_generation();
        if let StopOutcome::Truncated { .. } = outcome {
            self.persist_active().await;
        }
        self.drain_reveal_events().await;
        outcome
    }

    pub fn dismiss_error(&mut self) {
        self.session.dismiss_error();
    }

    pub async fn toggle_reaction(&mut self, message_id: &str, kind: ReactionKind) -> bool {
        let toggled = self.session.toggle_reaction(message_id, kind);
        if toggled {
            self.persist_active().await;
        }
        toggled
    }

    /// Saves the current conversation (if the user said anything) and starts
    /// a fresh one. Returns the saved conversation.
    pub async fn new_conversation(&mut self) -> Option<Conversation> {
        self.stop().await;
        let owner = self.auth.current().map(|identity| identity.user.id);
        let saved = match self.session.to_conversation(owner) {
            Some(snapshot) => Some(self.store_conversation(snapshot).await),
            None => None,
        };
        self.gateway.clear_active_messages().await;
        self.session.reset();
        saved
    }

    async fn store_conversation(&mut self, snapshot: Conversation) -> Conversation {
        if let Some(index) = self.conversations.iter().position(|c| c.id == snapshot.id) {
            let patch = ConversationPatch {
                title: Some(snapshot.title.clone()),
                messages: Some(snapshot.messages.clone()),
            };
            self.gateway.update_conversation(&snapshot.id, patch.clone()).await;
            self.conversations[index].apply_patch(patch);
            return self.conversations[index].clone();
        }
        let stored = self.gateway.save_conversation(snapshot).await;
        self.conversations.insert(0, stored.clone());
        stored
    }

    /// Makes a saved conversation the active one. Returns false for unknown
    /// ids.
    pub async fn select_conversation(&mut self, id: &str) -> bool {
        let Some(conversation) = self.conversations.iter().find(|c| c.id == id) else {
            return false;
        };
        let messages = conversation.messages.clone();
        if let Some(speaker) = &self.speaker {
            speaker.stop().await;
        }
        self.session.load(messages, Some(id.to_string()));
        self.drain_reveal_events().await;
        self.persist_active().await;
        true
    }

    /// Deletes a saved conversation; deleting the active one starts afresh
    /// without saving it again.
    pub async fn delete_conversation(&mut self, id: &str) {
        self.gateway.delete_conversation(id).await;
        self.conversations.retain(|c| c.id != id);
        if self.session.conversation_id() == Some(id) {
            self.stop().await;
            self.gateway.clear_active_messages().await;
            self.session.reset();
        }
    }

    /// Wipes local history and settings and starts a fresh conversation.
    /// Account data is left alone.
    pub async fn clear_history(&mut self) {
        self.stop().await;
        self.gateway.clear_local();
        self.conversations.clear();
        self.session.reset();
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        search_conversations(&self.conversations, query)
    }

    async fn persist_active(&self) {
        if self.settings.persist_history {
            self.gateway.save_active_messages(self.session.messages()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::User;
    use crate::core::config::ImageConfig;
    use crate::core::message::Message;
    use crate::core::persistence::{FileStore, LocalBackend, MemoryStore, RemoteBackend};
    use crate::core::session::WELCOME_MESSAGE;
    use crate::utils::test_utils::{
        create_test_messages, scripted_provider, FakeRemote, Scripted, ScriptedBackend,
    };
    use tempfile::TempDir;

    fn service(reply: &str) -> Arc<AIService> {
        let (provider, _calls) = scripted_provider(
            "alpha",
            &["k1"],
            ScriptedBackend::new().with("k1", Scripted::Reply(reply.to_string())),
        );
        AIService::new(vec![provider], Some("alpha")).shared()
    }

    fn failing_service() -> Arc<AIService> {
        let (provider, _calls) = scripted_provider("alpha", &["k1"], ScriptedBackend::new());
        AIService::new(vec![provider], Some("alpha")).shared()
    }

    fn images() -> ImageGenerator {
        ImageGenerator::new(
            reqwest::Client::new(),
            ImageConfig {
                base_url: "http://127.0.0.1:9/prompt".into(),
                placeholder_url: "http://127.0.0.1:9/svg".into(),
                probe_timeout_secs: 1,
                ..ImageConfig::default()
            },
        )
    }

    fn controller_with(service: Arc<AIService>, local: LocalBackend, animate: bool) -> ChatController {
        let mut chat = account_controller(service, local, None, AuthState::default());
        chat.options.animate = animate;
        chat
    }

    fn account_controller(
        service: Arc<AIService>,
        local: LocalBackend,
        remote: Option<Arc<FakeRemote>>,
        auth: AuthState,
    ) -> ChatController {
        let remote = remote.map(|remote| remote as Arc<dyn RemoteBackend>);
        let gateway = PersistenceGateway::new(local, remote, auth.clone());
        ChatController::new(
            service,
            images(),
            gateway,
            auth,
            None,
            ChatOptions {
                typing_interval: Duration::from_millis(1),
                typing_chunk: 1,
                animate: false,
            },
        )
    }

    fn memory_local() -> LocalBackend {
        LocalBackend::new(Arc::new(MemoryStore::new()))
    }

    fn identity() -> Identity {
        Identity {
            user: User {
                id: "user-1".into(),
                email: "ada@example.org".into(),
                created_at: None,
            },
            token: "jwt".into(),
        }
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|message| message.text.as_str()).collect()
    }

    #[tokio::test]
    async fn fresh_profile_starts_with_the_welcome_message() {
        let mut chat = controller_with(service("hi"), memory_local(), false);
        chat.restore().await;
        assert_eq!(chat.session().messages().len(), 1);
        assert_eq!(chat.session().messages()[0].text, WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn ask_appends_reply_and_persists_it() {
        let local = memory_local();
        let mut chat = controller_with(service("The answer is 42."), local.clone(), false);
        chat.restore().await;

        let applied = chat.ask("What is the answer?", Vec::new()).await.unwrap();
        assert!(matches!(applied, Applied::Reveal(_)));

        let saved = local.load_current().unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved[2].text, "The answer is 42.");
        assert_eq!(saved[2].model_label.as_deref(), Some("alpha (test)"));
        assert!(!chat.session().is_revealing());
    }

    #[tokio::test]
    async fn failed_generation_sets_error_and_retry_reuses_the_message() {
        let mut chat = controller_with(failing_service(), memory_local(), false);
        chat.restore().await;

        let applied = chat.ask("hello", Vec::new()).await.unwrap();
        assert!(matches!(applied, Applied::Failed));
        assert!(chat.session().error().is_some());

        let turn = chat.retry().unwrap();
        assert_eq!(chat.session().messages().len(), 2);
        assert!(chat.session().error().is_none());
        let outcome = chat.turn_task(&turn).await;
        chat.finish_turn(turn.turn_id, outcome).await;
        assert_eq!(chat.session().messages().len(), 2);
    }

    #[tokio::test]
    async fn stopping_a_reveal_persists_exactly_the_visible_text() {
        let dir = TempDir::new().expect("temp dir");
        let local = LocalBackend::new(Arc::new(FileStore::new(dir.path())));
        let mut chat = controller_with(service("The answer is 42."), local.clone(), true);
        chat.restore().await;

        let turn = chat.send("What is the answer?", Vec::new()).await.unwrap();
        let outcome = chat.turn_task(&turn).await;
        let Applied::Reveal(controller) = chat.session.apply_outcome(turn.turn_id, outcome)
        else {
            panic!("expected reveal");
        };
        for _ in 0..8 {
            controller.advance();
        }
        let stopped = chat.stop().await;
        assert_eq!(
            stopped,
            StopOutcome::Truncated {
                message_id: chat.session().messages()[2].id.clone(),
                text: "The answ".into(),
            }
        );

        let mut reloaded = controller_with(service("unused"), local, false);
        reloaded.restore().await;
        assert_eq!(reloaded.session().messages()[2].text, "The answ");
        assert_eq!(reloaded.session().messages(), chat.session().messages());
    }

    #[tokio::test]
    async fn animated_reveal_completes_through_the_event_loop() {
        let mut chat = controller_with(service("Hello there"), memory_local(), true);
        chat.restore().await;
        let turn = chat.send("hi", Vec::new()).await.unwrap();
        let outcome = chat.turn_task(&turn).await;
        chat.finish_turn(turn.turn_id, outcome).await;

        let completed = loop {
            let event = chat.next_reveal_event().await.expect("event");
            if let Some(message_id) = chat.handle_reveal_event(&event).await {
                break message_id;
            }
        };
        let message = chat.session().message(&completed).unwrap();
        assert_eq!(message.text, "Hello there");
        assert!(!chat.session().is_revealing());
    }

    #[tokio::test]
    async fn new_conversation_saves_and_resets() {
        let local = memory_local();
        let mut chat = controller_with(service("Sure."), local.clone(), false);
        chat.restore().await;
        chat.ask("Plan a trip to the mountains please", Vec::new())
            .await
            .unwrap();

        let saved = chat.new_conversation().await.expect("saved");
        assert_eq!(saved.title, "Plan a trip to the mountains p...");
        assert_eq!(chat.conversations().len(), 1);
        assert_eq!(chat.session().messages().len(), 1);
        assert!(local.load_current().unwrap().is_empty());
        assert_eq!(local.load_conversations().unwrap()[0].id, saved.id);

        // Nothing said yet, so nothing to save.
        assert!(chat.new_conversation().await.is_none());
        assert_eq!(chat.conversations().len(), 1);
    }

    #[tokio::test]
    async fn selecting_and_deleting_conversations() {
        let local = memory_local();
        let mut chat = controller_with(service("Sure."), local.clone(), false);
        chat.restore().await;
        chat.ask("first topic", Vec::new()).await.unwrap();
        let saved = chat.new_conversation().await.unwrap();

        assert!(chat.select_conversation(&saved.id).await);
        assert_eq!(chat.session().conversation_id(), Some(saved.id.as_str()));
        assert_eq!(chat.session().messages(), saved.messages.as_slice());
        assert!(!chat.select_conversation("missing").await);

        // Continuing a saved conversation updates it in place.
        chat.ask("follow up", Vec::new()).await.unwrap();
        let updated = chat.new_conversation().await.unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.messages.len(), saved.messages.len() + 2);
        assert_eq!(chat.conversations().len(), 1);

        chat.select_conversation(&saved.id).await;
        chat.delete_conversation(&saved.id).await;
        assert!(chat.conversations().is_empty());
        assert!(local.load_conversations().unwrap().is_empty());
        assert_eq!(chat.session().conversation_id(), None);
        assert_eq!(chat.session().messages().len(), 1);
    }

    #[tokio::test]
    async fn persist_history_off_keeps_the_scratch_slot_empty() {
        let local = memory_local();
        let mut chat = controller_with(service("ok"), local.clone(), false);
        chat.restore().await;
        let settings = Settings {
            persist_history: false,
            ..Settings::default()
        };
        chat.update_settings(settings).await;

        chat.ask("hello", Vec::new()).await.unwrap();
        assert!(local.load_current().unwrap().is_empty());
        assert!(!local.load_settings().unwrap().unwrap().persist_history);
    }

    #[tokio::test]
    async fn image_requests_fall_back_to_the_placeholder() {
        let mut chat = controller_with(service("unused"), memory_local(), false);
        chat.restore().await;

        let applied = chat.ask("draw a cat in space", Vec::new()).await.unwrap();
        let Applied::Appended { message_id } = applied else {
            panic!("expected appended image message");
        };
        let message = chat.session().message(&message_id).unwrap();
        assert!(message.text.contains("cat in space"));
        assert!(message
            .image_url
            .as_deref()
            .unwrap()
            .starts_with("http://127.0.0.1:9/svg?seed=cat+in+space"));
    }

    #[tokio::test]
    async fn model_selection_only_accepts_known_keys() {
        let mut chat = controller_with(service("ok"), memory_local(), false);
        chat.restore().await;
        assert!(chat.set_model("alpha").await);
        assert!(!chat.set_model("nope").await);
        assert_eq!(chat.settings().ai_model, "alpha");
        assert_eq!(chat.active_model_label(), Some("alpha (test)"));
    }

    #[tokio::test]
    async fn search_and_clear_history() {
        let local = memory_local();
        let mut chat = controller_with(service("Volcanoes erupt."), local.clone(), false);
        chat.restore().await;
        chat.ask("tell me about volcanoes", Vec::new()).await.unwrap();
        chat.new_conversation().await;

        let hits = chat.search("VOLCANO");
        assert!(!hits.is_empty());
        assert!(hits[0].message_id.is_none());

        chat.clear_history().await;
        assert!(chat.conversations().is_empty());
        assert!(local.load_conversations().unwrap().is_empty());
        assert!(chat.search("volcano").is_empty());
    }

    #[tokio::test]
    async fn sign_in_replaces_the_session_with_the_account_profile() {
        let remote = Arc::new(FakeRemote::default());
        let account_messages = create_test_messages();
        let saved = Conversation::from_messages("srv-1".into(), account_messages.clone(), None);
        {
            let mut state = remote.state.lock().unwrap();
            state.current = account_messages.clone();
            state.conversations = vec![saved.clone()];
        }
        let auth = AuthState::default();
        let mut chat = account_controller(
            service("local reply"),
            memory_local(),
            Some(Arc::clone(&remote)),
            auth.clone(),
        );
        chat.restore().await;
        chat.ask("local question", Vec::new()).await.unwrap();
        assert_eq!(chat.session().messages().len(), 3);

        auth.set(Some(identity()));
        chat.on_identity_changed(Some(identity())).await;

        assert_eq!(chat.session().messages(), account_messages.as_slice());
        assert_eq!(chat.conversations(), &[saved]);
        // Nothing typed before signing in reaches the account.
        assert_eq!(remote.state.lock().unwrap().current, account_messages);
        assert!(!remote.calls().iter().any(|call| call == "create"));
    }

    #[tokio::test]
    async fn sign_out_starts_a_welcome_only_conversation() {
        let remote = Arc::new(FakeRemote::default());
        let local = memory_local();
        let auth = AuthState::new(Some(identity()));
        let mut chat = account_controller(
            service("secret reply"),
            local.clone(),
            Some(Arc::clone(&remote)),
            auth.clone(),
        );
        chat.restore().await;
        chat.ask("first account topic", Vec::new()).await.unwrap();
        chat.new_conversation().await.expect("saved");
        chat.ask("account-private question", Vec::new()).await.unwrap();
        assert_eq!(chat.conversations().len(), 1);

        auth.set(None);
        chat.on_identity_changed(None).await;

        assert_eq!(texts(chat.session().messages()), vec![WELCOME_MESSAGE]);
        assert!(chat.conversations().is_empty());
        assert_eq!(chat.session().conversation_id(), None);
        assert!(local.load_current().unwrap().is_empty());
        // The account keeps its own copy.
        let account_current = remote.state.lock().unwrap().current.clone();
        assert_eq!(
            texts(&account_current)[1..].to_vec(),
            vec!["account-private question", "secret reply"]
        );
    }
}
