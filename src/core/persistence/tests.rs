use super::*;
use crate::core::auth::{Identity, User};
use crate::core::session::ConversationSession;
use crate::core::session::{Applied, TurnOutcome};
use crate::core::providers::Completion;
use crate::utils::test_utils::{create_test_messages, spawn_mock_server, FakeRemote};
use tempfile::TempDir;

fn signed_in() -> AuthState {
    AuthState::new(Some(Identity {
        user: User {
            id: "user-1".into(),
            email: "ada@example.org".into(),
            created_at: None,
        },
        token: "jwt".into(),
    }))
}

fn gateway_with(
    remote: Option<Arc<FakeRemote>>,
    auth: AuthState,
) -> (PersistenceGateway, LocalBackend) {
    let local = LocalBackend::new(Arc::new(MemoryStore::new()));
    let remote = remote.map(|remote| remote as Arc<dyn RemoteBackend>);
    (PersistenceGateway::new(local.clone(), remote, auth), local)
}

#[tokio::test]
async fn signed_out_writes_stay_local() {
    let remote = Arc::new(FakeRemote::default());
    let (gateway, local) = gateway_with(Some(Arc::clone(&remote)), AuthState::default());
    let messages = create_test_messages();

    gateway.save_active_messages(&messages).await;
    gateway.save_settings(&Settings::default()).await;

    assert_eq!(local.load_current().unwrap(), messages);
    assert!(remote.calls().is_empty());
    assert!(!gateway.is_remote_active());
    assert_eq!(gateway.load_profile().await.active_messages, messages);
}

#[tokio::test]
async fn signed_in_loads_come_from_remote_without_merging_local() {
    let remote = Arc::new(FakeRemote::default());
    let remote_messages = vec![Message::user("from the server", Vec::new())];
    remote.state.lock().unwrap().current = remote_messages.clone();
    let (gateway, local) = gateway_with(Some(Arc::clone(&remote)), signed_in());
    local.save_current(&create_test_messages()).unwrap();
    local
        .upsert_conversation(&Conversation::from_messages(
            "local-only".into(),
            create_test_messages(),
            None,
        ))
        .unwrap();

    let profile = gateway.load_profile().await;

    assert_eq!(profile.active_messages, remote_messages);
    assert!(profile.conversations.is_empty());
}

#[tokio::test]
async fn signed_in_writes_go_to_both_backends() {
    let remote = Arc::new(FakeRemote::default());
    let (gateway, local) = gateway_with(Some(Arc::clone(&remote)), signed_in());
    let messages = create_test_messages();

    gateway.save_active_messages(&messages).await;
    let settings = Settings {
        theme: "dark".into(),
        ..Settings::default()
    };
    gateway.save_settings(&settings).await;

    assert_eq!(local.load_current().unwrap(), messages);
    assert_eq!(remote.state.lock().unwrap().current, messages);
    assert_eq!(local.load_settings().unwrap(), Some(settings.clone()));
    assert_eq!(remote.state.lock().unwrap().settings, Some(settings));
}

#[tokio::test]
async fn remote_failures_are_swallowed_and_local_keeps_latest() {
    let remote = Arc::new(FakeRemote::failing());
    let (gateway, local) = gateway_with(Some(Arc::clone(&remote)), signed_in());
    let messages = create_test_messages();

    gateway.save_active_messages(&messages).await;
    let stored = gateway
        .save_conversation(Conversation::from_messages("c-1".into(), messages.clone(), None))
        .await;

    assert_eq!(stored.id, "c-1");
    assert_eq!(local.load_current().unwrap(), messages);
    assert_eq!(local.load_conversations().unwrap().len(), 1);

    let profile = gateway.load_profile().await;
    assert_eq!(profile.active_messages, messages);
    assert!(remote.calls().contains(&"load_settings".to_string()));
}

#[tokio::test]
async fn remote_save_assigns_id_used_by_local_mirror() {
    let remote = Arc::new(FakeRemote::default());
    let (gateway, local) = gateway_with(Some(Arc::clone(&remote)), signed_in());

    let stored = gateway
        .save_conversation(Conversation::from_messages(
            "client-id".into(),
            create_test_messages(),
            Some("user-1".into()),
        ))
        .await;

    assert_eq!(stored.id, "srv-1");
    let local_ids: Vec<String> = local
        .load_conversations()
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(local_ids, vec!["srv-1".to_string()]);
}

#[tokio::test]
async fn update_and_delete_reach_both_backends() {
    let remote = Arc::new(FakeRemote::default());
    let (gateway, local) = gateway_with(Some(Arc::clone(&remote)), signed_in());
    let stored = gateway
        .save_conversation(Conversation::from_messages(
            "x".into(),
            create_test_messages(),
            None,
        ))
        .await;

    let extended = vec![Message::user("only this", Vec::new())];
    gateway
        .update_conversation(&stored.id, ConversationPatch::messages(extended.clone()))
        .await;
    assert_eq!(local.load_conversations().unwrap()[0].messages, extended);
    assert_eq!(remote.state.lock().unwrap().conversations[0].messages, extended);

    gateway.delete_conversation(&stored.id).await;
    assert!(local.load_conversations().unwrap().is_empty());
    assert!(remote.state.lock().unwrap().conversations.is_empty());
}

#[tokio::test]
async fn persist_history_off_skips_scratch_restore() {
    let (gateway, local) = gateway_with(None, AuthState::default());
    local.save_current(&create_test_messages()).unwrap();
    local
        .save_settings(&Settings {
            persist_history: false,
            ..Settings::default()
        })
        .unwrap();

    let profile = gateway.load_profile().await;
    assert!(profile.active_messages.is_empty());
    assert!(!profile.settings.persist_history);
}

#[tokio::test]
async fn unreadable_local_data_starts_fresh() {
    let store = Arc::new(MemoryStore::new());
    store.set(CURRENT_CONVERSATION_KEY, "{not json").unwrap();
    store.set(SETTINGS_KEY, "[]").unwrap();
    let gateway = PersistenceGateway::new(
        LocalBackend::new(store),
        None,
        AuthState::default(),
    );

    let profile = gateway.load_profile().await;
    assert_eq!(profile, Profile::default());
}

#[test]
fn local_conversations_keep_newest_fifty() {
    let local = LocalBackend::new(Arc::new(MemoryStore::new()));
    for i in 0..55 {
        local
            .upsert_conversation(&Conversation::from_messages(
                format!("c-{i}"),
                Vec::new(),
                None,
            ))
            .unwrap();
    }

    let conversations = local.load_conversations().unwrap();
    assert_eq!(conversations.len(), MAX_LOCAL_CONVERSATIONS);
    assert_eq!(conversations[0].id, "c-54");
    assert_eq!(conversations[49].id, "c-5");

    // Re-saving an existing conversation keeps its position.
    let mut middle = conversations[10].clone();
    middle.title = "renamed".into();
    local.upsert_conversation(&middle).unwrap();
    assert_eq!(local.load_conversations().unwrap()[10].title, "renamed");
}

#[tokio::test]
async fn stopped_reply_survives_a_reload_byte_for_byte() {
    let dir = TempDir::new().expect("temp dir");
    let local = LocalBackend::new(Arc::new(FileStore::new(dir.path())));
    let gateway = PersistenceGateway::new(local, None, AuthState::default());

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = ConversationSession::new(tx, 1);
    let turn = session.submit("What is the answer?", Vec::new(), "m", true).unwrap();
    let Applied::Reveal(controller) = session.apply_outcome(
        turn.turn_id,
        TurnOutcome::Text(Completion {
            text: "The answer is 42.".into(),
            model_key: "m".into(),
            model_label: "Model".into(),
        }),
    ) else {
        panic!("expected reveal");
    };
    for _ in 0..8 {
        controller.advance();
    }
    session.stop_generation();
    gateway.save_active_messages(session.messages()).await;

    let profile = gateway.load_profile().await;
    assert_eq!(
        profile.active_messages.last().map(|m| m.text.as_str()),
        Some("The answ")
    );
    assert_eq!(profile.active_messages, session.messages());
}

#[tokio::test]
async fn http_backend_speaks_the_rest_api() {
    let (base_url, server) = spawn_mock_server(vec![
        (
            200,
            r#"[{"id":"c1","title":"Hello","messages":[{"id":"m1","type":"user","text":"hi","timestamp":"2026-03-01T10:00:00Z"}],"created_at":"2026-03-01T10:00:00Z","updated_at":"2026-03-01T10:05:00Z","user_id":"u1"}]"#
                .to_string(),
        ),
        (200, r#"{"id":"c 1"}"#.to_string()),
        (200, "null".to_string()),
        (401, r#"{"message":"Access token required"}"#.to_string()),
    ])
    .await;
    let backend = HttpRemoteBackend::new(reqwest::Client::new(), &base_url);

    let conversations = backend.list_conversations("jwt").await.expect("list");
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].owner_id.as_deref(), Some("u1"));
    assert_eq!(conversations[0].messages[0].text, "hi");

    backend
        .update_conversation("jwt", "c 1", &ConversationPatch::messages(Vec::new()))
        .await
        .expect("update");

    assert_eq!(backend.load_settings("jwt").await.expect("settings"), None);

    assert!(matches!(
        backend.load_current("jwt").await,
        Err(RemoteError::Unauthorized)
    ));

    let requests = server.await.unwrap().unwrap();
    assert!(requests[0].request_line.starts_with("GET /api/conversations "));
    assert_eq!(requests[0].header("authorization"), Some("Bearer jwt"));
    assert!(requests[1].request_line.starts_with("PUT /api/conversations/c%201 "));
    assert_eq!(requests[1].json()["messages"], serde_json::json!([]));
    assert!(requests[2].request_line.starts_with("GET /api/settings "));
    assert!(requests[3]
        .request_line
        .starts_with("GET /api/current-conversation "));
}
