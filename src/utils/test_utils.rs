//! Shared fixtures: scripted provider backends, an in-memory keyring and a
//! loopback HTTP server for wire tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::core::conversation::{Conversation, ConversationPatch};
use crate::core::keyring::{KeyStore, KeyringAccessError};
use crate::core::message::Message;
use crate::core::persistence::{RemoteBackend, RemoteError};
use crate::core::settings::Settings;
use crate::core::providers::{AIProvider, AttemptError, CompletionBackend, ProviderFamily};

/// Reply a scripted backend gives for a given key.
#[derive(Clone, Debug)]
pub enum Scripted {
    Reply(String),
    Status(u16),
    Malformed,
}

/// A backend whose outcome depends only on the API key, recording every
/// attempt.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    outcomes: HashMap<String, Scripted>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, api_key: &str, outcome: Scripted) -> Self {
        self.outcomes.insert(api_key.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, AttemptError> {
        self.calls
            .lock()
            .unwrap()
            .push((api_key.to_string(), prompt.to_string()));
        match self.outcomes.get(api_key) {
            Some(Scripted::Reply(text)) => Ok(text.clone()),
            Some(Scripted::Status(status)) => Err(AttemptError::status(*status)),
            Some(Scripted::Malformed) | None => Err(AttemptError::MalformedResponse(
                "scripted failure".to_string(),
            )),
        }
    }
}

/// Provider backed by a scripted backend; returns the shared call log.
pub fn scripted_provider(
    key: &str,
    keys: &[&str],
    backend: ScriptedBackend,
) -> (AIProvider, Arc<Mutex<Vec<(String, String)>>>) {
    let calls = backend.calls();
    let provider = AIProvider::new(
        key,
        format!("{key} (test)"),
        ProviderFamily::Groq,
        keys.iter().map(|k| k.to_string()).collect(),
        Box::new(backend),
    );
    (provider, calls)
}

#[derive(Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl KeyStore for MemoryKeyStore {
    fn load_keys(&self, provider_key: &str) -> Result<Vec<String>, KeyringAccessError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(provider_key)
            .cloned()
            .unwrap_or_default())
    }

    fn save_keys(&self, provider_key: &str, keys: &[String]) -> Result<(), KeyringAccessError> {
        self.entries
            .lock()
            .unwrap()
            .insert(provider_key.to_string(), keys.to_vec());
        Ok(())
    }

    fn clear_keys(&self, provider_key: &str) -> Result<(), KeyringAccessError> {
        self.entries.lock().unwrap().remove(provider_key);
        Ok(())
    }
}

pub fn create_test_messages() -> Vec<Message> {
    vec![
        Message::user("Hello", Vec::new()),
        Message::assistant("Hi there!", "Test Model"),
        Message::user("How are you?", Vec::new()),
        Message::assistant("I'm doing well, thank you for asking!", "Test Model"),
    ]
}

#[derive(Default)]
pub struct FakeRemoteState {
    pub conversations: Vec<Conversation>,
    pub settings: Option<Settings>,
    pub current: Vec<Message>,
    pub calls: Vec<String>,
}

/// Account backend kept in memory; records every call by name.
#[derive(Default)]
pub struct FakeRemote {
    pub state: Mutex<FakeRemoteState>,
    pub failing: bool,
}

impl FakeRemote {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    fn record(&self, call: &str) -> Result<std::sync::MutexGuard<'_, FakeRemoteState>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        if self.failing {
            Err(RemoteError::Status {
                status: 500,
                message: None,
            })
        } else {
            Ok(state)
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl RemoteBackend for FakeRemote {
    async fn list_conversations(&self, _token: &str) -> Result<Vec<Conversation>, RemoteError> {
        Ok(self.record("list")?.conversations.clone())
    }

    async fn create_conversation(
        &self,
        _token: &str,
        conversation: &Conversation,
    ) -> Result<Conversation, RemoteError> {
        let mut state = self.record("create")?;
        let mut stored = conversation.clone();
        stored.id = format!("srv-{}", state.conversations.len() + 1);
        state.conversations.insert(0, stored.clone());
        Ok(stored)
    }

    async fn update_conversation(
        &self,
        _token: &str,
        id: &str,
        patch: &ConversationPatch,
    ) -> Result<(), RemoteError> {
        let mut state = self.record("update")?;
        if let Some(existing) = state.conversations.iter_mut().find(|c| c.id == id) {
            existing.apply_patch(patch.clone());
        }
        Ok(())
    }

    async fn delete_conversation(&self, _token: &str, id: &str) -> Result<(), RemoteError> {
        self.record("delete")?.conversations.retain(|c| c.id != id);
        Ok(())
    }

    async fn load_settings(&self, _token: &str) -> Result<Option<Settings>, RemoteError> {
        Ok(self.record("load_settings")?.settings.clone())
    }

    async fn save_settings(&self, _token: &str, settings: &Settings) -> Result<(), RemoteError> {
        self.record("save_settings")?.settings = Some(settings.clone());
        Ok(())
    }

    async fn load_current(&self, _token: &str) -> Result<Vec<Message>, RemoteError> {
        Ok(self.record("load_current")?.current.clone())
    }

    async fn save_current(&self, _token: &str, messages: &[Message]) -> Result<(), RemoteError> {
        self.record("save_current")?.current = messages.to_vec();
        Ok(())
    }

    async fn clear_current(&self, _token: &str) -> Result<(), RemoteError> {
        self.record("clear_current")?.current.clear();
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Serves the given `(status, body)` responses in order, one per connection,
/// and returns the captured requests once all have been answered.
pub async fn spawn_mock_server(
    responses: Vec<(u16, String)>,
) -> (String, JoinHandle<Result<Vec<CapturedRequest>, String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let mut queue: VecDeque<(u16, String)> = responses.into();

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        while let Some((status, body)) = queue.pop_front() {
            let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
            let request = read_http_request(&mut stream).await?;
            captured.push(request);
            write_http_response(&mut stream, status, &body).await?;
        }
        Ok(captured)
    });

    (format!("http://{addr}"), handle)
}

pub async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length.saturating_sub(body.len())];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

pub async fn write_http_response(
    stream: &mut TcpStream,
    status: u16,
    body: &str,
) -> Result<(), String> {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|err| err.to_string())?;
    stream.shutdown().await.map_err(|err| err.to_string())
}
