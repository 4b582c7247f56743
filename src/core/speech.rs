//! Reads replies aloud through an external text-to-speech command.
//!
//! The command is a whitespace-separated template such as
//! `espeak -s {rate} -p {pitch}`; the text is passed as the final argument.
//! `{rate}` becomes words per minute (175 at speed 1.0), `{pitch}` a 0-99
//! pitch (50 at pitch 1.0) and `{voice}` the selected voice name.

use std::error::Error as StdError;
use std::fmt;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::settings::Settings;

const BASE_RATE_WPM: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    pub speed: f32,
    pub pitch: f32,
    pub voice: String,
}

impl SpeechOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            speed: settings.voice_speed,
            pitch: settings.voice_pitch,
            voice: settings.selected_voice.clone(),
        }
    }
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            voice: String::new(),
        }
    }
}

#[derive(Debug)]
pub enum SpeechError {
    EmptyCommand,
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::EmptyCommand => write!(f, "speech command is empty"),
            SpeechError::Spawn { program, source } => {
                write!(f, "failed to start speech command {program}: {source}")
            }
        }
    }
}

impl StdError for SpeechError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SpeechError::Spawn { source, .. } => Some(source),
            SpeechError::EmptyCommand => None,
        }
    }
}

pub struct Speaker {
    template: String,
    current: Mutex<Option<Child>>,
}

impl Speaker {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            current: Mutex::new(None),
        }
    }

    /// Starts speaking `text`, cutting off anything still being spoken.
    /// Returns once the command has started.
    pub async fn speak(&self, text: &str, options: &SpeechOptions) -> Result<(), SpeechError> {
        self.stop().await;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let argv = command_line(&self.template, text, options);
        let (program, args) = argv.split_first().ok_or(SpeechError::EmptyCommand)?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: program.clone(),
                source,
            })?;
        debug!(program = %program, "speaking reply");
        *self.current.lock().await = Some(child);
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(mut child) = self.current.lock().await.take() {
            if let Err(err) = child.kill().await {
                debug!("speech command already gone: {err}");
            }
        }
    }

    /// Waits for the current utterance to end.
    pub async fn wait(&self) {
        if let Some(mut child) = self.current.lock().await.take() {
            let _ = child.wait().await;
        }
    }
}

/// The program and arguments for one utterance.
pub fn command_line(template: &str, text: &str, options: &SpeechOptions) -> Vec<String> {
    let rate = (BASE_RATE_WPM * options.speed).round().max(1.0) as u32;
    let pitch = (BASE_PITCH * options.pitch).round().clamp(0.0, 99.0) as u32;
    let mut argv: Vec<String> = template
        .split_whitespace()
        .filter_map(|part| {
            let part = part
                .replace("{rate}", &rate.to_string())
                .replace("{pitch}", &pitch.to_string());
            if part.contains("{voice}") {
                if options.voice.is_empty() {
                    return None;
                }
                return Some(part.replace("{voice}", &options.voice));
            }
            Some(part)
        })
        .collect();
    if !argv.is_empty() {
        argv.push(text.to_string());
    }
    argv
}
