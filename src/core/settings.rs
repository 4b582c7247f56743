//! User-facing preferences that travel with the profile (local or remote).
//!
//! Unlike [`crate::core::config::Config`], which describes how this machine
//! reaches providers, these are per-user and go through the persistence
//! gateway.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: String,
    /// Model key requested for text turns; unknown keys fall back to the
    /// service default.
    pub ai_model: String,
    pub voice_enabled: bool,
    pub selected_voice: String,
    pub voice_speed: f32,
    pub voice_pitch: f32,
    pub auto_scroll: bool,
    /// When false the scratch conversation is neither saved nor restored.
    pub persist_history: bool,
    pub image_generation: bool,
    pub font_size: u16,
    pub font_family: String,
    pub click_sounds_enabled: bool,
    pub task_complete_sounds_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            ai_model: "gemini-flash".to_string(),
            voice_enabled: false,
            selected_voice: String::new(),
            voice_speed: 1.0,
            voice_pitch: 1.0,
            auto_scroll: true,
            persist_history: true,
            image_generation: true,
            font_size: 14,
            font_family: "sans-serif".to_string(),
            click_sounds_enabled: true,
            task_complete_sounds_enabled: true,
        }
    }
}
