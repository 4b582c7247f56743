use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Plain-text transcript of the conversation, appended as messages land.
pub struct LoggingState {
    file_path: Option<String>,
    is_active: bool,
}

impl LoggingState {
    pub fn new(log_file: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = LoggingState {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = log_file {
            logging.set_log_file(path)?;
        }
        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: String) -> Result<String, Box<dyn std::error::Error>> {
        self.test_file_access(&path)?;

        self.file_path = Some(path.clone());
        self.is_active = true;

        Ok(format!("Logging enabled to: {path}"))
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => {
                if self.is_active {
                    self.is_active = false;
                    Ok(format!("Logging paused (file: {path})"))
                } else {
                    self.is_active = true;
                    Ok(format!("Logging resumed to: {path}"))
                }
            }
            None => {
                Err("No log file specified. Use /log <filename> to enable logging first.".into())
            }
        }
    }

    /// Appends one message. Image replies are logged with their URL.
    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.active_path() else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        write_message(&mut writer, message)?;
        writer.flush()?;
        Ok(())
    }

    fn active_path(&self) -> Option<&str> {
        if self.is_active {
            self.file_path.as_deref()
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }

    /// Rewrites the whole transcript, e.g. after a reply was regenerated or
    /// truncated. The file is replaced atomically.
    pub fn rewrite_log(&self, messages: &[Message]) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.active_path() else {
            return Ok(());
        };

        let target_path = Path::new(file_path);
        let parent = match target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(parent)?;
        for message in messages {
            write_message(&mut temp_file, message)?;
        }
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(file_path)?;
        Ok(())
    }

    fn test_file_access(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()?;
        Ok(())
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn write_message(writer: &mut impl Write, message: &Message) -> std::io::Result<()> {
    let text = match message.role {
        Role::User => format!("You: {}", message.text),
        Role::Assistant => match &message.image_url {
            Some(url) => format!("{}\n[image] {url}", message.text),
            None => message.text.clone(),
        },
    };
    if text.is_empty() {
        return Ok(());
    }
    for line in text.lines() {
        writeln!(writer, "{line}")?;
    }
    writeln!(writer)
}
