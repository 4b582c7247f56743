//! File attachments: loading files from disk into [`Attachment`] records and
//! folding their extracted text into the prompt sent to a provider.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::utils::ids::new_id;

pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

const WORD_PLACEHOLDER: &str = "Word document attached (content extraction not implemented)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Attachment {
    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/") || self.mime_type == "application/json"
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Debug)]
pub enum AttachmentError {
    Read { path: PathBuf, source: std::io::Error },
    TooLarge { path: PathBuf, size: u64 },
    Unsupported { path: PathBuf },
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            AttachmentError::TooLarge { path, size } => write!(
                f,
                "{} is {} bytes; attachments must be smaller than {}MB",
                path.display(),
                size,
                MAX_ATTACHMENT_BYTES / 1024 / 1024
            ),
            AttachmentError::Unsupported { path } => {
                write!(f, "File type of {} is not supported", path.display())
            }
        }
    }
}

impl StdError for AttachmentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AttachmentError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Map a file extension onto one of the supported MIME types.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}

/// Read a file into an attachment, extracting text where that is possible.
///
/// Text and JSON files carry their contents; images are embedded as a data
/// URL; PDF and Word documents are attached by name only.
pub fn load_attachment(path: &Path) -> Result<Attachment, AttachmentError> {
    let mime_type = mime_type_for(path).ok_or_else(|| AttachmentError::Unsupported {
        path: path.to_path_buf(),
    })?;

    let metadata = fs::metadata(path).map_err(|source| AttachmentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
        });
    }

    let read = |path: &Path| {
        fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file_url = format!("file://{}", path.display());

    let (url, content) = if mime_type.starts_with("text/") || mime_type == "application/json" {
        let bytes = read(path)?;
        (file_url, Some(String::from_utf8_lossy(&bytes).into_owned()))
    } else if mime_type.starts_with("image/") {
        let bytes = read(path)?;
        (format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)), None)
    } else if mime_type.contains("word") {
        (file_url, Some(WORD_PLACEHOLDER.to_string()))
    } else {
        (file_url, None)
    };

    Ok(Attachment {
        id: new_id(),
        name,
        mime_type: mime_type.to_string(),
        size: metadata.len(),
        url,
        content,
    })
}

/// Build the prompt text for a turn, appending attachment context after the
/// user's own words.
pub fn contextualize_prompt(text: &str, attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return text.to_string();
    }

    let context = attachments
        .iter()
        .map(|attachment| match (&attachment.content, attachment.mime_type.starts_with("text/")) {
            (Some(content), true) => format!("File \"{}\" content:\n{}", attachment.name, content),
            _ => format!("File attached: {} ({})", attachment.name, attachment.mime_type),
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{text}\n\nAttached files:\n{context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn text_files_carry_their_content() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("notes.txt");
        fs::write(&path, "remember the milk").expect("write");

        let attachment = load_attachment(&path).expect("loads");
        assert_eq!(attachment.name, "notes.txt");
        assert_eq!(attachment.mime_type, "text/plain");
        assert_eq!(attachment.content.as_deref(), Some("remember the milk"));
        assert!(attachment.is_text());
    }

    #[test]
    fn images_become_data_urls() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("pixel.png");
        fs::File::create(&path)
            .and_then(|mut f| f.write_all(&[0x89, b'P', b'N', b'G']))
            .expect("write");

        let attachment = load_attachment(&path).expect("loads");
        assert!(attachment.is_image());
        assert!(attachment.url.starts_with("data:image/png;base64,"));
        assert!(attachment.content.is_none());
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("binary.exe");
        fs::write(&path, b"MZ").expect("write");
        assert!(matches!(
            load_attachment(&path),
            Err(AttachmentError::Unsupported { .. })
        ));
    }

    #[test]
    fn missing_files_report_read_errors() {
        let err = load_attachment(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, AttachmentError::Read { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn prompt_without_attachments_is_unchanged() {
        assert_eq!(contextualize_prompt("hi", &[]), "hi");
    }

    #[test]
    fn prompt_inlines_text_and_names_other_files() {
        let text = Attachment {
            id: "a".into(),
            name: "todo.md".into(),
            mime_type: "text/markdown".into(),
            size: 5,
            url: "file:///todo.md".into(),
            content: Some("- one".into()),
        };
        let pdf = Attachment {
            id: "b".into(),
            name: "paper.pdf".into(),
            mime_type: "application/pdf".into(),
            size: 10,
            url: "file:///paper.pdf".into(),
            content: None,
        };

        let prompt = contextualize_prompt("summarize", &[text, pdf]);
        assert_eq!(
            prompt,
            "summarize\n\nAttached files:\nFile \"todo.md\" content:\n- one\n\nFile attached: paper.pdf (application/pdf)"
        );
    }
}
