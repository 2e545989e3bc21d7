// Line-oriented JSON contract with the external capture process

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::PersonKind;
use crate::registry::validation::MAX_VECTORS_PER_CAPTURE;
use crate::{RegistryError, Result};

/// Command written to the capture process, one JSON object per line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum CaptureCommand {
    Start,
    Stop,
    Capture {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hn: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<PersonKind>,
    },
}

impl CaptureCommand {
    #[inline]
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| RegistryError::Other(anyhow::anyhow!("Failed to encode command: {}", e)))?;
        line.push('\n');
        Ok(line)
    }
}

/// Event emitted by the capture process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub enum CaptureEvent {
    Ready,
    Status { running: bool },
    Info(String),
    /// Live preview frame; `image` is base64 JPEG
    Preview { distance: f64, image: String },
    /// A capture was stored; the embedding is present once the model has run
    Saved {
        folder: String,
        embedding: Option<Vec<f32>>,
    },
    Error(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default, alias = "path", skip_serializing_if = "Option::is_none")]
    folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<RawEvent> for CaptureEvent {
    type Error = String;

    fn try_from(raw: RawEvent) -> std::result::Result<Self, String> {
        if let Some(error) = raw.error {
            return Ok(CaptureEvent::Error(error));
        }
        if raw.event.as_deref() == Some("saved") {
            let folder = raw
                .folder
                .ok_or_else(|| "saved event without folder".to_string())?;
            return Ok(CaptureEvent::Saved {
                folder,
                embedding: raw.embedding,
            });
        }
        if let Some(running) = raw.running {
            return Ok(CaptureEvent::Status { running });
        }
        if let (Some(distance), Some(image)) = (raw.distance, raw.image) {
            return Ok(CaptureEvent::Preview { distance, image });
        }
        if let Some(info) = raw.info {
            return Ok(CaptureEvent::Info(info));
        }
        if raw.status.as_deref() == Some("ready") {
            return Ok(CaptureEvent::Ready);
        }
        Err("unrecognised capture event".to_string())
    }
}

impl From<CaptureEvent> for RawEvent {
    fn from(event: CaptureEvent) -> Self {
        match event {
            CaptureEvent::Ready => RawEvent {
                status: Some("ready".to_string()),
                ..RawEvent::default()
            },
            CaptureEvent::Status { running } => RawEvent {
                running: Some(running),
                ..RawEvent::default()
            },
            CaptureEvent::Info(info) => RawEvent {
                info: Some(info),
                ..RawEvent::default()
            },
            CaptureEvent::Preview { distance, image } => RawEvent {
                distance: Some(distance),
                image: Some(image),
                ..RawEvent::default()
            },
            CaptureEvent::Saved { folder, embedding } => RawEvent {
                event: Some("saved".to_string()),
                folder: Some(folder),
                embedding,
                ..RawEvent::default()
            },
            CaptureEvent::Error(error) => RawEvent {
                error: Some(error),
                ..RawEvent::default()
            },
        }
    }
}

/// Parse one line of capture output; blank and unrecognised lines yield `None`
#[inline]
pub fn parse_line(line: &str) -> Option<CaptureEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Ignoring capture output line: {}", e);
            None
        }
    }
}

/// Embeddings of one capture session, ready to store for a person
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureSet {
    pub vectors: Vec<Vec<f32>>,
    pub folder: Option<String>,
}

impl CaptureSet {
    /// Collect the embeddings of saved events; other events are skipped.
    ///
    /// The folder of the first saved capture is kept for the whole set.
    #[inline]
    pub fn from_events<'a, I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a CaptureEvent>,
    {
        let mut set = CaptureSet::default();

        for event in events {
            if let CaptureEvent::Saved {
                folder,
                embedding: Some(embedding),
            } = event
            {
                if set.vectors.len() == MAX_VECTORS_PER_CAPTURE {
                    return Err(RegistryError::Validation(format!(
                        "A capture set holds at most {} embeddings",
                        MAX_VECTORS_PER_CAPTURE
                    )));
                }
                set.folder.get_or_insert_with(|| folder.clone());
                set.vectors.push(embedding.clone());
            }
        }

        if set.vectors.is_empty() {
            return Err(RegistryError::Validation(
                "No saved capture carried an embedding".into(),
            ));
        }
        Ok(set)
    }
}
