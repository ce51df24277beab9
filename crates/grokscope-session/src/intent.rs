use grokscope_core::{Location, MarkerId, TagStyle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Error,
}

/// Editor action requested by a session operation. The host glue performs it;
/// the session never touches buffers or windows itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum HostIntent {
    ShowResults {
        lines: Vec<String>,
        locations: Vec<Location>,
    },
    ClosePopup,
    Navigate {
        path: String,
        line: usize,
        column: Option<usize>,
    },
    PlaceMarker {
        id: MarkerId,
        style: TagStyle,
        file: String,
        line: usize,
    },
    RemoveMarker {
        id: MarkerId,
        file: String,
    },
    Message {
        level: MessageLevel,
        text: String,
    },
}

impl HostIntent {
    pub fn info(text: impl Into<String>) -> Self {
        Self::Message {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Message {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}
