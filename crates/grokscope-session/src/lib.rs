use grokscope_core::ViewportId;
use grokscope_search::SearchError;
use grokscope_store::StoreError;
use thiserror::Error;

mod history;
mod intent;
mod markers;
mod popup;
mod registry;
mod session;

pub use history::{NavHistory, WRAP_DISTANCE, next_annotation_target};
pub use intent::{HostIntent, MessageLevel};
pub use markers::{MARKER_ID_BASE, Marker, MarkerCache};
pub use popup::{render_results, selection_at, status_line};
pub use registry::{DEFAULT_STYLE_TAG, TagStyleRegistry};
pub use session::Session;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("jump stack is empty for {0}")]
    EmptyStack(ViewportId),
    #[error("glyph '{glyph}' for tag '{tag}' must be 1-2 display cells")]
    InvalidGlyph { tag: String, glyph: String },
    #[error("tag name must not be empty: '{0}'")]
    InvalidTag(String),
    #[error("no query results to select from")]
    NoPendingResults,
    #[error("{0}")]
    InvalidSelection(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Search(#[from] SearchError),
}
