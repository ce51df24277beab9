use std::path::Path;

use grokscope_config::GrokscopeConfig;
use grokscope_core::{Annotation, Location, NavEntry, ViewportId, normalize_tags};
use grokscope_search::{SearchBackend, SearchRequest, flatten_results};
use grokscope_store::{AnnotationStore, canonical_path};

use crate::history::{NavHistory, next_annotation_target};
use crate::markers::MarkerCache;
use crate::popup::{render_results, selection_at};
use crate::registry::TagStyleRegistry;
use crate::{HostIntent, SessionError};

#[derive(Debug, Clone)]
struct PendingQuery {
    locations: Vec<Location>,
    origin: Option<NavEntry>,
}

/// Everything one editor process needs to answer navigation and annotation
/// commands. Operations run one at a time and return the editor actions to
/// perform instead of performing them.
#[derive(Debug)]
pub struct Session<S> {
    store: S,
    registry: TagStyleRegistry,
    markers: MarkerCache,
    history: NavHistory,
    base_path: Option<String>,
    pending: Option<PendingQuery>,
}

impl<S: AnnotationStore> Session<S> {
    pub fn new(store: S, registry: TagStyleRegistry, base_path: Option<String>) -> Self {
        Self {
            store,
            registry,
            markers: MarkerCache::new(),
            history: NavHistory::new(),
            base_path,
            pending: None,
        }
    }

    pub fn from_config(store: S, config: &GrokscopeConfig) -> Self {
        Self::new(
            store,
            TagStyleRegistry::from_config(&config.annotations),
            config.source.base_path.clone(),
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &TagStyleRegistry {
        &self.registry
    }

    pub fn markers(&self) -> &MarkerCache {
        &self.markers
    }

    pub fn history(&self) -> &NavHistory {
        &self.history
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn set_base_path(&mut self, base_path: impl Into<String>) {
        let base_path = base_path.into();
        self.base_path = Some(base_path.trim().to_owned()).filter(|path| !path.is_empty());
    }

    pub fn has_pending_results(&self) -> bool {
        self.pending.is_some()
    }

    /// Runs a search and asks the host to show the results popup.
    ///
    /// `origin` is where the user was when the query started; it is pushed to the
    /// jump stack once a result is chosen. Failures leave no pending results.
    pub async fn run_query<B>(
        &mut self,
        backend: &B,
        request: &SearchRequest,
        origin: Option<NavEntry>,
    ) -> Result<Vec<HostIntent>, SessionError>
    where
        B: SearchBackend + ?Sized,
    {
        self.pending = None;
        if self.base_path.is_none() {
            return Err(SessionError::NotConfigured("source.base_path"));
        }

        let locations = flatten_results(backend.search(request).await?);
        if locations.is_empty() {
            return Ok(vec![HostIntent::info("No results.")]);
        }

        tracing::debug!(
            query_type = request.query_type.as_str(),
            results = locations.len(),
            "query results ready"
        );
        let lines = render_results(request.query_type, &locations);
        self.pending = Some(PendingQuery {
            locations: locations.clone(),
            origin: origin.filter(|entry| !entry.path.is_empty()),
        });

        Ok(vec![HostIntent::ShowResults { lines, locations }])
    }

    /// Jumps to result `index` of the pending query.
    pub fn goto_result(
        &mut self,
        viewport: ViewportId,
        index: usize,
    ) -> Result<Vec<HostIntent>, SessionError> {
        let base_path = self
            .base_path
            .as_deref()
            .ok_or(SessionError::NotConfigured("source.base_path"))?;
        let pending = self.pending.as_ref().ok_or(SessionError::NoPendingResults)?;
        let location = pending.locations.get(index).ok_or_else(|| {
            SessionError::InvalidSelection(format!(
                "result {index} does not exist ({} results)",
                pending.locations.len()
            ))
        })?;

        let target = HostIntent::Navigate {
            path: join_source_path(base_path, &location.path),
            line: location.line_number,
            column: None,
        };

        if let Some(pending) = self.pending.take()
            && let Some(origin) = pending.origin
        {
            self.history.push(viewport, origin);
        }

        Ok(vec![HostIntent::ClosePopup, target])
    }

    /// Jumps to the result under 1-based `row` of the rendered popup.
    pub fn goto_row(
        &mut self,
        viewport: ViewportId,
        popup_lines: &[String],
        row: usize,
    ) -> Result<Vec<HostIntent>, SessionError> {
        let index = selection_at(popup_lines, row)?;
        self.goto_result(viewport, index)
    }

    pub fn cancel_query(&mut self) -> Vec<HostIntent> {
        self.pending = None;
        vec![HostIntent::ClosePopup]
    }

    pub fn jump_back(&mut self, viewport: ViewportId) -> Result<Vec<HostIntent>, SessionError> {
        let entry = self.history.pop(viewport)?;
        Ok(vec![HostIntent::Navigate {
            path: entry.path,
            line: entry.line,
            column: Some(entry.column),
        }])
    }

    /// Rebuilds the markers of `file` from the store, e.g. when the host opens it.
    pub fn open_file(&mut self, file: &Path) -> Result<Vec<HostIntent>, SessionError> {
        let Some(key) = annotatable_key(file)? else {
            return Ok(Vec::new());
        };

        let annotations = self.store.get(file)?;
        Ok(self.markers.sync(&key, &annotations, &self.registry))
    }

    /// Saves the note and tags for `file:line`; empty note and tags delete it.
    pub fn edit_annotation(
        &mut self,
        file: &Path,
        line: usize,
        note: &str,
        tags: &[String],
    ) -> Result<Vec<HostIntent>, SessionError> {
        let Some(key) = annotatable_key(file)? else {
            return Ok(Vec::new());
        };

        let tags = normalize_tags(tags);
        let outcome = self.store.upsert(file, line, note, &tags)?;
        tracing::debug!(file = %key, line, outcome = outcome.as_str(), "annotation edited");

        Ok(self
            .markers
            .record_edit(&key, line, note, &tags, &self.registry))
    }

    /// Cached annotation at `file:line`, without touching the store.
    pub fn annotation_at(
        &self,
        file: &Path,
        line: usize,
    ) -> Result<Option<Annotation>, SessionError> {
        let Some(key) = annotatable_key(file)? else {
            return Ok(None);
        };

        Ok(self.markers.get(&key, line).map(|marker| Annotation {
            file: key.clone(),
            line,
            note: marker.note.clone(),
            tags: marker.tags.clone(),
        }))
    }

    /// Moves forward to the next annotated line of the current file, wrapping around.
    pub fn next_annotation(
        &mut self,
        viewport: ViewportId,
        current: NavEntry,
    ) -> Result<Vec<HostIntent>, SessionError> {
        let Some(key) = annotatable_key(Path::new(&current.path))? else {
            return Ok(Vec::new());
        };

        let lines = self.markers.lines(&key);
        let Some(target) = next_annotation_target(current.line, &lines) else {
            return Ok(vec![HostIntent::info("No annotations in this file.")]);
        };

        let path = current.path.clone();
        self.history.push(viewport, current);
        Ok(vec![HostIntent::Navigate {
            path,
            line: target,
            column: None,
        }])
    }

    pub fn register_style(
        &mut self,
        tag: &str,
        glyph: &str,
        highlight: &str,
    ) -> Result<(), SessionError> {
        self.registry.register(tag, glyph, highlight)
    }
}

/// Canonical store key for `file`, or `None` for buffers without a file name.
fn annotatable_key(file: &Path) -> Result<Option<String>, SessionError> {
    if file.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(canonical_path(file)?))
}

fn join_source_path(base_path: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_path.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
