use std::collections::{BTreeMap, HashMap};

use grokscope_core::{Annotation, MarkerId, TagStyle, is_empty_annotation};

use crate::HostIntent;
use crate::registry::TagStyleRegistry;

/// First id handed out is `MARKER_ID_BASE + 1`.
pub const MARKER_ID_BASE: MarkerId = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub id: MarkerId,
    pub note: String,
    pub tags: Vec<String>,
    pub style: TagStyle,
}

/// In-memory mirror of the markers currently shown by the host, keyed by
/// canonical file path and line.
///
/// The annotation store stays authoritative: callers feed this cache only with
/// annotations fetched from, or edits committed to, the store.
#[derive(Debug, Clone)]
pub struct MarkerCache {
    last_id: MarkerId,
    files: HashMap<String, BTreeMap<usize, Marker>>,
}

impl Default for MarkerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerCache {
    pub fn new() -> Self {
        Self::with_base(MARKER_ID_BASE)
    }

    pub fn with_base(base: MarkerId) -> Self {
        Self {
            last_id: base,
            files: HashMap::new(),
        }
    }

    fn allocate_id(&mut self) -> MarkerId {
        self.last_id += 1;
        self.last_id
    }

    /// Reconciles the markers of `file` against annotations just read from the store.
    ///
    /// Lines that gained an annotation get a new marker, lines that lost one have
    /// their marker removed, and lines present on both sides keep their id.
    pub fn sync(
        &mut self,
        file: &str,
        annotations: &[Annotation],
        registry: &TagStyleRegistry,
    ) -> Vec<HostIntent> {
        let fresh: BTreeMap<usize, &Annotation> = annotations
            .iter()
            .filter(|annotation| annotation.file == file && !annotation.is_empty())
            .map(|annotation| (annotation.line, annotation))
            .collect();

        let mut intents = Vec::new();
        let mut cached = self.files.remove(file).unwrap_or_default();

        cached.retain(|line, marker| {
            if fresh.contains_key(line) {
                return true;
            }
            intents.push(HostIntent::RemoveMarker {
                id: marker.id,
                file: file.to_owned(),
            });
            false
        });

        let mut added = 0usize;
        for (line, annotation) in fresh {
            let style = registry.resolve(&annotation.tags).clone();
            match cached.get_mut(&line) {
                Some(marker) => {
                    marker.note = annotation.note.clone();
                    marker.tags = annotation.tags.clone();
                    marker.style = style;
                }
                None => {
                    let id = self.allocate_id();
                    intents.push(HostIntent::PlaceMarker {
                        id,
                        style: style.clone(),
                        file: file.to_owned(),
                        line,
                    });
                    cached.insert(
                        line,
                        Marker {
                            id,
                            note: annotation.note.clone(),
                            tags: annotation.tags.clone(),
                            style,
                        },
                    );
                    added += 1;
                }
            }
        }

        tracing::debug!(
            file,
            markers = cached.len(),
            added,
            removed = intents.len() - added,
            "marker cache synced"
        );
        if !cached.is_empty() {
            self.files.insert(file.to_owned(), cached);
        }
        intents
    }

    /// Mirrors one committed store write for `file:line`.
    pub fn record_edit(
        &mut self,
        file: &str,
        line: usize,
        note: &str,
        tags: &[String],
        registry: &TagStyleRegistry,
    ) -> Vec<HostIntent> {
        let mut intents = Vec::new();

        if is_empty_annotation(note, tags) {
            if let Some(marker) = self.remove(file, line) {
                intents.push(HostIntent::RemoveMarker {
                    id: marker.id,
                    file: file.to_owned(),
                });
            }
            return intents;
        }

        let style = registry.resolve(tags).clone();
        if let Some(previous) = self.remove(file, line) {
            intents.push(HostIntent::RemoveMarker {
                id: previous.id,
                file: file.to_owned(),
            });
        }

        let id = self.allocate_id();
        intents.push(HostIntent::PlaceMarker {
            id,
            style: style.clone(),
            file: file.to_owned(),
            line,
        });
        self.files.entry(file.to_owned()).or_default().insert(
            line,
            Marker {
                id,
                note: note.to_owned(),
                tags: tags.to_vec(),
                style,
            },
        );

        intents
    }

    /// Drops every marker of `file`, asking the host to remove them.
    pub fn clear_file(&mut self, file: &str) -> Vec<HostIntent> {
        self.files
            .remove(file)
            .unwrap_or_default()
            .into_values()
            .map(|marker| HostIntent::RemoveMarker {
                id: marker.id,
                file: file.to_owned(),
            })
            .collect()
    }

    pub fn get(&self, file: &str, line: usize) -> Option<&Marker> {
        self.files.get(file).and_then(|markers| markers.get(&line))
    }

    /// Annotated lines of `file` in ascending order.
    pub fn lines(&self, file: &str) -> Vec<usize> {
        self.files
            .get(file)
            .map(|markers| markers.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.files.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn last_allocated_id(&self) -> MarkerId {
        self.last_id
    }

    fn remove(&mut self, file: &str, line: usize) -> Option<Marker> {
        let markers = self.files.get_mut(file)?;
        let removed = markers.remove(&line);
        if markers.is_empty() {
            self.files.remove(file);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "/src/main.c";

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    fn annotation(line: usize, note: &str, tag_values: &[&str]) -> Annotation {
        Annotation {
            file: FILE.to_owned(),
            line,
            note: note.to_owned(),
            tags: tags(tag_values),
        }
    }

    fn registry() -> TagStyleRegistry {
        let mut registry = TagStyleRegistry::default();
        registry.register("bug", ">>", "Error").expect("register bug");
        registry
    }

    fn placed_ids(intents: &[HostIntent]) -> Vec<MarkerId> {
        intents
            .iter()
            .filter_map(|intent| match intent {
                HostIntent::PlaceMarker { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn removed_ids(intents: &[HostIntent]) -> Vec<MarkerId> {
        intents
            .iter()
            .filter_map(|intent| match intent {
                HostIntent::RemoveMarker { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sync_adds_removes_and_keeps_ids_for_unchanged_lines() {
        let registry = registry();
        let mut cache = MarkerCache::new();

        let intents = cache.sync(
            FILE,
            &[annotation(3, "a", &[]), annotation(8, "b", &["bug"])],
            &registry,
        );
        assert_eq!(placed_ids(&intents), vec![1001, 1002]);
        assert_eq!(cache.get(FILE, 8).expect("line 8").style.glyph, ">>");

        let intents = cache.sync(
            FILE,
            &[annotation(8, "b2", &[]), annotation(12, "c", &[])],
            &registry,
        );
        assert_eq!(removed_ids(&intents), vec![1001]);
        assert_eq!(placed_ids(&intents), vec![1003]);

        let kept = cache.get(FILE, 8).expect("line 8 kept");
        assert_eq!(kept.id, 1002);
        assert_eq!(kept.note, "b2");
        assert_eq!(kept.style.tag, "default");
        assert_eq!(cache.lines(FILE), vec![8, 12]);
    }

    #[test]
    fn sync_with_no_annotations_clears_file() {
        let registry = registry();
        let mut cache = MarkerCache::new();
        cache.sync(FILE, &[annotation(1, "a", &[])], &registry);

        let intents = cache.sync(FILE, &[], &registry);
        assert_eq!(removed_ids(&intents), vec![1001]);
        assert!(cache.is_empty());
    }

    #[test]
    fn record_edit_always_allocates_fresh_ids() {
        let registry = registry();
        let mut cache = MarkerCache::new();

        let first = cache.record_edit(FILE, 10, "fix", &tags(&["bug"]), &registry);
        assert_eq!(placed_ids(&first), vec![1001]);

        let second = cache.record_edit(FILE, 10, "fix again", &[], &registry);
        assert_eq!(removed_ids(&second), vec![1001]);
        assert_eq!(placed_ids(&second), vec![1002]);
        assert!(matches!(second[0], HostIntent::RemoveMarker { .. }));

        let marker = cache.get(FILE, 10).expect("marker");
        assert_eq!(marker.id, 1002);
        assert_eq!(marker.style.tag, "default");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn record_edit_with_empty_annotation_removes_or_ignores() {
        let registry = registry();
        let mut cache = MarkerCache::new();

        assert!(cache.record_edit(FILE, 4, "", &[], &registry).is_empty());

        cache.record_edit(FILE, 4, "note", &[], &registry);
        let intents = cache.record_edit(FILE, 4, "", &[], &registry);
        assert_eq!(removed_ids(&intents), vec![1001]);
        assert!(cache.get(FILE, 4).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.last_allocated_id(), 1001);
    }

    #[test]
    fn ids_are_never_reused_after_deletion() {
        let registry = registry();
        let mut cache = MarkerCache::new();

        let mut seen = Vec::new();
        for round in 0..4 {
            let intents = cache.record_edit(FILE, 2, &format!("n{round}"), &[], &registry);
            seen.extend(placed_ids(&intents));
            cache.record_edit(FILE, 2, "", &[], &registry);
        }
        assert_eq!(seen, vec![1001, 1002, 1003, 1004]);
    }

    #[test]
    fn clear_file_removes_only_that_file() {
        let registry = registry();
        let mut cache = MarkerCache::new();
        cache.record_edit(FILE, 1, "a", &[], &registry);
        cache.record_edit("/src/other.c", 1, "b", &[], &registry);

        let intents = cache.clear_file(FILE);
        assert_eq!(removed_ids(&intents), vec![1001]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("/src/other.c", 1).is_some());
    }
}
