use std::collections::HashMap;

use grokscope_config::AnnotationsConfig;
use grokscope_core::{TagStyle, is_valid_glyph};

use crate::SessionError;

pub const DEFAULT_STYLE_TAG: &str = "default";

/// Maps tag names to the marker style used when an annotation carries that tag.
#[derive(Debug, Clone)]
pub struct TagStyleRegistry {
    styles: HashMap<String, TagStyle>,
    default_style: TagStyle,
}

impl TagStyleRegistry {
    pub fn new(default_glyph: &str, default_highlight: &str) -> Result<Self, SessionError> {
        if !is_valid_glyph(default_glyph) {
            return Err(SessionError::InvalidGlyph {
                tag: DEFAULT_STYLE_TAG.to_owned(),
                glyph: default_glyph.to_owned(),
            });
        }

        Ok(Self {
            styles: HashMap::new(),
            default_style: TagStyle {
                tag: DEFAULT_STYLE_TAG.to_owned(),
                glyph: default_glyph.to_owned(),
                highlight: default_highlight.to_owned(),
            },
        })
    }

    /// Builds a registry from config, skipping (and logging) styles that fail validation.
    pub fn from_config(config: &AnnotationsConfig) -> Self {
        let mut registry = Self::new(&config.default_glyph, &config.default_highlight)
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to built-in default marker style");
                Self::default()
            });

        for style in &config.tags {
            if let Err(err) = registry.register(&style.name, &style.glyph, &style.highlight) {
                tracing::warn!(error = %err, "skipping configured tag style");
            }
        }
        registry
    }

    /// Registers (or replaces) the style for `tag`.
    pub fn register(&mut self, tag: &str, glyph: &str, highlight: &str) -> Result<(), SessionError> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(SessionError::InvalidTag(tag));
        }
        if !is_valid_glyph(glyph) {
            return Err(SessionError::InvalidGlyph {
                tag,
                glyph: glyph.to_owned(),
            });
        }

        self.styles.insert(
            tag.clone(),
            TagStyle {
                tag,
                glyph: glyph.to_owned(),
                highlight: highlight.trim().to_owned(),
            },
        );
        Ok(())
    }

    /// Style of the first tag in `tags` that has a registration, else the default.
    pub fn resolve(&self, tags: &[String]) -> &TagStyle {
        tags.iter()
            .find_map(|tag| self.styles.get(tag.as_str()))
            .unwrap_or(&self.default_style)
    }

    pub fn default_style(&self) -> &TagStyle {
        &self.default_style
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

impl Default for TagStyleRegistry {
    fn default() -> Self {
        Self {
            styles: HashMap::new(),
            default_style: TagStyle {
                tag: DEFAULT_STYLE_TAG.to_owned(),
                glyph: grokscope_config::DEFAULT_GLYPH.to_owned(),
                highlight: grokscope_config::DEFAULT_HIGHLIGHT.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use grokscope_config::TagStyleConfig;

    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    fn registry() -> TagStyleRegistry {
        let mut registry = TagStyleRegistry::default();
        registry.register("bug", ">>", "Error").expect("register bug");
        registry.register("todo", "??", "Todo").expect("register todo");
        registry
    }

    #[test]
    fn first_registered_tag_in_list_order_wins() {
        let registry = registry();

        assert_eq!(registry.resolve(&tags(&["todo", "bug"])).glyph, "??");
        assert_eq!(registry.resolve(&tags(&["bug", "todo"])).glyph, ">>");
        assert_eq!(registry.resolve(&tags(&["misc", "bug"])).highlight, "Error");
    }

    #[test]
    fn unknown_or_missing_tags_use_default_style() {
        let registry = registry();

        assert_eq!(registry.resolve(&[]), registry.default_style());
        assert_eq!(registry.resolve(&tags(&["misc"])).tag, DEFAULT_STYLE_TAG);
    }

    #[test]
    fn registration_overwrites_previous_style() {
        let mut registry = registry();
        registry.register("BUG", "!", "WarningMsg").expect("re-register bug");

        let style = registry.resolve(&tags(&["bug"]));
        assert_eq!(style.glyph, "!");
        assert_eq!(style.highlight, "WarningMsg");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn invalid_glyph_is_rejected_without_changing_state() {
        let mut registry = registry();

        let err = registry
            .register("bug", "!!!", "Error")
            .expect_err("three-cell glyph");
        assert!(matches!(err, SessionError::InvalidGlyph { .. }));
        assert!(matches!(
            registry.register("perf", "", "Error"),
            Err(SessionError::InvalidGlyph { .. })
        ));
        assert_eq!(registry.resolve(&tags(&["bug"])).glyph, ">>");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn from_config_skips_invalid_styles() {
        let config = AnnotationsConfig {
            default_glyph: "N".to_owned(),
            tags: vec![
                TagStyleConfig {
                    name: "bug".to_owned(),
                    glyph: ">>".to_owned(),
                    highlight: "Error".to_owned(),
                },
                TagStyleConfig {
                    name: "wide".to_owned(),
                    glyph: "<<<".to_owned(),
                    highlight: "Error".to_owned(),
                },
            ],
            ..AnnotationsConfig::default()
        };

        let registry = TagStyleRegistry::from_config(&config);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.default_style().glyph, "N");
        assert_eq!(registry.resolve(&tags(&["wide"])).glyph, "N");
    }
}
