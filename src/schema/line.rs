use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("line index {index} out of range (catalog has {len} lines)")]
    OutOfRange { index: usize, len: usize },
    #[error("line {index} has no '{language}' variant")]
    MissingLanguage { index: usize, language: LanguageTag },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Language key used to pick a localized variant, e.g. `"en"` or `"de"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(pub String);

impl LanguageTag {
    pub fn new(tag: &str) -> Self {
        Self(tag.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One displayable line with a variant per language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub text: FxHashMap<LanguageTag, String>,
    pub font_size: f32,
}

impl Line {
    /// Returns the variant for `language`, if authored.
    pub fn get(&self, language: &LanguageTag) -> Option<&str> {
        self.text.get(language).map(String::as_str)
    }
}

/// An ordered, immutable table of lines addressed by position.
///
/// Node routines refer to lines by index only; the catalog is injected
/// into the director so tests can swap in small fixture tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineCatalog {
    /// Languages every line is expected to carry. The first entry is the
    /// fallback when a line lacks the requested language.
    #[serde(default)]
    pub languages: Vec<LanguageTag>,
    pub lines: Vec<Line>,
}

impl LineCatalog {
    /// Load a catalog from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<LineCatalog, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a catalog from a RON string.
    pub fn parse_ron(input: &str) -> Result<LineCatalog, CatalogError> {
        Ok(ron::from_str(input)?)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Positional lookup. Out-of-range access is an error, never a no-op.
    pub fn get(&self, index: usize) -> Result<&Line, CatalogError> {
        self.lines.get(index).ok_or(CatalogError::OutOfRange {
            index,
            len: self.lines.len(),
        })
    }

    /// Resolve the text and font size of line `index` in `language`,
    /// falling back to the catalog's first language.
    pub fn localized(
        &self,
        index: usize,
        language: &LanguageTag,
    ) -> Result<(&str, f32), CatalogError> {
        let line = self.get(index)?;
        if let Some(text) = line.get(language) {
            return Ok((text, line.font_size));
        }
        let fallback = self
            .languages
            .first()
            .and_then(|lang| line.get(lang))
            .ok_or_else(|| CatalogError::MissingLanguage {
                index,
                language: language.clone(),
            })?;
        tracing::warn!(index, language = %language, "line missing language, using fallback");
        Ok((fallback, line.font_size))
    }

    /// Report every (index, language) pair that is declared but not authored.
    pub fn missing_variants(&self) -> Vec<(usize, LanguageTag)> {
        let mut missing = Vec::new();
        for (index, line) in self.lines.iter().enumerate() {
            for lang in &self.languages {
                if line.get(lang).is_none() {
                    missing.push((index, lang.clone()));
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"(
        languages: ["en", "de"],
        lines: [
            (text: {"en": "Hello", "de": "Hallo"}, font_size: 21.6),
            (text: {"en": "Only English"}, font_size: 26.0),
        ],
    )"#;

    #[test]
    fn parse_catalog() {
        let catalog = LineCatalog::parse_ron(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.languages.len(), 2);
        assert_eq!(catalog.get(0).unwrap().font_size, 21.6);
    }

    #[test]
    fn localized_picks_language() {
        let catalog = LineCatalog::parse_ron(CATALOG).unwrap();
        let (text, _) = catalog.localized(0, &LanguageTag::new("de")).unwrap();
        assert_eq!(text, "Hallo");
    }

    #[test]
    fn localized_falls_back_to_first_language() {
        let catalog = LineCatalog::parse_ron(CATALOG).unwrap();
        let (text, size) = catalog.localized(1, &LanguageTag::new("de")).unwrap();
        assert_eq!(text, "Only English");
        assert_eq!(size, 26.0);
    }

    #[test]
    fn out_of_range_is_error() {
        let catalog = LineCatalog::parse_ron(CATALOG).unwrap();
        let err = catalog.get(2).unwrap_err();
        assert!(matches!(err, CatalogError::OutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn missing_variants_reported() {
        let catalog = LineCatalog::parse_ron(CATALOG).unwrap();
        let missing = catalog.missing_variants();
        assert_eq!(missing, vec![(1, LanguageTag::new("de"))]);
    }
}
