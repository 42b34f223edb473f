//! Message template pool and the global cyclic cursor over it.

use crate::error::{TrafficError, TrafficResult};
use std::path::Path;

/// Minimum length (exclusive) of an all-caps word that makes a message
/// worth dictating.
pub const DICTATION_WORD_MIN_LEN: usize = 4;

/// Whether a message contains at least one whitespace-delimited token longer
/// than [`DICTATION_WORD_MIN_LEN`] characters that is entirely upper-case.
pub fn is_dictation_worthy(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        word.chars().count() > DICTATION_WORD_MIN_LEN
            && word.chars().any(char::is_alphabetic)
            && !word.chars().any(char::is_lowercase)
    })
}

/// Flat, ordered list of non-empty template texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplatePool {
    templates: Vec<String>,
}

impl TemplatePool {
    /// Build a pool, dropping blank entries.
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|t| Into::<String>::into(t).trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Parse one template per line; blank lines and `#` comments are skipped.
    pub fn from_text(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#')),
        )
    }

    /// Load a template file (one template per line).
    pub fn from_file(path: &Path) -> TrafficResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrafficError::template_file(path, e.to_string()))?;
        Ok(Self::from_text(&content))
    }

    /// Append templates from another pool, keeping order.
    pub fn extend(&mut self, other: TemplatePool) {
        self.templates.extend(other.templates);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(String::as_str)
    }

    /// Templates qualifying as dictation material, in pool order.
    pub fn dictation_worthy(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|t| is_dictation_worthy(t))
    }

    /// Start a fresh cyclic cursor at the first template.
    pub fn cursor(&self) -> TemplateCursor<'_> {
        TemplateCursor {
            pool: self,
            position: 0,
        }
    }
}

/// Cyclic cursor over a [`TemplatePool`].
///
/// One cursor is threaded through the whole distribution step so the text
/// sequence continues across participants and wraps on overflow.
#[derive(Debug, Clone)]
pub struct TemplateCursor<'a> {
    pool: &'a TemplatePool,
    position: usize,
}

impl<'a> TemplateCursor<'a> {
    /// Number of templates drawn so far
    pub fn position(&self) -> usize {
        self.position
    }
}

impl<'a> Iterator for TemplateCursor<'a> {
    type Item = &'a str;

    /// Never ends unless the pool is empty.
    fn next(&mut self) -> Option<&'a str> {
        if self.pool.is_empty() {
            return None;
        }
        let text = &self.pool.templates[self.position % self.pool.len()];
        self.position += 1;
        Some(text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictation_detection() {
        assert!(is_dictation_worthy("Bitte buchstabieren: NOTFALL"));
        assert!(is_dictation_worthy("WASSERSCHADEN, sofort"));
        assert!(is_dictation_worthy("Ort: ÜBUNGSPLATZ"));
        // exactly four characters is not enough
        assert!(!is_dictation_worthy("Lage OKAY"));
        // mixed case
        assert!(!is_dictation_worthy("MeldungEINS"));
        // digits only
        assert!(!is_dictation_worthy("Kanal 12345"));
        assert!(!is_dictation_worthy(""));
    }

    #[test]
    fn test_from_text_skips_blank_and_comments() {
        let pool = TemplatePool::from_text("# Vorlagen\nErste Meldung\n\n  Zweite Meldung  \n# Ende\n");
        let texts: Vec<_> = pool.iter().collect();
        assert_eq!(texts, vec!["Erste Meldung", "Zweite Meldung"]);
    }

    #[test]
    fn test_cursor_wraps_around() {
        let pool = TemplatePool::new(["a", "b", "c"]);
        let drawn: Vec<_> = pool.cursor().take(7).collect();
        assert_eq!(drawn, vec!["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn test_cursor_on_empty_pool() {
        let pool = TemplatePool::default();
        let mut cursor = pool.cursor();
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_dictation_worthy_iterator() {
        let pool = TemplatePool::new(["normal", "Stichwort FEUERWEHR", "KURZ"]);
        let worthy: Vec<_> = pool.dictation_worthy().collect();
        assert_eq!(worthy, vec!["Stichwort FEUERWEHR"]);
    }
}
