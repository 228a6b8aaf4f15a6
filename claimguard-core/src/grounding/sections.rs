//! Section extraction and the immutable policy document handle.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::replay::compute_text_hash;

// Start of text or newline, optional whitespace, "<digits>.<digits>", whitespace,
// then an uppercase letter. "2.3.1" and lowercase headings never match.
static SECTION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\n)\s*(\d+\.\d+)\s+[A-Z]").expect("valid section header regex")
});

/// Extract the section identifiers a policy document defines.
///
/// An empty or malformed document yields an empty set, which makes every
/// citation fail verification.
pub fn extract_sections(document_text: &str) -> BTreeSet<String> {
    SECTION_HEADER_RE
        .captures_iter(document_text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Raw policy text with its section set, computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    text: String,
    sections: BTreeSet<String>,
    source: Option<PathBuf>,
}

impl PolicyDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let sections = extract_sections(&text);
        Self {
            text,
            sections,
            source: None,
        }
    }

    /// Read a policy document from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::policy_load(path.display().to_string(), e.to_string()))?;

        let mut document = Self::new(text);
        document.source = Some(path.to_path_buf());
        tracing::debug!(
            path = %path.display(),
            sections = document.sections.len(),
            "Loaded policy document"
        );
        Ok(document)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sections(&self) -> &BTreeSet<String> {
        &self.sections
    }

    pub fn has_section(&self, section_number: &str) -> bool {
        self.sections.contains(section_number)
    }

    /// Sorted copy of the section set, as used in reports and prompts.
    pub fn sorted_sections(&self) -> Vec<String> {
        self.sections.iter().cloned().collect()
    }

    /// Verbatim substring test against the raw text.
    pub fn contains_verbatim(&self, excerpt: &str) -> bool {
        self.text.contains(excerpt)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Replay hash of the exact text held by this document.
    pub fn content_hash(&self) -> String {
        compute_text_hash(&self.text)
    }
}

/// Lazily loads one policy file and shares it read-only.
///
/// The first successful load wins; concurrent callers wait on the same
/// initialization. A failed load is not cached.
#[derive(Debug)]
pub struct PolicyCache {
    path: PathBuf,
    cell: OnceCell<Arc<PolicyDocument>>,
}

impl PolicyCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the shared document, loading it on first use.
    pub async fn get(&self) -> Result<Arc<PolicyDocument>> {
        self.cell
            .get_or_try_init(|| async { PolicyDocument::load(&self.path).await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
