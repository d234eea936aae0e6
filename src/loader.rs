//! Document discovery and text acquisition.
//!
//! The retrieval core never parses file formats itself: it consumes
//! `(locator, kind, pages)` records through the [`DocumentSource`] trait.
//! [`FsSource`] is the shipped implementation for text-decodable files; an
//! external extractor can implement the same trait to feed page-based or
//! binary formats (PDF, Word, spreadsheets) into the engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coarse document type, decided from the file extension.
///
/// Dispatching on this enum (rather than the extension string) keeps every
/// per-type branch exhaustive: adding a kind forces the analyzer and the
/// chunker to handle it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// Plain text and markdown.
    Text,
    /// Row-oriented data (CSV, TSV).
    Tabular,
    /// Spreadsheet exports.
    Spreadsheet,
    /// Word-processor documents.
    WordProcessor,
    /// Key/value or array data (JSON).
    StructuredData,
    /// Page-oriented documents (PDF).
    PageBased,
}

impl DocumentKind {
    /// Classify a path by its extension. Returns `None` for unsupported
    /// extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" => Some(Self::Text),
            "csv" | "tsv" => Some(Self::Tabular),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            "docx" => Some(Self::WordProcessor),
            "json" => Some(Self::StructuredData),
            "pdf" => Some(Self::PageBased),
            _ => None,
        }
    }

    /// Short human-readable label, also used in JSON output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Tabular => "tabular",
            Self::Spreadsheet => "spreadsheet",
            Self::WordProcessor => "word-processor",
            Self::StructuredData => "structured-data",
            Self::PageBased => "page-based",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One page (or section) of extracted text.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// 1-based page ordinal within the document.
    pub ordinal: usize,
    pub text: String,
}

/// A document as delivered by a [`DocumentSource`]: already text-extracted,
/// split into pages, tagged with its kind.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Stable identifier; the staleness key for the whole collection.
    pub locator: String,
    pub kind: DocumentKind,
    pub pages: Vec<RawPage>,
}

impl RawDocument {
    /// The complete extracted text, pages joined by newlines.
    pub fn full_text(&self) -> String {
        let parts: Vec<&str> =
            self.pages.iter().map(|p| p.text.as_str()).collect();
        parts.join("\n")
    }
}

/// Boundary to the external loading layer.
///
/// `list` must be cheap (it runs on every initialization to diff against
/// the persisted index); `load` may do real extraction work.
pub trait DocumentSource: Send + Sync {
    /// All locators currently present in the source, sorted.
    fn list(&self) -> Result<Vec<String>>;

    /// Load and extract one document.
    fn load(&self, locator: &str) -> Result<RawDocument>;
}

/// The final path component of a locator, for display and citations.
pub fn basename(locator: &str) -> &str {
    locator.rsplit(['/', '\\']).next().unwrap_or(locator)
}

/// Extensions `FsSource` can extract without an external converter.
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "csv", "tsv", "json"];

/// Filesystem-backed document source rooted at a documents directory.
///
/// Walks the directory recursively, skipping hidden files and directories,
/// and treats the path relative to the root as the document locator.
/// Multi-page text files are split on form-feed characters.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "documents path is not a directory: {}",
                root.display()
            )));
        }
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, current: &Path, results: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(current)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            // Skip hidden files and directories.
            if name.starts_with('.') {
                continue;
            }

            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                self.walk(&entry.path(), results)?;
            } else if file_type.is_symlink() {
                let resolved = match entry.path().canonicalize() {
                    Ok(p) => p,
                    Err(_) => continue, // Skip broken symlinks
                };
                // Skip directory symlinks that point back into the root
                // (cycle prevention).
                if resolved.is_dir() {
                    continue;
                }
                if resolved.is_file() && is_supported(&resolved) {
                    results.push(self.relative_locator(&entry.path()));
                }
            } else if file_type.is_file() && is_supported(&entry.path()) {
                results.push(self.relative_locator(&entry.path()));
            }
        }
        Ok(())
    }

    fn relative_locator(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}

/// Split extracted text into pages on form feeds; plain files become a
/// single page.
fn split_pages(text: &str) -> Vec<RawPage> {
    text.split('\u{c}')
        .filter(|part| !part.trim().is_empty())
        .enumerate()
        .map(|(i, part)| RawPage {
            ordinal: i + 1,
            text: part.to_string(),
        })
        .collect()
}

impl DocumentSource for FsSource {
    fn list(&self) -> Result<Vec<String>> {
        let mut results = Vec::new();
        self.walk(&self.root, &mut results)?;
        results.sort();
        Ok(results)
    }

    fn load(&self, locator: &str) -> Result<RawDocument> {
        let path = self.root.join(locator);
        let kind =
            DocumentKind::from_path(&path).ok_or_else(|| Error::Load {
                locator: locator.to_string(),
                reason: "unsupported file type".to_string(),
            })?;

        let text =
            std::fs::read_to_string(&path).map_err(|e| Error::Load {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;

        let pages = split_pages(&text);
        if pages.is_empty() {
            return Err(Error::Load {
                locator: locator.to_string(),
                reason: "no content extracted".to_string(),
            });
        }

        Ok(RawDocument {
            locator: locator.to_string(),
            kind,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions() {
        assert_eq!(
            DocumentKind::from_path(Path::new("a.txt")),
            Some(DocumentKind::Text)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("a.CSV")),
            Some(DocumentKind::Tabular)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("a.json")),
            Some(DocumentKind::StructuredData)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("a.pdf")),
            Some(DocumentKind::PageBased)
        );
        assert_eq!(DocumentKind::from_path(Path::new("a.png")), None);
        assert_eq!(DocumentKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn lists_supported_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("z.txt"), "z").unwrap();
        std::fs::write(tmp.path().join("a.csv"), "h\n1").unwrap();
        std::fs::write(tmp.path().join("image.png"), "binary").unwrap();

        let source = FsSource::new(tmp.path()).unwrap();
        assert_eq!(source.list().unwrap(), vec!["a.csv", "z.txt"]);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".secret.txt"), "hidden").unwrap();
        let hidden_dir = tmp.path().join(".cache");
        std::fs::create_dir(&hidden_dir).unwrap();
        std::fs::write(hidden_dir.join("inner.txt"), "hidden").unwrap();
        std::fs::write(tmp.path().join("visible.txt"), "hello").unwrap();

        let source = FsSource::new(tmp.path()).unwrap();
        assert_eq!(source.list().unwrap(), vec!["visible.txt"]);
    }

    #[test]
    fn recurses_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("reports");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("q1.txt"), "report").unwrap();
        std::fs::write(tmp.path().join("top.txt"), "top").unwrap();

        let source = FsSource::new(tmp.path()).unwrap();
        let listed = source.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&"top.txt".to_string()));
        assert!(listed.iter().any(|l| l.ends_with("q1.txt")));
    }

    #[test]
    fn loads_document_with_kind() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("data.csv"), "a,b\n1,2\n").unwrap();

        let source = FsSource::new(tmp.path()).unwrap();
        let doc = source.load("data.csv").unwrap();
        assert_eq!(doc.kind, DocumentKind::Tabular);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].ordinal, 1);
        assert!(doc.full_text().contains("a,b"));
    }

    #[test]
    fn splits_pages_on_form_feed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("paged.txt"),
            "first page\u{c}second page\u{c}third page",
        )
        .unwrap();

        let source = FsSource::new(tmp.path()).unwrap();
        let doc = source.load("paged.txt").unwrap();
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[2].ordinal, 3);
        assert_eq!(doc.pages[1].text, "second page");
    }

    #[test]
    fn load_missing_file_is_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FsSource::new(tmp.path()).unwrap();

        let err = source.load("ghost.txt").unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }

    #[test]
    fn empty_file_is_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("empty.txt"), "   \n").unwrap();

        let source = FsSource::new(tmp.path()).unwrap();
        let err = source.load("empty.txt").unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("reports/q1.txt"), "q1.txt");
        assert_eq!(basename("plain.txt"), "plain.txt");
    }
}
