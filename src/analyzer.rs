//! Document analysis: one raw document in, a structured analysis record out.
//!
//! The analysis carries everything the index needs: a bounded summary,
//! extracted topic terms, type-specific shape metadata, the ordered chunk
//! sequence with neighbor context, and embeddings at document and chunk
//! granularity. Shape metadata is descriptive only; it never influences
//! chunk boundaries or ranking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    chunking::{self, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    embedding::EmbeddingProvider,
    error::{Error, Result},
    loader::{DocumentKind, RawDocument},
    text_util::{excerpt, word_count},
};

/// Maximum summary length in characters.
pub const SUMMARY_MAX_CHARS: usize = 2000;

/// Documents longer than this build their summary from leading sections
/// instead of the full text.
const LONG_DOCUMENT_THRESHOLD: usize = 10_000;

/// Number of leading sections used for long-document summaries.
const SUMMARY_SECTIONS: usize = 5;

/// Sections shorter than this are ignored when summarizing.
const MIN_SECTION_CHARS: usize = 100;

/// Maximum number of extracted topic terms.
pub const TOPIC_LIMIT: usize = 20;

/// Characters of page text attached to each chunk as context.
const PAGE_EXCERPT_CHARS: usize = 200;

/// Characters per page in the structural page summaries.
const PAGE_SUMMARY_CHARS: usize = 300;

/// Maximum headings retained per document.
const HEADING_LIMIT: usize = 10;

/// Chunks with fewer words than this are classified as short text.
const SHORT_TEXT_WORDS: usize = 50;

/// Common words excluded from topic extraction.
const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "have", "will", "from", "they", "been", "were",
    "said", "each", "which", "their", "time", "would", "there", "could",
    "other", "more", "very", "what", "know", "just", "first", "into",
    "over", "think", "also", "your", "work", "life", "only", "can",
    "should", "after", "being", "now", "made", "before", "here", "through",
    "when", "where", "how", "all", "any", "may", "say",
];

/// Coarse classification of a chunk's content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ContentTypeHint {
    Table,
    FigureReference,
    ShortText,
    SummarySection,
    BodyText,
    TabularData,
    StructuredData,
}

/// Neighboring text carried with each chunk so assembled context can be
/// enriched without re-reading the source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkContext {
    /// Text of the preceding chunk on the same page, empty at the start.
    pub previous: String,
    /// Text of the following chunk on the same page, empty at the end.
    pub next: String,
    /// Short excerpt of the parent page.
    pub page_excerpt: String,
}

/// One semantic passage of a document, the unit of fine-grained retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Position of the owning document in the record array. Assigned when
    /// the index is built; stable until the next full rebuild.
    pub document_id: usize,
    pub text: String,
    /// 1-based page ordinal, used for citation.
    pub page_number: usize,
    /// 0-based chunk ordinal within its page.
    pub chunk_index: usize,
    pub context: ChunkContext,
    pub content_type: ContentTypeHint,
}

/// Per-page descriptive summary inside [`DocumentStructure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: usize,
    pub summary: String,
    pub content_type: ContentTypeHint,
}

/// Type-specific shape metadata. Purely descriptive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StructureShape {
    Plain {
        paragraph_count: usize,
        word_count: usize,
    },
    Prose {
        paragraph_count: usize,
        has_tables: bool,
        has_figures: bool,
        has_references: bool,
    },
    Tabular {
        row_count: usize,
        estimated_columns: usize,
        has_header: bool,
    },
    Spreadsheet {
        row_count: usize,
        has_multiple_sheets: bool,
        has_formulas: bool,
        data_density: f32,
    },
    WordProcessor {
        paragraph_count: usize,
        has_headings: bool,
        has_lists: bool,
        word_count: usize,
    },
    Structured {
        structure_type: String,
        key_count: Option<usize>,
        item_count: Option<usize>,
        nesting_depth: usize,
    },
}

/// Structural metadata for a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub headings: Vec<String>,
    pub page_summaries: Vec<PageSummary>,
    pub shape: StructureShape,
}

/// Document-level analysis record; position in the record array is the
/// document id referenced by chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique, stable identifier; the staleness key.
    pub locator: String,
    pub kind: DocumentKind,
    /// Bounded-length text representing the whole document.
    pub summary: String,
    /// Up to [`TOPIC_LIMIT`] extracted terms, most frequent first.
    pub topics: Vec<String>,
    pub structure: DocumentStructure,
    pub page_count: usize,
    /// Complete extracted text, retained for fallback context.
    pub full_text: String,
}

/// Text-only analysis, before any embedding work.
#[derive(Debug, Clone)]
pub struct ContentAnalysis {
    pub record: DocumentRecord,
    pub chunks: Vec<ChunkRecord>,
}

/// Complete analysis of one document: record, ordered chunks, and the
/// paired embeddings. `chunks` and `chunk_embeddings` always have the same
/// length and order.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis {
    pub record: DocumentRecord,
    pub chunks: Vec<ChunkRecord>,
    pub document_embedding: Vec<f32>,
    pub chunk_embeddings: Vec<Vec<f32>>,
}

/// Analyze a document end to end: content analysis plus embeddings.
///
/// A document whose summary embedding comes back empty is an analysis
/// failure ([`Error::EmptyAnalysis`]); the caller skips it and continues
/// with the rest of the batch.
pub fn analyze(
    raw: &RawDocument,
    provider: &dyn EmbeddingProvider,
) -> Result<DocumentAnalysis> {
    embed_content(analyze_content(raw), provider)
}

/// The CPU-bound half of [`analyze`]: summary, topics, structure, chunks.
pub fn analyze_content(raw: &RawDocument) -> ContentAnalysis {
    let full_text = raw.full_text();
    let summary = build_summary(&full_text);
    let topics = extract_topics(&full_text);
    let structure = analyze_structure(raw, &full_text);
    let chunks = build_chunks(raw);

    ContentAnalysis {
        record: DocumentRecord {
            locator: raw.locator.clone(),
            kind: raw.kind,
            summary,
            topics,
            structure,
            page_count: raw.pages.len(),
            full_text,
        },
        chunks,
    }
}

/// Generate document- and chunk-level embeddings for a content analysis.
pub fn embed_content(
    content: ContentAnalysis,
    provider: &dyn EmbeddingProvider,
) -> Result<DocumentAnalysis> {
    let document_embedding = provider.embed(&content.record.summary)?;
    if document_embedding.is_empty() {
        return Err(Error::EmptyAnalysis {
            locator: content.record.locator.clone(),
        });
    }

    let chunk_texts: Vec<String> =
        content.chunks.iter().map(|c| c.text.clone()).collect();
    let chunk_embeddings = provider.embed_batch(&chunk_texts)?;

    Ok(DocumentAnalysis {
        record: content.record,
        chunks: content.chunks,
        document_embedding,
        chunk_embeddings,
    })
}

/// Build the bounded document summary: long documents use their leading
/// sections, everything is truncated to [`SUMMARY_MAX_CHARS`].
fn build_summary(full_text: &str) -> String {
    let base = if full_text.chars().count() > LONG_DOCUMENT_THRESHOLD {
        let sections: Vec<&str> = full_text
            .split("\n\n")
            .map(str::trim)
            .filter(|s| s.chars().count() > MIN_SECTION_CHARS)
            .take(SUMMARY_SECTIONS)
            .collect();
        sections.join("\n")
    } else {
        full_text.to_string()
    };

    excerpt(&base, SUMMARY_MAX_CHARS)
}

/// Extract the most frequent meaningful terms: lowercased alphabetic
/// tokens of more than four letters, stop words removed, ordered by
/// descending frequency with first-seen order breaking ties.
fn extract_topics(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for token in text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| t.len() > 4)
    {
        let word = token.to_ascii_lowercase();
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        let count = counts.entry(word.clone()).or_insert(0);
        if *count == 0 {
            first_seen.push(word);
        }
        *count += 1;
    }

    let order: HashMap<&str, usize> = first_seen
        .iter()
        .enumerate()
        .map(|(i, w)| (w.as_str(), i))
        .collect();

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1).then_with(|| order[a.0.as_str()].cmp(&order[b.0.as_str()]))
    });

    ranked
        .into_iter()
        .take(TOPIC_LIMIT)
        .map(|(word, _)| word)
        .collect()
}

fn analyze_structure(raw: &RawDocument, full_text: &str) -> DocumentStructure {
    let shape = match raw.kind {
        DocumentKind::Text => StructureShape::Plain {
            paragraph_count: count_paragraphs(full_text, 0),
            word_count: word_count(full_text),
        },
        DocumentKind::PageBased => {
            let lower = full_text.to_lowercase();
            StructureShape::Prose {
                paragraph_count: count_paragraphs(full_text, 50),
                has_tables: lower.contains("table") || full_text.contains('|'),
                has_figures: lower.contains("figure") || lower.contains("fig."),
                has_references: lower.contains("references")
                    || lower.contains("bibliography"),
            }
        }
        DocumentKind::Tabular => {
            let lines: Vec<&str> = full_text.lines().collect();
            StructureShape::Tabular {
                row_count: lines.len(),
                estimated_columns: lines
                    .first()
                    .map(|l| l.split(',').count())
                    .unwrap_or(0),
                has_header: true,
            }
        }
        DocumentKind::Spreadsheet => {
            let lines: Vec<&str> = full_text.lines().collect();
            let non_empty =
                lines.iter().filter(|l| !l.trim().is_empty()).count();
            StructureShape::Spreadsheet {
                row_count: lines.len(),
                has_multiple_sheets: full_text.to_lowercase().contains("sheet"),
                has_formulas: lines
                    .iter()
                    .any(|l| l.trim_start().starts_with('=')),
                data_density: non_empty as f32 / lines.len().max(1) as f32,
            }
        }
        DocumentKind::WordProcessor => StructureShape::WordProcessor {
            paragraph_count: full_text.split("\n\n").count(),
            has_headings: full_text
                .lines()
                .take(10)
                .any(|l| is_upper_line(l) || is_title_line(l)),
            has_lists: full_text.contains('\u{2022}')
                || full_text.lines().any(|l| {
                    let t = l.trim_start();
                    t.starts_with("1.")
                        || t.starts_with("2.")
                        || t.starts_with("- ")
                        || t.starts_with("* ")
                }),
            word_count: word_count(full_text),
        },
        DocumentKind::StructuredData => analyze_json_shape(full_text),
    };

    let page_summaries = raw
        .pages
        .iter()
        .map(|page| PageSummary {
            page: page.ordinal,
            summary: excerpt(&page.text, PAGE_SUMMARY_CHARS),
            content_type: classify_content(&page.text, raw.kind),
        })
        .collect();

    DocumentStructure {
        headings: extract_headings(full_text, raw.kind),
        page_summaries,
        shape,
    }
}

fn analyze_json_shape(content: &str) -> StructureShape {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => {
            let nesting_depth = json_nesting(&value, 0);
            match value {
                Value::Array(items) => StructureShape::Structured {
                    structure_type: "array".to_string(),
                    key_count: None,
                    item_count: Some(items.len()),
                    nesting_depth,
                },
                Value::Object(map) => StructureShape::Structured {
                    structure_type: "object".to_string(),
                    key_count: Some(map.len()),
                    item_count: None,
                    nesting_depth,
                },
                _ => StructureShape::Structured {
                    structure_type: "scalar".to_string(),
                    key_count: None,
                    item_count: None,
                    nesting_depth,
                },
            }
        }
        Err(_) => StructureShape::Structured {
            structure_type: "invalid".to_string(),
            key_count: None,
            item_count: None,
            nesting_depth: 0,
        },
    }
}

fn json_nesting(value: &Value, level: usize) -> usize {
    match value {
        Value::Object(map) => map
            .values()
            .map(|v| json_nesting(v, level + 1))
            .max()
            .unwrap_or(level),
        Value::Array(items) => items
            .iter()
            .map(|v| json_nesting(v, level + 1))
            .max()
            .unwrap_or(level),
        _ => level,
    }
}

/// Paragraphs are double-newline sections; `min_chars` filters noise.
fn count_paragraphs(text: &str, min_chars: usize) -> usize {
    text.split("\n\n")
        .filter(|p| p.trim().chars().count() > min_chars)
        .count()
}

fn is_upper_line(line: &str) -> bool {
    let trimmed = line.trim();
    let mut has_alpha = false;
    for c in trimmed.chars() {
        if c.is_alphabetic() {
            has_alpha = true;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    has_alpha
}

fn is_title_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.split_whitespace().all(|word| {
        word.chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || !c.is_alphabetic())
    }) && trimmed.chars().any(|c| c.is_alphabetic())
}

/// Extract candidate headings, capped at [`HEADING_LIMIT`].
fn extract_headings(full_text: &str, kind: DocumentKind) -> Vec<String> {
    let mut headings = Vec::new();

    match kind {
        DocumentKind::Tabular | DocumentKind::Spreadsheet => {
            if let Some(first) = full_text.lines().next() {
                headings.extend(
                    first.split(',').map(|col| col.trim().to_string()),
                );
            }
        }
        DocumentKind::PageBased => {
            for line in full_text.lines() {
                let line = line.trim();
                if line.split_whitespace().count() <= 8
                    && line.chars().count() > 5
                    && (is_upper_line(line) || is_title_line(line))
                    && !line.ends_with('.')
                {
                    headings.push(line.to_string());
                }
            }
        }
        DocumentKind::Text | DocumentKind::WordProcessor => {
            for line in full_text.lines() {
                let line = line.trim();
                if !line.is_empty()
                    && line.split_whitespace().count() <= 10
                    && line.chars().count() < 100
                    && (is_upper_line(line) || is_title_line(line))
                    && !line.ends_with('.')
                {
                    headings.push(line.to_string());
                }
            }
        }
        DocumentKind::StructuredData => {}
    }

    headings.truncate(HEADING_LIMIT);
    headings
}

/// Classify content for the chunk-level hint.
fn classify_content(content: &str, kind: DocumentKind) -> ContentTypeHint {
    match kind {
        DocumentKind::Tabular => return ContentTypeHint::TabularData,
        DocumentKind::StructuredData => {
            return ContentTypeHint::StructuredData;
        }
        _ => {}
    }

    let lower = content.to_lowercase();
    if lower.contains("table") || content.contains('|') {
        ContentTypeHint::Table
    } else if lower.contains("figure") || lower.contains("chart") {
        ContentTypeHint::FigureReference
    } else if word_count(content) < SHORT_TEXT_WORDS {
        ContentTypeHint::ShortText
    } else if ["abstract", "summary", "conclusion"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        ContentTypeHint::SummarySection
    } else {
        ContentTypeHint::BodyText
    }
}

/// Chunk every page with the strategy for the document kind and annotate
/// each chunk with its neighbors and a page excerpt.
fn build_chunks(raw: &RawDocument) -> Vec<ChunkRecord> {
    let mut chunks = Vec::new();

    for page in &raw.pages {
        let page_chunks: Vec<String> = match raw.kind {
            DocumentKind::Tabular => chunking::split_rows(&page.text),
            DocumentKind::StructuredData => chunking::split_structured(
                &page.text,
                DEFAULT_CHUNK_SIZE,
                DEFAULT_CHUNK_OVERLAP,
            ),
            DocumentKind::Text
            | DocumentKind::Spreadsheet
            | DocumentKind::WordProcessor
            | DocumentKind::PageBased => chunking::split_text(
                &page.text,
                DEFAULT_CHUNK_SIZE,
                DEFAULT_CHUNK_OVERLAP,
            ),
        };

        let page_excerpt = excerpt(&page.text, PAGE_EXCERPT_CHARS);

        for (chunk_index, text) in page_chunks.iter().enumerate() {
            let previous = if chunk_index > 0 {
                page_chunks[chunk_index - 1].clone()
            } else {
                String::new()
            };
            let next = page_chunks
                .get(chunk_index + 1)
                .cloned()
                .unwrap_or_default();

            chunks.push(ChunkRecord {
                document_id: 0, // assigned when the index is built
                text: text.clone(),
                page_number: page.ordinal,
                chunk_index,
                context: ChunkContext {
                    previous,
                    next,
                    page_excerpt: page_excerpt.clone(),
                },
                content_type: classify_content(text, raw.kind),
            });
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RawPage;

    /// Deterministic embedder: token counts hashed into a small vector.
    struct StubProvider;

    impl EmbeddingProvider for StubProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[i % 8] += b as f32 / 255.0;
            }
            Ok(v)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> Result<usize> {
            Ok(8)
        }
    }

    /// Provider that simulates a failed embedding step.
    struct EmptyProvider;

    impl EmbeddingProvider for EmptyProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(Vec::new())
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![Vec::new(); texts.len()])
        }

        fn dimension(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn text_doc(locator: &str, text: &str) -> RawDocument {
        RawDocument {
            locator: locator.to_string(),
            kind: DocumentKind::Text,
            pages: vec![RawPage {
                ordinal: 1,
                text: text.to_string(),
            }],
        }
    }

    #[test]
    fn short_document_summary_is_full_text() {
        let doc = text_doc("a.txt", "A modest document body.");
        let analysis = analyze_content(&doc);
        assert_eq!(analysis.record.summary, "A modest document body.");
    }

    #[test]
    fn long_summary_is_truncated_with_marker() {
        let text = "paragraph content here ".repeat(200); // ~4600 chars
        let doc = text_doc("a.txt", &text);
        let analysis = analyze_content(&doc);

        assert!(analysis.record.summary.chars().count() <= SUMMARY_MAX_CHARS + 3);
        assert!(analysis.record.summary.ends_with("..."));
    }

    #[test]
    fn very_long_document_summarizes_leading_sections() {
        let section = "meaningful content sentence repeated often. ".repeat(5);
        let mut text = String::new();
        for _ in 0..80 {
            text.push_str(&section);
            text.push_str("\n\n");
        }
        assert!(text.chars().count() > 10_000);

        let doc = text_doc("long.txt", &text);
        let analysis = analyze_content(&doc);

        // Summary built from the first sections only, then truncated.
        assert!(analysis.record.summary.chars().count() <= SUMMARY_MAX_CHARS + 3);
        assert!(analysis.record.summary.starts_with("meaningful content"));
    }

    #[test]
    fn topics_ranked_by_frequency_with_stable_ties() {
        let text = "zebra zebra zebra apple apple mango mango cherry";
        let topics = extract_topics(text);

        assert_eq!(topics[0], "zebra");
        // apple and mango tie at 2; apple was seen first.
        assert_eq!(topics[1], "apple");
        assert_eq!(topics[2], "mango");
        assert_eq!(topics[3], "cherry");
    }

    #[test]
    fn topics_skip_stop_words_and_short_tokens() {
        let text = "which which which tiny word banana banana";
        let topics = extract_topics(text);

        assert!(!topics.contains(&"which".to_string()));
        assert!(!topics.contains(&"tiny".to_string())); // 4 letters
        assert!(!topics.contains(&"word".to_string()));
        assert_eq!(topics[0], "banana");
    }

    #[test]
    fn topics_capped_at_limit() {
        let mut text = String::new();
        for a in ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'] {
            for b in ['a', 'b', 'c', 'd', 'e'] {
                text.push_str(&format!("topic{a}{b}word "));
            }
        }
        assert_eq!(extract_topics(&text).len(), TOPIC_LIMIT);
    }

    #[test]
    fn tabular_structure_estimates_shape() {
        let doc = RawDocument {
            locator: "d.csv".into(),
            kind: DocumentKind::Tabular,
            pages: vec![RawPage {
                ordinal: 1,
                text: "name,age,city\nalice,30,berlin\nbob,25,paris".into(),
            }],
        };
        let analysis = analyze_content(&doc);

        match analysis.record.structure.shape {
            StructureShape::Tabular {
                row_count,
                estimated_columns,
                has_header,
            } => {
                assert_eq!(row_count, 3);
                assert_eq!(estimated_columns, 3);
                assert!(has_header);
            }
            ref other => panic!("expected tabular shape, got {other:?}"),
        }
        assert_eq!(
            analysis.record.structure.headings,
            vec!["name", "age", "city"]
        );
    }

    #[test]
    fn structured_shape_reports_nesting() {
        let doc = RawDocument {
            locator: "d.json".into(),
            kind: DocumentKind::StructuredData,
            pages: vec![RawPage {
                ordinal: 1,
                text: r#"{"a": {"b": [1, 2]}, "c": 3}"#.into(),
            }],
        };
        let analysis = analyze_content(&doc);

        match analysis.record.structure.shape {
            StructureShape::Structured {
                ref structure_type,
                key_count,
                nesting_depth,
                ..
            } => {
                assert_eq!(structure_type.as_str(), "object");
                assert_eq!(key_count, Some(2));
                assert_eq!(nesting_depth, 3);
            }
            ref other => panic!("expected structured shape, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_shape_is_flagged() {
        let doc = RawDocument {
            locator: "bad.json".into(),
            kind: DocumentKind::StructuredData,
            pages: vec![RawPage {
                ordinal: 1,
                text: "{ not valid".into(),
            }],
        };
        let analysis = analyze_content(&doc);

        match analysis.record.structure.shape {
            StructureShape::Structured {
                ref structure_type, ..
            } => assert_eq!(structure_type.as_str(), "invalid"),
            ref other => panic!("expected structured shape, got {other:?}"),
        }
    }

    #[test]
    fn chunks_carry_neighbor_context() {
        let text = "first sentence block. ".repeat(120); // forces 2+ chunks
        let doc = text_doc("a.txt", &text);
        let analysis = analyze_content(&doc);

        assert!(analysis.chunks.len() >= 2);
        let first = &analysis.chunks[0];
        let second = &analysis.chunks[1];

        assert_eq!(first.context.previous, "");
        assert_eq!(first.context.next, second.text);
        assert_eq!(second.context.previous, first.text);
        assert!(!first.context.page_excerpt.is_empty());
    }

    #[test]
    fn last_chunk_has_empty_next_context() {
        let doc = text_doc("a.txt", "one small chunk only");
        let analysis = analyze_content(&doc);

        assert_eq!(analysis.chunks.len(), 1);
        assert_eq!(analysis.chunks[0].context.previous, "");
        assert_eq!(analysis.chunks[0].context.next, "");
    }

    #[test]
    fn chunk_index_resets_per_page() {
        let doc = RawDocument {
            locator: "p.txt".into(),
            kind: DocumentKind::Text,
            pages: vec![
                RawPage {
                    ordinal: 1,
                    text: "page one".into(),
                },
                RawPage {
                    ordinal: 2,
                    text: "page two".into(),
                },
            ],
        };
        let analysis = analyze_content(&doc);

        assert_eq!(analysis.chunks.len(), 2);
        assert_eq!(analysis.chunks[0].page_number, 1);
        assert_eq!(analysis.chunks[0].chunk_index, 0);
        assert_eq!(analysis.chunks[1].page_number, 2);
        assert_eq!(analysis.chunks[1].chunk_index, 0);
    }

    #[test]
    fn content_hints_follow_kind_then_text() {
        assert_eq!(
            classify_content("anything", DocumentKind::Tabular),
            ContentTypeHint::TabularData
        );
        assert_eq!(
            classify_content("anything", DocumentKind::StructuredData),
            ContentTypeHint::StructuredData
        );
        assert_eq!(
            classify_content("see the table | below", DocumentKind::Text),
            ContentTypeHint::Table
        );
        assert_eq!(
            classify_content("as figure 3 shows", DocumentKind::Text),
            ContentTypeHint::FigureReference
        );
        assert_eq!(
            classify_content("short note", DocumentKind::Text),
            ContentTypeHint::ShortText
        );

        let body = "plain prose without special markers ".repeat(10);
        assert_eq!(
            classify_content(&body, DocumentKind::Text),
            ContentTypeHint::BodyText
        );
    }

    #[test]
    fn analyze_pairs_chunks_with_embeddings() {
        let text = "sentence for the analyzer. ".repeat(120);
        let doc = text_doc("a.txt", &text);
        let analysis = analyze(&doc, &StubProvider).unwrap();

        assert!(!analysis.document_embedding.is_empty());
        assert_eq!(analysis.chunks.len(), analysis.chunk_embeddings.len());
    }

    #[test]
    fn empty_embedding_is_empty_analysis() {
        let doc = text_doc("a.txt", "content");
        let err = analyze(&doc, &EmptyProvider).unwrap_err();
        assert!(matches!(err, Error::EmptyAnalysis { .. }));
    }
}
