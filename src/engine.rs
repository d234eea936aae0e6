//! The retrieval orchestrator.
//!
//! Owns the document source, the embedding provider, the optional
//! generator and the index itself. Decides when the index must be rebuilt
//! (absent, unreadable, or stale against the live source), maps the
//! qualitative analysis depth to retrieval widths, and composes query
//! responses with the deterministic fallback when generation fails.
//!
//! The index lives behind a `RwLock<Option<IndexStore>>`: queries run
//! against an immutable store under a read guard, and a rebuild installs
//! a completely constructed replacement with a single write, so readers
//! never observe a half-replaced index.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    analyzer::{self, ContentAnalysis, DocumentAnalysis},
    data_dir::DataDir,
    embedding::EmbeddingProvider,
    error::{Error, Result},
    generation::{self, Generator},
    index_store::{HybridSearchResult, IndexStore, StalenessReport},
    loader::{DocumentKind, DocumentSource, basename},
    persist,
    text_util::excerpt,
};

/// Character budget for assembled query context.
const CONTEXT_BUDGET_CHARS: usize = 6000;

/// Documents quoted in the fallback response.
const FALLBACK_DOCUMENTS: usize = 3;

/// Chunks quoted in the fallback response.
const FALLBACK_CHUNKS: usize = 5;

/// Summary excerpt length in the fallback response.
const FALLBACK_SUMMARY_CHARS: usize = 300;

/// Chunk excerpt length in the fallback response.
const FALLBACK_CHUNK_CHARS: usize = 200;

/// Summary excerpt length in collection overviews.
const OVERVIEW_SUMMARY_CHARS: usize = 200;

/// Topics listed per document in collection overviews.
const OVERVIEW_TOPIC_COUNT: usize = 10;

/// Qualitative analysis depth, mapped deterministically to retrieval
/// widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    Standard,
    Deep,
}

impl Depth {
    /// `(document shortlist width, chunk width)` for this depth. A pure
    /// mapping with no hidden state.
    pub fn widths(self) -> (usize, usize) {
        match self {
            Self::Quick => (2, 5),
            Self::Standard => (3, 8),
            Self::Deep => (5, 15),
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        })
    }
}

/// Outcome of [`RetrievalEngine::initialize`] or a forced rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeReport {
    /// Whether the index was (re)built rather than loaded.
    pub rebuilt: bool,
    pub documents: usize,
    pub chunks: usize,
    /// Locators skipped during analysis, with the batch continuing.
    pub skipped: Vec<String>,
    /// The staleness diff that triggered a rebuild, when one did.
    pub staleness: Option<StalenessReport>,
    /// A persisted-index load failure that forced a rebuild.
    pub load_error: Option<String>,
}

/// A composed answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub response: String,
    pub search: HybridSearchResult,
    pub context_used: String,
    pub depth: Depth,
    /// True when the response came from the deterministic fallback.
    pub fallback_used: bool,
}

/// Per-document entry in the collection summary.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOverview {
    pub name: String,
    pub locator: String,
    pub kind: DocumentKind,
    pub page_count: usize,
    pub top_topics: Vec<String>,
    pub summary: String,
}

/// Aggregate view of the indexed collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub kind_counts: BTreeMap<String, usize>,
    pub documents: Vec<DocumentOverview>,
}

/// The explicitly-owned engine instance. One build may be in flight at a
/// time; any number of queries may run against the current index.
pub struct RetrievalEngine {
    source: Box<dyn DocumentSource>,
    provider: Arc<dyn EmbeddingProvider>,
    generator: Option<Box<dyn Generator>>,
    data_dir: DataDir,
    store: RwLock<Option<IndexStore>>,
}

impl RetrievalEngine {
    pub fn new(
        source: Box<dyn DocumentSource>,
        provider: Arc<dyn EmbeddingProvider>,
        generator: Option<Box<dyn Generator>>,
        data_dir: DataDir,
    ) -> Self {
        Self {
            source,
            provider,
            generator,
            data_dir,
            store: RwLock::new(None),
        }
    }

    /// Whether a built index is available for queries.
    pub fn is_ready(&self) -> bool {
        self.store
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Load the persisted index, or rebuild it when it is absent,
    /// unreadable, or stale against the live source.
    pub fn initialize(&self) -> Result<InitializeReport> {
        let current = self.source.list()?;

        match persist::load(&self.data_dir) {
            Ok(Some(store)) => {
                let staleness = store.detect_staleness(&current);
                if staleness.stale {
                    tracing::info!(
                        added = staleness.added.len(),
                        removed = staleness.removed.len(),
                        "document collection changed; rebuilding index"
                    );
                    let mut report = self.rebuild_from(&current)?;
                    report.staleness = Some(staleness);
                    return Ok(report);
                }

                let report = InitializeReport {
                    rebuilt: false,
                    documents: store.documents().len(),
                    chunks: store.chunks().len(),
                    skipped: Vec::new(),
                    staleness: None,
                    load_error: None,
                };
                self.install(store)?;
                Ok(report)
            }
            Ok(None) => {
                tracing::info!("no persisted index found; building");
                self.rebuild_from(&current)
            }
            Err(e) => {
                tracing::warn!(
                    "persisted index unreadable ({e}); rebuilding"
                );
                let mut report = self.rebuild_from(&current)?;
                report.load_error = Some(e.to_string());
                Ok(report)
            }
        }
    }

    /// Force a full rebuild from the current state of the source.
    pub fn rebuild(&self) -> Result<InitializeReport> {
        let current = self.source.list()?;
        self.rebuild_from(&current)
    }

    fn rebuild_from(&self, locators: &[String]) -> Result<InitializeReport> {
        // CPU-bound loading and content analysis in parallel; embedding
        // runs document by document afterwards so chunk order is never
        // disturbed.
        let contents: Vec<(String, Result<ContentAnalysis>)> = locators
            .par_iter()
            .map(|locator| {
                let content = self
                    .source
                    .load(locator)
                    .map(|raw| analyzer::analyze_content(&raw));
                (locator.clone(), content)
            })
            .collect();

        let mut analyses: Vec<DocumentAnalysis> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for (locator, content) in contents {
            let analysis = content.and_then(|c| {
                analyzer::embed_content(c, self.provider.as_ref())
            });
            match analysis {
                Ok(analysis) => {
                    tracing::info!(
                        locator = %locator,
                        chunks = analysis.chunks.len(),
                        "document analyzed"
                    );
                    analyses.push(analysis);
                }
                Err(e) => {
                    tracing::warn!(locator = %locator, "skipping document: {e}");
                    skipped.push(locator);
                }
            }
        }

        let store = IndexStore::build(analyses)?;
        persist::save(&store, &self.data_dir)?;

        let report = InitializeReport {
            rebuilt: true,
            documents: store.documents().len(),
            chunks: store.chunks().len(),
            skipped,
            staleness: None,
            load_error: None,
        };
        self.install(store)?;
        Ok(report)
    }

    /// Atomically swap in a fully-built store.
    fn install(&self, store: IndexStore) -> Result<()> {
        let mut guard = self
            .store
            .write()
            .map_err(|_| Error::Config("index lock poisoned".into()))?;
        *guard = Some(store);
        Ok(())
    }

    /// Retrieval only: the hybrid search result at the given depth.
    pub fn search(
        &self,
        text: &str,
        depth: Depth,
    ) -> Result<HybridSearchResult> {
        let (doc_k, chunk_k) = depth.widths();
        let guard = self
            .store
            .read()
            .map_err(|_| Error::Config("index lock poisoned".into()))?;
        let store = guard.as_ref().ok_or(Error::IndexUnavailable)?;
        store.hybrid_search(self.provider.as_ref(), text, doc_k, chunk_k)
    }

    /// Answer a question: hybrid search, bounded context assembly, then
    /// generation, or the deterministic fallback when generation is
    /// unavailable or fails.
    pub async fn query(
        &self,
        text: &str,
        depth: Depth,
    ) -> Result<QueryResponse> {
        let (doc_k, chunk_k) = depth.widths();

        // Search and context come from one read guard so a concurrent
        // rebuild cannot interleave; the guard is released before the
        // generation call.
        let (search, context) = {
            let guard = self
                .store
                .read()
                .map_err(|_| Error::Config("index lock poisoned".into()))?;
            let store = guard.as_ref().ok_or(Error::IndexUnavailable)?;
            let search = store.hybrid_search(
                self.provider.as_ref(),
                text,
                doc_k,
                chunk_k,
            )?;
            let context = store.assemble_context(
                self.provider.as_ref(),
                text,
                CONTEXT_BUDGET_CHARS,
            )?;
            (search, context)
        };

        let (response, fallback_used) = match &self.generator {
            Some(generator) => {
                let prompt = generation::build_prompt(text, &context);
                match generator.generate(&prompt).await {
                    Ok(response) => (response, false),
                    Err(e) => {
                        tracing::warn!(
                            "generation failed ({e}); using fallback response"
                        );
                        (fallback_response(text, &search), true)
                    }
                }
            }
            None => (fallback_response(text, &search), true),
        };

        Ok(QueryResponse {
            query: text.to_string(),
            response,
            search,
            context_used: context,
            depth,
            fallback_used,
        })
    }

    /// Aggregate view of the indexed collection.
    pub fn collection_summary(&self) -> Result<CollectionSummary> {
        let guard = self
            .store
            .read()
            .map_err(|_| Error::Config("index lock poisoned".into()))?;
        let store = guard.as_ref().ok_or(Error::IndexUnavailable)?;

        let mut kind_counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in store.documents() {
            *kind_counts
                .entry(record.kind.label().to_string())
                .or_insert(0) += 1;
        }

        let documents = store
            .documents()
            .iter()
            .map(|record| DocumentOverview {
                name: basename(&record.locator).to_string(),
                locator: record.locator.clone(),
                kind: record.kind,
                page_count: record.page_count,
                top_topics: record
                    .topics
                    .iter()
                    .take(OVERVIEW_TOPIC_COUNT)
                    .cloned()
                    .collect(),
                summary: excerpt(&record.summary, OVERVIEW_SUMMARY_CHARS),
            })
            .collect();

        Ok(CollectionSummary {
            total_documents: store.documents().len(),
            total_chunks: store.chunks().len(),
            kind_counts,
            documents,
        })
    }
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/// The deterministic response used when generation is unavailable: the
/// top documents by summary and the top chunks by text, straight from the
/// search result.
fn fallback_response(query: &str, search: &HybridSearchResult) -> String {
    let mut parts = vec![format!(
        "Based on the indexed documents, here is what was found for: \
         '{query}'"
    )];

    if !search.documents.is_empty() {
        let mut section = String::from("RELEVANT DOCUMENTS:");
        for (i, doc) in
            search.documents.iter().take(FALLBACK_DOCUMENTS).enumerate()
        {
            section.push_str(&format!(
                "\n{}. {}: {}",
                i + 1,
                basename(&doc.locator),
                excerpt(&doc.summary, FALLBACK_SUMMARY_CHARS)
            ));
        }
        parts.push(section);
    }

    if !search.chunks.is_empty() {
        let mut section = String::from("RELEVANT CONTENT:");
        for (i, chunk) in
            search.chunks.iter().take(FALLBACK_CHUNKS).enumerate()
        {
            section.push_str(&format!(
                "\n{}. [Page {}] {}",
                i + 1,
                chunk.page_number,
                excerpt(&chunk.text, FALLBACK_CHUNK_CHARS)
            ));
        }
        parts.push(section);
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FsSource;

    /// Deterministic embedder: whitespace tokens hashed into a small
    /// fixed-dimension vector. Shared-token texts land close together.
    struct HashProvider;

    const HASH_DIM: usize = 16;

    impl HashProvider {
        fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; HASH_DIM];
            for token in text.split_whitespace() {
                let mut h: u64 = 0xcbf29ce484222325;
                for b in token.to_lowercase().bytes() {
                    h ^= b as u64;
                    h = h.wrapping_mul(0x100000001b3);
                }
                v[(h % HASH_DIM as u64) as usize] += 1.0;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            v
        }
    }

    impl EmbeddingProvider for HashProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(Self::vector(text))
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }

        fn dimension(&self) -> Result<usize> {
            Ok(HASH_DIM)
        }
    }

    struct FailingGenerator;

    #[async_trait::async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::Generation("simulated outage".into()))
        }
    }

    struct EchoGenerator;

    #[async_trait::async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo of {} chars", prompt.len()))
        }
    }

    fn engine_for(
        docs_dir: &std::path::Path,
        data_dir: &std::path::Path,
        generator: Option<Box<dyn Generator>>,
    ) -> RetrievalEngine {
        RetrievalEngine::new(
            Box::new(FsSource::new(docs_dir).unwrap()),
            Arc::new(HashProvider),
            generator,
            DataDir::resolve(Some(data_dir)).unwrap(),
        )
    }

    fn write_sample_docs(dir: &std::path::Path) {
        std::fs::write(
            dir.join("rust.txt"),
            "Rust is a systems programming language focused on safety \
             and performance. Ownership rules prevent data races.",
        )
        .unwrap();
        std::fs::write(
            dir.join("cooking.txt"),
            "Boil water in a large pot. Add salt. Cook the pasta until \
             al dente and serve with sauce.",
        )
        .unwrap();
    }

    #[test]
    fn depth_widths_are_fixed() {
        assert_eq!(Depth::Quick.widths(), (2, 5));
        assert_eq!(Depth::Standard.widths(), (3, 8));
        assert_eq!(Depth::Deep.widths(), (5, 15));
    }

    #[test]
    fn query_before_initialize_is_index_unavailable() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let engine = engine_for(docs.path(), data.path(), None);

        let err = engine.search("anything", Depth::Quick).unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable));
    }

    #[test]
    fn initialize_builds_when_no_persisted_index() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());
        let engine = engine_for(docs.path(), data.path(), None);

        let report = engine.initialize().unwrap();
        assert!(report.rebuilt);
        assert_eq!(report.documents, 2);
        assert!(report.chunks >= 2);
        assert!(report.skipped.is_empty());
        assert!(engine.is_ready());
    }

    #[test]
    fn initialize_loads_fresh_index_without_rebuild() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());

        let first = engine_for(docs.path(), data.path(), None);
        first.initialize().unwrap();

        let second = engine_for(docs.path(), data.path(), None);
        let report = second.initialize().unwrap();
        assert!(!report.rebuilt);
        assert_eq!(report.documents, 2);
        assert!(second.is_ready());
    }

    #[test]
    fn initialize_rebuilds_on_stale_collection() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());

        let first = engine_for(docs.path(), data.path(), None);
        first.initialize().unwrap();

        std::fs::write(
            docs.path().join("gardening.txt"),
            "Water the plants and prune dead leaves for healthy growth.",
        )
        .unwrap();

        let second = engine_for(docs.path(), data.path(), None);
        let report = second.initialize().unwrap();
        assert!(report.rebuilt);
        let staleness = report.staleness.expect("staleness diff expected");
        assert_eq!(staleness.added, vec!["gardening.txt"]);
        assert_eq!(report.documents, 3);
    }

    #[test]
    fn initialize_recovers_from_corrupt_index() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());

        let first = engine_for(docs.path(), data.path(), None);
        first.initialize().unwrap();

        let data_dir = DataDir::resolve(Some(data.path())).unwrap();
        std::fs::write(data_dir.documents_db(), b"garbage").unwrap();

        let second = engine_for(docs.path(), data.path(), None);
        let report = second.initialize().unwrap();
        assert!(report.rebuilt);
        assert!(report.load_error.is_some());
        assert!(second.is_ready());
    }

    #[test]
    fn empty_source_fails_with_empty_collection() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let engine = engine_for(docs.path(), data.path(), None);

        let err = engine.initialize().unwrap_err();
        assert!(matches!(err, Error::EmptyCollection));
    }

    #[test]
    fn unreadable_document_is_skipped_not_fatal() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());
        // Whitespace-only file loads as "no content extracted".
        std::fs::write(docs.path().join("blank.txt"), "   \n  ").unwrap();

        let engine = engine_for(docs.path(), data.path(), None);
        let report = engine.initialize().unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.skipped, vec!["blank.txt"]);
    }

    #[tokio::test]
    async fn query_without_generator_uses_fallback() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());
        let engine = engine_for(docs.path(), data.path(), None);
        engine.initialize().unwrap();

        let response =
            engine.query("rust safety", Depth::Standard).await.unwrap();
        assert!(response.fallback_used);
        assert!(response.response.contains("RELEVANT DOCUMENTS:"));
        assert!(response.context_used.contains("=== DOCUMENT SUMMARIES ==="));
        assert_eq!(response.depth, Depth::Standard);
    }

    #[tokio::test]
    async fn query_recovers_from_generation_failure() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());
        let engine = engine_for(
            docs.path(),
            data.path(),
            Some(Box::new(FailingGenerator)),
        );
        engine.initialize().unwrap();

        let response =
            engine.query("pasta", Depth::Quick).await.unwrap();
        assert!(response.fallback_used);
        assert!(response.response.contains("RELEVANT CONTENT:"));
    }

    #[tokio::test]
    async fn query_uses_generator_when_it_succeeds() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());
        let engine = engine_for(
            docs.path(),
            data.path(),
            Some(Box::new(EchoGenerator)),
        );
        engine.initialize().unwrap();

        let response =
            engine.query("rust", Depth::Standard).await.unwrap();
        assert!(!response.fallback_used);
        assert!(response.response.starts_with("echo of"));
    }

    #[test]
    fn collection_summary_counts_kinds() {
        let docs = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_sample_docs(docs.path());
        std::fs::write(docs.path().join("table.csv"), "a,b\n1,2\n3,4")
            .unwrap();

        let engine = engine_for(docs.path(), data.path(), None);
        engine.initialize().unwrap();

        let summary = engine.collection_summary().unwrap();
        assert_eq!(summary.total_documents, 3);
        assert_eq!(summary.kind_counts.get("text"), Some(&2));
        assert_eq!(summary.kind_counts.get("tabular"), Some(&1));
        assert_eq!(summary.documents.len(), 3);
        assert!(summary.documents.iter().all(|d| !d.name.is_empty()));
    }
}
