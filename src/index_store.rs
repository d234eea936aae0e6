//! The dual-level index store.
//!
//! Owns four arrays that must stay in lockstep: document records parallel
//! to the document vector index, and chunk records parallel to the chunk
//! vector index. Position `i` in a record array corresponds to position
//! `i` in its vector index; this is the load-bearing invariant of the
//! whole store, checked at build and after every load. The arrays are
//! immutable once built; a rebuild replaces the entire store.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::{
    analyzer::{ChunkRecord, ContentTypeHint, DocumentAnalysis, DocumentRecord},
    embedding::EmbeddingProvider,
    error::{Error, Result},
    loader::{DocumentKind, basename},
    text_util::truncate_chars,
    vector_index::VectorIndex,
};

/// Default document shortlist width for context assembly.
pub const DEFAULT_DOC_K: usize = 3;

/// Default chunk width for context assembly.
pub const DEFAULT_CHUNK_K: usize = 10;

/// Summary length cap inside assembled context.
const CONTEXT_SUMMARY_CHARS: usize = 500;

/// Topics listed per document inside assembled context.
const CONTEXT_TOPIC_COUNT: usize = 5;

/// Strategy tag attached to hybrid results for observability.
const SEARCH_STRATEGY: &str = "balanced-hybrid";

/// A document-level search hit.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    /// 1-based rank in the result list.
    pub rank: usize,
    /// Position in the document record array.
    pub document_id: usize,
    /// Squared L2 distance from the query.
    pub distance: f32,
    /// Monotonic transform of distance into (0, 1]; not a probability.
    pub relevance: f32,
    pub locator: String,
    pub kind: DocumentKind,
    pub summary: String,
    pub topics: Vec<String>,
}

/// A chunk-level search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkHit {
    pub rank: usize,
    /// Position in the chunk record array.
    pub chunk_id: usize,
    /// Position of the owning document.
    pub document_id: usize,
    pub distance: f32,
    pub relevance: f32,
    /// Locator of the owning document.
    pub locator: String,
    pub page_number: usize,
    pub content_type: ContentTypeHint,
    pub text: String,
}

/// Combined result of a hybrid search.
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchResult {
    pub query: String,
    pub documents: Vec<DocumentHit>,
    pub chunks: Vec<ChunkHit>,
    pub strategy: &'static str,
}

/// Result of diffing the indexed locator set against the live source.
#[derive(Debug, Clone, Serialize)]
pub struct StalenessReport {
    pub stale: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// The invariant-protected dual index. Built once, read many times.
#[derive(Debug, Clone)]
pub struct IndexStore {
    documents: Vec<DocumentRecord>,
    chunks: Vec<ChunkRecord>,
    document_index: VectorIndex,
    chunk_index: VectorIndex,
}

impl IndexStore {
    /// Build the store from successful analyses, assigning each chunk its
    /// owning document's position.
    ///
    /// Fails with [`Error::EmptyCollection`] when no analyses survived,
    /// and with an embedding error if any analysis pairs a different
    /// number of chunks and chunk vectors.
    pub fn build(analyses: Vec<DocumentAnalysis>) -> Result<Self> {
        let Some(first) = analyses.first() else {
            return Err(Error::EmptyCollection);
        };
        let dimension = first.document_embedding.len();

        let mut documents = Vec::with_capacity(analyses.len());
        let mut chunks = Vec::new();
        let mut document_index = VectorIndex::with_dimension(dimension)?;
        let mut chunk_index = VectorIndex::with_dimension(dimension)?;

        for analysis in analyses {
            if analysis.chunks.len() != analysis.chunk_embeddings.len() {
                return Err(Error::Embedding(format!(
                    "'{}': {} chunks but {} chunk embeddings",
                    analysis.record.locator,
                    analysis.chunks.len(),
                    analysis.chunk_embeddings.len()
                )));
            }

            let document_id = documents.len();
            document_index.add(&analysis.document_embedding)?;
            documents.push(analysis.record);

            for (mut chunk, embedding) in analysis
                .chunks
                .into_iter()
                .zip(analysis.chunk_embeddings.into_iter())
            {
                chunk.document_id = document_id;
                chunk_index.add(&embedding)?;
                chunks.push(chunk);
            }
        }

        let store = Self {
            documents,
            chunks,
            document_index,
            chunk_index,
        };
        store.validate()?;
        Ok(store)
    }

    /// Reassemble a store from persisted parts, re-checking the invariant.
    pub(crate) fn from_parts(
        documents: Vec<DocumentRecord>,
        chunks: Vec<ChunkRecord>,
        document_index: VectorIndex,
        chunk_index: VectorIndex,
    ) -> Result<Self> {
        let store = Self {
            documents,
            chunks,
            document_index,
            chunk_index,
        };
        store.validate()?;
        Ok(store)
    }

    /// Check the parallel-array invariant and chunk back-references.
    pub fn validate(&self) -> Result<()> {
        if self.documents.len() != self.document_index.len() {
            return Err(Error::Config(format!(
                "document records ({}) and document vectors ({}) diverge",
                self.documents.len(),
                self.document_index.len()
            )));
        }
        if self.chunks.len() != self.chunk_index.len() {
            return Err(Error::Config(format!(
                "chunk records ({}) and chunk vectors ({}) diverge",
                self.chunks.len(),
                self.chunk_index.len()
            )));
        }
        if let Some(bad) = self
            .chunks
            .iter()
            .find(|c| c.document_id >= self.documents.len())
        {
            return Err(Error::Config(format!(
                "chunk references document {} but only {} documents exist",
                bad.document_id,
                self.documents.len()
            )));
        }
        Ok(())
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    pub(crate) fn document_index(&self) -> &VectorIndex {
        &self.document_index
    }

    pub(crate) fn chunk_index(&self) -> &VectorIndex {
        &self.chunk_index
    }

    /// The locator set currently represented in the index.
    pub fn locators(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.locator.clone()).collect()
    }

    /// Nearest documents to the query, ascending distance.
    pub fn search_documents(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentHit>> {
        let query_embedding = provider.embed(query)?;
        let neighbors = self.document_index.search(&query_embedding, k)?;

        Ok(neighbors
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                let record = &self.documents[n.position];
                DocumentHit {
                    rank: i + 1,
                    document_id: n.position,
                    distance: n.distance,
                    relevance: 1.0 / (1.0 + n.distance),
                    locator: record.locator.clone(),
                    kind: record.kind,
                    summary: record.summary.clone(),
                    topics: record.topics.clone(),
                }
            })
            .collect())
    }

    /// Nearest chunks to the query, optionally restricted to a set of
    /// document ids.
    ///
    /// The vector search itself always runs unfiltered; `2k` candidates
    /// are fetched and the filter is applied afterwards, so a filter
    /// rarely starves the result.
    pub fn search_chunks(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
        document_filter: Option<&HashSet<usize>>,
    ) -> Result<Vec<ChunkHit>> {
        let query_embedding = provider.embed(query)?;
        let neighbors =
            self.chunk_index.search(&query_embedding, k * 2)?;

        let mut hits = Vec::new();
        for n in neighbors {
            let chunk = &self.chunks[n.position];
            if let Some(filter) = document_filter
                && !filter.contains(&chunk.document_id)
            {
                continue;
            }

            let record = &self.documents[chunk.document_id];
            hits.push(ChunkHit {
                rank: hits.len() + 1,
                chunk_id: n.position,
                document_id: chunk.document_id,
                distance: n.distance,
                relevance: 1.0 / (1.0 + n.distance),
                locator: record.locator.clone(),
                page_number: chunk.page_number,
                content_type: chunk.content_type,
                text: chunk.text.clone(),
            });

            if hits.len() >= k {
                break;
            }
        }

        Ok(hits)
    }

    /// Hybrid search: a ranked document shortlist plus an independently
    /// ranked, diversity-balanced chunk list.
    ///
    /// The chunk search deliberately runs over the whole collection (not
    /// just the shortlist) so a relevant chunk is never lost because its
    /// parent document ranked poorly. Balancing caps each document at
    /// `max(2, chunk_k / document_count)` chunks, except that the first
    /// `chunk_k / 2` acceptances bypass the cap; if the balanced pass
    /// comes up short, remaining candidates backfill regardless of cap.
    pub fn hybrid_search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        doc_k: usize,
        chunk_k: usize,
    ) -> Result<HybridSearchResult> {
        let documents = self.search_documents(provider, query, doc_k)?;
        let candidates =
            self.search_chunks(provider, query, chunk_k * 2, None)?;

        let document_count = self.documents.len();
        let max_per_doc = if document_count > 0 {
            std::cmp::max(2, chunk_k / document_count)
        } else {
            chunk_k
        };

        let mut balanced: Vec<ChunkHit> = Vec::new();
        let mut accepted: HashSet<usize> = HashSet::new();
        let mut per_doc: HashMap<usize, usize> = HashMap::new();

        for hit in &candidates {
            let count = per_doc.get(&hit.document_id).copied().unwrap_or(0);

            // The second clause lets the best-ranked chunks of a very
            // relevant document fill the early slots before the cap
            // applies.
            if count < max_per_doc || balanced.len() < chunk_k / 2 {
                accepted.insert(hit.chunk_id);
                per_doc.insert(hit.document_id, count + 1);
                balanced.push(hit.clone());

                if balanced.len() >= chunk_k {
                    break;
                }
            }
        }

        // Backfill from the remaining candidates, ignoring the cap.
        if balanced.len() < chunk_k {
            for hit in &candidates {
                if accepted.contains(&hit.chunk_id) {
                    continue;
                }
                accepted.insert(hit.chunk_id);
                balanced.push(hit.clone());
                if balanced.len() >= chunk_k {
                    break;
                }
            }
        }

        for (i, hit) in balanced.iter_mut().enumerate() {
            hit.rank = i + 1;
        }

        tracing::debug!(
            documents = documents.len(),
            chunks = balanced.len(),
            "hybrid search complete"
        );

        Ok(HybridSearchResult {
            query: query.to_string(),
            documents,
            chunks: balanced,
            strategy: SEARCH_STRATEGY,
        })
    }

    /// Assemble a bounded textual context for the query.
    ///
    /// Document summaries (truncated, with their top topics) always come
    /// first, then chunk texts in ranked order. Assembly stops as soon as
    /// the next piece would exceed `max_chars`; dropped chunks are simply
    /// dropped.
    pub fn assemble_context(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        max_chars: usize,
    ) -> Result<String> {
        let result = self.hybrid_search(
            provider,
            query,
            DEFAULT_DOC_K,
            DEFAULT_CHUNK_K,
        )?;
        Ok(render_context(&result, max_chars))
    }

    /// Diff the indexed locator set against the live source.
    ///
    /// Any difference, additions or removals, marks the index stale; the
    /// changed locators are reported for diagnostics.
    pub fn detect_staleness(&self, current: &[String]) -> StalenessReport {
        let indexed: BTreeSet<&str> =
            self.documents.iter().map(|d| d.locator.as_str()).collect();
        let live: BTreeSet<&str> =
            current.iter().map(|s| s.as_str()).collect();

        let added: Vec<String> = live
            .difference(&indexed)
            .map(|s| s.to_string())
            .collect();
        let removed: Vec<String> = indexed
            .difference(&live)
            .map(|s| s.to_string())
            .collect();

        StalenessReport {
            stale: !added.is_empty() || !removed.is_empty(),
            added,
            removed,
        }
    }
}

/// Greedy context rendering shared by [`IndexStore::assemble_context`].
pub fn render_context(result: &HybridSearchResult, max_chars: usize) -> String {
    let mut parts = vec!["=== DOCUMENT SUMMARIES ===".to_string()];
    let mut used = 0usize;

    for doc in &result.documents {
        let summary = truncate_chars(&doc.summary, CONTEXT_SUMMARY_CHARS);
        let topics: Vec<&str> = doc
            .topics
            .iter()
            .take(CONTEXT_TOPIC_COUNT)
            .map(|s| s.as_str())
            .collect();
        let piece = format!(
            "\nDocument: {}\nSummary: {}\nKey Topics: {}\n",
            basename(&doc.locator),
            summary,
            topics.join(", ")
        );

        if used + piece.chars().count() < max_chars {
            used += piece.chars().count();
            parts.push(piece);
        }
    }

    parts.push("\n=== RELEVANT CONTENT ===".to_string());

    for chunk in &result.chunks {
        let piece =
            format!("\n[Page {}] {}\n", chunk.page_number, chunk.text);

        if used + piece.chars().count() < max_chars {
            used += piece.chars().count();
            parts.push(piece);
        } else {
            break;
        }
    }

    parts.join("\n")
}
