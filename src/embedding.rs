//! Embedding provider boundary.
//!
//! The index only depends on the [`EmbeddingProvider`] trait: text in,
//! fixed-length vector out, with a batch form that must preserve input
//! order. [`FastEmbedProvider`] is the default implementation, wrapping a
//! lazily-loaded all-MiniLM-L6-v2 sentence embedder (384 dimensions).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{Error, Result};

/// Generates fixed-length embedding vectors for text.
///
/// The dimensionality is fixed at first use and must stay consistent for
/// the lifetime of an index built with this provider. `embed_batch` must
/// return one vector per input, in input order.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The vector dimensionality this provider produces.
    fn dimension(&self) -> Result<usize>;
}

/// Default embedding model identifier.
pub const DEFAULT_EMBED_MODEL: &str = "all-MiniLM-L6-v2";

/// Type alias for cached model entries: (shared model, dimension).
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Process-wide cache of initialized embedding models, so repeated engine
/// constructions do not reload ONNX weights.
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> =
    OnceLock::new();

fn model_cache() -> &'static Mutex<HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Lazily-initialized fastembed sentence embedder.
///
/// The model is not loaded (or downloaded) until the first embedding
/// request; afterwards it is shared through the process-wide cache.
pub struct FastEmbedProvider {
    model: Mutex<Option<ModelCacheEntry>>,
}

impl Default for FastEmbedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FastEmbedProvider {
    pub fn new() -> Self {
        Self {
            model: Mutex::new(None),
        }
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.lock().is_ok_and(|guard| guard.is_some())
    }

    fn ensure_loaded(&self) -> Result<ModelCacheEntry> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| Error::Embedding("model lock poisoned".into()))?;

        if let Some((model, dimension)) = guard.as_ref() {
            return Ok((Arc::clone(model), *dimension));
        }

        // Check the process-wide cache before initializing.
        {
            let cache = model_cache()
                .lock()
                .map_err(|_| Error::Embedding("cache lock poisoned".into()))?;
            if let Some((model, dimension)) = cache.get(DEFAULT_EMBED_MODEL) {
                let entry = (Arc::clone(model), *dimension);
                *guard = Some((Arc::clone(&entry.0), entry.1));
                return Ok(entry);
            }
        }

        tracing::info!("loading embedding model: {DEFAULT_EMBED_MODEL}");
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(true);
        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        // Probe the dimension with a throwaway embedding.
        let probe = model
            .embed(vec!["dimension probe".to_string()], None)
            .map_err(|e| Error::Embedding(e.to_string()))?;
        let dimension = probe.first().map(|v| v.len()).ok_or_else(|| {
            Error::Embedding("model returned no probe embedding".into())
        })?;
        tracing::info!("embedding model loaded, dimension {dimension}");

        let entry: ModelCacheEntry =
            (Arc::new(Mutex::new(model)), dimension);
        {
            let mut cache = model_cache()
                .lock()
                .map_err(|_| Error::Embedding("cache lock poisoned".into()))?;
            cache.insert(
                DEFAULT_EMBED_MODEL.to_string(),
                (Arc::clone(&entry.0), dimension),
            );
        }
        *guard = Some((Arc::clone(&entry.0), dimension));
        Ok(entry)
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()])?;
        batch
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned".into()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let (model, dimension) = self.ensure_loaded()?;
        let mut model = model
            .lock()
            .map_err(|_| Error::Embedding("model lock poisoned".into()))?;

        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, model returned {}",
                texts.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) =
            embeddings.iter().find(|v| v.len() != dimension)
        {
            return Err(Error::Embedding(format!(
                "inconsistent embedding dimension: expected {dimension}, got {}",
                bad.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> Result<usize> {
        self.ensure_loaded().map(|(_, dimension)| dimension)
    }
}
