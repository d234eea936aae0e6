//! askdocs - question answering over a heterogeneous document collection.
//!
//! askdocs turns a directory of mixed documents (plain text, markdown,
//! CSV/TSV, JSON, plus externally-extracted page-based formats) into two
//! coupled similarity indices (one over whole documents, one over
//! passages) and answers natural-language questions by running a hybrid,
//! diversity-balanced search whose result feeds a bounded context to a
//! language model. When no model is configured (or the call fails), a
//! deterministic fallback answer is built from the retrieval result.
//!
//! # Quick start
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use askdocs::{
//!     DataDir, Depth, FastEmbedProvider, FsSource, RetrievalEngine,
//! };
//!
//! # async fn run() -> askdocs::Result<()> {
//! let data_dir = DataDir::resolve(None)?;
//! let source = FsSource::new(Path::new("data"))?;
//! let engine = RetrievalEngine::new(
//!     Box::new(source),
//!     Arc::new(FastEmbedProvider::new()),
//!     None, // no generator: answers use the retrieval fallback
//!     data_dir,
//! );
//!
//! engine.initialize()?;
//! let answer = engine
//!     .query("What are the main topics covered?", Depth::Standard)
//!     .await?;
//! println!("{}", answer.response);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod chunking;
pub mod cli;
pub mod data_dir;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index_store;
pub mod loader;
pub mod persist;
pub mod text_util;
pub mod vector_index;

pub use data_dir::DataDir;
pub use embedding::{EmbeddingProvider, FastEmbedProvider};
pub use engine::{Depth, RetrievalEngine};
pub use error::{Error, Result};
pub use generation::{ChatClient, Generator};
pub use index_store::IndexStore;
pub use loader::{DocumentKind, DocumentSource, FsSource};
