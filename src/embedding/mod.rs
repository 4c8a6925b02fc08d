//! Embedding & indexing primitives
//!
//! - `EmbeddingProvider` / `CrossModalProvider` traits over the models
//! - FastEmbed implementations (all-MiniLM-L6-v2 text, CLIP ViT-B/32)
//! - Exact inner-product `VectorIndex`
//! - BM25 `KeywordIndex`

mod keyword_index;
mod provider;
mod vector_index;

pub use keyword_index::{normalize_by_max, query_terms, tokenize, Bm25Params, KeywordIndex};
pub use provider::{
    normalize, CrossModalProvider, EmbeddingError, EmbeddingProvider, FastEmbedClipProvider,
    FastEmbedProvider,
};
pub use vector_index::{VectorHit, VectorIndex, VectorIndexError};
