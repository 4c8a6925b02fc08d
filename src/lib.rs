//! Vitrine - Hybrid Catalog Retrieval
//!
//! Indexes a product catalog three ways (text embeddings, CLIP image
//! embeddings and BM25 over product text) and ranks products for free-text
//! queries by a weighted fusion of the three signals, with optional
//! cross-encoder reranking and short "why this matched" explanations.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod retrieval;
pub mod service;

pub use error::{Result, VitrineError};
