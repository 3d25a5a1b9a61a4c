//! Inference runtime seam.
//!
//! The ONNX runtime itself is an external collaborator; this module pins the
//! contract the engine relies on. Raw classifier payloads are a strict sum
//! type, so the mapping onto risk categories stays a pure function.

pub mod cache;
pub mod http;

pub use cache::ClassifierCache;
pub use http::HttpInference;

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::catalog::ModelSpec;

// ─── Output types ────────────────────────────────────────────────────────────

/// One raw classifier label with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Everything a classifier call can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// `text-classification` pipelines: the `top_k` labels.
    TextClassification(Vec<LabelScore>),
    /// `zero-shot-classification` pipelines: parallel label/score arrays.
    ZeroShot { labels: Vec<String>, scores: Vec<f64> },
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("inference request failed: {0}")]
    Transport(String),

    #[error("inference runtime returned an unusable payload: {0}")]
    Payload(String),
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A loaded classification pipeline.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Run the pipeline on `text`. `top_k` applies to text-classification
    /// models; zero-shot models carry their candidate labels in the spec.
    async fn classify(&self, text: &str, top_k: usize) -> Result<ModelOutput, InferenceError>;
}

/// Loads classifiers for catalog entries.
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    async fn load(&self, spec: &'static ModelSpec) -> Result<Arc<dyn Classifier>, InferenceError>;
}
