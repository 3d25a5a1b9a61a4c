//! HTTP adapter to the inference server.
//!
//! Speaks the HuggingFace pipeline JSON shape: `POST /load` instantiates a
//! pipeline for a repository, `POST /models/{repo}` runs it. The server owns
//! the ONNX runtime and the model cache directory; this side only shapes
//! requests and normalizes responses into [`ModelOutput`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Classifier, InferenceError, InferenceRuntime, LabelScore, ModelOutput};
use crate::engine::catalog::{ModelSpec, ModelTask};

/// Default inference server address.
pub const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8009";

// ─── HttpInference ───────────────────────────────────────────────────────────

pub struct HttpInference {
    client: reqwest::Client,
    base_url: String,
    model_dir: Option<String>,
}

impl HttpInference {
    pub fn new(base_url: impl Into<String>, model_dir: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model_dir,
        }
    }

    /// Read base URL and model dir from the environment.
    pub fn from_env() -> Self {
        let base = std::env::var("CHATWARDEN_INFERENCE_URL")
            .unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_owned());
        let model_dir = std::env::var("CHATWARDEN_MODEL_DIR").ok();
        Self::new(base, model_dir)
    }
}

#[async_trait]
impl InferenceRuntime for HttpInference {
    async fn load(&self, spec: &'static ModelSpec) -> Result<Arc<dyn Classifier>, InferenceError> {
        let mut body = json!({
            "model": spec.repo,
            "task": spec.task.as_str(),
        });
        if let Some(dtype) = spec.options.dtype {
            body["dtype"] = json!(dtype);
        }
        if let Some(file) = spec.options.weight_file {
            body["weightFile"] = json!(file);
        }
        if let Some(sub) = spec.options.subfolder {
            body["subfolder"] = json!(sub);
        }
        if let Some(dir) = &self.model_dir {
            body["modelDir"] = json!(dir);
        }

        let resp = self
            .client
            .post(format!("{}/load", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Load(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(InferenceError::Load(format!(
                "{} loading {}",
                resp.status(),
                spec.repo
            )));
        }

        Ok(Arc::new(HttpClassifier {
            client: self.client.clone(),
            url: format!("{}/models/{}", self.base_url, spec.repo),
            spec,
        }))
    }
}

// ─── HttpClassifier ──────────────────────────────────────────────────────────

struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    spec: &'static ModelSpec,
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str, top_k: usize) -> Result<ModelOutput, InferenceError> {
        let parameters = match (self.spec.task, self.spec.zero_shot) {
            (ModelTask::ZeroShotClassification, Some(zs)) => {
                let labels: Vec<&str> = zs.candidate_labels.iter().map(|(_, l)| *l).collect();
                json!({
                    "candidate_labels": labels,
                    "hypothesis_template": zs.hypothesis_template,
                    "multi_label": zs.multi_label,
                })
            }
            _ => json!({ "top_k": top_k }),
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "inputs": text, "parameters": parameters }))
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(InferenceError::Transport(format!(
                "{} from {}",
                resp.status(),
                self.url
            )));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| InferenceError::Payload(e.to_string()))?;
        parse_output(self.spec.task, &payload)
    }
}

// ─── Response parsing ────────────────────────────────────────────────────────

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

/// Normalize a pipeline response into [`ModelOutput`].
///
/// Text-classification responses arrive either flat (`[{label, score}]`) or
/// batched (`[[{label, score}]]`); zero-shot responses carry parallel
/// `labels`/`scores` arrays.
pub fn parse_output(task: ModelTask, payload: &Value) -> Result<ModelOutput, InferenceError> {
    match task {
        ModelTask::TextClassification => {
            let items = match payload {
                Value::Array(items) => match items.first() {
                    Some(Value::Array(inner)) => inner.as_slice(),
                    _ => items.as_slice(),
                },
                _ => {
                    return Err(InferenceError::Payload(
                        "expected an array of label/score pairs".into(),
                    ));
                }
            };
            let mut pairs = Vec::with_capacity(items.len());
            for item in items {
                let label = item
                    .get("label")
                    .and_then(Value::as_str)
                    .ok_or_else(|| InferenceError::Payload("pair without label".into()))?;
                let score = item.get("score").and_then(Value::as_f64).unwrap_or(0.0);
                pairs.push(LabelScore {
                    label: label.to_owned(),
                    score: clamp_unit(score),
                });
            }
            Ok(ModelOutput::TextClassification(pairs))
        }
        ModelTask::ZeroShotClassification => {
            let obj = match payload {
                // Some servers batch zero-shot responses too.
                Value::Array(items) => items.first().unwrap_or(payload),
                _ => payload,
            };
            let labels = obj
                .get("labels")
                .and_then(Value::as_array)
                .ok_or_else(|| InferenceError::Payload("zero-shot response without labels".into()))?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect::<Vec<_>>();
            let scores = obj
                .get("scores")
                .and_then(Value::as_array)
                .ok_or_else(|| InferenceError::Payload("zero-shot response without scores".into()))?
                .iter()
                .map(|v| clamp_unit(v.as_f64().unwrap_or(0.0)))
                .collect::<Vec<_>>();
            if labels.len() != scores.len() {
                return Err(InferenceError::Payload(format!(
                    "labels/scores length mismatch: {} vs {}",
                    labels.len(),
                    scores.len()
                )));
            }
            Ok(ModelOutput::ZeroShot { labels, scores })
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
