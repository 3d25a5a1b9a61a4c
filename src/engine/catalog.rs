//! Compiled-in model catalog.
//!
//! Each entry describes one classifier the inference runtime can load: its
//! upstream repository, task kind, inference options, and the hints used to
//! map raw classifier labels back onto the internal risk categories.

use super::RiskCategory;

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    TextClassification,
    ZeroShotClassification,
}

impl ModelTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTask::TextClassification => "text-classification",
            ModelTask::ZeroShotClassification => "zero-shot-classification",
        }
    }
}

/// Options forwarded verbatim to the inference runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceOptions {
    pub dtype: Option<&'static str>,
    pub weight_file: Option<&'static str>,
    pub subfolder: Option<&'static str>,
}

/// Zero-shot configuration: one natural-language candidate label per risk
/// category, plus the hypothesis template.
#[derive(Debug, Clone, Copy)]
pub struct ZeroShotSpec {
    pub candidate_labels: [(RiskCategory, &'static str); 6],
    pub hypothesis_template: &'static str,
    pub multi_label: bool,
}

impl ZeroShotSpec {
    /// Reverse-map a candidate label back to its risk category.
    pub fn category_for_label(&self, label: &str) -> Option<RiskCategory> {
        self.candidate_labels
            .iter()
            .find(|(_, l)| l.eq_ignore_ascii_case(label.trim()))
            .map(|(c, _)| *c)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub repo: &'static str,
    pub task: ModelTask,
    pub options: InferenceOptions,
    pub zero_shot: Option<ZeroShotSpec>,
    /// Per-category substrings matched against lowercased raw labels.
    pub label_hints: &'static [(RiskCategory, &'static [&'static str])],
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

const ZERO_SHOT_LABELS_RU: [(RiskCategory, &str); 6] = [
    (RiskCategory::Toxicity, "оскорбления и токсичность"),
    (RiskCategory::Threat, "угрозы насилия"),
    (RiskCategory::Scam, "мошенничество и обман"),
    (RiskCategory::Recruitment, "вербовка людей"),
    (RiskCategory::Drugs, "продажа наркотиков"),
    (RiskCategory::Terrorism, "терроризм и экстремизм"),
];

static CATALOG: &[ModelSpec] = &[
    ModelSpec {
        id: "toxic-bert",
        name: "Toxic BERT",
        description: "English toxicity classifier; fast default for mixed-language chats.",
        repo: "Xenova/toxic-bert",
        task: ModelTask::TextClassification,
        options: InferenceOptions {
            dtype: Some("q8"),
            weight_file: None,
            subfolder: None,
        },
        zero_shot: None,
        label_hints: &[
            (
                RiskCategory::Toxicity,
                &["toxic", "insult", "obscene", "identity_hate", "severe"],
            ),
            (RiskCategory::Threat, &["threat"]),
        ],
    },
    ModelSpec {
        id: "rubert-toxicity",
        name: "RuBERT Toxicity",
        description: "Compact Russian toxicity/threat classifier.",
        repo: "cointegrated/rubert-tiny-toxicity",
        task: ModelTask::TextClassification,
        options: InferenceOptions {
            dtype: Some("q8"),
            weight_file: None,
            subfolder: None,
        },
        zero_shot: None,
        label_hints: &[
            (
                RiskCategory::Toxicity,
                &["insult", "obscenity", "toxic"],
            ),
            (RiskCategory::Threat, &["threat", "dangerous"]),
        ],
    },
    ModelSpec {
        id: "mdeberta-xnli",
        name: "mDeBERTa XNLI",
        description: "Multilingual zero-shot classifier covering all six risk categories.",
        repo: "MoritzLaurer/mDeBERTa-v3-base-mnli-xnli",
        task: ModelTask::ZeroShotClassification,
        options: InferenceOptions {
            dtype: Some("q8"),
            weight_file: None,
            subfolder: None,
        },
        zero_shot: Some(ZeroShotSpec {
            candidate_labels: ZERO_SHOT_LABELS_RU,
            hypothesis_template: "Этот текст про {}.",
            multi_label: true,
        }),
        label_hints: &[
            (RiskCategory::Toxicity, &["оскорбления"]),
            (RiskCategory::Threat, &["угрозы"]),
            (RiskCategory::Scam, &["мошенничество"]),
            (RiskCategory::Recruitment, &["вербовка"]),
            (RiskCategory::Drugs, &["наркотик"]),
            (RiskCategory::Terrorism, &["терроризм"]),
        ],
    },
    ModelSpec {
        id: "xlm-roberta-xnli",
        name: "XLM-RoBERTa XNLI",
        description: "Larger multilingual zero-shot classifier; slower, higher recall.",
        repo: "joeddav/xlm-roberta-large-xnli",
        task: ModelTask::ZeroShotClassification,
        options: InferenceOptions {
            dtype: Some("q8"),
            weight_file: Some("model_quantized.onnx"),
            subfolder: Some("onnx"),
        },
        zero_shot: Some(ZeroShotSpec {
            candidate_labels: ZERO_SHOT_LABELS_RU,
            hypothesis_template: "Этот текст про {}.",
            multi_label: true,
        }),
        label_hints: &[
            (RiskCategory::Toxicity, &["оскорбления"]),
            (RiskCategory::Threat, &["угрозы"]),
            (RiskCategory::Scam, &["мошенничество"]),
            (RiskCategory::Recruitment, &["вербовка"]),
            (RiskCategory::Drugs, &["наркотик"]),
            (RiskCategory::Terrorism, &["терроризм"]),
        ],
    },
];

// ─── Lookup ──────────────────────────────────────────────────────────────────

pub fn all() -> &'static [ModelSpec] {
    CATALOG
}

pub fn find(id: &str) -> Option<&'static ModelSpec> {
    CATALOG.iter().find(|m| m.id == id)
}

pub fn is_known_model(id: &str) -> bool {
    find(id).is_some()
}

/// The entry used when the configured model id is unknown.
pub fn default_model() -> &'static ModelSpec {
    // The default id always names a catalog entry.
    &CATALOG[0]
}

/// Resolve an id, falling back to the default model.
pub fn resolve(id: &str) -> &'static ModelSpec {
    find(id).unwrap_or_else(default_model)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DEFAULT_MODEL_ID;

    #[test]
    fn default_model_id_is_in_catalog() {
        assert!(is_known_model(DEFAULT_MODEL_ID));
        assert_eq!(default_model().id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = all().iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all().len());
    }

    #[test]
    fn zero_shot_models_carry_all_six_labels() {
        for m in all() {
            if m.task == ModelTask::ZeroShotClassification {
                let spec = m.zero_shot.expect("zero-shot model without label map");
                assert_eq!(spec.candidate_labels.len(), 6);
            }
        }
    }

    #[test]
    fn unknown_id_resolves_to_default() {
        assert_eq!(resolve("no-such-model").id, DEFAULT_MODEL_ID);
        assert_eq!(resolve("mdeberta-xnli").id, "mdeberta-xnli");
    }

    #[test]
    fn zero_shot_label_reverse_lookup() {
        let spec = find("mdeberta-xnli").unwrap().zero_shot.unwrap();
        assert_eq!(
            spec.category_for_label("угрозы насилия"),
            Some(RiskCategory::Threat)
        );
        assert_eq!(spec.category_for_label("unknown"), None);
    }
}
