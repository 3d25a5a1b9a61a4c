//! Raw classifier labels → risk categories.
//!
//! Mapping order: the model's own `labelHints`, then the zero-shot candidate
//! map (when present), then generic substring heuristics. Labels recognized
//! as benign only produce the safe score used to attenuate model output —
//! they never vote for a category.

use super::{RiskCategory, Scores};
use crate::engine::catalog::ModelSpec;
use crate::inference::{LabelScore, ModelOutput};

// ─── Safe labels ─────────────────────────────────────────────────────────────

const SAFE_LABELS: &[&str] = &[
    "non-toxic", "not-toxic", "nontoxic", "safe", "neutral", "normal", "label-0", "ok", "benign",
    "no-risk",
];

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '_'], "-")
}

pub fn is_safe_label(label: &str) -> bool {
    SAFE_LABELS.contains(&normalize_label(label).as_str())
}

// ─── Category mapping ────────────────────────────────────────────────────────

const GENERIC_HINTS: &[(&str, RiskCategory)] = &[
    ("toxic", RiskCategory::Toxicity),
    ("insult", RiskCategory::Toxicity),
    ("obscen", RiskCategory::Toxicity),
    ("hate", RiskCategory::Toxicity),
    ("оскорб", RiskCategory::Toxicity),
    ("threat", RiskCategory::Threat),
    ("danger", RiskCategory::Threat),
    ("violence", RiskCategory::Threat),
    ("угроз", RiskCategory::Threat),
    ("scam", RiskCategory::Scam),
    ("fraud", RiskCategory::Scam),
    ("spam", RiskCategory::Scam),
    ("мошен", RiskCategory::Scam),
    ("recruit", RiskCategory::Recruitment),
    ("вербов", RiskCategory::Recruitment),
    ("drug", RiskCategory::Drugs),
    ("narcot", RiskCategory::Drugs),
    ("наркот", RiskCategory::Drugs),
    ("terror", RiskCategory::Terrorism),
    ("extremis", RiskCategory::Terrorism),
    ("террор", RiskCategory::Terrorism),
];

/// Map a raw label onto a risk category, or `None` when unrecognized.
pub fn map_label(label: &str, spec: &ModelSpec) -> Option<RiskCategory> {
    let normalized = normalize_label(label);

    for (category, hints) in spec.label_hints {
        if hints.iter().any(|h| normalized.contains(h)) {
            return Some(*category);
        }
    }

    if let Some(zs) = &spec.zero_shot {
        if let Some(category) = zs.category_for_label(label) {
            return Some(category);
        }
    }

    for (needle, category) in GENERIC_HINTS {
        if normalized.contains(needle) {
            return Some(*category);
        }
    }

    // Degenerate binary classifiers: LABEL_1 means "flagged".
    if normalized == "label-1" {
        return Some(RiskCategory::Toxicity);
    }

    None
}

// ─── Vote extraction ─────────────────────────────────────────────────────────

/// Per-category model scores plus the safe attenuation score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelVote {
    pub scores: Scores,
    pub safe_score: f64,
}

/// Fold a raw classifier output into category scores and a safe score.
pub fn model_vote(output: &ModelOutput, spec: &ModelSpec) -> ModelVote {
    let mut vote = ModelVote::default();

    let mut fold = |label: &str, score: f64| {
        let score = score.clamp(0.0, 1.0);
        if is_safe_label(label) {
            vote.safe_score = vote.safe_score.max(score);
        } else if let Some(category) = map_label(label, spec) {
            vote.scores.bump(category, score);
        }
    };

    match output {
        ModelOutput::TextClassification(pairs) => {
            for LabelScore { label, score } in pairs {
                fold(label, *score);
            }
        }
        ModelOutput::ZeroShot { labels, scores } => {
            for (label, score) in labels.iter().zip(scores) {
                fold(label, *score);
            }
        }
    }

    vote
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog;

    fn toxic_bert() -> &'static ModelSpec {
        catalog::find("toxic-bert").unwrap()
    }

    fn mdeberta() -> &'static ModelSpec {
        catalog::find("mdeberta-xnli").unwrap()
    }

    // ── Safe labels ──────────────────────────────────────────────────────────

    #[test]
    fn safe_label_variants_are_recognized() {
        for label in ["non-toxic", "NOT_TOXIC", "  Neutral ", "LABEL_0", "safe"] {
            assert!(is_safe_label(label), "{label}");
        }
    }

    #[test]
    fn risky_labels_are_not_safe() {
        for label in ["toxic", "threat", "LABEL_1"] {
            assert!(!is_safe_label(label), "{label}");
        }
    }

    // ── Mapping ──────────────────────────────────────────────────────────────

    #[test]
    fn hints_map_before_generic() {
        assert_eq!(map_label("severe_toxic", toxic_bert()), Some(RiskCategory::Toxicity));
        assert_eq!(map_label("threat", toxic_bert()), Some(RiskCategory::Threat));
    }

    #[test]
    fn zero_shot_candidates_map_via_reverse_lookup() {
        assert_eq!(
            map_label("продажа наркотиков", mdeberta()),
            Some(RiskCategory::Drugs)
        );
    }

    #[test]
    fn generic_hints_catch_foreign_labels() {
        assert_eq!(map_label("fraud_risk", toxic_bert()), Some(RiskCategory::Scam));
        assert_eq!(map_label("violence", toxic_bert()), Some(RiskCategory::Threat));
    }

    #[test]
    fn label_1_maps_to_toxicity() {
        assert_eq!(map_label("LABEL_1", toxic_bert()), Some(RiskCategory::Toxicity));
    }

    #[test]
    fn unknown_label_maps_to_none() {
        assert_eq!(map_label("sentiment-positive", toxic_bert()), None);
    }

    // ── Vote extraction ──────────────────────────────────────────────────────

    #[test]
    fn vote_splits_safe_and_risky() {
        let output = ModelOutput::TextClassification(vec![
            LabelScore { label: "toxic".into(), score: 0.8 },
            LabelScore { label: "non-toxic".into(), score: 0.15 },
            LabelScore { label: "threat".into(), score: 0.3 },
        ]);
        let vote = model_vote(&output, toxic_bert());
        assert_eq!(vote.scores.get(RiskCategory::Toxicity), 0.8);
        assert_eq!(vote.scores.get(RiskCategory::Threat), 0.3);
        assert_eq!(vote.safe_score, 0.15);
    }

    #[test]
    fn vote_keeps_max_per_category() {
        let output = ModelOutput::TextClassification(vec![
            LabelScore { label: "insult".into(), score: 0.4 },
            LabelScore { label: "obscene".into(), score: 0.7 },
        ]);
        let vote = model_vote(&output, toxic_bert());
        assert_eq!(vote.scores.get(RiskCategory::Toxicity), 0.7);
    }

    #[test]
    fn zero_shot_vote_maps_all_categories() {
        let output = ModelOutput::ZeroShot {
            labels: vec!["угрозы насилия".into(), "терроризм и экстремизм".into()],
            scores: vec![0.66, 0.9],
        };
        let vote = model_vote(&output, mdeberta());
        assert_eq!(vote.scores.get(RiskCategory::Threat), 0.66);
        assert_eq!(vote.scores.get(RiskCategory::Terrorism), 0.9);
        assert_eq!(vote.safe_score, 0.0);
    }

    #[test]
    fn unrecognized_labels_are_ignored() {
        let output = ModelOutput::TextClassification(vec![LabelScore {
            label: "positive".into(),
            score: 0.99,
        }]);
        let vote = model_vote(&output, toxic_bert());
        for category in RiskCategory::ALL {
            assert_eq!(vote.scores.get(category), 0.0);
        }
    }
}
