//! Hybrid analysis engine.
//!
//! `analyze` fuses two signal sources per message:
//! - the configured ML classifier (through the [`ClassifierCache`]), and
//! - the heuristic layer (pattern tables, trigger lists, critical overrides).
//!
//! The blend is weighted, per-category thresholded, and critical-pattern
//! hits are guaranteed to survive a confident model. A failing model demotes
//! the engine to heuristics-only rather than failing the call.

pub mod catalog;
pub mod critical;
pub mod heuristics;
pub mod labels;
pub mod presets;

use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::inference::ClassifierCache;

// ─── Risk categories ─────────────────────────────────────────────────────────

/// Verdict string for benign messages.
pub const SAFE: &str = "safe";

/// All verdict strings, `safe` first.
pub const THREAT_TYPES: [&str; 7] = [
    SAFE,
    "toxicity",
    "threat",
    "scam",
    "recruitment",
    "drugs",
    "terrorism",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Toxicity,
    Threat,
    Scam,
    Recruitment,
    Drugs,
    Terrorism,
}

impl RiskCategory {
    /// Fixed order; also the tie-break order for the final decision.
    pub const ALL: [RiskCategory; 6] = [
        RiskCategory::Toxicity,
        RiskCategory::Threat,
        RiskCategory::Scam,
        RiskCategory::Recruitment,
        RiskCategory::Drugs,
        RiskCategory::Terrorism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Toxicity => "toxicity",
            RiskCategory::Threat => "threat",
            RiskCategory::Scam => "scam",
            RiskCategory::Recruitment => "recruitment",
            RiskCategory::Drugs => "drugs",
            RiskCategory::Terrorism => "terrorism",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

// ─── Scores ──────────────────────────────────────────────────────────────────

/// One `f64` per risk category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Scores {
    pub toxicity: f64,
    pub threat: f64,
    pub scam: f64,
    pub recruitment: f64,
    pub drugs: f64,
    pub terrorism: f64,
}

impl Scores {
    pub fn get(&self, category: RiskCategory) -> f64 {
        match category {
            RiskCategory::Toxicity => self.toxicity,
            RiskCategory::Threat => self.threat,
            RiskCategory::Scam => self.scam,
            RiskCategory::Recruitment => self.recruitment,
            RiskCategory::Drugs => self.drugs,
            RiskCategory::Terrorism => self.terrorism,
        }
    }

    pub fn set(&mut self, category: RiskCategory, value: f64) {
        match category {
            RiskCategory::Toxicity => self.toxicity = value,
            RiskCategory::Threat => self.threat = value,
            RiskCategory::Scam => self.scam = value,
            RiskCategory::Recruitment => self.recruitment = value,
            RiskCategory::Drugs => self.drugs = value,
            RiskCategory::Terrorism => self.terrorism = value,
        }
    }

    /// Raise the category to at least `value`.
    pub fn bump(&mut self, category: RiskCategory, value: f64) {
        if value > self.get(category) {
            self.set(category, value);
        }
    }

    /// Pointwise maximum with `other`.
    pub fn merge_max(&mut self, other: &Scores) {
        for category in RiskCategory::ALL {
            self.bump(category, other.get(category));
        }
    }

    /// Highest score and its category (fixed order breaks ties).
    pub fn top(&self) -> (RiskCategory, f64) {
        let mut best = (RiskCategory::Toxicity, self.toxicity);
        for category in RiskCategory::ALL {
            if self.get(category) > best.1 {
                best = (category, self.get(category));
            }
        }
        best
    }
}

// ─── Runtime config ──────────────────────────────────────────────────────────

/// Trigger lists, lowercased and deduplicated for matching.
#[derive(Debug, Clone, Default)]
pub struct CategoryTriggers {
    toxicity: Vec<String>,
    threat: Vec<String>,
    scam: Vec<String>,
    recruitment: Vec<String>,
    drugs: Vec<String>,
    terrorism: Vec<String>,
}

impl CategoryTriggers {
    pub fn get(&self, category: RiskCategory) -> &[String] {
        match category {
            RiskCategory::Toxicity => &self.toxicity,
            RiskCategory::Threat => &self.threat,
            RiskCategory::Scam => &self.scam,
            RiskCategory::Recruitment => &self.recruitment,
            RiskCategory::Drugs => &self.drugs,
            RiskCategory::Terrorism => &self.terrorism,
        }
    }
}

/// Settings resolved into the form the pipeline consumes: ratios instead of
/// percents, normalized weights, lowercased trigger lists.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub model: &'static catalog::ModelSpec,
    pub model_weight: f64,
    pub heuristic_weight: f64,
    pub enable_heuristics: bool,
    pub enable_critical_patterns: bool,
    /// Effective per-category decision thresholds, as ratios.
    pub thresholds: Scores,
    pub top_k: usize,
    pub max_analysis_chars: usize,
    pub url_scam_boost: f64,
    pub keyword_hit_boost: f64,
    pub critical_hit_floor: f64,
    pub keywords: Vec<String>,
    pub triggers: CategoryTriggers,
}

fn lowered(list: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    list.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Derive the runtime config from persisted settings.
pub fn derive_runtime_config(settings: &Settings) -> RuntimeConfig {
    let model = catalog::resolve(&settings.ml_model);

    let raw_model_w = f64::from(settings.model_weight) / 100.0;
    let raw_heur_w = f64::from(settings.heuristic_weight) / 100.0;
    let (model_weight, heuristic_weight) = if !settings.enable_heuristics {
        (1.0, 0.0)
    } else if raw_model_w + raw_heur_w == 0.0 {
        (0.55, 0.45)
    } else {
        let sum = raw_model_w + raw_heur_w;
        (raw_model_w / sum, raw_heur_w / sum)
    };

    let global = f64::from(settings.threat_threshold) / 100.0;
    let ct = &settings.category_thresholds;
    let effective = |pct: u8| {
        if pct == 0 { global } else { f64::from(pct) / 100.0 }
    };
    let mut thresholds = Scores::default();
    thresholds.set(RiskCategory::Toxicity, effective(ct.toxicity));
    thresholds.set(RiskCategory::Threat, effective(ct.threat));
    thresholds.set(RiskCategory::Scam, effective(ct.scam));
    thresholds.set(RiskCategory::Recruitment, effective(ct.recruitment));
    thresholds.set(RiskCategory::Drugs, effective(ct.drugs));
    thresholds.set(RiskCategory::Terrorism, effective(ct.terrorism));

    RuntimeConfig {
        model,
        model_weight,
        heuristic_weight,
        enable_heuristics: settings.enable_heuristics,
        enable_critical_patterns: settings.enable_critical_patterns,
        thresholds,
        top_k: usize::from(settings.model_top_k),
        max_analysis_chars: settings.max_analysis_chars as usize,
        url_scam_boost: f64::from(settings.url_scam_boost) / 100.0,
        keyword_hit_boost: f64::from(settings.keyword_hit_boost) / 100.0,
        critical_hit_floor: f64::from(settings.critical_hit_floor) / 100.0,
        keywords: lowered(&settings.keywords),
        triggers: CategoryTriggers {
            toxicity: lowered(&settings.toxicity_triggers),
            threat: lowered(&settings.threat_triggers),
            scam: lowered(&settings.scam_triggers),
            recruitment: lowered(&settings.recruitment_triggers),
            drugs: lowered(&settings.drug_triggers),
            terrorism: lowered(&settings.terrorism_triggers),
        },
    }
}

// ─── Analysis result ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// `safe` or one of the six category names.
    #[serde(rename = "type")]
    pub verdict: String,
    /// Confidence of the verdict, in [0, 1].
    pub score: f64,
    /// Final blended per-category scores.
    pub scores: Scores,
    pub heuristic_scores: Scores,
    pub model_scores: Scores,
    /// Effective per-category thresholds as ratios.
    pub thresholds: Scores,
}

// ─── AnalysisEngine ──────────────────────────────────────────────────────────

pub struct AnalysisEngine {
    cache: Arc<ClassifierCache>,
}

impl AnalysisEngine {
    pub fn new(cache: Arc<ClassifierCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ClassifierCache> {
        &self.cache
    }

    /// Classify `text` under `settings`.
    pub async fn analyze(&self, text: &str, settings: &Settings) -> Analysis {
        let cfg = derive_runtime_config(settings);

        if text.trim().is_empty() {
            return Analysis {
                verdict: SAFE.to_owned(),
                score: 0.99,
                scores: Scores::default(),
                heuristic_scores: Scores::default(),
                model_scores: Scores::default(),
                thresholds: cfg.thresholds,
            };
        }

        // Heuristic layer. Critical patterns run under their own flag and
        // merge into the heuristic map, so step 8 can reinstate them.
        let mut heuristic_scores = if cfg.enable_heuristics {
            heuristics::heuristic_scores(text, &cfg)
        } else {
            Scores::default()
        };
        if cfg.enable_critical_patterns {
            heuristic_scores.merge_max(&critical::critical_scores(text, cfg.critical_hit_floor));
        }

        // Model layer. Truncation applies to the model input only.
        let truncated: String = text.chars().take(cfg.max_analysis_chars).collect();
        let (model_scores, model_ok) = match self.cache.get(cfg.model.id).await {
            Ok(classifier) => match classifier.classify(&truncated, cfg.top_k).await {
                Ok(output) => {
                    let vote = labels::model_vote(&output, cfg.model);
                    let attenuation = 1.0 - 0.65 * vote.safe_score;
                    let mut adjusted = Scores::default();
                    for category in RiskCategory::ALL {
                        adjusted.set(category, vote.scores.get(category) * attenuation);
                    }
                    (adjusted, true)
                }
                Err(e) => {
                    log::warn!("engine: {} inference failed, heuristics only: {e}", cfg.model.id);
                    (Scores::default(), false)
                }
            },
            Err(e) => {
                log::warn!("engine: {} failed to load, heuristics only: {e}", cfg.model.id);
                (Scores::default(), false)
            }
        };

        // Blend. A failed model collapses the weights onto the heuristics.
        let (mw, hw) = if model_ok {
            (cfg.model_weight, cfg.heuristic_weight)
        } else {
            (0.0, 1.0)
        };
        let mut finals = Scores::default();
        for category in RiskCategory::ALL {
            let blended = mw * model_scores.get(category) + hw * heuristic_scores.get(category);
            finals.set(category, blended.clamp(0.0, 1.0));
        }

        // Critical override reinstated: explicit critical hits cannot be
        // drowned out by a confident model.
        if cfg.enable_critical_patterns {
            for category in RiskCategory::ALL {
                let h = heuristic_scores.get(category);
                if h >= cfg.critical_hit_floor {
                    finals.bump(category, h);
                }
            }
        }

        // Decision: categories by final score descending, fixed order on
        // ties; the first that clears its effective threshold wins.
        let mut ranked = RiskCategory::ALL;
        ranked.sort_by(|a, b| {
            finals
                .get(*b)
                .partial_cmp(&finals.get(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let winner = ranked
            .iter()
            .copied()
            .find(|c| finals.get(*c) >= cfg.thresholds.get(*c));

        match winner {
            Some(category) => Analysis {
                verdict: category.as_str().to_owned(),
                score: finals.get(category),
                scores: finals,
                heuristic_scores,
                model_scores,
                thresholds: cfg.thresholds,
            },
            None => {
                let (_, top) = finals.top();
                Analysis {
                    verdict: SAFE.to_owned(),
                    score: (1.0 - top).max(0.05),
                    scores: finals,
                    heuristic_scores,
                    model_scores,
                    thresholds: cfg.thresholds,
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
