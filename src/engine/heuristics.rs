//! Heuristic scoring: compiled-in pattern tables and trigger-list matching.
//!
//! Two signal sources per category:
//! 1. a fixed regex pattern set — score `min(0.9, 0.22 × matching patterns)`;
//! 2. the configurable trigger lists — score `min(cap, base + step × hits)`.
//!
//! Single-token triggers match on Unicode letter/number word boundaries;
//! multi-word triggers match as substrings of the lowercased text.
//! Recruitment, drugs and terrorism hits additionally feed the threat score
//! with their own weight rows.

use std::sync::LazyLock;

use regex::Regex;

use super::{RiskCategory, RuntimeConfig, Scores};

// ─── Trigger weights ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TriggerWeights {
    pub base: f64,
    pub step: f64,
    pub cap: f64,
}

const fn w(base: f64, step: f64, cap: f64) -> TriggerWeights {
    TriggerWeights { base, step, cap }
}

fn weights(category: RiskCategory) -> TriggerWeights {
    match category {
        RiskCategory::Toxicity => w(0.52, 0.11, 0.96),
        RiskCategory::Threat => w(0.58, 0.11, 0.98),
        RiskCategory::Scam => w(0.56, 0.10, 0.98),
        RiskCategory::Recruitment => w(0.66, 0.10, 0.99),
        RiskCategory::Drugs => w(0.74, 0.08, 0.99),
        RiskCategory::Terrorism => w(0.78, 0.07, 0.99),
    }
}

/// Categories whose hits also raise the threat score.
fn threat_contribution(category: RiskCategory) -> Option<TriggerWeights> {
    match category {
        RiskCategory::Recruitment => Some(w(0.58, 0.08, 0.95)),
        RiskCategory::Drugs => Some(w(0.62, 0.08, 0.95)),
        RiskCategory::Terrorism => Some(w(0.68, 0.08, 0.97)),
        _ => None,
    }
}

fn trigger_score(hits: usize, weights: TriggerWeights) -> f64 {
    if hits == 0 {
        return 0.0;
    }
    (weights.base + weights.step * hits as f64).min(weights.cap)
}

// ─── Pattern tables ──────────────────────────────────────────────────────────

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("bad built-in pattern {p:?}: {e}")))
        .collect()
}

static PATTERNS: LazyLock<Vec<(RiskCategory, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            RiskCategory::Toxicity,
            compile(&[
                r"(?i)\b(идиот\w*|дебил\w*|ничтожеств\w*|мраз\w*|урод\w*)\b",
                r"(?i)ты\s+(туп\w+|глуп\w+|жалк\w+)",
                r"(?i)(тебя|вас)\s+все\s+ненавидят",
                r"(?i)\byou('| a)?re\s+(stupid|pathetic|worthless)\b",
            ]),
        ),
        (
            RiskCategory::Threat,
            compile(&[
                r"(?i)\b(убь\w+|зарежу|застрелю|покалечу)\b",
                r"(?i)я\s+(тебя|вас)\s+(найду|достану)",
                r"(?i)\b(kill|hurt)\s+you\b",
            ]),
        ),
        (
            RiskCategory::Scam,
            compile(&[
                r"(?i)\d+\s*%\s*(в\s*(день|неделю|месяц)|daily)",
                r"(?i)гарантированн\w+\s+(доход\w*|прибыл\w*)",
                r"(?i)(переведи|отправь)\s+(деньги|usdt|btc|крипт\w+)",
                r"(?i)(удво|утро)им\s+(ваш|твой)",
            ]),
        ),
        (
            RiskCategory::Recruitment,
            compile(&[
                r"(?i)ищем\s+люд\w+",
                r"(?i)закрыт\w+\s+групп\w+",
                r"(?i)(набор|набираем)\s+(в\s+команду|людей)",
                r"(?i)(легк\w+|быстр\w+)\s+заработ\w+",
            ]),
        ),
        (
            RiskCategory::Drugs,
            compile(&[
                r"(?i)\b(мефедрон\w*|гашиш\w*|героин\w*|кокаин\w*|спайс\w*)\b",
                r"(?i)закладк\w+",
                r"(?i)\b(соль|шишки)\s+по\s+городу",
            ]),
        ),
        (
            RiskCategory::Terrorism,
            compile(&[
                r"(?i)\b(теракт\w*|взрывчатк\w*|взорв\w+)\b",
                r"(?i)\b(джихад\w*|шахид\w*)\b",
                r"(?i)готовим\s+(взрыв\w*|теракт\w*|нападени\w*)",
            ]),
        ),
    ]
});

fn pattern_score(text: &str, category: RiskCategory) -> f64 {
    let hits = PATTERNS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, patterns)| patterns.iter().filter(|p| p.is_match(text)).count())
        .unwrap_or(0);
    (0.22 * hits as f64).min(0.9)
}

// ─── Trigger matching ────────────────────────────────────────────────────────

/// Whole-word containment with Unicode letter/number boundaries.
fn word_hit(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let end = abs + needle.len();
        let before_ok = haystack[..abs]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}

/// Count trigger hits in the lowercased text.
pub fn trigger_hits(text_lower: &str, triggers: &[String]) -> usize {
    triggers
        .iter()
        .filter(|t| {
            let t = t.as_str();
            if t.is_empty() {
                false
            } else if t.chars().any(char::is_whitespace) {
                text_lower.contains(t)
            } else {
                word_hit(text_lower, t)
            }
        })
        .count()
}

// ─── URL scam context ────────────────────────────────────────────────────────

const URL_SCAM_CONTEXT: &[&str] = &[
    "оплат", "кошел", "перевод", "переведи", "крипт", "usdt", "btc", "wallet", "payment",
    "инвест", "депозит",
];

fn has_scam_url(text_lower: &str) -> bool {
    let has_url = text_lower.contains("http://") || text_lower.contains("https://");
    has_url && URL_SCAM_CONTEXT.iter().any(|c| text_lower.contains(c))
}

// ─── Scoring entry point ─────────────────────────────────────────────────────

/// Compute the heuristic score map for `text` under `cfg`.
pub fn heuristic_scores(text: &str, cfg: &RuntimeConfig) -> Scores {
    let lower = text.to_lowercase();
    let mut scores = Scores::default();

    for category in RiskCategory::ALL {
        scores.bump(category, pattern_score(text, category));

        let hits = trigger_hits(&lower, cfg.triggers.get(category));
        scores.bump(category, trigger_score(hits, weights(category)));

        if hits > 0 {
            if let Some(cross) = threat_contribution(category) {
                scores.bump(RiskCategory::Threat, trigger_score(hits, cross));
            }
        }
    }

    let keyword_hits = trigger_hits(&lower, &cfg.keywords);
    if keyword_hits > 0 {
        let contribution = (0.35 + cfg.keyword_hit_boost * keyword_hits as f64).min(0.96);
        scores.bump(RiskCategory::Scam, contribution);
    }

    if has_scam_url(&lower) {
        scores.bump(RiskCategory::Scam, (0.6 + cfg.url_scam_boost).min(0.99));
    }

    scores
}

// ─── Tests ───────────────────────────────────────────────────────────────────
