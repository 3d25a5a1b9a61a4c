//! Critical-pattern overrides.
//!
//! A tighter, compiled-in rule set. A matching rule raises its category to
//! at least the rule's severity, and never below the configured floor —
//! explicit critical phrasing must survive a confident "safe" model vote.

use std::sync::LazyLock;

use regex::Regex;

use super::{RiskCategory, Scores};

pub struct CriticalRule {
    pub category: RiskCategory,
    pub severity: f64,
    pattern: Regex,
}

fn rule(category: RiskCategory, severity: f64, pattern: &str) -> CriticalRule {
    CriticalRule {
        category,
        severity,
        pattern: Regex::new(pattern)
            .unwrap_or_else(|e| panic!("bad critical pattern {pattern:?}: {e}")),
    }
}

static RULES: LazyLock<Vec<CriticalRule>> = LazyLock::new(|| {
    use RiskCategory::*;
    vec![
        // Threat
        rule(Threat, 0.93, r"(?i)\b(убью|убьём|убьем|зарежу|застрелю)\b"),
        rule(Threat, 0.95, r"(?i)найду\s+и\s+(убью|зарежу|покалечу)"),
        rule(Threat, 0.92, r"(?i)\bkill\s+you\b"),
        // Terrorism
        rule(Terrorism, 0.97, r"(?i)\bтеракт\w*\b"),
        rule(Terrorism, 0.95, r"(?i)\b(взорв\w+|взрывчатк\w+)\b"),
        rule(Terrorism, 0.94, r"(?i)\b(джихад\w*|шахид\w*)\b"),
        // Drugs
        rule(Drugs, 0.92, r"(?i)\b(мефедрон\w*|героин\w*|кокаин\w*)\b"),
        rule(Drugs, 0.90, r"(?i)закладк\w+"),
        // Scam
        rule(Scam, 0.90, r"(?i)(переведи|отправь)\s+предоплат\w+"),
        rule(Scam, 0.88, r"(?i)гарантированн\w+\s+доход\w*"),
        // Recruitment
        rule(Recruitment, 0.88, r"(?i)набор\s+в\s+закрыт\w+"),
        rule(Recruitment, 0.89, r"(?i)ищем\s+исполнител\w+"),
        // Toxicity
        rule(Toxicity, 0.90, r"(?i)\bсдохни\b"),
    ]
});

/// Score map produced by the critical rule set alone.
///
/// Each matching rule contributes `max(severity, floor)` to its category.
pub fn critical_scores(text: &str, floor: f64) -> Scores {
    let mut scores = Scores::default();
    for rule in RULES.iter() {
        if rule.pattern.is_match(text) {
            scores.bump(rule.category, rule.severity.max(floor));
        }
    }
    scores
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_stay_in_declared_band() {
        for r in RULES.iter() {
            assert!((0.88..=0.97).contains(&r.severity), "{}", r.severity);
        }
    }

    #[test]
    fn direct_murder_threat_matches() {
        let s = critical_scores("Я тебя убью, если еще раз напишешь.", 0.85);
        assert!((s.get(RiskCategory::Threat) - 0.93).abs() < 1e-9);
    }

    #[test]
    fn terrorism_keyword_matches_inflections() {
        let s = critical_scores("готовим теракт в людном месте", 0.85);
        assert!((s.get(RiskCategory::Terrorism) - 0.97).abs() < 1e-9);
        let s = critical_scores("обсуждали теракты", 0.85);
        assert!(s.get(RiskCategory::Terrorism) > 0.0);
    }

    #[test]
    fn floor_lifts_low_severity_rules() {
        let s = critical_scores("гарантированный доход без рисков", 0.95);
        assert!((s.get(RiskCategory::Scam) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn clean_text_produces_empty_map() {
        let s = critical_scores("встретимся завтра у метро", 0.85);
        for category in RiskCategory::ALL {
            assert_eq!(s.get(category), 0.0);
        }
    }

    #[test]
    fn best_matching_rule_wins_per_category() {
        let s = critical_scores("найду и убью", 0.0);
        // Both threat rules match; the stronger severity sticks.
        assert!((s.get(RiskCategory::Threat) - 0.95).abs() < 1e-9);
    }
}
