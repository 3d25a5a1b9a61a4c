//! Settings normalization.
//!
//! `normalize` turns an arbitrary JSON document into a well-formed
//! [`Settings`] value. It is applied on every load, save, and inbound API
//! merge, which makes normalization idempotent by construction:
//! `normalize(to_json(normalize(x))) == normalize(x)`.

use serde_json::Value;

use super::schema::{
    AuthMode, CategoryThresholds, MediaSettings, ProxySettings, Settings, DEFAULT_MODEL_ID,
    DEFAULT_TARGET_CHAT,
};
use crate::engine::catalog;

// ─── Field helpers ───────────────────────────────────────────────────────────

fn str_or(v: Option<&Value>, fallback: &str) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_owned(),
        // Numeric ids arrive as numbers from some clients.
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_owned(),
    }
}

fn bool_or(v: Option<&Value>, fallback: bool) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        _ => fallback,
    }
}

/// Percent knob: accepts a ratio in [0,1] or a percent in (1,100],
/// returns an integer percent clamped into `min..=max`.
fn percent_or(v: Option<&Value>, min: u8, max: u8, fallback: u8) -> u8 {
    let n = match v.and_then(Value::as_f64) {
        Some(n) if n.is_finite() => n,
        _ => return fallback,
    };
    let pct = if (0.0..=1.0).contains(&n) { n * 100.0 } else { n };
    let rounded = pct.round();
    if rounded <= f64::from(min) {
        min
    } else if rounded >= f64::from(max) {
        max
    } else {
        rounded as u8
    }
}

/// Per-category threshold: `0` stays `0` (inherit global), anything else is
/// normalized like a percent into 1..=99.
fn threshold_or(v: Option<&Value>, fallback: u8) -> u8 {
    match v.and_then(Value::as_f64) {
        Some(n) if n == 0.0 => 0,
        Some(n) if n.is_finite() => percent_or(v, 1, 99, fallback),
        _ => fallback,
    }
}

fn int_or(v: Option<&Value>, min: u32, max: u32, fallback: u32) -> u32 {
    match v.and_then(Value::as_f64) {
        Some(n) if n.is_finite() => (n.round() as i64).clamp(i64::from(min), i64::from(max)) as u32,
        _ => fallback,
    }
}

/// Trigger list: trim, drop empties, deduplicate by lowercase form, preserve
/// order (first occurrence wins, trimmed form kept).
fn trigger_list(v: Option<&Value>, fallback: Vec<String>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return fallback;
    };
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let Value::String(s) = item else { continue };
        let trimmed = s.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_owned());
        }
    }
    out
}

/// Chat list: trim, drop empties, case-sensitive dedup preserving first
/// occurrence. Numeric ids are accepted and stringified.
fn chat_list(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let s = match item {
            Value::String(s) => s.trim().to_owned(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if s.is_empty() {
            continue;
        }
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
    out
}

fn non_empty_or(list: Vec<String>, fallback: &[String]) -> Vec<String> {
    if list.is_empty() { fallback.to_vec() } else { list }
}

// ─── normalize ───────────────────────────────────────────────────────────────

/// Normalize an arbitrary JSON document into a [`Settings`] value.
pub fn normalize(raw: &Value) -> Settings {
    let d = Settings::default();
    let get = |key: &str| raw.get(key);

    let auth_mode = match get("authMode").and_then(Value::as_str) {
        Some("user") => AuthMode::User,
        _ => AuthMode::Bot,
    };

    // Target chats: each mode's list falls back to the legacy field, then to
    // the hardcoded default. The legacy field always mirrors the active mode.
    let legacy = chat_list(get("targetChats"));
    let hardcoded = vec![DEFAULT_TARGET_CHAT.to_owned()];
    let bot_target_chats =
        non_empty_or(chat_list(get("botTargetChats")), &non_empty_or(legacy.clone(), &hardcoded));
    let user_target_chats =
        non_empty_or(chat_list(get("userTargetChats")), &non_empty_or(legacy, &hardcoded));
    let target_chats = match auth_mode {
        AuthMode::Bot => bot_target_chats.clone(),
        AuthMode::User => user_target_chats.clone(),
    };

    let ml_model = {
        let id = str_or(get("mlModel"), DEFAULT_MODEL_ID);
        if catalog::is_known_model(&id) {
            id
        } else {
            DEFAULT_MODEL_ID.to_owned()
        }
    };

    let proxy_raw = get("proxy").cloned().unwrap_or(Value::Null);
    let proxy = ProxySettings {
        enabled: bool_or(proxy_raw.get("enabled"), false),
        kind: match proxy_raw.get("kind").and_then(Value::as_str) {
            Some(k @ ("socks5" | "http" | "mtproto")) => k.to_owned(),
            _ => "socks5".to_owned(),
        },
        host: str_or(proxy_raw.get("host"), ""),
        port: int_or(proxy_raw.get("port"), 0, 65_535, 0) as u16,
        username: str_or(proxy_raw.get("username"), ""),
        password: str_or(proxy_raw.get("password"), ""),
    };

    let media_raw = get("media").cloned().unwrap_or(Value::Null);
    let media = MediaSettings {
        enabled: bool_or(media_raw.get("enabled"), false),
        types: trigger_list(media_raw.get("types"), Vec::new()),
    };

    let thresholds_raw = get("categoryThresholds").cloned().unwrap_or(Value::Null);
    let category_thresholds = CategoryThresholds {
        toxicity: threshold_or(thresholds_raw.get("toxicity"), 0),
        threat: threshold_or(thresholds_raw.get("threat"), 0),
        scam: threshold_or(thresholds_raw.get("scam"), 0),
        recruitment: threshold_or(thresholds_raw.get("recruitment"), 0),
        drugs: threshold_or(thresholds_raw.get("drugs"), 0),
        terrorism: threshold_or(thresholds_raw.get("terrorism"), 0),
    };

    Settings {
        api_id: str_or(get("apiId"), ""),
        api_hash: str_or(get("apiHash"), ""),
        auth_mode,
        bot_token: str_or(get("botToken"), ""),
        session_string: str_or(get("sessionString"), ""),
        session_name: str_or(get("sessionName"), &d.session_name),

        bot_target_chats,
        user_target_chats,
        target_chats,
        user_auth_all_messages: bool_or(get("userAuthAllMessages"), false),

        proxy,
        media,

        ml_model,
        threat_threshold: percent_or(get("threatThreshold"), 1, 99, d.threat_threshold),
        category_thresholds,
        enable_heuristics: bool_or(get("enableHeuristics"), true),
        enable_critical_patterns: bool_or(get("enableCriticalPatterns"), true),
        model_weight: percent_or(get("modelWeight"), 0, 100, d.model_weight),
        heuristic_weight: percent_or(get("heuristicWeight"), 0, 100, d.heuristic_weight),
        model_top_k: percent_or(get("modelTopK"), 1, 30, d.model_top_k),
        max_analysis_chars: int_or(get("maxAnalysisChars"), 200, 4000, d.max_analysis_chars),
        url_scam_boost: percent_or(get("urlScamBoost"), 0, 100, d.url_scam_boost),
        keyword_hit_boost: percent_or(get("keywordHitBoost"), 0, 100, d.keyword_hit_boost),
        critical_hit_floor: percent_or(get("criticalHitFloor"), 0, 100, d.critical_hit_floor),

        keywords: trigger_list(get("keywords"), d.keywords),
        scam_triggers: trigger_list(get("scamTriggers"), d.scam_triggers),
        drug_triggers: trigger_list(get("drugTriggers"), d.drug_triggers),
        recruitment_triggers: trigger_list(get("recruitmentTriggers"), d.recruitment_triggers),
        terrorism_triggers: trigger_list(get("terrorismTriggers"), d.terrorism_triggers),
        threat_triggers: trigger_list(get("threatTriggers"), d.threat_triggers),
        toxicity_triggers: trigger_list(get("toxicityTriggers"), d.toxicity_triggers),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
