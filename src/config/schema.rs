//! Settings document schema.
//!
//! All sections carry `#[serde(default)]` so a partially-filled document
//! deserializes cleanly; the normalizer fills and clamps the rest.

use serde::{Deserialize, Serialize};

/// Model id used whenever the configured one is unknown.
pub const DEFAULT_MODEL_ID: &str = "toxic-bert";

/// Chat monitored when no target list is configured anywhere.
pub const DEFAULT_TARGET_CHAT: &str = "-1003803680927";

// ─── AuthMode ────────────────────────────────────────────────────────────────

/// How the service authenticates against Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Bot HTTP API with a BotFather token.
    #[default]
    Bot,
    /// Full user account over MTProto with a saved session string.
    User,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Bot => "bot",
            AuthMode::User => "user",
        }
    }
}

// ─── ProxySettings ───────────────────────────────────────────────────────────

/// Proxy block. Persisted and normalized; the core does not consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxySettings {
    pub enabled: bool,
    /// `socks5`, `http` or `mtproto`.
    pub kind: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

// ─── MediaSettings ───────────────────────────────────────────────────────────

/// Media-download block. Persisted and normalized; the core does not consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaSettings {
    pub enabled: bool,
    pub types: Vec<String>,
}

// ─── CategoryThresholds ──────────────────────────────────────────────────────

/// Per-category decision thresholds as integer percent.
///
/// `0` means "unset": that category inherits the global `threatThreshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryThresholds {
    pub toxicity: u8,
    pub threat: u8,
    pub scam: u8,
    pub recruitment: u8,
    pub drugs: u8,
    pub terrorism: u8,
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// The singleton settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // Telegram credentials
    pub api_id: String,
    pub api_hash: String,
    pub auth_mode: AuthMode,
    pub bot_token: String,
    pub session_string: String,
    pub session_name: String,

    // Monitoring targets
    pub bot_target_chats: Vec<String>,
    pub user_target_chats: Vec<String>,
    /// Legacy mirror of the active mode's list; kept in sync on every save.
    pub target_chats: Vec<String>,
    /// In user mode, subscribe to every dialog instead of the target list.
    pub user_auth_all_messages: bool,

    pub proxy: ProxySettings,
    pub media: MediaSettings,

    // Engine knobs
    pub ml_model: String,
    /// Global decision threshold, integer percent in 1..=99.
    pub threat_threshold: u8,
    pub category_thresholds: CategoryThresholds,
    pub enable_heuristics: bool,
    pub enable_critical_patterns: bool,
    /// Blend weights, integer percent; normalized to sum 1 at use time.
    pub model_weight: u8,
    pub heuristic_weight: u8,
    /// `top_k` passed to text-classification models, 1..=30.
    pub model_top_k: u8,
    /// Model input truncation, 200..=4000 characters.
    pub max_analysis_chars: u32,
    pub url_scam_boost: u8,
    pub keyword_hit_boost: u8,
    pub critical_hit_floor: u8,

    // Trigger lists (lowercased, deduplicated)
    pub keywords: Vec<String>,
    pub scam_triggers: Vec<String>,
    pub drug_triggers: Vec<String>,
    pub recruitment_triggers: Vec<String>,
    pub terrorism_triggers: Vec<String>,
    pub threat_triggers: Vec<String>,
    pub toxicity_triggers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_id: String::new(),
            api_hash: String::new(),
            auth_mode: AuthMode::Bot,
            bot_token: String::new(),
            session_string: String::new(),
            session_name: "chatwarden".to_owned(),

            bot_target_chats: vec![DEFAULT_TARGET_CHAT.to_owned()],
            user_target_chats: vec![DEFAULT_TARGET_CHAT.to_owned()],
            target_chats: vec![DEFAULT_TARGET_CHAT.to_owned()],
            user_auth_all_messages: false,

            proxy: ProxySettings::default(),
            media: MediaSettings::default(),

            ml_model: DEFAULT_MODEL_ID.to_owned(),
            threat_threshold: 70,
            category_thresholds: CategoryThresholds::default(),
            enable_heuristics: true,
            enable_critical_patterns: true,
            model_weight: 55,
            heuristic_weight: 45,
            model_top_k: 5,
            max_analysis_chars: 1000,
            url_scam_boost: 10,
            keyword_hit_boost: 5,
            critical_hit_floor: 85,

            keywords: default_keywords(),
            scam_triggers: default_scam_triggers(),
            drug_triggers: default_drug_triggers(),
            recruitment_triggers: default_recruitment_triggers(),
            terrorism_triggers: default_terrorism_triggers(),
            threat_triggers: default_threat_triggers(),
            toxicity_triggers: default_toxicity_triggers(),
        }
    }
}

impl Settings {
    /// The target list the active auth mode would subscribe to.
    pub fn active_target_chats(&self) -> &[String] {
        match self.auth_mode {
            AuthMode::Bot => &self.bot_target_chats,
            AuthMode::User => &self.user_target_chats,
        }
    }
}

// ─── Built-in trigger lists ──────────────────────────────────────────────────
//
// Lowercase only; single tokens match on Unicode word boundaries, multi-word
// entries match as substrings.

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

pub fn default_keywords() -> Vec<String> {
    owned(&[
        "срочно",
        "только сегодня",
        "бонус",
        "акция",
        "жми",
        "промокод",
    ])
}

pub fn default_toxicity_triggers() -> Vec<String> {
    owned(&[
        "идиот",
        "дебил",
        "тупой",
        "ничтожество",
        "урод",
        "мразь",
        "ненавидят",
        "заткнись",
        "idiot",
        "stupid",
        "loser",
    ])
}

pub fn default_threat_triggers() -> Vec<String> {
    owned(&[
        "убью",
        "зарежу",
        "застрелю",
        "покалечу",
        "сломаю тебе",
        "найду тебя",
        "расправа",
        "kill you",
        "hurt you",
    ])
}

pub fn default_scam_triggers() -> Vec<String> {
    owned(&[
        "гарантированный доход",
        "быстрые деньги",
        "пассивный доход",
        "удвоим",
        "переведи",
        "предоплата",
        "usdt",
        "крипта",
        "бинанс",
        "выигрыш",
        "инвестируй",
        "guaranteed profit",
        "double your money",
    ])
}

pub fn default_recruitment_triggers() -> Vec<String> {
    owned(&[
        "ищем людей",
        "набор в команду",
        "требуются курьеры",
        "закрытая группа",
        "особые задания",
        "работа без вопросов",
        "легкий заработок",
        "recruiting now",
    ])
}

pub fn default_drug_triggers() -> Vec<String> {
    owned(&[
        "мефедрон",
        "меф",
        "закладка",
        "закладки",
        "гашиш",
        "шишки",
        "спайс",
        "героин",
        "кокаин",
        "mdma",
        "amphetamine",
    ])
}

pub fn default_terrorism_triggers() -> Vec<String> {
    owned(&[
        "теракт",
        "взорвем",
        "взрывчатка",
        "джихад",
        "шахид",
        "бомбу",
        "massacre plan",
    ])
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_bot_auth_mode() {
        assert_eq!(Settings::default().auth_mode, AuthMode::Bot);
    }

    #[test]
    fn defaults_target_the_hardcoded_chat() {
        let s = Settings::default();
        assert_eq!(s.target_chats, vec![DEFAULT_TARGET_CHAT.to_owned()]);
        assert_eq!(s.active_target_chats(), &s.bot_target_chats[..]);
    }

    #[test]
    fn default_weights_sum_to_100() {
        let s = Settings::default();
        assert_eq!(u32::from(s.model_weight) + u32::from(s.heuristic_weight), 100);
    }

    #[test]
    fn category_thresholds_default_to_unset() {
        let t = CategoryThresholds::default();
        assert_eq!(t.toxicity, 0);
        assert_eq!(t.terrorism, 0);
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert!(json.get("mlModel").is_some());
        assert!(json.get("threatThreshold").is_some());
        assert!(json.get("botTargetChats").is_some());
        assert!(json.get("userAuthAllMessages").is_some());
    }

    #[test]
    fn trigger_lists_are_lowercase() {
        for list in [
            default_keywords(),
            default_toxicity_triggers(),
            default_threat_triggers(),
            default_scam_triggers(),
            default_recruitment_triggers(),
            default_drug_triggers(),
            default_terrorism_triggers(),
        ] {
            for t in list {
                assert_eq!(t, t.to_lowercase());
            }
        }
    }

    #[test]
    fn user_mode_switches_active_targets() {
        let mut s = Settings::default();
        s.auth_mode = AuthMode::User;
        s.user_target_chats = vec!["-100123".to_owned()];
        assert_eq!(s.active_target_chats(), ["-100123".to_owned()]);
    }
}
