//! Built-in self-test message sets.
//!
//! Used by the engine-test endpoint when the caller supplies no messages:
//! one set per risk category plus `all`, which also mixes in benign lines to
//! exercise the safe path.

use super::RiskCategory;

const TOXICITY: &[&str] = &[
    "Ты идиот и ничтожество, тебя все ненавидят.",
    "Заткнись, дебил, никто тебя не спрашивал.",
];

const THREAT: &[&str] = &[
    "Я тебя убью, если еще раз напишешь.",
    "Найду и покалечу, ты понял меня.",
];

const SCAM: &[&str] = &[
    "Гарантированный доход 15% в день, только сегодня, переведи usdt.",
    "Удвоим твой депозит, инвестируй прямо сейчас: https://x.example/pay",
];

const RECRUITMENT: &[&str] = &[
    "Ищем людей в закрытую группу для специальных задач.",
    "Набор в команду, легкий заработок, работа без вопросов.",
];

const DRUGS: &[&str] = &[
    "Продам мефедрон, есть закладки по городу.",
    "Гашиш и шишки, доставка сегодня.",
];

const TERRORISM: &[&str] = &[
    "Готовим теракт в людном месте, нужен исполнитель.",
    "Нужна взрывчатка, оплата наличными.",
];

const SAFE_LINES: &[&str] = &[
    "Завтра созвон в 11, не забудь отчет.",
    "Кто идет на обед? Я за пиццу.",
];

fn for_category(category: RiskCategory) -> &'static [&'static str] {
    match category {
        RiskCategory::Toxicity => TOXICITY,
        RiskCategory::Threat => THREAT,
        RiskCategory::Scam => SCAM,
        RiskCategory::Recruitment => RECRUITMENT,
        RiskCategory::Drugs => DRUGS,
        RiskCategory::Terrorism => TERRORISM,
    }
}

/// Resolve a preset name to its message list.
///
/// Accepts `all` or one of the six category names; anything else is `None`.
pub fn preset_messages(name: &str) -> Option<Vec<&'static str>> {
    let name = name.trim().to_lowercase();
    if name == "all" {
        let mut out = Vec::new();
        for category in RiskCategory::ALL {
            out.extend_from_slice(for_category(category));
        }
        out.extend_from_slice(SAFE_LINES);
        return Some(out);
    }
    RiskCategory::from_str(&name).map(|c| for_category(c).to_vec())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
