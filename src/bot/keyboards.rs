//! Inline keyboards for the settings panel.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::config::MAX_WARNINGS_BOUNDS;
use crate::store::settings::ChatSettings;

/// Callback payloads understood by the settings panel.
pub const CB_WARN_DEC: &str = "warn_dec";
pub const CB_WARN_INC: &str = "warn_inc";
pub const CB_TOGGLE_AUTO: &str = "toggle_auto";
pub const CB_TOGGLE_WELCOME: &str = "toggle_welcome";
pub const CB_EDIT_WORDLIST: &str = "edit_wordlist";
pub const CB_EDIT_WELCOME: &str = "edit_welcome";
pub const CB_EDIT_DURATION: &str = "edit_duration";
pub const CB_NOOP: &str = "noop";

/// New max-warnings value after applying `delta`, if it stays in bounds.
#[must_use]
pub fn bounded_max_warnings(current: i32, delta: i32) -> Option<i32> {
    let next = current + delta;
    MAX_WARNINGS_BOUNDS.contains(&next).then_some(next)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "вкл"
    } else {
        "выкл"
    }
}

/// Render the settings panel from the current row.
#[must_use]
pub fn settings_keyboard(settings: &ChatSettings) -> InlineKeyboardMarkup {
    let cb = |label: &str, data: &str| {
        InlineKeyboardButton::callback(label.to_string(), data.to_string())
    };
    InlineKeyboardMarkup::new(vec![
        vec![
            cb("−", CB_WARN_DEC),
            cb(
                &format!("Предупреждений до бана: {}", settings.max_warnings),
                CB_NOOP,
            ),
            cb("+", CB_WARN_INC),
        ],
        vec![cb(
            &format!("Автобан за запрещённые слова: {}", on_off(settings.auto_warn)),
            CB_TOGGLE_AUTO,
        )],
        vec![cb(
            &format!(
                "Приветствие новичков: {}",
                on_off(settings.welcome_message.is_some())
            ),
            CB_TOGGLE_WELCOME,
        )],
        vec![cb("Изменить список запрещённых слов", CB_EDIT_WORDLIST)],
        vec![cb("Изменить текст приветствия", CB_EDIT_WELCOME)],
        vec![cb(
            &format!(
                "Длительность ограничения: {} мин.",
                settings.restriction_minutes
            ),
            CB_EDIT_DURATION,
        )],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_clamp_low() {
        assert_eq!(bounded_max_warnings(1, -1), None);
        assert_eq!(bounded_max_warnings(2, -1), Some(1));
    }

    #[test]
    fn test_bounds_clamp_high() {
        assert_eq!(bounded_max_warnings(10, 1), None);
        assert_eq!(bounded_max_warnings(9, 1), Some(10));
    }

    #[test]
    fn test_keyboard_reflects_row() {
        let settings = ChatSettings {
            chat_id: -100,
            max_warnings: 4,
            restriction_minutes: 7200,
            forbidden_words: None,
            auto_warn: true,
            welcome_message: None,
        };
        let kb = settings_keyboard(&settings);
        let labels: Vec<String> = kb
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.clone())
            .collect();
        assert!(labels.iter().any(|l| l.contains("4")));
        assert!(labels.iter().any(|l| l.contains("вкл")));
        assert!(labels.iter().any(|l| l.contains("7200")));
    }
}
