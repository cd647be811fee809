//! Catalog of user-facing response templates.
//!
//! Everything is rendered as Telegram HTML; user-supplied names and reasons
//! are escaped before they are interpolated.

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::error::ModError;

/// Send an HTML-formatted message.
pub async fn send_html(bot: &Bot, chat_id: ChatId, text: &str) -> Result<Message, ModError> {
    Ok(bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?)
}

/// Clickable mention of a user, with the display name escaped.
#[must_use]
pub fn mention(user_id: i64, name: &str) -> String {
    format!(
        r#"<a href="tg://user?id={user_id}">{}</a>"#,
        html_escape::encode_text(name)
    )
}

#[must_use]
pub fn warn_notice(mention: &str, count: i32) -> String {
    format!("{mention} получает предупреждение №{count}.")
}

#[must_use]
pub fn escalated(mention: &str, minutes: i64) -> String {
    format!("{mention} набрал максимум предупреждений и лишён права писать на {minutes} мин.")
}

pub const WARN_ADMIN: &str = "Администраторам предупреждения не выдаются.";

#[must_use]
pub fn flood_muted(mention: &str) -> String {
    format!("{mention} заблокирован на 10 минут за попытку зафлудить меня.")
}

#[must_use]
pub fn callback_kicked(mention: &str) -> String {
    format!("{mention} заблокирован на 10 минут за бездумное нажатие по кнопкам :).")
}

#[must_use]
pub fn banned_timed(mention: &str, magnitude: i64, unit_label: &str, reason: &str) -> String {
    format!(
        "{mention} забанен на {magnitude} {unit_label}\nПричина: <i>{}</i>.",
        html_escape::encode_text(reason)
    )
}

#[must_use]
pub fn banned_forever(mention: &str, reason: &str) -> String {
    format!(
        "{mention} забанен навсегда.\nПричина: <i>{}</i>.",
        html_escape::encode_text(reason)
    )
}

#[must_use]
pub fn muted(mention: &str, magnitude: i64, unit_label: &str) -> String {
    format!("{mention} запрещено отправлять сообщения на {magnitude} {unit_label}")
}

#[must_use]
pub fn unmuted(mention: &str) -> String {
    format!("{mention} разблокирован.")
}

#[must_use]
pub fn pardoned(mention: &str) -> String {
    format!("{mention} больше не имеет предупреждений.")
}

pub const ADMIN_REQUIRED: &str =
    "Спасибо за приглашение! Для работы мне нужны права администратора.";

#[must_use]
pub fn long_name(name: &str) -> String {
    format!(
        "Имя «{}» слишком длинное, до встречи.",
        html_escape::encode_text(name)
    )
}

pub const BROADCAST_OK: &str = "Сообщение отправлено в канал.";

/// Replies for users poking the bot itself with a moderation command.
const BOT_DEFENSE: &[&str] = &[
    "Очень смешно.",
    "Сам себя я не накажу.",
    "Нет.",
    "Попробуйте кого-нибудь другого.",
];

/// Rotating witty refusal, picked by an arbitrary seed.
#[must_use]
pub fn bot_defense(seed: u64) -> &'static str {
    BOT_DEFENSE[(seed as usize) % BOT_DEFENSE.len()]
}

/// Syntax notice for a command's user-input error.
#[must_use]
pub fn syntax_error(command: &str) -> &'static str {
    match command {
        "pin" => "Команду !pin нужно отправлять ответом на закрепляемое сообщение.",
        "ban" => "Синтаксис: ответом на сообщение «!ban 2d причина» \
                  или «!ban причина» для вечного бана.",
        "mute" => "Синтаксис: ответом на сообщение «!mute 2h». \
                  Единицы времени: w, d, h, m.",
        "unmute" => "Команду !unmute нужно отправлять ответом на сообщение пользователя.",
        "sd_ch" => "Синтаксис: «!sd_ch текст» или ответом на пересылаемое сообщение.",
        "warn" => "Команду !warn нужно отправлять ответом на сообщение нарушителя.",
        "acquit" => "Команду !acquit нужно отправлять ответом на сообщение пользователя.",
        _ => "Неверный синтаксис команды.",
    }
}

pub const SETTINGS_TITLE: &str = "Настройки чата:";
pub const NOT_SETTINGS_OWNER: &str = "Вы не админ или не вызывали настройки";
pub const MAX_WARN_BOUNDS: &str = "Допустимые значения от 1 до 10";

pub const PROMPT_WORDLIST: &str =
    "Пришлите файл «banned-words» со списком запрещённых слов через запятую. \
     Для отмены напишите cancel.";
pub const PROMPT_WELCOME: &str =
    "Пришлите текст приветствия. Подстрока {name} заменяется на имя вступившего. \
     Для отмены напишите cancel.";
pub const PROMPT_DURATION: &str =
    "Пришлите длительность ограничения в минутах (целое число). Для отмены напишите cancel.";

pub const CANCELLED: &str = "Отменено.";
pub const WORDLIST_STORED: &str = "Список запрещённых слов сохранён.";
pub const WELCOME_STORED: &str = "Приветствие сохранено.";
pub const DURATION_STORED: &str = "Длительность ограничения сохранена.";
pub const CAPTURE_FAILED: &str = "Не получилось прочитать или сохранить данные.";
pub const DURATION_INVALID: &str = "Нужно целое число минут, настройка не изменена.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_escapes_name() {
        let m = mention(7, "<evil> & co");
        assert!(m.contains("tg://user?id=7"));
        assert!(m.contains("&lt;evil&gt;"));
        assert!(!m.contains("<evil>"));
    }

    #[test]
    fn test_bot_defense_rotates_in_bounds() {
        for seed in 0..20 {
            assert!(!bot_defense(seed).is_empty());
        }
    }
}
