//! Settings panel button handling.
//!
//! The panel message is posted as a reply to the `!settings` command, so
//! the admin who opened it is recoverable from the reply chain; presses by
//! anyone else only produce a toast. Every state change re-renders the
//! keyboard in place.

use teloxide::prelude::*;
use teloxide::types::ReplyParameters;
use tracing::debug;

use crate::bot::keyboards::{
    self, CB_EDIT_DURATION, CB_EDIT_WELCOME, CB_EDIT_WORDLIST, CB_TOGGLE_AUTO, CB_TOGGLE_WELCOME,
    CB_WARN_DEC, CB_WARN_INC,
};
use crate::bot::texts;
use crate::config::{CALLBACK_KEY, CALLBACK_RATE, DEFAULT_WELCOME_MESSAGE};
use crate::dialogue::{ConfigStage, DialogueRegistry};
use crate::error::ModError;
use crate::moderation::flood;
use crate::store::{settings, Database};
use crate::throttle::ThrottleRegistry;

/// Handle one settings button press.
pub async fn handle_callback(
    bot: &Bot,
    q: &CallbackQuery,
    db: &Database,
    registry: &ThrottleRegistry,
    dialogues: &DialogueRegistry,
) -> Result<(), ModError> {
    if !flood::gate_callback(bot, q, registry, CALLBACK_KEY, CALLBACK_RATE).await? {
        return Ok(());
    }
    let Some(msg) = q.regular_message() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let invoker = msg
        .reply_to_message()
        .and_then(|origin| origin.from.as_ref())
        .map(|user| user.id);
    if invoker != Some(q.from.id) {
        // Plain toast, not a blocking alert
        bot.answer_callback_query(q.id.clone())
            .text(texts::NOT_SETTINGS_OWNER)
            .await?;
        return Ok(());
    }

    match q.data.as_deref() {
        Some(CB_WARN_DEC) => adjust_max_warnings(bot, q, db, -1).await,
        Some(CB_WARN_INC) => adjust_max_warnings(bot, q, db, 1).await,
        Some(CB_TOGGLE_AUTO) => toggle_auto_warn(bot, q, db).await,
        Some(CB_TOGGLE_WELCOME) => toggle_welcome(bot, q, db).await,
        Some(CB_EDIT_WORDLIST) => {
            open_dialogue(bot, q, dialogues, texts::PROMPT_WORDLIST, ConfigStage::AwaitingWordList)
                .await
        }
        Some(CB_EDIT_WELCOME) => {
            open_dialogue(bot, q, dialogues, texts::PROMPT_WELCOME, ConfigStage::AwaitingWelcome)
                .await
        }
        Some(CB_EDIT_DURATION) => {
            open_dialogue(
                bot,
                q,
                dialogues,
                texts::PROMPT_DURATION,
                ConfigStage::AwaitingDuration,
            )
            .await
        }
        other => {
            debug!(data = other.unwrap_or(""), "inert settings button");
            bot.answer_callback_query(q.id.clone()).await?;
            Ok(())
        }
    }
}

/// Redraw the panel keyboard from the current settings row.
async fn rerender(bot: &Bot, msg: &Message, db: &Database) -> Result<(), ModError> {
    let chat_id = msg.chat.id.0;
    let fresh = settings::fetch_settings(db, chat_id)
        .await?
        .ok_or(ModError::DataIntegrity(chat_id))?;
    bot.edit_message_reply_markup(msg.chat.id, msg.id)
        .reply_markup(keyboards::settings_keyboard(&fresh))
        .await?;
    Ok(())
}

/// Step `max_warnings` by `delta`; out-of-bounds presses alert and change
/// nothing.
async fn adjust_max_warnings(
    bot: &Bot,
    q: &CallbackQuery,
    db: &Database,
    delta: i32,
) -> Result<(), ModError> {
    let Some(msg) = q.regular_message() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let current = settings::fetch_settings(db, chat_id)
        .await?
        .ok_or(ModError::DataIntegrity(chat_id))?;
    let Some(next) = keyboards::bounded_max_warnings(current.max_warnings, delta) else {
        bot.answer_callback_query(q.id.clone())
            .text(texts::MAX_WARN_BOUNDS)
            .show_alert(true)
            .await?;
        return Ok(());
    };
    settings::update_max_warnings(db, chat_id, next).await?;
    bot.answer_callback_query(q.id.clone()).await?;
    rerender(bot, msg, db).await
}

async fn toggle_auto_warn(bot: &Bot, q: &CallbackQuery, db: &Database) -> Result<(), ModError> {
    let Some(msg) = q.regular_message() else {
        return Ok(());
    };
    settings::toggle_auto_warn(db, msg.chat.id.0).await?;
    bot.answer_callback_query(q.id.clone()).await?;
    rerender(bot, msg, db).await
}

/// Flip the greeting between disabled and the stock template.
async fn toggle_welcome(bot: &Bot, q: &CallbackQuery, db: &Database) -> Result<(), ModError> {
    let Some(msg) = q.regular_message() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let current = settings::welcome_message(db, chat_id).await?;
    let next = match current {
        None => Some(DEFAULT_WELCOME_MESSAGE),
        Some(_) => None,
    };
    settings::update_welcome_message(db, chat_id, next).await?;
    bot.answer_callback_query(q.id.clone()).await?;
    rerender(bot, msg, db).await
}

/// Prompt for input and enter the capture stage for the pressing admin.
async fn open_dialogue(
    bot: &Bot,
    q: &CallbackQuery,
    dialogues: &DialogueRegistry,
    prompt: &str,
    stage: ConfigStage,
) -> Result<(), ModError> {
    let Some(msg) = q.regular_message() else {
        return Ok(());
    };
    bot.answer_callback_query(q.id.clone()).await?;
    bot.send_message(msg.chat.id, prompt)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    dialogues.enter(msg.chat.id.0, q.from.id.0.cast_signed(), stage);
    Ok(())
}
