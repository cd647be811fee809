//! Moderation command surface and configuration dialogue capture.
//!
//! Commands are declared in a static dispatch table carrying the privilege
//! requirement, rate and throttle key for each entry; `dispatch_command`
//! evaluates the anti-flood gate and the privilege check before the command
//! body runs. User-input errors (missing reply target, bad duration token)
//! become self-deleting syntax notices; a failed privilege check is a
//! silent no-op.

use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, Me, ReplyParameters, User};
use tracing::{debug, warn};

use crate::bot::{keyboards, texts};
use crate::config::{
    Settings, COMMAND_FILTER_KEY, COMMAND_FILTER_RATE, COMMAND_RATE, DEFAULT_MESSAGE_KEY,
    DEFAULT_MESSAGE_RATE, NAME_LENGTH_LIMIT, NOTICE_DELAY_LONG_SECS, NOTICE_DELAY_SHORT_SECS,
    WORDLIST_FILE_NAME, WORDLIST_MAX_BYTES,
};
use crate::dialogue::{ConfigStage, DialogueRegistry};
use crate::duration::{parse_duration, ParsedDuration};
use crate::error::ModError;
use crate::moderation::warn::{enforce, WarnEscalation};
use crate::moderation::{ban_forever, flood, is_privileged, kick_for, lift_restrictions, mute_until};
use crate::store::{settings, Database};
use crate::throttle::ThrottleRegistry;
use crate::utils;

/// Who may invoke a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Chat owner or administrator
    Admin,
    /// The configured bot owner, regardless of chat role
    BotOwner,
}

/// One entry of the command dispatch table.
pub struct CommandSpec {
    pub name: &'static str,
    pub privilege: Privilege,
    pub rate_per_sec: f64,
    pub throttle_key: &'static str,
}

/// Every `!`-prefixed command the bot understands.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "pin",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "pin",
    },
    CommandSpec {
        name: "ban",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "ban",
    },
    CommandSpec {
        name: "mute",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "mute",
    },
    CommandSpec {
        name: "unmute",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "unmute",
    },
    CommandSpec {
        name: "sd_ch",
        privilege: Privilege::BotOwner,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "sd_ch",
    },
    CommandSpec {
        name: "warn",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "warn",
    },
    CommandSpec {
        name: "acquit",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "acquit",
    },
    CommandSpec {
        name: "settings",
        privilege: Privilege::Admin,
        rate_per_sec: COMMAND_RATE,
        throttle_key: "settings",
    },
];

/// Look up the dispatch entry for a message text, if its first token is a
/// known `!`-command.
#[must_use]
pub fn match_command(text: &str) -> Option<&'static CommandSpec> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('!')?;
    COMMANDS.iter().find(|spec| spec.name == name)
}

fn reply_target(msg: &Message) -> Result<&Message, ModError> {
    msg.reply_to_message().ok_or(ModError::MissingReplyTarget)
}

fn sender_of(msg: &Message) -> Result<&User, ModError> {
    msg.from.as_ref().ok_or(ModError::MissingReplyTarget)
}

fn command_args(msg: &Message) -> Vec<&str> {
    msg.text()
        .map(|text| text.split_whitespace().skip(1).collect())
        .unwrap_or_default()
}

/// Witty refusal when a moderation command targets the bot itself.
async fn defend_bot(bot: &Bot, msg: &Message) -> Result<(), ModError> {
    let seed = u64::from(msg.id.0.cast_unsigned());
    bot.send_message(msg.chat.id, texts::bot_defense(seed)).await?;
    Ok(())
}

async fn authorized(
    bot: &Bot,
    msg: &Message,
    spec: &CommandSpec,
    app: &Settings,
) -> Result<bool, ModError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(false);
    };
    match spec.privilege {
        Privilege::Admin => is_privileged(bot, msg.chat.id, from.id).await,
        Privilege::BotOwner => Ok(app.owner_id == Some(from.id.0.cast_signed())),
    }
}

/// Run the policy chain and the matched command body for one message.
pub async fn dispatch_command(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    registry: &ThrottleRegistry,
    warn_engine: &WarnEscalation,
    app: &Settings,
    me: &Me,
) -> Result<(), ModError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(spec) = match_command(text) else {
        return Ok(());
    };
    if !flood::gate_message(bot, msg, registry, spec.throttle_key, spec.rate_per_sec).await? {
        return Ok(());
    }
    if !authorized(bot, msg, spec, app).await? {
        debug!(command = spec.name, "privilege check failed, ignoring");
        return Ok(());
    }

    let result = match spec.name {
        "pin" => pin(bot, msg).await,
        "ban" => ban(bot, msg, me).await,
        "mute" => mute(bot, msg, me).await,
        "unmute" => unmute(bot, msg, me).await,
        "sd_ch" => broadcast(bot, msg, app).await,
        "warn" => warn_user(bot, msg, warn_engine, me).await,
        "acquit" => acquit(bot, msg, warn_engine, me).await,
        "settings" => show_settings(bot, msg, db).await,
        _ => Ok(()),
    };
    match result {
        Err(err @ (ModError::MissingReplyTarget | ModError::InvalidDuration(_))) => {
            debug!(command = spec.name, "user input error: {err}");
            let delay = if matches!(spec.name, "ban" | "mute") {
                NOTICE_DELAY_LONG_SECS
            } else {
                NOTICE_DELAY_SHORT_SECS
            };
            utils::notify_temporary(bot, msg.chat.id, texts::syntax_error(spec.name), delay).await
        }
        other => other,
    }
}

async fn pin(bot: &Bot, msg: &Message) -> Result<(), ModError> {
    let reply = reply_target(msg)?;
    bot.pin_chat_message(msg.chat.id, reply.id)
        .disable_notification(true)
        .await?;
    Ok(())
}

/// What a `!ban` invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BanRequest {
    Timed { span: ParsedDuration, reason: String },
    Permanent { reason: String },
}

/// Classify `!ban` arguments: a valid duration plus a reason is a timed
/// ban, a non-numeric first token is a permanent ban with that text as
/// the reason. A digit-led token that fails duration parsing is a typoed
/// duration, not a reason, and a lone duration has no reason to show;
/// both are syntax errors rather than permanent bans.
fn parse_ban_args(args: &[&str]) -> Result<BanRequest, ModError> {
    let first = args
        .first()
        .copied()
        .ok_or_else(|| ModError::InvalidDuration(String::new()))?;
    match parse_duration(first) {
        Ok(span) if args.len() >= 2 => Ok(BanRequest::Timed {
            span,
            reason: args[1..].join(" "),
        }),
        Ok(_) => Err(ModError::InvalidDuration(first.to_string())),
        Err(err) if first.starts_with(|c: char| c.is_ascii_digit()) => Err(err),
        Err(_) => Ok(BanRequest::Permanent {
            reason: args.join(" "),
        }),
    }
}

/// `!ban <duration> <reason>` bans for the parsed span, `!ban <reason>`
/// bans forever.
async fn ban(bot: &Bot, msg: &Message, me: &Me) -> Result<(), ModError> {
    let target = sender_of(reply_target(msg)?)?;
    if target.id == me.id {
        return defend_bot(bot, msg).await;
    }
    let request = parse_ban_args(&command_args(msg))?;
    let user_id = target.id.0.cast_signed();
    let mention = texts::mention(user_id, &target.full_name());

    match request {
        BanRequest::Timed { span, reason } => {
            kick_for(bot, msg.chat.id, user_id, span.minutes).await?;
            let announce =
                texts::banned_timed(&mention, span.magnitude, span.unit_label, &reason);
            texts::send_html(bot, msg.chat.id, &announce).await?;
        }
        BanRequest::Permanent { reason } => {
            ban_forever(bot, msg.chat.id, user_id).await?;
            texts::send_html(bot, msg.chat.id, &texts::banned_forever(&mention, &reason)).await?;
        }
    }
    Ok(())
}

async fn mute(bot: &Bot, msg: &Message, me: &Me) -> Result<(), ModError> {
    let target = sender_of(reply_target(msg)?)?;
    if target.id == me.id {
        return defend_bot(bot, msg).await;
    }
    let args = command_args(msg);
    let token = args
        .first()
        .copied()
        .ok_or_else(|| ModError::InvalidDuration(String::new()))?;
    let span = parse_duration(token)?;
    let user_id = target.id.0.cast_signed();
    mute_until(bot, msg.chat.id, user_id, span.minutes).await?;
    let mention = texts::mention(user_id, &target.full_name());
    let announce = texts::muted(&mention, span.magnitude, span.unit_label);
    texts::send_html(bot, msg.chat.id, &announce).await?;
    Ok(())
}

async fn unmute(bot: &Bot, msg: &Message, me: &Me) -> Result<(), ModError> {
    let target = sender_of(reply_target(msg)?)?;
    if target.id == me.id {
        return defend_bot(bot, msg).await;
    }
    let user_id = target.id.0.cast_signed();
    lift_restrictions(bot, msg.chat.id, user_id).await?;
    let mention = texts::mention(user_id, &target.full_name());
    texts::send_html(bot, msg.chat.id, &texts::unmuted(&mention)).await?;
    Ok(())
}

/// Forward a message (replied-to text or the command arguments) to the
/// configured channel.
async fn broadcast(bot: &Bot, msg: &Message, app: &Settings) -> Result<(), ModError> {
    let Some(channel_id) = app.channel_id else {
        warn!("broadcast requested but no channel is configured");
        return Ok(());
    };
    let text = match msg.reply_to_message().and_then(Message::text) {
        Some(text) => text.to_string(),
        None => command_args(msg).join(" "),
    };
    if text.is_empty() {
        return Err(ModError::MissingReplyTarget);
    }
    bot.send_message(ChatId(channel_id), text).await?;
    texts::send_html(bot, msg.chat.id, texts::BROADCAST_OK).await?;
    Ok(())
}

async fn warn_user(
    bot: &Bot,
    msg: &Message,
    warn_engine: &WarnEscalation,
    me: &Me,
) -> Result<(), ModError> {
    let reply = reply_target(msg)?;
    let target = sender_of(reply)?;
    if target.id == me.id {
        return defend_bot(bot, msg).await;
    }
    if is_privileged(bot, msg.chat.id, target.id).await? {
        texts::send_html(bot, msg.chat.id, texts::WARN_ADMIN).await?;
        return Ok(());
    }
    if let Err(err) = bot.delete_message(msg.chat.id, reply.id).await {
        warn!("failed to delete warned message: {err}");
    }
    let user_id = target.id.0.cast_signed();
    let outcome = warn_engine.apply(msg.chat.id.0, user_id).await?;
    enforce(bot, msg.chat.id, user_id, &target.full_name(), outcome).await
}

async fn acquit(
    bot: &Bot,
    msg: &Message,
    warn_engine: &WarnEscalation,
    me: &Me,
) -> Result<(), ModError> {
    let target = sender_of(reply_target(msg)?)?;
    if target.id == me.id {
        return defend_bot(bot, msg).await;
    }
    let user_id = target.id.0.cast_signed();
    warn_engine.pardon(msg.chat.id.0, user_id).await?;
    let mention = texts::mention(user_id, &target.full_name());
    texts::send_html(bot, msg.chat.id, &texts::pardoned(&mention)).await?;
    Ok(())
}

/// Post the settings panel as a reply so the callback handler can verify
/// the invoker later.
async fn show_settings(bot: &Bot, msg: &Message, db: &Database) -> Result<(), ModError> {
    let chat_settings = settings::fetch_settings(db, msg.chat.id.0)
        .await?
        .ok_or(ModError::DataIntegrity(msg.chat.id.0))?;
    bot.send_message(msg.chat.id, texts::SETTINGS_TITLE)
        .reply_parameters(ReplyParameters::new(msg.id))
        .reply_markup(keyboards::settings_keyboard(&chat_settings))
        .await?;
    Ok(())
}

fn disabled_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Handle members joining the chat.
///
/// Overlong display names are removed on sight. The bot joining seeds the
/// settings row; anyone else gets the configured greeting, if enabled.
pub async fn handle_new_members(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    me: &Me,
) -> Result<(), ModError> {
    let Some(member) = msg.new_chat_members().and_then(<[User]>::first) else {
        return Ok(());
    };
    let name = member.full_name();
    if name.chars().count() > NAME_LENGTH_LIMIT {
        texts::send_html(bot, msg.chat.id, &texts::long_name(&name)).await?;
        ban_forever(bot, msg.chat.id, member.id.0.cast_signed()).await?;
        if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
            debug!("join message already gone: {err}");
        }
        return Ok(());
    }

    if member.id == me.id {
        bot.send_message(msg.chat.id, texts::ADMIN_REQUIRED).await?;
        settings::seed_chat(db, msg.chat.id.0).await?;
        return Ok(());
    }

    let Some(template) = settings::welcome_message(db, msg.chat.id.0).await? else {
        return Ok(());
    };
    let mention = texts::mention(member.id.0.cast_signed(), &name);
    let greeting =
        html_escape::encode_text(&template).replace("{name}", &mention);
    bot.send_message(msg.chat.id, greeting)
        .parse_mode(teloxide::types::ParseMode::Html)
        .link_preview_options(disabled_preview())
        .await?;
    Ok(())
}

/// Delete `/`-prefixed messages the bot does not handle.
pub async fn handle_unknown_command(
    bot: &Bot,
    msg: &Message,
    registry: &ThrottleRegistry,
) -> Result<(), ModError> {
    if !flood::gate_message(bot, msg, registry, COMMAND_FILTER_KEY, COMMAND_FILTER_RATE).await? {
        return Ok(());
    }
    if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
        debug!("unknown command already deleted: {err}");
    }
    Ok(())
}

fn is_cancel(text: Option<&str>) -> bool {
    matches!(
        text.map(str::trim),
        Some(t) if t.eq_ignore_ascii_case("cancel") || t.eq_ignore_ascii_case("/cancel")
    )
}

/// Route one message to the active configuration dialogue stage.
pub async fn handle_config_input(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    dialogues: &DialogueRegistry,
    registry: &ThrottleRegistry,
) -> Result<(), ModError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let (chat_id, user_id) = (msg.chat.id.0, from.id.0.cast_signed());
    let Some(stage) = dialogues.current(chat_id, user_id) else {
        return Ok(());
    };
    if !flood::gate_message(bot, msg, registry, DEFAULT_MESSAGE_KEY, DEFAULT_MESSAGE_RATE).await? {
        return Ok(());
    }
    if is_cancel(msg.text()) {
        dialogues.cancel(chat_id, user_id);
        bot.send_message(msg.chat.id, texts::CANCELLED)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    }
    match stage {
        ConfigStage::AwaitingWordList => capture_wordlist(bot, msg, db, dialogues).await,
        ConfigStage::AwaitingWelcome => capture_welcome(bot, msg, db, dialogues).await,
        ConfigStage::AwaitingDuration => capture_duration(bot, msg, db, dialogues).await,
    }
}

/// Capture the forbidden-word list attachment.
///
/// Non-document messages leave the stage active; a document always ends
/// the dialogue, successful or not.
async fn capture_wordlist(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    dialogues: &DialogueRegistry,
) -> Result<(), ModError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    dialogues.cancel(msg.chat.id.0, from.id.0.cast_signed());

    let accepted = doc.file.size <= WORDLIST_MAX_BYTES
        && doc.file_name.as_deref() == Some(WORDLIST_FILE_NAME);
    let stored = if accepted {
        store_wordlist(bot, msg, db, doc.file.id.clone()).await
    } else {
        debug!(
            size = doc.file.size,
            name = doc.file_name.as_deref().unwrap_or(""),
            "word list attachment rejected"
        );
        false
    };
    let reply = if stored {
        texts::WORDLIST_STORED
    } else {
        texts::CAPTURE_FAILED
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn store_wordlist(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    file_id: teloxide::types::FileId,
) -> bool {
    let bytes = match utils::download_document(bot, file_id).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("word list download failed: {err}");
            return false;
        }
    };
    let Ok(text) = String::from_utf8(bytes) else {
        warn!("word list attachment is not valid UTF-8");
        return false;
    };
    if let Err(err) = settings::update_forbidden_words(db, msg.chat.id.0, text.trim()).await {
        warn!("failed to store word list: {err}");
        return false;
    }
    true
}

async fn capture_welcome(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    dialogues: &DialogueRegistry,
) -> Result<(), ModError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    dialogues.cancel(msg.chat.id.0, from.id.0.cast_signed());
    settings::update_welcome_message(db, msg.chat.id.0, Some(text)).await?;
    bot.send_message(msg.chat.id, texts::WELCOME_STORED).await?;
    Ok(())
}

/// Capture a plain number of restriction minutes. Non-numeric input ends
/// the dialogue without changing the stored value.
async fn capture_duration(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    dialogues: &DialogueRegistry,
) -> Result<(), ModError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    dialogues.cancel(msg.chat.id.0, from.id.0.cast_signed());
    match text.trim().parse::<i64>() {
        Ok(minutes) if minutes > 0 => {
            settings::update_restriction_minutes(db, msg.chat.id.0, minutes).await?;
            bot.send_message(msg.chat.id, texts::DURATION_STORED).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, texts::DURATION_INVALID).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_command_known() {
        let spec = match_command("!ban 2d spam").expect("should match");
        assert_eq!(spec.name, "ban");
        assert_eq!(spec.privilege, Privilege::Admin);
    }

    #[test]
    fn test_match_command_exact_token_only() {
        assert!(match_command("!banana").is_none());
        assert!(match_command("ban").is_none());
        assert!(match_command("/ban").is_none());
        assert!(match_command("").is_none());
    }

    #[test]
    fn test_match_command_broadcast_is_owner_gated() {
        let spec = match_command("!sd_ch hello").expect("should match");
        assert_eq!(spec.privilege, Privilege::BotOwner);
    }

    #[test]
    fn test_ban_args_timed_with_reason() {
        let request = parse_ban_args(&["2d", "spam", "flood"]).expect("should parse");
        let BanRequest::Timed { span, reason } = request else {
            panic!("expected a timed ban");
        };
        assert_eq!(span.minutes, 2880);
        assert_eq!(reason, "spam flood");
    }

    #[test]
    fn test_ban_args_permanent_with_reason() {
        assert_eq!(
            parse_ban_args(&["spam", "everywhere"]).expect("should parse"),
            BanRequest::Permanent {
                reason: "spam everywhere".to_string()
            }
        );
    }

    #[test]
    fn test_ban_args_lone_duration_is_rejected() {
        assert!(matches!(
            parse_ban_args(&["2d"]),
            Err(ModError::InvalidDuration(_))
        ));
    }

    // A typoed duration must never fall through to a permanent ban
    #[test]
    fn test_ban_args_digit_led_typo_is_rejected() {
        for args in [
            &["2x", "spam"][..],
            &["2", "days", "flooding"][..],
            &["24", "spam"][..],
            &["45"][..],
        ] {
            assert!(
                matches!(parse_ban_args(args), Err(ModError::InvalidDuration(_))),
                "args {args:?}"
            );
        }
    }

    #[test]
    fn test_ban_args_empty_is_rejected() {
        assert!(matches!(
            parse_ban_args(&[]),
            Err(ModError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_is_cancel() {
        assert!(is_cancel(Some("cancel")));
        assert!(is_cancel(Some("CANCEL")));
        assert!(is_cancel(Some("/cancel")));
        assert!(is_cancel(Some("  cancel  ")));
        assert!(!is_cancel(Some("please cancel")));
        assert!(!is_cancel(None));
    }
}
