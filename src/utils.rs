//! Small helpers shared across handlers: delayed cleanup of notice
//! messages and resilient attachment downloads.

use std::time::Duration;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId, ParseMode};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, warn};

use crate::error::ModError;

/// Delete `message_id` after `delay`, best effort.
///
/// The deletion runs on a detached task so the caller never waits on it;
/// a failure (message already gone, missing rights) is logged and dropped.
pub fn delete_later(bot: Bot, chat_id: ChatId, message_id: MessageId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(err) = bot.delete_message(chat_id, message_id).await {
            debug!("delayed deletion skipped: {err}");
        }
    });
}

/// Post a notice that removes itself after `delay_secs` seconds.
pub async fn notify_temporary(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    delay_secs: u64,
) -> Result<(), ModError> {
    let sent = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    delete_later(bot.clone(), chat_id, sent.id, Duration::from_secs(delay_secs));
    Ok(())
}

/// Download a document attachment into memory, retrying transient failures.
///
/// The retry strategy uses exponential backoff with jitter:
/// initial delay 500ms, capped at 4s, at most 3 attempts.
pub async fn download_document(bot: &Bot, file_id: FileId) -> Result<Vec<u8>, ModError> {
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, || async {
        let file = bot.get_file(file_id.clone()).await?;
        let mut buffer: Vec<u8> = Vec::new();
        bot.download_file(&file.path, &mut buffer).await?;
        Ok::<_, ModError>(buffer)
    })
    .await
    .map_err(|err| {
        warn!(
            "attachment download failed after {} attempts: {err}",
            TELEGRAM_API_MAX_RETRIES
        );
        err
    })
}
