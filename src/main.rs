use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chat_warden::bot::{callbacks, handlers};
use chat_warden::config::{
    Settings, DEFAULT_MESSAGE_KEY, DEFAULT_MESSAGE_RATE, DIALOGUE_TIMEOUT_SECS,
    THROTTLE_IDLE_EVICT_SECS, THROTTLE_SWEEP_SECS,
};
use chat_warden::dialogue::DialogueRegistry;
use chat_warden::moderation::warn::WarnEscalation;
use chat_warden::moderation::{flood, word_filter};
use chat_warden::store::Database;
use chat_warden::throttle::ThrottleRegistry;
use dotenvy::dotenv;
use regex::Regex;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::Me;
use tracing::{debug, error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting chat-warden...");

    let settings = init_settings();

    let db = init_database(&settings).await;

    let bot = Bot::new(settings.telegram_token.clone());

    let registry = Arc::new(ThrottleRegistry::new());
    let dialogues = Arc::new(DialogueRegistry::new(Duration::from_secs(
        DIALOGUE_TIMEOUT_SECS,
    )));
    let warn_engine = Arc::new(WarnEscalation::new(Arc::new(db.clone())));

    spawn_throttle_sweeper(registry.clone());

    let handler = schema();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![db, registry, dialogues, warn_engine, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_database(settings: &Settings) -> Database {
    match Database::connect(&settings.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    }
}

/// Periodically drop throttle keys that went idle, so the registry does
/// not grow with every user the bot ever saw.
fn spawn_throttle_sweeper(registry: Arc<ThrottleRegistry>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(THROTTLE_SWEEP_SECS));
        loop {
            tick.tick().await;
            let evicted = registry.evict_idle(Duration::from_secs(THROTTLE_IDLE_EVICT_SECS));
            if evicted > 0 {
                debug!(
                    "evicted {evicted} idle throttle keys, {} remain",
                    registry.key_count()
                );
            }
        }
    });
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(callback_endpoint))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::filter(|msg: Message| msg.new_chat_members().is_some())
                        .endpoint(welcome_endpoint),
                )
                .branch(
                    // An active configuration dialogue captures the next
                    // message from its (chat, user) pair
                    dptree::filter(|msg: Message, dialogues: Arc<DialogueRegistry>| {
                        msg.from.as_ref().is_some_and(|from| {
                            dialogues
                                .current(msg.chat.id.0, from.id.0.cast_signed())
                                .is_some()
                        })
                    })
                    .endpoint(config_input_endpoint),
                )
                .branch(
                    dptree::filter(|msg: Message| {
                        msg.text().is_some_and(|t| handlers::match_command(t).is_some())
                    })
                    .endpoint(command_endpoint),
                )
                .branch(
                    dptree::filter(|msg: Message| {
                        msg.text().is_some_and(|t| t.starts_with('/'))
                    })
                    .endpoint(unknown_command_endpoint),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some())
                        .endpoint(plain_text_endpoint),
                ),
        )
}

async fn callback_endpoint(
    bot: Bot,
    q: CallbackQuery,
    db: Database,
    registry: Arc<ThrottleRegistry>,
    dialogues: Arc<DialogueRegistry>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = callbacks::handle_callback(&bot, &q, &db, &registry, &dialogues).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}

async fn welcome_endpoint(
    bot: Bot,
    msg: Message,
    db: Database,
    me: Me,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_new_members(&bot, &msg, &db, &me).await {
        error!("Welcome handler error: {}", e);
    }
    respond(())
}

async fn config_input_endpoint(
    bot: Bot,
    msg: Message,
    db: Database,
    dialogues: Arc<DialogueRegistry>,
    registry: Arc<ThrottleRegistry>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_config_input(&bot, &msg, &db, &dialogues, &registry).await {
        error!("Config dialogue handler error: {}", e);
    }
    respond(())
}

async fn command_endpoint(
    bot: Bot,
    msg: Message,
    db: Database,
    registry: Arc<ThrottleRegistry>,
    warn_engine: Arc<WarnEscalation>,
    settings: Arc<Settings>,
    me: Me,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) =
        handlers::dispatch_command(&bot, &msg, &db, &registry, &warn_engine, &settings, &me).await
    {
        error!("Command handler error: {}", e);
    }
    respond(())
}

async fn unknown_command_endpoint(
    bot: Bot,
    msg: Message,
    registry: Arc<ThrottleRegistry>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_unknown_command(&bot, &msg, &registry).await {
        error!("Command filter error: {}", e);
    }
    respond(())
}

async fn plain_text_endpoint(
    bot: Bot,
    msg: Message,
    db: Database,
    registry: Arc<ThrottleRegistry>,
    warn_engine: Arc<WarnEscalation>,
) -> Result<(), teloxide::RequestError> {
    let screened = async {
        if !flood::gate_message(&bot, &msg, &registry, DEFAULT_MESSAGE_KEY, DEFAULT_MESSAGE_RATE)
            .await?
        {
            return Ok(());
        }
        word_filter::screen_message(&bot, &msg, &db, &warn_engine).await
    }
    .await;
    if let Err(e) = screened {
        error!("Word filter error: {}", e);
    }
    respond(())
}
