use courier_bot::ai::{AiBackend, GeminiClient};
use courier_bot::commands::CommandDispatcher;
use courier_bot::config::{self, Settings};
use courier_bot::media::extractor::ExtractorClient;
use courier_bot::media::MediaOrchestrator;
use courier_bot::pipeline::MessagePipeline;
use courier_bot::queue::{MessagePump, MessageQueue};
use courier_bot::session::SessionStore;
use courier_bot::store::{CommandStore, MemoryStore};
use courier_bot::transport::telegram::TelegramMessage;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting courier bot...");

    let settings = init_settings();

    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let ai: Arc<dyn AiBackend> = Arc::new(GeminiClient::new(&settings));
    let sessions = SessionStore::new(
        config::SESSION_TTL,
        config::SESSION_MAX_ENTRIES,
        config::HISTORY_MAX_TURNS,
    );
    let dispatcher = CommandDispatcher::new(Arc::clone(&store));
    let media = MediaOrchestrator::new(ExtractorClient::new(settings.extractor_url.clone()));
    let pipeline = Arc::new(MessagePipeline::new(
        dispatcher, media, ai, store, sessions,
    ));

    let queue = Arc::new(MessageQueue::new());
    let pump = MessagePump::new(
        Arc::clone(&queue),
        pipeline,
        config::QUEUE_DRAIN_INTERVAL,
    );
    let shutdown = CancellationToken::new();
    let pump_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { pump.run(shutdown).await })
    };

    let bot = Bot::new(settings.telegram_token.clone());
    let handler = Update::filter_message().endpoint(on_message);

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![Arc::clone(&queue)])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Err(err) = pump_task.await {
        error!(error = %err, "message pump task ended abnormally");
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(settings) => {
            info!("Configuration loaded successfully.");
            settings
        }
        Err(err) => {
            error!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    }
}

async fn on_message(
    bot: Bot,
    msg: Message,
    queue: Arc<MessageQueue>,
) -> Result<(), teloxide::RequestError> {
    queue.enqueue(Arc::new(TelegramMessage::new(bot, msg)));
    respond(())
}
