//! End-to-end pipeline tests over mock transport, store, and AI backend.

use async_trait::async_trait;
use courier_bot::ai::{AiBackend, AiError, AiReply};
use courier_bot::commands::{
    handlers::CommandHandler, CommandDispatcher, CommandName, COMMAND_FAILURE_REPLY,
    DISABLED_COMMAND_REPLY, NOT_IMPLEMENTED_REPLY, UNKNOWN_COMMAND_REPLY,
};
use courier_bot::media::extractor::ExtractorClient;
use courier_bot::media::{MediaOrchestrator, MediaOutcome, MEDIA_FAILURE_REPLY};
use courier_bot::pipeline::{MessagePipeline, FAREWELL_REPLY};
use courier_bot::queue::{MessagePump, MessageQueue};
use courier_bot::session::{SessionStore, Turn};
use courier_bot::store::{CommandStore, MemoryStore};
use courier_bot::transport::{Chat, InboundMessage, MediaPayload, TransportError};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockChat {
    typing: AtomicU32,
    recording: AtomicU32,
    cleared: AtomicU32,
    sent: Mutex<Vec<String>>,
}

impl MockChat {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl Chat for MockChat {
    async fn set_typing(&self) -> Result<(), TransportError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn set_recording(&self) -> Result<(), TransportError> {
        self.recording.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn clear_state(&self) -> Result<(), TransportError> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.sent.lock().expect("sent lock").push(text.to_owned());
        Ok(())
    }
}

struct MockMessage {
    body: String,
    sender: String,
    quoted: bool,
    chat: Arc<MockChat>,
    replies: Mutex<Vec<String>>,
    media: Mutex<Vec<MediaPayload>>,
    media_delay: Duration,
}

impl MockMessage {
    fn new(body: &str) -> Self {
        Self {
            body: body.to_owned(),
            sender: "user-1".to_owned(),
            quoted: false,
            chat: Arc::new(MockChat::default()),
            replies: Mutex::new(Vec::new()),
            media: Mutex::new(Vec::new()),
            media_delay: Duration::ZERO,
        }
    }

    fn with_media_delay(mut self, delay: Duration) -> Self {
        self.media_delay = delay;
        self
    }

    fn replies(&self) -> Vec<String> {
        self.replies.lock().expect("replies lock").clone()
    }

    fn media_count(&self) -> usize {
        self.media.lock().expect("media lock").len()
    }
}

#[async_trait]
impl InboundMessage for MockMessage {
    fn body(&self) -> &str {
        &self.body
    }
    fn sender_id(&self) -> &str {
        &self.sender
    }
    fn has_quoted_message(&self) -> bool {
        self.quoted
    }
    fn chat(&self) -> Arc<dyn Chat> {
        Arc::clone(&self.chat) as Arc<dyn Chat>
    }
    async fn reply_text(&self, text: &str) -> Result<(), TransportError> {
        self.replies.lock().expect("replies lock").push(text.to_owned());
        Ok(())
    }
    async fn reply_media(
        &self,
        payload: &MediaPayload,
        _as_voice: bool,
    ) -> Result<(), TransportError> {
        if !self.media_delay.is_zero() {
            tokio::time::sleep(self.media_delay).await;
        }
        self.media.lock().expect("media lock").push(payload.clone());
        Ok(())
    }
}

struct MockAi {
    reply: AiReply,
}

impl MockAi {
    fn with_text(text: &str) -> Arc<dyn AiBackend> {
        Arc::new(Self {
            reply: AiReply {
                text: text.to_owned(),
                command: None,
                terminate: false,
            },
        })
    }

    fn terminating() -> Arc<dyn AiBackend> {
        Arc::new(Self {
            reply: AiReply {
                text: "bye".to_owned(),
                command: None,
                terminate: true,
            },
        })
    }
}

#[async_trait]
impl AiBackend for MockAi {
    async fn generate(&self, _user_text: &str, _history: &[Turn]) -> Result<AiReply, AiError> {
        Ok(self.reply.clone())
    }
}

fn sessions() -> SessionStore {
    SessionStore::new(Duration::from_secs(60), 100, 10)
}

fn fast_orchestrator(extractor_url: &str) -> MediaOrchestrator {
    MediaOrchestrator::new(ExtractorClient::new(extractor_url))
        .with_retry_tuning(1, Duration::from_millis(10))
        .with_processing_timeout(Duration::from_secs(2))
}

fn build_pipeline(
    store: Arc<dyn CommandStore>,
    ai: Arc<dyn AiBackend>,
    extractor_url: &str,
) -> MessagePipeline {
    let dispatcher = CommandDispatcher::new(Arc::clone(&store));
    MessagePipeline::new(
        dispatcher,
        fast_orchestrator(extractor_url),
        ai,
        store,
        sessions(),
    )
}

fn build_pipeline_with_dispatcher(
    dispatcher: CommandDispatcher,
    store: Arc<dyn CommandStore>,
) -> MessagePipeline {
    MessagePipeline::new(
        dispatcher,
        fast_orchestrator("http://127.0.0.1:1"),
        MockAi::with_text("unused"),
        store,
        sessions(),
    )
}

async fn usage_count(store: &Arc<dyn CommandStore>, name: &str) -> u64 {
    store
        .find_command(name)
        .await
        .expect("store lookup")
        .map_or(0, |record| record.usage_count)
}

#[tokio::test]
async fn help_command_sets_typing_runs_handler_and_records_usage() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("unused"),
        "http://127.0.0.1:1",
    );

    let message = Arc::new(MockMessage::new("!help"));
    let dyn_message: Arc<dyn InboundMessage> = Arc::clone(&message) as Arc<dyn InboundMessage>;
    pipeline.process(dyn_message).await;

    let replies = message.replies();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("Available commands:"));
    assert!(replies[0].contains("!help"));

    assert_eq!(message.chat.typing.load(Ordering::SeqCst), 1);
    assert_eq!(message.chat.recording.load(Ordering::SeqCst), 0);
    assert!(message.chat.cleared.load(Ordering::SeqCst) >= 1);

    assert_eq!(usage_count(&store, "help").await, 1);
    let record = store
        .find_command("help")
        .await
        .expect("lookup")
        .expect("help exists");
    assert!(record.last_used.is_some());
}

#[tokio::test]
async fn disabled_command_never_reaches_its_handler() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    store
        .set_command_enabled("help", false)
        .await
        .expect("toggle");
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("unused"),
        "http://127.0.0.1:1",
    );

    let message = Arc::new(MockMessage::new("!help"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.replies(), vec![DISABLED_COMMAND_REPLY.to_owned()]);
    assert_eq!(usage_count(&store, "help").await, 0);
    // The gate fires before the presence decision.
    assert_eq!(message.chat.typing.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_command_replies_without_touching_counters() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("unused"),
        "http://127.0.0.1:1",
    );

    let message = Arc::new(MockMessage::new("!frobnicate now"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.replies(), vec![UNKNOWN_COMMAND_REPLY.to_owned()]);
    for name in ["help", "toggleai", "togglecmd", "logs"] {
        assert_eq!(usage_count(&store, name).await, 0);
    }
}

#[tokio::test]
async fn known_command_without_handler_reports_not_implemented() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("unused"),
        "http://127.0.0.1:1",
    );

    let message = Arc::new(MockMessage::new("!logs"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.replies(), vec![NOT_IMPLEMENTED_REPLY.to_owned()]);
    // Presence was shown (logs always responds) but usage never recorded.
    assert_eq!(message.chat.typing.load(Ordering::SeqCst), 1);
    assert_eq!(usage_count(&store, "logs").await, 0);
}

#[tokio::test]
async fn recording_indicator_for_audio_commands() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("unused"),
        "http://127.0.0.1:1",
    );

    let mut raw = MockMessage::new("!speak");
    raw.quoted = true;
    let message = Arc::new(raw);
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.chat.recording.load(Ordering::SeqCst), 1);
    assert_eq!(message.chat.typing.load(Ordering::SeqCst), 0);
    assert_eq!(message.replies(), vec![NOT_IMPLEMENTED_REPLY.to_owned()]);
}

struct FailingHandler;

#[async_trait]
impl CommandHandler for FailingHandler {
    async fn execute(&self, _message: &dyn InboundMessage, _args: &[&str]) -> anyhow::Result<()> {
        anyhow::bail!("handler blew up")
    }
}

#[tokio::test]
async fn handler_failure_replies_generically_and_skips_usage() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let mut dispatcher = CommandDispatcher::new(Arc::clone(&store));
    dispatcher.register(CommandName::Logs, Arc::new(FailingHandler));
    let pipeline = build_pipeline_with_dispatcher(dispatcher, Arc::clone(&store));

    let message = Arc::new(MockMessage::new("!logs"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.replies(), vec![COMMAND_FAILURE_REPLY.to_owned()]);
    assert_eq!(usage_count(&store, "logs").await, 0);
    assert!(message.chat.cleared.load(Ordering::SeqCst) >= 1);
}

struct RecordingHandler {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn execute(&self, _message: &dyn InboundMessage, args: &[&str]) -> anyhow::Result<()> {
        let tag = args.first().copied().unwrap_or("").to_owned();
        self.log.lock().expect("log lock").push(tag.clone());
        if tag == "boom" {
            anyhow::bail!("asked to fail");
        }
        Ok(())
    }
}

#[tokio::test]
async fn queue_drains_in_arrival_order_and_survives_failures() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut dispatcher = CommandDispatcher::new(Arc::clone(&store));
    dispatcher.register(
        CommandName::Logs,
        Arc::new(RecordingHandler {
            log: Arc::clone(&log),
        }),
    );
    let pipeline = Arc::new(build_pipeline_with_dispatcher(dispatcher, Arc::clone(&store)));

    let queue = Arc::new(MessageQueue::new());
    let first = Arc::new(MockMessage::new("!logs alpha"));
    let second = Arc::new(MockMessage::new("!logs boom"));
    let third = Arc::new(MockMessage::new("!logs gamma"));
    queue.enqueue(Arc::clone(&first) as Arc<dyn InboundMessage>);
    queue.enqueue(Arc::clone(&second) as Arc<dyn InboundMessage>);
    queue.enqueue(Arc::clone(&third) as Arc<dyn InboundMessage>);
    queue.enqueue(Arc::new(MockMessage::new("")) as Arc<dyn InboundMessage>);
    assert_eq!(queue.len(), 3);

    let pump = MessagePump::new(Arc::clone(&queue), pipeline, Duration::from_millis(5));
    pump.drain().await;

    assert!(queue.is_empty());
    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["alpha".to_owned(), "boom".to_owned(), "gamma".to_owned()]
    );
    // The failing middle message got the generic failure reply; its
    // neighbors completed normally.
    assert_eq!(second.replies(), vec![COMMAND_FAILURE_REPLY.to_owned()]);
    assert!(first.replies().is_empty());
    assert!(third.replies().is_empty());
    assert_eq!(usage_count(&store, "logs").await, 2);
}

#[tokio::test]
async fn ai_turn_replies_under_typing_indicator() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    store.set_ai_enabled(true).await.expect("enable ai");
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("hey there"),
        "http://127.0.0.1:1",
    );

    let message = Arc::new(MockMessage::new("hello bot"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.chat.sent(), vec!["hey there".to_owned()]);
    assert!(message.chat.typing.load(Ordering::SeqCst) >= 1);
    assert!(message.chat.cleared.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn ai_terminate_sends_farewell() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    store.set_ai_enabled(true).await.expect("enable ai");
    let pipeline = build_pipeline(Arc::clone(&store), MockAi::terminating(), "http://127.0.0.1:1");

    let message = Arc::new(MockMessage::new("ok thanks bye"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert_eq!(message.chat.sent(), vec![FAREWELL_REPLY.to_owned()]);
}

#[tokio::test]
async fn free_text_stays_silent_when_ai_is_off() {
    let store: Arc<dyn CommandStore> = Arc::new(MemoryStore::with_default_commands());
    let pipeline = build_pipeline(
        Arc::clone(&store),
        MockAi::with_text("never sent"),
        "http://127.0.0.1:1",
    );

    let message = Arc::new(MockMessage::new("hello bot"));
    pipeline
        .process(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert!(message.chat.sent().is_empty());
    assert!(message.replies().is_empty());
}

#[tokio::test]
async fn picker_downloads_only_photo_items() {
    let mut server = mockito::Server::new_async().await;
    let _p1 = server
        .mock("GET", "/p1.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(vec![1u8, 2, 3])
        .create_async()
        .await;
    let _p2 = server
        .mock("GET", "/p2.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(vec![4u8, 5, 6])
        .create_async()
        .await;
    let picker = json!({
        "status": "picker",
        "picker": [
            { "type": "photo", "url": format!("{}/p1.jpg", server.url()) },
            { "type": "photo", "url": format!("{}/p2.jpg", server.url()) },
            { "type": "video", "url": format!("{}/v.mp4", server.url()) },
        ],
    })
    .to_string();
    let _extract = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(picker)
        .create_async()
        .await;

    let orchestrator = fast_orchestrator(&server.url());
    let message = Arc::new(MockMessage::new(
        "look https://www.instagram.com/p/abc123/",
    ));
    let outcome = orchestrator
        .handle(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert!(matches!(outcome, MediaOutcome::Delivered { .. }));
    assert_eq!(message.media_count(), 2);
    assert!(message.replies().is_empty());
    assert_eq!(message.chat.typing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn partial_download_failure_still_counts_as_success() {
    let mut server = mockito::Server::new_async().await;
    let _ok = server
        .mock("GET", "/ok.jpg")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(vec![1u8])
        .create_async()
        .await;
    let _gone = server.mock("GET", "/gone.jpg").with_status(404).create_async().await;
    let picker = json!({
        "status": "picker",
        "picker": [
            { "type": "photo", "url": format!("{}/ok.jpg", server.url()) },
            { "type": "photo", "url": format!("{}/gone.jpg", server.url()) },
        ],
    })
    .to_string();
    let _extract = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(picker)
        .create_async()
        .await;

    let orchestrator = fast_orchestrator(&server.url());
    let message = Arc::new(MockMessage::new(
        "look https://www.instagram.com/p/abc123/",
    ));
    let outcome = orchestrator
        .handle(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert!(matches!(outcome, MediaOutcome::Delivered { .. }));
    assert_eq!(message.media_count(), 1);
}

#[tokio::test]
async fn extraction_failure_sends_one_notice() {
    let mut server = mockito::Server::new_async().await;
    let _extract = server.mock("POST", "/").with_status(400).create_async().await;

    let orchestrator = fast_orchestrator(&server.url());
    let message = Arc::new(MockMessage::new(
        "https://www.tiktok.com/@user/video/123",
    ));
    let outcome = orchestrator
        .handle(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert!(matches!(outcome, MediaOutcome::Failed { .. }));
    assert_eq!(message.replies(), vec![MEDIA_FAILURE_REPLY.to_owned()]);
    assert_eq!(message.media_count(), 0);
}

#[tokio::test]
async fn timeout_produces_failed_outcome_without_throwing() {
    let mut server = mockito::Server::new_async().await;
    let _clip = server
        .mock("GET", "/clip.mp4")
        .with_status(200)
        .with_header("content-type", "video/mp4")
        .with_body(vec![0u8; 8])
        .create_async()
        .await;
    let _extract = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "url": format!("{}/clip.mp4", server.url()) }).to_string())
        .create_async()
        .await;

    // Delivery takes far longer than the 150ms overall deadline.
    let orchestrator = fast_orchestrator(&server.url())
        .with_processing_timeout(Duration::from_millis(100));
    let message = Arc::new(
        MockMessage::new("https://www.tiktok.com/@user/video/123")
            .with_media_delay(Duration::from_millis(500)),
    );
    let outcome = orchestrator
        .handle(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;

    assert!(matches!(outcome, MediaOutcome::Failed { .. }));
    assert_eq!(message.replies(), vec![MEDIA_FAILURE_REPLY.to_owned()]);
}

#[tokio::test]
async fn plain_text_is_not_media() {
    let orchestrator = fast_orchestrator("http://127.0.0.1:1");
    let message = Arc::new(MockMessage::new("no links here"));
    let outcome = orchestrator
        .handle(Arc::clone(&message) as Arc<dyn InboundMessage>)
        .await;
    assert_eq!(outcome, MediaOutcome::NotDetected);
    assert!(message.replies().is_empty());
}
