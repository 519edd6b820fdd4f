//! Mock implementations for testing
//!
//! These mocks enable integration testing of whole turns without a real
//! channel, classifier or state backend.

use super::traits::MessageSink;
use super::*;
use crate::bot_data::{BotStateStore, InMemoryStateStore, StateKey, StoredBlob};
use crate::config::BotConfig;
use crate::dialog::{Dialog, DialogContext, DialogType, PromptNumber, PromptOptions, PromptString};
use crate::fiber::{Fault, FaultKind, Item, Outcome};
use crate::luis::{IntentRecommendation, LoggingLuisService, LuisError, LuisErrorKind, LuisResult, LuisService};
use crate::message::ActivityType;
use crate::scorable::{ActivityTypeScorable, CancelScorable, Dispatcher, LuisScorable, ScorableError};
use crate::serialization::{DialogRegistry, SerializationError, DIALOG_STATE_KEY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Message Sink
// ============================================================================

/// Sink that records every delivered message
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<Message>>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: &Message) -> Result<(), String> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ============================================================================
// Mock LUIS Service
// ============================================================================

/// Classifier that answers every query with the same intents
pub struct MockLuisService {
    model_id: String,
    intents: Vec<IntentRecommendation>,
    failure: Option<LuisErrorKind>,
    pub queries: Mutex<Vec<String>>,
}

impl MockLuisService {
    pub fn new(model_id: impl Into<String>, intents: &[(&str, f64)]) -> Self {
        Self {
            model_id: model_id.into(),
            intents: intents
                .iter()
                .map(|(name, score)| IntentRecommendation::new(*name, *score))
                .collect(),
            failure: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A classifier whose every query fails with `kind`
    pub fn failing(model_id: impl Into<String>, kind: LuisErrorKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::new(model_id, &[])
        }
    }
}

#[async_trait]
impl LuisService for MockLuisService {
    async fn query(&self, text: &str) -> Result<LuisResult, LuisError> {
        self.queries.lock().unwrap().push(text.to_string());
        if let Some(kind) = self.failure {
            return Err(LuisError::new(kind, "mock classifier failure"));
        }
        Ok(LuisResult {
            query: text.to_string(),
            intents: self.intents.clone(),
            entities: Vec::new(),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock State Store
// ============================================================================

/// In-memory store that yields before every operation, so concurrent turns
/// interleave at each store access
#[derive(Default)]
pub struct YieldingStore {
    inner: InMemoryStateStore,
}

#[async_trait]
impl BotStateStore for YieldingStore {
    async fn load(&self, key: &StateKey) -> Result<Option<StoredBlob>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.load(key).await
    }

    async fn save(&self, key: &StateKey, data: &[u8], etag: Option<&str>) -> Result<String, StoreError> {
        tokio::task::yield_now().await;
        self.inner.save(key, data, etag).await
    }
}

// ============================================================================
// Test dialogs
// ============================================================================

/// Prompts for words and posts every three joined
#[derive(Debug, Default, Serialize, Deserialize)]
struct JoinWords {
    words: Vec<String>,
}

impl DialogType for JoinWords {
    const TYPE_NAME: &'static str = "test.join_words";
}

impl Dialog for JoinWords {
    fn start(&mut self, ctx: &mut DialogContext<'_, '_>, _args: Item) -> Result<(), Fault> {
        ctx.call(PromptString::new(PromptOptions::new("Word?")), "word");
        Ok(())
    }

    fn resume(&mut self, ctx: &mut DialogContext<'_, '_>, rest: &str, outcome: Outcome) -> Result<(), Fault> {
        if rest != "word" {
            return Err(crate::dialog::unknown_continuation(self, rest));
        }
        self.words.push(outcome?.get()?);
        if self.words.len() == 3 {
            ctx.post(self.words.join(" "));
            self.words.clear();
        }
        ctx.call(PromptString::new(PromptOptions::new("Word?")), "word");
        Ok(())
    }

    fn continuations(&self) -> &'static [&'static str] {
        &["word"]
    }
}

/// Asks for a number and reports the result or the fault
#[derive(Debug, Default, Serialize, Deserialize)]
struct AskNumber;

impl DialogType for AskNumber {
    const TYPE_NAME: &'static str = "test.ask_number";
}

impl Dialog for AskNumber {
    fn start(&mut self, ctx: &mut DialogContext<'_, '_>, _args: Item) -> Result<(), Fault> {
        let options = PromptOptions::new("Number?").with_attempts(2);
        ctx.call(PromptNumber::new(options), "number");
        Ok(())
    }

    fn resume(&mut self, ctx: &mut DialogContext<'_, '_>, rest: &str, outcome: Outcome) -> Result<(), Fault> {
        match (rest, outcome) {
            ("number", Ok(item)) => {
                let n: i64 = item.get()?;
                ctx.post(format!("got {n}"));
            }
            ("number", Err(fault)) => ctx.post(format!("failed: {:?}", fault.kind)),
            (other, _) => return Err(crate::dialog::unknown_continuation(self, other)),
        }
        ctx.wait("restart");
        Ok(())
    }

    fn continuations(&self) -> &'static [&'static str] {
        &["number", "restart"]
    }
}

/// Echoes messages; "boom" raises a fault
#[derive(Debug, Default, Serialize, Deserialize)]
struct Echo;

impl DialogType for Echo {
    const TYPE_NAME: &'static str = "test.echo";
}

impl Dialog for Echo {
    fn start(&mut self, ctx: &mut DialogContext<'_, '_>, _args: Item) -> Result<(), Fault> {
        ctx.wait("message_received");
        Ok(())
    }

    fn resume(&mut self, ctx: &mut DialogContext<'_, '_>, rest: &str, outcome: Outcome) -> Result<(), Fault> {
        if rest != "message_received" {
            return Err(crate::dialog::unknown_continuation(self, rest));
        }
        let message: Message = outcome?.get()?;
        if message.text == "boom" {
            ctx.post("about to fail");
            return Err(Fault::dialog("boom"));
        }
        ctx.post(format!("echo: {}", message.text));
        ctx.wait("message_received");
        Ok(())
    }

    fn continuations(&self) -> &'static [&'static str] {
        &["message_received"]
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn message(text: &str) -> Message {
    Message::user("console", "conv", "user", "bot", text)
}

fn registry() -> DialogRegistry {
    DialogRegistry::new()
        .with::<JoinWords>()
        .with::<AskNumber>()
        .with::<Echo>()
}

fn runtime<D>(root: fn() -> D) -> BotRuntime<Arc<InMemoryStateStore>, Arc<RecordingSink>>
where
    D: Dialog + 'static,
{
    runtime_with(
        BotConfig::default(),
        Arc::new(InMemoryStateStore::new()),
        root,
    )
}

fn runtime_with<D, S>(config: BotConfig, store: S, root: fn() -> D) -> BotRuntime<S, Arc<RecordingSink>>
where
    D: Dialog + 'static,
    S: BotStateStore + 'static,
{
    BotRuntime::new(
        config,
        registry(),
        store,
        Arc::new(RecordingSink::default()),
        move || Box::new(root()),
    )
}

fn texts(outcome: &TurnOutcome) -> Vec<&str> {
    outcome.messages.iter().map(|m| m.text.as_str()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_prompt_chain_across_stateless_turns() {
    let rt = runtime(JoinWords::default);

    let first = rt.handle(message("hello")).await.unwrap();
    assert_eq!(texts(&first), vec!["Word?", "Word?"]);
    assert_eq!(first.need, Need::Wait);

    let second = rt.handle(message("world")).await.unwrap();
    assert_eq!(texts(&second), vec!["Word?"]);

    let third = rt.handle(message("!")).await.unwrap();
    assert_eq!(texts(&third), vec!["hello world !", "Word?"]);
}

#[tokio::test]
async fn test_prompt_attempts_exhausted_faults_to_parent() {
    let rt = runtime(|| AskNumber);

    let first = rt.handle(message("abc")).await.unwrap();
    assert_eq!(texts(&first), vec!["Number?", "Number?"]);

    let second = rt.handle(message("xyz")).await.unwrap();
    assert_eq!(
        texts(&second),
        vec!["You have tried too many times.", "failed: TooManyAttempts"]
    );
    assert_eq!(second.need, Need::Wait);
}

#[tokio::test]
async fn test_prompt_number_success() {
    let rt = runtime(|| AskNumber);
    rt.handle(message("abc")).await.unwrap();
    let second = rt.handle(message("42")).await.unwrap();
    assert_eq!(texts(&second), vec!["got 42"]);
}

#[tokio::test]
async fn test_unhandled_fault_resets_and_sends_fault_reply() {
    let config = BotConfig {
        fault_reply: Some("Sorry, something went wrong.".to_string()),
        ..BotConfig::default()
    };
    let store = Arc::new(InMemoryStateStore::new());
    let sink = Arc::new(RecordingSink::default());
    let rt = BotRuntime::new(config, registry(), store, Arc::clone(&sink), || Box::new(Echo));

    rt.handle(message("hi")).await.unwrap();
    let err = rt.handle(message("boom")).await.unwrap_err();
    assert!(matches!(err, TurnError::Faulted(ref f) if f.kind == FaultKind::Dialog));
    // The failed turn's own output is discarded
    assert_eq!(sink.texts(), vec!["echo: hi", "Sorry, something went wrong."]);

    // Next message starts a fresh root
    let next = rt.handle(message("again")).await.unwrap();
    assert_eq!(texts(&next), vec!["echo: again"]);
}

#[tokio::test]
async fn test_cancel_scorable_unwinds_quietly() {
    let dispatcher = Dispatcher::new().with(CancelScorable::new(r"(?i)cancel").unwrap());
    let rt = runtime(JoinWords::default).with_dispatcher(dispatcher);

    rt.handle(message("hello")).await.unwrap();
    let cancelled = rt.handle(message("cancel")).await.unwrap();
    assert!(cancelled.intercepted);
    assert_eq!(cancelled.need, Need::Done);
    assert!(cancelled.messages.is_empty());

    // The stack was dropped; the words collected so far are gone
    let restarted = rt.handle(message("fresh")).await.unwrap();
    assert_eq!(texts(&restarted), vec!["Word?", "Word?"]);
}

#[tokio::test]
async fn test_luis_dispatch_picks_highest_scoring_intent() {
    let first = Arc::new(MockLuisService::new(
        "classifier-1",
        &[("All", 0.9), ("One", 0.8), ("Two", 0.7), ("None", 0.6)],
    ));
    let second = Arc::new(MockLuisService::new("classifier-2", &[("All", 1.0)]));

    let mut dispatcher = Dispatcher::new();
    for (label, service) in [("1", first.clone()), ("2", second.clone())] {
        let logged: Arc<dyn LuisService> = Arc::new(LoggingLuisService::new(service));
        let mut scorable = LuisScorable::new(logged);
        for intent in ["All", "One", "Two", "None"] {
            scorable = scorable.on_intent(intent, move |scope, _, m| {
                scope.session.post(format!("{label}:{intent}:{}", m.intent.intent));
                Ok(())
            });
        }
        dispatcher.add(scorable);
    }
    let rt = runtime(|| Echo).with_dispatcher(dispatcher);

    let outcome = rt.handle(message("do everything")).await.unwrap();
    assert!(outcome.intercepted);
    assert_eq!(texts(&outcome), vec!["2:All:All"]);
    assert_eq!(first.queries.lock().unwrap().len(), 1);
    assert_eq!(second.queries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_conversation_update_routed_to_activity_scorable() {
    let dispatcher = Dispatcher::new().with(ActivityTypeScorable::new(
        ActivityType::ConversationUpdate,
        |scope, _, _| {
            scope.session.post("Welcome!");
            Ok(())
        },
    ));
    let store = Arc::new(InMemoryStateStore::new());
    let rt = runtime_with(BotConfig::default(), Arc::clone(&store), || Echo).with_dispatcher(dispatcher);

    let update = message("").with_kind(ActivityType::ConversationUpdate);
    let welcomed = rt.handle(update).await.unwrap();
    assert!(welcomed.intercepted);
    assert_eq!(texts(&welcomed), vec!["Welcome!"]);
    assert_eq!(welcomed.need, Need::Done);
    // No root dialog was started for the update
    let address = message("x").address();
    let data = crate::bot_data::BotData::load(store.as_ref(), &address).await.unwrap();
    assert!(!data.private_conversation.contains_key(DIALOG_STATE_KEY));

    // Ordinary messages still reach the stack
    let echoed = rt.handle(message("hi")).await.unwrap();
    assert!(!echoed.intercepted);
    assert_eq!(texts(&echoed), vec!["echo: hi"]);
}

#[tokio::test]
async fn test_classifier_failure_fails_turn_without_replies() {
    let failing = Arc::new(MockLuisService::failing("classifier", LuisErrorKind::Network));
    let scorable = LuisScorable::new(failing).on_intent("All", |scope, _, _| {
        scope.session.post("never");
        Ok(())
    });
    let store = Arc::new(InMemoryStateStore::new());
    let sink = Arc::new(RecordingSink::default());
    let rt = BotRuntime::new(BotConfig::default(), registry(), store, Arc::clone(&sink), || Box::new(Echo))
        .with_dispatcher(Dispatcher::new().with(scorable));

    let err = rt.handle(message("hi")).await.unwrap_err();
    assert!(matches!(
        err,
        TurnError::Scorable(ScorableError::Luis(ref e)) if e.kind.is_retryable()
    ));
    assert!(sink.texts().is_empty());
}

#[tokio::test]
async fn test_concurrent_turns_one_loses() {
    let store = Arc::new(YieldingStore::default());
    let sink = Arc::new(RecordingSink::default());
    let rt = BotRuntime::new(
        BotConfig::default(),
        registry(),
        store,
        Arc::clone(&sink),
        || Box::new(Echo),
    );

    let (a, b) = tokio::join!(rt.handle(message("first")), rt.handle(message("second")));
    let conflicts = [&a, &b]
        .iter()
        .filter(|r| r.as_ref().is_err_and(TurnError::is_conflict))
        .count();
    assert_eq!(conflicts, 1);

    // Only the winner's reply went out
    let winner = a.or(b).unwrap();
    assert_eq!(sink.texts(), texts(&winner));
}

#[tokio::test]
async fn test_version_mismatch_requires_reset() {
    let store = Arc::new(InMemoryStateStore::new());
    let rt = runtime_with(BotConfig::default(), Arc::clone(&store), || Echo);
    rt.handle(message("hi")).await.unwrap();

    // Simulate state written by an incompatible deployment
    let address = message("x").address();
    let mut data = crate::bot_data::BotData::load(store.as_ref(), &address).await.unwrap();
    let mut state: serde_json::Value = data.private_conversation.try_get(DIALOG_STATE_KEY).unwrap().unwrap();
    state["version"] = serde_json::json!(99);
    data.private_conversation.set(DIALOG_STATE_KEY, &state).unwrap();
    data.flush(store.as_ref(), &address).await.unwrap();

    let err = rt.handle(message("hello")).await.unwrap_err();
    assert!(matches!(err, TurnError::Serialization(SerializationError::Version { found: 99, .. })));

    rt.reset_dialog(&message("reset")).await.unwrap();
    let fresh = rt.handle(message("hello")).await.unwrap();
    assert_eq!(texts(&fresh), vec!["echo: hello"]);
}
