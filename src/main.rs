//! Console bot host
//!
//! Reads user messages from stdin, one per line, and runs each as a turn
//! against an in-memory state store.

use async_trait::async_trait;
use bot_dialogs::dialog::{unknown_continuation, PromptConfirm, PromptOptions, PromptString};
use bot_dialogs::scorable::{CancelScorable, Dispatcher};
use bot_dialogs::{
    BotConfig, BotRuntime, Dialog, DialogContext, DialogRegistry, DialogType, Fault, InMemoryStateStore, Item,
    Message, MessageSink, Outcome,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Writes replies to stdout
struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    async fn send(&self, message: &Message) -> Result<(), String> {
        let mut stdout = tokio::io::stdout();
        let line = format!("{}> {}\n", message.from.id, message.text);
        stdout.write_all(line.as_bytes()).await.map_err(|e| e.to_string())?;
        stdout.flush().await.map_err(|e| e.to_string())
    }
}

/// Asks for a name once, then greets and offers to start over
#[derive(Debug, Default, Serialize, Deserialize)]
struct Greeting {
    name: Option<String>,
}

impl DialogType for Greeting {
    const TYPE_NAME: &'static str = "console.greeting";
}

impl Dialog for Greeting {
    fn start(&mut self, ctx: &mut DialogContext<'_, '_>, _args: Item) -> Result<(), Fault> {
        ctx.wait("message_received");
        Ok(())
    }

    fn resume(&mut self, ctx: &mut DialogContext<'_, '_>, rest: &str, outcome: Outcome) -> Result<(), Fault> {
        match rest {
            "message_received" => {
                outcome?;
                match &self.name {
                    Some(name) => {
                        ctx.post(format!("Welcome back, {name}."));
                        ctx.call(PromptConfirm::new(PromptOptions::new("Forget your name?")), "forget");
                    }
                    None => ctx.call(PromptString::new(PromptOptions::new("What is your name?")), "name"),
                }
                Ok(())
            }
            "name" => {
                let name: String = outcome?.get()?;
                ctx.user_data().set("name", &name)?;
                ctx.post(format!("Nice to meet you, {name}."));
                self.name = Some(name);
                ctx.wait("message_received");
                Ok(())
            }
            "forget" => {
                if outcome?.get::<bool>()? {
                    self.name = None;
                    ctx.user_data().remove("name");
                    ctx.post("Forgotten.");
                }
                ctx.wait("message_received");
                Ok(())
            }
            other => Err(unknown_continuation(self, other)),
        }
    }

    fn continuations(&self) -> &'static [&'static str] {
        &["message_received", "name", "forget"]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let registry = DialogRegistry::new().with::<Greeting>();
    let dispatcher = Dispatcher::new().with(CancelScorable::new(r"(?i)cancel|quit|reset")?);
    let runtime = BotRuntime::new(
        config.clone(),
        registry,
        InMemoryStateStore::new(),
        StdoutSink,
        || Box::new(Greeting::default()),
    )
    .with_dispatcher(dispatcher);

    let conversation_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conversation_id = %conversation_id, bot_id = %config.bot_id, "Console bot ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let message = Message::user(
            &config.channel_id,
            &conversation_id,
            &config.user_id,
            &config.bot_id,
            line,
        );
        match runtime.handle(message.clone()).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => tracing::warn!(error = %e, "Turn lost a state race"),
            Err(bot_dialogs::TurnError::Serialization(e)) => {
                tracing::error!(error = %e, "Stored dialog state is unusable; starting over");
                runtime.reset_dialog(&message).await?;
            }
            Err(e) => tracing::error!(error = %e, "Turn failed"),
        }
    }

    Ok(())
}
