//! Bot runtime executor

use super::traits::MessageSink;
use super::{TurnError, TurnOutcome};

use crate::bot_data::{BotData, BotStateStore};
use crate::config::BotConfig;
use crate::dialog::{Dialog, DialogStack};
use crate::fiber::{FiberError, Need};
use crate::message::Message;
use crate::scorable::{Dispatcher, TurnScope};
use crate::serialization::{DialogRegistry, DIALOG_STATE_KEY};
use crate::session::Session;
use serde_json::Value;
use std::sync::Arc;

/// Builds the root dialog for a conversation with an empty stack
pub type RootFactory = Arc<dyn Fn() -> Box<dyn Dialog> + Send + Sync>;

/// Generic bot runtime over any state store and message sink.
///
/// Holds no per-conversation state: every turn reloads everything from the
/// store, so turns for different conversations may run concurrently.
pub struct BotRuntime<S, K>
where
    S: BotStateStore + 'static,
    K: MessageSink + 'static,
{
    config: BotConfig,
    registry: DialogRegistry,
    store: S,
    sink: K,
    root: RootFactory,
    dispatcher: Dispatcher,
}

impl<S, K> BotRuntime<S, K>
where
    S: BotStateStore + 'static,
    K: MessageSink + 'static,
{
    pub fn new<F>(config: BotConfig, registry: DialogRegistry, store: S, sink: K, root: F) -> Self
    where
        F: Fn() -> Box<dyn Dialog> + Send + Sync + 'static,
    {
        Self {
            config,
            registry,
            store,
            sink,
            root: Arc::new(root),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Set the scorables consulted before the dialog stack
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one turn for `message`.
    ///
    /// Replies are delivered only after state is persisted; a turn that
    /// loses an ETag race delivers nothing.
    pub async fn handle(&self, message: Message) -> Result<TurnOutcome, TurnError> {
        let address = message.address();
        tracing::info!(
            conversation_id = %address.conversation_id,
            user_id = %address.user_id,
            kind = ?message.kind,
            "Handling turn"
        );

        let data = BotData::load(&self.store, &address).await?;
        let mut session = Session::new(message, data);
        let mut stack = self.load_stack(&session)?;

        let intercepted = self.intercept(&mut stack, &mut session).await?;
        let polled = if intercepted {
            // The winner may have pushed a dialog or failed the waiting one
            if stack.need() == Need::Poll {
                stack.poll(&mut session)
            } else {
                Ok(stack.need())
            }
        } else {
            let root = &self.root;
            stack.deliver(&mut session, || root())
        };

        let mut failure = None;
        let need = match polled {
            Ok(need) => need,
            Err(FiberError::Unhandled(fault)) if fault.is_cancellation() => {
                tracing::info!(conversation_id = %address.conversation_id, reason = %fault.message, "Dialog stack cancelled");
                stack.reset();
                Need::Done
            }
            Err(FiberError::Unhandled(fault)) => {
                tracing::warn!(conversation_id = %address.conversation_id, error = %fault, "Turn ended in unhandled fault");
                stack.reset();
                session.discard_outbound();
                if let Some(reply) = &self.config.fault_reply {
                    session.post(reply.clone());
                }
                failure = Some(TurnError::Faulted(fault));
                Need::Done
            }
            Err(e) => {
                tracing::error!(conversation_id = %address.conversation_id, error = %e, "Invalid dialog stack operation");
                stack.reset();
                session.discard_outbound();
                failure = Some(TurnError::Fiber(e));
                Need::Done
            }
        };

        save_stack(&stack, &mut session)?;
        let (mut data, outbound) = session.into_parts();
        data.flush(&self.store, &address).await.map_err(|e| {
            tracing::warn!(conversation_id = %address.conversation_id, error = %e, dropped = outbound.len(), "Turn state not persisted");
            e
        })?;

        for reply in &outbound {
            self.sink.send(reply).await.map_err(TurnError::Sink)?;
        }
        tracing::debug!(
            conversation_id = %address.conversation_id,
            depth = stack.depth(),
            replies = outbound.len(),
            "Turn complete"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(TurnOutcome {
                messages: outbound,
                need,
                intercepted,
            }),
        }
    }

    /// Drop the persisted dialog stack so the next turn starts a fresh root
    pub async fn reset_dialog(&self, message: &Message) -> Result<(), TurnError> {
        let address = message.address();
        let mut data = BotData::load(&self.store, &address).await?;
        if data.private_conversation.remove(DIALOG_STATE_KEY) {
            data.flush(&self.store, &address).await?;
            tracing::info!(conversation_id = %address.conversation_id, "Dialog stack reset");
        }
        Ok(())
    }

    /// Offer the message to the scorables; true when one took it
    async fn intercept(&self, stack: &mut DialogStack, session: &mut Session) -> Result<bool, TurnError> {
        if self.dispatcher.is_empty() {
            return Ok(false);
        }
        let message = session.message().clone();
        let mut scope = TurnScope { stack, session };
        Ok(self.dispatcher.dispatch(&message, &mut scope).await?)
    }

    fn load_stack(&self, session: &Session) -> Result<DialogStack, TurnError> {
        let state: Option<Value> = session.data().private_conversation.try_get(DIALOG_STATE_KEY)?;
        match state {
            Some(state) => Ok(DialogStack::from_value(state, &self.registry)?),
            None => Ok(DialogStack::new()),
        }
    }
}

/// Write the stack into the private bag, leaving the bag clean when
/// nothing changed
fn save_stack(stack: &DialogStack, session: &mut Session) -> Result<(), TurnError> {
    let bag = session.private_conversation_data();
    if stack.is_empty() {
        bag.remove(DIALOG_STATE_KEY);
        return Ok(());
    }
    let state = stack.to_value()?;
    let current: Option<Value> = bag.try_get(DIALOG_STATE_KEY)?;
    if current.as_ref() != Some(&state) {
        bag.set(DIALOG_STATE_KEY, &state)?;
    }
    Ok(())
}
