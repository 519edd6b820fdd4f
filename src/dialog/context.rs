//! What dialog code sees while a continuation runs

use super::{Dialog, START};
use crate::bot_data::BotDataBag;
use crate::fiber::{Fault, Handle, Item, Resumable, ANY_KIND};
use crate::message::Message;
use crate::session::Session;

/// Per-continuation facade over the running frame and the turn's session.
///
/// Exactly one of `wait`, `call`, `forward`, `done` or `fail` must be used
/// before the continuation returns.
pub struct DialogContext<'a, 'f> {
    handle: &'a mut Handle<'f, Box<dyn Dialog>>,
    session: &'a mut Session,
}

impl<'a, 'f> DialogContext<'a, 'f> {
    pub(crate) fn new(handle: &'a mut Handle<'f, Box<dyn Dialog>>, session: &'a mut Session) -> Self {
        Self { handle, session }
    }

    /// The inbound message of this turn
    pub fn message(&self) -> &Message {
        self.session.message()
    }

    /// Queue a reply to the user
    pub fn post(&mut self, text: impl Into<String>) {
        self.session.post(text);
    }

    pub fn post_message(&mut self, message: Message) {
        self.session.post_message(message);
    }

    /// Suspend until the next inbound message, then run `rest`
    pub fn wait(&mut self, rest: &str) {
        self.handle.wait(rest, Message::KIND);
    }

    /// Suspend until an item of type `T` is posted to the stack
    pub fn wait_for<T: Resumable>(&mut self, rest: &str) {
        self.handle.wait(rest, T::KIND);
    }

    /// Start `child`; its result resumes this dialog at `resume`
    pub fn call<D: Dialog + 'static>(&mut self, child: D, resume: &str) {
        self.handle
            .call(Box::new(child), START, Item::unit(), resume, ANY_KIND);
    }

    /// Start `child` with arguments
    pub fn call_with<D: Dialog + 'static, A: Resumable>(
        &mut self,
        child: D,
        args: &A,
        resume: &str,
    ) -> Result<(), Fault> {
        let args = Item::new(args)?;
        self.handle.call(Box::new(child), START, args, resume, ANY_KIND);
        Ok(())
    }

    /// Start `child` and hand it `message` as soon as it waits for one
    pub fn forward<D: Dialog + 'static>(&mut self, child: D, resume: &str, message: &Message) -> Result<(), Fault> {
        let item = Item::new(message)?;
        self.handle
            .forward(Box::new(child), START, Item::unit(), resume, ANY_KIND, item);
        Ok(())
    }

    /// End this dialog with a result for the caller
    pub fn done<T: Resumable>(&mut self, value: T) -> Result<(), Fault> {
        let item = Item::new(&value)?;
        self.handle.done(Ok(item));
        Ok(())
    }

    /// End this dialog with a fault for the caller
    pub fn fail(&mut self, fault: Fault) {
        self.handle.done(Err(fault));
    }

    /// When this dialog completes, run `rest` with the result before
    /// returning to the caller
    pub fn continue_with(&mut self, rest: &str) {
        self.handle.continue_with(rest);
    }

    /// Depth of this dialog on the stack (1 for the root)
    pub fn depth(&self) -> usize {
        self.handle.depth()
    }

    pub fn user_data(&mut self) -> &mut BotDataBag {
        self.session.user_data()
    }

    pub fn conversation_data(&mut self) -> &mut BotDataBag {
        self.session.conversation_data()
    }

    pub fn private_conversation_data(&mut self) -> &mut BotDataBag {
        self.session.private_conversation_data()
    }

    pub fn session(&mut self) -> &mut Session {
        self.session
    }
}
