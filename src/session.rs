//! Per-turn session state

use crate::bot_data::{BotData, BotDataBag};
use crate::message::Message;

/// Everything one turn works on: the inbound message, the outbound queue,
/// and the bot data bags
#[derive(Debug, Clone)]
pub struct Session {
    message: Message,
    outbound: Vec<Message>,
    data: BotData,
}

impl Session {
    pub fn new(message: Message, data: BotData) -> Self {
        Self {
            message,
            outbound: Vec::new(),
            data,
        }
    }

    /// The inbound message of this turn
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Queue a reply to the inbound message
    pub fn post(&mut self, text: impl Into<String>) {
        let reply = self.message.reply(text);
        self.outbound.push(reply);
    }

    pub fn post_message(&mut self, message: Message) {
        self.outbound.push(message);
    }

    /// Outbound messages in enqueue order
    pub fn outbound(&self) -> &[Message] {
        &self.outbound
    }

    pub fn discard_outbound(&mut self) -> usize {
        let n = self.outbound.len();
        self.outbound.clear();
        n
    }

    pub fn data(&self) -> &BotData {
        &self.data
    }

    pub fn user_data(&mut self) -> &mut BotDataBag {
        &mut self.data.user
    }

    pub fn conversation_data(&mut self) -> &mut BotDataBag {
        &mut self.data.conversation
    }

    pub fn private_conversation_data(&mut self) -> &mut BotDataBag {
        &mut self.data.private_conversation
    }

    /// Start the next turn on the same data, as an in-process host would
    pub fn next_turn(self, message: Message) -> (Self, Vec<Message>) {
        (Self::new(message, self.data), self.outbound)
    }

    pub fn into_parts(self) -> (BotData, Vec<Message>) {
        (self.data, self.outbound)
    }
}
