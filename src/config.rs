//! Host configuration

pub const DEFAULT_BOT_ID: &str = "bot";
pub const DEFAULT_CHANNEL_ID: &str = "console";
pub const DEFAULT_USER_ID: &str = "user";
pub const DEFAULT_LOG_FILTER: &str = "bot_dialogs=info";

/// Configuration for a bot host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub bot_id: String,
    pub channel_id: String,
    /// User id the console host speaks as
    pub user_id: String,
    /// Reply sent when a turn ends in an unhandled fault; nothing is sent
    /// when unset
    pub fault_reply: Option<String>,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_id: DEFAULT_BOT_ID.to_string(),
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            fault_reply: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bot_id: lookup("BOT_ID").unwrap_or(defaults.bot_id),
            channel_id: lookup("BOT_CHANNEL_ID").unwrap_or(defaults.channel_id),
            user_id: lookup("BOT_USER_ID").unwrap_or(defaults.user_id),
            fault_reply: lookup("BOT_FAULT_REPLY").filter(|s| !s.is_empty()),
            log_filter: lookup("BOT_LOG").unwrap_or(defaults.log_filter),
        }
    }
}
