use crate::{
    channels::ChannelName,
    users::{User, same_nick},
};

const ACTION_PREFIX: &str = "\x01ACTION ";

/// One chat line, alive for the duration of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub author: User,
    /// Raw PRIVMSG target: a channel name or our own nickname.
    pub target: String,
    pub content: String,
    pub channel: Option<ChannelName>,
    pub is_private: bool,
}

impl Message {
    pub fn new(author: User, target: &str, content: &str) -> Self {
        let is_private = !target.starts_with('#');
        Message {
            author,
            target: target.to_owned(),
            content: content.to_owned(),
            channel: (!is_private).then(|| target.to_owned()),
            is_private,
        }
    }

    /// Where an answer to this message should go.
    pub fn reply_target(&self) -> &str {
        match &self.channel {
            Some(channel) => channel,
            None => &self.author.username,
        }
    }

    pub fn is_from(&self, nickname: &str) -> bool {
        same_nick(&self.author.username, nickname)
    }

    /// Text of a CTCP ACTION ("/me ..."), if this is one.
    pub fn action_text(&self) -> Option<&str> {
        self.content
            .strip_prefix(ACTION_PREFIX)
            .map(|t| t.strip_suffix('\x01').unwrap_or(t))
    }
}

/// Wraps `text` as a CTCP ACTION.
pub fn as_action(text: &str) -> String {
    format!("{ACTION_PREFIX}{text}\x01")
}
