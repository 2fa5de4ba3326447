use dashmap::DashMap;
use log::{debug, error};
use regex::Regex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    errors::{CallbackError, IrcClientError},
    events::BoxFuture,
    message::Message,
};

pub type CommandCallback =
    Arc<dyn Fn(Message, Vec<String>) -> BoxFuture<Result<(), CallbackError>> + Send + Sync>;

fn boxed<F, Fut>(callback: F) -> CommandCallback
where
    F: Fn(Message, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
{
    Arc::new(move |message, args| Box::pin(callback(message, args)))
}

/// Lowercased author names; `None` lets everyone through.
#[derive(Debug, Clone, Default)]
pub struct AllowList(Option<HashSet<String>>);

impl AllowList {
    pub fn everyone() -> Self {
        AllowList(None)
    }

    pub fn only<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        AllowList(Some(
            users
                .into_iter()
                .map(|u| u.as_ref().to_ascii_lowercase())
                .collect(),
        ))
    }

    pub fn allows(&self, username: &str) -> bool {
        match &self.0 {
            None => true,
            Some(users) => users.contains(&username.to_ascii_lowercase()),
        }
    }
}

struct MessageRule {
    pattern: Regex,
    allowed: AllowList,
    callback: CommandCallback,
}

/// `!name args...` commands plus free-form message rules.
///
/// A message starting with the prefix only ever triggers a command. Other
/// messages trigger the first rule whose pattern matches and whose allow
/// list admits the author; the callback receives the capture groups.
pub struct CommandRegistry {
    prefix: String,
    commands: DashMap<String, CommandCallback>,
    rules: RwLock<Vec<MessageRule>>,
}

impl CommandRegistry {
    pub fn new(prefix: &str) -> Self {
        CommandRegistry {
            prefix: prefix.to_owned(),
            commands: DashMap::new(),
            rules: RwLock::new(Vec::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn command<F, Fut>(&self, name: &str, callback: F)
    where
        F: Fn(Message, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.commands.insert(name.to_owned(), boxed(callback));
    }

    pub fn rule<F, Fut>(
        &self,
        pattern: &str,
        allowed: AllowList,
        callback: F,
    ) -> Result<(), IrcClientError>
    where
        F: Fn(Message, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        let pattern =
            Regex::new(pattern).map_err(|e| IrcClientError::ParsingError(e.to_string()))?;
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MessageRule {
                pattern,
                allowed,
                callback: boxed(callback),
            });
        Ok(())
    }

    /// Finds the callback for `message` and its arguments.
    fn resolve(&self, message: &Message) -> Option<(String, CommandCallback, Vec<String>)> {
        if let Some(body) = message.content.strip_prefix(&self.prefix) {
            let mut words = body.split_whitespace();
            let name = words.next()?;
            let callback = self.commands.get(name)?.clone();
            return Some((name.to_owned(), callback, words.map(str::to_owned).collect()));
        }

        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.iter().find_map(|rule| {
            if !rule.allowed.allows(&message.author.username) {
                return None;
            }
            let caps = rule.pattern.captures(&message.content)?;
            let args = caps
                .iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_owned()))
                .collect();
            Some((rule.pattern.to_string(), rule.callback.clone(), args))
        })
    }

    /// Spawns the matching callback, if any. Returns whether one ran.
    pub fn dispatch(&self, message: &Message) -> bool {
        let Some((name, callback, args)) = self.resolve(message) else {
            return false;
        };
        debug!("{} triggered {name:?}", message.author);
        let message = message.clone();
        tokio::spawn(async move {
            if let Err(e) = callback(message, args).await {
                error!("Command {name:?} failed: {e}");
            }
        });
        true
    }
}
