use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use crate::{
    channels::{Channel, ChannelName, Lobby},
    errors::IrcClientError,
    users::{User, same_nick},
};

/// A one-shot flag that can be awaited.
#[derive(Debug)]
pub struct Latch {
    tx: watch::Sender<bool>,
}

impl Default for Latch {
    fn default() -> Self {
        Latch {
            tx: watch::Sender::new(false),
        }
    }
}

impl Latch {
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait.
        let _ = rx.wait_for(|set| *set).await;
    }
}

/// Readiness: welcome, MOTD start and MOTD end, in any order.
#[derive(Debug, Default)]
pub struct ReadyLatches {
    pub welcome: Latch,
    pub motd_start: Latch,
    pub motd_end: Latch,
}

impl ReadyLatches {
    pub async fn wait_all(&self) {
        self.welcome.wait().await;
        self.motd_start.wait().await;
        self.motd_end.wait().await;
    }

    pub fn all_set(&self) -> bool {
        self.welcome.is_set() && self.motd_start.is_set() && self.motd_end.is_set()
    }
}

/// Everything the dispatcher knows about the connection.
///
/// Entities are only mutated from the read loop, one line at a time; map
/// guards are held for the duration of one synchronous update and never
/// across an await.
#[derive(Debug)]
pub struct ClientState {
    pub nickname: String,
    pub bot_account: String,
    pub channels: DashMap<ChannelName, Channel>,
    // Keyed by lowercased username.
    pub users: DashMap<String, User>,
    // RPL_NAMREPLY lines collected until RPL_ENDOFNAMES.
    pending_names: DashMap<ChannelName, Vec<String>>,
    pub latches: ReadyLatches,
    running: AtomicBool,
    ready_emitted: AtomicBool,
}

impl ClientState {
    pub fn new(nickname: &str, bot_account: &str) -> Self {
        ClientState {
            nickname: nickname.to_owned(),
            bot_account: bot_account.to_owned(),
            channels: DashMap::new(),
            users: DashMap::new(),
            pending_names: DashMap::new(),
            latches: ReadyLatches::default(),
            running: AtomicBool::new(false),
            ready_emitted: AtomicBool::new(false),
        }
    }

    pub fn is_self(&self, nickname: &str) -> bool {
        same_nick(&self.nickname, nickname)
    }

    pub fn is_bot(&self, nickname: &str) -> bool {
        same_nick(&self.bot_account, nickname)
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// True exactly once, for the caller that gets to announce readiness.
    pub fn claim_ready(&self) -> bool {
        !self.ready_emitted.swap(true, Ordering::AcqRel)
    }

    /// Runs `f` on the named channel, creating it first if unknown.
    pub fn with_channel<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Channel) -> R,
    ) -> Result<R, IrcClientError> {
        if !self.channels.contains_key(name) {
            let channel = Channel::new(name)?;
            debug!("New channel {name}");
            self.channels.entry(name.to_owned()).or_insert(channel);
        }
        let mut channel = self
            .channels
            .get_mut(name)
            .ok_or_else(|| IrcClientError::ParsingError(format!("channel {name} vanished")))?;
        Ok(f(channel.value_mut()))
    }

    /// Like `with_channel`, for lobby channels only. `Ok(None)` for a
    /// standard channel.
    pub fn with_lobby<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Lobby) -> R,
    ) -> Result<Option<R>, IrcClientError> {
        self.with_channel(name, |channel| channel.lobby_mut().map(f))
    }

    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.channels.get(name).map(|c| c.clone())
    }

    pub fn lobby(&self, name: &str) -> Option<Lobby> {
        self.channels
            .get(name)
            .and_then(|c| c.lobby().cloned())
    }

    pub fn is_joined(&self, name: &str) -> bool {
        self.channels.get(name).is_some_and(|c| c.joined)
    }

    /// Caches a user on first mention.
    pub fn touch_user(&self, username: &str) {
        self.users
            .entry(username.to_ascii_lowercase())
            .or_insert_with(|| User::new(username));
    }

    pub fn user(&self, username: &str) -> Option<User> {
        self.users
            .get(&username.to_ascii_lowercase())
            .map(|u| u.clone())
    }

    /// Records a WHOIS result on the cached user and on every lobby slot
    /// still missing the id.
    pub fn set_user_id(&self, username: &str, user_id: u64) {
        self.users
            .entry(username.to_ascii_lowercase())
            .or_insert_with(|| User::new(username))
            .user_id = Some(user_id);
        for mut channel in self.channels.iter_mut() {
            if let Some(slot) = channel
                .lobby_mut()
                .and_then(|lobby| lobby.slots.get_by_user_mut(username))
                && slot.user_id.is_none()
            {
                slot.user_id = Some(user_id);
            }
        }
    }

    pub fn push_names(&self, channel: &str, names: &str) {
        self.pending_names
            .entry(channel.to_owned())
            .or_default()
            .push(names.to_owned());
    }

    /// The full name list of a channel, once its last reply arrived.
    pub fn take_names(&self, channel: &str) -> Option<String> {
        self.pending_names
            .remove(channel)
            .map(|(_, lines)| lines.join(" "))
    }

    /// A QUIT leaves every channel at once.
    pub fn remove_member_everywhere(&self, username: &str) -> usize {
        let mut removed = 0;
        for mut channel in self.channels.iter_mut() {
            if channel.remove_member(username) {
                removed += 1;
            }
        }
        removed
    }
}
