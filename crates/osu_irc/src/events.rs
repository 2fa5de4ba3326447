use dashmap::DashMap;
use log::{debug, error};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

use crate::{
    channels::{ChannelName, Lobby},
    errors::CallbackError,
    message::Message,
    osu::{Beatmap, GameMode, Mods, ScoreMode, TeamMode},
    slots::{Slot, Team},
};

/// One recognised lobby mutation, with the values before and after it.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyChange {
    Locked,
    Unlocked,
    SizeChanged {
        old: u8,
        new: u8,
    },
    SettingsChanged {
        old_size: u8,
        new_size: u8,
        old_team_mode: TeamMode,
        new_team_mode: TeamMode,
        old_score_mode: ScoreMode,
        new_score_mode: ScoreMode,
    },
    PlayerMoved {
        username: String,
        /// `None` when the user had no known slot before the move.
        old_slot: Option<u8>,
        new_slot: u8,
    },
    HostChanged {
        old: Option<String>,
        new: String,
    },
    HostCleared {
        old: Option<String>,
    },
    RoomNameChanged {
        old: Option<String>,
        new: String,
    },
    BeatmapChanged {
        old: Option<Beatmap>,
        new: Beatmap,
    },
    TeamModeUpdated {
        old_team_mode: TeamMode,
        new_team_mode: TeamMode,
        old_score_mode: ScoreMode,
        new_score_mode: ScoreMode,
    },
    ActiveModsUpdated {
        old_mods: Mods,
        new_mods: Mods,
        old_freemod: bool,
        new_freemod: bool,
    },
    PlayerCountUpdated {
        old: u8,
        new: u8,
    },
    SlotUpdated {
        slot_number: u8,
        old: Option<Slot>,
        new: Slot,
    },
    MatchStarted,
    MatchAborted,
    MatchFinished,
    TeamChanged {
        username: String,
        old: Team,
        new: Team,
    },
    GameModeChanged {
        old: GameMode,
        new: GameMode,
    },
    ModsChanged {
        old_mods: Mods,
        new_mods: Mods,
        old_freemod: bool,
        new_freemod: bool,
    },
    PasswordChanged {
        has_password: bool,
    },
    RefereeAdded(String),
    RefereeRemoved(String),
    Kicked(String),
    Banned(String),
    TimerStarted {
        seconds: u64,
    },
    TimerAborted,
    Closed,
    PlayerJoined {
        username: String,
        slot: u8,
        team: Team,
    },
    PlayerLeft {
        username: String,
        slot: Option<u8>,
    },
    AllPlayersReady,
    PlayerFinished {
        username: String,
        score: u64,
        passed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyEventKind {
    Locked,
    Unlocked,
    SizeChanged,
    SettingsChanged,
    PlayerMoved,
    HostChanged,
    HostCleared,
    RoomNameChanged,
    BeatmapChanged,
    TeamModeUpdated,
    ActiveModsUpdated,
    PlayerCountUpdated,
    SlotUpdated,
    MatchStarted,
    MatchAborted,
    MatchFinished,
    TeamChanged,
    GameModeChanged,
    ModsChanged,
    PasswordChanged,
    RefereeAdded,
    RefereeRemoved,
    Kicked,
    Banned,
    TimerStarted,
    TimerAborted,
    Closed,
    PlayerJoined,
    PlayerLeft,
    AllPlayersReady,
    PlayerFinished,
}

impl LobbyChange {
    pub fn kind(&self) -> LobbyEventKind {
        match self {
            LobbyChange::Locked => LobbyEventKind::Locked,
            LobbyChange::Unlocked => LobbyEventKind::Unlocked,
            LobbyChange::SizeChanged { .. } => LobbyEventKind::SizeChanged,
            LobbyChange::SettingsChanged { .. } => LobbyEventKind::SettingsChanged,
            LobbyChange::PlayerMoved { .. } => LobbyEventKind::PlayerMoved,
            LobbyChange::HostChanged { .. } => LobbyEventKind::HostChanged,
            LobbyChange::HostCleared { .. } => LobbyEventKind::HostCleared,
            LobbyChange::RoomNameChanged { .. } => LobbyEventKind::RoomNameChanged,
            LobbyChange::BeatmapChanged { .. } => LobbyEventKind::BeatmapChanged,
            LobbyChange::TeamModeUpdated { .. } => LobbyEventKind::TeamModeUpdated,
            LobbyChange::ActiveModsUpdated { .. } => LobbyEventKind::ActiveModsUpdated,
            LobbyChange::PlayerCountUpdated { .. } => LobbyEventKind::PlayerCountUpdated,
            LobbyChange::SlotUpdated { .. } => LobbyEventKind::SlotUpdated,
            LobbyChange::MatchStarted => LobbyEventKind::MatchStarted,
            LobbyChange::MatchAborted => LobbyEventKind::MatchAborted,
            LobbyChange::MatchFinished => LobbyEventKind::MatchFinished,
            LobbyChange::TeamChanged { .. } => LobbyEventKind::TeamChanged,
            LobbyChange::GameModeChanged { .. } => LobbyEventKind::GameModeChanged,
            LobbyChange::ModsChanged { .. } => LobbyEventKind::ModsChanged,
            LobbyChange::PasswordChanged { .. } => LobbyEventKind::PasswordChanged,
            LobbyChange::RefereeAdded(_) => LobbyEventKind::RefereeAdded,
            LobbyChange::RefereeRemoved(_) => LobbyEventKind::RefereeRemoved,
            LobbyChange::Kicked(_) => LobbyEventKind::Kicked,
            LobbyChange::Banned(_) => LobbyEventKind::Banned,
            LobbyChange::TimerStarted { .. } => LobbyEventKind::TimerStarted,
            LobbyChange::TimerAborted => LobbyEventKind::TimerAborted,
            LobbyChange::Closed => LobbyEventKind::Closed,
            LobbyChange::PlayerJoined { .. } => LobbyEventKind::PlayerJoined,
            LobbyChange::PlayerLeft { .. } => LobbyEventKind::PlayerLeft,
            LobbyChange::AllPlayersReady => LobbyEventKind::AllPlayersReady,
            LobbyChange::PlayerFinished { .. } => LobbyEventKind::PlayerFinished,
        }
    }
}

/// A lobby change as delivered to observers. `lobby` is the state right
/// after the change was applied.
#[derive(Debug, Clone)]
pub struct LobbyEvent {
    pub channel: ChannelName,
    pub lobby: Arc<Lobby>,
    pub change: LobbyChange,
}

impl LobbyEvent {
    pub fn mp_id(&self) -> u64 {
        self.lobby.mp_id()
    }
}

/// Connection-level notifications.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Ready,
    Ping(String),
    Message(Message),
    Join {
        user: String,
        channel: ChannelName,
    },
    Part {
        user: String,
        channel: ChannelName,
    },
    Quit {
        user: String,
        reason: String,
    },
    Mode {
        admin: String,
        channel: ChannelName,
        mode: String,
        user: String,
    },
    Whois {
        username: String,
        user_id: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    Ready,
    Ping,
    Message,
    Join,
    Part,
    Quit,
    Mode,
    Whois,
}

/// Anything the hub can route by kind.
pub trait Event: Clone + Send + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

impl Event for LobbyEvent {
    type Kind = LobbyEventKind;

    fn kind(&self) -> LobbyEventKind {
        self.change.kind()
    }
}

impl Event for ClientEvent {
    type Kind = ClientEventKind;

    fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::Ready => ClientEventKind::Ready,
            ClientEvent::Ping(_) => ClientEventKind::Ping,
            ClientEvent::Message(_) => ClientEventKind::Message,
            ClientEvent::Join { .. } => ClientEventKind::Join,
            ClientEvent::Part { .. } => ClientEventKind::Part,
            ClientEvent::Quit { .. } => ClientEventKind::Quit,
            ClientEvent::Mode { .. } => ClientEventKind::Mode,
            ClientEvent::Whois { .. } => ClientEventKind::Whois,
        }
    }
}

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
pub type Callback<E> = Arc<dyn Fn(E) -> BoxFuture<Result<(), CallbackError>> + Send + Sync>;

/// Observer registry. Each delivery runs as its own task: a slow or failing
/// observer neither blocks the emitter nor the other observers.
pub struct EventHub<E: Event> {
    // `None` subscribes to every kind.
    observers: DashMap<Option<E::Kind>, Vec<Callback<E>>>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl<E: Event> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

// Decrements the in-flight counter even if the observer panics.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl<E: Event> EventHub<E> {
    pub fn new() -> Self {
        EventHub {
            observers: DashMap::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Registers `callback` for `kind`, or for every event when `kind` is `None`.
    pub fn subscribe<F, Fut>(&self, kind: Option<E::Kind>, callback: F)
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        let callback: Callback<E> = Arc::new(move |event| Box::pin(callback(event)));
        self.observers.entry(kind).or_default().push(callback);
    }

    pub fn observer_count(&self, kind: E::Kind) -> usize {
        let count = |k: Option<E::Kind>| self.observers.get(&k).map_or(0, |v| v.len());
        count(Some(kind)) + count(None)
    }

    /// Spawns one task per interested observer and returns how many were spawned.
    pub fn emit(&self, event: E) -> usize {
        let kind = event.kind();
        // Clone the callbacks out so no map lock is held across the spawns.
        let mut callbacks: Vec<Callback<E>> = Vec::new();
        for key in [Some(kind), None] {
            if let Some(list) = self.observers.get(&key) {
                callbacks.extend(list.iter().cloned());
            }
        }
        if callbacks.is_empty() {
            debug!("No observer for {kind:?}");
            return 0;
        }

        let spawned = callbacks.len();
        for callback in callbacks {
            self.in_flight.fetch_add(1, Ordering::AcqRel);
            let guard = InFlightGuard {
                in_flight: self.in_flight.clone(),
                idle: self.idle.clone(),
            };
            let event = event.clone();
            tokio::spawn(async move {
                let _guard = guard;
                if let Err(e) = callback(event).await {
                    error!("Observer for {kind:?} failed: {e}");
                }
            });
        }
        spawned
    }

    /// Waits until every delivery spawned so far has finished.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}
