use std::collections::HashSet;
use std::fmt::Display;

use crate::{
    constants::{DEFAULT_LOBBY_SIZE, LOBBY_PREFIX},
    errors::IrcClientError,
    osu::{Beatmap, GameMode, Mods, ScoreMode, TeamMode},
    slots::{Slot, SlotStatus, SlotTable},
};

pub type ChannelName = String;

/// Normalises user input ("osu", "#osu") to a channel name.
pub fn normalize_channel_name(name: &str) -> ChannelName {
    if name.starts_with('#') {
        name.to_owned()
    } else {
        format!("#{name}")
    }
}

pub fn is_lobby_name(name: &str) -> bool {
    name.starts_with(LOBBY_PREFIX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: ChannelName,
    pub topic: String,
    /// Unix timestamp from RPL_TOPICWHOTIME.
    pub created_time: Option<u64>,
    pub joined: bool,
    pub members: HashSet<String>,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelKind {
    Standard,
    Lobby(Box<Lobby>),
}

impl Channel {
    /// Creates a channel, or a lobby when the name carries the `#mp_` prefix.
    pub fn new(name: &str) -> Result<Self, IrcClientError> {
        let kind = match name.strip_prefix(LOBBY_PREFIX) {
            Some(id) => {
                let mp_id = id
                    .parse::<u64>()
                    .map_err(|_| IrcClientError::invalid_capture("mp_id", id))?;
                ChannelKind::Lobby(Box::new(Lobby::new(mp_id)))
            }
            None => ChannelKind::Standard,
        };
        Ok(Channel {
            name: name.to_owned(),
            topic: String::new(),
            created_time: None,
            joined: true,
            members: HashSet::new(),
            kind,
        })
    }

    pub fn is_lobby(&self) -> bool {
        matches!(self.kind, ChannelKind::Lobby(_))
    }

    pub fn lobby(&self) -> Option<&Lobby> {
        match &self.kind {
            ChannelKind::Lobby(lobby) => Some(lobby),
            ChannelKind::Standard => None,
        }
    }

    pub fn lobby_mut(&mut self) -> Option<&mut Lobby> {
        match &mut self.kind {
            ChannelKind::Lobby(lobby) => Some(lobby),
            ChannelKind::Standard => None,
        }
    }

    pub fn add_member(&mut self, username: &str) -> bool {
        self.members.insert(username.to_owned())
    }

    pub fn remove_member(&mut self, username: &str) -> bool {
        self.members.remove(username)
    }

    /// Replaces the member set from a RPL_NAMREPLY list, dropping `@`/`+` sigils.
    pub fn set_members_from_names(&mut self, names: &str) {
        self.members = names
            .split_whitespace()
            .map(|n| n.trim_start_matches(['@', '+']).to_owned())
            .filter(|n| !n.is_empty())
            .collect();
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lobby {
    mp_id: u64,
    /// Revealed by the topic "... multiplayer game #<id>".
    pub game_id: Option<u64>,
    pub room_name: Option<String>,
    pub has_password: bool,
    pub size: u8,
    pub slots: SlotTable,
    pub score_mode: ScoreMode,
    pub team_mode: TeamMode,
    pub game_mode: GameMode,
    pub active_mods: Mods,
    pub freemod: bool,
    pub current_map: Option<Beatmap>,
    pub host: Option<String>,
    pub started: bool,
    pub locked: bool,
    pub player_count: u8,
    pub referees: HashSet<String>,
}

impl Lobby {
    pub fn new(mp_id: u64) -> Self {
        Lobby {
            mp_id,
            game_id: None,
            room_name: None,
            has_password: false,
            size: DEFAULT_LOBBY_SIZE,
            slots: SlotTable::new(),
            score_mode: ScoreMode::default(),
            team_mode: TeamMode::default(),
            game_mode: GameMode::default(),
            active_mods: Mods::empty(),
            freemod: false,
            current_map: None,
            host: None,
            started: false,
            locked: false,
            player_count: 0,
            referees: HashSet::new(),
        }
    }

    pub fn mp_id(&self) -> u64 {
        self.mp_id
    }

    pub fn is_valid_slot(&self, slot_number: u8) -> bool {
        (1..=self.size).contains(&slot_number)
    }

    /// Records `username` as host and keeps the slot flags in step.
    pub fn set_host(&mut self, username: &str) {
        self.slots.set_host(username);
        self.host = Some(username.to_owned());
    }

    pub fn clear_host(&mut self) {
        self.slots.clear_host();
        self.host = None;
    }

    /// Forgets the recorded host when `username` was it and just lost
    /// their slot.
    pub fn release_host(&mut self, username: &str) {
        if self.host.as_deref() == Some(username) {
            self.host = None;
        }
    }

    pub fn host_slot(&self) -> Option<(u8, &Slot)> {
        self.slots.host()
    }

    /// True when at least one slot is occupied and every occupant is Ready.
    pub fn all_ready(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(|(_, s)| s.status == SlotStatus::Ready)
    }
}
