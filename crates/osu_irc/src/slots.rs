use std::collections::{BTreeMap, HashMap};

use crate::osu::Mods;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Team {
    #[default]
    Neutral,
    Blue,
    Red,
}

impl Team {
    /// Accepts both "Blue" (slot flags, team changes) and "blue" (join lines).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blue" => Some(Team::Blue),
            "red" => Some(Team::Red),
            "neutral" => Some(Team::Neutral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotStatus {
    #[default]
    NotReady,
    Ready,
    NoMap,
}

impl SlotStatus {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Not Ready" => Some(SlotStatus::NotReady),
            "Ready" => Some(SlotStatus::Ready),
            "No Map" => Some(SlotStatus::NoMap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::NotReady => "Not Ready",
            SlotStatus::Ready => "Ready",
            SlotStatus::NoMap => "No Map",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub username: String,
    /// Unknown until a WHOIS reply or a settings dump reveals it.
    pub user_id: Option<u64>,
    pub status: SlotStatus,
    pub is_host: bool,
    pub team: Team,
    pub enabled_mods: Mods,
}

impl Slot {
    pub fn new(username: &str) -> Self {
        Slot {
            username: username.to_owned(),
            user_id: None,
            status: SlotStatus::NotReady,
            is_host: false,
            team: Team::Neutral,
            enabled_mods: Mods::empty(),
        }
    }
}

/// Slot number -> occupant, with a reverse index username -> slot number.
///
/// Every mutation goes through this type so both maps change together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTable {
    slots: BTreeMap<u8, Slot>,
    by_username: HashMap<String, u8>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot_number: u8) -> Option<&Slot> {
        self.slots.get(&slot_number)
    }

    pub fn get_mut(&mut self, slot_number: u8) -> Option<&mut Slot> {
        self.slots.get_mut(&slot_number)
    }

    pub fn slot_of(&self, username: &str) -> Option<u8> {
        self.by_username.get(username).copied()
    }

    pub fn get_by_user(&self, username: &str) -> Option<&Slot> {
        self.slot_of(username).and_then(|n| self.slots.get(&n))
    }

    pub fn get_by_user_mut(&mut self, username: &str) -> Option<&mut Slot> {
        let n = self.slot_of(username)?;
        self.slots.get_mut(&n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Slot)> {
        self.slots.iter().map(|(n, s)| (*n, s))
    }

    /// Writes `slot` at `slot_number`. A previous occupant of that number and
    /// any previous slot of the same username are evicted first.
    pub fn set(&mut self, slot_number: u8, slot: Slot) -> Option<Slot> {
        if let Some(old_number) = self.by_username.remove(&slot.username) {
            self.slots.remove(&old_number);
        }
        let evicted = self.slots.remove(&slot_number);
        if let Some(evicted) = &evicted {
            self.by_username.remove(&evicted.username);
        }
        self.by_username.insert(slot.username.clone(), slot_number);
        self.slots.insert(slot_number, slot);
        evicted
    }

    /// Moves a user to `new_slot`. Returns the old slot number, or `None`
    /// when the user had no slot.
    pub fn move_user(&mut self, username: &str, new_slot: u8) -> Option<u8> {
        let old_slot = self.by_username.get(username).copied()?;
        if old_slot == new_slot {
            return Some(old_slot);
        }
        let slot = self.slots.remove(&old_slot)?;
        self.by_username.remove(username);
        self.set(new_slot, slot);
        Some(old_slot)
    }

    pub fn remove(&mut self, slot_number: u8) -> Option<Slot> {
        let slot = self.slots.remove(&slot_number)?;
        self.by_username.remove(&slot.username);
        Some(slot)
    }

    pub fn remove_user(&mut self, username: &str) -> Option<(u8, Slot)> {
        let slot_number = self.by_username.remove(username)?;
        self.slots.remove(&slot_number).map(|s| (slot_number, s))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_username.clear();
    }

    pub fn host(&self) -> Option<(u8, &Slot)> {
        self.iter().find(|(_, s)| s.is_host)
    }

    /// Marks `username` as the only host. Returns false when the user has
    /// no slot, in which case every host flag is still cleared.
    pub fn set_host(&mut self, username: &str) -> bool {
        let mut found = false;
        for slot in self.slots.values_mut() {
            slot.is_host = slot.username == username;
            found |= slot.is_host;
        }
        found
    }

    pub fn clear_host(&mut self) {
        for slot in self.slots.values_mut() {
            slot.is_host = false;
        }
    }

    /// Both indices agree and no username is held twice.
    pub fn is_consistent(&self) -> bool {
        self.slots.len() == self.by_username.len()
            && self
                .slots
                .iter()
                .all(|(n, s)| self.by_username.get(&s.username) == Some(n))
            && self.slots.values().filter(|s| s.is_host).count() <= 1
    }
}
