use bitflags::bitflags;
use log::warn;
use std::fmt::Display;

use crate::constants::BEATMAP_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameMode {
    #[default]
    Osu = 0,
    Taiko = 1,
    CatchTheBeat = 2,
    OsuMania = 3,
}

impl GameMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Osu" => Some(GameMode::Osu),
            "Taiko" => Some(GameMode::Taiko),
            "CatchTheBeat" => Some(GameMode::CatchTheBeat),
            "OsuMania" => Some(GameMode::OsuMania),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScoreMode {
    #[default]
    Score = 0,
    Accuracy = 1,
    Combo = 2,
    ScoreV2 = 3,
}

impl ScoreMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Score" => Some(ScoreMode::Score),
            "Accuracy" => Some(ScoreMode::Accuracy),
            "Combo" => Some(ScoreMode::Combo),
            "ScoreV2" => Some(ScoreMode::ScoreV2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TeamMode {
    #[default]
    HeadToHead = 0,
    TagCoop = 1,
    TeamVs = 2,
    TagTeamVs = 3,
}

impl TeamMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "HeadToHead" => Some(TeamMode::HeadToHead),
            "TagCoop" => Some(TeamMode::TagCoop),
            "TeamVs" => Some(TeamMode::TeamVs),
            "TagTeamVs" => Some(TeamMode::TagTeamVs),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mods: u32 {
        const NO_FAIL = 1;
        const EASY = 1 << 1;
        const TOUCH_DEVICE = 1 << 2;
        const HIDDEN = 1 << 3;
        const HARD_ROCK = 1 << 4;
        const SUDDEN_DEATH = 1 << 5;
        const DOUBLE_TIME = 1 << 6;
        const RELAX = 1 << 7;
        const HALF_TIME = 1 << 8;
        const NIGHTCORE = 1 << 9;
        const FLASHLIGHT = 1 << 10;
        const AUTOPLAY = 1 << 11;
        const SPUN_OUT = 1 << 12;
        const RELAX2 = 1 << 13;
        const PERFECT = 1 << 14;
        const KEY4 = 1 << 15;
        const KEY5 = 1 << 16;
        const KEY6 = 1 << 17;
        const KEY7 = 1 << 18;
        const KEY8 = 1 << 19;
        const FADE_IN = 1 << 20;
        const RANDOM = 1 << 21;
        const CINEMA = 1 << 22;
        const TARGET = 1 << 23;
        const KEY9 = 1 << 24;
        const KEY_COOP = 1 << 25;
        const KEY1 = 1 << 26;
        const KEY3 = 1 << 27;
        const KEY2 = 1 << 28;
        const SCORE_V2 = 1 << 29;
        const MIRROR = 1 << 30;

        const KEY_MOD = Self::KEY1.bits() | Self::KEY2.bits() | Self::KEY3.bits()
            | Self::KEY4.bits() | Self::KEY5.bits() | Self::KEY6.bits()
            | Self::KEY7.bits() | Self::KEY8.bits() | Self::KEY9.bits()
            | Self::KEY_COOP.bits();
    }
}

impl Mods {
    /// Name used by the bot in its announcements ("Hidden", "HardRock", ...).
    pub fn from_bancho_name(name: &str) -> Option<Self> {
        let mods = match name {
            "None" | "NoMod" => Mods::empty(),
            "NoFail" => Mods::NO_FAIL,
            "Easy" => Mods::EASY,
            "TouchDevice" => Mods::TOUCH_DEVICE,
            "Hidden" => Mods::HIDDEN,
            "HardRock" => Mods::HARD_ROCK,
            "SuddenDeath" => Mods::SUDDEN_DEATH,
            "DoubleTime" => Mods::DOUBLE_TIME,
            "Relax" => Mods::RELAX,
            "HalfTime" => Mods::HALF_TIME,
            "Nightcore" => Mods::NIGHTCORE,
            "Flashlight" => Mods::FLASHLIGHT,
            "Autoplay" => Mods::AUTOPLAY,
            "SpunOut" => Mods::SPUN_OUT,
            "Relax2" => Mods::RELAX2,
            "Perfect" => Mods::PERFECT,
            "Key4" => Mods::KEY4,
            "Key5" => Mods::KEY5,
            "Key6" => Mods::KEY6,
            "Key7" => Mods::KEY7,
            "Key8" => Mods::KEY8,
            "FadeIn" => Mods::FADE_IN,
            "Random" => Mods::RANDOM,
            "Cinema" => Mods::CINEMA,
            "Target" => Mods::TARGET,
            "Key9" => Mods::KEY9,
            "KeyCoop" => Mods::KEY_COOP,
            "Key1" => Mods::KEY1,
            "Key3" => Mods::KEY3,
            "Key2" => Mods::KEY2,
            "ScoreV2" => Mods::SCORE_V2,
            "Mirror" => Mods::MIRROR,
            _ => return None,
        };
        Some(mods)
    }

    /// Parses a comma separated mod list. Unknown tokens are logged and skipped.
    pub fn from_list(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .fold(Mods::empty(), |acc, token| match Mods::from_bancho_name(token) {
                Some(m) => acc | m,
                None => {
                    warn!("Unknown mod token: {token:?}");
                    acc
                }
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Beatmap {
    pub id: u64,
    pub artist: String,
    pub title: String,
    pub version: String,
}

impl Beatmap {
    pub fn new(id: u64, artist: &str, title: &str, version: &str) -> Self {
        Beatmap {
            id,
            artist: artist.to_owned(),
            title: title.to_owned(),
            version: version.to_owned(),
        }
    }

    /// Splits an "Artist - Title [Version]" label.
    ///
    /// The artist ends at the first `" - "`, the version starts at the last
    /// `" ["`. A title containing its own `" ["` before the version marker is
    /// split at that later marker, so "A - B [x] [Hard]" keeps "B [x]" as
    /// the title.
    pub fn from_label(id: u64, label: &str) -> Self {
        let (artist, rest) = label.split_once(" - ").unwrap_or(("", label));
        let (title, version) = match rest.rsplit_once(" [") {
            Some((title, version)) => (title, version.strip_suffix(']').unwrap_or(version)),
            None => (rest, ""),
        };
        Beatmap::new(id, artist.trim(), title.trim(), version)
    }

    pub fn url(&self) -> String {
        format!("{BEATMAP_URL}{}", self.id)
    }
}

impl Display for Beatmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} [{}]", self.artist, self.title, self.version)
    }
}
