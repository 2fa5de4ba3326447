use log::debug;
use regex::Captures;
use std::str::FromStr;

use crate::{
    channels::Lobby,
    constants::MAX_LOBBY_SIZE,
    errors::IrcClientError,
    events::LobbyChange,
    osu::{Beatmap, GameMode, Mods, ScoreMode, TeamMode},
    patterns::lobby::{LobbyRule, match_lobby_text},
    slots::{Slot, SlotStatus, Team},
};

/// Applies one line of bot text to `lobby`.
///
/// Returns `Ok(None)` for chatter that matches no rule. A rule whose
/// captures fail to convert returns `InvalidCapture` and leaves the lobby
/// untouched: every field is validated before the first write.
pub fn apply_lobby_text(lobby: &mut Lobby, text: &str) -> Result<Option<LobbyChange>, IrcClientError> {
    let Some((rule, caps)) = match_lobby_text(text) else {
        return Ok(None);
    };
    debug!("#mp_{} {rule:?}: {text}", lobby.mp_id());
    apply_rule(lobby, rule, &caps).map(Some)
}

fn apply_rule(
    lobby: &mut Lobby,
    rule: LobbyRule,
    caps: &Captures<'_>,
) -> Result<LobbyChange, IrcClientError> {
    match rule {
        LobbyRule::Locked => {
            lobby.locked = true;
            Ok(LobbyChange::Locked)
        }
        LobbyRule::Unlocked => {
            lobby.locked = false;
            Ok(LobbyChange::Unlocked)
        }
        LobbyRule::SizeChanged => {
            let new = cap_size(caps, "size")?;
            let old = std::mem::replace(&mut lobby.size, new);
            Ok(LobbyChange::SizeChanged { old, new })
        }
        LobbyRule::SettingsChanged => on_settings_changed(lobby, caps),
        LobbyRule::PlayerMoved => on_player_moved(lobby, caps),
        LobbyRule::HostChanged => {
            let new = cap(caps, "host")?.to_owned();
            let old = lobby.host.clone();
            lobby.set_host(&new);
            Ok(LobbyChange::HostChanged { old, new })
        }
        LobbyRule::HostCleared => {
            let old = lobby.host.clone();
            lobby.clear_host();
            Ok(LobbyChange::HostCleared { old })
        }
        LobbyRule::RoomNameChanged | LobbyRule::RoomName => {
            let new = cap(caps, "room_name")?.to_owned();
            let old = lobby.room_name.replace(new.clone());
            Ok(LobbyChange::RoomNameChanged { old, new })
        }
        LobbyRule::BeatmapInfo | LobbyRule::BeatmapChanged | LobbyRule::BeatmapChangedTo => {
            let map_id = cap_num(caps, "map_id")?;
            let new = Beatmap::from_label(map_id, cap(caps, "map_repl")?);
            let old = lobby.current_map.replace(new.clone());
            Ok(LobbyChange::BeatmapChanged { old, new })
        }
        LobbyRule::TeamModeInfo => {
            let new_team_mode = cap_name(caps, "team_mode", TeamMode::from_name)?;
            let new_score_mode = cap_name(caps, "score_mode", ScoreMode::from_name)?;
            let old_team_mode = std::mem::replace(&mut lobby.team_mode, new_team_mode);
            let old_score_mode = std::mem::replace(&mut lobby.score_mode, new_score_mode);
            Ok(LobbyChange::TeamModeUpdated {
                old_team_mode,
                new_team_mode,
                old_score_mode,
                new_score_mode,
            })
        }
        LobbyRule::ActiveModsInfo => {
            let (freemod, mods) = parse_active_mods(cap(caps, "mods")?);
            let old_mods = std::mem::replace(&mut lobby.active_mods, mods);
            let old_freemod = std::mem::replace(&mut lobby.freemod, freemod);
            Ok(LobbyChange::ActiveModsUpdated {
                old_mods,
                new_mods: mods,
                old_freemod,
                new_freemod: freemod,
            })
        }
        LobbyRule::PlayerCount => {
            let new = cap_num(caps, "player_count")?;
            let old = std::mem::replace(&mut lobby.player_count, new);
            // One slot line per occupant follows.
            lobby.slots.clear();
            Ok(LobbyChange::PlayerCountUpdated { old, new })
        }
        LobbyRule::SlotInfo => on_slot_info(lobby, caps),
        LobbyRule::MatchStarted => {
            lobby.started = true;
            Ok(LobbyChange::MatchStarted)
        }
        LobbyRule::MatchAborted => {
            lobby.started = false;
            Ok(LobbyChange::MatchAborted)
        }
        LobbyRule::MatchFinished => {
            lobby.started = false;
            Ok(LobbyChange::MatchFinished)
        }
        LobbyRule::TeamChanged => {
            let username = cap(caps, "user")?.to_owned();
            let new = cap_name(caps, "team", Team::from_name)?;
            let old = match lobby.slots.get_by_user_mut(&username) {
                Some(slot) => std::mem::replace(&mut slot.team, new),
                None => {
                    debug!("Team change for {username} who holds no slot");
                    Team::Neutral
                }
            };
            Ok(LobbyChange::TeamChanged { username, old, new })
        }
        LobbyRule::GameModeChanged => {
            let new = cap_name(caps, "game_mode", GameMode::from_name)?;
            let old = std::mem::replace(&mut lobby.game_mode, new);
            Ok(LobbyChange::GameModeChanged { old, new })
        }
        LobbyRule::ModsChanged => {
            let new_mods = caps
                .name("enabled_mods")
                .map_or(Mods::empty(), |m| Mods::from_list(m.as_str()));
            let new_freemod = cap(caps, "freemod")? == "en";
            let old_mods = std::mem::replace(&mut lobby.active_mods, new_mods);
            let old_freemod = std::mem::replace(&mut lobby.freemod, new_freemod);
            Ok(LobbyChange::ModsChanged {
                old_mods,
                new_mods,
                old_freemod,
                new_freemod,
            })
        }
        LobbyRule::PasswordChanged => {
            lobby.has_password = cap(caps, "password")? == "Changed";
            Ok(LobbyChange::PasswordChanged {
                has_password: lobby.has_password,
            })
        }
        LobbyRule::RefereeAdded => {
            let referee = cap(caps, "ref")?.to_owned();
            lobby.referees.insert(referee.clone());
            Ok(LobbyChange::RefereeAdded(referee))
        }
        LobbyRule::RefereeRemoved => {
            let referee = cap(caps, "ref")?.to_owned();
            lobby.referees.remove(&referee);
            Ok(LobbyChange::RefereeRemoved(referee))
        }
        LobbyRule::Kicked => Ok(LobbyChange::Kicked(cap(caps, "user")?.to_owned())),
        LobbyRule::Banned => Ok(LobbyChange::Banned(cap(caps, "user")?.to_owned())),
        LobbyRule::TimerStarted => {
            let amount: u64 = cap_num(caps, "amount")?;
            let unit = if cap(caps, "unit")?.starts_with("minute") { 60 } else { 1 };
            let seconds = amount
                .checked_mul(unit)
                .ok_or_else(|| IrcClientError::invalid_capture("amount", &amount.to_string()))?;
            Ok(LobbyChange::TimerStarted { seconds })
        }
        LobbyRule::TimerAborted => Ok(LobbyChange::TimerAborted),
        LobbyRule::Closed => Ok(LobbyChange::Closed),
        LobbyRule::PlayerJoined => {
            let username = cap(caps, "user")?.to_owned();
            let slot_number = cap_slot(lobby, caps, "slot")?;
            let team = match caps.name("team") {
                Some(team) => cap_name(caps, "team", Team::from_name).unwrap_or_else(|_| {
                    debug!("Unknown team {:?}", team.as_str());
                    Team::Neutral
                }),
                None => Team::Neutral,
            };
            let mut slot = Slot::new(&username);
            slot.team = team;
            if let Some(evicted) = lobby.slots.set(slot_number, slot) {
                lobby.release_host(&evicted.username);
            }
            Ok(LobbyChange::PlayerJoined {
                username,
                slot: slot_number,
                team,
            })
        }
        LobbyRule::PlayerLeft => {
            let username = cap(caps, "user")?.to_owned();
            let slot = lobby.slots.remove_user(&username).map(|(n, _)| n);
            lobby.release_host(&username);
            Ok(LobbyChange::PlayerLeft { username, slot })
        }
        LobbyRule::AllPlayersReady => Ok(LobbyChange::AllPlayersReady),
        LobbyRule::PlayerFinished => Ok(LobbyChange::PlayerFinished {
            username: cap(caps, "user")?.to_owned(),
            score: cap_num(caps, "score")?,
            passed: cap(caps, "status")? == "PASSED",
        }),
    }
}

// "8 slots, TeamVs, ScoreV2": any clause may be missing.
fn on_settings_changed(lobby: &mut Lobby, caps: &Captures<'_>) -> Result<LobbyChange, IrcClientError> {
    let settings = cap(caps, "settings")?;
    let mut size = lobby.size;
    let mut team_mode = lobby.team_mode;
    let mut score_mode = lobby.score_mode;
    for clause in settings.split(',').map(str::trim) {
        if let Some(slots) = clause.strip_suffix(" slots") {
            size = parse_size(slots)?;
        } else if let Some(mode) = TeamMode::from_name(clause) {
            team_mode = mode;
        } else if let Some(mode) = ScoreMode::from_name(clause) {
            score_mode = mode;
        } else {
            debug!("Unknown settings clause {clause:?}");
        }
    }

    let change = LobbyChange::SettingsChanged {
        old_size: lobby.size,
        new_size: size,
        old_team_mode: lobby.team_mode,
        new_team_mode: team_mode,
        old_score_mode: lobby.score_mode,
        new_score_mode: score_mode,
    };
    lobby.size = size;
    lobby.team_mode = team_mode;
    lobby.score_mode = score_mode;
    Ok(change)
}

fn on_player_moved(lobby: &mut Lobby, caps: &Captures<'_>) -> Result<LobbyChange, IrcClientError> {
    let username = cap(caps, "username")?.to_owned();
    let new_slot = cap_slot(lobby, caps, "new_slot")?;
    let displaced = lobby
        .slots
        .get(new_slot)
        .filter(|occupant| occupant.username != username)
        .map(|occupant| occupant.username.clone());
    let old_slot = lobby.slots.move_user(&username, new_slot);
    if old_slot.is_none() {
        // Joined before we started tracking the lobby.
        lobby.slots.set(new_slot, Slot::new(&username));
    }
    if let Some(displaced) = displaced {
        lobby.release_host(&displaced);
    }
    Ok(LobbyChange::PlayerMoved {
        username,
        old_slot,
        new_slot,
    })
}

// Slot 1  Not Ready https://osu.ppy.sh/u/6008293 _CHIMERA        [Host / Team Blue / Hidden]
fn on_slot_info(lobby: &mut Lobby, caps: &Captures<'_>) -> Result<LobbyChange, IrcClientError> {
    let slot_number = cap_slot(lobby, caps, "slot")?;
    let status = cap_name(caps, "status", SlotStatus::from_name)?;
    let user_id: u64 = cap_num(caps, "user_id")?;
    let username = cap(caps, "user_name")?;

    let mut slot = Slot::new(username);
    slot.user_id = Some(user_id);
    slot.status = status;
    if let Some(flags) = caps.name("flags") {
        for flag in flags.as_str().split(" / ").map(str::trim) {
            if flag == "Host" {
                slot.is_host = true;
            } else if let Some(team) = flag.strip_prefix("Team ").and_then(Team::from_name) {
                slot.team = team;
            } else if !flag.is_empty() {
                slot.enabled_mods |= Mods::from_list(flag);
            }
        }
    }

    let is_host = slot.is_host;
    let old = lobby.slots.get(slot_number).cloned();
    lobby.slots.set(slot_number, slot.clone());
    if let Some(evicted) = old.as_ref().filter(|o| o.username != username) {
        lobby.release_host(&evicted.username);
    }
    if is_host {
        lobby.set_host(username);
    } else if lobby.host.as_deref() == Some(username) {
        lobby.host = None;
    }
    Ok(LobbyChange::SlotUpdated {
        slot_number,
        old,
        new: slot,
    })
}

/// Splits "Hidden, Freemod" into the freemod flag and the mod set.
fn parse_active_mods(list: &str) -> (bool, Mods) {
    let (freemod, mods): (Vec<&str>, Vec<&str>) = list
        .split(',')
        .map(str::trim)
        .partition(|token| token.eq_ignore_ascii_case("Freemod"));
    (!freemod.is_empty(), Mods::from_list(&mods.join(",")))
}

fn cap<'t>(caps: &Captures<'t>, field: &'static str) -> Result<&'t str, IrcClientError> {
    caps.name(field)
        .map(|m| m.as_str())
        .ok_or_else(|| IrcClientError::invalid_capture(field, ""))
}

fn cap_num<T: FromStr>(caps: &Captures<'_>, field: &'static str) -> Result<T, IrcClientError> {
    let value = cap(caps, field)?;
    value
        .parse()
        .map_err(|_| IrcClientError::invalid_capture(field, value))
}

fn cap_name<T>(
    caps: &Captures<'_>,
    field: &'static str,
    lookup: fn(&str) -> Option<T>,
) -> Result<T, IrcClientError> {
    let value = cap(caps, field)?;
    lookup(value).ok_or_else(|| IrcClientError::invalid_capture(field, value))
}

fn cap_size(caps: &Captures<'_>, field: &'static str) -> Result<u8, IrcClientError> {
    parse_size(cap(caps, field)?)
}

fn parse_size(value: &str) -> Result<u8, IrcClientError> {
    match value.trim().parse::<u8>() {
        Ok(size) if (1..=MAX_LOBBY_SIZE).contains(&size) => Ok(size),
        _ => Err(IrcClientError::invalid_capture("size", value)),
    }
}

fn cap_slot(lobby: &Lobby, caps: &Captures<'_>, field: &'static str) -> Result<u8, IrcClientError> {
    let value = cap(caps, field)?;
    match value.parse::<u8>() {
        Ok(n) if lobby.is_valid_slot(n) => Ok(n),
        _ => Err(IrcClientError::invalid_capture(field, value)),
    }
}
