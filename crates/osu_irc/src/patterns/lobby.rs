use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Identity of a lobby-mutation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyRule {
    Locked,
    Unlocked,
    SizeChanged,
    SettingsChanged,
    PlayerMoved,
    HostChanged,
    HostCleared,
    RoomNameChanged,
    RoomName,
    BeatmapInfo,
    BeatmapChanged,
    BeatmapChangedTo,
    TeamModeInfo,
    ActiveModsInfo,
    PlayerCount,
    SlotInfo,
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

// Fixed sentences first, sentences starting with a username last: a
// username can be anything, so those patterns are the loosest.
const LOBBY_RULES: &[(LobbyRule, &str)] = &[
    (LobbyRule::Locked, r"^Locked the match$"),
    (LobbyRule::Unlocked, r"^Unlocked the match$"),
    (LobbyRule::SizeChanged, r"^Changed match to size (?P<size>\d{1,2})$"),
    (LobbyRule::SettingsChanged, r"^Changed match settings to (?P<settings>.+)$"),
    (LobbyRule::HostCleared, r"^Cleared match host$"),
    (LobbyRule::RoomNameChanged, r#"^Room name updated to "(?P<room_name>.*)"$"#),
    (
        LobbyRule::RoomName,
        r"^Room name: (?P<room_name>.*?)(?:, History: (?P<history>\S+))?$",
    ),
    (
        LobbyRule::BeatmapInfo,
        r"^Beatmap: https://osu\.ppy\.sh/b/(?P<map_id>\d+) (?P<map_repl>.+)$",
    ),
    (
        LobbyRule::BeatmapChanged,
        r"^Beatmap changed to: (?P<map_repl>.+) \(https://osu\.ppy\.sh/b/(?P<map_id>\d+)\)$",
    ),
    (
        LobbyRule::BeatmapChangedTo,
        r"^Changed beatmap to https://osu\.ppy\.sh/b/(?P<map_id>\d+) (?P<map_repl>.+)$",
    ),
    (
        LobbyRule::TeamModeInfo,
        r"^Team mode: (?P<team_mode>\S+), Win condition: (?P<score_mode>\S+)$",
    ),
    (LobbyRule::ActiveModsInfo, r"^Active mods: (?P<mods>.+)$"),
    (LobbyRule::PlayerCount, r"^Players: (?P<player_count>\d+)$"),
    (
        LobbyRule::SlotInfo,
        r"^Slot (?P<slot>\d{1,2})\s+(?P<status>Ready|Not Ready|No Map)\s+https://osu\.ppy\.sh/u/(?P<user_id>\d+) (?P<user_name>\S.*?)\s*(?:\[(?P<flags>[^\]]*)\])?\s*$",
    ),
    (LobbyRule::MatchStarted, r"^The match has started!$"),
    (LobbyRule::MatchAborted, r"^Aborted the match$"),
    (LobbyRule::MatchFinished, r"^The match has finished!$"),
    (
        LobbyRule::GameModeChanged,
        r"^Changed match mode to (?P<game_mode>OsuMania|Osu|Taiko|CatchTheBeat)$",
    ),
    (
        LobbyRule::ModsChanged,
        r"^(?:Disabled all mods|Enabled (?P<enabled_mods>.+)), (?P<freemod>dis|en)abled FreeMod$",
    ),
    (
        LobbyRule::PasswordChanged,
        r"^(?P<password>Removed|Changed) the match password$",
    ),
    (LobbyRule::RefereeAdded, r"^Added (?P<ref>.+) to the match referees$"),
    (LobbyRule::RefereeRemoved, r"^Removed (?P<ref>.+) from the match referees$"),
    (LobbyRule::Kicked, r"^Kicked (?P<user>.+) from the match\.?$"),
    (LobbyRule::Banned, r"^Banned (?P<user>.+) from the match\.?$"),
    (
        LobbyRule::TimerStarted,
        r"^Countdown ends in (?P<amount>\d+) (?P<unit>minutes?|seconds?)",
    ),
    (LobbyRule::TimerAborted, r"^Countdown aborted$"),
    (LobbyRule::Closed, r"^Closed the match$"),
    (LobbyRule::AllPlayersReady, r"^All players are ready$"),
    (
        LobbyRule::PlayerFinished,
        r"^(?P<user>.+) finished playing \(Score: (?P<score>\d+), (?P<status>FAILED|PASSED)\)\.$",
    ),
    (
        LobbyRule::PlayerJoined,
        r"^(?P<user>.+) joined in slot (?P<slot>\d{1,2})(?: for team (?P<team>blue|red))?\.$",
    ),
    (
        LobbyRule::PlayerMoved,
        r"^(?P<username>.+) moved to slot (?P<new_slot>\d{1,2})$",
    ),
    (LobbyRule::HostChanged, r"^(?P<host>.+) became the host\.$"),
    (LobbyRule::TeamChanged, r"^(?P<user>.+) changed to (?P<team>Red|Blue)$"),
    (LobbyRule::PlayerLeft, r"^(?P<user>.+) left the game\.$"),
];

/// The ordered sub-protocol table, compiled once.
pub static LOBBY_PATTERNS: LazyLock<Vec<(LobbyRule, Regex)>> = LazyLock::new(|| {
    LOBBY_RULES
        .iter()
        .filter_map(|(rule, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((*rule, re)),
            Err(e) => {
                log::error!("Invalid lobby pattern for {rule:?}: {e}");
                None
            }
        })
        .collect()
});

const GAME_ID_MARKER: &str = "multiplayer game #";

/// Game id from a lobby topic "... multiplayer game #<id>". `None` when the
/// topic has no marker, `Some(Err)` when the id does not fit a u64.
pub fn game_id_from_topic(topic: &str) -> Option<Result<u64, &str>> {
    let (_, tail) = topic.split_once(GAME_ID_MARKER)?;
    let digits_end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    let digits = &tail[..digits_end];
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().map_err(|_| digits))
}

/// First rule whose pattern matches `text`.
pub fn match_lobby_text(text: &str) -> Option<(LobbyRule, Captures<'_>)> {
    LOBBY_PATTERNS
        .iter()
        .find_map(|(rule, re)| re.captures(text).map(|caps| (*rule, caps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_rule_compiles() {
        assert_eq!(LOBBY_PATTERNS.len(), LOBBY_RULES.len());
    }

    #[test]
    fn test_rule_selection() {
        let cases = [
            ("Locked the match", LobbyRule::Locked),
            ("Unlocked the match", LobbyRule::Unlocked),
            ("Changed match to size 12", LobbyRule::SizeChanged),
            ("Changed match settings to 8 slots, TeamVs, ScoreV2", LobbyRule::SettingsChanged),
            ("_CHIMERA moved to slot 5", LobbyRule::PlayerMoved),
            ("_CHIMERA became the host.", LobbyRule::HostChanged),
            ("Cleared match host", LobbyRule::HostCleared),
            ("Room name updated to \"OWC: (A) vs (B)\"", LobbyRule::RoomNameChanged),
            ("Room name: test, History: https://osu.ppy.sh/mp/1", LobbyRule::RoomName),
            ("Beatmap: https://osu.ppy.sh/b/3360065 Raimukun - Firmament star [Cup]", LobbyRule::BeatmapInfo),
            ("Beatmap changed to: A - B [C] (https://osu.ppy.sh/b/1)", LobbyRule::BeatmapChanged),
            ("Changed beatmap to https://osu.ppy.sh/b/1 A - B [C]", LobbyRule::BeatmapChangedTo),
            ("Team mode: HeadToHead, Win condition: Score", LobbyRule::TeamModeInfo),
            ("Active mods: Hidden, Freemod", LobbyRule::ActiveModsInfo),
            ("Players: 2", LobbyRule::PlayerCount),
            (
                "Slot 1  Not Ready https://osu.ppy.sh/u/6008293 _CHIMERA        [Host / Team Blue / Hidden]",
                LobbyRule::SlotInfo,
            ),
            ("The match has started!", LobbyRule::MatchStarted),
            ("Aborted the match", LobbyRule::MatchAborted),
            ("The match has finished!", LobbyRule::MatchFinished),
            ("_CHIMERA changed to Blue", LobbyRule::TeamChanged),
            ("Changed match mode to Taiko", LobbyRule::GameModeChanged),
            ("Enabled Hidden, HardRock, disabled FreeMod", LobbyRule::ModsChanged),
            ("Disabled all mods, enabled FreeMod", LobbyRule::ModsChanged),
            ("Removed the match password", LobbyRule::PasswordChanged),
            ("Added peppy to the match referees", LobbyRule::RefereeAdded),
            ("Removed peppy from the match referees", LobbyRule::RefereeRemoved),
            ("Kicked peppy from the match.", LobbyRule::Kicked),
            ("Banned peppy from the match.", LobbyRule::Banned),
            ("Countdown ends in 30 seconds", LobbyRule::TimerStarted),
            ("Countdown aborted", LobbyRule::TimerAborted),
            ("Closed the match", LobbyRule::Closed),
            ("_CHIMERA joined in slot 1 for team blue.", LobbyRule::PlayerJoined),
            ("_CHIMERA joined in slot 3.", LobbyRule::PlayerJoined),
            ("_CHIMERA left the game.", LobbyRule::PlayerLeft),
            ("All players are ready", LobbyRule::AllPlayersReady),
            ("_CHIMERA finished playing (Score: 727, PASSED).", LobbyRule::PlayerFinished),
        ];
        for (text, expected) in cases {
            let (rule, _) = match_lobby_text(text).unwrap_or_else(|| panic!("no rule for {text:?}"));
            assert_eq!(rule, expected, "{text:?}");
        }
    }

    #[test]
    fn test_slot_info_captures() {
        let text = "Slot 1  Not Ready https://osu.ppy.sh/u/6008293 _CHIMERA        [Host / Team Blue / Hidden]";
        let (_, caps) = match_lobby_text(text).unwrap();
        assert_eq!(&caps["slot"], "1");
        assert_eq!(&caps["status"], "Not Ready");
        assert_eq!(&caps["user_id"], "6008293");
        assert_eq!(&caps["user_name"], "_CHIMERA");
        assert_eq!(&caps["flags"], "Host / Team Blue / Hidden");

        let text = "Slot 2  Ready      https://osu.ppy.sh/u/2 peppy";
        let (_, caps) = match_lobby_text(text).unwrap();
        assert_eq!(&caps["user_name"], "peppy");
        assert!(caps.name("flags").is_none());

        let text = "Slot 3  Ready      https://osu.ppy.sh/u/124493 Some Player     [Host / Team Red]";
        let (_, caps) = match_lobby_text(text).unwrap();
        assert_eq!(&caps["user_name"], "Some Player");
        assert_eq!(&caps["flags"], "Host / Team Red");
    }

    #[test]
    fn test_decorative_chatter_is_unmatched() {
        for text in ["Good luck, have fun!", "Match starts in 10 seconds", ""] {
            assert!(match_lobby_text(text).is_none(), "{text:?}");
        }
    }

    #[test]
    fn test_game_id_from_topic() {
        assert_eq!(game_id_from_topic("multiplayer game #98765"), Some(Ok(98765)));
        assert_eq!(game_id_from_topic("osu! chat"), None);
        assert_eq!(game_id_from_topic("multiplayer game #"), None);
        assert_eq!(
            game_id_from_topic("multiplayer game #99999999999999999999999"),
            Some(Err("99999999999999999999999"))
        );
    }
}
