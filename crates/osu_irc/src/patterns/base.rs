use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_till1, take_while_m_n},
    character::complete::{digit1, one_of},
    combinator::{opt, rest},
    error::{Error, ErrorKind},
};
use std::str::FromStr;

use crate::constants::*;

// Bancho lines follow the RFC 2812 shape
//
//     message    =  [ ":" prefix SPACE ] command [ params ] crlf
//     prefix     =  servername / ( nickname [ [ "!" user ] "@" host ] )
//
// but with fixed hosts: numerics always come from `cho.ppy.sh`, user
// commands from `<nick>!cho@ppy.sh`, and channel modes from
// `<nick>!cho@cho.ppy.sh`. Each pattern below recognises one line shape.

/// A classified server line with its captured fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Welcome,
    Motd { code: u16, text: String },
    LoginFailed(String),
    Ping(String),
    Quit { user: String, reason: String },
    Join { user: String, channel: String },
    Part { user: String, channel: String },
    Mode {
        admin: String,
        channel: String,
        mode: String,
        user: String,
    },
    Privmsg {
        sender: String,
        target: String,
        text: String,
    },
    Topic { channel: String, topic: String },
    CreationTime { channel: String, time: u64 },
    Names { channel: String, names: String },
    EndOfNames { channel: String },
    WhoisUser { username: String, user_id: u64 },
    WhoisServer {
        username: String,
        server: String,
        info: String,
    },
    WhoisChannels { username: String, channels: String },
    EndOfWhois { username: String },
}

pub type LineParser = fn(&str) -> IResult<&str, ServerMessage>;

/// One entry of the ordered base-protocol table.
pub struct BasePattern {
    pub name: &'static str,
    pub parse: LineParser,
}

/// Tried in order, the first pattern that matches wins.
pub static BASE_PATTERNS: &[BasePattern] = &[
    BasePattern { name: "PING", parse: valid_ping_parser },
    BasePattern { name: "ERR_PASSWDMISMATCH", parse: valid_login_failed_parser },
    BasePattern { name: "RPL_WELCOME", parse: valid_welcome_parser },
    BasePattern { name: "RPL_MOTD", parse: valid_motd_parser },
    BasePattern { name: "QUIT", parse: valid_quit_parser },
    BasePattern { name: "JOIN", parse: valid_join_parser },
    BasePattern { name: "PART", parse: valid_part_parser },
    BasePattern { name: "MODE", parse: valid_mode_parser },
    BasePattern { name: "PRIVMSG", parse: valid_privmsg_parser },
    BasePattern { name: "RPL_TOPIC", parse: valid_topic_parser },
    BasePattern { name: "RPL_TOPICWHOTIME", parse: valid_creation_time_parser },
    BasePattern { name: "RPL_NAMREPLY", parse: valid_names_parser },
    BasePattern { name: "RPL_ENDOFNAMES", parse: valid_end_of_names_parser },
    BasePattern { name: "RPL_WHOISUSER", parse: valid_whois_user_parser },
    BasePattern { name: "RPL_WHOISSERVER", parse: valid_whois_server_parser },
    BasePattern { name: "RPL_WHOISCHANNELS", parse: valid_whois_channels_parser },
    BasePattern { name: "RPL_ENDOFWHOIS", parse: valid_end_of_whois_parser },
];

/// Outcome of running a line through the table.
#[derive(Debug, PartialEq)]
pub enum Classified<'a> {
    Matched(&'static str, ServerMessage),
    /// A pattern recognised the line shape but a field failed to convert.
    Malformed { pattern: &'static str, field: &'a str },
    Unmatched,
}

pub fn classify(line: &str) -> Classified<'_> {
    for pattern in BASE_PATTERNS {
        match (pattern.parse)(line) {
            Ok((_rem, message)) => return Classified::Matched(pattern.name, message),
            Err(nom::Err::Failure(e)) => {
                return Classified::Malformed {
                    pattern: pattern.name,
                    field: e.input,
                };
            }
            Err(_) => continue,
        }
    }
    Classified::Unmatched
}

// --- shared pieces ---

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == ' ').parse(input)
}

/// Digits converted to `T`; a conversion failure is a hard failure so the
/// table does not fall through to a looser pattern.
fn number<T: FromStr>(input: &str) -> IResult<&str, T> {
    let res: IResult<&str, &str> = digit1(input);
    let (rem, digits) = res?;
    let value = digits
        .parse()
        .map_err(|_| nom::Err::Failure(Error::new(digits, ErrorKind::Digit)))?;
    Ok((rem, value))
}

/// `:cho.ppy.sh <3 digits> <nick> ` -> (code, nick)
fn server_reply(input: &str) -> IResult<&str, (u16, &str)> {
    let (rem, (_, _, _, code, _, nick, _)) = (
        tag(":"),
        tag(SERVER_NAME),
        tag(" "),
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
        tag(" "),
        word,
        tag(" "),
    )
        .parse(input)?;
    let code = code
        .parse::<u16>()
        .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Digit)))?;
    Ok((rem, (code, nick)))
}

fn numeric(input: &str, expected: u16) -> IResult<&str, &str> {
    let (rem, (code, nick)) = server_reply(input)?;
    if code != expected {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    Ok((rem, nick))
}

/// `:<nick>!<host> ` -> nick
fn user_prefix<'a>(input: &'a str, host: &str) -> IResult<&'a str, &'a str> {
    let (rem, (_, nick, _, _, _)) = (
        tag(":"),
        take_till1(|c: char| c == '!' || c == ' '),
        tag("!"),
        tag(host),
        tag(" "),
    )
        .parse(input)?;
    Ok((rem, nick))
}

// --- patterns ---

//    PING :irc.funet.fi              ; Ping message sent by server
//
// The token is echoed back verbatim, an empty one included.
pub fn valid_ping_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, (_, token)) = (tag("PING"), opt((tag(" "), rest))).parse(input)?;
    let token = token.map(|(_, t)| t).unwrap_or_default();
    Ok((rem, ServerMessage::Ping(token.to_owned())))
}

pub fn valid_login_failed_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, ERR_PASSWDMISMATCH_NB)?;
    let (rem, (_, text)) = (opt(tag(":")), rest).parse(rem)?;
    Ok((rem, ServerMessage::LoginFailed(text.to_owned())))
}

pub fn valid_welcome_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_WELCOME_NB)?;
    Ok((rem, ServerMessage::Welcome))
}

pub fn valid_motd_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, (code, _nick)) = server_reply(input)?;
    if !matches!(code, RPL_MOTD_NB | RPL_MOTDSTART_NB | RPL_ENDOFMOTD_NB) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let (rem, (_, text)) = (tag(":"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Motd {
            code,
            text: text.to_owned(),
        },
    ))
}

pub fn valid_quit_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, user) = user_prefix(input, USER_HOST)?;
    let (rem, (_, _, reason)) = (tag("QUIT "), opt(tag(":")), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Quit {
            user: user.to_owned(),
            reason: reason.to_owned(),
        },
    ))
}

pub fn valid_join_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, user) = user_prefix(input, USER_HOST)?;
    let (rem, (_, _, channel)) = (tag("JOIN "), opt(tag(":")), word).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Join {
            user: user.to_owned(),
            channel: channel.to_owned(),
        },
    ))
}

pub fn valid_part_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, user) = user_prefix(input, USER_HOST)?;
    let (rem, (_, _, channel)) = (tag("PART "), opt(tag(":")), word).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Part {
            user: user.to_owned(),
            channel: channel.to_owned(),
        },
    ))
}

pub fn valid_mode_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, admin) = user_prefix(input, OPERATOR_HOST)?;
    let (rem, (_, channel, _, sign, flag, _, user)) = (
        tag("MODE "),
        word,
        tag(" "),
        one_of("+-"),
        one_of("ov"),
        tag(" "),
        word,
    )
        .parse(rem)?;
    Ok((
        rem,
        ServerMessage::Mode {
            admin: admin.to_owned(),
            channel: channel.to_owned(),
            mode: format!("{sign}{flag}"),
            user: user.to_owned(),
        },
    ))
}

pub fn valid_privmsg_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, sender) = user_prefix(input, USER_HOST)?;
    let (rem, (_, target, _, text)) = (tag("PRIVMSG "), word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Privmsg {
            sender: sender.to_owned(),
            target: target.to_owned(),
            text: text.to_owned(),
        },
    ))
}

pub fn valid_topic_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_TOPIC_NB)?;
    let (rem, (channel, _, topic)) = (word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Topic {
            channel: channel.to_owned(),
            topic: topic.to_owned(),
        },
    ))
}

pub fn valid_creation_time_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_TOPICWHOTIME_NB)?;
    let (rem, (channel, _, _setter, _, time)) =
        (word, tag(" "), word, tag(" "), number::<u64>).parse(rem)?;
    Ok((
        rem,
        ServerMessage::CreationTime {
            channel: channel.to_owned(),
            time,
        },
    ))
}

pub fn valid_names_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_NAMREPLY_NB)?;
    let (rem, (_, _, channel, _, names)) =
        (one_of("=*@"), tag(" "), word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::Names {
            channel: channel.to_owned(),
            names: names.to_owned(),
        },
    ))
}

pub fn valid_end_of_names_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_ENDOFNAMES_NB)?;
    let (rem, (channel, _, _)) = (word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::EndOfNames {
            channel: channel.to_owned(),
        },
    ))
}

pub fn valid_whois_user_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_WHOISUSER_NB)?;
    let (rem, (username, _, _, user_id, _)) =
        (word, tag(" "), tag(PROFILE_URL), number::<u64>, rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::WhoisUser {
            username: username.to_owned(),
            user_id,
        },
    ))
}

pub fn valid_whois_server_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_WHOISSERVER_NB)?;
    let (rem, (username, _, server, _, info)) =
        (word, tag(" "), word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::WhoisServer {
            username: username.to_owned(),
            server: server.to_owned(),
            info: info.to_owned(),
        },
    ))
}

pub fn valid_whois_channels_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_WHOISCHANNELS_NB)?;
    let (rem, (username, _, channels)) = (word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::WhoisChannels {
            username: username.to_owned(),
            channels: channels.to_owned(),
        },
    ))
}

pub fn valid_end_of_whois_parser(input: &str) -> IResult<&str, ServerMessage> {
    let (rem, _nick) = numeric(input, RPL_ENDOFWHOIS_NB)?;
    let (rem, (username, _, _)) = (word, tag(" :"), rest).parse(rem)?;
    Ok((
        rem,
        ServerMessage::EndOfWhois {
            username: username.to_owned(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(line: &str) -> (&'static str, ServerMessage) {
        match classify(line) {
            Classified::Matched(name, msg) => (name, msg),
            other => panic!("should match: {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_table_selects_expected_pattern() {
        let cases: Vec<(&str, &str, ServerMessage)> = vec![
            (
                ":cho.ppy.sh 001 _CHIMERA :Welcome to the osu!Bancho.",
                "RPL_WELCOME",
                ServerMessage::Welcome,
            ),
            (
                ":cho.ppy.sh 375 _CHIMERA :-",
                "RPL_MOTD",
                ServerMessage::Motd { code: 375, text: "-".to_owned() },
            ),
            (
                ":cho.ppy.sh 372 _CHIMERA :- boat://",
                "RPL_MOTD",
                ServerMessage::Motd { code: 372, text: "- boat://".to_owned() },
            ),
            (
                ":cho.ppy.sh 376 _CHIMERA :End of /MOTD command.",
                "RPL_MOTD",
                ServerMessage::Motd { code: 376, text: "End of /MOTD command.".to_owned() },
            ),
            (
                "PING cho.ppy.sh",
                "PING",
                ServerMessage::Ping("cho.ppy.sh".to_owned()),
            ),
            (
                ":_CHIMERA!cho@ppy.sh JOIN :#mp_12345",
                "JOIN",
                ServerMessage::Join { user: "_CHIMERA".to_owned(), channel: "#mp_12345".to_owned() },
            ),
            (
                ":_CHIMERA!cho@ppy.sh PART :#osu",
                "PART",
                ServerMessage::Part { user: "_CHIMERA".to_owned(), channel: "#osu".to_owned() },
            ),
            (
                ":peppy!cho@ppy.sh QUIT :quit",
                "QUIT",
                ServerMessage::Quit { user: "peppy".to_owned(), reason: "quit".to_owned() },
            ),
            (
                ":BanchoBot!cho@ppy.sh PRIVMSG #mp_1 :Changed match to size 12",
                "PRIVMSG",
                ServerMessage::Privmsg {
                    sender: "BanchoBot".to_owned(),
                    target: "#mp_1".to_owned(),
                    text: "Changed match to size 12".to_owned(),
                },
            ),
            (
                ":BanchoBot!cho@cho.ppy.sh MODE #mp_1 +o _CHIMERA",
                "MODE",
                ServerMessage::Mode {
                    admin: "BanchoBot".to_owned(),
                    channel: "#mp_1".to_owned(),
                    mode: "+o".to_owned(),
                    user: "_CHIMERA".to_owned(),
                },
            ),
            (
                ":cho.ppy.sh 332 _CHIMERA #mp_1 :multiplayer game #98765",
                "RPL_TOPIC",
                ServerMessage::Topic { channel: "#mp_1".to_owned(), topic: "multiplayer game #98765".to_owned() },
            ),
            (
                ":cho.ppy.sh 333 _CHIMERA #mp_1 BanchoBot!BanchoBot@cho.ppy.sh 1645000000",
                "RPL_TOPICWHOTIME",
                ServerMessage::CreationTime { channel: "#mp_1".to_owned(), time: 1645000000 },
            ),
            (
                ":cho.ppy.sh 353 _CHIMERA = #mp_1 :@BanchoBot +_CHIMERA ",
                "RPL_NAMREPLY",
                ServerMessage::Names { channel: "#mp_1".to_owned(), names: "@BanchoBot +_CHIMERA ".to_owned() },
            ),
            (
                ":cho.ppy.sh 366 _CHIMERA #mp_1 :End of /NAMES list.",
                "RPL_ENDOFNAMES",
                ServerMessage::EndOfNames { channel: "#mp_1".to_owned() },
            ),
            (
                ":cho.ppy.sh 311 _CHIMERA peppy https://osu.ppy.sh/u/2 * :https://osu.ppy.sh/u/2",
                "RPL_WHOISUSER",
                ServerMessage::WhoisUser { username: "peppy".to_owned(), user_id: 2 },
            ),
            (
                ":cho.ppy.sh 312 _CHIMERA peppy cho.ppy.sh :cho-server",
                "RPL_WHOISSERVER",
                ServerMessage::WhoisServer {
                    username: "peppy".to_owned(),
                    server: "cho.ppy.sh".to_owned(),
                    info: "cho-server".to_owned(),
                },
            ),
            (
                ":cho.ppy.sh 319 _CHIMERA peppy :#osu #announce ",
                "RPL_WHOISCHANNELS",
                ServerMessage::WhoisChannels { username: "peppy".to_owned(), channels: "#osu #announce ".to_owned() },
            ),
            (
                ":cho.ppy.sh 318 _CHIMERA peppy :End of /WHOIS list.",
                "RPL_ENDOFWHOIS",
                ServerMessage::EndOfWhois { username: "peppy".to_owned() },
            ),
            (
                ":cho.ppy.sh 464 _CHIMERA :Bad authentication token.",
                "ERR_PASSWDMISMATCH",
                ServerMessage::LoginFailed("Bad authentication token.".to_owned()),
            ),
        ];

        for (line, name, expected) in cases {
            let (found_name, msg) = matched(line);
            assert_eq!(found_name, name, "wrong pattern for {line:?}");
            assert_eq!(msg, expected, "wrong captures for {line:?}");
        }
    }

    #[test]
    fn test_ping_with_empty_token() {
        assert_eq!(matched("PING ").1, ServerMessage::Ping(String::new()));
        assert_eq!(matched("PING").1, ServerMessage::Ping(String::new()));
        assert_eq!(
            matched("PING :irc.funet.fi").1,
            ServerMessage::Ping(":irc.funet.fi".to_owned())
        );
    }

    #[test]
    fn test_privmsg_keeps_colons_in_text() {
        let (_, msg) = matched(":_CHIMERA!cho@ppy.sh PRIVMSG #osu :::MODE x");
        assert_eq!(
            msg,
            ServerMessage::Privmsg {
                sender: "_CHIMERA".to_owned(),
                target: "#osu".to_owned(),
                text: "::MODE x".to_owned(),
            }
        );
    }

    #[test]
    fn test_unhandled_lines_are_unmatched() {
        let lines = [
            ":cho.ppy.sh 002 _CHIMERA :Your host is cho.ppy.sh",
            ":cho.ppy.sh NOTICE * :hello",
            ":peppy!cho@ppy.sh NICK peppy2",
            "",
            ":cho.ppy.sh 4x4 _CHIMERA :nope",
        ];
        for line in lines {
            assert_eq!(classify(line), Classified::Unmatched, "{line:?}");
        }
    }

    #[test]
    fn test_malformed_capture_is_reported() {
        let line = ":cho.ppy.sh 311 _CHIMERA peppy https://osu.ppy.sh/u/99999999999999999999999 * :x";
        assert!(matches!(
            classify(line),
            Classified::Malformed { pattern: "RPL_WHOISUSER", field: "99999999999999999999999" }
        ));
    }

    #[test]
    fn test_mode_requires_operator_host() {
        // user host instead of operator host
        assert_eq!(
            classify(":BanchoBot!cho@ppy.sh MODE #mp_1 +o _CHIMERA"),
            Classified::Unmatched
        );
    }
}
