use std::fmt::Display;

/// Lines the client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum IrcCommand {
    PASS(String),
    NICK(String),
    JOIN(String),
    PART(String),
    PONG(String),
    /// target, text
    PRIVMSG(String, String),
    WHOIS(String),
    /// Sent verbatim, used by the self-command escape.
    RAW(String),
}

impl IrcCommand {
    /// Wire form, CRLF included.
    pub fn raw_line(&self) -> String {
        let line = match self {
            IrcCommand::PASS(password) => format!("PASS {password}"),
            IrcCommand::NICK(nick) => format!("NICK {nick}"),
            IrcCommand::JOIN(channel) => format!("JOIN {channel}"),
            IrcCommand::PART(channel) => format!("PART {channel}"),
            IrcCommand::PONG(token) => format!("PONG {token}"),
            IrcCommand::PRIVMSG(target, text) => format!("PRIVMSG {target} :{text}"),
            IrcCommand::WHOIS(nick) => format!("WHOIS {nick}"),
            IrcCommand::RAW(line) => line.clone(),
        };
        terminated(line)
    }
}

fn terminated(line: String) -> String {
    // One command per line: embedded breaks are dropped.
    let line: String = line.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    format!("{line}\r\n")
}

// Safe to log: the password is masked.
impl Display for IrcCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrcCommand::PASS(_) => write!(f, "PASS ***"),
            other => write!(f, "{}", other.raw_line().trim_end()),
        }
    }
}
