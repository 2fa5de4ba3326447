// Bancho speaks a trimmed down RFC 2812. Only the numerics below are
// recognised, every other reply is dropped by the dispatcher.

pub const DEFAULT_HOST: &str = "irc.ppy.sh";
pub const DEFAULT_PORT: u16 = 6667;
pub const SERVER_NAME: &str = "cho.ppy.sh";
pub const USER_HOST: &str = "cho@ppy.sh";
pub const OPERATOR_HOST: &str = "cho@cho.ppy.sh";
pub const BOT_ACCOUNT: &str = "BanchoBot";

pub const LOBBY_PREFIX: &str = "#mp_";
pub const DEFAULT_LOBBY_SIZE: u8 = 16;
pub const MAX_LOBBY_SIZE: u8 = 16;
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;
pub const DEFAULT_COMMAND_PREFIX: &str = "!";
pub const DEFAULT_RAW_COMMAND_ESCAPE: char = ':';

pub const PROFILE_URL: &str = "https://osu.ppy.sh/u/";
pub const BEATMAP_URL: &str = "https://osu.ppy.sh/b/";
pub const DEFAULT_API_URL: &str = "https://osu.ppy.sh/api";

//    001    RPL_WELCOME
//           "Welcome to the Internet Relay Network <nick>!<user>@<host>"
pub const RPL_WELCOME_NB: u16 = 1;

//    311    RPL_WHOISUSER
//           "<nick> <user> <host> * :<real name>"
pub const RPL_WHOISUSER_NB: u16 = 311;

//    312    RPL_WHOISSERVER
//           "<nick> <server> :<server info>"
pub const RPL_WHOISSERVER_NB: u16 = 312;

//    318    RPL_ENDOFWHOIS
//           "<nick> :End of WHOIS list"
pub const RPL_ENDOFWHOIS_NB: u16 = 318;

//    319    RPL_WHOISCHANNELS
//           "<nick> :*( ( "@" / "+" ) <channel> " " )"
pub const RPL_WHOISCHANNELS_NB: u16 = 319;

//    332    RPL_TOPIC
//           "<channel> :<topic>"
pub const RPL_TOPIC_NB: u16 = 332;

//    333    RPL_TOPICWHOTIME (not in RFC 2812, widely deployed)
//           "<channel> <nick!user@host> <setat>"
pub const RPL_TOPICWHOTIME_NB: u16 = 333;

//    353    RPL_NAMREPLY
//           "( "=" / "*" / "@" ) <channel> :[ "@" / "+" ] <nick> *( " " [ "@" / "+" ] <nick> )"
pub const RPL_NAMREPLY_NB: u16 = 353;

//    366    RPL_ENDOFNAMES
//           "<channel> :End of NAMES list"
pub const RPL_ENDOFNAMES_NB: u16 = 366;

//    372    RPL_MOTD        ":- <text>"
//    375    RPL_MOTDSTART   ":- <server> Message of the day - "
//    376    RPL_ENDOFMOTD   ":End of MOTD command"
pub const RPL_MOTD_NB: u16 = 372;
pub const RPL_MOTDSTART_NB: u16 = 375;
pub const RPL_ENDOFMOTD_NB: u16 = 376;

//    464    ERR_PASSWDMISMATCH
//           ":Password incorrect"
pub const ERR_PASSWDMISMATCH_NB: u16 = 464;
