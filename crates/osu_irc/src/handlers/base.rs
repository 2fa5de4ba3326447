use log::{debug, error, info};
use std::sync::Arc;

use crate::{
    channels::is_lobby_name,
    client_state::ClientState,
    command_registry::CommandRegistry,
    commands::IrcCommand,
    connection::Outbound,
    constants::{RPL_ENDOFMOTD_NB, RPL_MOTDSTART_NB},
    errors::IrcClientError,
    events::{ClientEvent, EventHub, LobbyEvent},
    handlers::lobby::apply_lobby_text,
    message::Message,
    patterns::base::{Classified, ServerMessage, classify},
    patterns::lobby::game_id_from_topic,
    users::User,
};

/// Routes classified server lines to their effects.
///
/// Every entity mutation happens synchronously inside `dispatch`; observer
/// callbacks and commands are spawned and never awaited here.
pub struct Dispatcher {
    pub state: Arc<ClientState>,
    pub outbound: Outbound,
    pub client_events: Arc<EventHub<ClientEvent>>,
    pub lobby_events: Arc<EventHub<LobbyEvent>>,
    pub commands: Arc<CommandRegistry>,
    pub raw_command_escape: char,
    pub emit_lobby_events: bool,
}

impl Dispatcher {
    pub async fn dispatch(&self, line: &str) -> Result<(), IrcClientError> {
        match classify(line) {
            Classified::Matched(name, message) => {
                debug!("{name}: {message:?}");
                self.handle(message).await
            }
            Classified::Malformed { pattern, field } => {
                Err(IrcClientError::invalid_capture(pattern, field))
            }
            Classified::Unmatched => {
                debug!("Unhandled line: {line}");
                Ok(())
            }
        }
    }

    async fn handle(&self, message: ServerMessage) -> Result<(), IrcClientError> {
        match message {
            ServerMessage::Welcome => {
                info!("Logged in as {}", self.state.nickname);
                self.state.latches.welcome.set();
            }
            ServerMessage::Motd { code, text } => {
                debug!("MOTD {text}");
                match code {
                    RPL_MOTDSTART_NB => self.state.latches.motd_start.set(),
                    RPL_ENDOFMOTD_NB => self.state.latches.motd_end.set(),
                    _ => {}
                }
            }
            ServerMessage::LoginFailed(reason) => {
                error!("Login failed: {reason}");
                return Err(IrcClientError::LoginFailed(reason));
            }
            ServerMessage::Ping(token) => {
                if let Err(e) = self.outbound.send_now(&IrcCommand::PONG(token.clone())).await {
                    error!("Failed to answer PING: {e}");
                }
                self.client_events.emit(ClientEvent::Ping(token));
            }
            ServerMessage::Quit { user, reason } => {
                let left = self.state.remove_member_everywhere(&user);
                debug!("{user} quit ({reason}), left {left} channels");
                self.client_events.emit(ClientEvent::Quit { user, reason });
            }
            ServerMessage::Join { user, channel } => {
                self.state.touch_user(&user);
                let is_self = self.state.is_self(&user);
                self.state.with_channel(&channel, |c| {
                    c.add_member(&user);
                    if is_self {
                        c.joined = true;
                    }
                })?;
                if is_self {
                    info!("Joined {channel}");
                }
                self.client_events.emit(ClientEvent::Join { user, channel });
            }
            ServerMessage::Part { user, channel } => {
                let is_self = self.state.is_self(&user);
                self.state.with_channel(&channel, |c| {
                    c.remove_member(&user);
                    if is_self {
                        c.joined = false;
                    }
                })?;
                if is_self {
                    info!("Left {channel}");
                }
                self.client_events.emit(ClientEvent::Part { user, channel });
            }
            ServerMessage::Mode {
                admin,
                channel,
                mode,
                user,
            } => {
                debug!("{admin} set {mode} on {user} in {channel}");
                self.client_events.emit(ClientEvent::Mode {
                    admin,
                    channel,
                    mode,
                    user,
                });
            }
            ServerMessage::Privmsg {
                sender,
                target,
                text,
            } => self.on_privmsg(sender, target, text).await?,
            ServerMessage::Topic { channel, topic } => {
                let game_id = match game_id_from_topic(&topic) {
                    Some(Ok(id)) => Some(id),
                    Some(Err(value)) => return Err(IrcClientError::invalid_capture("game_id", value)),
                    None => None,
                };
                self.state.with_channel(&channel, |c| {
                    c.topic = topic;
                    if let (Some(id), Some(lobby)) = (game_id, c.lobby_mut()) {
                        lobby.game_id = Some(id);
                    }
                })?;
            }
            ServerMessage::CreationTime { channel, time } => {
                self.state.with_channel(&channel, |c| c.created_time = Some(time))?;
            }
            ServerMessage::Names { channel, names } => {
                self.state.push_names(&channel, &names);
            }
            ServerMessage::EndOfNames { channel } => {
                let names = self.state.take_names(&channel).unwrap_or_default();
                let members = self.state.with_channel(&channel, |c| {
                    c.set_members_from_names(&names);
                    c.members.iter().cloned().collect::<Vec<_>>()
                })?;
                for member in &members {
                    self.state.touch_user(member);
                }
                debug!("{channel} has {} members", members.len());
            }
            ServerMessage::WhoisUser { username, user_id } => {
                self.state.set_user_id(&username, user_id);
                self.client_events
                    .emit(ClientEvent::Whois { username, user_id });
            }
            ServerMessage::WhoisServer {
                username,
                server,
                info,
            } => debug!("WHOIS {username}: server {server} ({info})"),
            ServerMessage::WhoisChannels { username, channels } => {
                debug!("WHOIS {username}: channels {}", channels.trim_end())
            }
            ServerMessage::EndOfWhois { username } => debug!("WHOIS {username}: end"),
        }
        Ok(())
    }

    async fn on_privmsg(
        &self,
        sender: String,
        target: String,
        text: String,
    ) -> Result<(), IrcClientError> {
        self.state.touch_user(&sender);
        let author = self.state.user(&sender).unwrap_or_else(|| User::new(&sender));
        let message = Message::new(author, &target, &text);
        if let Some(channel) = &message.channel {
            self.state.with_channel(channel, |_| ())?;
        }

        if self.state.is_self(&sender)
            && let Some(raw) = text.strip_prefix(self.raw_command_escape)
        {
            if let Err(e) = self.outbound.send_now(&IrcCommand::RAW(raw.to_owned())).await {
                error!("Failed to send raw command: {e}");
            }
            return Ok(());
        }

        if self.state.is_bot(&sender) && !message.is_private && is_lobby_name(&target) {
            self.on_lobby_text(&target, &text);
        }

        self.client_events.emit(ClientEvent::Message(message.clone()));
        self.commands.dispatch(&message);
        Ok(())
    }

    fn on_lobby_text(&self, channel: &str, text: &str) {
        let outcome = self.state.with_lobby(channel, |lobby| {
            apply_lobby_text(lobby, text).map(|change| {
                change.map(|change| {
                    let wanted = self.emit_lobby_events
                        && self.lobby_events.observer_count(change.kind()) > 0;
                    // Snapshot only when somebody listens.
                    let snapshot = wanted.then(|| Arc::new(lobby.clone()));
                    (change, snapshot)
                })
            })
        });
        match outcome {
            Ok(Some(Ok(Some((change, Some(lobby)))))) => {
                self.lobby_events.emit(LobbyEvent {
                    channel: channel.to_owned(),
                    lobby,
                    change,
                });
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) | Err(e) => error!("Rejected lobby update in {channel} ({text:?}): {e}"),
            Ok(None) => debug!("{channel} is not a lobby"),
        }
    }
}
