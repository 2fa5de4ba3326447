use log::{error, info, warn};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::{
    channels::{Channel, Lobby, normalize_channel_name},
    client_state::ClientState,
    command_registry::CommandRegistry,
    commands::IrcCommand,
    config::Config,
    connection::{Outbound, SendOptions, read_loop},
    errors::{CallbackError, IrcClientError},
    events::{ClientEvent, ClientEventKind, EventHub, LobbyEvent, LobbyEventKind},
    handlers::base::Dispatcher,
    message::Message,
    profile::OsuApiFetcher,
    users::{User, UserProfile},
};

// Upper bound on waiting for in-flight observers and queued messages at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A Bancho connection plus everything learned through it.
///
/// Register observers with [`IrcClient::on`] / [`IrcClient::on_lobby`] and
/// commands through [`IrcClient::commands`], then call [`IrcClient::run`].
/// The client is usually shared as an `Arc` so callbacks can send.
pub struct IrcClient {
    config: Config,
    state: Arc<ClientState>,
    client_events: Arc<EventHub<ClientEvent>>,
    lobby_events: Arc<EventHub<LobbyEvent>>,
    commands: Arc<CommandRegistry>,
    outbound: Mutex<Option<Outbound>>,
    // Reset by every run: a stop() outside a run is not remembered.
    shutdown: watch::Sender<bool>,
    profiles: OsuApiFetcher,
}

impl IrcClient {
    pub fn new(config: Config) -> Self {
        let state = ClientState::new(&config.auth.nickname, &config.server.bot_account);
        IrcClient {
            state: Arc::new(state),
            client_events: Arc::new(EventHub::new()),
            lobby_events: Arc::new(EventHub::new()),
            commands: Arc::new(CommandRegistry::new(&config.client.prefix)),
            outbound: Mutex::new(None),
            shutdown: watch::Sender::new(false),
            profiles: OsuApiFetcher::new(&config.api),
            config,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.config.auth.nickname
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn on<F, Fut>(&self, kind: ClientEventKind, callback: F)
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.client_events.subscribe(Some(kind), callback);
    }

    /// `kind == None` observes every lobby change.
    pub fn on_lobby<F, Fut>(&self, kind: Option<LobbyEventKind>, callback: F)
    where
        F: Fn(LobbyEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        self.lobby_events.subscribe(kind, callback);
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Connects to the configured server and runs until disconnect.
    pub async fn run(&self) -> Result<(), IrcClientError> {
        let address = (self.config.server.host.as_str(), self.config.server.port);
        info!("Connecting to {}:{}", address.0, address.1);
        let stream = TcpStream::connect(address).await?;
        let (reader, writer) = stream.into_split();
        self.run_with(reader, writer).await
    }

    /// Runs the protocol over any transport, e.g. an in-memory duplex.
    ///
    /// Returns `Ok(())` after [`IrcClient::stop`], `StreamClosed` when the
    /// server hangs up and `LoginFailed` on a rejected password.
    pub async fn run_with<R, W>(&self, reader: R, writer: W) -> Result<(), IrcClientError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.shutdown.send_replace(false);
        let (outbound, sender) = Outbound::start(writer, self.config.rate_limit());
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(outbound.clone());
        self.state.set_running(true);

        let result = self.session(reader, &outbound).await;

        self.state.set_running(false);
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = None;
        // A requested stop still writes the messages `send` accepted.
        let flush = result.is_ok().then_some(DRAIN_TIMEOUT);
        if let Err(e) = outbound.close(sender, flush).await {
            warn!("Failed to close the connection cleanly: {e}");
        }
        self.drain().await;

        match &result {
            Ok(()) => info!("Disconnected"),
            Err(e) => error!("Connection lost: {e}"),
        }
        result
    }

    async fn session<R>(&self, reader: R, outbound: &Outbound) -> Result<(), IrcClientError>
    where
        R: AsyncRead + Unpin,
    {
        outbound
            .send_now(&IrcCommand::PASS(self.config.auth.password.clone()))
            .await?;
        outbound
            .send_now(&IrcCommand::NICK(self.config.auth.nickname.clone()))
            .await?;

        let ready = tokio::spawn(announce_ready(
            self.state.clone(),
            self.client_events.clone(),
        ));
        let dispatcher = Dispatcher {
            state: self.state.clone(),
            outbound: outbound.clone(),
            client_events: self.client_events.clone(),
            lobby_events: self.lobby_events.clone(),
            commands: self.commands.clone(),
            raw_command_escape: self.config.client.raw_command_escape,
            emit_lobby_events: self.config.client.emit_lobby_events,
        };
        let result = read_loop(reader, &dispatcher, self.shutdown.subscribe()).await;
        ready.abort();
        result
    }

    /// Ends the current session: `run` returns `Ok(())` once the read loop
    /// notices and queued messages are written. Does nothing between runs.
    pub fn stop(&self) {
        if self.running() {
            self.shutdown.send_replace(true);
        }
    }

    pub fn running(&self) -> bool {
        self.state.running()
    }

    /// Waits for spawned observer deliveries, bounded by a timeout.
    pub async fn drain(&self) {
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            self.client_events.drain().await;
            self.lobby_events.drain().await;
        })
        .await;
        if drained.is_err() {
            warn!("Observers still running after {DRAIN_TIMEOUT:?}");
        }
    }

    fn outbound(&self) -> Result<Outbound, IrcClientError> {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(IrcClientError::NotConnected)
    }

    /// PRIVMSG to a user or channel.
    pub async fn send(
        &self,
        target: &str,
        text: &str,
        options: SendOptions,
    ) -> Result<(), IrcClientError> {
        self.outbound()?.privmsg(target, text, options).await
    }

    /// Like `send`, but refuses channels we are not in.
    pub async fn send_to_channel(
        &self,
        channel: &str,
        text: &str,
        options: SendOptions,
    ) -> Result<(), IrcClientError> {
        let channel = normalize_channel_name(channel);
        if !self.state.is_joined(&channel) {
            return Err(IrcClientError::NotInChannel(channel));
        }
        self.send(&channel, text, options).await
    }

    /// Answers in the channel the message came from, or privately.
    pub async fn reply(&self, message: &Message, text: &str) -> Result<(), IrcClientError> {
        self.send(message.reply_target(), text, SendOptions::default())
            .await
    }

    pub async fn join(&self, channel: &str) -> Result<(), IrcClientError> {
        let channel = normalize_channel_name(channel);
        self.outbound()?.send_now(&IrcCommand::JOIN(channel)).await
    }

    pub async fn part(&self, channel: &str) -> Result<(), IrcClientError> {
        let channel = normalize_channel_name(channel);
        self.outbound()?.send_now(&IrcCommand::PART(channel)).await
    }

    /// The reply fills in the user id, see `ClientEventKind::Whois`.
    pub async fn whois(&self, username: &str) -> Result<(), IrcClientError> {
        self.outbound()?
            .send_now(&IrcCommand::WHOIS(username.to_owned()))
            .await
    }

    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.state.channel(&normalize_channel_name(name))
    }

    pub fn lobby(&self, name: &str) -> Option<Lobby> {
        self.state.lobby(&normalize_channel_name(name))
    }

    pub fn user(&self, username: &str) -> Option<User> {
        self.state.user(username)
    }

    /// Fetches the web profile of `username` and stores it on the cached user.
    pub async fn resolve_user(&self, username: &str) -> Result<UserProfile, IrcClientError> {
        let mut user = self.state.user(username).unwrap_or_else(|| User::new(username));
        let profile = user.resolve(&self.profiles).await?.clone();
        self.state.users.insert(username.to_ascii_lowercase(), user);
        Ok(profile)
    }
}

/// Emits `Ready` once the welcome and both MOTD markers have been seen.
async fn announce_ready(state: Arc<ClientState>, client_events: Arc<EventHub<ClientEvent>>) {
    state.latches.wait_all().await;
    if state.claim_ready() {
        info!("Ready");
        client_events.emit(ClientEvent::Ready);
    }
}
