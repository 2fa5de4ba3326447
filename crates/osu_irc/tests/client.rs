use osu_irc::{
    CallbackError, ClientEvent, ClientEventKind, Config, IrcClient, IrcClientError, LobbyChange,
    LobbyEvent, LobbyEventKind, Message, SendOptions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

/// Plays the server side of a session over an in-memory stream.
struct Bancho {
    client: Arc<IrcClient>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    run: JoinHandle<Result<(), IrcClientError>>,
}

fn config() -> Config {
    let mut config = Config::new("_CHIMERA", "secret");
    config.client.rate_limit_ms = 10;
    config
}

impl Bancho {
    fn start(client: IrcClient) -> Self {
        Bancho::start_shared(Arc::new(client))
    }

    fn start_shared(client: Arc<IrcClient>) -> Self {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(client_side);
        let runner = client.clone();
        let run = tokio::spawn(async move { runner.run_with(reader, writer).await });
        let (server_reader, server_writer) = tokio::io::split(server_side);
        Bancho {
            client,
            lines: BufReader::new(server_reader).lines(),
            writer: server_writer,
            run,
        }
    }

    async fn logged_in(client: IrcClient) -> Self {
        let mut bancho = Bancho::start(client);
        assert_eq!(bancho.recv().await, "PASS secret");
        assert_eq!(bancho.recv().await, "NICK _CHIMERA");
        bancho
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("client stayed silent")
            .unwrap()
            .expect("client closed the stream")
    }

    async fn finish(self) -> Result<(), IrcClientError> {
        timeout(WAIT, self.run).await.expect("run did not end").unwrap()
    }
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("no event delivered")
        .expect("channel closed")
}

fn forward_client(client: &IrcClient, kind: ClientEventKind) -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on(kind, move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event)?;
            Ok::<(), CallbackError>(())
        }
    });
    rx
}

fn forward_lobby(
    client: &IrcClient,
    kind: Option<LobbyEventKind>,
) -> mpsc::UnboundedReceiver<LobbyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on_lobby(kind, move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event)?;
            Ok::<(), CallbackError>(())
        }
    });
    rx
}

#[tokio::test]
async fn test_ready_fires_once_whatever_the_order() {
    let client = IrcClient::new(config());
    let count = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = count.clone();
    client.on(ClientEventKind::Ready, move |_| {
        let counter = counter.clone();
        let tx = tx.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tx.send(())?;
            Ok::<(), CallbackError>(())
        }
    });

    let mut bancho = Bancho::logged_in(client).await;
    bancho.send(":cho.ppy.sh 376 _CHIMERA :End of /MOTD command.").await;
    bancho.send(":cho.ppy.sh 001 _CHIMERA :Welcome to the osu!Bancho.").await;
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    bancho.send(":cho.ppy.sh 375 _CHIMERA :-").await;
    next(&mut rx).await;

    bancho.send(":cho.ppy.sh 375 _CHIMERA :-").await;
    bancho.send(":cho.ppy.sh 376 _CHIMERA :End of /MOTD command.").await;
    bancho.send("PING cho.ppy.sh").await;
    assert_eq!(bancho.recv().await, "PONG cho.ppy.sh");

    bancho.client.stop();
    let client = bancho.client.clone();
    assert_eq!(bancho.finish().await, Ok(()));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!client.running());
}

#[tokio::test]
async fn test_ping_is_answered_immediately() {
    let client = IrcClient::new(config());
    let mut pings = forward_client(&client, ClientEventKind::Ping);
    let mut bancho = Bancho::logged_in(client).await;

    bancho.send("PING cho.ppy.sh").await;
    assert_eq!(bancho.recv().await, "PONG cho.ppy.sh");
    bancho.send("PING").await;
    assert_eq!(bancho.recv().await, "PONG ");

    assert!(matches!(next(&mut pings).await, ClientEvent::Ping(t) if t == "cho.ppy.sh"));
    assert!(matches!(next(&mut pings).await, ClientEvent::Ping(t) if t.is_empty()));
    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_joining_a_lobby_and_following_banchobot() {
    let client = IrcClient::new(config());
    let mut joins = forward_client(&client, ClientEventKind::Join);
    let mut sizes = forward_lobby(&client, Some(LobbyEventKind::SizeChanged));
    let mut everything = forward_lobby(&client, None);
    let mut bancho = Bancho::logged_in(client).await;

    bancho.client.join("mp_12345").await.unwrap();
    assert_eq!(bancho.recv().await, "JOIN #mp_12345");
    bancho.send(":_CHIMERA!cho@ppy.sh JOIN :#mp_12345").await;
    next(&mut joins).await;

    let lobby = bancho.client.lobby("#mp_12345").unwrap();
    assert_eq!(lobby.mp_id(), 12345);
    assert_eq!(lobby.size, 16);
    let channel = bancho.client.channel("mp_12345").unwrap();
    assert!(channel.joined);
    assert!(channel.members.contains("_CHIMERA"));

    bancho.send(":cho.ppy.sh 332 _CHIMERA #mp_12345 :multiplayer game #98765").await;
    bancho
        .send(":BanchoBot!cho@ppy.sh PRIVMSG #mp_12345 :Changed match to size 12")
        .await;
    let event = next(&mut sizes).await;
    assert_eq!(event.change, LobbyChange::SizeChanged { old: 16, new: 12 });
    assert_eq!(event.mp_id(), 12345);
    assert_eq!(event.lobby.size, 12);
    assert_eq!(event.lobby.game_id, Some(98765));
    assert!(matches!(next(&mut everything).await.change, LobbyChange::SizeChanged { .. }));

    // only BanchoBot speaks the lobby protocol
    bancho
        .send(":peppy!cho@ppy.sh PRIVMSG #mp_12345 :Changed match to size 4")
        .await;
    bancho
        .send(":BanchoBot!cho@ppy.sh PRIVMSG #mp_12345 :Locked the match")
        .await;
    assert_eq!(next(&mut everything).await.change, LobbyChange::Locked);
    let lobby = bancho.client.lobby("#mp_12345").unwrap();
    assert_eq!(lobby.size, 12);
    assert!(lobby.locked);

    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_slot_lines_build_the_table() {
    let client = IrcClient::new(config());
    let mut events = forward_lobby(&client, Some(LobbyEventKind::SlotUpdated));
    let mut bancho = Bancho::logged_in(client).await;

    bancho.send(":_CHIMERA!cho@ppy.sh JOIN :#mp_1").await;
    bancho
        .send(":BanchoBot!cho@ppy.sh PRIVMSG #mp_1 :Slot 1  Not Ready https://osu.ppy.sh/u/2 peppy           [Host / Team Blue]")
        .await;
    let event = next(&mut events).await;
    assert!(matches!(event.change, LobbyChange::SlotUpdated { slot_number: 1, old: None, .. }));
    let slot = event.lobby.slots.get(1).unwrap();
    assert_eq!(slot.username, "peppy");
    assert_eq!(slot.user_id, Some(2));
    assert_eq!(event.lobby.host.as_deref(), Some("peppy"));

    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_names_replace_the_member_set() {
    let client = IrcClient::new(config());
    let mut bancho = Bancho::logged_in(client).await;

    bancho.send(":_CHIMERA!cho@ppy.sh JOIN :#osu").await;
    bancho.send(":ghost!cho@ppy.sh JOIN :#osu").await;
    bancho.send(":cho.ppy.sh 353 _CHIMERA = #osu :@BanchoBot +_CHIMERA ").await;
    bancho.send(":cho.ppy.sh 353 _CHIMERA = #osu :peppy ").await;
    bancho.send(":cho.ppy.sh 366 _CHIMERA #osu :End of /NAMES list.").await;
    bancho.send("PING sync").await;
    assert_eq!(bancho.recv().await, "PONG sync");

    let members = bancho.client.channel("#osu").unwrap().members;
    let mut members: Vec<_> = members.into_iter().collect();
    members.sort();
    assert_eq!(members, ["BanchoBot", "_CHIMERA", "peppy"]);

    bancho.send(":peppy!cho@ppy.sh QUIT :quit").await;
    bancho.send("PING sync").await;
    assert_eq!(bancho.recv().await, "PONG sync");
    assert!(!bancho.client.channel("#osu").unwrap().members.contains("peppy"));

    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_whois_fills_the_user_id() {
    let client = IrcClient::new(config());
    let mut whois = forward_client(&client, ClientEventKind::Whois);
    let mut bancho = Bancho::logged_in(client).await;

    bancho.client.whois("peppy").await.unwrap();
    assert_eq!(bancho.recv().await, "WHOIS peppy");
    bancho
        .send(":cho.ppy.sh 311 _CHIMERA peppy https://osu.ppy.sh/u/2 * :https://osu.ppy.sh/u/2")
        .await;
    bancho.send(":cho.ppy.sh 318 _CHIMERA peppy :End of /WHOIS list.").await;
    assert!(matches!(
        next(&mut whois).await,
        ClientEvent::Whois { username, user_id: 2 } if username == "peppy"
    ));
    assert_eq!(bancho.client.user("PEPPY").and_then(|u| u.user_id), Some(2));

    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_login_failure_ends_the_session() {
    let client = IrcClient::new(config());
    let mut bancho = Bancho::logged_in(client).await;
    assert!(bancho.client.running());

    bancho.send(":cho.ppy.sh 464 _CHIMERA :Bad authentication token.").await;
    let client = bancho.client.clone();
    assert_eq!(
        bancho.finish().await,
        Err(IrcClientError::LoginFailed("Bad authentication token.".to_owned()))
    );
    assert!(!client.running());
    assert_eq!(
        client.send("#osu", "hello", SendOptions::default()).await,
        Err(IrcClientError::NotConnected)
    );
}

#[tokio::test]
async fn test_server_hangup_is_an_error() {
    let client = IrcClient::new(config());
    let bancho = Bancho::logged_in(client).await;
    let Bancho {
        client,
        lines,
        writer,
        run,
    } = bancho;
    drop(lines);
    drop(writer);

    let result = timeout(WAIT, run).await.expect("run did not end").unwrap();
    assert_eq!(result, Err(IrcClientError::StreamClosed));
    assert!(!client.running());
}

#[tokio::test]
async fn test_sending_to_a_left_channel_fails() {
    let client = IrcClient::new(config());
    let mut parts = forward_client(&client, ClientEventKind::Part);
    let mut bancho = Bancho::logged_in(client).await;

    assert_eq!(
        bancho.client.send_to_channel("osu", "hi", SendOptions::default()).await,
        Err(IrcClientError::NotInChannel("#osu".to_owned()))
    );

    bancho.send(":_CHIMERA!cho@ppy.sh JOIN :#osu").await;
    bancho.send("PING sync").await;
    assert_eq!(bancho.recv().await, "PONG sync");
    bancho
        .client
        .send_to_channel("#osu", "hi", SendOptions::default())
        .await
        .unwrap();
    assert_eq!(bancho.recv().await, "PRIVMSG #osu :hi");

    bancho.client.part("osu").await.unwrap();
    assert_eq!(bancho.recv().await, "PART #osu");
    bancho.send(":_CHIMERA!cho@ppy.sh PART :#osu").await;
    next(&mut parts).await;
    assert_eq!(
        bancho.client.send_to_channel("#osu", "bye", SendOptions::default()).await,
        Err(IrcClientError::NotInChannel("#osu".to_owned()))
    );

    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_own_escaped_messages_are_sent_raw() {
    let client = IrcClient::new(config());
    let mut messages = forward_client(&client, ClientEventKind::Message);
    let mut bancho = Bancho::logged_in(client).await;

    bancho.send(":_CHIMERA!cho@ppy.sh PRIVMSG #osu ::WHOIS peppy").await;
    assert_eq!(bancho.recv().await, "WHOIS peppy");

    bancho.send(":_CHIMERA!cho@ppy.sh PRIVMSG #osu :plain text").await;
    let ClientEvent::Message(message) = next(&mut messages).await else {
        panic!("expected a message");
    };
    assert_eq!(message.content, "plain text");
    assert!(!message.is_private);

    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}

#[tokio::test]
async fn test_commands_reply_in_place() {
    let client = Arc::new(IrcClient::new(config()));
    let mut bancho = Bancho::start_shared(client.clone());
    assert_eq!(bancho.recv().await, "PASS secret");
    assert_eq!(bancho.recv().await, "NICK _CHIMERA");

    let replier = client.clone();
    client.commands().command("roll", move |message: Message, args: Vec<String>| {
        let client = replier.clone();
        async move {
            let text = format!("{} rolls {}", message.author, args.join(" "));
            client.reply(&message, &text).await?;
            Ok::<(), CallbackError>(())
        }
    });

    bancho.send(":peppy!cho@ppy.sh PRIVMSG #osu :!roll 100").await;
    assert_eq!(bancho.recv().await, "PRIVMSG #osu :peppy rolls 100");
    bancho.send(":peppy!cho@ppy.sh PRIVMSG _CHIMERA :!roll 6").await;
    assert_eq!(bancho.recv().await, "PRIVMSG peppy :peppy rolls 6");

    client
        .send(
            "peppy",
            "waves",
            SendOptions {
                action: true,
                ignore_limit: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(bancho.recv().await, "PRIVMSG peppy :\x01ACTION waves\x01");

    client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}


#[tokio::test]
async fn test_stop_writes_queued_messages_first() {
    let mut config = config();
    config.client.rate_limit_ms = 100;
    let client = IrcClient::new(config);
    let mut bancho = Bancho::logged_in(client).await;

    for text in ["one", "two", "three"] {
        bancho
            .client
            .send("#mp_1", text, SendOptions::default())
            .await
            .unwrap();
    }
    bancho.client.stop();

    assert_eq!(bancho.recv().await, "PRIVMSG #mp_1 :one");
    assert_eq!(bancho.recv().await, "PRIVMSG #mp_1 :two");
    assert_eq!(bancho.recv().await, "PRIVMSG #mp_1 :three");
    let client = bancho.client.clone();
    let Bancho { mut lines, run, .. } = bancho;
    let result = timeout(WAIT, run).await.expect("run did not end").unwrap();
    assert_eq!(result, Ok(()));
    assert_eq!(lines.next_line().await.unwrap(), None);
    assert!(!client.running());
}

#[tokio::test]
async fn test_stop_outside_a_run_is_forgotten() {
    let client = IrcClient::new(config());
    client.stop();
    let mut bancho = Bancho::logged_in(client).await;

    bancho.send("PING cho.ppy.sh").await;
    assert_eq!(bancho.recv().await, "PONG cho.ppy.sh");
    assert!(bancho.client.running());

    bancho.client.stop();
    let client = bancho.client.clone();
    assert_eq!(bancho.finish().await, Ok(()));

    // a second session on the same client
    client.stop();
    let mut bancho = Bancho::start_shared(client);
    assert_eq!(bancho.recv().await, "PASS secret");
    assert_eq!(bancho.recv().await, "NICK _CHIMERA");
    bancho.send("PING again").await;
    assert_eq!(bancho.recv().await, "PONG again");
    bancho.client.stop();
    assert_eq!(bancho.finish().await, Ok(()));
}
