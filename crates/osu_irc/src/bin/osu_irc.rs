use clap::Parser;
use flexi_logger::{Duplicate, Logger};
use log::{error, info};
use osu_irc::{
    CallbackError, ClientEvent, ClientEventKind, Config, IrcClient, LobbyChange, Message,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Connects to Bancho and logs what happens in the joined channels.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "osu_irc.toml")]
    config: PathBuf,

    /// Overrides the level derived from `client.debug`
    #[arg(short, long)]
    log_level: Option<String>,

    /// Channels to join once logged in, e.g. `osu` or `#mp_12345`
    #[arg(short, long)]
    join: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level().to_owned());
    Logger::try_with_str(&level)
        .and_then(|op| op.log_to_stderr().duplicate_to_stderr(Duplicate::All).start())
        .ok();

    let client = Arc::new(IrcClient::new(config));
    register_hooks(&client, args.join);

    let stopper = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, leaving");
            stopper.stop();
        }
    });

    client.run().await?;
    Ok(())
}

fn register_hooks(client: &Arc<IrcClient>, channels: Vec<String>) {
    let joiner = client.clone();
    let channels = Arc::new(channels);
    client.on(ClientEventKind::Ready, move |_| {
        let client = joiner.clone();
        let channels = channels.clone();
        async move {
            for channel in channels.iter() {
                client.join(channel).await?;
            }
            Ok::<(), CallbackError>(())
        }
    });

    client.on(ClientEventKind::Message, |event| async move {
        if let ClientEvent::Message(message) = event {
            info!("[{}] {}: {}", message.target, message.author, message.content);
        }
        Ok::<(), CallbackError>(())
    });

    client.on_lobby(None, |event| async move {
        match &event.change {
            LobbyChange::MatchFinished => {
                let players = event.lobby.slots.len();
                info!("{}: match finished with {players} players", event.channel);
            }
            change => info!("{}: {change:?}", event.channel),
        }
        Ok::<(), CallbackError>(())
    });

    let replier = client.clone();
    client.commands().command("ping", move |message: Message, _args| {
        let client = replier.clone();
        async move {
            if let Err(e) = client.reply(&message, "pong").await {
                error!("Failed to answer {}: {e}", message.author);
            }
            Ok::<(), CallbackError>(())
        }
    });
}
