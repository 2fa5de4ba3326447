//! Client for the osu! Bancho IRC gateway.
//!
//! Besides plain IRC, the client follows the multiplayer lobbies it joins:
//! BanchoBot's sentences in `#mp_<id>` channels are turned into lobby and
//! slot state, and every change is fanned out to registered observers.

pub mod channels;
pub mod client;
pub mod client_state;
pub mod command_registry;
pub mod commands;
pub mod config;
pub mod connection;
pub mod constants;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod message;
pub mod osu;
pub mod patterns;
pub mod profile;
pub mod slots;
pub mod users;

pub use channels::{Channel, ChannelKind, Lobby};
pub use client::IrcClient;
pub use command_registry::AllowList;
pub use config::Config;
pub use connection::SendOptions;
pub use errors::{CallbackError, IrcClientError};
pub use events::{ClientEvent, ClientEventKind, LobbyChange, LobbyEvent, LobbyEventKind};
pub use message::Message;
pub use users::{User, UserProfile};
