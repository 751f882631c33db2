//! Discord surface of the Dabini bot.
//!
//! - **Webhook interactions** (`verify`, `interactions`, `dispatcher`): Ed25519 request
//!   verification, the interaction model, and ping/command/component routing with deferred replies
//! - **Slash commands** (`commands`): the registered command table and its handlers
//! - **Rendering** (`embeds`, `delivery`): engine replies as text segments and rich embeds
//! - **REST** (`rest`): message edits, follow-ups, channel sends and command registration
//! - **Gateway** (`gateway`, `messages`): connection supervision with bounded reconnection, and
//!   handling of mention messages and guild joins
//!
//! # Architecture
//!
//! ```text
//! POST /interactions → verify → InteractionDispatcher → CommandService → EngineApi
//!                                      ↓                      ↓
//!                                 ack (type 1/4/5)      RenderedReply → deliver_deferred
//!
//! GatewayConnection → ConnectionSupervisor → GatewayEventHandler → EngineApi → PlatformApi
//! ```

pub mod commands;
pub mod delivery;
pub mod dispatcher;
pub mod embeds;
pub mod gateway;
pub mod interactions;
pub mod messages;
pub mod rest;
pub mod verify;
