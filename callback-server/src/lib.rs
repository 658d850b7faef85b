//! UPnP callback server for receiving speaker event notifications.
//!
//! Speakers deliver GENA events as HTTP `NOTIFY` requests to the callback URL
//! given at subscription time. This crate owns that HTTP endpoint and nothing
//! else: it knows subscription IDs and raw XML bodies, never speakers or
//! services. Decoding is left to the consumer.
//!
//! - [`CallbackServer`] binds a port from a range, works out the address
//!   speakers can reach it on, and serves `NOTIFY` on any path.
//! - [`EventRouter`] keeps the set of live subscription IDs and forwards
//!   matching notifications to a channel.
//! - [`NotificationPayload`] is what comes out of that channel.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{CallbackServer, NotificationPayload};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::CallbackError> {
//!     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
//!     let server = CallbackServer::new((3500, 3600), tx).await?;
//!
//!     // Hand this to SUBSCRIBE, then register the SID that comes back
//!     println!("callback url: {}", server.callback_url());
//!     server.router().register("uuid:RINCON_000E58A0123456_sub0000000001".to_string()).await;
//!
//!     while let Some(notification) = rx.recv().await {
//!         println!("{}: {} bytes", notification.subscription_id, notification.event_xml.len());
//!     }
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod router;
pub mod server;

pub use router::{EventRouter, NotificationPayload};
pub use server::{CallbackError, CallbackServer};
