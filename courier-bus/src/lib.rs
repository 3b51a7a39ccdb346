//! Pub/sub message bus for courier.
//!
//! This crate wires three pieces together: a pluggable [`transport`]
//! layer carrying raw (channel, payload) frames, a [`Router`] holding
//! pattern subscriptions, and a dispatch engine delivering inbound
//! frames to matching callbacks in background or manual mode.
//!
//! # Key Types
//!
//! - [`Bus`] - A connected session: publish, subscribe, dispatch control
//! - [`TransportRegistry`] - Scheme-to-factory table, seeded with the
//!   in-process `inproc` loopback
//! - [`Router`] - Ordered pattern-subscription table
//! - [`Envelope`] - A received frame with its receive timestamp
//!
//! # Example
//!
//! ```
//! use courier_bus::{Bus, BusConfig, TransportRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> courier_bus::Result<()> {
//! let registry = TransportRegistry::new();
//! let bus = Bus::connect(&registry, BusConfig::default()).await?;
//!
//! bus.subscribe("TELEMETRY.*", |env| {
//!     println!("{}: {} bytes", env.channel, env.payload.len());
//! })?;
//!
//! bus.publish("TELEMETRY_GPS", &b"fix"[..]).await?;
//! bus.handle(Some(std::time::Duration::from_millis(100))).await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod router;
pub mod transport;

// Re-exports
pub use bus::Bus;
pub use config::BusConfig;
pub use dispatch::HandleStatus;
pub use error::{Error, Result};
pub use frame::{Envelope, Frame};
pub use router::{Router, SubscriptionHandle};
pub use transport::{Endpoint, TransportFactory, TransportRecv, TransportRegistry, TransportSend};
