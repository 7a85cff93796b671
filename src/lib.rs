//! Poll-driven HTTP client.
//!
//! Requests are executed on a fixed pool of worker threads while the host
//! application drives all bookkeeping from its own loop by calling
//! [`client::Client::pump`] once per tick. Completion callbacks run inside
//! `pump`, on the host's thread, and are skipped when the observed target has
//! already been dropped.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tickhttp::client::{Callback, Client};
//! use tickhttp::config::ClientConfig;
//! use tickhttp::request::Request;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! tickhttp::transport::global_init();
//! let mut client = Client::new(ClientConfig::default())?;
//! let request = Arc::new(Request::get("https://example.com/"));
//! client.submit(
//!     &request,
//!     Some(Callback::detached(|request| {
//!         println!("{} -> {:?}", request.url(), request.http_status());
//!     })),
//! )?;
//! while !request.is_terminal() {
//!     client.pump()?;
//!     std::thread::sleep(client.config().idle_poll_interval);
//! }
//! drop(client);
//! tickhttp::transport::global_cleanup()?;
//! # Ok(())
//! # }
//! ```
pub mod args;
pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod request;
pub mod shutdown;
pub mod transport;
