//! feedrelay — relays new posts from syndication feeds and social walls to a
//! messaging channel, oldest first.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ read  ┌──────────┐ fetch(watermark) ┌────────────┐
//! │ watermark │ ────► │ poll.rs  │ ───────────────► │  source/   │
//! │  (file)   │ ◄──── │  (loop)  │ ◄─────────────── │ (per kind) │
//! └───────────┘ write └──────────┘    Vec<Post>     └────────────┘
//!                          │ queue (FIFO)
//!                          ▼
//!                     ┌──────────┐
//!                     │ dispatch │
//!                     └──────────┘
//! ```
//!
//! * **`source/`** — the `Source` trait, the `Post` type and the concrete
//!   sources (syndication feeds, wall text, wall links) with their
//!   transports.
//! * **`poll`** — the ingestion loop: fetch, reorder, dispatch, advance.
//! * **`watermark`** — persistence of the last-processed instant.
//! * **`dispatch`** — the `Dispatcher` trait and a console implementation.
//! * **`config`** — the TOML configuration.
//! * **`logging`** — tracing subscriber setup.

pub mod config;
pub mod dispatch;
pub mod logging;
pub mod poll;
pub mod source;
pub mod watermark;
