//! Delivery of queued posts.
//!
//! The ingestion loop only needs something that takes posts one at a time, in
//! order.  The real chat client lives outside this crate; [`ConsoleDispatcher`]
//! writes each post as a text block so the binary can run on its own.

use std::io::{self, Write};

use thiserror::Error;

use crate::source::Post;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("writing post: {0}")]
    Io(#[from] io::Error),

    #[error("channel rejected post: {0}")]
    Rejected(String),
}

/// Outbound seam of the loop.
pub trait Dispatcher {
    /// Deliver one post.  An error affects only this post; the loop moves on
    /// to the next one.
    fn send(&mut self, post: &Post) -> Result<(), DispatchError>;
}

/// Writes posts to any [`Write`] sink, one block per post.
pub struct ConsoleDispatcher<W: Write> {
    out: W,
}

impl ConsoleDispatcher<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleDispatcher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Dispatcher for ConsoleDispatcher<W> {
    fn send(&mut self, post: &Post) -> Result<(), DispatchError> {
        writeln!(
            self.out,
            "[{}] {}",
            post.timestamp().format("%Y-%m-%d %H:%M"),
            post.title()
        )?;
        if let Some(summary) = post.summary() {
            writeln!(self.out, "{summary}")?;
        }
        writeln!(self.out, "Source: {}", post.source_name())?;
        if let Some(url) = post.url() {
            writeln!(self.out, "{url}")?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
