//! Wait for conditions on a browser page.
//!
//! A [`Condition`] is a described probe over an [`Accessor`]. [`poll`] runs it
//! until it settles, fails fatally, or the [`PollConfig`] timeout elapses.
//! The [`conditions`] module holds the stock probes (presence, visibility,
//! clickability, text, attributes...) and [`Waiter`] wraps them into
//! one-liners like `waiter.click(&Locator::id("submit"))`.
//!
//! ```ignore
//! use wtf_wait::{Locator, Waiter};
//!
//! let waiter = Waiter::new(&page).at_most(Duration::from_secs(5));
//! waiter.type_text(&Locator::name("email"), "me@example.com")?;
//! waiter.click(&Locator::id("submit"))?;
//! assert!(waiter.text_present(&Locator::class_name("flash"), "Welcome")?);
//! ```

pub mod access;
pub mod conditions;
pub mod fixture;
mod locator;
mod poll;
mod waiter;

pub use access::{AccessError, AccessResult, Accessor, ErrorKind, Handle, Interact, Scope};
pub use fixture::{ElementState, FixtureElement, FixtureHandle, FixturePage, StatePatch};
pub use locator::Locator;
pub use poll::{
    poll, Condition, PollConfig, PollOutcome, ProbeResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TIMEOUT,
};
pub use waiter::{random_index, Waiter};

#[cfg(feature = "async")]
pub use poll::poll_async;

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(
        "timed out after {timeout:?} waiting for {condition}{}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        condition: String,
        timeout: Duration,
        last_error: Option<AccessError>,
    },

    #[error("invalid wait configuration: {0}")]
    Config(String),

    #[error("no options to choose from: {0}")]
    NoOptions(String),

    #[error("option not found: {0}")]
    OptionNotFound(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

fn last_error_suffix(e: &Option<AccessError>) -> String {
    match e {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
