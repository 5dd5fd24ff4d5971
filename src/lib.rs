//! Wait utilities for browser automation.
//!
//! Re-exports the condition engine ([`wtf_wait`]) and the YAML scenario
//! runner ([`wtf_runner`]) under one crate.
//!
//! ```rust
//! use std::time::Duration;
//! use wtf_util::{FixtureElement, FixturePage, Locator, Waiter};
//!
//! let page = FixturePage::new([FixtureElement::new("button").id("go").text("Go")]);
//! let waiter = Waiter::new(&page).at_most(Duration::from_millis(200));
//! assert!(waiter.visible(&Locator::id("go")).unwrap());
//! ```

pub use wtf_wait::*;

pub mod runner {
    pub use wtf_runner::*;
}
