//! Run status narration.
//!
//! Producers (the run driver and the tool dispatcher) push free-text progress
//! messages through a [`Narrator`]. The [`StatusReporter`] keeps every
//! message per run for polling and republishes it on a broadcast stream for
//! live subscribers (the SSE endpoint).
//!
//! ```text
//!   RunDriver ──narrate──► RunNarrator ──append──► StatusReporter
//!       │                                            │        │
//!   ToolDispatcher ──narrate──┘               snapshot()   subscribe()
//!                                              (polling)   (live stream)
//! ```

mod narrator;
mod reporter;

pub use narrator::{ChannelNarrator, Narrator, RunNarrator, TeeNarrator};
pub(crate) use narrator::narrate;
pub use reporter::{StatusEvent, StatusReporter, StatusSubscription};
