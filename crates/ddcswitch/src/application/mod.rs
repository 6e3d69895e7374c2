//! Application layer use cases.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the pure types in `ddcswitch_core`
//! and the OS-facing code in [`crate::infrastructure`].  Code here:
//!
//! - **Orchestrates** core types to fulfil a user goal ("switch the monitor
//!   to the next input").
//! - **Depends on abstractions**: the monitor is reached through
//!   [`ddcswitch_core::BlockWrite`], never through the AMD library directly.
//! - Performs **no file system access** and loads no libraries.
//!
//! # Sub-modules
//!
//! - **`switch_input`** – Resolves a request (direct label or "cycle next")
//!   to an input, applies the debounce window, sends the frame, and advances
//!   the cycle position only when the monitor accepted the write.
//!
//! - **`worker`** – Runs switches one at a time on a Tokio task so callers
//!   never block on the settle interval, and reports each outcome back on a
//!   channel.

pub mod switch_input;
pub mod worker;
