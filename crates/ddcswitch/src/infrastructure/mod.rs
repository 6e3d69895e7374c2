//! Infrastructure layer: the OS-facing adapters.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `ddcswitch_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`adl`** – Runtime binding to the AMD Display Library.  Provides the
//!   real [`ddcswitch_core::BlockWrite`] and display enumeration on Windows,
//!   and a recording backend for `--dry-run` everywhere.
//!
//! - **`storage`** – Loads, validates and writes the TOML configuration file.

pub mod adl;
pub mod storage;
