//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the platform
//! config directory (or an explicit path), writes it back for
//! `ddcswitch config --init`, and converts it into the validated
//! [`SwitchSettings`](crate::application::switch_input::SwitchSettings) the
//! use case runs on.

pub mod config;
