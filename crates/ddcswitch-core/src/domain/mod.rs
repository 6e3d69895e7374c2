//! Domain entities for DdcSwitch.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! The domain layer describes *what* the program works with, never *how* it
//! talks to hardware:
//!
//! - A [`target::Target`] names one monitor as the display driver sees it: an
//!   adapter index plus a display index.  Both come from enumeration and are
//!   treated as opaque numbers.
//! - An [`input::InputDefinition`] pairs a human label ("HDMI1") with the
//!   numeric code the monitor expects for that input.
//! - An [`input::InputSet`] is the ordered list the "cycle" action walks.
//! - A [`cycle::CycleState`] remembers where that walk currently is.
//!
//! Nothing here touches the OS, so every type can be unit-tested on any
//! platform.

pub mod cycle;
pub mod input;
pub mod target;
