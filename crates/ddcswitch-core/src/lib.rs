//! # ddcswitch-core
//!
//! Shared library for DdcSwitch containing the DDC/CI frame builder, the
//! block-write transport adapter, the input/cycle domain types, and the
//! hotkey string parser.
//!
//! This crate has zero dependencies on OS APIs, UI frameworks, or the vendor
//! display library.  The vendor library is reached only through the
//! [`BlockWrite`] trait, which the `ddcswitch` application crate implements on
//! top of the AMD Display Library.
//!
//! # Architecture overview (for beginners)
//!
//! Many monitors let you switch the active video input (DisplayPort, HDMI,
//! USB-C…) by sending a small command over the I2C wires inside the video
//! cable.  That command channel is called **DDC/CI**.
//!
//! - **`protocol`** – How the 8 command bytes are laid out, including the XOR
//!   checksum that the monitor uses to reject corrupted frames.
//!
//! - **`transport`** – Delivers a frame to one monitor through the vendor
//!   "block write" primitive, serializes writes per monitor, and waits for the
//!   monitor to finish switching (the *settle* interval).
//!
//! - **`domain`** – Pure data: which monitor to talk to ([`Target`]), which
//!   inputs exist ([`InputDefinition`], [`InputSet`]), and where the "cycle to
//!   next input" action currently points ([`CycleState`]).
//!
//! - **`hotkey`** – Parses hotkey strings such as `"CTRL+ALT+F12"` into Win32
//!   modifier bits and a virtual-key code.

pub mod domain;
pub mod hotkey;
pub mod protocol;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `ddcswitch_core::CommandFrame` instead of
// `ddcswitch_core::protocol::frame::CommandFrame`.
pub use domain::cycle::CycleState;
pub use domain::input::{
    parse_code, parse_number, InputCode, InputDefinition, InputSet, InputSetError,
};
pub use domain::target::Target;
pub use hotkey::{HotkeyError, HotkeySpec};
pub use protocol::frame::{CommandFrame, FrameError};
pub use transport::{
    BlockWrite, BlockWriteStatus, DdcTransport, SettlePolicy, SwitchError, BLOCK_WRITE_OK,
};
