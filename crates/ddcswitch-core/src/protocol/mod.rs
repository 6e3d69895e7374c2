//! Protocol module containing the DDC/CI command frame and its constants.

pub mod frame;

pub use frame::{checksum, CommandFrame, FrameError, FRAME_LEN};
