//! Recording block-write implementation.
//!
//! `RecordingBlockWrite` never touches hardware.  Every call is appended to an
//! in-memory log of `(Target, bytes)` pairs, and the returned status comes
//! from a script queue, falling back to a fixed default once the queue is
//! empty.  Tests use it to observe exactly what would have been sent; the
//! `ddcswitch` binary uses it for `--dry-run`.
//!
//! ```rust
//! use ddcswitch_core::transport::mock::RecordingBlockWrite;
//! use ddcswitch_core::{DdcTransport, InputCode, SettlePolicy, Target};
//!
//! let recorder = RecordingBlockWrite::new();
//! recorder.push_status(7);
//! let transport = DdcTransport::new(recorder, SettlePolicy::none());
//!
//! assert!(transport.switch_input(Target::new(0, 0), 0x51, InputCode(0x90)).is_err());
//! assert!(transport.switch_input(Target::new(0, 0), 0x51, InputCode(0x90)).is_ok());
//! assert_eq!(transport.backend().write_count(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::domain::target::Target;
use crate::transport::{BlockWrite, BlockWriteStatus, BLOCK_WRITE_OK};

#[derive(Debug, Default)]
pub struct RecordingBlockWrite {
    writes: Mutex<Vec<(Target, Vec<u8>)>>,
    script: Mutex<VecDeque<i32>>,
    default_status: i32,
}

impl RecordingBlockWrite {
    /// A recorder whose writes all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose writes all fail with `status`.
    pub fn failing(status: i32) -> Self {
        Self {
            default_status: status,
            ..Self::default()
        }
    }

    /// Queues `status` as the result of the next unscripted write.
    pub fn push_status(&self, status: i32) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(status);
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(Target, Vec<u8>)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl BlockWrite for RecordingBlockWrite {
    fn block_write(&self, target: Target, send: &[u8]) -> BlockWriteStatus {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((target, send.to_vec()));

        let status = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.default_status);

        if status == BLOCK_WRITE_OK {
            BlockWriteStatus::ok()
        } else {
            BlockWriteStatus::failed(status)
        }
    }
}
