//! Transport adapter: delivers command frames through the vendor block-write
//! primitive.
//!
//! # How a switch reaches the monitor (for beginners)
//!
//! The display driver exposes one low-level call that pushes raw bytes onto a
//! monitor's DDC/CI bus and reports a status code.  This module hides that
//! call behind the [`BlockWrite`] trait so the rest of the program never
//! depends on a particular driver:
//!
//! - The real implementation lives in the `ddcswitch` application crate and
//!   calls the AMD Display Library.
//! - [`mock::RecordingBlockWrite`] records every frame in memory and is used
//!   by tests and by `--dry-run`.
//!
//! [`DdcTransport`] wraps a `BlockWrite` and adds what every caller needs:
//!
//! 1. Exactly one write per frame, all 8 bytes, no retries.
//! 2. Writes to the same [`Target`] never overlap (per-target mutex).
//! 3. A *settle* pause after each switch, because monitors ignore or garble
//!    commands that arrive while they are still re-syncing to the new input.

pub mod mock;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::input::InputCode;
use crate::domain::target::Target;
use crate::protocol::frame::CommandFrame;

/// Vendor status code for a successful block write.
pub const BLOCK_WRITE_OK: i32 = 0;

/// Default pause after a switch before the monitor accepts further commands.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(700);

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors returned by transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwitchError {
    /// The block-write primitive reported a non-zero status.
    #[error("block write failed with vendor status {status}")]
    Transport { status: i32 },

    /// The vendor library could not be loaded or initialised, or the platform
    /// has no implementation.
    #[error("display library unavailable: {0}")]
    Unavailable(String),
}

// ── Block-write seam ──────────────────────────────────────────────────────────

/// Result of one block-write call as reported by the vendor library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockWriteStatus {
    /// Vendor status code; [`BLOCK_WRITE_OK`] on success.
    pub status: i32,
    /// Number of bytes the vendor reports as read back.  Never interpreted.
    pub bytes_received: i32,
}

impl BlockWriteStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(status: i32) -> Self {
        Self {
            status,
            bytes_received: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BLOCK_WRITE_OK
    }
}

/// The vendor "block write" primitive.
///
/// Implementations push `send` onto the DDC/CI bus of `target` and return the
/// vendor status.  They must not retry; [`DdcTransport`] decides what a
/// failure means.
pub trait BlockWrite: Send + Sync {
    fn block_write(&self, target: Target, send: &[u8]) -> BlockWriteStatus;
}

impl<T: BlockWrite + ?Sized> BlockWrite for Arc<T> {
    fn block_write(&self, target: Target, send: &[u8]) -> BlockWriteStatus {
        (**self).block_write(target, send)
    }
}

impl<T: BlockWrite + ?Sized> BlockWrite for Box<T> {
    fn block_write(&self, target: Target, send: &[u8]) -> BlockWriteStatus {
        (**self).block_write(target, send)
    }
}

// ── Settle policy ─────────────────────────────────────────────────────────────

/// How long to wait after a switch, and whether failures also wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub delay: Duration,
    /// When `true`, a failed write is followed by the same pause.
    pub after_failure: bool,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_SETTLE,
            after_failure: true,
        }
    }
}

impl SettlePolicy {
    /// A policy that never waits.  Used by `--dry-run` and tests.
    pub fn none() -> Self {
        Self {
            delay: Duration::ZERO,
            after_failure: false,
        }
    }

    /// The pause owed after a write that ended with `succeeded`.
    pub fn delay_after(&self, succeeded: bool) -> Option<Duration> {
        if self.delay.is_zero() || !(succeeded || self.after_failure) {
            return None;
        }
        Some(self.delay)
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Sends input-switch frames to monitors.
pub struct DdcTransport<B> {
    backend: B,
    settle: SettlePolicy,
    locks: Mutex<HashMap<Target, Arc<Mutex<()>>>>,
}

impl<B: BlockWrite> DdcTransport<B> {
    pub fn new(backend: B, settle: SettlePolicy) -> Self {
        Self {
            backend,
            settle,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Writes `frame` to `target` once.  Does not settle.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Transport`] with the vendor status if the block
    /// write reports anything other than [`BLOCK_WRITE_OK`].
    pub fn write_frame(&self, target: Target, frame: &CommandFrame) -> Result<(), SwitchError> {
        let lock = self.target_lock(target);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_unlocked(target, frame)
    }

    /// Switches `target` to `code` via `subaddress` and blocks for the settle
    /// interval.
    ///
    /// The per-target lock is held through the settle pause, so a second
    /// switch to the same monitor starts only after the first has settled.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Transport`] if the block write fails.  The
    /// settle pause still applies when the policy says so.
    pub fn switch_input(
        &self,
        target: Target,
        subaddress: u8,
        code: InputCode,
    ) -> Result<(), SwitchError> {
        self.switch_input_with(target, subaddress, code, self.settle)
    }

    /// [`switch_input`](Self::switch_input) with an explicit settle policy
    /// instead of the one given to [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Transport`] if the block write fails.
    pub fn switch_input_with(
        &self,
        target: Target,
        subaddress: u8,
        code: InputCode,
        settle: SettlePolicy,
    ) -> Result<(), SwitchError> {
        let frame = CommandFrame::switch_input(subaddress, u32::from(code.value()));

        let lock = self.target_lock(target);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self.write_unlocked(target, &frame);
        if let Some(delay) = settle.delay_after(result.is_ok()) {
            debug!("settling {target} for {delay:?}");
            std::thread::sleep(delay);
        }
        if result.is_ok() {
            info!("switched {target} to input {code} (sub-address 0x{subaddress:02X})");
        }
        result
    }

    fn write_unlocked(&self, target: Target, frame: &CommandFrame) -> Result<(), SwitchError> {
        debug!("block write to {target}: [{frame}]");
        let reply = self.backend.block_write(target, frame.as_bytes());
        if reply.is_ok() {
            debug!("block write to {target} ok, {} bytes received", reply.bytes_received);
            Ok(())
        } else {
            warn!("block write to {target} failed with status {}", reply.status);
            Err(SwitchError::Transport {
                status: reply.status,
            })
        }
    }

    fn target_lock(&self, target: Target) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(target).or_default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    use super::mock::RecordingBlockWrite;
    use super::*;

    const TARGET: Target = Target::new(5, 0);

    #[test]
    fn test_switch_input_writes_one_eight_byte_frame() {
        // Arrange
        let transport = DdcTransport::new(RecordingBlockWrite::new(), SettlePolicy::none());

        // Act
        let result = transport.switch_input(TARGET, 0x50, InputCode(0xD1));

        // Assert
        assert_eq!(result, Ok(()));
        let writes = transport.backend().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, TARGET);
        assert_eq!(
            writes[0].1,
            CommandFrame::switch_input(0x50, 0xD1).as_bytes().to_vec()
        );
    }

    #[test]
    fn test_non_zero_status_is_transport_error_without_retry() {
        // Arrange
        let transport = DdcTransport::new(RecordingBlockWrite::failing(-3), SettlePolicy::none());

        // Act
        let result = transport.switch_input(TARGET, 0x51, InputCode(0x90));

        // Assert
        assert_eq!(result, Err(SwitchError::Transport { status: -3 }));
        assert_eq!(transport.backend().write_count(), 1);
    }

    #[test]
    fn test_switch_input_blocks_for_settle_delay() {
        let policy = SettlePolicy {
            delay: Duration::from_millis(30),
            after_failure: false,
        };
        let transport = DdcTransport::new(RecordingBlockWrite::new(), policy);

        let start = Instant::now();
        transport.switch_input(TARGET, 0x51, InputCode(0x90)).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_switch_input_with_overrides_constructed_settle() {
        let transport = DdcTransport::new(RecordingBlockWrite::new(), SettlePolicy::default());
        let start = Instant::now();

        let result =
            transport.switch_input_with(TARGET, 0x50, InputCode(0xD0), SettlePolicy::none());

        assert_eq!(result, Ok(()));
        assert!(start.elapsed() < DEFAULT_SETTLE);
    }

    #[test]
    fn test_delay_after_respects_after_failure_flag() {
        let settle_all = SettlePolicy::default();
        assert_eq!(settle_all.delay_after(false), Some(DEFAULT_SETTLE));

        let success_only = SettlePolicy {
            after_failure: false,
            ..SettlePolicy::default()
        };
        assert_eq!(success_only.delay_after(true), Some(DEFAULT_SETTLE));
        assert_eq!(success_only.delay_after(false), None);

        assert_eq!(SettlePolicy::none().delay_after(true), None);
    }

    /// Counts how many writes are in flight at once.
    struct OverlapCounter {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl BlockWrite for OverlapCounter {
        fn block_write(&self, _target: Target, _send: &[u8]) -> BlockWriteStatus {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            BlockWriteStatus::ok()
        }
    }

    #[test]
    fn test_writes_to_same_target_are_serialized() {
        // Arrange
        let transport = Arc::new(DdcTransport::new(
            OverlapCounter {
                in_flight: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
            },
            SettlePolicy::none(),
        ));

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let transport = Arc::clone(&transport);
                thread::spawn(move || {
                    let frame = CommandFrame::switch_input(0x51, 0xD0);
                    transport.write_frame(TARGET, &frame)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // Assert
        assert_eq!(transport.backend().max_seen.load(Ordering::SeqCst), 1);
    }
}
