//! AMD Display Library (ADL) adapter.
//!
//! ADL is the only way this program reaches a monitor's DDC/CI bus.  It is
//! loaded at runtime from `atiadlxx.dll` (or `atiadlxy.dll` for 32-bit
//! processes on 64-bit Windows), so the binary starts and runs `--dry-run`
//! on machines without an AMD driver, and builds on every platform.
//!
//! # What this module provides
//!
//! - [`DisplayEnumerator`]: lists connected monitors as [`DisplayTarget`]
//!   values.  Every call returns freshly owned data; nothing from a previous
//!   enumeration is cached or shared.
//! - [`DisplayBackend`]: a block-write implementation and an enumerator that
//!   share one loaded library.
//! - [`open_native`]: the ADL-backed backend on Windows, or
//!   [`SwitchError::Unavailable`] elsewhere.
//! - [`open_dry_run`]: a backend that records frames instead of sending them.
//!
//! # Platform implementations
//!
//! | Module    | OS      | API used                                          |
//! |-----------|---------|---------------------------------------------------|
//! | `windows` | Windows | `LoadLibraryW` + `GetProcAddress` on ADL exports  |
//!
//! [`FixedDisplayEnumerator`] is always compiled so `--dry-run` and tests can
//! enumerate on any platform.

use std::sync::Arc;

use ddcswitch_core::transport::mock::RecordingBlockWrite;
use ddcswitch_core::{BlockWrite, SwitchError, Target};
use serde::Serialize;

#[cfg(target_os = "windows")]
pub mod windows;

/// One connected, active monitor as reported by the display driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayTarget {
    pub adapter_index: i32,
    pub adapter_name: String,
    pub display_index: i32,
    pub display_name: String,
    pub manufacturer: String,
}

impl DisplayTarget {
    /// The `(adapter, display)` pair to pass to switch commands.
    pub fn target(&self) -> Target {
        Target::new(self.adapter_index, self.display_index)
    }
}

/// Lists the monitors a backend can address.
pub trait DisplayEnumerator: Send + Sync {
    /// Returns connected and mapped displays.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Unavailable`] if the driver query fails.
    fn enumerate(&self) -> Result<Vec<DisplayTarget>, SwitchError>;
}

/// An enumerator that returns a fixed list.
#[derive(Debug, Clone, Default)]
pub struct FixedDisplayEnumerator {
    displays: Vec<DisplayTarget>,
}

impl FixedDisplayEnumerator {
    pub fn new(displays: Vec<DisplayTarget>) -> Self {
        Self { displays }
    }
}

impl DisplayEnumerator for FixedDisplayEnumerator {
    fn enumerate(&self) -> Result<Vec<DisplayTarget>, SwitchError> {
        Ok(self.displays.clone())
    }
}

/// The two halves of a display driver binding.
#[derive(Clone)]
pub struct DisplayBackend {
    pub block_write: Arc<dyn BlockWrite>,
    pub enumerator: Arc<dyn DisplayEnumerator>,
}

/// Loads the AMD Display Library.
///
/// # Errors
///
/// Returns [`SwitchError::Unavailable`] when the library is missing, an
/// export cannot be resolved, initialisation fails, or the platform is not
/// Windows.
#[cfg(target_os = "windows")]
pub fn open_native() -> Result<DisplayBackend, SwitchError> {
    let library = Arc::new(windows::AdlLibrary::load()?);
    Ok(DisplayBackend {
        block_write: Arc::clone(&library) as Arc<dyn BlockWrite>,
        enumerator: library as Arc<dyn DisplayEnumerator>,
    })
}

/// Loads the AMD Display Library.
///
/// # Errors
///
/// Always returns [`SwitchError::Unavailable`]: ADL exists only on Windows.
#[cfg(not(target_os = "windows"))]
pub fn open_native() -> Result<DisplayBackend, SwitchError> {
    Err(SwitchError::Unavailable(
        "the AMD Display Library is only available on Windows; use --dry-run".to_string(),
    ))
}

/// Builds a backend that records frames and reports `displays` on enumeration.
///
/// The recorder is returned separately so the caller can print what would
/// have been sent.
pub fn open_dry_run(displays: Vec<DisplayTarget>) -> (DisplayBackend, Arc<RecordingBlockWrite>) {
    let recorder = Arc::new(RecordingBlockWrite::new());
    let backend = DisplayBackend {
        block_write: Arc::clone(&recorder) as Arc<dyn BlockWrite>,
        enumerator: Arc::new(FixedDisplayEnumerator::new(displays)),
    };
    (backend, recorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(adapter_index: i32, display_index: i32) -> DisplayTarget {
        DisplayTarget {
            adapter_index,
            adapter_name: "AMD Radeon RX 7800 XT".to_string(),
            display_index,
            display_name: "LG DualUp".to_string(),
            manufacturer: "GSM".to_string(),
        }
    }

    #[test]
    fn test_display_target_maps_to_core_target() {
        assert_eq!(display(5, 1).target(), Target::new(5, 1));
    }

    #[test]
    fn test_dry_run_backend_records_and_enumerates() {
        // Arrange
        let (backend, recorder) = open_dry_run(vec![display(5, 0)]);

        // Act
        let status = backend.block_write.block_write(Target::new(5, 0), &[1, 2, 3]);
        let listed = backend.enumerator.enumerate().unwrap();

        // Assert
        assert!(status.is_ok());
        assert_eq!(recorder.write_count(), 1);
        assert_eq!(listed, vec![display(5, 0)]);
    }

    #[test]
    fn test_each_enumeration_returns_independent_values() {
        let enumerator = FixedDisplayEnumerator::new(vec![display(0, 0)]);

        let mut first = enumerator.enumerate().unwrap();
        first[0].display_name.clear();
        let second = enumerator.enumerate().unwrap();

        assert_eq!(second[0].display_name, "LG DualUp");
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_open_native_is_unavailable_off_windows() {
        assert!(matches!(open_native(), Err(SwitchError::Unavailable(_))));
    }
}
