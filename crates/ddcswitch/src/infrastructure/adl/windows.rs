//! AMD Display Library binding via `LoadLibraryW` / `GetProcAddress`.
//!
//! The library is loaded once per process by [`AdlLibrary::load`] and
//! released in its `Drop` impl.  ADL allocates the display list it hands
//! back through a caller-supplied callback; [`adl_malloc`] serves those
//! allocations from the process heap and [`AdlBuffer`] frees them.
//!
//! The legacy ADL entry points are not documented as thread-safe, so every
//! call is made while holding `call_lock`.

#![cfg(target_os = "windows")]

use std::ffi::{c_char, c_void};
use std::mem::size_of;
use std::ptr::null_mut;
use std::sync::{Mutex, PoisonError};

use ddcswitch_core::{BlockWrite, BlockWriteStatus, SwitchError, Target};
use tracing::{debug, info, warn};
use windows::core::{s, w, PCSTR, PCWSTR};
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::Win32::System::Memory::{
    GetProcessHeap, HeapAlloc, HeapFree, HEAP_FLAGS, HEAP_ZERO_MEMORY,
};

use super::{DisplayEnumerator, DisplayTarget};

// ── ADL constants and layouts ─────────────────────────────────────────────────

const ADL_OK: i32 = 0;
const ADL_ERR_INVALID_PARAM: i32 = -3;
const ADL_MAX_PATH: usize = 256;

const DISPLAY_CONNECTED: i32 = 0x0000_0001;
const DISPLAY_MAPPED: i32 = 0x0000_0002;

/// Library names tried in order.  The `xy` variant is the 32-bit build
/// installed alongside the 64-bit one.
const LIBRARY_NAMES: [PCWSTR; 2] = [w!("atiadlxx.dll"), w!("atiadlxy.dll")];

#[repr(C)]
struct AdapterInfo {
    size: i32,
    adapter_index: i32,
    udid: [c_char; ADL_MAX_PATH],
    bus_number: i32,
    device_number: i32,
    function_number: i32,
    vendor_id: i32,
    adapter_name: [c_char; ADL_MAX_PATH],
    display_name: [c_char; ADL_MAX_PATH],
    present: i32,
    exist: i32,
    driver_path: [c_char; ADL_MAX_PATH],
    driver_path_ext: [c_char; ADL_MAX_PATH],
    pnp_string: [c_char; ADL_MAX_PATH],
    os_display_index: i32,
}

impl AdapterInfo {
    fn zeroed() -> Self {
        // SAFETY: every field is an integer or an integer array, for which the
        // all-zero bit pattern is a valid value.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
struct DisplayId {
    logical_index: i32,
    physical_index: i32,
    logical_adapter_index: i32,
    physical_adapter_index: i32,
}

#[repr(C)]
struct AdlDisplayInfo {
    display_id: DisplayId,
    controller_index: i32,
    display_name: [c_char; ADL_MAX_PATH],
    manufacturer_name: [c_char; ADL_MAX_PATH],
    display_type: i32,
    output_type: i32,
    connector: i32,
    info_mask: i32,
    info_value: i32,
}

type MallocCallback = unsafe extern "system" fn(i32) -> *mut c_void;
type MainControlCreate = unsafe extern "C" fn(MallocCallback, i32) -> i32;
type MainControlDestroy = unsafe extern "C" fn() -> i32;
type NumberOfAdaptersGet = unsafe extern "C" fn(*mut i32) -> i32;
type AdapterInfoGet = unsafe extern "C" fn(*mut AdapterInfo, i32) -> i32;
type DisplayInfoGet = unsafe extern "C" fn(i32, *mut i32, *mut *mut AdlDisplayInfo, i32) -> i32;
type DdcBlockAccessGet =
    unsafe extern "C" fn(i32, i32, i32, i32, i32, *mut c_char, *mut i32, *mut c_char) -> i32;

// ── Allocation callback ───────────────────────────────────────────────────────

/// Allocation callback handed to `ADL_Main_Control_Create`.
///
/// # Safety
///
/// Called by ADL only.  The returned block must be released with
/// `HeapFree` on the process heap, which [`AdlBuffer`] does.
unsafe extern "system" fn adl_malloc(size: i32) -> *mut c_void {
    let Ok(bytes) = usize::try_from(size) else {
        return null_mut();
    };
    // SAFETY: the process heap handle is valid for the life of the process.
    match unsafe { GetProcessHeap() } {
        Ok(heap) => unsafe { HeapAlloc(heap, HEAP_ZERO_MEMORY, bytes) },
        Err(_) => null_mut(),
    }
}

/// Owns an array ADL allocated through [`adl_malloc`].
struct AdlBuffer<T> {
    ptr: *mut T,
    len: usize,
}

impl<T> AdlBuffer<T> {
    fn new(ptr: *mut T, len: i32) -> Self {
        Self {
            ptr,
            len: usize::try_from(len).unwrap_or(0),
        }
    }

    fn as_slice(&self) -> &[T] {
        if self.ptr.is_null() || self.len == 0 {
            return &[];
        }
        // SAFETY: ADL filled `len` contiguous, initialised `T` values at `ptr`
        // and the block stays allocated until `self` is dropped.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl<T> Drop for AdlBuffer<T> {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        // SAFETY: `ptr` came from `HeapAlloc` on the process heap in
        // `adl_malloc` and is freed exactly once here.
        unsafe {
            if let Ok(heap) = GetProcessHeap() {
                if let Err(e) = HeapFree(heap, HEAP_FLAGS(0), Some(self.ptr as *const c_void)) {
                    warn!("HeapFree on ADL buffer failed: {e}");
                }
            }
        }
    }
}

// ── Library handle ────────────────────────────────────────────────────────────

/// A loaded and initialised AMD Display Library.
pub struct AdlLibrary {
    module: HMODULE,
    destroy: MainControlDestroy,
    number_of_adapters: NumberOfAdaptersGet,
    adapter_info: AdapterInfoGet,
    display_info: DisplayInfoGet,
    ddc_block_access: DdcBlockAccessGet,
    call_lock: Mutex<()>,
}

// SAFETY: the module handle and function pointers are process-global and
// immutable after `load`; every ADL call is serialised by `call_lock`.
unsafe impl Send for AdlLibrary {}
// SAFETY: see `Send` above.
unsafe impl Sync for AdlLibrary {}

impl AdlLibrary {
    /// Loads `atiadlxx.dll` (falling back to `atiadlxy.dll`), resolves the
    /// exports this program uses and calls `ADL_Main_Control_Create`.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Unavailable`] if any step fails.  The library is
    /// unloaded again before returning an error.
    pub fn load() -> Result<Self, SwitchError> {
        let module = LIBRARY_NAMES
            .iter()
            // SAFETY: the names are valid NUL-terminated wide strings.
            .find_map(|name| unsafe { LoadLibraryW(*name) }.ok())
            .ok_or_else(|| {
                SwitchError::Unavailable(
                    "AMD Display Library not found (atiadlxx.dll / atiadlxy.dll)".to_string(),
                )
            })?;

        match Self::bind(module) {
            Ok(library) => {
                info!("AMD Display Library initialised");
                Ok(library)
            }
            Err(e) => {
                // SAFETY: `module` was returned by `LoadLibraryW` above and no
                // binding holds it any more.
                let _ = unsafe { FreeLibrary(module) };
                Err(e)
            }
        }
    }

    fn bind(module: HMODULE) -> Result<Self, SwitchError> {
        // SAFETY: each type alias matches the C prototype of the named export.
        let (create, destroy, number_of_adapters, adapter_info, display_info, ddc_block_access) = unsafe {
            (
                resolve::<MainControlCreate>(module, s!("ADL_Main_Control_Create"))?,
                resolve::<MainControlDestroy>(module, s!("ADL_Main_Control_Destroy"))?,
                resolve::<NumberOfAdaptersGet>(module, s!("ADL_Adapter_NumberOfAdapters_Get"))?,
                resolve::<AdapterInfoGet>(module, s!("ADL_Adapter_AdapterInfo_Get"))?,
                resolve::<DisplayInfoGet>(module, s!("ADL_Display_DisplayInfo_Get"))?,
                resolve::<DdcBlockAccessGet>(module, s!("ADL_Display_DDCBlockAccess_Get"))?,
            )
        };

        // SAFETY: `adl_malloc` matches the callback prototype; `1` asks ADL to
        // report only adapters that are present.
        let status = unsafe { create(adl_malloc, 1) };
        if status != ADL_OK {
            return Err(SwitchError::Unavailable(format!(
                "ADL_Main_Control_Create failed with status {status}"
            )));
        }

        Ok(Self {
            module,
            destroy,
            number_of_adapters,
            adapter_info,
            display_info,
            ddc_block_access,
            call_lock: Mutex::new(()),
        })
    }

    fn adapters(&self) -> Result<Vec<AdapterInfo>, SwitchError> {
        let mut count = 0i32;
        // SAFETY: `count` is a valid out-pointer for the duration of the call.
        let status = unsafe { (self.number_of_adapters)(&mut count) };
        if status != ADL_OK {
            return Err(SwitchError::Unavailable(format!(
                "ADL_Adapter_NumberOfAdapters_Get failed with status {status}"
            )));
        }
        let Ok(count) = usize::try_from(count) else {
            return Ok(Vec::new());
        };
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut adapters: Vec<AdapterInfo> = (0..count).map(|_| AdapterInfo::zeroed()).collect();
        let entry_size = size_of::<AdapterInfo>();
        for adapter in &mut adapters {
            adapter.size = entry_size as i32;
        }
        let total = i32::try_from(entry_size * count).map_err(|_| {
            SwitchError::Unavailable(format!("adapter table too large ({count} entries)"))
        })?;

        // SAFETY: `adapters` holds `count` initialised entries spanning
        // exactly `total` bytes.
        let status = unsafe { (self.adapter_info)(adapters.as_mut_ptr(), total) };
        if status != ADL_OK {
            return Err(SwitchError::Unavailable(format!(
                "ADL_Adapter_AdapterInfo_Get failed with status {status}"
            )));
        }
        Ok(adapters)
    }
}

impl Drop for AdlLibrary {
    fn drop(&mut self) {
        // SAFETY: `load` succeeded, so Create was called exactly once and the
        // module is still loaded.
        unsafe {
            (self.destroy)();
            let _ = FreeLibrary(self.module);
        }
        debug!("AMD Display Library released");
    }
}

impl DisplayEnumerator for AdlLibrary {
    fn enumerate(&self) -> Result<Vec<DisplayTarget>, SwitchError> {
        let _guard = self.call_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let adapters = self.adapters()?;
        let mut found = Vec::new();

        for adapter in &adapters {
            let adapter_index = adapter.adapter_index;
            let mut count = 0i32;
            let mut raw: *mut AdlDisplayInfo = null_mut();
            // SAFETY: both out-pointers are valid; ADL allocates the array via
            // `adl_malloc` and ownership passes to `AdlBuffer`.
            let status = unsafe { (self.display_info)(adapter_index, &mut count, &mut raw, 0) };
            let displays = AdlBuffer::new(raw, count);
            if status != ADL_OK {
                debug!(adapter_index, status, "ADL_Display_DisplayInfo_Get failed; skipping adapter");
                continue;
            }

            for info in displays.as_slice() {
                let required = DISPLAY_CONNECTED | DISPLAY_MAPPED;
                if info.info_value & required != required {
                    continue;
                }
                if info.display_id.logical_adapter_index != adapter_index {
                    continue;
                }
                found.push(DisplayTarget {
                    adapter_index,
                    adapter_name: c_string(&adapter.adapter_name),
                    display_index: info.display_id.logical_index,
                    display_name: c_string(&info.display_name),
                    manufacturer: c_string(&info.manufacturer_name),
                });
            }
        }

        debug!(count = found.len(), "enumerated displays");
        Ok(found)
    }
}

impl BlockWrite for AdlLibrary {
    fn block_write(&self, target: Target, send: &[u8]) -> BlockWriteStatus {
        let _guard = self.call_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // ADL takes a mutable pointer even for writes.
        let mut buffer = send.to_vec();
        let Ok(len) = i32::try_from(buffer.len()) else {
            return BlockWriteStatus::failed(ADL_ERR_INVALID_PARAM);
        };
        let mut received = 0i32;

        // SAFETY: `buffer` holds `len` bytes and outlives the call; no read
        // buffer is requested, so the receive pointer is null with length 0.
        let status = unsafe {
            (self.ddc_block_access)(
                target.adapter_index,
                target.display_index,
                0,
                0,
                len,
                buffer.as_mut_ptr().cast::<c_char>(),
                &mut received,
                null_mut(),
            )
        };

        BlockWriteStatus {
            status,
            bytes_received: received,
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Looks up an export and casts it to the function pointer type `F`.
///
/// # Safety
///
/// `F` must be a function pointer type matching the export's prototype.
unsafe fn resolve<F: Copy>(module: HMODULE, name: PCSTR) -> Result<F, SwitchError> {
    debug_assert_eq!(size_of::<F>(), size_of::<usize>());
    // SAFETY: `module` is a loaded library and `name` a NUL-terminated string.
    match unsafe { GetProcAddress(module, name) } {
        // SAFETY: caller guarantees `F` is the export's function pointer type.
        Some(proc) => Ok(unsafe { std::mem::transmute_copy::<_, F>(&proc) }),
        None => Err(SwitchError::Unavailable(format!(
            "export {} missing from the AMD Display Library",
            // SAFETY: `name` came from `s!` and is valid ASCII.
            unsafe { name.display() }
        ))),
    }
}

/// Converts a fixed-size, NUL-terminated C string field to a `String`.
fn c_string(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .map(|&c| c as u8)
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).trim().to_string()
}
