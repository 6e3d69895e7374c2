//! Builder and checked parser for the DDC/CI "switch input" command frame.
//!
//! Wire format (8 bytes, as handed to the vendor block-write primitive):
//! ```text
//! [dest:1][subaddr:1][len:1][opcode:1][feature:1][value_lo:1][value_hi:1][chk:1]
//!   0x6E    caller     0x84    0x03      0xF4       value      value     XOR
//! ```
//!
//! - `dest` is the DDC/CI I2C address 0x37 shifted left with the write bit
//!   clear.
//! - `subaddr` selects the command path.  `0x51` is the standard DDC/CI host
//!   address; some LG monitors only honour input switching on the alternate
//!   `0x50` path.
//! - `len` is `0x80 | 4`: four payload bytes follow, checksum excluded.
//! - `feature` is the side-channel input-switch code.  It is fixed; this crate
//!   implements exactly one command class.
//! - `chk` is the XOR of every preceding byte, including `dest`.
//!
//! Every call to [`CommandFrame::switch_input`] returns a fresh frame by value,
//! so concurrent callers never share a buffer.

use std::fmt;

use thiserror::Error;

/// Total frame size in bytes, checksum included.
pub const FRAME_LEN: usize = 8;

/// DDC/CI I2C destination address (0x37 << 1) with the write bit clear.
pub const I2C_DEST_WRITE: u8 = 0x6E;

/// Standard DDC/CI host sub-address.
pub const SUB_ADDRESS_DDC_CI: u8 = 0x51;

/// Alternate sub-address used by LG monitors for input switching.
pub const SUB_ADDRESS_ALTERNATE: u8 = 0x50;

/// Length indicator: high bit set, four payload bytes.
pub const LENGTH_INDICATOR: u8 = 0x84;

/// Set-VCP opcode slot.  Constant for this command class.
pub const SET_VCP_OPCODE: u8 = 0x03;

/// Side-channel feature code that selects the active input.
pub const FEATURE_SWITCH_INPUT: u8 = 0xF4;

const SUBADDRESS_OFFSET: usize = 1;
const VALUE_LOW_OFFSET: usize = 5;
const VALUE_HIGH_OFFSET: usize = 6;
const CHECKSUM_OFFSET: usize = 7;

/// Bytes whose value is fixed by the protocol, as `(offset, value)` pairs.
const FIXED_BYTES: [(usize, u8); 4] = [
    (0, I2C_DEST_WRITE),
    (2, LENGTH_INDICATOR),
    (3, SET_VCP_OPCODE),
    (4, FEATURE_SWITCH_INPUT),
];

/// Errors produced when validating raw bytes as a [`CommandFrame`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The byte slice is not exactly [`FRAME_LEN`] bytes long.
    #[error("invalid frame length: expected 8 bytes, got {0}")]
    InvalidLength(usize),

    /// A byte that the protocol fixes holds a different value.
    #[error("unexpected byte 0x{found:02X} at offset {offset}, expected 0x{expected:02X}")]
    UnexpectedByte { offset: usize, expected: u8, found: u8 },

    /// The trailing checksum does not match the XOR of the preceding bytes.
    #[error("checksum mismatch: computed 0x{computed:02X}, frame carries 0x{found:02X}")]
    ChecksumMismatch { computed: u8, found: u8 },
}

/// XOR-reduces `bytes` into a single checksum byte.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum ^ b)
}

/// A validated 8-byte DDC/CI input-switch frame.
///
/// The checksum invariant holds for every value of this type: frames are only
/// produced by [`CommandFrame::switch_input`] or by [`CommandFrame::parse`],
/// which rejects corrupted input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Builds the frame that switches the monitor to input `value` via
    /// `subaddress`.
    ///
    /// Only the low 16 bits of `value` are encoded; wider values are masked,
    /// never rejected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ddcswitch_core::CommandFrame;
    ///
    /// let frame = CommandFrame::switch_input(0x50, 0x00D1);
    /// assert_eq!(&frame.as_bytes()[..7], &[0x6E, 0x50, 0x84, 0x03, 0xF4, 0xD1, 0x00]);
    /// assert!(frame.is_valid());
    /// ```
    pub fn switch_input(subaddress: u8, value: u32) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        for (offset, fixed) in FIXED_BYTES {
            bytes[offset] = fixed;
        }
        bytes[SUBADDRESS_OFFSET] = subaddress;
        bytes[VALUE_LOW_OFFSET] = (value & 0xFF) as u8;
        bytes[VALUE_HIGH_OFFSET] = ((value >> 8) & 0xFF) as u8;
        bytes[CHECKSUM_OFFSET] = checksum(&bytes[..CHECKSUM_OFFSET]);
        Self(bytes)
    }

    /// Validates raw bytes as a frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidLength`] unless `bytes` is exactly
    /// [`FRAME_LEN`] long, [`FrameError::UnexpectedByte`] if a fixed protocol
    /// byte differs, and [`FrameError::ChecksumMismatch`] if the trailing byte
    /// is not the XOR of the others.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let raw: [u8; FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| FrameError::InvalidLength(bytes.len()))?;

        for (offset, expected) in FIXED_BYTES {
            if raw[offset] != expected {
                return Err(FrameError::UnexpectedByte {
                    offset,
                    expected,
                    found: raw[offset],
                });
            }
        }

        let computed = checksum(&raw[..CHECKSUM_OFFSET]);
        if computed != raw[CHECKSUM_OFFSET] {
            return Err(FrameError::ChecksumMismatch {
                computed,
                found: raw[CHECKSUM_OFFSET],
            });
        }

        Ok(Self(raw))
    }

    /// The sub-address byte.
    pub fn subaddress(&self) -> u8 {
        self.0[SUBADDRESS_OFFSET]
    }

    /// The 16-bit input value carried by the frame.
    pub fn value(&self) -> u16 {
        u16::from_le_bytes([self.0[VALUE_LOW_OFFSET], self.0[VALUE_HIGH_OFFSET]])
    }

    /// The trailing checksum byte.
    pub fn checksum_byte(&self) -> u8 {
        self.0[CHECKSUM_OFFSET]
    }

    /// Returns `true` when the checksum byte matches the preceding bytes.
    pub fn is_valid(&self) -> bool {
        checksum(&self.0[..CHECKSUM_OFFSET]) == self.0[CHECKSUM_OFFSET]
    }

    /// The full frame, ready to hand to the block-write primitive.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("subaddress", &format_args!("0x{:02X}", self.subaddress()))
            .field("value", &format_args!("0x{:04X}", self.value()))
            .field("bytes", &format_args!("[{self}]"))
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
