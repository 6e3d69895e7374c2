//! Integration tests for the command builder and transport adapter.
//!
//! These exercise the public API only: frame layout properties across the
//! whole sub-address range, and the exactly-once write contract of
//! `DdcTransport` checked with a `mockall` expectation.

use ddcswitch_core::protocol::frame::{checksum, FRAME_LEN};
use ddcswitch_core::transport::mock::RecordingBlockWrite;
use ddcswitch_core::{
    BlockWrite, BlockWriteStatus, CommandFrame, DdcTransport, InputCode, SettlePolicy,
    SwitchError, Target,
};
use mockall::mock;

mock! {
    pub Bus {}

    impl BlockWrite for Bus {
        fn block_write(&self, target: Target, send: &[u8]) -> BlockWriteStatus;
    }
}

#[test]
fn test_reference_vector_for_lg_alternate_subaddress() {
    let frame = CommandFrame::switch_input(0x50, 0x00D1);

    let bytes = frame.as_bytes();
    assert_eq!(&bytes[..7], &[0x6e, 0x50, 0x84, 0x03, 0xF4, 0xD1, 0x00]);
    assert_eq!(bytes[7], 0x6e ^ 0x50 ^ 0x84 ^ 0x03 ^ 0xF4 ^ 0xD1 ^ 0x00);
}

#[test]
fn test_every_subaddress_and_value_yields_valid_frame() {
    for subaddress in 0..=u8::MAX {
        for value in (0..=0xFFFFu32).step_by(0x0101) {
            let frame = CommandFrame::switch_input(subaddress, value);
            let bytes = frame.as_bytes();

            assert_eq!(bytes.len(), FRAME_LEN);
            assert_eq!(bytes[7], checksum(&bytes[..7]));
            assert_eq!([bytes[0], bytes[2], bytes[3], bytes[4]], [0x6E, 0x84, 0x03, 0xF4]);
            assert_eq!(frame.subaddress(), subaddress);
            assert_eq!(u32::from(frame.value()), value);
            assert!(CommandFrame::parse(bytes).is_ok());
        }
    }
}

#[test]
fn test_switch_input_calls_block_write_exactly_once_with_full_frame() {
    // Arrange
    let target = Target::new(5, 0);
    let expected = CommandFrame::switch_input(0x51, 0x90).as_bytes().to_vec();
    let mut bus = MockBus::new();
    bus.expect_block_write()
        .times(1)
        .withf(move |t, send| *t == target && send.to_vec() == expected)
        .returning(|_, _| BlockWriteStatus::ok());
    let transport = DdcTransport::new(bus, SettlePolicy::none());

    // Act
    let result = transport.switch_input(target, 0x51, InputCode(0x90));

    // Assert (the expectation is verified when `transport` drops)
    assert_eq!(result, Ok(()));
}

#[test]
fn test_failed_block_write_is_not_retried() {
    // Arrange
    let mut bus = MockBus::new();
    bus.expect_block_write()
        .times(1)
        .returning(|_, _| BlockWriteStatus::failed(-1));
    let transport = DdcTransport::new(bus, SettlePolicy::none());

    // Act
    let result = transport.switch_input(Target::new(0, 1), 0x50, InputCode(0xD0));

    // Assert
    assert_eq!(result, Err(SwitchError::Transport { status: -1 }));
}

#[test]
fn test_recorded_writes_are_always_eight_bytes() {
    let transport = DdcTransport::new(RecordingBlockWrite::new(), SettlePolicy::none());
    let target = Target::new(2, 3);

    for code in [0x00u16, 0x0F, 0x90, 0x91, 0xD0, 0xD1, 0x1234, 0xFFFF] {
        transport.switch_input(target, 0x51, InputCode(code)).unwrap();
    }

    let writes = transport.backend().writes();
    assert_eq!(writes.len(), 8);
    assert!(writes.iter().all(|(t, bytes)| *t == target && bytes.len() == 8));
}
