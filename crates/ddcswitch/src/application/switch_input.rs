//! SwitchInputUseCase: turns "switch to X" and "cycle" requests into frames.
//!
//! The use case owns the selection state for one monitor: the ordered
//! [`InputSet`], the [`CycleState`] pointing into it, and the time of the
//! last accepted request for debouncing.  Writes go through a shared
//! [`DdcTransport`], so the same use case works against the AMD library, the
//! dry-run recorder, or a test double.
//!
//! # Rules
//!
//! - A request issued within `debounce` of the last *accepted* request is
//!   dropped.  Dropped requests are never queued or replayed.
//! - `CycleNext` selects `(i + 1) mod N`, starting at 0 when nothing has been
//!   selected yet.
//! - The cycle position moves only when the block write succeeds.  A failed
//!   write leaves it where it was, so the next cycle retries the same input.
//! - A successful direct selection also moves the cycle position, so the next
//!   cycle continues from the directly chosen input.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ddcswitch_core::{
    BlockWrite, CycleState, DdcTransport, InputDefinition, InputSet, SettlePolicy, SwitchError,
    Target,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default minimum spacing between accepted requests.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

/// Transport shared between the use case, the worker, and blocking tasks.
pub type SharedTransport = Arc<DdcTransport<Arc<dyn BlockWrite>>>;

/// Errors from resolving and sending a switch request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error(transparent)]
    Switch(#[from] SwitchError),
    #[error("unknown input label: {0}")]
    UnknownInput(String),
    #[error("no inputs configured")]
    NoInputs,
}

/// What the caller wants to switch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchKind {
    /// Select the input with this label.
    Direct(String),
    /// Select the input after the current one.
    CycleNext,
}

/// A switch request stamped with the moment it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchRequest {
    pub kind: SwitchKind,
    pub issued_at: Instant,
}

impl SwitchRequest {
    pub fn direct(label: impl Into<String>) -> Self {
        Self {
            kind: SwitchKind::Direct(label.into()),
            issued_at: Instant::now(),
        }
    }

    pub fn cycle_next() -> Self {
        Self {
            kind: SwitchKind::CycleNext,
            issued_at: Instant::now(),
        }
    }

    /// Returns the request re-stamped with `issued_at`.
    pub fn at(mut self, issued_at: Instant) -> Self {
        self.issued_at = issued_at;
        self
    }
}

/// The result of one accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub kind: SwitchKind,
    /// Position of the selected input in the ordered set, if one was resolved.
    pub index: Option<usize>,
    /// The selected input, if one was resolved.
    pub input: Option<InputDefinition>,
    pub result: Result<(), SelectionError>,
}

impl SwitchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    fn unresolved(kind: SwitchKind, error: SelectionError) -> Self {
        Self {
            kind,
            index: None,
            input: None,
            result: Err(error),
        }
    }
}

/// Everything the use case needs to know about the monitor it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSettings {
    pub target: Target,
    pub subaddress: u8,
    pub inputs: InputSet,
    pub debounce: Duration,
    /// Wait after each write; replaced on reload like everything else.
    pub settle: SettlePolicy,
}

/// The Switch Input use case.
pub struct SwitchInputUseCase {
    transport: SharedTransport,
    settings: SwitchSettings,
    cycle: CycleState,
    last_accepted: Option<Instant>,
}

impl SwitchInputUseCase {
    /// Creates a use case with an unselected cycle position.
    pub fn new(transport: SharedTransport, settings: SwitchSettings) -> Self {
        Self {
            transport,
            settings,
            cycle: CycleState::new(),
            last_accepted: None,
        }
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    pub fn settings(&self) -> &SwitchSettings {
        &self.settings
    }

    pub fn cycle_state(&self) -> CycleState {
        self.cycle
    }

    /// Replaces target, inputs, debounce and settle after a configuration
    /// reload.
    ///
    /// The cycle position is kept; if the new set is shorter the next cycle
    /// wraps as usual.
    pub fn reconfigure(&mut self, settings: SwitchSettings) {
        info!(
            "reconfigured: target {}, {} inputs, sub-address 0x{:02X}",
            settings.target,
            settings.inputs.len(),
            settings.subaddress
        );
        self.settings = settings;
    }

    /// Handles one request end to end, blocking through the settle interval.
    ///
    /// Returns `None` when the request was debounced.
    pub fn handle(&mut self, request: SwitchRequest) -> Option<SwitchOutcome> {
        if !self.accept(request.issued_at) {
            return None;
        }

        let (index, input) = match self.resolve(&request.kind) {
            Ok(selection) => selection,
            Err(e) => {
                warn!("cannot switch: {e}");
                return Some(SwitchOutcome::unresolved(request.kind, e));
            }
        };

        let result = self
            .transport
            .switch_input_with(
                self.settings.target,
                self.settings.subaddress,
                input.code,
                self.settings.settle,
            )
            .map_err(SelectionError::from);
        self.record(index, &result);

        Some(SwitchOutcome {
            kind: request.kind,
            index: Some(index),
            input: Some(input),
            result,
        })
    }

    /// Applies the debounce window to a request issued at `issued_at`.
    ///
    /// Returns `true` and records the time when the request is accepted.
    pub fn accept(&mut self, issued_at: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            let since = issued_at.saturating_duration_since(last);
            if since < self.settings.debounce {
                debug!(
                    "debounced request {since:?} after the previous one (window {:?})",
                    self.settings.debounce
                );
                return false;
            }
        }
        self.last_accepted = Some(issued_at);
        true
    }

    /// Picks the input a request refers to without sending anything.
    ///
    /// # Errors
    ///
    /// - [`SelectionError::UnknownInput`] when a direct label is not configured.
    /// - [`SelectionError::NoInputs`] when cycling over an empty set.
    pub fn resolve(&self, kind: &SwitchKind) -> Result<(usize, InputDefinition), SelectionError> {
        let inputs = &self.settings.inputs;
        let index = match kind {
            SwitchKind::Direct(label) => inputs
                .position(label)
                .ok_or_else(|| SelectionError::UnknownInput(label.clone()))?,
            SwitchKind::CycleNext => self
                .cycle
                .next_index(inputs.len())
                .ok_or(SelectionError::NoInputs)?,
        };
        let input = inputs.get(index).cloned().ok_or(SelectionError::NoInputs)?;
        Ok((index, input))
    }

    /// Updates the cycle position after a write to `index` finished.
    pub fn record(&mut self, index: usize, result: &Result<(), SelectionError>) {
        match result {
            Ok(()) => {
                self.cycle.commit(index);
                debug!("cycle position now {index}");
            }
            Err(e) => warn!(
                "switch to index {index} failed ({e}); cycle position stays at {:?}",
                self.cycle.current()
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ddcswitch_core::transport::mock::RecordingBlockWrite;
    use ddcswitch_core::{CommandFrame, InputCode, SettlePolicy};

    const TARGET: Target = Target::new(5, 0);

    fn four_inputs() -> InputSet {
        let inputs = vec![
            InputDefinition::new("DisplayPort", 0xD0),
            InputDefinition::new("USB-C", 0xD1),
            InputDefinition::new("HDMI1", 0x90),
            InputDefinition::new("HDMI2", 0x91),
        ];
        let order: Vec<String> = inputs.iter().map(|i| i.label.clone()).collect();
        InputSet::ordered(inputs, &order).unwrap()
    }

    fn make_use_case(
        recorder: RecordingBlockWrite,
        debounce: Duration,
    ) -> (SwitchInputUseCase, Arc<RecordingBlockWrite>) {
        let recorder = Arc::new(recorder);
        let transport = Arc::new(DdcTransport::new(
            Arc::clone(&recorder) as Arc<dyn BlockWrite>,
            SettlePolicy::none(),
        ));
        let settings = SwitchSettings {
            target: TARGET,
            subaddress: 0x50,
            inputs: four_inputs(),
            debounce,
            settle: SettlePolicy::none(),
        };
        (SwitchInputUseCase::new(transport, settings), recorder)
    }

    /// Issues `count` cycle requests spaced one debounce window apart.
    fn cycle_n(uc: &mut SwitchInputUseCase, start: Instant, count: u32) -> Vec<SwitchOutcome> {
        (0..count)
            .filter_map(|n| {
                uc.handle(SwitchRequest::cycle_next().at(start + DEFAULT_DEBOUNCE * n))
            })
            .collect()
    }

    #[test]
    fn test_cycle_walks_inputs_in_order_and_wraps() {
        // Arrange
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::new(), DEFAULT_DEBOUNCE);

        // Act
        let outcomes = cycle_n(&mut uc, Instant::now(), 5);

        // Assert
        let indices: Vec<_> = outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, [Some(0), Some(1), Some(2), Some(3), Some(0)]);
        assert_eq!(uc.cycle_state().current(), Some(0));

        let sent: Vec<u8> = recorder.writes().iter().map(|(_, b)| b[5]).collect();
        assert_eq!(sent, [0xD0, 0xD1, 0x90, 0x91, 0xD0]);
    }

    #[test]
    fn test_failed_cycle_leaves_state_unchanged() {
        // Arrange: first write succeeds, second fails
        let recorder = RecordingBlockWrite::new();
        recorder.push_status(0);
        recorder.push_status(-1);
        let (mut uc, _recorder) = make_use_case(recorder, DEFAULT_DEBOUNCE);
        let start = Instant::now();

        // Act
        let outcomes = cycle_n(&mut uc, start, 2);

        // Assert
        assert!(outcomes[0].is_success());
        assert_eq!(
            outcomes[1].result,
            Err(SelectionError::Switch(SwitchError::Transport { status: -1 }))
        );
        assert_eq!(uc.cycle_state().current(), Some(0));

        // The next cycle retries index 1.
        let retry = uc
            .handle(SwitchRequest::cycle_next().at(start + DEFAULT_DEBOUNCE * 2))
            .unwrap();
        assert_eq!(retry.index, Some(1));
    }

    #[test]
    fn test_failed_cycles_from_unselected_retry_first_input() {
        // Arrange
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::failing(-1), DEFAULT_DEBOUNCE);

        // Act
        let outcomes = cycle_n(&mut uc, Instant::now(), 2);

        // Assert
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.index == Some(0) && !o.is_success()));
        assert_eq!(uc.cycle_state().current(), None);
        let sent: Vec<u8> = recorder.writes().iter().map(|(_, b)| b[5]).collect();
        assert_eq!(sent, [0xD0, 0xD0]);
    }

    #[test]
    fn test_requests_inside_debounce_window_write_once() {
        // Arrange
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::new(), DEFAULT_DEBOUNCE);
        let t0 = Instant::now();

        // Act
        let first = uc.handle(SwitchRequest::cycle_next().at(t0));
        let second = uc.handle(SwitchRequest::cycle_next().at(t0 + Duration::from_millis(100)));

        // Assert
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(recorder.write_count(), 1);
    }

    #[test]
    fn test_debounced_request_does_not_extend_window() {
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::new(), DEFAULT_DEBOUNCE);
        let t0 = Instant::now();

        uc.handle(SwitchRequest::cycle_next().at(t0));
        uc.handle(SwitchRequest::cycle_next().at(t0 + Duration::from_millis(700)));
        let third = uc.handle(SwitchRequest::cycle_next().at(t0 + Duration::from_millis(760)));

        assert!(third.is_some());
        assert_eq!(recorder.write_count(), 2);
    }

    #[test]
    fn test_direct_selection_sends_code_and_moves_cycle() {
        // Arrange
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::new(), Duration::ZERO);

        // Act
        let outcome = uc.handle(SwitchRequest::direct("HDMI1")).unwrap();

        // Assert
        assert!(outcome.is_success());
        assert_eq!(outcome.index, Some(2));
        assert_eq!(outcome.input.unwrap().code, InputCode(0x90));
        assert_eq!(
            recorder.writes()[0],
            (TARGET, CommandFrame::switch_input(0x50, 0x90).as_bytes().to_vec())
        );

        let next = uc.handle(SwitchRequest::cycle_next()).unwrap();
        assert_eq!(next.index, Some(3));
    }

    #[test]
    fn test_unknown_label_is_reported_without_write() {
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::new(), Duration::ZERO);

        let outcome = uc.handle(SwitchRequest::direct("VGA")).unwrap();

        assert_eq!(outcome.result, Err(SelectionError::UnknownInput("VGA".to_owned())));
        assert_eq!(outcome.index, None);
        assert_eq!(recorder.write_count(), 0);
        assert_eq!(uc.cycle_state().current(), None);
    }

    #[test]
    fn test_cycle_over_empty_set_reports_no_inputs() {
        let (mut uc, recorder) = make_use_case(RecordingBlockWrite::new(), Duration::ZERO);
        let mut settings = uc.settings().clone();
        settings.inputs = InputSet::default();
        uc.reconfigure(settings);

        let outcome = uc.handle(SwitchRequest::cycle_next()).unwrap();

        assert_eq!(outcome.result, Err(SelectionError::NoInputs));
        assert_eq!(recorder.write_count(), 0);
    }

    #[test]
    fn test_selection_error_wraps_transport_error() {
        let error = SelectionError::from(SwitchError::Transport { status: -7 });

        assert_eq!(error, SelectionError::Switch(SwitchError::Transport { status: -7 }));
        assert_eq!(error.to_string(), "block write failed with vendor status -7");
        assert_eq!(
            SelectionError::UnknownInput("VGA".into()).to_string(),
            "unknown input label: VGA"
        );
    }

    #[test]
    fn test_reconfigured_settle_applies_to_next_write() {
        // Arrange
        let (mut uc, _recorder) = make_use_case(RecordingBlockWrite::new(), Duration::ZERO);
        let mut settings = uc.settings().clone();
        settings.settle = SettlePolicy {
            delay: Duration::from_millis(40),
            after_failure: false,
        };

        // Act
        uc.reconfigure(settings);
        let started = Instant::now();
        uc.handle(SwitchRequest::cycle_next());

        // Assert
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_reconfigure_keeps_cycle_position() {
        let (mut uc, _recorder) = make_use_case(RecordingBlockWrite::new(), Duration::ZERO);
        uc.handle(SwitchRequest::direct("USB-C"));

        let settings = uc.settings().clone();
        uc.reconfigure(settings);

        assert_eq!(uc.cycle_state().current(), Some(1));
    }
}
