//! Cycle position over an [`InputSet`](super::input::InputSet).

/// Where the "cycle to next input" action currently points.
///
/// `None` means no input has been selected since startup; the next cycle
/// request then lands on index 0.  The state is never read back from the
/// monitor and never persisted, so a freshly created `CycleState` is always
/// unselected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleState {
    current: Option<usize>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of the last successfully selected input, if any.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// The index a cycle request would select in a set of `len` inputs.
    ///
    /// Computes `(i + 1) mod len` with "unselected" acting as `-1`.  Returns
    /// `None` when `len` is zero.  Does not change the state; call
    /// [`commit`](Self::commit) once the switch has succeeded.
    pub fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(match self.current {
            Some(i) => (i + 1) % len,
            None => 0,
        })
    }

    /// Records `index` as the selected input.
    pub fn commit(&mut self, index: usize) {
        self.current = Some(index);
    }

    /// Returns to the unselected state.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_unselected() {
        assert_eq!(CycleState::new().current(), None);
    }

    #[test]
    fn test_next_index_from_unselected_is_zero() {
        assert_eq!(CycleState::new().next_index(4), Some(0));
    }

    #[test]
    fn test_next_index_wraps_around() {
        // Arrange
        let mut state = CycleState::new();
        state.commit(3);

        // Act / Assert
        assert_eq!(state.next_index(4), Some(0));
    }

    #[test]
    fn test_next_index_does_not_mutate() {
        let mut state = CycleState::new();
        state.commit(1);
        let _ = state.next_index(4);
        assert_eq!(state.current(), Some(1));
    }

    #[test]
    fn test_next_index_of_empty_set_is_none() {
        assert_eq!(CycleState::new().next_index(0), None);
    }

    #[test]
    fn test_stale_index_beyond_shrunk_set_still_wraps() {
        let mut state = CycleState::new();
        state.commit(7);
        assert_eq!(state.next_index(4), Some(0));
    }

    #[test]
    fn test_reset_clears_selection() {
        let mut state = CycleState::new();
        state.commit(2);
        state.reset();
        assert_eq!(state.current(), None);
    }
}
