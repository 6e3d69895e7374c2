//! Input definitions and the ordered set the cycle action walks.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;
use tracing::warn;

/// Errors raised while building input definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputSetError {
    /// Two input definitions share the same label.
    #[error("duplicate input label: {0}")]
    DuplicateLabel(String),

    /// An input code string is not a number.
    #[error("invalid input code {0:?}: expected a decimal, 0x-hex or 0-octal number")]
    InvalidCode(String),
}

/// The numeric value a monitor expects for one of its inputs.
///
/// Only 16 bits travel in a command frame, so the code is stored as `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputCode(pub u16);

impl InputCode {
    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<u16> for InputCode {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for InputCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Parses a number the way `strtoul(text, NULL, 0)` reads it, without
/// narrowing.
///
/// - `0x` / `0X` prefix: hexadecimal
/// - leading `0`: octal
/// - anything else: decimal
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`InputSetError::InvalidCode`] if `text` is empty, contains a digit
/// outside its radix, or overflows 64 bits.
pub fn parse_number(text: &str) -> Result<u64, InputSetError> {
    let trimmed = text.trim();
    let invalid = || InputSetError::InvalidCode(text.to_owned());

    let (digits, radix) = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        (hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    u64::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Parses an input code with [`parse_number`].
///
/// Values that do not fit in 16 bits are masked to their low 16 bits and
/// logged at `warn`.
///
/// # Errors
///
/// Same as [`parse_number`].
///
/// # Examples
///
/// ```rust
/// use ddcswitch_core::{parse_code, InputCode};
///
/// assert_eq!(parse_code("0xD0").unwrap(), InputCode(0xD0));
/// assert_eq!(parse_code("17").unwrap(), InputCode(17));
/// assert_eq!(parse_code("021").unwrap(), InputCode(0o21));
/// ```
pub fn parse_code(text: &str) -> Result<InputCode, InputSetError> {
    let wide = parse_number(text)?;

    let code = (wide & 0xFFFF) as u16;
    if wide > u64::from(u16::MAX) {
        warn!(
            "input code {text:?} ({wide:#X}) exceeds 16 bits; using low 16 bits {code:#06X}"
        );
    }
    Ok(InputCode(code))
}

/// A labelled input, e.g. `"HDMI1" → 0x90`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDefinition {
    pub label: String,
    pub code: InputCode,
}

impl InputDefinition {
    pub fn new(label: impl Into<String>, code: impl Into<InputCode>) -> Self {
        Self {
            label: label.into(),
            code: code.into(),
        }
    }
}

/// Ordered, duplicate-free list of inputs.
///
/// Index positions in this set are what [`CycleState`](super::cycle::CycleState)
/// refers to, for both cycle and direct selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSet {
    inputs: Vec<InputDefinition>,
}

impl InputSet {
    /// Builds the cycle ordering from declared inputs and a preferred order.
    ///
    /// 1. Labels from `cycle_order` that name a declared input, in that order.
    ///    Repeats and unknown labels are skipped.
    /// 2. Every declared input not yet placed, sorted by label.
    /// 3. If nothing was placed at all, the declared inputs as given.
    ///
    /// # Errors
    ///
    /// Returns [`InputSetError::DuplicateLabel`] if two declared inputs share
    /// a label.
    pub fn ordered(
        inputs: Vec<InputDefinition>,
        cycle_order: &[String],
    ) -> Result<Self, InputSetError> {
        let mut seen = HashSet::new();
        for input in &inputs {
            if !seen.insert(input.label.as_str()) {
                return Err(InputSetError::DuplicateLabel(input.label.clone()));
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(inputs.len());

        for label in cycle_order {
            if placed.contains(label.as_str()) {
                continue;
            }
            if let Some(input) = inputs.iter().find(|i| &i.label == label) {
                placed.insert(input.label.as_str());
                ordered.push(input.clone());
            }
        }

        let mut rest: Vec<&InputDefinition> = inputs
            .iter()
            .filter(|i| !placed.contains(i.label.as_str()))
            .collect();
        rest.sort_by(|a, b| a.label.cmp(&b.label));
        ordered.extend(rest.into_iter().cloned());

        if ordered.is_empty() {
            return Ok(Self { inputs });
        }
        Ok(Self { inputs: ordered })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InputDefinition> {
        self.inputs.get(index)
    }

    /// Position of `label` in the ordering.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputDefinition> {
        self.inputs.iter()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<InputDefinition> {
        vec![
            InputDefinition::new("DisplayPort", 0xD0),
            InputDefinition::new("USB-C", 0xD1),
            InputDefinition::new("HDMI1", 0x90),
            InputDefinition::new("HDMI2", 0x91),
        ]
    }

    fn labels(set: &InputSet) -> Vec<&str> {
        set.iter().map(|i| i.label.as_str()).collect()
    }

    fn order(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_code_hex() {
        assert_eq!(parse_code("0xD0"), Ok(InputCode(0xD0)));
        assert_eq!(parse_code("0X91"), Ok(InputCode(0x91)));
    }

    #[test]
    fn test_parse_code_decimal_and_octal() {
        assert_eq!(parse_code("208"), Ok(InputCode(208)));
        assert_eq!(parse_code("0"), Ok(InputCode(0)));
        assert_eq!(parse_code("010"), Ok(InputCode(8)));
    }

    #[test]
    fn test_parse_code_trims_whitespace() {
        assert_eq!(parse_code("  0x50 "), Ok(InputCode(0x50)));
    }

    #[test]
    fn test_parse_code_masks_wide_values() {
        assert_eq!(parse_code("0x12345"), Ok(InputCode(0x2345)));
    }

    #[test]
    fn test_parse_number_keeps_full_width() {
        assert_eq!(parse_number("0x10050"), Ok(0x10050));
        assert_eq!(parse_number(" 020 "), Ok(16));
        assert!(parse_number("0xG").is_err());
    }

    #[test]
    fn test_parse_code_rejects_garbage() {
        for text in ["", "0x", "HDMI", "09", "0xZZ", "-1"] {
            assert_eq!(
                parse_code(text),
                Err(InputSetError::InvalidCode(text.to_owned())),
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_ordered_follows_cycle_order() {
        // Arrange
        let cycle = order(&["HDMI2", "DisplayPort"]);

        // Act
        let set = InputSet::ordered(defaults(), &cycle).unwrap();

        // Assert: unlisted inputs follow, sorted by label
        assert_eq!(labels(&set), ["HDMI2", "DisplayPort", "HDMI1", "USB-C"]);
    }

    #[test]
    fn test_ordered_skips_unknown_and_repeated_labels() {
        let cycle = order(&["VGA", "USB-C", "USB-C", "HDMI1"]);
        let set = InputSet::ordered(defaults(), &cycle).unwrap();
        assert_eq!(labels(&set), ["USB-C", "HDMI1", "DisplayPort", "HDMI2"]);
    }

    #[test]
    fn test_ordered_without_cycle_order_sorts_by_label() {
        let set = InputSet::ordered(defaults(), &[]).unwrap();
        assert_eq!(labels(&set), ["DisplayPort", "HDMI1", "HDMI2", "USB-C"]);
    }

    #[test]
    fn test_ordered_rejects_duplicate_labels() {
        let mut inputs = defaults();
        inputs.push(InputDefinition::new("HDMI1", 0x11));
        assert_eq!(
            InputSet::ordered(inputs, &[]),
            Err(InputSetError::DuplicateLabel("HDMI1".to_owned()))
        );
    }

    #[test]
    fn test_ordered_of_no_inputs_is_empty() {
        let set = InputSet::ordered(Vec::new(), &order(&["HDMI1"])).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_position_finds_label() {
        let set = InputSet::ordered(defaults(), &order(&["DisplayPort", "USB-C"])).unwrap();
        assert_eq!(set.position("USB-C"), Some(1));
        assert_eq!(set.position("VGA"), None);
    }
}
