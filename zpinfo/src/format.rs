//! JSON output shaping.

use serde::Serialize;

/// Formats values as pretty (two-space indented) or compact JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonFormatter {
    no_white_space: bool,
}

impl JsonFormatter {
    pub fn new(no_white_space: bool) -> Self {
        Self { no_white_space }
    }

    /// Serialize `value`; key order is kept as the value holds it.
    pub fn format<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<String> {
        if self.no_white_space {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        }
    }
}
