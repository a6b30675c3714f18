//! The single JSON object each invocation prints.

use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;

/// Result of one command, printed to stdout as one JSON object.
#[derive(Debug, Serialize)]
pub struct CommandOutput {
    /// Whether the command fully succeeded.
    pub success: bool,
    /// Summary for humans.
    pub message: String,
    /// Records affected.
    pub count: u64,
    /// Command-specific fields, flattened into the object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandOutput {
    /// Creates an output with no extra fields.
    pub fn new(success: bool, message: impl Into<String>, count: u64) -> Self {
        Self {
            success,
            message: message.into(),
            count,
            extra: Map::new(),
        }
    }

    /// A failed command.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(false, message, 0)
    }

    /// Adds a command-specific field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> serde_json::Result<Self> {
        self.extra.insert(key.to_owned(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Writes the object followed by a newline.
    pub fn write_to(&self, mut out: impl Write) -> std::io::Result<()> {
        serde_json::to_writer(&mut out, self)?;
        writeln!(out)
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_fields_are_flattened() {
        let output = CommandOutput::new(true, "done", 3)
            .with("tenants", ["Acme"])
            .unwrap();
        let mut buf = Vec::new();
        output.write_to(&mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["count"], 3);
        assert_eq!(value["tenants"][0], "Acme");
    }

    #[test]
    fn failure_exits_non_zero() {
        let output = CommandOutput::failure("source unreachable");
        assert_eq!(output.exit_code(), 1);
        assert_eq!(output.count, 0);
        assert_eq!(CommandOutput::new(true, "", 0).exit_code(), 0);
    }
}
