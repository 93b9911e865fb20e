use std::fmt;
use std::io::{self, Write};

use chrono::Utc;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info = 0,
    Warn = 1,
    Error = 2,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous structured logger.
///
/// Events are upper-snake-case identifiers, fields are flat string pairs.
/// Info and warn lines go to stdout, errors to stderr.
pub struct Logger;

impl Logger {
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Info, event, fields, &mut io::stdout());
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Warn, event, fields, &mut io::stdout());
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Error, event, fields, &mut io::stderr());
    }

    fn emit<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], writer: &mut W) {
        // One String, one write_all: a line is never interleaved.
        let mut line = String::with_capacity(192);

        line.push_str("{\"event\":\"");
        escape_into(&mut line, event);
        line.push_str("\",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push_str("\",\"ts\":\"");
        line.push_str(&Utc::now().to_rfc3339());
        line.push('"');

        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            line.push_str(",\"");
            escape_into(&mut line, key);
            line.push_str("\":\"");
            escape_into(&mut line, value);
            line.push('"');
        }

        line.push_str("}\n");

        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buffer = Vec::new();
        Logger::emit(severity, event, fields, &mut buffer);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_line_is_valid_json() {
        let line = capture(Severity::Info, "STORE_CREATED", &[("name", "samples")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "STORE_CREATED");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["name"], "samples");
        assert!(parsed["ts"].is_string());
    }

    #[test]
    fn test_fields_sorted_by_key() {
        let line = capture(
            Severity::Warn,
            "EVT",
            &[("zulu", "1"), ("alpha", "2"), ("mike", "3")],
        );
        let alpha = line.find("alpha").unwrap();
        let mike = line.find("mike").unwrap();
        let zulu = line.find("zulu").unwrap();
        assert!(alpha < mike && mike < zulu);
    }

    #[test]
    fn test_special_characters_escaped() {
        let line = capture(Severity::Error, "EVT", &[("msg", "a \"b\"\n\tc\\d")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["msg"], "a \"b\"\n\tc\\d");
    }

    #[test]
    fn test_exactly_one_line() {
        let line = capture(Severity::Info, "EVT", &[("a", "1"), ("b", "2")]);
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Info.to_string(), "INFO");
        assert_eq!(Severity::Warn.to_string(), "WARN");
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }
}
