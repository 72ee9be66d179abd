//! Flat, section-delimited `key = value` text format shared by the config file
//! and export artifacts.
//!
//! ```text
//! [Remote "acme"]
//!     user = acme-inc
//!     release-pattern:api = ^api-v
//! ```

use grm_core::RawSections;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

fn error(line: usize, reason: &str) -> ParseError {
    ParseError {
        line,
        reason: reason.to_string(),
    }
}

/// Parse file content. Blank lines and lines starting with `#` or `;` are
/// skipped; keys and values are trimmed. Repeated headers merge.
pub fn parse(text: &str) -> Result<RawSections, ParseError> {
    let mut sections = RawSections::new();
    let mut current: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let header = rest
                .strip_suffix(']')
                .ok_or_else(|| error(line_no, "unterminated section header"))?
                .trim();
            if header.is_empty() {
                return Err(error(line_no, "empty section header"));
            }
            sections.entry(header.to_string()).or_default();
            current = Some(header.to_string());
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| error(line_no, "expected `key = value`"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(error(line_no, "empty key"));
        }
        let header = current
            .as_ref()
            .ok_or_else(|| error(line_no, "entry outside of a section"))?;
        sections
            .entry(header.clone())
            .or_default()
            .insert(key.to_string(), value.trim().to_string());
    }

    Ok(sections)
}

/// Render sections in sorted order, separated by blank lines.
pub fn render(sections: &RawSections) -> String {
    let mut out = String::new();
    for (index, (header, entries)) in sections.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("[{header}]\n"));
        for (key, value) in entries {
            out.push_str(&format!("\t{key} = {value}\n"));
        }
    }
    out
}
