//! VMX document: an ordered list of `KEY = "VALUE"` lines.
//!
//! Edits remove every line whose key starts with a prefix and then append
//! the new lines, so the appended values are authoritative and lines
//! written by other tools survive untouched. Key matching ignores ASCII
//! case, as the hypervisor does.
//!
//! Values are stored escaped: `"`, `|` and control characters become
//! `|XX` (two hex digits), the form VMware itself writes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use vmws_core::HostOs;

/// One parsed line. Lines that are not `KEY = "VALUE"` keep `key` empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmxLine<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Escape a value for storage between double quotes.
pub fn encode_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '|' || c.is_ascii_control() {
            out.push_str(&format!("|{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Undo [`encode_value`]. A `|` not followed by two hex digits is kept.
pub fn decode_value(raw: &str) -> String {
    if !raw.contains('|') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('|') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let byte = tail
            .get(..2)
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .filter(u8::is_ascii);
        match byte {
            Some(b) => {
                out.push(b as char);
                rest = &tail[2..];
            }
            None => {
                out.push('|');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Split a raw line into key and unquoted, still escaped, value.
pub fn parse_line(line: &str) -> VmxLine<'_> {
    match line.split_once('=') {
        Some((k, v)) => {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v);
            VmxLine { key: k.trim(), value: v }
        }
        None => VmxLine { key: "", value: line.trim() },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmxDocument {
    lines: Vec<String>,
    os: HostOs,
}

impl VmxDocument {
    /// Empty document whose host paths are emitted for `os`.
    pub fn new(os: HostOs) -> Self {
        Self { lines: Vec::new(), os }
    }

    /// Load file contents. Blank lines are dropped; CRLF is accepted.
    pub fn parse(text: &str, os: HostOs) -> Self {
        let lines = text
            .lines()
            .map(|l| l.trim_end_matches('\r').trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { lines, os }
    }

    pub fn os(&self) -> &HostOs {
        &self.os
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// File contents, one line per setting, newline terminated.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Value of `displayName`.
    pub fn display_name(&self) -> Option<String> {
        self.get("displayName")
    }

    /// Last value recorded for `key`, unescaped.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .map(|l| parse_line(l))
            .find(|l| l.key.eq_ignore_ascii_case(key))
            .map(|l| decode_value(l.value))
    }

    /// All settings as a map (later lines win).
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.lines
            .iter()
            .map(|l| parse_line(l))
            .filter(|l| !l.key.is_empty())
            .map(|l| (l.key.to_string(), decode_value(l.value)))
            .collect()
    }

    /// Drop every line whose key starts with `prefix`.
    pub fn remove_prefix(&mut self, prefix: &str) {
        let prefix = prefix.to_ascii_lowercase();
        self.lines.retain(|l| {
            let key = parse_line(l).key;
            key.is_empty() || !key.to_ascii_lowercase().starts_with(&prefix)
        });
    }

    /// Drop every line whose key is exactly `key`.
    pub fn remove_key(&mut self, key: &str) {
        self.lines
            .retain(|l| !parse_line(l).key.eq_ignore_ascii_case(key));
    }

    /// Append `key = "value"`, escaping the value.
    pub fn append(&mut self, key: &str, value: &str) {
        self.lines.push(format!("{} = \"{}\"", key, encode_value(value)));
    }

    /// Replace all values of `key` with one appended line.
    pub fn set(&mut self, key: &str, value: &str) {
        self.remove_key(key);
        self.append(key, value);
    }
}

impl fmt::Display for VmxDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = ".encoding = \"UTF-8\"\r\ndisplayName = \"web01\"\r\n\r\nnvme0.present = \"TRUE\"\r\nnvme0:0.fileName = \"web01.vmdk\"\r\nmemsize = \"2048\"\r\n";

    #[test]
    fn parse_and_get() {
        let doc = VmxDocument::parse(SAMPLE, HostOs::Linux);
        assert_eq!(doc.lines().len(), 5);
        assert_eq!(doc.display_name().as_deref(), Some("web01"));
        assert_eq!(doc.get("NVME0:0.FILENAME").as_deref(), Some("web01.vmdk"));
        assert_eq!(doc.get("numvcpus"), None);
    }

    #[test]
    fn remove_prefix_keeps_unrelated_order() {
        let mut doc = VmxDocument::parse(SAMPLE, HostOs::Linux);
        doc.remove_prefix("nvme0");
        assert_eq!(
            doc.lines(),
            &[
                ".encoding = \"UTF-8\"".to_string(),
                "displayName = \"web01\"".to_string(),
                "memsize = \"2048\"".to_string(),
            ]
        );
    }

    #[test]
    fn set_replaces_and_appends() {
        let mut doc = VmxDocument::parse(SAMPLE, HostOs::Linux);
        doc.set("memsize", "4096");
        assert_eq!(doc.lines().last().map(String::as_str), Some("memsize = \"4096\""));
        assert_eq!(doc.lines().iter().filter(|l| l.starts_with("memsize")).count(), 1);
    }

    #[test]
    fn render_round_trips() {
        let doc = VmxDocument::parse(SAMPLE, HostOs::Linux);
        let again = VmxDocument::parse(&doc.render(), HostOs::Linux);
        assert_eq!(doc, again);
        assert!(doc.render().ends_with("memsize = \"2048\"\n"));
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let mut doc = VmxDocument::new(HostOs::Linux);
        doc.set("displayName", "say \"hi\" | bye");
        assert_eq!(doc.lines()[0], "displayName = \"say |22hi|22 |7C bye\"");
        let again = VmxDocument::parse(&doc.render(), HostOs::Linux);
        assert_eq!(again.display_name().as_deref(), Some("say \"hi\" | bye"));
        assert_eq!(again.to_map()["displayName"], "say \"hi\" | bye");
    }

    #[test]
    fn written_escapes_decode() {
        assert_eq!(decode_value("a|0Ab"), "a\nb");
        assert_eq!(decode_value("pipe|zz|"), "pipe|zz|");
        assert_eq!(encode_value("C:\\vms\\a.vmx"), "C:\\vms\\a.vmx");
    }

    #[test]
    fn line_parsing() {
        let l = parse_line("ethernet0.address = \"aa:bb:cc:dd:ee:ff\"");
        assert_eq!(l.key, "ethernet0.address");
        assert_eq!(l.value, "aa:bb:cc:dd:ee:ff");
        assert_eq!(parse_line("# comment").key, "");
    }
}
