//! Hex dump for trace logging of binary payloads.

use std::fmt::Write;

/// Render `data` as 16-byte rows: offset, hex bytes, printable ASCII.
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", row * 16);
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for b in chunk {
            out.push(if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rows() {
        let dump = hexdump(b"displayName = \"web\"\n");
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  64 69 73 70"));
        assert!(lines[0].ends_with("|displayName = \"w|"));
        assert!(lines[1].starts_with("00000010  65 62 22 0a"));
        assert!(lines[1].ends_with("|eb\".|"));
    }

    #[test]
    fn empty_input() {
        assert_eq!(hexdump(&[]), "");
    }
}
