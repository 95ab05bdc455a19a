//! Byte-count codec with binary `K`/`M`/`G`/`T`/`P` suffixes.

use crate::error::{VmwsError, VmwsResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SIZE: Regex =
        Regex::new(r"(?i)^\s*([0-9.]+)([KMGTP]B?)?\s*$").expect("size pattern");
}

const SUFFIXES: [(char, u32); 5] = [('K', 1), ('M', 2), ('G', 3), ('T', 4), ('P', 5)];

fn multiplier(exp: u32) -> u128 {
    1024u128.pow(exp)
}

/// Parse `16G`, `1.5K`, `512` into bytes. Fractions truncate toward zero.
pub fn parse_size(s: &str) -> VmwsResult<u64> {
    let caps = SIZE
        .captures(s)
        .ok_or_else(|| VmwsError::invalid_input(format!("invalid size '{}'", s)))?;
    let number = &caps[1];
    let exp = match caps.get(2) {
        Some(m) => {
            let c = m
                .as_str()
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or('B');
            SUFFIXES
                .iter()
                .find(|(s, _)| *s == c)
                .map(|(_, e)| *e)
                .unwrap_or(0)
        }
        None => 0,
    };

    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(VmwsError::invalid_input(format!("invalid size '{}'", s)));
    }

    let overflow = || VmwsError::invalid_input(format!("size '{}' is too large", s));
    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| overflow())?
    };
    // Fractional digits are capped at 18.
    let frac_digits = &frac_part[..frac_part.len().min(18)];
    let (frac_value, frac_scale): (u128, u128) = if frac_digits.is_empty() {
        (0, 1)
    } else {
        (
            frac_digits.parse().map_err(|_| overflow())?,
            10u128.pow(frac_digits.len() as u32),
        )
    };

    let base = multiplier(exp);
    let bytes = int_value
        .checked_mul(base)
        .and_then(|v| v.checked_add(frac_value.checked_mul(base)? / frac_scale))
        .ok_or_else(overflow)?;
    u64::try_from(bytes).map_err(|_| overflow())
}

/// Render a byte count. With `no_humanize` the raw number is printed.
///
/// The largest suffix not exceeding the value is used; exact multiples
/// print as integers, others with up to two decimals.
pub fn format_size(bytes: u64, no_humanize: bool) -> String {
    if no_humanize {
        return bytes.to_string();
    }
    let value = bytes as u128;
    for (suffix, exp) in SUFFIXES.iter().rev() {
        let base = multiplier(*exp);
        if value < base {
            continue;
        }
        if value % base == 0 {
            return format!("{}{}", value / base, suffix);
        }
        // Two decimals, rounded half up, trailing zeros trimmed.
        let hundredths = (value * 100 + base / 2) / base;
        let whole = hundredths / 100;
        let frac = hundredths % 100;
        let text = if frac == 0 {
            format!("{}", whole)
        } else if frac % 10 == 0 {
            format!("{}.{}", whole, frac / 10)
        } else {
            format!("{}.{:02}", whole, frac)
        };
        return format!("{}{}", text, suffix);
    }
    bytes.to_string()
}

/// Size in whole megabytes, as used by `memsize` and `vmware-vdiskmanager`.
pub fn to_megabytes(bytes: u64) -> u64 {
    bytes / multiplier(2) as u64
}
