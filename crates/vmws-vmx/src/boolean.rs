//! VMX boolean values (`"TRUE"` / `"FALSE"`).

use vmws_core::{VmwsError, VmwsResult};

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "on", "1", "enable", "enabled"];
const FALSY: &[&str] = &["false", "f", "no", "n", "off", "0", "disable", "disabled"];

/// Map an operator-supplied boolean alias to its VMX spelling.
pub fn format_vmx_bool(s: &str) -> VmwsResult<&'static str> {
    let lower = s.trim().to_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Ok("TRUE")
    } else if FALSY.contains(&lower.as_str()) {
        Ok("FALSE")
    } else {
        Err(VmwsError::invalid_input(format!("'{}' is not a boolean value", s)))
    }
}

pub fn vmx_bool(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Read a VMX boolean; anything other than a truthy alias is false.
pub fn parse_vmx_bool(value: &str) -> bool {
    TRUTHY.contains(&value.trim().to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases() {
        for t in ["TRUE", "yes", "On", "1", "enabled"] {
            assert_eq!(format_vmx_bool(t).unwrap(), "TRUE");
        }
        for f in ["FALSE", "no", "off", "0", "disable"] {
            assert_eq!(format_vmx_bool(f).unwrap(), "FALSE");
        }
        assert!(format_vmx_bool("maybe").is_err());
    }

    #[test]
    fn parsing() {
        assert!(parse_vmx_bool("TRUE"));
        assert!(parse_vmx_bool("true"));
        assert!(!parse_vmx_bool("FALSE"));
        assert!(!parse_vmx_bool(""));
    }
}
