//! Path codec.
//!
//! Every path that crosses a crate boundary is held in *canonical* form:
//! forward slashes, repeated separators collapsed, and a Windows drive
//! letter encoded as a leading `/<letter>/` component. `C:\vm\a.vmx` and
//! `C:/vm/a.vmx` both become `/C/vm/a.vmx`. The codec re-emits canonical
//! paths for a target OS when a command line is composed.

use crate::error::{VmwsError, VmwsResult};
use crate::os::{HostOs, PathStyle};
use crate::types::VmFile;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DRIVE_INPUT: Regex =
        Regex::new(r"^([A-Za-z]):(.*)$").expect("drive input pattern");
    static ref DRIVE_CANONICAL: Regex =
        Regex::new(r"^/([A-Za-z])(/.*)?$").expect("drive canonical pattern");
    static ref LS_LINE: Regex = Regex::new(
        r"(?x)
        ^-[rwxsStT-]{9}[.+@]?\s+        # regular file permissions
        \d+\s+                           # link count
        \S+\s+                           # owner
        \S+\s+                           # group
        (\d+)\s+                         # size
        \w{3}\s+\d{1,2}\s+[\d:]+\s+      # date
        (.+)$                            # filename
        ",
    )
    .expect("ls line pattern");
    static ref DIR_LINE: Regex = Regex::new(
        r"(?x)
        ^\d{2}[/.-]\d{2}[/.-]\d{2,4}\s+     # date
        \d{1,2}:\d{2}(?:\s*[AaPp][Mm])?\s+  # time
        (\d+)\s+                             # size (no <DIR>)
        (.+)$                                # filename
        ",
    )
    .expect("dir line pattern");
}

fn collapse_separators(p: &str) -> String {
    let mut out = String::with_capacity(p.len());
    let mut last_sep = false;
    for c in p.chars() {
        if c == '/' {
            if !last_sep {
                out.push(c);
            }
            last_sep = true;
        } else {
            out.push(c);
            last_sep = false;
        }
    }
    out
}

/// Convert any accepted path notation to canonical form.
///
/// Fails when a drive letter is not followed by a directory separator
/// (`C:`, `C:dir`).
pub fn normalize(p: &str) -> VmwsResult<String> {
    if let Some(caps) = DRIVE_INPUT.captures(p) {
        let letter = &caps[1];
        let rest = &caps[2];
        if !(rest.starts_with('\\') || rest.starts_with('/')) {
            return Err(VmwsError::invalid_input(format!(
                "path '{}' has a drive letter without a subdirectory separator",
                p
            )));
        }
        let rest = rest.replace('\\', "/");
        return Ok(collapse_separators(&format!("/{}{}", letter, rest)));
    }
    Ok(collapse_separators(&p.replace('\\', "/")))
}

/// Emit a path for the given target notation.
pub fn format(style: PathStyle, p: &str) -> VmwsResult<String> {
    let canonical = normalize(p)?;
    let out = match style {
        PathStyle::Unix => canonical,
        PathStyle::Windows => match DRIVE_CANONICAL.captures(&canonical) {
            Some(caps) => {
                let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("/");
                format!("{}:{}", &caps[1], rest.replace('/', "\\"))
            }
            None => canonical.replace('/', "\\"),
        },
        PathStyle::Scp => match DRIVE_CANONICAL.captures(&canonical) {
            Some(caps) => {
                let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("/");
                format!("{}:{}", &caps[1], rest)
            }
            None => canonical,
        },
    };
    Ok(out)
}

/// Emit a path in the native notation of `os`.
pub fn format_for(os: &HostOs, p: &str) -> VmwsResult<String> {
    format(os.path_style(), p)
}

/// Equality after normalization. Paths that fail to normalize never match.
pub fn compare(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Last path component, in canonical notation.
pub fn basename(p: &str) -> String {
    let canonical = p.replace('\\', "/");
    canonical
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Everything before the last path component (canonical, no trailing `/`).
pub fn dirname(p: &str) -> String {
    let canonical = p.replace('\\', "/");
    let trimmed = canonical.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => trimmed[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Join canonical components with single separators.
pub fn join(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("/");
    collapse_separators(&joined.replace('\\', "/"))
}

/// Basename up to the first dot: `C:\dir\file.ext` → `file`.
pub fn to_name(p: &str) -> String {
    let base = basename(p);
    match base.find('.') {
        Some(i) => base[..i].to_string(),
        None => base,
    }
}

/// Shell fragment that changes directory on the host and is followed by
/// another command.
///
/// Windows: `C: & cd "\dir" & `; elsewhere: `cd '/dir' ; `.
pub fn chdir_command(os: &HostOs, p: &str) -> VmwsResult<String> {
    let canonical = normalize(p)?;
    if os.is_windows() {
        if let Some(caps) = DRIVE_CANONICAL.captures(&canonical) {
            let rest = caps
                .get(2)
                .map(|m| m.as_str().replace('/', "\\"))
                .unwrap_or_else(|| "\\".to_string());
            return Ok(format!(
                "{}: & cd {} & ",
                &caps[1],
                crate::shell::quote_arg(os, &rest)
            ));
        }
        let native = canonical.replace('/', "\\");
        Ok(format!("cd {} & ", crate::shell::quote_arg(os, &native)))
    } else {
        Ok(format!("cd {} ; ", crate::shell::quote_arg(os, &canonical)))
    }
}

/// Extract `{name, length}` records from `ls -al` (POSIX) or `dir /-C`
/// (Windows) output. Directories, links and summary lines are skipped.
pub fn parse_file_list(os: &HostOs, lines: &[String]) -> Vec<VmFile> {
    lines
        .iter()
        .filter_map(|line| {
            if os.is_windows() {
                parse_dir_line(line)
            } else {
                parse_ls_line(line)
            }
        })
        .collect()
}

/// `-rw-r--r--   1 user group  1234 Jan  1 12:00 name.vmx`
fn parse_ls_line(line: &str) -> Option<VmFile> {
    let caps = LS_LINE.captures(line.trim())?;
    let length = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let name = caps.get(2)?.as_str().to_string();
    Some(VmFile { name, length })
}

/// `01/02/2024  10:00 AM         1234567 name.vmx`
fn parse_dir_line(line: &str) -> Option<VmFile> {
    let caps = DIR_LINE.captures(line.trim())?;
    let length = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let name = caps.get(2)?.as_str().to_string();
    Some(VmFile { name, length })
}

/// True when `p` addresses the ISO store rather than an instance.
pub fn is_iso_path(p: &str) -> bool {
    p == "iso" || p.starts_with("iso/") || p.ends_with("/iso")
}

/// Join user input under `iso_root`. A leading `iso` component names the
/// root itself. Absolute input is rejected.
pub fn format_iso_path(iso_root: &str, p: &str) -> VmwsResult<String> {
    let p = p.replace('\\', "/");
    if p.starts_with('/') || DRIVE_INPUT.is_match(&p) {
        return Err(VmwsError::invalid_input(format!(
            "ISO path '{}' must be relative to the ISO root",
            p
        )));
    }
    let rel = if p == "iso" {
        ""
    } else if let Some(stripped) = p.strip_prefix("iso/") {
        stripped
    } else {
        p.as_str()
    };
    let root = normalize(iso_root)?;
    let joined = join(&[&root, rel]);
    Ok(if joined.len() > 1 {
        joined.trim_end_matches('/').to_string()
    } else {
        joined
    })
}

/// Like [`format_iso_path`] but always yields a `.iso` filename. Absolute
/// input paths are kept (normalized) rather than rejected.
pub fn format_iso_pathname(iso_root: &str, p: &str) -> VmwsResult<String> {
    let slashed = p.replace('\\', "/");
    let mut path = if slashed.starts_with('/') || DRIVE_INPUT.is_match(&slashed) {
        normalize(p)?
    } else {
        format_iso_path(iso_root, p)?
    };
    if !path.to_lowercase().ends_with(".iso") {
        path.push_str(".iso");
    }
    Ok(path)
}
