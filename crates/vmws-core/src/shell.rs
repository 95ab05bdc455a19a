//! Argument quoting for host command lines.

use crate::os::HostOs;
use std::borrow::Cow;

const CMD_SPECIAL: &[char] = &[
    ' ', '\t', '&', '|', '<', '>', '^', '(', ')', '%', '!', '"', ',', ';', '=',
];

/// Quote one argument for the host shell.
pub fn quote_arg(os: &HostOs, arg: &str) -> String {
    if os.is_windows() {
        quote_cmd(arg)
    } else {
        shell_escape::unix::escape(Cow::Borrowed(arg)).into_owned()
    }
}

/// `cmd.exe` quoting: wrap in double quotes when needed; embedded quotes
/// are doubled.
fn quote_cmd(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }
    if !arg.contains(CMD_SPECIAL) {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\"\""))
}

/// Quote and join an argv into one command line.
pub fn join_args<S: AsRef<str>>(os: &HostOs, args: &[S]) -> String {
    args.iter()
        .map(|a| quote_arg(os, a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_quoting() {
        assert_eq!(quote_arg(&HostOs::Linux, "/vms/a/a.vmx"), "/vms/a/a.vmx");
        assert_eq!(quote_arg(&HostOs::Linux, "my vm"), "'my vm'");
        assert_eq!(quote_arg(&HostOs::Darwin, "it's"), "'it'\\''s'");
    }

    #[test]
    fn cmd_quoting() {
        assert_eq!(quote_arg(&HostOs::Windows, "C:\\vms\\a.vmx"), "C:\\vms\\a.vmx");
        assert_eq!(
            quote_arg(&HostOs::Windows, "C:\\My VMs\\a.vmx"),
            "\"C:\\My VMs\\a.vmx\""
        );
        assert_eq!(quote_arg(&HostOs::Windows, ""), "\"\"");
    }

    #[test]
    fn join_quotes_each_argument() {
        let line = join_args(&HostOs::Linux, &["vmrun", "-T", "ws", "start", "/v/my vm.vmx"]);
        assert_eq!(line, "vmrun -T ws start '/v/my vm.vmx'");
    }
}
