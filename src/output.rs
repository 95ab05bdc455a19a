//! Result rendering: pretty JSON with `--json`, plaintext otherwise.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use vmws_core::{Vm, VmFile, VmState, VmwsResult};

/// What a command hands back for printing.
#[derive(Debug)]
pub enum Report {
    Vms { vms: Vec<Vm>, detail: bool },
    Files { files: Vec<VmFile>, detail: bool },
    State(VmState),
    Value(Value),
    Lines(Vec<String>),
    Text(String),
    Nothing,
}

impl Report {
    pub fn render(&self, json: bool) -> VmwsResult<String> {
        if json {
            return Ok(match self {
                Report::Vms { vms, .. } => pretty(vms)?,
                Report::Files { files, .. } => pretty(files)?,
                Report::State(s) => pretty(s)?,
                Report::Value(v) => pretty(v)?,
                Report::Lines(l) => pretty(l)?,
                Report::Text(t) => pretty(t)?,
                Report::Nothing => String::new(),
            });
        }
        Ok(match self {
            Report::Vms { vms, detail: false } => vms.iter().map(vm_line).collect::<Vec<_>>().join("\n"),
            Report::Vms { vms, detail: true } => {
                let blocks: VmwsResult<Vec<String>> =
                    vms.iter().map(|vm| Ok(fields(&serde_json::to_value(vm)?))).collect();
                blocks?.join("\n\n")
            }
            Report::Files { files, detail } => files
                .iter()
                .map(|f| {
                    if *detail {
                        format!("{:>14}  {}", f.length, f.name)
                    } else {
                        f.name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Report::State(s) => {
                let what = if s.result.is_empty() {
                    s.power_state.to_string()
                } else {
                    s.result.clone()
                };
                format!("{}: {}", s.name, what)
            }
            Report::Value(v) => plain(v),
            Report::Lines(l) => l.join("\n"),
            Report::Text(t) => t.clone(),
            Report::Nothing => String::new(),
        })
    }

    pub fn print(&self, json: bool) -> VmwsResult<()> {
        let text = self.render(json)?;
        if !text.is_empty() {
            println!("{}", text);
        }
        Ok(())
    }
}

fn pretty<T: Serialize + ?Sized>(v: &T) -> VmwsResult<String> {
    Ok(serde_json::to_string_pretty(v)?)
}

fn vm_line(vm: &Vm) -> String {
    let mut line = format!("{}\t{}\t{}", vm.name, vm.power_state, vm.path);
    if vm.encrypted {
        line.push_str("\tencrypted");
    }
    line
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `key: value` per field; nested values as compact JSON.
fn fields(v: &Value) -> String {
    let Value::Object(map) = v else {
        return scalar(v);
    };
    let mut out = String::new();
    for (k, val) in map {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{}: {}", k, scalar(val));
    }
    out
}

fn plain(v: &Value) -> String {
    match v {
        Value::Object(_) => fields(v),
        Value::Array(items) => items
            .iter()
            .map(|i| if i.is_object() { fields(i) } else { scalar(i) })
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar(other),
    }
}
