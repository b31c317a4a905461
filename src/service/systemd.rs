// src/service/systemd.rs

//! systemd unit encoder

use crate::error::Result;
use std::fmt::Write;

use super::{KeepAlive, ServiceDescriptor, ServiceEncoder};

/// Encodes descriptors as systemd service units
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdEncoder;

impl ServiceEncoder for SystemdEncoder {
    fn extension(&self) -> &'static str {
        "service"
    }

    fn encode(&self, descriptor: &ServiceDescriptor) -> Result<String> {
        let mut unit = String::new();
        let description = descriptor.description.as_deref().unwrap_or(&descriptor.label);
        let log_path = descriptor.log_path.to_string_lossy();

        // Writing into a String cannot fail
        let _ = writeln!(unit, "[Unit]");
        let _ = writeln!(unit, "Description={}", description);
        if descriptor.keep_alive == KeepAlive::NetworkState {
            let _ = writeln!(unit, "Wants=network-online.target");
            let _ = writeln!(unit, "After=network-online.target");
        }
        let _ = writeln!(unit);

        let _ = writeln!(unit, "[Service]");
        let _ = writeln!(unit, "Type=simple");
        let exec: Vec<String> = descriptor
            .program_arguments
            .iter()
            .map(|arg| quote_arg(arg))
            .collect();
        let _ = writeln!(unit, "ExecStart={}", exec.join(" "));
        let _ = writeln!(unit, "Restart={}", restart_policy(descriptor.keep_alive));
        for path in &descriptor.working_paths {
            let _ = writeln!(unit, "ReadWritePaths=-{}", escape_specifiers(&path.to_string_lossy()));
        }
        let _ = writeln!(unit, "StandardOutput=append:{}", escape_specifiers(&log_path));
        let _ = writeln!(unit, "StandardError=append:{}", escape_specifiers(&log_path));

        if descriptor.run_at_load {
            let _ = writeln!(unit);
            let _ = writeln!(unit, "[Install]");
            let _ = writeln!(unit, "WantedBy=default.target");
        }

        Ok(unit)
    }
}

fn restart_policy(keep_alive: KeepAlive) -> &'static str {
    match keep_alive {
        KeepAlive::Always | KeepAlive::NetworkState => "always",
        KeepAlive::Never => "no",
        KeepAlive::SuccessfulExit => "on-failure",
        KeepAlive::Crashed => "on-abnormal",
    }
}

/// `%` starts a unit specifier
fn escape_specifiers(value: &str) -> String {
    value.replace('%', "%%")
}

/// Quote one `ExecStart=` word when it needs it
fn quote_arg(arg: &str) -> String {
    let escaped = escape_specifiers(arg);
    let needs_quotes = escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';' | '$'));
    if !needs_quotes {
        return escaped;
    }

    let mut quoted = String::with_capacity(escaped.len() + 2);
    quoted.push('"');
    for c in escaped.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '$' => quoted.push_str("$$"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
