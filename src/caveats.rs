// src/caveats.rs

//! Post-install guidance
//!
//! Caveats describe behavior that happens inside the installed software,
//! outside anything the installer can enforce: where it reads settings from
//! and in which order it looks. Rendering is a pure function of resolved
//! values.

use std::fmt::Write;
use std::path::PathBuf;

/// Resolved inputs for the caveat text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaveatInputs {
    pub name: String,
    /// Settings file read when running under the supervisor
    pub service_settings: Option<PathBuf>,
    /// Environment variable overriding the configuration directory
    pub config_env: Option<String>,
    /// Fallback directory relative to `$HOME`
    pub fallback: Option<String>,
    /// Settings file name inside the configuration directory
    pub settings_file: Option<String>,
    /// Notes with placeholders already resolved
    pub notes: Vec<String>,
    /// Foreground command, present when a service is declared
    pub manual: Option<String>,
}

/// Render caveat text
///
/// Returns an empty string when there is nothing to say.
pub fn render(inputs: &CaveatInputs) -> String {
    let mut paragraphs: Vec<String> = Vec::new();

    if let Some(settings) = &inputs.service_settings {
        paragraphs.push(format!(
            "Configuration for {} is read from {}\nwhen it runs as a supervised service.",
            inputs.name,
            settings.display()
        ));
    }

    if let Some(var) = &inputs.config_env {
        let mut text = String::new();
        let file = inputs.settings_file.as_deref();
        let _ = write!(
            text,
            "If `${}` is set, {} reads {} from that directory.",
            var,
            inputs.name,
            file.unwrap_or("its settings")
        );
        match (&inputs.fallback, file) {
            (Some(fallback), Some(file)) => {
                let _ = write!(
                    text,
                    "\nIf `${}` is not set, {} falls back to `$HOME/{}/{}`.",
                    var,
                    inputs.name,
                    fallback.trim_matches('/'),
                    file
                );
            }
            (Some(fallback), None) => {
                let _ = write!(
                    text,
                    "\nIf `${}` is not set, {} falls back to `$HOME/{}`.",
                    var,
                    inputs.name,
                    fallback.trim_matches('/')
                );
            }
            (None, _) => {
                let _ = write!(
                    text,
                    "\nIf `${}` is not set, {} uses its built-in defaults.",
                    var, inputs.name
                );
            }
        }
        paragraphs.push(text);
    }

    paragraphs.extend(inputs.notes.iter().map(|n| n.trim_end().to_string()));

    if let Some(manual) = &inputs.manual {
        paragraphs.push(format!(
            "To run {} in the foreground without a supervisor:\n  {}",
            inputs.name, manual
        ));
    }

    if paragraphs.is_empty() {
        return String::new();
    }
    let mut out = paragraphs.join("\n\n");
    out.push('\n');
    out
}
