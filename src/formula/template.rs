// src/formula/template.rs

//! `%(name)s` substitution

use crate::error::{Error, Result};

/// Replace every `%(name)s` in `source` with the value `lookup` returns
///
/// An unknown name is an error rather than being left in place, so a typo
/// in a formula never reaches a build step as a literal placeholder.
pub fn substitute<F>(source: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("%(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find(")s").ok_or_else(|| {
            Error::InvalidFormula(format!("unterminated placeholder in `{}`", source))
        })?;
        let key = &after[..end];
        let value = lookup(key).ok_or_else(|| {
            Error::InvalidFormula(format!("unknown variable %({})s in `{}`", key, source))
        })?;
        out.push_str(&value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Names of all placeholders in `source`, in order of appearance
pub fn placeholders(source: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find("%(") {
        let after = &rest[start + 2..];
        match after.find(")s") {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    names
}
