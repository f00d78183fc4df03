//! Reader and writer for the section-delimited key-value format.

use crate::IniError;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Properties of one section, keyed by property name.
pub type IniSection = BTreeMap<String, String>;

/// Parsed content of a metadata file: section name to its properties.
///
/// A `BTreeMap` keeps the write order deterministic; read order carries no
/// meaning by contract.
pub type IniData = BTreeMap<String, IniSection>;

/// Reads and parses a metadata file.
///
/// # Arguments
///
/// * `path` - The file to read.
///
/// # Errors
///
/// Returns an `IniError` if:
/// - the file does not exist (`FileNotFound`),
/// - the file cannot be read (I/O),
/// - a property line is malformed (`InvalidPropertyLine`).
pub fn read_ini_file(path: &Path) -> Result<IniData, IniError> {
    if !path.exists() {
        return Err(IniError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    read_ini_str(&content)
}

/// Parses metadata text into sections of string properties.
///
/// Lines that are neither section headers nor contain an `=` are ignored.
/// A non-header line containing an `=` must contain exactly one, otherwise
/// the parse fails. Duplicate sections or keys are tolerated on read with
/// last-write-wins semantics.
///
/// # Errors
///
/// Returns `IniError::InvalidPropertyLine` for a line with more than one `=`.
pub fn read_ini_str(content: &str) -> Result<IniData, IniError> {
    let mut data = IniData::new();
    let mut section = String::new();

    for (index, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();

        if is_section_header(line) {
            section = line[1..line.len() - 1].to_owned();
            data.entry(section.clone()).or_default();
        } else if line.contains('=') {
            let (key, value) = parse_property(line).ok_or_else(|| {
                IniError::InvalidPropertyLine {
                    line_number: index + 1,
                    line: raw_line.to_owned(),
                }
            })?;
            data.entry(section.clone())
                .or_default()
                .insert(key.to_owned(), value.to_owned());
        }
    }

    Ok(data)
}

/// Serialises `data` to `path`, completely overwriting the target file.
///
/// Each section is emitted as a `[name]` header followed by one `key=value`
/// line per property and a trailing blank line.
///
/// # Errors
///
/// Returns an `IniError::Io` if writing the file fails.
pub fn write_ini_file(path: &Path, data: &IniData) -> Result<(), IniError> {
    let mut output = String::new();
    for (section, properties) in data {
        output.push('[');
        output.push_str(section);
        output.push_str("]\n");
        for (key, value) in properties {
            output.push_str(key);
            output.push('=');
            output.push_str(value);
            output.push('\n');
        }
        output.push('\n');
    }
    fs::write(path, output)?;
    Ok(())
}

fn is_section_header(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('[') && line.ends_with(']')
}

/// Splits a property line into key and value, or `None` if the line does not
/// contain exactly one `=`.
fn parse_property(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(3, '=');
    let key = parts.next()?;
    let value = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((key.trim(), value.trim()))
}

/// Renders a list value in the canonical bracketed form.
///
/// Every element is single-quoted and elements are joined by `", "`:
/// `['a', 'b']`, `['a']`, `[]`. This is the one list encoding used by every
/// EDR metadata field that holds a list.
pub fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Parses a canonical bracketed list back into its elements.
///
/// Strips one pair of surrounding brackets, splits on `", "` and removes one
/// pair of surrounding single quotes per element. Returns `None` if the value
/// is not bracketed; an empty list (`[]`) yields an empty vector.
pub fn parse_list(value: &str) -> Option<Vec<String>> {
    let trimmed = value.trim();
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    Some(
        inner
            .split(", ")
            .map(|element| {
                let element = element.trim();
                element
                    .strip_prefix('\'')
                    .and_then(|e| e.strip_suffix('\''))
                    .unwrap_or(element)
                    .to_owned()
            })
            .collect(),
    )
}
