//! EDR metadata codec
//!
//! This crate provides the section-delimited key-value text format shared by
//! every EDR metadata file (document records, project records, the repository
//! paths file and the repository metadata file).
//!
//! ## Format
//!
//! ```text
//! [section]
//! key=value
//! other_key=other value
//!
//! [another_section]
//! key=value
//! ```
//!
//! - A line whose content begins with `[` and ends with `]` opens a section
//!   named by the text between the brackets.
//! - A line containing exactly one `=` defines a property under the current
//!   section; the key is the trimmed text before the `=`, the value the
//!   trimmed text after it.
//! - A non-header line containing more than one `=` is malformed and fails
//!   the read. Lines without any `=` are ignored.
//! - Values are plain strings; richer types (lists, dates) use the
//!   deterministic sub-encodings provided by [`format_list`] / [`parse_list`]
//!   and the callers' own timestamp helpers.
//!
//! Section and key order carry no meaning on read. The writer emits sections
//! in map order, one property per line, with a blank line after each section.
//!
//! ## List sub-encoding
//!
//! Lists render bracketed with single-quoted elements joined by `", "`:
//! `['a', 'b']`, `['a']`, `[]`. This is the one canonical list form; parsing
//! strips the brackets, splits on `", "` and removes one pair of surrounding
//! quotes per element.

mod ini;

pub use ini::{
    format_list, parse_list, read_ini_file, read_ini_str, write_ini_file, IniData, IniSection,
};

/// Errors that can occur while reading or writing a metadata file
#[derive(Debug, thiserror::Error)]
pub enum IniError {
    /// The target file does not exist
    #[error("metadata file not found: {0}")]
    FileNotFound(String),

    /// A property line did not contain exactly one `=`
    #[error("invalid property line {line_number}: {line:?}")]
    InvalidPropertyLine { line_number: usize, line: String },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
