//! Output formats for extracted records.

pub mod csv;

pub use csv::{default_filename, save_records, write_file, write_records};
