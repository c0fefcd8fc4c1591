pub mod csx_xml;

pub use csx_xml::{ParseError, ParseResult, read_file, read_str, write_file, write_string};
