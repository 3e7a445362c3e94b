//! Reader for HQL source text.
//!
//! The grammar lives in `syntax/grammar.pest`; [`parser::parse`] turns source
//! text into the generic node tree defined in [`crate::ast`].

pub mod parser;

pub use parser::{parse, parse_str, wrap_in_do};
