//! gantry-query: the list-endpoint search expression language.
//!
//! A raw query string is parsed into an ordered list of [`Condition`]s
//! that are implicitly ANDed, then evaluated against stored records.
//! Parsing is strict (an unknown comparator is an error, never a silent
//! pass); evaluation short-circuits on the first failing condition.
//!
//! Grammar (whitespace-separated tokens, each optionally double-quoted
//! to embed spaces):
//!
//! ```text
//! token      := ['-'] ( field ':' value | term )
//! field      := ident ('.' ident)*
//! value      := comparator literal | wildcard | literal (',' literal)* | '*'
//! comparator := '>' | '>=' | '<' | '<='
//! wildcard   := '*'? literal '*'?
//! ```

mod error;
mod matcher;
mod parse;

pub use error::QueryError;
pub use matcher::matches;
pub use parse::{parse, Condition, Operator};
