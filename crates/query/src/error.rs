/// Parse errors for the search expression language.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unterminated quote in query")]
    UnterminatedQuote,

    #[error("empty field name in token '{token}'")]
    EmptyField { token: String },

    #[error("field '{field}' is not a dot-separated identifier path")]
    InvalidField { field: String },

    #[error("missing value in token '{token}'")]
    MissingValue { token: String },

    #[error("unknown comparator in token '{token}'")]
    UnknownComparator { token: String },
}
