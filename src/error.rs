//! Errors surfaced by the binding. Engine status codes are carried verbatim.

use crate::engine::codes;
use crate::parse::SyntaxError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The engine could not allocate a grammar handle.
    #[error("engine out of memory")]
    NoMemory,
    #[error("grammar error {} ({code}): {message}", code_name(.code))]
    Grammar { code: i32, message: String },
    #[error("parse error {} ({code}): {message}", code_name(.code))]
    Parse {
        code: i32,
        message: String,
        syntax_error: Option<SyntaxError>,
    },
}

fn code_name(code: &i32) -> &'static str {
    codes::name(*code)
}

impl Error {
    /// The engine status code behind this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::NoMemory => codes::NO_MEMORY,
            Error::Grammar { code, .. } | Error::Parse { code, .. } => *code,
        }
    }
}
