//! UCI protocol errors.

/// Errors raised while handling UCI input.
///
/// None of these are fatal: the engine logs the problem and keeps
/// reading commands.
#[derive(Debug, thiserror::Error)]
pub enum UciError {
    /// The `position` command is missing `startpos` or `fen`.
    #[error("malformed position command: missing startpos or fen keyword")]
    MalformedPosition,

    /// A FEN string failed to parse.
    #[error("invalid FEN: {fen}")]
    InvalidFen {
        /// The offending FEN string.
        fen: String,
    },

    /// A move in the `position` command was not legal.
    #[error("invalid move: {uci_move}")]
    InvalidMove {
        /// The move string that failed.
        uci_move: String,
    },

    /// A `go` parameter is missing its value.
    #[error("missing value for go parameter: {param}")]
    MissingGoValue {
        /// The parameter name (e.g. "wtime").
        param: String,
    },

    /// A `go` parameter value did not parse.
    #[error("invalid value for go parameter {param}: {value}")]
    InvalidGoValue {
        /// The parameter name.
        param: String,
        /// The offending value.
        value: String,
    },

    /// A `setoption` command was malformed or out of range.
    #[error("invalid option: {message}")]
    InvalidOption {
        /// Explanation of the problem.
        message: String,
    },
}
