//! Engine error taxonomy.

use thiserror::Error;

use crate::script::ScriptError;

/// Anything that can fail one execution attempt. The retry controller treats
/// every variant the same way; they differ only in their diagnostics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The executed code finished without binding a `result` variable.
    #[error("no result returned: the generated code must assign a `result` variable")]
    NoResultFound,

    /// Any runtime fault raised while parsing or running the candidate.
    #[error(transparent)]
    Execution(#[from] ScriptError),

    /// A lazily-backed table could not be fetched into memory.
    #[error("failed to materialize table {index}: {source}")]
    Materialize {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The result does not satisfy the declared output contract.
    #[error("unexpected output: {}", violations.join("; "))]
    InvalidOutputType { violations: Vec<String> },

    /// The result envelope's own type tag disagrees with its value.
    #[error("value of kind `{actual}` must match the declared result type `{declared}`")]
    InvalidOutputValueMismatch { declared: String, actual: String },
}
