use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants follow the error taxonomy of the diff and instrumentation core:
///
/// ## Precondition violations
/// - [`Error::Malformed`] - A supplied method body breaks the instruction model invariants
///   (offsets not strictly increasing, exception region bounds inverted, ...)
/// - [`Error::InvalidArgument`] - A required argument was empty or otherwise unusable
///
/// ## Configuration errors
/// - [`Error::UnknownPatternKind`] - A forbid expression declared a kind that does not exist
/// - [`Error::InvalidPattern`] - A regular expression or wildcard failed to compile
/// - [`Error::JsonError`] - A configuration or model document could not be (de)serialized
///
/// ## Assembler errors
/// - [`Error::UndefinedLabel`] / [`Error::DuplicateLabel`] - Label bookkeeping of the
///   [`crate::assembly::InstructionAssembler`] failed
///
/// Unsupported method shapes are *not* errors: they are reported as per-item outcomes
/// (see [`crate::instrument::Rewrite`]) so a single odd method never aborts a batch. The
/// batch entry points treat a malformed body the same way, see
/// [`crate::diff::AssemblyDiff::skipped`] and [`crate::instrument::PassThroughReason::Malformed`].
///
/// # Examples
///
/// ```rust
/// use ildiff::{Error, filter::{ForbidExpression, PatternKind}};
///
/// match ForbidExpression::new("Foo(", PatternKind::Regex) {
///     Ok(_) => unreachable!(),
///     Err(Error::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "Foo("),
///     Err(e) => panic!("unexpected error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The supplied instruction model is damaged and can not be processed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A required argument was empty or unusable.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// A forbid expression declared a pattern kind that does not exist.
    ///
    /// This is a defect in how the filter was defined, never a transient condition.
    #[error("Unknown pattern kind '{0}' (expected Regex, ExactString or Wildcard)")]
    UnknownPatternKind(String),

    /// A regular expression or wildcard could not be compiled.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern text
        pattern: String,
        /// The underlying compilation error
        #[source]
        source: regex::Error,
    },

    /// A branch referenced a label that was never defined.
    #[error("Undefined label '{0}'")]
    UndefinedLabel(String),

    /// A label was defined more than once.
    #[error("Duplicate label '{0}'")]
    DuplicateLabel(String),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// (De)serialization of a configuration or model document failed.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),
}
