use thiserror::Error;

pub type TlmResult<T> = Result<T, TlmError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TlmError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Library '{library}' was built against core {found}, this core is {expected}")]
    IncompatibleVersion {
        library: String,
        expected: String,
        found: String,
    },
}

/// Reject a library whose declared core version differs from ours.
pub fn check_core_version(library: &str, found: &str) -> TlmResult<()> {
    if found == crate::CORE_VERSION {
        Ok(())
    } else {
        Err(TlmError::IncompatibleVersion {
            library: library.to_string(),
            expected: crate::CORE_VERSION.to_string(),
            found: found.to_string(),
        })
    }
}
