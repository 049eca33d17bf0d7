use thiserror::Error;

// Unified error type for cgmres

#[derive(Error, Debug)]
pub enum CgmresError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("[{context}] size must be {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("lost orthogonality of the Krylov basis at GMRES iteration {0}")]
    LostOrthogonality(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CgmresError {
    /// Checks `actual == expected`, reporting `context` on mismatch.
    pub fn check_dim(context: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { context, expected, actual })
        }
    }
}
