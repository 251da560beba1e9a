//! Small validation helpers shared by the admin RPC wrappers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExactlyOneError {
    #[error("expected exactly one element, got none")]
    None,

    #[error("expected exactly one element, got {0}")]
    MoreThanOne(usize),
}

/// Extracts the single element of a `Vec`, failing if it holds zero or more
/// than one -- used to unwrap the per-topic/per-partition result array of a
/// request issued for exactly one topic/partition.
pub trait ExactlyOne<T> {
    fn exactly_one(self) -> Result<T, ExactlyOneError>;
}

impl<T> ExactlyOne<T> for Vec<T> {
    fn exactly_one(self) -> Result<T, ExactlyOneError> {
        let mut iter = self.into_iter();
        let first = iter.next().ok_or(ExactlyOneError::None)?;
        let remaining = iter.count();
        if remaining > 0 {
            return Err(ExactlyOneError::MoreThanOne(remaining + 1));
        }
        Ok(first)
    }
}
