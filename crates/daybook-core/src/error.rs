/// Errors surfaced by task store operations.
///
/// None of these are fatal: a rejected operation leaves the store
/// untouched and the caller decides how to present it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Input rejected before any state was touched.
    #[error("validation error: {0}")]
    Validation(String),
    /// The referenced task is not in the collection.
    #[error("task not found: {0}")]
    NotFound(String),
}

impl TaskError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<M: Into<String>>(reference: M) -> Self {
        Self::NotFound(reference.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
