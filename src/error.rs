/// Errors raised while configuring or running a [`crate::WordManager`].
///
/// Every error is fatal to the operation that raised it. The engine is
/// deterministic for a given choice source, so nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown layer `{0}`")]
    UnknownLayer(String),

    #[error("layer `{0}` declared more than once")]
    DuplicateLayer(String),

    #[error("a word manager needs at least one layer")]
    NoLayers,

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("unknown dependency kind `{0}`")]
    UnknownDependencyKind(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("recomputation did not settle within {0} steps")]
    StepLimit(usize),
}

impl Error {
    /// True for the configuration family (bad layers or rules).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::UnknownLayer(_) | Error::DuplicateLayer(_) | Error::NoLayers | Error::InvalidRule(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
