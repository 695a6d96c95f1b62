use thiserror::Error;

/// Errors reported by tree operations.
///
/// Both variants signal caller-logic errors rather than recoverable external
/// conditions; no operation in this crate performs I/O or retries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The nodes passed to a rotation are not linked as child and parent.
    #[error("nodes are not related as child and parent")]
    UnrelatedNodes,

    /// A read past the end of an exhausted iterator.
    #[error("iteration has no more elements")]
    Exhausted,
}
