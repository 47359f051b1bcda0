use thiserror::Error;

/// Errors that indicate the embedder mis-configured or mis-used the session,
/// as distinct from ordinary wire-level [`StatusCode`](badgelink_wire::StatusCode)
/// responses, which are protocol data rather than host-side failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("encoded response of {needed} bytes does not fit in the {capacity}-byte shared buffer")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("fragment of {len} bytes exceeds the {capacity}-byte shared buffer outright")]
    FragmentTooLarge { len: usize, capacity: usize },
}
