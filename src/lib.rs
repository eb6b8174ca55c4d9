//! Authentication and progress bridging for `git2` remote operations.
//!
//! A network operation (fetch, push, clone, ls-remote) owns one
//! [`RemoteCallback`]: it builds an ordered queue of credential candidates
//! from the remote URL and the user's SSH client configuration, serves them
//! one at a time as the server rejects attempts, and converts raw transfer
//! counters into rate-limited, human-readable status lines plus an
//! unthrottled structured snapshot callback.
//!
//! The actual network I/O stays inside libgit2; this crate only answers its
//! callbacks.

pub mod auth;
pub mod callbacks;
pub mod errors;
pub mod git_url;
pub mod ops;
pub mod progress;
pub mod ssh;

pub use auth::candidate::Credential;
pub use auth::cascade::{CredentialCascade, DefaultCredentialPolicy};
pub use callbacks::{Mode, RemoteCallback};
pub use errors::{ErrorCategory, GitError};
pub use git_url::GitUrl;
pub use ops::PushOutcome;
pub use progress::transfer::TransferSnapshot;
