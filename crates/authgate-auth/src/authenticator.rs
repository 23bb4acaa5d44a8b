//! The verdict contract shared by every authenticator

use async_trait::async_trait;
use std::sync::Arc;

/// Outcome of an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Credentials are valid and the user holds every requested group
    Success,
    /// Credentials or group membership were rejected
    Failed,
    /// The backend could not complete the check
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Failed => "failed",
            Verdict::Error => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can decide whether `user`/`pass` may pass, given the
/// groups requested on top of the globally mandatory ones.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, user: &str, pass: &str, extra_groups: &[String]) -> Verdict;
}

#[async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
    async fn authenticate(&self, user: &str, pass: &str, extra_groups: &[String]) -> Verdict {
        (**self).authenticate(user, pass, extra_groups).await
    }
}

#[async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Box<T> {
    async fn authenticate(&self, user: &str, pass: &str, extra_groups: &[String]) -> Verdict {
        (**self).authenticate(user, pass, extra_groups).await
    }
}
