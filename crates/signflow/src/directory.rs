//! Signer directory: where organisational titles come from.

use std::collections::HashMap;

use async_trait::async_trait;
use signflow_core::UserId;

use crate::error::Result;

/// Looks up a user's organisational title for ranking.
///
/// Backed by whatever owns user records (an HR system, an auth service).
#[async_trait]
pub trait SignerDirectory: Send + Sync {
    /// The user's title, or `None` if the user has none on record.
    async fn title_of(&self, user: &UserId) -> Result<Option<String>>;
}

/// A fixed in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    titles: HashMap<UserId, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, user: impl Into<String>, title: impl Into<String>) -> Self {
        self.titles.insert(UserId::new(user), title.into());
        self
    }

    pub fn insert(&mut self, user: UserId, title: impl Into<String>) {
        self.titles.insert(user, title.into());
    }
}

#[async_trait]
impl SignerDirectory for StaticDirectory {
    async fn title_of(&self, user: &UserId) -> Result<Option<String>> {
        Ok(self.titles.get(user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup() {
        let directory = StaticDirectory::new().with_title("rina", "SUPERVISOR");
        assert_eq!(
            directory.title_of(&UserId::new("rina")).await.unwrap().as_deref(),
            Some("SUPERVISOR")
        );
        assert_eq!(directory.title_of(&UserId::new("ghost")).await.unwrap(), None);
    }
}
