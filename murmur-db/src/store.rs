use async_trait::async_trait;
use murmur_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    post::{LikeOutcome, Post, PostContent, PostMarker},
    user::{User, UserMarker, Username},
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Result of a write that only goes through for the post's author.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum GuardedWrite<T> {
    Written(T),
    NotAuthor,
    NotFound,
}

impl<T> GuardedWrite<T> {
    /// Classifies a conditional write that touched nothing, given whether the post exists at all.
    #[must_use]
    pub fn rejected(post_exists: bool) -> Self {
        if post_exists {
            GuardedWrite::NotAuthor
        } else {
            GuardedWrite::NotFound
        }
    }
}

/// Persistence for users, posts and authentications.
///
/// Every method is a single round trip with at least row-level atomicity. Nothing spans several
/// calls, so sequences of calls do not observe a consistent snapshot.
#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_authentication(&self, token_hash: &AuthTokenHash)
    -> Result<Option<Authentication>>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// All posts by `author`, oldest first.
    async fn fetch_user_posts(&self, author: Id<UserMarker>) -> Result<Vec<Post>>;

    /// Replaces the content of the post if `author` wrote it.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &PostContent,
    ) -> Result<GuardedWrite<Post>>;

    /// Deletes the post if `author` wrote it, returning what was deleted.
    async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> Result<GuardedWrite<Post>>;

    /// Flips `user`'s membership in the like set. `None` if the post does not exist.
    async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        user: Id<UserMarker>,
    ) -> Result<Option<LikeOutcome>>;
}
