use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{
    Comment, CommentChanges, CommentWithPost, NewComment, NewPost, NewUser, Post, PostChanges,
    PostWithComments, User, UserChanges,
};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

/// A write rejected by a schema constraint, keyed by the constraint name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    #[error("Username already registered")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Slug already taken")]
    SlugTaken,
    #[error("User not found")]
    UnknownUser,
    #[error("Post not found")]
    UnknownPost,
}

impl ConstraintViolation {
    pub fn new(constraint: &str) -> Option<Self> {
        match constraint {
            "users_username_key" => Some(Self::UsernameTaken),
            "users_email_key" => Some(Self::EmailTaken),
            "posts_slug_key" => Some(Self::SlugTaken),
            "posts_user_id_fkey" | "comments_user_id_fkey" => Some(Self::UnknownUser),
            "comments_post_id_fkey" => Some(Self::UnknownPost),
            _ => None,
        }
    }
}

/// Record store behind the HTTP handlers.
///
/// `update_*` and `delete_*` return `Ok(None)` when no record has the given id.
/// Writes that break a unique or foreign key fail with a [`ConstraintViolation`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User>;
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list_users(&self) -> anyhow::Result<Vec<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>>;
    /// Also removes the user's posts; their comments stay, detached from the author.
    async fn delete_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn create_post(&self, new: NewPost) -> anyhow::Result<Post>;
    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<PostWithComments>>;
    async fn list_posts(&self) -> anyhow::Result<Vec<PostWithComments>>;
    async fn list_posts_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Post>>;
    async fn update_post(&self, id: Uuid, changes: PostChanges) -> anyhow::Result<Option<Post>>;
    /// Also removes the post's comments.
    async fn delete_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;

    async fn create_comment(&self, new: NewComment) -> anyhow::Result<Comment>;
    async fn find_comment(&self, id: Uuid) -> anyhow::Result<Option<CommentWithPost>>;
    async fn list_comments(&self) -> anyhow::Result<Vec<Comment>>;
    async fn update_comment(
        &self,
        id: Uuid,
        changes: CommentChanges,
    ) -> anyhow::Result<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;
}
