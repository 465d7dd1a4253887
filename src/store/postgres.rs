use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ConstraintViolation, RecordStore};
use crate::db::{
    Comment, CommentChanges, CommentWithPost, NewComment, NewPost, NewUser, Post, PostChanges,
    PostWithComments, User, UserChanges,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";
const POST_COLUMNS: &str = "id, user_id, slug, title, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, user_id, post_id, text, created_at, updated_at";

/// Turns unique and foreign key failures into a [`ConstraintViolation`].
fn write_error(err: sqlx::Error, action: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            if let Some(violation) = db_err.constraint().and_then(ConstraintViolation::new) {
                return violation.into();
            }
        }
    }
    anyhow::Error::new(err).context(action)
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")
    }

    async fn comments_for(&self, post_ids: Vec<Uuid>) -> anyhow::Result<HashMap<Uuid, Vec<Comment>>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(post_ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for comment in comments {
            grouped.entry(comment.post_id).or_default().push(comment);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, "insert user"))?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, "update user"))?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete user")?;
        Ok(user)
    }

    async fn create_post(&self, new: NewPost) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, user_id, slug, title)
            VALUES ($1, $2, $3, $4)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.slug)
        .bind(&new.title)
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, "insert post"))?;
        Ok(post)
    }

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<PostWithComments>> {
        let Some(post) = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let comments = self
            .comments_for(vec![post.id])
            .await?
            .remove(&post.id)
            .unwrap_or_default();
        Ok(Some(PostWithComments { post, comments }))
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<PostWithComments>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;

        let mut comments = self
            .comments_for(posts.iter().map(|p| p.id).collect())
            .await?;
        Ok(posts
            .into_iter()
            .map(|post| {
                let comments = comments.remove(&post.id).unwrap_or_default();
                PostWithComments { post, comments }
            })
            .collect())
    }

    async fn list_posts_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(posts)
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                updated_at = now()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.slug)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, "update post"))?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete post")?;
        Ok(post)
    }

    async fn create_comment(&self, new: NewComment) -> anyhow::Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (id, user_id, post_id, text)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.post_id)
        .bind(&new.text)
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, "insert comment"))?;
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> anyhow::Result<Option<CommentWithPost>> {
        let Some(comment) = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(comment.post_id)
        .fetch_one(&self.db)
        .await
        .context("load comment post")?;
        Ok(Some(CommentWithPost { comment, post }))
    }

    async fn list_comments(&self) -> anyhow::Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(comments)
    }

    async fn update_comment(
        &self,
        id: Uuid,
        changes: CommentChanges,
    ) -> anyhow::Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments
            SET text = COALESCE($2, text),
                updated_at = now()
            WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.text)
        .fetch_optional(&self.db)
        .await
        .context("update comment")?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "DELETE FROM comments WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete comment")?;
        Ok(comment)
    }
}
