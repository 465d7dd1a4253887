use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConstraintViolation, RecordStore};
use crate::db::{
    Comment, CommentChanges, CommentWithPost, NewComment, NewPost, NewUser, Post, PostChanges,
    PostWithComments, User, UserChanges,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

impl Tables {
    fn with_comments(&self, post: Post) -> PostWithComments {
        let comments = self
            .comments
            .iter()
            .filter(|c| c.post_id == post.id)
            .cloned()
            .collect();
        PostWithComments { post, comments }
    }
}

/// In-process store with the same constraints as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.username == new.username) {
            return Err(ConstraintViolation::UsernameTaken.into());
        }
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(ConstraintViolation::EmailTaken.into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(name) = &changes.username {
            if t.users.iter().any(|u| u.id != id && &u.username == name) {
                return Err(ConstraintViolation::UsernameTaken.into());
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.write().await;
        let Some(pos) = t.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        let user = t.users.remove(pos);

        let removed_posts: Vec<Uuid> = t
            .posts
            .iter()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        t.posts.retain(|p| p.user_id != id);
        t.comments.retain(|c| !removed_posts.contains(&c.post_id));
        for comment in t.comments.iter_mut().filter(|c| c.user_id == Some(id)) {
            comment.user_id = None;
        }
        Ok(Some(user))
    }

    async fn create_post(&self, new: NewPost) -> anyhow::Result<Post> {
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == new.user_id) {
            return Err(ConstraintViolation::UnknownUser.into());
        }
        if t.posts.iter().any(|p| p.slug == new.slug) {
            return Err(ConstraintViolation::SlugTaken.into());
        }
        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            slug: new.slug,
            title: new.title,
            created_at: now,
            updated_at: now,
        };
        t.posts.push(post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<PostWithComments>> {
        let t = self.tables.read().await;
        Ok(t.posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .map(|post| t.with_comments(post)))
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<PostWithComments>> {
        let t = self.tables.read().await;
        Ok(t.posts
            .iter()
            .rev()
            .cloned()
            .map(|post| t.with_comments(post))
            .collect())
    }

    async fn list_posts_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Post>> {
        let t = self.tables.read().await;
        Ok(t.posts
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> anyhow::Result<Option<Post>> {
        let mut t = self.tables.write().await;
        let Some(post) = t.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(slug) = changes.slug {
            post.slug = slug;
        }
        post.updated_at = OffsetDateTime::now_utc();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let mut t = self.tables.write().await;
        let Some(pos) = t.posts.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let post = t.posts.remove(pos);
        t.comments.retain(|c| c.post_id != id);
        Ok(Some(post))
    }

    async fn create_comment(&self, new: NewComment) -> anyhow::Result<Comment> {
        let mut t = self.tables.write().await;
        if !t.posts.iter().any(|p| p.id == new.post_id) {
            return Err(ConstraintViolation::UnknownPost.into());
        }
        let now = OffsetDateTime::now_utc();
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            post_id: new.post_id,
            text: new.text,
            created_at: now,
            updated_at: now,
        };
        t.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> anyhow::Result<Option<CommentWithPost>> {
        let t = self.tables.read().await;
        let Some(comment) = t.comments.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        let post = t
            .posts
            .iter()
            .find(|p| p.id == comment.post_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("comment {} has no post", comment.id))?;
        Ok(Some(CommentWithPost { comment, post }))
    }

    async fn list_comments(&self) -> anyhow::Result<Vec<Comment>> {
        Ok(self.tables.read().await.comments.clone())
    }

    async fn update_comment(
        &self,
        id: Uuid,
        changes: CommentChanges,
    ) -> anyhow::Result<Option<Comment>> {
        let mut t = self.tables.write().await;
        let Some(comment) = t.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(text) = changes.text {
            comment.text = text;
        }
        comment.updated_at = OffsetDateTime::now_utc();
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let mut t = self.tables.write().await;
        let Some(pos) = t.comments.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        Ok(Some(t.comments.remove(pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "$argon2id$placeholder".into(),
            })
            .await
            .expect("create user")
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        seed_user(&store, "y4nt0").await;
        let err = store
            .create_user(NewUser {
                username: "y4nt0".into(),
                email: "other@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConstraintViolation>(),
            Some(&ConstraintViolation::UsernameTaken)
        );
    }

    #[tokio::test]
    async fn deleting_user_cascades_posts_and_detaches_comments() {
        let store = MemoryStore::new();
        let author = seed_user(&store, "author").await;
        let reader = seed_user(&store, "reader").await;

        let own_post = store
            .create_post(NewPost {
                user_id: author.id,
                slug: "hello-abc123".into(),
                title: "hello".into(),
            })
            .await
            .unwrap();
        let other_post = store
            .create_post(NewPost {
                user_id: reader.id,
                slug: "reply-def456".into(),
                title: "reply".into(),
            })
            .await
            .unwrap();
        store
            .create_comment(NewComment {
                user_id: Some(reader.id),
                post_id: own_post.id,
                text: "nice".into(),
            })
            .await
            .unwrap();
        let kept = store
            .create_comment(NewComment {
                user_id: Some(author.id),
                post_id: other_post.id,
                text: "thanks".into(),
            })
            .await
            .unwrap();

        store.delete_user(author.id).await.unwrap().expect("deleted");

        assert!(store.find_post(own_post.id).await.unwrap().is_none());
        let comments = store.list_comments().await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, kept.id);
        assert_eq!(comments[0].user_id, None);
    }

    #[tokio::test]
    async fn missing_records_are_none() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(store.update_user(id, UserChanges::default()).await.unwrap().is_none());
        assert!(store.delete_post(id).await.unwrap().is_none());
        assert!(store.find_comment(id).await.unwrap().is_none());
    }
}
