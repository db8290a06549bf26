//! Process-local repositories backed by a mutex-guarded map.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    InsertPostParams, PostsRepo, RepoError, UpdatePostParams, UsersRepo,
};
use crate::domain::entities::{PostRecord, UserRecord};

const POSTS_UNIQUE_CONSTRAINT: &str = "posts_user_filename_key";
const USERS_UNIQUE_CONSTRAINT: &str = "app_users_name_key";

#[derive(Debug, Default)]
struct State {
    users: Vec<UserRecord>,
    posts: Vec<PostRecord>,
}

/// Store with the same uniqueness and ordering rules as the Postgres schema.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepositories {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepoError> {
        self.state
            .lock()
            .map_err(|_| RepoError::from_persistence("in-memory store lock poisoned"))
    }

    /// Every stored post, in insertion order.
    pub fn all_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self.lock()?.posts.clone())
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn find_post_by_filename(
        &self,
        filename: &str,
        user_id: Uuid,
    ) -> Result<Option<PostRecord>, RepoError> {
        let state = self.lock()?;
        Ok(state
            .posts
            .iter()
            .find(|post| post.user_id == user_id && post.filename == filename)
            .cloned())
    }

    async fn insert_post(&self, params: InsertPostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock()?;
        if !state.users.iter().any(|user| user.id == params.user_id) {
            return Err(RepoError::InvalidInput {
                message: format!("unknown user {}", params.user_id),
            });
        }
        if state
            .posts
            .iter()
            .any(|post| post.user_id == params.user_id && post.filename == params.filename)
        {
            return Err(RepoError::Duplicate {
                constraint: POSTS_UNIQUE_CONSTRAINT.to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            filename: params.filename,
            title: params.title,
            text: params.text,
            description: params.description,
            publish_at: params.publish_at,
            created_at: now,
            updated_at: now,
        };
        state.posts.push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock()?;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;

        post.title = params.title;
        post.text = params.text;
        post.description = params.description;
        post.publish_at = params.publish_at;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn posts_for_user(&self, user_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.lock()?;
        let mut posts: Vec<PostRecord> = state
            .posts
            .iter()
            .filter(|post| post.user_id == user_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.publish_at
                .cmp(&a.publish_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(posts)
    }

    async fn remove_posts(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        let mut state = self.lock()?;
        state.posts.retain(|post| !ids.contains(&post.id));
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepositories {
    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|user| user.name == name).cloned())
    }

    async fn create_user(&self, name: &str) -> Result<UserRecord, RepoError> {
        let mut state = self.lock()?;
        if state.users.iter().any(|user| user.name == name) {
            return Err(RepoError::Duplicate {
                constraint: USERS_UNIQUE_CONSTRAINT.to_string(),
            });
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }
}
