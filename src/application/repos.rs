//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct InsertPostParams {
    pub user_id: Uuid,
    pub filename: String,
    pub title: String,
    pub text: String,
    pub description: Option<String>,
    pub publish_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub description: Option<String>,
    pub publish_at: OffsetDateTime,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post_by_filename(
        &self,
        filename: &str,
        user_id: Uuid,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn insert_post(&self, params: InsertPostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Posts owned by the user, newest `publish_at` first.
    async fn posts_for_user(&self, user_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;

    async fn remove_posts(&self, ids: &[Uuid]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, name: &str) -> Result<UserRecord, RepoError>;
}
