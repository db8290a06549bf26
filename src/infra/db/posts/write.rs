use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{InsertPostParams, PostsRepo, RepoError, UpdatePostParams};
use crate::domain::entities::PostRecord;
use crate::infra::db::map_sqlx_error;

use super::super::PostgresRepositories;
use super::{POST_COLUMNS, PostRow};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post_by_filename(
        &self,
        filename: &str,
        user_id: Uuid,
    ) -> Result<Option<PostRecord>, RepoError> {
        self.select_post_by_filename(filename, user_id).await
    }

    async fn insert_post(&self, params: InsertPostParams) -> Result<PostRecord, RepoError> {
        let InsertPostParams {
            user_id,
            filename,
            title,
            text,
            description,
            publish_at,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO posts (id, user_id, filename, title, text, description, \
                 publish_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(filename)
            .bind(title)
            .bind(text)
            .bind(description)
            .bind(publish_at)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            title,
            text,
            description,
            publish_at,
        } = params;

        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "UPDATE posts \
             SET title = $2, text = $3, description = $4, publish_at = $5, updated_at = $6 \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(title)
            .bind(text)
            .bind(description)
            .bind(publish_at)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn posts_for_user(&self, user_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        self.select_posts_for_user(user_id).await
    }

    async fn remove_posts(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        if ids.is_empty() {
            return Ok(());
        }

        sqlx::query("DELETE FROM posts WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}
