use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::entities::PostRecord;
use crate::infra::db::map_sqlx_error;

use super::super::PostgresRepositories;
use super::{POST_COLUMNS, PostRow};

impl PostgresRepositories {
    pub(super) async fn select_post_by_filename(
        &self,
        filename: &str,
        user_id: Uuid,
    ) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 AND filename = $2");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(user_id)
            .bind(filename)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    pub(super) async fn select_posts_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 \
             ORDER BY publish_at DESC, filename ASC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}
