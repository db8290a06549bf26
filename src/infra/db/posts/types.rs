use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::PostRecord;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) filename: String,
    pub(crate) title: String,
    pub(crate) text: String,
    pub(crate) description: Option<String>,
    pub(crate) publish_at: OffsetDateTime,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            filename: row.filename,
            title: row.title,
            text: row.text,
            description: row.description,
            publish_at: row.publish_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
