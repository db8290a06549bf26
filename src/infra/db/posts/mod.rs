mod read;
mod types;
mod write;

use types::PostRow;

const POST_COLUMNS: &str = "id, user_id, filename, title, text, description, \
     publish_at, created_at, updated_at";
