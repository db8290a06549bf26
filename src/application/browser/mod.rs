//! Interactive post browser: a paginated list of a user's posts with
//! two-phase deletion, driven by a single event queue.

mod keys;
mod model;
mod pager;
mod runtime;
pub mod view;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::entities::PostRecord;

pub use keys::{Key, KeyDecoder, decode_keys};
pub use model::{BrowserModel, DeleteTarget, Mode};
pub use pager::Pager;
pub use runtime::BrowserRuntime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("user not found")]
    Unauthenticated,
    #[error("failed to {action} posts: {message}")]
    Store {
        action: &'static str,
        message: String,
    },
}

impl BrowserError {
    pub fn store(action: &'static str, err: RepoError) -> Self {
        Self::Store {
            action,
            message: err.to_string(),
        }
    }
}

/// Inputs consumed by [`BrowserModel::update`].
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    Key(Key),
    PostsLoaded {
        generation: u64,
        posts: Vec<PostRecord>,
    },
    PostsRemoved {
        ids: Vec<Uuid>,
        indices: Vec<usize>,
    },
    Tick,
    Failed(BrowserError),
}

/// Follow-up work requested by the model, executed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand {
    LoadPosts { user_id: Uuid, generation: u64 },
    RemovePosts { ids: Vec<Uuid>, indices: Vec<usize> },
    ScheduleTick,
    Fail(BrowserError),
    Quit,
}
