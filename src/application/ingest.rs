//! Ingestion of uploaded post files into the post store.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{Instrument, Span, debug, info, warn};

use crate::application::repos::{InsertPostParams, PostsRepo, RepoError, UpdatePostParams};
use crate::config::IngestSettings;
use crate::domain::content::parse_text;
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::filename::{decode_text, ensure_text_path, sanitize_file_ext};

/// Path that stands for standard input in [`IngestService::write_paths`].
pub const STDIN_PATH: &str = "-";

/// A single file written by a remote session.
pub struct IncomingFile<R> {
    pub name: String,
    pub path: PathBuf,
    pub reader: R,
}

impl<R> IncomingFile<R> {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            reader,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("reading standard input requires a file name")]
    StdinUnnamed,
    #[error("`{}` has no file name", path.display())]
    Unnamed { path: PathBuf },
    #[error("failed to open `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read `{filename}`: {source}")]
    Read {
        filename: String,
        #[source]
        source: io::Error,
    },
    #[error("error for {title}: {source}")]
    Store {
        title: String,
        #[source]
        source: RepoError,
    },
}

impl IngestError {
    fn store(title: &str, source: RepoError) -> Self {
        Self::Store {
            title: title.to_string(),
            source,
        }
    }
}

/// Result of looking up an existing post for a canonical filename.
#[derive(Debug, Clone)]
pub enum Lookup {
    Absent,
    Present(PostRecord),
}

impl From<Option<PostRecord>> for Lookup {
    fn from(value: Option<PostRecord>) -> Self {
        match value {
            Some(post) => Lookup::Present(post),
            None => Lookup::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Created(PostRecord),
    Updated(PostRecord),
}

impl IngestOutcome {
    pub fn post(&self) -> &PostRecord {
        match self {
            IngestOutcome::Created(post) | IngestOutcome::Updated(post) => post,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, IngestOutcome::Created(_))
    }
}

/// Fields resolved from one payload, independent of any stored record.
struct ResolvedPost {
    filename: String,
    title: String,
    text: String,
    description: Option<String>,
    publish_at: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct IngestService {
    posts: Arc<dyn PostsRepo>,
    max_bytes: u64,
    span: Span,
}

impl IngestService {
    pub fn new(posts: Arc<dyn PostsRepo>, settings: &IngestSettings) -> Self {
        Self {
            posts,
            max_bytes: settings.max_bytes.get(),
            span: Span::none(),
        }
    }

    /// Attach the span that carries this session's logging context.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Create or update the post identified by the file's canonical name.
    pub async fn write<R>(
        &self,
        user: &UserRecord,
        file: IncomingFile<R>,
    ) -> Result<IngestOutcome, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let span = self.span.clone();
        let result = self.write_inner(user, file).instrument(span).await;
        match &result {
            Ok(IngestOutcome::Created(_)) => counter!("parchment_ingest_created_total").increment(1),
            Ok(IngestOutcome::Updated(_)) => counter!("parchment_ingest_updated_total").increment(1),
            Err(IngestError::Validation(_)) => {
                counter!("parchment_ingest_rejected_total").increment(1)
            }
            Err(_) => {}
        }
        result
    }

    /// Ingest each path in turn. A failed file never stops the remaining ones.
    pub async fn write_paths(
        &self,
        user: &UserRecord,
        paths: &[PathBuf],
        stdin_name: Option<&str>,
    ) -> Vec<(PathBuf, Result<IngestOutcome, IngestError>)> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let result = self.write_path(user, path, stdin_name).await;
            if let Err(err) = &result {
                self.span.in_scope(|| {
                    warn!(file = %path.display(), error = %err, "file not ingested");
                });
            }
            results.push((path.clone(), result));
        }
        results
    }

    async fn write_path(
        &self,
        user: &UserRecord,
        path: &Path,
        stdin_name: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        if path.as_os_str() == STDIN_PATH {
            let name = stdin_name.ok_or(IngestError::StdinUnnamed)?;
            let file = IncomingFile::new(name, name, tokio::io::stdin());
            return self.write(user, file).await;
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::Unnamed {
                path: path.to_path_buf(),
            })?;
        let reader = tokio::fs::File::open(path)
            .await
            .map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        self.write(user, IncomingFile::new(name, path, reader)).await
    }

    async fn write_inner<R>(
        &self,
        user: &UserRecord,
        file: IncomingFile<R>,
    ) -> Result<IngestOutcome, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let resolved = self.resolve(file).await?;

        let existing = self
            .posts
            .find_post_by_filename(&resolved.filename, user.id)
            .await
            .map_err(|err| IngestError::store(&resolved.title, err))?;

        match Lookup::from(existing) {
            Lookup::Absent => self.create(user, resolved).await,
            Lookup::Present(post) => self.update(post, resolved).await,
        }
    }

    async fn resolve<R>(&self, file: IncomingFile<R>) -> Result<ResolvedPost, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let IncomingFile { name, path, reader } = file;

        let filename = sanitize_file_ext(&name).map_err(DomainError::from)?;

        let mut bytes = Vec::new();
        reader
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .await
            .map_err(|source| IngestError::Read {
                filename: filename.clone(),
                source,
            })?;

        if bytes.len() as u64 > self.max_bytes {
            warn!(filename = %filename, max_bytes = self.max_bytes, "upload exceeds size limit");
            return Err(DomainError::TooLarge {
                filename,
                max_bytes: self.max_bytes,
            }
            .into());
        }

        ensure_text_path(&path).map_err(DomainError::from)?;
        let text = decode_text(bytes).map_err(DomainError::from)?;

        let metadata = parse_text(&text).metadata;
        let title = metadata
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| filename.clone());

        Ok(ResolvedPost {
            filename,
            title,
            text,
            description: metadata.description,
            publish_at: metadata.publish_at,
        })
    }

    async fn create(
        &self,
        user: &UserRecord,
        resolved: ResolvedPost,
    ) -> Result<IngestOutcome, IngestError> {
        info!(title = %resolved.title, filename = %resolved.filename, "post not found, adding record");

        let params = InsertPostParams {
            user_id: user.id,
            filename: resolved.filename.clone(),
            title: resolved.title.clone(),
            text: resolved.text.clone(),
            description: resolved.description.clone(),
            publish_at: resolved.publish_at.unwrap_or_else(OffsetDateTime::now_utc),
        };

        match self.posts.insert_post(params).await {
            Ok(post) => Ok(IngestOutcome::Created(post)),
            Err(RepoError::Duplicate { constraint }) => {
                debug!(
                    filename = %resolved.filename,
                    constraint = %constraint,
                    "post created concurrently, switching to update"
                );
                let existing = self
                    .posts
                    .find_post_by_filename(&resolved.filename, user.id)
                    .await
                    .map_err(|err| IngestError::store(&resolved.title, err))?;
                match Lookup::from(existing) {
                    Lookup::Present(post) => self.update(post, resolved).await,
                    Lookup::Absent => Err(IngestError::store(
                        &resolved.title,
                        RepoError::Duplicate { constraint },
                    )),
                }
            }
            Err(err) => Err(IngestError::store(&resolved.title, err)),
        }
    }

    async fn update(
        &self,
        existing: PostRecord,
        resolved: ResolvedPost,
    ) -> Result<IngestOutcome, IngestError> {
        info!(title = %resolved.title, filename = %resolved.filename, "post found, updating record");

        let params = UpdatePostParams {
            id: existing.id,
            title: resolved.title.clone(),
            text: resolved.text,
            description: resolved.description,
            publish_at: resolved.publish_at.unwrap_or(existing.publish_at),
        };

        self.posts
            .update_post(params)
            .await
            .map(IngestOutcome::Updated)
            .map_err(|err| IngestError::store(&resolved.title, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::num::NonZeroU64;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: "erock".to_string(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn settings(max_bytes: u64) -> IngestSettings {
        IngestSettings {
            max_bytes: NonZeroU64::new(max_bytes).unwrap(),
        }
    }

    fn file<'a>(name: &str, body: &'a [u8]) -> IncomingFile<&'a [u8]> {
        IncomingFile::new(name, name, body)
    }

    /// Reports a duplicate on the first insert, as if another session won the race.
    #[derive(Default)]
    struct RacingRepo {
        stored: Mutex<Option<PostRecord>>,
        inserts: Mutex<u32>,
        updates: Mutex<Vec<UpdatePostParams>>,
    }

    #[async_trait]
    impl PostsRepo for RacingRepo {
        async fn find_post_by_filename(
            &self,
            _filename: &str,
            _user_id: Uuid,
        ) -> Result<Option<PostRecord>, RepoError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn insert_post(&self, params: InsertPostParams) -> Result<PostRecord, RepoError> {
            *self.inserts.lock().unwrap() += 1;
            let now = OffsetDateTime::now_utc();
            *self.stored.lock().unwrap() = Some(PostRecord {
                id: Uuid::new_v4(),
                user_id: params.user_id,
                filename: params.filename,
                title: "winner".to_string(),
                text: String::new(),
                description: None,
                publish_at: now,
                created_at: now,
                updated_at: now,
            });
            Err(RepoError::Duplicate {
                constraint: "posts_user_id_filename_key".to_string(),
            })
        }

        async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
            self.updates.lock().unwrap().push(params.clone());
            let mut stored = self.stored.lock().unwrap().clone().ok_or(RepoError::NotFound)?;
            stored.title = params.title;
            stored.text = params.text;
            Ok(stored)
        }

        async fn posts_for_user(&self, _user_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn remove_posts(&self, _ids: &[Uuid]) -> Result<(), RepoError> {
            Ok(())
        }
    }

    struct FailingRepo;

    #[async_trait]
    impl PostsRepo for FailingRepo {
        async fn find_post_by_filename(
            &self,
            _filename: &str,
            _user_id: Uuid,
        ) -> Result<Option<PostRecord>, RepoError> {
            Ok(None)
        }

        async fn insert_post(&self, _params: InsertPostParams) -> Result<PostRecord, RepoError> {
            Err(RepoError::Timeout)
        }

        async fn update_post(&self, _params: UpdatePostParams) -> Result<PostRecord, RepoError> {
            unreachable!("not used in these tests")
        }

        async fn posts_for_user(&self, _user_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
            unreachable!("not used in these tests")
        }

        async fn remove_posts(&self, _ids: &[Uuid]) -> Result<(), RepoError> {
            unreachable!("not used in these tests")
        }
    }

    #[tokio::test]
    async fn lost_insert_race_falls_through_to_update() {
        let repo = Arc::new(RacingRepo::default());
        let service = IngestService::new(repo.clone(), &settings(1024));

        let outcome = service
            .write(&user(), file("race.txt", b"=: title Mine\nbody"))
            .await
            .expect("ingest succeeds");

        assert!(!outcome.is_created());
        assert_eq!(outcome.post().title, "Mine");
        assert_eq!(*repo.inserts.lock().unwrap(), 1);
        assert_eq!(repo.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_errors_carry_the_title() {
        let service = IngestService::new(Arc::new(FailingRepo), &settings(1024));

        let err = service
            .write(&user(), file("notes.txt", b"=: title Weekly notes\n"))
            .await
            .unwrap_err();

        match err {
            IngestError::Store { title, source } => {
                assert_eq!(title, "Weekly notes");
                assert!(matches!(source, RepoError::Timeout));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected_before_the_store() {
        let service = IngestService::new(Arc::new(FailingRepo), &settings(4));

        let err = service
            .write(&user(), file("big.txt", b"0123456789"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Validation(DomainError::TooLarge { max_bytes: 4, .. })
        ));
        assert!(err.to_string().contains("4 byte limit"));
    }

    #[tokio::test]
    async fn uploads_at_the_limit_are_accepted() {
        let repo = Arc::new(RacingRepo::default());
        let service = IngestService::new(repo, &settings(4));

        let outcome = service.write(&user(), file("tiny.txt", b"abcd")).await;
        assert!(outcome.is_ok());
    }
}
