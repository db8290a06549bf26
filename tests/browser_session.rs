use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use parchment::{
    application::{
        browser::{BrowserModel, BrowserRuntime, Mode},
        repos::{InsertPostParams, PostsRepo, UsersRepo},
    },
    config::BrowserSettings,
    domain::entities::UserRecord,
    infra::memory::InMemoryRepositories,
};
use time::macros::datetime;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    task::JoinHandle,
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(5);

struct Session {
    keys: Option<DuplexStream>,
    screen: DuplexStream,
    seen: String,
    handle: JoinHandle<std::io::Result<BrowserModel>>,
}

impl Session {
    fn start(repos: &InMemoryRepositories, user: Option<UserRecord>) -> Self {
        colored::control::set_override(false);
        let (keys, input) = duplex(1024);
        let (output, screen) = duplex(64 * 1024);

        let posts: Arc<dyn PostsRepo> = Arc::new(repos.clone());
        let runtime = BrowserRuntime::new(posts, &BrowserSettings::default());
        let model = BrowserModel::new(user, NonZeroUsize::new(4).unwrap()).standalone();
        let handle = tokio::spawn(async move { runtime.run(model, input, output).await });

        Self {
            keys: Some(keys),
            screen,
            seen: String::new(),
            handle,
        }
    }

    async fn press(&mut self, keys: &str) {
        let stream = self.keys.as_mut().expect("input still open");
        stream.write_all(keys.as_bytes()).await.expect("send keys");
    }

    fn close_input(&mut self) {
        self.keys = None;
    }

    /// Read frames until `needle` shows up; returns everything read since the last call.
    async fn wait_for(&mut self, needle: &str) -> String {
        let mut buf = [0u8; 4096];
        timeout(WAIT, async {
            while !self.seen.contains(needle) {
                let read = self.screen.read(&mut buf).await.expect("read screen");
                assert!(read > 0, "screen closed before `{needle}` appeared");
                self.seen.push_str(&String::from_utf8_lossy(&buf[..read]));
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for `{needle}`; saw:\n{}", self.seen));
        std::mem::take(&mut self.seen)
    }

    async fn finish(self) -> BrowserModel {
        let Session { screen, handle, .. } = self;
        // Keep draining so the runtime never blocks on a full pipe.
        let drain = tokio::spawn(async move {
            let mut screen = screen;
            let mut sink = Vec::new();
            let _ = screen.read_to_end(&mut sink).await;
        });
        let model = timeout(WAIT, handle)
            .await
            .expect("session ends")
            .expect("runtime task")
            .expect("runtime io");
        drain.abort();
        model
    }
}

async fn seeded(count: usize) -> (InMemoryRepositories, UserRecord) {
    let repos = InMemoryRepositories::new();
    let user = repos.create_user("erock").await.expect("user");
    let base = datetime!(2022-04-20 12:00 UTC);
    for index in 0..count {
        repos
            .insert_post(InsertPostParams {
                user_id: user.id,
                filename: format!("post-{index}.txt"),
                title: format!("Post {index}"),
                text: String::new(),
                description: None,
                publish_at: base - time::Duration::days(index as i64),
            })
            .await
            .expect("seed post");
    }
    (repos, user)
}

#[tokio::test]
async fn confirming_delete_removes_the_selected_post() {
    let (repos, user) = seeded(2).await;
    let mut session = Session::start(&repos, Some(user.clone()));

    session.wait_for("Post 1").await;
    session.press("x").await;
    session.wait_for("Delete this post?").await;
    session.press("y").await;
    session.wait_for("x: delete").await;

    session.press("q").await;
    session.wait_for("Thanks for using parchment!").await;
    let model = session.finish().await;

    assert_eq!(model.mode(), Mode::Quitting);
    let remaining = repos.posts_for_user(user.id).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Post 1");
}

#[tokio::test]
async fn cancelling_delete_keeps_everything() {
    let (repos, user) = seeded(3).await;
    let mut session = Session::start(&repos, Some(user.clone()));

    session.wait_for("Post 2").await;
    session.press("xn").await;
    session.wait_for("esc: exit").await;
    session.press("\x03").await;
    let model = session.finish().await;

    assert_eq!(model.posts().len(), 3);
    assert_eq!(repos.posts_for_user(user.id).await.expect("list").len(), 3);
}

#[tokio::test]
async fn quitting_mid_delete_waits_for_the_store() {
    let (repos, user) = seeded(5).await;
    let mut session = Session::start(&repos, Some(user.clone()));

    session.wait_for("Post 3").await;
    session.press("Xyq").await;
    let model = session.finish().await;

    assert_eq!(model.mode(), Mode::Quitting);
    let remaining = repos.posts_for_user(user.id).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Post 4");
}

#[tokio::test]
async fn paging_moves_to_the_next_page() {
    let (repos, user) = seeded(5).await;
    let mut session = Session::start(&repos, Some(user));

    let first = session.wait_for("•◦").await;
    assert!(first.contains("Post 3"));
    session.press("l").await;
    let second = session.wait_for("◦•").await;
    assert!(second.contains("Post 4"));
    session.press("q").await;
    let model = session.finish().await;
    assert_eq!(model.pager().page(), 1);
}

#[tokio::test]
async fn unknown_user_sees_an_error_until_quitting() {
    let repos = InMemoryRepositories::new();
    let mut session = Session::start(&repos, None);

    session.wait_for("user not found").await;
    session.press("j").await;
    session.press("\x1b").await;
    let model = session.finish().await;

    assert!(model.error().is_some());
    assert!(model.posts().is_empty());
}

#[tokio::test]
async fn closing_input_ends_the_session() {
    let (repos, user) = seeded(1).await;
    let mut session = Session::start(&repos, Some(user));

    session.wait_for("Post 0").await;
    session.close_input();
    let model = session.finish().await;

    assert_eq!(model.mode(), Mode::Normal);
    assert_eq!(model.posts().len(), 1);
}

#[tokio::test]
async fn arrow_key_split_across_reads_moves_the_cursor() {
    let (repos, user) = seeded(3).await;
    let mut session = Session::start(&repos, Some(user));

    session.wait_for("Post 2").await;
    session.press("\x1b[").await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.press("B").await;
    session.press("q").await;
    let model = session.finish().await;

    assert_eq!(model.mode(), Mode::Quitting);
    assert_eq!(model.cursor(), 1);
}
