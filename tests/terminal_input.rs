#![cfg(unix)]

use std::{
    io::Write,
    num::NonZeroUsize,
    os::unix::net::UnixStream,
    sync::Arc,
    time::{Duration, Instant},
};

use parchment::{
    application::{
        browser::{BrowserModel, BrowserRuntime, Mode},
        repos::{PostsRepo, UsersRepo},
    },
    config::BrowserSettings,
    infra::{memory::InMemoryRepositories, terminal},
};

const PROMPT: Duration = Duration::from_secs(2);

#[test]
fn browse_shuts_down_promptly_while_the_terminal_stays_open() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let (mut keyboard, tty) = UnixStream::pair().expect("socket pair");

    let started = Instant::now();
    let (model, keyboard) = runtime.block_on(async move {
        let repos = InMemoryRepositories::new();
        let user = repos.create_user("erock").await.expect("user");
        let posts: Arc<dyn PostsRepo> = Arc::new(repos);
        let browser = BrowserRuntime::new(posts, &BrowserSettings::default());
        let model = BrowserModel::new(Some(user), NonZeroUsize::new(4).unwrap()).standalone();

        let input = terminal::spawn_input_reader(tty).expect("input reader");
        keyboard.write_all(b"q").expect("press q");
        let model = tokio::time::timeout(PROMPT, browser.run(model, input, tokio::io::sink()))
            .await
            .expect("browser returns after quit")
            .expect("runtime io");
        (model, keyboard)
    });
    drop(runtime);

    assert!(
        started.elapsed() < PROMPT,
        "shutdown took {:?}",
        started.elapsed()
    );
    assert_eq!(model.mode(), Mode::Quitting);
    // Still open: the reader thread is parked in a blocking read.
    drop(keyboard);
}
