use std::{io, sync::Arc, time::Duration};

use metrics::counter;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc::{UnboundedSender, unbounded_channel},
};
use tracing::{Instrument, Span, debug, info, warn};

use crate::application::repos::PostsRepo;
use crate::config::BrowserSettings;

use super::{BrowserCommand, BrowserError, BrowserEvent, BrowserModel, Key, KeyDecoder, view};

const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";
const READ_BUFFER_BYTES: usize = 64;
/// How long a held-back ESC waits for the rest of its sequence.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

enum Message {
    Event(BrowserEvent),
    InputClosed,
}

/// Drives a [`BrowserModel`] against a terminal stream and the post store.
#[derive(Clone)]
pub struct BrowserRuntime {
    posts: Arc<dyn PostsRepo>,
    tick: Duration,
    span: Span,
}

impl BrowserRuntime {
    pub fn new(posts: Arc<dyn PostsRepo>, settings: &BrowserSettings) -> Self {
        Self {
            posts,
            tick: settings.tick,
            span: Span::none(),
        }
    }

    /// Attach the span that carries this session's logging context.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run the session until the model quits, asks to exit, or input ends.
    ///
    /// Events are applied one at a time; store calls and timers run as
    /// separate tasks that report back through the same queue.
    pub async fn run<R, W>(
        &self,
        model: BrowserModel,
        input: R,
        output: W,
    ) -> io::Result<BrowserModel>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let span = self.span.clone();
        self.run_inner(model, input, output).instrument(span).await
    }

    async fn run_inner<R, W>(
        &self,
        mut model: BrowserModel,
        input: R,
        mut output: W,
    ) -> io::Result<BrowserModel>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = unbounded_channel();
        let reader = tokio::spawn(read_keys(input, tx.clone()).instrument(Span::current()));

        info!(user = model.user().map(|user| user.name.as_str()), "browser session started");

        let mut quit = false;
        for command in model.init() {
            quit |= self.execute(command, &tx);
        }
        draw(&mut output, &model).await?;

        while !quit && !model.exit_requested() {
            let Some(message) = rx.recv().await else {
                break;
            };
            let event = match message {
                Message::Event(event) => event,
                Message::InputClosed => {
                    debug!("input closed, ending browser session");
                    break;
                }
            };

            for command in model.update(event) {
                quit |= self.execute(command, &tx);
            }
            draw(&mut output, &model).await?;
        }

        reader.abort();
        output.flush().await?;
        info!("browser session ended");
        Ok(model)
    }

    /// Start the work a command asks for; returns `true` for [`BrowserCommand::Quit`].
    fn execute(&self, command: BrowserCommand, tx: &UnboundedSender<Message>) -> bool {
        match command {
            BrowserCommand::LoadPosts {
                user_id,
                generation,
            } => {
                let posts = Arc::clone(&self.posts);
                let tx = tx.clone();
                tokio::spawn(
                    async move {
                        let event = match posts.posts_for_user(user_id).await {
                            Ok(posts) => BrowserEvent::PostsLoaded { generation, posts },
                            Err(err) => {
                                warn!(error = %err, "failed to load posts");
                                BrowserEvent::Failed(BrowserError::store("load", err))
                            }
                        };
                        let _ = tx.send(Message::Event(event));
                    }
                    .instrument(Span::current()),
                );
            }
            BrowserCommand::RemovePosts { ids, indices } => {
                let posts = Arc::clone(&self.posts);
                let tx = tx.clone();
                tokio::spawn(
                    async move {
                        let event = match posts.remove_posts(&ids).await {
                            Ok(()) => {
                                info!(count = ids.len(), "posts removed");
                                counter!("parchment_browser_posts_removed_total")
                                    .increment(ids.len() as u64);
                                BrowserEvent::PostsRemoved { ids, indices }
                            }
                            Err(err) => {
                                warn!(error = %err, "failed to remove posts");
                                BrowserEvent::Failed(BrowserError::store("remove", err))
                            }
                        };
                        let _ = tx.send(Message::Event(event));
                    }
                    .instrument(Span::current()),
                );
            }
            BrowserCommand::ScheduleTick => {
                let tick = self.tick;
                let tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(tick).await;
                    let _ = tx.send(Message::Event(BrowserEvent::Tick));
                });
            }
            BrowserCommand::Fail(error) => {
                warn!(error = %error, "browser refused to load posts");
                let _ = tx.send(Message::Event(BrowserEvent::Failed(error)));
            }
            BrowserCommand::Quit => return true,
        }
        false
    }
}

async fn read_keys<R>(mut input: R, tx: UnboundedSender<Message>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_BYTES];
    let mut decoder = KeyDecoder::new();
    loop {
        let result = if decoder.has_pending() {
            match tokio::time::timeout(ESCAPE_TIMEOUT, input.read(&mut buf)).await {
                Ok(result) => result,
                Err(_) => {
                    if !forward_keys(&tx, decoder.flush()) {
                        return;
                    }
                    continue;
                }
            }
        } else {
            input.read(&mut buf).await
        };

        match result {
            Ok(0) => break,
            Ok(read) => {
                if !forward_keys(&tx, decoder.feed(&buf[..read])) {
                    return;
                }
            }
            Err(err) => {
                debug!(error = %err, "terminal read failed");
                break;
            }
        }
    }
    if forward_keys(&tx, decoder.flush()) {
        let _ = tx.send(Message::InputClosed);
    }
}

fn forward_keys(tx: &UnboundedSender<Message>, keys: Vec<Key>) -> bool {
    keys.into_iter()
        .all(|key| tx.send(Message::Event(BrowserEvent::Key(key))).is_ok())
}

async fn draw<W>(output: &mut W, model: &BrowserModel) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Raw terminals do not translate `\n`, so emit explicit carriage returns.
    let frame = view::render(model).replace('\n', "\r\n");
    output.write_all(CLEAR_SCREEN).await?;
    output.write_all(frame.as_bytes()).await?;
    output.flush().await
}
