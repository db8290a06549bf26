use std::num::NonZeroUsize;

use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{PostRecord, UserRecord};

use super::{BrowserCommand, BrowserError, BrowserEvent, Key, Pager};

/// Which posts a pending deletion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Selected,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    InitializingClient,
    Loading,
    Normal,
    ConfirmingDelete(DeleteTarget),
    Deleting,
    Quitting,
}

/// State of one interactive browsing session.
///
/// Every mutation goes through [`BrowserModel::update`]; store access is
/// requested through the returned [`BrowserCommand`]s and reported back as
/// [`BrowserEvent`]s.
#[derive(Debug, Clone)]
pub struct BrowserModel {
    user: Option<UserRecord>,
    posts: Vec<PostRecord>,
    pager: Pager,
    cursor: usize,
    mode: Mode,
    error: Option<BrowserError>,
    standalone: bool,
    exit_requested: bool,
    spinner_frame: usize,
    generation: u64,
    load_in_flight: bool,
    delete_in_flight: bool,
    tick_scheduled: bool,
}

impl BrowserModel {
    pub fn new(user: Option<UserRecord>, page_size: NonZeroUsize) -> Self {
        Self {
            user,
            posts: Vec::new(),
            pager: Pager::new(page_size),
            cursor: 0,
            mode: Mode::InitializingClient,
            error: None,
            standalone: false,
            exit_requested: false,
            spinner_frame: 0,
            generation: 0,
            load_in_flight: false,
            delete_in_flight: false,
            tick_scheduled: false,
        }
    }

    /// Run as the whole program: quitting terminates the session.
    pub fn standalone(mut self) -> Self {
        self.standalone = true;
        self
    }

    pub fn posts(&self) -> &[PostRecord] {
        &self.posts
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Cursor position relative to the current page.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn error(&self) -> Option<&BrowserError> {
        self.error.as_ref()
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn spinner_frame(&self) -> usize {
        self.spinner_frame
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// Cursor position relative to the whole list.
    pub fn selected_index(&self) -> usize {
        self.pager.page() * self.pager.per_page() + self.cursor
    }

    pub fn selected_post(&self) -> Option<&PostRecord> {
        self.posts.get(self.selected_index())
    }

    /// Indices of the posts a deletion of `target` would remove.
    pub fn delete_targets(&self, target: DeleteTarget) -> Vec<usize> {
        match target {
            DeleteTarget::Selected => {
                let index = self.selected_index();
                if index < self.posts.len() {
                    vec![index]
                } else {
                    Vec::new()
                }
            }
            DeleteTarget::Page => {
                let (start, end) = self.pager.slice_bounds(self.posts.len());
                (start..end).collect()
            }
        }
    }

    /// Enter the loading state and request the first snapshot.
    pub fn init(&mut self) -> Vec<BrowserCommand> {
        self.mode = Mode::Loading;
        let mut commands = self.schedule_tick();
        commands.extend(self.start_load());
        commands
    }

    pub fn update(&mut self, event: BrowserEvent) -> Vec<BrowserCommand> {
        match event {
            BrowserEvent::Key(key) => self.handle_key(key),
            BrowserEvent::PostsLoaded { generation, posts } => {
                self.handle_posts_loaded(generation, posts)
            }
            BrowserEvent::PostsRemoved { ids, indices } => self.handle_posts_removed(&ids, &indices),
            BrowserEvent::Tick => self.handle_tick(),
            BrowserEvent::Failed(error) => self.handle_failure(error),
        }
    }

    fn start_load(&mut self) -> Vec<BrowserCommand> {
        let Some(user) = self.user.as_ref() else {
            return vec![BrowserCommand::Fail(BrowserError::Unauthenticated)];
        };

        self.generation += 1;
        self.load_in_flight = true;
        vec![BrowserCommand::LoadPosts {
            user_id: user.id,
            generation: self.generation,
        }]
    }

    fn handle_key(&mut self, key: Key) -> Vec<BrowserCommand> {
        if key.is_quit() {
            return self.quit();
        }
        if self.error.is_some() {
            return Vec::new();
        }

        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::ConfirmingDelete(target) => self.handle_confirm_key(target, key),
            Mode::InitializingClient | Mode::Loading | Mode::Deleting | Mode::Quitting => {
                Vec::new()
            }
        }
    }

    fn quit(&mut self) -> Vec<BrowserCommand> {
        if !self.standalone {
            self.exit_requested = true;
            return Vec::new();
        }

        self.mode = Mode::Quitting;
        if self.delete_in_flight {
            // The removal completion finishes the quit.
            Vec::new()
        } else {
            vec![BrowserCommand::Quit]
        }
    }

    fn handle_normal_key(&mut self, key: Key) -> Vec<BrowserCommand> {
        if key.is_up() {
            self.move_up();
        } else if key.is_down() {
            self.move_down();
        } else if key.is_left() {
            if self.pager.prev_page() {
                self.clamp_cursor();
            }
        } else if key.is_right() {
            if self.pager.next_page() {
                self.clamp_cursor();
            }
        } else {
            match key {
                Key::Char('x') => self.request_delete(DeleteTarget::Selected),
                Key::Char('X') => self.request_delete(DeleteTarget::Page),
                Key::Char('r') => return self.reload(),
                _ => {}
            }
        }
        Vec::new()
    }

    fn handle_confirm_key(&mut self, target: DeleteTarget, key: Key) -> Vec<BrowserCommand> {
        match key {
            Key::Char('y') => self.confirm_delete(target),
            Key::Char('x') => {
                self.mode = Mode::ConfirmingDelete(DeleteTarget::Selected);
                Vec::new()
            }
            Key::Char('X') => {
                self.mode = Mode::ConfirmingDelete(DeleteTarget::Page);
                Vec::new()
            }
            _ => {
                self.mode = Mode::Normal;
                Vec::new()
            }
        }
    }

    fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        } else if self.pager.prev_page() {
            self.cursor = self.items_on_page().saturating_sub(1);
        }
    }

    fn move_down(&mut self) {
        if self.cursor + 1 < self.items_on_page() {
            self.cursor += 1;
        } else if self.pager.next_page() {
            self.cursor = 0;
        }
    }

    fn items_on_page(&self) -> usize {
        self.pager.items_on_page(self.posts.len())
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.items_on_page().saturating_sub(1));
    }

    fn request_delete(&mut self, target: DeleteTarget) {
        if !self.posts.is_empty() {
            self.mode = Mode::ConfirmingDelete(target);
        }
    }

    fn confirm_delete(&mut self, target: DeleteTarget) -> Vec<BrowserCommand> {
        let indices = self.delete_targets(target);
        if indices.is_empty() {
            self.mode = Mode::Normal;
            return Vec::new();
        }

        let ids = indices.iter().map(|&index| self.posts[index].id).collect();
        self.mode = Mode::Deleting;
        self.delete_in_flight = true;
        vec![BrowserCommand::RemovePosts { ids, indices }]
    }

    fn reload(&mut self) -> Vec<BrowserCommand> {
        if self.load_in_flight {
            debug!(generation = self.generation, "load already in flight, reload suppressed");
            return Vec::new();
        }

        let mut commands = self.start_load();
        if self.load_in_flight {
            self.mode = Mode::Loading;
            commands.extend(self.schedule_tick());
        }
        commands
    }

    /// Keeps at most one tick outstanding.
    fn schedule_tick(&mut self) -> Vec<BrowserCommand> {
        if self.tick_scheduled {
            return Vec::new();
        }
        self.tick_scheduled = true;
        vec![BrowserCommand::ScheduleTick]
    }

    fn handle_posts_loaded(
        &mut self,
        generation: u64,
        posts: Vec<PostRecord>,
    ) -> Vec<BrowserCommand> {
        if generation != self.generation {
            debug!(
                generation,
                latest = self.generation,
                "discarding stale post snapshot"
            );
            return Vec::new();
        }

        self.load_in_flight = false;
        self.posts = posts;
        self.pager.set_total_pages(self.posts.len());
        self.pager.reset();
        self.cursor = 0;
        if matches!(self.mode, Mode::InitializingClient | Mode::Loading) {
            self.mode = Mode::Normal;
        }
        Vec::new()
    }

    fn handle_posts_removed(&mut self, ids: &[Uuid], indices: &[usize]) -> Vec<BrowserCommand> {
        self.delete_in_flight = false;
        if self.mode == Mode::Quitting {
            return vec![BrowserCommand::Quit];
        }

        let mut positions: Vec<usize> = ids
            .iter()
            .zip(indices.iter().copied().map(Some).chain(std::iter::repeat(None)))
            .filter_map(|(id, hint)| {
                hint.filter(|&index| self.posts.get(index).is_some_and(|post| post.id == *id))
                    .or_else(|| self.posts.iter().position(|post| post.id == *id))
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();
        for position in positions.into_iter().rev() {
            self.posts.remove(position);
        }

        self.pager.set_total_pages(self.posts.len());
        self.pager.clamp_page();
        self.clamp_cursor();
        self.mode = Mode::Normal;
        Vec::new()
    }

    fn handle_tick(&mut self) -> Vec<BrowserCommand> {
        self.tick_scheduled = false;
        if self.error.is_none() && matches!(self.mode, Mode::InitializingClient | Mode::Loading) {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            return self.schedule_tick();
        }
        Vec::new()
    }

    fn handle_failure(&mut self, error: BrowserError) -> Vec<BrowserCommand> {
        self.load_in_flight = false;
        let was_deleting = std::mem::take(&mut self.delete_in_flight);
        self.error = Some(error);

        match self.mode {
            Mode::Quitting if was_deleting => vec![BrowserCommand::Quit],
            Mode::Deleting => {
                self.mode = Mode::Normal;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}
