//! Text rendering for the post browser.

use colored::{ColoredString, Colorize};
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::domain::entities::PostRecord;

use super::{BrowserModel, DeleteTarget, Mode};

const SPINNER_FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];
const PUBLISH_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none], [year]");
const ENTRY_HEIGHT: usize = 4;
const STANDALONE_INDENT: usize = 2;

/// Visual state of a single post entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Normal,
    Selected,
    Deleting,
}

pub fn render(model: &BrowserModel) -> String {
    let body = render_body(model);
    if model.is_standalone() {
        indent(&format!("\n{body}\n"), STANDALONE_INDENT)
    } else {
        body
    }
}

fn render_body(model: &BrowserModel) -> String {
    if let Some(error) = model.error() {
        return format!("{}\n\n{}", error.to_string().red(), help_line(&["esc: exit"]));
    }

    match model.mode() {
        Mode::InitializingClient | Mode::Loading => {
            format!("{} Loading...\n\n", spinner(model.spinner_frame()))
        }
        Mode::Quitting => "Thanks for using parchment!\n".to_string(),
        Mode::Normal | Mode::ConfirmingDelete(_) | Mode::Deleting => {
            let mut out = String::from("Here are the posts linked to your account.\n\n");
            out.push_str(&posts_view(model));

            if model.pager().total_pages() > 1 {
                out.push_str(&pagination_dots(
                    model.pager().page(),
                    model.pager().total_pages(),
                ));
            }

            match model.mode() {
                Mode::ConfirmingDelete(target) => out.push_str(&prompt_view(target)),
                Mode::Deleting => out.push_str(&format!("\n\n{}", "Deleting...".dimmed())),
                _ => {
                    out.push_str("\n\n");
                    out.push_str(&help_view(model));
                }
            }
            out
        }
    }
}

pub fn spinner(frame: usize) -> ColoredString {
    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()].magenta()
}

fn posts_view(model: &BrowserModel) -> String {
    let posts = model.posts();
    if posts.is_empty() {
        return "You don't have any posts yet.".to_string();
    }

    let (start, end) = model.pager().slice_bounds(posts.len());
    let targets = match model.mode() {
        Mode::ConfirmingDelete(target) => model.delete_targets(target),
        _ => Vec::new(),
    };

    let mut out = String::new();
    for (offset, post) in posts[start..end].iter().enumerate() {
        let state = if targets.contains(&(start + offset)) {
            EntryState::Deleting
        } else if offset == model.cursor() {
            EntryState::Selected
        } else {
            EntryState::Normal
        };
        out.push_str(&render_entry(post, state));
    }

    // Keep the footer in place on short pages.
    let missing = model.pager().per_page().saturating_sub(end - start);
    out.push_str(&"\n".repeat(missing * ENTRY_HEIGHT));
    out
}

/// Render one post as a fixed-height block.
pub fn render_entry(post: &PostRecord, state: EntryState) -> String {
    let gutter = match state {
        EntryState::Normal => "  ".normal(),
        EntryState::Selected => "│ ".magenta(),
        EntryState::Deleting => "│ ".red(),
    };
    let title = match state {
        EntryState::Normal => post.title.normal(),
        EntryState::Selected => post.title.magenta().bold(),
        EntryState::Deleting => post.title.red().bold(),
    };
    let details = format!("{} · {}", post.filename, format_publish_date(post.publish_at));
    let description = post.description.as_deref().unwrap_or_default();

    format!(
        "{gutter}{title}\n{gutter}{}\n{gutter}{}\n\n",
        details.dimmed(),
        description.dimmed()
    )
}

pub fn format_publish_date(value: OffsetDateTime) -> String {
    value
        .format(PUBLISH_DATE_FORMAT)
        .unwrap_or_else(|_| value.date().to_string())
}

fn pagination_dots(page: usize, total_pages: usize) -> String {
    (0..total_pages)
        .map(|index| {
            if index == page {
                "•".normal().to_string()
            } else {
                "◦".dimmed().to_string()
            }
        })
        .collect()
}

fn help_view(model: &BrowserModel) -> String {
    let mut items = Vec::new();
    if model.posts().len() > 1 {
        items.push("j/k, ↑/↓: choose");
    }
    if model.pager().total_pages() > 1 {
        items.push("h/l, ←/→: page");
    }
    if !model.posts().is_empty() {
        items.push("x: delete");
        items.push("X: delete page");
    }
    items.push("r: reload");
    items.push("esc: exit");
    help_line(&items)
}

fn help_line(items: &[&str]) -> String {
    let separator = " • ".dimmed().to_string();
    items
        .iter()
        .map(|item| item.dimmed().to_string())
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

fn prompt_view(target: DeleteTarget) -> String {
    let prompt = match target {
        DeleteTarget::Selected => "Delete this post?",
        DeleteTarget::Page => "Delete all posts on this page?",
    };
    format!("\n\n{} {}", prompt.red().bold(), "(y/N)".red().dimmed())
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::browser::{BrowserEvent, BrowserError, Key};
    use crate::domain::entities::UserRecord;
    use std::num::NonZeroUsize;
    use time::macros::datetime;
    use uuid::Uuid;

    fn model_with(count: usize) -> BrowserModel {
        colored::control::set_override(false);
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: "erock".to_string(),
            created_at: datetime!(2022-01-01 00:00 UTC),
        };
        let posts = (0..count)
            .map(|index| PostRecord {
                id: Uuid::new_v4(),
                user_id: user.id,
                filename: format!("post-{index}.txt"),
                title: format!("Post {index}"),
                text: String::new(),
                description: (index == 0).then(|| "first one".to_string()),
                publish_at: datetime!(2022-04-20 12:00 UTC),
                created_at: datetime!(2022-04-20 12:00 UTC),
                updated_at: datetime!(2022-04-20 12:00 UTC),
            })
            .collect();
        let mut model = BrowserModel::new(Some(user), NonZeroUsize::new(4).unwrap());
        model.init();
        model.update(BrowserEvent::PostsLoaded {
            generation: 1,
            posts,
        });
        model
    }

    #[test]
    fn loading_shows_spinner() {
        colored::control::set_override(false);
        let mut model = BrowserModel::new(None, NonZeroUsize::new(4).unwrap());
        model.init();
        let view = render(&model);
        assert!(view.contains("Loading..."));
        assert!(view.contains(SPINNER_FRAMES[0]));
    }

    #[test]
    fn empty_list_has_explicit_message() {
        let model = model_with(0);
        let view = render(&model);
        assert!(view.contains("You don't have any posts yet."));
        assert!(!view.contains("x: delete"));
        assert!(!view.contains("j/k"));
    }

    #[test]
    fn single_page_hides_paging_hints() {
        let model = model_with(3);
        let view = render(&model);
        assert!(view.contains("Post 0"));
        assert!(view.contains("post-2.txt · Apr 20, 2022"));
        assert!(view.contains("first one"));
        assert!(view.contains("j/k, ↑/↓: choose"));
        assert!(!view.contains("h/l"));
        assert!(!view.contains('◦'));
    }

    #[test]
    fn multiple_pages_show_dots_and_paging_hints() {
        let model = model_with(5);
        let view = render(&model);
        assert!(view.contains("•◦"));
        assert!(view.contains("h/l, ←/→: page"));
        assert!(!view.contains("Post 4"));
    }

    #[test]
    fn confirmation_replaces_help_line() {
        let mut model = model_with(2);
        model.update(BrowserEvent::Key(Key::Char('x')));
        let view = render(&model);
        assert!(view.contains("Delete this post? (y/N)"));
        assert!(!view.contains("esc: exit"));

        model.update(BrowserEvent::Key(Key::Char('X')));
        assert!(render(&model).contains("Delete all posts on this page? (y/N)"));
    }

    #[test]
    fn errors_replace_the_list() {
        let mut model = model_with(2);
        model.update(BrowserEvent::Failed(BrowserError::Unauthenticated));
        let view = render(&model);
        assert!(view.contains("user not found"));
        assert!(!view.contains("Post 0"));
    }

    #[test]
    fn entries_have_fixed_height() {
        colored::control::set_override(false);
        let post = &model_with(1).posts()[0].clone();
        let entry = render_entry(post, EntryState::Selected);
        assert_eq!(entry.matches('\n').count(), ENTRY_HEIGHT);
        assert!(entry.starts_with("│ Post 0"));
    }

    #[test]
    fn indent_skips_blank_lines() {
        assert_eq!(indent("a\n\nb", 2), "  a\n\n  b");
    }
}
