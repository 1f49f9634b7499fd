//! Text rendering of the activity screen.
//!
//! # Responsibility
//! - Turn a [`ViewState`] into the lines a terminal shows.
//! - Hold no state and make no decisions beyond layout.

use activity_core::{ActivityRecord, ViewPhase, ViewState};

pub const TITLE: &str = "Activities";
pub const LOADING_TEXT: &str = "Loading activities...";
pub const EMPTY_TEXT: &str = "No activities yet. Use `add <NAME>` to create one.";

/// Renders the whole screen.
pub fn render_view(view: &ViewState) -> String {
    let mut out = format!("{TITLE}\n{}\n", "=".repeat(TITLE.len()));

    match view.phase() {
        ViewPhase::Initializing => {
            out.push_str(LOADING_TEXT);
            out.push('\n');
        }
        ViewPhase::FeedError => {
            out.push_str(EMPTY_TEXT);
            out.push('\n');
            if let Some(error) = &view.feed_error {
                out.push_str(&format!("(live updates unavailable: {error})\n"));
            }
        }
        ViewPhase::Ready if view.items.is_empty() => {
            out.push_str(EMPTY_TEXT);
            out.push('\n');
        }
        ViewPhase::Ready => {
            for record in &view.items {
                out.push_str(&render_card(record));
                out.push('\n');
            }
        }
    }
    out
}

/// Renders one record as a single card line.
pub fn render_card(record: &ActivityRecord) -> String {
    let marker = if record.completed { "[x]" } else { "[ ]" };
    format!(
        "{marker} {}  Created: {}  id={}",
        record.name,
        record.display_created_at(),
        record.id
    )
}

#[cfg(test)]
mod tests {
    use super::{render_card, render_view, EMPTY_TEXT, LOADING_TEXT};
    use activity_core::{ActivityRecord, ViewState};

    fn record(id: &str, name: &str, completed: bool) -> ActivityRecord {
        let mut record = ActivityRecord::with_created_at(name, 1_700_000_000_000);
        record.id = id.to_string();
        record.completed = completed;
        record
    }

    #[test]
    fn loading_state_shows_only_the_spinner_text() {
        let rendered = render_view(&ViewState::initializing());
        assert!(rendered.contains(LOADING_TEXT));
        assert!(!rendered.contains(EMPTY_TEXT));
    }

    #[test]
    fn empty_ready_state_shows_empty_notice() {
        let view = ViewState {
            loading: false,
            ..ViewState::initializing()
        };
        assert!(render_view(&view).contains(EMPTY_TEXT));
    }

    #[test]
    fn feed_error_presents_as_empty_with_diagnostic() {
        let view = ViewState {
            loading: false,
            feed_error: Some("offline".to_string()),
            ..ViewState::initializing()
        };
        let rendered = render_view(&view);
        assert!(rendered.contains(EMPTY_TEXT));
        assert!(rendered.contains("offline"));
    }

    #[test]
    fn ready_state_lists_cards_in_order() {
        let view = ViewState {
            items: vec![record("b", "Second", true), record("a", "First", false)],
            loading: false,
            ..ViewState::initializing()
        };
        let rendered = render_view(&view);
        let second = rendered.find("Second").unwrap();
        let first = rendered.find("First").unwrap();
        assert!(second < first);
        assert!(rendered.contains("[x] Second"));
        assert!(rendered.contains("[ ] First"));
    }

    #[test]
    fn card_includes_formatted_date_and_id() {
        let card = render_card(&record("doc-7", "Walk", false));
        assert!(card.contains("Created: "));
        assert!(card.contains("2023"));
        assert!(card.ends_with("id=doc-7"));
    }
}
