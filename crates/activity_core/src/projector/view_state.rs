//! Observable screen state.

use crate::model::activity::ActivityRecord;

/// Coarse screen phase derived from [`ViewState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    /// Waiting for the first snapshot.
    Initializing,
    /// Showing the latest snapshot.
    Ready,
    /// The live feed reported an error; the list presents as empty.
    FeedError,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// Latest snapshot, newest first.
    pub items: Vec<ActivityRecord>,
    /// `true` until the first snapshot (or feed error) arrives.
    pub loading: bool,
    /// One-shot notice; the consumer clears it after display.
    pub message: Option<String>,
    /// Set while the live feed is broken, cleared by the next good snapshot.
    pub feed_error: Option<String>,
    /// Number of feed deliveries applied so far.
    pub revision: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::initializing()
    }
}

impl ViewState {
    pub fn initializing() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            message: None,
            feed_error: None,
            revision: 0,
        }
    }

    pub fn phase(&self) -> ViewPhase {
        if self.loading {
            ViewPhase::Initializing
        } else if self.feed_error.is_some() {
            ViewPhase::FeedError
        } else {
            ViewPhase::Ready
        }
    }

    pub fn find(&self, id: &str) -> Option<&ActivityRecord> {
        self.items.iter().find(|record| record.id == id)
    }

    pub(crate) fn apply_snapshot(&mut self, items: Vec<ActivityRecord>) {
        self.items = items;
        self.loading = false;
        self.feed_error = None;
        self.revision += 1;
    }

    pub(crate) fn apply_feed_error(&mut self, error: String) {
        self.items.clear();
        self.loading = false;
        self.feed_error = Some(error);
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewPhase, ViewState};
    use crate::model::activity::ActivityRecord;

    #[test]
    fn phases_follow_feed_deliveries() {
        let mut view = ViewState::initializing();
        assert_eq!(view.phase(), ViewPhase::Initializing);

        view.apply_snapshot(Vec::new());
        assert_eq!(view.phase(), ViewPhase::Ready);
        assert_eq!(view.revision, 1);

        view.apply_feed_error("offline".to_string());
        assert_eq!(view.phase(), ViewPhase::FeedError);
        assert!(view.items.is_empty());

        let mut record = ActivityRecord::with_created_at("walk", 10);
        record.id = "a".to_string();
        view.apply_snapshot(vec![record]);
        assert_eq!(view.phase(), ViewPhase::Ready);
        assert!(view.feed_error.is_none());
        assert_eq!(view.find("a").map(|r| r.name.as_str()), Some("walk"));
        assert_eq!(view.revision, 3);
    }

    #[test]
    fn snapshots_leave_message_untouched() {
        let mut view = ViewState::initializing();
        view.message = Some("Activity added.".to_string());
        view.apply_snapshot(Vec::new());
        assert_eq!(view.message.as_deref(), Some("Activity added."));
    }
}
