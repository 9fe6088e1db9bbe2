// ============================
// crates/backend-lib/src/polls.rs
// ============================
//! Polls with optional auto-close.
//!
//! Every poll that was created with a duration owns a timer task. The
//! task's `JoinHandle` is stored next to the poll so that `end-poll` and
//! meeting teardown can abort it; a timer that fires after its poll is
//! gone finds nothing to close.
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use huddle_common::{ConnectionId, MeetingId, PollOption, PollView};
use metrics::counter;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::metrics::POLL_CLOSED;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Poll not found")]
    NotFound,

    #[error("This poll has ended")]
    Closed,

    #[error("You have already voted in this poll")]
    AlreadyVoted,

    #[error("Invalid poll option")]
    InvalidOption,
}

#[derive(Debug)]
struct Poll {
    id: String,
    meeting_id: MeetingId,
    question: String,
    options: Vec<PollOption>,
    created_by: ConnectionId,
    is_active: bool,
    voters: HashSet<ConnectionId>,
    ends_at: Option<DateTime<Utc>>,
}

impl Poll {
    fn view(&self) -> PollView {
        PollView {
            id: self.id.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
            created_by: self.created_by.clone(),
            is_active: self.is_active,
            total_votes: self.options.iter().map(|o| o.votes).sum(),
            ends_at: self.ends_at,
        }
    }
}

#[derive(Debug)]
struct PollEntry {
    poll: Poll,
    timer: Option<JoinHandle<()>>,
}

/// All polls of all meetings, keyed by poll ID
#[derive(Debug, Default)]
pub struct PollRegistry {
    polls: DashMap<String, PollEntry>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a poll. Inputs are expected to be validated already.
    ///
    /// With a `duration`, a timer closes the poll when it elapses and hands
    /// the final view to `on_expire`. Must be called inside a tokio runtime
    /// when a duration is given.
    pub fn create<F>(
        self: &Arc<Self>,
        meeting_id: MeetingId,
        created_by: ConnectionId,
        question: String,
        options: Vec<String>,
        duration: Option<Duration>,
        on_expire: F,
    ) -> PollView
    where
        F: FnOnce(PollView) + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let ends_at = duration
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        let poll = Poll {
            id: id.clone(),
            meeting_id,
            question,
            options: options
                .into_iter()
                .map(|text| PollOption { text, votes: 0 })
                .collect(),
            created_by,
            is_active: true,
            voters: HashSet::new(),
            ends_at,
        };
        let view = poll.view();

        let timer = duration.map(|duration| {
            let registry = Arc::downgrade(self);
            let poll_id = id.clone();
            tokio::spawn(expire_after(registry, poll_id, duration, on_expire))
        });

        self.polls.insert(id, PollEntry { poll, timer });
        view
    }

    /// Record one vote of `voter`
    pub fn vote(
        &self,
        poll_id: &str,
        meeting_id: &str,
        voter: &str,
        option_index: usize,
    ) -> Result<PollView, PollError> {
        let mut entry = self
            .polls
            .get_mut(poll_id)
            .filter(|e| e.poll.meeting_id == meeting_id)
            .ok_or(PollError::NotFound)?;
        let poll = &mut entry.poll;

        if !poll.is_active {
            return Err(PollError::Closed);
        }
        if option_index >= poll.options.len() {
            return Err(PollError::InvalidOption);
        }
        if !poll.voters.insert(voter.to_string()) {
            return Err(PollError::AlreadyVoted);
        }

        poll.options[option_index].votes += 1;
        Ok(poll.view())
    }

    /// Close a poll before its timer fires.
    ///
    /// Returns `Ok(None)` when the poll had already ended.
    pub fn end(&self, poll_id: &str, meeting_id: &str) -> Result<Option<PollView>, PollError> {
        let in_meeting = self
            .polls
            .get(poll_id)
            .is_some_and(|e| e.poll.meeting_id == meeting_id);
        if !in_meeting {
            return Err(PollError::NotFound);
        }
        Ok(self.close(poll_id, true))
    }

    pub fn get(&self, poll_id: &str) -> Option<PollView> {
        self.polls.get(poll_id).map(|e| e.poll.view())
    }

    /// Cancel every timer of a meeting and forget its polls
    pub fn teardown_meeting(&self, meeting_id: &str) -> usize {
        let before = self.polls.len();
        self.polls.retain(|_, entry| {
            if entry.poll.meeting_id != meeting_id {
                return true;
            }
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            false
        });
        before.saturating_sub(self.polls.len())
    }

    fn close(&self, poll_id: &str, abort_timer: bool) -> Option<PollView> {
        let mut entry = self.polls.get_mut(poll_id)?;
        if !entry.poll.is_active {
            return None;
        }
        entry.poll.is_active = false;

        if let Some(timer) = entry.timer.take() {
            if abort_timer {
                timer.abort();
            }
        }

        counter!(POLL_CLOSED).increment(1);
        Some(entry.poll.view())
    }
}

async fn expire_after<F>(
    registry: Weak<PollRegistry>,
    poll_id: String,
    duration: Duration,
    on_expire: F,
) where
    F: FnOnce(PollView) + Send + 'static,
{
    tokio::time::sleep(duration).await;

    let Some(registry) = registry.upgrade() else {
        return;
    };
    if let Some(view) = registry.close(&poll_id, false) {
        tracing::debug!(%poll_id, "poll closed by timer");
        on_expire(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn options() -> Vec<String> {
        vec!["Tea".to_string(), "Coffee".to_string()]
    }

    fn open_poll(
        registry: &Arc<PollRegistry>,
        duration: Option<Duration>,
    ) -> (PollView, mpsc::UnboundedReceiver<PollView>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let view = registry.create(
            "ABC1".to_string(),
            "host".to_string(),
            "Break drink?".to_string(),
            options(),
            duration,
            move |view| {
                let _ = tx.send(view);
            },
        );
        (view, rx)
    }

    #[tokio::test]
    async fn test_vote_counts_once_per_participant() {
        let registry = Arc::new(PollRegistry::new());
        let (poll, _rx) = open_poll(&registry, None);
        assert!(poll.is_active);
        assert_eq!(poll.total_votes, 0);

        let view = registry.vote(&poll.id, "ABC1", "ben", 1).unwrap();
        assert_eq!(view.options[1].votes, 1);
        assert_eq!(view.total_votes, 1);

        assert_eq!(
            registry.vote(&poll.id, "ABC1", "ben", 0),
            Err(PollError::AlreadyVoted)
        );
        assert_eq!(
            registry.vote(&poll.id, "ABC1", "cara", 7),
            Err(PollError::InvalidOption)
        );
        // polls are scoped to their meeting
        assert_eq!(
            registry.vote(&poll.id, "OTHER", "dan", 0),
            Err(PollError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_end_closes_once() {
        let registry = Arc::new(PollRegistry::new());
        let (poll, _rx) = open_poll(&registry, None);

        let ended = registry.end(&poll.id, "ABC1").unwrap().unwrap();
        assert!(!ended.is_active);
        assert_eq!(registry.end(&poll.id, "ABC1"), Ok(None));
        assert_eq!(
            registry.vote(&poll.id, "ABC1", "ben", 0),
            Err(PollError::Closed)
        );
        assert_eq!(registry.end("missing", "ABC1"), Err(PollError::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_closes_poll() {
        let registry = Arc::new(PollRegistry::new());
        let (poll, mut rx) = open_poll(&registry, Some(Duration::from_secs(30)));
        assert!(poll.ends_at.is_some());

        tokio::time::sleep(Duration::from_secs(31)).await;

        let closed = rx.recv().await.unwrap();
        assert_eq!(closed.id, poll.id);
        assert!(!closed.is_active);
        assert!(!registry.get(&poll.id).unwrap().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_cancels_timer() {
        let registry = Arc::new(PollRegistry::new());
        let (poll, mut rx) = open_poll(&registry, Some(Duration::from_secs(30)));

        registry.end(&poll.id, "ABC1").unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        // the callback was dropped with the aborted task, never called
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_timers_and_drops_polls() {
        let registry = Arc::new(PollRegistry::new());
        let (first, mut first_rx) = open_poll(&registry, Some(Duration::from_secs(10)));
        let (second, _second_rx) = open_poll(&registry, None);
        let other = registry.create(
            "XYZ9".to_string(),
            "h2".to_string(),
            "Lunch?".to_string(),
            options(),
            None,
            |_| {},
        );

        assert_eq!(registry.teardown_meeting("ABC1"), 2);
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(first_rx.recv().await, None);
        assert!(registry.get(&first.id).is_none());
        assert!(registry.get(&second.id).is_none());
        assert_eq!(registry.get(&other.id), Some(other));
    }
}
