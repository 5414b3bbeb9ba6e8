// src/engine.rs
//! Poll lifecycle: who may create, edit, close and delete polls, who may
//! vote, and when results become visible.
//!
//! A poll is open while its `is_closed` flag is false and the clock is before
//! `closes_at`. Every check reads that derived state at the time of the call;
//! the store repeats the check for votes inside its own lock or transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PollError;
use crate::identity::{Caller, Permission};
use crate::models::{
    parse_deadline, CreatePoll, Poll, PollId, PollPatch, PollResults, PollView, UpdatePoll,
    UserView, Vote,
};
use crate::store::Store;
use crate::tally::tally;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub type EngineResult<T> = Result<T, PollError>;

#[derive(Clone)]
pub struct PollEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl PollEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn current_user(&self, caller: &Caller) -> UserView {
        UserView::from(caller)
    }

    pub async fn create_poll(&self, caller: &Caller, request: CreatePoll) -> EngineResult<Poll> {
        caller.require(Permission::ManagePolls)?;

        let question = request
            .question
            .as_deref()
            .map(validate_question)
            .transpose()?;
        let options = request.options.map(validate_options).transpose()?;
        let closes_at = request
            .closing_date
            .as_deref()
            .map(validate_deadline)
            .transpose()?;
        let (Some(question), Some(options), Some(closes_at)) = (question, options, closes_at)
        else {
            return Err(PollError::invalid(
                "question, at least 2 options, and closing date required",
            ));
        };

        let poll = Poll {
            id: Uuid::new_v4(),
            question,
            options,
            closes_at,
            is_closed: false,
            created_by: caller.id,
            created_at: self.clock.now(),
        };
        self.store.insert_poll(&poll).await?;

        info!(
            poll_id = %poll.id,
            admin = %caller.id,
            options = poll.options.len(),
            closes_at = %poll.closes_at,
            "poll created"
        );
        Ok(poll)
    }

    pub async fn update_poll(
        &self,
        caller: &Caller,
        poll_id: PollId,
        request: UpdatePoll,
    ) -> EngineResult<Poll> {
        caller.require(Permission::ManagePolls)?;

        let patch = PollPatch {
            question: request
                .question
                .as_deref()
                .map(validate_question)
                .transpose()?,
            options: request.options.map(validate_options).transpose()?,
            closes_at: request
                .closing_date
                .as_deref()
                .map(validate_deadline)
                .transpose()?,
            is_closed: request.is_closed,
        };

        let poll = self
            .store
            .update_poll(poll_id, patch)
            .await
            .inspect_err(|e| warn!(%poll_id, error = %e, "poll update rejected"))?
            .ok_or(PollError::NotFound)?;

        info!(%poll_id, admin = %caller.id, is_closed = poll.is_closed, "poll updated");
        Ok(poll)
    }

    pub async fn delete_poll(&self, caller: &Caller, poll_id: PollId) -> EngineResult<()> {
        caller.require(Permission::ManagePolls)?;

        if !self.store.delete_poll(poll_id).await? {
            return Err(PollError::NotFound);
        }
        info!(%poll_id, admin = %caller.id, "poll deleted with its votes");
        Ok(())
    }

    /// Every poll, annotated with the caller's own vote only.
    pub async fn list_polls(&self, caller: &Caller) -> EngineResult<Vec<PollView>> {
        let polls = self.store.list_polls().await?;
        let choices: HashMap<PollId, usize> = self
            .store
            .votes_by_user(caller.id)
            .await?
            .into_iter()
            .map(|vote| (vote.poll_id, vote.option_index))
            .collect();

        debug!(user = %caller.id, polls = polls.len(), "listing polls");
        Ok(polls
            .into_iter()
            .map(|poll| {
                let user_choice = choices.get(&poll.id).copied();
                PollView {
                    poll,
                    has_voted: user_choice.is_some(),
                    user_choice,
                }
            })
            .collect())
    }

    pub async fn cast_vote(
        &self,
        caller: &Caller,
        poll_id: PollId,
        option_index: i64,
    ) -> EngineResult<()> {
        caller.require(Permission::Vote)?;

        let now = self.clock.now();
        let poll = self
            .store
            .fetch_poll(poll_id)
            .await?
            .ok_or(PollError::NotFound)?;
        if poll.is_closed_at(now) {
            return Err(PollError::PollClosed);
        }
        if self.store.find_vote(caller.id, poll_id).await?.is_some() {
            return Err(PollError::AlreadyVoted);
        }
        let option_index = usize::try_from(option_index)
            .ok()
            .filter(|&i| i < poll.options.len())
            .ok_or_else(|| PollError::invalid("invalid option"))?;

        // the store re-checks all of the above atomically with the insert
        let vote = Vote {
            user_id: caller.id,
            poll_id,
            option_index,
            cast_at: now,
        };
        self.store
            .record_vote(&vote)
            .await
            .inspect_err(|e| warn!(%poll_id, user = %caller.id, error = %e, "vote rejected"))?;

        info!(%poll_id, user = %caller.id, option_index, "vote recorded");
        Ok(())
    }

    pub async fn results(&self, caller: &Caller, poll_id: PollId) -> EngineResult<PollResults> {
        caller.require(Permission::ViewResults)?;

        let poll = self
            .store
            .fetch_poll(poll_id)
            .await?
            .ok_or(PollError::NotFound)?;
        if self.store.find_vote(caller.id, poll_id).await?.is_none() {
            return Err(PollError::Forbidden);
        }
        if !poll.is_closed_at(self.clock.now()) {
            return Err(PollError::PollStillOpen);
        }

        let votes = self.store.votes_for_poll(poll_id).await?;
        let tally = tally(poll.options.len(), &votes);
        debug!(%poll_id, total = tally.total, "results computed");
        Ok(PollResults {
            poll,
            counts: tally.counts,
            total: tally.total,
        })
    }
}

fn validate_question(raw: &str) -> EngineResult<String> {
    let question = raw.trim();
    if question.is_empty() {
        return Err(PollError::invalid("question must not be empty"));
    }
    Ok(question.to_string())
}

fn validate_options(raw: Vec<String>) -> EngineResult<Vec<String>> {
    if raw.len() < 2 {
        return Err(PollError::invalid("at least 2 options required"));
    }
    raw.into_iter()
        .map(|label| {
            let label = label.trim();
            if label.is_empty() {
                Err(PollError::invalid("options must not be empty"))
            } else {
                Ok(label.to_string())
            }
        })
        .collect()
}

fn validate_deadline(raw: &str) -> EngineResult<DateTime<Utc>> {
    parse_deadline(raw).ok_or_else(|| PollError::invalid("invalid date format"))
}
