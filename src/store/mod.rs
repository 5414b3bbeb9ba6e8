// src/store/mod.rs
//! Durable state behind the poll engine.
//!
//! Polls, votes and users are kept behind three traits so the engine never
//! touches SQL. Backends must make `record_vote`, `update_poll` and
//! `delete_poll` atomic per poll: a vote is either recorded against a live,
//! open poll with no earlier vote from the same user, or not at all.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::models::{Poll, PollId, PollPatch, User, UserId, Vote};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness violation: (user, poll) for votes, username for users.
    #[error("record already exists")]
    Duplicate,

    #[error("poll does not exist")]
    MissingPoll,

    #[error("poll is closed")]
    PollClosed,

    #[error("option index out of range")]
    OptionOutOfRange,

    #[error("option {highest} is referenced by an existing vote")]
    OptionsInUse { highest: usize },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()>;

    async fn fetch_poll(&self, id: PollId) -> StoreResult<Option<Poll>>;

    /// All polls, oldest first.
    async fn list_polls(&self) -> StoreResult<Vec<Poll>>;

    /// Merges `patch` into the stored poll. Returns `None` when the poll is gone.
    /// Fails with `OptionsInUse` if new options would orphan an existing vote.
    async fn update_poll(&self, id: PollId, patch: PollPatch) -> StoreResult<Option<Poll>>;

    /// Removes the poll together with its votes. Returns `false` when it did not exist.
    async fn delete_poll(&self, id: PollId) -> StoreResult<bool>;
}

#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Inserts the vote, re-checking the poll under the same lock or transaction.
    async fn record_vote(&self, vote: &Vote) -> StoreResult<()>;

    async fn find_vote(&self, user: UserId, poll: PollId) -> StoreResult<Option<Vote>>;

    async fn votes_by_user(&self, user: UserId) -> StoreResult<Vec<Vote>>;

    async fn votes_for_poll(&self, poll: PollId) -> StoreResult<Vec<Vote>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
}

pub trait Store: PollStore + VoteLedger + UserDirectory {}

impl<T: PollStore + VoteLedger + UserDirectory> Store for T {}
