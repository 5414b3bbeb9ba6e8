// src/store/postgres.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{PollStore, StoreError, StoreResult, UserDirectory, VoteLedger};
use crate::models::{Poll, PollId, PollPatch, User, UserId, Vote};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL backend. Uniqueness of (user_id, poll_id) is a primary key and
/// votes cascade with their poll through the foreign key.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    user_id: UserId,
    poll_id: PollId,
    option_index: i32,
    cast_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = StoreError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        let option_index = usize::try_from(row.option_index).map_err(|_| {
            let msg = format!("negative option_index {} in votes", row.option_index);
            StoreError::Database(sqlx::Error::Decode(msg.into()))
        })?;
        Ok(Vote {
            user_id: row.user_id,
            poll_id: row.poll_id,
            option_index,
            cast_at: row.cast_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(User {
            id: row.id,
            username: row.username,
            role,
            created_at: row.created_at,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

fn index_to_db(index: usize) -> StoreResult<i32> {
    i32::try_from(index).map_err(|_| StoreError::OptionOutOfRange)
}

#[async_trait]
impl PollStore for PgStore {
    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO polls (id, question, options, closes_at, is_closed, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(poll.id)
        .bind(&poll.question)
        .bind(&poll.options)
        .bind(poll.closes_at)
        .bind(poll.is_closed)
        .bind(poll.created_by)
        .bind(poll.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn fetch_poll(&self, id: PollId) -> StoreResult<Option<Poll>> {
        let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(poll)
    }

    async fn list_polls(&self) -> StoreResult<Vec<Poll>> {
        let polls = sqlx::query_as::<_, Poll>("SELECT * FROM polls ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(polls)
    }

    async fn update_poll(&self, id: PollId, patch: PollPatch) -> StoreResult<Option<Poll>> {
        let mut tx = self.pool.begin().await?;

        let Some(mut poll) =
            sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        if let Some(options) = &patch.options {
            let highest: Option<i32> =
                sqlx::query_scalar("SELECT MAX(option_index) FROM votes WHERE poll_id = $1")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if let Some(highest) = highest.and_then(|h| usize::try_from(h).ok()) {
                if highest >= options.len() {
                    return Err(StoreError::OptionsInUse { highest });
                }
            }
        }

        patch.apply_to(&mut poll);
        sqlx::query(
            "UPDATE polls SET question = $2, options = $3, closes_at = $4, is_closed = $5
             WHERE id = $1",
        )
        .bind(poll.id)
        .bind(&poll.question)
        .bind(&poll.options)
        .bind(poll.closes_at)
        .bind(poll.is_closed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(poll))
    }

    async fn delete_poll(&self, id: PollId) -> StoreResult<bool> {
        // votes go with it via ON DELETE CASCADE, in the same statement
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VoteLedger for PgStore {
    async fn record_vote(&self, vote: &Vote) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE lets voters proceed in parallel but blocks update/delete of the poll.
        let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = $1 FOR SHARE")
            .bind(vote.poll_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::MissingPoll)?;

        if poll.is_closed_at(vote.cast_at) {
            return Err(StoreError::PollClosed);
        }
        if vote.option_index >= poll.options.len() {
            return Err(StoreError::OptionOutOfRange);
        }

        let inserted = sqlx::query(
            "INSERT INTO votes (user_id, poll_id, option_index, cast_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, poll_id) DO NOTHING",
        )
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .bind(index_to_db(vote.option_index)?)
        .bind(vote.cast_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Duplicate);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_vote(&self, user: UserId, poll: PollId) -> StoreResult<Option<Vote>> {
        let row = sqlx::query_as::<_, VoteRow>(
            "SELECT user_id, poll_id, option_index, cast_at FROM votes
             WHERE user_id = $1 AND poll_id = $2",
        )
        .bind(user)
        .bind(poll)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Vote::try_from).transpose()
    }

    async fn votes_by_user(&self, user: UserId) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(
            "SELECT user_id, poll_id, option_index, cast_at FROM votes WHERE user_id = $1",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Vote::try_from).collect()
    }

    async fn votes_for_poll(&self, poll: PollId) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(
            "SELECT user_id, poll_id, option_index, cast_at FROM votes WHERE poll_id = $1",
        )
        .bind(poll)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Vote::try_from).collect()
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, username, role, created_at) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(&user.username)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate
                } else {
                    StoreError::Database(e)
                }
            })?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }
}
