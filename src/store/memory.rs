// src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PollStore, StoreError, StoreResult, UserDirectory, VoteLedger};
use crate::models::{Poll, PollId, PollPatch, User, UserId, Vote};

/// Process-local backend. Each poll owns its votes, so dropping a poll drops
/// them too and nothing can be voted on after it is gone.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    polls: HashMap<PollId, PollRecord>,
    next_seq: u64,
}

struct PollRecord {
    seq: u64,
    poll: Poll,
    votes: HashMap<UserId, Vote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: &Poll) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.polls.contains_key(&poll.id) {
            return Err(StoreError::Duplicate);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.polls.insert(
            poll.id,
            PollRecord {
                seq,
                poll: poll.clone(),
                votes: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn fetch_poll(&self, id: PollId) -> StoreResult<Option<Poll>> {
        let state = self.state.read().await;
        Ok(state.polls.get(&id).map(|record| record.poll.clone()))
    }

    async fn list_polls(&self) -> StoreResult<Vec<Poll>> {
        let state = self.state.read().await;
        let mut records: Vec<&PollRecord> = state.polls.values().collect();
        records.sort_by_key(|record| record.seq);
        Ok(records.into_iter().map(|record| record.poll.clone()).collect())
    }

    async fn update_poll(&self, id: PollId, patch: PollPatch) -> StoreResult<Option<Poll>> {
        let mut state = self.state.write().await;
        let Some(record) = state.polls.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(options) = &patch.options {
            let highest = record.votes.values().map(|v| v.option_index).max();
            if let Some(highest) = highest.filter(|&h| h >= options.len()) {
                return Err(StoreError::OptionsInUse { highest });
            }
        }
        patch.apply_to(&mut record.poll);
        Ok(Some(record.poll.clone()))
    }

    async fn delete_poll(&self, id: PollId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.polls.remove(&id).is_some())
    }
}

#[async_trait]
impl VoteLedger for MemoryStore {
    async fn record_vote(&self, vote: &Vote) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .polls
            .get_mut(&vote.poll_id)
            .ok_or(StoreError::MissingPoll)?;
        if record.poll.is_closed_at(vote.cast_at) {
            return Err(StoreError::PollClosed);
        }
        if record.votes.contains_key(&vote.user_id) {
            return Err(StoreError::Duplicate);
        }
        if vote.option_index >= record.poll.options.len() {
            return Err(StoreError::OptionOutOfRange);
        }
        record.votes.insert(vote.user_id, vote.clone());
        Ok(())
    }

    async fn find_vote(&self, user: UserId, poll: PollId) -> StoreResult<Option<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .polls
            .get(&poll)
            .and_then(|record| record.votes.get(&user))
            .cloned())
    }

    async fn votes_by_user(&self, user: UserId) -> StoreResult<Vec<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .polls
            .values()
            .filter_map(|record| record.votes.get(&user))
            .cloned()
            .collect())
    }

    async fn votes_for_poll(&self, poll: PollId) -> StoreResult<Vec<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .polls
            .get(&poll)
            .map(|record| record.votes.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let taken = state
            .users
            .values()
            .any(|existing| existing.id == user.id || existing.username == user.username);
        if taken {
            return Err(StoreError::Duplicate);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn poll(options: &[&str]) -> Poll {
        let now = Utc::now();
        Poll {
            id: Uuid::new_v4(),
            question: "Lunch?".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            closes_at: now + Duration::hours(1),
            is_closed: false,
            created_by: Uuid::new_v4(),
            created_at: now,
        }
    }

    fn vote(poll: &Poll, user: UserId, option_index: usize) -> Vote {
        Vote {
            user_id: user,
            poll_id: poll.id,
            option_index,
            cast_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn lists_in_insertion_order() {
        let store = MemoryStore::new();
        let polls: Vec<Poll> = (0..5).map(|_| poll(&["a", "b"])).collect();
        for p in &polls {
            store.insert_poll(p).await.unwrap();
        }
        let listed: Vec<PollId> = store.list_polls().await.unwrap().iter().map(|p| p.id).collect();
        let expected: Vec<PollId> = polls.iter().map(|p| p.id).collect();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn second_vote_from_same_user_is_duplicate() {
        let store = MemoryStore::new();
        let p = poll(&["a", "b"]);
        store.insert_poll(&p).await.unwrap();
        let user = Uuid::new_v4();
        store.record_vote(&vote(&p, user, 0)).await.unwrap();
        let err = store.record_vote(&vote(&p, user, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        let stored = store.find_vote(user, p.id).await.unwrap().unwrap();
        assert_eq!(stored.option_index, 0);
    }

    #[tokio::test]
    async fn vote_on_missing_or_closed_poll_is_rejected() {
        let store = MemoryStore::new();
        let p = poll(&["a", "b"]);
        let err = store.record_vote(&vote(&p, Uuid::new_v4(), 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingPoll));

        let mut closed = poll(&["a", "b"]);
        closed.is_closed = true;
        store.insert_poll(&closed).await.unwrap();
        let err = store
            .record_vote(&vote(&closed, Uuid::new_v4(), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PollClosed));
    }

    #[tokio::test]
    async fn delete_drops_votes() {
        let store = MemoryStore::new();
        let p = poll(&["a", "b"]);
        let user = Uuid::new_v4();
        store.insert_poll(&p).await.unwrap();
        store.record_vote(&vote(&p, user, 1)).await.unwrap();

        assert!(store.delete_poll(p.id).await.unwrap());
        assert!(!store.delete_poll(p.id).await.unwrap());
        assert!(store.votes_for_poll(p.id).await.unwrap().is_empty());
        assert!(store.votes_by_user(user).await.unwrap().is_empty());
        let err = store.record_vote(&vote(&p, user, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingPoll));
    }

    #[tokio::test]
    async fn shrinking_options_under_existing_votes_fails() {
        let store = MemoryStore::new();
        let p = poll(&["a", "b", "c"]);
        store.insert_poll(&p).await.unwrap();
        store.record_vote(&vote(&p, Uuid::new_v4(), 2)).await.unwrap();

        let shrink = PollPatch {
            options: Some(vec!["a".into(), "b".into()]),
            ..Default::default()
        };
        let err = store.update_poll(p.id, shrink).await.unwrap_err();
        assert!(matches!(err, StoreError::OptionsInUse { highest: 2 }));

        let relabel = PollPatch {
            options: Some(vec!["x".into(), "y".into(), "z".into()]),
            ..Default::default()
        };
        let updated = store.update_poll(p.id, relabel).await.unwrap().unwrap();
        assert_eq!(updated.options, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        let user = User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            role: crate::models::Role::User,
            created_at: Utc::now(),
        };
        store.insert_user(&user).await.unwrap();
        let clash = User {
            id: Uuid::new_v4(),
            ..user.clone()
        };
        assert!(matches!(
            store.insert_user(&clash).await.unwrap_err(),
            StoreError::Duplicate
        ));
        assert_eq!(store.find_user(user.id).await.unwrap(), Some(user));
    }
}
