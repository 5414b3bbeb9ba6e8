// src/models.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type UserId = Uuid;
pub type PollId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// What `/api/me` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub closes_at: DateTime<Utc>,
    pub is_closed: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// Effective closure: the explicit flag or the deadline, whichever comes first.
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.is_closed || now >= self.closes_at
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_closed_at(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: UserId,
    pub poll_id: PollId,
    pub option_index: usize,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePoll {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub closing_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePoll {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub closing_date: Option<String>,
    pub is_closed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub role: Option<Role>,
}

/// Validated form of [`UpdatePoll`]. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollPatch {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub is_closed: Option<bool>,
}

impl PollPatch {
    pub fn apply_to(self, poll: &mut Poll) {
        if let Some(question) = self.question {
            poll.question = question;
        }
        if let Some(options) = self.options {
            poll.options = options;
        }
        if let Some(closes_at) = self.closes_at {
            poll.closes_at = closes_at;
        }
        if let Some(is_closed) = self.is_closed {
            poll.is_closed = is_closed;
        }
    }
}

/// A poll as seen by one caller: their own vote, nobody else's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollView {
    #[serde(flatten)]
    pub poll: Poll,
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_choice: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResults {
    pub poll: Poll,
    pub counts: Vec<u64>,
    pub total: u64,
}

/// Parses a closing deadline. Timestamps without an offset are taken as UTC.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_poll(closes_at: DateTime<Utc>, is_closed: bool) -> Poll {
        Poll {
            id: Uuid::new_v4(),
            question: "Best color?".into(),
            options: vec!["Red".into(), "Blue".into()],
            closes_at,
            is_closed,
            created_by: Uuid::new_v4(),
            created_at: closes_at - Duration::days(1),
        }
    }

    #[test]
    fn deadline_boundary_is_closed() {
        let deadline = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let poll = sample_poll(deadline, false);
        assert!(poll.is_open_at(deadline - Duration::seconds(1)));
        assert!(poll.is_closed_at(deadline));
        assert!(poll.is_closed_at(deadline + Duration::seconds(1)));
    }

    #[test]
    fn closed_flag_wins_over_future_deadline() {
        let now = Utc::now();
        let poll = sample_poll(now + Duration::days(7), true);
        assert!(poll.is_closed_at(now));
    }

    #[test]
    fn parses_rfc3339_and_naive_deadlines() {
        let expected = Utc.with_ymd_and_hms(2030, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_deadline("2030-05-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_deadline("2030-05-01T11:30:00+02:00"), Some(expected));
        assert_eq!(parse_deadline("2030-05-01T09:30:00"), Some(expected));
        assert_eq!(parse_deadline("2030-05-01T09:30"), Some(expected));
        assert_eq!(parse_deadline("2030-05-01 09:30:00"), Some(expected));
        assert_eq!(parse_deadline("next tuesday"), None);
        assert_eq!(parse_deadline(""), None);
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut poll = sample_poll(Utc::now(), false);
        let before = poll.clone();
        PollPatch {
            is_closed: Some(true),
            ..Default::default()
        }
        .apply_to(&mut poll);
        assert!(poll.is_closed);
        assert_eq!(poll.options, before.options);
        assert_eq!(poll.question, before.question);
        assert_eq!(poll.closes_at, before.closes_at);
    }

    #[test]
    fn poll_view_hides_missing_choice() {
        let view = PollView {
            poll: sample_poll(Utc::now(), false),
            has_voted: false,
            user_choice: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["has_voted"], false);
        assert!(json.get("user_choice").is_none());
        assert_eq!(json["options"][1], "Blue");
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }
}
