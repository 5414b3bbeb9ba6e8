// src/identity.rs
//! Who is calling. Credentials are checked upstream; the proxy in front of
//! this service forwards the authenticated user's id in `x-user-id`, and we
//! only resolve it to a known user and role.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use http::HeaderName;
use uuid::Uuid;

use crate::error::PollError;
use crate::models::{RegisterRequest, Role, User, UserId, UserView};
use crate::routes::AppState;
use crate::store::{StoreError, UserDirectory};

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManagePolls,
    Vote,
    ViewResults,
}

impl Role {
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ManagePolls => matches!(self, Role::Admin),
            Permission::Vote | Permission::ViewResults => true,
        }
    }
}

/// Authenticated identity handed to every engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl Caller {
    pub fn require(&self, permission: Permission) -> Result<(), PollError> {
        if self.role.allows(permission) {
            Ok(())
        } else {
            Err(PollError::Unauthorized)
        }
    }
}

impl From<User> for Caller {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

impl From<&Caller> for UserView {
    fn from(caller: &Caller) -> Self {
        UserView {
            id: caller.id,
            username: caller.username.clone(),
            role: caller.role,
        }
    }
}

/// Looks up the user behind a raw header value.
pub async fn resolve<D: UserDirectory + ?Sized>(
    directory: &D,
    raw_id: Option<&str>,
) -> Result<Caller, PollError> {
    let id = raw_id
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or(PollError::Unauthenticated)?;
    let user = directory
        .find_user(id)
        .await?
        .ok_or(PollError::Unauthenticated)?;
    Ok(user.into())
}

pub async fn register<D: UserDirectory + ?Sized>(
    directory: &D,
    request: RegisterRequest,
) -> Result<User, PollError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(PollError::invalid("username required"));
    }
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        role: request.role.unwrap_or(Role::User),
        created_at: Utc::now(),
    };
    match directory.insert_user(&user).await {
        Ok(()) => {
            tracing::info!(
                user_id = %user.id,
                username = %user.username,
                role = %user.role,
                "registered user"
            );
            Ok(user)
        }
        Err(StoreError::Duplicate) => Err(PollError::invalid("username already exists")),
        Err(e) => Err(e.into()),
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = PollError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&USER_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        resolve(state.store.as_ref(), raw).await
    }
}
