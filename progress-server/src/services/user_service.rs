//! User service - account creation, lookup and login

use progress_engine::Username;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::events::{EventBus, ProgressEvent};
use super::password::{hash_password, verify_password};
use crate::error::{Result, ServerError};
use crate::store::{UserRecord, UserStore};
use crate::views::UserView;

/// Role that must carry a section
pub const STUDENT_ROLE: &str = "Student";

/// Account creation payload. Every field is optional here so that a missing
/// field is reported as a validation error rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateUserInput {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub section: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub character: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginInput {
    pub username: Option<String>,
    pub password: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct UserService {
    users: Arc<UserStore>,
    events: Arc<EventBus>,
}

impl UserService {
    pub fn new(users: Arc<UserStore>, events: Arc<EventBus>) -> Self {
        Self { users, events }
    }

    pub fn create(&self, input: CreateUserInput) -> Result<UserView> {
        let (Some(username), Some(password), Some(role)) = (
            non_empty(input.username),
            input.password.filter(|p| !p.is_empty()),
            non_empty(input.role),
        ) else {
            return Err(ServerError::Validation(
                "Username, Password, and Role are required.".into(),
            ));
        };

        let section = non_empty(input.section);
        if role == STUDENT_ROLE && section.is_none() {
            return Err(ServerError::Validation(
                "Section is required for Students.".into(),
            ));
        }

        let record = UserRecord {
            username: Username::parse(&username)?,
            password_hash: hash_password(&password)?,
            role,
            section,
            first_name: non_empty(input.first_name),
            last_name: non_empty(input.last_name),
            character: non_empty(input.character),
        };
        self.users.insert(&record)?;

        self.events.emit(ProgressEvent::UserCreated {
            username: record.username.clone(),
            role: record.role.clone(),
        });
        Ok(UserView::from(&record))
    }

    pub fn get(&self, username: &Username) -> Result<UserView> {
        self.users
            .get(username)?
            .map(|record| UserView::from(&record))
            .ok_or_else(|| ServerError::NotFound("User not found.".into()))
    }

    /// Check credentials. Unknown users and wrong passwords fail the same way.
    pub fn login(&self, input: LoginInput) -> Result<UserView> {
        let invalid = || ServerError::Auth("Invalid username or password".into());

        let (Some(username), Some(password)) = (non_empty(input.username), input.password) else {
            return Err(ServerError::Validation(
                "Username and Password are required.".into(),
            ));
        };
        let username = Username::parse(&username)?;

        let Some(record) = self.users.get(&username)? else {
            debug!(username = %username, "Login for unknown user");
            return Err(invalid());
        };
        if !verify_password(&password, &record.password_hash)? {
            warn!(username = %username, "Login with wrong password");
            return Err(invalid());
        }

        Ok(UserView::from(&record))
    }
}
