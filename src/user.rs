mod checker;
mod repository;

pub use checker::*;
pub use repository::*;

use std::fmt;

/// User as saved on database.
#[derive(Clone, Default, PartialEq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    /// Stored credential: an Argon2 PHC string or a legacy encoding.
    pub password: String,
    pub blocked: bool,
    pub created_at: chrono::NaiveDate,
    pub deleted_at: Option<chrono::NaiveDate>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("blocked", &self.blocked)
            .field("created_at", &self.created_at)
            .field("deleted_at", &self.deleted_at)
            .finish_non_exhaustive()
    }
}
