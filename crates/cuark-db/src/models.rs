//! Database row types, mapped directly from SQLite rows.
//! Distinct from cuark-types API models to keep the password hash and raw
//! timestamps inside the DB layer.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use tracing::warn;

use cuark_types::models::User;

/// Column list matching [`UserRow::from_row`].
pub(crate) const USER_COLUMNS: &str =
    "id, username, password, email, name, bio, avatar, banner_image, location, website, created_at";

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub banner_image: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub created_at: String,
}

impl UserRow {
    /// Reads the eleven user columns starting at `offset`.
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            username: row.get(offset + 1)?,
            password: row.get(offset + 2)?,
            email: row.get(offset + 3)?,
            name: row.get(offset + 4)?,
            bio: row.get(offset + 5)?,
            avatar: row.get(offset + 6)?,
            banner_image: row.get(offset + 7)?,
            location: row.get(offset + 8)?,
            website: row.get(offset + 9)?,
            created_at: row.get(offset + 10)?,
        })
    }

    /// Same as [`from_row`](Self::from_row) for the nullable side of a LEFT JOIN.
    pub(crate) fn from_joined_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Option<Self>> {
        match row.get::<_, Option<String>>(offset)? {
            Some(_) => Self::from_row(row, offset).map(Some),
            None => Ok(None),
        }
    }

    pub fn into_user(self) -> User {
        User {
            created_at: parse_timestamp(&self.created_at, &self.id),
            id: self.id,
            username: self.username,
            email: self.email,
            name: self.name,
            bio: self.bio,
            avatar: self.avatar,
            banner_image: self.banner_image,
            location: self.location,
            website: self.website,
        }
    }
}

/// Insert payload for a new account. `password_hash` is already hashed.
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub banner_image: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

/// Partial profile update. The outer `None` leaves a column unchanged;
/// `Some(None)` sets a nullable column to NULL.
#[derive(Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
    pub banner_image: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub website: Option<Option<String>>,
}

pub struct CuarkRow {
    pub id: i64,
    pub content: String,
    pub author_id: String,
    pub image_url: Option<String>,
    pub reply_to_id: Option<i64>,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub actor_id: String,
    pub cuark_id: Option<i64>,
    pub read: bool,
    pub created_at: String,
}

/// Parse a stored timestamp. Accepts RFC 3339 and SQLite's naive
/// `datetime('now')` format, which is read as UTC.
pub(crate) fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}
