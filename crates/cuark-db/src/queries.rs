use crate::migrations::NOW_SQL;
use crate::models::{NewUser, ProfileUpdate, USER_COLUMNS, UserRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use cuark_types::models::UserWithStats;
use rusqlite::{Connection, ToSql};

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, email, name, bio, avatar, banner_image, location, website)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.password_hash,
                    user.email,
                    user.name,
                    user.bio,
                    user.avatar,
                    user.banner_image,
                    user.location,
                    user.website,
                ],
            )?;
            query_user_by(conn, "id", &user.id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", user.id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "id", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by(conn, "email", email))
    }

    /// Apply a partial profile update. Returns `None` if the user does not exist.
    pub fn update_user(&self, id: &str, update: &ProfileUpdate) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let mut columns: Vec<&str> = Vec::new();
            let mut values: Vec<&dyn ToSql> = Vec::new();

            if let Some(name) = &update.name {
                columns.push("name");
                values.push(name);
            }
            for (column, value) in [
                ("bio", &update.bio),
                ("avatar", &update.avatar),
                ("banner_image", &update.banner_image),
                ("location", &update.location),
                ("website", &update.website),
            ] {
                if let Some(value) = value {
                    columns.push(column);
                    values.push(value);
                }
            }

            if !columns.is_empty() {
                let assignments = columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| format!("{} = ?{}", column, i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                values.push(&id);
                let sql = format!("UPDATE users SET {} WHERE id = ?{}", assignments, values.len());
                if conn.execute(&sql, values.as_slice())? == 0 {
                    return Ok(None);
                }
            }

            query_user_by(conn, "id", id)
        })
    }

    /// User plus follower, following and cuark counts, each aggregated on read.
    pub fn get_user_with_stats(&self, id: &str) -> Result<Option<UserWithStats>> {
        self.with_conn(|conn| {
            let Some(user) = query_user_by(conn, "id", id)? else {
                return Ok(None);
            };

            let followers_count = count(conn, "SELECT COUNT(*) FROM follows WHERE following_id = ?1", id)?;
            let following_count = count(conn, "SELECT COUNT(*) FROM follows WHERE follower_id = ?1", id)?;
            let cuarks_count = count(conn, "SELECT COUNT(*) FROM cuarks WHERE author_id = ?1", id)?;

            Ok(Some(UserWithStats {
                user: user.into_user(),
                followers_count,
                following_count,
                cuarks_count,
            }))
        })
    }

    // -- Sessions --

    /// Store a session keyed by the hash of its cookie token.
    /// `expires_at` must be RFC 3339 UTC with millisecond precision.
    pub fn create_session(&self, token_hash: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (token_hash, user_id, expires_at),
            )?;
            Ok(())
        })
    }

    /// Resolve an unexpired session to its user.
    pub fn get_session_user(&self, token_hash: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT u.id, u.username, u.password, u.email, u.name, u.bio, u.avatar,
                        u.banner_image, u.location, u.website, u.created_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.token_hash = ?1 AND s.expires_at > {}",
                NOW_SQL
            );
            conn.query_row(&sql, [token_hash], |row| UserRow::from_row(row, 0))
                .optional()
        })
    }

    /// Returns true if a session was removed.
    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(removed > 0)
        })
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let sql = format!("DELETE FROM sessions WHERE expires_at <= {}", NOW_SQL);
            Ok(conn.execute(&sql, [])?)
        })
    }
}

/// `column` is always a literal from this module, never caller input.
fn query_user_by(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], |row| UserRow::from_row(row, 0))
        .optional()
}

pub(crate) fn count(conn: &Connection, sql: &str, param: impl rusqlite::ToSql) -> Result<i64> {
    Ok(conn.query_row(sql, [param], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use crate::models::ProfileUpdate;
    use crate::test_support::{cuark, db, user};

    #[test]
    fn user_lookups() {
        let db = db();
        let id = user(&db, "ana");

        assert_eq!(db.get_user_by_username("ana").unwrap().unwrap().id, id);
        assert_eq!(db.get_user_by_email("ana@example.com").unwrap().unwrap().id, id);
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
        assert!(db.get_user_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn stats_are_aggregated_on_read() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let eve = user(&db, "eve");

        db.follow_user(&bob, &ana).unwrap();
        db.follow_user(&eve, &ana).unwrap();
        db.follow_user(&ana, &bob).unwrap();
        cuark(&db, &ana, "one");
        cuark(&db, &ana, "two");

        let stats = db.get_user_with_stats(&ana).unwrap().unwrap();
        assert_eq!(stats.followers_count, 2);
        assert_eq!(stats.following_count, 1);
        assert_eq!(stats.cuarks_count, 2);

        db.unfollow_user(&eve, &ana).unwrap();
        let stats = db.get_user_with_stats(&ana).unwrap().unwrap();
        assert_eq!(stats.followers_count, 1);

        assert!(db.get_user_with_stats("missing").unwrap().is_none());
    }

    #[test]
    fn update_user_is_partial() {
        let db = db();
        let id = user(&db, "ana");

        let update = ProfileUpdate {
            bio: Some(Some("hola".into())),
            location: Some(Some("Lima".into())),
            ..Default::default()
        };
        let row = db.update_user(&id, &update).unwrap().unwrap();
        assert_eq!(row.bio.as_deref(), Some("hola"));
        assert_eq!(row.name, "ANA");

        assert!(db.update_user("missing", &update).unwrap().is_none());
        assert!(db.update_user("missing", &ProfileUpdate::default()).unwrap().is_none());

        let unchanged = db.update_user(&id, &ProfileUpdate::default()).unwrap().unwrap();
        assert_eq!(unchanged.bio.as_deref(), Some("hola"));
    }

    #[test]
    fn update_user_clears_with_explicit_null() {
        let db = db();
        let id = user(&db, "ana");
        db.update_user(
            &id,
            &ProfileUpdate {
                bio: Some(Some("hola".into())),
                website: Some(Some("https://ana.example".into())),
                ..Default::default()
            },
        )
        .unwrap();

        let clear = ProfileUpdate {
            bio: Some(None),
            ..Default::default()
        };
        let row = db.update_user(&id, &clear).unwrap().unwrap();
        assert!(row.bio.is_none());
        assert_eq!(row.website.as_deref(), Some("https://ana.example"));
    }

    #[test]
    fn sessions_expire() {
        let db = db();
        let id = user(&db, "ana");

        db.create_session("live", &id, "2999-01-01T00:00:00.000Z").unwrap();
        db.create_session("stale", &id, "2000-01-01T00:00:00.000Z").unwrap();

        assert_eq!(db.get_session_user("live").unwrap().unwrap().id, id);
        assert!(db.get_session_user("stale").unwrap().is_none());

        assert_eq!(db.purge_expired_sessions().unwrap(), 1);
        assert!(db.delete_session("live").unwrap());
        assert!(!db.delete_session("live").unwrap());
        assert!(db.get_session_user("live").unwrap().is_none());
    }
}
