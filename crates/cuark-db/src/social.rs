use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use cuark_types::models::{NotificationKind, NotificationWithActor, User};

use crate::models::{NotificationRow, UserRow, parse_timestamp};
use crate::{Database, OptionalExt};

/// Result of inserting a like, repost or follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The pair already existed; nothing was written.
    Duplicate,
    /// The target cuark or user does not exist.
    TargetMissing,
    /// A user tried to follow themselves.
    SelfTarget,
}

#[derive(Clone, Copy)]
enum Engagement {
    Like,
    Repost,
}

impl Engagement {
    fn table(self) -> &'static str {
        match self {
            Self::Like => "likes",
            Self::Repost => "reposts",
        }
    }

    fn notification(self) -> NotificationKind {
        match self {
            Self::Like => NotificationKind::Like,
            Self::Repost => NotificationKind::Repost,
        }
    }
}

impl Database {
    // -- Likes / reposts --

    pub fn like_cuark(&self, user_id: &str, cuark_id: i64) -> Result<InsertOutcome> {
        self.engage(Engagement::Like, user_id, cuark_id)
    }

    pub fn unlike_cuark(&self, user_id: &str, cuark_id: i64) -> Result<()> {
        self.disengage(Engagement::Like, user_id, cuark_id)
    }

    pub fn repost_cuark(&self, user_id: &str, cuark_id: i64) -> Result<InsertOutcome> {
        self.engage(Engagement::Repost, user_id, cuark_id)
    }

    pub fn unrepost_cuark(&self, user_id: &str, cuark_id: i64) -> Result<()> {
        self.disengage(Engagement::Repost, user_id, cuark_id)
    }

    /// Insert the join row and, when the cuark belongs to someone else, one
    /// notification for its author. Both writes share a transaction.
    fn engage(&self, kind: Engagement, user_id: &str, cuark_id: i64) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let author_id: Option<String> = tx
                .query_row("SELECT author_id FROM cuarks WHERE id = ?1", [cuark_id], |row| row.get(0))
                .optional()?;
            let Some(author_id) = author_id else {
                return Ok(InsertOutcome::TargetMissing);
            };

            let sql = format!(
                "INSERT OR IGNORE INTO {} (user_id, cuark_id) VALUES (?1, ?2)",
                kind.table()
            );
            if tx.execute(&sql, rusqlite::params![user_id, cuark_id])? == 0 {
                return Ok(InsertOutcome::Duplicate);
            }

            if author_id != user_id {
                insert_notification(&tx, &author_id, kind.notification(), user_id, Some(cuark_id))?;
            }

            tx.commit()?;
            Ok(InsertOutcome::Inserted)
        })
    }

    fn disengage(&self, kind: Engagement, user_id: &str, cuark_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let sql = format!("DELETE FROM {} WHERE user_id = ?1 AND cuark_id = ?2", kind.table());
            conn.execute(&sql, rusqlite::params![user_id, cuark_id])?;
            Ok(())
        })
    }

    // -- Follows --

    pub fn follow_user(&self, follower_id: &str, following_id: &str) -> Result<InsertOutcome> {
        if follower_id == following_id {
            return Ok(InsertOutcome::SelfTarget);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM users WHERE id = ?1", [following_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(InsertOutcome::TargetMissing);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO follows (follower_id, following_id) VALUES (?1, ?2)",
                (follower_id, following_id),
            )?;
            if inserted == 0 {
                return Ok(InsertOutcome::Duplicate);
            }

            insert_notification(&tx, following_id, NotificationKind::Follow, follower_id, None)?;

            tx.commit()?;
            Ok(InsertOutcome::Inserted)
        })
    }

    pub fn unfollow_user(&self, follower_id: &str, following_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                (follower_id, following_id),
            )?;
            Ok(())
        })
    }

    pub fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    (follower_id, following_id),
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    /// Users following `user_id`, most recent follow first.
    pub fn get_followers(&self, user_id: &str) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                "SELECT u.id, u.username, u.password, u.email, u.name, u.bio, u.avatar,
                        u.banner_image, u.location, u.website, u.created_at
                 FROM follows f
                 JOIN users u ON f.follower_id = u.id
                 WHERE f.following_id = ?1
                 ORDER BY f.created_at DESC, f.id DESC",
                user_id,
            )
        })
    }

    /// Users `user_id` follows, most recent follow first.
    pub fn get_following(&self, user_id: &str) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                "SELECT u.id, u.username, u.password, u.email, u.name, u.bio, u.avatar,
                        u.banner_image, u.location, u.website, u.created_at
                 FROM follows f
                 JOIN users u ON f.following_id = u.id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC, f.id DESC",
                user_id,
            )
        })
    }

    // -- Notifications --

    pub fn create_notification(
        &self,
        user_id: &str,
        kind: NotificationKind,
        actor_id: &str,
        cuark_id: Option<i64>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| insert_notification(conn, user_id, kind, actor_id, cuark_id))
    }

    /// Notifications for `user_id`, newest first, each with its actor.
    pub fn get_notifications(&self, user_id: &str, limit: u32) -> Result<Vec<NotificationWithActor>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.user_id, n.type, n.actor_id, n.cuark_id, n.read, n.created_at,
                        u.id, u.username, u.password, u.email, u.name, u.bio, u.avatar,
                        u.banner_image, u.location, u.website, u.created_at
                 FROM notifications n
                 LEFT JOIN users u ON n.actor_id = u.id
                 WHERE n.user_id = ?1
                 ORDER BY n.created_at DESC, n.id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok((
                        NotificationRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            kind: row.get(2)?,
                            actor_id: row.get(3)?,
                            cuark_id: row.get(4)?,
                            read: row.get(5)?,
                            created_at: row.get(6)?,
                        },
                        UserRow::from_joined_row(row, 7)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let notifications = rows
                .into_iter()
                .filter_map(|(n, actor)| {
                    let kind = match n.kind.parse::<NotificationKind>() {
                        Ok(kind) => kind,
                        Err(e) => {
                            warn!("Skipping notification {}: {}", n.id, e);
                            return None;
                        }
                    };
                    Some(NotificationWithActor {
                        created_at: parse_timestamp(&n.created_at, &n.id.to_string()),
                        id: n.id,
                        user_id: n.user_id,
                        kind,
                        actor_id: n.actor_id,
                        cuark_id: n.cuark_id,
                        read: n.read,
                        actor: actor.map(UserRow::into_user),
                    })
                })
                .collect();

            Ok(notifications)
        })
    }

    /// Mark one of `user_id`'s notifications read. Returns false if no such
    /// notification belongs to them.
    pub fn mark_notification_as_read(&self, id: i64, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn mark_all_notifications_as_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?)
        })
    }
}

fn insert_notification(
    conn: &Connection,
    user_id: &str,
    kind: NotificationKind,
    actor_id: &str,
    cuark_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (user_id, type, actor_id, cuark_id) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, kind.as_str(), actor_id, cuark_id],
    )?;
    Ok(())
}

fn query_users(conn: &Connection, sql: &str, param: &str) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map([param], |row| UserRow::from_row(row, 0))?
        .map(|row| row.map(UserRow::into_user))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::InsertOutcome;
    use crate::cuarks::DEFAULT_LIMIT;
    use crate::test_support::{cuark, db, user};
    use cuark_types::models::NotificationKind;

    #[test]
    fn duplicate_like_is_suppressed() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let id = cuark(&db, &ana, "like me");

        assert_eq!(db.like_cuark(&bob, id).unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.like_cuark(&bob, id).unwrap(), InsertOutcome::Duplicate);

        assert_eq!(db.get_cuark(id).unwrap().unwrap().likes_count, 1);
        assert_eq!(db.get_notifications(&ana, DEFAULT_LIMIT).unwrap().len(), 1);
    }

    #[test]
    fn like_missing_cuark() {
        let db = db();
        let ana = user(&db, "ana");
        assert_eq!(db.like_cuark(&ana, 42).unwrap(), InsertOutcome::TargetMissing);
        assert_eq!(db.repost_cuark(&ana, 42).unwrap(), InsertOutcome::TargetMissing);
    }

    #[test]
    fn liking_own_cuark_does_not_notify() {
        let db = db();
        let ana = user(&db, "ana");
        let id = cuark(&db, &ana, "self love");

        assert_eq!(db.like_cuark(&ana, id).unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.repost_cuark(&ana, id).unwrap(), InsertOutcome::Inserted);
        assert!(db.get_notifications(&ana, DEFAULT_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn like_notifies_author_once_unread() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let id = cuark(&db, &ana, "notify me");

        db.like_cuark(&bob, id).unwrap();

        let notes = db.get_notifications(&ana, DEFAULT_LIMIT).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Like);
        assert_eq!(notes[0].actor_id, bob);
        assert_eq!(notes[0].cuark_id, Some(id));
        assert!(!notes[0].read);
        assert_eq!(notes[0].actor.as_ref().unwrap().username, "bob");
        assert!(db.get_notifications(&bob, DEFAULT_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn unlike_and_unrepost() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let id = cuark(&db, &ana, "fickle");

        db.like_cuark(&bob, id).unwrap();
        db.repost_cuark(&bob, id).unwrap();
        db.unlike_cuark(&bob, id).unwrap();
        db.unrepost_cuark(&bob, id).unwrap();
        // Removing something absent is fine
        db.unlike_cuark(&bob, id).unwrap();

        let view = db.get_cuark(id).unwrap().unwrap();
        assert_eq!(view.likes_count, 0);
        assert_eq!(view.reposts_count, 0);

        // Re-liking is a fresh insert
        assert_eq!(db.like_cuark(&bob, id).unwrap(), InsertOutcome::Inserted);
    }

    #[test]
    fn follow_lifecycle() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");

        assert_eq!(db.follow_user(&ana, &ana).unwrap(), InsertOutcome::SelfTarget);
        assert_eq!(db.follow_user(&ana, "ghost").unwrap(), InsertOutcome::TargetMissing);
        assert_eq!(db.follow_user(&ana, &bob).unwrap(), InsertOutcome::Inserted);
        assert_eq!(db.follow_user(&ana, &bob).unwrap(), InsertOutcome::Duplicate);

        assert!(db.is_following(&ana, &bob).unwrap());
        assert!(!db.is_following(&bob, &ana).unwrap());

        let followers = db.get_followers(&bob).unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "ana");
        assert_eq!(db.get_following(&ana).unwrap()[0].username, "bob");

        let notes = db.get_notifications(&bob, DEFAULT_LIMIT).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Follow);
        assert_eq!(notes[0].cuark_id, None);

        db.unfollow_user(&ana, &bob).unwrap();
        assert!(!db.is_following(&ana, &bob).unwrap());
        assert!(db.get_followers(&bob).unwrap().is_empty());
    }

    #[test]
    fn mark_read_is_scoped_to_recipient() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        db.create_notification(&ana, NotificationKind::Follow, &bob, None).unwrap();
        db.create_notification(&ana, NotificationKind::Follow, &bob, None).unwrap();

        let notes = db.get_notifications(&ana, DEFAULT_LIMIT).unwrap();
        let first = notes[0].id;

        assert!(!db.mark_notification_as_read(first, &bob).unwrap());
        assert!(db.mark_notification_as_read(first, &ana).unwrap());

        let notes = db.get_notifications(&ana, DEFAULT_LIMIT).unwrap();
        assert_eq!(notes.iter().filter(|n| n.read).count(), 1);

        assert_eq!(db.mark_all_notifications_as_read(&ana).unwrap(), 1);
        assert!(db.get_notifications(&ana, DEFAULT_LIMIT).unwrap().iter().all(|n| n.read));
    }
}
