use anyhow::Result;
use rand::Rng;
use rusqlite::{Connection, ToSql};

use cuark_types::models::CuarkWithAuthor;

use crate::models::{CuarkRow, UserRow, parse_timestamp};
use crate::queries::count;
use crate::{Database, OptionalExt};

pub const DEFAULT_LIMIT: u32 = 50;

/// Views are not tracked; every read gets a fresh number below this bound.
const PLACEHOLDER_VIEWS_MAX: u32 = 10_000;

const CUARK_SELECT: &str = "SELECT c.id, c.content, c.author_id, c.image_url, c.reply_to_id, c.created_at,
        u.id, u.username, u.password, u.email, u.name, u.bio, u.avatar,
        u.banner_image, u.location, u.website, u.created_at
 FROM cuarks c
 LEFT JOIN users u ON c.author_id = u.id";

impl Database {
    /// Insert a cuark and return its id. Content is validated by the caller.
    pub fn create_cuark(
        &self,
        author_id: &str,
        content: &str,
        image_url: Option<&str>,
        reply_to_id: Option<i64>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO cuarks (content, author_id, image_url, reply_to_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![content, author_id, image_url, reply_to_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn cuark_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT 1 FROM cuarks WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some())
        })
    }

    /// Single cuark view, or `None` if it (or its author) does not exist.
    pub fn get_cuark(&self, id: i64) -> Result<Option<CuarkWithAuthor>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE c.id = ?1", CUARK_SELECT);
            let rows = query_cuarks(conn, &sql, rusqlite::params![id])?;
            Ok(assemble(conn, rows, None)?.into_iter().next())
        })
    }

    /// Recent cuarks, newest first, optionally restricted to one author.
    pub fn get_cuarks(&self, author_id: Option<&str>, limit: u32) -> Result<Vec<CuarkWithAuthor>> {
        self.with_conn(|conn| {
            let rows = match author_id {
                Some(author_id) => {
                    let sql = format!(
                        "{} WHERE c.author_id = ?1 ORDER BY c.created_at DESC, c.id DESC LIMIT ?2",
                        CUARK_SELECT
                    );
                    query_cuarks(conn, &sql, rusqlite::params![author_id, limit])?
                }
                None => recent_cuarks(conn, limit)?,
            };
            assemble(conn, rows, None)
        })
    }

    /// Cuarks by the viewer and everyone they follow, newest first, with the
    /// viewer's like/repost state. A viewer who follows nobody gets the global
    /// timeline instead of an empty feed.
    pub fn get_feed_cuarks(&self, viewer_id: &str, limit: u32) -> Result<Vec<CuarkWithAuthor>> {
        self.with_conn(|conn| {
            let following = count(conn, "SELECT COUNT(*) FROM follows WHERE follower_id = ?1", viewer_id)?;

            let rows = if following == 0 {
                recent_cuarks(conn, limit)?
            } else {
                let sql = format!(
                    "{} WHERE c.author_id = ?1
                        OR c.author_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
                     ORDER BY c.created_at DESC, c.id DESC
                     LIMIT ?2",
                    CUARK_SELECT
                );
                query_cuarks(conn, &sql, rusqlite::params![viewer_id, limit])?
            };

            assemble(conn, rows, Some(viewer_id))
        })
    }

    /// Delete a cuark owned by `user_id`. Returns false if the cuark does not
    /// exist or belongs to someone else.
    pub fn delete_cuark(&self, id: i64, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM cuarks WHERE id = ?1 AND author_id = ?2",
                rusqlite::params![id, user_id],
            )?;
            Ok(removed > 0)
        })
    }
}

fn recent_cuarks(conn: &Connection, limit: u32) -> Result<Vec<(CuarkRow, Option<UserRow>)>> {
    let sql = format!("{} ORDER BY c.created_at DESC, c.id DESC LIMIT ?1", CUARK_SELECT);
    query_cuarks(conn, &sql, rusqlite::params![limit])
}

fn query_cuarks(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<(CuarkRow, Option<UserRow>)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                CuarkRow {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    author_id: row.get(2)?,
                    image_url: row.get(3)?,
                    reply_to_id: row.get(4)?,
                    created_at: row.get(5)?,
                },
                UserRow::from_joined_row(row, 6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Attach counts (and viewer state, if any) to each joined row. Rows without
/// an author are dropped.
fn assemble(
    conn: &Connection,
    rows: Vec<(CuarkRow, Option<UserRow>)>,
    viewer_id: Option<&str>,
) -> Result<Vec<CuarkWithAuthor>> {
    let mut counts = conn.prepare_cached(
        "SELECT (SELECT COUNT(*) FROM likes WHERE cuark_id = ?1),
                (SELECT COUNT(*) FROM reposts WHERE cuark_id = ?1),
                (SELECT COUNT(*) FROM cuarks WHERE reply_to_id = ?1)",
    )?;
    let mut viewer_state = conn.prepare_cached(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE cuark_id = ?1 AND user_id = ?2),
                EXISTS(SELECT 1 FROM reposts WHERE cuark_id = ?1 AND user_id = ?2)",
    )?;
    let mut rng = rand::rng();

    let mut out = Vec::with_capacity(rows.len());
    for (cuark, author) in rows {
        let Some(author) = author else {
            continue;
        };

        let (likes_count, reposts_count, replies_count): (i64, i64, i64) =
            counts.query_row([cuark.id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?;

        let (is_liked_by_user, is_reposted_by_user) = match viewer_id {
            Some(viewer) => {
                let (liked, reposted): (bool, bool) = viewer_state
                    .query_row(rusqlite::params![cuark.id, viewer], |r| Ok((r.get(0)?, r.get(1)?)))?;
                (Some(liked), Some(reposted))
            }
            None => (None, None),
        };

        out.push(CuarkWithAuthor {
            created_at: parse_timestamp(&cuark.created_at, &cuark.id.to_string()),
            id: cuark.id,
            content: cuark.content,
            author_id: cuark.author_id,
            image_url: cuark.image_url,
            reply_to_id: cuark.reply_to_id,
            author: author.into_user(),
            likes_count,
            reposts_count,
            replies_count,
            views_count: rng.random_range(0..PLACEHOLDER_VIEWS_MAX),
            is_liked_by_user,
            is_reposted_by_user,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_LIMIT;
    use crate::test_support::{cuark, db, user};

    #[test]
    fn get_cuark_joins_author_and_counts() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let id = cuark(&db, &ana, "hello");
        db.create_cuark(&bob, "reply", None, Some(id)).unwrap();
        db.like_cuark(&bob, id).unwrap();
        db.repost_cuark(&bob, id).unwrap();

        let view = db.get_cuark(id).unwrap().unwrap();
        assert_eq!(view.content, "hello");
        assert_eq!(view.author.username, "ana");
        assert_eq!(view.likes_count, 1);
        assert_eq!(view.reposts_count, 1);
        assert_eq!(view.replies_count, 1);
        assert!(view.views_count < 10_000);
        assert!(view.is_liked_by_user.is_none());

        assert!(db.get_cuark(9999).unwrap().is_none());
    }

    #[test]
    fn get_cuarks_filters_by_author_newest_first() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let first = cuark(&db, &ana, "first");
        cuark(&db, &bob, "bob's");
        let second = cuark(&db, &ana, "second");

        let ids: Vec<i64> = db
            .get_cuarks(Some(&ana), DEFAULT_LIMIT)
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![second, first]);

        assert_eq!(db.get_cuarks(None, DEFAULT_LIMIT).unwrap().len(), 3);
        assert_eq!(db.get_cuarks(None, 2).unwrap().len(), 2);
    }

    #[test]
    fn feed_without_follows_is_global_timeline() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let eve = user(&db, "eve");
        cuark(&db, &bob, "b1");
        cuark(&db, &eve, "e1");
        cuark(&db, &bob, "b2");

        let feed: Vec<i64> = db
            .get_feed_cuarks(&ana, DEFAULT_LIMIT)
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        let global: Vec<i64> = db
            .get_cuarks(None, DEFAULT_LIMIT)
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(feed, global);
        assert_eq!(feed.len(), 3);
    }

    #[test]
    fn feed_includes_self_and_followed_only() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let eve = user(&db, "eve");
        db.follow_user(&ana, &bob).unwrap();

        let own = cuark(&db, &ana, "mine");
        let followed = cuark(&db, &bob, "followed");
        cuark(&db, &eve, "stranger");
        db.like_cuark(&ana, followed).unwrap();

        let feed = db.get_feed_cuarks(&ana, DEFAULT_LIMIT).unwrap();
        let ids: Vec<i64> = feed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![followed, own]);
        assert_eq!(feed[0].is_liked_by_user, Some(true));
        assert_eq!(feed[0].is_reposted_by_user, Some(false));
        assert_eq!(feed[1].is_liked_by_user, Some(false));
    }

    #[test]
    fn delete_requires_ownership() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let id = cuark(&db, &ana, "keep me");

        assert!(!db.delete_cuark(id, &bob).unwrap());
        assert!(db.cuark_exists(id).unwrap());
        assert!(!db.delete_cuark(9999, &ana).unwrap());

        assert!(db.delete_cuark(id, &ana).unwrap());
        assert!(!db.cuark_exists(id).unwrap());
    }

    #[test]
    fn delete_cascades_to_engagement() {
        let db = db();
        let ana = user(&db, "ana");
        let bob = user(&db, "bob");
        let id = cuark(&db, &ana, "doomed");
        let reply = db.create_cuark(&bob, "reply", None, Some(id)).unwrap();
        db.like_cuark(&bob, id).unwrap();
        db.repost_cuark(&bob, id).unwrap();
        assert_eq!(db.get_notifications(&ana, DEFAULT_LIMIT).unwrap().len(), 2);

        assert!(db.delete_cuark(id, &ana).unwrap());

        assert!(db.get_notifications(&ana, DEFAULT_LIMIT).unwrap().is_empty());
        let orphan = db.get_cuark(reply).unwrap().unwrap();
        assert_eq!(orphan.reply_to_id, None);
        let likes: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM likes", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(likes, 0);
    }
}
