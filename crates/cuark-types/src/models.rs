use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of an account. The password hash never leaves the DB layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub banner_image: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Profile view: the user plus aggregate counts computed at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithStats {
    #[serde(flatten)]
    pub user: User,
    pub followers_count: i64,
    pub following_count: i64,
    pub cuarks_count: i64,
}

/// A cuark joined with its author and its engagement counts.
///
/// `views_count` is a placeholder. It is regenerated on every read and never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuarkWithAuthor {
    pub id: i64,
    pub content: String,
    pub author_id: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reply_to_id: Option<i64>,
    pub author: User,
    pub likes_count: i64,
    pub reposts_count: i64,
    pub replies_count: i64,
    pub views_count: u32,
    /// Only filled in for viewer-specific listings (the feed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_liked_by_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reposted_by_user: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Repost,
    Follow,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Repost => "repost",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "repost" => Ok(Self::Repost),
            "follow" => Ok(Self::Follow),
            other => Err(format!("unknown notification type '{}'", other)),
        }
    }
}

/// A notification with the acting user attached. `actor` is `None` only if
/// the actor row vanished between the notification insert and this read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationWithActor {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub actor_id: String,
    pub cuark_id: Option<i64>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub actor: Option<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u1".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            name: "Ana".into(),
            bio: None,
            avatar: None,
            banner_image: Some("banner.png".into()),
            location: None,
            website: None,
            created_at: DateTime::default(),
        }
    }

    #[test]
    fn user_with_stats_flattens_user_fields() {
        let stats = UserWithStats {
            user: sample_user(),
            followers_count: 2,
            following_count: 1,
            cuarks_count: 7,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["username"], "ana");
        assert_eq!(json["bannerImage"], "banner.png");
        assert_eq!(json["followersCount"], 2);
        assert_eq!(json["cuarksCount"], 7);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn notification_kind_serializes_as_type() {
        let n = NotificationWithActor {
            id: 1,
            user_id: "u1".into(),
            kind: NotificationKind::Repost,
            actor_id: "u2".into(),
            cuark_id: Some(3),
            read: false,
            created_at: DateTime::default(),
            actor: None,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "repost");
        assert_eq!(json["cuarkId"], 3);
    }

    #[test]
    fn notification_kind_parse() {
        assert_eq!("follow".parse::<NotificationKind>(), Ok(NotificationKind::Follow));
        assert!("mention".parse::<NotificationKind>().is_err());
    }
}
