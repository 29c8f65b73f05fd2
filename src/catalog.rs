//! Relational catalog behind the watch, home, search and upload pages.
//!
//! Rows store object *paths*, never URLs. Playable URLs are minted per view by
//! the storage resolver so nothing permanent ever points at private media.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Session;

pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const RELATED_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "public" => Ok(Privacy::Public),
            "unlisted" => Ok(Privacy::Unlisted),
            "private" => Ok(Privacy::Private),
            other => Err(anyhow!("unknown privacy setting {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub subscriber_count: i64,
    pub created_at: String,
}

/// A row of the `videos` table joined with the owning channel's display
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Object key in the `videos` bucket.
    pub video_path: Option<String>,
    /// Object key in the `thumbnails` bucket.
    pub thumbnail_path: Option<String>,
    pub privacy: Privacy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub channel_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_avatar_url: Option<String>,
}

/// Input of the upload form once both objects are in storage.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub video_path: String,
    pub thumbnail_path: Option<String>,
    pub privacy: Privacy,
    pub tags: Vec<String>,
}

/// Rejections of [`CatalogStore::create_channel`] caused by the request
/// itself rather than the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel name and handle are required")]
    Invalid,

    #[error("channel already exists or handle {0} is taken")]
    Taken(String),
}

/// Splits the comma separated tag field of the upload form.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

const VIDEO_COLUMNS: &str = r#"
    v.id, v.channel_id, v.title, v.description, v.video_path, v.thumbnail_path,
    v.privacy, v.tags_json, v.view_count, v.like_count, v.dislike_count,
    v.created_at, v.published_at,
    c.name AS channel_name, c.avatar_url AS channel_avatar_url
"#;

/// Handle to the catalog database. Cheap to clone; every call opens its own
/// short-lived connection so it can run on any blocking thread.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    db_path: PathBuf,
}

impl CatalogStore {
    /// Opens (and if necessary creates) the database and its schema. WAL mode
    /// keeps page reads from blocking view counting.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating catalog directory {}", parent.display()))?;
        }

        let store = Self {
            db_path: path.to_path_buf(),
        };
        store.with_connection(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("enabling WAL mode for catalog DB")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            ensure_tables(conn)
        })?;
        Ok(store)
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = Connection::open(&self.db_path)
            .with_context(|| format!("opening catalog DB {}", self.db_path.display()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        f(&mut conn)
    }

    /// Creates the channel owned by `session`. A user owns at most one.
    pub fn create_channel(
        &self,
        session: &Session,
        name: &str,
        handle: &str,
    ) -> Result<ChannelRecord> {
        let name = name.trim();
        let handle = handle.trim().trim_start_matches('@');
        if name.is_empty() || handle.is_empty() {
            return Err(ChannelError::Invalid.into());
        }
        let handle = format!("@{handle}");
        let created_at = Utc::now().to_rfc3339();

        self.with_connection(|conn| {
            let id: String = conn
                .query_row(
                    r#"
                    INSERT INTO channels (user_id, name, handle, created_at)
                    VALUES (?1, ?2, ?3, ?4)
                    RETURNING id
                    "#,
                    params![session.user_id, name, handle, created_at],
                    |row| row.get(0),
                )
                .map_err(|err| match err {
                    rusqlite::Error::SqliteFailure(failure, _)
                        if failure.code == ErrorCode::ConstraintViolation =>
                    {
                        anyhow::Error::new(ChannelError::Taken(handle.clone()))
                    }
                    other => {
                        anyhow::Error::new(other).context(format!("creating channel {handle}"))
                    }
                })?;

            Ok(ChannelRecord {
                id,
                user_id: session.user_id.clone(),
                name: name.to_string(),
                handle,
                avatar_url: None,
                subscriber_count: 0,
                created_at,
            })
        })
    }

    /// Upload is gated on this returning `Some`.
    pub fn channel_for_user(&self, session: &Session) -> Result<Option<ChannelRecord>> {
        self.with_connection(|conn| {
            let channel = conn
                .query_row(
                    r#"
                    SELECT id, user_id, name, handle, avatar_url, subscriber_count, created_at
                    FROM channels
                    WHERE user_id = ?1
                    "#,
                    [&session.user_id],
                    |row| {
                        Ok(ChannelRecord {
                            id: row.get("id")?,
                            user_id: row.get("user_id")?,
                            name: row.get("name")?,
                            handle: row.get("handle")?,
                            avatar_url: row.get("avatar_url")?,
                            subscriber_count: row.get("subscriber_count")?,
                            created_at: row.get("created_at")?,
                        })
                    },
                )
                .optional()?;
            Ok(channel)
        })
    }

    /// Records an uploaded video. Only public videos get a publish date.
    pub fn insert_video(&self, video: &NewVideo) -> Result<VideoRecord> {
        let tags_json = serde_json::to_string(&video.tags).context("serializing tags")?;
        let created_at = Utc::now().to_rfc3339();
        let published_at = (video.privacy == Privacy::Public).then(|| created_at.clone());

        let id = self.with_connection(|conn| {
            let id: String = conn
                .query_row(
                    r#"
                    INSERT INTO videos (
                        channel_id, title, title_folded, description, video_path,
                        thumbnail_path, privacy, tags_json, created_at, published_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    RETURNING id
                    "#,
                    params![
                        video.channel_id,
                        video.title,
                        video.title.to_lowercase(),
                        video.description,
                        video.video_path,
                        video.thumbnail_path,
                        video.privacy.as_str(),
                        tags_json,
                        created_at,
                        published_at,
                    ],
                    |row| row.get(0),
                )
                .context("inserting video row")?;
            Ok(id)
        })?;

        self.get_video(&id)?
            .ok_or_else(|| anyhow!("video {id} vanished after insert"))
    }

    pub fn get_video(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {VIDEO_COLUMNS}
                FROM videos v JOIN channels c ON c.id = v.channel_id
                WHERE v.id = ?1
                "#
            ))?;
            let mut rows = stmt.query([video_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_video(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Newest public videos first, as on the home page.
    pub fn list_public(&self, limit: u32) -> Result<Vec<VideoRecord>> {
        self.query_videos(
            r#"
            WHERE v.privacy = 'public'
            ORDER BY v.created_at DESC, v.rowid DESC
            LIMIT ?1
            "#,
            params![limit],
        )
    }

    /// Public videos other than `video_id` for the watch page sidebar.
    pub fn related(&self, video_id: &str, limit: u32) -> Result<Vec<VideoRecord>> {
        self.query_videos(
            r#"
            WHERE v.privacy = 'public' AND v.id != ?1
            ORDER BY v.created_at DESC, v.rowid DESC
            LIMIT ?2
            "#,
            params![video_id, limit],
        )
    }

    /// Case-insensitive title match over public videos, most viewed first.
    /// SQLite only folds ASCII, so both sides are lowercased in Rust.
    pub fn search(&self, query: &str, limit: u32) -> Result<Vec<VideoRecord>> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));
        self.query_videos(
            r#"
            WHERE v.privacy = 'public' AND v.title_folded LIKE ?1 ESCAPE '\'
            ORDER BY v.view_count DESC, v.created_at DESC
            LIMIT ?2
            "#,
            params![pattern, limit],
        )
    }

    fn query_videos(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<VideoRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos v JOIN channels c ON c.id = v.channel_id {filter}"
            ))?;
            let mut rows = stmt.query(args)?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_video(row)?);
            }
            Ok(records)
        })
    }

    /// Logs a view for `session` and bumps the counter. The increment happens
    /// inside SQLite, so concurrent views never overwrite each other.
    /// Returns the new view count.
    pub fn record_view(&self, session: &Session, video_id: &str) -> Result<i64> {
        let watched_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let view_count: Option<i64> = tx
                .query_row(
                    "UPDATE videos SET view_count = view_count + 1 WHERE id = ?1 RETURNING view_count",
                    [video_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(view_count) = view_count else {
                bail!("video {video_id} not found");
            };
            tx.execute(
                "INSERT INTO watch_history (user_id, video_id, watched_at) VALUES (?1, ?2, ?3)",
                params![session.user_id, video_id, watched_at],
            )?;
            tx.commit()?;
            Ok(view_count)
        })
    }

    /// `Some(true)` liked, `Some(false)` disliked, `None` no reaction.
    pub fn user_reaction(&self, session: &Session, video_id: &str) -> Result<Option<bool>> {
        self.with_connection(|conn| {
            let reaction = conn
                .query_row(
                    "SELECT is_like FROM likes WHERE video_id = ?1 AND user_id = ?2",
                    params![video_id, session.user_id],
                    |row| row.get::<_, i64>(0).map(|value| value != 0),
                )
                .optional()?;
            Ok(reaction)
        })
    }

    /// Applies a thumbs up/down click. Repeating the current reaction removes
    /// it; anything else replaces it. Counters are recomputed from `likes` in
    /// the same transaction. Returns the reaction now in effect.
    pub fn set_reaction(
        &self,
        session: &Session,
        video_id: &str,
        is_like: bool,
    ) -> Result<Option<bool>> {
        let now = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let exists: bool = tx
                .query_row("SELECT 1 FROM videos WHERE id = ?1", [video_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                bail!("video {video_id} not found");
            }

            let current: Option<bool> = tx
                .query_row(
                    "SELECT is_like FROM likes WHERE video_id = ?1 AND user_id = ?2",
                    params![video_id, session.user_id],
                    |row| row.get::<_, i64>(0).map(|value| value != 0),
                )
                .optional()?;

            let outcome = if current == Some(is_like) {
                tx.execute(
                    "DELETE FROM likes WHERE video_id = ?1 AND user_id = ?2",
                    params![video_id, session.user_id],
                )?;
                None
            } else {
                tx.execute(
                    r#"
                    INSERT INTO likes (video_id, user_id, is_like, created_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(video_id, user_id) DO UPDATE SET is_like = excluded.is_like
                    "#,
                    params![video_id, session.user_id, is_like as i64, now],
                )?;
                Some(is_like)
            };

            tx.execute(
                r#"
                UPDATE videos SET
                    like_count = (SELECT COUNT(*) FROM likes WHERE video_id = ?1 AND is_like = 1),
                    dislike_count = (SELECT COUNT(*) FROM likes WHERE video_id = ?1 AND is_like = 0)
                WHERE id = ?1
                "#,
                [video_id],
            )?;
            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Number of history rows for a user and video.
    pub fn watch_count(&self, session: &Session, video_id: &str) -> Result<i64> {
        self.with_connection(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM watch_history WHERE user_id = ?1 AND video_id = ?2",
                params![session.user_id, video_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

/// Runs the schema DDL in one transaction so a failure leaves the DB
/// untouched.
fn ensure_tables(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            user_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            handle TEXT NOT NULL UNIQUE,
            avatar_url TEXT,
            subscriber_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            channel_id TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            title_folded TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            video_path TEXT,
            thumbnail_path TEXT,
            privacy TEXT NOT NULL DEFAULT 'public',
            tags_json TEXT NOT NULL DEFAULT '[]',
            view_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            dislike_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            published_at TEXT
        );

        CREATE TABLE IF NOT EXISTS likes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            is_like INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (video_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS watch_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            watched_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_videos_privacy_created ON videos(privacy, created_at);
        CREATE INDEX IF NOT EXISTS idx_watch_history_user ON watch_history(user_id, video_id);
        "#,
    )?;
    tx.commit()?;
    Ok(())
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn row_to_video(row: &Row<'_>) -> Result<VideoRecord> {
    let tags_json: String = row.get("tags_json")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).context("parsing stored tags JSON")?;
    let privacy: String = row.get("privacy")?;

    Ok(VideoRecord {
        id: row.get("id")?,
        channel_id: row.get("channel_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        video_path: row.get("video_path")?,
        thumbnail_path: row.get("thumbnail_path")?,
        privacy: privacy.parse()?,
        tags,
        view_count: row.get("view_count")?,
        like_count: row.get("like_count")?,
        dislike_count: row.get("dislike_count")?,
        created_at: row.get("created_at")?,
        published_at: row.get("published_at")?,
        channel_name: row.get("channel_name")?,
        channel_avatar_url: row.get("channel_avatar_url")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn open_store() -> (TempDir, CatalogStore) {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::open(dir.path().join("catalog.db")).unwrap();
        (dir, store)
    }

    pub(crate) fn upload(
        store: &CatalogStore,
        channel: &ChannelRecord,
        title: &str,
        privacy: Privacy,
    ) -> VideoRecord {
        store
            .insert_video(&NewVideo {
                channel_id: channel.id.clone(),
                title: title.to_string(),
                description: String::new(),
                video_path: format!("{}/1_{title}.mp4", channel.user_id),
                thumbnail_path: Some(format!("{}/1_{title}.png", channel.user_id)),
                privacy,
                tags: parse_tags("music, live ,"),
            })
            .unwrap()
    }

    #[test]
    fn channel_gates_upload() {
        let (_dir, store) = open_store();
        let alice = Session::new("alice");
        assert!(store.channel_for_user(&alice).unwrap().is_none());
        let channel = store.create_channel(&alice, "Alice", "alice").unwrap();
        assert_eq!(channel.handle, "@alice");
        assert_eq!(store.channel_for_user(&alice).unwrap(), Some(channel));
        let err = store.create_channel(&alice, "Again", "again").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChannelError>(),
            Some(&ChannelError::Taken("@again".into()))
        );
        let err = store
            .create_channel(&Session::new("bob"), "Bob", "@alice")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChannelError>(),
            Some(ChannelError::Taken(_))
        ));
        let err = store
            .create_channel(&Session::new("bob"), " ", "bob")
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChannelError>(),
            Some(&ChannelError::Invalid)
        );
    }

    #[test]
    fn insert_sets_publish_date_for_public_only() {
        let (_dir, store) = open_store();
        let channel = store
            .create_channel(&Session::new("u1"), "Chan", "chan")
            .unwrap();
        let public = upload(&store, &channel, "pub", Privacy::Public);
        let private = upload(&store, &channel, "priv", Privacy::Private);
        assert!(public.published_at.is_some());
        assert!(private.published_at.is_none());
        assert_eq!(public.tags, vec!["music", "live"]);
        assert_eq!(public.channel_name, "Chan");
        assert_eq!(public.video_path.as_deref(), Some("u1/1_pub.mp4"));

        let listed = store.list_public(DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public.id);
    }

    #[test]
    fn related_excludes_current_video() {
        let (_dir, store) = open_store();
        let channel = store
            .create_channel(&Session::new("u1"), "Chan", "chan")
            .unwrap();
        let a = upload(&store, &channel, "a", Privacy::Public);
        let b = upload(&store, &channel, "b", Privacy::Public);
        let related = store.related(&a.id, RELATED_PAGE_SIZE).unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, b.id);
    }

    #[test]
    fn search_matches_titles_case_insensitively() {
        let (_dir, store) = open_store();
        let channel = store
            .create_channel(&Session::new("u1"), "Chan", "chan")
            .unwrap();
        upload(&store, &channel, "Rust Tutorial", Privacy::Public);
        upload(&store, &channel, "rusty bikes", Privacy::Public);
        upload(&store, &channel, "rust secrets", Privacy::Private);
        upload(&store, &channel, "100% cats", Privacy::Public);

        let hits = store.search("RUST", DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(hits.len(), 2);
        let hits = store.search("100%", DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.search("0_c", DEFAULT_PAGE_SIZE).unwrap().is_empty());
    }

    #[test]
    fn search_folds_non_ascii_letters() {
        let (_dir, store) = open_store();
        let channel = store
            .create_channel(&Session::new("u1"), "Chan", "chan")
            .unwrap();
        let video = upload(&store, &channel, "Café Éclair", Privacy::Public);

        for query in ["CAFÉ", "café", "ÉCLAIR", "éclair"] {
            let hits = store.search(query, DEFAULT_PAGE_SIZE).unwrap();
            assert_eq!(hits.len(), 1, "query {query:?}");
            assert_eq!(hits[0].id, video.id);
            assert_eq!(hits[0].title, "Café Éclair");
        }
    }

    #[test]
    fn views_increment_atomically() {
        let (_dir, store) = open_store();
        let viewer = Session::new("viewer");
        let channel = store
            .create_channel(&Session::new("u1"), "Chan", "chan")
            .unwrap();
        let video = upload(&store, &channel, "v", Privacy::Public);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let viewer = viewer.clone();
                let id = video.id.clone();
                std::thread::spawn(move || store.record_view(&viewer, &id).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get_video(&video.id).unwrap().unwrap().view_count, 4);
        assert_eq!(store.watch_count(&viewer, &video.id).unwrap(), 4);
        assert!(store.record_view(&viewer, "missing").is_err());
    }

    #[test]
    fn reactions_toggle_and_recount() {
        let (_dir, store) = open_store();
        let fan = Session::new("fan");
        let critic = Session::new("critic");
        let channel = store
            .create_channel(&Session::new("u1"), "Chan", "chan")
            .unwrap();
        let video = upload(&store, &channel, "v", Privacy::Public);

        assert_eq!(store.set_reaction(&fan, &video.id, true).unwrap(), Some(true));
        assert_eq!(
            store.set_reaction(&critic, &video.id, false).unwrap(),
            Some(false)
        );
        let row = store.get_video(&video.id).unwrap().unwrap();
        assert_eq!((row.like_count, row.dislike_count), (1, 1));

        assert_eq!(store.set_reaction(&fan, &video.id, true).unwrap(), None);
        assert_eq!(store.user_reaction(&fan, &video.id).unwrap(), None);
        assert_eq!(
            store.set_reaction(&critic, &video.id, true).unwrap(),
            Some(true)
        );
        let row = store.get_video(&video.id).unwrap().unwrap();
        assert_eq!((row.like_count, row.dislike_count), (1, 0));
    }
}
