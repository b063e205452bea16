use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::{mpsc, oneshot};

use crate::core::error::{FeedError, FeedResult};
use crate::core::models::{
    CountUnreadRequest, FetchRequest, FetchResponse, MarkAllReadRequest, MarkAllReadResponse,
    Notification, UserSummary, ViewMode,
};
use crate::core::repository::NotificationRepository;

/// Schema DDL run on open.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    full_name TEXT NOT NULL,
    profile_image_url TEXT
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id_from INTEGER NOT NULL,
    user_id_to INTEGER NOT NULL,
    subject TEXT NOT NULL,
    full_message TEXT NOT NULL DEFAULT '',
    full_message_html TEXT,
    small_message TEXT NOT NULL DEFAULT '',
    context_url TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    time_created INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(user_id_to, is_read, time_created DESC);
";

/// A notification to be stored; the id is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id_from: i64,
    pub user_id_to: i64,
    pub subject: String,
    pub full_message: String,
    pub full_message_html: Option<String>,
    pub small_message: String,
    pub context_url: Option<String>,
    pub time_created: i64,
}

// ---------------------------------------------------------------------------
// Commands sent from async world to background thread
// ---------------------------------------------------------------------------

enum StoreCmd {
    Query {
        request: FetchRequest,
        reply: oneshot::Sender<FeedResult<FetchResponse>>,
    },
    MarkAllRead {
        recipient_id: i64,
        reply: oneshot::Sender<FeedResult<()>>,
    },
    CountUnread {
        recipient_id: i64,
        reply: oneshot::Sender<FeedResult<u32>>,
    },
    Insert {
        notification: NewNotification,
        reply: oneshot::Sender<FeedResult<i64>>,
    },
    SaveUser {
        user: UserSummary,
        reply: oneshot::Sender<FeedResult<()>>,
    },
}

// ---------------------------------------------------------------------------
// LocalStore: Clone + Send + Sync async facade
// ---------------------------------------------------------------------------

/// SQLite-backed notification source with the same semantics as the
/// remote service: fetching with `mark_as_read` consumes unread items.
#[derive(Clone)]
pub struct LocalStore {
    tx: mpsc::UnboundedSender<StoreCmd>,
}

fn unavailable<T>(_: T) -> FeedError {
    FeedError::Store("store unavailable".into())
}

impl LocalStore {
    /// Open (or create) the database in the user data dir.
    pub fn open() -> FeedResult<Self> {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notifeed");
        std::fs::create_dir_all(&dir)
            .map_err(|e| FeedError::Store(format!("create data dir: {e}")))?;
        Self::open_at(&dir.join("notifications.db"))
    }

    /// Open (or create) the database at `path` and spawn the background thread.
    pub fn open_at(path: &Path) -> FeedResult<Self> {
        let conn =
            Connection::open(path).map_err(|e| FeedError::Store(format!("open db: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| FeedError::Store(format!("init schema: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("notifeed-store".into())
            .spawn(move || Self::run_loop(conn, rx))
            .map_err(|e| FeedError::Store(format!("spawn store thread: {e}")))?;

        log::info!("Local notification store opened at {}", path.display());
        Ok(LocalStore { tx })
    }

    // -- async methods -------------------------------------------------------

    pub async fn insert(&self, notification: NewNotification) -> FeedResult<i64> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCmd::Insert {
                notification,
                reply,
            })
            .map_err(unavailable)?;
        rx.await.map_err(unavailable)?
    }

    pub async fn save_user(&self, user: UserSummary) -> FeedResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCmd::SaveUser { user, reply })
            .map_err(unavailable)?;
        rx.await.map_err(unavailable)?
    }

    // -- background thread ---------------------------------------------------

    fn run_loop(conn: Connection, mut rx: mpsc::UnboundedReceiver<StoreCmd>) {
        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                StoreCmd::Query { request, reply } => {
                    let _ = reply.send(Self::do_query(&conn, &request));
                }
                StoreCmd::MarkAllRead {
                    recipient_id,
                    reply,
                } => {
                    let _ = reply.send(Self::do_mark_all_read(&conn, recipient_id));
                }
                StoreCmd::CountUnread {
                    recipient_id,
                    reply,
                } => {
                    let _ = reply.send(Self::do_count_unread(&conn, recipient_id));
                }
                StoreCmd::Insert {
                    notification,
                    reply,
                } => {
                    let _ = reply.send(Self::do_insert(&conn, &notification));
                }
                StoreCmd::SaveUser { user, reply } => {
                    let _ = reply.send(Self::do_save_user(&conn, &user));
                }
            }
        }
        log::debug!("Store thread exiting");
    }

    // -- synchronous DB operations -------------------------------------------

    fn do_query(conn: &Connection, request: &FetchRequest) -> FeedResult<FetchResponse> {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| FeedError::Store(format!("tx error: {e}")))?;

        let unread_only = request.mode == ViewMode::Unread;
        let mut notifications = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, user_id_from, user_id_to, subject, full_message, full_message_html,
                            small_message, context_url, is_read, time_created
                     FROM notifications
                     WHERE user_id_to = ?1 AND (?2 = 0 OR is_read = 0)
                     ORDER BY time_created DESC, id DESC
                     LIMIT ?3 OFFSET ?4",
                )
                .map_err(|e| FeedError::Store(format!("prepare error: {e}")))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![
                        request.recipient_id,
                        unread_only as i32,
                        request.limit,
                        request.offset
                    ],
                    |row| {
                        Ok(Notification {
                            id: row.get(0)?,
                            user_id_from: row.get(1)?,
                            user_id_to: row.get(2)?,
                            subject: row.get(3)?,
                            full_message: row.get(4)?,
                            full_message_html: row.get(5)?,
                            small_message: row.get(6)?,
                            context_url: row.get(7)?,
                            read: row.get::<_, i32>(8)? != 0,
                            time_created: row.get(9)?,
                            user_from: None,
                            user_to: None,
                        })
                    },
                )
                .map_err(|e| FeedError::Store(format!("query error: {e}")))?;

            let mut notifications = Vec::new();
            for row in rows {
                notifications.push(row.map_err(|e| FeedError::Store(format!("row error: {e}")))?);
            }
            notifications
        };

        if request.embed_user_from || request.embed_user_to {
            for n in &mut notifications {
                if request.embed_user_from {
                    n.user_from = Self::do_load_user(&tx, n.user_id_from)?;
                }
                if request.embed_user_to {
                    n.user_to = Self::do_load_user(&tx, n.user_id_to)?;
                }
            }
        }

        // Returned rows keep the flag they had when fetched.
        if request.mark_as_read {
            let mut stmt = tx
                .prepare("UPDATE notifications SET is_read = 1 WHERE id = ?1")
                .map_err(|e| FeedError::Store(format!("prepare error: {e}")))?;
            for n in notifications.iter().filter(|n| !n.read) {
                stmt.execute([n.id])
                    .map_err(|e| FeedError::Store(format!("update error: {e}")))?;
            }
        }

        let unread_count = Self::do_count_unread(&tx, request.recipient_id)?;

        tx.commit()
            .map_err(|e| FeedError::Store(format!("commit error: {e}")))?;

        Ok(FetchResponse {
            notifications,
            unread_count,
        })
    }

    fn do_load_user(conn: &Connection, id: i64) -> FeedResult<Option<UserSummary>> {
        let result = conn.query_row(
            "SELECT id, full_name, profile_image_url FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    profile_image_url: row.get(2)?,
                })
            },
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FeedError::Store(format!("user load error: {e}"))),
        }
    }

    fn do_mark_all_read(conn: &Connection, recipient_id: i64) -> FeedResult<()> {
        conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id_to = ?1 AND is_read = 0",
            [recipient_id],
        )
        .map_err(|e| FeedError::Store(format!("mark read error: {e}")))?;
        Ok(())
    }

    fn do_count_unread(conn: &Connection, recipient_id: i64) -> FeedResult<u32> {
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id_to = ?1 AND is_read = 0",
            [recipient_id],
            |row| row.get(0),
        )
        .map_err(|e| FeedError::Store(format!("count error: {e}")))
    }

    fn do_insert(conn: &Connection, n: &NewNotification) -> FeedResult<i64> {
        conn.execute(
            "INSERT INTO notifications (user_id_from, user_id_to, subject, full_message,
                                        full_message_html, small_message, context_url, time_created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                n.user_id_from,
                n.user_id_to,
                n.subject,
                n.full_message,
                n.full_message_html,
                n.small_message,
                n.context_url,
                n.time_created,
            ],
        )
        .map_err(|e| FeedError::Store(format!("insert error: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    fn do_save_user(conn: &Connection, user: &UserSummary) -> FeedResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO users (id, full_name, profile_image_url) VALUES (?1, ?2, ?3)",
            rusqlite::params![user.id, user.full_name, user.profile_image_url],
        )
        .map_err(|e| FeedError::Store(format!("user save error: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for LocalStore {
    async fn query(&self, request: &FetchRequest) -> FeedResult<FetchResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCmd::Query {
                request: request.clone(),
                reply,
            })
            .map_err(unavailable)?;
        rx.await.map_err(unavailable)?
    }

    async fn mark_all_read(&self, request: &MarkAllReadRequest) -> FeedResult<MarkAllReadResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCmd::MarkAllRead {
                recipient_id: request.recipient_id,
                reply,
            })
            .map_err(unavailable)?;
        rx.await.map_err(unavailable)??;
        Ok(MarkAllReadResponse { success: true })
    }

    async fn count_unread(&self, request: &CountUnreadRequest) -> FeedResult<u32> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCmd::CountUnread {
                recipient_id: request.recipient_id,
                reply,
            })
            .map_err(unavailable)?;
        rx.await.map_err(unavailable)?
    }
}
