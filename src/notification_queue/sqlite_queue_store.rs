//! SQLite-backed notification queue.

use super::models::{NotificationStatus, QueuedNotification};
use super::schema::NOTIFICATION_QUEUE_VERSIONED_SCHEMAS;
use super::{NotificationQueueStore, QueueFilter, QueueItemUpdate, QueueStoreError};
use crate::sqlite_persistence;
use anyhow::Result;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, recipient, channel, payload, status, scheduled_for, \
     created_at, sent_at, attempts, last_error";

pub struct SqliteNotificationQueueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNotificationQueueStore {
    /// Open an existing database or create a new one with the current schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = sqlite_persistence::open_versioned(
            db_path,
            NOTIFICATION_QUEUE_VERSIONED_SCHEMAS,
            "notification queue",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = sqlite_persistence::open_in_memory(NOTIFICATION_QUEUE_VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<QueuedNotification> {
        let payload: String = row.get("payload")?;
        let payload = serde_json::from_str(&payload)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        let status: String = row.get("status")?;
        let status = NotificationStatus::from_db_str(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown status '{}'", status).into(),
            )
        })?;

        Ok(QueuedNotification {
            id: row.get("id")?,
            recipient: row.get("recipient")?,
            channel: row.get("channel")?,
            payload,
            status,
            scheduled_for: row.get("scheduled_for")?,
            created_at: row.get("created_at")?,
            sent_at: row.get("sent_at")?,
            attempts: row.get("attempts")?,
            last_error: row.get("last_error")?,
        })
    }

    /// WHERE clause and its bound values for `filter`.
    fn filter_clause(filter: &QueueFilter) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(before) = filter.scheduled_before {
            conditions.push("scheduled_for <= ?");
            values.push(Value::Integer(before));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }

    fn current_status(
        conn: &Connection,
        id: &str,
    ) -> Result<NotificationStatus, QueueStoreError> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM notification_queue WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let status = status.ok_or_else(|| QueueStoreError::NotFound(id.to_string()))?;
        NotificationStatus::from_db_str(&status).ok_or_else(|| QueueStoreError::Corrupt {
            id: id.to_string(),
            reason: format!("unknown status '{}'", status),
        })
    }

    /// Error for an item that exists but can no longer change.
    fn reject_change(conn: &Connection, id: &str) -> QueueStoreError {
        match Self::current_status(conn, id) {
            Ok(status) => QueueStoreError::TerminalStatus {
                id: id.to_string(),
                status: status.as_str(),
            },
            Err(e) => e,
        }
    }
}

impl NotificationQueueStore for SqliteNotificationQueueStore {
    fn enqueue(&self, item: &QueuedNotification) -> Result<(), QueueStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO notification_queue (
                id, recipient, channel, payload, status, scheduled_for,
                created_at, sent_at, attempts, last_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                item.id,
                item.recipient,
                item.channel,
                item.payload.to_string(),
                item.status.as_str(),
                item.scheduled_for,
                item.created_at,
                item.sent_at,
                item.attempts,
                item.last_error,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<QueuedNotification>, QueueStoreError> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                &format!("SELECT {} FROM notification_queue WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::row_to_notification,
            )
            .optional()?;
        Ok(item)
    }

    fn query(
        &self,
        filter: &QueueFilter,
        limit: usize,
    ) -> Result<Vec<QueuedNotification>, QueueStoreError> {
        let (where_clause, mut values) = Self::filter_clause(filter);
        values.push(Value::Integer(limit as i64));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notification_queue{} \
             ORDER BY scheduled_for ASC, created_at ASC, id ASC LIMIT ?",
            SELECT_COLUMNS, where_clause
        ))?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_notification)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn update(&self, id: &str, update: &QueueItemUpdate) -> Result<(), QueueStoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"UPDATE notification_queue SET
                status = COALESCE(?1, status),
                sent_at = COALESCE(?2, sent_at),
                last_error = COALESCE(?3, last_error)
            WHERE id = ?4 AND status = 'pending'"#,
            params![
                update.status.map(|s| s.as_str()),
                update.sent_at,
                update.last_error,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(Self::reject_change(&conn, id));
        }
        Ok(())
    }

    fn record_failed_attempt(&self, id: &str, reason: &str) -> Result<u32, QueueStoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"UPDATE notification_queue
            SET attempts = attempts + 1, last_error = ?1
            WHERE id = ?2 AND status = 'pending'"#,
            params![reason, id],
        )?;

        if changed == 0 {
            return Err(Self::reject_change(&conn, id));
        }

        let attempts = conn.query_row(
            "SELECT attempts FROM notification_queue WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }

    fn count(&self, filter: &QueueFilter) -> Result<usize, QueueStoreError> {
        let (where_clause, values) = Self::filter_clause(filter);

        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM notification_queue{}", where_clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
