//! Database schema for notifications.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

const NOTIFICATION_QUEUE_TABLE_V0: Table = Table {
    name: "notification_queue",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("recipient", &SqlType::Text, non_null = true),
        sqlite_column!("channel", &SqlType::Text, non_null = true),
        sqlite_column!("payload", &SqlType::Text, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("scheduled_for", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("sent_at", &SqlType::Integer),
        sqlite_column!(
            "attempts",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("last_error", &SqlType::Text),
    ],
    indices: &[(
        "idx_notification_queue_due",
        "status, scheduled_for, created_at",
    )],
};

pub const NOTIFICATION_QUEUE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[NOTIFICATION_QUEUE_TABLE_V0],
    migration: None,
}];
