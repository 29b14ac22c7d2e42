//! Database schema for download_jobs.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Download Jobs Table - Version 0
// =============================================================================

const DOWNLOAD_JOBS_TABLE_V0: Table = Table {
    name: "download_jobs",
    columns: &[
        sqlite_column!("identifier", &SqlType::Text, is_primary_key = true),
        sqlite_column!("artifact_type", &SqlType::Text, non_null = true),
        sqlite_column!("source_id", &SqlType::Text, non_null = true),
        sqlite_column!("sub_id", &SqlType::Text, non_null = true),
        sqlite_column!("last_requested", &SqlType::Integer, non_null = true),
        sqlite_column!("ttl_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("message", &SqlType::Text),
        // JSON array of observer addresses
        sqlite_column!("observers", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_download_jobs_source", "source_id"),
        ("idx_download_jobs_status", "status"),
    ],
};

pub const DOWNLOAD_JOBS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[DOWNLOAD_JOBS_TABLE_V0],
    migration: None,
}];
