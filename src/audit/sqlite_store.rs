//! SQLite implementation of the AuditStore trait

use crate::audit::{
    paginate, AuditDataType, AuditError, AuditEventType, AuditFilter, AuditRecord, AuditStore,
};
use crate::pagination::PaginatedResponse;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// SQLite implementation of AuditStore. Timestamps are stored as RFC 3339
/// strings with fixed microsecond precision so lexicographic and
/// chronological order agree.
pub struct SqliteAuditStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<AuditRecord> {
    let timestamp: String = row.get(1)?;
    let event_type: String = row.get(4)?;
    let data_type: String = row.get(5)?;

    let parse_err = |msg: String| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            msg.into(),
        )
    };

    Ok(AuditRecord {
        id: row.get(0)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| parse_err(e.to_string()))?
            .with_timezone(&Utc),
        correlation_id: row.get(2)?,
        user_name: row.get(3)?,
        event_type: event_type.parse::<AuditEventType>().map_err(parse_err)?,
        data_type: data_type.parse::<AuditDataType>().map_err(parse_err)?,
        data_reference: row.get(6)?,
        data_diff: row.get(7)?,
    })
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_trail (timestamp, correlation_id, user_name, event_type, \
             data_type, data_reference, data_diff) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                record.correlation_id,
                record.user_name,
                record.event_type.as_str(),
                record.data_type.as_str(),
                record.data_reference,
                record.data_diff,
            ],
        )?;
        Ok(())
    }

    fn get_all(
        &self,
        filter: &AuditFilter,
        skip: Option<usize>,
        take: Option<usize>,
    ) -> Result<PaginatedResponse<AuditRecord>, AuditError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, correlation_id, user_name, event_type, data_type, \
             data_reference, data_diff FROM audit_trail ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(paginate(records, filter, skip, take))
    }
}
