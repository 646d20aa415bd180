//! SQLite implementation of the KeyValueStore trait

use crate::keyvalue::{
    keyword_matches, normalize, KeyValueStore, MetadataError, MetadataKey, MetadataRecord,
};
use log::warn;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

/// SQLite implementation of KeyValueStore.
///
/// All statements address the uppercase-normalized key columns; display
/// columns are only ever read back. Bulk operations run inside a single
/// transaction on the shared connection.
pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyValueStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn existing_keys(
        tx: &Transaction,
        category: &str,
        collection: &str,
        keys: &[String],
    ) -> Result<Vec<String>, MetadataError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT key FROM key_value_data WHERE category = ? AND collection = ? AND key IN ({})",
            placeholders
        );
        let mut stmt = tx.prepare(&sql)?;

        let mut bind: Vec<String> = vec![category.to_string(), collection.to_string()];
        bind.extend(keys.iter().cloned());

        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| row.get::<_, String>(0))?;

        let mut existing = Vec::new();
        for row in rows {
            existing.push(row?);
        }
        Ok(existing)
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<MetadataRecord> {
    Ok(MetadataRecord {
        key: MetadataKey {
            category: row.get(0)?,
            collection: row.get(1)?,
            key: row.get(2)?,
            display_category: row.get(3)?,
            display_collection: row.get(4)?,
            display_key: row.get(5)?,
        },
        data: row.get(6)?,
        keywords: row.get(7)?,
    })
}

const RECORD_COLUMNS: &str = "category, collection, key, display_category, display_collection, \
                              display_key, metadata, keywords";

fn insert_record(tx: &Transaction, record: &MetadataRecord) -> Result<(), MetadataError> {
    tx.execute(
        "INSERT INTO key_value_data (category, collection, key, display_category, \
         display_collection, display_key, metadata, keywords) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.key.category(),
            record.key.collection(),
            record.key.key(),
            record.key.display_category(),
            record.key.display_collection(),
            record.key.display_key(),
            record.data,
            record.keywords,
        ],
    )?;
    Ok(())
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &MetadataKey) -> Result<Option<MetadataRecord>, MetadataError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM key_value_data WHERE category = ?1 AND collection = ?2 AND key = ?3",
            RECORD_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![key.category(), key.collection(), key.key()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn insert(&self, record: &MetadataRecord) -> Result<(), MetadataError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO key_value_data (category, collection, key, display_category, \
             display_collection, display_key, metadata, keywords) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.key.category(),
                record.key.collection(),
                record.key.key(),
                record.key.display_category(),
                record.key.display_collection(),
                record.key.display_key(),
                record.data,
                record.keywords,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            // Uniqueness is the conflict signal; no pre-check is done so two
            // concurrent inserts cannot both pass.
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                warn!(
                    "Key already exists in category: {} collection: {} key: {}",
                    record.key.display_category(),
                    record.key.display_collection(),
                    record.key.display_key()
                );
                Err(MetadataError::AlreadyExists {
                    keys: vec![record.key.display_key().to_string()],
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, record: &MetadataRecord) -> Result<(), MetadataError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE key_value_data SET metadata = ?1, keywords = ?2, display_category = ?3, \
             display_collection = ?4, display_key = ?5 \
             WHERE category = ?6 AND collection = ?7 AND key = ?8",
            params![
                record.data,
                record.keywords,
                record.key.display_category(),
                record.key.display_collection(),
                record.key.display_key(),
                record.key.category(),
                record.key.collection(),
                record.key.key(),
            ],
        )?;

        // Zero rows affected means the key vanished or never existed.
        if affected == 0 {
            return Err(MetadataError::NotFound {
                keys: vec![record.key.display_key().to_string()],
            });
        }
        Ok(())
    }

    fn delete(&self, key: &MetadataKey) -> Result<(), MetadataError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM key_value_data WHERE category = ?1 AND collection = ?2 AND key = ?3",
            params![key.category(), key.collection(), key.key()],
        )?;
        Ok(())
    }

    fn exists(&self, key: &MetadataKey) -> Result<bool, MetadataError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM key_value_data WHERE category = ?1 AND collection = ?2 AND key = ?3",
            params![key.category(), key.collection(), key.key()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn categories(&self) -> Result<Vec<String>, MetadataError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT display_category FROM key_value_data")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    fn collections(&self, category: &str) -> Result<Vec<String>, MetadataError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT DISTINCT display_collection FROM key_value_data WHERE category = ?1")?;
        let rows = stmt.query_map(params![normalize(category)], |row| row.get::<_, String>(0))?;

        let mut collections = Vec::new();
        for row in rows {
            collections.push(row?);
        }
        Ok(collections)
    }

    fn get_key_values(
        &self,
        category: &str,
        collection: &str,
        keyword: Option<&str>,
    ) -> Result<Vec<MetadataRecord>, MetadataError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM key_value_data WHERE category = ?1 AND collection = ?2",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![normalize(category), normalize(collection)], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            if keyword_matches(record.keywords.as_deref(), keyword) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn find_by_keys(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
        keyword: Option<&str>,
    ) -> Result<Vec<MetadataRecord>, MetadataError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().unwrap();
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM key_value_data WHERE category = ? AND collection = ? AND key IN ({})",
            RECORD_COLUMNS, placeholders
        );
        let mut stmt = conn.prepare(&sql)?;

        let mut bind: Vec<String> = vec![normalize(category), normalize(collection)];
        bind.extend(keys.iter().map(|k| normalize(k)));

        let rows = stmt.query_map(params_from_iter(bind.iter()), row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            if keyword_matches(record.keywords.as_deref(), keyword) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn bulk_insert(&self, records: &[MetadataRecord]) -> Result<Vec<String>, MetadataError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let category = records[0].key.category().to_string();
        let collection = records[0].key.collection().to_string();
        let keys: Vec<String> = records.iter().map(|r| r.key.key().to_string()).collect();
        let existing = Self::existing_keys(&tx, &category, &collection, &keys)?;

        if !existing.is_empty() {
            warn!(
                "Key(s) {} already exist(s) in category: '{}' collection: '{}'",
                existing.join(","),
                category,
                collection
            );
        }

        let mut conflicting = Vec::new();
        for record in records {
            if existing.iter().any(|k| k == record.key.key()) {
                conflicting.push(record.key.display_key().to_string());
            } else {
                insert_record(&tx, record)?;
            }
        }

        tx.commit()?;
        Ok(conflicting)
    }

    fn bulk_update_matched(&self, records: &[MetadataRecord]) -> Result<(), MetadataError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let category = records[0].key.category().to_string();
        let collection = records[0].key.collection().to_string();
        let keys: Vec<String> = records.iter().map(|r| r.key.key().to_string()).collect();
        let existing = Self::existing_keys(&tx, &category, &collection, &keys)?;

        let missing: Vec<String> = records
            .iter()
            .filter(|r| !existing.iter().any(|k| k == r.key.key()))
            .map(|r| r.key.display_key().to_string())
            .collect();

        // Validate completeness before touching any row; the transaction is
        // dropped without committing when any key is missing.
        if !missing.is_empty() {
            return Err(MetadataError::NotFound { keys: missing });
        }

        for record in records {
            let affected = tx.execute(
                "UPDATE key_value_data SET metadata = ?1, keywords = ?2, display_category = ?3, \
                 display_collection = ?4, display_key = ?5 \
                 WHERE category = ?6 AND collection = ?7 AND key = ?8",
                params![
                    record.data,
                    record.keywords,
                    record.key.display_category(),
                    record.key.display_collection(),
                    record.key.display_key(),
                    record.key.category(),
                    record.key.collection(),
                    record.key.key(),
                ],
            )?;
            // A key that disappears between validation and write fails the
            // whole transaction instead of being silently ignored.
            if affected == 0 {
                return Err(MetadataError::Storage(format!(
                    "key {} disappeared during bulk update",
                    record.key.display_key()
                )));
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn replace_collection(
        &self,
        category: &str,
        collection: &str,
        records: &[MetadataRecord],
    ) -> Result<(), MetadataError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM key_value_data WHERE category = ?1 AND collection = ?2",
            params![normalize(category), normalize(collection)],
        )?;

        for record in records {
            insert_record(&tx, record)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn bulk_delete(
        &self,
        category: &str,
        collection: &str,
        keys: &[String],
    ) -> Result<(), MetadataError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for key in keys {
            tx.execute(
                "DELETE FROM key_value_data WHERE category = ?1 AND collection = ?2 AND key = ?3",
                params![normalize(category), normalize(collection), normalize(key)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}
