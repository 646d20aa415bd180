//! SQLite implementation of the LocalizationStore trait

use crate::localization::{
    Locale, LocalesError, LocalizationStore, LocalizedValue, LocalizedValuesError,
    PromotionOutcome,
};
use crate::pagination::PaginatedResponse;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

/// SQLite implementation of LocalizationStore.
pub struct SqliteLocalizationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLocalizationStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

fn row_to_locale(row: &Row) -> rusqlite::Result<Locale> {
    Ok(Locale {
        id: row.get(0)?,
        is_default: row.get(1)?,
    })
}

fn row_to_value(row: &Row) -> rusqlite::Result<LocalizedValue> {
    Ok(LocalizedValue {
        locale: row.get(0)?,
        key: row.get(1)?,
        value: row.get(2)?,
    })
}

impl LocalizationStore for SqliteLocalizationStore {
    fn get_locale(&self, id: &str) -> Result<Option<Locale>, LocalesError> {
        let conn = self.conn.lock().unwrap();
        let locale = conn
            .query_row(
                "SELECT id, is_default FROM locales WHERE id = ?1",
                params![id],
                row_to_locale,
            )
            .optional()?;
        Ok(locale)
    }

    fn get_all_locales(&self) -> Result<Vec<Locale>, LocalesError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, is_default FROM locales ORDER BY id")?;
        let rows = stmt.query_map([], row_to_locale)?;

        let mut locales = Vec::new();
        for row in rows {
            locales.push(row?);
        }
        Ok(locales)
    }

    fn get_default_locale(&self) -> Result<Option<Locale>, LocalesError> {
        let conn = self.conn.lock().unwrap();
        let locale = conn
            .query_row(
                "SELECT id, is_default FROM locales WHERE is_default = 1",
                [],
                row_to_locale,
            )
            .optional()?;
        Ok(locale)
    }

    fn insert_locale(&self, locale: &Locale) -> Result<(), LocalesError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO locales (id, is_default) VALUES (?1, ?2)",
            params![locale.id, locale.is_default],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LocalesError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_locale(&self, locale: &Locale) -> Result<(), LocalesError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE locales SET is_default = ?1 WHERE id = ?2",
            params![locale.is_default, locale.id],
        )?;

        if affected == 0 {
            return Err(LocalesError::DoesNotExist);
        }
        Ok(())
    }

    fn delete_locale(&self, id: &str) -> Result<(), LocalesError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM locales WHERE id = ?1", params![id])?;

        if affected == 0 {
            return Err(LocalesError::DoesNotExist);
        }
        Ok(())
    }

    fn promote_default(
        &self,
        old_default_id: Option<&str>,
        locale: &Locale,
    ) -> Result<PromotionOutcome, LocalesError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        if let Some(old_id) = old_default_id {
            tx.execute(
                "UPDATE locales SET is_default = 0 WHERE id = ?1",
                params![old_id],
            )?;
        }

        let existed: i64 = tx.query_row(
            "SELECT COUNT(*) FROM locales WHERE id = ?1",
            params![locale.id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO locales (id, is_default) VALUES (?1, 1) \
             ON CONFLICT(id) DO UPDATE SET is_default = 1",
            params![locale.id],
        )?;

        tx.commit()?;

        Ok(if existed > 0 {
            PromotionOutcome::Updated
        } else {
            PromotionOutcome::Inserted
        })
    }

    fn has_any_localized_values(&self, locale_id: &str) -> Result<bool, LocalesError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM localized_values WHERE locale = ?1",
            params![locale_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_value(
        &self,
        locale: &str,
        key: &str,
    ) -> Result<Option<LocalizedValue>, LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT locale, key, value FROM localized_values WHERE locale = ?1 AND key = ?2",
                params![locale, key],
                row_to_value,
            )
            .optional()?;
        Ok(value)
    }

    fn add_value(&self, value: &LocalizedValue) -> Result<(), LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO localized_values (locale, key, value) VALUES (?1, ?2, ?3)",
            params![value.locale, value.key, value.value],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LocalizedValuesError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_value(&self, value: &LocalizedValue) -> Result<(), LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE localized_values SET value = ?1 WHERE locale = ?2 AND key = ?3",
            params![value.value, value.locale, value.key],
        )?;

        if affected == 0 {
            return Err(LocalizedValuesError::DoesNotExist);
        }
        Ok(())
    }

    fn delete_value(&self, locale: &str, key: &str) -> Result<(), LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "DELETE FROM localized_values WHERE locale = ?1 AND key = ?2",
            params![locale, key],
        )?;

        if affected == 0 {
            return Err(LocalizedValuesError::DoesNotExist);
        }
        Ok(())
    }

    fn get_by_locale(&self, locale: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT locale, key, value FROM localized_values WHERE locale = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![locale], row_to_value)?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn get_all_by_key(&self, key: &str) -> Result<Vec<LocalizedValue>, LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT locale, key, value FROM localized_values WHERE key = ?1 ORDER BY locale",
        )?;
        let rows = stmt.query_map(params![key], row_to_value)?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn missing_keys(&self, locale_id: &str) -> Result<Vec<String>, LocalesError> {
        let conn = self.conn.lock().unwrap();
        // Set difference: keys valued under the default locale that have no
        // value under the candidate locale.
        let mut stmt = conn.prepare(
            "SELECT lv.key FROM localized_values lv \
             JOIN locales l ON lv.locale = l.id \
             WHERE l.is_default = 1 \
               AND lv.key NOT IN (SELECT key FROM localized_values WHERE locale = ?1) \
             ORDER BY lv.key",
        )?;
        let rows = stmt.query_map(params![locale_id], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn get_all_values(
        &self,
        skip: usize,
        take: usize,
    ) -> Result<PaginatedResponse<LocalizedValue>, LocalizedValuesError> {
        let conn = self.conn.lock().unwrap();

        let total_size: i64 =
            conn.query_row("SELECT COUNT(DISTINCT key) FROM localized_values", [], |row| {
                row.get(0)
            })?;

        let mut values = Vec::new();
        if take > 0 {
            let mut keys_stmt = conn.prepare(
                "SELECT DISTINCT key FROM localized_values ORDER BY key LIMIT ?1 OFFSET ?2",
            )?;
            let key_rows =
                keys_stmt.query_map(params![take as i64, skip as i64], |row| row.get::<_, String>(0))?;

            let mut keys = Vec::new();
            for row in key_rows {
                keys.push(row?);
            }

            if !keys.is_empty() {
                let placeholders = vec!["?"; keys.len()].join(", ");
                let sql = format!(
                    "SELECT locale, key, value FROM localized_values WHERE key IN ({}) \
                     ORDER BY key, locale",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(keys.iter()), row_to_value)?;
                for row in rows {
                    values.push(row?);
                }
            }
        } else {
            let mut stmt = conn
                .prepare("SELECT locale, key, value FROM localized_values ORDER BY key, locale")?;
            let rows = stmt.query_map([], row_to_value)?;
            for row in rows {
                values.push(row?);
            }
        }

        Ok(PaginatedResponse::new(values, skip, total_size as usize))
    }
}
