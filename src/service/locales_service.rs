//! Locale management service
//!
//! Owns the single-default invariant: there is at most one default locale,
//! a default handoff is atomic, and a locale may only become the default
//! once it covers every key the current default covers.

use crate::audit::AuditDataType;
use crate::cache::CacheInvalidation;
use crate::localization::{Locale, LocalesError, LocalizationStore, PromotionOutcome};
use crate::service::audit_service::AuditService;
use log::info;
use std::sync::Arc;

pub struct LocalesService {
    store: Arc<dyn LocalizationStore>,
    audit: Arc<AuditService>,
    cache: Arc<dyn CacheInvalidation>,
}

impl LocalesService {
    pub fn new(
        store: Arc<dyn LocalizationStore>,
        audit: Arc<AuditService>,
        cache: Arc<dyn CacheInvalidation>,
    ) -> Self {
        Self { store, audit, cache }
    }

    pub fn get_all(&self) -> Result<Vec<Locale>, LocalesError> {
        self.store.get_all_locales()
    }

    pub fn get_default(&self) -> Result<Locale, LocalesError> {
        self.store
            .get_default_locale()?
            .ok_or(LocalesError::DoesNotExist)
    }

    /// Create or update a locale.
    ///
    /// The default flag is constrained: the current default cannot be
    /// demoted directly (a handoff to another locale demotes it), and
    /// promoting a locale requires full key coverage first.
    pub fn upsert(
        &self,
        locale: Locale,
        user_name: &str,
        correlation_id: &str,
    ) -> Result<(), LocalesError> {
        locale.validate()?;

        let existing = self.store.get_locale(&locale.id)?;
        let default = self.store.get_default_locale()?;

        // First locale in an empty system; honor the flag as given.
        if existing.is_none() && default.is_none() {
            self.store.insert_locale(&locale)?;
            self.audit_locale(correlation_id, user_name, Some(&locale), None)?;
            self.cache.invalidate_all();
            info!("Created locale '{}'", locale.id);
            return Ok(());
        }

        if let Some(current) = &existing {
            if current.is_default {
                if !locale.is_default {
                    return Err(LocalesError::CannotDeleteDefaultLocale);
                }
                // Re-asserting the current default changes nothing.
                return Ok(());
            }
        }

        if locale.is_default {
            if let Some(old_default) = &default {
                let missing_keys = self.store.missing_keys(&locale.id)?;
                if !missing_keys.is_empty() {
                    return Err(LocalesError::CannotSetLocaleAsDefault { missing_keys });
                }

                let outcome = self.store.promote_default(Some(&old_default.id), &locale)?;

                let demoted = Locale { id: old_default.id.clone(), is_default: false };
                self.audit_locale(correlation_id, user_name, Some(&demoted), Some(old_default))?;
                match outcome {
                    PromotionOutcome::Inserted => {
                        self.audit_locale(correlation_id, user_name, Some(&locale), None)?
                    }
                    PromotionOutcome::Updated => self.audit_locale(
                        correlation_id,
                        user_name,
                        Some(&locale),
                        existing.as_ref(),
                    )?,
                }

                self.cache.invalidate_all();
                info!(
                    "Promoted locale '{}' to default, demoting '{}'",
                    locale.id, old_default.id
                );
                return Ok(());
            }
        }

        match &existing {
            Some(old) => {
                self.store.update_locale(&locale)?;
                self.audit_locale(correlation_id, user_name, Some(&locale), Some(old))?;
                info!("Updated locale '{}'", locale.id);
            }
            None => {
                self.store.insert_locale(&locale)?;
                self.audit_locale(correlation_id, user_name, Some(&locale), None)?;
                info!("Created locale '{}'", locale.id);
            }
        }
        self.cache.invalidate_all();
        Ok(())
    }

    /// Delete a locale. The default locale is never deletable, and that
    /// guard takes precedence over the reference guard.
    pub fn delete(
        &self,
        id: &str,
        user_name: &str,
        correlation_id: &str,
    ) -> Result<(), LocalesError> {
        let existing = self
            .store
            .get_locale(id)?
            .ok_or(LocalesError::DoesNotExist)?;

        if existing.is_default {
            return Err(LocalesError::CannotDeleteDefaultLocale);
        }
        if self.store.has_any_localized_values(id)? {
            return Err(LocalesError::CannotDeleteLocaleInUse);
        }

        self.store.delete_locale(id)?;
        self.audit_locale(correlation_id, user_name, None, Some(&existing))?;
        self.cache.invalidate_all();
        info!("Deleted locale '{}'", id);
        Ok(())
    }

    fn audit_locale(
        &self,
        correlation_id: &str,
        user_name: &str,
        new_state: Option<&Locale>,
        old_state: Option<&Locale>,
    ) -> Result<(), LocalesError> {
        let reference = new_state
            .or(old_state)
            .map(|l| l.id.clone())
            .unwrap_or_default();
        let serialize = |l: Option<&Locale>| -> Result<Option<String>, LocalesError> {
            l.map(|l| serde_json::to_string(l))
                .transpose()
                .map_err(|e| LocalesError::Storage(e.to_string()))
        };

        self.audit.record(
            correlation_id,
            user_name,
            &reference,
            AuditDataType::Locale,
            serialize(new_state)?,
            serialize(old_state)?,
        )?;
        Ok(())
    }
}
