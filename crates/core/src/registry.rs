//! Validation rule registry.
//!
//! Source of truth for which checks exist and whether each is active. The
//! rule set is read on every validation run and mutated rarely, so the
//! registry keeps a sorted snapshot in memory. Every mutation clears the
//! snapshot before it returns, so the next run always observes the change.
//! Mutations are serialized: each one reads the stored rule, edits it and
//! saves it while holding the mutation lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::CoreError;
use crate::rules::{
    default_rules, sort_rules, RuleCategory, RuleEdit, RuleRepository, ValidationRule,
};

pub struct RuleRegistry {
    repo: Arc<dyn RuleRepository>,
    cache: RwLock<Option<Arc<Vec<ValidationRule>>>>,
    mutation: Mutex<()>,
}

impl RuleRegistry {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self {
            repo,
            cache: RwLock::new(None),
            mutation: Mutex::new(()),
        }
    }

    /// Insert the default rule set for any default id not yet present.
    pub async fn seed_defaults(&self) -> Result<usize, CoreError> {
        let inserted = self
            .repo
            .insert_missing(&default_rules(chrono::Utc::now()))
            .await?;
        if inserted > 0 {
            self.invalidate().await;
            tracing::info!(inserted, "Seeded default validation rules");
        }
        Ok(inserted)
    }

    /// All rules, enabled and disabled, ordered by category then name.
    pub async fn list_rules(&self) -> Result<Vec<ValidationRule>, CoreError> {
        Ok(self.snapshot().await?.as_ref().clone())
    }

    pub async fn get(&self, rule_id: &str) -> Result<ValidationRule, CoreError> {
        self.snapshot()
            .await?
            .iter()
            .find(|r| r.id == rule_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("ValidationRule", rule_id))
    }

    /// All rules (enabled or not) in one category.
    pub async fn get_by_category(
        &self,
        category: RuleCategory,
    ) -> Result<Vec<ValidationRule>, CoreError> {
        Ok(self
            .snapshot()
            .await?
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }

    /// Enabled rules, narrowed to `category_filter` when given.
    pub async fn active_rules(
        &self,
        category_filter: Option<RuleCategory>,
    ) -> Result<Vec<ValidationRule>, CoreError> {
        Ok(self
            .snapshot()
            .await?
            .iter()
            .filter(|r| r.enabled)
            .filter(|r| category_filter.map_or(true, |c| r.category == c))
            .cloned()
            .collect())
    }

    /// Distinct categories among the active rules, in evaluation order.
    pub async fn active_categories(
        &self,
        category_filter: Option<RuleCategory>,
    ) -> Result<BTreeSet<RuleCategory>, CoreError> {
        Ok(self
            .active_rules(category_filter)
            .await?
            .into_iter()
            .map(|r| r.category)
            .collect())
    }

    pub async fn set_enabled(
        &self,
        rule_id: &str,
        enabled: bool,
    ) -> Result<ValidationRule, CoreError> {
        self.modify(rule_id, |rule| {
            rule.enabled = enabled;
            rule.updated_at = chrono::Utc::now();
        })
        .await
    }

    /// Flip the enabled flag.
    pub async fn toggle(&self, rule_id: &str) -> Result<ValidationRule, CoreError> {
        self.modify(rule_id, |rule| {
            rule.enabled = !rule.enabled;
            rule.updated_at = chrono::Utc::now();
        })
        .await
    }

    pub async fn update(
        &self,
        rule_id: &str,
        edit: &RuleEdit,
    ) -> Result<ValidationRule, CoreError> {
        edit.validate()?;
        self.modify(rule_id, |rule| edit.apply(rule, chrono::Utc::now())).await
    }

    async fn modify<F>(&self, rule_id: &str, change: F) -> Result<ValidationRule, CoreError>
    where
        F: FnOnce(&mut ValidationRule),
    {
        let _guard = self.mutation.lock().await;
        let mut rule = self.load(rule_id).await?;
        change(&mut rule);
        self.persist(rule).await
    }

    async fn load(&self, rule_id: &str) -> Result<ValidationRule, CoreError> {
        self.repo
            .find(rule_id)
            .await?
            .ok_or_else(|| CoreError::not_found("ValidationRule", rule_id))
    }

    async fn persist(&self, rule: ValidationRule) -> Result<ValidationRule, CoreError> {
        // Hold the cache write lock across the save so no reader can
        // repopulate the snapshot from pre-save state.
        let mut cache = self.cache.write().await;
        let saved = self.repo.save(&rule).await;
        *cache = None;
        drop(cache);

        if !saved? {
            return Err(CoreError::not_found("ValidationRule", &rule.id));
        }
        tracing::info!(rule_id = %rule.id, enabled = rule.enabled, "Validation rule updated");
        Ok(rule)
    }

    async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn snapshot(&self) -> Result<Arc<Vec<ValidationRule>>, CoreError> {
        if let Some(rules) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(rules));
        }

        let mut cache = self.cache.write().await;
        if let Some(rules) = cache.as_ref() {
            return Ok(Arc::clone(rules));
        }
        let mut rules = self.repo.list().await?;
        sort_rules(&mut rules);
        let rules = Arc::new(rules);
        *cache = Some(Arc::clone(&rules));
        Ok(rules)
    }
}
