//! In-memory [`SurveyStore`] implementation for tests and offline demos.
//!
//! Uses `Vec` and `BTreeMap` behind `std::sync::RwLock`. Every call is
//! appended to a request log so tests can assert how many round-trips an
//! operation made, and individual operations can be forced to fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::error::{ApiError, Result};
use crate::models::{
    Credentials, HouseholdRecord, NewHousehold, ReferenceCategory, ReferenceEntity, Schema,
    Section,
};

use super::SurveyStore;

/// In-memory survey backend.
pub struct InMemoryStore {
    schema: RwLock<Schema>,
    references: RwLock<BTreeMap<ReferenceCategory, Vec<ReferenceEntity>>>,
    records: RwLock<Vec<HouseholdRecord>>,
    accounts: RwLock<Vec<(String, String)>>,
    failing: RwLock<HashSet<String>>,
    requests: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            schema: RwLock::new(Schema::default()),
            references: RwLock::new(BTreeMap::new()),
            records: RwLock::new(Vec::new()),
            accounts: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_schema(schema: Schema) -> Self {
        let store = Self::new();
        *store.schema.write().unwrap() = schema;
        store
    }

    pub fn add_account(&self, username: &str, password: &str) {
        self.accounts
            .write()
            .unwrap()
            .push((username.to_string(), password.to_string()));
    }

    /// Adds a reference entity without logging a request. Returns its id.
    pub fn seed_reference(&self, category: ReferenceCategory, name: &str) -> String {
        let id = format!("{}-{}", category.segment(), self.fresh_id());
        self.references
            .write()
            .unwrap()
            .entry(category)
            .or_default()
            .push(ReferenceEntity {
                id: id.clone(),
                name: name.to_string(),
            });
        id
    }

    /// Stores `record` as-is, assigning an id when it has none.
    pub fn seed_record(&self, mut record: HouseholdRecord) -> String {
        if record.id.is_empty() {
            record.id = self.fresh_id().to_string();
        }
        let id = record.id.clone();
        self.records.write().unwrap().push(record);
        id
    }

    /// Makes every later call of `operation` fail with a 500.
    ///
    /// Operation names match the first word of the request log, e.g.
    /// `"create_record"` or `"list_references"`.
    pub fn fail_on(&self, operation: &str) {
        self.failing.write().unwrap().insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.write().unwrap().clear();
    }

    /// Log of calls made so far, e.g. `"fetch_records 5,7"`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn record(&self, id: &str) -> Option<HouseholdRecord> {
        self.records
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn begin(&self, operation: &str, detail: &str) -> Result<()> {
        let entry = if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{} {}", operation, detail)
        };
        self.requests.lock().unwrap().push(entry);

        if self.failing.read().unwrap().contains(operation) {
            return Err(ApiError::Server {
                status: 500,
                message: format!("{} unavailable", operation),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl SurveyStore for InMemoryStore {
    async fn login(&self, credentials: &Credentials) -> Result<String> {
        self.begin("login", &credentials.username)?;
        let known = self
            .accounts
            .read()
            .unwrap()
            .iter()
            .any(|(u, p)| *u == credentials.username && *p == credentials.password);
        if !known {
            return Err(ApiError::Server {
                status: 401,
                message: "Invalid credentials".to_string(),
            });
        }
        Ok(format!("token-{}-{}", credentials.username, self.fresh_id()))
    }

    async fn fetch_schema(&self) -> Result<Schema> {
        self.begin("fetch_schema", "")?;
        Ok(self.schema.read().unwrap().clone())
    }

    async fn add_field(&self, section: Section, name: &str) -> Result<()> {
        self.begin("add_field", name)?;
        let mut schema = self.schema.write().unwrap();
        let list = match section {
            Section::GeneralInfo => &mut schema.general_info,
            Section::FamilyMembers => &mut schema.family_members,
        };
        if !list.iter().any(|f| f == name) {
            list.push(name.to_string());
        }
        Ok(())
    }

    async fn remove_field(&self, section: Section, name: &str) -> Result<()> {
        self.begin("remove_field", name)?;
        let mut schema = self.schema.write().unwrap();
        let list = match section {
            Section::GeneralInfo => &mut schema.general_info,
            Section::FamilyMembers => &mut schema.family_members,
        };
        list.retain(|f| f != name);
        Ok(())
    }

    async fn list_references(&self, category: ReferenceCategory) -> Result<Vec<ReferenceEntity>> {
        self.begin("list_references", category.segment())?;
        Ok(self
            .references
            .read()
            .unwrap()
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_reference(&self, category: ReferenceCategory, name: &str) -> Result<()> {
        self.begin("add_reference", category.segment())?;
        self.seed_reference(category, name);
        Ok(())
    }

    async fn delete_reference(&self, category: ReferenceCategory, id: &str) -> Result<()> {
        self.begin("delete_reference", id)?;
        let mut refs = self.references.write().unwrap();
        let list = refs.entry(category).or_default();
        let before = list.len();
        list.retain(|e| e.id != id);
        if list.len() == before {
            return Err(ApiError::NotFound(format!("{} {}", category, id)));
        }
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<HouseholdRecord>> {
        self.begin("list_records", "")?;
        Ok(self.records.read().unwrap().clone())
    }

    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<HouseholdRecord>> {
        self.begin("fetch_records", &ids.join(","))?;
        let records = self.records.read().unwrap();
        ids.iter()
            .map(|id| {
                records
                    .iter()
                    .find(|r| &r.id == id)
                    .cloned()
                    .ok_or_else(|| ApiError::NotFound(format!("household {}", id)))
            })
            .collect()
    }

    async fn create_record(&self, record: &NewHousehold) -> Result<String> {
        self.begin("create_record", "")?;
        let id = self.fresh_id().to_string();
        let now = now_iso();
        self.records.write().unwrap().push(HouseholdRecord {
            id: id.clone(),
            general_info: vec![record.general_info.clone()],
            family_members: record.family_members.clone(),
            additional_info: record.additional_info.clone(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
            extra: Default::default(),
        });
        Ok(id)
    }

    async fn update_record(&self, id: &str, record: &HouseholdRecord) -> Result<()> {
        self.begin("update_record", id)?;
        let mut records = self.records.write().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("household {}", id)))?;
        let created_at = slot.created_at.clone();
        *slot = record.clone();
        slot.id = id.to_string();
        slot.created_at = created_at;
        slot.updated_at = Some(now_iso());
        Ok(())
    }

    async fn delete_records(&self, ids: &[String]) -> Result<()> {
        self.begin("delete_records", &ids.join(","))?;
        self.records
            .write()
            .unwrap()
            .retain(|r| !ids.contains(&r.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_logs_one_request_per_batch() {
        let store = InMemoryStore::new();
        let a = store.seed_record(HouseholdRecord::default());
        let b = store.seed_record(HouseholdRecord::default());

        let got = store.fetch_records(&[a.clone(), b.clone()]).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(store.requests(), vec![format!("fetch_records {},{}", a, b)]);
    }

    #[tokio::test]
    async fn test_fail_on_blocks_operation() {
        let store = InMemoryStore::new();
        store.fail_on("list_records");
        assert!(store.list_records().await.is_err());
        store.clear_failures();
        assert!(store.list_records().await.is_ok());
    }

    #[tokio::test]
    async fn test_login_checks_accounts() {
        let store = InMemoryStore::new();
        store.add_account("admin", "secret");
        let ok = Credentials {
            username: "admin".into(),
            password: "secret".into(),
        };
        assert!(store.login(&ok).await.unwrap().starts_with("token-admin"));

        let bad = Credentials {
            username: "admin".into(),
            password: "nope".into(),
        };
        let err = store.login(&bad).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}
