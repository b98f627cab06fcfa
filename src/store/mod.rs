//! Survey API abstraction.
//!
//! The [`SurveyStore`] trait covers the three external collaborators the
//! console talks to: the schema provider, the reference list provider, and
//! the record store. Every persistent operation is one call; nothing is
//! retried or cached here.
//!
//! Implementations:
//! - [`http::HttpStore`] talks to the remote API over HTTP.
//! - [`memory::InMemoryStore`] keeps everything in process for tests.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Credentials, HouseholdRecord, NewHousehold, ReferenceCategory, ReferenceEntity, Schema,
    Section,
};

/// Abstract survey backend.
///
/// | Method | Endpoint family |
/// |--------|-----------------|
/// | [`login`](SurveyStore::login) | session |
/// | [`fetch_schema`](SurveyStore::fetch_schema), [`add_field`](SurveyStore::add_field), [`remove_field`](SurveyStore::remove_field) | schema |
/// | [`list_references`](SurveyStore::list_references), [`add_reference`](SurveyStore::add_reference), [`delete_reference`](SurveyStore::delete_reference) | reference entities |
/// | [`list_records`](SurveyStore::list_records), [`fetch_records`](SurveyStore::fetch_records), [`create_record`](SurveyStore::create_record), [`update_record`](SurveyStore::update_record), [`delete_records`](SurveyStore::delete_records) | records |
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn login(&self, credentials: &Credentials) -> Result<String>;

    async fn fetch_schema(&self) -> Result<Schema>;

    async fn add_field(&self, section: Section, name: &str) -> Result<()>;

    async fn remove_field(&self, section: Section, name: &str) -> Result<()>;

    async fn list_references(&self, category: ReferenceCategory) -> Result<Vec<ReferenceEntity>>;

    async fn add_reference(&self, category: ReferenceCategory, name: &str) -> Result<()>;

    async fn delete_reference(&self, category: ReferenceCategory, id: &str) -> Result<()>;

    async fn list_records(&self) -> Result<Vec<HouseholdRecord>>;

    /// Fetch one record or a batch. `ids` must already be de-duplicated;
    /// the whole batch goes out as a single request.
    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<HouseholdRecord>>;

    /// Create a household and return the server-generated id.
    async fn create_record(&self, record: &NewHousehold) -> Result<String>;

    /// Replace the record stored under `id`. Last write wins.
    async fn update_record(&self, id: &str, record: &HouseholdRecord) -> Result<()>;

    async fn delete_records(&self, ids: &[String]) -> Result<()>;
}
