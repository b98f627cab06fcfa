//! Reference entity lists (ward, education, caste, ...).
//!
//! Lists are read-only data for choice controls and filters: a failed fetch
//! is logged and the category degrades to an empty list. Management calls
//! validate locally, send one request, and then refetch the whole list.

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{mutation_failure, ApiError, ErrorClass};
use crate::models::{ReferenceCategory, ReferenceEntity};
use crate::store::SurveyStore;

/// Current entities per category, as last fetched.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLists {
    lists: BTreeMap<ReferenceCategory, Vec<ReferenceEntity>>,
}

impl ReferenceLists {
    pub fn entities(&self, category: ReferenceCategory) -> &[ReferenceEntity] {
        self.lists.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Option values for a choice control: entity names in server order.
    pub fn names(&self, category: ReferenceCategory) -> Vec<String> {
        self.entities(category)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn set(&mut self, category: ReferenceCategory, entities: Vec<ReferenceEntity>) {
        self.lists.insert(category, entities);
    }
}

/// Fetches one category, degrading to an empty list on failure.
pub async fn load_category(
    store: &dyn SurveyStore,
    category: ReferenceCategory,
) -> Vec<ReferenceEntity> {
    match store.list_references(category).await {
        Ok(list) => list,
        Err(e) => {
            warn!(
                category = %category,
                "{}",
                ErrorClass::DegradedRead.report(&e)
            );
            Vec::new()
        }
    }
}

/// Fetches every category concurrently. Each result lands in its own slot,
/// so completion order does not matter.
pub async fn load_all(store: &dyn SurveyStore) -> ReferenceLists {
    use ReferenceCategory::*;

    let (ward, education, caste, sub_caste, gotra, district, tehsil) = tokio::join!(
        load_category(store, Ward),
        load_category(store, Education),
        load_category(store, Caste),
        load_category(store, SubCaste),
        load_category(store, Gotra),
        load_category(store, District),
        load_category(store, Tehsil),
    );

    let mut lists = ReferenceLists::default();
    lists.set(Ward, ward);
    lists.set(Education, education);
    lists.set(Caste, caste);
    lists.set(SubCaste, sub_caste);
    lists.set(Gotra, gotra);
    lists.set(District, district);
    lists.set(Tehsil, tehsil);
    lists
}

/// Adds an entity and returns the refetched list. Empty names are rejected
/// before any request.
pub async fn add_reference(
    store: &dyn SurveyStore,
    category: ReferenceCategory,
    name: &str,
) -> Result<Vec<ReferenceEntity>, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation(format!(
            "{} name cannot be empty",
            category.label()
        )));
    }
    store.add_reference(category, name).await?;
    Ok(load_category(store, category).await)
}

/// Deletes an entity by id and returns the refetched list.
pub async fn delete_reference(
    store: &dyn SurveyStore,
    category: ReferenceCategory,
    id: &str,
) -> Result<Vec<ReferenceEntity>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::validation(format!(
            "{} id cannot be empty",
            category.label()
        )));
    }
    store.delete_reference(category, id).await?;
    Ok(load_category(store, category).await)
}

fn print_entities(category: ReferenceCategory, entities: &[ReferenceEntity]) {
    if entities.is_empty() {
        println!("No {} entries.", category.label());
        return;
    }
    println!("{:<28} NAME", "ID");
    for e in entities {
        println!("{:<28} {}", e.id, e.name);
    }
}

pub async fn run_refs_list(store: &dyn SurveyStore, category: ReferenceCategory) -> Result<()> {
    let entities = load_category(store, category).await;
    print_entities(category, &entities);
    Ok(())
}

pub async fn run_refs_add(
    store: &dyn SurveyStore,
    category: ReferenceCategory,
    name: &str,
) -> Result<()> {
    let entities = add_reference(store, category, name)
        .await
        .map_err(|e| mutation_failure(e, &format!("add {}", category.label())))?;
    println!("{} added successfully!", category.label());
    print_entities(category, &entities);
    Ok(())
}

pub async fn run_refs_delete(
    store: &dyn SurveyStore,
    category: ReferenceCategory,
    id: &str,
) -> Result<()> {
    let entities = delete_reference(store, category, id)
        .await
        .map_err(|e| mutation_failure(e, &format!("delete {}", category.label())))?;
    println!("{} deleted successfully!", category.label());
    print_entities(category, &entities);
    Ok(())
}
