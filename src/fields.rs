//! Schema loading and management.
//!
//! The schema is never patched locally: after every add or remove it is
//! fetched again, so the console always shows what the server holds.

use anyhow::Result;
use tracing::warn;

use crate::error::{mutation_failure, ApiError, ErrorClass};
use crate::models::{Schema, Section};
use crate::store::SurveyStore;

/// Fetches the schema, degrading to an empty one on failure.
pub async fn load_schema(store: &dyn SurveyStore) -> Schema {
    match store.fetch_schema().await {
        Ok(schema) => schema,
        Err(e) => {
            warn!("{}", ErrorClass::DegradedRead.report(&e));
            Schema::default()
        }
    }
}

/// Adds `name` to `section` and returns the refetched schema.
///
/// Rejected locally when the name is blank or already present in
/// `current`.
pub async fn add_field(
    store: &dyn SurveyStore,
    current: &Schema,
    section: Section,
    name: &str,
) -> Result<Schema, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("Field name cannot be empty"));
    }
    if current.contains(section, name) {
        return Err(ApiError::validation(format!(
            "Field already exists in {}",
            section.label()
        )));
    }
    store.add_field(section, name).await?;
    Ok(load_schema(store).await)
}

/// Removes `name` from `section` and returns the refetched schema.
pub async fn remove_field(
    store: &dyn SurveyStore,
    section: Section,
    name: &str,
) -> Result<Schema, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("Field name cannot be empty"));
    }
    store.remove_field(section, name).await?;
    Ok(load_schema(store).await)
}

fn print_schema(schema: &Schema) {
    for section in [Section::GeneralInfo, Section::FamilyMembers] {
        println!("{}:", section.label());
        let fields = schema.fields(section);
        if fields.is_empty() {
            println!("  (none)");
        }
        for (i, field) in fields.iter().enumerate() {
            println!("  {:>2}. {:?}", i + 1, field);
        }
    }
    println!("Additional information placeholder: {:?}", schema.additional_info);
}

pub async fn run_fields_list(store: &dyn SurveyStore) -> Result<()> {
    let schema = load_schema(store).await;
    print_schema(&schema);
    Ok(())
}

pub async fn run_fields_add(store: &dyn SurveyStore, section: Section, name: &str) -> Result<()> {
    let current = load_schema(store).await;
    let schema = add_field(store, &current, section, name)
        .await
        .map_err(|e| mutation_failure(e, &format!("add field '{}'", name)))?;
    println!(
        "Field '{}' added to {} successfully!",
        name,
        section.label()
    );
    print_schema(&schema);
    Ok(())
}

pub async fn run_fields_remove(
    store: &dyn SurveyStore,
    section: Section,
    name: &str,
) -> Result<()> {
    let schema = remove_field(store, section, name)
        .await
        .map_err(|e| mutation_failure(e, &format!("remove field '{}'", name)))?;
    println!(
        "Field '{}' removed from {} successfully!",
        name,
        section.label()
    );
    print_schema(&schema);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn schema() -> Schema {
        Schema {
            general_info: vec!["Head of Family".into(), "Caste".into()],
            family_members: vec!["Name".into(), "Age".into()],
            additional_info: "Notes".into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_field_rejected_locally() {
        let store = InMemoryStore::with_schema(schema());
        let err = add_field(&store, &schema(), Section::GeneralInfo, "Caste")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Field already exists in General Information");

        let err = add_field(&store, &schema(), Section::FamilyMembers, "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Field name cannot be empty");
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn test_add_and_remove_refetch_schema() {
        let store = InMemoryStore::with_schema(schema());
        let updated = add_field(&store, &schema(), Section::FamilyMembers, "Gender")
            .await
            .unwrap();
        assert_eq!(updated.family_members, vec!["Name", "Age", "Gender"]);

        let updated = remove_field(&store, Section::FamilyMembers, "Age")
            .await
            .unwrap();
        assert_eq!(updated.family_members, vec!["Name", "Gender"]);
        assert_eq!(
            store.requests(),
            vec!["add_field Gender", "fetch_schema", "remove_field Age", "fetch_schema"]
        );
    }

    #[tokio::test]
    async fn test_schema_failure_degrades_to_empty() {
        let store = InMemoryStore::with_schema(schema());
        store.fail_on("fetch_schema");
        assert_eq!(load_schema(&store).await, Schema::default());
    }
}
