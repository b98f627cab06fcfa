//! Update flow: fetch one household, change it, send the whole record back.
//!
//! The record round-trips through [`HouseholdRecord`], so keys the console
//! does not know about (old schema fields, server bookkeeping) go back to
//! the server exactly as they came. Concurrent edits are not guarded: the
//! last write wins.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use tracing::debug;

use crate::error::{mutation_failure, ApiError};
use crate::form;
use crate::models::{display_value, AttributeMap, HouseholdRecord, Schema, Section};
use crate::references::ReferenceLists;
use crate::store::SurveyStore;

pub const LOAD_FAILED: &str = "User not found or server error.";

#[derive(Debug, Clone)]
pub struct EditSession {
    id: String,
    record: HouseholdRecord,
}

impl EditSession {
    /// Fetches the household being edited.
    pub async fn open(store: &dyn SurveyStore, id: &str) -> Result<Self, ApiError> {
        let mut records = store.fetch_records(&[id.to_string()]).await?;
        if records.is_empty() {
            return Err(ApiError::NotFound(format!("household {}", id)));
        }
        Ok(Self {
            id: id.to_string(),
            record: records.swap_remove(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn record(&self) -> &HouseholdRecord {
        &self.record
    }

    /// Rewrites the single general-info map, creating it when absent.
    pub fn set_general(&mut self, field: &str, value: impl Into<Value>) {
        let next = form::with_field(self.record.general_mut(), field, value);
        *self.record.general_mut() = next;
    }

    pub fn set_member_field(
        &mut self,
        index: usize,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), ApiError> {
        let member = self
            .record
            .family_members
            .get_mut(index)
            .ok_or_else(|| no_member(index))?;
        *member = form::with_field(member, field, value);
        Ok(())
    }

    pub fn remove_member(&mut self, index: usize) -> Result<(), ApiError> {
        if index >= self.record.family_members.len() {
            return Err(no_member(index));
        }
        self.record.family_members.remove(index);
        Ok(())
    }

    pub fn set_note(&mut self, note: &str) {
        self.record.additional_info = note.to_string();
    }

    /// Sends the whole record, keyed by id.
    pub async fn submit(&self, store: &dyn SurveyStore) -> Result<(), ApiError> {
        debug!(id = %self.id, "updating household");
        store.update_record(&self.id, &self.record).await
    }
}

fn no_member(index: usize) -> ApiError {
    ApiError::validation(format!("no family member at position {}", index + 1))
}

/// Operator input for `census edit`. Member positions are 1-based.
#[derive(Debug, Default)]
pub struct EditArgs {
    pub set: Vec<(String, String)>,
    pub member_set: Vec<String>,
    pub remove_member: Vec<usize>,
    pub note: Option<String>,
}

/// Parses `"2:Age=31"` into a 0-based member index, field, and value.
pub fn parse_member_assignment(spec: &str) -> Result<(usize, String, String)> {
    let (pos, rest) = spec
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid member edit '{}': expected N:FIELD=VALUE", spec))?;
    let position: usize = pos
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid member position '{}'", pos))?;
    if position == 0 {
        bail!("member positions start at 1");
    }
    let (field, value) = rest
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid member edit '{}': expected N:FIELD=VALUE", spec))?;
    Ok((position - 1, field.trim().to_string(), value.to_string()))
}

/// Checks an edit against the schema. Keys the record already carries are
/// accepted even when the schema no longer lists them, and so is the value
/// the record already holds.
fn check_entry(
    schema: &Schema,
    section: Section,
    references: &ReferenceLists,
    current: Option<&Value>,
    field: &str,
    value: &str,
) -> Result<(), ApiError> {
    if let Some(current) = current {
        if !schema.contains(section, field) || display_value(current) == value {
            return Ok(());
        }
    }
    form::validate_entry(schema, section, references, field, value)
}

/// Spelling of `name` in the schema, else among the keys already present.
fn field_name(
    schema: &Schema,
    section: Section,
    present: Option<&AttributeMap>,
    name: &str,
) -> String {
    form::resolve_field(schema.fields(section), name)
        .or_else(|| present.and_then(|m| form::resolve_field(m.keys(), name)))
        .unwrap_or(name)
        .to_string()
}

pub async fn run_edit(
    store: &dyn SurveyStore,
    schema: &Schema,
    references: &ReferenceLists,
    id: &str,
    args: EditArgs,
) -> Result<()> {
    let mut session = EditSession::open(store, id)
        .await
        .map_err(|_| anyhow!(LOAD_FAILED))?;

    for (field, value) in &args.set {
        let general = session.record().general();
        let field = field_name(schema, Section::GeneralInfo, general, field);
        let current = general.and_then(|g| g.get(field.as_str()));
        check_entry(schema, Section::GeneralInfo, references, current, &field, value)?;
        session.set_general(&field, value.as_str());
    }

    for spec in &args.member_set {
        let (index, field, value) = parse_member_assignment(spec)?;
        let member = session.record().family_members.get(index);
        let field = field_name(schema, Section::FamilyMembers, member, &field);
        let current = member.and_then(|m| m.get(field.as_str()));
        check_entry(schema, Section::FamilyMembers, references, current, &field, &value)?;
        session.set_member_field(index, &field, value)?;
    }

    let mut removals: Vec<usize> = args.remove_member.iter().map(|p| p.saturating_sub(1)).collect();
    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for index in removals {
        session.remove_member(index)?;
    }

    if let Some(note) = &args.note {
        session.set_note(note);
    }

    session
        .submit(store)
        .await
        .map_err(|e| mutation_failure(e, "update user"))?;
    println!("Household {} updated successfully!", session.id());
    Ok(())
}
