//! Add flow: assembling a draft household and submitting it.
//!
//! ```text
//! Editing ──preview──▶ Previewing ──submit──▶ Submitting ──▶ Succeeded(id)
//!    ▲                     │  ▲                   │
//!    └──────back───────────┘  └──────failure──────┘
//! ```
//!
//! A failed submit returns to `Previewing` with the draft untouched and the
//! error kept in [`AddFlow::last_error`]; creation is one request, so
//! nothing was partially written. On success the draft is reset.

use anyhow::{bail, Result};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ErrorClass};
use crate::form::{self, FAMILY_COUNT_FIELD};
use crate::models::{display_value, AttributeMap, NewHousehold, Schema, Section};
use crate::references::ReferenceLists;
use crate::shell;
use crate::store::SurveyStore;

/// In-progress household.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub general_info: AttributeMap,
    pub family_members: Vec<AttributeMap>,
    pub additional_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftState {
    Editing,
    Previewing,
    Submitting,
    Succeeded(String),
}

/// Sub-dialog collecting one member's attributes. Nothing reaches the draft
/// until [`AddFlow::commit_member`].
#[derive(Debug, Clone, Default)]
pub struct MemberDialog {
    values: AttributeMap,
}

impl MemberDialog {
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.values = form::with_field(&self.values, field, value);
    }

    pub fn values(&self) -> &AttributeMap {
        &self.values
    }
}

#[derive(Debug)]
pub struct AddFlow {
    draft: Draft,
    state: DraftState,
    last_error: Option<String>,
}

impl Default for AddFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl AddFlow {
    pub fn new() -> Self {
        Self {
            draft: Draft::default(),
            state: DraftState::Editing,
            last_error: None,
        }
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ensure_editing(&self) -> Result<(), ApiError> {
        match self.state {
            DraftState::Editing => Ok(()),
            _ => Err(ApiError::validation("the draft is not open for editing")),
        }
    }

    pub fn set_general(&mut self, field: &str, value: impl Into<Value>) -> Result<(), ApiError> {
        self.ensure_editing()?;
        self.draft.general_info = form::with_field(&self.draft.general_info, field, value);
        Ok(())
    }

    pub fn set_note(&mut self, note: &str) -> Result<(), ApiError> {
        self.ensure_editing()?;
        self.draft.additional_info = note.to_string();
        Ok(())
    }

    pub fn open_member(&self) -> MemberDialog {
        MemberDialog::default()
    }

    /// Appends the dialog's member in one step.
    pub fn commit_member(&mut self, dialog: MemberDialog) -> Result<(), ApiError> {
        self.ensure_editing()?;
        self.draft.family_members.push(dialog.values);
        Ok(())
    }

    pub fn remove_member(&mut self, index: usize) -> Result<AttributeMap, ApiError> {
        self.ensure_editing()?;
        if index >= self.draft.family_members.len() {
            return Err(ApiError::validation(format!(
                "no family member at position {}",
                index + 1
            )));
        }
        Ok(self.draft.family_members.remove(index))
    }

    /// Editing → Previewing. Empty fields are allowed.
    pub fn preview(&mut self) -> Result<(), ApiError> {
        self.ensure_editing()?;
        self.state = DraftState::Previewing;
        Ok(())
    }

    /// Previewing → Editing.
    pub fn back_to_editing(&mut self) {
        if self.state == DraftState::Previewing {
            self.state = DraftState::Editing;
        }
    }

    /// Starts a fresh draft after a successful submit.
    pub fn start_new(&mut self) {
        self.draft = Draft::default();
        self.state = DraftState::Editing;
        self.last_error = None;
    }

    /// Builds the create body. The member count overwrites whatever was
    /// typed into the count field, and is only added when the schema has
    /// that field.
    pub fn finalize(&self, schema: &Schema) -> NewHousehold {
        let count = self.draft.family_members.len();
        let general_info = if schema.contains(Section::GeneralInfo, FAMILY_COUNT_FIELD) {
            form::with_field(&self.draft.general_info, FAMILY_COUNT_FIELD, json!(count))
        } else {
            self.draft.general_info.clone()
        };
        NewHousehold {
            general_info,
            family_members: self.draft.family_members.clone(),
            additional_info: self.draft.additional_info.clone(),
            family_count: count,
        }
    }

    /// Sends the draft as one create request. Only valid while previewing.
    pub async fn submit(
        &mut self,
        store: &dyn SurveyStore,
        schema: &Schema,
    ) -> Result<String, ApiError> {
        if self.state != DraftState::Previewing {
            return Err(ApiError::validation("preview the draft before submitting"));
        }
        let body = self.finalize(schema);
        self.state = DraftState::Submitting;
        debug!(members = body.family_count, "submitting new household");

        match store.create_record(&body).await {
            Ok(id) => {
                self.draft = Draft::default();
                self.last_error = None;
                self.state = DraftState::Succeeded(id.clone());
                Ok(id)
            }
            Err(e) => {
                self.last_error = Some(ErrorClass::mutation("save user data").report(&e));
                self.state = DraftState::Previewing;
                Err(e)
            }
        }
    }
}

/// Parses `"Name=Sita;Age=31"` into field/value pairs.
pub fn parse_member_spec(spec: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for part in spec.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some(pos) = part.find('=') else {
            bail!("invalid member entry '{}': expected FIELD=VALUE", part);
        };
        pairs.push((part[..pos].trim().to_string(), part[pos + 1..].to_string()));
    }
    Ok(pairs)
}

/// Prints the preview of what will be submitted.
pub fn print_preview(body: &NewHousehold, schema: &Schema, currency: &str) {
    println!("Preview");
    println!("General Information:");
    for field in &schema.general_info {
        let value = body
            .general_info
            .get(field.as_str())
            .map(display_value)
            .unwrap_or_default();
        let shown = if !value.is_empty() && field == "Monthly Income" {
            format!("{}{}", currency, value)
        } else {
            value
        };
        println!("  {}: {}", field, shown);
    }
    println!("Family Members ({}):", body.family_count);
    for (i, member) in body.family_members.iter().enumerate() {
        let cells: Vec<String> = schema
            .family_members
            .iter()
            .map(|f| {
                format!(
                    "{}={}",
                    f.trim(),
                    member.get(f.as_str()).map(display_value).unwrap_or_default()
                )
            })
            .collect();
        println!("  {}. {}", i + 1, cells.join(", "));
    }
    println!("Additional Information: {}", body.additional_info);
}

/// Operator input for `census add`.
#[derive(Debug, Default)]
pub struct AddArgs {
    pub general: Vec<(String, String)>,
    pub members: Vec<String>,
    pub note: Option<String>,
    pub yes: bool,
}

/// Fills a draft from the command line, previews it, asks for confirmation,
/// and submits.
pub async fn run_add(
    store: &dyn SurveyStore,
    schema: &Schema,
    references: &ReferenceLists,
    args: AddArgs,
    currency: &str,
) -> Result<()> {
    let mut flow = AddFlow::new();

    for (field, value) in &args.general {
        let field = form::schema_field_name(schema, Section::GeneralInfo, field);
        form::validate_entry(schema, Section::GeneralInfo, references, &field, value)?;
        flow.set_general(&field, value.as_str())?;
    }
    for spec in &args.members {
        let mut dialog = flow.open_member();
        for (field, value) in parse_member_spec(spec)? {
            let field = form::schema_field_name(schema, Section::FamilyMembers, &field);
            form::validate_entry(schema, Section::FamilyMembers, references, &field, &value)?;
            dialog.set(&field, value);
        }
        flow.commit_member(dialog)?;
    }
    if let Some(note) = &args.note {
        flow.set_note(note)?;
    }

    flow.preview()?;
    print_preview(&flow.finalize(schema), schema, currency);

    if !shell::confirm("Submit this household?", args.yes)? {
        flow.back_to_editing();
        println!("Not submitted.");
        return Ok(());
    }

    match flow.submit(store, schema).await {
        Ok(id) => {
            println!("User added successfully! Registered ID: {}", id);
            Ok(())
        }
        Err(_) => bail!(
            "{}",
            flow.last_error()
                .unwrap_or("Failed to save user data. Please try again.")
        ),
    }
}
