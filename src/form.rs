//! Form composer: one control per schema field.
//!
//! The control kind for a field comes from a fixed dispatch table keyed by
//! field name. The table is data; [`compose`] walks the schema's field list
//! in order and looks each name up, so fields added to or removed from the
//! schema show up (or disappear) on the next fetch with no code change.
//!
//! Edits never mutate a map in place: [`with_field`] returns a new map with
//! one key replaced and every other key preserved.

use anyhow::Result;
use serde_json::Value;

use crate::error::ApiError;
use crate::models::{display_value, AttributeMap, ReferenceCategory, Schema, Section};
use crate::references::ReferenceLists;

/// Field whose value is derived from the member list at submit time.
pub const FAMILY_COUNT_FIELD: &str = "Number of Family Members";

/// Formula behind a read-only derived control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    FamilyMemberCount,
}

/// How a field is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    FreeText,
    /// Free-text entry decorated with a currency prefix. The stored value is
    /// an unconstrained string.
    Numeric { prefix: String },
    FixedChoice {
        options: &'static [&'static str],
        default: Option<&'static str>,
    },
    LookupChoice(ReferenceCategory),
    ReadOnlyDerived(Derivation),
}

enum Rule {
    Fixed(&'static [&'static str], Option<&'static str>),
    Lookup(ReferenceCategory),
    Derived(Derivation),
    Currency,
}

const YES_NO: &[&str] = &["Yes", "No"];

const RELATIONS: &[&str] = &[
    "Self",
    "Father",
    "Mother",
    "Wife",
    "Son",
    "Daughter",
    "Niece/Nephew",
    "Grandson",
    "Granddaughter",
    "Grandfather",
    "Grandmother",
];

/// Field name → rule. Names are matched exactly, including the trailing
/// space some server-side field names carry.
const DISPATCH: &[(&str, Rule)] = &[
    (
        "Job Type (Private/Govt)",
        Rule::Fixed(&["Private", "Government", "Other"], None),
    ),
    ("Specially Abled (true/false)", Rule::Fixed(YES_NO, Some("No"))),
    ("Specially Abled ", Rule::Fixed(YES_NO, Some("No"))),
    ("Gender", Rule::Fixed(&["Male", "Female"], None)),
    ("Relation", Rule::Fixed(RELATIONS, None)),
    (
        "Marital Status",
        Rule::Fixed(&["Married", "Single", "Divorced"], None),
    ),
    ("Ward/Muhalla Name", Rule::Lookup(ReferenceCategory::Ward)),
    ("Education", Rule::Lookup(ReferenceCategory::Education)),
    ("Caste", Rule::Lookup(ReferenceCategory::Caste)),
    ("Sub Caste", Rule::Lookup(ReferenceCategory::SubCaste)),
    ("Gotra", Rule::Lookup(ReferenceCategory::Gotra)),
    ("District", Rule::Lookup(ReferenceCategory::District)),
    ("Tehsil", Rule::Lookup(ReferenceCategory::Tehsil)),
    (
        FAMILY_COUNT_FIELD,
        Rule::Derived(Derivation::FamilyMemberCount),
    ),
    ("Monthly Income", Rule::Currency),
];

/// Control kind for `field`. Names missing from the dispatch table are
/// plain free text.
pub fn control_kind(field: &str, currency: &str) -> ControlKind {
    match DISPATCH.iter().find(|(name, _)| *name == field) {
        Some((_, Rule::Fixed(options, default))) => ControlKind::FixedChoice {
            options: *options,
            default: *default,
        },
        Some((_, Rule::Lookup(category))) => ControlKind::LookupChoice(*category),
        Some((_, Rule::Derived(d))) => ControlKind::ReadOnlyDerived(*d),
        Some((_, Rule::Currency)) => ControlKind::Numeric {
            prefix: currency.to_string(),
        },
        None => ControlKind::FreeText,
    }
}

/// One rendered control.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldControl {
    pub field: String,
    pub kind: ControlKind,
    /// Current value as text; absent keys render as the control's default
    /// or "".
    pub value: String,
    /// Choice options, empty for free-text and derived controls. A lookup
    /// whose list failed to load has no options.
    pub options: Vec<String>,
}

impl FieldControl {
    pub fn is_editable(&self) -> bool {
        !matches!(self.kind, ControlKind::ReadOnlyDerived(_))
    }

    /// Checks that `value` is acceptable for this control.
    ///
    /// Fixed choices must match an option. Lookup choices are only checked
    /// when the list loaded; an empty list accepts anything.
    pub fn validate(&self, value: &str) -> Result<(), ApiError> {
        match &self.kind {
            ControlKind::ReadOnlyDerived(_) => Err(ApiError::validation(format!(
                "'{}' is derived and cannot be edited",
                self.field
            ))),
            ControlKind::FixedChoice { .. } | ControlKind::LookupChoice(_)
                if !self.options.is_empty() && !self.options.iter().any(|o| o == value) =>
            {
                Err(ApiError::validation(format!(
                    "'{}' is not a valid {}; expected one of: {}",
                    value,
                    self.field,
                    self.options.join(", ")
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Builds the controls for `fields` in order.
///
/// `member_count` feeds derived controls; `values` holds the draft or
/// record being edited. Keys in `values` that are not in `fields` are
/// ignored here and left untouched in the map.
pub fn compose(
    fields: &[String],
    values: &AttributeMap,
    references: &ReferenceLists,
    member_count: usize,
    currency: &str,
) -> Vec<FieldControl> {
    fields
        .iter()
        .map(|field| {
            let kind = control_kind(field, currency);
            let current = values.get(field.as_str()).map(display_value);
            let (value, options) = match &kind {
                ControlKind::FixedChoice { options, default } => (
                    current
                        .filter(|v| !v.is_empty())
                        .or_else(|| default.map(str::to_string))
                        .unwrap_or_default(),
                    options.iter().map(|o| o.to_string()).collect(),
                ),
                ControlKind::LookupChoice(category) => {
                    (current.unwrap_or_default(), references.names(*category))
                }
                ControlKind::ReadOnlyDerived(Derivation::FamilyMemberCount) => {
                    (member_count.to_string(), Vec::new())
                }
                ControlKind::FreeText | ControlKind::Numeric { .. } => {
                    (current.unwrap_or_default(), Vec::new())
                }
            };
            FieldControl {
                field: field.clone(),
                kind,
                value,
                options,
            }
        })
        .collect()
}

/// Returns a copy of `map` with `field` set to `value`.
pub fn with_field(map: &AttributeMap, field: &str, value: impl Into<Value>) -> AttributeMap {
    let mut next = map.clone();
    next.insert(field.to_string(), value.into());
    next
}

/// Validates an operator-supplied `field=value` against the schema section.
///
/// Unknown fields and derived fields are rejected before any request.
pub fn validate_entry(
    schema: &Schema,
    section: Section,
    references: &ReferenceLists,
    field: &str,
    value: &str,
) -> Result<(), ApiError> {
    if !schema.contains(section, field) {
        return Err(ApiError::validation(format!(
            "unknown field '{}' in {}",
            field,
            section.label()
        )));
    }
    let controls = compose(
        &[field.to_string()],
        &AttributeMap::new(),
        references,
        0,
        "",
    );
    match controls.first() {
        Some(control) => control.validate(value),
        None => Ok(()),
    }
}

/// Finds the declared field an operator-typed `name` refers to. An exact
/// match wins; otherwise names are compared with surrounding whitespace
/// removed, so `Specially Abled` finds `"Specially Abled "`.
pub fn resolve_field<'a>(
    declared: impl IntoIterator<Item = &'a String>,
    name: &str,
) -> Option<&'a str> {
    let mut trimmed = None;
    for field in declared {
        if field == name {
            return Some(field);
        }
        if trimmed.is_none() && field.trim() == name.trim() {
            trimmed = Some(field.as_str());
        }
    }
    trimmed
}

/// The schema's spelling of `name` in `section`, or `name` unchanged.
pub fn schema_field_name(schema: &Schema, section: Section, name: &str) -> String {
    resolve_field(schema.fields(section), name)
        .unwrap_or(name)
        .to_string()
}

/// Text rendering of one control, e.g. `Gender [Male | Female]: Male`.
pub fn render_control(control: &FieldControl) -> String {
    let shown = match &control.kind {
        ControlKind::Numeric { prefix } if !control.value.is_empty() => {
            format!("{}{}", prefix, control.value)
        }
        _ => control.value.clone(),
    };
    let hint = match &control.kind {
        ControlKind::FreeText => String::new(),
        ControlKind::Numeric { prefix } => format!(" ({})", prefix),
        ControlKind::FixedChoice { .. } => format!(" [{}]", control.options.join(" | ")),
        ControlKind::LookupChoice(category) if control.options.is_empty() => {
            format!(" [{}: no options]", category)
        }
        ControlKind::LookupChoice(_) => format!(" [{}]", control.options.join(" | ")),
        ControlKind::ReadOnlyDerived(_) => " (derived)".to_string(),
    };
    format!("{}{}: {}", control.field, hint, shown)
}

pub fn print_controls(title: &str, controls: &[FieldControl]) {
    println!("{}", title);
    if controls.is_empty() {
        println!("  (no fields)");
    }
    for control in controls {
        println!("  {}", render_control(control));
    }
}

/// Prints the blank add form for both sections.
pub fn run_form(schema: &Schema, references: &ReferenceLists, currency: &str) -> Result<()> {
    let empty = AttributeMap::new();
    for section in [Section::GeneralInfo, Section::FamilyMembers] {
        let controls = compose(schema.fields(section), &empty, references, 0, currency);
        print_controls(section.label(), &controls);
    }
    if !schema.additional_info.is_empty() {
        println!("Note: {}", schema.additional_info);
    }
    Ok(())
}
