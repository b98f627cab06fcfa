//! Core data models shared by the store, the form composer, and the views.
//!
//! Attribute maps are untyped: the keys a record carries depend on the
//! schema that was current when it was written, so nothing here assumes a
//! fixed set of fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// String-keyed attribute dictionary, kept in server key order.
pub type AttributeMap = serde_json::Map<String, Value>;

/// Record section whose field list the schema declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    GeneralInfo,
    FamilyMembers,
}

impl Section {
    /// Category string used by the schema endpoints.
    pub fn category(&self) -> &'static str {
        match self {
            Section::GeneralInfo => "generalInfo",
            Section::FamilyMembers => "familyMembers",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Section::GeneralInfo => "General Information",
            Section::FamilyMembers => "Family Members",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" | "generalInfo" | "general-info" => Ok(Section::GeneralInfo),
            "family" | "familyMembers" | "family-members" => Ok(Section::FamilyMembers),
            other => Err(format!(
                "unknown section '{}': expected general or family",
                other
            )),
        }
    }
}

/// Server-declared field names per record section, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub general_info: Vec<String>,
    #[serde(default)]
    pub family_members: Vec<String>,
    /// Placeholder label for the free-text note.
    #[serde(default, deserialize_with = "string_or_null")]
    pub additional_info: String,
}

impl Schema {
    pub fn fields(&self, section: Section) -> &[String] {
        match section {
            Section::GeneralInfo => &self.general_info,
            Section::FamilyMembers => &self.family_members,
        }
    }

    pub fn contains(&self, section: Section, field: &str) -> bool {
        self.fields(section).iter().any(|f| f == field)
    }
}

/// Lookup category backing a choice control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceCategory {
    Ward,
    Education,
    Caste,
    SubCaste,
    Gotra,
    District,
    Tehsil,
}

impl ReferenceCategory {
    pub const ALL: [ReferenceCategory; 7] = [
        ReferenceCategory::Ward,
        ReferenceCategory::Education,
        ReferenceCategory::Caste,
        ReferenceCategory::SubCaste,
        ReferenceCategory::Gotra,
        ReferenceCategory::District,
        ReferenceCategory::Tehsil,
    ];

    /// Path segment under `/api/`.
    pub fn segment(&self) -> &'static str {
        match self {
            ReferenceCategory::Ward => "wards",
            ReferenceCategory::Education => "education",
            ReferenceCategory::Caste => "caste",
            ReferenceCategory::SubCaste => "subcaste",
            ReferenceCategory::Gotra => "gotra",
            ReferenceCategory::District => "district",
            ReferenceCategory::Tehsil => "tehsil",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceCategory::Ward => "Ward",
            ReferenceCategory::Education => "Education",
            ReferenceCategory::Caste => "Caste",
            ReferenceCategory::SubCaste => "Sub Caste",
            ReferenceCategory::Gotra => "Gotra",
            ReferenceCategory::District => "District",
            ReferenceCategory::Tehsil => "Tehsil",
        }
    }
}

impl fmt::Display for ReferenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReferenceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ward" | "wards" => Ok(ReferenceCategory::Ward),
            "education" => Ok(ReferenceCategory::Education),
            "caste" => Ok(ReferenceCategory::Caste),
            "sub-caste" | "subcaste" | "sub_caste" => Ok(ReferenceCategory::SubCaste),
            "gotra" => Ok(ReferenceCategory::Gotra),
            "district" => Ok(ReferenceCategory::District),
            "tehsil" => Ok(ReferenceCategory::Tehsil),
            other => Err(format!(
                "unknown category '{}': expected ward, education, caste, sub-caste, gotra, district, or tehsil",
                other
            )),
        }
    }
}

/// Named lookup value. Records store `name`, never `id`.
///
/// The key is read from `_id`, falling back to `id`; a payload may carry
/// both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireReference")]
pub struct ReferenceEntity {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
struct WireReference {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    name: String,
}

impl From<WireReference> for ReferenceEntity {
    fn from(wire: WireReference) -> Self {
        ReferenceEntity {
            id: wire.mongo_id.or(wire.id).unwrap_or_default(),
            name: wire.name,
        }
    }
}

/// Persisted household: one general-info map, ordered members, a note.
///
/// `general_info` is a list on the wire and always serializes as exactly one
/// map. Keys the server sends that this type does not name are kept in
/// `extra` and written back unchanged.
///
/// The key is `_id`. A bare `id` is used only when `_id` is absent; when
/// both are present `id` stays in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireHousehold")]
pub struct HouseholdRecord {
    #[serde(rename = "_id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(serialize_with = "general_info_to_wire")]
    pub general_info: Vec<AttributeMap>,
    pub family_members: Vec<AttributeMap>,
    pub additional_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: AttributeMap,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHousehold {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default, deserialize_with = "general_info_from_wire")]
    general_info: Vec<AttributeMap>,
    #[serde(default)]
    family_members: Vec<AttributeMap>,
    #[serde(default, deserialize_with = "string_or_null")]
    additional_info: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(flatten)]
    extra: AttributeMap,
}

impl From<WireHousehold> for HouseholdRecord {
    fn from(mut wire: WireHousehold) -> Self {
        let id = match wire.mongo_id {
            Some(id) => id,
            None => match wire.extra.remove("id") {
                Some(Value::String(id)) => id,
                Some(other) => {
                    wire.extra.insert("id".to_string(), other);
                    String::new()
                }
                None => String::new(),
            },
        };
        HouseholdRecord {
            id,
            general_info: wire.general_info,
            family_members: wire.family_members,
            additional_info: wire.additional_info,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            extra: wire.extra,
        }
    }
}

impl HouseholdRecord {
    /// The general-info map, if the record has one.
    pub fn general(&self) -> Option<&AttributeMap> {
        self.general_info.first()
    }

    /// Mutable general-info map, creating it when absent. Anything past the
    /// first element is dropped so the record stays a one-element list.
    pub fn general_mut(&mut self) -> &mut AttributeMap {
        if self.general_info.is_empty() {
            self.general_info.push(AttributeMap::new());
        }
        self.general_info.truncate(1);
        &mut self.general_info[0]
    }

    /// Value of a general-info attribute rendered as text.
    pub fn general_value(&self, field: &str) -> String {
        self.general()
            .and_then(|g| g.get(field))
            .map(display_value)
            .unwrap_or_default()
    }

    pub fn created_at_display(&self) -> String {
        format_timestamp(self.created_at.as_deref())
    }

    pub fn updated_at_display(&self) -> String {
        format_timestamp(self.updated_at.as_deref())
    }
}

/// Create request body for a new household.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHousehold {
    #[serde(serialize_with = "single_map_as_list")]
    pub general_info: AttributeMap,
    pub family_members: Vec<AttributeMap>,
    pub additional_info: String,
    pub family_count: usize,
}

/// Login credential pair.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Renders an attribute value as display text; absent and null become "".
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn format_timestamp(raw: Option<&str>) -> String {
    match raw {
        Some(ts) => chrono::DateTime::parse_from_rfc3339(ts)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| ts.to_string()),
        None => "-".to_string(),
    }
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn general_info_from_wire<'de, D>(deserializer: D) -> Result<Vec<AttributeMap>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        List(Vec<AttributeMap>),
        Bare(AttributeMap),
        Null(()),
    }

    Ok(match Wire::deserialize(deserializer)? {
        Wire::List(list) => list,
        Wire::Bare(map) => vec![map],
        Wire::Null(()) => Vec::new(),
    })
}

fn general_info_to_wire<S>(list: &[AttributeMap], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let empty = AttributeMap::new();
    single_map_as_list(list.first().unwrap_or(&empty), serializer)
}

fn single_map_as_list<S>(map: &AttributeMap, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    [map].serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_general_info_bare_map_is_wrapped() {
        let rec: HouseholdRecord = serde_json::from_value(json!({
            "_id": "5",
            "generalInfo": { "District": "Agra" },
            "familyMembers": [],
            "additionalInfo": null
        }))
        .unwrap();
        assert_eq!(rec.general_info.len(), 1);
        assert_eq!(rec.general_value("District"), "Agra");
        assert_eq!(rec.additional_info, "");

        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["generalInfo"], json!([{ "District": "Agra" }]));
    }

    #[test]
    fn test_round_trip_keeps_unknown_keys() {
        let wire = json!({
            "_id": "abc",
            "generalInfo": [{ "Head": "Ram", "Old Field": 4 }],
            "familyMembers": [{ "Name": "Sita", "Age": "31" }],
            "additionalInfo": "note",
            "createdAt": "2024-01-02T03:04:05.000Z",
            "updatedAt": "2024-01-03T03:04:05.000Z",
            "__v": 0
        });
        let rec: HouseholdRecord = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(rec.extra.get("__v"), Some(&json!(0)));
        assert_eq!(serde_json::to_value(&rec).unwrap(), wire);
    }

    #[test]
    fn test_record_with_both_id_keys() {
        let wire = json!({
            "_id": "a",
            "id": "a",
            "generalInfo": [{}],
            "familyMembers": []
        });
        let rec: HouseholdRecord = serde_json::from_value(wire).unwrap();
        assert_eq!(rec.id, "a");
        assert_eq!(rec.extra.get("id"), Some(&json!("a")));

        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["_id"], json!("a"));
        assert_eq!(out["id"], json!("a"));

        let rec: HouseholdRecord =
            serde_json::from_value(json!({ "id": "b", "familyMembers": [] })).unwrap();
        assert_eq!(rec.id, "b");
        assert!(rec.extra.is_empty());
    }

    #[test]
    fn test_general_mut_keeps_single_element() {
        let mut rec = HouseholdRecord::default();
        rec.general_mut().insert("Caste".into(), json!("X"));
        assert_eq!(rec.general_info.len(), 1);

        rec.general_info.push(AttributeMap::new());
        rec.general_mut();
        assert_eq!(rec.general_info.len(), 1);
        assert_eq!(rec.general_value("Caste"), "X");
    }

    #[test]
    fn test_empty_general_serializes_as_one_empty_map() {
        let rec = HouseholdRecord::default();
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["generalInfo"], json!([{}]));
        assert!(out.get("_id").is_none());
    }

    #[test]
    fn test_new_household_wraps_general_info() {
        let mut general = AttributeMap::new();
        general.insert("Ward/Muhalla Name".into(), json!("Ward 3"));
        let body = NewHousehold {
            general_info: general,
            family_members: vec![AttributeMap::new()],
            additional_info: String::new(),
            family_count: 1,
        };
        let out = serde_json::to_value(&body).unwrap();
        assert_eq!(out["generalInfo"], json!([{ "Ward/Muhalla Name": "Ward 3" }]));
        assert_eq!(out["familyCount"], json!(1));
    }

    #[test]
    fn test_reference_entity_accepts_mongo_id() {
        let e: ReferenceEntity =
            serde_json::from_value(json!({ "_id": "w1", "name": "Ward 1", "__v": 0 })).unwrap();
        assert_eq!(e.id, "w1");
        assert_eq!(e.name, "Ward 1");
    }

    #[test]
    fn test_reference_entity_with_both_id_keys() {
        let e: ReferenceEntity =
            serde_json::from_value(json!({ "_id": "w1", "id": "w1", "name": "Ward 1" })).unwrap();
        assert_eq!(e.id, "w1");
        let e: ReferenceEntity =
            serde_json::from_value(json!({ "id": "w2", "name": "Ward 2" })).unwrap();
        assert_eq!(e.id, "w2");
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("sub-caste".parse::<ReferenceCategory>(), Ok(ReferenceCategory::SubCaste));
        assert_eq!("Wards".parse::<ReferenceCategory>(), Ok(ReferenceCategory::Ward));
        assert!("village".parse::<ReferenceCategory>().is_err());
        assert_eq!(ReferenceCategory::SubCaste.segment(), "subcaste");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!(null)), "");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!("x")), "x");
    }
}
