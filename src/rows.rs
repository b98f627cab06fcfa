//! Family member rows: flattening households for tabular display, and the
//! filters that run over them.
//!
//! # Normalization
//!
//! [`normalize`] emits one row per family member, households in list order
//! and members in record order. A row is a copy of the member's attribute
//! map plus:
//!
//! - a whitespace-free alias for every schema family field
//!   (`"Marital Status"` is also readable as `MaritalStatus`);
//! - selected general-info attributes of the owning household, copied onto
//!   the row under [`OVERLAY_KEYS`];
//! - `userId`, the owning household id, and `id`, the member's `_id` or a
//!   random token when it has none.
//!
//! Rows are a read-only projection. Edits go through the household record.
//!
//! # Filtering
//!
//! [`filter_rows`] applies a case-insensitive substring search over every
//! string value, then the active [`Predicates`]. Every active predicate
//! must hold. Gotra is the exception in shape: it excludes rows whose gotra
//! equals the selected value.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{AttributeMap, HouseholdRecord};

pub const USER_ID_KEY: &str = "userId";
pub const ROW_ID_KEY: &str = "id";

/// Row key → general-info field copied from the owning household.
pub const OVERLAY_KEYS: &[(&str, &str)] = &[
    ("wardMuhallaName", "Ward/Muhalla Name"),
    ("District", "District"),
    ("Tehsil", "Tehsil"),
    ("Caste", "Caste"),
    ("SubCaste", "Sub Caste"),
    ("Gotra", "Gotra"),
    ("MonthlyIncome", "Monthly Income"),
];

/// Labeled inclusive range. `max: None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub label: &'static str,
    pub min: i64,
    pub max: Option<i64>,
}

impl Bucket {
    pub fn contains(&self, n: i64) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

pub const AGE_BUCKETS: &[Bucket] = &[
    Bucket { label: "0-18", min: 0, max: Some(18) },
    Bucket { label: "19-30", min: 19, max: Some(30) },
    Bucket { label: "31-50", min: 31, max: Some(50) },
    Bucket { label: "51+", min: 51, max: None },
];

pub const INCOME_BUCKETS: &[Bucket] = &[
    Bucket { label: "0-25000", min: 0, max: Some(25000) },
    Bucket { label: "25001-50000", min: 25001, max: Some(50000) },
    Bucket { label: "50001-100000", min: 50001, max: Some(100000) },
    Bucket { label: "100001+", min: 100001, max: None },
];

pub fn find_bucket(buckets: &[Bucket], label: &str) -> Option<Bucket> {
    buckets.iter().copied().find(|b| b.label == label)
}

/// One family member, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyMemberRow {
    pub values: AttributeMap,
}

impl FamilyMemberRow {
    pub fn user_id(&self) -> &str {
        self.values
            .get(USER_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn id(&self) -> &str {
        self.values
            .get(ROW_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn str_eq(&self, key: &str, expected: &str) -> bool {
        self.values.get(key).and_then(Value::as_str) == Some(expected)
    }
}

/// Field name with all whitespace removed.
pub fn compact_key(field: &str) -> String {
    field.chars().filter(|c| !c.is_whitespace()).collect()
}

fn random_row_id() -> String {
    Uuid::new_v4().simple().to_string()[..9].to_string()
}

fn member_row(
    household: &HouseholdRecord,
    member: &AttributeMap,
    family_fields: &[String],
) -> FamilyMemberRow {
    let mut values = member.clone();

    for field in family_fields {
        let key = compact_key(field);
        match member.get(field.as_str()) {
            Some(v) => {
                values.insert(key, v.clone());
            }
            None => {
                values.remove(&key);
            }
        }
    }

    if let Some(general) = household.general() {
        for (row_key, general_key) in OVERLAY_KEYS {
            match general.get(*general_key) {
                Some(v) => {
                    values.insert(row_key.to_string(), v.clone());
                }
                None => {
                    values.remove(*row_key);
                }
            }
        }
    }

    let row_id = member
        .get("_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(random_row_id);

    values.insert(USER_ID_KEY.to_string(), Value::String(household.id.clone()));
    values.insert(ROW_ID_KEY.to_string(), Value::String(row_id));
    FamilyMemberRow { values }
}

/// Flattens households into member rows, preserving order.
pub fn normalize(households: &[HouseholdRecord], family_fields: &[String]) -> Vec<FamilyMemberRow> {
    households
        .iter()
        .flat_map(|h| {
            h.family_members
                .iter()
                .map(move |m| member_row(h, m, family_fields))
        })
        .collect()
}

/// Filter selections. `None` and `""` are both inactive; an unknown bucket
/// label leaves its range filter inactive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates {
    pub ward: Option<String>,
    pub district: Option<String>,
    pub tehsil: Option<String>,
    pub caste: Option<String>,
    pub sub_caste: Option<String>,
    pub gotra_excluded: Option<String>,
    pub marital_status: Option<String>,
    pub gender: Option<String>,
    pub age_range: Option<String>,
    pub income_range: Option<String>,
}

fn active(selection: &Option<String>) -> Option<&str> {
    selection.as_deref().filter(|s| !s.is_empty())
}

impl Predicates {
    fn equalities(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("wardMuhallaName", active(&self.ward)),
            ("District", active(&self.district)),
            ("Tehsil", active(&self.tehsil)),
            ("Caste", active(&self.caste)),
            ("SubCaste", active(&self.sub_caste)),
            ("Marital Status", active(&self.marital_status)),
            ("Gender", active(&self.gender)),
        ]
    }

    /// Whether `row` passes every active predicate.
    pub fn matches(&self, row: &FamilyMemberRow) -> bool {
        for (key, expected) in self.equalities() {
            if let Some(expected) = expected {
                if !row.str_eq(key, expected) {
                    return false;
                }
            }
        }

        if let Some(gotra) = active(&self.gotra_excluded) {
            if row.str_eq("Gotra", gotra) {
                return false;
            }
        }

        let ranges = [
            ("Age", AGE_BUCKETS, &self.age_range),
            ("MonthlyIncome", INCOME_BUCKETS, &self.income_range),
        ];
        for (key, buckets, selection) in ranges {
            let Some(bucket) = active(selection).and_then(|l| find_bucket(buckets, l)) else {
                continue;
            };
            match row.get(key).and_then(leading_int) {
                Some(n) if bucket.contains(n) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Case-insensitive substring match over the row's string values. An empty
/// query matches everything.
pub fn matches_query(row: &FamilyMemberRow, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    row.values
        .values()
        .filter_map(Value::as_str)
        .any(|s| s.to_lowercase().contains(&needle))
}

/// Rows matching `query` and `predicates`, in input order.
pub fn filter_rows(
    rows: &[FamilyMemberRow],
    query: &str,
    predicates: &Predicates,
) -> Vec<FamilyMemberRow> {
    rows.iter()
        .filter(|r| matches_query(r, query) && predicates.matches(r))
        .cloned()
        .collect()
}

/// Leading-integer parse: optional leading whitespace, optional sign,
/// then digits; trailing text is ignored. No digits means no number.
/// Numbers are read through their decimal text, so `31.9` reads as 31.
pub fn leading_int(value: &Value) -> Option<i64> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    parse_leading_int(&text)
}

fn parse_leading_int(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].bytes().fold(0i64, |acc, b| {
        acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// Table column: row key and header text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub header: String,
}

/// Household id first, then one column per schema family field.
pub fn columns(family_fields: &[String]) -> Vec<Column> {
    std::iter::once(Column {
        key: USER_ID_KEY.to_string(),
        header: "ID".to_string(),
    })
    .chain(family_fields.iter().map(|f| Column {
        key: compact_key(f),
        header: f.clone(),
    }))
    .collect()
}

/// Household id → palette color. Households are numbered in first-seen
/// order and take `palette[i % palette.len()]`.
pub fn assign_family_colors(rows: &[FamilyMemberRow], palette: &[String]) -> HashMap<String, String> {
    let mut colors = HashMap::new();
    if palette.is_empty() {
        return colors;
    }
    for row in rows {
        let next = colors.len();
        colors
            .entry(row.user_id().to_string())
            .or_insert_with(|| palette[next % palette.len()].clone());
    }
    colors
}

/// Unique owning household ids of the selected rows, in row order.
pub fn parent_ids_for_selection(rows: &[FamilyMemberRow], selected: &[String]) -> Vec<String> {
    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|r| selected.contains(r.id()))
        .map(|r| r.user_id().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
