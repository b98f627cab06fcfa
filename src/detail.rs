//! Detail view over one or more households.
//!
//! Ids arrive as typed (`"5"` or `"5,7"`), are de-duplicated in order, and
//! go out as one request. The loaded set then backs two presentations:
//! paginated (one household, bounded prev/next) and scrollable (every
//! household, one per printed page). Switching modes never refetches.

use anyhow::{anyhow, bail, Result};

use crate::edit::LOAD_FAILED;
use crate::models::{display_value, HouseholdRecord};
use crate::store::SurveyStore;

pub const BATCH_LOAD_FAILED: &str = "Error fetching users.";

/// Separator between households in scrollable output.
pub const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewMode {
    Paginated,
    Scrollable,
}

/// Splits a comma-separated id list, trimming entries and dropping empty
/// ones and repeats. First occurrence wins.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[derive(Debug, Clone)]
pub struct DetailView {
    records: Vec<HouseholdRecord>,
    index: usize,
    mode: ViewMode,
}

impl DetailView {
    pub fn new(records: Vec<HouseholdRecord>) -> Self {
        Self {
            records,
            index: 0,
            mode: ViewMode::Paginated,
        }
    }

    /// Fetches the households named in `raw`. A failure is a blocking
    /// message in place of the view.
    pub async fn load(store: &dyn SurveyStore, raw: &str) -> Result<Self> {
        let ids = parse_id_list(raw);
        if ids.is_empty() {
            bail!("no household id given");
        }
        let failure = if ids.len() > 1 {
            BATCH_LOAD_FAILED
        } else {
            LOAD_FAILED
        };
        let records = store
            .fetch_records(&ids)
            .await
            .map_err(|_| anyhow!(failure))?;
        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[HouseholdRecord] {
        &self.records
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&HouseholdRecord> {
        self.records.get(self.index)
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.records.len()
    }

    /// Moves forward; false (and no move) at the last household.
    pub fn next(&mut self) -> bool {
        if self.has_next() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.has_prev() {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps to 0-based `index`, clamped to the loaded set.
    pub fn go_to(&mut self, index: usize) {
        self.index = index.min(self.records.len().saturating_sub(1));
    }

    pub fn position_label(&self) -> String {
        format!("Household {} of {}", self.index + 1, self.records.len())
    }

    /// Text for the current mode.
    pub fn render(&self, currency: &str) -> String {
        match self.mode {
            ViewMode::Paginated => {
                let Some(record) = self.current() else {
                    return String::new();
                };
                let mut out = render_household(record, currency);
                let prev = if self.has_prev() { "prev" } else { "    " };
                let next = if self.has_next() { "next" } else { "    " };
                out.push_str(&format!("\n[{}]  {}  [{}]\n", prev, self.position_label(), next));
                out
            }
            ViewMode::Scrollable => self
                .records
                .iter()
                .map(|r| render_household(r, currency))
                .collect::<Vec<_>>()
                .join(&PAGE_BREAK.to_string()),
        }
    }
}

/// One household as text. General keys come from the record itself and
/// member columns from the first member, so old keys still show.
pub fn render_household(record: &HouseholdRecord, currency: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Household {}\n", record.id));
    out.push_str("General Information\n");
    if let Some(general) = record.general() {
        for (key, value) in general {
            let text = display_value(value);
            if key == "Monthly Income" {
                out.push_str(&format!("  {}: {} {}\n", key, currency, text));
            } else {
                out.push_str(&format!("  {}: {}\n", key, text));
            }
        }
    }

    out.push_str("Family Members Information\n");
    if let Some(first) = record.family_members.first() {
        let columns: Vec<&String> = first.keys().collect();
        out.push_str(&format!(
            "  {}\n",
            columns
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(" | ")
        ));
        for member in &record.family_members {
            let cells: Vec<String> = columns
                .iter()
                .map(|c| member.get(c.as_str()).map(display_value).unwrap_or_default())
                .collect();
            out.push_str(&format!("  {}\n", cells.join(" | ")));
        }
    }

    let note = if record.additional_info == "N/A" {
        "No additional information provided"
    } else {
        record.additional_info.as_str()
    };
    out.push_str(&format!("Additional Information: {}\n", note));
    out.push_str(&format!("Created At: {}\n", record.created_at_display()));
    out.push_str(&format!("Updated At: {}\n", record.updated_at_display()));
    out
}

/// `census show`: `position` is 1-based and only used when paginated.
pub async fn run_show(
    store: &dyn SurveyStore,
    raw_ids: &str,
    mode: ViewMode,
    position: usize,
    currency: &str,
) -> Result<()> {
    let mut view = DetailView::load(store, raw_ids).await?;
    if view.records().is_empty() {
        println!("No households found.");
        return Ok(());
    }
    view.set_mode(mode);
    view.go_to(position.saturating_sub(1));
    print!("{}", view.render(currency));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use serde_json::json;

    fn record(id: &str, head: &str) -> HouseholdRecord {
        serde_json::from_value(json!({
            "_id": id,
            "generalInfo": [{ "Head": head, "Monthly Income": "5000" }],
            "familyMembers": [{ "Name": head, "Age": "40" }, { "Name": "Kid" }],
            "additionalInfo": "N/A"
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_id_list_dedups_in_order() {
        assert_eq!(parse_id_list("5,5,7,7"), vec!["5", "7"]);
        assert_eq!(parse_id_list(" 7 , 5,7,"), vec!["7", "5"]);
        assert_eq!(parse_id_list("9"), vec!["9"]);
        assert!(parse_id_list(" , ").is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ids_fetch_once() {
        let store = InMemoryStore::new();
        store.seed_record(record("5", "Ram"));
        store.seed_record(record("7", "Shyam"));

        let view = DetailView::load(&store, "5,5,7,7").await.unwrap();
        assert_eq!(view.records().len(), 2);
        assert_eq!(store.requests(), vec!["fetch_records 5,7"]);
    }

    #[tokio::test]
    async fn test_navigation_is_bounded_and_mode_switch_keeps_set() {
        let store = InMemoryStore::new();
        store.seed_record(record("5", "Ram"));
        store.seed_record(record("7", "Shyam"));
        let mut view = DetailView::load(&store, "5,7").await.unwrap();

        assert!(!view.prev());
        assert_eq!(view.position_label(), "Household 1 of 2");
        assert!(view.next());
        assert!(!view.next());
        assert_eq!(view.position_label(), "Household 2 of 2");

        view.set_mode(ViewMode::Scrollable);
        let text = view.render("₹");
        assert_eq!(text.matches(PAGE_BREAK).count(), 1);
        view.set_mode(ViewMode::Paginated);
        assert_eq!(view.current().map(|r| r.id.as_str()), Some("7"));
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_messages() {
        let store = InMemoryStore::new();
        let err = DetailView::load(&store, "404").await.unwrap_err();
        assert_eq!(err.to_string(), LOAD_FAILED);

        let err = DetailView::load(&store, "1,2").await.unwrap_err();
        assert_eq!(err.to_string(), BATCH_LOAD_FAILED);
    }

    #[test]
    fn test_render_household() {
        let text = render_household(&record("5", "Ram"), "₹");
        assert!(text.contains("Monthly Income: ₹ 5000"));
        assert!(text.contains("Name | Age"));
        assert!(text.contains("Kid | \n"));
        assert!(text.contains("No additional information provided"));
        assert!(text.contains("Created At: -"));
    }

    #[test]
    fn test_go_to_clamps() {
        let mut view = DetailView::new(vec![record("1", "A"), record("2", "B")]);
        view.go_to(10);
        assert_eq!(view.index(), 1);
        assert!(!view.has_next());
    }
}
