//! `census list` and `census delete`.
//!
//! Both start from the same data load: the schema's family fields and every
//! household, fetched concurrently. Either fetch failing degrades to an
//! empty table rather than an error.

use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::warn;

use crate::config::DisplayConfig;
use crate::error::{mutation_failure, ErrorClass};
use crate::fields::load_schema;
use crate::models::{display_value, HouseholdRecord, Schema};
use crate::rows::{self, Column, FamilyMemberRow, Predicates};
use crate::shell;
use crate::store::SurveyStore;

/// Schema and households for one list view.
pub struct ListData {
    pub schema: Schema,
    pub households: Vec<HouseholdRecord>,
}

impl ListData {
    pub fn rows(&self) -> Vec<FamilyMemberRow> {
        rows::normalize(&self.households, &self.schema.family_members)
    }
}

pub async fn load_households(store: &dyn SurveyStore) -> Vec<HouseholdRecord> {
    match store.list_records().await {
        Ok(records) => records,
        Err(e) => {
            warn!("{}", ErrorClass::DegradedRead.report(&e));
            Vec::new()
        }
    }
}

pub async fn load_list_data(store: &dyn SurveyStore) -> ListData {
    let (schema, households) = tokio::join!(load_schema(store), load_households(store));
    ListData { schema, households }
}

/// Operator input for `census list`.
#[derive(Debug, Default)]
pub struct ListArgs {
    pub query: String,
    pub predicates: Predicates,
    pub group: bool,
    /// 1-based page number.
    pub page: usize,
    pub all: bool,
    /// Row ids whose households should be resolved for navigation.
    pub select: Vec<String>,
}

/// Slice of `rows` for 1-based `page`, clamped to the last page.
pub fn page_slice<T>(rows: &[T], page: usize, page_size: usize) -> (&[T], usize, usize) {
    let page_size = page_size.max(1);
    let pages = rows.len().div_ceil(page_size).max(1);
    let page = page.clamp(1, pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(rows.len());
    (&rows[start..end], page, pages)
}

fn cell(row: &FamilyMemberRow, column: &Column) -> String {
    row.get(&column.key).map(display_value).unwrap_or_default()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(width.saturating_sub(1)).collect();
        s.push('…');
        s
    }
}

/// Renders `rows` as a fixed-width table. With `colors`, each line starts
/// with its household's color.
pub fn render_table(
    rows: &[FamilyMemberRow],
    columns: &[Column],
    colors: Option<&HashMap<String, String>>,
) -> Vec<String> {
    const MAX_WIDTH: usize = 24;

    let widths: Vec<usize> = columns
        .iter()
        .map(|c| {
            rows.iter()
                .map(|r| cell(r, c).chars().count())
                .chain(std::iter::once(c.header.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_WIDTH)
        })
        .collect();

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(text, w)| format!("{:<width$}", truncate(text, *w), width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let prefix_width = if colors.is_some() { 10 } else { 0 };
    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(format!(
        "{:prefix_width$}{}",
        "",
        line(columns.iter().map(|c| c.header.clone()).collect())
    ));
    for row in rows {
        let prefix = match colors {
            Some(map) => format!(
                "{:<10}",
                map.get(row.user_id()).map(String::as_str).unwrap_or("")
            ),
            None => String::new(),
        };
        out.push(format!(
            "{}{}",
            prefix,
            line(columns.iter().map(|c| cell(row, c)).collect())
        ));
    }
    out
}

pub async fn run_list(store: &dyn SurveyStore, display: &DisplayConfig, args: ListArgs) -> Result<()> {
    let data = load_list_data(store).await;
    let all_rows = data.rows();
    let rows = rows::filter_rows(&all_rows, &args.query, &args.predicates);
    let columns = rows::columns(&data.schema.family_members);

    if !args.select.is_empty() {
        let ids = rows::parent_ids_for_selection(&all_rows, &args.select);
        if ids.is_empty() {
            bail!("none of the selected rows were found");
        }
        println!("census show {}", ids.join(","));
        return Ok(());
    }

    let colors = args
        .group
        .then(|| rows::assign_family_colors(&rows, &display.family_colors));

    let (visible, page, pages) = if args.all {
        (rows.as_slice(), 1, 1)
    } else {
        page_slice(&rows, args.page, display.page_size)
    };

    for line in render_table(visible, &columns, colors.as_ref()) {
        println!("{}", line);
    }
    println!(
        "{} of {} family members (page {} of {})",
        rows.len(),
        all_rows.len(),
        page,
        pages
    );
    Ok(())
}

/// Household ids to delete: explicit ids first, then the households owning
/// the selected member rows, without duplicates.
pub fn resolve_delete_targets(
    households: &[String],
    member_rows: &[String],
    rows: &[FamilyMemberRow],
) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    let from_rows = rows::parent_ids_for_selection(rows, member_rows);
    for id in households.iter().chain(from_rows.iter()) {
        if !targets.contains(id) {
            targets.push(id.clone());
        }
    }
    targets
}

pub async fn run_delete(
    store: &dyn SurveyStore,
    households: &[String],
    member_rows: &[String],
    yes: bool,
) -> Result<()> {
    let rows = if member_rows.is_empty() {
        Vec::new()
    } else {
        load_list_data(store).await.rows()
    };
    let targets = resolve_delete_targets(households, member_rows, &rows);
    if targets.is_empty() {
        bail!("nothing selected to delete");
    }

    println!("Households to delete: {}", targets.join(", "));
    if !shell::confirm("This action cannot be reverted. Do you want to continue?", yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    store
        .delete_records(&targets)
        .await
        .map_err(|e| mutation_failure(e, "delete users"))?;
    println!("Deleted {} household(s).", targets.len());
    Ok(())
}
