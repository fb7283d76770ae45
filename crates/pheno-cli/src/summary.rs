use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use pheno_core::{ExtractOutcome, ExtractSummary, KeyAction};
use pheno_standards::PhenotypeSummary;

/// Print the per-key table for an extraction run.
///
/// Goes to stderr when stdout carries collected rows.
pub fn print_extract_summary(outcome: &ExtractOutcome, to_stderr: bool) {
    let summary = outcome.summary();
    let mut rendered = vec![extract_table(summary).to_string()];
    if !summary.skipped.is_empty() {
        rendered.push(String::new());
        rendered.push("Skipped fields:".to_string());
        rendered.push(skipped_table(summary).to_string());
    }
    if !summary.complex.is_empty() {
        rendered.push(format!(
            "Complex phenotypes not extracted: {}",
            summary.complex.join(", ")
        ));
    }
    let footer = match outcome {
        ExtractOutcome::Committed(summary) => format!(
            "Inserted {} row(s), deleted {} row(s).",
            summary.inserted(),
            summary.deleted()
        ),
        ExtractOutcome::Collected { events, .. } => {
            format!("Collected {} row(s); nothing written.", events.len())
        }
    };
    rendered.push(footer);
    for block in rendered {
        if to_stderr {
            eprintln!("{block}");
        } else {
            println!("{block}");
        }
    }
}

fn extract_table(summary: &ExtractSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Phenotype"),
        header_cell("Field"),
        header_cell("Action"),
        header_cell("Deleted"),
        header_cell("Rows"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for outcome in &summary.outcomes {
        let (action, deleted, rows) = match outcome.action {
            KeyAction::AlreadyExtracted { existing } => {
                (dim_cell("already extracted"), None, existing)
            }
            KeyAction::Extracted { inserted } => (
                Cell::new("extracted").fg(Color::Green),
                None,
                inserted,
            ),
            KeyAction::Refreshed { deleted, inserted } => (
                Cell::new("refreshed").fg(Color::Yellow),
                Some(deleted),
                inserted,
            ),
            KeyAction::Collected { found } => (Cell::new("collected"), None, found),
        };
        table.add_row(vec![
            Cell::new(&outcome.key.phenotype),
            Cell::new(outcome.key.field_id),
            action,
            count_cell(deleted, Color::Yellow),
            Cell::new(rows),
        ]);
    }
    table
}

fn skipped_table(summary: &ExtractSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Phenotype"),
        header_cell("Field"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut table);
    for skipped in &summary.skipped {
        table.add_row(vec![
            Cell::new(&skipped.phenotype),
            Cell::new(skipped.field),
            Cell::new(&skipped.reason).fg(Color::Yellow),
        ]);
    }
    table
}

pub fn phenotype_table(summaries: &[PhenotypeSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Phenotype"),
        header_cell("Group"),
        header_cell("Description"),
        header_cell("Fields"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(&summary.name).add_attribute(Attribute::Bold),
            optional_cell(summary.group.as_deref()),
            optional_cell(summary.short_desc.as_deref().or(summary.phenotype.as_deref())),
            Cell::new(summary.fields.len()),
        ]);
    }
    table
}

pub fn category_table(categories: &[(String, usize)]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Category"), header_cell("Phenotypes")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (category, count) in categories {
        table.add_row(vec![Cell::new(category), Cell::new(count)]);
    }
    table
}

pub fn detail_table(summary: &PhenotypeSummary) -> Table {
    let fields = summary
        .fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let mut table = Table::new();
    apply_table_style(&mut table);
    let rows: [(&str, Cell); 10] = [
        ("Name", Cell::new(&summary.name).add_attribute(Attribute::Bold)),
        ("Phenotype", optional_cell(summary.phenotype.as_deref())),
        ("Group", optional_cell(summary.group.as_deref())),
        ("Description", optional_cell(summary.short_desc.as_deref())),
        ("Gender", optional_cell(summary.gender.as_deref())),
        ("Priority", optional_cell(summary.priority.as_deref())),
        ("Adult", Cell::new(yes_no(summary.is_adult))),
        ("Cancer", Cell::new(yes_no(summary.is_cancer))),
        ("Complex", Cell::new(yes_no(summary.is_complex))),
        ("Fields", optional_cell(Some(fields.as_str()).filter(|f| !f.is_empty()))),
    ];
    for (label, value) in rows {
        table.add_row(vec![header_cell(label), value]);
    }
    table
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: Option<u64>, color: Color) -> Cell {
    match count {
        Some(value) if value > 0 => Cell::new(value).fg(color).add_attribute(Attribute::Bold),
        Some(value) => dim_cell(value),
        None => dim_cell("-"),
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
