use crate::core::table::{Series, Table as FieldTable};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

fn format_value(value: f64) -> String {
    format!("{value:.4}")
}

/// One row per sid, one column per date label.
pub fn table_view(table: &FieldTable) -> Table {
    let mut view = new_styled_table();
    let labels = table.index.labels();
    let mut header = vec![header_cell("sid")];
    header.extend(labels.iter().map(|label| header_cell(label)));
    view.set_header(header);

    for (col, sid) in table.columns.iter().enumerate() {
        let mut row = vec![Cell::new(sid)];
        row.extend(
            table
                .values
                .iter()
                .map(|cells| format_optional_cell(cells[col], format_value)),
        );
        view.add_row(row);
    }
    view
}

/// A cross-section as `sid | value`.
pub fn series_view(series: &Series) -> Table {
    let mut view = new_styled_table();
    view.set_header(vec![header_cell("sid"), header_cell(&series.name)]);
    for (sid, value) in series.index.iter().zip(&series.values) {
        view.add_row(vec![Cell::new(sid), format_optional_cell(*value, format_value)]);
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::FieldDocument;

    #[test]
    fn test_table_view_marks_missing_cells() {
        let doc: FieldDocument = [("000001".to_string(), 1.5)].into_iter().collect();
        let other: FieldDocument = [("600000".to_string(), 2.0)].into_iter().collect();
        let table = FieldTable::assemble(
            vec!["20240102".to_string(), "20240103".to_string()],
            &[Some(doc), Some(other)],
        );

        let rendered = table_view(&table).to_string();
        assert!(rendered.contains("20240103"));
        assert!(rendered.contains("1.5000"));
        assert!(rendered.contains("N/A"));
    }
}
