use super::ui;
use crate::core::{HistoryRange, HistorySource, NavPoint};
use anyhow::Result;
use chrono::Local;
use comfy_table::{Cell, CellAlignment};

/// Trading days fetched for every range; ranges are cut locally.
pub const HISTORY_FETCH_DAYS: u32 = 365;

pub async fn run(source: &dyn HistorySource, fund_code: &str, range: HistoryRange) -> Result<()> {
    let points = source.fetch_history(fund_code, HISTORY_FETCH_DAYS).await?;
    let window = range.filter(&points, Local::now().date_naive());

    println!(
        "\nNAV history: {} ({})",
        ui::style_text(fund_code, ui::StyleType::Title),
        range
    );
    if window.is_empty() {
        println!(
            "{}",
            ui::style_text("No NAV records in range", ui::StyleType::Subtle)
        );
        return Ok(());
    }
    println!("{}", render_history(window));
    if let Some(change) = range_change(window) {
        println!("Change over {range}: {change:+.2}%");
    }
    Ok(())
}

/// Percentage change from the first to the last point.
pub fn range_change(points: &[NavPoint]) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    (first.nav > 0.0 && points.len() > 1).then(|| (last.nav - first.nav) / first.nav * 100.0)
}

/// Newest first, each row with its change against the previous day.
pub fn render_history(points: &[NavPoint]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("NAV"),
        ui::header_cell("Change"),
    ]);

    for (i, point) in points.iter().enumerate().rev() {
        let change = i
            .checked_sub(1)
            .map(|prev| points[prev].nav)
            .filter(|prev| *prev > 0.0)
            .map(|prev| (point.nav - prev) / prev * 100.0);
        table.add_row(vec![
            Cell::new(point.date.format("%Y-%m-%d")),
            Cell::new(format!("{:.4}", point.nav)).set_alignment(CellAlignment::Right),
            ui::change_cell(change),
        ]);
    }
    table.to_string()
}
