use super::ui;
use crate::core::HoldingsSource;
use crate::core::positions::{PositionRecord, PositionStore};
use anyhow::Result;
use comfy_table::{Attribute, Cell, CellAlignment};

pub async fn add(
    positions: &PositionStore,
    names: &dyn HoldingsSource,
    code: &str,
    amount: f64,
    name: Option<&str>,
    holding_profit: Option<f64>,
) -> Result<PositionRecord> {
    let record = positions
        .upsert(code, amount, name, holding_profit, Some(names))
        .await?;
    let label = if record.name.is_empty() {
        record.code.clone()
    } else {
        format!("{} ({})", record.name, record.code)
    };
    println!(
        "Saved position {label}: {:.2} (holding profit {:+.2})",
        record.amount, record.holding_profit
    );
    Ok(record)
}

pub async fn remove(positions: &PositionStore, code: &str) -> Result<bool> {
    let removed = positions.remove(code).await?;
    if removed {
        println!("Removed position {code}");
    } else {
        println!(
            "{}",
            ui::style_text(&format!("No position found for {code}"), ui::StyleType::Error)
        );
    }
    Ok(removed)
}

pub async fn list(positions: &PositionStore) -> Result<()> {
    let records = positions.list().await?;
    if records.is_empty() {
        println!("No positions found. Add one with `navcast add <code> <amount>`.");
        return Ok(());
    }
    println!("{}", render_positions(&records));
    Ok(())
}

pub fn render_positions(records: &[PositionRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Amount"),
        ui::header_cell("Holding profit"),
        ui::header_cell("Updated"),
    ]);

    for record in records {
        let name = if record.name.is_empty() {
            Cell::new(crate::core::outcome::PLACEHOLDER)
        } else {
            Cell::new(&record.name)
        };
        table.add_row(vec![
            Cell::new(&record.code),
            name,
            Cell::new(format!("{:.2}", record.amount)).set_alignment(CellAlignment::Right),
            ui::profit_cell(Some(record.holding_profit)),
            Cell::new(record.updated_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    let total: f64 = records.iter().map(|r| r.amount).sum();
    let total_profit: f64 = records.iter().map(|r| r.holding_profit).sum();
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(format!("{total:.2}"))
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Right),
        ui::profit_cell(Some(total_profit)),
        Cell::new(""),
    ]);
    table.to_string()
}
