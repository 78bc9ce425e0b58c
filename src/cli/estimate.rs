use super::ui;
use crate::core::{BatchOrchestrator, FundOutcome, FundRequest, IntradaySeries};
use anyhow::Result;
use comfy_table::{Attribute, Cell, CellAlignment, Color};

#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateOptions {
    pub details: bool,
    pub json: bool,
}

/// Estimates shown in the intraday series column.
const RECENT_POINTS: usize = 5;

/// Totals over the funds that produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub total_amount: f64,
    pub estimated_profit: Option<f64>,
    pub estimated_change: Option<f64>,
}

pub fn summarize(outcomes: &[FundOutcome]) -> BatchSummary {
    let total_amount = outcomes.iter().map(|o| o.position_amount).sum();

    let estimated: Vec<&FundOutcome> = outcomes
        .iter()
        .filter(|o| o.estimated_profit.is_some())
        .collect();
    if estimated.is_empty() {
        return BatchSummary {
            total_amount,
            estimated_profit: None,
            estimated_change: None,
        };
    }

    let profit: f64 = estimated.iter().filter_map(|o| o.estimated_profit).sum();
    let estimated_amount: f64 = estimated.iter().map(|o| o.position_amount).sum();
    BatchSummary {
        total_amount,
        estimated_profit: Some(profit),
        estimated_change: (estimated_amount > 0.0).then(|| profit / estimated_amount * 100.0),
    }
}

pub async fn run(
    batch: &BatchOrchestrator,
    requests: &[FundRequest],
    options: EstimateOptions,
) -> Result<Vec<FundOutcome>> {
    if requests.is_empty() {
        println!("No positions found. Add one with `navcast add <code> <amount>`.");
        return Ok(Vec::new());
    }

    let pb = ui::new_progress_bar(requests.len() as u64, true);
    pb.set_message("Estimating funds...");
    let outcomes = batch
        .run(requests, &|done, _total| pb.set_position(done as u64))
        .await;
    pb.finish_and_clear();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(outcomes);
    }

    println!("{}", render_overview(&outcomes));
    let summary = summarize(&outcomes);
    if let (Some(profit), Some(change)) = (summary.estimated_profit, summary.estimated_change) {
        println!(
            "{} {profit:+.2} ({change:+.2}%)",
            ui::style_text("Estimated profit today:", ui::StyleType::TotalLabel)
        );
    }
    if options.details {
        for outcome in &outcomes {
            ui::print_separator();
            println!("{}", render_details(outcome));
        }
    }
    Ok(outcomes)
}

pub fn render_overview(outcomes: &[FundOutcome]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Report date"),
        ui::header_cell("Est. change"),
        ui::header_cell("Top holdings (%)"),
        ui::header_cell("Amount"),
        ui::header_cell("Est. profit"),
        ui::header_cell("Status"),
        ui::header_cell("Updated"),
    ]);

    for outcome in outcomes {
        let status = if outcome.is_success() {
            Cell::new(outcome.status.to_string())
        } else {
            Cell::new(outcome.status.to_string()).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&outcome.fund_code),
            Cell::new(&outcome.fund_name),
            Cell::new(&outcome.report_date),
            if outcome.is_success() {
                ui::change_cell(outcome.estimated_change)
            } else {
                ui::na_cell(true)
            },
            ui::format_optional_cell(outcome.total_weight_used, |w| format!("{w:.2}")),
            Cell::new(format!("{:.2}", outcome.position_amount)).set_alignment(CellAlignment::Right),
            ui::profit_cell(outcome.estimated_profit),
            status,
            Cell::new(outcome.computed_at.format("%H:%M:%S")),
        ]);
    }

    if outcomes.len() > 1 {
        let summary = summarize(outcomes);
        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(""),
            ui::change_cell(summary.estimated_change),
            Cell::new(""),
            Cell::new(format!("{:.2}", summary.total_amount))
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            ui::profit_cell(summary.estimated_profit),
            Cell::new(""),
            Cell::new(""),
        ]);
    }

    table.to_string()
}

/// Intraday table for the funds in `outcomes` that have recorded points.
pub fn render_intraday(series: &IntradaySeries, outcomes: &[FundOutcome]) -> Option<String> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Since"),
        ui::header_cell("Open"),
        ui::header_cell("Latest"),
        ui::header_cell("Trend"),
        ui::header_cell("Recent"),
    ]);

    let mut rows = 0;
    for outcome in outcomes {
        let points = series.points(&outcome.fund_code);
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            continue;
        };
        let recent = points[points.len().saturating_sub(RECENT_POINTS)..]
            .iter()
            .map(|p| format!("{:+.2}", p.change))
            .collect::<Vec<_>>()
            .join(" → ");
        table.add_row(vec![
            Cell::new(&outcome.fund_code),
            Cell::new(&outcome.fund_name),
            Cell::new(first.at.format("%H:%M")),
            ui::change_cell(Some(first.change)),
            ui::change_cell(Some(last.change)),
            ui::change_cell(series.trend(&outcome.fund_code)),
            Cell::new(recent),
        ]);
        rows += 1;
    }

    (rows > 0).then(|| table.to_string())
}

pub fn render_details(outcome: &FundOutcome) -> String {
    let mut output = format!(
        "Fund: {} ({})\n",
        ui::style_text(&outcome.fund_name, ui::StyleType::Title),
        outcome.fund_code
    );

    if !outcome.is_success() {
        output.push_str(&ui::style_text(
            &outcome.status.to_string(),
            ui::StyleType::Error,
        ));
        return output;
    }

    if outcome.details.is_empty() {
        output.push_str(&ui::style_text(
            "No disclosed holdings",
            ui::StyleType::Subtle,
        ));
        return output;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Weight (%)"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
    ]);
    for detail in &outcome.details {
        let change = detail.price.map(|_| detail.change);
        table.add_row(vec![
            Cell::new(&detail.code),
            Cell::new(&detail.name),
            Cell::new(format!("{:.2}", detail.weight)).set_alignment(CellAlignment::Right),
            ui::format_optional_cell(detail.price, |p| format!("{p:.2}")),
            ui::change_cell(change),
        ]);
    }
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n{}",
        ui::style_text(
            &format!(
                "Report date {}. Estimated from disclosed top holdings only.",
                outcome.report_date
            ),
            ui::StyleType::Subtle,
        )
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FundStatus;
    use crate::core::valuation::HoldingDetail;
    use chrono::Local;

    fn outcome(code: &str, amount: f64, change: Option<f64>) -> FundOutcome {
        FundOutcome {
            fund_code: code.to_string(),
            fund_name: format!("Fund {code}"),
            report_date: "2026-06-30".to_string(),
            status: FundStatus::Success,
            estimated_change: change,
            total_weight_used: change.map(|_| 55.0),
            position_amount: amount,
            estimated_profit: change.map(|c| amount * c / 100.0),
            details: vec![HoldingDetail {
                code: "600519".to_string(),
                name: "Moutai".to_string(),
                weight: 9.85,
                price: Some(1632.0),
                change: 2.0,
            }],
            computed_at: Local::now(),
        }
    }

    #[test]
    fn test_summarize_ignores_funds_without_estimate() {
        let outcomes = vec![
            outcome("A", 10000.0, Some(1.0)),
            outcome("B", 5000.0, Some(-2.0)),
            FundOutcome::failed(
                &FundRequest::new("C", 2000.0),
                FundStatus::HoldingsFetchFailed,
            ),
        ];

        let summary = summarize(&outcomes);
        assert_eq!(summary.total_amount, 17000.0);
        assert!((summary.estimated_profit.unwrap() - 0.0).abs() < 1e-9);
        assert!(summary.estimated_change.unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_summarize_without_estimates() {
        let outcomes = vec![FundOutcome::failed(
            &FundRequest::new("C", 2000.0),
            FundStatus::HoldingsFetchFailed,
        )];

        let summary = summarize(&outcomes);
        assert_eq!(summary.total_amount, 2000.0);
        assert!(summary.estimated_profit.is_none());
        assert!(summary.estimated_change.is_none());
    }

    #[test]
    fn test_render_overview() {
        let outcomes = vec![
            outcome("002611", 10000.0, Some(0.8)),
            FundOutcome::failed(
                &FundRequest::new("000001", 500.0),
                FundStatus::HoldingsFetchFailed,
            ),
        ];

        let rendered = render_overview(&outcomes);
        assert!(rendered.contains("002611"));
        assert!(rendered.contains("+0.80%"));
        assert!(rendered.contains("+80.00"));
        assert!(rendered.contains("Holdings unavailable"));
        assert!(rendered.contains("Total"));
    }

    #[test]
    fn test_render_intraday() {
        let mut series = IntradaySeries::new();
        let failed = FundOutcome::failed(
            &FundRequest::new("000001", 500.0),
            FundStatus::HoldingsFetchFailed,
        );
        assert!(render_intraday(&series, &[failed.clone()]).is_none());

        for change in [0.5, 0.8, 0.2] {
            series.record(&[outcome("002611", 10000.0, Some(change))]);
        }
        let rendered =
            render_intraday(&series, &[outcome("002611", 10000.0, Some(0.2)), failed]).unwrap();
        assert!(rendered.contains("+0.50 → +0.80 → +0.20"));
        assert!(rendered.contains("-0.30%"));
        assert!(!rendered.contains("000001"));
    }

    #[test]
    fn test_render_details() {
        let rendered = render_details(&outcome("002611", 10000.0, Some(0.8)));
        assert!(rendered.contains("Moutai"));
        assert!(rendered.contains("1632.00"));
        assert!(rendered.contains("+2.00%"));

        let failed = FundOutcome::failed(
            &FundRequest::new("000001", 500.0),
            FundStatus::ProcessingError("boom".to_string()),
        );
        assert!(render_details(&failed).contains("Error: boom"));
    }
}
