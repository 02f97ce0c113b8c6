use analytics::{
    AggregationRow, AgingBucket, AgingRow, FadeDriver, FadeRow, ForecastWeek, InvoiceAging,
    Runway, WipLine, WipTotals,
};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use configuration::OutputFormat;
use core_types::CloseAction;
use period_close::{PeriodClose, PeriodSummary, PnlRollup, RejectedEvent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Prints `value` as pretty JSON, or the table built by `table`.
pub fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    table: impl FnOnce() -> Vec<Table>,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => {
            for t in table() {
                println!("{t}");
            }
        }
    }
    Ok(())
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn money(value: Decimal) -> Cell {
    Cell::new(format!("{:.2}", value.round_dp(2))).set_alignment(CellAlignment::Right)
}

fn opt_money(value: Option<Decimal>) -> Cell {
    match value {
        Some(v) => money(v),
        None => Cell::new("n/a").set_alignment(CellAlignment::Right),
    }
}

fn pct(value: Option<Decimal>) -> Cell {
    let text = value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v.round_dp(1)));
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn ratio(value: Option<Decimal>) -> Cell {
    let text = value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v.round_dp(3)));
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub fn wip(lines: &[WipLine], totals: &WipTotals) -> Vec<Table> {
    let mut t = table(&[
        "Project", "Revised Contract", "Costs to Date", "Est. Cost at Completion", "% Complete",
        "Earned", "Billed to Date", "Under/(Over) Billed",
    ]);
    for line in lines {
        t.add_row(vec![
            Cell::new(&line.project),
            money(line.revised_contract),
            money(line.costs_to_date),
            opt_money(line.estimated_cost_at_completion),
            pct(Some(line.percent_complete)),
            money(line.earned_revenue),
            money(line.billed_to_date),
            money(line.under_over_billed),
        ]);
    }
    let eac = if totals.unforecastable > 0 {
        Cell::new(format!(
            "{:.2} (+{} n/a)",
            totals.estimated_cost_at_completion.round_dp(2),
            totals.unforecastable
        ))
        .set_alignment(CellAlignment::Right)
    } else {
        money(totals.estimated_cost_at_completion)
    };
    t.add_row(vec![
        Cell::new(format!("Total ({})", totals.projects)),
        money(totals.revised_contract),
        money(totals.costs_to_date),
        eac,
        pct(Some(totals.percent_complete)),
        money(totals.earned_revenue),
        money(totals.billed_to_date),
        money(totals.under_over_billed),
    ]);
    vec![t]
}

pub fn fade(rows: &[FadeRow]) -> Vec<Table> {
    let mut t = table(&[
        "Project", "Severity", "CPI", "Original", "Current", "Projected", "Fade", "Unbilled",
    ]);
    for row in rows {
        t.add_row(vec![
            Cell::new(&row.project),
            Cell::new(row.severity),
            ratio(row.cpi),
            pct(Some(row.margin_original)),
            pct(row.margin_current),
            pct(row.margin_projected),
            pct(row.fade_percent),
            money(row.unbilled),
        ]);
    }
    vec![t]
}

pub fn aging(rows: &[AgingRow], total: &AgingRow) -> Vec<Table> {
    let mut t = table(&["Group", "Current", "1-30", "31-60", "60+", "Total"]);
    for row in rows.iter().chain(std::iter::once(total)) {
        t.add_row(vec![
            Cell::new(&row.group_key),
            money(row.current),
            money(row.d1_30),
            money(row.d31_60),
            money(row.d60plus),
            money(row.total),
        ]);
    }
    vec![t]
}

pub fn invoices(invoices: &[InvoiceAging]) -> Vec<Table> {
    let mut t = table(&["Invoice", "Client", "Project", "Balance", "Age", "Bucket", "Status"]);
    for invoice in invoices {
        let bucket = match invoice.bucket {
            AgingBucket::Current => "Current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days60Plus => "60+",
        };
        t.add_row(vec![
            Cell::new(&invoice.id),
            Cell::new(&invoice.client),
            Cell::new(invoice.project_id.as_deref().unwrap_or("")),
            money(invoice.balance),
            Cell::new(invoice.age_days).set_alignment(CellAlignment::Right),
            Cell::new(bucket),
            Cell::new(invoice.status),
        ]);
    }
    vec![t]
}

pub fn rollup(dimension: &str, rows: &[AggregationRow]) -> Vec<Table> {
    let mut t = table(&[dimension, "Total", "Count", "% of Total"]);
    for row in rows {
        t.add_row(vec![
            Cell::new(&row.key),
            money(row.total),
            Cell::new(row.count).set_alignment(CellAlignment::Right),
            pct(Some(row.pct_of_grand * dec!(100))),
        ]);
    }
    vec![t]
}

pub fn drivers(rows: &[FadeDriver]) -> Vec<Table> {
    let mut t = table(&["Cost Code", "Description", "Budget", "Actual", "Variance", "Overage"]);
    for row in rows {
        t.add_row(vec![
            Cell::new(&row.cost_code),
            Cell::new(row.description.as_deref().unwrap_or("")),
            money(row.budget),
            money(row.actual),
            money(row.variance),
            pct(row.overage_pct),
        ]);
    }
    vec![t]
}

pub fn cash_flow(weeks: &[ForecastWeek], runway: &Runway) -> Vec<Table> {
    let mut t = table(&["Week Of", "Inflow", "Outflow", "Net", "Starting", "Ending"]);
    for week in weeks {
        t.add_row(vec![
            Cell::new(week.week_starting),
            money(week.inflow),
            money(week.outflow),
            money(week.net),
            money(week.starting_cash),
            money(week.ending_cash),
        ]);
    }

    let mut summary = table(&["Current Cash", "Threshold", "Runway (weeks)", "Lowest", "Alarm"]);
    summary.add_row(vec![
        money(runway.current_cash),
        money(runway.min_threshold),
        Cell::new(runway.runway_weeks).set_alignment(CellAlignment::Right),
        money(runway.lowest_projected),
        Cell::new(if runway.is_alarm { "YES" } else { "no" }),
    ]);
    vec![t, summary]
}

pub fn close_status(
    periods: &[PeriodClose],
    history: &[PeriodSummary],
    rejected: &[RejectedEvent],
) -> Vec<Table> {
    let mut tables = Vec::new();
    for period in periods {
        let mut t = table(&["#", "Step", "Status", "Completed By", "Completed At"]);
        for step in &period.steps {
            t.add_row(vec![
                Cell::new(step.ordinal),
                Cell::new(&step.name),
                Cell::new(step.status),
                Cell::new(step.completed_by.as_deref().unwrap_or("")),
                Cell::new(step.completed_at.map(|at| at.to_string()).unwrap_or_default()),
            ]);
        }
        let mut header = table(&["Period", "Status", "Progress", "Anomaly"]);
        header.add_row(vec![
            Cell::new(&period.period_id),
            Cell::new(period.status),
            Cell::new(format!("{}/{}", period.completed_steps(), period.steps.len())),
            Cell::new(period.anomaly.as_deref().unwrap_or("")),
        ]);
        tables.push(header);
        tables.push(t);
    }

    if !history.is_empty() {
        let mut t = table(&["Period", "Revenue", "Expense", "Net", "Anomaly"]);
        for summary in history {
            t.add_row(vec![
                Cell::new(&summary.period_id),
                money(summary.revenue),
                money(summary.expense),
                money(summary.net),
                Cell::new(summary.anomaly.as_deref().unwrap_or("")),
            ]);
        }
        tables.push(t);
    }

    if !rejected.is_empty() {
        let mut t = table(&["Period", "#", "Action", "By", "At", "Rejected Because"]);
        for skipped in rejected {
            let action = match skipped.event.action {
                CloseAction::Start => "start",
                CloseAction::Complete => "complete",
            };
            t.add_row(vec![
                Cell::new(&skipped.event.period_id),
                Cell::new(skipped.event.ordinal),
                Cell::new(action),
                Cell::new(&skipped.event.by),
                Cell::new(skipped.event.at),
                Cell::new(&skipped.error),
            ]);
        }
        tables.push(t);
    }
    tables
}

pub fn pnl(rollup: &PnlRollup) -> Vec<Table> {
    let mut t = table(&["Line", "Amount"]);
    let sections = [
        ("Revenue", &rollup.revenue, rollup.total_revenue),
        ("Direct Costs", &rollup.direct_costs, rollup.total_direct_costs),
        ("Overhead", &rollup.overhead, rollup.total_overhead),
    ];
    for (title, lines, total) in sections {
        t.add_row(vec![Cell::new(title), Cell::new("")]);
        for line in lines {
            t.add_row(vec![Cell::new(format!("  {}", line.label)), money(line.amount)]);
        }
        t.add_row(vec![Cell::new(format!("Total {title}")), money(total)]);
    }
    t.add_row(vec![Cell::new("Gross Profit"), money(rollup.gross_profit)]);
    t.add_row(vec![Cell::new("Gross Margin"), pct(rollup.gross_margin_pct)]);
    t.add_row(vec![Cell::new("Net Income"), money(rollup.net_income)]);
    vec![t]
}
