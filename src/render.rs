use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use core_types::{ActionKind, MarginSnapshot, OrderSnapshot, Payload, PositionSnapshot};
use engine::{AccountOutcome, DispatchReport, DispatchStatus};
use rust_decimal::Decimal;

const POSITION_HEADER: [&str; 8] = [
    "Account", "Symbol", "Size", "Entry", "Mark", "Liquidation", "Leverage", "uPnL (XBt)",
];
const ORDER_HEADER: [&str; 9] = [
    "Account", "Order ID", "Symbol", "Side", "Type", "Qty", "Price", "Stop", "Status",
];
const MARGIN_HEADER: [&str; 4] = ["Account", "Wallet (XBT)", "Available (XBT)", "uPnL (XBT)"];

fn header_for(action: ActionKind) -> &'static [&'static str] {
    match action {
        ActionKind::QueryPositions
        | ActionKind::SetLeverage
        | ActionKind::SetRiskLimit
        | ActionKind::TransferMargin => &POSITION_HEADER,
        ActionKind::QueryMargin => &MARGIN_HEADER,
        _ => &ORDER_HEADER,
    }
}

/// Renders a dispatch report as a table, one or more rows per account.
pub fn report_table(report: &DispatchReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header_for(report.action()).to_vec());

    for (account, outcome) in report.iter() {
        match outcome {
            AccountOutcome::Succeeded(payload) => {
                let rows = payload_rows(payload);
                if rows.is_empty() {
                    table.add_row(vec![Cell::new(&account.label), Cell::new("-")]);
                }
                for row in rows {
                    let mut cells = vec![Cell::new(&account.label)];
                    cells.extend(row.into_iter().map(Cell::new));
                    table.add_row(cells);
                }
            }
            AccountOutcome::Failed(failure) => {
                let retry = if failure.retryable { " (retryable)" } else { "" };
                table.add_row(vec![
                    Cell::new(&account.label),
                    Cell::new(format!("{}: {}{}", failure.kind, failure.detail, retry)).fg(Color::Red),
                ]);
            }
        }
    }
    for label in report.missing() {
        table.add_row(vec![
            Cell::new(label),
            Cell::new("not sent (cancelled)").fg(Color::Yellow),
        ]);
    }
    table
}

/// One-line summary printed under the table.
pub fn summary(report: &DispatchReport) -> String {
    let status = match report.status() {
        DispatchStatus::Complete => "complete",
        DispatchStatus::Cancelled => "cancelled",
    };
    format!(
        "{}: {} succeeded, {} failed, {} not sent ({})",
        report.action(),
        report.succeeded().count(),
        report.failed().count(),
        report.missing().len(),
        status
    )
}

/// Table cells for one payload, without the account column.
pub fn payload_rows(payload: &Payload) -> Vec<Vec<String>> {
    match payload {
        Payload::Order(order) => vec![order_row(order)],
        Payload::Orders(orders) => orders.iter().map(order_row).collect(),
        Payload::Position(position) => vec![position_row(position)],
        Payload::Positions(positions) => positions.iter().map(position_row).collect(),
        Payload::Margin(margin) => vec![margin_row(margin)],
        Payload::Acknowledged => vec![vec!["ok".to_string()]],
    }
}

fn opt(value: Option<Decimal>) -> String {
    value.map(|v| v.normalize().to_string()).unwrap_or_else(|| "-".into())
}

fn order_row(order: &OrderSnapshot) -> Vec<String> {
    vec![
        order.order_id.clone(),
        order.symbol.clone(),
        format!("{:?}", order.side),
        format!("{:?}", order.order_type),
        order.quantity.normalize().to_string(),
        opt(order.price),
        opt(order.stop_price),
        order.status.clone(),
    ]
}

fn position_row(position: &PositionSnapshot) -> Vec<String> {
    vec![
        position.symbol.clone(),
        position.size.normalize().to_string(),
        opt(position.entry_price),
        opt(position.mark_price),
        opt(position.liquidation_price),
        position.leverage.normalize().to_string(),
        position.unrealised_pnl.normalize().to_string(),
    ]
}

fn margin_row(margin: &MarginSnapshot) -> Vec<String> {
    let btc = |sats: i64| Decimal::new(sats, 8).normalize().to_string();
    vec![
        btc(margin.wallet_balance),
        margin.available_btc().normalize().to_string(),
        margin.unrealised_pnl_btc().normalize().to_string(),
    ]
}
