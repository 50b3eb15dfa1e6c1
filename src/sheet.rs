//! Parsing of the published spreadsheet CSV.
//!
//! Two layouts are supported, see [`SheetFormat`]. Column positions are named
//! in [`basic`], [`tracked`] and [`totals`] so every lookup goes through a
//! bounds-checked [`Column`] instead of a bare index.

use std::fmt;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::portfolio::Portfolio;
use crate::position::{BasicPosition, PortfolioInfo, TrackedPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    /// `Symbol,Shares,BuyPrice,BuyDate,CurrentPrice`
    Simple,
    /// Trading journal with per-trade risk columns and account totals.
    Extended,
}

impl FromStr for SheetFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(SheetFormat::Simple),
            "extended" => Ok(SheetFormat::Extended),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetFormat::Simple => write!(f, "simple"),
            SheetFormat::Extended => write!(f, "extended"),
        }
    }
}

/// A named position in a CSV record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub index: usize,
}

impl Column {
    const fn new(name: &'static str, index: usize) -> Self {
        Self { name, index }
    }

    /// Trimmed cell text, empty when the record is too short.
    pub fn text<'r>(&self, record: &'r StringRecord) -> &'r str {
        record.get(self.index).map(str::trim).unwrap_or("")
    }

    pub fn number(&self, record: &StringRecord) -> f64 {
        parse_number(self.text(record))
    }
}

pub mod basic {
    use super::Column;

    pub const SYMBOL: Column = Column::new("Symbol", 0);
    pub const SHARES: Column = Column::new("Shares", 1);
    pub const BUY_PRICE: Column = Column::new("BuyPrice", 2);
    pub const BUY_DATE: Column = Column::new("BuyDate", 3);
    pub const CURRENT_PRICE: Column = Column::new("CurrentPrice", 4);

    pub const ALL: [Column; 5] = [SYMBOL, SHARES, BUY_PRICE, BUY_DATE, CURRENT_PRICE];
}

pub mod tracked {
    use super::Column;

    pub const SYMBOL: Column = Column::new("Symbol", 0);
    pub const BUY_DATE: Column = Column::new("Buy Date", 1);
    pub const QUANTITY: Column = Column::new("Quantity", 2);
    pub const BUY_PRICE: Column = Column::new("Buy Price", 3);
    pub const STOP_LOSS: Column = Column::new("Stop Loss", 4);
    pub const CURR_PRICE: Column = Column::new("Curr Price", 5);
    pub const GAIN_LOSS_DOLLAR: Column = Column::new("G/L $", 6);
    pub const GAIN_LOSS_PERCENT: Column = Column::new("G/L %", 7);
    pub const SELL_DATE: Column = Column::new("Sell Date", 8);
    pub const SELL_PRICE: Column = Column::new("Sell Price", 9);
    pub const RISK_STOCK: Column = Column::new("Risk Stock", 10);
    pub const RISK_ACCOUNT: Column = Column::new("Risk Account", 11);
    pub const WEIGHT: Column = Column::new("Weight", 12);

    pub const ALL: [Column; 13] = [
        SYMBOL,
        BUY_DATE,
        QUANTITY,
        BUY_PRICE,
        STOP_LOSS,
        CURR_PRICE,
        GAIN_LOSS_DOLLAR,
        GAIN_LOSS_PERCENT,
        SELL_DATE,
        SELL_PRICE,
        RISK_STOCK,
        RISK_ACCOUNT,
        WEIGHT,
    ];

    /// Rows shorter than this are not trades.
    pub const MIN_FIELDS: usize = ALL.len();
}

/// Account totals, read from the first data row only.
pub mod totals {
    use super::Column;

    pub const STARTING_SIZE: Column = Column::new("Starting Size", 18);
    pub const CURRENT_SIZE: Column = Column::new("Current Size", 19);
    pub const CURRENT_MONTH: Column = Column::new("Month", 21);
    pub const MONTHLY_PL: Column = Column::new("Monthly P/L", 22);
    pub const MONTHLY_PL_PERCENT: Column = Column::new("Monthly P/L %", 23);
}

/// Lenient number parsing for spreadsheet cells.
///
/// Currency signs, thousands separators and a trailing percent sign are
/// ignored, and accounting negatives like `(12.50)` are understood. Anything
/// that still does not parse to a finite number becomes 0.
pub fn parse_number(raw: &str) -> f64 {
    let mut cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    let negative = cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2;
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    let value = match cleaned.trim_end_matches('%').parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return 0.0,
    };

    if negative {
        -value
    } else {
        value
    }
}

/// Holdings and totals of an extended sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackedSheet {
    pub positions: Vec<TrackedPosition>,
    pub info: PortfolioInfo,
}

fn records<'t>(text: &'t str, layout: &[Column]) -> impl Iterator<Item = StringRecord> + 't {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    // headers are informational only, data is always read by position
    if let Ok(headers) = reader.headers() {
        for column in layout {
            let found = column.text(headers);
            if !found.is_empty() && !found.eq_ignore_ascii_case(column.name) {
                debug!(expected = column.name, found, "unexpected header name");
            }
        }
    }

    reader
        .into_records()
        .enumerate()
        .filter_map(|(i, record)| match record {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(row = i + 1, error = %e, "skipping unreadable row");
                None
            }
        })
}

/// Parse the five-column layout.
pub fn parse_basic(text: &str) -> Vec<BasicPosition> {
    let mut positions = Vec::new();

    for record in records(text, &basic::ALL) {
        let symbol = basic::SYMBOL.text(&record);
        if symbol.is_empty() {
            continue;
        }

        let shares = basic::SHARES.number(&record);
        if shares <= 0.0 {
            debug!(symbol, shares, "skipping row without shares");
            continue;
        }

        positions.push(BasicPosition::new(
            symbol,
            shares,
            basic::BUY_PRICE.number(&record),
            basic::BUY_DATE.text(&record),
            basic::CURRENT_PRICE.number(&record),
        ));
    }

    debug!(count = positions.len(), "parsed simple sheet");
    positions
}

fn read_totals(record: &StringRecord) -> PortfolioInfo {
    PortfolioInfo {
        starting_size: totals::STARTING_SIZE.number(record),
        current_size: totals::CURRENT_SIZE.number(record),
        monthly_pl: totals::MONTHLY_PL.number(record),
        monthly_pl_percent: totals::MONTHLY_PL_PERCENT.number(record),
        current_month: totals::CURRENT_MONTH.text(record).to_string(),
    }
}

fn read_trade(record: &StringRecord) -> TrackedPosition {
    TrackedPosition {
        symbol: tracked::SYMBOL.text(record).to_string(),
        buy_date: tracked::BUY_DATE.text(record).to_string(),
        quantity: tracked::QUANTITY.number(record),
        buy_price: tracked::BUY_PRICE.number(record),
        stop_loss: tracked::STOP_LOSS.number(record),
        curr_price: tracked::CURR_PRICE.number(record),
        gain_loss_dollar: tracked::GAIN_LOSS_DOLLAR.number(record),
        gain_loss_percent: tracked::GAIN_LOSS_PERCENT.number(record),
        sell_date: tracked::SELL_DATE.text(record).to_string(),
        sell_price: tracked::SELL_PRICE.number(record),
        risk_stock: tracked::RISK_STOCK.number(record),
        risk_account: tracked::RISK_ACCOUNT.number(record),
        weight: tracked::WEIGHT.number(record),
    }
}

/// Parse the extended trading journal layout.
///
/// Only open trades are kept: a symbol, a positive quantity and no sell date.
pub fn parse_tracked(text: &str) -> TrackedSheet {
    let mut sheet = TrackedSheet::default();

    for (i, record) in records(text, &tracked::ALL).enumerate() {
        if i == 0 {
            sheet.info = read_totals(&record);
        }

        if record.len() < tracked::MIN_FIELDS {
            debug!(row = i + 1, fields = record.len(), "skipping short row");
            continue;
        }

        let trade = read_trade(&record);
        if trade.symbol.is_empty() {
            continue;
        }
        if !trade.is_open() {
            debug!(symbol = %trade.symbol, sell_date = %trade.sell_date, "skipping closed trade");
            continue;
        }
        if trade.quantity <= 0.0 {
            debug!(symbol = %trade.symbol, "skipping trade without quantity");
            continue;
        }

        sheet.positions.push(trade);
    }

    debug!(count = sheet.positions.len(), "parsed extended sheet");
    sheet
}

/// Parse `text` with the given layout.
pub fn parse(format: SheetFormat, text: &str) -> Portfolio {
    match format {
        SheetFormat::Simple => Portfolio::Basic(parse_basic(text)),
        SheetFormat::Extended => {
            let TrackedSheet { positions, info } = parse_tracked(text);
            Portfolio::Tracked { positions, info }
        }
    }
}
