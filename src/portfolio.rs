use std::fmt;
use std::str::FromStr;

use colored::Colorize;
use piechart::{Chart, Color};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::position::{BasicPosition, PortfolioInfo, TrackedPosition};

/// How the extended sheet's weight cell should be read.
///
/// Sheets format this column either as a fraction (`0.25`) or as a percentage
/// (`25`). The two cannot be told apart from the value alone, so `Auto` guesses:
/// anything above 1 is taken as a percentage. That guess is wrong for a
/// leveraged position above 100% stored as a fraction, and for a 1% position
/// stored as a percentage; set the scale explicitly when that matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScale {
    #[default]
    Auto,
    Fraction,
    Percent,
}

impl WeightScale {
    pub fn to_percent(self, raw: f64) -> f64 {
        match self {
            WeightScale::Fraction => raw * 100.0,
            WeightScale::Percent => raw,
            WeightScale::Auto => {
                if raw > 1.0 {
                    raw
                } else {
                    raw * 100.0
                }
            }
        }
    }
}

impl FromStr for WeightScale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(WeightScale::Auto),
            "fraction" => Ok(WeightScale::Fraction),
            "percent" => Ok(WeightScale::Percent),
            _ => Err(ConfigError::UnknownWeightScale(s.to_string())),
        }
    }
}

impl fmt::Display for WeightScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeightScale::Auto => "auto",
            WeightScale::Fraction => "fraction",
            WeightScale::Percent => "percent",
        };
        write!(f, "{s}")
    }
}

/// The parsed sheet. Rebuilt from scratch on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", content = "holdings", rename_all = "lowercase")]
pub enum Portfolio {
    Basic(Vec<BasicPosition>),
    Tracked {
        positions: Vec<TrackedPosition>,
        info: PortfolioInfo,
    },
}

/// Portfolio-level figures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Summary {
    pub total_market_value: f64,
    pub total_invested: f64,
    pub total_gain_loss: f64,
    pub return_pct: f64,
}

/// Per-holding figures, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingMetrics {
    pub symbol: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub current_price: f64,
    pub buy_date: String,
    pub market_value: f64,
    pub cost_basis: f64,
    pub gain_loss: f64,
    pub return_pct: f64,
    pub weight_pct: f64,
    pub stop_loss: Option<f64>,
}

impl Portfolio {
    pub fn len(&self) -> usize {
        match self {
            Portfolio::Basic(positions) => positions.len(),
            Portfolio::Tracked { positions, .. } => positions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn info(&self) -> Option<&PortfolioInfo> {
        match self {
            Portfolio::Basic(_) => None,
            Portfolio::Tracked { info, .. } => Some(info),
        }
    }

    pub fn get_total_value(&self) -> f64 {
        match self {
            Portfolio::Basic(positions) => positions.iter().map(|p| p.market_value()).sum(),
            Portfolio::Tracked { positions, .. } => {
                positions.iter().map(|p| p.market_value()).sum()
            }
        }
    }

    pub fn summary(&self) -> Summary {
        let total_market_value = self.get_total_value();

        let (total_invested, total_gain_loss) = match self {
            Portfolio::Basic(positions) => (
                positions.iter().map(|p| p.cost_basis()).sum::<f64>(),
                positions.iter().map(|p| p.gain_loss()).sum::<f64>(),
            ),
            Portfolio::Tracked { positions, info } => {
                let gain_loss: f64 = positions.iter().map(|p| p.gain_loss_dollar).sum();
                // the sheet does not carry invested capital, back it out of the account size
                (info.current_size - gain_loss, gain_loss)
            }
        };

        let return_pct = if total_invested > 0.0 {
            total_gain_loss / total_invested * 100.0
        } else {
            0.0
        };

        Summary {
            total_market_value,
            total_invested,
            total_gain_loss,
            return_pct,
        }
    }

    /// Per-holding metrics in sheet order.
    pub fn holdings(&self, scale: WeightScale) -> Vec<HoldingMetrics> {
        match self {
            Portfolio::Basic(positions) => {
                let total = self.get_total_value();
                positions
                    .iter()
                    .map(|p| HoldingMetrics {
                        symbol: p.get_symbol().to_string(),
                        quantity: p.get_shares(),
                        buy_price: p.get_buy_price(),
                        current_price: p.get_current_price(),
                        buy_date: p.get_buy_date().to_string(),
                        market_value: p.market_value(),
                        cost_basis: p.cost_basis(),
                        gain_loss: p.gain_loss(),
                        return_pct: p.return_pct(),
                        weight_pct: if total > 0.0 {
                            p.market_value() / total * 100.0
                        } else {
                            0.0
                        },
                        stop_loss: None,
                    })
                    .collect()
            }
            Portfolio::Tracked { positions, .. } => positions
                .iter()
                .map(|p| HoldingMetrics {
                    symbol: p.symbol.clone(),
                    quantity: p.quantity,
                    buy_price: p.buy_price,
                    current_price: p.curr_price,
                    buy_date: p.buy_date.clone(),
                    market_value: p.market_value(),
                    cost_basis: p.cost_basis(),
                    gain_loss: p.gain_loss_dollar,
                    return_pct: p.gain_loss_percent,
                    weight_pct: scale.to_percent(p.weight),
                    stop_loss: Some(p.stop_loss),
                })
                .collect(),
        }
    }

    /// Holdings sorted by descending market value, for display.
    pub fn by_market_value(&self, scale: WeightScale) -> Vec<HoldingMetrics> {
        let mut holdings = self.holdings(scale);
        holdings.sort_by(|a, b| b.market_value.total_cmp(&a.market_value));
        holdings
    }

    /// Print the summary cards
    pub fn print_summary(&self, currency: &str) {
        let summary = self.summary();

        let card = |label: &str, value: String| {
            println!("{label: >16} | {value}");
        };
        let signed = |v: f64, text: String| {
            if v >= 0.0 {
                text.green().to_string()
            } else {
                text.red().to_string()
            }
        };

        println!("{}", "====================================".dimmed());
        card(
            "Market Value",
            format_money(summary.total_market_value, currency).bold().to_string(),
        );
        card("Invested", format_money(summary.total_invested, currency));
        card(
            "Gain/Loss",
            signed(
                summary.total_gain_loss,
                format_money(summary.total_gain_loss, currency),
            ),
        );
        card(
            "Return",
            signed(summary.return_pct, format!("{:.2}%", summary.return_pct)),
        );

        if let Some(info) = self.info() {
            println!("{}", "------------------------------------".dimmed());
            card("Starting Size", format_money(info.starting_size, currency));
            card("Current Size", format_money(info.current_size, currency));
            card(
                "Account Growth",
                signed(
                    info.account_growth_pct(),
                    format!("{:.2}%", info.account_growth_pct()),
                ),
            );
            let month = if info.current_month.is_empty() {
                "Month"
            } else {
                info.current_month.as_str()
            };
            card(
                format!("{month} P/L").as_str(),
                signed(
                    info.monthly_pl,
                    format!(
                        "{} ({:.2}%)",
                        format_money(info.monthly_pl, currency),
                        info.monthly_pl_percent
                    ),
                ),
            );
        }
    }

    // Print the holdings as a table
    pub fn print(&self, scale: WeightScale, include_sum: bool) {
        use comfy_table::{
            presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor,
            ContentArrangement, Table,
        };

        let tracked = matches!(self, Portfolio::Tracked { .. });

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_width(120);

        let mut header = vec![
            Cell::new("Symbol").add_attribute(Attribute::Bold),
            Cell::new("Qty").add_attribute(Attribute::Bold),
            Cell::new("Buy").add_attribute(Attribute::Bold),
            Cell::new("Price").add_attribute(Attribute::Bold),
        ];
        if tracked {
            header.push(Cell::new("Stop").add_attribute(Attribute::Bold));
        }
        header.extend([
            Cell::new("Value").add_attribute(Attribute::Bold),
            Cell::new("Cost").add_attribute(Attribute::Bold),
            Cell::new("G/L").add_attribute(Attribute::Bold),
            Cell::new("%G/L").add_attribute(Attribute::Bold),
            Cell::new("Weight").add_attribute(Attribute::Bold),
            Cell::new("Bought").add_attribute(Attribute::Bold),
        ]);
        table.set_header(header);

        let colored = |text: String, v: f64| {
            let c = if v >= 0.0 { TColor::Green } else { TColor::Red };
            Cell::new(text).set_alignment(CellAlignment::Right).fg(c)
        };
        let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);

        for h in self.by_market_value(scale) {
            let mut row = vec![
                Cell::new(&h.symbol).add_attribute(Attribute::Bold),
                right(format_amount(h.quantity)),
                right(format!("{:.2}", h.buy_price)),
                right(format!("{:.2}", h.current_price)),
            ];
            if tracked {
                row.push(right(
                    h.stop_loss
                        .filter(|s| *s > 0.0)
                        .map(|s| format!("{s:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                ));
            }
            row.extend([
                right(format!("{:.2}", h.market_value)),
                right(format!("{:.2}", h.cost_basis)),
                colored(format!("{:.2}", h.gain_loss), h.gain_loss),
                colored(format!("{:.2}%", h.return_pct), h.return_pct),
                right(format!("{:.1}%", h.weight_pct)),
                Cell::new(&h.buy_date),
            ]);
            table.add_row(row);
        }

        if include_sum {
            let summary = self.summary();
            let mut row = vec![
                Cell::new("TOTAL").add_attribute(Attribute::Bold),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ];
            if tracked {
                row.push(Cell::new(""));
            }
            row.extend([
                right(format!("{:.2}", summary.total_market_value)).add_attribute(Attribute::Bold),
                right(format!("{:.2}", summary.total_invested)).add_attribute(Attribute::Bold),
                colored(format!("{:.2}", summary.total_gain_loss), summary.total_gain_loss)
                    .add_attribute(Attribute::Bold),
                colored(format!("{:.2}%", summary.return_pct), summary.return_pct)
                    .add_attribute(Attribute::Bold),
                Cell::new(""),
                Cell::new(""),
            ]);
            table.add_row(row);
        }

        println!("{table}");
    }

    // Print the weights in descending order
    pub fn print_allocation(&self, scale: WeightScale) {
        let mut holdings = self.holdings(scale);
        holdings.sort_by(|a, b| b.weight_pct.total_cmp(&a.weight_pct));

        println!("====================================");
        for h in holdings {
            println!("{: >12} | {: >10.2}", h.symbol, h.weight_pct);
        }
    }

    pub fn draw_pie_chart(&self, scale: WeightScale) {
        let colors = [
            Color::Red,
            Color::Green,
            Color::Blue,
            Color::Yellow,
            Color::Cyan,
            Color::White,
            Color::Purple,
            Color::Black,
        ];

        let data: Vec<piechart::Data> = self
            .by_market_value(scale)
            .into_iter()
            .enumerate()
            .filter(|(_, h)| h.weight_pct > 0.0)
            .map(|(i, h)| piechart::Data {
                label: h.symbol,
                value: h.weight_pct as f32,
                color: Some(colors[i % colors.len()].into()),
                fill: '•',
            })
            .collect();

        if data.is_empty() {
            println!("No open positions to chart.");
            return;
        }

        Chart::new()
            .legend(true)
            .radius(9)
            .aspect_ratio(3)
            .draw(&data);
    }
}

pub fn format_with_commas(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::new();
    for (i, c) in integer_part.chars().enumerate() {
        if i > 0 && (integer_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{decimal_part}")
}

pub fn format_money(value: f64, currency: &str) -> String {
    let number = format_with_commas(value);
    match currency {
        "USD" | "CAD" | "AUD" | "HKD" | "SGD" => match number.strip_prefix('-') {
            Some(n) => format!("-${n}"),
            None => format!("${number}"),
        },
        "EUR" => format!("{number} €"),
        "GBP" => format!("£{number}"),
        _ => format!("{number} {currency}"),
    }
}

pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else if amount >= 1.0 {
        format!("{amount:.2}")
    } else {
        format!("{amount:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic() -> Portfolio {
        Portfolio::Basic(vec![
            BasicPosition::new("AAPL", 50.0, 180.0, "2024-12-01", 195.5),
            BasicPosition::new("MSFT", 10.0, 420.0, "2024-06-12", 400.0),
            BasicPosition::new("GIFT", 4.0, 0.0, "", 25.0),
        ])
    }

    fn tracked(weights: &[f64]) -> Portfolio {
        let positions = weights
            .iter()
            .enumerate()
            .map(|(i, w)| TrackedPosition {
                symbol: format!("T{i}"),
                quantity: 10.0 + i as f64,
                buy_price: 20.0,
                curr_price: 22.5,
                gain_loss_dollar: 25.0 * (i as f64 + 1.0) - 40.0,
                gain_loss_percent: 12.5,
                stop_loss: 18.0,
                weight: *w,
                ..Default::default()
            })
            .collect();
        Portfolio::Tracked {
            positions,
            info: PortfolioInfo {
                starting_size: 10_000.0,
                current_size: 10_500.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_basic_summary() {
        let s = basic().summary();
        assert_eq!(s.total_market_value, 9775.0 + 4000.0 + 100.0);
        assert_eq!(s.total_invested, 9000.0 + 4200.0);
        assert!((s.total_gain_loss - (775.0 - 200.0 + 100.0)).abs() < 1e-9);
        assert!((s.return_pct - 675.0 / 13200.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_gain_loss_is_sum_of_holdings() {
        for portfolio in [basic(), tracked(&[0.2, 0.3, 0.5])] {
            let sum: f64 = portfolio
                .holdings(WeightScale::Auto)
                .iter()
                .map(|h| h.gain_loss)
                .sum();
            assert!((portfolio.summary().total_gain_loss - sum).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tracked_invested_is_backed_out_of_current_size() {
        let portfolio = tracked(&[0.5, 0.5]);
        let s = portfolio.summary();
        // gains: -15 and 10
        assert!((s.total_gain_loss + 5.0).abs() < 1e-9);
        assert!((s.total_invested - 10_505.0).abs() < 1e-9);
        assert!((s.return_pct - (-5.0 / 10_505.0 * 100.0)).abs() < 1e-9);
        assert_eq!(s.total_market_value, 10.0 * 22.5 + 11.0 * 22.5);
    }

    #[test]
    fn test_non_positive_invested_has_zero_return() {
        let portfolio = Portfolio::Tracked {
            positions: vec![TrackedPosition {
                symbol: "X".to_string(),
                quantity: 1.0,
                gain_loss_dollar: 50.0,
                ..Default::default()
            }],
            info: PortfolioInfo::default(),
        };
        let s = portfolio.summary();
        assert_eq!(s.total_invested, -50.0);
        assert_eq!(s.return_pct, 0.0);

        assert_eq!(Portfolio::Basic(vec![]).summary(), Summary::default());
    }

    #[test]
    fn test_basic_weights_sum_to_hundred() {
        let holdings = basic().holdings(WeightScale::Auto);
        let total: f64 = holdings.iter().map(|h| h.weight_pct).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!((holdings[0].weight_pct - 9775.0 / 13875.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_basic_weights_with_zero_total() {
        let portfolio = Portfolio::Basic(vec![BasicPosition::new("Z", 3.0, 1.0, "", 0.0)]);
        assert_eq!(portfolio.holdings(WeightScale::Auto)[0].weight_pct, 0.0);
    }

    #[test]
    fn test_weight_scale_auto() {
        let holdings = tracked(&[0.25, 25.0]).holdings(WeightScale::Auto);
        assert_eq!(holdings[0].weight_pct, 25.0);
        assert_eq!(holdings[1].weight_pct, 25.0);
    }

    #[test]
    fn test_weight_scale_explicit() {
        assert_eq!(WeightScale::Fraction.to_percent(1.5), 150.0);
        assert_eq!(WeightScale::Percent.to_percent(0.5), 0.5);
        // the heuristic's known blind spot
        assert_eq!(WeightScale::Auto.to_percent(1.0), 100.0);
        assert_eq!("Percent".parse::<WeightScale>().unwrap(), WeightScale::Percent);
        assert!("ratio".parse::<WeightScale>().is_err());
    }

    #[test]
    fn test_by_market_value_leaves_model_order() {
        let portfolio = Portfolio::Basic(vec![
            BasicPosition::new("SMALL", 1.0, 1.0, "", 10.0),
            BasicPosition::new("BIG", 100.0, 1.0, "", 10.0),
        ]);
        let sorted: Vec<_> = portfolio
            .by_market_value(WeightScale::Auto)
            .into_iter()
            .map(|h| h.symbol)
            .collect();
        assert_eq!(sorted, vec!["BIG", "SMALL"]);
        let original: Vec<_> = portfolio
            .holdings(WeightScale::Auto)
            .into_iter()
            .map(|h| h.symbol)
            .collect();
        assert_eq!(original, vec!["SMALL", "BIG"]);
    }

    #[test]
    fn test_market_value_is_exact_product() {
        for h in tracked(&[0.1, 0.2, 0.3]).holdings(WeightScale::Auto) {
            assert_eq!(h.market_value, h.quantity * h.current_price);
        }
        for h in basic().holdings(WeightScale::Auto) {
            assert_eq!(h.market_value, h.quantity * h.current_price);
        }
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_with_commas(1234567.891), "1,234,567.89");
        assert_eq!(format_with_commas(-1234.5), "-1,234.50");
        assert_eq!(format_with_commas(999.0), "999.00");
        assert_eq!(format_money(-42.0, "USD"), "-$42.00");
        assert_eq!(format_money(1500.0, "EUR"), "1,500.00 €");
        assert_eq!(format_money(3.0, "CHF"), "3.00 CHF");
        assert_eq!(format_amount(50.0), "50");
        assert_eq!(format_amount(1.5), "1.50");
        assert_eq!(format_amount(0.125), "0.1250");
    }
}
