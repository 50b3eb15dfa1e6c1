//! Built-in example holdings, shown whenever the sheet cannot be loaded so the
//! dashboard always has something to render.

use once_cell::sync::Lazy;

use crate::portfolio::Portfolio;
use crate::position::{BasicPosition, PortfolioInfo, TrackedPosition};
use crate::sheet::SheetFormat;

static BASIC: Lazy<Portfolio> = Lazy::new(|| {
    Portfolio::Basic(vec![
        BasicPosition::new("AAPL", 50.0, 180.0, "2024-12-01", 195.5),
        BasicPosition::new("MSFT", 25.0, 380.0, "2024-11-15", 415.2),
        BasicPosition::new("GOOGL", 30.0, 140.0, "2024-10-20", 165.8),
        BasicPosition::new("NVDA", 15.0, 120.0, "2024-09-10", 135.4),
        BasicPosition::new("AMZN", 20.0, 170.0, "2024-08-05", 185.6),
    ])
});

fn trade(
    symbol: &str,
    buy_date: &str,
    quantity: f64,
    buy_price: f64,
    stop_loss: f64,
    curr_price: f64,
    weight: f64,
) -> TrackedPosition {
    let gain_loss_dollar = (curr_price - buy_price) * quantity;
    TrackedPosition {
        symbol: symbol.to_string(),
        buy_date: buy_date.to_string(),
        quantity,
        buy_price,
        stop_loss,
        curr_price,
        gain_loss_dollar,
        gain_loss_percent: (curr_price - buy_price) / buy_price * 100.0,
        risk_stock: (buy_price - stop_loss) / buy_price * 100.0,
        risk_account: (buy_price - stop_loss) * quantity / 25_000.0 * 100.0,
        weight,
        ..Default::default()
    }
}

static TRACKED: Lazy<Portfolio> = Lazy::new(|| Portfolio::Tracked {
    positions: vec![
        trade("AAPL", "2024-11-04", 40.0, 222.0, 210.0, 229.9, 0.3547),
        trade("MSFT", "2024-11-12", 12.0, 418.5, 399.0, 425.3, 0.1969),
        trade("NVDA", "2024-12-02", 35.0, 138.6, 129.0, 134.3, 0.1813),
        trade("CRWD", "2024-12-09", 10.0, 352.0, 330.0, 361.8, 0.1396),
    ],
    info: PortfolioInfo {
        starting_size: 25_000.0,
        current_size: 25_930.0,
        monthly_pl: 412.5,
        monthly_pl_percent: 1.62,
        current_month: "December".to_string(),
    },
});

/// The example portfolio for `format`.
pub fn portfolio(format: SheetFormat) -> Portfolio {
    match format {
        SheetFormat::Simple => BASIC.clone(),
        SheetFormat::Extended => TRACKED.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_never_empty() {
        for format in [SheetFormat::Simple, SheetFormat::Extended] {
            let portfolio = portfolio(format);
            assert!(!portfolio.is_empty());
            assert!(portfolio.summary().total_market_value > 0.0);
        }
    }

    #[test]
    fn test_fallback_matches_format() {
        assert!(portfolio(SheetFormat::Simple).info().is_none());
        let extended = portfolio(SheetFormat::Extended);
        assert_eq!(extended.info().map(|i| i.current_month.as_str()), Some("December"));
    }
}
