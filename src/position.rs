use serde::{Deserialize, Serialize};

/// A row of the five-column sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicPosition {
    symbol: String,
    shares: f64,
    buy_price: f64,
    buy_date: String,
    current_price: f64,
}

impl BasicPosition {
    pub fn new(
        symbol: impl Into<String>,
        shares: f64,
        buy_price: f64,
        buy_date: impl Into<String>,
        current_price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            buy_price,
            buy_date: buy_date.into(),
            current_price,
        }
    }

    pub fn get_symbol(&self) -> &str {
        &self.symbol
    }

    pub fn get_shares(&self) -> f64 {
        self.shares
    }

    pub fn get_buy_price(&self) -> f64 {
        self.buy_price
    }

    pub fn get_buy_date(&self) -> &str {
        &self.buy_date
    }

    pub fn get_current_price(&self) -> f64 {
        self.current_price
    }

    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.buy_price
    }

    pub fn gain_loss(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    // 0 when nothing was paid, never NaN/inf
    pub fn return_pct(&self) -> f64 {
        let cost = self.cost_basis();
        if cost != 0.0 {
            self.gain_loss() / cost * 100.0
        } else {
            0.0
        }
    }
}

/// A row of the extended trading journal sheet.
///
/// Gain/loss figures are taken from the sheet as-is rather than derived, since
/// the sheet owner may account for fees or partial fills the row does not show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrackedPosition {
    pub symbol: String,
    pub buy_date: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub stop_loss: f64,
    pub curr_price: f64,
    pub gain_loss_dollar: f64,
    pub gain_loss_percent: f64,
    pub sell_date: String,
    pub sell_price: f64,
    pub risk_stock: f64,
    pub risk_account: f64,
    /// Raw weight cell. Whether this is a fraction or a percentage depends on
    /// how the sheet is formatted, see [`crate::portfolio::WeightScale`].
    pub weight: f64,
}

impl TrackedPosition {
    pub fn market_value(&self) -> f64 {
        self.quantity * self.curr_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.buy_price
    }

    pub fn is_open(&self) -> bool {
        self.sell_date.trim().is_empty()
    }
}

/// Account-level totals carried in the first data row of the extended sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PortfolioInfo {
    pub starting_size: f64,
    pub current_size: f64,
    pub monthly_pl: f64,
    pub monthly_pl_percent: f64,
    pub current_month: String,
}

impl PortfolioInfo {
    /// Change of the account since inception, in percent.
    pub fn account_growth_pct(&self) -> f64 {
        if self.starting_size > 0.0 {
            (self.current_size - self.starting_size) / self.starting_size * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_derived_fields() {
        let p = BasicPosition::new("AAPL", 50.0, 180.0, "2024-12-01", 195.5);
        assert_eq!(p.market_value(), 9775.0);
        assert_eq!(p.cost_basis(), 9000.0);
        assert_eq!(p.gain_loss(), 775.0);
        assert!((p.return_pct() - 8.6111).abs() < 1e-4);
    }

    #[test]
    fn test_zero_cost_basis_has_zero_return() {
        let gifted = BasicPosition::new("GIFT", 10.0, 0.0, "", 42.0);
        assert_eq!(gifted.cost_basis(), 0.0);
        assert_eq!(gifted.return_pct(), 0.0);
    }

    #[test]
    fn test_tracked_market_value_and_open_state() {
        let mut p = TrackedPosition {
            symbol: "NVDA".to_string(),
            quantity: 12.0,
            curr_price: 130.25,
            ..Default::default()
        };
        assert_eq!(p.market_value(), 12.0 * 130.25);
        assert!(p.is_open());

        p.sell_date = "2025-02-01".to_string();
        assert!(!p.is_open());
    }

    #[test]
    fn test_account_growth() {
        let info = PortfolioInfo {
            starting_size: 20_000.0,
            current_size: 23_000.0,
            ..Default::default()
        };
        assert!((info.account_growth_pct() - 15.0).abs() < 1e-9);
        assert_eq!(PortfolioInfo::default().account_growth_pct(), 0.0);
    }
}
