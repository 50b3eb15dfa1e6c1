//! The refresh cycle and the state the presentation reads from.
//!
//! A [`Dashboard`] owns exactly one [`Snapshot`]. A refresh builds a complete
//! new snapshot and swaps it in with a single assignment, so readers holding an
//! `Arc<Snapshot>` always see either the old model or the new one.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::RefreshError;
use crate::fallback;
use crate::portfolio::{HoldingMetrics, Portfolio, Summary, WeightScale};
use crate::sheet::{self, SheetFormat};
use crate::source::{Candidate, SourceResolver};

/// Where the data in a snapshot came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    Live { source: Candidate },
    Fallback { error: RefreshError },
    /// Before the first refresh has finished.
    Placeholder,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub format: SheetFormat,
    pub portfolio: Portfolio,
    pub summary: Summary,
    /// Per-holding metrics in sheet order.
    pub holdings: Vec<HoldingMetrics>,
    pub refreshed_at: DateTime<Local>,
    pub origin: Origin,
}

impl Snapshot {
    pub fn new(format: SheetFormat, portfolio: Portfolio, scale: WeightScale, origin: Origin) -> Self {
        Self {
            format,
            summary: portfolio.summary(),
            holdings: portfolio.holdings(scale),
            portfolio,
            refreshed_at: Local::now(),
            origin,
        }
    }

    pub fn by_market_value(&self) -> Vec<&HoldingMetrics> {
        let mut holdings: Vec<&HoldingMetrics> = self.holdings.iter().collect();
        holdings.sort_by(|a, b| b.market_value.total_cmp(&a.market_value));
        holdings
    }

    pub fn is_live(&self) -> bool {
        matches!(self.origin, Origin::Live { .. })
    }

    pub fn warning(&self) -> Option<&RefreshError> {
        match &self.origin {
            Origin::Fallback { error } => Some(error),
            _ => None,
        }
    }
}

/// Result of one refresh cycle. The snapshot is always renderable; `error` is
/// set when it holds the fallback dataset.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub snapshot: Snapshot,
    pub error: Option<RefreshError>,
}

/// Everything needed to run a refresh cycle. Cheap to clone into a task.
#[derive(Clone)]
pub struct Refresher {
    resolver: Arc<SourceResolver>,
    sheet_url: String,
    format: SheetFormat,
    scale: WeightScale,
}

impl Refresher {
    pub fn new(
        resolver: SourceResolver,
        sheet_url: impl Into<String>,
        format: SheetFormat,
        scale: WeightScale,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            sheet_url: sheet_url.into(),
            format,
            scale,
        }
    }

    /// Fetch and parse the sheet without falling back.
    pub async fn load(&self) -> Result<(Portfolio, Candidate), RefreshError> {
        let resolved = self.resolver.resolve(&self.sheet_url).await?;
        let portfolio = sheet::parse(self.format, &resolved.text);
        // a journal with every trade closed still carries live account totals
        if self.format == SheetFormat::Simple && portfolio.is_empty() {
            return Err(RefreshError::EmptyResult);
        }
        Ok((portfolio, resolved.source))
    }

    /// One full cycle: fetch, parse, aggregate, or fall back.
    #[instrument(skip(self), fields(format = %self.format))]
    pub async fn run(&self) -> RefreshOutcome {
        match self.load().await {
            Ok((portfolio, source)) => {
                info!(holdings = portfolio.len(), source = %source.label, "portfolio refreshed");
                RefreshOutcome {
                    snapshot: Snapshot::new(
                        self.format,
                        portfolio,
                        self.scale,
                        Origin::Live { source },
                    ),
                    error: None,
                }
            }
            Err(error) => {
                warn!(%error, details = ?error.details(), "using example portfolio");
                RefreshOutcome {
                    snapshot: self.fallback(Origin::Fallback {
                        error: error.clone(),
                    }),
                    error: Some(error),
                }
            }
        }
    }

    pub fn fallback(&self, origin: Origin) -> Snapshot {
        Snapshot::new(self.format, fallback::portfolio(self.format), self.scale, origin)
    }
}

/// Owner of the current snapshot.
pub struct Dashboard {
    refresher: Refresher,
    current: Arc<Snapshot>,
}

impl Dashboard {
    pub fn new(refresher: Refresher) -> Self {
        let current = Arc::new(refresher.fallback(Origin::Placeholder));
        Self { refresher, current }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    pub fn refresher(&self) -> Refresher {
        self.refresher.clone()
    }

    /// Replace the current snapshot with the outcome of a finished cycle.
    pub fn apply(&mut self, outcome: RefreshOutcome) -> Option<RefreshError> {
        self.current = Arc::new(outcome.snapshot);
        outcome.error
    }

    pub async fn refresh(&mut self) -> Option<RefreshError> {
        let outcome = self.refresher.run().await;
        self.apply(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttemptFailure;
    use crate::source::tests::ScriptedFetcher;

    const SHEET: &str = "https://docs.example.com/sheet/pub?output=csv";

    fn dashboard(fetcher: ScriptedFetcher, format: SheetFormat) -> Dashboard {
        let resolver = SourceResolver::new(
            Arc::new(fetcher),
            vec!["https://mirror.example.net/?{url}".to_string()],
        );
        Dashboard::new(Refresher::new(resolver, SHEET, format, WeightScale::Auto))
    }

    #[tokio::test]
    async fn test_starts_with_placeholder() {
        let dash = dashboard(ScriptedFetcher::default(), SheetFormat::Simple);
        let snapshot = dash.snapshot();
        assert_eq!(snapshot.origin, Origin::Placeholder);
        assert!(!snapshot.portfolio.is_empty());
        assert!(snapshot.warning().is_none());
    }

    #[tokio::test]
    async fn test_live_refresh_replaces_snapshot() {
        let csv = "Symbol,Shares,BuyPrice,BuyDate,CurrentPrice\nAAPL,50,180,2024-12-01,195.5\n";
        let mut dash = dashboard(
            ScriptedFetcher::default().respond(SHEET, Ok(csv.to_string())),
            SheetFormat::Simple,
        );
        let before = dash.snapshot();

        assert!(dash.refresh().await.is_none());
        let after = dash.snapshot();

        assert!(after.is_live());
        assert_eq!(after.holdings.len(), 1);
        assert_eq!(after.summary.total_market_value, 9775.0);
        assert_eq!(after.summary.total_invested, 9000.0);
        assert_eq!(after.summary.total_gain_loss, 775.0);
        // readers holding the old Arc keep the old model
        assert_eq!(before.origin, Origin::Placeholder);
    }

    #[tokio::test]
    async fn test_all_sources_failing_falls_back() {
        let mut dash = dashboard(
            ScriptedFetcher::default()
                .respond(SHEET, Err(AttemptFailure::Transport("timed out".to_string()))),
            SheetFormat::Extended,
        );

        let error = dash.refresh().await;
        assert!(matches!(
            error,
            Some(RefreshError::ResolutionExhausted { ref attempts }) if attempts.len() == 2
        ));

        let snapshot = dash.snapshot();
        assert_eq!(snapshot.portfolio, fallback::portfolio(SheetFormat::Extended));
        assert_eq!(snapshot.warning(), error.as_ref());
    }

    #[tokio::test]
    async fn test_header_only_sheet_is_empty_result() {
        let header = "Symbol,Shares,BuyPrice,BuyDate,CurrentPrice\n,,,,\n,,,,\n,,,,\n,,,,\n";
        let mut dash = dashboard(
            ScriptedFetcher::default().respond(SHEET, Ok(header.to_string())),
            SheetFormat::Simple,
        );

        assert_eq!(dash.refresh().await, Some(RefreshError::EmptyResult));
        let snapshot = dash.snapshot();
        assert_eq!(snapshot.portfolio, fallback::portfolio(SheetFormat::Simple));
        assert!(!snapshot.is_live());
    }

    #[tokio::test]
    async fn test_closed_journal_keeps_account_totals() {
        let mut header = vec![""; 24];
        header[0] = "Symbol";
        let mut sold = vec![""; 24];
        for (i, v) in [
            (0, "META"),
            (1, "2024-09-01"),
            (2, "5"),
            (3, "500"),
            (5, "550"),
            (8, "2024-11-01"),
            (9, "560"),
            (18, "10000"),
            (19, "12000"),
            (21, "March"),
            (22, "400"),
            (23, "3.4"),
        ] {
            sold[i] = v;
        }
        let csv = format!("{}\n{}\n", header.join(","), sold.join(","));
        let mut dash = dashboard(
            ScriptedFetcher::default().respond(SHEET, Ok(csv)),
            SheetFormat::Extended,
        );

        assert!(dash.refresh().await.is_none());
        let snapshot = dash.snapshot();
        assert!(snapshot.is_live());
        assert!(snapshot.holdings.is_empty());

        let info = snapshot.portfolio.info().unwrap();
        assert_eq!(info.starting_size, 10_000.0);
        assert_eq!(info.current_size, 12_000.0);
        assert_eq!(info.current_month, "March");
        assert_eq!(snapshot.summary.total_market_value, 0.0);
        assert_eq!(snapshot.summary.total_invested, 12_000.0);
    }

    #[tokio::test]
    async fn test_snapshot_sorted_view() {
        let dash = dashboard(ScriptedFetcher::default(), SheetFormat::Simple);
        let snapshot = dash.snapshot();
        let values: Vec<f64> = snapshot.by_market_value().iter().map(|h| h.market_value).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }
}
