use std::sync::Arc;
use std::time::Duration;

use crate::dashboard::{Dashboard, Origin, Refresher, Snapshot};
use crate::error::ConfigError;
use crate::portfolio::WeightScale;
use crate::sheet::SheetFormat;
use crate::source::{HttpFetcher, SourceResolver, DEFAULT_MIRRORS, MIN_TEXT_LENGTH};

use clap::{arg, ArgMatches, Command};
use colored::Colorize;
use serde::Deserialize;
use serde::Serialize;

mod dashboard;
mod error;
mod fallback;
mod logging;
mod portfolio;
mod position;
mod sheet;
mod source;
mod tui;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    sheet_url: String,
    format: SheetFormat,
    weight_scale: WeightScale,
    mirrors: Vec<String>,
    min_length: usize,
    timeout_secs: u64,
    currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_url: String::new(),
            format: SheetFormat::Simple,
            weight_scale: WeightScale::Auto,
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            min_length: MIN_TEXT_LENGTH,
            timeout_secs: 15,
            currency: "USD".to_string(),
        }
    }
}

impl Config {
    /// Apply command line overrides and check the result.
    fn merge(mut self, matches: &ArgMatches) -> Result<Self, ConfigError> {
        if let Some(url) = matches.get_one::<String>("url") {
            self.sheet_url.clone_from(url);
        }
        if let Some(format) = matches.get_one::<String>("format") {
            self.format = format.parse()?;
        }
        if let Some(scale) = matches.get_one::<String>("weight-scale") {
            self.weight_scale = scale.parse()?;
        }

        if self.sheet_url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        for mirror in &self.mirrors {
            source::validate_mirror(mirror)?;
        }
        Ok(self)
    }

    fn dashboard(&self) -> eyre::Result<Dashboard> {
        let fetcher = HttpFetcher::new(Duration::from_secs(self.timeout_secs))?;
        let resolver = SourceResolver::new(Arc::new(fetcher), self.mirrors.clone())
            .with_min_length(self.min_length);
        Ok(Dashboard::new(Refresher::new(
            resolver,
            self.sheet_url.trim(),
            self.format,
            self.weight_scale,
        )))
    }
}

fn cli() -> Command {
    Command::new("sheetfolio")
        .about("A portfolio dashboard for a published spreadsheet")
        .arg_required_else_help(true)
        .arg(
            arg!(--url <URL> "CSV export URL of the sheet")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--format <FORMAT> "Sheet layout: simple or extended")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"weight-scale" <SCALE> "Weight column unit: auto, fraction or percent")
                .required(false)
                .global(true),
        )
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(Command::new("summary").about("Show the portfolio summary"))
        .subcommand(Command::new("holdings").about("Show the holdings table"))
        .subcommand(Command::new("allocation").about("Show the allocation of your portfolio"))
        .subcommand(Command::new("export").about("Print the current snapshot as JSON"))
        .subcommand(
            Command::new("tui")
                .about("Open the interactive dashboard")
                .arg(arg!(--tab <TAB> "Tab to open: overview or holdings").required(false)),
        )
}

fn print_origin(snapshot: &Snapshot) {
    let refreshed = snapshot.refreshed_at.format("%Y-%m-%d %H:%M:%S");
    match &snapshot.origin {
        Origin::Live { source } => {
            println!("{}", format!("Last refreshed {refreshed} via {}", source.label).dimmed())
        }
        Origin::Fallback { error } => println!(
            "{}",
            format!("Example data shown at {refreshed} ({error})").dimmed()
        ),
        Origin::Placeholder => println!("{}", format!("Example data shown at {refreshed}").dimmed()),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let matches = cli().get_matches();

    if matches.subcommand_matches("config").is_some() {
        let path = confy::get_configuration_file_path("sheetfolio", "config")?;
        println!("Your config file is located here: \n{}", path.display());
        return Ok(());
    }

    let Some((subcommand, sub_matches)) = matches.subcommand() else {
        cli().print_help()?;
        return Ok(());
    };

    let log_file = logging::init_logging(subcommand == "tui");

    let cfg: Config = confy::load("sheetfolio", "config")?;
    let cfg = match cfg.merge(sub_matches) {
        Ok(cfg) => cfg,
        Err(ConfigError::MissingUrl) => {
            eprintln!("{}", ConfigError::MissingUrl.to_string().yellow());
            cli().print_help()?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut dashboard = cfg.dashboard()?;

    if subcommand == "tui" {
        let tab = sub_matches
            .get_one::<String>("tab")
            .and_then(|t| tui::Tab::from_str(t));
        tui::run_tui(dashboard, cfg.currency.clone(), tab)
            .await
            .map_err(|e| eyre::eyre!("{e}"))?;
        if let Some(path) = log_file {
            println!("Log written to {}", path.display());
        }
        return Ok(());
    }

    if let Some(error) = dashboard.refresh().await {
        eprintln!(
            "{}",
            format!("Warning: {error}. Showing the example portfolio instead.").yellow()
        );
        for line in error.details() {
            eprintln!("  {}", line.dimmed());
        }
    }
    let snapshot = dashboard.snapshot();

    match subcommand {
        "summary" => {
            snapshot.portfolio.print_summary(&cfg.currency);
            print_origin(&snapshot);
        }
        "holdings" => {
            snapshot.portfolio.print(cfg.weight_scale, true);
            print_origin(&snapshot);
        }
        "allocation" => {
            snapshot.portfolio.draw_pie_chart(cfg.weight_scale);
            snapshot.portfolio.print_allocation(cfg.weight_scale);
        }
        "export" => {
            println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        }
        _ => (),
    }

    Ok(())
}
