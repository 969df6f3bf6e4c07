use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use kdvp::config::FileConfig;
use kdvp::convert::convert_all;
use kdvp::error::FilingError;
use kdvp::filing::{
    self, assemble, emit, normalize_renames, previous_year, write_document, AssembleOptions,
    FilingPeriod, FilingWarning, HeaderFields, IsinTable, Taxpayer,
};
use kdvp::importers::import_file;
use kdvp::rates::{BsiRateCache, RateResolver};

use super::formatters;
use super::Cli;

/// Ticker,ISIN table looked up when no path is configured
const DEFAULT_ISIN_DB: &str = "db/isin.csv";

/// Build the filing described by the command line
pub fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let source = cli.format.or(config.filing.format).unwrap_or_default();
    let schema = cli.schema.or(config.filing.schema).unwrap_or_default();
    let output = output_path(&cli.input, cli.output.as_deref())?;

    let report = import_file(
        &cli.input,
        source.descriptor(),
        config.conversion.tolerance,
    )?;

    let cache = match cli.rates_cache.as_ref().or(config.rates.cache.as_ref()) {
        Some(path) => BsiRateCache::new(path, config.rates.url.clone()),
        None => BsiRateCache::default_location()?.with_url(config.rates.url.clone()),
    };
    if cli.refresh_rates {
        cache.refresh()?;
    }
    if let Some(meta) = cache.read_meta()? {
        debug!("Rate list fetched {} from {}", meta.fetched_at, meta.source_url);
    }
    let resolver = RateResolver::new(cache, config.conversion.domestic_currency.clone());
    let converted = convert_all(&report.transactions, &resolver, config.conversion.rounding)?;

    let isin = if schema.descriptor().requires_isin {
        Some(load_isin_table(
            cli.isin_db.as_deref().or(config.tickers.isin_db.as_deref()),
        )?)
    } else {
        None
    };

    let fields = HeaderFields {
        taxpayer: Taxpayer {
            tax_number: cli.tax_number.clone(),
            name: cli.fullname.clone(),
            address: cli.address.clone(),
            post_number: cli.zip.clone(),
            city: cli.city.clone(),
            birth_date: cli.dob,
            phone: cli.tel.clone(),
            email: cli.email.clone(),
        },
        period: filing_period(cli, &config)?,
        workflow: config.filing.workflow,
        is_resident: config.filing.is_resident,
    };
    let options = AssembleOptions {
        renames: normalize_renames(&config.tickers.renames),
        loss_rule: config.filing.loss_rule,
        isin,
    };

    let mut warnings: Vec<FilingWarning> =
        report.skipped.into_iter().map(FilingWarning::from).collect();
    let assembled = assemble(converted, fields, &options);
    warnings.extend(assembled.warnings);
    let document = assembled.document;

    let bytes = emit(&document, schema.descriptor())?;

    if cli.dry_run {
        print!("{}", formatters::format_filing_table(&document));
        eprint!("{}", formatters::format_warnings(&warnings));
        print!("{}", formatters::format_dry_run());
        return Ok(());
    }

    write_document(&output, &bytes)?;
    eprint!("{}", formatters::format_warnings(&warnings));
    print!("{}", formatters::format_written(&document, &output));
    if document.items.is_empty() {
        println!("  {}", "No securities with sales in this export".yellow());
    }
    Ok(())
}

/// Explicit output, else the input path with an `.xml` extension
fn output_path(input: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    let output = match explicit {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("xml"),
    };
    if output == input {
        return Err(FilingError::Config(format!(
            "output would overwrite the input file {}; pass --output",
            input.display()
        ))
        .into());
    }
    Ok(output)
}

fn filing_period(cli: &Cli, config: &FileConfig) -> Result<FilingPeriod> {
    let year = cli
        .year
        .or(config.filing.year)
        .unwrap_or_else(|| previous_year(Local::now().date_naive()));
    let mut period = FilingPeriod::calendar_year(year)
        .with_context(|| format!("Invalid filing year {}", year))?;
    if let Some(start) = config.filing.period_start {
        period.start = start;
    }
    if let Some(end) = config.filing.period_end {
        period.end = end;
    }
    if period.start > period.end {
        return Err(FilingError::Config(format!(
            "filing period starts after it ends ({} > {})",
            period.start, period.end
        ))
        .into());
    }
    info!("Filing period {} to {}", period.start, period.end);
    Ok(period)
}

/// A configured table must exist; the default one is optional
fn load_isin_table(configured: Option<&Path>) -> Result<IsinTable> {
    match configured {
        Some(path) => IsinTable::load(path),
        None => {
            let path = Path::new(DEFAULT_ISIN_DB);
            if path.exists() {
                IsinTable::load(path)
            } else {
                warn!("No ISIN table at {}", DEFAULT_ISIN_DB);
                eprint!(
                    "{}",
                    formatters::format_notice(&format!(
                        "No ISIN table at {}, every ISIN will be {}",
                        DEFAULT_ISIN_DB,
                        filing::MISSING_ISIN
                    ))
                );
                Ok(IsinTable::default())
            }
        }
    }
}
