use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use kdvp::filing::SchemaVersion;
use kdvp::importers::SourceKind;

pub mod formatters;
pub mod runner;

#[derive(Parser, Debug)]
#[command(name = "kdvp")]
#[command(
    version,
    about = "Generate an eDavki Doh-KDVP capital gains filing from a brokerage activity export"
)]
#[command(
    long_about = "Reads a brokerage activity CSV, values every buy and sell in EUR using the Bank of Slovenia reference rate of the trade date, and writes a Doh-KDVP XML document ready for import into eDavki."
)]
pub struct Cli {
    /// Activity CSV file
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Tax number
    #[arg(long = "id", value_name = "TAX_NUMBER")]
    pub tax_number: String,

    /// Full name
    #[arg(long)]
    pub fullname: String,

    /// Address
    #[arg(long)]
    pub address: String,

    /// Postal code
    #[arg(long)]
    pub zip: String,

    /// City
    #[arg(long)]
    pub city: String,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long, value_parser = parse_iso_date)]
    pub dob: NaiveDate,

    /// Telephone
    #[arg(long)]
    pub tel: String,

    /// Email
    #[arg(long)]
    pub email: String,

    /// Activity export variant
    #[arg(long, value_enum)]
    pub format: Option<SourceKind>,

    /// Target eDavki schema
    #[arg(long, value_enum)]
    pub schema: Option<SchemaVersion>,

    /// Filing year (default: previous calendar year)
    #[arg(long)]
    pub year: Option<i32>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ticker,ISIN reference table (for schemas that need ISINs)
    #[arg(long, value_name = "FILE")]
    pub isin_db: Option<PathBuf>,

    /// Output file (default: input path with .xml extension)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exchange rate cache file
    #[arg(long, value_name = "FILE")]
    pub rates_cache: Option<PathBuf>,

    /// Download the exchange rate list again before converting
    #[arg(long)]
    pub refresh_rates: bool,

    /// Build the filing and print a preview, don't write the XML
    #[arg(short, long)]
    pub dry_run: bool,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

fn parse_iso_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", value))
}
