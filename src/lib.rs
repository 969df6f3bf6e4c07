//! kdvp - eDavki Doh-KDVP filings from brokerage activity exports
//!
//! This library normalizes brokerage CSV exports into trades, values them
//! in EUR with Bank of Slovenia reference rates, and serializes the result
//! as a Doh-KDVP XML document for the Slovenian tax administration.

pub mod config;
pub mod convert;
pub mod error;
pub mod filing;
pub mod importers;
pub mod models;
pub mod rates;
pub mod utils;
