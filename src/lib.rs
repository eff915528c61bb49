//! A small Rust client for the Swrve Export (Non-Client) APIs.
//!
//! This crate implements a `pyswrve`-style flow: configure credentials,
//! pick a query window, then pull KPI/event/item stats or mirror the
//! UserDB export files to disk.
//!
//! ## Quick start
//! - Configure authentication explicitly, via environment variables
//!   (`SWRVE_API_KEY`, `SWRVE_PERSONAL_KEY`), or a `~/.swrve` file with
//!   named `[section]`s.
//! - Build an [`ApiClient`] and wrap it in the accessor you need.
//!
//! ```no_run
//! use anyhow::Result;
//! use chrono::NaiveDate;
//! use swrve_export::{ApiClient, Credentials, ExportApi, KpiOptions, QueryWindow, Region};
//!
//! fn main() -> Result<()> {
//!     let credentials = Credentials::resolve(None, None, None, None)?;
//!     let client = ApiClient::new(Region::Us, credentials)?;
//!
//!     let window = QueryWindow::new(
//!         NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2017, 1, 7).unwrap(),
//!     )?;
//!     let export = ExportApi::new(client).with_window(window);
//!
//!     for (date, value) in export.kpi("dau", &KpiOptions::default())? {
//!         println!("{date} {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For full usage and configuration details, see the crate README.

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod export;
mod items;
mod reshape;
mod userdb;
mod util;
mod window;

pub use client::{ApiClient, Region};
pub use config::Credentials;
pub use download::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WORKER_COUNT, Downloader, Outcome};
pub use error::ApiError;
pub use export::{CohortType, ExportApi, ItemFilter, KpiOptions, PayloadSeries, Series};
pub use items::ItemsApi;
pub use reshape::{PayloadRow, WeekBucket, aggregate_weeks, per_capita, pivot_payloads};
pub use userdb::{ExportReport, UrlSet, UserDbManifest, UserdbApi};
pub use window::{Period, QueryWindow, parse_date_label};
