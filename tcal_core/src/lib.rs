//! This crate turns a municipal waste collection schedule, published as an HTML table,
//! into collection dates per waste category.
//!
//! The extraction lives in [`table`], the date normalization in [`schedule`].
//! [`schedule_client`] fetches a schedule page and [`ical_export`] writes the result
//! as an iCalendar file.

pub use ical;

pub mod error;
pub mod ical_export;
pub mod schedule;
pub mod schedule_client;
pub mod table;

pub use error::{Error, Result};
