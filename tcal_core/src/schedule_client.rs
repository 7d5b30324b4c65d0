//! This client fetches a published schedule page and parses it into collection dates.

use std::time::Duration;

use url::Url;

use crate::{
    error::{Error, Result},
    schedule::{normalize, CategoryCalendar, ScheduleOptions},
    table::{extract_records, Record},
};

static TIMEOUT: Duration = Duration::from_secs(10);

/// Both views of a scraped schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// The table rows as scraped, for display.
    pub records: Vec<Record>,
    pub calendar: CategoryCalendar,
}

/// Check that the link points to a schedule page served over https.
pub fn validate_link(link: &str) -> Result<Url> {
    let url = Url::parse(link.trim()).map_err(|_| Error::InvalidLink(link.to_string()))?;
    if url.scheme() != "https" || !url.as_str().ends_with("html") {
        return Err(Error::InvalidLink(link.to_string()));
    }
    Ok(url)
}

/// Get the schedule page text.
pub async fn fetch_page(client: &reqwest::Client, url: &Url) -> Result<String> {
    let host = url.host_str().unwrap_or_default().to_string();
    let map_err = |err: reqwest::Error| {
        if err.is_timeout() {
            Error::Timeout(host.clone())
        } else {
            Error::Http(err)
        }
    };
    tracing::info!(%url, "fetching schedule page");
    let response = client
        .get(url.clone())
        .timeout(TIMEOUT)
        .send()
        .await
        .map_err(map_err)?
        .error_for_status()?;
    let text = response.text().await.map_err(map_err)?;
    Ok(text)
}

/// Parse a schedule page into its records and its calendar.
pub fn parse(html: &str, options: &ScheduleOptions) -> Result<Schedule> {
    let records = extract_records(html, &options.selector, options.row_shape)?;
    let calendar = normalize(&records, options)?;
    Ok(Schedule { records, calendar })
}

/// Get the schedule published at `link`.
pub async fn get(
    client: &reqwest::Client,
    link: &str,
    options: &ScheduleOptions,
) -> Result<Schedule> {
    let url = validate_link(link)?;
    let html = fetch_page(client, &url).await?;
    parse(&html, options)
}
