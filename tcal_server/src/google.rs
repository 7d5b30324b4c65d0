//! Creating the collection events in the user's Google Calendar.
//!
//! Every sync replaces the calendar: existing calendars named [`CALENDAR_NAME`]
//! are deleted and a new one is created before the events are added.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tcal_core::{
    ical_export::{event_description, parse_date, CALENDAR_NAME, TIMEZONE},
    schedule::CategoryCalendar,
};
use url::Url;

use crate::error::{AppError, AppResult};

static API_URL: &str = "https://www.googleapis.com/calendar/v3/";
static CALENDAR_DESCRIPTION: &str = "Kalendarz utworzony przez aplikację TrashCalendar";
static START_TIME: &str = "06:00:00";
static END_TIME: &str = "16:00:00";
/// Pause between two event creations.
static EVENT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Deserialize)]
struct CalendarList {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CalendarListEntry {
    id: String,
    summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewCalendar<'a> {
    summary: &'a str,
    description: &'a str,
    time_zone: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct CreatedCalendar {
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub summary: String,
    pub description: String,
    pub reminders: Reminders,
    pub source: Source,
    pub start: EventTime,
    pub end: EventTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    pub overrides: Vec<Reminder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub method: &'static str,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

impl Event {
    /// The collection event of `category` on `date`.
    pub fn collection(category: &str, date: NaiveDate, source_url: &str) -> Self {
        let at = |time: &str| EventTime {
            date_time: format!("{}T{time}", date.format("%Y-%m-%d")),
            time_zone: String::from(TIMEZONE),
        };
        Self {
            summary: category.to_string(),
            description: event_description(category),
            reminders: Reminders {
                use_default: false,
                overrides: vec![
                    Reminder {
                        method: "email",
                        minutes: 60 * 18,
                    },
                    Reminder {
                        method: "popup",
                        minutes: 60 * 12,
                    },
                ],
            },
            source: Source {
                title: String::from(CALENDAR_NAME),
                url: source_url.to_string(),
            },
            start: at(START_TIME),
            end: at(END_TIME),
        }
    }
}

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted_calendars: Vec<String>,
    pub created_calendar: Option<String>,
    /// Category and date of every created event.
    pub created_events: Vec<(String, NaiveDate)>,
    /// Dates before the sync day.
    pub past_dates: usize,
    /// Dates which do not exist, like the 31st of February.
    pub invalid_dates: Vec<(String, String)>,
}

/// The events to create for a calendar, in category and date order.
///
/// Dates before `today` are left out.
pub fn plan_events(
    calendar: &CategoryCalendar,
    today: NaiveDate,
) -> (Vec<(String, NaiveDate)>, SyncReport) {
    let mut report = SyncReport::default();
    let mut events = vec![];
    for (category, dates) in calendar {
        for date in dates {
            match parse_date(date) {
                Some(date) if date < today => report.past_dates += 1,
                Some(date) => events.push((category.clone(), date)),
                None => {
                    tracing::warn!(%category, %date, "skipping impossible date");
                    report.invalid_dates.push((category.clone(), date.clone()));
                }
            }
        }
    }
    (events, report)
}

/// A client for the Google Calendar API acting for one user.
pub struct CalendarSync<'a> {
    client: &'a reqwest::Client,
    access_token: &'a str,
    source_url: &'a str,
    api_url: Url,
    event_delay: Duration,
}

impl<'a> CalendarSync<'a> {
    pub fn new(client: &'a reqwest::Client, access_token: &'a str, source_url: &'a str) -> Self {
        Self {
            client,
            access_token,
            source_url,
            api_url: Url::parse(API_URL).expect("API_URL is a valid URL"),
            event_delay: EVENT_DELAY,
        }
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: Url, event_delay: Duration) -> Self {
        self.api_url = api_url;
        self.event_delay = event_delay;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("calendar API URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn list_calendars(&self) -> AppResult<Vec<CalendarListEntry>> {
        let calendar_list: CalendarList = self
            .client
            .get(self.endpoint(&["users", "me", "calendarList"])?)
            .bearer_auth(self.access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AppError::upstream("calendar"))?
            .json()
            .await
            .map_err(AppError::upstream("calendar"))?;
        Ok(calendar_list.items)
    }

    async fn delete_calendar(&self, id: &str) -> AppResult<()> {
        self.client
            .delete(self.endpoint(&["calendars", id])?)
            .bearer_auth(self.access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AppError::upstream("calendar"))?;
        Ok(())
    }

    async fn create_calendar(&self) -> AppResult<String> {
        let created: CreatedCalendar = self
            .client
            .post(self.endpoint(&["calendars"])?)
            .bearer_auth(self.access_token)
            .json(&NewCalendar {
                summary: CALENDAR_NAME,
                description: CALENDAR_DESCRIPTION,
                time_zone: TIMEZONE,
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AppError::upstream("calendar"))?
            .json()
            .await
            .map_err(AppError::upstream("calendar"))?;
        Ok(created.id)
    }

    async fn create_event(&self, calendar_id: &str, event: &Event) -> AppResult<()> {
        self.client
            .post(self.endpoint(&["calendars", calendar_id, "events"])?)
            .bearer_auth(self.access_token)
            .json(event)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(AppError::upstream("calendar"))?;
        Ok(())
    }

    /// Replace the user's collection calendar with the dates from `calendar` not before `today`.
    pub async fn run(
        &self,
        calendar: &CategoryCalendar,
        today: NaiveDate,
    ) -> AppResult<SyncReport> {
        let (events, mut report) = plan_events(calendar, today);
        for listed in self.list_calendars().await? {
            if listed.summary.as_deref() == Some(CALENDAR_NAME) {
                self.delete_calendar(&listed.id).await?;
                tracing::info!(id = %listed.id, "deleted calendar");
                report.deleted_calendars.push(listed.id);
            }
        }
        let calendar_id = self.create_calendar().await?;
        tracing::info!(id = %calendar_id, "created calendar");
        for (index, (category, date)) in events.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.event_delay).await;
            }
            let event = Event::collection(&category, date, self.source_url);
            self.create_event(&calendar_id, &event).await?;
            tracing::debug!(%category, %date, "created event");
            report.created_events.push((category, date));
        }
        report.created_calendar = Some(calendar_id);
        Ok(report)
    }
}
