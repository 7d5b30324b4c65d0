//! Export of a [`CategoryCalendar`] as an iCalendar file.

use chrono::NaiveDate;
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property},
    ical_param, ical_property,
};
use regex::Regex;

use crate::schedule::CategoryCalendar;

pub static CALENDAR_NAME: &str = "TrashCalendar";
pub static TIMEZONE: &str = "Europe/Warsaw";
static PROD_ID: [&str; 2] = ["TrashCalendar", "Harmonogram odbioru odpadów"];
static FORMAT: &str = "%Y%m%d";
static DATE_FORMAT: &str = "%Y-%m-%d";

/// The description of a collection event for a category.
pub fn event_description(category: &str) -> String {
    format!("Wystaw śmieci kategorii: {category}")
}

/// Parse a `YYYY-MM-DD` collection date, `None` if it is not a real date.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// Build the iCalendar with one recurring all-day event per category.
pub fn to_ical(calendar: &CategoryCalendar, source_url: Option<&str>) -> IcalCalendar {
    let changed = chrono::Local::now().format("%Y%m%dT%H%M%S").to_string();
    let mut ical_calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(prod_id())
        .build();
    for (category, dates) in calendar {
        let dates: Vec<NaiveDate> = dates
            .iter()
            .filter_map(|date| {
                let parsed = parse_date(date);
                if parsed.is_none() {
                    tracing::warn!(%category, %date, "skipping impossible date");
                }
                parsed
            })
            .collect();
        if let Some(event) = get_event(category, dates, &changed, source_url) {
            ical_calendar.events.push(event);
        }
    }
    ical_calendar
}

/// Build an event from a vector of sorted dates.
fn get_event(
    category: &str,
    dates: Vec<NaiveDate>,
    changed: &str,
    source_url: Option<&str>,
) -> Option<IcalEvent> {
    let (first, rest) = dates.split_first()?;
    let mut builder = IcalEventBuilder::tzid(TIMEZONE)
        .uid(uid(category))
        .changed(changed)
        .one_day(first.format(FORMAT).to_string())
        .set(ical_property!("SUMMARY", category))
        .set(ical_property!("DESCRIPTION", event_description(category)))
        .set(ical_property!("TRANSP", "TRANSPARENT"));
    if !rest.is_empty() {
        builder = builder.set(ical_property!(
            "RDATE",
            rest.iter()
                .map(|date| date.format(FORMAT).to_string())
                .collect::<Vec<String>>()
                .join(","),
            ical_param!("VALUE", "DATE")
        ));
    }
    if let Some(source_url) = source_url {
        builder = builder.set(ical_property!("URL", source_url));
    }
    Some(builder.build())
}

fn prod_id() -> String {
    let mut strings: Vec<String> = Vec::from(PROD_ID).into_iter().map(String::from).collect();
    strings.splice(0..0, [String::from("-")]);
    strings.join("//")
}

/// Get a unique id for the collection events of a category.
///
/// Changing this function is a breaking change!
fn uid(category: &str) -> String {
    let whitespace_regex = Regex::new(r"\s+").unwrap();
    let category = whitespace_regex.replace_all(category.trim(), "-");
    format!("{CALENDAR_NAME}_{category}")
}
