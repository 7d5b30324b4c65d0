//! HTML rendering of the pages.

use html_escape::{encode_double_quoted_attribute, encode_text};
use tcal_core::{schedule::CategoryCalendar, schedule_client::Schedule, table::Record};

use crate::{google::SyncReport, session::UserProfile};

/// What the index page shows below the form.
#[derive(Debug)]
pub enum Content<'a> {
    Schedule(&'a Schedule),
    Error(String),
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"pl\">\n<head>\n<meta charset=\"utf-8\">\n<title>TrashCalendar</title>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn user_bar(user: Option<&UserProfile>) -> String {
    match user {
        Some(user) => {
            let name = user.name.as_deref().unwrap_or(&user.email);
            let picture = user
                .picture
                .as_deref()
                .map(|picture| {
                    format!(
                        "<img src=\"{}\" alt=\"\" width=\"32\" height=\"32\"> ",
                        encode_double_quoted_attribute(picture)
                    )
                })
                .unwrap_or_default();
            format!(
                "<p>{picture}Zalogowano jako {} <a href=\"/logout\">Wyloguj</a></p>\n",
                encode_text(name)
            )
        }
        None => String::from("<p><a href=\"/login\">Zaloguj przez Google</a></p>\n"),
    }
}

fn calendar_list(calendar: &CategoryCalendar) -> String {
    let mut html = String::from("<ul>\n");
    for (category, dates) in calendar {
        let dates: Vec<&str> = dates.iter().map(String::as_str).collect();
        html.push_str(&format!(
            "<li><b>{}</b>: {}</li>\n",
            encode_text(category),
            encode_text(&dates.join(", "))
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn record_table(records: &[Record]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let mut html = String::from("<table border=\"1\">\n<tr>");
    for (name, _) in first.iter() {
        html.push_str(&format!("<th>{}</th>", encode_text(name)));
    }
    html.push_str("</tr>\n");
    for record in records {
        html.push_str("<tr>");
        for (_, value) in record.iter() {
            html.push_str(&format!("<td>{}</td>", encode_text(value)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

/// The start page with the schedule link form.
pub fn index(user: Option<&UserProfile>, content: Option<&Content>) -> String {
    let mut body = String::from("<h1>TrashCalendar</h1>\n");
    body.push_str(&user_bar(user));
    body.push_str(
        "<form method=\"post\" action=\"/\">\n<input type=\"url\" name=\"link\" placeholder=\"https://...html\" required>\n<button type=\"submit\">Pobierz harmonogram</button>\n</form>\n",
    );
    match content {
        Some(Content::Schedule(schedule)) => {
            body.push_str(&calendar_list(&schedule.calendar));
            body.push_str(
                "<p><a href=\"/calendar\">Utwórz TrashCalendar w Google Calendar</a> | <a href=\"/calendar.ics\">Pobierz plik iCalendar</a></p>\n",
            );
            body.push_str(&record_table(&schedule.records));
        }
        Some(Content::Error(message)) => {
            body.push_str(&format!("<p class=\"error\">{}</p>\n", encode_text(message)));
        }
        None => {}
    }
    layout(&body)
}

/// The result of a calendar sync, one line per action.
pub fn sync_report(report: &SyncReport) -> String {
    let mut lines = vec![];
    for id in &report.deleted_calendars {
        lines.push(format!("Deleted TrashCalendar ({}).", encode_text(id)));
    }
    if let Some(id) = &report.created_calendar {
        lines.push(format!("Created TrashCalendar ({}).", encode_text(id)));
    }
    for (category, date) in &report.created_events {
        lines.push(format!(
            "Created event ({}, {date}).",
            encode_text(category)
        ));
    }
    for (category, date) in &report.invalid_dates {
        lines.push(format!(
            "Skipped impossible date ({}, {}).",
            encode_text(category),
            encode_text(date)
        ));
    }
    if report.past_dates > 0 {
        lines.push(format!("Skipped {} past dates.", report.past_dates));
    }
    layout(&format!("{}<br/>\n", lines.join("<br/>\n")))
}

pub fn error(message: &str) -> String {
    layout(&format!(
        "<p class=\"error\">{}</p>\n<p><a href=\"/\">Powrót</a></p>\n",
        encode_text(message)
    ))
}
