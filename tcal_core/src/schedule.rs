//! Normalization of the scraped schedule into collection dates per waste category.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    table::{Record, RowShapePolicy},
};

/// The column holding the `"<MONTH> <YEAR>"` label of a row.
pub static PERIOD_COLUMN: &str = "Miesiąc";

/// The container whose first child is the schedule table.
pub static TABLE_SELECTOR: &str = "div.tableTemplate";

/// Month names as printed in the schedule, January first.
pub static MONTHS_PL: [&str; 12] = [
    "STYCZEŃ",
    "LUTY",
    "MARZEC",
    "KWIECIEŃ",
    "MAJ",
    "CZERWIEC",
    "LIPIEC",
    "SIERPIEŃ",
    "WRZESIEŃ",
    "PAŹDZIERNIK",
    "LISTOPAD",
    "GRUDZIEŃ",
];

/// Where to find the schedule and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOptions {
    pub selector: String,
    pub period_column: String,
    pub months: [String; 12],
    pub row_shape: RowShapePolicy,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            selector: String::from(TABLE_SELECTOR),
            period_column: String::from(PERIOD_COLUMN),
            months: MONTHS_PL.map(String::from),
            row_shape: RowShapePolicy::default(),
        }
    }
}

/// The month a schedule row applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub year: u16,
    /// 1-based
    pub month: u8,
}

impl Period {
    /// Parse a `"<MONTH> <YEAR>"` label, the month name being an exact member of `months`.
    pub fn parse(value: &str, months: &[String; 12]) -> Result<Self> {
        let mut tokens = value.split_whitespace();
        let (Some(month), Some(year), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(Error::InvalidPeriod(value.to_string()));
        };
        let index = months
            .iter()
            .position(|name| name == month)
            .ok_or_else(|| Error::UnknownMonth(month.to_string()))?;
        if year.len() != 4 || !year.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(Error::InvalidPeriod(value.to_string()));
        }
        let year = year
            .parse()
            .map_err(|_| Error::InvalidPeriod(value.to_string()))?;
        Ok(Self {
            year,
            month: index as u8 + 1,
        })
    }

    /// Format a day of this period as `YYYY-MM-DD`.
    ///
    /// The day is not checked against the length of the month.
    pub fn date(&self, day: u8) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, day)
    }
}

/// A schedule row split into its period and the collection days per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub period: Period,
    pub days: Vec<(String, Vec<u8>)>,
}

impl ScheduleEntry {
    pub fn from_record(record: &Record, options: &ScheduleOptions) -> Result<Self> {
        let period_value = record
            .get(&options.period_column)
            .ok_or_else(|| Error::MissingField(options.period_column.clone()))?;
        let period = Period::parse(period_value, &options.months)?;
        let mut days = vec![];
        for (category, value) in record.iter() {
            if category == options.period_column || value.is_empty() {
                continue;
            }
            let category_days = value
                .split(',')
                .map(|token| {
                    parse_day(token.trim()).ok_or_else(|| Error::InvalidDay {
                        category: category.to_string(),
                        day: token.trim().to_string(),
                    })
                })
                .collect::<Result<Vec<u8>>>()?;
            days.push((category.to_string(), category_days));
        }
        Ok(Self { period, days })
    }
}

/// Accept a one or two digit day numeral between 1 and 31.
fn parse_day(token: &str) -> Option<u8> {
    if token.is_empty() || token.len() > 2 || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let day: u8 = token.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

/// Collection dates (`YYYY-MM-DD`) per waste category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCalendar(BTreeMap<String, BTreeSet<String>>);

impl CategoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add dates to a category, keeping the dates already present.
    pub fn extend<I>(&mut self, category: &str, dates: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.0.entry(category.to_string()).or_default().extend(dates);
    }

    /// Union every category of `other` into this calendar.
    pub fn merge(&mut self, other: CategoryCalendar) {
        for (category, dates) in other.0 {
            self.extend(&category, dates);
        }
    }

    /// Drop the listed categories.
    pub fn exclude<S: AsRef<str>>(&mut self, categories: &[S]) {
        self.0
            .retain(|category, _| !categories.iter().any(|excluded| excluded.as_ref() == category));
    }

    pub fn get(&self, category: &str) -> Option<&BTreeSet<String>> {
        self.0.get(category)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, BTreeSet<String>> {
        self.0.iter()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of dates over all categories.
    pub fn date_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }
}

impl<'a> IntoIterator for &'a CategoryCalendar {
    type Item = (&'a String, &'a BTreeSet<String>);
    type IntoIter = btree_map::Iter<'a, String, BTreeSet<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build the calendar from the extracted records.
pub fn normalize(records: &[Record], options: &ScheduleOptions) -> Result<CategoryCalendar> {
    let mut calendar = CategoryCalendar::new();
    for record in records {
        let entry = ScheduleEntry::from_record(record, options)?;
        for (category, days) in entry.days {
            calendar.extend(&category, days.into_iter().map(|day| entry.period.date(day)));
        }
    }
    tracing::debug!(
        categories = calendar.len(),
        dates = calendar.date_count(),
        "normalized schedule"
    );
    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::{
        error::Error,
        schedule::{normalize, CategoryCalendar, Period, ScheduleEntry, ScheduleOptions},
        table::{extract_records, Record, RowShapePolicy},
    };

    fn dates(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_period_parse() {
        let options = ScheduleOptions::default();
        let period = Period::parse("PAŹDZIERNIK 2023", &options.months).unwrap();
        assert_eq!(
            period,
            Period {
                year: 2023,
                month: 10
            }
        );
        assert_eq!(period.date(3), "2023-10-03");
        assert_eq!(period.date(15), "2023-10-15");
    }

    #[test]
    fn test_period_parse_is_case_sensitive() {
        let options = ScheduleOptions::default();
        let result = Period::parse("Styczeń 2024", &options.months);
        assert!(matches!(result, Err(Error::UnknownMonth(month)) if month == "Styczeń"));
    }

    #[test]
    fn test_period_parse_invalid() {
        let options = ScheduleOptions::default();
        for value in ["STYCZEŃ", "STYCZEŃ 24", "STYCZEŃ 2024 r.", "STYCZEŃ 2O24", ""] {
            let result = Period::parse(value, &options.months);
            assert!(matches!(result, Err(Error::InvalidPeriod(_))), "{value}");
        }
    }

    #[test]
    fn test_normalize_round_trip() {
        let records = vec![Record::from_iter([
            ("Miesiąc", "STYCZEŃ 2024"),
            ("Szkło", "1, 15,3"),
        ])];
        let calendar = normalize(&records, &ScheduleOptions::default()).unwrap();
        assert_eq!(calendar.len(), 1);
        assert_eq!(
            calendar.get("Szkło"),
            Some(&dates(&["2024-01-01", "2024-01-15", "2024-01-03"]))
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let records = vec![
            Record::from_iter([("Miesiąc", "MAJ 2024"), ("Bio", "2, 16, 30")]),
            Record::from_iter([("Miesiąc", "CZERWIEC 2024"), ("Bio", "13,27")]),
        ];
        let options = ScheduleOptions::default();
        let first = normalize(&records, &options).unwrap();
        let second = normalize(&records, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize_unions_categories() {
        let records = vec![
            Record::from_iter([("Miesiąc", "STYCZEŃ 2024"), ("A", "1")]),
            Record::from_iter([("Miesiąc", "STYCZEŃ 2024"), ("A", "2, 1")]),
        ];
        let calendar = normalize(&records, &ScheduleOptions::default()).unwrap();
        assert_eq!(calendar.get("A"), Some(&dates(&["2024-01-01", "2024-01-02"])));
    }

    #[test]
    fn test_merge_unions_categories() {
        let mut calendar = CategoryCalendar::new();
        calendar.extend("A", [String::from("2024-01-01")]);
        let mut other = CategoryCalendar::new();
        other.extend("A", [String::from("2024-01-02")]);
        other.extend("B", [String::from("2024-01-03")]);
        calendar.merge(other);
        assert_eq!(calendar.get("A"), Some(&dates(&["2024-01-01", "2024-01-02"])));
        assert_eq!(calendar.get("B"), Some(&dates(&["2024-01-03"])));
        assert_eq!(calendar.date_count(), 3);

        calendar.exclude(&["B", "C"]);
        assert_eq!(calendar.categories().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_normalize_skips_empty_cells() {
        let records = vec![Record::from_iter([
            ("Miesiąc", "LUTY 2024"),
            ("Szkło", "5"),
            ("Gabaryty", ""),
        ])];
        let calendar = normalize(&records, &ScheduleOptions::default()).unwrap();
        assert!(calendar.get("Gabaryty").is_none());
        assert_eq!(calendar.categories().collect::<Vec<_>>(), vec!["Szkło"]);
    }

    #[test]
    fn test_normalize_rejects_unknown_month() {
        let records = vec![Record::from_iter([("Miesiąc", "FOO 2024"), ("A", "1")])];
        let result = normalize(&records, &ScheduleOptions::default());
        assert!(matches!(result, Err(Error::UnknownMonth(month)) if month == "FOO"));
    }

    #[test]
    fn test_normalize_rejects_missing_period() {
        let records = vec![Record::from_iter([("Month", "STYCZEŃ 2024"), ("A", "1")])];
        let result = normalize(&records, &ScheduleOptions::default());
        assert!(matches!(result, Err(Error::MissingField(field)) if field == "Miesiąc"));
    }

    #[test]
    fn test_normalize_rejects_invalid_days() {
        let options = ScheduleOptions::default();
        for value in ["1, x", "1,,2", "32", "0", "123", "1.5", "-1"] {
            let records = vec![Record::from_iter([("Miesiąc", "MARZEC 2024"), ("A", value)])];
            let result = normalize(&records, &options);
            assert!(
                matches!(result, Err(Error::InvalidDay { ref category, .. }) if category == "A"),
                "{value}"
            );
        }
    }

    #[test]
    fn test_schedule_entry_days() {
        let record = Record::from_iter([
            ("Miesiąc", "LUTY 2024"),
            ("Papier", " 9 "),
            ("Bio", "1 ,31"),
        ]);
        let entry = ScheduleEntry::from_record(&record, &ScheduleOptions::default()).unwrap();
        assert_eq!(
            entry.period,
            Period {
                year: 2024,
                month: 2
            }
        );
        assert_eq!(
            entry.days,
            vec![
                (String::from("Papier"), vec![9]),
                (String::from("Bio"), vec![1, 31])
            ]
        );
        // days are not checked against the month length
        assert_eq!(entry.period.date(31), "2024-02-31");
    }

    #[test]
    fn test_custom_period_column_and_months() {
        let mut options = ScheduleOptions::default();
        options.period_column = String::from("Month");
        options.months = [
            "JANUARY",
            "FEBRUARY",
            "MARCH",
            "APRIL",
            "MAY",
            "JUNE",
            "JULY",
            "AUGUST",
            "SEPTEMBER",
            "OCTOBER",
            "NOVEMBER",
            "DECEMBER",
        ]
        .map(String::from);
        let records = vec![Record::from_iter([("Month", "DECEMBER 2025"), ("Glass", "24")])];
        let calendar = normalize(&records, &options).unwrap();
        assert_eq!(calendar.get("Glass"), Some(&dates(&["2025-12-24"])));
    }

    /// Test extraction and normalization against a saved schedule page.
    ///
    /// This test is offline.
    #[test]
    fn test_normalize_schedule_page() {
        let html = include_str!("table/tests/schedule.html");
        let options = ScheduleOptions::default();
        let records = extract_records(html, &options.selector, RowShapePolicy::Strict).unwrap();
        let calendar = normalize(&records, &options).unwrap();
        assert_eq!(calendar.len(), 5);
        assert_eq!(
            calendar.get("Zmieszane"),
            Some(&dates(&[
                "2024-01-02",
                "2024-01-16",
                "2024-01-30",
                "2024-02-13",
                "2024-02-27",
                "2024-03-12",
                "2024-03-26",
            ]))
        );
        assert_eq!(
            calendar.get("Bio"),
            Some(&dates(&[
                "2024-01-03",
                "2024-01-17",
                "2024-01-31",
                "2024-02-14",
                "2024-02-28",
                "2024-03-13",
                "2024-03-27",
            ]))
        );
        assert_eq!(calendar.get("Gabaryty"), Some(&dates(&["2024-01-12"])));
        assert_eq!(calendar.date_count(), 7 + 3 + 3 + 7 + 1);
    }

    #[test]
    fn test_category_calendar_json() {
        let mut calendar = CategoryCalendar::new();
        calendar.extend("Szkło", [String::from("2024-01-15"), String::from("2024-01-03")]);
        let json = serde_json::to_string(&calendar).unwrap();
        assert_eq!(json, r#"{"Szkło":["2024-01-03","2024-01-15"]}"#);
        let parsed: CategoryCalendar = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, calendar);
    }
}
