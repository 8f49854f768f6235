use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    Invalid(String),
    #[error("Start date {start} is after end date {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },
    #[error("No week-long range fits after {0}")]
    OutOfRange(NaiveDate),
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| DateRangeError::Invalid(input.trim().to_string()))
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// The last complete Monday–Sunday week before the week containing `reference`.
pub fn previous_week(reference: NaiveDate) -> DateRange {
    let start = week_start(reference) - Duration::days(7);
    DateRange {
        start,
        end: start + Duration::days(6),
    }
}

/// Fill in whichever ends of the range were not given on the command line.
///
/// `ask` is called with a prompt and the default for that end and returns the
/// user's answer; an empty answer accepts the default.
pub fn resolve_date_range<F>(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    reference: NaiveDate,
    mut ask: F,
) -> Result<DateRange, DateRangeError>
where
    F: FnMut(&str, NaiveDate) -> String,
{
    let defaults = previous_week(reference);

    let start = match start {
        Some(date) => date,
        None => answer_or_default(ask("Start date", defaults.start), defaults.start)?,
    };
    let end = match end {
        Some(date) => date,
        None => {
            // Keep the default a week long when the user moved the start.
            let default_end = if start == defaults.start {
                defaults.end
            } else {
                start
                    .checked_add_signed(Duration::days(6))
                    .ok_or(DateRangeError::OutOfRange(start))?
            };
            answer_or_default(ask("End date", default_end), default_end)?
        }
    };

    DateRange::new(start, end)
}

fn answer_or_default(answer: String, default: NaiveDate) -> Result<NaiveDate, DateRangeError> {
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default)
    } else {
        parse_date(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_at_the_end_of_the_calendar_is_an_error() {
        let mut asked = 0;
        let result = resolve_date_range(Some(NaiveDate::MAX), None, date(2024, 12, 11), |_, _| {
            asked += 1;
            String::new()
        });
        assert_eq!(result, Err(DateRangeError::OutOfRange(NaiveDate::MAX)));
        assert_eq!(asked, 0);

        let range = resolve_date_range(
            Some(NaiveDate::MAX),
            Some(NaiveDate::MAX),
            date(2024, 12, 11),
            |_, _| String::new(),
        );
        assert_eq!(range.map(|r| r.days()), Ok(1));
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn previous_week_is_monday_to_sunday() {
        // 2024-12-11 is a Wednesday.
        let range = previous_week(date(2024, 12, 11));
        assert_eq!(range.start(), date(2024, 12, 2));
        assert_eq!(range.end(), date(2024, 12, 8));
        assert_eq!(range.days(), 7);
    }

    #[test]
    fn previous_week_from_a_monday_and_a_sunday() {
        assert_eq!(previous_week(date(2024, 12, 9)).start(), date(2024, 12, 2));
        assert_eq!(previous_week(date(2024, 12, 15)).start(), date(2024, 12, 2));
    }

    #[test]
    fn previous_week_crosses_year_boundary() {
        let range = previous_week(date(2025, 1, 2));
        assert_eq!(range.start(), date(2024, 12, 23));
        assert_eq!(range.end(), date(2024, 12, 29));
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(matches!(
            DateRange::new(date(2024, 12, 8), date(2024, 12, 2)),
            Err(DateRangeError::Reversed { .. })
        ));
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert_eq!(parse_date(" 2024-12-02 "), Ok(date(2024, 12, 2)));
        assert!(parse_date("02/12/2024").is_err());
    }

    #[test]
    fn resolve_uses_defaults_for_empty_answers() {
        let mut prompts = Vec::new();
        let range = resolve_date_range(None, None, date(2024, 12, 11), |prompt, default| {
            prompts.push((prompt.to_string(), default));
            String::new()
        })
        .unwrap();
        assert_eq!(range, DateRange::new(date(2024, 12, 2), date(2024, 12, 8)).unwrap());
        assert_eq!(prompts.len(), 2);
    }

    #[test]
    fn resolve_skips_prompts_for_given_dates() {
        let range = resolve_date_range(
            Some(date(2024, 1, 1)),
            Some(date(2024, 1, 31)),
            date(2024, 12, 11),
            |_, _| panic!("should not prompt"),
        )
        .unwrap();
        assert_eq!(range.days(), 31);
    }

    #[test]
    fn resolve_defaults_end_to_a_week_after_typed_start() {
        let mut answers = vec!["2024-11-04".to_string(), String::new()].into_iter();
        let range = resolve_date_range(None, None, date(2024, 12, 11), |_, _| {
            answers.next().unwrap_or_default()
        })
        .unwrap();
        assert_eq!(range.start(), date(2024, 11, 4));
        assert_eq!(range.end(), date(2024, 11, 10));
    }

    #[test]
    fn resolve_reports_bad_answers() {
        let result = resolve_date_range(None, None, date(2024, 12, 11), |_, _| "soon".into());
        assert_eq!(result, Err(DateRangeError::Invalid("soon".into())));
    }
}
