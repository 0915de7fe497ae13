use std::sync::OnceLock;

use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  NaiveTime,
  Weekday
};
use regex::Regex;

use crate::error::TaskError;

pub const DATE_FORMAT: &str =
  "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

fn date_re() -> Option<&'static Regex>
{
  static DATE_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  DATE_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})$"
      )
      .ok()
    })
    .as_ref()
}

fn time_re() -> Option<&'static Regex>
{
  static TIME_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  TIME_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$"
      )
      .ok()
    })
    .as_ref()
}

/// Parses a `YYYY-MM-DD` calendar date.
///
/// The result is a plain wall-clock date; no offset is ever applied,
/// so the same string maps to the same day on every host.
pub fn parse_date(
  raw: &str
) -> Result<NaiveDate, TaskError> {
  let token = raw.trim();
  let captures = date_re()
    .and_then(|re| re.captures(token))
    .ok_or_else(|| {
      TaskError::validation(format!(
        "invalid date '{token}', \
         expected YYYY-MM-DD"
      ))
    })?;

  let field = |name: &str| {
    captures
      .name(name)
      .and_then(|m| {
        m.as_str().parse::<u32>().ok()
      })
  };
  let (Some(year), Some(month), Some(day)) =
    (field("year"), field("month"), field("day"))
  else {
    return Err(TaskError::validation(
      format!("invalid date '{token}'")
    ));
  };

  NaiveDate::from_ymd_opt(
    year as i32,
    month,
    day
  )
  .ok_or_else(|| {
    TaskError::validation(format!(
      "'{token}' is not a calendar \
       date"
    ))
  })
}

/// Parses a 24h `HH:MM` wall-clock time. A single-digit hour is
/// accepted and normalised.
pub fn parse_time(
  raw: &str
) -> Result<NaiveTime, TaskError> {
  let token = raw.trim();
  let invalid = || {
    TaskError::validation(format!(
      "invalid time '{token}', \
       expected HH:MM"
    ))
  };

  let captures = time_re()
    .and_then(|re| re.captures(token))
    .ok_or_else(invalid)?;
  let hour = captures
    .name("hour")
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    })
    .ok_or_else(invalid)?;
  let minute = captures
    .name("minute")
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    })
    .ok_or_else(invalid)?;

  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(invalid)
}

/// Parses a date as typed by a user: `today`, `tomorrow`,
/// `yesterday`, or a `YYYY-MM-DD` date.
pub fn parse_date_input(
  raw: &str,
  today: NaiveDate
) -> Result<NaiveDate, TaskError> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => Ok(today),
    | "tomorrow" => {
      Ok(add_days(today, 1))
    }
    | "yesterday" => {
      Ok(add_days(today, -1))
    }
    | _ => parse_date(raw)
  }
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

#[must_use]
pub fn format_time(
  time: NaiveTime
) -> String {
  time.format(TIME_FORMAT).to_string()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Moves `date` by whole calendar months, keeping the day of month
/// where the target month has it and clamping to its last day
/// otherwise.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_sunday()
    as i64;
  let start_idx = week_start
    .num_days_from_sunday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}


pub mod date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_date(*date)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_date(&raw)
      .map_err(serde::de::Error::custom)
  }
}

pub mod time_serde {
  pub mod option {
    use chrono::NaiveTime;
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      time: &Option<NaiveTime>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match time {
        | Some(value) => {
          serializer.serialize_str(
            &super::super::format_time(
              *value
            )
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<NaiveTime>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw) if raw.trim().is_empty() => Ok(None),
        | Some(raw) => super::super::parse_time(&raw)
          .map(Some)
          .map_err(serde::de::Error::custom),
        | None => Ok(None)
      }
    }
  }
}
