//! Conversion between the proleptic
//! Gregorian calendar and the
//! arithmetic (tabular) Islamic civil
//! calendar.
//!
//! Every function here is pure: the
//! same input always yields the same
//! output, and conversions round-trip
//! exactly within this module.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};
use serde::Serialize;

use crate::error::InvalidDateError;

/// Gregorian dates are plain
/// `chrono` dates.
pub type GregorianDate = NaiveDate;

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// 1 Muharram 1 AH.
const EPOCH: NaiveDate =
  match NaiveDate::from_ymd_opt(
    622, 7, 19
  ) {
    | Some(date) => date,
    | None => {
      panic!("invalid hijri epoch")
    }
  };

const MONTHS_EN: [&str; 12] = [
  "Muharram",
  "Safar",
  "Rabi' al-Awwal",
  "Rabi' al-Thani",
  "Jumada al-Awwal",
  "Jumada al-Thani",
  "Rajab",
  "Sha'ban",
  "Ramadan",
  "Shawwal",
  "Dhu al-Qi'dah",
  "Dhu al-Hijjah"
];

const MONTHS_AR: [&str; 12] = [
  "محرم",
  "صفر",
  "ربيع الأول",
  "ربيع الآخر",
  "جمادى الأولى",
  "جمادى الآخرة",
  "رجب",
  "شعبان",
  "رمضان",
  "شوال",
  "ذو القعدة",
  "ذو الحجة"
];

const WEEKDAYS_EN: [&str; 7] =
  ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

const WEEKDAYS_AR: [&str; 7] = [
  "اثن", "ثلا", "أرب", "خمي", "جمع",
  "سبت", "أحد"
];

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
  #[default]
  En,
  Ar
}

impl Locale {
  /// Unknown tags fall back to
  /// English.
  pub fn parse(tag: &str) -> Self {
    match tag
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "en" | "en-us" | "en-gb" => {
        Locale::En
      }
      | "ar" | "ar-sa" => Locale::Ar,
      | other => {
        tracing::debug!(
          locale = other,
          "unsupported locale; \
           falling back to en"
        );
        Locale::En
      }
    }
  }

  pub fn tag(self) -> &'static str {
    match self {
      | Locale::En => "en",
      | Locale::Ar => "ar"
    }
  }
}

impl FromStr for Locale {
  type Err = Infallible;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Ok(Locale::parse(s))
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
)]
pub struct HijriDate {
  year:  i32,
  month: u32,
  day:   u32
}

impl HijriDate {
  pub fn new(
    year: i32,
    month: u32,
    day: u32
  ) -> Result<Self, InvalidDateError> {
    let length =
      month_length(year, month)?;
    if day == 0 || day > length {
      return Err(
        InvalidDateError::Day {
          year,
          month,
          day,
          length
        }
      );
    }
    Ok(Self { year, month, day })
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn day(&self) -> u32 {
    self.day
  }

  pub fn to_gregorian(
    self
  ) -> GregorianDate {
    to_gregorian(self)
  }

  pub fn month_name(
    &self,
    locale: Locale
  ) -> &'static str {
    month_label(self.month, locale)
  }
}

impl fmt::Display for HijriDate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}-{:02}",
      self.year, self.month, self.day
    )
  }
}

impl FromStr for HijriDate {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let mut parts = s.trim().split('-');
    let (Some(y), Some(m), Some(d), None) = (
      parts.next(),
      parts.next(),
      parts.next(),
      parts.next()
    ) else {
      return Err(anyhow!(
        "expected YYYY-MM-DD, got: {s}"
      ));
    };

    let year = y.parse::<i32>().map_err(
      |e| anyhow!("invalid year {y}: {e}")
    )?;
    let month =
      m.parse::<u32>().map_err(|e| {
        anyhow!("invalid month {m}: {e}")
      })?;
    let day =
      d.parse::<u32>().map_err(|e| {
        anyhow!("invalid day {d}: {e}")
      })?;

    Ok(HijriDate::new(year, month, day)?)
  }
}

/// Builds a Gregorian date, reporting
/// impossible components instead of
/// returning `None`.
pub fn gregorian(
  year: i32,
  month: u32,
  day: u32
) -> Result<GregorianDate, InvalidDateError>
{
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .ok_or(InvalidDateError::Gregorian {
    year,
    month,
    day
  })
}

/// Years 2, 5, 7, 10, 13, 16, 18, 21,
/// 24, 26 and 29 of each 30-year cycle
/// have 355 days.
pub fn is_leap_year(year: i32) -> bool {
  (14 + 11 * i64::from(year))
    .rem_euclid(30)
    < 11
}

pub fn month_length(
  year: i32,
  month: u32
) -> Result<u32, InvalidDateError> {
  check_year(year)?;
  check_month(month)?;

  let length = if month % 2 == 1
    || (month == 12
      && is_leap_year(year))
  {
    30
  } else {
    29
  };
  Ok(length)
}

pub fn to_hijri(
  date: GregorianDate
) -> Result<HijriDate, InvalidDateError>
{
  let elapsed =
    date.signed_duration_since(EPOCH).num_days();
  if elapsed < 0 {
    return Err(
      InvalidDateError::BeforeEpoch(
        date
      )
    );
  }

  let year = (30 * elapsed + 10646)
    .div_euclid(10631);
  if year > i64::from(MAX_YEAR) {
    return Err(InvalidDateError::Year {
      year: i32::try_from(year)
        .unwrap_or(i32::MAX),
      max:  MAX_YEAR
    });
  }
  let year = year as i32;

  let into_year =
    elapsed - days_before(year, 1, 1);
  let month =
    ((11 * into_year + 330) / 325) as u32;
  let day = (elapsed
    - days_before(year, month, 1)
    + 1) as u32;

  Ok(HijriDate { year, month, day })
}

pub fn to_gregorian(
  date: HijriDate
) -> GregorianDate {
  EPOCH
    + Duration::days(days_before(
      date.year, date.month, date.day
    ))
}

pub fn first_weekday(
  year: i32,
  month: u32
) -> Result<Weekday, InvalidDateError> {
  let first =
    HijriDate::new(year, month, 1)?;
  Ok(to_gregorian(first).weekday())
}

/// Weekday of the first day of the
/// month, Monday = 0.
pub fn first_weekday_offset(
  year: i32,
  month: u32
) -> Result<u32, InvalidDateError> {
  Ok(
    first_weekday(year, month)?
      .num_days_from_monday()
  )
}

pub fn month_name(
  year: i32,
  month: u32,
  locale: Locale
) -> Result<&'static str, InvalidDateError>
{
  check_year(year)?;
  check_month(month)?;
  Ok(month_label(month, locale))
}

pub fn weekday_label(
  weekday: Weekday,
  locale: Locale
) -> &'static str {
  let idx =
    weekday.num_days_from_monday() as usize;
  match locale {
    | Locale::En => WEEKDAYS_EN[idx],
    | Locale::Ar => WEEKDAYS_AR[idx]
  }
}

fn month_label(
  month: u32,
  locale: Locale
) -> &'static str {
  let idx = (month.clamp(1, 12) - 1)
    as usize;
  match locale {
    | Locale::En => MONTHS_EN[idx],
    | Locale::Ar => MONTHS_AR[idx]
  }
}

/// Days between the epoch and the
/// given (already validated) date.
fn days_before(
  year: i32,
  month: u32,
  day: u32
) -> i64 {
  let year = i64::from(year);
  let month = i64::from(month);
  (year - 1) * 354
    + (3 + 11 * year).div_euclid(30)
    + 29 * (month - 1)
    + month / 2
    + i64::from(day)
    - 1
}

fn check_year(
  year: i32
) -> Result<(), InvalidDateError> {
  if (MIN_YEAR..=MAX_YEAR)
    .contains(&year)
  {
    Ok(())
  } else {
    Err(InvalidDateError::Year {
      year,
      max: MAX_YEAR
    })
  }
}

fn check_month(
  month: u32
) -> Result<(), InvalidDateError> {
  if (1..=12).contains(&month) {
    Ok(())
  } else {
    Err(InvalidDateError::Month {
      month
    })
  }
}
