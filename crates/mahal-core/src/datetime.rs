use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;

use crate::error::InvalidDateError;
use crate::hijri::{
  self,
  GregorianDate,
  HijriDate
};

pub const TIMEZONE_ENV_VAR: &str =
  "MAHAL_TIMEZONE";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Source of the current civil date.
pub trait Today: Send + Sync {
  fn today(&self) -> GregorianDate;

  fn today_hijri(
    &self
  ) -> Result<HijriDate, InvalidDateError>
  {
    hijri::to_hijri(self.today())
  }
}

/// Wall clock read in a fixed time
/// zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemToday {
  tz: Tz
}

impl SystemToday {
  pub fn new(tz: Tz) -> Self {
    Self { tz }
  }

  pub fn timezone(&self) -> Tz {
    self.tz
  }

  #[must_use]
  pub fn date_at(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    now.with_timezone(&self.tz).date_naive()
  }
}

impl Today for SystemToday {
  fn today(&self) -> GregorianDate {
    self.date_at(Utc::now())
  }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedToday(pub GregorianDate);

impl Today for FixedToday {
  fn today(&self) -> GregorianDate {
    self.0
  }
}

/// Resolves the time zone for "today":
/// environment override, then the
/// configured id, then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::*;

  #[test]
  fn date_follows_configured_zone() {
    let now = Utc
      .with_ymd_and_hms(
        2024, 3, 10, 22, 30, 0
      )
      .single()
      .expect("valid now");

    let utc = SystemToday::new(chrono_tz::UTC);
    let riyadh = SystemToday::new(
      chrono_tz::Asia::Riyadh
    );

    assert_eq!(
      utc.date_at(now).to_string(),
      "2024-03-10"
    );
    assert_eq!(
      riyadh.date_at(now).to_string(),
      "2024-03-11"
    );
  }

  #[test]
  fn fixed_today_converts_to_hijri() {
    let today = FixedToday(
      hijri::gregorian(2024, 3, 11)
        .expect("date")
    );
    assert_eq!(
      today
        .today_hijri()
        .expect("hijri")
        .to_string(),
      "1445-09-01"
    );
  }

  #[test]
  fn rejects_unknown_zone_ids() {
    assert!(
      parse_timezone("Mars/Olympus", "test")
        .is_none()
    );
    assert!(parse_timezone("  ", "test").is_none());
    assert_eq!(
      parse_timezone(
        "Asia/Kolkata",
        "test"
      ),
      Some(chrono_tz::Asia::Kolkata)
    );
  }
}
