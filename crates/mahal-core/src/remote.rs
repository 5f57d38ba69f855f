//! Remote religious events provider.
//!
//! The provider is queried by
//! Gregorian month and answers with one
//! entry per day carrying that day's
//! Hijri reckoning and holiday names.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{
  debug,
  instrument,
  warn
};

use crate::error::RemoteFetchError;

pub const DEFAULT_BASE_URL: &str =
  "https://api.aladhan.com/v1";
pub const DEFAULT_TIMEOUT: Duration =
  Duration::from_secs(5);

/// One day of a provider listing.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct RemoteDay {
  pub hijri_year:  i32,
  pub hijri_month: u32,
  pub hijri_day:   u32,
  pub weekday:     String,
  pub holidays:    Vec<String>
}

#[async_trait]
pub trait ReligiousEventsApi:
  Send + Sync
{
  /// Listing for one Gregorian month.
  async fn gregorian_month(
    &self,
    year: i32,
    month: u32
  ) -> Result<
    Vec<RemoteDay>,
    RemoteFetchError
  >;
}

#[derive(Debug, Deserialize)]
struct Envelope {
  code: i64,
  #[serde(default)]
  data: Vec<WireDay>
}

#[derive(Debug, Deserialize)]
struct WireDay {
  hijri: WireHijri
}

#[derive(Debug, Deserialize)]
struct WireHijri {
  day:      String,
  year:     String,
  month:    WireMonth,
  weekday:  WireWeekday,
  #[serde(default)]
  holidays: Vec<String>
}

#[derive(Debug, Deserialize)]
struct WireMonth {
  number: u32
}

#[derive(Debug, Deserialize)]
struct WireWeekday {
  en: String
}

/// Client for the Aladhan
/// Gregorian-to-Hijri calendar
/// endpoint.
#[derive(Debug, Clone)]
pub struct AladhanClient {
  http:     reqwest::Client,
  base_url: String
}

impl AladhanClient {
  pub fn new(
    base_url: &str,
    timeout: Duration
  ) -> Result<Self, RemoteFetchError> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()?;
    Ok(Self {
      http,
      base_url: base_url
        .trim()
        .trim_end_matches('/')
        .to_string()
    })
  }

  pub fn month_url(
    &self,
    year: i32,
    month: u32
  ) -> String {
    format!(
      "{}/gToHCalendar/{month}/{year}",
      self.base_url
    )
  }
}

#[async_trait]
impl ReligiousEventsApi for AladhanClient {
  #[instrument(skip(self))]
  async fn gregorian_month(
    &self,
    year: i32,
    month: u32
  ) -> Result<
    Vec<RemoteDay>,
    RemoteFetchError
  > {
    let url = self.month_url(year, month);
    debug!(%url, "requesting remote calendar month");

    let response = self
      .http
      .get(url.as_str())
      .header(
        reqwest::header::ACCEPT,
        "application/json"
      )
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      warn!(
        %url,
        status = status.as_u16(),
        "remote calendar returned non-success status"
      );
      return Err(
        RemoteFetchError::Status(
          status.as_u16()
        )
      );
    }

    let body = response.text().await?;
    parse_month_listing(&body)
  }
}

/// Decodes a provider payload. Any
/// field that does not parse marks the
/// whole listing malformed.
pub fn parse_month_listing(
  body: &str
) -> Result<
  Vec<RemoteDay>,
  RemoteFetchError
> {
  let envelope: Envelope =
    serde_json::from_str(body)?;
  if envelope.code != 200 {
    return Err(
      RemoteFetchError::ApiCode(
        envelope.code
      )
    );
  }

  envelope
    .data
    .into_iter()
    .map(|wire| {
      let hijri = wire.hijri;
      let hijri_day = hijri
        .day
        .trim()
        .parse::<u32>()
        .map_err(|e| {
          RemoteFetchError::Malformed(
            format!(
              "hijri day {:?}: {e}",
              hijri.day
            )
          )
        })?;
      let hijri_year = hijri
        .year
        .trim()
        .parse::<i32>()
        .map_err(|e| {
          RemoteFetchError::Malformed(
            format!(
              "hijri year {:?}: {e}",
              hijri.year
            )
          )
        })?;

      Ok(RemoteDay {
        hijri_year,
        hijri_month: hijri.month.number,
        hijri_day,
        weekday: hijri.weekday.en,
        holidays: hijri
          .holidays
          .into_iter()
          .map(|h| h.trim().to_string())
          .filter(|h| !h.is_empty())
          .collect()
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"{
    "code": 200,
    "status": "OK",
    "data": [
      {
        "gregorian": { "date": "10-03-2024" },
        "hijri": {
          "day": "29",
          "year": "1445",
          "month": { "number": 8, "en": "Sha'ban" },
          "weekday": { "en": "Al Ahad" },
          "holidays": []
        }
      },
      {
        "gregorian": { "date": "11-03-2024" },
        "hijri": {
          "day": "01",
          "year": "1445",
          "month": { "number": 9, "en": "Ramadan" },
          "weekday": { "en": "Al Athnayn" },
          "holidays": ["1st Day of Ramadan", " "]
        }
      }
    ]
  }"#;

  #[test]
  fn parses_provider_listing() {
    let days = parse_month_listing(SAMPLE)
      .expect("parse listing");
    assert_eq!(days.len(), 2);
    assert_eq!(
      days[1],
      RemoteDay {
        hijri_year:  1445,
        hijri_month: 9,
        hijri_day:   1,
        weekday:     "Al Athnayn".to_string(),
        holidays:    vec![
          "1st Day of Ramadan".to_string()
        ]
      }
    );
    assert!(days[0].holidays.is_empty());
  }

  #[test]
  fn rejects_error_codes_and_garbage() {
    assert!(matches!(
      parse_month_listing(
        r#"{"code": 400, "data": []}"#
      ),
      Err(RemoteFetchError::ApiCode(400))
    ));
    assert!(matches!(
      parse_month_listing("<html>"),
      Err(RemoteFetchError::Malformed(_))
    ));
    let bad_day = SAMPLE.replace(
      "\"01\"",
      "\"first\""
    );
    assert!(matches!(
      parse_month_listing(&bad_day),
      Err(RemoteFetchError::Malformed(_))
    ));
  }

  #[test]
  fn builds_month_url_without_double_slash()
  {
    let client = AladhanClient::new(
      "https://example.test/v1/",
      DEFAULT_TIMEOUT
    )
    .expect("client");
    assert_eq!(
      client.month_url(2024, 3),
      "https://example.test/v1/gToHCalendar/3/2024"
    );
  }
}
