use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

/// A date component fell outside the
/// range the calendar allows. Always
/// surfaced to the caller, never
/// clamped.
#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum InvalidDateError {
  #[error(
    "hijri year {year} is out of \
     range 1-{max}"
  )]
  Year { year: i32, max: i32 },

  #[error(
    "hijri month {month} is out of \
     range 1-12"
  )]
  Month { month: u32 },

  #[error(
    "hijri day {day} is out of range \
     1-{length} for {year}-{month:02}"
  )]
  Day {
    year:   i32,
    month:  u32,
    day:    u32,
    length: u32
  },

  #[error(
    "{year:04}-{month:02}-{day:02} is \
     not a valid gregorian date"
  )]
  Gregorian {
    year:  i32,
    month: u32,
    day:   u32
  },

  #[error(
    "{0} precedes the hijri epoch"
  )]
  BeforeEpoch(NaiveDate)
}

/// Failure talking to the remote
/// religious events provider. The
/// aggregator recovers from every
/// variant locally.
#[derive(Debug, Error)]
pub enum RemoteFetchError {
  #[error(
    "remote lookup timed out after \
     {0:?}"
  )]
  Timeout(Duration),

  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error(
    "remote responded with status \
     {0}"
  )]
  Status(u16),

  #[error(
    "remote payload reported code \
     {0}"
  )]
  ApiCode(i64),

  #[error(
    "malformed remote payload: {0}"
  )]
  Malformed(String)
}

impl From<serde_json::Error>
  for RemoteFetchError
{
  fn from(err: serde_json::Error) -> Self {
    RemoteFetchError::Malformed(
      err.to_string()
    )
  }
}
