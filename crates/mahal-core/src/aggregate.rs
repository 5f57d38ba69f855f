//! Merges the remote, observance and
//! lunar phase sources into one sparse
//! day -> annotations mapping.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{
  Datelike,
  Days
};
use serde::Serialize;
use tracing::{
  debug,
  instrument,
  warn
};

use crate::error::{
  InvalidDateError,
  RemoteFetchError
};
use crate::hijri::{
  self,
  GregorianDate,
  HijriDate
};
use crate::observances::{
  ObservanceTable,
  lunar_phase_approx
};
use crate::remote::{
  DEFAULT_TIMEOUT,
  ReligiousEventsApi
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
  Remote,
  Observance,
  /// Fixed-day stand-in for the real
  /// lunar phase.
  LunarPhaseApprox
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct EventAnnotation {
  pub label:  String,
  pub source: AnnotationSource
}

impl EventAnnotation {
  pub fn new(
    label: impl Into<String>,
    source: AnnotationSource
  ) -> Self {
    Self {
      label: label.into(),
      source
    }
  }

  pub fn is_approximate(&self) -> bool {
    self.source
      == AnnotationSource::LunarPhaseApprox
  }
}

/// Annotations for one Hijri month.
/// Only days with at least one entry
/// are present.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct MonthAnnotations {
  year:  i32,
  month: u32,
  days:  BTreeMap<u32, Vec<EventAnnotation>>
}

impl MonthAnnotations {
  pub fn new(year: i32, month: u32) -> Self {
    Self {
      year,
      month,
      days: BTreeMap::new()
    }
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn push(
    &mut self,
    day: u32,
    annotation: EventAnnotation
  ) {
    self
      .days
      .entry(day)
      .or_default()
      .push(annotation);
  }

  pub fn get(
    &self,
    day: u32
  ) -> &[EventAnnotation] {
    self
      .days
      .get(&day)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn labels(
    &self,
    day: u32
  ) -> Vec<&str> {
    self
      .get(day)
      .iter()
      .map(|a| a.label.as_str())
      .collect()
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = u32> + '_ {
    self.days.keys().copied()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<
    Item = (u32, &[EventAnnotation])
  > + '_ {
    self
      .days
      .iter()
      .map(|(day, list)| {
        (*day, list.as_slice())
      })
  }

  /// Number of annotated days.
  pub fn len(&self) -> usize {
    self.days.len()
  }

  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }
}

/// Concatenates the sources per day in
/// the order remote, observance, lunar
/// phase. Duplicates are kept.
pub fn merge<'a, 'b>(
  year: i32,
  month: u32,
  remote: Vec<(u32, String)>,
  observed: impl IntoIterator<
    Item = (u32, &'a str)
  >,
  phases: impl IntoIterator<
    Item = (u32, &'b str)
  >
) -> MonthAnnotations {
  let mut merged =
    MonthAnnotations::new(year, month);

  for (day, label) in remote {
    merged.push(
      day,
      EventAnnotation::new(
        label,
        AnnotationSource::Remote
      )
    );
  }
  for (day, label) in observed {
    merged.push(
      day,
      EventAnnotation::new(
        label,
        AnnotationSource::Observance
      )
    );
  }
  for (day, label) in phases {
    merged.push(
      day,
      EventAnnotation::new(
        label,
        AnnotationSource::LunarPhaseApprox
      )
    );
  }

  merged
}

pub struct ImportantDateAggregator {
  remote:      Option<Arc<dyn ReligiousEventsApi>>,
  observances: ObservanceTable,
  timeout:     Duration
}

impl std::fmt::Debug
  for ImportantDateAggregator
{
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    f.debug_struct(
      "ImportantDateAggregator"
    )
    .field("remote", &self.remote.is_some())
    .field("observances", &self.observances.entries().len())
    .field("timeout", &self.timeout)
    .finish()
  }
}

impl ImportantDateAggregator {
  pub fn new(
    remote: Option<Arc<dyn ReligiousEventsApi>>,
    observances: ObservanceTable,
    timeout: Duration
  ) -> Self {
    Self {
      remote,
      observances,
      timeout
    }
  }

  /// Static table and lunar phases
  /// only.
  pub fn offline(
    observances: ObservanceTable
  ) -> Self {
    Self::new(
      None,
      observances,
      DEFAULT_TIMEOUT
    )
  }

  pub fn has_remote(&self) -> bool {
    self.remote.is_some()
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  /// Full annotation set. Remote
  /// failures degrade to zero remote
  /// entries; only an invalid month is
  /// reported.
  #[instrument(skip(self))]
  pub async fn annotations_for(
    &self,
    year: i32,
    month: u32
  ) -> Result<
    MonthAnnotations,
    InvalidDateError
  > {
    let length =
      hijri::month_length(year, month)?;
    let first = HijriDate::new(
      year, month, 1
    )?
    .to_gregorian();
    let last = HijriDate::new(
      year, month, length
    )?
    .to_gregorian();

    let remote = self
      .remote_annotations(
        year, month, length, first, last
      )
      .await;

    let observed = self
      .observances
      .for_month(year, month)?;
    let phases =
      lunar_phase_approx(year, month)?;

    let merged = merge(
      year, month, remote, observed, phases
    );
    debug!(
      annotated_days = merged.len(),
      "aggregated month annotations"
    );
    Ok(merged)
  }

  /// The offline sources alone, without
  /// touching the network.
  pub fn offline_annotations_for(
    &self,
    year: i32,
    month: u32
  ) -> Result<
    MonthAnnotations,
    InvalidDateError
  > {
    let observed = self
      .observances
      .for_month(year, month)?;
    let phases =
      lunar_phase_approx(year, month)?;
    Ok(merge(
      year,
      month,
      Vec::new(),
      observed,
      phases
    ))
  }

  async fn remote_annotations(
    &self,
    year: i32,
    month: u32,
    length: u32,
    first: GregorianDate,
    last: GregorianDate
  ) -> Vec<(u32, String)> {
    let Some(api) = self.remote.as_ref()
    else {
      return Vec::new();
    };

    let fetch = fetch_window(
      api.as_ref(),
      year,
      month,
      length,
      first,
      last
    );

    match tokio::time::timeout(
      self.timeout,
      fetch
    )
    .await
    {
      | Ok(Ok(found)) => {
        debug!(
          year,
          month,
          remote = found.len(),
          "remote annotations loaded"
        );
        found
      }
      | Ok(Err(err)) => {
        warn!(
          year,
          month,
          error = %err,
          "remote annotations unavailable; continuing without them"
        );
        Vec::new()
      }
      | Err(_) => {
        let err = RemoteFetchError::Timeout(
          self.timeout
        );
        warn!(
          year,
          month,
          error = %err,
          "remote annotations unavailable; continuing without them"
        );
        Vec::new()
      }
    }
  }
}

/// Days a provider's month may start
/// or end away from the tabular one.
const RECKONING_SKEW_DAYS: u64 = 2;

/// Gregorian months to request for a
/// Hijri month spanning `first..=last`,
/// widened so a provider that reckons
/// the month differently still has all
/// of its days fetched.
fn fetch_months(
  first: GregorianDate,
  last: GregorianDate
) -> Vec<(i32, u32)> {
  let skew = Days::new(RECKONING_SKEW_DAYS);
  gregorian_months(
    first.checked_sub_days(skew).unwrap_or(first),
    last.checked_add_days(skew).unwrap_or(last)
  )
}

/// Gregorian (year, month) pairs
/// touched by the inclusive window.
fn gregorian_months(
  first: GregorianDate,
  last: GregorianDate
) -> Vec<(i32, u32)> {
  let mut months = Vec::with_capacity(2);
  let (mut y, mut m) =
    (first.year(), first.month());
  loop {
    months.push((y, m));
    if (y, m) >= (last.year(), last.month())
    {
      break;
    }
    if m == 12 {
      y += 1;
      m = 1;
    } else {
      m += 1;
    }
  }
  months
}

async fn fetch_window(
  api: &dyn ReligiousEventsApi,
  year: i32,
  month: u32,
  length: u32,
  first: GregorianDate,
  last: GregorianDate
) -> Result<
  Vec<(u32, String)>,
  RemoteFetchError
> {
  let mut found = Vec::new();

  for (g_year, g_month) in
    fetch_months(first, last)
  {
    let listing = api
      .gregorian_month(g_year, g_month)
      .await?;

    for day in listing {
      if day.hijri_year != year
        || day.hijri_month != month
      {
        continue;
      }
      if day.hijri_day == 0
        || day.hijri_day > length
      {
        debug!(
          year,
          month,
          day = day.hijri_day,
          weekday = %day.weekday,
          length,
          "remote day outside local month; dropping"
        );
        continue;
      }
      for holiday in day.holidays {
        found.push((day.hijri_day, holiday));
      }
    }
  }

  Ok(found)
}
