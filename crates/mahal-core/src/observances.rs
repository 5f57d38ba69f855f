//! Offline annotation sources: the
//! table of recurring observances and
//! the fixed-day lunar phase marker.

use serde::{
  Deserialize,
  Serialize
};
use tracing::debug;

use crate::error::InvalidDateError;
use crate::hijri;

pub const NEW_MOON_LABEL: &str =
  "New Moon";
pub const FULL_MOON_LABEL: &str =
  "Full Moon";

const NEW_MOON_DAY: u32 = 1;
const FULL_MOON_DAY: u32 = 14;

const BUILTIN: &[(u32, u32, &str)] = &[
  (1, 1, "Islamic New Year"),
  (1, 10, "Ashura"),
  (3, 12, "Mawlid al-Nabi"),
  (7, 27, "Isra and Mi'raj"),
  (8, 15, "Mid-Sha'ban"),
  (9, 1, "Start of Ramadan"),
  (9, 27, "Laylat al-Qadr"),
  (10, 1, "Eid al-Fitr"),
  (12, 8, "Day of Tarwiyah"),
  (12, 9, "Day of Arafah"),
  (12, 10, "Eid al-Adha")
];

/// A named date that recurs every
/// Hijri year.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct Observance {
  pub month: u32,
  pub day:   u32,
  pub name:  String
}

impl Observance {
  pub fn new(
    month: u32,
    day: u32,
    name: impl Into<String>
  ) -> Self {
    Self {
      month,
      day,
      name: name.into()
    }
  }

  /// Day 30 is accepted; months that
  /// are shorter in a given year skip
  /// the entry.
  pub fn is_well_formed(&self) -> bool {
    (1..=12).contains(&self.month)
      && (1..=30).contains(&self.day)
      && !self.name.trim().is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct ObservanceTable {
  entries: Vec<Observance>
}

impl Default for ObservanceTable {
  fn default() -> Self {
    Self::builtin()
  }
}

impl ObservanceTable {
  pub fn builtin() -> Self {
    Self {
      entries: BUILTIN
        .iter()
        .map(|(m, d, name)| {
          Observance::new(*m, *d, *name)
        })
        .collect()
    }
  }

  /// Appends entries after the
  /// built-in ones, keeping their
  /// order.
  pub fn with_extra<I>(
    mut self,
    extra: I
  ) -> Self
  where
    I: IntoIterator<Item = Observance>
  {
    self.entries.extend(
      extra
        .into_iter()
        .filter(Observance::is_well_formed)
    );
    self
  }

  pub fn entries(&self) -> &[Observance] {
    &self.entries
  }

  /// Observances falling in the given
  /// month, in table order.
  pub fn for_month(
    &self,
    year: i32,
    month: u32
  ) -> Result<
    Vec<(u32, &str)>,
    InvalidDateError
  > {
    let length =
      hijri::month_length(year, month)?;

    let hits = self
      .entries
      .iter()
      .filter(|o| o.month == month)
      .filter(|o| {
        if o.day > length {
          debug!(
            year,
            month,
            day = o.day,
            name = %o.name,
            "observance falls past month end; skipping"
          );
          return false;
        }
        true
      })
      .map(|o| (o.day, o.name.as_str()))
      .collect();

    Ok(hits)
  }
}

/// Fixed-day approximation of the lunar
/// phases: the month opens on a new
/// moon and the moon is full mid-month.
/// Not computed from astronomy.
pub fn lunar_phase_approx(
  year: i32,
  month: u32
) -> Result<
  Vec<(u32, &'static str)>,
  InvalidDateError
> {
  hijri::month_length(year, month)?;
  Ok(vec![
    (NEW_MOON_DAY, NEW_MOON_LABEL),
    (FULL_MOON_DAY, FULL_MOON_LABEL),
  ])
}
