//! Month grid layout and navigation.
//!
//! A grid is rebuilt from scratch for
//! every request; nothing from a
//! previous month is carried over.

use std::sync::Arc;

use chrono::Weekday;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  instrument,
  warn
};

use crate::aggregate::{
  EventAnnotation,
  ImportantDateAggregator,
  MonthAnnotations
};
use crate::datetime::Today;
use crate::error::InvalidDateError;
use crate::hijri::{
  self,
  GregorianDate,
  HijriDate,
  Locale
};

pub const DAYS_PER_WEEK: u32 = 7;

/// Weekday shown in column 0.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
  #[default]
  Monday,
  Sunday,
  Saturday
}

impl WeekStart {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "monday" | "mon" => {
        Some(WeekStart::Monday)
      }
      | "sunday" | "sun" => {
        Some(WeekStart::Sunday)
      }
      | "saturday" | "sat" => {
        Some(WeekStart::Saturday)
      }
      | _ => None
    }
  }

  pub fn weekday(self) -> Weekday {
    match self {
      | WeekStart::Monday => Weekday::Mon,
      | WeekStart::Sunday => Weekday::Sun,
      | WeekStart::Saturday => {
        Weekday::Sat
      }
    }
  }

  pub fn column_of(
    self,
    weekday: Weekday
  ) -> u32 {
    (DAYS_PER_WEEK
      + weekday.num_days_from_monday()
      - self
        .weekday()
        .num_days_from_monday())
      % DAYS_PER_WEEK
  }

  /// Weekdays in column order.
  pub fn columns(self) -> [Weekday; 7] {
    let mut days = [Weekday::Mon; 7];
    let mut day = self.weekday();
    for slot in days.iter_mut() {
      *slot = day;
      day = day.succ();
    }
    days
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Prev,
  Next
}

/// The month currently on display.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct CalendarViewState {
  year:  i32,
  month: u32
}

impl CalendarViewState {
  pub fn new(
    year: i32,
    month: u32
  ) -> Result<Self, InvalidDateError> {
    hijri::month_length(year, month)?;
    Ok(Self { year, month })
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn containing(date: HijriDate) -> Self {
    Self {
      year:  date.year(),
      month: date.month()
    }
  }

  /// Pure transition with year
  /// rollover; never triggers a
  /// reload by itself.
  #[must_use]
  pub fn navigate(
    self,
    direction: Direction
  ) -> Self {
    match direction {
      | Direction::Prev => self.prev(),
      | Direction::Next => self.next()
    }
  }

  #[must_use]
  pub fn prev(self) -> Self {
    if self.month > 1 {
      Self {
        year:  self.year,
        month: self.month - 1
      }
    } else if self.year > hijri::MIN_YEAR {
      Self {
        year:  self.year - 1,
        month: 12
      }
    } else {
      self
    }
  }

  #[must_use]
  pub fn next(self) -> Self {
    if self.month < 12 {
      Self {
        year:  self.year,
        month: self.month + 1
      }
    } else if self.year < hijri::MAX_YEAR {
      Self {
        year:  self.year + 1,
        month: 1
      }
    } else {
      self
    }
  }
}

impl std::fmt::Display
  for CalendarViewState
{
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year, self.month
    )
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct DayCell {
  pub day:         u32,
  pub row:         u32,
  pub column:      u32,
  pub is_today:    bool,
  pub annotations: Vec<EventAnnotation>
}

impl DayCell {
  pub fn is_annotated(&self) -> bool {
    !self.annotations.is_empty()
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct MonthGrid {
  pub view:       CalendarViewState,
  pub month_name: String,
  pub week_start: WeekStart,
  /// Column of day 1.
  pub offset:     u32,
  pub cells:      Vec<DayCell>
}

impl MonthGrid {
  pub fn rows(&self) -> u32 {
    self
      .cells
      .last()
      .map(|cell| cell.row + 1)
      .unwrap_or(0)
  }

  pub fn today(&self) -> Option<&DayCell> {
    self.cells.iter().find(|c| c.is_today)
  }

  pub fn title(&self) -> String {
    format!(
      "{} {}",
      self.month_name, self.view.year
    )
  }
}

pub struct MonthGridBuilder {
  aggregator: Arc<ImportantDateAggregator>,
  today:      Arc<dyn Today>,
  locale:     Locale,
  week_start: WeekStart
}

impl MonthGridBuilder {
  pub fn new(
    aggregator: Arc<ImportantDateAggregator>,
    today: Arc<dyn Today>
  ) -> Self {
    Self {
      aggregator,
      today,
      locale: Locale::default(),
      week_start: WeekStart::default()
    }
  }

  #[must_use]
  pub fn with_locale(
    mut self,
    locale: Locale
  ) -> Self {
    self.locale = locale;
    self
  }

  #[must_use]
  pub fn with_week_start(
    mut self,
    week_start: WeekStart
  ) -> Self {
    self.week_start = week_start;
    self
  }

  pub fn locale(&self) -> Locale {
    self.locale
  }

  pub fn week_start(&self) -> WeekStart {
    self.week_start
  }

  pub fn aggregator(
    &self
  ) -> &Arc<ImportantDateAggregator> {
    &self.aggregator
  }

  pub fn today(&self) -> GregorianDate {
    self.today.today()
  }

  /// View of the month containing
  /// today.
  pub fn current_view(
    &self
  ) -> Result<
    CalendarViewState,
    InvalidDateError
  > {
    Ok(CalendarViewState::containing(
      self.today.today_hijri()?
    ))
  }

  /// Fetches annotations (including the
  /// remote source) and lays out the
  /// month.
  #[instrument(skip(self))]
  pub async fn build_grid(
    &self,
    year: i32,
    month: u32
  ) -> Result<MonthGrid, InvalidDateError>
  {
    let view =
      CalendarViewState::new(year, month)?;
    let annotations = self
      .aggregator
      .annotations_for(year, month)
      .await?;
    self.layout(
      view,
      &annotations,
      self.today.today()
    )
  }

  /// Same as `build_grid` but with the
  /// offline sources only; never
  /// blocks.
  pub fn build_offline_grid(
    &self,
    year: i32,
    month: u32
  ) -> Result<MonthGrid, InvalidDateError>
  {
    let view =
      CalendarViewState::new(year, month)?;
    let annotations = self
      .aggregator
      .offline_annotations_for(year, month)?;
    self.layout(
      view,
      &annotations,
      self.today.today()
    )
  }

  /// Pure layout step.
  pub fn layout(
    &self,
    view: CalendarViewState,
    annotations: &MonthAnnotations,
    today: GregorianDate
  ) -> Result<MonthGrid, InvalidDateError>
  {
    let length = hijri::month_length(
      view.year, view.month
    )?;
    let first = hijri::first_weekday(
      view.year, view.month
    )?;
    let offset =
      self.week_start.column_of(first);

    let matches_view = annotations.year()
      == view.year
      && annotations.month() == view.month;
    if !matches_view {
      warn!(
        view = %view,
        annotations_year = annotations.year(),
        annotations_month = annotations.month(),
        "annotations belong to another month; ignoring them"
      );
    }

    let today_hijri =
      hijri::to_hijri(today).ok();

    let mut cells =
      Vec::with_capacity(length as usize);
    for day in 1..=length {
      let slot = offset + day - 1;
      let date = HijriDate::new(
        view.year, view.month, day
      )?;
      cells.push(DayCell {
        day,
        row: slot / DAYS_PER_WEEK,
        column: slot % DAYS_PER_WEEK,
        is_today: today_hijri == Some(date),
        annotations: if matches_view {
          annotations.get(day).to_vec()
        } else {
          Vec::new()
        }
      });
    }

    debug!(
      view = %view,
      offset,
      length,
      "laid out month grid"
    );

    Ok(MonthGrid {
      view,
      month_name: hijri::month_name(
        view.year,
        view.month,
        self.locale
      )?
      .to_string(),
      week_start: self.week_start,
      offset,
      cells
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datetime::FixedToday;
  use crate::observances::ObservanceTable;

  fn builder(
    today: GregorianDate
  ) -> MonthGridBuilder {
    MonthGridBuilder::new(
      Arc::new(
        ImportantDateAggregator::offline(
          ObservanceTable::builtin()
        )
      ),
      Arc::new(FixedToday(today))
    )
  }

  fn g(y: i32, m: u32, d: u32) -> GregorianDate {
    hijri::gregorian(y, m, d)
      .expect("valid date")
  }

  fn view(y: i32, m: u32) -> CalendarViewState {
    CalendarViewState::new(y, m)
      .expect("valid view")
  }

  #[test]
  fn navigation_rolls_over_years() {
    assert_eq!(
      view(1445, 1)
        .navigate(Direction::Prev),
      view(1444, 12)
    );
    assert_eq!(
      view(1445, 12)
        .navigate(Direction::Next),
      view(1446, 1)
    );
    assert_eq!(
      view(1445, 5)
        .navigate(Direction::Prev),
      view(1445, 4)
    );
    assert_eq!(
      view(1445, 5)
        .navigate(Direction::Next),
      view(1445, 6)
    );
    assert_eq!(
      view(1, 1).navigate(Direction::Prev),
      view(1, 1)
    );
  }

  #[test]
  fn views_are_only_built_validated() {
    assert!(
      CalendarViewState::new(1445, 13)
        .is_err()
    );
    assert!(CalendarViewState::new(1445, 0).is_err());
    assert!(
      CalendarViewState::new(10000, 1)
        .is_err()
    );

    let mut v = view(9999, 10);
    for _ in 0..5 {
      v = v.next();
      assert_eq!(
        CalendarViewState::new(
          v.year(),
          v.month()
        ),
        Ok(v)
      );
    }
    assert_eq!((v.year(), v.month()), (9999, 12));
  }

  #[test]
  fn next_then_prev_is_identity() {
    let mut v = view(1440, 1);
    for _ in 0..40 {
      let next = v.next();
      assert_eq!(next.prev(), v);
      v = next;
    }
    assert_eq!(v, view(1443, 5));
  }

  #[test]
  fn week_start_columns() {
    assert_eq!(
      WeekStart::Monday.column_of(Weekday::Mon),
      0
    );
    assert_eq!(
      WeekStart::Sunday.column_of(Weekday::Mon),
      1
    );
    assert_eq!(
      WeekStart::Saturday
        .column_of(Weekday::Fri),
      6
    );
    assert_eq!(
      WeekStart::Sunday.columns()[0],
      Weekday::Sun
    );
    assert_eq!(
      WeekStart::parse("Sat"),
      Some(WeekStart::Saturday)
    );
    assert_eq!(WeekStart::parse("noon"), None);
  }

  #[test]
  fn layout_is_complete_and_consistent() {
    let b = builder(g(2000, 1, 1));
    for (y, m) in
      [(1445, 1), (1445, 9), (1446, 12)]
    {
      let grid = b
        .build_offline_grid(y, m)
        .expect("grid");
      let length =
        hijri::month_length(y, m).expect("len");
      let offset = hijri::first_weekday_offset(
        y, m
      )
      .expect("offset");

      assert_eq!(grid.cells.len() as u32, length);
      assert_eq!(grid.offset, offset);
      for (idx, cell) in
        grid.cells.iter().enumerate()
      {
        let day = idx as u32 + 1;
        assert_eq!(cell.day, day);
        assert_eq!(
          cell.row,
          (offset + day - 1) / 7
        );
        assert_eq!(
          cell.column,
          (offset + day - 1) % 7
        );
        assert!(!cell.is_today);
      }
    }
  }

  #[test]
  fn ramadan_1445_layout() {
    let b = builder(g(2024, 3, 15));
    let grid = b
      .build_offline_grid(1445, 9)
      .expect("grid");

    assert_eq!(grid.month_name, "Ramadan");
    assert_eq!(grid.title(), "Ramadan 1445");
    assert_eq!(grid.offset, 0);
    assert_eq!(grid.rows(), 5);

    let today = grid.today().expect("today");
    assert_eq!(today.day, 5);
    assert_eq!(
      grid
        .cells
        .iter()
        .filter(|c| c.is_today)
        .count(),
      1
    );

    let first = &grid.cells[0];
    assert!(first.is_annotated());
    assert_eq!(
      first
        .annotations
        .iter()
        .map(|a| a.label.as_str())
        .collect::<Vec<_>>(),
      vec!["Start of Ramadan", "New Moon"]
    );
  }

  #[test]
  fn sunday_start_shifts_columns() {
    let b = builder(g(2024, 3, 15))
      .with_week_start(WeekStart::Sunday);
    let grid = b
      .build_offline_grid(1445, 9)
      .expect("grid");
    assert_eq!(grid.offset, 1);
    assert_eq!(grid.cells[0].column, 1);
    assert_eq!(grid.cells[6].row, 1);
    assert_eq!(grid.cells[6].column, 0);
  }

  #[test]
  fn mismatched_annotations_are_ignored() {
    let b = builder(g(2024, 3, 15));
    let stale = b
      .aggregator()
      .offline_annotations_for(1445, 8)
      .expect("annotations");
    let grid = b
      .layout(view(1445, 9), &stale, g(2024, 3, 15))
      .expect("grid");
    assert!(
      grid.cells.iter().all(|c| !c.is_annotated())
    );
  }

  #[test]
  fn arabic_month_name() {
    let grid = builder(g(2024, 3, 15))
      .with_locale(Locale::Ar)
      .build_offline_grid(1445, 10)
      .expect("grid");
    assert_eq!(grid.month_name, "شوال");
  }

  #[test]
  fn invalid_view_is_rejected() {
    assert!(CalendarViewState::new(1445, 13).is_err());
    assert!(
      builder(g(2024, 3, 15))
        .build_offline_grid(0, 1)
        .is_err()
    );
  }
}
