//! Background annotation loading where
//! the most recent request wins.
//!
//! Every request bumps a generation
//! counter and aborts the fetch still
//! in flight. Results that arrive for
//! an older generation are reported as
//! stale and must not be applied.

use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{
  debug,
  instrument
};

use crate::aggregate::{
  ImportantDateAggregator,
  MonthAnnotations
};
use crate::error::InvalidDateError;
use crate::grid::CalendarViewState;

/// A finished fetch, tagged with the
/// generation that requested it.
#[derive(Debug)]
pub struct Loaded {
  pub generation: u64,
  pub view:       CalendarViewState,
  pub result: Result<
    MonthAnnotations,
    InvalidDateError
  >
}

#[derive(Debug)]
pub enum LoadOutcome {
  Applied {
    generation: u64,
    view:       CalendarViewState,
    result: Result<
      MonthAnnotations,
      InvalidDateError
    >
  },
  /// Result for a view that has since
  /// been navigated away from.
  Stale {
    generation: u64,
    view:       CalendarViewState
  }
}

impl LoadOutcome {
  pub fn is_stale(&self) -> bool {
    matches!(self, LoadOutcome::Stale { .. })
  }
}

pub struct MonthLoader {
  aggregator: Arc<ImportantDateAggregator>,
  generation: AtomicU64,
  in_flight:  Mutex<Option<JoinHandle<()>>>,
  tx:         mpsc::UnboundedSender<Loaded>,
  rx:         mpsc::UnboundedReceiver<Loaded>
}

impl MonthLoader {
  pub fn new(
    aggregator: Arc<ImportantDateAggregator>
  ) -> Self {
    let (tx, rx) =
      mpsc::unbounded_channel();
    Self {
      aggregator,
      generation: AtomicU64::new(0),
      in_flight: Mutex::new(None),
      tx,
      rx
    }
  }

  pub fn current_generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  pub fn is_current(
    &self,
    generation: u64
  ) -> bool {
    generation == self.current_generation()
  }

  /// Starts loading `view`, superseding
  /// any earlier request. Must be
  /// called inside a tokio runtime.
  #[instrument(skip(self, view), fields(view = %view))]
  pub fn request(
    &self,
    view: CalendarViewState
  ) -> u64 {
    let generation = self
      .generation
      .fetch_add(1, Ordering::SeqCst)
      + 1;

    let aggregator =
      Arc::clone(&self.aggregator);
    let tx = self.tx.clone();
    let handle = tokio::spawn(async move {
      let result = aggregator
        .annotations_for(
          view.year(), view.month()
        )
        .await;
      let loaded = Loaded {
        generation,
        view,
        result
      };
      if tx.send(loaded).is_err() {
        debug!(
          generation,
          "loader dropped before delivery"
        );
      }
    });

    if let Some(previous) =
      self.in_flight.lock().replace(handle)
      && !previous.is_finished()
    {
      debug!(
        generation,
        "aborting superseded fetch"
      );
      previous.abort();
    }

    generation
  }

  /// Waits for the next delivered
  /// result.
  pub async fn next_outcome(
    &mut self
  ) -> Option<LoadOutcome> {
    let loaded = self.rx.recv().await?;
    Some(self.classify(loaded))
  }

  pub fn classify(
    &self,
    loaded: Loaded
  ) -> LoadOutcome {
    if self.is_current(loaded.generation) {
      LoadOutcome::Applied {
        generation: loaded.generation,
        view:       loaded.view,
        result:     loaded.result
      }
    } else {
      debug!(
        generation = loaded.generation,
        current = self.current_generation(),
        view = %loaded.view,
        "discarding stale annotations"
      );
      LoadOutcome::Stale {
        generation: loaded.generation,
        view:       loaded.view
      }
    }
  }
}

impl Drop for MonthLoader {
  fn drop(&mut self) {
    if let Some(handle) =
      self.in_flight.get_mut().take()
    {
      handle.abort();
    }
  }
}
