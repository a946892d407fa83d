//! Load Session
//! Background (re)loads of individual slots. Each request is tagged with a
//! per-slot generation; only the newest request for a slot may replace its
//! table, so a slow stale load can never overwrite fresher data.

use super::loader::{DataLoader, LoadError, LoadedTables, TableSource};
use polars::prelude::DataFrame;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use tracing::{info, warn};

/// Load result sent back from a worker thread
struct LoadMessage {
    slot: String,
    generation: u64,
    result: Result<DataFrame, LoadError>,
}

/// What happened to a finished load.
#[derive(Debug)]
pub enum LoadEvent {
    /// The table in `slot` was replaced.
    Applied { slot: String, rows: usize },
    /// A newer request for `slot` was issued; this result was dropped.
    Stale { slot: String, generation: u64 },
    /// The newest request for `slot` failed; the previous table is kept.
    Failed { slot: String, error: LoadError },
}

/// Owns the loaded tables and the in-flight reloads.
pub struct LoadSession {
    tables: LoadedTables,
    generations: HashMap<String, u64>,
    pending: usize,
    tx: Sender<LoadMessage>,
    rx: Receiver<LoadMessage>,
}

impl LoadSession {
    pub fn new(tables: LoadedTables) -> Self {
        let (tx, rx) = channel();
        Self {
            tables,
            generations: HashMap::new(),
            pending: 0,
            tx,
            rx,
        }
    }

    pub fn tables(&self) -> &LoadedTables {
        &self.tables
    }

    /// Number of requests whose results have not been received yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Start loading `source` in the background. Returns the request's
    /// generation; any earlier request for the same slot becomes stale.
    pub fn request(&mut self, source: TableSource) -> u64 {
        let slot = source.slot.clone();
        self.spawn(slot, move || DataLoader::load_csv(&source))
    }

    /// Run `load` on a worker thread for `slot`. The worker always reports
    /// back, even if `load` panics, so `wait` cannot block forever.
    fn spawn<F>(&mut self, slot: String, load: F) -> u64
    where
        F: FnOnce() -> Result<DataFrame, LoadError> + Send + 'static,
    {
        let generation = self.generations.entry(slot.clone()).or_insert(0);
        *generation += 1;
        let generation = *generation;
        self.pending += 1;

        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(load)).unwrap_or_else(|payload| {
                Err(LoadError::WorkerPanicked {
                    slot: slot.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });
            let _ = tx.send(LoadMessage {
                slot,
                generation,
                result,
            });
        });

        generation
    }

    /// Apply every result that has already arrived.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            events.push(self.apply(message));
        }
        events
    }

    /// Block until every outstanding request has reported back.
    pub fn wait(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while self.pending > 0 {
            match self.rx.recv() {
                Ok(message) => events.push(self.apply(message)),
                Err(_) => break,
            }
        }
        events
    }

    fn apply(&mut self, message: LoadMessage) -> LoadEvent {
        self.pending = self.pending.saturating_sub(1);
        let LoadMessage {
            slot,
            generation,
            result,
        } = message;

        let latest = self.generations.get(&slot).copied().unwrap_or(0);
        if generation < latest {
            warn!(%slot, generation, latest, "discarding stale load");
            return LoadEvent::Stale { slot, generation };
        }

        match result {
            Ok(df) => {
                let rows = df.height();
                self.tables.insert(&slot, df);
                info!(%slot, rows, "table reloaded");
                LoadEvent::Applied { slot, rows }
            }
            Err(error) => {
                warn!(%slot, %error, "reload failed, keeping previous table");
                LoadEvent::Failed { slot, error }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;
    use std::fs;

    #[test]
    fn newest_request_wins_regardless_of_completion_order() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.csv");
        let new = dir.path().join("new.csv");
        fs::write(&old, "country\nA\n").unwrap();
        fs::write(&new, "country\nA\nB\nC\n").unwrap();

        let mut session = LoadSession::new(LoadedTables::new());
        session.request(TableSource::new("cases", &old));
        session.request(TableSource::new("cases", &new));
        let events = session.wait();

        assert_eq!(events.len(), 2);
        assert_eq!(session.pending(), 0);
        assert_eq!(session.tables().get("cases").unwrap().height(), 3);
        assert!(events
            .iter()
            .any(|e| matches!(e, LoadEvent::Applied { rows: 3, .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, LoadEvent::Applied { rows: 1, .. })));
    }

    #[test]
    fn poll_applies_results_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.csv");
        fs::write(&path, "country\nA\n").unwrap();

        let mut session = LoadSession::new(LoadedTables::new());
        assert_eq!(session.request(TableSource::new("cases", &path)), 1);

        let mut events = Vec::new();
        while session.pending() > 0 {
            events.extend(session.poll());
            std::thread::yield_now();
        }
        assert!(matches!(events[..], [LoadEvent::Applied { rows: 1, .. }]));
        assert!(session.tables().contains("cases"));
    }

    #[test]
    fn failed_reload_keeps_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = LoadedTables::new();
        tables.insert("cases", df!("country" => ["A"]).unwrap());

        let mut session = LoadSession::new(tables);
        session.request(TableSource::new("cases", dir.path().join("missing.csv")));
        let events = session.wait();

        assert!(matches!(events[0], LoadEvent::Failed { .. }));
        assert_eq!(session.tables().get("cases").unwrap().height(), 1);
    }

    #[test]
    fn panicking_loader_reports_failure() {
        let mut tables = LoadedTables::new();
        tables.insert("cases", df!("country" => ["A"]).unwrap());

        let mut session = LoadSession::new(tables);
        session.spawn("cases".to_string(), || panic!("reader blew up"));
        let events = session.wait();

        assert_eq!(session.pending(), 0);
        let [LoadEvent::Failed { slot, error }] = &events[..] else {
            panic!("expected one failure, got {events:?}");
        };
        assert_eq!(slot, "cases");
        assert!(error.to_string().contains("reader blew up"));
        assert_eq!(session.tables().get("cases").unwrap().height(), 1);
    }
}
