//! Background transfers with forward-only progress.
//!
//! A transfer job runs on its own thread and reports progress over an mpsc
//! channel. Sends never block and a dropped receiver is ignored, so a job
//! runs to completion whether or not anyone is listening. There is no
//! cancellation once a job has started.

use std::cell::Cell;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::errors::{TransferError, TransferResult};

/// One progress signal, 0–100
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub stage: String,
}

/// Fire-and-forget progress sender.
///
/// Reported values never decrease and never exceed 100; a lower value is
/// raised to the last one reported.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<ProgressUpdate>>,
    last: Cell<u8>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        ProgressReporter {
            tx: Some(tx),
            last: Cell::new(0),
        }
    }

    /// Reporter with nobody listening
    pub fn silent() -> Self {
        ProgressReporter::default()
    }

    pub fn report(&self, percent: u8, stage: &str) {
        let percent = percent.min(100).max(self.last.get());
        self.last.set(percent);
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressUpdate {
                percent,
                stage: stage.to_string(),
            });
        }
    }

    pub fn last(&self) -> u8 {
        self.last.get()
    }
}

/// A running transfer job
pub struct TransferHandle<T> {
    handle: JoinHandle<TransferResult<T>>,
}

impl<T> TransferHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job and return its result
    pub fn join(self) -> TransferResult<T> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(TransferError::internal("transfer worker panicked")))
    }
}

/// Run `job` on a worker thread.
///
/// The job owns everything it touches; the models move into it and come
/// back through its result.
pub fn spawn_transfer<T, F>(job: F) -> (TransferHandle<T>, mpsc::Receiver<ProgressUpdate>)
where
    T: Send + 'static,
    F: FnOnce(&ProgressReporter) -> TransferResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let progress = ProgressReporter::new(tx);
        let result = job(&progress);
        if result.is_ok() {
            progress.report(100, "done");
        }
        result
    });
    (TransferHandle { handle }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let (tx, rx) = mpsc::channel();
        let progress = ProgressReporter::new(tx);
        progress.report(40, "read");
        progress.report(10, "late");
        progress.report(250, "over");
        drop(progress);

        let values: Vec<u8> = rx.iter().map(|u| u.percent).collect();
        assert_eq!(values, vec![40, 40, 100]);
    }

    #[test]
    fn test_dropped_receiver_does_not_fail_job() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let progress = ProgressReporter::new(tx);
        progress.report(50, "stage");
        assert_eq!(progress.last(), 50);
    }

    #[test]
    fn test_spawned_job_returns_result_and_progress() {
        let (handle, rx) = spawn_transfer(|progress| {
            progress.report(30, "reading");
            Ok(7)
        });
        assert_eq!(handle.join().unwrap(), 7);
        let updates: Vec<ProgressUpdate> = rx.iter().collect();
        assert_eq!(updates.first().map(|u| u.percent), Some(30));
        assert_eq!(updates.last().map(|u| u.percent), Some(100));
    }

    #[test]
    fn test_failed_job_error_is_returned() {
        let (handle, _rx) = spawn_transfer::<(), _>(|_| Err(TransferError::connectivity("SAFE")));
        assert_eq!(handle.join().unwrap_err(), TransferError::connectivity("SAFE"));
    }

    #[test]
    fn test_panicking_job_is_internal_error() {
        let (handle, _rx) = spawn_transfer::<(), _>(|_| panic!("boom"));
        assert_eq!(handle.join().unwrap_err().error_code(), "INTERNAL_ERROR");
    }
}
