//! Bounded parallel dispatch of batches with in-order delivery.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use tddeps_core::DepsError;

use crate::batch::Batch;
use crate::search::{PatternSearch, SearchHit, SearchPattern};

/// Result of searching one batch.
#[derive(Debug)]
pub struct BatchResult {
    /// The batch that was searched.
    pub batch: Batch,
    /// Matching lines, grouped by file in batch order.
    pub hits: Vec<SearchHit>,
}

/// Runs searches on a dedicated pool and hands results back in submission order.
///
/// At most `jobs` batches are outstanding at any time, counting those that
/// finished but wait behind an earlier, slower batch.
pub struct BatchStream {
    pool: ThreadPool,
    searcher: Arc<dyn PatternSearch>,
    jobs: usize,
}

impl BatchStream {
    /// Create a stream with `jobs` workers.
    pub fn new(searcher: Arc<dyn PatternSearch>, jobs: usize) -> Result<Self, DepsError> {
        let jobs = jobs.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("tddeps-search-{i}"))
            .build()
            .map_err(|e| DepsError::InvalidConfig {
                message: format!("cannot start search pool: {e}"),
            })?;
        Ok(Self {
            pool,
            searcher,
            jobs,
        })
    }

    /// Number of concurrent searches.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Search every batch and feed results to `sink` in submission order.
    ///
    /// The first search or sink error stops dispatching and is returned;
    /// searches already running finish in the background and are discarded.
    pub fn run<I, F>(&self, batches: I, pattern: &SearchPattern, mut sink: F) -> Result<usize, DepsError>
    where
        I: IntoIterator<Item = Batch>,
        F: FnMut(BatchResult) -> Result<(), DepsError>,
    {
        let (tx, rx) = mpsc::channel::<(usize, Batch, Result<Vec<SearchHit>, DepsError>)>();
        let mut pending = batches.into_iter().enumerate();
        let mut ready: BTreeMap<usize, (Batch, Vec<SearchHit>)> = BTreeMap::new();
        let mut submitted = 0usize;
        let mut delivered = 0usize;
        let mut exhausted = false;

        loop {
            while !exhausted && submitted - delivered < self.jobs {
                match pending.next() {
                    Some((seq, batch)) => {
                        let tx = tx.clone();
                        let searcher = Arc::clone(&self.searcher);
                        let pattern = pattern.clone();
                        self.pool.spawn(move || {
                            let result = searcher.search(&batch, &pattern);
                            // The receiver is gone only after an earlier failure.
                            let _ = tx.send((seq, batch, result));
                        });
                        submitted += 1;
                    }
                    None => exhausted = true,
                }
            }

            if delivered == submitted {
                break;
            }

            let (seq, batch, result) = rx.recv().map_err(|_| DepsError::WorkerLost)?;
            ready.insert(seq, (batch, result?));

            while let Some((batch, hits)) = ready.remove(&delivered) {
                sink(BatchResult { batch, hits })?;
                delivered += 1;
            }
        }

        debug!(batches = delivered, "batch stream drained");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one synthetic hit per batch, sleeping longer for early batches.
    struct SlowEcho {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PatternSearch for SlowEcho {
        fn search(&self, batch: &Batch, _pattern: &SearchPattern) -> Result<Vec<SearchHit>, DepsError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20u64.saturating_sub(batch.seq as u64 * 2)));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![SearchHit {
                file: batch.files[0].clone(),
                line: 1,
                text: String::new(),
            }])
        }
    }

    struct Failing;

    impl PatternSearch for Failing {
        fn search(&self, batch: &Batch, _pattern: &SearchPattern) -> Result<Vec<SearchHit>, DepsError> {
            Err(DepsError::SearchFailed {
                cwd: batch.cwd.clone(),
                status: Some(2),
                stderr: "boom".to_string(),
            })
        }
    }

    fn batches(n: usize) -> Vec<Batch> {
        (0..n)
            .map(|seq| Batch {
                seq,
                cwd: PathBuf::from("/r"),
                files: vec![PathBuf::from(format!("/r/f{seq}.h"))],
            })
            .collect()
    }

    #[test]
    fn test_results_in_submission_order() {
        let searcher = Arc::new(SlowEcho {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let stream = BatchStream::new(searcher.clone(), 3).unwrap();
        let pattern = SearchPattern::new("x").unwrap();

        let mut seen = Vec::new();
        let count = stream
            .run(batches(10), &pattern, |result| {
                seen.push(result.batch.seq);
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 10);
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(searcher.peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_search_error_aborts() {
        let stream = BatchStream::new(Arc::new(Failing), 2).unwrap();
        let pattern = SearchPattern::new("x").unwrap();
        let err = stream.run(batches(4), &pattern, |_| Ok(())).unwrap_err();
        assert!(matches!(err, DepsError::SearchFailed { .. }));
    }

    #[test]
    fn test_sink_error_aborts() {
        let searcher = Arc::new(SlowEcho {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let stream = BatchStream::new(searcher, 2).unwrap();
        let pattern = SearchPattern::new("x").unwrap();
        let mut calls = 0;
        let err = stream
            .run(batches(5), &pattern, |_| {
                calls += 1;
                Err(DepsError::WorkerLost)
            })
            .unwrap_err();
        assert!(matches!(err, DepsError::WorkerLost));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_empty_input() {
        let stream = BatchStream::new(Arc::new(Failing), 2).unwrap();
        let pattern = SearchPattern::new("x").unwrap();
        assert_eq!(stream.run(Vec::new(), &pattern, |_| Ok(())).unwrap(), 0);
    }
}
