//! Process-wide worker pool for highlight inference.
//!
//! One [`HighlightExecutor`] is shared by every request the process handles.
//! Admission is bounded: a pool accepts at most `parallelism + queue_size`
//! outstanding jobs, after which submitters either wait or are turned away
//! depending on the [`BackpressurePolicy`].
//!
//! The parallelism level can be changed at runtime. A new pool is built and
//! swapped in; the previous one stops admitting work, finishes the jobs it
//! already holds and then releases its threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, error, info};
use parking_lot::{Condvar, Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{HighlightError, Result};
use crate::highlight::settings::{BackpressurePolicy, HighlightSettings};

/// Bounded admission state of one pool.
struct Admission {
    state: Mutex<AdmissionState>,
    released: Condvar,
    capacity: usize,
}

struct AdmissionState {
    in_flight: usize,
    retired: bool,
}

/// A slot in a pool; frees itself when the job holding it ends.
struct Permit {
    admission: Arc<Admission>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut state = self.admission.state.lock();
        state.in_flight -= 1;
        drop(state);
        self.admission.released.notify_one();
    }
}

impl Admission {
    fn new(capacity: usize) -> Self {
        Admission {
            state: Mutex::new(AdmissionState {
                in_flight: 0,
                retired: false,
            }),
            released: Condvar::new(),
            capacity,
        }
    }

    /// Take a slot. `Ok(None)` means the pool was retired and the caller
    /// should retry against the active one. A blocked wait gives up at
    /// `deadline`.
    fn acquire(
        self: &Arc<Self>,
        policy: BackpressurePolicy,
        deadline: Option<Instant>,
    ) -> Result<Option<Permit>> {
        let mut state = self.state.lock();
        loop {
            if state.retired {
                return Ok(None);
            }
            if state.in_flight < self.capacity {
                state.in_flight += 1;
                return Ok(Some(Permit {
                    admission: Arc::clone(self),
                }));
            }
            match policy {
                BackpressurePolicy::Reject => {
                    return Err(HighlightError::resource_exhausted(format!(
                        "highlight pool saturated ({} jobs outstanding)",
                        state.in_flight
                    )));
                }
                BackpressurePolicy::Block => match deadline {
                    Some(deadline) => {
                        if self.released.wait_until(&mut state, deadline).timed_out()
                            && !state.retired
                            && state.in_flight >= self.capacity
                        {
                            return Err(HighlightError::timeout(format!(
                                "no highlight pool slot freed before the deadline ({} jobs outstanding)",
                                state.in_flight
                            )));
                        }
                    }
                    None => self.released.wait(&mut state),
                },
            }
        }
    }

    fn retire(&self) {
        self.state.lock().retired = true;
        self.released.notify_all();
    }

    fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }
}

/// One generation of worker threads.
struct WorkerPool {
    pool: ThreadPool,
    admission: Arc<Admission>,
    parallelism: usize,
    generation: u64,
}

impl WorkerPool {
    fn new(parallelism: usize, queue_size: usize, generation: u64) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(move |i| format!("semantic-highlight-{generation}-{i}"))
            .panic_handler(|_| error!("[semantic-hl] highlight job panicked"))
            .build()
            .map_err(|e| {
                HighlightError::resource_exhausted(format!("Failed to create thread pool: {e}"))
            })?;

        Ok(WorkerPool {
            pool,
            admission: Arc::new(Admission::new(parallelism + queue_size)),
            parallelism,
            generation,
        })
    }

    fn spawn<F>(&self, permit: Permit, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(move || {
            let _permit = permit;
            job();
        });
    }
}

/// Shared, resizable worker pool for highlight inference.
pub struct HighlightExecutor {
    active: RwLock<Arc<WorkerPool>>,
    queue_size: usize,
    policy: BackpressurePolicy,
    next_generation: AtomicU64,
    shut_down: AtomicBool,
}

impl HighlightExecutor {
    /// Create an executor sized from `settings`.
    pub fn new(settings: &HighlightSettings) -> Result<Self> {
        settings.validate()?;
        Self::with_parallelism(
            settings.effective_parallelism(),
            settings.queue_size,
            settings.backpressure,
        )
    }

    /// Create an executor with explicit sizing.
    pub fn with_parallelism(
        parallelism: usize,
        queue_size: usize,
        policy: BackpressurePolicy,
    ) -> Result<Self> {
        if parallelism == 0 {
            return Err(HighlightError::config("parallelism must be positive"));
        }
        let pool = WorkerPool::new(parallelism, queue_size, 0)?;
        info!(
            "[semantic-hl] highlight executor started: parallelism={parallelism}, queue_size={queue_size}, policy={policy:?}"
        );

        Ok(HighlightExecutor {
            active: RwLock::new(Arc::new(pool)),
            queue_size,
            policy,
            next_generation: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Submit a job to the active pool.
    ///
    /// Under [`BackpressurePolicy::Block`] this waits for a free slot; under
    /// [`BackpressurePolicy::Reject`] a saturated pool fails the submission
    /// with [`HighlightError::ResourceExhausted`]. After
    /// [`shutdown`](Self::shutdown) every submission fails with
    /// [`HighlightError::InvalidOperation`].
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_inner(job, None)
    }

    /// Submit a job, waiting for a slot no later than `deadline`.
    ///
    /// Behaves like [`submit`](Self::submit), except that a blocked
    /// submission still waiting at `deadline` fails with
    /// [`HighlightError::Timeout`] and the job is dropped unrun.
    pub fn submit_until<F>(&self, job: F, deadline: Instant) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_inner(job, Some(deadline))
    }

    fn submit_inner<F>(&self, job: F, deadline: Option<Instant>) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        loop {
            if self.is_shut_down() {
                return Err(HighlightError::invalid_operation(
                    "highlight executor is shut down",
                ));
            }

            let pool = Arc::clone(&*self.active.read());
            if let Some(permit) = pool.admission.acquire(self.policy, deadline)? {
                pool.spawn(permit, job);
                return Ok(());
            }
            debug!(
                "[semantic-hl] pool generation {} retired during submission, retrying",
                pool.generation
            );
        }
    }

    /// Worker count of the active pool.
    pub fn parallelism(&self) -> usize {
        self.active.read().parallelism
    }

    /// Jobs admitted to the active pool and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.active.read().admission.in_flight()
    }

    /// Change the worker count.
    ///
    /// A no-op when `parallelism` equals the current level. Otherwise a new
    /// pool takes over all new submissions while the old one drains the jobs
    /// it already admitted.
    pub fn update_parallelism(&self, parallelism: usize) -> Result<()> {
        if parallelism == 0 {
            return Err(HighlightError::config("parallelism must be positive"));
        }
        if self.is_shut_down() {
            return Err(HighlightError::invalid_operation(
                "highlight executor is shut down",
            ));
        }

        let mut active = self.active.write();
        if active.parallelism == parallelism {
            debug!("[semantic-hl] parallelism already {parallelism}, keeping pool");
            return Ok(());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pool = WorkerPool::new(parallelism, self.queue_size, generation)?;
        let previous = std::mem::replace(&mut *active, Arc::new(pool));
        drop(active);

        previous.admission.retire();
        info!(
            "[semantic-hl] highlight parallelism changed {} -> {parallelism}; draining {} job(s) on generation {}",
            previous.parallelism,
            previous.admission.in_flight(),
            previous.generation
        );
        Ok(())
    }

    /// Stop accepting work. Jobs already admitted still run to completion.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.active.read().admission.retire();
        info!("[semantic-hl] highlight executor shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for HighlightExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.active.read();
        f.debug_struct("HighlightExecutor")
            .field("parallelism", &active.parallelism)
            .field("generation", &active.generation)
            .field("queue_size", &self.queue_size)
            .field("policy", &self.policy)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use crossbeam_channel::{bounded, unbounded};

    use super::*;

    #[test]
    fn test_runs_submitted_jobs() {
        let executor = HighlightExecutor::with_parallelism(2, 8, BackpressurePolicy::Block).unwrap();
        let (tx, rx) = unbounded();

        for i in 0..5 {
            let tx = tx.clone();
            executor.submit(move || tx.send(i).unwrap()).unwrap();
        }

        let mut seen: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_reject_policy_when_saturated() {
        let executor = HighlightExecutor::with_parallelism(1, 1, BackpressurePolicy::Reject).unwrap();
        let (gate_tx, gate_rx) = bounded::<()>(0);

        for _ in 0..2 {
            let gate_rx = gate_rx.clone();
            executor
                .submit(move || {
                    let _ = gate_rx.recv();
                })
                .unwrap();
        }

        let error = executor.submit(|| {}).unwrap_err();
        assert!(matches!(error, HighlightError::ResourceExhausted(_)));

        drop(gate_tx);
    }

    #[test]
    fn test_block_policy_waits_for_a_slot() {
        let executor = Arc::new(
            HighlightExecutor::with_parallelism(1, 1, BackpressurePolicy::Block).unwrap(),
        );
        let (gate_tx, gate_rx) = bounded::<()>(0);
        for _ in 0..2 {
            let gate_rx = gate_rx.clone();
            executor
                .submit(move || {
                    let _ = gate_rx.recv();
                })
                .unwrap();
        }

        let (done_tx, done_rx) = unbounded();
        let submitter = {
            let executor = Arc::clone(&executor);
            thread::spawn(move || {
                executor.submit(move || done_tx.send(()).unwrap()).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(done_rx.try_recv().is_err());

        drop(gate_tx);
        submitter.join().unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_submit_until_gives_up_at_deadline() {
        let executor = HighlightExecutor::with_parallelism(1, 1, BackpressurePolicy::Block).unwrap();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        for _ in 0..2 {
            let gate_rx = gate_rx.clone();
            executor
                .submit(move || {
                    let _ = gate_rx.recv();
                })
                .unwrap();
        }

        let (done_tx, done_rx) = unbounded::<()>();
        let start = Instant::now();
        let error = executor
            .submit_until(move || done_tx.send(()).unwrap(), start + Duration::from_millis(80))
            .unwrap_err();

        assert!(matches!(error, HighlightError::Timeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert!(start.elapsed() < Duration::from_secs(2));

        // The rejected job was dropped, so its sender is gone.
        assert!(done_rx.recv_timeout(Duration::from_secs(1)).is_err());
        drop(gate_tx);
    }

    #[test]
    fn test_submit_until_admits_when_slot_frees() {
        let executor = Arc::new(
            HighlightExecutor::with_parallelism(1, 0, BackpressurePolicy::Block).unwrap(),
        );
        executor
            .submit(|| thread::sleep(Duration::from_millis(50)))
            .unwrap();

        let (done_tx, done_rx) = unbounded();
        executor
            .submit_until(
                move || done_tx.send(()).unwrap(),
                Instant::now() + Duration::from_secs(5),
            )
            .unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_update_parallelism_drains_old_pool() {
        let executor = HighlightExecutor::with_parallelism(1, 4, BackpressurePolicy::Block).unwrap();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = unbounded();

        let old_done = done_tx.clone();
        executor
            .submit(move || {
                let _ = gate_rx.recv();
                old_done.send("old").unwrap();
            })
            .unwrap();

        executor.update_parallelism(3).unwrap();
        assert_eq!(executor.parallelism(), 3);

        executor.submit(move || done_tx.send("new").unwrap()).unwrap();
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), "new");

        drop(gate_tx);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), "old");
    }

    #[test]
    fn test_update_to_same_level_is_noop() {
        let executor = HighlightExecutor::with_parallelism(2, 4, BackpressurePolicy::Block).unwrap();
        executor.update_parallelism(2).unwrap();
        assert_eq!(executor.parallelism(), 2);
        assert!(executor.update_parallelism(0).is_err());
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let executor = HighlightExecutor::with_parallelism(1, 4, BackpressurePolicy::Block).unwrap();
        executor.shutdown();

        assert!(executor.is_shut_down());
        let error = executor.submit(|| {}).unwrap_err();
        assert!(matches!(error, HighlightError::InvalidOperation(_)));
        assert!(executor.update_parallelism(4).is_err());
    }

    #[test]
    fn test_new_validates_settings() {
        assert!(HighlightExecutor::new(&HighlightSettings::default().with_parallelism(0)).is_err());
        assert!(HighlightExecutor::with_parallelism(0, 1, BackpressurePolicy::Block).is_err());

        let executor = HighlightExecutor::new(&HighlightSettings::default().with_parallelism(2)).unwrap();
        assert_eq!(executor.parallelism(), 2);
        assert_eq!(executor.in_flight(), 0);
    }
}
