//! Bounded worker pool for blocking action executors (§5). Event ingestion
//! threads (BLE scanner, MQTT network loop) must stay live; shell, webhook,
//! and device-command executors can block for arbitrary amounts of time, so
//! `ActionRunner::fire` hands them off here instead of running them inline.
//! Same shape as the teacher's background-thread-plus-channel workers in
//! `sources/mqtt.rs`, generalized to a fixed-size pool of workers pulling
//! from one shared queue.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..size.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                std::thread::spawn(move || loop {
                    let job = rx.lock().expect("worker pool queue mutex poisoned").recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })
            })
            .collect();
        Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// Queue a job for execution on whichever worker is next free. Silently
    /// dropped if the pool has already been shut down.
    pub fn submit(&self, job: Job) {
        let tx = self.tx.lock().expect("worker pool sender mutex poisoned");
        if let Some(tx) = tx.as_ref() {
            if tx.send(job).is_err() {
                log::warn!("worker pool queue closed, dropping job");
            }
        }
    }

    /// Block until every job queued before this call has finished running.
    /// Exact only for a single-worker pool, where the queue is strict FIFO;
    /// used by tests to make executor side effects observable.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.submit(Box::new(move || {
            let _ = done_tx.send(());
        }));
        let _ = done_rx.recv();
    }

    /// Stop accepting new jobs and join every worker thread (§4.8 shutdown).
    pub fn shutdown(&self) {
        self.tx.lock().expect("worker pool sender mutex poisoned").take();
        let workers = std::mem::take(&mut *self.workers.lock().expect("worker pool queue mutex poisoned"));
        for worker in workers {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn submitted_jobs_run_and_flush_waits_for_them() {
        let pool = WorkerPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.flush();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn shutdown_joins_workers_and_stops_accepting_jobs() {
        let pool = WorkerPool::new(2);
        pool.shutdown();
        pool.submit(Box::new(|| panic!("job must not run after shutdown")));
    }
}
