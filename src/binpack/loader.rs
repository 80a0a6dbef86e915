//! Multi-worker batch loader over a binpack file.
//!
//! A fixed pool of worker threads each owns its own decoder on its own block
//! stripe. Every worker fills one batch into its slot and blocks until the
//! consumer drains it; the consumer takes batches in round-robin worker order
//! under a single mutex/condvar pair. A finished worker is skipped, and the
//! loader yields `None` once every worker has finished. Dropping the loader
//! flips the stop flag, wakes everyone and joins the threads.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use super::{BinpackStream, TrainingDataEntry};
use crate::errors::EngineResult;

struct WorkerSlot {
    batch: Option<Vec<TrainingDataEntry>>,
    ready: bool,
    finished: bool,
}

struct LoaderState {
    slots: Vec<WorkerSlot>,
    stop: bool,
}

struct Shared {
    state: Mutex<LoaderState>,
    cond: Condvar,
}

pub struct DataLoader {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    num_workers: usize,
    current_worker: usize,
}

impl DataLoader {
    pub fn new(
        path: PathBuf,
        batch_size: usize,
        drop_probability: f32,
        num_workers: usize,
    ) -> Self {
        assert!(num_workers > 0, "need at least one worker");

        let slots = (0..num_workers)
            .map(|_| WorkerSlot {
                batch: None,
                ready: false,
                finished: false,
            })
            .collect();

        let shared = Arc::new(Shared {
            state: Mutex::new(LoaderState { slots, stop: false }),
            cond: Condvar::new(),
        });

        let workers = (0..num_workers)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                let path = path.clone();
                std::thread::spawn(move || {
                    worker_fn(shared, path, batch_size, drop_probability, worker_id, num_workers)
                })
            })
            .collect();

        DataLoader {
            shared,
            workers,
            num_workers,
            current_worker: 0,
        }
    }

    /// The next batch in round-robin worker order.
    ///
    /// Blocks until the current worker's slot is ready; returns `None` when
    /// all workers have finished or the loader is stopping.
    pub fn next_batch(&mut self) -> Option<Vec<TrainingDataEntry>> {
        let mut state = self.shared.state.lock();
        let beginning_worker = self.current_worker;

        loop {
            while !(state.slots[self.current_worker].ready
                || state.slots[self.current_worker].finished
                || state.stop)
            {
                self.shared.cond.wait(&mut state);
            }

            if state.stop {
                return None;
            }
            if state.slots[self.current_worker].finished {
                self.current_worker = (self.current_worker + 1) % self.num_workers;
                if self.current_worker == beginning_worker {
                    return None;
                }
                continue;
            }

            let batch = state.slots[self.current_worker].batch.take();
            state.slots[self.current_worker].ready = false;

            // let the worker produce its next batch
            self.shared.cond.notify_all();

            self.current_worker = (self.current_worker + 1) % self.num_workers;
            return batch;
        }
    }
}

impl Drop for DataLoader {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
            self.shared.cond.notify_all();
        }
        for worker in self.workers.drain(..) {
            worker.join().ok();
        }
    }
}

fn fill_batch(
    stream: &mut BinpackStream,
    batch_size: usize,
) -> EngineResult<Vec<TrainingDataEntry>> {
    let mut batch = Vec::with_capacity(batch_size);
    while batch.len() < batch_size {
        match stream.next_entry()? {
            Some(entry) => batch.push(entry.clone()),
            None => break,
        }
    }
    Ok(batch)
}

fn worker_fn(
    shared: Arc<Shared>,
    path: PathBuf,
    batch_size: usize,
    drop_probability: f32,
    worker_id: usize,
    num_workers: usize,
) {
    let mut stream = match BinpackStream::new(&path, drop_probability, worker_id, num_workers) {
        Ok(stream) => Some(stream),
        Err(e) => {
            eprintln!("[loader] worker {}: {}", worker_id, e);
            None
        }
    };

    loop {
        // a stream error is fatal to this worker's stripe
        let batch = match stream.as_mut() {
            Some(s) => match fill_batch(s, batch_size) {
                Ok(batch) => batch,
                Err(e) => {
                    eprintln!("[loader] worker {}: {}", worker_id, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut state = shared.state.lock();
        if batch.is_empty() {
            state.slots[worker_id].finished = true;
            shared.cond.notify_all();
            break;
        }

        state.slots[worker_id].batch = Some(batch);
        state.slots[worker_id].ready = true;
        shared.cond.notify_all();

        // wait for the consumer to drain the slot
        while state.slots[worker_id].ready && !state.stop {
            shared.cond.wait(&mut state);
        }
        if state.stop {
            break;
        }
    }
}
