//! UI-side job queue.
//!
//! Audio-path callbacks never touch UI state directly: they post a job with
//! the audio timestamp it belongs to, and the UI loop runs the job once its
//! own clock reaches that time.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

type Job = Box<dyn FnOnce() + Send>;

struct DrawJob {
    time: f64,
    job: Job,
}

/// Sending half, cloned into clock callbacks
#[derive(Clone)]
pub struct DrawScheduler {
    tx: Sender<DrawJob>,
}

impl DrawScheduler {
    /// Run `job` on the UI side at (or after) `time`
    pub fn schedule(&self, time: f64, job: impl FnOnce() + Send + 'static) {
        // Receiver gone means the UI is shut down; nothing to notify
        let _ = self.tx.send(DrawJob { time, job: Box::new(job) });
    }
}

/// Receiving half, drained by the UI loop
pub struct DrawQueue {
    rx: Receiver<DrawJob>,
    pending: Vec<DrawJob>,
}

/// Create a connected scheduler/queue pair
pub fn draw_channel() -> (DrawScheduler, DrawQueue) {
    let (tx, rx) = unbounded();
    (DrawScheduler { tx }, DrawQueue { rx, pending: Vec::new() })
}

impl DrawQueue {
    /// Run every job whose time is `<= now`, earliest first. Returns how many ran.
    pub fn run_due(&mut self, now: f64) -> usize {
        self.pending.extend(self.rx.try_iter());
        if self.pending.is_empty() {
            return 0;
        }

        // Stable sort keeps post order for equal timestamps
        self.pending.sort_by(|a, b| a.time.total_cmp(&b.time));
        let due = self.pending.partition_point(|j| j.time <= now);
        let ran: Vec<DrawJob> = self.pending.drain(..due).collect();
        for draw in ran {
            (draw.job)();
        }
        if due > 0 {
            trace!(due, now, "Ran draw jobs");
        }
        due
    }

    /// Run everything regardless of time
    pub fn flush(&mut self) -> usize {
        self.run_due(f64::INFINITY)
    }

    /// Drop all queued jobs without running them
    pub fn clear(&mut self) {
        self.rx.try_iter().for_each(drop);
        self.pending.clear();
    }

    pub fn pending(&self) -> usize {
        self.pending.len() + self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_jobs_run_in_time_order_when_due() {
        let (scheduler, mut queue) = draw_channel();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (time, tag) in [(0.5, "b"), (0.25, "a"), (1.0, "c")] {
            let log = log.clone();
            scheduler.schedule(time, move || log.lock().unwrap().push(tag));
        }

        assert_eq!(queue.run_due(0.1), 0);
        assert_eq!(queue.run_due(0.5), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.flush(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_clear_drops_jobs() {
        let (scheduler, mut queue) = draw_channel();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        scheduler.schedule(0.0, move || *h.lock().unwrap() += 1);
        queue.clear();
        assert_eq!(queue.flush(), 0);
        assert_eq!(*hits.lock().unwrap(), 0);
    }
}
