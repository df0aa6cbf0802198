//! A pool job's tiny state machine (spec.md §9: prefer an explicit enum
//! over a boolean "reschedule" return).

/// What a job should do once it has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job is finished and must be discarded.
    Done,
    /// The job must be re-queued (used to build `schedule`).
    Reschedule,
}

/// A unit of work submitted to the pool.
pub struct Job {
    f: Box<dyn FnMut() -> JobOutcome + Send>,
}

impl Job {
    /// A job that always reports [`JobOutcome::Done`] after running once.
    pub fn once(f: impl FnOnce() -> JobOutcome + Send + 'static) -> Self {
        let mut f = Some(f);
        Self {
            f: Box::new(move || match f.take() {
                Some(f) => f(),
                None => JobOutcome::Done,
            }),
        }
    }

    /// A job that may report [`JobOutcome::Reschedule`] more than once
    /// before finishing (used by `schedule`).
    pub fn new(f: impl FnMut() -> JobOutcome + Send + 'static) -> Self {
        Self { f: Box::new(f) }
    }

    /// Run the job once.
    pub fn run(&mut self) -> JobOutcome {
        (self.f)()
    }
}
