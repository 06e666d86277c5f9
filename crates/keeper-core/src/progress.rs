/// Side-effecting progress sink called once per completed unit of work.
/// Implementations must not panic; a reporting hiccup never aborts a run.
pub trait ProgressReporter {
    fn report(&self, completed: usize, total: usize, current_repo: &str, operation: &str);
}

/// No-op reporter for tests and quiet mode.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn report(&self, _completed: usize, _total: usize, _current_repo: &str, _operation: &str) {}
}
