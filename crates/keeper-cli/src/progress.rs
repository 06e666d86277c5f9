use keeper_core::progress::ProgressReporter;
use std::io::Write;

const BAR_WIDTH: usize = 40;

/// Carriage-return progress bar on stderr. Write errors are swallowed; a
/// broken terminal must never abort a sync.
#[derive(Debug, Default)]
pub(crate) struct TerminalProgress;

impl ProgressReporter for TerminalProgress {
    fn report(&self, completed: usize, total: usize, current_repo: &str, operation: &str) {
        if total == 0 {
            return;
        }
        let line = render_bar(completed, total, current_repo, operation);
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r{line}");
        if completed >= total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

fn render_bar(completed: usize, total: usize, current_repo: &str, operation: &str) -> String {
    let filled = BAR_WIDTH * completed / total;
    let bar: String = "\u{2588}".repeat(filled) + &"\u{2591}".repeat(BAR_WIDTH - filled);
    let pct = completed as f64 / total as f64 * 100.0;
    format!("{operation}: |{bar}| {completed}/{total} ({pct:.1}%) - {current_repo}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fills_with_progress() {
        let line = render_bar(1, 2, "web", "Syncing");
        assert!(line.starts_with("Syncing: |"));
        assert!(line.contains("1/2 (50.0%)"));
        assert!(line.contains("web"));
        assert_eq!(line.matches('\u{2588}').count(), 20);
        assert_eq!(line.matches('\u{2591}').count(), 20);
    }

    #[test]
    fn full_bar_has_no_empty_cells() {
        let line = render_bar(3, 3, "web", "Cloning");
        assert_eq!(line.matches('\u{2588}').count(), 40);
        assert_eq!(line.matches('\u{2591}').count(), 0);
    }
}
