use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ghsnap::DownloadProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Counters for the traversal currently on screen.
#[derive(Default)]
struct Tally {
    issues: usize,
    pull_requests: usize,
    members: usize,
    pages: usize,
}

impl Tally {
    fn summary(&self) -> String {
        if self.members > 0 {
            format!("{} members, {} pages", self.members, self.pages)
        } else {
            format!(
                "{} issues, {} pull requests, {} pages",
                self.issues, self.pull_requests, self.pages
            )
        }
    }
}

#[derive(Default)]
struct ProgressState {
    /// Spinner of the running traversal; traversals never overlap.
    current: Option<ProgressBar>,
    tally: Tally,
}

/// Interactive progress reporter using indicatif.
pub(crate) struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn start(&self, state: &mut ProgressState, prefix: String, message: String) {
        if let Some(previous) = state.current.take()
            && !previous.is_finished()
        {
            previous.finish();
        }
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_prefix(prefix);
        bar.set_message(message);
        state.current = Some(bar);
        state.tally = Tally::default();
    }

    fn update(state: &ProgressState) {
        if let Some(bar) = &state.current {
            bar.set_message(state.tally.summary());
        }
    }

    pub fn handle(&self, event: DownloadProgress) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            DownloadProgress::RepositoryStarted {
                owner,
                name,
                version,
            } => {
                self.start(
                    &mut state,
                    format!("{owner}/{name}"),
                    format!("Downloading as generation {version}..."),
                );
            }
            DownloadProgress::RepositorySaved { topics, .. } => {
                if let Some(bar) = &state.current {
                    bar.set_message(format!("Saved repository ({topics} topics)"));
                }
            }
            DownloadProgress::IssueSaved { .. } => {
                state.tally.issues += 1;
                Self::update(&state);
            }
            DownloadProgress::PullRequestSaved { .. } => {
                state.tally.pull_requests += 1;
                Self::update(&state);
            }
            DownloadProgress::MemberSaved { .. } => {
                state.tally.members += 1;
                Self::update(&state);
            }
            DownloadProgress::PageFetched { .. } => {
                state.tally.pages += 1;
                Self::update(&state);
            }
            DownloadProgress::RetryBackoff {
                operation,
                retry_after_ms,
                attempt,
            } => {
                if let Some(bar) = &state.current {
                    bar.set_message(format!(
                        "{operation} failed (attempt {attempt}), retrying in {:.1}s",
                        retry_after_ms as f64 / 1000.0
                    ));
                }
            }
            DownloadProgress::RepositoryFinished { version, .. }
            | DownloadProgress::OrganizationFinished { version, .. } => {
                if let Some(bar) = state.current.take() {
                    bar.finish_with_message(format!(
                        "✓ generation {version}: {}",
                        state.tally.summary()
                    ));
                }
            }
            DownloadProgress::RepositoryFailed { error, .. }
            | DownloadProgress::OrganizationFailed { error, .. } => {
                if let Some(bar) = state.current.take() {
                    bar.abandon_with_message(format!("✗ rolled back: {error}"));
                }
            }
            DownloadProgress::OrganizationStarted { login, version } => {
                self.start(
                    &mut state,
                    login,
                    format!("Downloading as generation {version}..."),
                );
            }
            DownloadProgress::Activated { version } => {
                self.multi
                    .println(format!("✓ Generation {version} is now active"))
                    .ok();
            }
            DownloadProgress::CleanedUp { version } => {
                self.multi
                    .println(format!(
                        "✓ Removed generations other than {version} and the active one"
                    ))
                    .ok();
            }
            _ => {}
        }
    }

    pub fn println(&self, line: &str) {
        self.multi.println(line).ok();
    }

    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = state.current.take()
            && !bar.is_finished()
        {
            bar.finish();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_summary_prefers_members_for_organizations() {
        let repo = Tally {
            issues: 2,
            pull_requests: 1,
            members: 0,
            pages: 4,
        };
        assert_eq!(repo.summary(), "2 issues, 1 pull requests, 4 pages");

        let org = Tally {
            members: 3,
            pages: 1,
            ..Tally::default()
        };
        assert_eq!(org.summary(), "3 members, 1 pages");
    }

    #[test]
    fn finished_traversal_releases_its_spinner() {
        let reporter = InteractiveReporter::new();
        reporter.handle(DownloadProgress::RepositoryStarted {
            owner: "src-d".into(),
            name: "go-git".into(),
            version: 1,
        });
        reporter.handle(DownloadProgress::PageFetched {
            connection: "issue comments",
            count: 10,
        });
        assert_eq!(reporter.state.lock().unwrap().tally.pages, 1);

        reporter.handle(DownloadProgress::RepositoryFinished {
            owner: "src-d".into(),
            name: "go-git".into(),
            version: 1,
            issues: 0,
            pull_requests: 0,
        });
        assert!(reporter.state.lock().unwrap().current.is_none());
    }
}
