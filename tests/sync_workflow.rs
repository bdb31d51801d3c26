//! End-to-end tests for a synchronization run against an in-memory GitHub.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use squash_only::prelude::*;

/// A fake account that serves repositories in pages and applies updates.
struct FakeGitHub {
    login: Option<String>,
    repos: RefCell<Vec<RepositoryRecord>>,
    page_size: usize,
    rejected: HashSet<String>,
    graphql_error_on_page: Option<u32>,
    patched: RefCell<Vec<String>>,
    requests: Cell<usize>,
    page_requests: Cell<u32>,
}

impl FakeGitHub {
    fn new(login: &str, repos: Vec<RepositoryRecord>) -> Self {
        Self {
            login: Some(login.to_string()),
            repos: RefCell::new(repos),
            page_size: 100,
            rejected: HashSet::new(),
            graphql_error_on_page: None,
            patched: RefCell::new(Vec::new()),
            requests: Cell::new(0),
            page_requests: Cell::new(0),
        }
    }

    fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    fn reject(mut self, full_name: &str) -> Self {
        self.rejected.insert(full_name.to_string());
        self
    }

    fn patched(&self) -> Vec<String> {
        self.patched.borrow().clone()
    }

    fn count_request(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

impl IdentityOps for FakeGitHub {
    fn authenticated_login(&self) -> Result<String> {
        self.count_request();
        self.login.clone().ok_or_else(|| SquashError::Identity {
            message: "no login".into(),
        })
    }
}

impl RepoQuery for FakeGitHub {
    fn fetch_repository_page(
        &self,
        _login: &str,
        _first: u32,
        after: Option<&str>,
    ) -> Result<RepositoryPage> {
        self.count_request();
        self.page_requests.set(self.page_requests.get() + 1);

        if self.graphql_error_on_page == Some(self.page_requests.get()) {
            return Err(SquashError::GraphQl {
                messages: vec!["API rate limit exceeded".into()],
            });
        }

        let repos = self.repos.borrow();
        let start: usize = after.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(repos.len());
        Ok(RepositoryPage {
            records: repos[start..end].to_vec(),
            has_next_page: end < repos.len(),
            end_cursor: Some(end.to_string()),
        })
    }
}

impl MergeSettingsOps for FakeGitHub {
    fn apply_squash_only(&self, full_name: &str) -> MutationOutcome {
        self.count_request();
        self.patched.borrow_mut().push(full_name.to_string());

        if self.rejected.contains(full_name) {
            return MutationOutcome::from_status(StatusCode::FORBIDDEN);
        }

        let mut repos = self.repos.borrow_mut();
        if let Some(repo) = repos.iter_mut().find(|r| r.full_name == full_name) {
            repo.squash_merge_allowed = Some(true);
            repo.merge_commit_allowed = Some(false);
            repo.rebase_merge_allowed = Some(false);
        }
        MutationOutcome::Applied
    }
}

fn alice_and_bob() -> Vec<RepositoryRecord> {
    vec![
        RepositoryRecord::new("alice", "a", Some(true), Some(false), Some(false)),
        RepositoryRecord::new("alice", "b", Some(false), Some(true), Some(true)),
        RepositoryRecord::new("bob", "c", Some(false), Some(true), Some(true)),
    ]
}

fn config() -> SyncConfig {
    SyncConfig::new().throttle(Duration::ZERO)
}

fn run(fake: &FakeGitHub, config: SyncConfig) -> SyncSummary {
    run_sync(fake, config, CancellationToken::new()).unwrap()
}

#[test]
fn test_normal_run_counts_each_class() {
    let fake = FakeGitHub::new("alice", alice_and_bob());

    let summary = run(&fake, config());

    assert_eq!(
        summary.counters,
        SyncCounters {
            updated: 1,
            already_compliant: 1,
            out_of_scope: 1,
            failed: 0,
        }
    );
    assert_eq!(summary.login, "alice");
    assert_eq!(summary.fetched, 3);
    assert!(!summary.interrupted);
    assert_eq!(fake.patched(), ["alice/b"]);
}

#[test]
fn test_failed_update_is_counted_and_run_continues() {
    let fake = FakeGitHub::new("alice", alice_and_bob()).reject("alice/b");

    let summary = run(&fake, config());

    assert_eq!(summary.counters.updated, 0);
    assert_eq!(summary.counters.failed, 1);
    assert_eq!(summary.counters.already_compliant, 1);
    assert_eq!(summary.counters.out_of_scope, 1);
    assert!(!summary.interrupted);
}

#[test]
fn test_foreign_repositories_are_never_patched() {
    let fake = FakeGitHub::new("alice", alice_and_bob());

    run(&fake, config().force());

    assert!(!fake.patched().iter().any(|name| name.starts_with("bob/")));
}

#[test]
fn test_second_run_is_idempotent() {
    let fake = FakeGitHub::new("alice", alice_and_bob());

    let first = run(&fake, config());
    let second = run(&fake, config());

    assert_eq!(first.counters.updated, 1);
    assert_eq!(second.counters.updated, 0);
    assert_eq!(second.counters.already_compliant, 2);
    assert_eq!(fake.patched(), ["alice/b"]);
}

#[test]
fn test_force_patches_every_owned_repository_once() {
    let fake = FakeGitHub::new("alice", alice_and_bob());

    let summary = run(&fake, config().force());

    assert_eq!(summary.counters.updated, 2);
    assert_eq!(summary.counters.already_compliant, 0);
    assert_eq!(summary.counters.out_of_scope, 1);
    assert_eq!(fake.patched(), ["alice/a", "alice/b"]);
}

#[test]
fn test_absent_flags_are_updated() {
    let fake = FakeGitHub::new(
        "alice",
        vec![RepositoryRecord::new("alice", "unknown", None, None, None)],
    );

    let summary = run(&fake, config());

    assert_eq!(summary.counters.updated, 1);
    assert_eq!(fake.patched(), ["alice/unknown"]);
}

#[test]
fn test_records_span_multiple_pages() {
    let repos: Vec<_> = (0..7)
        .map(|i| RepositoryRecord::new("alice", &format!("r{}", i), None, Some(true), None))
        .collect();
    let fake = FakeGitHub::new("alice", repos).page_size(3);

    let summary = run(&fake, config());

    assert_eq!(fake.page_requests.get(), 3);
    assert_eq!(summary.fetched, 7);
    assert_eq!(summary.counters.updated, 7);
    assert_eq!(summary.counters.total(), summary.fetched);
}

#[test]
fn test_cancel_after_first_repository_stops_before_next() {
    let fake = FakeGitHub::new("alice", alice_and_bob());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let on_progress = move |event: SyncEvent| {
        if let SyncEvent::Skipped { full_name, .. } = event
            && full_name == "alice/a"
        {
            trigger.cancel();
        }
    };

    let summary = SyncRunner::new(&fake, config(), cancel)
        .on_progress(&on_progress)
        .run()
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.counters.already_compliant, 1);
    assert_eq!(summary.counters.updated, 0);
    assert_eq!(summary.counters.failed, 0);
    assert!(fake.patched().is_empty());
    assert_eq!(summary.counters.total() + summary.unreached(), summary.fetched);
    assert_eq!(summary.unreached(), 2);
}

#[test]
fn test_cancel_during_throttle_ends_pause_and_run() {
    let repos = vec![
        RepositoryRecord::new("alice", "x", None, None, None),
        RepositoryRecord::new("alice", "y", None, None, None),
    ];
    let fake = FakeGitHub::new("alice", repos);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let on_progress = move |event: SyncEvent| {
        if let SyncEvent::Mutated { .. } = event {
            let trigger = trigger.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                trigger.cancel();
            });
        }
    };

    let summary = SyncRunner::new(&fake, config().throttle(Duration::from_secs(60)), cancel)
        .on_progress(&on_progress)
        .run()
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.counters.updated, 1);
    assert_eq!(fake.patched(), ["alice/x"]);
    assert!(summary.elapsed < Duration::from_secs(30));
}

#[test]
fn test_cancel_before_start_makes_no_requests() {
    let fake = FakeGitHub::new("alice", alice_and_bob());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_sync(&fake, config(), cancel).unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.counters.total(), 0);
    assert_eq!(fake.requests.get(), 0);
}

#[test]
fn test_stopping_event_reports_unreached_records() {
    let fake = FakeGitHub::new("alice", alice_and_bob());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let on_progress = move |event: SyncEvent| {
        if matches!(event, SyncEvent::FetchedPage { .. }) {
            trigger.cancel();
        }
        sink.lock().unwrap().push(event);
    };

    SyncRunner::new(&fake, config(), cancel)
        .on_progress(&on_progress)
        .run()
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.last(), Some(&SyncEvent::Stopping { unreached: 3 }));
}

#[test]
fn test_fetch_error_aborts_run() {
    let repos: Vec<_> = (0..4)
        .map(|i| RepositoryRecord::new("alice", &format!("r{}", i), None, None, None))
        .collect();
    let mut fake = FakeGitHub::new("alice", repos).page_size(2);
    fake.graphql_error_on_page = Some(2);

    let err = run_sync(&fake, config(), CancellationToken::new()).unwrap_err();

    assert!(matches!(err, SquashError::GraphQl { .. }));
    assert_eq!(fake.page_requests.get(), 2);
}

#[test]
fn test_missing_identity_is_fatal_before_any_fetch() {
    let mut fake = FakeGitHub::new("alice", alice_and_bob());
    fake.login = None;

    let err = run_sync(&fake, config(), CancellationToken::new()).unwrap_err();

    assert!(matches!(err, SquashError::Identity { .. }));
    assert_eq!(fake.page_requests.get(), 0);
    assert!(fake.patched().is_empty());
}

#[test]
fn test_progress_events_in_order() {
    let fake = FakeGitHub::new("alice", alice_and_bob());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let on_progress = move |event: SyncEvent| sink.lock().unwrap().push(event);

    SyncRunner::new(&fake, config(), CancellationToken::new())
        .on_progress(&on_progress)
        .run()
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            SyncEvent::IdentityResolved {
                login: "alice".into()
            },
            SyncEvent::FetchedPage {
                page: 1,
                count: 3,
                total_so_far: 3,
            },
            SyncEvent::Skipped {
                full_name: "alice/a".into(),
                classification: Classification::AlreadyCompliant,
            },
            SyncEvent::Mutated {
                full_name: "alice/b".into(),
                outcome: MutationOutcome::Applied,
            },
            SyncEvent::Skipped {
                full_name: "bob/c".into(),
                classification: Classification::OutOfScope,
            },
        ]
    );
}
