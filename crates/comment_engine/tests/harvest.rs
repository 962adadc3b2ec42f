use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use comment_core::{ContentId, ControlCommand, DoneReason, RawComment, RawPage, TaskEnd};
use comment_engine::{
    FailureKind, FetchError, HarvestEvent, HarvestSettings, Harvester, MemoryCommentStore,
    PageFetcher, ProgressSink, RateSettings, DELAY_STEP,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::Instant;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn raw(id: &str) -> RawComment {
    RawComment {
        idstr: Some(id.to_string()),
        text: Some(format!("<p>comment {id}</p>")),
        ..RawComment::default()
    }
}

fn reply(id: &str) -> RawComment {
    RawComment {
        reply_comment: Some(json!({"idstr": "parent"})),
        ..raw(id)
    }
}

/// Serves canned pages keyed by (content id, cursor); unknown keys get an
/// empty page. In endless mode every request yields two fresh comments.
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<(String, u64), Result<RawPage, FetchError>>,
    endless: bool,
    latency: Duration,
    calls: Mutex<Vec<(String, u64, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    fn page(mut self, id: &str, cursor: u64, items: Vec<RawComment>, next_cursor: u64) -> Self {
        self.pages
            .insert((id.to_string(), cursor), Ok(RawPage { items, next_cursor }));
        self
    }

    fn failure(mut self, id: &str, cursor: u64) -> Self {
        self.pages.insert(
            (id.to_string(), cursor),
            Err(FetchError {
                kind: FailureKind::HttpStatus(502),
                message: "bad gateway".to_string(),
            }),
        );
        self
    }

    fn calls(&self) -> Vec<(String, u64, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, content_id: &ContentId, cursor: u64) -> Result<RawPage, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((content_id.to_string(), cursor, Instant::now()));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.endless {
            let items = (0..2)
                .map(|n| raw(&format!("{content_id}-{cursor}-{n}")))
                .collect();
            return Ok(RawPage {
                items,
                next_cursor: cursor + 1,
            });
        }
        self.pages
            .get(&(content_id.to_string(), cursor))
            .cloned()
            .unwrap_or_else(|| Ok(RawPage::empty()))
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<HarvestEvent>>,
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn fast_settings(workers: usize, cap: usize) -> HarvestSettings {
    HarvestSettings {
        rate: RateSettings {
            requests_per_minute: 600,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(200),
        },
        workers,
        cap,
    }
}

fn ids(names: &[&str]) -> Vec<ContentId> {
    names.iter().map(|name| ContentId::from(*name)).collect()
}

#[tokio::test(start_paused = true)]
async fn cap_bounds_comments_across_pages() {
    init_logging();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("A1", 0, vec![raw("1"), raw("2"), raw("3")], 77)
            .page("A1", 77, vec![raw("4"), reply("r"), raw("5"), raw("6")], 0),
    );
    let progress = Arc::new(RecordingProgress::default());
    let harvester =
        Harvester::new(fetcher.clone(), fast_settings(3, 5)).with_progress(progress.clone());
    let store = MemoryCommentStore::new();

    let summary = harvester.run(&ids(&["A1"]), store.clone()).await.unwrap();

    let stored: Vec<_> = store.records().into_iter().map(|c| c.comment_id).collect();
    assert_eq!(stored, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(summary.comments_written, 5);
    assert_eq!(summary.completed, 1);
    assert_eq!(fetcher.calls().len(), 2);

    let events = progress.events.lock().unwrap().clone();
    assert!(matches!(events.first(), Some(HarvestEvent::TaskStarted { cap: 5, .. })));
    assert!(events.contains(&HarvestEvent::TaskFinished {
        content_id: ContentId::from("A1"),
        collected: 5,
        end: TaskEnd::Done(DoneReason::Exhausted),
    }));
    assert!(events.contains(&HarvestEvent::BatchWritten {
        content_id: ContentId::from("A1"),
        written: 5,
        duplicates: 0,
    }));
}

#[tokio::test(start_paused = true)]
async fn empty_first_page_finishes_without_error() {
    let fetcher = Arc::new(ScriptedFetcher::default().page("Z", 0, Vec::new(), 0));
    let harvester = Harvester::new(fetcher, fast_settings(2, 10));
    let store = MemoryCommentStore::new();

    let summary = harvester.run(&ids(&["Z"]), store.clone()).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.comments_written, 0);
    assert!(store.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_page_ends_only_its_own_content_id() {
    init_logging();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("ok-1", 0, vec![raw("a"), raw("b")], 0)
            .page("broken", 0, vec![raw("x")], 5)
            .failure("broken", 5)
            .page("ok-2", 0, vec![raw("c")], 0),
    );
    let harvester = Harvester::new(fetcher, fast_settings(2, 10));
    let store = MemoryCommentStore::new();

    let summary = harvester
        .run(&ids(&["ok-1", "broken", "ok-2"]), store.clone())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 2);
    // Comments gathered before the failure are still kept.
    let mut stored: Vec<_> = store.records().into_iter().map(|c| c.comment_id).collect();
    stored.sort();
    assert_eq!(stored, vec!["a", "b", "c", "x"]);
}

#[tokio::test(start_paused = true)]
async fn never_more_than_the_configured_workers() {
    let mut fetcher = ScriptedFetcher {
        latency: Duration::from_secs(1),
        ..ScriptedFetcher::default()
    };
    let names: Vec<String> = (0..10).map(|n| format!("c{n}")).collect();
    for name in &names {
        fetcher = fetcher.page(name, 0, vec![raw(&format!("{name}-1"))], 0);
    }
    let fetcher = Arc::new(fetcher);
    let harvester = Harvester::new(fetcher.clone(), fast_settings(3, 10));
    let content_ids: Vec<ContentId> = names.iter().map(|n| ContentId::from(n.as_str())).collect();

    let summary = harvester
        .run(&content_ids, MemoryCommentStore::new())
        .await
        .unwrap();

    assert_eq!(summary.completed, 10);
    assert_eq!(summary.comments_written, 10);
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(start_paused = true)]
async fn requests_across_workers_respect_the_rate() {
    let fetcher = Arc::new(ScriptedFetcher {
        endless: true,
        ..ScriptedFetcher::default()
    });
    let settings = HarvestSettings {
        rate: RateSettings {
            requests_per_minute: 12,
            min_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(6),
        },
        workers: 4,
        cap: 6,
    };
    let harvester = Harvester::new(fetcher.clone(), settings);

    let summary = harvester
        .run(&ids(&["a", "b", "c", "d", "e"]), MemoryCommentStore::new())
        .await
        .unwrap();
    assert_eq!(summary.comments_written, 30);

    let mut issued: Vec<_> = fetcher.calls().into_iter().map(|(_, _, at)| at).collect();
    issued.sort();
    assert_eq!(issued.len(), 15);
    for pair in issued.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(5));
    }
}

#[tokio::test(start_paused = true)]
async fn rerun_against_populated_store_writes_nothing_new() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("A", 0, vec![raw("1"), raw("2")], 3)
            .page("A", 3, vec![raw("3")], 0)
            .page("B", 0, vec![raw("4")], 0),
    );
    let store = MemoryCommentStore::new();

    let first = Harvester::new(fetcher.clone(), fast_settings(2, 10))
        .run(&ids(&["A", "B"]), store.clone())
        .await
        .unwrap();
    assert_eq!(first.comments_written, 4);

    let second = Harvester::new(fetcher, fast_settings(2, 10))
        .run(&ids(&["A", "B"]), store.clone())
        .await
        .unwrap();
    assert_eq!(second.comments_written, 0);
    assert_eq!(second.duplicates_skipped, 4);
    assert_eq!(store.records().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_run_keeps_partial_results() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher {
        endless: true,
        ..ScriptedFetcher::default()
    });
    let settings = HarvestSettings {
        rate: RateSettings {
            requests_per_minute: 60,
            min_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(6),
        },
        workers: 2,
        cap: 1_000,
    };
    let harvester = Harvester::new(fetcher.clone(), settings);
    let controls = harvester.controls();
    let store = MemoryCommentStore::new();
    let content_ids = ids(&["a", "b", "c", "d", "e", "f"]);

    let (summary, stopped_at) = tokio::join!(harvester.run(&content_ids, store.clone()), async {
        tokio::time::sleep(Duration::from_secs(20)).await;
        controls.apply(ControlCommand::Stop);
        Instant::now()
    });
    let summary = summary.unwrap();

    assert!(Instant::now() - stopped_at <= DELAY_STEP);
    assert!(summary.stopped);
    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.not_started, 4);
    assert!(summary.comments_harvested > 0);
    assert_eq!(store.records().len(), summary.comments_harvested);
    assert_eq!(summary.comments_written, summary.comments_harvested);
    assert!(fetcher.calls().iter().all(|(id, _, _)| id == "a" || id == "b"));
}

#[tokio::test(start_paused = true)]
async fn paused_run_issues_no_requests_until_resumed() {
    let fetcher = Arc::new(ScriptedFetcher::default().page("P", 0, vec![raw("1")], 0));
    let harvester = Harvester::new(fetcher.clone(), fast_settings(1, 10));
    let controls = harvester.controls();
    controls.apply(ControlCommand::Pause);
    let store = MemoryCommentStore::new();
    let targets = ids(&["P"]);

    let (summary, ()) = tokio::join!(harvester.run(&targets, store.clone()), async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(fetcher.calls().is_empty());
        controls.apply(ControlCommand::Resume);
    });

    assert_eq!(summary.unwrap().comments_written, 1);
    assert_eq!(fetcher.calls().len(), 1);
}

#[test]
fn runtime_commands_retune_the_run() {
    let harvester = Harvester::new(Arc::new(ScriptedFetcher::default()), fast_settings(3, 10));
    let controls = harvester.controls();

    controls.apply(ControlCommand::Rate(0));
    controls.apply(ControlCommand::Delay {
        min_secs: 8.0,
        max_secs: 2.0,
    });
    controls.apply(ControlCommand::Workers(0));
    controls.apply(ControlCommand::Cap(25));

    let rate = controls.limiter.settings();
    assert_eq!(rate.requests_per_minute, 1);
    assert_eq!(rate.min_delay, Duration::from_secs(8));
    assert_eq!(rate.max_delay, Duration::from_secs(8));
    assert_eq!(controls.tunables.workers(), 1);
    assert_eq!(controls.tunables.cap(), 25);
    assert!(controls.status().starts_with("running"));

    controls.apply(ControlCommand::Pause);
    assert!(controls.status().starts_with("paused"));
}
