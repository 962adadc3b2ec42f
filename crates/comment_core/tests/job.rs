use std::sync::Once;

use comment_core::{
    ContentId, DoneReason, HarvestJob, RawComment, RawPage, TaskEnd, TaskState, TopLevelFilter,
};
use pretty_assertions::assert_eq;
use serde_json::json;

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

fn page(items: Vec<RawComment>, next_cursor: u64) -> RawPage {
    RawPage { items, next_cursor }
}

#[test]
fn cap_truncates_second_page() {
    init_logging();
    let mut job = HarvestJob::new(ContentId::from("A1"), 5);
    assert_eq!(job.cursor(), 0);
    assert_eq!(job.state(), &TaskState::Fetching);

    let report = job.apply_page(page(vec![raw("1"), raw("2"), raw("3")], 77), &TopLevelFilter);
    assert_eq!(report.page, 1);
    assert_eq!(report.kept, 3);
    assert_eq!(job.state(), &TaskState::Delaying);
    assert_eq!(job.cursor(), 77);

    job.resume_fetching();
    let report = job.apply_page(
        page(vec![raw("4"), reply("r"), raw("5"), raw("6")], 0),
        &TopLevelFilter,
    );
    assert_eq!(report.page, 2);
    assert_eq!(report.kept, 2);
    assert_eq!(report.accumulated, 5);
    assert!(job.is_finished());

    let outcome = job.finish();
    let ids: Vec<_> = outcome.comments.iter().map(|c| c.comment_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    assert!(matches!(outcome.end, TaskEnd::Done(_)));
    assert_eq!(outcome.pages, 2);
}

#[test]
fn cap_reached_mid_listing_ends_done_and_drops_cursor() {
    let mut job = HarvestJob::new(ContentId::from("B"), 2);
    job.apply_page(page(vec![raw("1"), raw("2"), raw("3")], 99), &TopLevelFilter);
    assert_eq!(job.state(), &TaskState::Done(DoneReason::CapReached));
    assert_eq!(job.cursor(), 0);
    assert_eq!(job.accumulated(), 2);
}

#[test]
fn empty_first_page_is_done_without_error() {
    let mut job = HarvestJob::new(ContentId::from("C"), 10);
    let report = job.apply_page(RawPage::empty(), &TopLevelFilter);
    assert_eq!(report.kept, 0);

    let outcome = job.finish();
    assert!(outcome.comments.is_empty());
    assert_eq!(outcome.end, TaskEnd::Done(DoneReason::EmptyPage));
}

#[test]
fn page_of_only_replies_counts_as_empty() {
    let mut job = HarvestJob::new(ContentId::from("D"), 10);
    job.apply_page(page(vec![reply("1"), reply("2")], 55), &TopLevelFilter);
    assert_eq!(job.state(), &TaskState::Done(DoneReason::EmptyPage));
}

#[test]
fn zero_cursor_means_exhausted() {
    let mut job = HarvestJob::new(ContentId::from("E"), 10);
    job.apply_page(page(vec![raw("1")], 0), &TopLevelFilter);
    assert_eq!(job.state(), &TaskState::Done(DoneReason::Exhausted));
}

#[test]
fn zero_cap_never_fetches() {
    let job = HarvestJob::new(ContentId::from("F"), 0);
    assert!(job.is_finished());
    assert_eq!(job.finish().end, TaskEnd::Done(DoneReason::CapReached));
}

#[test]
fn cancel_keeps_partial_results() {
    let mut job = HarvestJob::new(ContentId::from("G"), 10);
    job.apply_page(page(vec![raw("1"), raw("2")], 3), &TopLevelFilter);
    job.cancel();
    assert_eq!(job.state(), &TaskState::Cancelled);

    // Terminal states are sticky.
    job.fail("late error");
    job.resume_fetching();
    assert_eq!(job.state(), &TaskState::Cancelled);

    let outcome = job.finish();
    assert_eq!(outcome.end, TaskEnd::Cancelled);
    assert_eq!(outcome.comments.len(), 2);
}

#[test]
fn fetch_failure_ends_job_with_reason() {
    let mut job = HarvestJob::new(ContentId::from("H"), 10);
    job.fail("http status 502");
    assert_eq!(
        job.finish().end,
        TaskEnd::Done(DoneReason::FetchFailed("http status 502".into()))
    );
}

#[test]
fn pages_are_ignored_outside_fetching() {
    let mut job = HarvestJob::new(ContentId::from("I"), 10);
    job.apply_page(page(vec![raw("1")], 8), &TopLevelFilter);
    assert_eq!(job.state(), &TaskState::Delaying);

    let report = job.apply_page(page(vec![raw("2")], 9), &TopLevelFilter);
    assert_eq!(report.kept, 0);
    assert_eq!(job.accumulated(), 1);
    assert_eq!(job.cursor(), 8);
}
