use std::sync::Arc;

use serde_json::json;

use super::common::{active_task, build_engine, confirm, submitted_application};
use crate::workflows::grant::process::engine::ProcessError;
use crate::workflows::grant::process::graph;
use crate::workflows::grant::process::queue::{TaskError, TaskQueue};
use crate::workflows::grant::process::schema::SchemaViolation;

#[test]
fn claim_is_first_wins() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("first claim");
    let second = fixture.engine.claim_task(&task.id, "reviewer-2");

    match second {
        Err(ProcessError::Task(TaskError::AlreadyClaimed { assignee, .. })) => {
            assert_eq!(assignee, "reviewer-1");
        }
        other => panic!("expected AlreadyClaimed, got {other:?}"),
    }

    let refreshed = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);
    assert_eq!(refreshed.assigned_reviewer.as_deref(), Some("reviewer-1"));
}

#[test]
fn reclaiming_ones_own_task_is_harmless() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("first claim");
    let again = fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("reclaim");
    assert_eq!(again.assigned_reviewer.as_deref(), Some("reviewer-1"));
}

#[test]
fn concurrent_claims_yield_exactly_one_winner() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    let engine = fixture.engine.clone();
    let task_id = task.id;
    let handles: Vec<_> = (0..2)
        .map(|n| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.claim_task(&task_id, &format!("reviewer-{n}")))
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    let wins = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(wins, 1);

    let refreshed = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);
    let winner = refreshed.assigned_reviewer.expect("task claimed");
    assert!(winner == "reviewer-0" || winner == "reviewer-1");
}

#[test]
fn completion_requires_a_claim() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    let result = fixture.engine.complete_task(&task.id, confirm());
    assert!(matches!(
        result,
        Err(ProcessError::Task(TaskError::Unassigned(_)))
    ));
}

#[test]
fn completing_twice_reports_the_task_closed() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("claim");
    fixture
        .engine
        .complete_task(&task.id, confirm())
        .expect("first completion");

    let second = fixture.engine.complete_task(&task.id, confirm());
    assert!(matches!(
        second,
        Err(ProcessError::Task(TaskError::Closed(_)))
    ));
}

#[test]
fn payloads_are_validated_before_any_state_moves() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("claim");
    let result = fixture
        .engine
        .complete_task(&task.id, json!({ "outcome": "shrug" }));

    assert!(matches!(
        result,
        Err(ProcessError::Task(TaskError::Schema(
            SchemaViolation::UnknownOption { .. }
        )))
    ));
    // The task survives for a corrected attempt.
    let refreshed = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);
    assert!(refreshed.finished_at.is_none());
}

#[test]
fn release_clears_the_assignee() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("claim");
    let released = fixture.engine.release_task(&task.id).expect("release");
    assert_eq!(released.assigned_reviewer, None);

    // Another reviewer can now claim.
    fixture
        .engine
        .claim_task(&task.id, "reviewer-2")
        .expect("reclaim");
}

#[test]
fn reassignment_keeps_the_prior_assignee_in_the_audit_trail() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let task = active_task(&fixture, &process.id, graph::VERIFY_STATE_AID);

    fixture
        .engine
        .claim_task(&task.id, "reviewer-1")
        .expect("claim");
    let reassigned = fixture
        .engine
        .reassign_task(&task.id, "reviewer-2")
        .expect("reassign");
    assert_eq!(reassigned.assigned_reviewer.as_deref(), Some("reviewer-2"));

    let record = fixture.engine.get_record(&process.id).expect("record");
    assert!(record
        .audit
        .iter()
        .any(|line| line.event == "reassigned from reviewer-1 to reviewer-2"));
}

#[test]
fn unknown_tasks_are_reported_as_such() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    fixture.engine.start(&application).expect("start");

    let missing = crate::workflows::grant::process::domain::TaskId::new();
    let result = fixture.engine.claim_task(&missing, "reviewer-1");
    assert!(matches!(
        result,
        Err(ProcessError::Task(TaskError::NotFound(_)))
    ));
}

#[test]
fn the_queue_facade_walks_a_task_end_to_end() {
    let fixture = build_engine();
    let application = submitted_application(&fixture);
    let process = fixture.engine.start(&application).expect("start");
    let queue = TaskQueue::new(fixture.engine.clone());

    let task = queue
        .list_active(&process.id)
        .expect("list")
        .into_iter()
        .find(|task| task.step == graph::VERIFY_PREVIOUS_APPLICATIONS)
        .expect("verification task");

    queue.claim(&task.id, "reviewer-1").expect("claim");
    let process_after = queue.complete(&task.id, confirm()).expect("complete");

    assert_eq!(process_after.total_verified(), 1);
}
