//! Approval → feedback → guidance, end to end.

use std::sync::Arc;

use chrono::Duration;
use serde_json::{Value as JsonValue, json};

use copilot_core::{ManualClock, SuggestedAction};
use copilot_infra::workflow::DEFAULT_REJECTION_REASON;
use copilot_infra::{ApprovalWorkflow, CopilotServices, WorkflowError, build_in_memory_services};
use copilot_learning::{
    FeedbackLedger, InMemoryLedgerPersistence, LearningConfig, SuggestionApproach, UserAction,
};
use copilot_proposals::{
    InMemoryProposalStore, ProposalConfig, ProposalError, ProposalStatus, ProposalStore,
};

fn sales_order_action() -> JsonValue {
    json!({"type": "open_screen", "payload": {"screen": "SalesOrder"}})
}

fn services() -> (CopilotServices, Arc<ManualClock>) {
    let clock = ManualClock::starting_now();
    let services = build_in_memory_services(ProposalConfig::default(), LearningConfig::default(), clock.clone());
    (services, clock)
}

fn propose(services: &CopilotServices, text: &str) -> copilot_core::ProposalId {
    services.proposals.propose(
        "session-1",
        sales_order_action(),
        Some(SuggestedAction::new("PUT", "/SalesOrder")),
        text,
    )
}

#[test]
fn outcomes_flow_into_guidance() {
    let (services, _) = services();

    for _ in 0..3 {
        let id = propose(&services, "Add related items?");
        services
            .workflow
            .reject(id, Some("wrong vendor".to_string()))
            .unwrap();
    }

    let id = propose(&services, "Copy last order?");
    let confirmed = services.workflow.confirm(id).unwrap();
    assert_eq!(confirmed.status(), ProposalStatus::Confirmed);
    let executed = services
        .workflow
        .complete_execution(id, json!({"order": "SO-1001"}))
        .unwrap();
    assert_eq!(executed.status(), ProposalStatus::Executed);

    let entries = services.ledger.entries();
    assert_eq!(entries.len(), 4);
    let accepted = &entries[3];
    assert_eq!(accepted.user_action, UserAction::Accepted);
    assert_eq!(accepted.execution_result, Some(json!({"order": "SO-1001"})));
    assert_eq!(
        accepted.suggestion_context.suggested_action,
        Some(SuggestedAction::new("PUT", "/SalesOrder"))
    );

    let guidance = services.guidance.guidance(&sales_order_action(), &JsonValue::Null);
    assert!(!guidance.should_suggest);
    assert_eq!(guidance.suggested_approach, SuggestionApproach::Cautious);
    assert_eq!(guidance.historical_success_rate, 0.25);
    assert_eq!(guidance.avoid_patterns, vec!["wrong vendor"]);
    assert_eq!(guidance.preferred_patterns, vec!["Copy last order?"]);
    assert_eq!(guidance.similar_contexts.len(), 4);
}

#[test]
fn reject_without_reason_uses_default() {
    let (services, _) = services();
    let id = propose(&services, "x");

    let rejected = services.workflow.reject(id, None).unwrap();

    assert_eq!(rejected.rejection_reason(), Some(DEFAULT_REJECTION_REASON));
    assert_eq!(
        services.ledger.entries()[0].feedback_reason.as_deref(),
        Some(DEFAULT_REJECTION_REASON)
    );
}

#[test]
fn failed_transition_records_no_feedback() {
    let (services, clock) = services();

    let id = propose(&services, "x");
    services.workflow.reject(id, None).unwrap();
    let err = services.workflow.reject(id, None).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Proposal(ProposalError::AlreadyProcessed { status: ProposalStatus::Rejected, .. })
    ));

    let stale = propose(&services, "y");
    clock.advance(Duration::minutes(31));
    let err = services.workflow.confirm(stale).unwrap_err();
    assert!(matches!(err, WorkflowError::Proposal(ProposalError::Expired(got)) if got == stale));
    assert_eq!(services.proposals.get(stale).unwrap().status(), ProposalStatus::Expired);

    assert_eq!(services.ledger.len(), 1);
}

#[test]
fn feedback_failure_keeps_the_transition() {
    let clock = ManualClock::starting_now();
    let persistence = Arc::new(InMemoryLedgerPersistence::new());
    let ledger = Arc::new(FeedbackLedger::open(
        persistence.clone(),
        clock.clone(),
        LearningConfig::default(),
    ));
    let proposals = InMemoryProposalStore::arc(ProposalConfig::default(), clock);
    let workflow = ApprovalWorkflow::new(proposals.clone(), ledger.clone());

    let id = proposals.propose("s", sales_order_action(), None, "x");
    persistence.set_failing(true);

    let err = workflow.reject(id, Some("nope".to_string())).unwrap_err();

    let WorkflowError::Feedback { proposal_id, source } = err else {
        panic!("expected feedback error");
    };
    assert_eq!(proposal_id, id);
    assert!(source.applied_in_memory());
    assert_eq!(proposals.get(id).unwrap().status(), ProposalStatus::Rejected);
    assert_eq!(ledger.len(), 1);
}

#[test]
fn racing_confirms_have_one_winner() {
    let (services, _) = services();
    let id = propose(&services, "x");

    let results: Vec<Result<_, WorkflowError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let workflow = &services.workflow;
                scope.spawn(move || workflow.confirm(id))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(WorkflowError::Proposal(ProposalError::AlreadyProcessed {
                status: ProposalStatus::Confirmed,
                ..
            }))
        ));
    }
}

#[test]
fn execution_without_confirmation_is_still_learned() {
    let (services, _) = services();
    let id = propose(&services, "x");
    services.workflow.reject(id, None).unwrap();

    let executed = services.workflow.complete_execution(id, json!({"ok": true})).unwrap();

    assert_eq!(executed.status(), ProposalStatus::Executed);
    let actions: Vec<_> = services.ledger.entries().iter().map(|e| e.user_action).collect();
    assert_eq!(actions, vec![UserAction::Rejected, UserAction::Accepted]);
}
