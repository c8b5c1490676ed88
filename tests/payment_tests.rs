mod common;

use async_trait::async_trait;
use common::FaultyStore;
use hostel::application::payment::{PaymentOutcome, PaymentWorkflow, PollPolicy, Resolution};
use hostel::application::residence::Residence;
use hostel::domain::StudentId;
use hostel::domain::payment::{
    Amount, BillingMonth, PaymentRequest, PaymentStatus, ReceiptCode,
};
use hostel::domain::ports::{
    Clock, HostelStoreRef, PaymentGateway, PollStatus, StkPush, StkPushAck,
};
use hostel::domain::session::Session;
use hostel::error::{ErrorKind, HostelError, Result};
use hostel::infrastructure::clock::{ManualClock, SystemClock};
use hostel::infrastructure::in_memory::InMemoryStore;
use hostel::infrastructure::scripted_gateway::ScriptedGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: InMemoryStore,
    gateway: ScriptedGateway,
    clock: ManualClock,
    workflow: PaymentWorkflow,
}

fn harness(gateway: ScriptedGateway) -> Harness {
    harness_with(InMemoryStore::new(), gateway, PollPolicy::default())
}

fn harness_with(store: InMemoryStore, gateway: ScriptedGateway, policy: PollPolicy) -> Harness {
    let faulty = FaultyStore::new(store.clone());
    harness_over(faulty.shared(), store, gateway, policy)
}

fn harness_over(
    shared: HostelStoreRef,
    store: InMemoryStore,
    gateway: ScriptedGateway,
    policy: PollPolicy,
) -> Harness {
    let clock = common::clock();
    let workflow = PaymentWorkflow::new(
        shared,
        Arc::new(gateway.clone()),
        Arc::new(clock.clone()),
        policy,
    );
    Harness {
        store,
        gateway,
        clock,
        workflow,
    }
}

fn rent(phone: &str) -> PaymentRequest {
    PaymentRequest::new(Amount::new(dec!(1000)).unwrap(), phone, "Room Rent")
}

async fn pay(h: &Harness, student: StudentId) -> Result<PaymentOutcome> {
    h.workflow.pay(&Session::student(student), rent("0712345678")).await
}

#[tokio::test]
async fn test_confirmed_payment_completes_with_receipt() {
    let h = harness(
        ScriptedGateway::accepting("ws_1")
            .then_poll(PollStatus::in_progress())
            .then_poll(PollStatus::confirmed("QAB123")),
    );
    let student = StudentId::new();

    let outcome = pay(&h, student).await.unwrap();

    assert_eq!(
        outcome.resolution,
        Resolution::Confirmed(ReceiptCode::new("QAB123").unwrap())
    );
    assert_eq!(outcome.payment.status, PaymentStatus::Completed);
    assert_eq!(outcome.payment.transaction_code.as_deref(), Some("QAB123"));
    assert_eq!(outcome.payment.checkout_request_id, "ws_1");
    assert_eq!(outcome.payment.month, BillingMonth::new(2026, 3).unwrap());
    assert_eq!(outcome.payment.payment_method, "mpesa");

    let pushes = h.gateway.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].phone.as_str(), "254712345678");
    assert_eq!(pushes[0].amount.value(), dec!(1000));
    assert_eq!(pushes[0].description, "Payment for: Room Rent");
    let prefix: String = student.to_string().chars().take(4).collect();
    assert_eq!(
        pushes[0].account_reference,
        format!("PAY-{}-202603-ROOM RENT", prefix.to_uppercase())
    );
    assert_eq!(outcome.payment.reference_number, pushes[0].account_reference);

    assert_eq!(h.gateway.poll_count(), 2);
    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(5)]);
    assert!(outcome.resolution.failure().is_none());
}

#[tokio::test]
async fn test_unanswered_checkout_fails_exactly_at_timeout() {
    let h = harness(ScriptedGateway::accepting("ws_1"));

    let outcome = pay(&h, StudentId::new()).await.unwrap();

    assert_eq!(outcome.resolution, Resolution::TimedOut(Duration::from_secs(120)));
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_eq!(outcome.payment.transaction_code, None);
    assert_eq!(h.clock.now(), common::start_time() + chrono::Duration::seconds(120));
    // Polls at 0, 5, ..., 120 seconds.
    assert_eq!(h.gateway.poll_count(), 25);
    assert!(matches!(outcome.resolution.failure(), Some(HostelError::Timeout(_))));
}

#[tokio::test]
async fn test_last_sleep_is_clipped_to_the_deadline() {
    let policy = PollPolicy {
        interval: Duration::from_secs(7),
        timeout: Duration::from_secs(30),
    };
    let h = harness_with(InMemoryStore::new(), ScriptedGateway::accepting("ws_1"), policy);

    let outcome = pay(&h, StudentId::new()).await.unwrap();

    assert_eq!(outcome.resolution, Resolution::TimedOut(Duration::from_secs(30)));
    assert_eq!(
        h.clock.sleeps(),
        [7, 7, 7, 7, 2].map(Duration::from_secs).to_vec()
    );
    assert_eq!(h.gateway.poll_count(), 6);
}

#[tokio::test]
async fn test_success_without_receipt_never_completes() {
    let h = harness(
        ScriptedGateway::accepting("ws_1")
            .then_poll(PollStatus {
                terminal: true,
                success: true,
                receipt_code: None,
                description: None,
            })
            .then_poll(PollStatus::confirmed("   ")),
    );

    let outcome = pay(&h, StudentId::new()).await.unwrap();

    assert!(matches!(outcome.resolution, Resolution::TimedOut(_)));
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_eq!(outcome.payment.transaction_code, None);
}

#[tokio::test]
async fn test_declined_checkout_fails() {
    let h = harness(
        ScriptedGateway::accepting("ws_1")
            .then_poll(PollStatus::declined("Request cancelled by user")),
    );

    let outcome = pay(&h, StudentId::new()).await.unwrap();

    assert_eq!(
        outcome.resolution,
        Resolution::Declined("Request cancelled by user".to_string())
    );
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_eq!(
        outcome.resolution.failure().unwrap().kind(),
        ErrorKind::Gateway
    );
    assert_eq!(h.gateway.poll_count(), 1);
}

#[tokio::test]
async fn test_poll_errors_are_retried() {
    let h = harness(
        ScriptedGateway::accepting("ws_1")
            .then_poll_error("connection reset")
            .then_poll_error("503 Service Unavailable")
            .then_poll(PollStatus::confirmed("QAB124")),
    );

    let outcome = pay(&h, StudentId::new()).await.unwrap();

    assert_eq!(outcome.payment.status, PaymentStatus::Completed);
    assert_eq!(h.gateway.poll_count(), 3);
}

#[tokio::test]
async fn test_rejected_initiation_records_nothing() {
    let h = harness(ScriptedGateway::with_ack(StkPushAck {
        response_code: "1".to_string(),
        checkout_request_id: String::new(),
        response_description: "Invalid Access Token".to_string(),
    }));

    let err = pay(&h, StudentId::new()).await.unwrap_err();

    assert!(matches!(err, HostelError::GatewayError(ref msg) if msg.contains("Invalid Access Token")));
    assert!(h.store.payments().await.is_empty());
    assert_eq!(h.gateway.poll_count(), 0);
}

#[tokio::test]
async fn test_invalid_phone_never_reaches_the_gateway() {
    let h = harness(ScriptedGateway::accepting("ws_1"));

    let err = h
        .workflow
        .pay(&Session::student(StudentId::new()), rent("12345"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.gateway.pushes().is_empty());
}

#[tokio::test]
async fn test_second_payment_for_a_paid_month_is_a_conflict() {
    let h = harness(ScriptedGateway::accepting("ws_1").otherwise(PollStatus::confirmed("QAB123")));
    let student = StudentId::new();

    pay(&h, student).await.unwrap();
    let err = pay(&h, student).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.gateway.pushes().len(), 1);

    // Another month is still payable.
    let april = rent("0712345678").for_month(BillingMonth::new(2026, 4).unwrap());
    let outcome = h.workflow.pay(&Session::student(student), april).await.unwrap();
    assert_eq!(outcome.payment.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_failed_payment_does_not_block_retry() {
    let h = harness(
        ScriptedGateway::accepting("ws_1")
            .then_poll(PollStatus::declined("Insufficient funds"))
            .then_poll(PollStatus::confirmed("QAB125")),
    );
    let student = StudentId::new();

    let first = pay(&h, student).await.unwrap();
    let second = pay(&h, student).await.unwrap();

    assert_eq!(first.payment.status, PaymentStatus::Failed);
    assert_eq!(second.payment.status, PaymentStatus::Completed);

    let history = Residence::new(Arc::new(h.store.clone()))
        .payment_history(&Session::student(student))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|p| p.id == first.payment.id));
    assert!(history.iter().any(|p| p.id == second.payment.id));
}

#[tokio::test]
async fn test_payment_record_failure_is_a_write_error() {
    let store = InMemoryStore::new();
    let faulty = FaultyStore::new(store.clone()).failing_payment_insert();
    let h = harness_over(
        faulty.shared(),
        store,
        ScriptedGateway::accepting("ws_1"),
        PollPolicy::default(),
    );

    let err = pay(&h, StudentId::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Write);
    assert!(h.store.payments().await.is_empty());
    assert_eq!(h.gateway.poll_count(), 0);
}

/// Accepts every push, then never answers a status query.
struct StalledGateway;

#[async_trait]
impl PaymentGateway for StalledGateway {
    async fn initiate(&self, _push: &StkPush) -> Result<StkPushAck> {
        Ok(StkPushAck {
            response_code: StkPushAck::ACCEPTED.to_string(),
            checkout_request_id: "ws_stalled".to_string(),
            response_description: "Success. Request accepted for processing".to_string(),
        })
    }

    async fn poll_status(&self, _checkout_request_id: &str) -> Result<PollStatus> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_stalled_poll_is_cut_off_at_the_deadline() {
    let store = InMemoryStore::new();
    let clock = common::clock();
    let workflow = PaymentWorkflow::new(
        Arc::new(store.clone()),
        Arc::new(StalledGateway),
        Arc::new(clock.clone()),
        PollPolicy::default(),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        workflow.pay(&Session::student(StudentId::new()), rent("0712345678")),
    )
    .await
    .expect("pay must not hang on a stalled gateway")
    .unwrap();

    assert_eq!(outcome.resolution, Resolution::TimedOut(Duration::from_secs(120)));
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(120)]);
}

#[tokio::test]
async fn test_stalled_poll_fails_the_payment_in_real_time() {
    let store = InMemoryStore::new();
    let workflow = PaymentWorkflow::new(
        Arc::new(store.clone()),
        Arc::new(StalledGateway),
        Arc::new(SystemClock),
        PollPolicy {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
        },
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        workflow.pay(&Session::student(StudentId::new()), rent("0712345678")),
    )
    .await
    .expect("pay must resolve shortly after its poll timeout")
    .unwrap();

    assert!(matches!(outcome.resolution, Resolution::TimedOut(waited) if waited >= Duration::from_secs(1)));
    let statuses: Vec<PaymentStatus> = store.payments().await.iter().map(|p| p.status).collect();
    assert_eq!(statuses, vec![PaymentStatus::Failed]);
}
