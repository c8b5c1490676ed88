mod common;

use chrono::Duration;
use hostel::application::laundry::LaundryService;
use hostel::domain::laundry::{LaundryOrder, LaundryStatus};
use hostel::domain::session::Session;
use hostel::domain::{LaundryRequestId, StudentId};
use hostel::error::{ErrorKind, HostelError};
use hostel::infrastructure::in_memory::InMemoryStore;
use std::sync::Arc;

fn service(store: &InMemoryStore) -> LaundryService {
    LaundryService::new(Arc::new(store.clone()), Arc::new(common::clock()))
}

fn order(clothes: u32, hours_from_now: i64) -> LaundryOrder {
    LaundryOrder {
        number_of_clothes: clothes,
        special_instructions: "no bleach".to_string(),
        pickup_time: common::start_time() + Duration::hours(hours_from_now),
    }
}

#[tokio::test]
async fn test_submit_uses_the_allocated_room() {
    let store = InMemoryStore::new();
    let student = StudentId::new();
    common::allocate(&store, student, "R210").await;
    let laundry = service(&store);

    let request = laundry
        .submit(&Session::student(student), order(8, 2))
        .await
        .unwrap();

    assert_eq!(request.room_number, "R210");
    assert_eq!(request.status, LaundryStatus::Pending);
    assert_eq!(request.number_of_clothes, 8);
    let mine = laundry.mine(&Session::student(student)).await.unwrap();
    assert_eq!(mine, vec![request]);
}

#[tokio::test]
async fn test_submit_validation() {
    let store = InMemoryStore::new();
    let student = StudentId::new();
    let laundry = service(&store);
    let session = Session::student(student);

    // No room yet.
    let err = laundry.submit(&session, order(8, 2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    common::allocate(&store, student, "R210").await;
    let err = laundry.submit(&session, order(0, 2)).await.unwrap_err();
    assert!(matches!(err, HostelError::ValidationError(ref msg) if msg.contains("greater than 0")));
    let err = laundry.submit(&session, order(5, -1)).await.unwrap_err();
    assert!(matches!(err, HostelError::ValidationError(ref msg) if msg.contains("past")));
}

#[tokio::test]
async fn test_admin_advances_through_every_status() {
    let store = InMemoryStore::new();
    let student = StudentId::new();
    common::allocate(&store, student, "R210").await;
    let laundry = service(&store);
    let admin = Session::admin(StudentId::new());
    let request = laundry
        .submit(&Session::student(student), order(3, 1))
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(laundry.advance(&admin, request.id).await.unwrap().status);
    }
    assert_eq!(
        seen,
        vec![
            LaundryStatus::Processing,
            LaundryStatus::Ready,
            LaundryStatus::Collected
        ]
    );

    let err = laundry.advance(&admin, request.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = laundry.advance(&admin, LaundryRequestId::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_students_only_see_their_own_requests() {
    let store = InMemoryStore::new();
    let (alice, bob) = (StudentId::new(), StudentId::new());
    common::allocate(&store, alice, "R101").await;
    common::allocate(&store, bob, "R102").await;
    let laundry = service(&store);

    laundry.submit(&Session::student(alice), order(2, 1)).await.unwrap();
    laundry.submit(&Session::student(bob), order(4, 1)).await.unwrap();

    let alice_view = laundry.mine(&Session::student(alice)).await.unwrap();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view[0].room_number, "R101");

    let err = laundry.all(&Session::student(alice)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = laundry
        .advance(&Session::student(alice), alice_view[0].id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let everything = laundry.all(&Session::admin(StudentId::new())).await.unwrap();
    assert_eq!(everything.len(), 2);
}
