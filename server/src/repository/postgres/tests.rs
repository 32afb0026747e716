//! Run against a scratch database: `DATABASE_URL=... cargo test -- --ignored`.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::PgStore;
use crate::models::{EventInput, EventStatus, NewRegistration, NewUser, RegistrationStatus};
use crate::repository::{
    EventRepository, RegistrationRepository, UserRepository, EVENT_FULL, REGISTRATION_CANCELLED,
};
use crate::utils::error::AppError;

async fn organizer(store: &PgStore) -> Uuid {
    store
        .create_user(&NewUser {
            email: "organizer@example.com".into(),
            password_hash: "hash".into(),
            first_name: "Olga".into(),
            last_name: "Organizer".into(),
        })
        .await
        .unwrap()
        .id
}

fn event_input(capacity: Option<i32>) -> EventInput {
    EventInput {
        title: "Rust Meetup".into(),
        description: "Talks".into(),
        location: "Berlin".into(),
        starts_at: Utc::now() + Duration::days(7),
        ends_at: None,
        capacity,
        status: EventStatus::Published,
        category: None,
        private: false,
        registration_open_from: None,
        registration_open_until: None,
        rundown: Vec::new(),
    }
}

fn guest(i: usize) -> NewRegistration {
    NewRegistration::parse(&format!("guest{i}@example.com"), None, None).unwrap()
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_register_refuses_when_full(pool: PgPool) {
    let store = PgStore::new(pool);
    let event = store
        .create_event(organizer(&store).await, &event_input(Some(1)))
        .await
        .unwrap();
    store.register(event.id, &guest(1)).await.unwrap();

    let err = store.register(event.id, &guest(2)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == EVENT_FULL));
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_lowering_capacity_deletes_newest(pool: PgPool) {
    let store = PgStore::new(pool);
    let event = store
        .create_event(organizer(&store).await, &event_input(Some(4)))
        .await
        .unwrap();
    let mut created = Vec::new();
    for i in 0..4 {
        created.push(store.register(event.id, &guest(i)).await.unwrap());
    }
    store
        .set_registration_status(created[1].id, RegistrationStatus::Cancelled)
        .await
        .unwrap();

    let update = store
        .update_event(event.id, &event_input(Some(1)))
        .await
        .unwrap();
    let mut evicted = update.evicted.clone();
    evicted.sort();
    let mut expected = vec![created[2].id, created[3].id];
    expected.sort();
    assert_eq!(evicted, expected);

    let remaining: Vec<Uuid> = store
        .registrations_for_event(event.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![created[0].id, created[1].id]);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn test_status_changes_stamp_and_refuse_cancelled(pool: PgPool) {
    let store = PgStore::new(pool);
    let event = store
        .create_event(organizer(&store).await, &event_input(Some(1)))
        .await
        .unwrap();
    let first = store.register(event.id, &guest(1)).await.unwrap();

    let checked_in = store
        .set_registration_status(first.id, RegistrationStatus::CheckedIn)
        .await
        .unwrap();
    assert!(checked_in.check_in_at.is_some());
    let undone = store
        .set_registration_status(first.id, RegistrationStatus::Registered)
        .await
        .unwrap();
    assert!(undone.check_in_at.is_none());

    let cancelled = store
        .set_registration_status(first.id, RegistrationStatus::Cancelled)
        .await
        .unwrap();
    assert!(cancelled.cancelled_at.is_some());
    store.register(event.id, &guest(2)).await.unwrap();

    let err = store
        .set_registration_status(first.id, RegistrationStatus::CheckedIn)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == REGISTRATION_CANCELLED));
    let summary = store.find_event(event.id).await.unwrap().unwrap();
    assert_eq!(summary.active_registrations, 1);

    let err = store
        .set_registration_status(Uuid::new_v4(), RegistrationStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
