//! Store contracts against `PostgreSQL`.
//!
//! These tests require a database reachable at `BFN_TEST_DATABASE_URL`; the
//! migrations are applied on first use.
//!
//! Run with: cargo test -p blood-for-nepal-integration-tests -- --include-ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::TimeDelta;
use secrecy::SecretString;
use sqlx::PgPool;

use blood_for_nepal_core::{
    BloodRequestId, BloodType, DonationStatus, Email, NewBloodRequest, NewDonationRecord,
    NewDonor, RequestStatus, Urgency, UserId, UserProfile, now_micros,
};
use blood_for_nepal_service::db::{
    self, AccountRepository, DonationRepository, DonorRepository, ProfileRepository,
    RequestRepository,
};
use blood_for_nepal_service::store::{
    AccountStore, DonationStore, DonorStore, ProfileStore, RequestQuery, RequestStore, StoreError,
};

async fn pool() -> PgPool {
    let url = std::env::var("BFN_TEST_DATABASE_URL").expect("BFN_TEST_DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn new_request(requested_by: UserId, city: &str) -> NewBloodRequest {
    NewBloodRequest {
        patient_name: "Hari".to_owned(),
        gender: String::new(),
        case_description: String::new(),
        blood_type: BloodType::OPositive,
        units_needed: 2,
        urgency: Urgency::Medium,
        hospital: "Bir Hospital".to_owned(),
        contact_person: String::new(),
        contact_phone: "9800000000".to_owned(),
        required_by: String::new(),
        description: String::new(),
        requested_by,
        location: String::new(),
        city: city.to_owned(),
        district: String::new(),
        province: String::new(),
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_profile_get_creates_blank_row() {
    let profiles = ProfileRepository::new(pool().await);
    let id = UserId::generate();

    let created = profiles.get(id).await.unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.preferred_language, UserProfile::DEFAULT_LANGUAGE);
    assert!(created.is_active);

    // Reading again returns the same row.
    assert_eq!(profiles.get(id).await.unwrap(), created);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_profile_stale_update_conflicts() {
    let profiles = ProfileRepository::new(pool().await);
    let original = profiles.get(UserId::generate()).await.unwrap();

    let mut first = original.clone();
    first.city = "Pokhara".to_owned();
    let saved = profiles.update(&first).await.unwrap();
    assert!(saved.updated_at > original.updated_at);

    let mut stale = original;
    stale.city = "Dharan".to_owned();
    assert!(matches!(
        profiles.update(&stale).await,
        Err(StoreError::Conflict(_))
    ));
    assert_eq!(profiles.get(saved.id).await.unwrap().city, "Pokhara");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_request_status_and_listing() {
    let requests = RequestRepository::new(pool().await);
    let user = UserId::generate();
    let created = requests
        .create(new_request(user, "Kathmandu"))
        .await
        .unwrap();
    assert_eq!(created.status, RequestStatus::Active);

    let mine = requests.list(&RequestQuery::by_user(user)).await.unwrap();
    assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![created.id]);

    let closed = requests
        .set_status(created.id, RequestStatus::Fulfilled)
        .await
        .unwrap();
    assert_eq!(closed.status, RequestStatus::Fulfilled);
    assert!(closed.updated_at > created.updated_at);
    assert!(
        requests
            .list(&RequestQuery::by_user(user))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_missing_request_is_not_found() {
    let requests = RequestRepository::new(pool().await);
    let mut ghost = requests
        .create(new_request(UserId::generate(), "Butwal"))
        .await
        .unwrap();
    ghost.id = BloodRequestId::generate();

    assert!(matches!(
        requests.update(&ghost).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_donor_set_active_transitions_once() {
    let donors = DonorRepository::new(pool().await);
    let donor = donors
        .create(NewDonor {
            user_id: UserId::generate(),
            name: "Sita".to_owned(),
            blood_type: BloodType::ANegative,
            city: "Pokhara".to_owned(),
            phone_number: "9811111111".to_owned(),
            last_donation_date: String::new(),
        })
        .await
        .unwrap();

    let first = donors.set_active(donor.id, false).await.unwrap();
    assert!(first.changed);
    let second = donors.set_active(donor.id, false).await.unwrap();
    assert!(!second.changed);
    assert_eq!(second.donor.updated_at, first.donor.updated_at);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_donation_stats() {
    let donations = DonationRepository::new(pool().await);
    let donor = UserId::generate();
    for (units, status) in [
        (1, DonationStatus::Completed),
        (2, DonationStatus::Completed),
        (5, DonationStatus::Cancelled),
    ] {
        donations
            .create(NewDonationRecord {
                donor_id: donor,
                recipient_id: UserId::generate(),
                blood_type: BloodType::OPositive,
                units,
                donation_date: "2026-02-01".to_owned(),
                hospital: "Patan Hospital".to_owned(),
                notes: String::new(),
                status,
            })
            .await
            .unwrap();
    }

    let stats = donations.stats(donor).await.unwrap();
    assert_eq!(stats.total_donations, 2);
    assert_eq!(stats.total_units, 3);
    assert_eq!(donations.history(donor).await.unwrap().len(), 3);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_reset_token_single_use() {
    let accounts = AccountRepository::new(pool().await);
    let email = Email::parse(&format!("{}@example.com", UserId::generate())).unwrap();
    let account = accounts.create_account(&email, "hash").await.unwrap();

    let token_hash = format!("{:0>64}", account.user_id.as_uuid().simple());
    accounts
        .insert_reset_token(
            account.user_id,
            &token_hash,
            now_micros() + TimeDelta::minutes(30),
        )
        .await
        .unwrap();

    assert_eq!(
        accounts
            .consume_reset_token(&token_hash, now_micros())
            .await
            .unwrap(),
        Some(account.user_id)
    );
    assert_eq!(
        accounts
            .consume_reset_token(&token_hash, now_micros())
            .await
            .unwrap(),
        None
    );
}
