//! Requests, donors and donations across controllers.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use blood_for_nepal_core::validation::{BloodRequestDraft, DonorDraft, SignUpDraft};
use blood_for_nepal_core::{
    BloodType, DonationStatus, DonorStats, NewDonationRecord, RequestStatus, Urgency, UserId,
};
use blood_for_nepal_integration_tests::TestContext;
use blood_for_nepal_service::ServiceError;
use blood_for_nepal_service::controller::ControllerError;
use blood_for_nepal_service::store::{DonorQuery, RequestQuery};

fn request_draft(blood_type: BloodType, city: &str) -> BloodRequestDraft {
    BloodRequestDraft {
        patient_name: "Hari Bahadur".to_owned(),
        gender: "Male".to_owned(),
        blood_type: Some(blood_type),
        units_needed: 2,
        urgency: Some(Urgency::High),
        hospital: "Bir Hospital".to_owned(),
        contact_person: "Gita".to_owned(),
        contact_phone: "9800000000".to_owned(),
        city: city.to_owned(),
        ..BloodRequestDraft::default()
    }
}

fn donor_draft(blood_type: BloodType, city: &str) -> DonorDraft {
    DonorDraft {
        name: "Sita Rai".to_owned(),
        blood_type: Some(blood_type),
        city: city.to_owned(),
        phone_number: "9811111111".to_owned(),
        last_donation_date: String::new(),
    }
}

#[tokio::test]
async fn test_request_lists_are_filtered() {
    let ctx = TestContext::default();
    let poster = ctx.state.requests();
    let user = UserId::generate();

    let first = poster
        .create(request_draft(BloodType::OPositive, "Kathmandu"), user)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    poster
        .create(request_draft(BloodType::ANegative, "Kathmandu"), user)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let fulfilled = poster
        .create(request_draft(BloodType::OPositive, "Butwal"), user)
        .await
        .unwrap();
    poster
        .set_status(fulfilled.id, RequestStatus::Fulfilled, user)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let last = poster
        .create(request_draft(BloodType::OPositive, "Pokhara"), UserId::generate())
        .await
        .unwrap();

    let browser = ctx.state.requests();
    let listed = browser
        .load(RequestQuery {
            blood_type: Some(BloodType::OPositive),
            ..RequestQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(
        listed.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![last.id, first.id]
    );
    assert!(listed.iter().all(|r| r.blood_type == BloodType::OPositive));
    assert!(listed.iter().all(|r| r.status == RequestStatus::Active));
    assert!(listed.windows(2).all(|w| match w {
        [newer, older] => newer.created_at >= older.created_at,
        _ => true,
    }));

    let mine = browser.load(RequestQuery::by_user(user)).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r.requested_by == user));
}

#[tokio::test]
async fn test_closed_requests_move_between_lists() {
    let ctx = TestContext::default();
    let requests = ctx.state.requests();
    let user = UserId::generate();
    let created = requests
        .create(request_draft(BloodType::BPositive, "Butwal"), user)
        .await
        .unwrap();
    requests.refresh().await.unwrap();

    requests
        .set_status(created.id, RequestStatus::Cancelled, user)
        .await
        .unwrap();
    assert!(requests.snapshot().data.requests.is_empty());

    let cancelled = requests
        .load(RequestQuery {
            status: RequestStatus::Cancelled,
            ..RequestQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    let stored = cancelled.first().unwrap();
    assert_eq!(stored.id, created.id);
    assert!(stored.updated_at > created.updated_at);
    assert_eq!(stored.created_at, created.created_at);
}

#[tokio::test]
async fn test_incomplete_request_never_reaches_store() {
    let ctx = TestContext::default();
    let requests = ctx.state.requests();
    let mut draft = request_draft(BloodType::OPositive, "Kathmandu");
    draft.hospital = "   ".to_owned();
    draft.urgency = None;

    assert!(requests.create(draft, UserId::generate()).await.is_err());
    let error = requests.snapshot().error.unwrap();
    assert!(error.contains("Urgency"));
    assert!(error.contains("Hospital"));
    assert!(requests.refresh().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_donor_availability_shows_in_directory() {
    let ctx = TestContext::default();
    let user = UserId::generate();
    let mine = ctx.state.donors();
    let donor = mine
        .register(donor_draft(BloodType::AbPositive, "Dharan"), user)
        .await
        .unwrap();

    let directory = ctx.state.donors();
    let available = DonorQuery {
        blood_type: Some(BloodType::AbPositive),
        active: Some(true),
        ..DonorQuery::default()
    };
    assert_eq!(directory.load(available.clone()).await.unwrap().len(), 1);

    let change = mine.set_active(donor.id, false, user).await.unwrap();
    assert!(change.changed);
    assert!(directory.load(available).await.unwrap().is_empty());

    let again = mine.set_active(donor.id, false, user).await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.donor.updated_at, change.donor.updated_at);
}

#[tokio::test]
async fn test_one_registration_per_user() {
    let ctx = TestContext::default();
    let user = UserId::generate();
    let donors = ctx.state.donors();
    donors
        .register(donor_draft(BloodType::ONegative, "Kathmandu"), user)
        .await
        .unwrap();

    let err = donors
        .register(donor_draft(BloodType::ONegative, "Lalitpur"), user)
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Service(_)));
    assert_eq!(
        donors.load_mine(user).await.unwrap().map(|d| d.city),
        Some("Kathmandu".to_owned())
    );
}

#[tokio::test]
async fn test_stats_cover_completed_donations_only() {
    let ctx = TestContext::default();
    let donor = UserId::generate();
    let donations = ctx.state.donations();

    for (units, status) in [
        (1, DonationStatus::Completed),
        (2, DonationStatus::Completed),
        (3, DonationStatus::Cancelled),
    ] {
        donations
            .record(NewDonationRecord {
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

    let history = donations.load_history(donor).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(
        donations.load_stats(donor).await.unwrap(),
        DonorStats {
            total_donations: 2,
            total_units: 3,
        }
    );
}

#[tokio::test]
async fn test_search_donor_ids_uses_profiles() {
    let ctx = TestContext::default();
    let session = ctx.state.session();
    let mut profile = session
        .sign_up(SignUpDraft {
            email: "ram@example.com".to_owned(),
            password: "password123".to_owned(),
            confirm_password: "password123".to_owned(),
            first_name: "Ram".to_owned(),
            last_name: "Thapa".to_owned(),
            phone_number: "9800000000".to_owned(),
        })
        .await
        .unwrap();
    profile.blood_type = Some(BloodType::BNegative);
    profile.city = "Biratnagar".to_owned();
    let profile = session.update_profile(profile).await.unwrap();

    let found = ctx
        .state
        .search_donor_ids(BloodType::BNegative, Some("Biratnagar"))
        .await
        .unwrap();
    assert_eq!(found, vec![profile.id]);

    let elsewhere = ctx
        .state
        .search_donor_ids(BloodType::BNegative, Some("Pokhara"))
        .await
        .unwrap();
    assert!(elsewhere.is_empty());
}

#[tokio::test]
async fn test_strangers_cannot_change_others_records() {
    let ctx = TestContext::default();
    let owner = UserId::generate();
    let stranger = UserId::generate();

    let request = ctx
        .state
        .requests()
        .create(request_draft(BloodType::OPositive, "Kathmandu"), owner)
        .await
        .unwrap();
    let donor = ctx
        .state
        .donors()
        .register(donor_draft(BloodType::BPositive, "Kathmandu"), owner)
        .await
        .unwrap();

    // Fresh controllers, as another user's session would have.
    let requests = ctx.state.requests();
    let err = requests
        .set_status(request.id, RequestStatus::Cancelled, stranger)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Service(ServiceError::NotOwner(_))
    ));
    let mut edit = request.clone();
    edit.units_needed = 9;
    assert!(requests.update(edit, stranger).await.is_err());
    assert_eq!(requests.select(request.id).await.unwrap(), request);

    let donors = ctx.state.donors();
    assert!(donors.set_active(donor.id, false, stranger).await.is_err());
    let stored = donors.load_mine(owner).await.unwrap().unwrap();
    assert!(stored.active);
    assert_eq!(stored.updated_at, donor.updated_at);
}
