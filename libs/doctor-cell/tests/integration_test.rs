use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveTime;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;
use doctor_cell::models::{
    CreateAvailabilityRequest, DoctorError, GenerateSlotsRequest, SlotSearchQuery,
};
use doctor_cell::router::doctor_routes;
use doctor_cell::services::{AvailabilityService, SlotService};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

fn availability_row(doctor_id: Uuid, day: i32, start: &str, end: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "day_of_week": day,
        "start_time": format!("{}:00", start),
        "end_time": format!("{}:00", end),
        "created_at": "2025-06-01T08:00:00Z"
    })
}

fn slot_row(doctor_id: Uuid, date: &str, start: &str, end: &str, booked: bool) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "date": date,
        "start_time": format!("{}T{}:00Z", date, start),
        "end_time": format!("{}T{}:00Z", date, end),
        "is_booked": booked
    })
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[tokio::test]
async fn create_availability_rejects_overlapping_window() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![availability_row(
            doctor_id, 1, "09:00", "12:00",
        )]))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let request = CreateAvailabilityRequest {
        day_of_week: 1,
        start_time: time("10:00"),
        end_time: time("11:00"),
    };

    let result = service
        .create_availability(doctor_id, request, "test-token")
        .await;

    assert_matches!(result, Err(DoctorError::Overlap));
}

#[tokio::test]
async fn create_availability_allows_adjacent_window() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![availability_row(
            doctor_id, 1, "09:00", "12:00",
        )]))
        .mount(&mock_server)
        .await;

    // Half-open windows: 12:00-14:00 touches 09:00-12:00 without overlapping
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![availability_row(
            doctor_id, 1, "12:00", "14:00",
        )]))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let request = CreateAvailabilityRequest {
        day_of_week: 1,
        start_time: time("12:00"),
        end_time: time("14:00"),
    };

    let created = service
        .create_availability(doctor_id, request, "test-token")
        .await
        .unwrap();

    assert_eq!(created.doctor_id, doctor_id);
    assert_eq!(created.start_time, time("12:00"));
}

#[tokio::test]
async fn create_availability_rejects_inverted_window() {
    let config = TestConfig::default().to_app_config();
    let service = AvailabilityService::new(&config);

    let request = CreateAvailabilityRequest {
        day_of_week: 1,
        start_time: time("12:00"),
        end_time: time("09:00"),
    };

    let result = service
        .create_availability(Uuid::new_v4(), request, "test-token")
        .await;

    assert_matches!(result, Err(DoctorError::InvalidWindow(_)));
}

#[tokio::test]
async fn create_availability_rejects_out_of_range_day() {
    let config = TestConfig::default().to_app_config();
    let service = AvailabilityService::new(&config);

    let request = CreateAvailabilityRequest {
        day_of_week: 7,
        start_time: time("09:00"),
        end_time: time("12:00"),
    };

    let result = service
        .create_availability(Uuid::new_v4(), request, "test-token")
        .await;

    assert_matches!(result, Err(DoctorError::Validation(_)));
}

#[tokio::test]
async fn delete_availability_reports_not_found_for_foreign_window() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    // Doctor-scoped filter matches nothing: representation comes back empty
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service
        .delete_availability(Uuid::new_v4(), Uuid::new_v4(), "test-token")
        .await;

    assert_matches!(result, Err(DoctorError::AvailabilityNotFound));
}

// ==============================================================================
// SLOT MATERIALIZATION AND SEARCH
// ==============================================================================

#[tokio::test]
async fn generate_slots_reports_skipped_duplicates() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    // Monday 2025-06-09, 09:00-12:00 at 30 minutes: six candidate slots
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![availability_row(
            doctor_id, 1, "09:00", "12:00",
        )]))
        .mount(&mock_server)
        .await;

    // Upsert ignores duplicates, so only the two new rows come back
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![
            slot_row(doctor_id, "2025-06-09", "11:00", "11:30", false),
            slot_row(doctor_id, "2025-06-09", "11:30", "12:00", false),
        ]))
        .mount(&mock_server)
        .await;

    let service = SlotService::new(&config);
    let request = GenerateSlotsRequest {
        date: "2025-06-09".parse().unwrap(),
        slot_duration_minutes: 30,
    };

    let summary = service
        .generate_slots_for_date(doctor_id, request, "test-token")
        .await
        .unwrap();

    assert_eq!(summary.generated, 6);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.skipped_existing, 4);
}

#[tokio::test]
async fn generate_slots_with_no_matching_windows_inserts_nothing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = SlotService::new(&config);
    let request = GenerateSlotsRequest {
        date: "2025-06-09".parse().unwrap(),
        slot_duration_minutes: 30,
    };

    let summary = service
        .generate_slots_for_date(Uuid::new_v4(), request, "test-token")
        .await
        .unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.inserted, 0);
}

#[tokio::test]
async fn search_slots_returns_embedded_doctor_summary() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    let mut row = slot_row(doctor_id, "2025-06-09", "09:00", "09:30", false);
    row["doctor"] = json!({
        "id": doctor_id,
        "first_name": "Asha",
        "last_name": "Verma",
        "specialization": "Orthodontics",
        "place": "Pune"
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![row]))
        .mount(&mock_server)
        .await;

    let service = SlotService::new(&config);
    let slots = service
        .search_slots(SlotSearchQuery {
            specialization: Some("Orthodontics".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].doctor.specialization, "Orthodontics");
    assert!(!slots[0].is_booked);
}

#[tokio::test]
async fn delete_slot_refuses_booked_slot() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![slot_row(
            doctor_id,
            "2025-06-09",
            "09:00",
            "09:30",
            true,
        )]))
        .mount(&mock_server)
        .await;

    let service = SlotService::new(&config);
    let result = service
        .delete_slot(doctor_id, Uuid::new_v4(), "test-token")
        .await;

    assert_matches!(result, Err(DoctorError::SlotBooked));
}

// ==============================================================================
// ROUTER AUTH BOUNDARY
// ==============================================================================

fn doctor_row(user_id: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": user_id,
        "first_name": "Asha",
        "last_name": "Verma",
        "specialization": "Orthodontics",
        "experience_years": 8,
        "place": "Pune",
        "phone_no": "+91-9812340000",
        "email": "asha.verma@example.com",
        "created_at": "2025-01-01T08:00:00Z",
        "updated_at": null
    })
}

#[tokio::test]
async fn protected_routes_reject_missing_bearer_token() {
    let config = TestConfig::default();
    let app = doctor_routes(config.to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/availability")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_accept_valid_bearer_token() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::doctor("asha.verma@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![doctor_row(&user.id)]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let app = doctor_routes(config.to_arc());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/availability")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn forged_bearer_token_is_rejected() {
    let config = TestConfig::default();
    let user = TestUser::doctor("asha.verma@example.com");
    let token = JwtTestUtils::create_test_token(&user, "some-other-signing-secret", None);

    let app = doctor_routes(config.to_arc());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/availability")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
