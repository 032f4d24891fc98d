use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;
use appointment_cell::models::{
    AppointmentError, AppointmentListQuery, AppointmentStatus, BookAppointmentRequest,
    UpdateAppointmentsRequest,
};
use appointment_cell::router::appointment_routes;
use appointment_cell::services::BookingService;
use shared_utils::test_utils::TestConfig;

fn booking_request(slot_id: Uuid, doctor_id: Uuid) -> BookAppointmentRequest {
    BookAppointmentRequest {
        first_name: "Ravi".to_string(),
        last_name: "Kulkarni".to_string(),
        age: 34,
        gender: "male".to_string(),
        phone_no: "+91-9812345678".to_string(),
        email: "ravi.kulkarni@example.com".to_string(),
        doctor_id,
        slot_id,
    }
}

fn patient_row() -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "name": "Ravi Kulkarni",
        "email": "ravi.kulkarni@example.com",
        "phone_no": "+91-9812345678",
        "created_at": "2025-06-01T08:00:00Z"
    })
}

fn slot_row(slot_id: Uuid, doctor_id: Uuid, booked: bool) -> serde_json::Value {
    json!({
        "id": slot_id,
        "doctor_id": doctor_id,
        "date": "2025-06-09",
        "start_time": "2025-06-09T09:00:00Z",
        "end_time": "2025-06-09T09:30:00Z",
        "is_booked": booked
    })
}

fn appointment_row(doctor_id: Uuid, slot_id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "first_name": "Ravi",
        "last_name": "Kulkarni",
        "age": 34,
        "gender": "male",
        "phone_no": "+91-9812345678",
        "email": "ravi.kulkarni@example.com",
        "doctor_id": doctor_id,
        "slot_id": slot_id,
        "appointment_date": "2025-06-09T09:00:00Z",
        "status": status,
        "meet_link": null,
        "user_id": Uuid::new_v4(),
        "created_at": "2025-06-02T10:00:00Z",
        "updated_at": null
    })
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn booking_claims_slot_and_creates_pending_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let slot_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![patient_row()]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![slot_row(slot_id, doctor_id, false)]),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_slots"))
        .and(query_param("is_booked", "is.false"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![slot_row(slot_id, doctor_id, true)]),
        )
        .mount(&mock_server)
        .await;

    // The insert body must carry the slot's doctor and a PENDING status
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "doctor_id": doctor_id,
            "status": "PENDING"
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(vec![appointment_row(doctor_id, slot_id, "PENDING")]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let booked = service
        .book_appointment(booking_request(slot_id, doctor_id))
        .await
        .unwrap();

    assert_eq!(booked.appointment.status, AppointmentStatus::Pending);
    assert_eq!(booked.appointment.slot_id, Some(slot_id));
    assert_eq!(booked.appointment.doctor_id, doctor_id);
    assert!(booked.slot.is_booked);
}

#[tokio::test]
async fn booking_rejects_slot_owned_by_another_doctor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let slot_id = Uuid::new_v4();
    let slot_owner = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![patient_row()]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![slot_row(slot_id, slot_owner, false)]),
        )
        .mount(&mock_server)
        .await;

    // The request names a different doctor than the slot's owner
    let service = BookingService::new(&config);
    let result = service
        .book_appointment(booking_request(slot_id, Uuid::new_v4()))
        .await;

    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn booking_rejects_unknown_slot() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![patient_row()]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let result = service
        .book_appointment(booking_request(Uuid::new_v4(), Uuid::new_v4()))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotNotFound));
}

#[tokio::test]
async fn booking_rejects_already_booked_slot() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let slot_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![patient_row()]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![slot_row(slot_id, doctor_id, true)]),
        )
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let result = service
        .book_appointment(booking_request(slot_id, doctor_id))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
}

#[tokio::test]
async fn booking_rejects_slot_with_existing_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let slot_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![patient_row()]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![slot_row(slot_id, doctor_id, false)]),
        )
        .mount(&mock_server)
        .await;

    // Slot flag lost an update but the appointment row exists
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![json!({ "id": Uuid::new_v4() })]))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let result = service
        .book_appointment(booking_request(slot_id, doctor_id))
        .await;

    assert_matches!(result, Err(AppointmentError::DuplicateBooking));
}

#[tokio::test]
async fn booking_loses_race_when_claim_matches_no_rows() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let slot_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![patient_row()]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![slot_row(slot_id, doctor_id, false)]),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    // A concurrent booking flipped is_booked between the read and the claim
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let result = service
        .book_appointment(booking_request(slot_id, doctor_id))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
}

#[tokio::test]
async fn booking_rejects_invalid_patient_details() {
    let config = TestConfig::default().to_app_config();
    let service = BookingService::new(&config);

    let mut request = booking_request(Uuid::new_v4(), Uuid::new_v4());
    request.email = "not-an-email".to_string();

    let result = service.book_appointment(request).await;

    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

// ==============================================================================
// ROUTER AUTH BOUNDARY
// ==============================================================================

#[tokio::test]
async fn dashboard_routes_require_a_bearer_token() {
    let config = TestConfig::default();
    let app = appointment_routes(config.to_arc());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_route_is_public() {
    let config = TestConfig::default();
    let app = appointment_routes(config.to_arc());

    // No auth header; the request reaches validation and fails on the email
    let body = json!({
        "first_name": "Ravi",
        "last_name": "Kulkarni",
        "age": 34,
        "gender": "male",
        "phone_no": "+91-9812345678",
        "email": "not-an-email",
        "doctor_id": Uuid::new_v4(),
        "slot_id": Uuid::new_v4()
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==============================================================================
// DASHBOARD
// ==============================================================================

#[tokio::test]
async fn list_appointments_reports_per_status_counts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "status": "PENDING" },
            { "status": "PENDING" },
            { "status": "CONFIRMED" },
            { "status": "COMPLETED" }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "appointment_date.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            appointment_row(doctor_id, Uuid::new_v4(), "PENDING"),
            appointment_row(doctor_id, Uuid::new_v4(), "PENDING"),
        ]))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let page = service
        .list_appointments(
            doctor_id,
            AppointmentListQuery {
                status: Some(AppointmentStatus::Pending),
                ..Default::default()
            },
            "test-token",
        )
        .await
        .unwrap();

    assert_eq!(page.appointments.len(), 2);
    assert_eq!(page.meta.counts.pending, 2);
    assert_eq!(page.meta.counts.confirmed, 1);
    assert_eq!(page.meta.counts.completed, 1);
    assert_eq!(page.meta.total, 2);
}

#[tokio::test]
async fn batch_update_rejects_illegal_transition() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let pending = appointment_row(doctor_id, Uuid::new_v4(), "PENDING");
    let appointment_id: Uuid = serde_json::from_value(pending["id"].clone()).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![pending]))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let result = service
        .update_appointments(
            doctor_id,
            UpdateAppointmentsRequest {
                appointment_ids: vec![appointment_id],
                status: AppointmentStatus::Completed,
            },
            "test-token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn batch_update_rejects_ids_outside_doctor_scope() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    // The doctor-scoped fetch finds none of the requested ids
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = BookingService::new(&config);
    let result = service
        .update_appointments(
            Uuid::new_v4(),
            UpdateAppointmentsRequest {
                appointment_ids: vec![Uuid::new_v4()],
                status: AppointmentStatus::Confirmed,
            },
            "test-token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn batch_update_rejects_empty_id_list() {
    let config = TestConfig::default().to_app_config();
    let service = BookingService::new(&config);

    let result = service
        .update_appointments(
            Uuid::new_v4(),
            UpdateAppointmentsRequest {
                appointment_ids: vec![],
                status: AppointmentStatus::Confirmed,
            },
            "test-token",
        )
        .await;

    assert_matches!(result, Err(AppointmentError::Validation(_)));
}
