//! End-to-end registration against a mocked backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;
use registration::{
    BackendConfig, Dispatch, FieldId, FileStorage, FixedClock, HttpApi, NotificationKind, Phase,
    PhotoFile, RegistrationWizard, SessionStorage, Step, Validator, WizardError, AUTH_TOKEN_KEY,
    TOKEN_KEY,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_760_000_000_000;
const EMAIL: &str = "asha@college.edu";

fn session_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir()
        .join(format!("hostel-flow-{tag}-{}-{nanos}", std::process::id()))
        .join("session.json")
}

fn wizard_for(base_url: String, store: PathBuf) -> RegistrationWizard<HttpApi, FileStorage> {
    let api = HttpApi::new(BackendConfig {
        base_url,
        request_timeout_secs: 5,
        ..BackendConfig::default()
    })
    .unwrap();
    RegistrationWizard::with_clock(
        api,
        FileStorage::open(store).unwrap(),
        Arc::new(FixedClock::at(NOW)),
        Validator::for_year(2026),
    )
}

async fn mount_otp(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/sendcode"))
        .and(body_json(json!({ "email": EMAIL })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "OTP sent to your email",
            "expiringtime": NOW + 90_000
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/verifyemail"))
        .and(body_json(json!({ "email": EMAIL, "code": "424242" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Email verified"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_registration() {
    let server = MockServer::start().await;
    mount_otp(&server).await;
    Mock::given(method("GET"))
        .and(path("/departments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Civil", "ECE", "ME"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(json!({
            "name": "Asha Rao",
            "email": EMAIL,
            "room_number": 204,
            "status": "pending",
            "approved_by": "Admin",
            "profile_photo": "data:image/jpeg;base64,/9j/"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "message": "Registration submitted for approval",
            "token": "jwt-abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = session_path("full");
    let mut w = wizard_for(server.uri(), store.clone());

    let departments = w.load_departments().await.unwrap();
    assert_eq!(departments, vec!["Civil", "ECE", "ME"]);

    w.update_field(FieldId::EmailId, EMAIL).unwrap();
    assert!(w.send_code().await.unwrap());
    assert!(w.otp().sent);
    assert_eq!(w.otp().resend_countdown_seconds(), 90);
    assert_eq!(w.otp().last_sent_message, "OTP sent to your email");
    assert!(!w.can_resend());
    for _ in 0..90 {
        w.tick().unwrap();
    }
    assert_eq!(w.otp().resend_countdown_seconds(), 0);
    assert!(w.can_resend());

    w.update_field(FieldId::OtpCode, "424242").unwrap();
    assert!(w.verify_code().await.unwrap());
    assert!(w.next().unwrap());

    for (field, value) in [
        (FieldId::FullName, "Asha Rao"),
        (FieldId::FatherName, "Ravi Rao"),
        (FieldId::Dob, "2005-04-01"),
        (FieldId::BloodGroup, "O+"),
        (FieldId::StudentContact, "9876543210"),
        (FieldId::ParentContact, "9123456780"),
        (FieldId::Address, "12 Lake Road, Pune"),
    ] {
        w.update_field(field, value).unwrap();
    }
    assert!(w.next().unwrap());

    for (field, value) in [
        (FieldId::Department, "ECE"),
        (FieldId::AcademicYear, "2nd Year"),
        (FieldId::RegistrationNumber, "20230001"),
        (FieldId::RollNumber, "EC23A1"),
        (FieldId::RoomNumber, "21"),
    ] {
        w.update_field(field, value).unwrap();
    }
    assert!(!w.next().unwrap());
    assert_eq!(
        w.visible_error(FieldId::RoomNumber),
        Some("Room number must be exactly 3 digits")
    );
    w.update_field(FieldId::RoomNumber, "204").unwrap();
    assert!(w.next().unwrap());

    w.update_field(FieldId::Password, "abcdefgh").unwrap();
    assert!(w.visible_error(FieldId::Password).is_some());
    w.update_field(FieldId::Password, "Abcd123!").unwrap();
    w.update_field(FieldId::ConfirmPassword, "Abcd123!").unwrap();
    let jpeg = PhotoFile::new("asha.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]);
    assert!(w.upload_photo(&jpeg).unwrap());
    assert!(w.next().unwrap());
    assert_eq!(w.step(), Step::Confirmation);

    for field in [FieldId::AgreeTerms, FieldId::AgreePrivacy, FieldId::AgreeRules] {
        w.update_field(field, true).unwrap();
    }
    assert!(w.can_submit());
    assert!(w.submit().await.unwrap());
    assert_eq!(w.phase(), Phase::Submitted);
    let note = w.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Success);
    assert_eq!(note.message, "Registration submitted for approval");

    let reopened = FileStorage::open(&store).unwrap();
    assert_eq!(reopened.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("jwt-abc"));
    assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("jwt-abc"));
    let _ = std::fs::remove_dir_all(store.parent().unwrap());
}

#[tokio::test]
async fn rejected_send_keeps_protocol_idle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sendcode"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "error": "Email already registered" })),
        )
        .mount(&server)
        .await;

    let mut w = wizard_for(server.uri(), session_path("rejected"));
    w.update_field(FieldId::EmailId, EMAIL).unwrap();
    assert!(!w.send_code().await.unwrap());
    assert!(!w.otp().sent);
    assert!(!w.otp().verified);
    assert_eq!(w.otp().resend_countdown_seconds(), 0);
    let note = w.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert_eq!(note.message, "Email already registered");
}

#[tokio::test]
async fn unreachable_backend() {
    let mut w = wizard_for("http://127.0.0.1:9".into(), session_path("offline"));

    let departments = w.load_departments().await.unwrap();
    assert_eq!(departments, vec!["ME", "Computer science", "ECE"]);

    w.update_field(FieldId::EmailId, EMAIL).unwrap();
    assert!(!w.send_code().await.unwrap());
    assert_eq!(
        w.notification().unwrap().message,
        "Unable to reach the server. Check your connection and try again."
    );
    assert!(!w.otp().sent);
}

#[tokio::test]
async fn fractional_expiry_still_counts_as_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sendcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "expiringtime": 1_760_000_090_000.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut w = wizard_for(server.uri(), session_path("fractional"));
    w.update_field(FieldId::EmailId, EMAIL).unwrap();
    assert!(w.send_code().await.unwrap());
    assert!(w.otp().sent);
    assert_eq!(w.otp().resend_countdown_seconds(), 90);
    assert_eq!(w.notification().unwrap().kind, NotificationKind::Success);
}

#[tokio::test]
async fn request_runs_on_a_spawned_task() {
    let server = MockServer::start().await;
    mount_otp(&server).await;

    let mut w = wizard_for(server.uri(), session_path("spawned"));
    w.update_field(FieldId::EmailId, EMAIL).unwrap();
    let Dispatch::Remote(request) = w.start_send_code().unwrap() else {
        panic!("send should go to the backend");
    };
    let api = w.api().clone();
    let task = tokio::spawn(async move { request.run(&api).await });

    // The form stays editable while the request is out.
    assert!(w.update_field(FieldId::FullName, "Asha Rao").unwrap());
    assert_eq!(w.start_send_code(), Err(WizardError::Busy("send-code")));

    let reply = task.await.unwrap();
    assert!(w.finish(reply).unwrap());
    assert!(w.otp().sent);
    assert_eq!(w.otp().resend_countdown_seconds(), 90);

    w.update_field(FieldId::OtpCode, "424242").unwrap();
    assert!(w.verify_code().await.unwrap());
}
