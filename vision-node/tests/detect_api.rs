mod support;

use std::sync::Arc;

use actix_web::{test, web, App};

use agv_vision_common::DetectionResult;
use agv_vision_node::audit::{AuditSink, EventStore, NullEventStore};
use agv_vision_node::detection::DetectionService;
use agv_vision_node::detector::{Detector, RawDetection};
use agv_vision_node::frame_store::{FrameStore, StoredFrame};
use agv_vision_node::{api, AppState};

use support::{jpeg_bytes, multipart_file, CapturingStore, ScriptedDetector};

fn person_box() -> RawDetection {
    RawDetection {
        x1: 64.0,
        y1: 48.0,
        x2: 320.0,
        y2: 240.0,
        confidence: 0.91,
        class_id: 0,
    }
}

fn app_state(
    detector: Arc<dyn Detector>,
    store: FrameStore,
    event_store: Arc<dyn EventStore>,
) -> web::Data<AppState> {
    let audit = AuditSink::spawn(event_store.clone());
    web::Data::new(AppState {
        detection: DetectionService::new(detector, store, audit),
        model_name: "scripted".to_string(),
        event_store,
    })
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(api::configure)).await
    };
}

#[actix_rt::test]
async fn health_reports_model_and_db_state() {
    let state = app_state(
        ScriptedDetector::new(vec![]),
        FrameStore::new("latest"),
        Arc::new(NullEventStore),
    );
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "scripted");
    assert_eq!(body["db_connected"], false);
}

#[actix_rt::test]
async fn detect_returns_normalized_result() {
    let detector = ScriptedDetector::new(vec![person_box()]);
    let state = app_state(detector.clone(), FrameStore::new("latest"), Arc::new(NullEventStore));
    let app = test_app!(state);

    let (content_type, body) = multipart_file("warehouse.jpg", &jpeg_bytes(640, 480));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/detect")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;

    assert!(resp.status().is_success());
    let result: DetectionResult = test::read_body_json(resp).await;
    assert_eq!(result.total_objects, 1);
    assert_eq!(result.total_objects, result.detections.len());

    let rec = &result.detections[0];
    assert_eq!(rec.object_class, "person");
    assert_eq!(rec.bbox_normalized.x1, 0.1);
    assert_eq!(rec.bbox_normalized.y2, 0.5);
    assert!(rec.bbox_normalized.x1 <= rec.bbox_normalized.x2);
    assert!(rec.distance_meters.is_none());
    assert_eq!(detector.call_count(), 1);
}

#[actix_rt::test]
async fn undecodable_upload_is_rejected_before_inference() {
    let detector = ScriptedDetector::new(vec![person_box()]);
    let state = app_state(detector.clone(), FrameStore::new("latest"), Arc::new(NullEventStore));
    let app = test_app!(state);

    let (content_type, body) = multipart_file("junk.jpg", b"not an image at all");
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/detect")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), 400);
    assert_eq!(detector.call_count(), 0);
}

#[actix_rt::test]
async fn out_of_range_thresholds_are_rejected_before_inference() {
    let detector = ScriptedDetector::new(vec![person_box()]);
    let state = app_state(detector.clone(), FrameStore::new("latest"), Arc::new(NullEventStore));
    let app = test_app!(state);

    for uri in ["/detect?threshold=1.01", "/detect?threshold=-0.1"] {
        let (content_type, body) = multipart_file("ok.jpg", &jpeg_bytes(64, 48));
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(uri)
                .insert_header(("content-type", content_type))
                .set_payload(body)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
    }
    assert_eq!(detector.call_count(), 0);
}

#[actix_rt::test]
async fn missing_file_field_is_a_client_error() {
    let state = app_state(
        ScriptedDetector::new(vec![]),
        FrameStore::new("latest"),
        Arc::new(NullEventStore),
    );
    let app = test_app!(state);

    let (content_type, _) = multipart_file("ok.jpg", &jpeg_bytes(64, 48));
    let empty_body = format!("--{}--\r\n", support::MULTIPART_BOUNDARY).into_bytes();
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/detect")
            .insert_header(("content-type", content_type))
            .set_payload(empty_body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn unreachable_store_never_breaks_the_response() {
    let detector = ScriptedDetector::new(vec![person_box()]);
    let failing = CapturingStore::failing();
    let state = app_state(detector, FrameStore::new("latest"), failing);
    let app = test_app!(state);

    let (content_type, body) = multipart_file("warehouse.jpg", &jpeg_bytes(640, 480));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/detect")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;

    assert!(resp.status().is_success());
    let result: DetectionResult = test::read_body_json(resp).await;
    assert_eq!(result.total_objects, 1);
}

#[actix_rt::test]
async fn latest_is_not_found_until_a_frame_exists() {
    let store = FrameStore::new("data/images/latest.jpg");
    let state = app_state(
        ScriptedDetector::new(vec![person_box()]),
        store.clone(),
        Arc::new(NullEventStore),
    );
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/detect/latest").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);

    store.publish(StoredFrame {
        jpeg: jpeg_bytes(640, 480),
        width: 640,
        height: 480,
        sequence: 1,
        captured_at_ms: 0,
    });

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/detect/latest").to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let result: DetectionResult = test::read_body_json(resp).await;
    assert_eq!(result.total_objects, 1);
}

#[actix_rt::test]
async fn corrupt_stored_frame_is_a_server_error() {
    let store = FrameStore::new("data/images/latest.jpg");
    let state = app_state(
        ScriptedDetector::new(vec![]),
        store.clone(),
        Arc::new(NullEventStore),
    );
    let app = test_app!(state);

    store.publish(StoredFrame {
        jpeg: vec![0u8; 64],
        width: 640,
        height: 480,
        sequence: 1,
        captured_at_ms: 0,
    });

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/detect/latest").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 500);
}

#[actix_rt::test]
async fn detections_are_submitted_for_persistence_with_their_source() {
    let detector = ScriptedDetector::new(vec![person_box()]);
    let capturing = CapturingStore::shared();
    let state = app_state(detector, FrameStore::new("latest"), capturing.clone());
    let app = test_app!(state);

    let (content_type, body) = multipart_file("aisle-3.jpg", &jpeg_bytes(640, 480));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/detect")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    // Persistence is asynchronous; give the writer a moment.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let recorded = capturing.detections.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    let (record, _elapsed, source) = &recorded[0];
    assert_eq!(record.object_class, "person");
    assert_eq!(source.as_deref(), Some("aisle-3.jpg"));
}
