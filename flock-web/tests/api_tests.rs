//! Integration tests for flock-web API endpoints
//!
//! Each test builds the router over a fresh database in a temp directory,
//! with request signing disabled (shared secret 0). Signing is covered in
//! security_tests.rs.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use flock_common::db::init_database;
use flock_common::db::settings::RuntimeSettings;
use flock_web::media::MediaStore;
use flock_web::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Smallest valid PNG signature plus padding
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1A\n\x00\x00\x00\x0DIHDR\x00\x00\x00\x01";

struct TestApp {
    router: Router,
    dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_settings(RuntimeSettings::default()).await
    }

    async fn with_settings(settings: RuntimeSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("flock.db")).await.unwrap();
        let media = MediaStore::new(dir.path().join("media"));
        let router = build_router(AppState::new(pool, 0, settings, media));
        Self { router, dir }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body)).await
    }

    async fn upload(&self, uri: &str, file_name: &str, bytes: &[u8], caption: &str) -> (StatusCode, Value) {
        let (content_type, body) = multipart_body(file_name, bytes, caption);
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }

    async fn breed(&self, name: &str) -> i64 {
        let (status, body) = self.post("/breeds", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["record"]["id"].as_i64().unwrap()
    }

    async fn sheep(&self, tag: &str, gender: &str, born: &str, breed_id: i64) -> i64 {
        let (status, body) = self
            .post(
                "/sheep",
                json!({
                    "tag_number": tag,
                    "gender": gender,
                    "date_of_birth": born,
                    "breed_id": breed_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["record"]["id"].as_i64().unwrap()
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

fn multipart_body(file_name: &str, bytes: &[u8], caption: &str) -> (String, Vec<u8>) {
    let boundary = "flock-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\n{}\r\n",
            boundary, caption
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            boundary, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

fn field_errors(body: &Value) -> Vec<String> {
    body["error"]["fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f["field"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "flock-web");
    assert!(body["version"].is_string());
}

// =============================================================================
// Breeds
// =============================================================================

#[tokio::test]
async fn test_breed_lifecycle() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/breeds", json!({ "name": "Dorper", "description": "Hair sheep" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Breed 'Dorper' created successfully!");
    assert_eq!(body["redirect"], "/breeds");
    let id = body["record"]["id"].as_i64().unwrap();

    app.breed("Awassi").await;
    let (_, body) = app.get("/breeds").await;
    let names: Vec<&str> = body["breeds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Awassi", "Dorper"]);

    let (status, body) = app
        .send("PUT", &format!("/breeds/{}", id), Some(json!({ "name": "White Dorper" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Breed 'White Dorper' updated successfully!");

    let (status, body) = app.send("DELETE", &format!("/breeds/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Breed 'White Dorper' deleted successfully!");

    let (status, body) = app.get(&format!("/breeds/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_breed_validation_and_conflicts() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/breeds", json!({ "description": "no name" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["name"]);

    let breed = app.breed("Dorper").await;
    let (status, body) = app.post("/breeds", json!({ "name": "Dorper" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    app.sheep("A1", "F", "2023-03-01", breed).await;
    let (status, _) = app.send("DELETE", &format!("/breeds/{}", breed), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.get(&format!("/breeds/{}", breed)).await;
    assert_eq!(body["sheep"][0]["tag_number"], "A1");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/breeds")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Sheep
// =============================================================================

#[tokio::test]
async fn test_sheep_create_and_detail() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;

    let (status, body) = app
        .post(
            "/sheep",
            json!({
                "tag_number": "E1",
                "name": "Bess",
                "gender": "F",
                "date_of_birth": "2021-04-01",
                "breed_id": breed,
                "weight_current": 141.256,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Sheep 'E1' created successfully!");
    assert_eq!(body["redirect"], "/sheep");
    assert_eq!(body["record"]["status"], "ACTIVE");
    assert_eq!(body["record"]["label"], "E1 - Bess");
    assert_eq!(body["record"]["weight_current"], 141.26);
    assert_eq!(body["record"]["breed_name"], "Dorper");
    assert!(body["record"]["uuid"].is_string());
    assert!(body["record"]["age_days"].as_i64().unwrap() > 365);
    let id = body["record"]["id"].as_i64().unwrap();

    let (status, body) = app.get(&format!("/sheep/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["lambings"].is_array());
    assert!(body["breeding_as_ewe"].is_array());
    assert!(body["breeding_as_ram"].is_null());
    assert!(body["images"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sheep_required_fields() {
    let app = TestApp::new().await;
    let (status, body) = app.post("/sheep", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let fields = field_errors(&body);
    for expected in ["tag_number", "gender", "date_of_birth", "breed_id"] {
        assert!(fields.iter().any(|f| f == expected), "missing {} in {:?}", expected, fields);
    }
}

#[tokio::test]
async fn test_sheep_parent_rules() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;
    let ram = app.sheep("R1", "M", "2020-03-01", breed).await;

    // Parents swapped
    let (status, body) = app
        .post(
            "/sheep",
            json!({
                "tag_number": "L1",
                "gender": "M",
                "date_of_birth": "2024-03-01",
                "breed_id": breed,
                "mother_id": ram,
                "father_id": ewe,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["mother_id", "father_id"]);

    // Own mother
    let (status, body) = app
        .send(
            "PUT",
            &format!("/sheep/{}", ewe),
            Some(json!({
                "tag_number": "E1",
                "gender": "F",
                "date_of_birth": "2020-03-01",
                "breed_id": breed,
                "mother_id": ewe,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["mother_id"]);

    // Correct parents, then the offspring show on the ram
    let (status, _) = app
        .post(
            "/sheep",
            json!({
                "tag_number": "L1",
                "gender": "M",
                "date_of_birth": "2024-03-01",
                "breed_id": breed,
                "mother_id": ewe,
                "father_id": ram,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get(&format!("/sheep/{}", ram)).await;
    assert_eq!(body["offspring"][0]["tag_number"], "L1");
    assert!(body["breeding_as_ram"].is_array());
    assert!(body["lambings"].is_null());
}

#[tokio::test]
async fn test_sheep_update_redirects_to_detail() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let id = app.sheep("E1", "F", "2020-03-01", breed).await;

    let (status, body) = app
        .send(
            "PUT",
            &format!("/sheep/{}", id),
            Some(json!({
                "tag_number": "E1",
                "gender": "F",
                "date_of_birth": "2020-03-01",
                "breed_id": breed,
                "status": "CULLED",
                "date_removed": "2025-06-01",
                "removal_reason": "poor mothering",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Sheep 'E1' updated successfully!");
    assert_eq!(body["redirect"], format!("/sheep/{}", id));
    assert_eq!(body["record"]["status"], "CULLED");
    assert_eq!(body["record"]["removal_reason"], "poor mothering");

    let (status, _) = app
        .send(
            "PUT",
            "/sheep/9999",
            Some(json!({ "tag_number": "X", "gender": "F", "date_of_birth": "2020-03-01", "breed_id": breed })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sheep_list_filters() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    app.sheep("B2", "F", "2022-05-01", breed).await;
    app.sheep("A1", "M", "2024-02-01", breed).await;
    let (status, _) = app
        .post(
            "/sheep",
            json!({
                "tag_number": "C3",
                "gender": "F",
                "date_of_birth": "2022-01-01",
                "breed_id": breed,
                "status": "SOLD",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get("/sheep").await;
    assert_eq!(status, StatusCode::OK);
    let tags: Vec<&str> = body["sheep"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["tag_number"].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["A1", "B2", "C3"]);
    assert_eq!(body["current_status"], "");
    assert_eq!(body["status_choices"].as_array().unwrap().len(), 5);
    assert_eq!(body["pagination"]["total_results"], 3);

    let (_, body) = app.get("/sheep?status=SOLD").await;
    assert_eq!(body["sheep"].as_array().unwrap().len(), 1);
    assert_eq!(body["current_status"], "SOLD");

    let (_, body) = app.get("/sheep?q=b2").await;
    assert_eq!(body["sheep"][0]["tag_number"], "B2");

    let (_, body) = app.get("/sheep?gender=M").await;
    assert_eq!(body["sheep"].as_array().unwrap().len(), 1);
    assert_eq!(body["sheep"][0]["tag_number"], "A1");

    let (status, _) = app.get("/sheep?gender=X").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/sheep?status=LOST").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_sheep_grouped_by_birth_year() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    app.sheep("B2", "F", "2022-05-01", breed).await;
    app.sheep("A1", "M", "2024-02-01", breed).await;
    app.sheep("A0", "F", "2022-09-01", breed).await;

    let (status, body) = app.get("/sheep?group_by=birth_year").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("sheep").is_none());

    let groups = body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["year"], 2024);
    assert_eq!(groups[1]["year"], 2022);
    assert_eq!(groups[1]["count"], 2);
    assert_eq!(groups[1]["sheep"][0]["tag_number"], "A0");
    assert_eq!(groups[1]["sheep"][1]["tag_number"], "B2");

    let (status, _) = app.get("/sheep?group_by=colour").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sheep_list_pagination_uses_page_size_setting() {
    let settings = RuntimeSettings {
        list_page_size: 2,
        ..Default::default()
    };
    let app = TestApp::with_settings(settings).await;
    let breed = app.breed("Dorper").await;
    for tag in ["A1", "A2", "A3"] {
        app.sheep(tag, "F", "2022-05-01", breed).await;
    }

    let (_, body) = app.get("/sheep?page=2").await;
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["sheep"].as_array().unwrap().len(), 1);
    assert_eq!(body["sheep"][0]["tag_number"], "A3");
}

#[tokio::test]
async fn test_duplicate_tag_is_conflict() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    app.sheep("A1", "F", "2022-05-01", breed).await;

    let (status, body) = app
        .post(
            "/sheep",
            json!({ "tag_number": "A1", "gender": "M", "date_of_birth": "2023-01-01", "breed_id": breed }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"].as_str().unwrap().contains("A1"));
}

// =============================================================================
// Breeding and lambing
// =============================================================================

#[tokio::test]
async fn test_breeding_rules_and_duplicate() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;
    let ram = app.sheep("R1", "M", "2020-03-01", breed).await;

    // Ewe and ram swapped, end before start
    let (status, body) = app
        .post(
            "/breeding",
            json!({
                "ewe_id": ram,
                "ram_id": ewe,
                "date_started": "2024-09-10",
                "date_ended": "2024-09-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["ewe_id", "ram_id", "date_ended"]);

    let (status, body) = app
        .post(
            "/breeding",
            json!({
                "ewe_id": ewe,
                "ram_id": ram,
                "date_started": "2024-09-01",
                "status": "IN_PROGRESS",
                "notes": "first cycle",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Breeding: E1 × R1 (2024-09-01) created successfully!");
    let id = body["record"]["id"].as_i64().unwrap();

    let (status, body) = app.send("POST", &format!("/breeding/{}/duplicate", id), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let copy_id = body["record"]["id"].as_i64().unwrap();
    assert_ne!(copy_id, id);
    assert_eq!(body["record"]["status"], "PLANNED");
    assert_eq!(body["record"]["notes"], "first cycle");
    assert_eq!(body["redirect"], format!("/breeding/{}", copy_id));

    let (_, body) = app.get("/breeding?status=PLANNED").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["current_status"], "PLANNED");

    let (_, body) = app.get(&format!("/breeding?ram_id={}", ram)).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    let (_, body) = app.get(&format!("/breeding?ewe_id={}", ram)).await;
    assert!(body["records"].as_array().unwrap().is_empty());

    let (status, _) = app.get("/breeding?status=MAYBE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send("POST", "/breeding/9999/duplicate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lambing_rules() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;
    let other_ewe = app.sheep("E2", "F", "2020-03-01", breed).await;
    let ram = app.sheep("R1", "M", "2020-03-01", breed).await;

    let (_, body) = app
        .post("/breeding", json!({ "ewe_id": ewe, "ram_id": ram, "date_started": "2024-09-01" }))
        .await;
    let breeding_id = body["record"]["id"].as_i64().unwrap();

    // Counts do not add up
    let (status, body) = app
        .post(
            "/lambing",
            json!({ "ewe_id": ewe, "date": "2025-02-01", "total_born": 1, "born_alive": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["born_alive"]);

    // Breeding record belongs to another ewe
    let (status, body) = app
        .post(
            "/lambing",
            json!({ "ewe_id": other_ewe, "breeding_record_id": breeding_id, "date": "2025-02-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["breeding_record_id"]);

    // A ram cannot lamb
    let (status, _) = app.post("/lambing", json!({ "ewe_id": ram, "date": "2025-02-01" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/lambing",
            json!({
                "ewe_id": ewe,
                "breeding_record_id": breeding_id,
                "date": "2025-02-01",
                "assisted": true,
                "total_born": 2,
                "born_alive": 2,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Lambing: E1 on 2025-02-01 created successfully!");
    assert_eq!(body["record"]["born_dead"], 0);
    let lambing_id = body["record"]["id"].as_i64().unwrap();

    // Second lambing on the same breeding record
    let (status, body) = app
        .post(
            "/lambing",
            json!({ "ewe_id": ewe, "breeding_record_id": breeding_id, "date": "2025-02-02" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["breeding_record_id"]);

    // Editing the linked lambing keeps its own link
    let (status, _) = app
        .send(
            "PUT",
            &format!("/lambing/{}", lambing_id),
            Some(json!({
                "ewe_id": ewe,
                "breeding_record_id": breeding_id,
                "date": "2025-02-01",
                "total_born": 3,
                "born_alive": 2,
                "born_dead": 1,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/breeding/{}", breeding_id)).await;
    assert_eq!(body["lambing"]["id"], lambing_id);
    assert_eq!(body["lambing"]["total_born"], 3);

    let (_, body) = app.get("/lambing?assisted=true").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/lambing?assisted=false").await;
    assert!(body["records"].as_array().unwrap().is_empty());

    let (_, body) = app.get(&format!("/sheep/{}", ewe)).await;
    assert_eq!(body["lambings"][0]["id"], lambing_id);
    assert_eq!(body["breeding_as_ewe"][0]["id"], breeding_id);
}

// =============================================================================
// Health records
// =============================================================================

#[tokio::test]
async fn test_health_records() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;

    let (status, body) = app
        .post(
            "/health-records",
            json!({
                "sheep_id": ewe,
                "date": "2025-03-02",
                "record_type": "HOOF_TRIM",
                "requires_followup": true,
                "followup_date": "2025-04-02",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["message"],
        "Health record 'Hoof Trimming for E1 on 2025-03-02' created successfully!"
    );
    let id = body["record"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/health-records",
            json!({ "sheep_id": ewe, "date": "2025-03-03", "record_type": "VACCINATION" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/health-records",
            json!({ "sheep_id": ewe, "date": "2025-03-03", "record_type": "SPA_DAY", "dosage": "x".repeat(101) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["record_type", "dosage"]);

    let (_, body) = app.get("/health-records?requires_followup=true").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["records"][0]["id"], id);

    let (_, body) = app.get("/health-records?record_type=VACCINATION").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["record_type_choices"].as_array().unwrap().len(), 8);

    let (_, body) = app.get(&format!("/health-records/{}", id)).await;
    assert_eq!(body["label"], "Hoof Trimming for E1 on 2025-03-02");

    // Newest first on the sheep's detail
    let (_, body) = app.get(&format!("/sheep/{}", ewe)).await;
    assert_eq!(body["health_records"][0]["record_type"], "VACCINATION");

    let (status, _) = app.send("DELETE", &format!("/health-records/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/health-records/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Images
// =============================================================================

#[tokio::test]
async fn test_sheep_image_upload_and_delete() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E42", "F", "2020-03-01", breed).await;

    let (status, body) = app
        .upload(&format!("/sheep/{}/images", ewe), "spring.PNG", PNG_BYTES, "Spring shearing")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["record"]["tag_number"], "E42");
    assert_eq!(body["record"]["caption"], "Spring shearing");
    assert_eq!(body["redirect"], format!("/sheep/{}", ewe));

    let path = body["record"]["image"].as_str().unwrap().to_string();
    assert!(path.starts_with("sheep_images/E42_"));
    assert!(path.ends_with(".png"));
    let on_disk = app.dir.path().join("media").join(&path);
    assert!(on_disk.exists());

    // Served under /media
    let request = Request::builder()
        .uri(format!("/media/{}", path))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, detail) = app.get(&format!("/sheep/{}", ewe)).await;
    assert_eq!(detail["images"].as_array().unwrap().len(), 1);

    let image_id = body["record"]["id"].as_i64().unwrap();
    let (status, body) = app.send("DELETE", &format!("/sheep-images/{}", image_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], format!("/sheep/{}", ewe));
    assert!(!on_disk.exists());
}

#[tokio::test]
async fn test_primary_image_replacement_removes_old_file() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;

    let (status, first) = app
        .upload(&format!("/sheep/{}/primary-image", ewe), "a.png", PNG_BYTES, "")
        .await;
    assert_eq!(status, StatusCode::OK);
    let first_path = first["record"]["image"].as_str().unwrap().to_string();

    let (_, second) = app
        .upload(&format!("/sheep/{}/primary-image", ewe), "b.png", PNG_BYTES, "")
        .await;
    let second_path = second["record"]["image"].as_str().unwrap().to_string();

    let media = app.dir.path().join("media");
    assert!(!media.join(&first_path).exists());
    assert!(media.join(&second_path).exists());

    let (_, detail) = app.get(&format!("/sheep/{}", ewe)).await;
    assert_eq!(detail["sheep"]["primary_image"], second_path);
}

#[tokio::test]
async fn test_lambing_image_named_by_ewe_and_date() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E9", "F", "2020-03-01", breed).await;
    let (_, body) = app.post("/lambing", json!({ "ewe_id": ewe, "date": "2025-02-20" })).await;
    let lambing_id = body["record"]["id"].as_i64().unwrap();

    let (status, body) = app
        .upload(&format!("/lambing/{}/images", lambing_id), "twins.png", PNG_BYTES, "twins")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["record"]["tag_number"], "E9");
    assert!(body["record"]["image"]
        .as_str()
        .unwrap()
        .starts_with("lambing_images/E9_20250220_"));

    let (_, detail) = app.get(&format!("/lambing/{}", lambing_id)).await;
    assert_eq!(detail["images"].as_array().unwrap().len(), 1);
    assert_eq!(detail["label"], "Lambing: E9 on 2025-02-20");

    let image_id = body["record"]["id"].as_i64().unwrap();
    let (status, body) = app.send("DELETE", &format!("/lambing-images/{}", image_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], format!("/lambing/{}", lambing_id));
}

#[tokio::test]
async fn test_non_image_upload_rejected() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;

    let (status, body) = app
        .upload(&format!("/sheep/{}/images", ewe), "notes.txt", b"just text", "")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (_, detail) = app.get(&format!("/sheep/{}", ewe)).await;
    assert!(detail["images"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stored_extension_follows_content() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;

    let (status, body) = app
        .upload(&format!("/sheep/{}/images", ewe), "photo.png", b"\xFF\xD8\xFF\xE0\x00\x10JFIF", "")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["record"]["image"].as_str().unwrap().ends_with(".jpg"));

    // A PDF renamed to look like an image
    let (status, _) = app
        .upload(&format!("/sheep/{}/images", ewe), "scan.png", b"%PDF-1.7\n%...", "")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_to_missing_sheep_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app.upload("/sheep/404/images", "a.png", PNG_BYTES, "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Input bounds and linked records
// =============================================================================

#[tokio::test]
async fn test_huge_lamb_counts_rejected() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;

    let (status, body) = app
        .post(
            "/lambing",
            json!({
                "ewe_id": ewe,
                "date": "2025-02-01",
                "total_born": 1,
                "born_alive": i64::MAX,
                "born_dead": 1,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["born_alive"]);

    let (status, body) = app
        .post(
            "/lambing",
            json!({ "ewe_id": ewe, "date": "2025-02-01", "total_born": 40_000, "born_alive": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["total_born"]);
}

#[tokio::test]
async fn test_weight_rounding_to_limit_rejected() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;

    let (status, body) = app
        .post(
            "/sheep",
            json!({
                "tag_number": "H1",
                "gender": "M",
                "date_of_birth": "2020-03-01",
                "breed_id": breed,
                "weight_current": 999.999,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["weight_current"]);
}

#[tokio::test]
async fn test_breeding_ewe_fixed_once_lambing_recorded() {
    let app = TestApp::new().await;
    let breed = app.breed("Dorper").await;
    let ewe = app.sheep("E1", "F", "2020-03-01", breed).await;
    let other_ewe = app.sheep("E2", "F", "2020-03-01", breed).await;
    let ram = app.sheep("R1", "M", "2020-03-01", breed).await;

    let (_, body) = app
        .post("/breeding", json!({ "ewe_id": ewe, "ram_id": ram, "date_started": "2024-09-01" }))
        .await;
    let breeding_id = body["record"]["id"].as_i64().unwrap();

    // Free to change while nothing is linked
    let (status, _) = app
        .send(
            "PUT",
            &format!("/breeding/{}", breeding_id),
            Some(json!({ "ewe_id": other_ewe, "ram_id": ram, "date_started": "2024-09-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/lambing",
            json!({ "ewe_id": other_ewe, "breeding_record_id": breeding_id, "date": "2025-02-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            "PUT",
            &format!("/breeding/{}", breeding_id),
            Some(json!({ "ewe_id": ewe, "ram_id": ram, "date_started": "2024-09-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_errors(&body), vec!["ewe_id"]);

    // Other fields remain editable
    let (status, body) = app
        .send(
            "PUT",
            &format!("/breeding/{}", breeding_id),
            Some(json!({
                "ewe_id": other_ewe,
                "ram_id": ram,
                "date_started": "2024-09-01",
                "status": "SUCCESSFUL",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["ewe_id"], other_ewe);
    assert_eq!(body["record"]["status"], "SUCCESSFUL");
}

// =============================================================================
// Search and malformed paths
// =============================================================================

#[tokio::test]
async fn test_list_search_and_breed_filter() {
    let app = TestApp::new().await;
    let dorper = app.breed("Dorper").await;
    let (_, body) = app
        .post("/breeds", json!({ "name": "Suffolk", "description": "Black-faced meat breed" }))
        .await;
    let suffolk = body["record"]["id"].as_i64().unwrap();

    let ewe = app.sheep("A_1", "F", "2020-03-01", dorper).await;
    let other = app.sheep("AB1", "F", "2020-03-01", suffolk).await;
    let ram = app.sheep("R1", "M", "2019-03-01", dorper).await;

    let (_, body) = app.get(&format!("/sheep?breed_id={}", suffolk)).await;
    assert_eq!(body["sheep"].as_array().unwrap().len(), 1);
    assert_eq!(body["sheep"][0]["tag_number"], "AB1");
    let (status, _) = app.get("/sheep?breed_id=dorper").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Underscore is not a wildcard
    let (_, body) = app.get("/sheep?q=A_1").await;
    assert_eq!(body["sheep"].as_array().unwrap().len(), 1);
    assert_eq!(body["sheep"][0]["tag_number"], "A_1");
    let (_, body) = app.get("/sheep?q=%25").await;
    assert!(body["sheep"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/breeds?q=black").await;
    assert_eq!(body["breeds"].as_array().unwrap().len(), 1);
    assert_eq!(body["breeds"][0]["name"], "Suffolk");

    app.post("/breeding", json!({ "ewe_id": ewe, "ram_id": ram, "date_started": "2024-09-01" }))
        .await;
    app.post("/breeding", json!({ "ewe_id": other, "ram_id": ram, "date_started": "2024-09-02" }))
        .await;
    let (_, body) = app.get("/breeding?q=AB1").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["records"][0]["ewe_id"], other);
    let (_, body) = app.get("/breeding?q=r1").await;
    assert_eq!(body["pagination"]["total_results"], 2);

    app.post("/lambing", json!({ "ewe_id": ewe, "date": "2025-02-01" })).await;
    let (_, body) = app.get("/lambing?q=A_").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/lambing?q=AB").await;
    assert!(body["records"].as_array().unwrap().is_empty());

    app.post(
        "/health-records",
        json!({
            "sheep_id": other,
            "date": "2025-01-05",
            "record_type": "MEDICATION",
            "treatment": "Oxytetracycline",
        }),
    )
    .await;
    let (_, body) = app.get("/health-records?q=tetra").await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["records"][0]["sheep_tag"], "AB1");
}

#[tokio::test]
async fn test_non_numeric_id_is_json_bad_request() {
    let app = TestApp::new().await;

    for uri in ["/sheep/abc", "/breeds/1.5", "/breeding/x", "/lambing/-", "/health-records/one"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "BAD_REQUEST", "{}", uri);
    }

    let (status, body) = app.send("DELETE", "/sheep-images/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
