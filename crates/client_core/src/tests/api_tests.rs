use std::{collections::HashMap, sync::Arc, time::Duration};

use super::*;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    List(HashMap<String, String>),
    Patch(String, Value),
    Multipart {
        path: String,
        fields: Vec<(String, String)>,
    },
}

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<Seen>>>,
}

fn partner_json(id: Value, name: &str, email: &str) -> Value {
    json!({
        "id": id,
        "partnerName": name,
        "type": "Corporate",
        "email": email,
        "contactNumber": "9876543210",
        "dateOfAgreement": "2024-04-01",
        "pan": "ABCDE1234F",
        "gst": "22AAAAA0000A1Z5",
        "contactAddress": "12 Market Road"
    })
}

async fn list_partners(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = params.get("query").cloned().unwrap_or_default();
    state.seen.lock().await.push(Seen::List(params));
    match query.as_str() {
        "broken" => (StatusCode::OK, Json(json!({ "content": "nope" }))),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            (StatusCode::OK, Json(json!({ "content": [] })))
        }
        _ => (
            StatusCode::OK,
            Json(json!({
                "content": [partner_json(json!(124), "Acme Corporation", "ops@acme.example")],
                "totalElements": 31
            })),
        ),
    }
}

async fn update_partner(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.seen.lock().await.push(Seen::Patch(id.clone(), body.clone()));
    if id == "999" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Partner not found" })),
        );
    }
    if body["email"] == "taken@acme.example" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": { "email": "Email already registered" } })),
        );
    }
    if id == "500" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
    }
    let name = body["partnerName"].as_str().unwrap_or_default();
    let email = body["email"].as_str().unwrap_or_default();
    (StatusCode::OK, Json(partner_json(json!(id), name, email)))
}

async fn list_configs(Path(partner_id): Path<String>) -> Json<Value> {
    if partner_id == "empty" {
        return Json(json!({}));
    }
    Json(json!({
        "loaders": [
            {
                "id": "cfg-1",
                "loaderId": "LDR-1",
                "templateName": "Collections",
                "loaderType": "MFI",
                "uploadedBy": "asha",
                "createdAt": "2025-01-01T10:00:00Z",
                "downloadUrl": "/files/1"
            },
            {
                "name": "Bureau",
                "type": "MFI",
                "createdBy": "ravi",
                "date": "2025-02-10",
                "fileUrl": "/files/2"
            }
        ]
    }))
}

async fn record_multipart(
    state: &ServerState,
    path: String,
    mut multipart: Multipart,
) -> Result<(), StatusCode> {
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => file_name,
            None => field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?,
        };
        fields.push((name, value));
    }
    state.seen.lock().await.push(Seen::Multipart { path, fields });
    Ok(())
}

async fn upload_template(
    State(state): State<ServerState>,
    Path(partner_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    record_multipart(&state, format!("template/{partner_id}"), multipart).await?;
    Ok(Json(json!({ "message": "stored" })))
}

async fn upload_loader_data(
    State(state): State<ServerState>,
    Path((partner_id, config_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<StatusCode, StatusCode> {
    record_multipart(&state, format!("data/{partner_id}/{config_id}"), multipart).await?;
    Ok(StatusCode::OK)
}

async fn download(Path((partner_id, loader_id)): Path<(String, String)>) -> Vec<u8> {
    format!("xlsx:{partner_id}:{loader_id}").into_bytes()
}

async fn spawn_backend() -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/partner", get(list_partners))
        .route("/api/partner/:id", patch(update_partner))
        .route("/api/partners/:partner_id/configs", get(list_configs))
        .route("/api/partners/:partner_id/configs/upload", post(upload_template))
        .route(
            "/api/partners/:partner_id/configs/:config_id/loader-data/upload",
            post(upload_loader_data),
        )
        .route(
            "/api/partners/:partner_id/loader-transformation-configs/:loader_id/download",
            get(download),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn api_for(base_url: &str) -> HttpPartnerApi {
    let settings = ClientSettings {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_millis(300),
        ..ClientSettings::default()
    };
    HttpPartnerApi::new(&settings).expect("client")
}

fn patch_body(name: &str, email: &str) -> PartnerPatchRequest {
    PartnerPatchRequest {
        partner_name: name.into(),
        partner_type: "Corporate".into(),
        email: email.into(),
        contact_number: "9876543210".into(),
        date_of_agreement: "2024-04-01".into(),
        pan: "ABCDE1234F".into(),
    }
}

fn spreadsheet(name: &str) -> UploadFile {
    UploadFile {
        file_name: name.into(),
        mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".into(),
        bytes: b"PK\x03\x04".to_vec(),
    }
}

#[tokio::test]
async fn list_sends_page_size_and_query_and_converts_ids() {
    let (url, state) = spawn_backend().await;
    let api = api_for(&url);

    let page = api
        .list_partners(&PartnerListQuery {
            page: 2,
            size: 10,
            query: "acme co".into(),
        })
        .await
        .expect("list");
    assert_eq!(page.total_elements, 31);
    assert_eq!(page.content[0].id.as_str(), "124");
    assert_eq!(page.content[0].partner_name, "Acme Corporation");

    let seen = state.seen.lock().await;
    let Seen::List(params) = &seen[0] else {
        panic!("expected list request");
    };
    assert_eq!(params.get("page").map(String::as_str), Some("2"));
    assert_eq!(params.get("size").map(String::as_str), Some("10"));
    assert_eq!(params.get("query").map(String::as_str), Some("acme co"));
    assert_eq!(params.len(), 3, "listing sends no sort parameters: {params:?}");
}

#[tokio::test]
async fn malformed_list_body_is_its_own_error_kind() {
    let (url, _state) = spawn_backend().await;
    let err = api_for(&url)
        .list_partners(&PartnerListQuery {
            page: 0,
            size: 10,
            query: "broken".into(),
        })
        .await
        .expect_err("malformed");
    assert!(matches!(err, ClientError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn slow_backend_surfaces_retryable_timeout() {
    let (url, _state) = spawn_backend().await;
    let err = api_for(&url)
        .list_partners(&PartnerListQuery {
            page: 0,
            size: 10,
            query: "slow".into(),
        })
        .await
        .expect_err("timeout");
    assert!(matches!(err, ClientError::Network { timed_out: true, .. }), "{err:?}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let err = api_for(&format!("http://{addr}"))
        .list_loader_configs(&PartnerId::new("124"))
        .await
        .expect_err("refused");
    assert!(matches!(err, ClientError::Network { timed_out: false, .. }), "{err:?}");
}

#[tokio::test]
async fn patch_sends_only_editable_fields() {
    let (url, state) = spawn_backend().await;
    let updated = api_for(&url)
        .update_partner(&PartnerId::new("124"), &patch_body("Acme Corp", "finance@acme.example"))
        .await
        .expect("update");
    assert_eq!(updated.partner_name, "Acme Corp");

    let seen = state.seen.lock().await;
    let Seen::Patch(id, body) = &seen[0] else {
        panic!("expected patch");
    };
    assert_eq!(id, "124");
    let mut keys: Vec<&str> = body
        .as_object()
        .expect("object body")
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["contactNumber", "dateOfAgreement", "email", "pan", "partnerName", "type"]
    );
}

#[tokio::test]
async fn error_statuses_are_classified() {
    let (url, _state) = spawn_backend().await;
    let api = api_for(&url);

    let err = api
        .update_partner(&PartnerId::new("124"), &patch_body("Acme", "taken@acme.example"))
        .await
        .expect_err("field errors");
    let ClientError::ServerValidation(errors) = err else {
        panic!("expected server validation, got {err:?}");
    };
    assert_eq!(errors.get("email"), Some("Email already registered"));

    let err = api
        .update_partner(&PartnerId::new("999"), &patch_body("Ghost", "g@x.io"))
        .await
        .expect_err("missing");
    let ClientError::NotFound(envelope) = err else {
        panic!("expected not found, got {err:?}");
    };
    assert_eq!(envelope.status, Some(404));
    assert_eq!(envelope.method, "PATCH");
    assert_eq!(envelope.message, "Partner not found");
    assert!(envelope.url.ends_with("/api/partner/999"));

    let err = api
        .update_partner(&PartnerId::new("500"), &patch_body("Boom", "b@x.io"))
        .await
        .expect_err("server error");
    let ClientError::Http(envelope) = err else {
        panic!("expected generic failure, got {err:?}");
    };
    assert_eq!(envelope.message, "Request failed with status code 500");
}

#[tokio::test]
async fn loader_configs_map_alias_fields() {
    let (url, _state) = spawn_backend().await;
    let api = api_for(&url);

    let configs = api
        .list_loader_configs(&PartnerId::new("124"))
        .await
        .expect("configs");
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].loader_id, "LDR-1");
    assert_eq!(configs[1].id, "row-1");
    assert_eq!(configs[1].template_name, "Bureau");
    assert_eq!(configs[1].uploaded_by, "ravi");
    assert_eq!(configs[1].created_at.as_deref(), Some("2025-02-10"));
    assert_eq!(configs[1].download_url, "/files/2");

    let empty = api
        .list_loader_configs(&PartnerId::new("empty"))
        .await
        .expect("no loaders key");
    assert!(empty.is_empty());
}

#[tokio::test]
async fn template_upload_posts_file_and_sheet_name() {
    let (url, state) = spawn_backend().await;
    api_for(&url)
        .upload_config_template(&PartnerId::new("124"), "Transformation Config", spreadsheet("map.xlsx"))
        .await
        .expect("upload");

    let seen = state.seen.lock().await;
    assert_eq!(
        seen[0],
        Seen::Multipart {
            path: "template/124".into(),
            fields: vec![
                ("file".into(), "map.xlsx".into()),
                ("sheetName".into(), "Transformation Config".into()),
            ],
        }
    );
}

#[tokio::test]
async fn loader_data_upload_is_scoped_to_config_id() {
    let (url, state) = spawn_backend().await;
    api_for(&url)
        .upload_loader_data(
            &PartnerId::new("124"),
            &ConfigId::new("68dd882d46667987f3297302"),
            spreadsheet("batch-1.xlsx"),
        )
        .await
        .expect("upload");

    let seen = state.seen.lock().await;
    assert_eq!(
        seen[0],
        Seen::Multipart {
            path: "data/124/68dd882d46667987f3297302".into(),
            fields: vec![("file".into(), "batch-1.xlsx".into())],
        }
    );
}

#[tokio::test]
async fn download_returns_raw_bytes() {
    let (url, _state) = spawn_backend().await;
    let bytes = api_for(&url)
        .download_loader_config(&PartnerId::new("124"), "LDR-1")
        .await
        .expect("download");
    assert_eq!(bytes, b"xlsx:124:LDR-1");
}
