//! End-to-end tests that drive the real router against in-memory stores.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use certforge::{
    clients::{MemoryMailer, UnconfiguredNameSuggester},
    config::Config,
    db::MemoryMetadataStore,
    state::AppState,
    storage::MemoryObjectStore,
};

struct TestApp {
    router: Router,
    mailer: Arc<MemoryMailer>,
    objects: Arc<MemoryObjectStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let mailer = Arc::new(MemoryMailer::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let state = AppState::new(
            config,
            Arc::new(MemoryMetadataStore::new()),
            objects.clone(),
            mailer.clone(),
            Arc::new(UnconfiguredNameSuggester),
        )
        .unwrap();
        Self {
            router: certforge::router(state),
            mailer,
            objects,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Sign up, log in and return the session token.
    async fn session(&self, email: &str) -> String {
        let (status, _) = self
            .json(post_json(
                "/signup",
                json!({ "email": email, "name": "Test User", "password": "hunter2hunter2" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .json(post_json(
                "/login",
                json!({ "email": email, "password": "hunter2hunter2" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn api_key(&self, token: &str) -> String {
        let request = with_bearer(
            post_json("/generate-api-key", json!({ "name": "tests" })),
            token,
        );
        let (status, body) = self.json(request).await;
        assert_eq!(status, StatusCode::CREATED);
        body["apiKey"].as_str().unwrap().to_string()
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

fn with_api_key(mut request: Request<Body>, key: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-api-key", key.parse().unwrap());
    request
}

fn certificate_body() -> Value {
    json!({
        "name": "Ada Lovelace",
        "course": "Analytical Engines",
        "date": "2024-05-01",
        "certificateType": "completion",
        "issuer": "Babbage Institute",
        "signatures": [{ "name": "Charles Babbage" }],
        "template": "modern-minimalist"
    })
}

/// Path and query of an absolute URL, suitable for `oneshot`.
fn local_path(absolute: &str) -> String {
    let url = url::Url::parse(absolute).unwrap();
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[tokio::test]
async fn health_reports_backends() {
    let app = TestApp::new();
    let (status, body) = app.json(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "memory");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn generate_then_verify_then_download() {
    let app = TestApp::new();
    let token = app.session("ada@example.com").await;
    let key = app.api_key(&token).await;

    let (status, generated) = app
        .json(with_api_key(
            post_json("/generate-certificate", certificate_body()),
            &key,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = generated["id"].as_str().unwrap().to_string();
    let url = generated["url"].as_str().unwrap();
    assert!(url.contains(&format!("certificates/{id}.pdf")));

    let (status, verified) = app.json(get(&format!("/verify-certificate/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["isValid"], true);
    assert_eq!(verified["name"], "Ada Lovelace");
    assert_eq!(verified["certificateType"], "completion");
    assert!(verified["pdfUrl"].as_str().unwrap().contains("signature="));

    let response = app.send(get(&local_path(url))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    let pdf = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn tampered_or_unsigned_download_is_forbidden() {
    let app = TestApp::new();
    let token = app.session("sig@example.com").await;
    let key = app.api_key(&token).await;
    let (_, generated) = app
        .json(with_api_key(
            post_json("/generate-certificate", certificate_body()),
            &key,
        ))
        .await;
    let path = local_path(generated["url"].as_str().unwrap());

    let tampered = path.replace(".pdf?", ".json?");
    assert_eq!(app.send(get(&tampered)).await.status(), StatusCode::FORBIDDEN);

    let unsigned = path.split('?').next().unwrap().to_string();
    assert_eq!(app.send(get(&unsigned)).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn generation_is_gated_by_api_key() {
    let app = TestApp::with_config(Config {
        default_api_key_limit: 1,
        ..Config::default()
    });

    let (status, body) = app
        .json(post_json("/generate-certificate", certificate_body()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "API key is required");

    let (status, _) = app
        .json(with_api_key(
            post_json("/generate-certificate", certificate_body()),
            "cf_unknown",
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.session("quota@example.com").await;
    let key = app.api_key(&token).await;

    // a rejected body must not consume the single unit
    let mut invalid = certificate_body();
    invalid["template"] = json!("baroque");
    let (status, body) = app
        .json(with_api_key(post_json("/generate-certificate", invalid), &key))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("baroque"));

    let (status, _) = app
        .json(with_api_key(
            post_json("/generate-certificate", certificate_body()),
            &key,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(with_api_key(
            post_json("/generate-certificate", certificate_body()),
            &key,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_request_never_reaches_storage() {
    let app = TestApp::new();
    let token = app.session("nowrite@example.com").await;
    let key = app.api_key(&token).await;

    let mut bodies = Vec::new();
    for field in ["name", "course", "date", "certificateType", "issuer", "template"] {
        let mut missing = certificate_body();
        missing.as_object_mut().unwrap().remove(field);
        bodies.push((field.to_string(), missing));

        let mut blank = certificate_body();
        blank[field] = json!("   ");
        bodies.push((format!("blank {field}"), blank));
    }
    let mut unknown_template = certificate_body();
    unknown_template["template"] = json!("baroque");
    bodies.push(("unknown template".to_string(), unknown_template));

    for (case, body) in bodies {
        let (status, _) = app
            .json(with_api_key(post_json("/generate-certificate", body), &key))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
    }

    assert_eq!(app.objects.put_calls.load(Ordering::Relaxed), 0);
    assert!(app.objects.keys().await.is_empty());

    let (_, listed) = app.json(with_bearer(get("/get-api-keys"), &token)).await;
    assert_eq!(listed["apiKeys"][0]["usageCount"], 0);
}

#[tokio::test]
async fn unknown_certificate_is_invalid() {
    let app = TestApp::new();
    for id in ["not-a-uuid", "00000000-0000-0000-0000-000000000000"] {
        let (status, body) = app.json(get(&format!("/verify-certificate/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["isValid"], false);
        assert_eq!(body["error"], "Certificate not found");
    }
}

#[tokio::test]
async fn template_crud_round_trip() {
    let app = TestApp::new();
    let template = json!({
        "name": "Workshop",
        "description": "Two-day workshop layout",
        "orientation": "landscape",
        "size": "A4",
        "backgroundColor": "#ffffff",
        "elements": [{
            "type": "text",
            "content": "{name}",
            "position": { "x": 10, "y": 20 },
            "size": { "width": 200, "height": 40.5 },
            "dynamicField": "name",
            "rotation": 45,
            "zIndex": 2
        }]
    });

    let (status, saved) = app.json(post_json("/save-template", template.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["success"], true);
    let id = saved["templateId"].as_str().unwrap().to_string();

    let (status, mut loaded) = app.json(get(&format!("/get-template/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["id"], id.as_str());
    let object = loaded.as_object_mut().unwrap();
    for server_key in ["id", "createdAt", "updatedAt"] {
        assert!(object.remove(server_key).is_some(), "{server_key} missing");
    }
    assert_eq!(loaded, template);

    let (_, listed) = app.json(get("/get-templates")).await;
    assert_eq!(listed["templates"].as_array().unwrap().len(), 1);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/delete-template/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.json(delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.json(get(&format!("/get-template/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preflight_answers_no_content() {
    let app = TestApp::new();
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/save-template")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.send(preflight).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(
        response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS)
    );
}

#[tokio::test]
async fn malformed_json_uses_error_shape() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn account_routes_require_a_session() {
    let app = TestApp::new();
    let (status, body) = app.json(get("/get-user-data")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "Missing bearer token");

    let (status, _) = app
        .json(with_bearer(get("/get-user-data"), "not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.session("me@example.com").await;
    let (status, body) = app.json(with_bearer(get("/get-user-data"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["generations"], json!([]));
}

#[tokio::test]
async fn duplicate_signup_conflicts_and_bad_login_is_unauthorized() {
    let app = TestApp::new();
    app.session("dup@example.com").await;

    let (status, _) = app
        .json(post_json(
            "/signup",
            json!({ "email": "DUP@example.com", "name": "Again", "password": "hunter2hunter2" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(post_json(
            "/login",
            json!({ "email": "dup@example.com", "password": "wrong password" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_with_mailed_otp() {
    let app = TestApp::new();
    app.session("reset@example.com").await;

    let (status, _) = app
        .json(post_json("/send-otp", json!({ "email": "reset@example.com" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    let otp: String = sent[0]
        .text
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == 6)
        .unwrap()
        .to_string();

    let (status, _) = app
        .json(post_json(
            "/reset-password",
            json!({ "email": "reset@example.com", "otp": "000000x", "newPassword": "new password 1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(post_json(
            "/reset-password",
            json!({ "email": "reset@example.com", "otp": otp, "newPassword": "new password 1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(post_json(
            "/login",
            json!({ "email": "reset@example.com", "password": "new password 1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_key_management() {
    let app = TestApp::new();
    let token = app.session("keys@example.com").await;
    let key = app.api_key(&token).await;
    assert!(key.starts_with("cf_"));

    let (_, listed) = app.json(with_bearer(get("/get-api-keys"), &token)).await;
    assert_eq!(listed["apiKeys"].as_array().unwrap().len(), 1);
    assert_eq!(listed["apiKeys"][0]["usageCount"], 0);
    assert_eq!(listed["apiKeys"][0]["limit"], 100);

    let (status, rotated) = app
        .json(with_bearer(
            post_json("/regenerate-api-key", json!({ "apiKey": key })),
            &token,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_key = rotated["apiKey"].as_str().unwrap().to_string();
    assert_ne!(new_key, key);

    // another user cannot delete it
    let intruder = app.session("intruder@example.com").await;
    let delete = |token: &str, key: &str| {
        let mut request = post_json("/delete-api-key", json!({ "apiKey": key }));
        *request.method_mut() = Method::DELETE;
        with_bearer(request, token)
    };
    let (status, _) = app.json(delete(&intruder, &new_key)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.json(delete(&token, &new_key)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listed) = app.json(with_bearer(get("/get-api-keys"), &token)).await;
    assert_eq!(listed["apiKeys"], json!([]));
}

fn multipart(fields: &[(&str, &str)], boundary: &str) -> Body {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    Body::from(body)
}

#[tokio::test]
async fn bulk_generation_completes_with_archive() {
    let app = TestApp::new();
    let token = app.session("bulk@example.com").await;
    let key = app.api_key(&token).await;

    let boundary = "certforge-test-boundary";
    let body = multipart(
        &[
            ("course", "Analytical Engines"),
            ("date", "2024-05-01"),
            ("certificateType", "participation"),
            ("issuer", "Babbage Institute"),
            ("template", "vibrant-achievement"),
            ("signatures", r#"[{"name":"Charles Babbage"}]"#),
            ("names", "Ada Lovelace\nGrace Hopper"),
        ],
        boundary,
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate-bulk-certificates")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("x-api-key", &key)
        .body(body)
        .unwrap();

    let (status, accepted) = app.json(request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["total"], 2);
    let generation_id = accepted["generationId"].as_str().unwrap().to_string();

    let mut last = Value::Null;
    for _ in 0..200 {
        let (status, body) = app
            .json(with_bearer(
                get(&format!("/bulk-generation/{generation_id}")),
                &token,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        last = body;
        if last["status"] == "completed" || last["status"] == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(last["status"], "completed", "generation: {last}");

    let download = local_path(last["downloadUrl"].as_str().unwrap());
    let response = app.send(get(&download)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let archive = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let zip = zip::ZipArchive::new(std::io::Cursor::new(archive.to_vec())).unwrap();
    let mut entries: Vec<_> = zip.file_names().map(str::to_string).collect();
    entries.sort();
    assert_eq!(
        entries,
        ["Ada Lovelace_certificate.pdf", "Grace Hopper_certificate.pdf"]
    );

    // the owner's dashboard lists it, another user cannot see it
    let (_, me) = app.json(with_bearer(get("/get-user-data"), &token)).await;
    assert_eq!(me["generations"][0]["generationId"], generation_id.as_str());

    let other = app.session("other@example.com").await;
    let (status, _) = app
        .json(with_bearer(
            get(&format!("/bulk-generation/{generation_id}")),
            &other,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_without_names_is_rejected() {
    let app = TestApp::new();
    let token = app.session("empty@example.com").await;
    let key = app.api_key(&token).await;

    let boundary = "b";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate-bulk-certificates")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("x-api-key", &key)
        .body(multipart(
            &[
                ("course", "C"),
                ("date", "D"),
                ("certificateType", "completion"),
                ("issuer", "I"),
                ("template", "classic"),
            ],
            boundary,
        ))
        .unwrap();
    let (status, body) = app.json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No names provided");
}
