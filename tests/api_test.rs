use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use ats_backend::{
    config::Config,
    middleware::{
        auth::{require_bearer_auth, sign_token, Claims},
        guards,
        tenant::require_tenant,
    },
    models::{
        candidate::{Candidate, NewCandidate},
        job::{Job, NewJob},
        user::{Role, User},
    },
    routes::api_router,
    services::{email_service::LogEmailSender, storage_service::LocalStorage},
    store::{memory::MemoryStore, CandidateStore, JobStore, TenantStore},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test_secret_key";

struct TestApp {
    store: Arc<MemoryStore>,
    state: AppState,
    hr: User,
    interviewer: User,
    job: Job,
}

async fn setup() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let tenant = store.insert_tenant("acme", true).await;
    store.insert_tenant("dormant", false).await;
    let hr = store.insert_user(tenant.id, "hr@acme.test", Role::Hr).await;
    let interviewer = store
        .insert_user(tenant.id, "int@acme.test", Role::Interviewer)
        .await;
    let job = store
        .insert_job(NewJob {
            tenant_id: tenant.id,
            title: "Backend Engineer".into(),
            description: "Own the API".into(),
            department: None,
            start_date: None,
            expected_closing_date: None,
            created_by: hr.id,
            assignee_ids: vec![hr.id],
            feedback_template_ids: vec![],
        })
        .await
        .expect("seed job");

    let uploads = std::env::temp_dir().join(format!("ats-api-{}", Uuid::new_v4()));
    let uploads = uploads.to_string_lossy().to_string();
    let config = Config::local(SECRET, &uploads);
    let state = AppState::with_backends(
        store.clone(),
        Arc::new(LogEmailSender),
        Arc::new(LocalStorage::new(&uploads)),
        &config,
    );

    TestApp {
        store,
        state,
        hr,
        interviewer,
        job,
    }
}

impl TestApp {
    fn app(&self) -> Router {
        api_router(self.state.clone(), 10_000)
    }

    async fn candidate(&self, name: &str) -> Candidate {
        self.store
            .insert_candidate(NewCandidate {
                tenant_id: self.job.tenant_id,
                job_id: self.job.id,
                name: name.into(),
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                cv_file_path: "cv.pdf".into(),
                cover_letter_path: None,
                status: "new".into(),
                created_by: Some(self.hr.id),
            })
            .await
            .expect("seed candidate")
    }

    async fn status_of(&self, candidate_id: Uuid) -> String {
        self.store
            .find_candidate(self.job.tenant_id, candidate_id)
            .await
            .expect("lookup")
            .expect("candidate exists")
            .status
    }
}

fn token_for(user: &User) -> String {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role.as_str().to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    sign_token(&claims, SECRET).expect("sign token")
}

fn request(method: &str, uri: &str, tenant: Option<&str>, user: Option<&User>, body: Option<JsonValue>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant);
    }
    if let Some(user) = user {
        builder = builder.header("Authorization", format!("Bearer {}", token_for(user)));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body(res: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn missing_tenant_header_is_rejected() {
    let t = setup().await;
    let res = t
        .app()
        .oneshot(request("GET", "/api/candidates", None, Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["message"], "Tenant ID is required");
}

#[tokio::test]
async fn inactive_or_unknown_tenant_is_forbidden() {
    let t = setup().await;
    for tenant in ["dormant", "nobody"] {
        let res = t
            .app()
            .oneshot(request("GET", "/api/candidates", Some(tenant), Some(&t.hr), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "tenant {}", tenant);
    }
}

#[tokio::test]
async fn tenant_check_is_public() {
    let t = setup().await;
    let res = t
        .app()
        .oneshot(request("GET", "/api/tenants/acme/check", None, None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["isActive"], true);
}

#[tokio::test]
async fn missing_bearer_token_is_unauthorized() {
    let t = setup().await;
    let res = t
        .app()
        .oneshot(request("GET", "/api/candidates", Some("acme"), None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_update_moves_candidate_and_records_history() {
    let t = setup().await;
    let candidate = t.candidate("Ada Lovelace").await;

    let res = t
        .app()
        .oneshot(request(
            "PATCH",
            &format!("/api/candidates/{}/status", candidate.id),
            Some("acme"),
            Some(&t.hr),
            Some(json!({ "status": "shortlisted" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["status"], "shortlisted");
    assert_eq!(t.status_of(candidate.id).await, "shortlisted");

    let res = t
        .app()
        .oneshot(request(
            "GET",
            &format!("/api/candidates/{}/pipeline-history", candidate.id),
            Some("acme"),
            Some(&t.hr),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let history = json_body(res).await;
    let rows = history.as_array().expect("history array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["new_status"], "shortlisted");
}

#[tokio::test]
async fn status_update_on_closed_job_is_blocked() {
    let t = setup().await;
    let candidate = t.candidate("Grace Hopper").await;
    t.store
        .close_job(t.job.tenant_id, t.job.id, Utc::now().date_naive())
        .await
        .expect("close job");

    let res = t
        .app()
        .oneshot(request(
            "PATCH",
            &format!("/api/candidates/{}/status", candidate.id),
            Some("acme"),
            Some(&t.hr),
            Some(json!({ "status": "shortlisted" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["message"], "This job is closed");
    assert_eq!(t.status_of(candidate.id).await, "new");
}

#[tokio::test]
async fn unsupported_bulk_action_leaves_statuses_untouched() {
    let t = setup().await;
    let a = t.candidate("A").await;
    let b = t.candidate("B").await;

    let res = t
        .app()
        .oneshot(request(
            "POST",
            "/api/candidates/bulk-action",
            Some("acme"),
            Some(&t.hr),
            Some(json!({ "candidateIds": [a.id, b.id], "action": "ARCHIVE" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(t.status_of(a.id).await, "new");
    assert_eq!(t.status_of(b.id).await, "new");
    assert_eq!(t.store.history_rows().await.len(), 2);
}

#[tokio::test]
async fn bulk_action_requires_status_permission() {
    let t = setup().await;
    let a = t.candidate("A").await;

    let res = t
        .app()
        .oneshot(request(
            "POST",
            "/api/candidates/bulk-action",
            Some("acme"),
            Some(&t.interviewer),
            Some(json!({ "candidateIds": [a.id], "action": "REJECT" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(t.status_of(a.id).await, "new");
}

#[tokio::test]
async fn attaching_the_same_template_twice_is_rejected() {
    let t = setup().await;
    let candidate = t.candidate("Ada").await;

    let res = t
        .app()
        .oneshot(request(
            "POST",
            "/api/feedback-templates",
            Some("acme"),
            Some(&t.hr),
            Some(json!({
                "name": "Tech screen",
                "type": "technical_interview",
                "questions": [
                    { "question": "Rate the candidate", "type": "rating", "required": true,
                      "minRating": 1, "maxRating": 5 }
                ]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let template_id = json_body(res).await["id"].as_str().expect("template id").to_string();

    let attach = |app: Router| {
        let req = request(
            "POST",
            &format!("/api/candidates/{}/feedback/attach", candidate.id),
            Some("acme"),
            Some(&t.hr),
            Some(json!({ "templateId": template_id })),
        );
        app.oneshot(req)
    };

    let first = attach(t.app()).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = attach(t.app()).await.unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(second).await["message"],
        "Template is already attached to this candidate"
    );
    assert_eq!(t.store.candidate_feedback_rows().await.len(), 1);
}

#[tokio::test]
async fn job_assignment_guard_stops_before_the_handler() {
    let t = setup().await;
    let reached = Arc::new(AtomicBool::new(false));
    let spy = reached.clone();

    let app = Router::new()
        .route(
            "/jobs/:job_id/candidates",
            get(move || {
                let spy = spy.clone();
                async move {
                    spy.store(true, Ordering::SeqCst);
                    StatusCode::OK
                }
            })
            .route_layer(from_fn_with_state(t.state.clone(), guards::job_assignment_layer)),
        )
        .layer(from_fn_with_state(t.state.clone(), require_bearer_auth))
        .layer(from_fn_with_state(t.state.clone(), require_tenant))
        .with_state(t.state.clone());

    let uri = format!("/jobs/{}/candidates", t.job.id);
    let res = app
        .clone()
        .oneshot(request("GET", &uri, Some("acme"), Some(&t.interviewer), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!reached.load(Ordering::SeqCst));

    let res = app
        .oneshot(request("GET", &uri, Some("acme"), Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(reached.load(Ordering::SeqCst));
}

#[tokio::test]
async fn deactivated_tenant_is_refused_on_next_request() {
    let t = setup().await;
    let ok = t
        .app()
        .oneshot(request("GET", "/api/candidates", Some("acme"), Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    t.store.set_tenant_active("acme", false).await.expect("deactivate");
    t.state.tenant_cache.invalidate("acme");

    let res = t
        .app()
        .oneshot(request("GET", "/api/candidates", Some("acme"), Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_from_one_tenant_cannot_act_in_another() {
    let t = setup().await;
    let globex = t.store.insert_tenant("globex", true).await;
    let owner = t.store.insert_user(globex.id, "hr@globex.test", Role::Hr).await;
    let job = t
        .store
        .insert_job(NewJob {
            tenant_id: globex.id,
            title: "Designer".into(),
            description: "Own the UI".into(),
            department: None,
            start_date: None,
            expected_closing_date: None,
            created_by: owner.id,
            assignee_ids: vec![owner.id],
            feedback_template_ids: vec![],
        })
        .await
        .expect("seed job");
    let candidate = t
        .store
        .insert_candidate(NewCandidate {
            tenant_id: globex.id,
            job_id: job.id,
            name: "Linus".into(),
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            cv_file_path: "cv.pdf".into(),
            cover_letter_path: None,
            status: "new".into(),
            created_by: Some(owner.id),
        })
        .await
        .expect("seed candidate");

    let res = t
        .app()
        .oneshot(request("GET", "/api/candidates", Some("globex"), Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = t
        .app()
        .oneshot(request(
            "PATCH",
            &format!("/api/candidates/{}/status", candidate.id),
            Some("globex"),
            Some(&t.hr),
            Some(json!({ "status": "hired" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let still = t
        .store
        .find_candidate(globex.id, candidate.id)
        .await
        .expect("lookup")
        .expect("candidate exists");
    assert_eq!(still.status, "new");

    let res = t
        .app()
        .oneshot(request("GET", "/api/candidates", Some("globex"), Some(&owner), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

fn multipart_request(uri: &str, user: &User, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let boundary = "ats-test-boundary";
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-tenant-id", "acme")
        .header("Authorization", format!("Bearer {}", token_for(user)))
        .header("Content-Type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn comment_with_attachment_round_trip() {
    let t = setup().await;
    let candidate = t.candidate("Ada").await;
    let uri = format!("/api/candidates/{}/comments", candidate.id);

    let res = t
        .app()
        .oneshot(multipart_request(&uri, &t.hr, &[("text", None, "   ")]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["message"], "Text or attachment is required");

    let res = t
        .app()
        .oneshot(multipart_request(
            &uri,
            &t.hr,
            &[
                ("text", None, "Scorecard attached"),
                ("attachment", Some("scorecard.pdf"), "%PDF-1.4 card"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let comment = json_body(res).await;
    assert_eq!(comment["text"], "Scorecard attached");
    assert_eq!(comment["attachment_original_name"], "scorecard.pdf");
    let comment_id = comment["id"].as_str().expect("comment id").to_string();

    let res = t
        .app()
        .oneshot(request("GET", &uri, Some("acme"), Some(&t.interviewer), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await.as_array().map(Vec::len), Some(1));

    let attachment_uri = format!("/api/comments/{}/attachment", comment_id);
    let res = t
        .app()
        .oneshot(request("GET", &attachment_uri, Some("acme"), Some(&t.interviewer), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/pdf");
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&bytes[..], b"%PDF-1.4 card");

    let res = t
        .app()
        .oneshot(request("DELETE", &attachment_uri, Some("acme"), Some(&t.interviewer), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(res).await["message"], "Not authorized to delete this attachment");

    let res = t
        .app()
        .oneshot(request("DELETE", &attachment_uri, Some("acme"), Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["message"], "Attachment deleted successfully");
    assert!(body["comment"]["attachment_path"].is_null());

    let res = t
        .app()
        .oneshot(request("GET", &attachment_uri, Some("acme"), Some(&t.hr), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["message"], "Attachment not found");
}

#[tokio::test]
async fn uploaded_files_have_no_public_path() {
    let t = setup().await;
    let candidate = t.candidate("Ada").await;
    let res = t
        .app()
        .oneshot(request("GET", "/uploads/cv.pdf", None, None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = t
        .app()
        .oneshot(request(
            "GET",
            &format!("/api/candidates/{}/cv", candidate.id),
            Some("acme"),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
