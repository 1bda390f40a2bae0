//! Router-level tests of the generated surfaces. Every request here is decided
//! before the database is reached, so the pool is created lazily and never connects.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kernel_sdk::config::{EntityConfig, FieldConfig, KernelConfig, ResolvedModel, RouteKind};
use kernel_sdk::extractors::USER_ID_HEADER;
use kernel_sdk::{app, resolve, AppState, InMemoryPermissionBackend, Routable, Settings, User};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const MEMBER: &str = "2";
const STAFF: &str = "3";
const VIEWER: &str = "4";

fn model() -> ResolvedModel {
    let unit = EntityConfig {
        rest: true,
        admin: true,
        export: true,
        ..EntityConfig::new("Unit", "catalog")
    }
    .field(FieldConfig::char("name", 60));
    let hidden = EntityConfig::new("Secret", "vault").field(FieldConfig::char("code", 10));
    resolve(
        &KernelConfig {
            entities: vec![unit, hidden],
        },
        "kernel",
    )
    .unwrap()
}

fn router() -> Router {
    let permissions = InMemoryPermissionBackend::new()
        .with_user(User::new(2, "member@example.com"), Vec::<String>::new())
        .with_user(User::new(3, "staff@example.com").staff(), Vec::<String>::new())
        .with_user(
            User::new(4, "viewer@example.com").staff(),
            ["catalog.view_unit", "catalog.add_unit"],
        );
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/kernel_test")
        .unwrap();
    app(AppState::new(pool, model(), Arc::new(permissions), Settings::default()))
}

fn request(method: Method, uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header(USER_ID_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = router().oneshot(request(Method::GET, "/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn anonymous_site_list_redirects_to_login() {
    let response = router().oneshot(request(Method::GET, "/unit/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=/unit/");
}

#[tokio::test]
async fn redirect_keeps_the_query_string() {
    let response = router()
        .oneshot(request(Method::GET, "/unit/?page=2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=/unit/%3Fpage%3D2");
}

#[tokio::test]
async fn anonymous_write_is_redirected_before_the_body_is_read() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/unit/new")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = router().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=/unit/new");
}

#[tokio::test]
async fn authenticated_without_permission_is_forbidden() {
    for uri in ["/unit/", "/unit/new", "/unit/1/edit", "/unit/1/delete", "/unit/export"] {
        let response = router().oneshot(request(Method::GET, uri, Some(MEMBER))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

/// Concrete path and methods of every site route of `Unit`.
fn unit_routes() -> Vec<(Method, String)> {
    let model = model();
    let unit = model.entity_by_name("Unit").unwrap();
    let mut routes = Vec::new();
    for entry in unit.url_entries() {
        let key = if entry.kind == RouteKind::Detail { "1.html" } else { "1" };
        let path = entry.pattern.replace(":key", key);
        routes.push((Method::GET, path.clone()));
        if matches!(entry.kind, RouteKind::Create | RouteKind::Update | RouteKind::Delete) {
            routes.push((Method::POST, path));
        }
    }
    routes
}

#[tokio::test]
async fn every_site_route_is_gated() {
    let routes = unit_routes();
    assert_eq!(routes.len(), 10);
    for (method, path) in routes {
        let response = router().oneshot(request(method.clone(), &path, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND, "{} {}", method, path);
        assert_eq!(location(&response), format!("/login/?next={}", path), "{} {}", method, path);

        let response = router().oneshot(request(method.clone(), &path, Some(MEMBER))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, path);
    }
}

#[tokio::test]
async fn undecodable_keys_are_gated_first() {
    for (method, path) in [
        (Method::GET, "/unit/%FF.html"),
        (Method::GET, "/unit/%FF/edit"),
        (Method::POST, "/unit/%FF/edit"),
        (Method::GET, "/unit/%FF/delete"),
        (Method::POST, "/unit/%FF/delete"),
        (Method::GET, "/unit/%FF/export"),
    ] {
        let response = router().oneshot(request(method.clone(), path, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND, "{} {}", method, path);

        let response = router().oneshot(request(method.clone(), path, Some(MEMBER))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, path);
    }
}

#[tokio::test]
async fn forbidden_body_names_the_permission() {
    let response = router()
        .oneshot(request(Method::GET, "/unit/1/delete", Some(VIEWER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("catalog.delete_unit"));
}

#[tokio::test]
async fn anonymous_export_redirects() {
    let response = router()
        .oneshot(request(Method::GET, "/unit/export?export=csv", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=/unit/export%3Fexport%3Dcsv");
}

#[tokio::test]
async fn rest_anonymous_is_unauthorized() {
    let response = router()
        .oneshot(request(Method::GET, "/api/kernel/unit", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rest_without_permission_is_forbidden() {
    let response = router()
        .oneshot(request(Method::DELETE, "/api/kernel/unit/1", Some(MEMBER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rest_unknown_or_unexposed_entity_is_not_found() {
    for uri in ["/api/kernel/nothing", "/api/kernel/secret"] {
        let response = router().oneshot(request(Method::GET, uri, Some(STAFF))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn admin_requires_staff() {
    for user in [None, Some(MEMBER)] {
        let response = router()
            .oneshot(request(Method::GET, "/admin/catalog/unit/", user))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login/?next=/admin/catalog/unit/");
    }
}

#[tokio::test]
async fn admin_staff_without_permission_is_forbidden() {
    let response = router()
        .oneshot(request(Method::GET, "/admin/catalog/unit/", Some(STAFF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_index_lists_permitted_entities() {
    let response = router()
        .oneshot(request(Method::GET, "/admin/", Some(VIEWER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let units = &body["data"]["catalog"][0];
    assert_eq!(units["model_name"], "unit");
    assert_eq!(units["url"], "/admin/catalog/unit/");
    assert_eq!(units["perms"]["view"], true);
    assert_eq!(units["perms"]["add"], true);
    assert_eq!(units["perms"]["delete"], false);
    assert!(body["data"].get("vault").is_none());

    let response = router()
        .oneshot(request(Method::GET, "/admin/", Some(STAFF)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"], serde_json::json!({}));
}

#[tokio::test]
async fn admin_index_redirects_non_staff() {
    let response = router()
        .oneshot(request(Method::GET, "/admin/", Some(MEMBER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=/admin/");
}
