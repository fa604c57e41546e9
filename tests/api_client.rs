//! End-to-end client tests against an in-process fake backend.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use velo::net::api::{ApiClient, HttpTimeouts};
use velo::net::types::{Credentials, Role, Vehicle};
use velo::services::rides::RideDraft;
use velo::services::{ServiceError, driver, rides, users, vehicles};
use velo::state::auth::{AuthError, AuthStore, SNAPSHOT_KEY, TOKEN_KEY};
use velo::state::session::SessionPatch;
use velo::state::storage::{FileStore, KeyValueStore};

// =============================================================================
// FAKE BACKEND
// =============================================================================

/// One request as the backend received it.
#[derive(Clone, Debug)]
struct Seen {
    method: String,
    path: String,
    auth: String,
    body: Value,
}

#[derive(Clone, Default)]
struct Backend {
    auth_headers: Arc<Mutex<Vec<String>>>,
    profile_updates: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<Seen>>>,
}

impl Backend {
    fn requests(&self) -> Vec<Seen> {
        self.requests.lock().unwrap().clone()
    }

    fn last_request(&self) -> Seen {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn seen_headers(&self) -> Vec<String> {
        self.auth_headers.lock().unwrap().clone()
    }

    /// Record the `Authorization` header and check it against `accepted`.
    fn authorized(&self, headers: &HeaderMap, accepted: &[&str]) -> bool {
        let value = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let ok = accepted.contains(&value.as_str());
        self.auth_headers.lock().unwrap().push(value);
        ok
    }

    fn last_header(&self) -> String {
        self.auth_headers.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

const ANA: &[&str] = &["Bearer tok123"];
const ANYONE: &[&str] = &["Bearer tok123", "Bearer xyz"];

async fn login(Json(body): Json<Value>) -> Response {
    match (body["usuario"].as_str(), body["senha"].as_str()) {
        (Some("a@b.com"), Some("secret1")) => Json(json!({
            "id": 7,
            "nome": "Ana",
            "usuario": "a@b.com",
            "foto": null,
            "token": "tok123",
        }))
        .into_response(),
        (Some("carlos@b.com"), Some("secret1")) => Json(json!({
            "id": 8,
            "nome": "Carlos",
            "usuario": "carlos@b.com",
            "tipoUsuario": "MOTORISTA",
            "token": "Bearer xyz",
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn user(State(backend): State<Backend>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers, ANA) || id != 7 {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": 7, "nome": "Ana", "usuario": "a@b.com", "tipoUsuario": "PASSAGEIRO" })).into_response()
}

async fn update_user(State(backend): State<Backend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !backend.authorized(&headers, ANA) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    backend.profile_updates.lock().unwrap().push(body.clone());
    Json(body).into_response()
}

async fn vehicles_list(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers, ANYONE) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        { "id": 1, "fabricante": "Toyota", "modelo": "Corolla", "ano": 2020, "cor": "Prata", "placa": "ABC1D23" },
        { "id": 2, "fabricante": "Honda", "modelo": "Civic", "ano": 2019.0, "cor": null, "placa": "XYZ9K87" },
    ]))
    .into_response()
}

async fn rides_list(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers, ANA) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        { "id": 10, "titulo": "Centro", "tempoMinutos": 18.0, "categoria": { "id": 2 } },
        { "id": 11, "titulo": "Praia", "categoria": { "id": 99, "modelo": "?" } },
    ]))
    .into_response()
}

async fn ride_delete() -> StatusCode {
    StatusCode::FORBIDDEN
}

fn with_id(mut body: Value, id: i64) -> Value {
    body["id"] = json!(id);
    body
}

/// Records the request, then answers like the backend would for that route.
async fn recorded(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !backend.authorized(&headers, ANYONE) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    backend.requests.lock().unwrap().push(Seen {
        method: method.to_string(),
        path: uri.path().to_owned(),
        auth: backend.last_header(),
        body: body.clone(),
    });

    match (method.as_str(), uri.path()) {
        ("POST", "/categorias") => Json(with_id(body, 3)).into_response(),
        ("POST", "/produtos") => Json(with_id(body, 12)).into_response(),
        ("PUT", "/categorias" | "/produtos") => Json(body).into_response(),
        ("GET", "/categorias/2") => Json(json!({
            "id": 2, "fabricante": "Honda", "modelo": "Civic", "ano": 2019, "cor": "Preto", "placa": "XYZ9K87",
        }))
        .into_response(),
        ("GET", "/produtos/10") => Json(json!({
            "id": 10, "titulo": "Centro", "tempoMinutos": 18, "ativo": false, "categoria": { "id": 2 },
        }))
        .into_response(),
        ("GET", "/motoristas/8/dashboard") => Json(json!({
            "ganhosHoje": 152.5, "viagensHoje": 6, "avaliacao": 4.9, "veiculo": "Toyota Corolla", "online": true,
        }))
        .into_response(),
        // Nothing queued: 200 with an empty body.
        ("GET", "/motoristas/8/proxima-viagem") => StatusCode::OK.into_response(),
        ("GET", _) => StatusCode::NOT_FOUND.into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/usuarios/logar", post(login))
        .route("/usuarios/atualizar", put(update_user))
        .route("/usuarios/{id}", get(user))
        .route("/categorias", get(vehicles_list).post(recorded).put(recorded))
        .route("/categorias/{id}", get(recorded).delete(recorded))
        .route("/produtos", get(rides_list).post(recorded).put(recorded))
        .route("/produtos/{id}", get(recorded).delete(ride_delete))
        .route("/motoristas/{id}/dashboard", get(recorded))
        .route("/motoristas/{id}/proxima-viagem", get(recorded))
        .route("/motoristas/{id}/status", put(recorded))
        .route("/viagens/{id}/iniciar", put(recorded))
        .route("/viagens/{id}/cancelar", put(recorded))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), backend)
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, HttpTimeouts { request_secs: Some(10), connect_secs: Some(5) }).unwrap()
}

fn store_in(api: &ApiClient, dir: &std::path::Path) -> AuthStore {
    AuthStore::new(Arc::new(api.clone()), Arc::new(FileStore::new(dir)))
}

// =============================================================================
// SESSION LIFECYCLE
// =============================================================================

#[tokio::test]
async fn login_backfills_role_and_survives_restart() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());

    let session = store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    assert_eq!(session.id(), 7);
    assert_eq!(session.name(), "Ana");

    store.settle().await;
    assert_eq!(store.role().await, Role::Passenger);
    assert_eq!(backend.seen_headers(), vec!["Bearer tok123".to_owned()]);

    let restarted = store_in(&api, dir.path());
    assert!(restarted.initialize().await);
    assert_eq!(restarted.session().await, store.session().await);
    assert!(restarted.is_passenger().await);

    let raw_snapshot = std::fs::read_to_string(dir.path().join(SNAPSHOT_KEY)).unwrap();
    assert!(!raw_snapshot.contains("secret1"));
    assert!(!raw_snapshot.contains("tok123"));
}

#[tokio::test]
async fn wrong_password_leaves_no_session_behind() {
    let (base_url, _backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());

    let err = store.login(&Credentials::new("a@b.com", "nope")).await.unwrap_err();

    assert!(matches!(err, AuthError::InconsistentUserData(_)));
    assert!(!store.is_authenticated().await);
    let files = FileStore::new(dir.path());
    assert_eq!(files.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(files.get(SNAPSHOT_KEY).unwrap(), None);
}

#[tokio::test]
async fn prefixed_token_is_not_prefixed_twice() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());

    store.login(&Credentials::new("carlos@b.com", "secret1")).await.unwrap();
    assert!(store.is_driver().await);

    let list = vehicles::list(&api, &store).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(backend.last_header(), "Bearer xyz");
}

// =============================================================================
// SERVICES
// =============================================================================

#[tokio::test]
async fn ride_list_joins_full_vehicles() {
    let (base_url, _backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();

    let list = rides::list(&api, &store).await.unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(list[0].vehicle.as_ref().unwrap().model, "Civic");
    assert_eq!(list[0].duration_minutes, 18);
    assert_eq!(list[1].vehicle.as_ref().unwrap().model, "?");
    assert!(list[1].active);
}

#[tokio::test]
async fn vehicle_save_posts_new_and_puts_existing() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    store.settle().await;

    let mut vehicle = Vehicle {
        id: 0,
        manufacturer: "Fiat".to_owned(),
        model: "Uno".to_owned(),
        year: 2015,
        color: "Branco".to_owned(),
        plate: "FIA7T00".to_owned(),
    };
    let created = vehicles::save(&api, &store, &vehicle).await.unwrap();
    assert_eq!(created.id, 3);
    assert_eq!(created.plate, "FIA7T00");

    vehicle.id = 3;
    vehicle.color = "Vermelho".to_owned();
    let updated = vehicles::save(&api, &store, &vehicle).await.unwrap();
    assert_eq!(updated.color, "Vermelho");

    let seen = backend.requests();
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].method.as_str(), seen[0].path.as_str()), ("POST", "/categorias"));
    assert_eq!(seen[0].body["id"], 0);
    assert_eq!(seen[0].body["fabricante"], "Fiat");
    assert_eq!(seen[0].body["ano"], 2015);
    assert_eq!((seen[1].method.as_str(), seen[1].path.as_str()), ("PUT", "/categorias"));
    assert_eq!(seen[1].body["id"], 3);
    assert_eq!(seen[1].body["cor"], "Vermelho");
    assert!(seen.iter().all(|r| r.auth == "Bearer tok123"));
}

#[tokio::test]
async fn vehicle_get_and_delete_hit_the_item_path() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    store.settle().await;

    let vehicle = vehicles::get(&api, &store, 2).await.unwrap();
    assert_eq!(vehicle.summary(), "Honda Civic - 2019 - Preto - XYZ9K87");

    vehicles::delete(&api, &store, 2).await.unwrap();

    let seen = backend.requests();
    assert_eq!((seen[0].method.as_str(), seen[0].path.as_str()), ("GET", "/categorias/2"));
    assert_eq!((seen[1].method.as_str(), seen[1].path.as_str()), ("DELETE", "/categorias/2"));
    assert_eq!(seen[1].body, Value::Null);
    assert_eq!(seen[1].auth, "Bearer tok123");
}

#[tokio::test]
async fn ride_save_posts_new_and_puts_existing() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    store.settle().await;

    let mut draft = RideDraft {
        title: "Centro".to_owned(),
        origin: "Casa".to_owned(),
        destination: "Centro".to_owned(),
        price: 25.0,
        distance_km: 12.0,
        average_speed_kmh: 40.0,
        date: "2026-10-20T08:30".to_owned(),
        vehicle_id: 2,
        ..RideDraft::default()
    };
    let created = rides::save(&api, &store, &draft).await.unwrap();
    assert_eq!(created.id, 12);
    assert_eq!(created.duration_minutes, 18);

    draft.id = 12;
    draft.active = false;
    rides::save(&api, &store, &draft).await.unwrap();

    let seen = backend.requests();
    assert_eq!(seen.len(), 2);
    let post = &seen[0];
    assert_eq!((post.method.as_str(), post.path.as_str()), ("POST", "/produtos"));
    assert_eq!(post.auth, "Bearer tok123");
    assert_eq!(post.body["id"], 0);
    assert_eq!(post.body["tempoMinutos"], 18);
    assert_eq!(post.body["data"], "2026-10-20T08:30:00Z");
    assert_eq!(post.body["categoria"], json!({ "id": 2 }));
    assert_eq!(post.body["usuario"], json!({ "id": 7 }));
    assert_eq!(post.body["ativo"], true);
    let put = &seen[1];
    assert_eq!((put.method.as_str(), put.path.as_str()), ("PUT", "/produtos"));
    assert_eq!(put.body["id"], 12);
    assert_eq!(put.body["ativo"], false);
}

#[tokio::test]
async fn ride_get_reads_the_item_path() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    store.settle().await;

    let ride = rides::get(&api, &store, 10).await.unwrap();

    assert_eq!(ride.title, "Centro");
    assert_eq!(ride.duration_minutes, 18);
    assert!(!ride.active);
    assert_eq!(ride.vehicle.unwrap().id, 2);
    let seen = backend.last_request();
    assert_eq!((seen.method.as_str(), seen.path.as_str()), ("GET", "/produtos/10"));
    assert_eq!(seen.auth, "Bearer tok123");
}

#[tokio::test]
async fn profile_update_sends_defaults_and_merges_locally() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    store.settle().await;

    let patch = SessionPatch { name: Some("Ana Maria".to_owned()), ..SessionPatch::default() };
    let session = users::update_profile(&api, &store, &patch).await.unwrap();

    assert_eq!(session.name(), "Ana Maria");
    assert_eq!(session.token(), "tok123");
    let sent = backend.profile_updates.lock().unwrap().last().cloned().unwrap();
    assert_eq!(sent["nome"], "Ana Maria");
    assert_eq!(sent["tipoUsuario"], "PASSAGEIRO");
    assert_eq!(sent["sexo"], "M");
    assert_eq!(sent["produto"], json!([]));
    assert!(sent.get("senha").is_none());
}

#[tokio::test]
async fn forbidden_response_reads_as_expired_session() {
    let (base_url, _backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();

    let err = rides::delete(&api, &store, 10).await.unwrap_err();

    assert!(err.is_session_expired());
    store.logout().await;
    assert!(!store.is_authenticated().await);
}

#[tokio::test]
async fn services_refuse_without_session() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());

    let err = vehicles::list(&api, &store).await.unwrap_err();

    assert!(matches!(err, ServiceError::NotAuthenticated));
    assert!(backend.seen_headers().is_empty());
}

// =============================================================================
// DRIVER
// =============================================================================

#[tokio::test]
async fn driver_overview_reads_dashboard_and_empty_next_trip() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("carlos@b.com", "secret1")).await.unwrap();

    let overview = driver::overview(&api, &store).await.unwrap();

    assert_eq!(overview.dashboard.trips_today, 6);
    assert!((overview.dashboard.earnings_today - 152.5).abs() < f64::EPSILON);
    assert_eq!(overview.dashboard.vehicle, "Toyota Corolla");
    assert!(overview.dashboard.online);
    assert_eq!(overview.next_trip, None);

    let seen = backend.requests();
    let paths: Vec<_> = seen.iter().map(|r| (r.method.as_str(), r.path.as_str())).collect();
    assert_eq!(paths, vec![("GET", "/motoristas/8/dashboard"), ("GET", "/motoristas/8/proxima-viagem")]);
    assert!(seen.iter().all(|r| r.auth == "Bearer xyz"));
}

#[tokio::test]
async fn driver_status_and_trip_transitions_put_expected_bodies() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("carlos@b.com", "secret1")).await.unwrap();

    driver::set_online(&api, &store, false).await.unwrap();
    driver::start_trip(&api, &store, 5).await.unwrap();
    driver::cancel_trip(&api, &store, 6).await.unwrap();

    let seen = backend.requests();
    assert_eq!(seen.len(), 3);
    assert_eq!((seen[0].method.as_str(), seen[0].path.as_str()), ("PUT", "/motoristas/8/status"));
    assert_eq!(seen[0].body, json!({ "online": false }));
    assert_eq!((seen[1].method.as_str(), seen[1].path.as_str()), ("PUT", "/viagens/5/iniciar"));
    assert_eq!(seen[1].body, json!({}));
    assert_eq!((seen[2].method.as_str(), seen[2].path.as_str()), ("PUT", "/viagens/6/cancelar"));
    assert_eq!(seen[2].body, json!({}));
    assert!(seen.iter().all(|r| r.auth == "Bearer xyz"));
}

#[tokio::test]
async fn passenger_is_refused_before_driver_requests_go_out() {
    let (base_url, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let api = client(&base_url);
    let store = store_in(&api, dir.path());
    store.login(&Credentials::new("a@b.com", "secret1")).await.unwrap();
    store.settle().await;

    let err = driver::start_trip(&api, &store, 5).await.unwrap_err();

    assert!(matches!(err, ServiceError::DriverOnly));
    assert!(backend.requests().is_empty());
}
