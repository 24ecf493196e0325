use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const API_KEY_HEADER: &str = "API-KEY";
pub const INVALID_API_KEY_MESSAGE: &str = "API key missing or invalid!";
pub const RATE_LIMIT_MESSAGE: &str = "API request limit exceeded, please slow down";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub error: bool,
    pub code: u16,
    pub message: Option<String>,
    pub data: Option<Value>,
}

#[derive(Deserialize)]
pub struct Upload {
    pub data: String,
}

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub api_key: String,
    /// Every request past this count is answered with 429.
    pub request_limit: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            api_key: "test-key".to_string(),
            request_limit: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Version {
    pub version: String,
    #[serde(skip)]
    pub xml: String,
    #[serde(skip)]
    pub json: Value,
    #[serde(skip)]
    pub configs: Vec<u8>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Pack {
    pub name: String,
    pub description: String,
    pub visibility: String,
    pub versions: BTreeMap<String, Version>,
    #[serde(skip)]
    pub files: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    pub allowed_players: BTreeSet<String>,
    pub testers: BTreeSet<String>,
}

impl Pack {
    fn summary(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "type": self.visibility,
            "versions": self.versions.keys().collect::<Vec<_>>(),
        })
    }
}

pub struct Store {
    pub packs: BTreeMap<String, Pack>,
    pub downloads: BTreeMap<&'static str, u64>,
}

impl Store {
    /// One public pack `Foo` with version `1.0.0` and one private pack `Bar`.
    pub fn seeded() -> Self {
        let foo_version = Version {
            version: "1.0.0".to_string(),
            xml: "<version>1.0.0</version>".to_string(),
            json: json!({"version": "1.0.0", "mods": []}),
            configs: b"PK\x03\x04".to_vec(),
        };
        let foo = Pack {
            name: "Foo".to_string(),
            description: "Test pack".to_string(),
            visibility: "public".to_string(),
            versions: BTreeMap::from([(foo_version.version.clone(), foo_version)]),
            files: BTreeMap::from([(
                "mods".to_string(),
                BTreeMap::from([("example.jar".to_string(), vec![0xca, 0xfe, 0xba, 0xbe])]),
            )]),
            allowed_players: BTreeSet::from(["alice".to_string()]),
            testers: BTreeSet::from(["bob".to_string()]),
        };
        let bar = Pack {
            name: "Bar".to_string(),
            description: "Private pack".to_string(),
            visibility: "private".to_string(),
            versions: BTreeMap::new(),
            files: BTreeMap::new(),
            allowed_players: BTreeSet::new(),
            testers: BTreeSet::new(),
        };

        Self {
            packs: BTreeMap::from([(foo.name.clone(), foo), (bar.name.clone(), bar)]),
            downloads: BTreeMap::from([("exe", 120), ("jar", 80), ("zip", 15)]),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    config: Arc<MockConfig>,
    requests: Arc<AtomicUsize>,
}

impl AppState {
    fn new(config: MockConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::seeded())),
            config: Arc::new(config),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }
}

type Reply = (StatusCode, Json<Envelope>);

fn ok(data: Value) -> Reply {
    (
        StatusCode::OK,
        Json(Envelope {
            error: false,
            code: 200,
            message: None,
            data: Some(data),
        }),
    )
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (
        status,
        Json(Envelope {
            error: true,
            code: status.as_u16(),
            message: Some(message.to_string()),
            data: None,
        }),
    )
}

fn not_found(what: &str) -> Reply {
    fail(StatusCode::NOT_FOUND, &format!("{what} not found"))
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let state = AppState::new(config);

    Router::new()
        .route("/", get(heartbeat))
        .route("/v1/pack/{name}", get(pack))
        .route("/v1/pack/{name}/{version}", get(pack_version))
        .route("/v1/packs/simple", get(packs_simple))
        .route("/v1/packs/full/{visibility}", get(packs_full))
        .route("/v1/stats/downloads/{kind}", get(download_stats))
        .route("/v1/admin/packs", get(admin_packs))
        .route("/v1/admin/pack/{pack}", get(admin_pack))
        .route(
            "/v1/admin/pack/{pack}/file/{folder}/{filename}",
            get(get_file).put(put_file).delete(delete_file),
        )
        .route("/v1/admin/pack/{pack}/files/{folder}", get(list_files))
        .route("/v1/admin/pack/{pack}/versions/{version}", get(version_info))
        .route(
            "/v1/admin/pack/{pack}/versions/{version}/xml",
            get(get_version_xml).put(put_version_xml),
        )
        .route("/v1/admin/pack/{pack}/versions/{version}/json", get(get_version_json))
        .route(
            "/v1/admin/pack/{pack}/versions/{version}/configs",
            get(get_version_configs).put(put_version_configs),
        )
        .route(
            "/v1/admin/pack/{pack}/settings/{list}",
            get(get_players).post(add_players).delete(remove_players),
        )
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let seen = state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(method = %request.method(), uri = %request.uri(), seen, "request");
    if state.config.request_limit.is_some_and(|limit| seen > limit) {
        return fail(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
    }
    next.run(request).await
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Reply> {
    let key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if key == Some(state.config.api_key.as_str()) {
        Ok(())
    } else {
        Err(fail(StatusCode::UNAUTHORIZED, INVALID_API_KEY_MESSAGE))
    }
}

fn decode(data: &str) -> Result<Vec<u8>, Reply> {
    STANDARD
        .decode(data)
        .map_err(|_| fail(StatusCode::BAD_REQUEST, "Data must be base64 encoded"))
}

// --- public ---

async fn heartbeat() -> Reply {
    ok(json!("pong"))
}

async fn pack(State(state): State<AppState>, Path(name): Path<String>) -> Reply {
    let store = state.store.read().await;
    match store.packs.get(&name) {
        Some(pack) => ok(pack.summary()),
        None => not_found("Pack"),
    }
}

async fn pack_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Reply {
    let store = state.store.read().await;
    let Some(pack) = store.packs.get(&name) else {
        return not_found("Pack");
    };
    match pack.versions.get(&version) {
        Some(v) => ok(json!({"pack": pack.name, "version": v.version})),
        None => not_found("Version"),
    }
}

async fn packs_simple(State(state): State<AppState>) -> Reply {
    let store = state.store.read().await;
    let names: Vec<Value> = store
        .packs
        .values()
        .map(|p| json!({"name": p.name, "type": p.visibility}))
        .collect();
    ok(Value::Array(names))
}

async fn packs_full(State(state): State<AppState>, Path(visibility): Path<String>) -> Reply {
    if !matches!(visibility.as_str(), "all" | "public" | "semipublic" | "private") {
        return not_found("Listing");
    }
    let store = state.store.read().await;
    let packs: Vec<Value> = store
        .packs
        .values()
        .filter(|p| visibility == "all" || p.visibility == visibility)
        .map(Pack::summary)
        .collect();
    ok(Value::Array(packs))
}

async fn download_stats(State(state): State<AppState>, Path(kind): Path<String>) -> Reply {
    let store = state.store.read().await;
    if kind == "all" {
        return ok(json!(store.downloads));
    }
    match store.downloads.get(kind.as_str()) {
        Some(count) => ok(json!(count)),
        None => not_found("Download type"),
    }
}

// --- admin: packs and files ---

async fn admin_packs(State(state): State<AppState>, headers: HeaderMap) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    Ok(ok(json!(store.packs.values().collect::<Vec<_>>())))
}

async fn admin_pack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    let pack = store.packs.get(&name).ok_or_else(|| not_found("Pack"))?;
    Ok(ok(json!(pack)))
}

async fn get_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, folder, filename)): Path<(String, String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    let pack = store.packs.get(&name).ok_or_else(|| not_found("Pack"))?;
    let bytes = pack
        .files
        .get(&folder)
        .and_then(|files| files.get(&filename))
        .ok_or_else(|| not_found("File"))?;
    Ok(ok(json!(STANDARD.encode(bytes))))
}

async fn put_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, folder, filename)): Path<(String, String, String)>,
    Json(upload): Json<Upload>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let bytes = decode(&upload.data)?;
    let mut store = state.store.write().await;
    let pack = store.packs.get_mut(&name).ok_or_else(|| not_found("Pack"))?;
    let size = bytes.len();
    pack.files.entry(folder).or_default().insert(filename, bytes);
    Ok(ok(json!({"bytes": size})))
}

async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, folder, filename)): Path<(String, String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let mut store = state.store.write().await;
    let pack = store.packs.get_mut(&name).ok_or_else(|| not_found("Pack"))?;
    pack.files
        .get_mut(&folder)
        .and_then(|files| files.remove(&filename))
        .ok_or_else(|| not_found("File"))?;
    Ok(ok(Value::Null))
}

async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, folder)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    let pack = store.packs.get(&name).ok_or_else(|| not_found("Pack"))?;
    let files: Vec<&String> = pack
        .files
        .get(&folder)
        .map(|files| files.keys().collect())
        .unwrap_or_default();
    Ok(ok(json!(files)))
}

// --- admin: versions ---

async fn read_version<R>(
    state: &AppState,
    name: &str,
    version: &str,
    f: impl FnOnce(&Version) -> R,
) -> Result<R, Reply> {
    let store = state.store.read().await;
    let pack = store.packs.get(name).ok_or_else(|| not_found("Pack"))?;
    let version = pack.versions.get(version).ok_or_else(|| not_found("Version"))?;
    Ok(f(version))
}

async fn update_version<R>(
    state: &AppState,
    name: &str,
    version: &str,
    f: impl FnOnce(&mut Version) -> R,
) -> Result<R, Reply> {
    let mut store = state.store.write().await;
    let pack = store.packs.get_mut(name).ok_or_else(|| not_found("Pack"))?;
    let version = pack.versions.get_mut(version).ok_or_else(|| not_found("Version"))?;
    Ok(f(version))
}

async fn version_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, version)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let info = read_version(&state, &name, &version, |v| {
        json!({"version": v.version, "has_configs": !v.configs.is_empty()})
    })
    .await?;
    Ok(ok(info))
}

async fn get_version_xml(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, version)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let xml = read_version(&state, &name, &version, |v| v.xml.clone()).await?;
    Ok(ok(json!(xml)))
}

async fn put_version_xml(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, version)): Path<(String, String)>,
    Json(upload): Json<Upload>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    update_version(&state, &name, &version, |v| v.xml = upload.data).await?;
    Ok(ok(Value::Null))
}

async fn get_version_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, version)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let json = read_version(&state, &name, &version, |v| v.json.clone()).await?;
    Ok(ok(json))
}

async fn get_version_configs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, version)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let configs = read_version(&state, &name, &version, |v| STANDARD.encode(&v.configs)).await?;
    Ok(ok(json!(configs)))
}

async fn put_version_configs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, version)): Path<(String, String)>,
    Json(upload): Json<Upload>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let bytes = decode(&upload.data)?;
    update_version(&state, &name, &version, |v| v.configs = bytes).await?;
    Ok(ok(Value::Null))
}

// --- admin: allowed players and testers ---

fn player_list<'a>(pack: &'a Pack, list: &str) -> Result<&'a BTreeSet<String>, Reply> {
    match list {
        "allowedplayers" => Ok(&pack.allowed_players),
        "testers" => Ok(&pack.testers),
        _ => Err(not_found("Setting")),
    }
}

fn player_list_mut<'a>(pack: &'a mut Pack, list: &str) -> Result<&'a mut BTreeSet<String>, Reply> {
    match list {
        "allowedplayers" => Ok(&mut pack.allowed_players),
        "testers" => Ok(&mut pack.testers),
        _ => Err(not_found("Setting")),
    }
}

async fn update_players(
    state: &AppState,
    name: &str,
    list: &str,
    f: impl FnOnce(&mut BTreeSet<String>),
) -> Result<Reply, Reply> {
    let mut store = state.store.write().await;
    let pack = store.packs.get_mut(name).ok_or_else(|| not_found("Pack"))?;
    let players = player_list_mut(pack, list)?;
    f(players);
    Ok(ok(json!(players)))
}

async fn get_players(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, list)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    let pack = store.packs.get(&name).ok_or_else(|| not_found("Pack"))?;
    Ok(ok(json!(player_list(pack, &list)?)))
}

async fn add_players(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, list)): Path<(String, String)>,
    Json(usernames): Json<Vec<String>>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    update_players(&state, &name, &list, |players| players.extend(usernames)).await
}

/// An empty list clears every entry.
async fn remove_players(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((name, list)): Path<(String, String)>,
    Json(usernames): Json<Vec<String>>,
) -> Result<Reply, Reply> {
    authorize(&state, &headers)?;
    update_players(&state, &name, &list, |players| {
        if usernames.is_empty() {
            players.clear();
        } else {
            for username in &usernames {
                players.remove(username);
            }
        }
    })
    .await
}
