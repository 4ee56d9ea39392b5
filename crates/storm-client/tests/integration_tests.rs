//! Exercises the typed client against a fake API server speaking plain
//! HTTP/1.1 over a local socket, in the same spirit as the fake HAProxy
//! peer used by the load-balancer tests.

use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use storm_client::{ApiClient, ApiError};
use storm_core::{Member, Query, Recipe};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request the fake server received
#[derive(Debug, Clone)]
struct Received {
    method: String,
    path: String,
    query: String,
    body: String,
}

type Routes = HashMap<(String, String), VecDeque<(u16, String)>>;

/// Scripted HTTP peer. Responses queue per (method, path); the last entry
/// of a queue repeats, and unrouted requests answer 404.
struct FakeApi {
    base: String,
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<Received>>>,
}

impl FakeApi {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<Mutex<Routes>> = Arc::new(Mutex::new(HashMap::new()));
        let requests: Arc<Mutex<Vec<Received>>> = Arc::new(Mutex::new(Vec::new()));

        let served = routes.clone();
        let log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = served.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let Some(received) = read_request(&mut socket).await else {
                        return;
                    };
                    let key = (received.method.clone(), received.path.clone());
                    log.lock().unwrap().push(received);

                    let (status, body) = next_response(&routes, &key);
                    let response = format!(
                        "HTTP/1.1 {} OK\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base: format!("http://127.0.0.1:{}/v1/", port),
            routes,
            requests,
        }
    }

    fn route(&self, method: &str, path: &str, status: u16, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back((status, body.to_string()));
    }

    fn requests(&self) -> Vec<Received> {
        self.requests.lock().unwrap().clone()
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(&self.base).unwrap()
    }
}

fn next_response(routes: &Arc<Mutex<Routes>>, key: &(String, String)) -> (u16, String) {
    let mut routes = routes.lock().unwrap();
    match routes.get_mut(key) {
        Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
        Some(queue) => queue
            .front()
            .cloned()
            .unwrap_or((404, "{}".to_string())),
        None => (404, "{}".to_string()),
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<Received> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    let header_end = loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => {
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos;
                }
            }
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let mut lines = head.lines();
    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target, String::new()),
    };
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = raw[header_end + 4..].to_vec();
    while body.len() < content_length {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&buf[..n]),
        }
    }

    Some(Received {
        method,
        path,
        query,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn recipe_json() -> Value {
    json!({"identifier": "consul-server", "type": "docker", "content": "run: []"})
}

fn member_json(cloud_id: &str, engine_id: &str) -> Value {
    json!({"cloud_id": cloud_id, "status": "UP", "engine": {"_id": engine_id}})
}

fn node_json(cloud_id: &str, engine_id: &str, address: &str) -> Value {
    json!({
        "cloud_id": cloud_id,
        "name": cloud_id,
        "status": "UP",
        "engine": {"_id": engine_id},
        "address": address,
    })
}

#[tokio::test]
async fn test_update_or_create_updates_an_existing_resource() {
    let api = FakeApi::start().await;
    api.route("GET", "/v1/recipes/consul-server/", 200, recipe_json());
    api.route("PUT", "/v1/recipes/consul-server/", 200, recipe_json());

    let recipe: Recipe = serde_json::from_value(recipe_json()).unwrap();
    api.client()
        .recipes()
        .update_or_create("consul-server", &recipe)
        .await
        .unwrap();

    let methods: Vec<String> = api.requests().iter().map(|r| r.method.clone()).collect();
    assert_eq!(methods, vec!["GET", "PUT"]);
}

#[tokio::test]
async fn test_update_or_create_creates_a_missing_resource() {
    let api = FakeApi::start().await;
    // No GET route: the existence check answers 404
    api.route("POST", "/v1/recipes/", 200, recipe_json());

    let recipe: Recipe = serde_json::from_value(recipe_json()).unwrap();
    api.client()
        .recipes()
        .update_or_create("consul-server", &recipe)
        .await
        .unwrap();

    let requests = api.requests();
    let methods: Vec<&str> = requests.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["GET", "POST"]);

    let created: Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(created["identifier"], "consul-server");
}

#[tokio::test]
async fn test_update_or_create_resolves_a_create_conflict_by_updating() {
    let api = FakeApi::start().await;
    // A concurrent creator wins the race: our create answers 409
    api.route("POST", "/v1/recipes/", 409, json!({}));
    api.route("PUT", "/v1/recipes/consul-server/", 200, recipe_json());

    let recipe: Recipe = serde_json::from_value(recipe_json()).unwrap();
    api.client()
        .recipes()
        .update_or_create("consul-server", &recipe)
        .await
        .unwrap();

    let methods: Vec<String> = api.requests().iter().map(|r| r.method.clone()).collect();
    assert_eq!(methods, vec!["GET", "POST", "PUT"]);
}

#[tokio::test]
async fn test_get_surfaces_not_found() {
    let api = FakeApi::start().await;
    let err = api.client().recipes().get("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_members_passes_the_filter_to_the_server() {
    let api = FakeApi::start().await;
    api.route(
        "GET",
        "/v1/groups/web/members/",
        200,
        json!([member_json("c-1", "e-1")]),
    );

    let members: Vec<Member> = api
        .client()
        .groups()
        .members("web", Some(&Query::field_eq("status", "UP")))
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].cloud_id, "c-1");

    let request = &api.requests()[0];
    assert!(request.query.starts_with("q="));
    assert!(request.query.contains("status"));
    assert!(request.query.contains("UP"));
}

#[tokio::test]
async fn test_membership_mutations_send_include_and_exclude() {
    let api = FakeApi::start().await;
    api.route("POST", "/v1/groups/web/members/", 200, json!({}));

    let client = api.client();
    client
        .groups()
        .add_members("web", &["c-1".to_string()])
        .await
        .unwrap();
    client
        .groups()
        .remove_members("web", &["c-1".to_string()])
        .await
        .unwrap();

    let requests = api.requests();
    let include: Value = serde_json::from_str(&requests[0].body).unwrap();
    let exclude: Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(include, json!({"include": ["c-1"]}));
    assert_eq!(exclude, json!({"exclude": ["c-1"]}));
}

#[tokio::test]
async fn test_get_node_for_resolves_a_unique_engine() {
    let api = FakeApi::start().await;
    api.route("GET", "/v1/nodes/", 200, json!([node_json("n-1", "e-1", "10.0.0.1")]));

    let member: Member = serde_json::from_value(member_json("c-1", "e-1")).unwrap();
    let node = api.client().shortcuts().get_node_for(&member).await.unwrap();
    assert_eq!(node.cloud_id, "n-1");

    let request = &api.requests()[0];
    assert!(request.query.contains("engine._id") || request.query.contains("engine"));
}

#[tokio::test]
async fn test_get_node_for_rejects_missing_and_ambiguous_engines() {
    let api = FakeApi::start().await;
    api.route("GET", "/v1/nodes/", 200, json!([]));
    let member: Member = serde_json::from_value(member_json("c-1", "e-1")).unwrap();
    let err = api.client().shortcuts().get_node_for(&member).await.unwrap_err();
    assert!(matches!(err, ApiError::Resolution(_)));

    let api = FakeApi::start().await;
    api.route(
        "GET",
        "/v1/nodes/",
        200,
        json!([
            node_json("n-1", "e-1", "10.0.0.1"),
            node_json("n-2", "e-1", "10.0.0.2"),
        ]),
    );
    let err = api.client().shortcuts().get_node_for(&member).await.unwrap_err();
    assert!(matches!(err, ApiError::Resolution(_)));

    // A member with no engine fails locally, without a request
    let api = FakeApi::start().await;
    let bare: Member = serde_json::from_value(json!({"cloud_id": "c-2", "status": "UP"})).unwrap();
    let err = api.client().shortcuts().get_node_for(&bare).await.unwrap_err();
    assert!(matches!(err, ApiError::Resolution(_)));
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_get_address_for_requires_an_address() {
    let api = FakeApi::start().await;
    let client = api.client();

    let node: storm_core::Node =
        serde_json::from_value(node_json("n-1", "e-1", "10.0.0.1")).unwrap();
    assert_eq!(
        client.shortcuts().get_address_for(&node).unwrap(),
        "10.0.0.1"
    );

    let mut bare = node;
    bare.address = None;
    let err = client.shortcuts().get_address_for(&bare).unwrap_err();
    assert!(matches!(err, ApiError::Resolution(_)));
}
