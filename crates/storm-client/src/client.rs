//! HTTP plumbing and the typed resource collections

use crate::error::{ApiError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::marker::PhantomData;
use std::time::Duration;
use storm_core::{Application, Group, Member, NewTrigger, Node, Query, Recipe, Trigger};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Perfect Storm API server.
///
/// Exposes one typed collection per resource kind plus a shortcuts facade
/// for cross-resource lookups. All state lives on the server; the client is
/// cheap to clone and holds no caches.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// Connect to an API server, e.g. `http://127.0.0.1:8000/v1/`
    pub fn new(base: &str) -> Result<Self> {
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ApiError::Url(base.to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("API request failed with {}: {}", status, body);
            Err(ApiError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&Query>,
    ) -> Result<T> {
        let mut request = self.http.get(self.url(path));
        if let Some(query) = query {
            request = request.query(&[("q", serde_json::to_string(query)?)]);
        }
        Self::read_response(request.send().await?).await
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::read_response(response).await
    }

    pub(crate) async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::check_response(response).await
    }

    pub(crate) async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.http.put(self.url(path)).json(body).send().await?;
        Self::read_response(response).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let response = self.http.delete(self.url(path)).send().await?;
        Self::check_response(response).await
    }

    pub fn groups(&self) -> Groups<'_> {
        Groups {
            inner: Collection::new(self, "groups"),
        }
    }

    pub fn apps(&self) -> Collection<'_, Application> {
        Collection::new(self, "apps")
    }

    pub fn recipes(&self) -> Collection<'_, Recipe> {
        Collection::new(self, "recipes")
    }

    pub fn nodes(&self) -> Collection<'_, Node> {
        Collection::new(self, "nodes")
    }

    pub fn triggers(&self) -> Triggers<'_> {
        Triggers {
            inner: Collection::new(self, "triggers"),
        }
    }

    pub fn shortcuts(&self) -> Shortcuts<'_> {
        Shortcuts { client: self }
    }
}

/// CRUD surface shared by every resource collection
pub struct Collection<'a, T> {
    client: &'a ApiClient,
    path: &'static str,
    _marker: PhantomData<T>,
}

impl<'a, T> Collection<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    fn new(client: &'a ApiClient, path: &'static str) -> Self {
        Self {
            client,
            path,
            _marker: PhantomData,
        }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}/", self.path, id)
    }

    pub async fn all(&self) -> Result<Vec<T>> {
        self.client.get_json(&format!("{}/", self.path), None).await
    }

    /// List resources matching a server-evaluated query
    pub async fn find(&self, query: &Query) -> Result<Vec<T>> {
        self.client
            .get_json(&format!("{}/", self.path), Some(query))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<T> {
        self.client.get_json(&self.item_path(id), None).await
    }

    pub async fn create(&self, body: &T) -> Result<T> {
        self.client.post_json(&format!("{}/", self.path), body).await
    }

    pub async fn update(&self, id: &str, body: &T) -> Result<T> {
        self.client.put_json(&self.item_path(id), body).await
    }

    /// Upsert by identifier.
    ///
    /// A concurrent creator can win the race between the existence check and
    /// our create; the 409 is resolved by re-reading and updating instead.
    pub async fn update_or_create(&self, id: &str, body: &T) -> Result<T> {
        match self.get(id).await {
            Ok(_) => self.update(id, body).await,
            Err(e) if e.is_not_found() => match self.create(body).await {
                Err(e) if e.is_conflict() => {
                    tracing::debug!("Create of {}/{} conflicted, updating instead", self.path, id);
                    self.update(id, body).await
                }
                other => other,
            },
            Err(e) => Err(e),
        }
    }

    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.client.delete(&self.item_path(id)).await
    }
}

/// Groups with their membership operations
pub struct Groups<'a> {
    inner: Collection<'a, Group>,
}

impl<'a> Groups<'a> {
    pub async fn all(&self) -> Result<Vec<Group>> {
        self.inner.all().await
    }

    pub async fn get(&self, id: &str) -> Result<Group> {
        self.inner.get(id).await
    }

    pub async fn create(&self, body: &Group) -> Result<Group> {
        self.inner.create(body).await
    }

    pub async fn update(&self, id: &str, body: &Group) -> Result<Group> {
        self.inner.update(id, body).await
    }

    pub async fn update_or_create(&self, id: &str, body: &Group) -> Result<Group> {
        self.inner.update_or_create(id, body).await
    }

    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.inner.destroy(id).await
    }

    /// Current members, composed server-side with the caller filter
    pub async fn members(&self, id: &str, filter: Option<&Query>) -> Result<Vec<Member>> {
        self.inner
            .client
            .get_json(&format!("groups/{}/members/", id), filter)
            .await
    }

    pub async fn add_members(&self, id: &str, ids: &[String]) -> Result<()> {
        self.inner
            .client
            .post_no_content(&format!("groups/{}/members/", id), &json!({"include": ids}))
            .await
    }

    pub async fn remove_members(&self, id: &str, ids: &[String]) -> Result<()> {
        self.inner
            .client
            .post_no_content(&format!("groups/{}/members/", id), &json!({"exclude": ids}))
            .await
    }
}

/// Triggers are created from a spec; the server assigns uuid and status
pub struct Triggers<'a> {
    inner: Collection<'a, Trigger>,
}

impl<'a> Triggers<'a> {
    pub async fn all(&self) -> Result<Vec<Trigger>> {
        self.inner.all().await
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<Trigger>> {
        self.inner.find(query).await
    }

    pub async fn get(&self, uuid: &str) -> Result<Trigger> {
        self.inner.get(uuid).await
    }

    pub async fn create(&self, spec: &NewTrigger) -> Result<Trigger> {
        self.inner.client.post_json("triggers/", spec).await
    }

    pub async fn update(&self, uuid: &str, body: &Trigger) -> Result<Trigger> {
        self.inner.update(uuid, body).await
    }

    pub async fn destroy(&self, uuid: &str) -> Result<()> {
        self.inner.destroy(uuid).await
    }
}

/// Cross-resource lookups
pub struct Shortcuts<'a> {
    client: &'a ApiClient,
}

impl<'a> Shortcuts<'a> {
    /// Resolve a member (node or container) to its hosting node via the
    /// engine linkage.
    pub async fn get_node_for(&self, member: &Member) -> Result<Node> {
        let engine_id = member.engine_id().ok_or_else(|| {
            ApiError::resolution(format!("member {} has no engine", member.cloud_id))
        })?;
        let mut nodes = self
            .client
            .nodes()
            .find(&Query::field_eq("engine._id", engine_id))
            .await?;
        match nodes.len() {
            1 => Ok(nodes.remove(0)),
            0 => Err(ApiError::resolution(format!(
                "no node hosts engine {}",
                engine_id
            ))),
            n => Err(ApiError::resolution(format!(
                "{} nodes claim engine {}",
                n, engine_id
            ))),
        }
    }

    /// Routable address of a node
    pub fn get_address_for(&self, node: &Node) -> Result<String> {
        node.address.clone().ok_or_else(|| {
            ApiError::resolution(format!("node {} has no address", node.name))
        })
    }
}
