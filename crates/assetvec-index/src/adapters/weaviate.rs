//! Weaviate adapter.
//!
//! One class per project, created on first write with `vectorizer: none` and
//! a single text property `assetId`. Weaviate has no keyed upsert, so an
//! update looks up the asset's objects through GraphQL, deletes them, then
//! inserts a fresh object.
//!
//! # Endpoints
//!
//! - GET `/v1/meta` (connectivity)
//! - GET/POST `/v1/schema[/{class}]`
//! - POST `/v1/graphql`
//! - POST `/v1/objects`, DELETE `/v1/objects/{class}/{id}`

use std::collections::HashSet;
use std::time::Duration;

use assetvec_config::{IndexKind, WeaviateSettings};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{check_dimension, require_ids, IndexError, Operation, Result};
use crate::namespace::{NamespaceResolver, WEAVIATE_CLASS};
use crate::traits::{should_search, VectorIndex};

/// Property holding the asset ID
const ASSET_ID_PROPERTY: &str = "assetId";

/// Upper bound on objects returned when resolving an asset's object IDs
const LOOKUP_LIMIT: usize = 100;

fn backend_err(operation: Operation, message: impl ToString) -> IndexError {
    IndexError::backend(IndexKind::Weaviate, operation, message)
}

/// Weaviate-backed index
pub struct WeaviateIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    dimension: usize,
    resolver: NamespaceResolver,
    /// Classes confirmed to exist
    known_classes: RwLock<HashSet<String>>,
}

impl WeaviateIndex {
    /// Build the HTTP client and check the server answers.
    pub async fn connect(settings: &WeaviateSettings, dimension: usize) -> Result<Self> {
        info!("Connecting to Weaviate at {}", settings.url);

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| backend_err(Operation::Connect, e))?;

        let index = Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            dimension,
            resolver: NamespaceResolver::new(&settings.class_prefix, WEAVIATE_CLASS),
            known_classes: RwLock::new(HashSet::new()),
        };

        let response = index
            .send(index.request(reqwest::Method::GET, "/v1/meta"), Operation::Connect)
            .await?;
        expect_success(response, Operation::Connect).await?;

        info!("Connected to Weaviate");
        Ok(index)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match self.api_key {
            Some(ref key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, operation: Operation) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| backend_err(operation, format!("request failed: {}", e)))
    }

    /// Whether `class` exists, consulting the cache first.
    async fn class_exists(&self, class: &str, operation: Operation) -> Result<bool> {
        if self.known_classes.read().await.contains(class) {
            return Ok(true);
        }

        let response = self
            .send(
                self.request(reqwest::Method::GET, &format!("/v1/schema/{}", class)),
                operation,
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                self.known_classes.write().await.insert(class.to_string());
                Ok(true)
            }
            _ => {
                expect_success(response, operation).await?;
                Ok(false)
            }
        }
    }

    async fn ensure_class(&self, class: &str) -> Result<()> {
        if self.class_exists(class, Operation::AddOrUpdate).await? {
            return Ok(());
        }

        info!("Creating Weaviate class '{}'", class);
        let body = json!({
            "class": class,
            "vectorizer": "none",
            "properties": [
                { "name": ASSET_ID_PROPERTY, "dataType": ["text"] }
            ]
        });

        let response = self
            .send(
                self.request(reqwest::Method::POST, "/v1/schema").json(&body),
                Operation::AddOrUpdate,
            )
            .await?;

        // A concurrent writer may have created it first
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY
            && self.class_exists(class, Operation::AddOrUpdate).await?
        {
            return Ok(());
        }
        expect_success(response, Operation::AddOrUpdate).await?;

        self.known_classes.write().await.insert(class.to_string());
        Ok(())
    }

    /// Run a GraphQL `Get` query and return the objects of `class`.
    async fn graphql_get(
        &self,
        class: &str,
        query: String,
        operation: Operation,
    ) -> Result<Vec<Value>> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/v1/graphql")
                    .json(&json!({ "query": query })),
                operation,
            )
            .await?;
        let response = expect_success(response, operation).await?;

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| backend_err(operation, format!("invalid GraphQL response: {}", e)))?;

        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(backend_err(operation, format!("GraphQL error: {}", errors)));
        }

        let objects = body
            .pointer_mut(&format!("/data/Get/{}", class))
            .map(Value::take)
            .unwrap_or(Value::Null);

        match objects {
            Value::Array(objects) => Ok(objects),
            Value::Null => Ok(Vec::new()),
            other => Err(backend_err(
                operation,
                format!("unexpected GraphQL payload: {}", other),
            )),
        }
    }

    /// Object IDs currently stored for `asset_id` in `class`.
    async fn object_ids(
        &self,
        class: &str,
        asset_id: &str,
        operation: Operation,
    ) -> Result<Vec<String>> {
        let value = serde_json::to_string(asset_id).map_err(|e| backend_err(operation, e))?;
        let query = format!(
            "{{ Get {{ {class}(where: {{path: [\"{prop}\"], operator: Equal, valueText: {value}}}, limit: {limit}) {{ _additional {{ id }} }} }} }}",
            class = class,
            prop = ASSET_ID_PROPERTY,
            value = value,
            limit = LOOKUP_LIMIT,
        );

        Ok(self
            .graphql_get(class, query, operation)
            .await?
            .iter()
            .filter_map(|o| o["_additional"]["id"].as_str().map(str::to_string))
            .collect())
    }

    async fn delete_objects(&self, class: &str, ids: &[String], operation: Operation) -> Result<()> {
        for id in ids {
            let response = self
                .send(
                    self.request(
                        reqwest::Method::DELETE,
                        &format!("/v1/objects/{}/{}", class, id),
                    ),
                    operation,
                )
                .await?;
            if response.status() != StatusCode::NOT_FOUND {
                expect_success(response, operation).await?;
            }
        }
        Ok(())
    }
}

/// Pass successful responses through, turn anything else into a backend error.
async fn expect_success(response: Response, operation: Operation) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(backend_err(
        operation,
        format!("status {}: {}", status, body),
    ))
}

#[async_trait]
impl VectorIndex for WeaviateIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        require_ids(project_id, asset_id)?;
        check_dimension(self.dimension, vector)?;

        let class = self.resolver.resolve(project_id);
        self.ensure_class(&class).await?;

        let stale = self
            .object_ids(&class, asset_id, Operation::AddOrUpdate)
            .await?;
        self.delete_objects(&class, &stale, Operation::AddOrUpdate)
            .await?;

        let body = json!({
            "class": class,
            "properties": { ASSET_ID_PROPERTY: asset_id },
            "vector": vector,
        });
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/v1/objects").json(&body),
                Operation::AddOrUpdate,
            )
            .await?;
        expect_success(response, Operation::AddOrUpdate).await?;

        debug!(
            "Stored asset '{}' in class '{}' (replaced {} objects)",
            asset_id,
            class,
            stale.len()
        );
        Ok(())
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        if !should_search(self.dimension, project_id, query, top_n)? {
            return Ok(Vec::new());
        }

        let class = self.resolver.resolve(project_id);
        if !self.class_exists(&class, Operation::Search).await? {
            return Ok(Vec::new());
        }

        let vector = serde_json::to_string(query).map_err(|e| backend_err(Operation::Search, e))?;
        let gql = format!(
            "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {limit}) {{ {prop} }} }} }}",
            class = class,
            vector = vector,
            limit = top_n,
            prop = ASSET_ID_PROPERTY,
        );

        Ok(self
            .graphql_get(&class, gql, Operation::Search)
            .await?
            .iter()
            .filter_map(|o| o[ASSET_ID_PROPERTY].as_str().map(str::to_string))
            .collect())
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        require_ids(project_id, asset_id)?;

        let class = self.resolver.resolve(project_id);
        if !self.class_exists(&class, Operation::Remove).await? {
            return Ok(());
        }

        let ids = self.object_ids(&class, asset_id, Operation::Remove).await?;
        self.delete_objects(&class, &ids, Operation::Remove).await
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Weaviate
    }
}

impl std::fmt::Debug for WeaviateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeaviateIndex")
            .field("base_url", &self.base_url)
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connect(server: &MockServer) -> WeaviateIndex {
        Mock::given(method("GET"))
            .and(path("/v1/meta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.24.0"})))
            .mount(server)
            .await;

        let settings = WeaviateSettings {
            url: server.uri(),
            ..Default::default()
        };
        WeaviateIndex::connect(&settings, 3).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_failure_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/meta"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let settings = WeaviateSettings {
            url: server.uri(),
            ..Default::default()
        };
        let err = WeaviateIndex::connect(&settings, 3).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Backend {
                operation: Operation::Connect,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_add_creates_class_and_inserts() {
        let server = MockServer::start().await;
        let index = connect(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/schema/Project_p1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/schema"))
            .and(body_partial_json(json!({
                "class": "Project_p1",
                "vectorizer": "none"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("valueText"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "Get": { "Project_p1": [] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/objects"))
            .and(body_partial_json(json!({
                "class": "Project_p1",
                "properties": { "assetId": "a" },
                "vector": [1.0, 0.0, 0.0]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .expect(2)
            .mount(&server)
            .await;

        index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
        // Class is cached: no second schema lookup or creation
        index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_deletes_previous_objects() {
        let server = MockServer::start().await;
        let index = connect(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/schema/Project_p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"class": "Project_p1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("valueText"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "Get": { "Project_p1": [
                    { "_additional": { "id": "11111111-1111-1111-1111-111111111111" } }
                ] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(
                "/v1/objects/Project_p1/11111111-1111-1111-1111-111111111111",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "y"})))
            .expect(1)
            .mount(&server)
            .await;

        index.add_or_update("p1", "a", &[0.0, 1.0, 0.0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_uses_near_vector() {
        let server = MockServer::start().await;
        let index = connect(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/schema/Project_p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"class": "Project_p1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("nearVector"))
            .and(body_string_contains("limit: 2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "Get": { "Project_p1": [
                    { "assetId": "a" },
                    { "assetId": "c" }
                ] } }
            })))
            .mount(&server)
            .await;

        let hits = index.search("p1", &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_missing_class_is_empty_and_noop() {
        let server = MockServer::start().await;
        let index = connect(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/schema/Project_nobody"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(index
            .search("nobody", &[1.0, 0.0, 0.0], 5)
            .await
            .unwrap()
            .is_empty());
        index.remove("nobody", "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_graphql_errors_surface() {
        let server = MockServer::start().await;
        let index = connect(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/schema/Project_p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "boom" }]
            })))
            .mount(&server)
            .await;

        let err = index.search("p1", &[1.0, 0.0, 0.0], 2).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_dimension_checked_before_io() {
        let server = MockServer::start().await;
        let index = connect(&server).await;

        let err = index.add_or_update("p1", "a", &[1.0]).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
        let err = index.search("p1", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_api_key_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/meta"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let settings = WeaviateSettings {
            url: server.uri(),
            api_key: Some("secret".into()),
            ..Default::default()
        };
        WeaviateIndex::connect(&settings, 3).await.unwrap();
    }
}
