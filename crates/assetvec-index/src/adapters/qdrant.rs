//! Qdrant adapter.
//!
//! All projects share one collection. Each point carries a `namespace`
//! payload (the resolved project namespace) and the `asset_id`; searches
//! filter on `namespace`. Point IDs are UUIDv5 of `namespace/asset_id`, so a
//! second write to the same asset is a native upsert.

use std::time::Duration;

use assetvec_config::{IndexKind, QdrantSettings};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config::Config, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, PointsIdsList,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{check_dimension, require_ids, IndexError, Operation, Result};
use crate::namespace::{NamespaceResolver, QDRANT_NAMESPACE};
use crate::traits::{should_search, VectorIndex};

/// Payload field holding the project namespace
const NAMESPACE_FIELD: &str = "namespace";

/// Payload field holding the asset ID
const ASSET_ID_FIELD: &str = "asset_id";

fn backend_err(operation: Operation) -> impl FnOnce(QdrantError) -> IndexError {
    move |e| IndexError::backend(IndexKind::Qdrant, operation, e)
}

/// Deterministic point ID for an asset within a namespace.
pub fn point_id(namespace: &str, asset_id: &str) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}/{}", namespace, asset_id).as_bytes(),
    )
    .to_string()
}

/// Qdrant-backed index
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
    resolver: NamespaceResolver,
    /// Set once the collection is known to exist
    collection_ready: OnceCell<()>,
}

impl QdrantIndex {
    /// Connect to Qdrant server
    pub async fn connect(settings: &QdrantSettings, dimension: usize) -> Result<Self> {
        info!("Connecting to Qdrant at {}", settings.url);

        let mut builder =
            Qdrant::from_url(&settings.url).timeout(Duration::from_secs(settings.timeout_secs));

        if let Some(ref api_key) = settings.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder.build().map_err(backend_err(Operation::Connect))?;

        // Test connection by listing collections
        client
            .list_collections()
            .await
            .map_err(backend_err(Operation::Connect))?;

        info!("Connected to Qdrant, using collection '{}'", settings.collection);

        Ok(Self {
            client,
            collection: settings.collection.clone(),
            dimension,
            resolver: NamespaceResolver::new(&settings.namespace_prefix, QDRANT_NAMESPACE),
            collection_ready: OnceCell::new(),
        })
    }

    /// Whether the shared collection exists, without creating it.
    async fn collection_exists(&self, operation: Operation) -> Result<bool> {
        if self.collection_ready.initialized() {
            return Ok(true);
        }

        let exists = self
            .client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(backend_err(operation))?;

        if exists {
            let _ = self.collection_ready.set(());
        }
        Ok(exists)
    }

    /// Create the shared collection and its namespace index if missing.
    async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| async {
                if self
                    .client
                    .collection_exists(self.collection.as_str())
                    .await
                    .map_err(backend_err(Operation::AddOrUpdate))?
                {
                    debug!("Collection '{}' already exists", self.collection);
                    return Ok(());
                }

                info!(
                    "Creating collection '{}' (dim={}, distance=Euclid)",
                    self.collection, self.dimension
                );

                let vectors_config = VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: self.dimension as u64,
                        distance: Distance::Euclid.into(),
                        ..Default::default()
                    })),
                };

                self.client
                    .create_collection(
                        CreateCollectionBuilder::new(&self.collection)
                            .vectors_config(vectors_config),
                    )
                    .await
                    .map_err(backend_err(Operation::AddOrUpdate))?;

                self.client
                    .create_field_index(
                        CreateFieldIndexCollectionBuilder::new(
                            &self.collection,
                            NAMESPACE_FIELD,
                            FieldType::Keyword,
                        )
                        .wait(true),
                    )
                    .await
                    .map_err(backend_err(Operation::AddOrUpdate))?;

                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        require_ids(project_id, asset_id)?;
        check_dimension(self.dimension, vector)?;

        self.ensure_collection().await?;

        let namespace = self.resolver.resolve(project_id);
        let mut payload = Payload::new();
        payload.insert(NAMESPACE_FIELD, namespace.clone());
        payload.insert(ASSET_ID_FIELD, asset_id.to_string());

        let point = PointStruct::new(point_id(&namespace, asset_id), vector.to_vec(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(backend_err(Operation::AddOrUpdate))?;

        debug!("Upserted asset '{}' in namespace '{}'", asset_id, namespace);
        Ok(())
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        if !should_search(self.dimension, project_id, query, top_n)? {
            return Ok(Vec::new());
        }
        if !self.collection_exists(Operation::Search).await? {
            return Ok(Vec::new());
        }

        let namespace = self.resolver.resolve(project_id);
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), top_n as u64)
                    .filter(Filter::must([Condition::matches(
                        NAMESPACE_FIELD,
                        namespace,
                    )]))
                    .with_payload(true),
            )
            .await
            .map_err(backend_err(Operation::Search))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                point
                    .payload
                    .get(ASSET_ID_FIELD)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            })
            .collect())
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        require_ids(project_id, asset_id)?;
        if !self.collection_exists(Operation::Remove).await? {
            return Ok(());
        }

        let namespace = self.resolver.resolve(project_id);
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList {
                        ids: vec![point_id(&namespace, asset_id).into()],
                    })
                    .wait(true),
            )
            .await
            .map_err(backend_err(Operation::Remove))?;

        debug!("Removed asset '{}' from namespace '{}'", asset_id, namespace);
        Ok(())
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Qdrant
    }
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .finish()
    }
}
