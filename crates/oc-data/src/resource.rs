use std::marker::PhantomData;

use oc_auth::{ApiClient, ApiRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::errors::{DataError, Result};
use crate::models::{
    Flower, FlowerCreate, MorphologyQuery, Page, Petal, PetalCreate, QueryParams, Sepal,
    SepalCreate, Species, SpeciesCreate, SpeciesQuery,
};

/// A record type served under `/api/data/<name>`
pub trait Resource: DeserializeOwned + Send + Sync {
    /// Collection path
    const PATH: &'static str;
    /// Id field returned when a record is created
    const ID_FIELD: &'static str;

    type Create: Serialize + Send + Sync;
    type Query: QueryParams + Send + Sync;

    fn id(&self) -> i64;
}

impl Resource for Species {
    const PATH: &'static str = "/api/data/species";
    const ID_FIELD: &'static str = "species_id";
    type Create = SpeciesCreate;
    type Query = SpeciesQuery;

    fn id(&self) -> i64 {
        self.species_id
    }
}

impl Resource for Flower {
    const PATH: &'static str = "/api/data/flower";
    const ID_FIELD: &'static str = "flower_id";
    type Create = FlowerCreate;
    type Query = MorphologyQuery;

    fn id(&self) -> i64 {
        self.flower_id
    }
}

impl Resource for Petal {
    const PATH: &'static str = "/api/data/petal";
    const ID_FIELD: &'static str = "petal_id";
    type Create = PetalCreate;
    type Query = MorphologyQuery;

    fn id(&self) -> i64 {
        self.petal_id
    }
}

impl Resource for Sepal {
    const PATH: &'static str = "/api/data/sepal";
    const ID_FIELD: &'static str = "sepal_id";
    type Create = SepalCreate;
    type Query = MorphologyQuery;

    fn id(&self) -> i64 {
        self.sepal_id
    }
}

/// CRUD calls for one resource, issued through the authenticated pipeline
#[derive(Debug, Clone)]
pub struct ResourceApi<R> {
    client: ApiClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> ResourceApi<R> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    fn item_path(id: i64) -> String {
        format!("{}/{}", R::PATH, id)
    }

    #[instrument(skip(self, query), fields(resource = R::PATH))]
    pub async fn list(&self, query: &R::Query) -> Result<Page<R>> {
        let request = ApiRequest::get(R::PATH).query(query.to_query());
        let page: Page<R> = self.client.get_json(request).await?;
        debug!(count = page.data.len(), total = page.pagination.total, "Fetched page");
        Ok(page)
    }

    #[instrument(skip(self), fields(resource = R::PATH))]
    pub async fn get(&self, id: i64) -> Result<R> {
        Ok(self
            .client
            .get_json(ApiRequest::get(Self::item_path(id)))
            .await?)
    }

    /// Create a record and return its id
    #[instrument(skip(self, payload), fields(resource = R::PATH))]
    pub async fn create(&self, payload: &R::Create) -> Result<i64> {
        let created: serde_json::Value = self.client.post_json(R::PATH, payload).await?;
        let id = created
            .get(R::ID_FIELD)
            .and_then(serde_json::Value::as_i64)
            .ok_or(DataError::MissingId {
                field: R::ID_FIELD,
            })?;
        debug!(id, "Created record");
        Ok(id)
    }

    #[instrument(skip(self, payload), fields(resource = R::PATH))]
    pub async fn update(&self, id: i64, payload: &R::Create) -> Result<()> {
        let request = ApiRequest::put(Self::item_path(id)).json(payload)?;
        self.client.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(resource = R::PATH))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client.delete(&Self::item_path(id)).await?;
        Ok(())
    }
}
