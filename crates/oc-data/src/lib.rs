//! Data access for the orchid morphology database
//!
//! Typed records and CRUD calls for species, flowers, petals, sepals and user
//! accounts. Every call goes through [`oc_auth::ApiClient`], so credentials,
//! refresh and retry are handled there. [`guard`] holds the role-based
//! navigation rules the screens apply on top of the session.

pub mod cache;
pub mod errors;
pub mod guard;
pub mod models;
pub mod resource;
pub mod users;

pub use cache::ListState;
pub use errors::{DataError, Result};
pub use guard::{Navigation, RouteMeta, guard};
pub use models::*;
pub use resource::{Resource, ResourceApi};
pub use users::{UserApi, UserDirectory};

/// Entry point bundling one API handle per resource
#[derive(Debug, Clone)]
pub struct Catalog {
    pub species: ResourceApi<Species>,
    pub flowers: ResourceApi<Flower>,
    pub petals: ResourceApi<Petal>,
    pub sepals: ResourceApi<Sepal>,
    pub users: UserApi,
}

impl Catalog {
    pub fn new(client: oc_auth::ApiClient) -> Self {
        Self {
            species: ResourceApi::new(client.clone()),
            flowers: ResourceApi::new(client.clone()),
            petals: ResourceApi::new(client.clone()),
            sepals: ResourceApi::new(client.clone()),
            users: UserApi::new(client),
        }
    }
}
