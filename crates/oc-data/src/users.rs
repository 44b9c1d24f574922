use oc_auth::config::endpoints::REGISTER;
use oc_auth::{ApiClient, ApiRequest, Role};
use serde_json::json;
use tracing::{info, instrument};

use crate::cache::ListState;
use crate::errors::{DataError, Result};
use crate::models::{Page, QueryParams, User, UserCreate, UserQuery};

const USERS: &str = "/api/auth/users";
const ROLE: &str = "/api/auth/role";

/// Account management calls
#[derive(Debug, Clone)]
pub struct UserApi {
    client: ApiClient,
}

impl UserApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Register an account and return its id
    #[instrument(skip(self, payload), fields(username = %payload.username))]
    pub async fn register(&self, payload: &UserCreate) -> Result<i64> {
        let created: serde_json::Value = self.client.post_json(REGISTER, payload).await?;
        created
            .get("user_id")
            .and_then(serde_json::Value::as_i64)
            .ok_or(DataError::MissingId { field: "user_id" })
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &UserQuery) -> Result<Page<User>> {
        let request = ApiRequest::get(USERS).query(query.to_query());
        Ok(self.client.get_json(request).await?)
    }

    #[instrument(skip(self))]
    pub async fn update_role(&self, user_id: i64, role: Role) -> Result<()> {
        let request = ApiRequest::put(format!("{}/{}", ROLE, user_id)).json(&json!({ "role": role }))?;
        self.client.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: i64) -> Result<()> {
        self.client.delete(&format!("{}/{}", USERS, user_id)).await?;
        Ok(())
    }
}

/// Admin user list with the current page kept in sync with local edits
#[derive(Debug)]
pub struct UserDirectory {
    api: UserApi,
    state: ListState<User>,
}

impl UserDirectory {
    pub fn new(api: UserApi) -> Self {
        Self {
            api,
            state: ListState::new(),
        }
    }

    pub fn state(&self) -> &ListState<User> {
        &self.state
    }

    pub async fn fetch_users(&mut self, query: &UserQuery) -> Result<()> {
        self.state.loading = true;
        let result = self.api.list(query).await;
        self.state.loading = false;
        self.state.apply(result?);
        Ok(())
    }

    /// Register an account, then reload the listing
    pub async fn create_user(&mut self, payload: &UserCreate) -> Result<i64> {
        let user_id = self.api.register(payload).await?;
        info!(user_id, "Registered user");
        self.fetch_users(&UserQuery::default()).await?;
        Ok(user_id)
    }

    pub async fn update_user_role(&mut self, user_id: i64, role: Role) -> Result<()> {
        self.api.update_role(user_id, role).await?;
        self.state
            .update_where(|u| u.user_id == user_id, |u| u.role = role);
        Ok(())
    }

    pub async fn delete_user(&mut self, user_id: i64) -> Result<()> {
        self.api.delete(user_id).await?;
        self.state.remove_where(|u| u.user_id == user_id);
        Ok(())
    }
}
