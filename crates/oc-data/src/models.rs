//! Records exchanged with the data endpoints.

use oc_auth::Role;
use serde::{Deserialize, Serialize};

/// Conservation status, serialized as the backend's labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConservationStatus {
    #[serde(rename = "无危")]
    LeastConcern,
    #[serde(rename = "易危")]
    Vulnerable,
    #[serde(rename = "濒危")]
    Endangered,
}

impl ConservationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LeastConcern => "无危",
            Self::Vulnerable => "易危",
            Self::Endangered => "濒危",
        }
    }
}

impl std::str::FromStr for ConservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "无危" | "least-concern" => Ok(Self::LeastConcern),
            "易危" | "vulnerable" => Ok(Self::Vulnerable),
            "濒危" | "endangered" => Ok(Self::Endangered),
            other => Err(format!("unknown conservation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_login_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub species_id: i64,
    pub family: String,
    pub genus: String,
    pub scientific_name: String,
    pub chinese_name: String,
    #[serde(default)]
    pub distribution: Option<String>,
    pub conservation_status: ConservationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flower {
    pub flower_id: i64,
    pub species_id: i64,
    pub flower_length: f64,
    pub flower_width: f64,
    pub flower_ratio: f64,
    #[serde(default)]
    pub flower_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Petal {
    pub petal_id: i64,
    pub flower_id: i64,
    pub petal_length: f64,
    pub petal_width: f64,
    pub petal_ratio: f64,
    #[serde(default)]
    pub petal_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sepal {
    pub sepal_id: i64,
    pub flower_id: i64,
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub sepal_ratio: f64,
    #[serde(default)]
    pub sepal_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCreate {
    pub family: String,
    pub genus: String,
    pub scientific_name: String,
    pub chinese_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    pub conservation_status: ConservationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowerCreate {
    pub species_id: i64,
    pub flower_length: f64,
    pub flower_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flower_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetalCreate {
    pub flower_id: i64,
    pub petal_length: f64,
    pub petal_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub petal_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepalCreate {
    pub flower_id: i64,
    pub sepal_length: f64,
    pub sepal_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sepal_area: Option<f64>,
}

/// Registration payload; `admin_secret` grants the admin role
#[derive(Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
}

impl std::fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreate")
            .field("username", &self.username)
            .field("admin", &self.admin_secret.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub pages: u64,
    pub per_page: u64,
}

/// Paginated list answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub code: i64,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Query parameters rendered as key/value pairs
pub trait QueryParams {
    fn to_query(&self) -> Vec<(String, String)>;
}

fn push<T: ToString>(query: &mut Vec<(String, String)>, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        query.push((key.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesQuery {
    pub family: Option<String>,
    pub genus: Option<String>,
    pub conservation_status: Option<ConservationStatus>,
    pub scientific_name: Option<String>,
    pub chinese_name: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl QueryParams for SpeciesQuery {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        push(&mut query, "family", &self.family);
        push(&mut query, "genus", &self.genus);
        push(
            &mut query,
            "conservation_status",
            &self.conservation_status.map(|s| s.label()),
        );
        push(&mut query, "scientific_name", &self.scientific_name);
        push(&mut query, "chinese_name", &self.chinese_name);
        push(&mut query, "page", &self.page);
        push(&mut query, "limit", &self.limit);
        query
    }
}

/// Filters shared by the flower, petal and sepal listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphologyQuery {
    pub species_ids: Vec<i64>,
    pub min_length: Option<f64>,
    pub max_length: Option<f64>,
    pub min_width: Option<f64>,
    pub max_width: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl QueryParams for MorphologyQuery {
    fn to_query(&self) -> Vec<(String, String)> {
        // Arrays go out as repeated keys, without brackets
        let mut query: Vec<(String, String)> = self
            .species_ids
            .iter()
            .map(|id| ("species_ids".to_string(), id.to_string()))
            .collect();
        push(&mut query, "min_length", &self.min_length);
        push(&mut query, "max_length", &self.max_length);
        push(&mut query, "min_width", &self.min_width);
        push(&mut query, "max_width", &self.max_width);
        push(&mut query, "min_area", &self.min_area);
        push(&mut query, "max_area", &self.max_area);
        push(&mut query, "page", &self.page);
        push(&mut query, "limit", &self.limit);
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub username: Option<String>,
    pub role: Option<Role>,
}

impl QueryParams for UserQuery {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        push(&mut query, "username", &self.username);
        push(&mut query, "role", &self.role);
        query
    }
}
