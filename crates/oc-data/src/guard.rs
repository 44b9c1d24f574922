//! Role-based navigation decisions.
//!
//! The guard only decides; the view layer performs the redirect and sets the
//! page title.

use oc_auth::{Role, Session};

pub const APP_NAME: &str = "Orchid Morphology Database";

pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";

/// Access rules attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub role: Option<Role>,
    pub title: Option<&'static str>,
}

impl RouteMeta {
    pub const fn public(title: &'static str) -> Self {
        Self {
            requires_auth: false,
            role: None,
            title: Some(title),
        }
    }

    pub const fn protected(role: Role, title: &'static str) -> Self {
        Self {
            requires_auth: true,
            role: Some(role),
            title: Some(title),
        }
    }
}

/// Route table, matched by longest path prefix
const ROUTES: &[(&str, RouteMeta)] = &[
    (LOGIN, RouteMeta::public("Login")),
    (REGISTER, RouteMeta::public("Register")),
    ("/user/species", RouteMeta::protected(Role::User, "Species")),
    ("/user/flower", RouteMeta::protected(Role::User, "Flowers")),
    ("/user/petal", RouteMeta::protected(Role::User, "Petals")),
    ("/user/sepal", RouteMeta::protected(Role::User, "Sepals")),
    ("/user", RouteMeta::protected(Role::User, "Species")),
    ("/admin/users", RouteMeta::protected(Role::Admin, "User Management")),
    ("/admin/species", RouteMeta::protected(Role::Admin, "Species Management")),
    ("/admin/flower", RouteMeta::protected(Role::Admin, "Flower Management")),
    ("/admin/petal", RouteMeta::protected(Role::Admin, "Petal Management")),
    ("/admin/sepal", RouteMeta::protected(Role::Admin, "Sepal Management")),
    ("/admin", RouteMeta::protected(Role::Admin, "User Management")),
];

const NOT_FOUND: RouteMeta = RouteMeta::public("Page Not Found");

/// Outcome of a navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allow { title: String },
    Redirect(String),
}

/// Landing page of a role
pub fn home_for(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin",
        Role::User => "/user",
    }
}

/// Where `/` leads for the given session
pub fn landing(session: &Session) -> &'static str {
    match session.identity() {
        Some(identity) if session.is_authenticated() => home_for(identity.role),
        _ => LOGIN,
    }
}

/// Access rules for `path`
pub fn route_meta(path: &str) -> RouteMeta {
    let path = path.split('?').next().unwrap_or(path);
    ROUTES
        .iter()
        .filter(|(prefix, _)| {
            path == *prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, meta)| *meta)
        .unwrap_or(NOT_FOUND)
}

fn title_for(meta: &RouteMeta) -> String {
    match meta.title {
        Some(title) => format!("{} | {}", title, APP_NAME),
        None => APP_NAME.to_string(),
    }
}

fn home_of(session: &Session) -> String {
    session
        .identity()
        .map(|i| home_for(i.role))
        .unwrap_or(LOGIN)
        .to_string()
}

/// Decide whether `session` may open `path`
pub fn guard(path: &str, session: &Session) -> Navigation {
    if path == "/" {
        return Navigation::Redirect(landing(session).to_string());
    }

    let meta = route_meta(path);

    if !meta.requires_auth {
        let bare = path.split('?').next().unwrap_or(path);
        if session.is_authenticated() && (bare == LOGIN || bare == REGISTER) {
            return Navigation::Redirect(home_of(session));
        }
        return Navigation::Allow {
            title: title_for(&meta),
        };
    }

    if !session.is_authenticated() {
        let redirect: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        return Navigation::Redirect(format!("{}?redirect={}", LOGIN, redirect));
    }

    if let Some(required) = meta.role
        && session.identity().map(|i| i.role) != Some(required)
    {
        return Navigation::Redirect(home_of(session));
    }

    Navigation::Allow {
        title: title_for(&meta),
    }
}
