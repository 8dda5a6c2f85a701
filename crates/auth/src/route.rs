//! Route records, their access metadata, and path resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Requirement;

/// Per-route access metadata, as declared by the route table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteMeta {
    pub requires_auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_permissions: Option<Requirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_roles: Option<Requirement>,
}

impl RouteMeta {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            ..Self::default()
        }
    }

    pub fn with_permissions(mut self, permissions: impl Into<Requirement>) -> Self {
        self.requires_permissions = Some(permissions.into());
        self
    }

    pub fn with_roles(mut self, roles: impl Into<Requirement>) -> Self {
        self.requires_roles = Some(roles.into());
        self
    }
}

/// A node of the route table. Children with a leading `/` are absolute,
/// anything else is joined onto the parent path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub meta: RouteMeta,
    #[serde(default)]
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            meta: RouteMeta::default(),
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn children(mut self, children: Vec<RouteRecord>) -> Self {
        self.children = children;
        self
    }
}

/// One record on the matched chain, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    /// Absolute path pattern, e.g. `/contracts/:id`.
    pub pattern: String,
    pub name: Option<String>,
    pub meta: RouteMeta,
}

/// A resolved navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub full_path: String,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub name: Option<String>,
    pub matched: Vec<MatchedRoute>,
}

impl Location {
    /// Metadata of the innermost matched record.
    pub fn meta(&self) -> Option<&RouteMeta> {
        self.matched.last().map(|m| &m.meta)
    }

    /// True if any record on the matched chain requires a session.
    pub fn requires_auth(&self) -> bool {
        self.matched.iter().any(|m| m.meta.requires_auth)
    }
}

/// Join `path` and `query` the way locations print them.
pub fn full_path(path: &str, query: &BTreeMap<String, String>) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter())
        .finish();
    format!("{path}?{encoded}")
}

/// Split `/a/b?x=1` into its path and decoded query.
pub fn split_full_path(full: &str) -> (String, BTreeMap<String, String>) {
    let (path, query) = match full.split_once('?') {
        Some((p, q)) => (p, q),
        None => (full, ""),
    };
    let path = path.split('#').next().unwrap_or_default();
    let query = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), query)
}

/// The application's route table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// Resolve a full path (with optional query) to a location.
    pub fn resolve(&self, full: &str) -> Option<Location> {
        let (path, query) = split_full_path(full);
        let mut chain = Vec::new();
        let params = match_records(&self.routes, "", &path, &mut chain)?;
        let name = chain.last().and_then(|m| m.name.clone());

        Some(Location {
            full_path: full_path(&path, &query),
            path,
            query,
            params,
            name,
            matched: chain,
        })
    }

    /// Absolute path of the route called `name`, if it takes no parameters.
    pub fn path_for_name(&self, name: &str) -> Option<String> {
        find_named(&self.routes, "", name)
    }
}

fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        if base.is_empty() { "/".to_string() } else { base.to_string() }
    } else {
        format!("{base}/{path}")
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_pattern(pattern: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let pattern: Vec<&str> = segments(pattern).collect();
    let actual: Vec<&str> = segments(path).collect();
    if pattern.len() != actual.len() {
        return None;
    }

    let mut params = BTreeMap::new();
    for (p, a) in pattern.iter().zip(actual.iter()) {
        if let Some(param) = p.strip_prefix(':') {
            params.insert(param.to_string(), (*a).to_string());
        } else if p != a {
            return None;
        }
    }
    Some(params)
}

fn match_records(
    records: &[RouteRecord],
    base: &str,
    path: &str,
    chain: &mut Vec<MatchedRoute>,
) -> Option<BTreeMap<String, String>> {
    for record in records {
        let pattern = join(base, &record.path);
        chain.push(MatchedRoute {
            pattern: pattern.clone(),
            name: record.name.clone(),
            meta: record.meta.clone(),
        });

        if let Some(params) = match_records(&record.children, &pattern, path, chain) {
            return Some(params);
        }
        if let Some(params) = match_pattern(&pattern, path) {
            return Some(params);
        }

        chain.pop();
    }
    None
}

fn find_named(records: &[RouteRecord], base: &str, name: &str) -> Option<String> {
    for record in records {
        let pattern = join(base, &record.path);
        if record.name.as_deref() == Some(name) {
            return (!pattern.contains(':')).then_some(pattern);
        }
        if let Some(found) = find_named(&record.children, &pattern, name) {
            return Some(found);
        }
    }
    None
}
