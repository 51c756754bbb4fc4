// Request router: table walk plus convention fallback

use super::pattern::normalize;
use super::table::{HandlerDescriptor, RouteTable, DEFAULT_GROUP};
use super::RouteParams;
use crate::handler::controller_id;
use crate::static_files::StaticFiles;
use crate::{HttpMethod, HttpRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

/// Namespace/controller/action used when a path leaves them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupDefault {
    pub namespace: String,
    pub controller: String,
    pub action: String,
}

impl Default for GroupDefault {
    fn default() -> Self {
        Self {
            namespace: "App::Controllers".to_string(),
            controller: "Index".to_string(),
            action: "index".to_string(),
        }
    }
}

/// How trailing convention segments become parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMode {
    /// `/k1/v1/k2/v2` into named params; an odd trailing key is dropped.
    #[default]
    KeyValue,
    /// Every remaining segment appended in order.
    Positional,
}

/// Router settings, read from the `def` configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Global default triple.
    pub route: GroupDefault,
    /// Per-group defaults, keyed by the first path segment.
    pub group: HashMap<String, GroupDefault>,
    /// Suffixes stripped before matching. At most one is removed.
    pub suffixes: Vec<String>,
    pub param_mode: ParamMode,
    /// Directory checked when convention resolution finds nothing callable.
    pub static_root: Option<PathBuf>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            route: GroupDefault::default(),
            group: HashMap::new(),
            suffixes: vec![".html".to_string(), ".do".to_string()],
            param_mode: ParamMode::KeyValue,
            static_root: None,
        }
    }
}

impl RouterSettings {
    fn group_default(&self, segment: &str) -> Option<(&str, &GroupDefault)> {
        self.group
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(segment))
            .map(|(name, default)| (name.as_str(), default))
    }
}

/// Answers whether a controller id can be supplied. Implemented by the container.
pub trait HandlerProbe: Send + Sync {
    fn has_controller(&self, id: &str) -> bool;
}

/// A successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub handler: HandlerDescriptor,
    pub params: RouteParams,
    pub middlewares: Vec<String>,
    /// Template of the table route, `None` for convention matches.
    pub template: Option<String>,
    pub group: String,
    pub method: HttpMethod,
    pub path: String,
}

/// Outcome of [`Router::match_request`]. Exactly one variant per request.
#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched(RouteMatch),
    StaticFile { path: PathBuf },
    NotFound { method: HttpMethod, path: String },
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MatchResult::NotFound { .. })
    }

    pub fn as_match(&self) -> Option<&RouteMatch> {
        match self {
            MatchResult::Matched(m) => Some(m),
            _ => None,
        }
    }
}

/// Maps requests onto handlers.
///
/// Matching is a pure function of the table, the settings and the probe: the
/// router holds no per-request state and can be shared across workers.
#[derive(Clone)]
pub struct Router {
    table: Arc<RouteTable>,
    settings: RouterSettings,
    probe: Option<Arc<dyn HandlerProbe>>,
    static_files: Option<StaticFiles>,
}

impl Router {
    pub fn new(table: RouteTable, settings: RouterSettings) -> Self {
        let static_files = settings.static_root.clone().map(StaticFiles::new);
        Self {
            table: Arc::new(table),
            settings,
            probe: None,
            static_files,
        }
    }

    /// Probe used to decide whether a convention match is callable. Without
    /// one, every convention match is treated as callable.
    pub fn with_probe(mut self, probe: Arc<dyn HandlerProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(files);
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Normalize a path: no surrounding slashes, one configured suffix removed,
    /// `/` when nothing is left.
    pub fn normalize_path(&self, path: &str) -> String {
        let trimmed = path.trim_matches('/');
        let stripped = self
            .settings
            .suffixes
            .iter()
            .filter(|suffix| !suffix.is_empty())
            .find_map(|suffix| trimmed.strip_suffix(suffix.as_str()))
            .unwrap_or(trimmed);
        normalize(stripped)
    }

    pub fn match_request(&self, request: &HttpRequest) -> MatchResult {
        self.match_path(request.method, &request.path)
    }

    /// Route a method and path (without query string).
    pub fn match_path(&self, method: HttpMethod, raw_path: &str) -> MatchResult {
        let path = self.normalize_path(raw_path);

        for (group, route) in self.table.routes() {
            if !route.methods().allows(method) {
                continue;
            }
            let Some(values) = route.matcher().matches(&path) else {
                continue;
            };

            let values = values.iter().map(|v| decode(v)).collect();
            let mut params = RouteParams::from_captures(route.matcher().names(), values);
            params.merge_extras(route.extras());

            trace!(route = route.template(), %method, path = %path, "route matched");
            return MatchResult::Matched(RouteMatch {
                handler: route.handler().clone(),
                params,
                middlewares: route.middlewares().to_vec(),
                template: Some(route.template().to_string()),
                group: group.name().to_string(),
                method,
                path,
            });
        }

        self.resolve_by_convention(method, raw_path, path)
    }

    fn resolve_by_convention(&self, method: HttpMethod, raw_path: &str, path: String) -> MatchResult {
        let segments: Vec<String> = if path == "/" {
            Vec::new()
        } else {
            path.split('/').map(decode).collect()
        };

        let (group, default, rest) = match segments.first() {
            Some(first) => match self.settings.group_default(first) {
                Some((name, default)) => (name.to_string(), default, &segments[1..]),
                None => (DEFAULT_GROUP.to_string(), &self.settings.route, &segments[..]),
            },
            None => (DEFAULT_GROUP.to_string(), &self.settings.route, &segments[..]),
        };

        let controller = rest
            .first()
            .filter(|s| !s.is_empty())
            .map(|s| ucfirst(s))
            .unwrap_or_else(|| default.controller.clone());
        let action = rest
            .get(1)
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| default.action.clone());

        let mut params = RouteParams::new();
        let trailing = rest.get(2..).unwrap_or_default();
        match self.settings.param_mode {
            ParamMode::KeyValue => {
                for pair in trailing.chunks_exact(2) {
                    params.insert(pair[0].clone(), pair[1].clone());
                }
            }
            ParamMode::Positional => {
                for value in trailing {
                    params.push(value.clone());
                }
            }
        }

        let id = controller_id(&default.namespace, &controller);
        let callable = self
            .probe
            .as_ref()
            .map(|probe| probe.has_controller(&id))
            .unwrap_or(true);

        if callable {
            debug!(controller = %id, action = %action, path = %path, "convention route");
            return MatchResult::Matched(RouteMatch {
                handler: HandlerDescriptor::ControllerAction {
                    namespace: default.namespace.clone(),
                    controller,
                    action,
                },
                params,
                middlewares: Vec::new(),
                template: None,
                group,
                method,
                path,
            });
        }

        // Unstripped path first so `page.html` is found on disk, then the normalized one.
        let on_disk = self.static_files.as_ref().and_then(|files| {
            files
                .resolve(raw_path.trim_matches('/'))
                .or_else(|| files.resolve(&path))
        });
        match on_disk {
            Some(file) => MatchResult::StaticFile { path: file },
            None => {
                debug!(%method, path = %path, "no route");
                MatchResult::NotFound { method, path }
            }
        }
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
