//! Route table: ordered groups of compiled route descriptors.
//!
//! Declaration order is preserved at both levels (groups, then routes inside a
//! group) because the router picks the first route that matches.

use super::pattern::{Matcher, PatternCompiler};
use crate::handler::{controller_id, ClosureHandler};
use crate::{Error, HttpMethod, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Name of the implicit group used when a table has no explicit groups.
pub const DEFAULT_GROUP: &str = "default";

/// What a route invokes.
#[derive(Clone)]
pub enum HandlerDescriptor {
    Closure(ClosureHandler),
    ControllerAction {
        namespace: String,
        controller: String,
        action: String,
    },
}

impl HandlerDescriptor {
    /// Parse an `"action@Controller"` reference under `namespace`.
    pub fn parse_action(namespace: &str, reference: &str) -> Result<Self> {
        let (action, controller) = reference.split_once('@').ok_or_else(|| {
            Error::Config(format!(
                "handler '{}' must have the form action@Controller",
                reference
            ))
        })?;
        let (action, controller) = (action.trim(), controller.trim());
        if action.is_empty() || controller.is_empty() {
            return Err(Error::Config(format!(
                "handler '{}' has an empty action or controller",
                reference
            )));
        }

        Ok(HandlerDescriptor::ControllerAction {
            namespace: namespace.to_string(),
            controller: controller.to_string(),
            action: action.to_string(),
        })
    }

    /// Container id of the controller, or `None` for closures.
    pub fn controller_id(&self) -> Option<String> {
        match self {
            HandlerDescriptor::Closure(_) => None,
            HandlerDescriptor::ControllerAction {
                namespace,
                controller,
                ..
            } => Some(controller_id(namespace, controller)),
        }
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerDescriptor::Closure(_) => f.write_str("Closure(<fn>)"),
            HandlerDescriptor::ControllerAction {
                namespace,
                controller,
                action,
            } => f
                .debug_struct("ControllerAction")
                .field("namespace", namespace)
                .field("controller", controller)
                .field("action", action)
                .finish(),
        }
    }
}

/// Set of allowed methods. Empty allows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFilter(Vec<HttpMethod>);

impl MethodFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn only(methods: &[HttpMethod]) -> Self {
        let mut filter = Self::default();
        for method in methods {
            if !filter.0.contains(method) {
                filter.0.push(*method);
            }
        }
        filter
    }

    /// Parse a `|`-separated list such as `"GET|post"`. Empty or `*` allows all.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() || spec == "*" {
            return Ok(Self::any());
        }

        let methods = spec
            .split('|')
            .filter(|m| !m.trim().is_empty())
            .map(|m| m.parse::<HttpMethod>())
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::Config(format!("method filter '{}': {}", spec, e)))?;
        Ok(Self::only(&methods))
    }

    pub fn allows(&self, method: HttpMethod) -> bool {
        self.0.is_empty() || self.0.contains(&method)
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn methods(&self) -> &[HttpMethod] {
        &self.0
    }
}

/// One compiled route. Immutable once built.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    matcher: Matcher,
    methods: MethodFilter,
    handler: HandlerDescriptor,
    middlewares: Vec<String>,
    extras: HashMap<String, String>,
}

impl RouteDescriptor {
    pub fn template(&self) -> &str {
        self.matcher.template()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn methods(&self) -> &MethodFilter {
        &self.methods
    }

    pub fn handler(&self) -> &HandlerDescriptor {
        &self.handler
    }

    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    pub fn extras(&self) -> &HashMap<String, String> {
        &self.extras
    }
}

/// Uncompiled route, as declared in code.
///
/// ```
/// use snail_core::routing::RouteDefinition;
///
/// let def = RouteDefinition::action("hello/:any", "App::Controllers", "hello@Index")
///     .methods("GET")
///     .middleware("auth")
///     .param("lang", "en");
/// # let _ = def;
/// ```
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    template: String,
    methods: String,
    handler: std::result::Result<HandlerDescriptor, String>,
    middlewares: Vec<String>,
    extras: HashMap<String, String>,
}

impl RouteDefinition {
    /// Controller action route. `reference` is `"action@Controller"`.
    pub fn action(template: &str, namespace: &str, reference: &str) -> Self {
        let handler =
            HandlerDescriptor::parse_action(namespace, reference).map_err(|e| e.to_string());
        Self::with_handler(template, handler)
    }

    /// Closure route. Closures bypass middleware at dispatch time.
    pub fn closure(template: &str, handler: ClosureHandler) -> Self {
        Self::with_handler(template, Ok(HandlerDescriptor::Closure(handler)))
    }

    fn with_handler(
        template: &str,
        handler: std::result::Result<HandlerDescriptor, String>,
    ) -> Self {
        Self {
            template: template.to_string(),
            methods: String::new(),
            handler,
            middlewares: Vec::new(),
            extras: HashMap::new(),
        }
    }

    pub fn methods(mut self, filter: &str) -> Self {
        self.methods = filter.to_string();
        self
    }

    pub fn middleware(mut self, name: &str) -> Self {
        self.middlewares.push(name.to_string());
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.extras.insert(key.to_string(), value.to_string());
        self
    }

    fn compile(self, compiler: &PatternCompiler) -> Result<RouteDescriptor> {
        let handler = self.handler.map_err(Error::Config)?;
        Ok(RouteDescriptor {
            matcher: compiler.compile(&self.template)?,
            methods: MethodFilter::parse(&self.methods)?,
            handler,
            middlewares: self.middlewares,
            extras: self.extras,
        })
    }
}

/// Named, ordered list of routes.
#[derive(Debug, Clone)]
pub struct RouteGroup {
    name: String,
    routes: Vec<RouteDescriptor>,
}

impl RouteGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }
}

/// Ordered mapping from group name to ordered routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    groups: Vec<RouteGroup>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new(PatternCompiler::new())
    }

    /// Builder using a compiler with extra placeholder types.
    pub fn builder_with(compiler: PatternCompiler) -> RouteTableBuilder {
        RouteTableBuilder::new(compiler)
    }

    pub fn groups(&self) -> &[RouteGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&RouteGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All routes in match order.
    pub fn routes(&self) -> impl Iterator<Item = (&RouteGroup, &RouteDescriptor)> {
        self.groups
            .iter()
            .flat_map(|group| group.routes.iter().map(move |route| (group, route)))
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.routes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a table from the `route` configuration value.
    ///
    /// Either `{ group: { template: [..] } }` or, for the implicit default group,
    /// `{ template: [..] }`; both shapes may be mixed. Each handler array reads
    /// `[path, namespace, "action@Controller", methods?, extras?, middlewares?]`;
    /// the template is the map key and element 0 is informational. Without a
    /// method element only `GET` is allowed.
    pub fn from_config(value: &Value, compiler: &PatternCompiler) -> Result<Self> {
        let Value::Object(top) = value else {
            return Err(Error::Config("route table must be an object".to_string()));
        };

        let mut builder = RouteTable::builder_with(compiler.clone());

        for (key, entry) in top {
            match entry {
                // The default group takes the position of its first route.
                Value::Array(spec) => {
                    builder = builder.group(DEFAULT_GROUP).route(parse_route(key, spec)?).done()
                }
                Value::Object(routes) => {
                    let mut group = builder.group(key);
                    for (template, spec) in routes {
                        let Value::Array(spec) = spec else {
                            return Err(Error::Config(format!(
                                "route '{}' in group '{}' must be an array",
                                template, key
                            )));
                        };
                        group = group.route(parse_route(template, spec)?);
                    }
                    builder = group.done();
                }
                _ => {
                    return Err(Error::Config(format!(
                        "route table entry '{}' must be an array or an object",
                        key
                    )))
                }
            }
        }

        builder.build()
    }
}

fn parse_route(template: &str, spec: &[Value]) -> Result<RouteDefinition> {
    if spec.len() < 3 {
        return Err(Error::Config(format!(
            "route '{}' needs at least [path, namespace, \"action@Controller\"]",
            template
        )));
    }

    let namespace = spec[1].as_str().unwrap_or_default();
    let reference = spec[2].as_str().ok_or_else(|| {
        Error::Config(format!("route '{}': handler must be a string", template))
    })?;

    let mut def = RouteDefinition::action(template, namespace, reference);
    def = match spec.get(3) {
        None | Some(Value::Null) => def.methods("GET"),
        Some(Value::String(filter)) => def.methods(filter),
        Some(other) => {
            return Err(Error::Config(format!(
                "route '{}': method filter must be a string, got {}",
                template, other
            )))
        }
    };

    if let Some(Value::Object(extras)) = spec.get(4) {
        for (key, value) in extras {
            if key == "middlewares" {
                def.middlewares.extend(string_list(value));
            } else {
                def.extras.insert(key.clone(), scalar_to_string(value));
            }
        }
    }
    if let Some(value @ Value::Array(_)) = spec.get(5) {
        def.middlewares.extend(string_list(value));
    }

    Ok(def)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(name) => vec![name.clone()],
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builder for [`RouteTable`]. Routes compile in [`RouteTableBuilder::build`].
pub struct RouteTableBuilder {
    compiler: PatternCompiler,
    groups: Vec<(String, Vec<RouteDefinition>)>,
}

impl RouteTableBuilder {
    fn new(compiler: PatternCompiler) -> Self {
        Self {
            compiler,
            groups: Vec::new(),
        }
    }

    /// Open a group. Reopening an existing name appends to it.
    pub fn group(self, name: &str) -> RouteGroupBuilder {
        RouteGroupBuilder {
            parent: self,
            name: name.to_string(),
            routes: Vec::new(),
        }
    }

    /// Add a route to the default group.
    pub fn route(self, def: RouteDefinition) -> Self {
        self.group(DEFAULT_GROUP).route(def).done()
    }

    /// Add a closure route to the default group.
    pub fn closure(self, template: &str, methods: &str, handler: ClosureHandler) -> Self {
        self.route(RouteDefinition::closure(template, handler).methods(methods))
    }

    pub fn build(self) -> Result<RouteTable> {
        let compiler = self.compiler;
        let groups = self
            .groups
            .into_iter()
            .map(|(name, defs)| {
                let routes = defs
                    .into_iter()
                    .map(|def| def.compile(&compiler))
                    .collect::<Result<Vec<_>>>()?;
                Ok(RouteGroup { name, routes })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RouteTable { groups })
    }

    fn push(&mut self, name: String, mut routes: Vec<RouteDefinition>) {
        match self.groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.append(&mut routes),
            None => self.groups.push((name, routes)),
        }
    }
}

/// Routes of one group being declared.
pub struct RouteGroupBuilder {
    parent: RouteTableBuilder,
    name: String,
    routes: Vec<RouteDefinition>,
}

impl RouteGroupBuilder {
    pub fn route(mut self, def: RouteDefinition) -> Self {
        self.routes.push(def);
        self
    }

    pub fn closure(self, template: &str, methods: &str, handler: ClosureHandler) -> Self {
        self.route(RouteDefinition::closure(template, handler).methods(methods))
    }

    /// Close the group and return to the table builder.
    pub fn done(mut self) -> RouteTableBuilder {
        self.parent.push(self.name, self.routes);
        self.parent
    }
}
