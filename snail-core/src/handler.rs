// Handler types: closures, controllers and what they return

use crate::container::Instance;
use crate::routing::RouteParams;
use crate::{Container, Error, HttpRequest, HttpResponse, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future used at the handler seams.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Inline route handler. Receives the captured parameters only.
pub type ClosureHandler = Arc<dyn Fn(RouteParams) -> BoxFuture<Result<ActionOutput>> + Send + Sync>;

/// Wrap an async closure as a [`ClosureHandler`].
///
/// ```
/// use snail_core::handler::closure;
///
/// let handler = closure(|params| async move {
///     Ok(format!("hello {}", params.at(0).unwrap_or("stranger")))
/// });
/// # let _ = handler;
/// ```
pub fn closure<F, Fut, O>(f: F) -> ClosureHandler
where
    F: Fn(RouteParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Into<ActionOutput> + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |params: RouteParams| -> BoxFuture<Result<ActionOutput>> {
        let f = f.clone();
        Box::pin(async move { f(params).await.map(Into::into) })
    })
}

/// Value returned by an action or closure.
///
/// Non-empty bodies become the response body with status 200; an empty body or
/// [`ActionOutput::Empty`] yields an empty 200 response; a full response is
/// passed through untouched.
#[derive(Debug, Clone)]
pub enum ActionOutput {
    Empty,
    Body(Vec<u8>),
    Response(HttpResponse),
}

impl ActionOutput {
    pub fn into_response(self) -> HttpResponse {
        match self {
            ActionOutput::Empty => HttpResponse::ok(),
            ActionOutput::Body(body) if body.is_empty() => HttpResponse::ok(),
            ActionOutput::Body(body) => HttpResponse::ok()
                .with_header("Content-Type", "text/html; charset=utf-8")
                .with_body(body),
            ActionOutput::Response(response) => response,
        }
    }
}

impl From<()> for ActionOutput {
    fn from(_: ()) -> Self {
        ActionOutput::Empty
    }
}

impl From<String> for ActionOutput {
    fn from(body: String) -> Self {
        ActionOutput::Body(body.into_bytes())
    }
}

impl From<&str> for ActionOutput {
    fn from(body: &str) -> Self {
        ActionOutput::Body(body.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for ActionOutput {
    fn from(body: Vec<u8>) -> Self {
        ActionOutput::Body(body)
    }
}

impl From<HttpResponse> for ActionOutput {
    fn from(response: HttpResponse) -> Self {
        ActionOutput::Response(response)
    }
}

/// Everything an action gets to see.
pub struct ActionContext {
    pub request: HttpRequest,
    pub params: RouteParams,
    pub container: Container,
}

impl ActionContext {
    /// Read request input by dotted path.
    ///
    /// The root object has `params` (named route params), `args` (positional),
    /// `query`, and `body` (the JSON body, if any). An empty path returns the
    /// whole object.
    pub fn input(&self, path: &str) -> Option<Value> {
        let body = self.request.json::<Value>().unwrap_or(Value::Null);
        let root = serde_json::json!({
            "params": self.params.named(),
            "args": self.params.positional(),
            "query": self.request.query_params,
            "body": body,
        });

        if path.is_empty() {
            return Some(root);
        }

        path.split('.')
            .try_fold(&root, |node, key| match node {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
            .cloned()
    }
}

/// Controller-invocation adapter.
///
/// Controllers are bound in the [`Container`] under
/// `"{namespace}::{Controller}"` and dispatch actions by name.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Whether `action` names a callable action.
    fn has_action(&self, action: &str) -> bool;

    /// Run `action`. Only called after `has_action` returned true.
    async fn call(&self, action: &str, ctx: ActionContext) -> Result<ActionOutput>;
}

impl Container {
    /// Bind a controller factory. Controllers are built fresh for every resolution.
    pub fn bind_controller<C, F>(&self, id: &str, factory: F) -> Result<&Self>
    where
        C: Controller,
        F: Fn(&Container) -> Result<C> + Send + Sync + 'static,
    {
        self.bind_factory(
            id,
            move |container| {
                let controller: Arc<dyn Controller> = Arc::new(factory(container)?);
                let instance: Instance = Arc::new(controller);
                Ok(instance)
            },
            false,
        )
    }

    /// Resolve a controller bound with [`Container::bind_controller`].
    pub fn resolve_controller(&self, id: &str) -> Result<Arc<dyn Controller>> {
        let controller = self.resolve_as::<Arc<dyn Controller>>(id)?;
        Ok(controller.as_ref().clone())
    }
}

/// Controller id used for the container lookup.
pub fn controller_id(namespace: &str, controller: &str) -> String {
    if namespace.is_empty() {
        controller.to_string()
    } else {
        format!("{}::{}", namespace, controller)
    }
}

/// Map a container failure while looking up a controller onto the routing error.
pub(crate) fn controller_lookup_error(id: &str, err: Error) -> Error {
    match err {
        Error::ServiceNotFound(_) | Error::ServiceTypeMismatch { .. } => {
            Error::HandlerNotFound(format!("Controller class not found: {}", id))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;

    #[test]
    fn test_output_into_response() {
        assert_eq!(ActionOutput::from(()).into_response().body, Vec::<u8>::new());
        let res = ActionOutput::from("hello").into_response();
        assert_eq!(res.status, 200);
        assert_eq!(res.text(), "hello");
        let res = ActionOutput::from(HttpResponse::new(201)).into_response();
        assert_eq!(res.status, 201);
    }

    #[test]
    fn test_controller_id() {
        assert_eq!(controller_id("App::Controllers", "Index"), "App::Controllers::Index");
        assert_eq!(controller_id("", "Index"), "Index");
    }

    #[test]
    fn test_input_drills_into_sources() {
        let mut params = RouteParams::new();
        params.push("42");
        params.insert("id", "42");
        let request = HttpRequest::new(HttpMethod::POST, "/user/42?tab=posts")
            .with_body(r#"{"user":{"name":"sam"}}"#);
        let ctx = ActionContext {
            request,
            params,
            container: Container::new(),
        };

        assert_eq!(ctx.input("params.id"), Some(Value::from("42")));
        assert_eq!(ctx.input("args.0"), Some(Value::from("42")));
        assert_eq!(ctx.input("query.tab"), Some(Value::from("posts")));
        assert_eq!(ctx.input("body.user.name"), Some(Value::from("sam")));
        assert_eq!(ctx.input("body.user.missing"), None);
        assert!(ctx.input("").is_some());
    }

    #[tokio::test]
    async fn test_closure_wrapper() {
        let handler = closure(|params| async move { Ok(format!("{} items", params.len())) });
        let mut params = RouteParams::new();
        params.push("a");
        let output = handler(params).await.unwrap();
        assert_eq!(output.into_response().text(), "1 items");
    }
}
