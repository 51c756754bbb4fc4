// Middleware chain for controller routes

use crate::handler::BoxFuture;
use crate::{Error, HttpRequest, HttpResponse, Result};
use async_trait::async_trait;
use snail_log::LogSink;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// The rest of the chain. Calling it continues; dropping it short-circuits.
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture<Result<HttpResponse>> + Send>;

/// Innermost link of the chain.
pub type Terminal = Arc<dyn Fn(HttpRequest) -> BoxFuture<Result<HttpResponse>> + Send + Sync>;

/// Middleware sees the request on the way in and the response on the way out.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and in [`Error::MiddlewareAborted`].
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse>;
}

/// Ordered middleware around a terminal.
///
/// The first middleware is the outermost wrapper: it runs first before the
/// terminal and last after it. A middleware that fails with a server error
/// without having called `next` is reported as [`Error::MiddlewareAborted`];
/// client errors pass through unchanged.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
        }
    }

    /// Append a middleware; it becomes the innermost one.
    pub fn push<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut middlewares = (*self.middlewares).clone();
        middlewares.push(Arc::new(middleware));
        self.middlewares = Arc::new(middlewares);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.middlewares.iter().map(|m| m.name().to_string()).collect()
    }

    /// Run the chain around `terminal`.
    pub async fn apply(&self, req: HttpRequest, terminal: Terminal) -> Result<HttpResponse> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, terminal).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        terminal: Terminal,
    ) -> BoxFuture<Result<HttpResponse>> {
        let Some(middleware) = self.middlewares.get(index).cloned() else {
            trace!("Middleware chain complete, calling terminal");
            return terminal(req);
        };
        let chain = self.clone();

        trace!(middleware_index = index, middleware = middleware.name(), "Executing middleware");
        Box::pin(async move {
            let delegated = Arc::new(AtomicBool::new(false));
            let flag = delegated.clone();
            let next: Next = Box::new(move |req| {
                flag.store(true, Ordering::SeqCst);
                chain.execute_from(index + 1, req, terminal)
            });

            match middleware.handle(req, next).await {
                Err(err) if !delegated.load(Ordering::SeqCst) && !err.is_client_error() => {
                    Err(Error::MiddlewareAborted {
                        middleware: middleware.name().to_string(),
                        reason: err.to_string(),
                    })
                }
                other => other,
            }
        })
    }
}

/// Middleware instances by the names routes refer to.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Middleware + 'static>(mut self, name: &str, middleware: M) -> Self {
        self.entries.insert(name.to_string(), Arc::new(middleware));
        self
    }

    pub fn register_arc(mut self, name: &str, middleware: Arc<dyn Middleware>) -> Self {
        self.entries.insert(name.to_string(), middleware);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Chain for a route's middleware list, in the listed order.
    pub fn build_chain(&self, names: &[String]) -> Result<MiddlewareChain> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| Error::MiddlewareNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()
            .map(MiddlewareChain::from_vec)
    }
}

// ========== Built-in Middleware ==========

/// Propagates or assigns `x-request-id`.
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &str {
        "request_id"
    }

    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let request_id = req
            .header("x-request-id")
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        req.headers
            .insert("x-request-id".to_string(), request_id.clone());

        let response = next(req).await?;
        Ok(response.with_header("x-request-id", &request_id))
    }
}

/// Rejects bodies over `max_size` bytes with a 413 response.
pub struct BodySizeLimitMiddleware {
    max_size: usize,
}

impl BodySizeLimitMiddleware {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

#[async_trait]
impl Middleware for BodySizeLimitMiddleware {
    fn name(&self) -> &str {
        "body_limit"
    }

    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        if req.body.len() > self.max_size {
            return HttpResponse::new(413).with_json(&serde_json::json!({
                "error": format!("Request body exceeds maximum size of {} bytes", self.max_size),
                "status": 413,
            }));
        }

        next(req).await
    }
}

/// One line per request to a [`LogSink`], category `request`.
pub struct AccessLogMiddleware {
    sink: Arc<dyn LogSink>,
}

impl AccessLogMiddleware {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &str {
        "access_log"
    }

    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let start = Instant::now();
        let line = format!("{} /{}", req.method, req.path.trim_start_matches('/'));

        let result = next(req).await;
        let elapsed = start.elapsed().as_millis();
        match &result {
            Ok(response) => self.sink.log(
                &format!("{} -> {} ({} ms)", line, response.status, elapsed),
                "request",
            ),
            Err(err) => self.sink.log(
                &format!("{} -> {} ({} ms): {}", line, err.status_code(), elapsed, err),
                "request",
            ),
        }
        result
    }
}
