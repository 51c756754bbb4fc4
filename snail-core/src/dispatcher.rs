//! Dispatch of a [`MatchResult`] into a response.
//!
//! ```text
//! Idle -> Matching -> Matched    -> ExecutingMiddleware -> ExecutingHandler -> Responded | Errored
//!                  -> StaticFile -> Responded | Errored
//!                  -> NotFound   -> Responded
//! ```
//!
//! Static files and not-found results never run middleware, and neither do
//! closure routes: closures are called directly with the captured parameters.
//! Controller actions run inside the route's middleware chain. Handler code
//! runs on its own task, so a panic becomes an error response instead of
//! tearing down the worker. Output is committed only after the whole chain
//! succeeded, so a response never mixes success and error bodies.

use crate::handler::{controller_id, controller_lookup_error, ActionContext, BoxFuture};
use crate::middleware::{MiddlewareRegistry, Terminal};
use crate::routing::{HandlerDescriptor, MatchResult, RouteMatch};
use crate::static_files::StaticFiles;
use crate::{Container, Error, HttpMethod, HttpRequest, HttpResponse, Result};
use serde_json::json;
use snail_log::{LogSink, NullSink};
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, trace};

/// Where a request ended up, or is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Matching,
    Matched,
    StaticFile,
    NotFound,
    ExecutingMiddleware,
    ExecutingHandler,
    Responded,
    Errored,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Responded | DispatchState::Errored)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Final response plus the terminal state that produced it.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub response: HttpResponse,
    pub state: DispatchState,
}

impl DispatchOutcome {
    pub fn into_response(self) -> HttpResponse {
        self.response
    }
}

/// Runs matched requests.
#[derive(Clone)]
pub struct Dispatcher {
    container: Container,
    middleware: MiddlewareRegistry,
    debug: bool,
    timeout: Option<Duration>,
    sink: Arc<dyn LogSink>,
}

impl Dispatcher {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            middleware: MiddlewareRegistry::new(),
            debug: false,
            timeout: None,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_middleware(mut self, registry: MiddlewareRegistry) -> Self {
        self.middleware = registry;
        self
    }

    /// Include error details and a backtrace in 5xx bodies.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Per-request deadline, measured from the start of dispatch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub async fn dispatch(&self, request: HttpRequest, matched: MatchResult) -> DispatchOutcome {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let method = request.method;
        let path = request.path.clone();

        let result = match matched {
            MatchResult::StaticFile { path: file } => {
                trace!(state = %DispatchState::StaticFile, file = %file.display());
                StaticFiles::serve(&file).await
            }
            MatchResult::NotFound { method, path } => {
                trace!(state = %DispatchState::NotFound, %method, path = %path);
                let err = Error::RouteNotFound(format!("{} /{}", method, path.trim_start_matches('/')));
                let response = self.error_response(&err);
                self.log_outcome(method, &path, response.status);
                return DispatchOutcome {
                    response,
                    state: DispatchState::Responded,
                };
            }
            MatchResult::Matched(route) => {
                trace!(state = %DispatchState::Matched, group = %route.group, path = %route.path);
                self.run_route(request, route, deadline).await
            }
        };

        let outcome = match result {
            Ok(response) => DispatchOutcome {
                response,
                state: DispatchState::Responded,
            },
            Err(err) => {
                self.log_error(method, &path, &err);
                DispatchOutcome {
                    response: self.error_response(&err),
                    state: DispatchState::Errored,
                }
            }
        };
        self.log_outcome(method, &path, outcome.response.status);
        outcome
    }

    async fn run_route(
        &self,
        mut request: HttpRequest,
        route: RouteMatch,
        deadline: Option<Instant>,
    ) -> Result<HttpResponse> {
        request.params = route.params.clone();

        match route.handler {
            HandlerDescriptor::Closure(handler) => {
                trace!(state = %DispatchState::ExecutingHandler, "closure route");
                check_deadline(deadline, "before handler")?;
                let output = run_guarded(handler(route.params), deadline).await?;
                Ok(output.into_response())
            }
            HandlerDescriptor::ControllerAction {
                namespace,
                controller,
                action,
            } => {
                let chain = self.middleware.build_chain(&route.middlewares)?;
                let id = controller_id(&namespace, &controller);
                let terminal = self.action_terminal(id, action, deadline);

                check_deadline(deadline, "before middleware")?;
                trace!(state = %DispatchState::ExecutingMiddleware, middlewares = chain.len());
                let work: BoxFuture<Result<HttpResponse>> =
                    Box::pin(async move { chain.apply(request, terminal).await });
                let response = run_guarded(work, deadline).await?;
                check_deadline(deadline, "after middleware")?;
                Ok(response)
            }
        }
    }

    fn action_terminal(
        &self,
        id: String,
        action: String,
        deadline: Option<Instant>,
    ) -> Terminal {
        let container = self.container.clone();
        Arc::new(move |req: HttpRequest| -> BoxFuture<Result<HttpResponse>> {
            let container = container.clone();
            let id = id.clone();
            let action = action.clone();
            Box::pin(async move {
                check_deadline(deadline, "before handler")?;
                trace!(state = %DispatchState::ExecutingHandler, controller = %id, action = %action);

                let controller = container
                    .resolve_controller(&id)
                    .map_err(|err| controller_lookup_error(&id, err))?;
                if !controller.has_action(&action) {
                    return Err(Error::HandlerNotFound(format!(
                        "Action not found: {}::{}",
                        id, action
                    )));
                }

                // Params as the middleware chain left them.
                let ctx = ActionContext {
                    params: req.params.clone(),
                    request: req,
                    container,
                };
                Ok(controller.call(&action, ctx).await?.into_response())
            })
        })
    }

    /// Translate an error into the response sent to the client.
    ///
    /// Routing failures always get the same short body. Other errors get the
    /// message, its source chain and a backtrace in debug mode, and only the
    /// status text otherwise.
    pub fn error_response(&self, err: &Error) -> HttpResponse {
        let status = err.status();
        let body = if err.is_routing_failure() {
            json!({ "error": err.to_string(), "status": status.as_u16() })
        } else if self.debug {
            let mut causes = Vec::new();
            let mut source = err.source();
            while let Some(cause) = source {
                causes.push(cause.to_string());
                source = cause.source();
            }
            let backtrace = Backtrace::force_capture().to_string();
            json!({
                "error": err.kind(),
                "message": err.to_string(),
                "status": status.as_u16(),
                "causes": causes,
                "backtrace": backtrace.lines().map(str::trim).collect::<Vec<_>>(),
            })
        } else {
            json!({
                "error": status.canonical_reason().unwrap_or("Error"),
                "status": status.as_u16(),
            })
        };

        let response = HttpResponse::new(status.as_u16());
        match response.clone().with_json(&body) {
            Ok(response) => response,
            Err(_) => response.with_text(status.canonical_reason().unwrap_or("Error")),
        }
    }

    fn log_error(&self, method: HttpMethod, path: &str, err: &Error) {
        error!(%method, path, kind = err.kind(), error = %err, "Request failed");
        self.sink.log(&format!("{} {}: {}", method, path, err), "error");
    }

    fn log_outcome(&self, method: HttpMethod, path: &str, status: u16) {
        debug!(%method, path, status, "Request dispatched");
        self.sink.log(&format!("{} {} -> {}", method, path, status), "router");
    }
}

fn check_deadline(deadline: Option<Instant>, stage: &str) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            Err(Error::DeadlineExceeded(stage.to_string()))
        }
        _ => Ok(()),
    }
}

/// Run handler code on its own task, under the deadline if there is one.
async fn run_guarded<T: Send + 'static>(
    future: BoxFuture<Result<T>>,
    deadline: Option<Instant>,
) -> Result<T> {
    let mut task = tokio::spawn(future);
    let joined = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(Error::DeadlineExceeded("while handling".to_string()));
            }
        },
        None => task.await,
    };
    joined.map_err(join_error)?
}

fn join_error(err: JoinError) -> Error {
    if !err.is_panic() {
        return Error::Internal("handler task was cancelled".to_string());
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::Internal(format!("handler panicked: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Router, RouterSettings, RouteTable};

    #[test]
    fn test_routing_failures_ignore_debug_mode() {
        let err = Error::HandlerNotFound("Controller class not found: App::Blog".into());
        let quiet = Dispatcher::new(Container::new()).error_response(&err);
        let loud = Dispatcher::new(Container::new())
            .with_debug(true)
            .error_response(&err);
        assert_eq!(quiet.status, 500);
        assert_eq!(quiet.body, loud.body);
    }

    #[test]
    fn test_debug_mode_reveals_details() {
        let err = Error::Internal("database exploded".into());
        let quiet = Dispatcher::new(Container::new()).error_response(&err);
        assert!(!quiet.text().contains("database exploded"));

        let loud = Dispatcher::new(Container::new())
            .with_debug(true)
            .error_response(&err);
        let body: serde_json::Value = serde_json::from_slice(&loud.body).unwrap();
        assert_eq!(body["error"], "Internal");
        assert_eq!(body["message"], "Internal server error: database exploded");
        assert!(body["backtrace"].is_array());
    }

    #[tokio::test]
    async fn test_not_found_skips_everything() {
        let router = Router::new(RouteTable::new(), RouterSettings::default())
            .with_probe(Arc::new(Container::new()));
        let request = HttpRequest::new(HttpMethod::GET, "/missing");
        let matched = router.match_request(&request);

        let outcome = Dispatcher::new(Container::new()).dispatch(request, matched).await;
        assert_eq!(outcome.response.status, 404);
        assert_eq!(outcome.state, DispatchState::Responded);
    }

    #[tokio::test]
    async fn test_panics_become_errors() {
        let future: BoxFuture<Result<()>> = Box::pin(async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        let err = run_guarded(future, None).await.unwrap_err();
        assert!(err.to_string().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_deadline_cuts_slow_handlers() {
        let future: BoxFuture<Result<()>> = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });
        let deadline = Some(Instant::now() + Duration::from_millis(20));
        let err = run_guarded(future, deadline).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded(_)));
        assert_eq!(err.status_code(), 504);
    }
}
