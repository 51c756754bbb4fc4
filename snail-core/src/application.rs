// Application wiring and HTTP server

use crate::config::{ConfigReader, FrameworkSettings};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::middleware::MiddlewareRegistry;
use crate::routing::{PatternCompiler, RouteTable, Router};
use crate::{Container, Error, HttpMethod, HttpRequest, HttpResponse, Result};
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use snail_log::LogSink;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Router and dispatcher sharing one container.
#[derive(Clone)]
pub struct Application {
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn new(router: Router, dispatcher: Dispatcher) -> Self {
        Self {
            router: Arc::new(router),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Build from the `route`, `def` and `snail` config files.
    ///
    /// The container becomes the router's handler probe and gets the
    /// configured services namespace.
    pub fn from_config(
        config: &dyn ConfigReader,
        container: Container,
        middleware: MiddlewareRegistry,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self> {
        let settings = FrameworkSettings::from_reader(config)?;
        let container = container
            .with_services_namespace(&settings.services_namespace)
            .with_sink(sink.clone());

        let table = match config.get("route") {
            Some(routes) => RouteTable::from_config(&routes, &PatternCompiler::new())?,
            None => RouteTable::new(),
        };
        info!(
            routes = table.len(),
            debug = settings.debug,
            "Application configured"
        );

        let router = Router::new(table, settings.router.clone())
            .with_probe(Arc::new(container.clone()));
        let mut dispatcher = Dispatcher::new(container)
            .with_middleware(middleware)
            .with_debug(settings.debug)
            .with_sink(sink);
        if let Some(timeout) = settings.request_timeout {
            dispatcher = dispatcher.with_timeout(timeout);
        }

        Ok(Self::new(router, dispatcher))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn container(&self) -> &Container {
        self.dispatcher.container()
    }

    /// Match and dispatch one request.
    pub async fn handle(&self, request: HttpRequest) -> DispatchOutcome {
        let matched = self.router.match_request(&request);
        self.dispatcher.dispatch(request, matched).await
    }

    /// Serve HTTP/1 on `addr` until the listener fails.
    pub async fn listen(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %addr, "Server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let app = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { handle_request(req, app).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %err, "Connection closed with error");
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<IncomingBody>,
    app: Application,
) -> std::result::Result<Response<Full<bytes::Bytes>>, hyper::Error> {
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = match req.method().as_str().parse::<HttpMethod>() {
        Ok(method) => {
            let mut request = HttpRequest::new(method, &target);
            for (name, value) in req.headers() {
                if let Ok(value) = value.to_str() {
                    request = request.with_header(name.as_str(), value);
                }
            }
            let body = req.collect().await?.to_bytes();
            request.body = body.to_vec();
            app.handle(request).await.into_response()
        }
        Err(err) => app.dispatcher.error_response(&err),
    };

    Ok(into_hyper(response))
}

fn into_hyper(response: HttpResponse) -> Response<Full<bytes::Bytes>> {
    let status = response.status;
    let mut builder = Response::builder().status(status);
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    match builder.body(Full::new(bytes::Bytes::from(response.body))) {
        Ok(response) => response,
        Err(err) => {
            let err = Error::Internal(format!("invalid response ({}): {}", status, err));
            error!(error = %err, "Dropping malformed response");
            let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}
