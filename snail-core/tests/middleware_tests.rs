use async_trait::async_trait;
use parking_lot::Mutex;
use snail_core::{
    BodySizeLimitMiddleware, BoxFuture, Error, HttpMethod, HttpRequest, HttpResponse, Middleware,
    MiddlewareChain, MiddlewareRegistry, Next, RequestIdMiddleware, Result, Terminal,
};
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

struct Recorder {
    label: &'static str,
    journal: Journal,
}

#[async_trait]
impl Middleware for Recorder {
    fn name(&self) -> &str {
        self.label
    }

    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        self.journal.lock().push(format!("{} in", self.label));
        let response = next(req).await;
        self.journal.lock().push(format!("{} out", self.label));
        response
    }
}

fn terminal(journal: &Journal) -> Terminal {
    let journal = journal.clone();
    Arc::new(move |_req: HttpRequest| -> BoxFuture<Result<HttpResponse>> {
        let journal = journal.clone();
        Box::pin(async move {
            journal.lock().push("handler".to_string());
            Ok(HttpResponse::ok().with_text("done"))
        })
    })
}

fn request() -> HttpRequest {
    HttpRequest::new(HttpMethod::GET, "/orders")
}

#[tokio::test]
async fn test_onion_order() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut chain = MiddlewareChain::new();
    for label in ["A", "B", "C"] {
        chain.push(Recorder {
            label,
            journal: journal.clone(),
        });
    }

    let response = chain.apply(request(), terminal(&journal)).await.unwrap();
    assert_eq!(response.text(), "done");
    assert_eq!(
        *journal.lock(),
        vec!["A in", "B in", "C in", "handler", "C out", "B out", "A out"]
    );
}

#[tokio::test]
async fn test_empty_chain_calls_terminal() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let chain = MiddlewareChain::new();
    assert!(chain.is_empty());

    chain.apply(request(), terminal(&journal)).await.unwrap();
    assert_eq!(*journal.lock(), vec!["handler"]);
}

#[tokio::test]
async fn test_registry_builds_in_declared_order() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let registry = MiddlewareRegistry::new()
        .register(
            "outer",
            Recorder {
                label: "outer",
                journal: journal.clone(),
            },
        )
        .register(
            "inner",
            Recorder {
                label: "inner",
                journal: journal.clone(),
            },
        );

    let chain = registry
        .build_chain(&["outer".to_string(), "inner".to_string()])
        .unwrap();
    assert_eq!(chain.names(), vec!["outer", "inner"]);
    chain.apply(request(), terminal(&journal)).await.unwrap();
    assert_eq!(journal.lock()[0], "outer in");

    assert!(matches!(
        registry.build_chain(&["missing".to_string()]),
        Err(Error::MiddlewareNotFound(name)) if name == "missing"
    ));
}

#[tokio::test]
async fn test_body_limit_short_circuits() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut chain = MiddlewareChain::new();
    chain.push(BodySizeLimitMiddleware::new(4));

    let response = chain
        .apply(request().with_body("too large"), terminal(&journal))
        .await
        .unwrap();
    assert_eq!(response.status, 413);
    assert!(journal.lock().is_empty());

    let response = chain
        .apply(request().with_body("ok"), terminal(&journal))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut chain = MiddlewareChain::new();
    chain.push(RequestIdMiddleware);

    let response = chain
        .apply(
            request().with_header("X-Request-Id", "req-1"),
            terminal(&journal),
        )
        .await
        .unwrap();
    assert_eq!(response.header("x-request-id"), Some("req-1"));

    let response = chain.apply(request(), terminal(&journal)).await.unwrap();
    assert!(response.header("x-request-id").is_some());
}
