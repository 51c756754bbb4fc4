//! Testing utilities for Snail applications.
//!
//! [`TestClient`] pushes requests through an [`snail_core::Application`]
//! without binding a socket and reports both the response and the
//! dispatcher's terminal state. [`MockController`] stands in for real
//! controllers, and [`MemorySink`] captures what the dispatcher logs.
//!
//! ```no_run
//! use snail_core::{Application, Container, Dispatcher, RouteTable, Router, RouterSettings};
//! use snail_testing::{assert_status, MockController, TestClient};
//!
//! # async fn run() -> snail_core::Result<()> {
//! let container = Container::new();
//! let mock = MockController::new().with_action("index", "home");
//! let bound = mock.clone();
//! container.bind_controller("App::Controllers::Index", move |_: &Container| Ok(bound.clone()))?;
//!
//! let router = Router::new(RouteTable::builder().build()?, RouterSettings::default());
//! let app = Application::new(router, Dispatcher::new(container));
//! let client = TestClient::new(app);
//! let response = client.get("/").await;
//! assert_status(&response, 200);
//! assert!(mock.was_called("index"));
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod mock;
pub mod sink;
pub mod test_client;

pub use assertions::*;
pub use mock::{MockController, MockService, RecordedCall};
pub use sink::MemorySink;
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};
