// Core library for the Snail web framework
// Routing, dispatch, middleware and the service container

pub mod application;
pub mod config;
pub mod container;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod plugin;
pub mod routing;
pub mod static_files;

// Re-export commonly used types
pub use application::Application;
pub use config::{ConfigReader, FrameworkSettings};
pub use container::*;
pub use dispatcher::{DispatchOutcome, DispatchState, Dispatcher};
pub use error::*;
pub use handler::*;
pub use self::http::{HttpMethod, HttpRequest, HttpResponse};
pub use logging::{TraceFormat, TraceLevel, TraceOutput, TracingConfig};
pub use middleware::*;
pub use plugin::{Plugin, PluginManager};
pub use routing::*;
pub use static_files::{CacheStrategy, FileType, StaticFiles};
