// Snail - a small HTTP framework for Rust
//
// Pattern routing with a convention fallback, a service container for
// controllers and their dependencies, and onion-style middleware.

// Re-export core functionality
pub use snail_core::*;

pub use snail_log;

#[cfg(feature = "config")]
pub use snail_config;

#[cfg(feature = "testing")]
pub use snail_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ActionContext,
        ActionOutput,
        Application,
        Arguments,
        ConfigReader,
        Container,
        Controller,
        DispatchState,
        Dispatcher,
        Error,
        FrameworkSettings,
        HttpMethod,
        HttpRequest,
        HttpResponse,
        Injectable,
        Middleware,
        MiddlewareRegistry,
        Next,
        Result,
        RouteDefinition,
        RouteParams,
        RouteTable,
        Router,
        RouterSettings,
        closure,
    };

    #[cfg(feature = "config")]
    pub use snail_config::ConfigStore;
}
