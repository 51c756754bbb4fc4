//! Routing: path templates, the route table and the router.

mod params;
mod pattern;
mod router;
mod table;

pub use params::RouteParams;
pub use pattern::{normalize, Matcher, PatternCompiler};
pub use router::{
    GroupDefault, HandlerProbe, MatchResult, ParamMode, RouteMatch, Router, RouterSettings,
};
pub use table::{
    HandlerDescriptor, MethodFilter, RouteDefinition, RouteDescriptor, RouteGroup, RouteGroupBuilder,
    RouteTable, RouteTableBuilder, DEFAULT_GROUP,
};
