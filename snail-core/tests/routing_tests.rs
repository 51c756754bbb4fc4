use serde_json::json;
use snail_core::routing::{
    HandlerDescriptor, MatchResult, ParamMode, PatternCompiler, RouteDefinition, RouteTable,
    Router, RouterSettings, DEFAULT_GROUP,
};
use snail_core::{Error, HttpMethod, HttpRequest};

fn action_of(result: &MatchResult) -> (String, String) {
    match result.as_match().map(|m| &m.handler) {
        Some(HandlerDescriptor::ControllerAction {
            controller, action, ..
        }) => (controller.clone(), action.clone()),
        other => panic!("expected a controller action, got {:?}", other),
    }
}

#[test]
fn test_first_declared_route_wins() {
    let table = RouteTable::builder()
        .route(RouteDefinition::action("user/:id", "App", "byName@User").methods(""))
        .route(RouteDefinition::action("user/:num", "App", "byNumber@User").methods(""))
        .build()
        .unwrap();
    let router = Router::new(table, RouterSettings::default());

    let result = router.match_path(HttpMethod::GET, "/user/42");
    assert_eq!(action_of(&result), ("User".to_string(), "byName".to_string()));
    assert_eq!(result.as_match().unwrap().params.get("id"), Some("42"));
}

#[test]
fn test_typed_placeholders() {
    let table = RouteTable::builder()
        .route(RouteDefinition::action("item/:num", "App", "show@Item"))
        .route(RouteDefinition::action("files/:all", "App", "download@Files"))
        .route(RouteDefinition::action("token/:base64", "App", "check@Token"))
        .build()
        .unwrap();
    let mut settings = RouterSettings::default();
    settings.route.namespace = "App".to_string();
    let router = Router::new(table, settings);

    let item = router.match_path(HttpMethod::GET, "item/7");
    assert_eq!(action_of(&item).1, "show");

    let files = router.match_path(HttpMethod::GET, "files/docs/guide.pdf");
    assert_eq!(action_of(&files).1, "download");
    assert_eq!(files.as_match().unwrap().params.at(0), Some("docs/guide.pdf"));

    let token = router.match_path(HttpMethod::GET, "token/aGVsbG8=");
    assert_eq!(action_of(&token).1, "check");

    // Not a number, so the table has nothing and the convention fallback runs.
    let fallback = router.match_path(HttpMethod::GET, "item/abc");
    let matched = fallback.as_match().unwrap();
    assert!(matched.template.is_none());
    assert_eq!(action_of(&fallback), ("Item".to_string(), "abc".to_string()));
}

#[test]
fn test_method_filter_skips_route() {
    let table = RouteTable::builder()
        .route(RouteDefinition::action("form", "App", "save@Form").methods("POST|PUT"))
        .route(RouteDefinition::action("form", "App", "show@Form").methods("GET"))
        .build()
        .unwrap();
    let router = Router::new(table, RouterSettings::default());

    assert_eq!(action_of(&router.match_path(HttpMethod::PUT, "form")).1, "save");
    assert_eq!(action_of(&router.match_path(HttpMethod::GET, "form")).1, "show");
}

#[test]
fn test_matching_is_deterministic() {
    let table = RouteTable::builder()
        .group("api")
        .route(RouteDefinition::action("api/:any/:num", "Api", "show@Record"))
        .done()
        .route(RouteDefinition::action("api/:all", "App", "proxy@Api"))
        .build()
        .unwrap();
    let router = Router::new(table, RouterSettings::default());

    let first = action_of(&router.match_path(HttpMethod::GET, "api/orders/12"));
    for _ in 0..50 {
        assert_eq!(action_of(&router.match_path(HttpMethod::GET, "api/orders/12")), first);
    }
    assert_eq!(first.1, "show");
}

#[test]
fn test_suffix_and_slashes_are_normalized() {
    let table = RouteTable::builder()
        .route(RouteDefinition::action("about", "App", "about@Page"))
        .build()
        .unwrap();
    let router = Router::new(table, RouterSettings::default());

    for path in ["/about", "about/", "//about.html", "/about.do"] {
        assert_eq!(action_of(&router.match_path(HttpMethod::GET, path)).1, "about", "{}", path);
    }
}

#[test]
fn test_percent_encoded_captures_are_decoded() {
    let table = RouteTable::builder()
        .route(RouteDefinition::action("search/:any", "App", "find@Search"))
        .build()
        .unwrap();
    let router = Router::new(table, RouterSettings::default());

    let request = HttpRequest::new(HttpMethod::GET, "/search/caf%C3%A9?page=2");
    let result = router.match_request(&request);
    assert_eq!(result.as_match().unwrap().params.at(0), Some("café"));
    assert_eq!(request.query("page"), Some("2"));
}

#[test]
fn test_convention_groups_and_params() {
    let mut settings = RouterSettings::default();
    settings.param_mode = ParamMode::KeyValue;
    settings.group.insert(
        "admin".to_string(),
        serde_json::from_value(json!({
            "namespace": "Admin::Controllers",
            "controller": "Dashboard",
            "action": "index"
        }))
        .unwrap(),
    );
    let router = Router::new(RouteTable::new(), settings);

    let result = router.match_path(HttpMethod::GET, "ADMIN/users/edit/id/5/tab/roles");
    let matched = result.as_match().unwrap();
    assert_eq!(matched.group, "admin");
    assert_eq!(
        matched.handler.controller_id().as_deref(),
        Some("Admin::Controllers::Users")
    );
    assert_eq!(matched.params.get("id"), Some("5"));
    assert_eq!(matched.params.get("tab"), Some("roles"));

    let home = router.match_path(HttpMethod::GET, "/");
    let matched = home.as_match().unwrap();
    assert_eq!(matched.group, DEFAULT_GROUP);
    assert_eq!(
        matched.handler.controller_id().as_deref(),
        Some("App::Controllers::Index")
    );
}

#[test]
fn test_config_table_extras_and_middlewares() {
    let config = json!({
        "api": {
            "user/:num": ["user", "Api", "show@User", "GET|POST", { "format": "json", "middlewares": ["auth"] }],
        },
        "hello/:any": ["hello", "App", "hello@Index"],
    });
    let table = RouteTable::from_config(&config, &PatternCompiler::new()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.groups()[0].name(), "api");
    assert_eq!(table.groups()[1].name(), DEFAULT_GROUP);

    let router = Router::new(table, RouterSettings::default());
    let result = router.match_path(HttpMethod::POST, "user/9");
    let matched = result.as_match().unwrap();
    assert_eq!(matched.params.get("format"), Some("json"));
    assert_eq!(matched.middlewares, vec!["auth".to_string()]);

    // No method filter on the hello route means GET only.
    assert!(router.match_path(HttpMethod::GET, "hello/world").is_matched());
    let post = router.match_path(HttpMethod::POST, "hello/world");
    assert!(post.as_match().map(|m| m.template.is_none()).unwrap_or(true));
}

#[test]
fn test_config_default_group_keeps_declared_position() {
    let config = json!({
        "page/:any": ["page", "App", "show@Page"],
        "cms": {
            "page/:any": ["page", "Cms", "show@Page"],
        },
    });
    let table = RouteTable::from_config(&config, &PatternCompiler::new()).unwrap();
    assert_eq!(table.groups()[0].name(), DEFAULT_GROUP);
    assert_eq!(table.groups()[1].name(), "cms");

    let router = Router::new(table, RouterSettings::default());
    let result = router.match_path(HttpMethod::GET, "page/about");
    assert_eq!(result.as_match().unwrap().group, DEFAULT_GROUP);
}

#[test]
fn test_invalid_config_entries() {
    let too_short = json!({ "x": ["x", "App"] });
    assert!(matches!(
        RouteTable::from_config(&too_short, &PatternCompiler::new()),
        Err(Error::Config(_))
    ));

    let bad_handler = json!({ "x": ["x", "App", "noseparator"] });
    assert!(RouteTable::from_config(&bad_handler, &PatternCompiler::new()).is_err());
}

#[test]
fn test_custom_placeholder_type() {
    let mut compiler = PatternCompiler::new();
    compiler.register("slug", "[a-z0-9-]+").unwrap();
    let table = RouteTable::builder_with(compiler)
        .route(RouteDefinition::action("post/:slug", "Blog", "show@Post"))
        .build()
        .unwrap();
    let router = Router::new(table, RouterSettings::default());

    let result = router.match_path(HttpMethod::GET, "post/hello-world");
    assert_eq!(result.as_match().unwrap().params.at(0), Some("hello-world"));
    assert!(
        router
            .match_path(HttpMethod::GET, "post/Hello_World")
            .as_match()
            .map(|m| m.template.is_none())
            .unwrap_or(true)
    );
}
