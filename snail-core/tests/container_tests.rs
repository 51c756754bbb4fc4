use snail_core::{Arguments, ClassRef, Concrete, Container, Error, Injectable, Instance, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Database {
    dsn: String,
}

struct Mailer {
    db: Arc<Database>,
    sender: String,
}

impl Injectable for Mailer {
    fn dependencies(class: ClassRef) -> ClassRef {
        class
            .inject("db", "database")
            .default("sender", "noreply@example.com".to_string())
    }

    fn construct(args: &Arguments) -> Result<Self> {
        Ok(Mailer {
            db: args.get::<Database>("db")?,
            sender: args.value::<String>("sender")?,
        })
    }
}

fn database(dsn: &str) -> Database {
    Database {
        dsn: dsn.to_string(),
    }
}

#[test]
fn test_instance_resolves_to_same_value() {
    let container = Container::new();
    container.instance("database", database("sqlite::memory:")).unwrap();

    let first = container.resolve_as::<Database>("database").unwrap();
    let second = container.resolve_as::<Database>("database").unwrap();
    assert_eq!(first.dsn, "sqlite::memory:");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_shared_factory_runs_once() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container
        .bind_factory(
            "database",
            move |_: &Container| {
                counter.fetch_add(1, Ordering::SeqCst);
                let instance: Instance = Arc::new(database("pg://"));
                Ok(instance)
            },
            true,
        )
        .unwrap();

    for _ in 0..3 {
        container.resolve("database").unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unshared_factory_builds_every_time() {
    let container = Container::new();
    container
        .bind_factory(
            "database",
            |_: &Container| {
                let instance: Instance = Arc::new(database("pg://"));
                Ok(instance)
            },
            false,
        )
        .unwrap();

    let first = container.resolve_as::<Database>("database").unwrap();
    let second = container.resolve_as::<Database>("database").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_class_injection_and_defaults() {
    let container = Container::new();
    container.instance("database", database("pg://main")).unwrap();
    container
        .bind_class("mailer", ClassRef::of::<Mailer>(), true)
        .unwrap();

    let mailer = container.resolve_as::<Mailer>("mailer").unwrap();
    assert_eq!(mailer.db.dsn, "pg://main");
    assert_eq!(mailer.sender, "noreply@example.com");
}

#[test]
fn test_missing_dependency_is_unresolvable() {
    let container = Container::new();
    container
        .bind_class("mailer", ClassRef::of::<Mailer>(), false)
        .unwrap();

    match container.resolve("mailer") {
        Err(Error::UnresolvableDependency { parameter, .. }) => assert_eq!(parameter, "db"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unknown_service() {
    let container = Container::new();
    assert!(matches!(
        container.resolve("nothing"),
        Err(Error::ServiceNotFound(id)) if id == "nothing"
    ));
}

#[test]
fn test_container_resolves_itself() {
    let container = Container::new();
    let resolved = container.resolve_as::<Container>("container").unwrap();
    assert!(resolved.ptr_eq(&container));
    assert!(container.instance("container", 1u8).is_err());
}

#[test]
fn test_alias_chain() {
    let container = Container::new();
    container.instance("database", database("pg://")).unwrap();
    container.alias("db", "database").unwrap();
    container.alias("primary", "db").unwrap();

    assert_eq!(container.canonical("primary"), "database");
    assert!(container.has("primary"));
    assert!(container.alias("database", "primary").is_err());
}

#[test]
fn test_circular_dependency_is_reported() {
    let container = Container::new();
    container
        .bind_class(
            "a",
            ClassRef::new("A").inject("b", "b").construct(|_: &Arguments| Ok(())),
            false,
        )
        .unwrap();
    container
        .bind_class(
            "b",
            ClassRef::new("B").inject("a", "a").construct(|_: &Arguments| Ok(())),
            false,
        )
        .unwrap();

    match container.resolve("a") {
        Err(Error::CircularDependency(chain)) => assert_eq!(chain, "a -> b -> a"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    // The failed resolution leaves nothing on the stack.
    container.forget("b");
    container.instance("b", ()).unwrap();
    assert!(container.resolve("a").is_ok());
}

#[test]
fn test_auto_registration_prefers_interface() {
    let container = Container::new().with_services_namespace("Shop::Services");
    container
        .register_class(
            "Shop::Services::CartInterface",
            ClassRef::new("MemoryCart").construct(|_: &Arguments| Ok("memory".to_string())),
        )
        .unwrap();
    container
        .register_class(
            "Shop::Services::Cart",
            ClassRef::new("Cart").construct(|_: &Arguments| Ok("plain".to_string())),
        )
        .unwrap();

    assert!(!container.has("Cart"));
    assert!(container.can_resolve("Cart"));
    let cart = container.resolve_as::<String>("Cart").unwrap();
    assert_eq!(cart.as_str(), "memory");

    // Auto-registered services are shared.
    assert!(container.has("Cart"));
    let again = container.resolve_as::<String>("Cart").unwrap();
    assert!(Arc::ptr_eq(&cart, &again));
}

#[test]
fn test_tagged_services_in_order() {
    let container = Container::new();
    container.instance("first", 1u32).unwrap();
    container.instance("second", 2u32).unwrap();
    container.tag("numbers", &["second", "first"]);

    let values: Vec<u32> = container
        .tagged("numbers")
        .unwrap()
        .into_iter()
        .map(|instance| *instance.downcast::<u32>().unwrap())
        .collect();
    assert_eq!(values, vec![2, 1]);
}

#[test]
fn test_make_with_overrides() {
    let container = Container::new();
    let mut overrides: HashMap<String, Instance> = HashMap::new();
    overrides.insert("db".to_string(), Arc::new(database("override://")));

    let mailer = container
        .make(&ClassRef::of::<Mailer>(), overrides)
        .unwrap()
        .downcast::<Mailer>()
        .unwrap();
    assert_eq!(mailer.db.dsn, "override://");
}

#[test]
fn test_rebinding_drops_cached_instance() {
    let container = Container::new();
    container
        .singleton("value", Concrete::Instance(Arc::new(1u8)))
        .unwrap();
    assert_eq!(*container.resolve_as::<u8>("value").unwrap(), 1);

    container.instance("value", 2u8).unwrap();
    assert_eq!(*container.resolve_as::<u8>("value").unwrap(), 2);
}

#[test]
fn test_type_mismatch() {
    let container = Container::new();
    container.instance("value", 1u8).unwrap();
    assert!(matches!(
        container.resolve_as::<String>("value"),
        Err(Error::ServiceTypeMismatch { .. })
    ));
}

#[test]
fn test_concurrent_singleton_resolution() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container
        .bind_factory(
            "slow",
            move |_: &Container| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(10));
                let instance: Instance = Arc::new(42u64);
                Ok(instance)
            },
            true,
        )
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            std::thread::spawn(move || *container.resolve_as::<u64>("slow").unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_auto_registration_builds_once() {
    for _ in 0..50 {
        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        container
            .register_class(
                "App::Services::Cache",
                ClassRef::new("Cache").construct(move |_: &Arguments| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(String::from("cache"))
                }),
            )
            .unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let container = container.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    container.resolve_as::<String>("Cache").unwrap()
                })
            })
            .collect();
        let instances: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let later = container.resolve_as::<String>("Cache").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, &later)));
    }
}

#[test]
fn test_reserved_and_empty_ids_are_rejected() {
    let container = Container::new();
    tokio_test::assert_err!(container.instance("", 1u8));
    tokio_test::assert_err!(container.instance("container", 1u8));

    tokio_test::assert_ok!(container.instance("answer", 42u8));
    let answer = tokio_test::assert_ok!(container.resolve_as::<u8>("answer"));
    assert_eq!(*answer, 42);
}
