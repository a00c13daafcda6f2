use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use weft::prelude::*;

#[derive(Debug, PartialEq)]
struct Mailer {
    host: &'static str,
}

struct Signup {
    mailer: Arc<Mailer>,
}

trait Cache: Send + Sync {
    fn backend(&self) -> &'static str;
}

struct MemoryCache;
impl Cache for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct RedisCache;
impl Cache for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[test]
fn override_replaces_and_evicts() {
    let container = Container::builder()
        .singleton(|| Mailer { host: "smtp.prod" })
        .build()
        .unwrap();

    let scope = container.create_scope();
    let before = container.resolve::<Mailer>().unwrap();
    assert_eq!(before.host, "smtp.prod");

    container
        .override_with(Registration::new(|| Mailer { host: "smtp.test" }))
        .unwrap();

    let after = container.resolve::<Mailer>().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.host, "smtp.test");
    assert_eq!(*container.resolve_scoped::<Mailer>(&scope).unwrap(), *after);
}

#[test]
fn override_evicts_scoped_instances_in_every_scope() {
    let generation = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    {
        let generation = generation.clone();
        container
            .register(Registration::new(move || generation.load(Ordering::SeqCst)).scoped())
            .unwrap();
    }

    let scopes = [container.create_scope(), container.create_scope()];
    for scope in &scopes {
        assert_eq!(*container.resolve_scoped::<usize>(scope).unwrap(), 0);
    }

    generation.store(1, Ordering::SeqCst);
    let generation_reader = generation.clone();
    container
        .override_with(Registration::new(move || generation_reader.load(Ordering::SeqCst) * 10).scoped())
        .unwrap();

    for scope in &scopes {
        assert_eq!(*container.resolve_scoped::<usize>(scope).unwrap(), 10);
    }
}

#[test]
fn override_racing_a_first_resolve_never_keeps_the_old_instance() {
    for _ in 0..200 {
        let container = Container::builder()
            .singleton(|| Mailer { host: "old" })
            .build()
            .unwrap();
        let barrier = Barrier::new(2);

        thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                container.resolve::<Mailer>().unwrap();
            });
            s.spawn(|| {
                barrier.wait();
                container
                    .override_with(Registration::new(|| Mailer { host: "new" }))
                    .unwrap();
            });
        });

        assert_eq!(container.resolve::<Mailer>().unwrap().host, "new");
    }
}

#[test]
fn plain_register_keeps_cached_instance() {
    let container = Container::builder()
        .singleton(|| Mailer { host: "first" })
        .build()
        .unwrap();
    let cached = container.resolve::<Mailer>().unwrap();

    container.register(Registration::new(|| Mailer { host: "second" })).unwrap();
    assert!(Arc::ptr_eq(&cached, &container.resolve::<Mailer>().unwrap()));
}

#[test]
fn bad_override_is_reported_immediately() {
    let container = Container::builder()
        .singleton(|| Mailer { host: "smtp" })
        .singleton(|mailer: Arc<Mailer>| Signup { mailer })
        .build()
        .unwrap();

    struct Credentials;
    let err = container
        .override_with(Registration::new(|_: Arc<Credentials>| Mailer { host: "smtp" }))
        .unwrap_err();
    match err.root_cause() {
        WeftError::NotRegistered(e) => assert_eq!(e.requested, DependencyKey::of::<Credentials>()),
        other => panic!("Expected NotRegistered, got: {other:?}"),
    }
}

#[test]
fn batch_validates_once_at_the_end() {
    let one_by_one = Container::new();
    let err = one_by_one
        .register(Registration::new(|mailer: Arc<Mailer>| Signup { mailer }))
        .unwrap_err();
    assert!(matches!(err.root_cause(), WeftError::NotRegistered(_)));

    let batched = Container::new();
    batched
        .register_batch([
            Registration::new(|mailer: Arc<Mailer>| Signup { mailer }),
            Registration::new(|| Mailer { host: "smtp" }),
        ])
        .unwrap();
    assert_eq!(batched.resolve::<Signup>().unwrap().mailer.host, "smtp");
}

#[test]
fn batch_stops_at_invalid_constructor() {
    let container = Container::new();
    let err = container
        .register_batch([
            Registration::new(|| Mailer { host: "smtp" }),
            Registration::new(|| ()),
        ])
        .unwrap_err();

    assert!(matches!(err, WeftError::InvalidConstructor(_)));
    assert!(container.is_registered::<Mailer>());
}

#[test]
fn named_registrations_are_independent() {
    let container = Container::builder()
        .singleton(|| Mailer { host: "default" })
        .named_singleton("marketing", || Mailer { host: "bulk" })
        .named_singleton("alerts", || Mailer { host: "priority" })
        .build()
        .unwrap();

    let default = container.resolve::<Mailer>().unwrap();
    let marketing = container.resolve_named::<Mailer>("marketing").unwrap();
    let alerts = container.resolve_named::<Mailer>("alerts").unwrap();

    assert_eq!(
        [default.host, marketing.host, alerts.host],
        ["default", "bulk", "priority"]
    );
    assert!(Arc::ptr_eq(&marketing, &container.resolve_named::<Mailer>("marketing").unwrap()));
    assert_eq!(container.len(), 3);
}

#[test]
fn unknown_name_falls_back_to_unnamed_registration() {
    let container = Container::builder()
        .singleton(|| Mailer { host: "default" })
        .build()
        .unwrap();

    let named = container.resolve_named::<Mailer>("anything").unwrap();
    assert!(Arc::ptr_eq(&named, &container.resolve::<Mailer>().unwrap()));
}

#[test]
fn same_name_across_types_stays_independent() {
    let container = Container::builder()
        .named_singleton("primary", || Mailer { host: "smtp" })
        .named_singleton("primary", || 5432u16)
        .build()
        .unwrap();

    assert_eq!(container.resolve_named::<Mailer>("primary").unwrap().host, "smtp");
    assert_eq!(*container.resolve_named::<u16>("primary").unwrap(), 5432);
}

#[test]
fn named_interface_does_not_fall_back() {
    let container = Container::builder()
        .singleton(|| MemoryCache)
        .singleton(|| RedisCache)
        .bind::<dyn Cache, MemoryCache>(|c| c)
        .bind_named::<dyn Cache, RedisCache>("sessions", |c| c)
        .build()
        .unwrap();

    assert_eq!(container.resolve::<dyn Cache>().unwrap().backend(), "memory");
    assert_eq!(container.resolve_named::<dyn Cache>("sessions").unwrap().backend(), "redis");

    match container.resolve_named::<dyn Cache>("pages") {
        Err(WeftError::NoBinding { interface }) => assert_eq!(interface.name(), Some("pages")),
        Err(other) => panic!("Expected NoBinding, got: {other:?}"),
        Ok(_) => panic!("Expected NoBinding"),
    }
}

#[test]
fn interface_parameters_resolve_through_bindings() {
    struct SessionStore {
        cache: Arc<dyn Cache>,
    }

    let container = Container::builder()
        .transient(|cache: Arc<dyn Cache>| SessionStore { cache })
        .bind::<dyn Cache, RedisCache>(|c| c)
        .singleton(|| RedisCache)
        .build()
        .unwrap();

    assert_eq!(container.resolve::<SessionStore>().unwrap().cache.backend(), "redis");
}

#[test]
fn unbound_interface_parameter_fails_validation() {
    struct SessionStore {
        _cache: Arc<dyn Cache>,
    }

    let err = Container::builder()
        .transient(|cache: Arc<dyn Cache>| SessionStore { _cache: cache })
        .build()
        .unwrap_err();
    assert!(matches!(err.root_cause(), WeftError::NoBinding { .. }));
}

#[test]
fn bind_errors() {
    let container = Container::new();

    assert!(matches!(
        container.bind::<dyn Cache, MemoryCache>(|c| c),
        Err(WeftError::NotRegistered(_))
    ));

    container.register(Registration::new(|| MemoryCache)).unwrap();
    assert!(matches!(
        container.bind::<MemoryCache, MemoryCache>(|c| c),
        Err(WeftError::NotAnInterface { .. })
    ));

    container.bind::<dyn Cache, MemoryCache>(|c| c).unwrap();
    assert!(container.is_registered::<dyn Cache>());
}

#[test]
fn rebinding_switches_implementation() {
    let container = Container::builder()
        .singleton(|| MemoryCache)
        .singleton(|| RedisCache)
        .bind::<dyn Cache, MemoryCache>(|c| c)
        .build()
        .unwrap();
    assert_eq!(container.resolve::<dyn Cache>().unwrap().backend(), "memory");

    container.bind::<dyn Cache, RedisCache>(|c| c).unwrap();
    assert_eq!(container.resolve::<dyn Cache>().unwrap().backend(), "redis");
}

#[test]
fn reset_discards_all_state() {
    let container = Container::builder()
        .singleton(|| MemoryCache)
        .bind::<dyn Cache, MemoryCache>(|c| c)
        .build()
        .unwrap();
    let scope = container.create_scope();
    container.resolve::<dyn Cache>().unwrap();

    container.reset();

    assert!(container.is_empty());
    assert!(!container.has_scope(&scope));
    assert!(matches!(
        container.resolve::<dyn Cache>(),
        Err(WeftError::NoBinding { .. })
    ));

    container.register(Registration::new(|| MemoryCache)).unwrap();
    assert!(container.resolve::<MemoryCache>().is_ok());
}

#[test]
fn providers_defer_resolution() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let container = Container::builder()
        .transient(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Mailer { host: "smtp" }
        })
        .build()
        .unwrap();

    let provider = container.provider::<Mailer>();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    let first = provider.get().unwrap();
    let second = provider.get().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(built.load(Ordering::SeqCst), 2);

    let scope = container.create_scope();
    let scoped = container.named_provider::<Mailer>("ops").in_scope(&scope);
    assert_eq!(scoped.get().unwrap().host, "smtp");
}

#[test]
fn settings_load_from_json() {
    let settings: ContainerSettings =
        serde_json::from_str(r#"{ "strict_lifetimes": true }"#).unwrap();

    let err = Container::builder()
        .settings(settings)
        .transient(|| Mailer { host: "smtp" })
        .singleton(|mailer: Arc<Mailer>| Signup { mailer })
        .build()
        .unwrap_err();
    assert!(matches!(err.root_cause(), WeftError::ScopeMismatch(_)));
}

#[test]
fn unsized_non_trait_types_count_as_interfaces() {
    let container = Container::new();

    assert!(DependencyKey::of::<str>().is_interface());
    assert!(matches!(
        container.resolve::<str>(),
        Err(WeftError::NoBinding { .. })
    ));
}
