use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use weft::prelude::*;

#[allow(dead_code)]
#[derive(Debug)]
struct A(Arc<B>);
#[allow(dead_code)]
#[derive(Debug)]
struct B(Arc<C>);
#[allow(dead_code)]
#[derive(Debug)]
struct C(Arc<A>);

#[allow(dead_code)]
#[derive(Debug)]
struct Left(Arc<Right>);
#[allow(dead_code)]
#[derive(Debug)]
struct Right(Arc<Left>);

#[allow(dead_code)]
#[derive(Debug)]
struct Ouroboros(Arc<Ouroboros>);

fn keys(chain: &[DependencyKey]) -> Vec<&'static str> {
    chain
        .iter()
        .map(|key| key.type_name().rsplit("::").next().unwrap_or_default())
        .collect()
}

fn unvalidated() -> Container {
    Container::with_settings(ContainerSettings::default().validate_on_change(false))
}

fn assert_cycle(err: &WeftError, expected: &[&str]) {
    let chain = err
        .cycle()
        .unwrap_or_else(|| panic!("Expected CircularDependency, got: {err:?}"));
    assert_eq!(keys(chain), expected);
}

fn two_node() -> [Registration; 2] {
    [
        Registration::new(|r: Arc<Right>| Left(r)),
        Registration::new(|l: Arc<Left>| Right(l)),
    ]
}

fn three_node() -> [Registration; 3] {
    [
        Registration::new(|b: Arc<B>| A(b)),
        Registration::new(|c: Arc<C>| B(c)),
        Registration::new(|a: Arc<A>| C(a)),
    ]
}

#[test]
fn two_node_cycle() {
    let err = Container::init(two_node()).unwrap_err();
    assert_cycle(&err, &["Left", "Right", "Left"]);

    let container = unvalidated();
    container.register_batch(two_node()).unwrap();
    assert_cycle(&container.resolve::<Left>().unwrap_err(), &["Left", "Right", "Left"]);
    assert_cycle(&container.resolve::<Right>().unwrap_err(), &["Right", "Left", "Right"]);
}

#[test]
fn three_node_cycle() {
    let err = Container::init(three_node()).unwrap_err();
    assert_cycle(&err, &["A", "B", "C", "A"]);

    let container = unvalidated();
    container.register_batch(three_node()).unwrap();
    assert_cycle(&container.resolve::<A>().unwrap_err(), &["A", "B", "C", "A"]);
    assert_cycle(&container.resolve::<C>().unwrap_err(), &["C", "A", "B", "C"]);
}

#[test]
fn self_cycle() {
    let registration = || Registration::new(|o: Arc<Ouroboros>| Ouroboros(o));

    let err = Container::init([registration()]).unwrap_err();
    assert_cycle(&err, &["Ouroboros", "Ouroboros"]);

    let container = unvalidated();
    container.register(registration()).unwrap();
    assert_cycle(
        &container.resolve::<Ouroboros>().unwrap_err(),
        &["Ouroboros", "Ouroboros"],
    );
}

#[test]
fn validation_and_resolution_agree() {
    let container = unvalidated();
    container.register_batch(three_node()).unwrap();

    let validated = container.validate().unwrap_err();
    let resolved = container.resolve::<A>().unwrap_err();
    assert_eq!(validated.cycle(), resolved.cycle());
}

#[test]
fn cycle_message_lists_every_node() {
    let err = Container::init(three_node()).unwrap_err();
    let message = err.root_cause().to_string();
    assert!(message.contains("Circular dependency"));
    assert_eq!(message.matches('→').count(), 3);
}

#[test]
fn failed_cycle_does_not_poison_other_types() {
    struct Standalone;

    let container = unvalidated();
    container.register_batch(two_node()).unwrap();
    container.register(Registration::new(|| Standalone)).unwrap();

    assert!(container.resolve::<Left>().is_err());
    assert!(container.resolve::<Standalone>().is_ok());
    assert!(container.resolve::<Left>().unwrap_err().cycle().is_some());
}

fn resolve_with_deadline<T: Send + Sync + 'static>(container: Container) -> WeftError {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(container.resolve::<T>().map(|_| ()));
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("resolve blocked on its own construction")
        .unwrap_err()
}

fn inner_error(err: &WeftError) -> &WeftError {
    err.constructor_error()
        .and_then(|source| source.downcast_ref::<WeftError>())
        .unwrap_or_else(|| panic!("Expected a container error from the constructor, got: {err:?}"))
}

#[test]
fn reentrant_resolve_of_self_is_a_cycle() {
    struct Svc;

    let container = Container::new();
    let provider = container.provider::<Svc>();
    container
        .register(Registration::fallible(move || provider.get().map(|_| Svc)))
        .unwrap();

    let err = resolve_with_deadline::<Svc>(container.clone());
    assert_cycle(inner_error(&err), &["Svc", "Svc"]);
    assert!(container.resolve::<Svc>().is_err());
}

#[test]
fn reentrant_resolve_through_another_type_is_a_cycle() {
    struct Front;
    #[allow(dead_code)]
    struct Back(Arc<Front>);

    let container = Container::new();
    let provider = container.provider::<Back>();
    container
        .register_batch([
            Registration::fallible(move || provider.get().map(|_| Front)),
            Registration::new(|front: Arc<Front>| Back(front)),
        ])
        .unwrap();

    let err = resolve_with_deadline::<Front>(container);
    assert_cycle(inner_error(&err), &["Front", "Back", "Front"]);
}
