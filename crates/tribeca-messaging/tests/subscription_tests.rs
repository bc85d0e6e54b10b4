/*
[INPUT]:  Subscription lifecycle scenarios driven through a loopback transport
[OUTPUT]: Ordering, replay, teardown and reconnect guarantees
[POS]:    Integration tests - subscription factory and connection controller
[UPDATE]: When delivery or teardown semantics change
*/

use std::cell::RefCell;
use std::rc::Rc;

use rstest::rstest;
use serde_json::json;
use tokio_test::assert_ok;
use tribeca_messaging::topics::{APPLICATION_STATE, MESSAGES, NOTEPAD, PRODUCT_ADVERTISEMENT};
use tribeca_messaging::{
    ConnectionController, MemoryTransport, Notepad, Scope, SubscriptionFactory, TransportEvent,
};

type Log = Rc<RefCell<Vec<String>>>;

fn setup() -> (ConnectionController, SubscriptionFactory) {
    let transport = Rc::new(MemoryTransport::new());
    let controller = assert_ok!(ConnectionController::new(transport));
    let factory = controller.subscription_factory();
    (controller, factory)
}

fn notepad(content: &str) -> TransportEvent {
    TransportEvent::Message {
        topic: "Notepad".into(),
        data: json!({ "content": content }),
    }
}

fn notepad_snapshot(contents: &[&str]) -> TransportEvent {
    TransportEvent::Snapshot {
        topic: "Notepad".into(),
        data: contents.iter().map(|c| json!({ "content": c })).collect(),
    }
}

fn server_message(text: &str) -> TransportEvent {
    TransportEvent::Message {
        topic: "Message".into(),
        data: json!({ "text": text, "time": "2026-01-01T00:00:00Z" }),
    }
}

fn record_notepad(factory: &SubscriptionFactory, scope: &Scope) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let subscription = factory.get_subscription(scope, NOTEPAD).unwrap();

    let sink = log.clone();
    subscription.on_message(move |n: &Notepad| sink.borrow_mut().push(format!("live:{}", n.content)));
    let sink = log.clone();
    subscription.on_batch(move |batch: &[Notepad]| {
        let joined: Vec<_> = batch.iter().map(|n| n.content.as_str()).collect();
        sink.borrow_mut().push(format!("batch:{}", joined.join(",")));
    });
    let sink = log.clone();
    subscription.on_disconnect(move || sink.borrow_mut().push("disconnect".into()));
    log
}

#[test]
fn test_messages_arrive_in_send_order() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let received = Rc::new(RefCell::new(Vec::new()));

    let sink = received.clone();
    factory
        .get_subscription(&scope, MESSAGES)
        .unwrap()
        .on_message(move |m| sink.borrow_mut().push(m.text.clone()));

    controller.handle_event(TransportEvent::Connected);
    for text in ["one", "two", "three", "four"] {
        controller.handle_event(server_message(text));
    }

    assert_eq!(*received.borrow(), vec!["one", "two", "three", "four"]);
}

#[test]
fn test_late_subscriber_gets_batch_before_live() {
    let (controller, factory) = setup();
    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("first"));

    let scope = Scope::new("late-widget");
    let log = record_notepad(&factory, &scope);
    controller.handle_event(notepad("second"));

    assert_eq!(*log.borrow(), vec!["batch:first", "live:second"]);
}

#[test]
fn test_batch_registered_while_disconnected_replays_on_connect() {
    let (controller, factory) = setup();
    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("kept"));
    controller.handle_event(TransportEvent::Disconnected);

    let scope = Scope::new("widget");
    let log = record_notepad(&factory, &scope);
    assert!(log.borrow().is_empty());

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("fresh"));
    assert_eq!(*log.borrow(), vec!["batch:kept", "live:fresh"]);
}

#[test]
fn test_snapshot_replays_history_to_pending_subscribers() {
    let (controller, factory) = setup();
    let scope = Scope::new("messages");
    let batches = Rc::new(RefCell::new(Vec::new()));

    let sink = batches.clone();
    factory
        .get_subscription(&scope, MESSAGES)
        .unwrap()
        .on_batch(move |batch| sink.borrow_mut().push(batch.len()));

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(TransportEvent::Snapshot {
        topic: "Message".into(),
        data: (0..60)
            .map(|i| json!({ "text": format!("m{i}"), "time": "2026-01-01T00:00:00Z" }))
            .collect(),
    });

    // History depth for this topic is fifty.
    assert_eq!(*batches.borrow(), vec![50]);
    assert_eq!(controller.buffered_len("Message"), 50);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
fn test_repeated_disconnect_tears_down_once(#[case] calls: usize) {
    let (controller, factory) = setup();
    let scope = Scope::new("widget");
    let subscription = factory.get_subscription(&scope, NOTEPAD).unwrap();
    let hits = Rc::new(RefCell::new(0));
    let sink = hits.clone();
    subscription.on_message(move |_| *sink.borrow_mut() += 1);

    let teardowns = (0..calls).filter(|_| subscription.disconnect()).count();
    assert_eq!(teardowns, 1);
    assert!(!subscription.is_active());

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("ignored"));
    assert_eq!(*hits.borrow(), 0);
    assert_eq!(controller.active_subscriptions(), 0);
}

#[test]
fn test_scope_destroy_disconnects_exactly_the_active_subscriptions() {
    let (controller, factory) = setup();
    let scope = Scope::new("pair");

    let subscriptions = [
        factory.get_subscription(&scope, NOTEPAD).unwrap(),
        factory.get_subscription(&scope, NOTEPAD).unwrap(),
        factory.get_subscription(&scope, NOTEPAD).unwrap(),
    ];
    let other = factory.get_subscription(&scope, APPLICATION_STATE).unwrap();
    assert_eq!(controller.active_subscriptions(), 4);

    assert!(subscriptions[0].disconnect());
    assert_eq!(controller.active_subscriptions(), 3);
    assert_eq!(scope.pending_teardowns(), 3);

    scope.destroy();
    assert_eq!(controller.active_subscriptions(), 0);
    assert!(subscriptions.iter().all(|s| !s.is_active()));
    assert!(!other.is_active());
    // Already torn down by the scope.
    assert!(!subscriptions[1].disconnect());
}

#[test]
fn test_disconnect_notifies_each_active_subscription_once() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let log = record_notepad(&factory, &scope);
    let stale_scope = Scope::new("closed");
    let stale_log = record_notepad(&factory, &stale_scope);
    stale_scope.destroy();

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(TransportEvent::Disconnected);
    controller.handle_event(TransportEvent::Disconnected);

    assert_eq!(*log.borrow(), vec!["disconnect"]);
    assert!(stale_log.borrow().is_empty());
}

#[test]
fn test_reregistering_handler_replaces_previous() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let subscription = factory.get_subscription(&scope, NOTEPAD).unwrap();
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let sink = log.clone();
    subscription.on_message(move |_| sink.borrow_mut().push("old".into()));
    let sink = log.clone();
    subscription.on_message(move |_| sink.borrow_mut().push("new".into()));

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("x"));
    assert_eq!(*log.borrow(), vec!["new"]);
}

#[test]
fn test_handler_may_disconnect_another_subscription_mid_delivery() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let victim_scope = Scope::new("victim");

    let victim_log = record_notepad(&factory, &victim_scope);
    let first = factory.get_subscription(&scope, NOTEPAD).unwrap();
    let victim = victim_scope.clone();
    first.on_message(move |_| victim.destroy());

    // The victim subscribed first, so it still sees this message.
    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("a"));
    controller.handle_event(notepad("b"));

    assert_eq!(*victim_log.borrow(), vec!["live:a"]);
}

#[test]
fn test_handler_may_subscribe_while_delivering() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let nested: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let inner_factory = factory.clone();
    let inner_scope = scope.clone();
    let sink = nested.clone();
    factory
        .get_subscription(&scope, PRODUCT_ADVERTISEMENT)
        .unwrap()
        .on_message(move |_| {
            let sink = sink.clone();
            inner_factory
                .get_subscription(&inner_scope, NOTEPAD)
                .unwrap()
                .on_batch(move |batch| sink.borrow_mut().push(batch[0].content.clone()));
        });

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("buffered"));
    controller.handle_event(TransportEvent::Message {
        topic: "ProductAdvertisement".into(),
        data: json!({
            "exchange": "Coinbase",
            "pair": { "base": "BTC", "quote": "USD" },
            "environment": "prod"
        }),
    });

    assert_eq!(*nested.borrow(), vec!["buffered"]);
    scope.destroy();
}

#[test]
fn test_subscription_on_destroyed_scope_is_inert() {
    let (controller, factory) = setup();
    let scope = Scope::new("gone");
    scope.destroy();

    let subscription = factory.get_subscription(&scope, NOTEPAD).unwrap();
    assert!(!subscription.is_active());
    assert!(!subscription.disconnect());
    assert_eq!(controller.active_subscriptions(), 0);
}

#[test]
fn test_reconnect_starts_a_clean_generation() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let log = record_notepad(&factory, &scope);

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("g0"));
    controller.handle_event(TransportEvent::Disconnected);
    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad_snapshot(&["g1-snapshot"]));
    controller.handle_event(notepad("g1"));

    assert_eq!(
        *log.borrow(),
        vec!["live:g0", "disconnect", "batch:g0", "batch:g1-snapshot", "live:g1"]
    );
    assert_eq!(controller.generation(), 1);
}

#[test]
fn test_snapshot_after_reconnect_reaches_subscribers() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let log = record_notepad(&factory, &scope);

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("old"));
    controller.handle_event(TransportEvent::Disconnected);
    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad_snapshot(&["fresh"]));
    controller.handle_event(notepad("next"));

    assert_eq!(
        *log.borrow(),
        vec!["live:old", "disconnect", "batch:old", "batch:fresh", "live:next"]
    );
}

#[test]
fn test_snapshot_reaches_late_subscriber_after_reconnect() {
    let (controller, factory) = setup();
    let scope = Scope::new("window");

    controller.handle_event(TransportEvent::Connected);
    controller.handle_event(notepad("old"));
    controller.handle_event(TransportEvent::Disconnected);
    controller.handle_event(TransportEvent::Connected);

    // Registered after the connect-time replay already ran.
    let log = record_notepad(&factory, &scope);
    controller.handle_event(notepad_snapshot(&["fresh"]));

    assert_eq!(*log.borrow(), vec!["batch:old", "batch:fresh"]);
}

#[rstest]
#[case::snapshot_first(true, vec!["batch:snap", "live:live"])]
#[case::live_first(false, vec!["live:live"])]
fn test_snapshot_racing_live_delivery(#[case] snapshot_first: bool, #[case] expected: Vec<&str>) {
    let (controller, factory) = setup();
    let scope = Scope::new("window");
    let log = record_notepad(&factory, &scope);
    controller.handle_event(TransportEvent::Connected);

    if snapshot_first {
        controller.handle_event(notepad_snapshot(&["snap"]));
        controller.handle_event(notepad("live"));
    } else {
        controller.handle_event(notepad("live"));
        controller.handle_event(notepad_snapshot(&["snap"]));
    }

    assert_eq!(*log.borrow(), expected);
    // The buffer always reflects the latest thing the server sent.
    assert_eq!(controller.buffered_len("Notepad"), 1);
}
