mod common;

use std::sync::{Arc, Mutex};

use common::*;
use npiroute_core::{free_message, MessageContainer, ReroutePolicy, Rerouted, RouterConfig};

type Seen = Arc<Mutex<Vec<(bool, Vec<u8>)>>>;

fn recording_hook() -> (Seen, impl Fn(Rerouted<'_>) + Send + Sync + 'static) {
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);
    let hook = move |rerouted: Rerouted<'_>| match rerouted {
        Rerouted::Observed(message) => sink
            .lock()
            .unwrap()
            .push((false, message.payload().to_vec())),
        Rerouted::Owned(message) => {
            sink.lock().unwrap().push((true, message.payload().to_vec()));
            free_message(message);
        }
    };
    (seen, hook)
}

#[test]
fn inbound_none_delivers_to_stack_only() {
    let (mut router, handle, stack) = router(RouterConfig::default());
    let (seen, hook) = recording_hook();
    handle.register_inbound_callback(hook, ReroutePolicy::None);

    handle.receive_frame(async_message(1)).unwrap();
    router.run_until_idle(&mut MockTransport::idle()).unwrap();

    assert_eq!(drain(&stack).len(), 1);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn inbound_echo_reaches_both() {
    let (mut router, handle, stack) = router(RouterConfig::default());
    let (seen, hook) = recording_hook();
    handle.register_inbound_callback(hook, ReroutePolicy::Echo);

    handle.receive_frame(async_message(1)).unwrap();
    router.run_until_idle(&mut MockTransport::idle()).unwrap();

    let delivered = drain(&stack);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), &[0x41, 1]);
    assert_eq!(*seen.lock().unwrap(), vec![(false, vec![0x41, 1])]);
    assert_eq!(handle.stats().echoed, 1);
}

#[test]
fn inbound_intercept_bypasses_stack() {
    let (mut router, handle, stack) = router(RouterConfig::default());
    let (seen, hook) = recording_hook();
    handle.register_inbound_callback(hook, ReroutePolicy::Intercept);

    handle.receive_frame(async_message(1)).unwrap();
    handle.receive_frame(sync_request(2)).unwrap();
    router.run_until_idle(&mut MockTransport::idle()).unwrap();

    assert!(drain(&stack).is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(owned, _)| *owned));
    assert_eq!(handle.stats().intercepted, 2);
    assert_eq!(handle.stats().delivered_to_stack, 0);
}

#[test]
fn intercepted_sync_request_can_be_answered_by_hook_owner() {
    let (mut router, handle, _stack) = router(RouterConfig::default());
    let taken: Arc<Mutex<Vec<MessageContainer>>> = Arc::default();
    let sink = Arc::clone(&taken);
    handle.register_inbound_callback(
        move |rerouted| {
            if let Rerouted::Owned(message) = rerouted {
                sink.lock().unwrap().push(message);
            }
        },
        ReroutePolicy::Intercept,
    );

    let mut transport = MockTransport::idle();
    handle.receive_frame(sync_request(9)).unwrap();
    router.run_until_idle(&mut transport).unwrap();

    let request = taken.lock().unwrap().pop().unwrap();
    handle
        .respond(request.transaction().unwrap(), &[0x61, 9])
        .unwrap();
    router.run_until_idle(&mut transport).unwrap();
    assert_eq!(transport.commands(), vec![(0x61, 9)]);
}

#[test]
fn outbound_intercept_suppresses_transport() {
    let (mut router, handle, _stack) = router(RouterConfig::default());
    let (seen, hook) = recording_hook();
    handle.register_outbound_callback(hook, ReroutePolicy::Intercept);

    let mut transport = MockTransport::idle();
    handle.post_from_stack(vec![0x41, 7, 1, 2]).unwrap();
    router.run_until_idle(&mut transport).unwrap();

    assert!(transport.written.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![(true, vec![0x41, 7, 1, 2])]);
}

#[test]
fn outbound_echo_sees_unframed_message_and_transmits() {
    let (mut router, handle, _stack) = router(RouterConfig::default());
    let (seen, hook) = recording_hook();
    handle.register_outbound_callback(hook, ReroutePolicy::Echo);

    let mut transport = MockTransport::idle();
    handle.post_from_stack(vec![0x41, 7]).unwrap();
    router.run_until_idle(&mut transport).unwrap();

    assert_eq!(transport.commands(), vec![(0x41, 7)]);
    assert_eq!(*seen.lock().unwrap(), vec![(false, vec![0x41, 7])]);
}

#[test]
fn send_to_host_skips_outbound_hook() {
    let (mut router, handle, _stack) = router(RouterConfig::default());
    let (seen, hook) = recording_hook();
    handle.register_outbound_callback(hook, ReroutePolicy::Intercept);

    let mut transport = MockTransport::idle();
    handle.send_to_host(&[0x41, 7]).unwrap();
    router.run_until_idle(&mut transport).unwrap();

    assert_eq!(transport.commands(), vec![(0x41, 7)]);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn hook_may_reregister_from_inside_callback() {
    let (mut router, handle, stack) = router(RouterConfig::default());
    let inner = handle.clone();
    handle.register_inbound_callback(
        move |rerouted| {
            if let Rerouted::Owned(message) = rerouted {
                free_message(message);
            }
            inner.clear_inbound_callback();
        },
        ReroutePolicy::Intercept,
    );

    handle.receive_frame(async_message(1)).unwrap();
    handle.receive_frame(async_message(2)).unwrap();
    router.run_until_idle(&mut MockTransport::idle()).unwrap();

    let delivered = drain(&stack);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload(), &[0x41, 2]);
}
