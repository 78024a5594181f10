mod common;

use common::*;
use npiroute_core::RouterConfig;
use npiroute_frame::MessageClass;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    HostSync(u8),
    HostAsync(u8),
    StackAsync(u8),
    Respond,
    TxDone,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::HostSync),
        any::<u8>().prop_map(Op::HostAsync),
        any::<u8>().prop_map(Op::StackAsync),
        Just(Op::Respond),
        Just(Op::TxDone),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// For any interleaving of host and stack traffic:
    /// - at most one SYNC request is ever outstanding
    /// - no ASYNC frame is written while a transaction is outstanding
    /// - frames from each producer leave in submission order
    #[test]
    fn prop_sync_exclusive_and_preemptive(ops in prop::collection::vec(op(), 1..80)) {
        let (mut router, handle, stack) = router(RouterConfig::default());
        let mut transport = MockTransport::holding_busy();
        let mut outstanding = 0i32;
        let mut sent_async = Vec::new();

        for op in ops {
            match op {
                Op::HostSync(tag) => {
                    let _ = handle.receive_frame(sync_request(tag));
                }
                Op::HostAsync(tag) => {
                    let _ = handle.receive_frame(async_message(tag));
                }
                Op::StackAsync(tag) => {
                    if handle.send_to_host(&[0x41, tag]).is_ok() {
                        sent_async.push(tag);
                    }
                }
                Op::Respond => {
                    if let Some(id) = handle.transaction() {
                        let _ = handle.respond(id, &[0x61, 0]);
                    }
                }
                Op::TxDone => transport.complete(&handle),
            }

            let written_before = transport.written.len();
            router.run_until_idle(&mut transport).unwrap();

            for message in drain(&stack) {
                if message.class() == MessageClass::SyncRequest {
                    outstanding += 1;
                }
            }
            for frame in &transport.written[written_before..] {
                match frame.class() {
                    Some(MessageClass::SyncResponse) => outstanding -= 1,
                    Some(MessageClass::Async) => {
                        prop_assert_eq!(outstanding, 0, "ASYNC written during a transaction");
                    }
                    other => prop_assert!(false, "unexpected frame class {:?}", other),
                }
            }

            prop_assert!((0..=1).contains(&outstanding));
            prop_assert_eq!(outstanding == 1, handle.transaction().is_some());
        }

        let written_async: Vec<u8> = transport
            .written
            .iter()
            .filter(|f| f.class() == Some(MessageClass::Async))
            .map(|f| f.cmd1())
            .collect();
        prop_assert_eq!(&written_async[..], &sent_async[..written_async.len()]);
        prop_assert_eq!(handle.stats().counter_underflows, 0);
    }
}
