#![no_main]

use std::time::Duration;

use bonesync_core::NodeId;
use bonesync_pose::Skeleton;
use bonesync_runtime::{NodeConfig, ObserverNode};
use bonesync_time::ManualClock;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let clock = ManualClock::new();
    let mut target = Skeleton::chain(4);
    let Ok(mut observer) =
        ObserverNode::new(NodeId::new(1), NodeConfig::observer(), target.root(), clock.clone())
    else {
        return;
    };

    // Split input into frames on a length prefix; the observer must never panic
    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let len = usize::from(len).min(tail.len());
        observer.queue_incoming(Bytes::copy_from_slice(&tail[..len]));
        rest = &tail[len..];
        clock.advance(Duration::from_millis(10));
        let _ = observer.tick(&mut target);
    }
});
