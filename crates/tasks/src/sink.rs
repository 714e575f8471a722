// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound fire-and-forget send, implemented by the transport session.
//! Kept as a trait here so `nspass-tasks` never depends on
//! `nspass-transport` — the dependency direction runs the other way.

use std::sync::Arc;

use nspass_wire::Envelope;
use parking_lot::Mutex;

pub trait EnvelopeSink: Send + Sync {
    fn send(&self, envelope: Envelope);
}

/// A sink whose real target is installed after construction. Breaks the
/// construction-order cycle when the thing that needs a sink (the task
/// dispatcher) must be built before the thing that provides one (the
/// transport session, which itself needs the dispatcher to be built first).
#[derive(Default)]
pub struct DeferredSink {
    target: Mutex<Option<Arc<dyn EnvelopeSink>>>,
}

impl DeferredSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the real sink. Envelopes sent before this call are dropped.
    pub fn bind(&self, target: Arc<dyn EnvelopeSink>) {
        *self.target.lock() = Some(target);
    }
}

impl EnvelopeSink for DeferredSink {
    fn send(&self, envelope: Envelope) {
        if let Some(target) = self.target.lock().as_ref() {
            target.send(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct Capturing(StdMutex<Vec<Envelope>>);

    impl EnvelopeSink for Capturing {
        fn send(&self, envelope: Envelope) {
            self.0.lock().unwrap().push(envelope);
        }
    }

    fn sample_envelope() -> Envelope {
        Envelope::new(
            nspass_wire::MessageType::Heartbeat,
            1,
            nspass_wire::Payload::Heartbeat(nspass_wire::HeartbeatPayload {
                agent_id: "a1".into(),
                timestamp_millis: 1,
                status: "online".into(),
                labels: Default::default(),
            }),
        )
    }

    #[test]
    fn sends_before_bind_are_dropped() {
        let deferred = DeferredSink::new();
        deferred.send(sample_envelope());
    }

    #[test]
    fn sends_after_bind_reach_the_real_target() {
        let deferred = DeferredSink::new();
        let captured = Arc::new(Capturing(StdMutex::new(Vec::new())));
        deferred.bind(captured.clone());
        deferred.send(sample_envelope());
        assert_eq!(captured.0.lock().unwrap().len(), 1);
    }
}
