//! Diagnostic trace sink for the room.
//!
//! The hub reports what it does as short human-readable events. Tracers
//! only observe: nothing they do can change how the hub behaves.

use std::sync::{Arc, Mutex, PoisonError};

/// Receives trace events from the hub.
pub trait Tracer: Send + Sync {
    /// Record one event.
    fn trace(&self, event: &str);
}

/// A tracer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Off;

impl Tracer for Off {
    fn trace(&self, _event: &str) {}
}

/// The default tracer: discards everything.
#[must_use]
pub fn off() -> Arc<dyn Tracer> {
    Arc::new(Off)
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn trace(&self, event: &str) {
        tracing::debug!(target: "parlor::room", "{}", event);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryTracer {
    events: Mutex<Vec<String>>,
}

impl MemoryTracer {
    /// Create an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events containing `needle`.
    #[must_use]
    pub fn count(&self, needle: &str) -> usize {
        self.events().iter().filter(|e| e.contains(needle)).count()
    }
}

impl Tracer for MemoryTracer {
    fn trace(&self, event: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_is_silent() {
        off().trace("nobody hears this");
    }

    #[test]
    fn test_memory_tracer_records_in_order() {
        let tracer = MemoryTracer::new();
        tracer.trace("client joined");
        tracer.trace("client left");
        tracer.trace("client joined");

        assert_eq!(
            tracer.events(),
            vec!["client joined", "client left", "client joined"]
        );
        assert_eq!(tracer.count("joined"), 2);
    }

    #[test]
    fn test_memory_tracer_survives_poisoning() {
        let tracer = Arc::new(MemoryTracer::new());
        tracer.trace("before");

        let poisoner = Arc::clone(&tracer);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.events.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(tracer.events.is_poisoned());

        tracer.trace("after");
        assert_eq!(tracer.events(), vec!["before", "after"]);
    }
}
