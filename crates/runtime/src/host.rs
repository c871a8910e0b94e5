//! The host callback surface (spec §6): "wall-clock time, random,
//! filesystem, stdio, halt-check. The core calls these through a
//! function-pointer table."
//!
//! The concrete compositor/text-dialect/event-loop/FFI host layer is out
//! of scope (spec §1 Non-goals); what belongs here is only the narrow
//! trait boundary natives call through, so this crate never embeds a
//! platform dependency itself.

use std::io;

/// Host-provided services a native function may call through. An
/// embedder supplies one implementation per interpreter instance (spec
/// §9: no process-wide statics, so this isn't a global either).
pub trait HostCallbacks: Send {
    /// Milliseconds since the Unix epoch.
    fn wall_clock_millis(&self) -> u64;

    /// A host-seeded random `u64`, for RANDOM and friends.
    fn random_u64(&mut self) -> u64;

    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> io::Result<()>;

    fn write_stdout(&mut self, text: &str);
    fn write_stderr(&mut self, text: &str);

    /// Polled at evaluator loop backedges (spec §5: "the evaluator polls
    /// a cancellation flag at loop backedges"); a host may use this to
    /// check an external interrupt source instead of (or in addition to)
    /// `Interpreter::request_halt`.
    fn halt_requested(&self) -> bool {
        false
    }
}

/// A host with no real I/O, for tests and embeddings that only need the
/// evaluator's pure core (grounded in the teacher workspace's own
/// `tests/` use of an in-memory stand-in host for its channel/IO-adjacent
/// tests).
pub struct NullHost;

impl HostCallbacks for NullHost {
    fn wall_clock_millis(&self) -> u64 {
        0
    }

    fn random_u64(&mut self) -> u64 {
        0
    }

    fn read_file(&self, _path: &str) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "NullHost has no filesystem",
        ))
    }

    fn write_file(&self, _path: &str, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "NullHost has no filesystem",
        ))
    }

    fn write_stdout(&mut self, _text: &str) {}
    fn write_stderr(&mut self, _text: &str) {}
}
