//! Debounced, coalescing refresh scheduling.
//!
//! Decides *when* to call the expensive "fetch full activity list" endpoint
//! for a house, given refresh requests arriving at arbitrary rates.
//!
//! # Per-key state machine
//! ```text
//! Idle --request--> Scheduled(pending=2) --fire, pending>0--> Scheduled(pending-1) --...--> Idle
//! StartupPending --fire once--> Idle
//! ```
//!
//! # Architecture guarantees
//! * **One chain per key**: a key never has two armed timers, and its own
//!   chain never has two fetches in flight.
//! * **No lock across await**: bookkeeping is mutated in short synchronous
//!   sections; fetches run with the lock released.
//! * **Failures are swallowed**: a failed fetch is logged and the chain
//!   continues exactly as on success.

mod scheduler;


pub use scheduler::RefreshScheduler;
