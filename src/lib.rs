//! Haruko: turn orchestration for a conversational home assistant.
//!
//! One user utterance becomes a streamed reply, optionally with
//! side-effecting actions performed along the way:
//! Context → Provider Chain (pass 1) → Output Filter → Directive Parser →
//! Tool Dispatcher → Provider Chain (pass 2) → Output Filter → caller
//!
//! # Architecture
//!
//! - **Provider chain**: ordered generation backends with failover before
//!   the first fragment and bounded first-fragment/stall timeouts
//! - **Output filter**: keeps directive markup out of visible text
//! - **Directive parser**: extracts actions, search requests and memory
//!   writes from raw pass output
//! - **Tools**: a static registry of handlers with an opaque shell fallback
//! - **Turn controller**: the two-pass state machine, cancellable per turn
//! - **Collaborators**: interfaces to home, desktop, camera, memory and the
//!   other systems the engine drives

pub mod cancel;
pub mod collaborators;
pub mod config;
pub mod conversation;
pub mod directive;
pub mod error;
pub mod filter;
pub mod observability;
pub mod provider;
pub mod session;
pub mod tools;
pub mod turn;

pub use cancel::CancelToken;
pub use collaborators::Collaborators;
pub use config::AssistantConfig;
pub use error::{HarukoError, Result};
pub use session::{Assistant, CaptureSource};
pub use turn::{TurnEvent, TurnRequest, TurnState};
