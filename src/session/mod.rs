//! Session orchestration — phases, processing modes, shared state, and the
//! controller that drives them from hotkey edges.
//!
//! ```text
//! hotkey edges ──▶ SessionController ──▶ capture / pipeline hand-off
//!                        │
//!                        ▼
//!                  StatusHandle ──▶ SessionState + observers
//! ```

pub mod controller;
pub mod mode;
pub mod phase;
pub mod state;

pub use controller::SessionController;
pub use mode::ProcessingMode;
pub use phase::Phase;
pub use state::{new_shared_state, OpenSession, SessionState, SharedState, StatusHandle};
