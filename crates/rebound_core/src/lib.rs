//! Rebound Core Runtime
//!
//! Foundational primitives shared by the Rebound crates:
//!
//! - **State Machines**: typed flat state machines with entry actions and history
//! - **Surface Signals**: manipulation and rendering events raised by a scrollable host
//!
//! # Example
//!
//! ```rust
//! use rebound_core::fsm::StateMachine;
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Phase { Idle, Busy }
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq)]
//! enum Signal { Start, Done }
//!
//! let mut fsm = StateMachine::builder(Phase::Idle)
//!     .on(Phase::Idle, Signal::Start, Phase::Busy)
//!     .on(Phase::Busy, Signal::Done, Phase::Idle)
//!     .build();
//!
//! assert_eq!(fsm.send(Signal::Start), Phase::Busy);
//! ```

pub mod events;
pub mod fsm;

pub use events::{EventData, EventDispatcher, EventType, HandlerId, SurfaceEvent, SurfaceId};
pub use fsm::{StateMachine, StateMachineBuilder, Transition};
