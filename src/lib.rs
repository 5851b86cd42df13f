//! Palaver — conversational turn engine.
//!
//! Coordinates a single conversational turn between a user and an
//! LLM-backed assistant: context assembly, model invocation, tool
//! dispatch, uncertainty-driven search escalation, persistence, and
//! per-session event logging — all under a hard wall-clock deadline
//! with partial-failure tolerance.
//!
//! # Quick Start
//!
//! ```no_run
//! use palaver::prelude::*;
//!
//! # async fn example() -> palaver::error::Result<()> {
//! let assistant = Assistant::from_env()?;
//! let result = assistant
//!     .process_turn(TurnRequest::text("What's the weather in Singapore tomorrow?"))
//!     .await;
//! println!("{}", result.response);
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod memory;
pub mod model;
pub mod persistence;
pub mod prelude;
pub mod search;
pub mod tools;
pub mod types;
pub mod util;
