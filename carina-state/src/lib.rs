//! Carina State Management
//!
//! Managed resources are recorded in a local JSON state file
//! (`carina.state.json` by default). Writers take a lock file next to it
//! for the duration of an operation.
//!
//! # Example
//!
//! ```ignore
//! use carina_state::LocalBackend;
//!
//! let backend = LocalBackend::new();
//! let _lock = backend.lock("apply")?;
//! let mut state = backend.read_state()?.unwrap_or_default();
//! // ... record created resources ...
//! backend.write_state(&mut state)?;
//! // lock file is removed when `_lock` is dropped
//! ```

pub mod error;
pub mod local;
pub mod lock;
pub mod state;

pub use error::{StateError, StateResult};
pub use local::{LocalBackend, StateLock};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
