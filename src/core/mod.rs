//! Rotor-state computation and caching engine.

pub mod batch_loader;
pub mod cache;
pub mod events;
pub mod frequency;
pub mod manager;
pub mod rotor_state;

pub use batch_loader::{BatchLoader, CancelToken, WorkerPool};
pub use events::{EventLoop, LoadInterceptor, RotorEvent, RotorStateListener, Subscription};
pub use frequency::FrequencyStrategy;
pub use manager::{
    EngineContext, LoadVerdict, ManagerStatus, RotorStateManager, StandardRotorStateManager,
};
pub use rotor_state::RotorState;
