//! Element-by-element assembly of residuals and Jacobians.
//!
//! An [`AssemblyDispatcher`] splits an element range into chunks, one per worker thread. Each
//! worker reinitializes its [`QuadratureContext`] for every element, evaluates the applicable
//! physics objects into its [`LocalBuffer`] and scatters the buffer into a [`GlobalStore`].
pub mod buffers;
pub mod context;
pub mod dispatcher;
pub mod global;
pub mod partition;

pub use buffers::LocalBuffer;
pub use context::QuadratureContext;
pub use dispatcher::{AssemblyDispatcher, AssemblyPass, AssemblyResult, AssemblyTarget, DispatcherState, RegionFilter};
pub use global::{GlobalStore, PartialStore, ScatterDiscipline, ScatterTarget, StoreStatus};
pub use partition::Partitioning;
