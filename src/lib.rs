//! Parallel residual and Jacobian assembly for multiphysics finite element systems.
//!
//! The crate drives a set of independently written *physics objects* (kernels, boundary
//! conditions, interface terms) over the elements of a mesh and accumulates their local
//! contributions into a global residual vector and a sparse Jacobian matrix. The pieces are:
//!
//! - [`dofs::DofMap`] maps element-local shape functions to global degrees of freedom.
//! - [`assembly::QuadratureContext`] caches quadrature and shape function data for one element.
//! - [`physics::Registry`] holds the resolved physics objects for every (variable, region).
//! - [`coupling::CouplingResolver`] decides which off-diagonal Jacobian blocks are needed.
//! - [`assembly::AssemblyDispatcher`] partitions elements over a persistent worker pool.
//! - [`assembly::GlobalStore`] receives the scatter-add operations from all workers.
//!
//! The mesh, the nonlinear solver and the input parsing are external collaborators; the crate
//! only consumes the interfaces it needs from them.
use nalgebra::RealField;

pub mod assembly;
pub mod coupling;
pub mod dofs;
pub mod dual;
pub mod element;
pub mod error;
pub mod mesh;
pub mod physics;
pub mod problem;
pub mod quadrature;
pub mod settings;
pub mod variable;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use assembly::global::AtomicFloat;

/// A real scalar type supported by the assembly engine.
///
/// Besides the usual field operations, the type must support lock-free accumulation so that
/// it can be stored in a [`GlobalStore`](assembly::GlobalStore) with the atomic scatter discipline.
pub trait Real: RealField + Copy + AtomicFloat {}

impl<T> Real for T where T: RealField + Copy + AtomicFloat {}
