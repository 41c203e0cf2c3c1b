//! # loadset_core - Load Set Transfer Engine
//!
//! `loadset_core` moves uniform load sets, and the area assignments that use
//! them, between two structural models whose data is exposed as generic
//! database tables. Column layouts are discovered per read, magnitudes are
//! converted between the models' present units, and writes go through the
//! models' two-phase stage → apply transaction with a single bounded retry.
//!
//! ## Design Philosophy
//!
//! - **Explicit services**: models are reached only through the
//!   [`tables::TableService`] and [`geometry::GeometryService`] traits
//! - **Injected unit tables**: the conversion engine is built from a
//!   registry value, never from globals
//! - **Rich Errors**: one structured error type with stable codes
//!
//! ## Quick Start
//!
//! ```rust
//! use loadset_core::units::{UnitConverter, UnitSystem};
//! use loadset_core::units::{ConversionPolicy, QuantityKind};
//!
//! let converter = UnitConverter::standard();
//! let factor = converter
//!     .quantity_scale_factor(
//!         QuantityKind::AreaLoad,
//!         &UnitSystem::new("kN", "m", "C"),
//!         &UnitSystem::new("kN", "m", "C"),
//!         ConversionPolicy::Strict,
//!     )
//!     .unwrap();
//! assert_eq!(factor, 1.0);
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit basis registry and conversion engine
//! - [`tables`] - Table service trait, field resolution, read and staging paths
//! - [`transfer`] - Load-set and assignment transfers with reconciliation
//! - [`geometry`] - Area correlation by control point coordinates
//! - [`model`] - Model file name and present units
//! - [`snapshot`] - File-backed models with atomic saves and locking
//! - [`settings`] - Table keys and options from TOML
//! - [`worker`] - Background transfers with progress
//! - [`errors`] - Structured error types

pub mod errors;
pub mod geometry;
pub mod model;
pub mod settings;
pub mod snapshot;
pub mod tables;
pub mod transfer;
pub mod units;
pub mod worker;

// Re-export commonly used types at crate root for convenience
pub use errors::{ErrorCategory, TransferError, TransferResult};
pub use model::ModelInfo;
pub use settings::TransferSettings;
pub use snapshot::{load_snapshot, save_snapshot, FileLock, ModelSnapshot};
pub use units::{UnitBasisRegistry, UnitConverter, UnitSystem};
pub use worker::{spawn_transfer, ProgressReporter, ProgressUpdate, TransferHandle};
