//! `simspace`: a non-metric similarity-search core.
//!
//! Four pieces compose around a common [`object::Object`]/[`space::Space`]
//! abstraction:
//!
//! - [`hnsw`] — an approximate-nearest-neighbor graph index (HNSW).
//! - [`inverted`] — exact and pruned top-k scoring over sparse scalar-product
//!   spaces (DAAT, WAND, Block-Max WAND).
//! - [`napp`] — a pivot-neighborhood approximation index (NAPP) for spaces
//!   with no vector representation to exploit.
//! - [`index`] — a common `Index<S>` trait over the graph- and
//!   pivot-based indexes.
//!
//! [`persistence`] saves and reloads an individual index; it is a
//! convenience on top of the in-memory structures above, not a primary
//! storage mode (no write-ahead log, no on-disk mutation path).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hnsw;
pub mod index;
pub mod inverted;
pub mod knn;
pub mod napp;
pub mod object;
pub mod persistence;
pub mod space;
pub mod stats;

pub use error::{Error, Result};
pub use index::Index;
pub use object::{Object, ObjectId};
pub use space::{Dist, Space};
