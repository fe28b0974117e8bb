//! Inverted-index top-k query processors over sparse scalar-product spaces
//! (spec §4.4-§4.6): exhaustive DAAT, WAND, and Block-Max WAND, all
//! restricted to query/document pairs where the score is a weighted sum of
//! shared-term contributions (i.e. a negated-distance scalar-product
//! space — see [`crate::space::builtin::SparseCosineSpace`] and
//! [`crate::space::builtin::SparseDotProductSpace`]).

pub mod bmw;
pub mod daat;
pub mod posting;
pub mod topk;
pub mod wand;

pub use posting::InvertedIndex;
