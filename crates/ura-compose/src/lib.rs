//! # URA Compose
//!
//! Composition of resolution contexts that live in different value spaces.
//!
//! A [`Translation`] carries a [`Bx`] between the two value spaces plus
//! rewrites for operators, arguments and problems. [`over`] layers a
//! primary context on a secondary one: the primary answers what it can and
//! the secondary, seen through the translation, answers the rest.

pub mod bx;
pub mod compose;

pub use bx::{Bx, FnBx, Reversed, bx};
pub use compose::{Composed, Translation, over};
