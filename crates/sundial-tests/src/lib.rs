//! Cross-engine test support for Sundial.
//!
//! The unit tests inside each crate stub out their neighbors; the tests in
//! this crate wire the real forge, market and reward engine together over
//! one shared ledger and drive whole protocol journeys through them.

pub mod helpers;
