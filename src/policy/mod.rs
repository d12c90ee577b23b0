//! Traffic policy for the workspace proxy.
//!
//! [`evaluator`] classifies a request into a [`Verdict`]; [`enforcer`] turns
//! a verdict into a synthesized denial response on the flow. Both are pure
//! functions of their inputs and keep no state between calls.

pub mod enforcer;
pub mod evaluator;

pub use enforcer::{denial_response, enforce};
pub use evaluator::{evaluate, Verdict};
