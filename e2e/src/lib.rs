//! End-to-end scenarios for the pushgate session core.
//!
//! The session is exercised against scripted mock collaborators: a
//! recording downstream client and a scripted upstream transport. Scenario
//! drivers live in [`tests::tests`] and are wrapped by `#[test]` functions
//! in [`tests`].

pub mod mock;
pub mod tests;
