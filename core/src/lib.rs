//! Lifeboat Core
//!
//! The rescue engine: plans and executes an atomic sweep of a compromised
//! wallet, routing the native leg through the shielded pool.

pub mod rescue;
