//! Adapters converting push-style native facilities into demand-gated
//! sources.

pub mod change;
pub mod query;
