//! Qumud - Shared-world combat event engine
//!
//! Players poll on their own timers; whoever polls an encounter first
//! catches it up by however many ticks it is owed. Admission, ticking and
//! delta sync live in `engine`; `store` provides the leases and tables they
//! run against.

pub mod account;
pub mod chat;
pub mod core;
pub mod engine;
pub mod entity;
pub mod store;
pub mod world;
