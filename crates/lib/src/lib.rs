//! rolebook-lib: Core types and logic for rolebook
//!
//! This crate provides the pieces of a role-composition run:
//! - `Inventory` and `EnvironmentMap`: hosts, groups and their layered variables
//! - `Manifest`: the ordered role invocations with tags, guards and parameters
//! - `sequencer`: tag filtering and dependency ordering of invocations
//! - `resolve`: guard evaluation and parameter resolution for one host
//! - `plan`: per-host plans for a whole manifest
//! - `check`: static diagnostics over a manifest and its inventory

pub mod check;
pub mod config;
pub mod consts;
pub mod environment;
pub mod expr;
pub mod inventory;
pub mod manifest;
pub mod plan;
pub mod resolve;
pub mod sequencer;
pub mod template;
pub mod value;
