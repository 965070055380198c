//! Verification utilities for anime4k-push
//!
//! This crate cross-checks the wgpu backend against the deterministic CPU
//! backend, pass by pass.

pub mod compare;
