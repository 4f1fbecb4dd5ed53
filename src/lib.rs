// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! gitnest - Minimal Source Hosting Server
//!
//! Account registration with email verification, JWT sessions backed by a
//! shared KV store, and bare git repository management over HTTP.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Token issuance, validation, revocation and password hashing
//! - `kv` - Ephemeral auth state (Redis or in-process)
//! - `storage` - Credentials and repository metadata (redb)
//! - `mail` - Outbound mail queue and transports
//! - `rate_limit` - Fixed-window request limiting
//! - `repos` - Repository name rules and provisioning

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod kv;
pub mod mail;
pub mod models;
pub mod rate_limit;
pub mod repos;
pub mod state;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod testing;
