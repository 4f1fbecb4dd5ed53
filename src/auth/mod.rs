// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens, one-time tokens and credential hashing.
//!
//! ## Token Model
//!
//! - **Access token**: HS256 JWT `{sub, iat, exp, jti}`, 15 minutes, never
//!   stored. Revocable through a jti blacklist in the KV store.
//! - **Refresh token**: 512-bit random string, 7 days, stored as a keyed
//!   digest. Reusable until it expires or is revoked at logout.
//! - **One-time token**: 256-bit random string for email verification (24h)
//!   and password reset (1h), redeemable once.
//!
//! ## Request Flow
//!
//! 1. Client sends `Authorization: Bearer <access token>`
//! 2. [`middleware::require_auth`] runs the [`TokenValidator`] chain
//! 3. On success the [`AuthenticatedUser`] is available to handlers via the
//!    [`Auth`] extractor; on failure the request ends with a 401 envelope

pub mod claims;
pub mod crypto;
pub mod error;
pub mod extractor;
pub mod issuer;
pub mod middleware;
pub mod one_time;
pub mod password;
pub mod revoker;
pub mod validator;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{Auth, MaybeBearer};
pub use issuer::{JwtKeys, TokenIssuer};
pub use one_time::{OneTimeTokens, Purpose};
pub use password::PasswordHasher;
pub use revoker::SessionRevoker;
pub use validator::TokenValidator;
