// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::crypto::TokenDigester;
use crate::auth::{
    AuthError, JwtKeys, OneTimeTokens, PasswordHasher, SessionRevoker, TokenIssuer,
    TokenValidator,
};
use crate::kv::KvStore;
use crate::mail::MailQueue;
use crate::rate_limit::RateLimitConfig;
use crate::repos::RepoProvisioner;
use crate::storage::{CredentialStore, RepositoryStore};

/// External collaborators, injected at construction.
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialStore>,
    pub repositories: Arc<dyn RepositoryStore>,
    pub kv: Arc<dyn KvStore>,
    pub mail: MailQueue,
    pub provisioner: Arc<dyn RepoProvisioner>,
}

/// Secrets and parameters of the auth core.
pub struct AuthSettings {
    /// HS256 key for access tokens.
    pub access_secret: String,
    /// Key for refresh and one-time token digests.
    pub token_secret: String,
    /// Base of links in verification and reset mail.
    pub public_base_url: String,
    pub passwords: PasswordHasher,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub repositories: Arc<dyn RepositoryStore>,
    pub kv: Arc<dyn KvStore>,
    pub provisioner: Arc<dyn RepoProvisioner>,
    pub issuer: TokenIssuer,
    pub revoker: SessionRevoker,
    pub validator: TokenValidator,
    pub one_time: OneTimeTokens,
    pub passwords: PasswordHasher,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(deps: Collaborators, settings: AuthSettings) -> Result<Self, AuthError> {
        let keys = JwtKeys::from_secret(settings.access_secret.as_bytes());
        let digester = TokenDigester::new(settings.token_secret.as_bytes())?;

        let revoker = SessionRevoker::new(deps.kv.clone(), digester.clone());
        let validator = TokenValidator::new(&keys, revoker.clone());
        let issuer = TokenIssuer::new(keys, deps.kv.clone(), digester.clone());
        let one_time = OneTimeTokens::new(
            deps.kv.clone(),
            digester,
            deps.mail,
            settings.public_base_url,
        );

        Ok(Self {
            credentials: deps.credentials,
            repositories: deps.repositories,
            kv: deps.kv,
            provisioner: deps.provisioner,
            issuer,
            revoker,
            validator,
            one_time,
            passwords: settings.passwords,
            rate_limit: settings.rate_limit,
        })
    }
}
