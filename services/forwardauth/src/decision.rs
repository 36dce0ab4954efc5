//! Access decision state machine.
//!
//! Every forwarded request is decided independently. [`AccessController::evaluate`]
//! applies the ordered rules to headers, cookie and query without any I/O; only
//! the [`AccessState::PendingExchange`] branch calls out to the provider, in
//! [`AccessController::decide`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::ForwardAuthError;
use crate::forwarded::ForwardedRequest;
use crate::jwt::TokenCodec;
use crate::oauth::CodeExchanger;
use crate::observability::ForwardAuthMetrics;
use crate::query::AccessQuery;
use crate::redirect::{self, AccessOutcome, DenyReason};

/// Where a request stands after the synchronous rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    /// No usable credential and no code
    Unauthenticated,
    /// No usable credential but a code to exchange
    PendingExchange,
    /// Credential verified and permitted
    Authenticated,
    /// Request refused
    Denied,
    /// OAuth endpoints unset
    Misconfigured,
}

impl AccessState {
    /// Stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PendingExchange => "pending_exchange",
            Self::Authenticated => "authenticated",
            Self::Denied => "denied",
            Self::Misconfigured => "misconfigured",
        }
    }
}

/// Result of the synchronous rules.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Decided without I/O
    Decided {
        /// State the request reached
        state: AccessState,
        /// Response to send
        outcome: AccessOutcome,
    },
    /// Code must be exchanged before the request can be answered
    Exchange {
        /// Authorization code
        code: String,
        /// Original URL with `code` stripped
        return_to: String,
    },
}

impl Evaluation {
    const fn decided(state: AccessState, outcome: AccessOutcome) -> Self {
        Self::Decided { state, outcome }
    }

    /// State the request reached.
    #[must_use]
    pub const fn state(&self) -> AccessState {
        match self {
            Self::Decided { state, .. } => *state,
            Self::Exchange { .. } => AccessState::PendingExchange,
        }
    }
}

/// Shared decision engine, one per process.
#[derive(Clone)]
pub struct AccessController {
    codec: Arc<TokenCodec>,
    authorize_url: Option<Url>,
    exchanger: Option<Arc<dyn CodeExchanger>>,
    metrics: ForwardAuthMetrics,
}

impl AccessController {
    /// Creates a controller. `None` endpoints leave the gateway misconfigured.
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        authorize_url: Option<Url>,
        exchanger: Option<Arc<dyn CodeExchanger>>,
        metrics: ForwardAuthMetrics,
    ) -> Self {
        Self {
            codec,
            authorize_url,
            exchanger,
            metrics,
        }
    }

    /// Applies the ordered access rules without performing I/O.
    pub fn evaluate(
        &self,
        request: &ForwardedRequest,
        query: &AccessQuery,
        token: Option<&str>,
    ) -> Evaluation {
        if request.is_preflight() {
            return Evaluation::decided(AccessState::Authenticated, AccessOutcome::Allow);
        }

        let (Some(authorize_url), Some(_)) = (&self.authorize_url, &self.exchanger) else {
            return Evaluation::decided(
                AccessState::Misconfigured,
                AccessOutcome::ServerMisconfigured {
                    missing: self.missing_settings(),
                },
            );
        };

        let Ok(whitelist) = query.enforced_whitelist() else {
            return Evaluation::decided(
                AccessState::Denied,
                AccessOutcome::Deny(DenyReason::WhitelistMissing),
            );
        };

        match self.codec.verify(token) {
            Ok(verified) => {
                let claims = verified.claims();
                if whitelist.is_none_or(|listed| claims.is_listed(listed)) {
                    debug!(
                        username = %claims.username,
                        token_state = verified.state_name(),
                        "Credential accepted"
                    );
                    Evaluation::decided(AccessState::Authenticated, AccessOutcome::Allow)
                } else {
                    info!(username = %claims.username, "User not on whitelist");
                    Evaluation::decided(
                        AccessState::Denied,
                        AccessOutcome::Deny(DenyReason::NotListed),
                    )
                }
            }
            Err(err) => {
                if token.is_some() {
                    debug!(error = %err, "Ignoring unusable credential");
                }
                match request.authorization_code() {
                    Some(code) => Evaluation::Exchange {
                        code,
                        return_to: request.url_without_code(),
                    },
                    None => Evaluation::decided(
                        AccessState::Unauthenticated,
                        AccessOutcome::ProviderRedirect {
                            location: redirect::provider_redirect_url(
                                authorize_url,
                                &request.original_url(),
                            ),
                        },
                    ),
                }
            }
        }
    }

    /// Decides a request, exchanging an authorization code when needed.
    ///
    /// # Errors
    ///
    /// Returns the exchange or signing failure; the caller renders it.
    pub async fn decide(
        &self,
        request: &ForwardedRequest,
        query: &AccessQuery,
        token: Option<&str>,
    ) -> Result<AccessOutcome, ForwardAuthError> {
        let evaluation = self.evaluate(request, query, token);
        debug!(
            state = evaluation.state().as_str(),
            host = request.host(),
            client_ip = request.client_ip(),
            "Access rules evaluated"
        );

        match evaluation {
            Evaluation::Decided { outcome, .. } => Ok(outcome),
            Evaluation::Exchange { code, return_to } => {
                self.complete_exchange(&code, return_to, query).await
            }
        }
    }

    async fn complete_exchange(
        &self,
        code: &str,
        return_to: String,
        query: &AccessQuery,
    ) -> Result<AccessOutcome, ForwardAuthError> {
        let exchanger = self
            .exchanger
            .as_ref()
            .ok_or_else(|| ForwardAuthError::Configuration {
                missing: self.missing_settings(),
            })?;

        let started = Instant::now();
        let result = exchanger.exchange(code).await;
        let elapsed = started.elapsed().as_secs_f64();

        let claims = match result {
            Ok(claims) => {
                self.metrics.record_exchange("success", elapsed);
                claims
            }
            Err(err) => {
                self.metrics.record_exchange(err.code().as_str(), elapsed);
                warn!(error = %err, "Authorization code exchange failed");
                return Err(err);
            }
        };

        info!(username = %claims.username, "Issuing identity cookie");
        let token = self.codec.sign(&claims)?;
        Ok(AccessOutcome::CookieRefreshRedirect {
            location: return_to,
            cookie: redirect::identity_cookie(&query.cookie_field, token, query.same_site),
        })
    }

    fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.authorize_url.is_none() {
            missing.push("GITHUB_OAUTH_AUTHORIZE_URL");
        }
        if self.exchanger.is_none() {
            missing.push("GITHUB_OAUTH_USERINFO_ENDPOINT");
        }
        missing
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("authorize_url", &self.authorize_url)
            .field("exchanger", &self.exchanger.is_some())
            .finish_non_exhaustive()
    }
}
