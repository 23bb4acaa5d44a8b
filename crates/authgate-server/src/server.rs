//! Authgate HTTP server

use authgate_auth::{Authenticator, CachedAuthenticator, LdapAuthenticator};
use authgate_core::{config::AuthgateConfig, Error, Result};
use axum::{
    http::HeaderValue,
    middleware,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<dyn Authenticator>,
    /// Prebuilt `WWW-Authenticate` value
    pub challenge: HeaderValue,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(authenticator: Arc<dyn Authenticator>, realm: &str) -> Result<Self> {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
            .map_err(|e| Error::InvalidConfig(format!("Invalid realm '{}': {}", realm, e)))?;

        Ok(Self {
            authenticator,
            challenge,
            start_time: Instant::now(),
        })
    }
}

/// Directory authenticator, wrapped in the result cache unless caching is off
pub fn build_authenticator(config: &AuthgateConfig) -> Arc<dyn Authenticator> {
    let directory = LdapAuthenticator::new(config.ldap.clone());
    info!("Directory: {}", config.ldap.url());

    match config.cache.ttl() {
        Some(ttl) => {
            info!("Authentication cache enabled, ttl={}s", ttl.as_secs());
            Arc::new(CachedAuthenticator::new(directory, ttl))
        }
        None => {
            info!("Authentication cache disabled");
            Arc::new(directory)
        }
    }
}

/// Routes served by every instance
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", any(routes::authenticate))
        .route("/health", get(routes::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Authgate server
pub struct AuthServer {
    config: AuthgateConfig,
}

impl AuthServer {
    pub fn new(config: AuthgateConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;

        let metrics = Arc::new(MetricsRecorder::new()?);
        info!("Prometheus metrics initialized");

        let authenticator = build_authenticator(&self.config);
        let state = AppState::new(authenticator, &self.config.server.realm)?;

        let app = router(state)
            .merge(
                Router::new()
                    .route("/metrics", get(metrics_handler))
                    .with_state(metrics.clone()),
            )
            .layer(middleware::from_fn_with_state(metrics, metrics_middleware));

        let addr = self.config.server.addr();
        let listener = TcpListener::bind(&addr).await?;

        info!("Authgate listening on http://{}", addr);
        info!("Auth endpoint at http://{}/auth", addr);
        info!("Prometheus metrics at http://{}/metrics", addr);
        info!("Realm: {}", self.config.server.realm);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Authgate stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_auth::Verdict;

    fn unreachable_config(cache_enabled: bool) -> AuthgateConfig {
        let mut config = AuthgateConfig::default();
        // Nothing listens on port 1
        config.ldap.hostname = "127.0.0.1".to_string();
        config.ldap.port = Some(1);
        config.ldap.tls = false;
        config.ldap.timeout_seconds = 2;
        config.cache.enabled = cache_enabled;
        config
    }

    #[tokio::test]
    async fn test_pipeline_reports_unreachable_directory() {
        for cache_enabled in [true, false] {
            let authenticator = build_authenticator(&unreachable_config(cache_enabled));
            let verdict = authenticator.authenticate("alice", "secret", &[]).await;
            assert_eq!(verdict, Verdict::Error);
        }
    }

    #[test]
    fn test_challenge_header() {
        let authenticator = build_authenticator(&unreachable_config(false));
        let state = AppState::new(authenticator, "my realm").unwrap();
        assert_eq!(state.challenge, "Basic realm=\"my realm\"");

        let authenticator = build_authenticator(&unreachable_config(false));
        assert!(AppState::new(authenticator, "bad\nrealm").is_err());
    }
}
