use crate::{
    app::{AppState, build_router},
    config::Config,
    error::ApiError,
    identity::IdentityProvider,
    observability,
    storage::{Store, StoreOptions},
};
use axum::serve::ListenerExt;
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip(config, identity))]
pub async fn build_state(
    config: &Config,
    identity: Option<Arc<dyn IdentityProvider>>,
) -> Result<AppState, ApiError> {
    let store = Arc::new(Store::open_with_options(config, StoreOptions { identity }).await?);
    Ok(AppState {
        store,
        url_prefix: config.url_prefix.clone(),
        max_body_size: config.max_body_size,
    })
}

pub async fn run(
    config: Config,
    identity: Option<Arc<dyn IdentityProvider>>,
) -> Result<(), ApiError> {
    let bind = config.bind;
    let data_dir = config.data_dir.display().to_string();
    let state = build_state(&config, identity).await?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!(
        bind = %bind,
        data_dir,
        url_prefix = config.url_prefix.as_str(),
        storage_backend = ?config.storage_backend,
        identity_backend = ?config.identity.backend,
        "bodigital listening"
    );

    let listener = listener.tap_io(|tcp| {
        let _ = tcp.set_nodelay(true);
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)
}

pub async fn run_standalone(config: Config) -> Result<(), ApiError> {
    let tracing_settings = observability::init_from_env(&config.log_level);
    tracing::debug!(
        log_filter = tracing_settings.filter,
        log_format = tracing_settings.log_format.as_str(),
        "initialized tracing subscriber"
    );
    run(config, None).await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                let _ = sigterm.recv().await;
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::build_state;
    use crate::config::Config;

    #[tokio::test]
    async fn state_carries_prefix_and_body_cap() {
        let mut cfg = Config::in_memory();
        cfg.url_prefix = "/api".to_string();
        cfg.max_body_size = 1024;
        let state = build_state(&cfg, None).await.expect("state");
        assert_eq!(state.url_prefix, "/api");
        assert_eq!(state.max_body_size, 1024);
    }
}
