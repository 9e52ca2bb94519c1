// src/state.rs

use axum::extract::FromRef;

use crate::{config::Config, repository::Repositories, services::AttemptService};

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub attempts: AttemptService,
    pub config: Config,
}

impl AppState {
    /// Builds the service graph over `repos` using the configured start policy.
    pub fn new(repos: Repositories, config: Config) -> Self {
        let attempts = AttemptService::new(repos.clone(), config.start_policy);
        Self {
            repos,
            attempts,
            config,
        }
    }
}

impl FromRef<AppState> for Repositories {
    fn from_ref(state: &AppState) -> Self {
        state.repos.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
