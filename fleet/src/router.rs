//! Endpoint Router (spec §4.7 / C7): resolves a request to one concrete OpenAI-compatible
//! base URL, API key, and model identifier. Does not itself start backends.

use thiserror::Error;

use config::{Backend, BackendKind, Config, ConfigError};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSource {
    Local,
    Remote,
}

/// A resolved serving target for the next chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model_identifier: String,
    pub kind: BackendSource,
    /// Set only for `Local`: the backend name the caller should ensure is Ready via the
    /// supervisor before sending the request (spec §4.7 "report state and lets C8 call the
    /// supervisor").
    pub backend_name: Option<String>,
}

/// Resolves the active endpoint from the config store's current selection.
pub fn resolve(config: &Config) -> Result<ResolvedEndpoint, RouterError> {
    let backend = config.get_active_backend()?;
    Ok(to_resolved(&backend))
}

fn to_resolved(backend: &Backend) -> ResolvedEndpoint {
    match &backend.kind {
        BackendKind::Remote { model_name, .. } => ResolvedEndpoint {
            base_url: backend.api_base_url(),
            api_key: backend.api_key(),
            model_identifier: model_name.clone(),
            kind: BackendSource::Remote,
            backend_name: None,
        },
        BackendKind::Local { .. } => ResolvedEndpoint {
            base_url: backend.api_base_url(),
            api_key: backend.api_key(),
            model_identifier: backend.name.clone(),
            kind: BackendSource::Local,
            backend_name: Some(backend.name.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config::parse(
            r#"
model_dir = "models"
cache_dir = ".cache"

[[local_llm_servers]]
name = "a"
kind = "local"
port = 8001
binary_path = "/usr/local/bin/llama-server"
model_dir = "models"
weights_file = "models/a.gguf"

[llm_endpoint]
default_local_server = "a"
"#,
        )
        .unwrap()
    }

    #[test]
    fn switch_route_scenario() {
        let mut config = sample_config();
        let resolved = resolve(&config).unwrap();
        assert_eq!(resolved.base_url, "http://127.0.0.1:8001/v1");

        config
            .add_backend(config::Backend {
                name: "b".to_string(),
                kind: config::BackendKind::Local {
                    host: "127.0.0.1".to_string(),
                    port: 8002,
                    binary_path: "/usr/local/bin/llama-server".into(),
                    model_dir: "models".into(),
                    weights_file: "models/b.gguf".into(),
                    server_params: Default::default(),
                },
                healthcheck_interval: 5,
                auto_start: false,
            })
            .unwrap();
        config.switch_default("b").unwrap();
        let resolved = resolve(&config).unwrap();
        assert_eq!(resolved.base_url, "http://127.0.0.1:8002/v1");
    }
}
