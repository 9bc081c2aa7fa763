//! Health Prober (spec §4.5 / C5): OpenAI-compatible readiness checks against `host:port`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("probe request build failed: {0}")]
    Build(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
    Unreachable,
}

const PROBE_DEADLINE: Duration = Duration::from_secs(5);

/// Probes `GET http://{host}:{port}/health` with a short deadline.
///
/// `Ready` requires a 2xx response; any non-2xx is `NotReady`; any transport error
/// (connection refused, timeout, DNS failure) is `Unreachable`.
pub async fn probe(client: &reqwest::Client, host: &str, port: u16) -> Readiness {
    let url = format!("http://{host}:{port}/health");
    match tokio::time::timeout(PROBE_DEADLINE, client.get(&url).send()).await {
        Ok(Ok(resp)) if resp.status().is_success() => Readiness::Ready,
        Ok(Ok(_)) => Readiness::NotReady,
        Ok(Err(_)) | Err(_) => Readiness::Unreachable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_port_is_unreachable() {
        let client = reqwest::Client::new();
        let readiness = probe(&client, "127.0.0.1", 1).await;
        assert_eq!(readiness, Readiness::Unreachable);
    }
}
