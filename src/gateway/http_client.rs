//! Shared HTTP client for backend calls.
//!
//! One client is built per workspace and shared by every gateway created for
//! it, so connections to the project backend are pooled and reused across
//! file reads, saves and table operations.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::HttpConfig;

const USER_AGENT: &str = concat!("laradev-editor/", env!("CARGO_PKG_VERSION"));

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub fn create_shared_client(config: &HttpConfig) -> anyhow::Result<Arc<Client>> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::HttpGateway;
    use crate::project::ApiConfig;

    fn api_config() -> ApiConfig {
        ApiConfig {
            base_url: "http://localhost:8000/laradev".to_string(),
            headers: Default::default(),
        }
    }

    #[test]
    fn test_create_shared_client() {
        let client =
            create_shared_client(&HttpConfig::default()).expect("Failed to create client");
        assert!(Arc::strong_count(&client) == 1);
    }

    #[test]
    fn test_client_can_be_cloned() {
        let client =
            create_shared_client(&HttpConfig::default()).expect("Failed to create client");
        let client2 = Arc::clone(&client);
        assert!(Arc::strong_count(&client) == 2);
        drop(client2);
        assert!(Arc::strong_count(&client) == 1);
    }

    #[test]
    fn test_gateways_share_client_instance() {
        let shared_client =
            create_shared_client(&HttpConfig::default()).expect("Failed to create client");
        let client_ptr = Arc::as_ptr(&shared_client);

        let first = HttpGateway::with_client(api_config(), Arc::clone(&shared_client))
            .expect("Failed to create gateway");
        let second = HttpGateway::with_client(api_config(), Arc::clone(&shared_client))
            .expect("Failed to create gateway");

        assert_eq!(Arc::as_ptr(&first.http_client()), client_ptr);
        assert_eq!(Arc::as_ptr(&second.http_client()), client_ptr);
        assert_eq!(Arc::strong_count(&shared_client), 3);
    }
}
