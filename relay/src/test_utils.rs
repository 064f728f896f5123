//! Test helpers shared by the unit tests.

use crate::config::{Config, UpstreamConfig};
use axum_test::TestServer;
use url::Url;

/// Path the upstream mock is expected to be called on, mirroring the real provider.
pub const TEST_TRANSCRIPTIONS_PATH: &str = "/openai/v1/audio/transcriptions";

/// Upstream settings pointing at `base_url` (usually a wiremock server) with a fixed test key.
pub fn upstream_config(base_url: &str) -> UpstreamConfig {
    UpstreamConfig {
        url: Url::parse(&format!("{base_url}{TEST_TRANSCRIPTIONS_PATH}")).expect("valid test upstream URL"),
        api_key: Some("test-key".to_string()),
        ..Default::default()
    }
}

pub fn create_test_config(upstream_base_url: &str) -> Config {
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.upstream = upstream_config(upstream_base_url);
    config
}

pub fn create_test_server(config: Config) -> TestServer {
    crate::Application::new(config)
        .expect("Failed to create application")
        .into_test_server()
}
