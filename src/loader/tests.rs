// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::config::{ConfigError, ConfigProvider};
    use crate::loader::{LoaderError, PrerenderLoader};
    use serde_json::Value;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    // Mock config provider for testing
    #[derive(Debug)]
    struct MockConfigProvider {
        values: HashMap<String, Value>,
    }

    impl MockConfigProvider {
        fn new() -> Self {
            let mut values = HashMap::new();
            values.insert("server.port".to_string(), serde_json::json!(8080));
            values.insert("server.host".to_string(), serde_json::json!("127.0.0.1"));
            values.insert(
                "prerender.service_url".to_string(),
                serde_json::json!("http://render.internal:3000/"),
            );
            Self { values }
        }
    }

    impl ConfigProvider for MockConfigProvider {
        fn has(&self, key: &str) -> bool {
            self.values.contains_key(key)
        }

        fn provider_name(&self) -> &str {
            "mock"
        }

        fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
            Ok(self.values.get(key).cloned())
        }
    }

    #[tokio::test]
    async fn test_loader_with_provider() {
        let prerender = PrerenderLoader::new()
            .with_provider(MockConfigProvider::new())
            .build()
            .await
            .unwrap();

        let config = prerender.config();
        assert_eq!(config.get::<u64>("server.port").unwrap().unwrap(), 8080);
        assert_eq!(prerender.server().config().host, "127.0.0.1");
        assert_eq!(prerender.server().config().application_path, "/");
        assert_eq!(
            prerender.filter().config().service_url,
            "http://render.internal:3000/"
        );
    }

    #[tokio::test]
    async fn test_loader_with_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100
application_path = "/app"

[prerender]
token = "file-token"
whitelist = ["^https://example\\.com/blog/"]
strip_application_name_from_request_url = true
"#
        )
        .unwrap();

        let prerender = PrerenderLoader::new()
            .with_config_file(file.path().to_str().unwrap())
            .build()
            .await
            .unwrap();

        let settings = prerender.filter().config().clone();
        assert_eq!(settings.token(), Some("file-token"));
        assert!(settings.strip_application_name_from_request_url);
        assert_eq!(settings.whitelist.as_ref().map(Vec::len), Some(1));
        assert_eq!(prerender.server().config().port, 9100);
        assert_eq!(prerender.server().config().application_path, "/app");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "server": {{ "port": 9200 }}, "prerender": {{ "timeout_secs": 5 }} }}"#).unwrap();

        unsafe {
            std::env::set_var("PRLOADERTEST_SERVER__PORT", "9300");
        }

        let prerender = PrerenderLoader::new()
            .with_config_file(file.path().to_str().unwrap())
            .with_env_prefix("PRLOADERTEST_")
            .build()
            .await;

        unsafe {
            std::env::remove_var("PRLOADERTEST_SERVER__PORT");
        }

        let prerender = prerender.unwrap();
        assert_eq!(prerender.server().config().port, 9300);
        assert_eq!(prerender.filter().config().timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let result = PrerenderLoader::new()
            .with_config_file("/nonexistent/prerender.toml")
            .build()
            .await;
        assert!(matches!(result, Err(LoaderError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_invalid_rule_fails_build() {
        let mut provider = MockConfigProvider::new();
        provider
            .values
            .insert("prerender.blacklist".to_string(), serde_json::json!(["(open"]));

        let result = PrerenderLoader::new().with_provider(provider).build().await;
        assert!(matches!(result, Err(LoaderError::PrerenderError(_))));
    }

    #[tokio::test]
    async fn test_missing_shell_file_fails_build() {
        let mut provider = MockConfigProvider::new();
        provider.values.insert(
            "server.shell_file".to_string(),
            serde_json::json!("/nonexistent/index.html"),
        );

        let result = PrerenderLoader::new().with_provider(provider).build().await;
        assert!(result.is_err());
    }
}
