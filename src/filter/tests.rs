// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::PrerenderConfig;
    use crate::core::{BufferedResponse, IncomingRequest, Interceptor, PrerenderError};
    use crate::filter::PrerenderFilter;

    const TWITTERBOT: &str = "Mozilla/5.0 (compatible; Twitterbot/1.0)";

    fn filter_for(service_url: String) -> PrerenderFilter {
        PrerenderFilter::new(Arc::new(PrerenderConfig {
            service_url,
            ..PrerenderConfig::default()
        }))
        .unwrap()
    }

    fn dead_service_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/")
    }

    #[tokio::test]
    async fn test_crawler_request_is_intercepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", TWITTERBOT))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-test", "1")
                    .set_body_string("<html>ok</html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let filter = filter_for(format!("{}/", server.uri()));
        let request = IncomingRequest::new("http://example.com/page", "/page").with_user_agent(TWITTERBOT);
        let mut response = BufferedResponse::new();

        assert!(filter.intercept(&request, &mut response).await);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html>ok</html>");
        assert_eq!(response.headers.get("x-test").unwrap(), "1");
        assert!(response.is_completed());

        let received = server.received_requests().await.unwrap();
        assert!(received[0].url.path().ends_with("example.com/page"));
    }

    #[tokio::test]
    async fn test_escaped_fragment_upstream_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>snap</html>"))
            .mount(&server)
            .await;

        let filter = filter_for(format!("{}/", server.uri()));
        let request = IncomingRequest::new(
            "http://example.com/a?_escaped_fragment_=/&b=1",
            "/a?_escaped_fragment_=/&b=1",
        );
        let mut response = BufferedResponse::new();

        assert!(filter.intercept(&request, &mut response).await);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].url.query(), Some("b=1"));
        assert!(received[0].url.path().ends_with("example.com/a"));
    }

    #[tokio::test]
    async fn test_browser_request_is_left_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let filter = filter_for(format!("{}/", server.uri()));
        let request = IncomingRequest::new("http://example.com/page", "/page")
            .with_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0");
        let mut response = BufferedResponse::new();

        assert!(!filter.intercept(&request, &mut response).await);
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert!(!response.is_completed());
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(504).set_body_string("timeout"))
            .mount(&server)
            .await;

        let filter = filter_for(format!("{}/", server.uri()));
        let request = IncomingRequest::new("http://example.com/page", "/page").with_user_agent(TWITTERBOT);
        let mut response = BufferedResponse::new();

        assert!(filter.intercept(&request, &mut response).await);
        assert_eq!(response.status, 504);
        assert_eq!(response.body, "timeout");
    }

    #[tokio::test]
    async fn test_unreachable_service_fails_open() {
        let filter = filter_for(dead_service_url());
        let request = IncomingRequest::new("http://example.com/page", "/page").with_user_agent(TWITTERBOT);
        let mut response = BufferedResponse::new();

        assert!(!filter.intercept(&request, &mut response).await);
        assert_eq!(response.status, 200);
        assert!(response.headers.is_empty());
        assert!(!response.is_flushed());
    }

    #[tokio::test]
    async fn test_malformed_url_fails_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let filter = filter_for(format!("{}/", server.uri()));
        let request = IncomingRequest::new("::not-a-url::", "/?_escaped_fragment_=");
        let mut response = BufferedResponse::new();

        assert!(!filter.intercept(&request, &mut response).await);
        assert!(!response.is_completed());
    }

    #[tokio::test]
    async fn test_trace_header_is_configurable() {
        let filter = filter_for(dead_service_url()).with_trace_header("x-request-id");
        let request = IncomingRequest::new("http://example.com/page", "/page")
            .with_header("X-Request-ID", "abc-123");
        assert_eq!(filter.trace_id(&request), "abc-123");

        // Falls back to a fresh uuid
        let request = IncomingRequest::new("http://example.com/page", "/page");
        assert_eq!(filter.trace_id(&request).len(), 36);
    }

    #[test]
    fn test_invalid_rule_fails_construction() {
        let result = PrerenderFilter::new(Arc::new(PrerenderConfig {
            whitelist: Some(vec!["[".to_string()]),
            ..PrerenderConfig::default()
        }));
        match result {
            Err(PrerenderError::ConfigError(msg)) => assert!(msg.contains("prerender.whitelist")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_name() {
        let filter = filter_for("http://localhost/".to_string());
        assert_eq!(filter.name(), "prerender");
        assert_eq!(filter.config().service_url, "http://localhost/");
    }
}
