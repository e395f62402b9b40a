// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::classifier::RequestClassifier;
    use crate::config::{ConfigError, PrerenderConfig};
    use crate::core::{Classification, IncomingRequest};

    const TWITTERBOT: &str = "Mozilla/5.0 (compatible; Twitterbot/1.0)";
    const BROWSER: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    fn request(url: &str) -> IncomingRequest {
        let raw_path = url
            .splitn(4, '/')
            .nth(3)
            .map(|p| format!("/{p}"))
            .unwrap_or_else(|| "/".to_string());
        IncomingRequest::new(url, raw_path)
    }

    fn classify(config: PrerenderConfig, request: &IncomingRequest) -> Classification {
        RequestClassifier::new(&config).unwrap().classify(request)
    }

    #[test]
    fn test_escaped_fragment_overrides_everything() {
        let config = PrerenderConfig {
            whitelist: Some(vec!["^https://nowhere\\.example/".to_string()]),
            blacklist: Some(vec![".*".to_string()]),
            ..PrerenderConfig::default()
        };

        // No user agent, static-looking URL, whitelist miss, blacklist hit
        let req = request("https://example.com/app.js?_escaped_fragment_=/");
        assert_eq!(classify(config.clone(), &req), Classification::Eligible);

        let req = request("https://example.com/page?a=1&_escaped_fragment_").with_user_agent(BROWSER);
        assert_eq!(classify(config, &req), Classification::Eligible);
    }

    #[test]
    fn test_escaped_fragment_found_without_raw_path() {
        let req = IncomingRequest {
            url: "http://x.com/a?_escaped_fragment_=".to_string(),
            ..Default::default()
        };
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::Eligible);
    }

    #[test]
    fn test_missing_or_blank_user_agent() {
        let req = request("https://example.com/page");
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::NotEligible);

        let req = request("https://example.com/page").with_user_agent("   ");
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::NotEligible);
    }

    #[test]
    fn test_crawler_match_is_case_insensitive_substring() {
        let req = request("https://example.com/page").with_user_agent(TWITTERBOT);
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::Eligible);

        // Mixed-case default entry against a lower-case agent
        let req = request("https://example.com/page").with_user_agent("discordbot/2.0");
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::Eligible);
    }

    #[test]
    fn test_regular_browser_is_not_eligible() {
        let req = request("https://example.com/page").with_user_agent(BROWSER);
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::NotEligible);
    }

    #[test]
    fn test_search_engines_need_escaped_fragment() {
        let req = request("https://example.com/page")
            .with_user_agent("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)");
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::NotEligible);
    }

    #[test]
    fn test_configured_crawlers_extend_defaults() {
        let config = PrerenderConfig {
            crawler_user_agents: Some(vec!["MyCustomBot".to_string()]),
            ..PrerenderConfig::default()
        };
        let classifier = RequestClassifier::new(&config).unwrap();

        assert!(classifier.is_crawler("mycustombot/3.1"));
        assert!(classifier.is_crawler(TWITTERBOT));
        assert!(!classifier.is_crawler(BROWSER));
    }

    #[test]
    fn test_static_resources_are_skipped() {
        let req = request("https://example.com/app/page.js").with_user_agent(TWITTERBOT);
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::NotEligible);

        let req = request("https://example.com/IMAGES/LOGO.PNG").with_user_agent(TWITTERBOT);
        assert_eq!(classify(PrerenderConfig::default(), &req), Classification::NotEligible);
    }

    #[test]
    fn test_configured_extensions_extend_defaults() {
        let config = PrerenderConfig {
            extensions_to_ignore: Some(vec![".webp".to_string()]),
            ..PrerenderConfig::default()
        };
        let classifier = RequestClassifier::new(&config).unwrap();

        assert!(classifier.is_static_resource("https://example.com/hero.WEBP"));
        assert!(classifier.is_static_resource("https://example.com/site.css"));
        assert!(!classifier.is_static_resource("https://example.com/about"));
    }

    #[test]
    fn test_whitelist_restricts_interception() {
        let config = PrerenderConfig {
            whitelist: Some(vec!["^https://example\\.com/blog/".to_string()]),
            ..PrerenderConfig::default()
        };

        let req = request("https://example.com/shop/item").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config.clone(), &req), Classification::NotEligible);

        let req = request("https://example.com/blog/post-1").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config, &req), Classification::Eligible);
    }

    #[test]
    fn test_whitelist_any_match_wins() {
        let config = PrerenderConfig {
            whitelist: Some(vec!["/blog/".to_string(), "/news/".to_string()]),
            ..PrerenderConfig::default()
        };

        let req = request("https://example.com/news/today").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config, &req), Classification::Eligible);
    }

    #[test]
    fn test_blacklist_matches_url() {
        let config = PrerenderConfig {
            blacklist: Some(vec!["/admin".to_string()]),
            ..PrerenderConfig::default()
        };

        let req = request("https://example.com/admin/users").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config.clone(), &req), Classification::NotEligible);

        let req = request("https://example.com/public").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config, &req), Classification::Eligible);
    }

    #[test]
    fn test_blacklist_matches_referrer() {
        let config = PrerenderConfig {
            blacklist: Some(vec!["^https://spam\\.example/".to_string()]),
            ..PrerenderConfig::default()
        };

        let req = request("https://example.com/public")
            .with_user_agent(TWITTERBOT)
            .with_referrer("https://spam.example/landing");
        assert_eq!(classify(config, &req), Classification::NotEligible);
    }

    #[test]
    fn test_absent_referrer_never_matches_blacklist() {
        // Matches only the empty string
        let config = PrerenderConfig {
            blacklist: Some(vec!["^$".to_string()]),
            ..PrerenderConfig::default()
        };

        let req = request("https://example.com/public").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config.clone(), &req), Classification::Eligible);

        let req = request("https://example.com/public")
            .with_user_agent(TWITTERBOT)
            .with_referrer("");
        assert_eq!(classify(config, &req), Classification::Eligible);
    }

    #[test]
    fn test_whitelist_checked_before_blacklist() {
        let config = PrerenderConfig {
            whitelist: Some(vec!["/blog/".to_string()]),
            blacklist: Some(vec!["/blog/drafts".to_string()]),
            ..PrerenderConfig::default()
        };

        let req = request("https://example.com/blog/drafts/1").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config.clone(), &req), Classification::NotEligible);

        let req = request("https://example.com/blog/published").with_user_agent(TWITTERBOT);
        assert_eq!(classify(config, &req), Classification::Eligible);
    }

    #[test]
    fn test_invalid_regex_rejected_at_build_time() {
        let config = PrerenderConfig {
            blacklist: Some(vec!["(unclosed".to_string()]),
            ..PrerenderConfig::default()
        };

        match RequestClassifier::new(&config) {
            Err(ConfigError::Invalid { key, message }) => {
                assert_eq!(key, "prerender.blacklist");
                assert!(message.contains("(unclosed"));
            }
            other => panic!("Expected Invalid error, got {other:?}"),
        }
    }
}
