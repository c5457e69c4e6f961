pub mod domain;
pub mod flow;
pub mod llm;
pub mod prompt;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
    pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
    pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1024;
    pub const DEFAULT_ANTHROPIC_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_PORT: u16 = 3000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub anthropic_base_url: String,
        pub anthropic_model: String,
        pub anthropic_max_tokens: u32,
        /// Transport-level bound on one model call. The advisory flow itself has no timeout.
        pub anthropic_timeout_secs: u64,
        pub sentry_dsn: Option<String>,
        pub port: u16,
        pub cors_allow_origin: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let non_empty = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

            Ok(Self {
                anthropic_api_key: non_empty("ANTHROPIC_API_KEY"),
                anthropic_base_url: non_empty("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
                anthropic_model: non_empty("ANTHROPIC_MODEL")
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                anthropic_max_tokens: lookup("ANTHROPIC_MAX_TOKENS")
                    .and_then(|s| s.trim().parse::<u32>().ok())
                    .unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
                anthropic_timeout_secs: lookup("ANTHROPIC_TIMEOUT_SECS")
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_ANTHROPIC_TIMEOUT_SECS),
                sentry_dsn: non_empty("SENTRY_DSN"),
                port: lookup("PORT")
                    .and_then(|s| s.trim().parse::<u16>().ok())
                    .unwrap_or(DEFAULT_PORT),
                cors_allow_origin: non_empty("CORS_ALLOW_ORIGIN"),
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        fn settings_from(pairs: &[(&str, &str)]) -> Settings {
            let env: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Settings::from_lookup(|key| env.get(key).cloned()).unwrap()
        }

        #[test]
        fn defaults_apply_when_unset() {
            let settings = settings_from(&[]);
            assert!(settings.anthropic_api_key.is_none());
            assert_eq!(settings.anthropic_base_url, DEFAULT_ANTHROPIC_BASE_URL);
            assert_eq!(settings.anthropic_model, DEFAULT_ANTHROPIC_MODEL);
            assert_eq!(settings.anthropic_max_tokens, DEFAULT_ANTHROPIC_MAX_TOKENS);
            assert_eq!(settings.anthropic_timeout_secs, DEFAULT_ANTHROPIC_TIMEOUT_SECS);
            assert_eq!(settings.port, DEFAULT_PORT);
            assert!(settings.require_anthropic_api_key().is_err());
        }

        #[test]
        fn unparsable_numbers_fall_back_to_defaults() {
            let settings = settings_from(&[
                ("ANTHROPIC_MAX_TOKENS", "lots"),
                ("ANTHROPIC_TIMEOUT_SECS", "-1"),
                ("PORT", "99999"),
            ]);
            assert_eq!(settings.anthropic_max_tokens, DEFAULT_ANTHROPIC_MAX_TOKENS);
            assert_eq!(settings.anthropic_timeout_secs, DEFAULT_ANTHROPIC_TIMEOUT_SECS);
            assert_eq!(settings.port, DEFAULT_PORT);
        }

        #[test]
        fn blank_api_key_counts_as_missing() {
            let settings = settings_from(&[("ANTHROPIC_API_KEY", "   ")]);
            assert!(settings.require_anthropic_api_key().is_err());

            let settings = settings_from(&[("ANTHROPIC_API_KEY", "sk-test"), ("PORT", "8080")]);
            assert_eq!(settings.require_anthropic_api_key().unwrap(), "sk-test");
            assert_eq!(settings.port, 8080);
        }
    }
}
