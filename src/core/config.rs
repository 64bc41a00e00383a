use crate::core::errors::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Image relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub user_agent: String,
    pub fetch_timeout: Duration,
}

/// Chapter resolver configuration
#[derive(Debug, Clone)]
pub struct ChapterConfig {
    pub api_base: String,
    pub image_base_url: String,
}

/// OCR engine configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub tesseract_path: String,
    /// Tesseract language hint, e.g. `jpn` or `jpn_vert`
    pub language: String,
}

/// Translation API configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub target_language: String,
    pub api_timeout: Duration,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub chapter: ChapterConfig,
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::from_lookup(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup. Unparsable values
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| default.to_string())
        };

        let log_level = lookup("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            server: ServerConfig {
                port: parse_var(&lookup, "SERVER_PORT").unwrap_or(1420),
                host: string_or("SERVER_HOST", "0.0.0.0"),
                log_level,
            },
            relay: RelayConfig {
                user_agent: string_or("USER_AGENT", DEFAULT_USER_AGENT),
                fetch_timeout: Duration::from_secs(
                    parse_var(&lookup, "FETCH_TIMEOUT_SECONDS").unwrap_or(30),
                ),
            },
            chapter: ChapterConfig {
                api_base: string_or("CHAPTER_API_BASE", "https://api.comick.fun"),
                image_base_url: string_or("IMAGE_BASE_URL", "https://meo.comick.pictures"),
            },
            ocr: OcrConfig {
                tesseract_path: string_or("TESSERACT_PATH", "tesseract"),
                language: string_or("OCR_LANGUAGE", "jpn"),
            },
            translation: TranslationConfig {
                api_key: lookup("GEMINI_API_KEY")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                api_base: string_or(
                    "GEMINI_API_BASE",
                    "https://generativelanguage.googleapis.com",
                ),
                model: string_or("TRANSLATION_MODEL", "gemini-2.5-flash-lite"),
                target_language: string_or("TARGET_LANGUAGE", "English"),
                api_timeout: Duration::from_secs(
                    parse_var(&lookup, "API_TIMEOUT_SECONDS").unwrap_or(60),
                ),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.relay.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("FETCH_TIMEOUT_SECONDS"));
        }
        if self.translation.api_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("API_TIMEOUT_SECONDS"));
        }

        if self.ocr.language.is_empty() {
            return Err(ConfigError::EmptyValue("OCR_LANGUAGE"));
        }
        if self.ocr.tesseract_path.is_empty() {
            return Err(ConfigError::EmptyValue("TESSERACT_PATH"));
        }
        if self.translation.target_language.is_empty() {
            return Err(ConfigError::EmptyValue("TARGET_LANGUAGE"));
        }
        if self.translation.model.is_empty() {
            return Err(ConfigError::EmptyValue("TRANSLATION_MODEL"));
        }

        for (key, value) in [
            ("CHAPTER_API_BASE", &self.chapter.api_base),
            ("IMAGE_BASE_URL", &self.chapter.image_base_url),
            ("GEMINI_API_BASE", &self.translation.api_base),
        ] {
            if reqwest::Url::parse(value).is_err() {
                return Err(ConfigError::InvalidUrl {
                    key,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn ocr_language(&self) -> &str {
        &self.ocr.language
    }

    pub fn translation_model(&self) -> &str {
        &self.translation.model
    }

    pub fn target_language(&self) -> &str {
        &self.translation.target_language
    }

    pub fn has_api_key(&self) -> bool {
        self.translation.api_key.is_some()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
