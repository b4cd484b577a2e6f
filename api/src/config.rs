use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// All environment-derived settings, resolved once at startup. Handlers
/// read from this struct only; nothing touches the process environment at
/// request time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing secret for the identity provider's webhooks (`whsec_...`).
    /// When unset the webhook route refuses every delivery with a 500.
    pub webhook_secret: Option<String>,
    /// Shared secret expected in the `x-vapi-secret` header. When unset the
    /// check is skipped entirely. That is a deliberate development fallback
    /// and is warned about at startup, not silently accepted.
    pub vapi_secret: Option<String>,
    /// API key for the chat-completion provider.
    pub groq_api_key: String,
    /// Model id for both plan completions.
    pub groq_model: String,
    /// Base URL of the provider's OpenAI-compatible surface.
    pub groq_base_url: String,
    /// Base URL of the external document store deployment.
    pub store_url: String,
    /// Deploy key for the store's mutation endpoint, if it requires one.
    pub store_api_key: Option<String>,
}

const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            webhook_secret: optional("CLERK_WEBHOOK_SECRET"),
            vapi_secret: optional("VAPI_SECRET"),
            groq_api_key: required("GROQ_API_KEY")?,
            groq_model: optional("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            groq_base_url: optional("GROQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            store_url: required("STORE_URL")?,
            store_api_key: optional("STORE_API_KEY"),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Treats empty values as unset so `VAR=` in an env file does not silently
/// enable a permissive path with an empty secret.
fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
