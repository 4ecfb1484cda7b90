use std::{fmt::Display, str::FromStr};

use teloxide::types::UserId;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing {0}")]
    MissingKey(String),
    #[error("Invalid {0}")]
    InvalidValue(String),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub admin: AdminConfig,
    pub ledger: LedgerConfig,
    pub metering: MeteringConfig,
    pub payment: PaymentConfig,
    pub generation: GenerationConfig,
    pub speech: Option<SpeechConfig>,
    pub session: SessionConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig(pub String);

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub telegram_user_id: Option<UserId>,
}

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MeteringConfig {
    pub free_interactions: u64,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub provider_token: String,
    pub currency: String,
    /// Price of a single credit in the smallest unit of `currency`.
    pub unit_price: u32,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Replicate,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "replicate" => Ok(ProviderKind::Replicate),
            other => Err(ConfigError::InvalidValue(format!("GENERATION_PROVIDERS entry: {}", other))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GenerationConfig {
    /// Providers in the order they are tried.
    pub providers: Vec<ProviderKind>,
    pub system_prompt: String,
    pub openai: Option<OpenAiConfig>,
    pub replicate: Option<ReplicateConfig>,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ReplicateConfig {
    pub api_token: String,
    pub model_version: String,
    pub base_url: String,
    pub max_new_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Memory usage estimate: ~48 bytes per entry, ~48 KB for 1,000 active users.
    pub cache_capacity: usize,
    /// Sessions idle for longer than this are dropped.
    pub idle_ttl_secs: u64,
}

const DEFAULT_LEDGER_URL: &str = "relaybot.db";
const DEFAULT_FREE_INTERACTIONS: u64 = 10;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_UNIT_PRICE: u32 = 10;
const DEFAULT_PROVIDERS: &str = "replicate,openai";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MAX_TOKENS: u32 = 5000;
const DEFAULT_REPLICATE_MODEL_VERSION: &str = "955f2924d182e60e80caedecd15261d03d4ccc0151ff08e7fb14d0cad1fbcca6";
const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";
const DEFAULT_REPLICATE_MAX_NEW_TOKENS: u32 = 8000;
const DEFAULT_VOICE_ID: &str = "nsQAxyXwUKBvqtEK9MfK";
const DEFAULT_SPEECH_MODEL_ID: &str = "eleven_multilingual_v2";
const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_SESSION_CACHE_CAPACITY: usize = 1000;
const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 24 * 60 * 60;

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", key, e))),
            None => Ok(default),
        }
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment, loading `.env` first
    /// when one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        info!("Building AppConfig...");
        let env = Lookup(lookup);

        let admin_id = match env.optional("ADMIN_TELEGRAM_USER_ID") {
            Some(raw) => Some(UserId(
                raw.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue("ADMIN_TELEGRAM_USER_ID".to_string()))?,
            )),
            None => None,
        };

        let free_interactions = env.parsed_or("FREE_INTERACTIONS", DEFAULT_FREE_INTERACTIONS)?;

        let unit_price = env.parsed_or("PAYMENT_UNIT_PRICE", DEFAULT_UNIT_PRICE)?;
        if unit_price == 0 {
            return Err(ConfigError::InvalidValue("PAYMENT_UNIT_PRICE: must be positive".to_string()));
        }

        let providers = env
            .or("GENERATION_PROVIDERS", DEFAULT_PROVIDERS)
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(ProviderKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if providers.is_empty() {
            return Err(ConfigError::InvalidValue("GENERATION_PROVIDERS: empty".to_string()));
        }

        let openai = if providers.contains(&ProviderKind::OpenAi) {
            Some(OpenAiConfig {
                api_key: env.required("OPENAI_API_KEY")?,
                model: env.or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
                base_url: env.or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                max_tokens: env.parsed_or("OPENAI_MAX_TOKENS", DEFAULT_OPENAI_MAX_TOKENS)?,
            })
        } else {
            None
        };

        let replicate = if providers.contains(&ProviderKind::Replicate) {
            Some(ReplicateConfig {
                api_token: env.required("REPLICATE_API_TOKEN")?,
                model_version: env.or("REPLICATE_MODEL_VERSION", DEFAULT_REPLICATE_MODEL_VERSION),
                base_url: env.or("REPLICATE_BASE_URL", DEFAULT_REPLICATE_BASE_URL),
                max_new_tokens: env.parsed_or("REPLICATE_MAX_NEW_TOKENS", DEFAULT_REPLICATE_MAX_NEW_TOKENS)?,
            })
        } else {
            None
        };

        // Voice replies are optional, without a key the audio toggle falls back to text.
        let speech = env.optional("ELEVENLABS_API_KEY").map(|api_key| SpeechConfig {
            api_key,
            voice_id: env.or("ELEVENLABS_VOICE_ID", DEFAULT_VOICE_ID),
            model_id: env.or("ELEVENLABS_MODEL_ID", DEFAULT_SPEECH_MODEL_ID),
            base_url: env.or("ELEVENLABS_BASE_URL", DEFAULT_ELEVENLABS_BASE_URL),
        });

        let config = AppConfig {
            telegram: TelegramConfig(env.required("TELEGRAM_BOT_TOKEN")?),
            admin: AdminConfig {
                telegram_user_id: admin_id,
            },
            ledger: LedgerConfig {
                url: env.or("LEDGER_URL", DEFAULT_LEDGER_URL),
                auth_token: env.optional("LEDGER_AUTH_TOKEN"),
            },
            metering: MeteringConfig { free_interactions },
            payment: PaymentConfig {
                provider_token: env.required("PAYMENT_PROVIDER_TOKEN")?,
                currency: env.or("PAYMENT_CURRENCY", DEFAULT_CURRENCY).to_uppercase(),
                unit_price,
            },
            generation: GenerationConfig {
                providers,
                system_prompt: env.or("SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
                openai,
                replicate,
            },
            speech,
            session: SessionConfig {
                cache_capacity: env.parsed_or("SESSION_CACHE_CAPACITY", DEFAULT_SESSION_CACHE_CAPACITY)?,
                idle_ttl_secs: env.parsed_or("SESSION_IDLE_TTL_SECS", DEFAULT_SESSION_IDLE_TTL_SECS)?,
            },
        };
        info!("AppConfig built");

        Ok(config)
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin.telegram_user_id == Some(user_id)
    }
}
