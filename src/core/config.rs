use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub groq_api_hostname: String,
    pub huggingface_api_hostname: String,
    pub wikipedia_api_hostname: Option<String>,
    pub sql_model: String,
    pub summary_model: String,
    pub max_iterations: usize,
    pub summary_max_words: usize,
    pub summary_max_tokens: u32,
    pub summary_max_input_tokens: usize,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(val) => val.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {}", name, val);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let groq_api_hostname = env::var("PARLEY_GROQ_API_HOST")
            .unwrap_or_else(|_| "https://api.groq.com/openai".to_string());
        let huggingface_api_hostname = env::var("PARLEY_HF_API_HOST")
            .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string());
        let wikipedia_api_hostname = env::var("PARLEY_WIKIPEDIA_API_HOST").ok();
        let sql_model =
            env::var("PARLEY_SQL_MODEL").unwrap_or_else(|_| "llama3-8b-8192".to_string());
        let summary_model =
            env::var("PARLEY_SUMMARY_MODEL").unwrap_or_else(|_| "gemma2-9b-it".to_string());

        Self {
            groq_api_hostname,
            huggingface_api_hostname,
            wikipedia_api_hostname,
            sql_model,
            summary_model,
            max_iterations: env_or("PARLEY_MAX_ITERATIONS", 15),
            summary_max_words: env_or("PARLEY_SUMMARY_MAX_WORDS", 400),
            summary_max_tokens: env_or("PARLEY_SUMMARY_MAX_TOKENS", 500),
            summary_max_input_tokens: env_or("PARLEY_SUMMARY_MAX_INPUT_TOKENS", 6000),
            cache_ttl: Duration::from_secs(env_or("PARLEY_CACHE_TTL_SECS", 60 * 60 * 2)),
            request_timeout: Duration::from_secs(env_or("PARLEY_REQUEST_TIMEOUT_SECS", 120)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        // SAFETY: only this test touches this variable
        unsafe { env::set_var("PARLEY_TEST_ENV_OR", "not-a-number") };
        assert_eq!(env_or("PARLEY_TEST_ENV_OR", 15usize), 15);
        unsafe { env::set_var("PARLEY_TEST_ENV_OR", " 20 ") };
        assert_eq!(env_or("PARLEY_TEST_ENV_OR", 15usize), 20);
        unsafe { env::remove_var("PARLEY_TEST_ENV_OR") };
        assert_eq!(env_or("PARLEY_TEST_ENV_OR", 15usize), 15);
    }
}
