use fdg_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
}

impl ProcessorConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("FDG_PROCESSOR_URL").unwrap_or_else(|_| {
            warn!("FDG_PROCESSOR_URL not set, using (probably useless) default");
            "https://api.processor.example.com/v1".to_string()
        });
        let api_key = Secret::new(std::env::var("FDG_PROCESSOR_API_KEY").unwrap_or_else(|_| {
            warn!("FDG_PROCESSOR_API_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        Self { base_url, api_key }
    }
}
