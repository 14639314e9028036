//! Orchestrates one run: cached token or device flow, token exchange,
//! chat request, interaction log.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::api::{self, ApiClient};
use crate::auth::{ConsolePrompt, DeviceFlow, DevicePrompt, PlatformToken, ServiceToken, TokenStore};
use crate::config::Config;
use crate::history::InteractionLog;

pub struct App {
    config: Config,
    api: ApiClient,
    store: TokenStore,
    log: InteractionLog,
    prompt: Arc<dyn DevicePrompt>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(&config.identity).context("Failed to build HTTP client")?;
        let store = TokenStore::new(config.token_path());
        let log = InteractionLog::new(config.log_dir());

        Ok(Self {
            config,
            api,
            store,
            log,
            prompt: Arc::new(ConsolePrompt),
        })
    }

    /// Replace how the device flow talks to the human
    pub fn with_prompt(mut self, prompt: impl DevicePrompt + 'static) -> Self {
        self.prompt = Arc::new(prompt);
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn device_flow(&self) -> DeviceFlow {
        DeviceFlow::new(self.api.clone(), &self.config, Arc::clone(&self.prompt))
    }

    /// The cached platform token, authenticating first on a miss
    pub async fn platform_token(&self) -> Result<PlatformToken> {
        self.store.get(&self.device_flow()).await
    }

    pub async fn service_token(&self, platform: &PlatformToken) -> Result<ServiceToken> {
        api::exchange_token(&self.api, &self.config.endpoints.service_token_url, platform)
            .await
            .context("Failed to obtain service token")
    }

    /// Answer `prompt`, recording the exchange in the interaction log.
    ///
    /// A logging failure is reported and swallowed; everything else aborts.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        info!(prompt_len = prompt.len(), "Asking");

        let platform = self.platform_token().await?;
        let service = self.service_token(&platform).await?;
        let answer = api::ask(&self.api, &self.config, prompt, &service)
            .await
            .context("Chat request failed")?;

        if let Err(e) = self.log.record(prompt, &answer) {
            error!(error = %format!("{:#}", e), "Failed to write log");
        }

        Ok(answer)
    }
}
