use super::Dispatcher;
use crate::auth::CredentialGateway;
use crate::config::RelayConfig;
use crate::instructions::{InstructionsProvider, RemoteInstructions};
use crate::models::{DefaultModelCatalog, ModelCatalog};
use crate::observer::{DispatchObserver, TracingObserver};
use crate::request::RequestShaper;
use crate::transport::{HttpTransport, Transport};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Builder for [`Dispatcher`].
///
/// Only the credential gateway is required. Defaults: environment-free
/// [`RelayConfig::default`], reqwest transport, default model catalog, remote base
/// instructions, and a `tracing` observer.
pub struct DispatcherBuilder {
    config: Option<RelayConfig>,
    credentials: Option<Arc<dyn CredentialGateway>>,
    transport: Option<Arc<dyn Transport>>,
    models: Option<Arc<dyn ModelCatalog>>,
    instructions: Option<Arc<dyn InstructionsProvider>>,
    observer: Option<Arc<dyn DispatchObserver>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            credentials: None,
            transport: None,
            models: None,
            instructions: None,
            observer: None,
        }
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn credentials(mut self, gateway: Arc<dyn CredentialGateway>) -> Self {
        self.credentials = Some(gateway);
        self
    }

    /// Replace the HTTP transport (tests, custom clients).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn model_catalog(mut self, models: Arc<dyn ModelCatalog>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn instructions(mut self, instructions: Arc<dyn InstructionsProvider>) -> Self {
        self.instructions = Some(instructions);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let config = Arc::new(self.config.unwrap_or_default());
        config.validate()?;

        let credentials = self.credentials.ok_or_else(|| {
            Error::configuration_with_context(
                "a credential gateway is required",
                ErrorContext::new()
                    .with_field_path("credentials")
                    .with_source("dispatcher_builder"),
            )
        })?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let models = self
            .models
            .unwrap_or_else(|| Arc::new(DefaultModelCatalog));
        let instructions = self
            .instructions
            .unwrap_or_else(|| Arc::new(RemoteInstructions::default()));
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(TracingObserver));

        Ok(Dispatcher {
            shaper: RequestShaper::new(config.clone(), models, instructions),
            config,
            credentials,
            transport,
            observer,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
