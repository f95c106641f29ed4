use crate::core::error::WorkflowError;
use crate::core::model::CompressionRequest;
use crate::core::progress::ProgressReporter;
use async_trait::async_trait;
use bytes::Bytes;
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
pub struct DriverContext {
    pub backend_url: String,
    pub user_agent: String,
    /// `None` leaves the transport's default in place.
    pub timeout_secs: Option<u64>,
    pub headers: HashMap<String, String>,
}

impl DriverContext {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            user_agent: concat!("image-compressor/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: None,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressCliConfig {
    pub driver_ctx: DriverContext,
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_compress_command(&self, cmd: Command) -> Command;
    fn apply_compress_matches(&self, matches: &ArgMatches, cfg: &mut CompressCliConfig) -> anyhow::Result<()>;
}

/// Sends one request to the remote compression service.
#[async_trait]
pub trait CompressionDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, backend_url: &Url) -> bool;

    /// Uploads the source file and returns the raw response body of a 2xx answer.
    /// Upload progress goes to `progress` while the body is being sent.
    async fn compress(
        &self,
        req: &CompressionRequest,
        ctx: &DriverContext,
        progress: ProgressReporter,
    ) -> Result<Bytes, WorkflowError>;
}

pub struct PluginRegistry {
    drivers: Vec<Arc<dyn CompressionDriver>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn with_defaults() -> anyhow::Result<Self> {
        let mut reg = Self { drivers: vec![], cli_plugins: vec![] };

        reg.drivers.push(Arc::new(crate::plugins::http::driver::HttpDriver::new()?));

        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::HttpCliPlugin::new()));
        Ok(reg)
    }

    pub fn augment_compress_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_compress_command(c))
    }

    pub fn apply_compress_matches(&self, matches: &ArgMatches, cfg: &mut CompressCliConfig) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            p.apply_compress_matches(matches, cfg)?;
        }
        Ok(())
    }

    pub fn driver_for(&self, backend_url: &str) -> Option<Arc<dyn CompressionDriver>> {
        let url = Url::parse(backend_url).ok()?;
        self.drivers.iter().find(|d| d.supports(&url)).cloned()
    }
}
