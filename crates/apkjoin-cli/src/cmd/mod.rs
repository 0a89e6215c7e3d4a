//! Subcommand implementations.

pub mod completions;
pub mod inspect;
pub mod merge;

use std::sync::Arc;

use apkjoin_core::{Config, Pipeline, Reporter, ToolchainLocation, config_path};

use crate::Cli;
use crate::ui::ConsoleReporter;

/// Effective settings: config file first, then environment and flags on top.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Merged configuration.
    pub config: Config,
    /// Why the config file was ignored, if it was.
    pub config_warning: Option<String>,
    /// Suppress progress output.
    pub quiet: bool,
}

impl Settings {
    /// Layer the global flags over the configuration file.
    pub fn from_cli(cli: &Cli) -> Self {
        let path = cli.config.clone().or_else(config_path);
        let (mut config, config_warning) = Config::load_or_default(path.as_deref());
        if let Some(path) = &path {
            tracing::debug!("Config file: {}", path.display());
        }

        if let Some(dir) = &cli.build_tools {
            config.toolchain.build_tools = Some(dir.clone());
        }
        if let Some(jobs) = cli.jobs {
            config.merge.jobs = Some(jobs);
        }
        if let Some(dir) = &cli.work_dir {
            config.merge.work_dir = Some(dir.clone());
        }

        Self {
            config,
            config_warning,
            quiet: cli.quiet,
        }
    }

    /// Console reporter honouring `--quiet`.
    pub fn reporter(&self) -> Arc<ConsoleReporter> {
        let reporter = Arc::new(ConsoleReporter::new(self.quiet));
        if let Some(warning) = &self.config_warning {
            reporter.warning(warning);
        }
        reporter
    }

    /// Pipeline backed by the resolved Android build-tools.
    pub fn pipeline(&self, reporter: Arc<ConsoleReporter>) -> Pipeline {
        let toolchain = ToolchainLocation::resolve(
            self.config.toolchain.build_tools.as_deref(),
            self.config.tool_timeout(),
        );
        tracing::debug!("Toolchain: {toolchain:?}");
        if toolchain.aapt().is_none() {
            reporter.warning("aapt not found; member identity will be guessed from file names");
        }
        Pipeline::with_toolchain(Arc::new(toolchain), reporter)
    }
}
