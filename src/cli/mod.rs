//! Command-line interface for tickwise.
//!
//! Offline tooling around the rollup engine: validate a rules file,
//! ask which step a metric gets, render a pickle reply from a JSON dump of
//! points, or keep rules hot-reloaded while watching their file.

use crate::core::{Config, PointSet, Result, TickwiseError, Timestamp};
use crate::render::{AliasMap, ReplyEncoder, RollupMode};
use crate::rollup::{AggregationRegistry, RuleSet, RulesStore};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Retention-aware rollup for Graphite render queries
#[derive(Parser, Debug)]
#[command(name = "tickwise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/tickwise/config.yaml)
    #[arg(short, long, env = "TICKWISE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Rollup rules file, overrides `rollup.rules` from the configuration
    #[arg(long, env = "TICKWISE_RULES", global = true)]
    pub rules: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "TICKWISE_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Tickwise subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration and rules, then print the rules
    Check,

    /// Print the step a metric is served at
    Step {
        /// Metric name
        #[arg(long)]
        metric: String,
        /// Query start (unix seconds)
        #[arg(long)]
        from: Timestamp,
        /// Reference time instead of the wall clock
        #[arg(long)]
        now: Option<Timestamp>,
    },

    /// Render a pickle reply from a JSON array of {"metric", "time", "value"}
    Render {
        /// JSON input file
        #[arg(short, long)]
        input: PathBuf,
        /// Query start (unix seconds)
        #[arg(long)]
        from: Timestamp,
        /// Query end (unix seconds)
        #[arg(long)]
        until: Timestamp,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Input is already downsampled; only resolve steps
        #[arg(long)]
        step_only: bool,
        /// Reference time instead of the wall clock
        #[arg(long)]
        now: Option<Timestamp>,
    },

    /// Load rules and reload them whenever the file changes
    Watch,
}

/// One sample of a `render` input file
#[derive(Debug, Deserialize)]
pub struct InputPoint {
    pub metric: String,
    pub time: Timestamp,
    pub value: f64,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<(Config, Option<PathBuf>)> {
        use crate::core::config::ConfigBuilder;

        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            Some(path.clone())
        } else {
            dirs::config_dir()
                .map(|d| d.join("tickwise").join("config.yaml"))
                .filter(|p| p.exists())
        };

        let mut loaded_from = None;
        if let Some(path) = config_path {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    builder = builder.from_yaml(&content)?;
                    loaded_from = Some(path);
                }
                Err(e) => {
                    return Err(TickwiseError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                }
            }
        }

        if let Some(rules) = &self.rules {
            builder = builder.rules_path(rules.clone());
        }

        Ok((builder.debug(self.debug).build()?, loaded_from))
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("TICKWISE_LOG_LEVEL")
            .unwrap_or_else(|_| config.logging.level.as_str().to_string());
        let log_level = if self.debug { "debug" } else { env_log_level.as_str() };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Logs go to stderr so `render` can stream the reply on stdout
        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_line_number(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TickwiseError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the tickwise application.
pub async fn execute(cli: Cli) -> Result<()> {
    let (config, loaded_from) = cli.load_config().await?;
    cli.init_logging(&config)?;

    if let Some(path) = loaded_from {
        tracing::info!("Loaded configuration from: {:?}", path);
    }

    let registry = Arc::new(AggregationRegistry::standard());

    match &cli.command {
        Command::Check => check(&config, &registry),
        Command::Step { metric, from, now } => {
            let rules = RuleSet::from_file(&config.rollup.rules, &registry)?;
            let step = match now {
                Some(now) => rules.resolve_step_at(metric, *from, *now)?,
                None => rules.resolve_step(metric, *from)?,
            };
            println!("{}", step);
            Ok(())
        }
        Command::Render {
            input,
            from,
            until,
            output,
            step_only,
            now,
        } => {
            let rules = RuleSet::from_file(&config.rollup.rules, &registry)?;
            let points = read_points(input).await?;
            let aliases = AliasMap::identity_for(&points);

            let mut encoder = ReplyEncoder::new(&rules, &aliases, *from, *until)
                .buffer_size(config.render.buffer_size)
                .mode(if *step_only {
                    RollupMode::StepOnly
                } else {
                    RollupMode::Downsample
                });
            if let Some(now) = now {
                encoder = encoder.now(*now);
            }

            let stats = match output {
                Some(path) => encoder.write_pickle(&points, std::fs::File::create(path)?)?,
                None => encoder.write_pickle(&points, std::io::stdout().lock())?,
            };
            tracing::info!(
                metrics = stats.metrics,
                records = stats.records,
                skipped = stats.skipped,
                "Rendered reply"
            );
            Ok(())
        }
        Command::Watch => watch(&config, registry).await,
    }
}

fn check(config: &Config, registry: &AggregationRegistry) -> Result<()> {
    let rules = RuleSet::from_file(&config.rollup.rules, registry)?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Configuration is valid!")?;
    writeln!(out, "  Rules file: {:?}", config.rollup.rules)?;
    writeln!(out, "  Reply buffer: {} bytes", config.render.buffer_size)?;

    let default = std::iter::once(rules.default_pattern());
    for pattern in rules.patterns().iter().chain(default) {
        let retention: Vec<String> = pattern
            .retention()
            .iter()
            .map(|t| format!("{}s:{}s", t.age, t.precision))
            .collect();
        writeln!(
            out,
            "  {:<32} {:<8} {}",
            pattern.regexp().unwrap_or("<default>"),
            pattern.function().name(),
            retention.join(", ")
        )?;
    }
    Ok(())
}

async fn watch(config: &Config, registry: Arc<AggregationRegistry>) -> Result<()> {
    let store = Arc::new(RulesStore::load(config.rollup.rules.clone(), registry)?);
    tracing::info!(path = ?store.path(), "Watching rollup rules, press Ctrl-C to stop");

    tokio::select! {
        result = Arc::clone(&store).watch(config.rollup.reload_debounce) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping...");
            Ok(())
        }
    }
}

/// Reads a JSON array of [`InputPoint`] and groups it by metric
pub async fn read_points(path: &PathBuf) -> Result<PointSet> {
    let body = tokio::fs::read(path).await?;
    let input: Vec<InputPoint> = serde_json::from_slice(&body)?;

    let mut points = PointSet::new();
    for p in &input {
        points.push(&p.metric, p.time, p.value)?;
    }
    points.sort_by_metric_time();
    Ok(points)
}
