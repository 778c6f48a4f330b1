//! Pipeline runtime
//!
//! `PipelineBuilder` wires the stages explicitly, `Pipeline::start` spawns
//! them and `RunningPipeline::shutdown` stops them in dependency order:
//!
//! 1. cancel the generator (no new ticks), wait for it
//! 2. drain the usage channel, wait for the transformer workers
//! 3. drain the costs channel, wait for the logger
//!
//! Every wait is bounded by the grace period. A stage that overruns it is
//! hard-stopped and, if it still does not exit, aborted.

use std::sync::Arc;
use std::time::Duration;

use tally_channel::{Channel, ChannelConfig, MemoryTransport, Queue, Transport, TransportQueue};
use tally_config::{
    BackpressureMode, ChannelBackend, Config, ConfigError, DeadLetterDestination, LoggerSinkKind,
    MetricsConfig, OutputFormat, QueueConfig,
};
use tally_protocol::{UsageCostDetail, UsageDetail};
use tally_sinks::{
    DeadLetterStore, FileDeadLetterStore, FileSink, LogSink, MemoryDeadLetterStore, RecordFormat,
    RecordSink, StdoutConfig, StdoutSink,
};
use tally_sources::{GeneratorSettings, UsageGenerator};
use tally_transform::{CostRates, CostTransformer, Transformer};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backpressure::{BackpressureLog, DEFAULT_SUMMARY_INTERVAL};
use crate::error::Result;
use crate::health::{Alert, HealthMonitor, HealthPolicy};
use crate::metrics::{PipelineMetrics, PipelineSnapshot, StageMetrics};
use crate::reporter::MetricsReporter;
use crate::retry::RetryPolicy;
use crate::stage::{
    GeneratorStage, SinkHandler, StageContext, StageKind, TransformHandler, run_consumer,
};

/// How long a hard-stopped stage gets before its task is aborted
const HARD_STOP_WAIT: Duration = Duration::from_millis(100);

/// Capacity of the alert broadcast channel
const ALERT_CAPACITY: usize = 64;

// =============================================================================
// Builder
// =============================================================================

/// Explicit construction of a pipeline
///
/// Everything has a default: an empty builder produces the stock pipeline
/// (five users every 2s, default cost rates, log sink, in-process channels,
/// in-memory dead letters).
pub struct PipelineBuilder {
    generator: GeneratorSettings,
    interval: Duration,
    backpressure: BackpressureMode,
    transformer: Option<Arc<dyn Transformer>>,
    workers: usize,
    transform_timeout: Duration,
    sink: Option<Arc<dyn RecordSink>>,
    logger_timeout: Duration,
    usage: Option<Arc<dyn Queue<UsageDetail>>>,
    costs: Option<Arc<dyn Queue<UsageCostDetail>>>,
    dead_letters: Option<Arc<dyn DeadLetterStore>>,
    retry: RetryPolicy,
    health: HealthPolicy,
    grace: Duration,
    metrics: Option<MetricsConfig>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            generator: GeneratorSettings::default(),
            interval: Duration::from_secs(2),
            backpressure: BackpressureMode::Block,
            transformer: None,
            workers: 1,
            transform_timeout: Duration::from_secs(5),
            sink: None,
            logger_timeout: Duration::from_secs(5),
            usage: None,
            costs: None,
            dead_letters: None,
            retry: RetryPolicy::default(),
            health: HealthPolicy::default(),
            grace: Duration::from_secs(10),
            metrics: None,
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with every component created from configuration
    ///
    /// Opens file sinks and file dead-letter stores, and binds the channels
    /// to the configured backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let generator = GeneratorSettings {
            users: config.generator.users.clone(),
            max_duration: config.generator.max_duration,
            max_data: config.generator.max_data,
            seed: config.generator.seed,
        };
        let rates = CostRates::new(
            config.transformer.rate_per_second,
            config.transformer.rate_per_unit,
        )?;

        let sink = open_sink(config).await?;
        let dead_letters = open_dead_letters(config.dead_letter_destination()?).await?;
        let (usage, costs) = open_channels(config).await?;

        let mut builder = Self::new()
            .generator(generator)
            .interval(config.generator.interval)
            .backpressure(config.generator.backpressure)
            .transformer(Arc::new(CostTransformer::new(rates)))
            .workers(config.transformer.workers)
            .transform_timeout(config.transformer.processing_timeout)
            .sink(sink)
            .logger_timeout(config.logger.processing_timeout)
            .usage_queue(usage)
            .costs_queue(costs)
            .dead_letters(dead_letters)
            .retry(RetryPolicy::from(&config.retry))
            .health(HealthPolicy::from(&config.health))
            .grace(config.shutdown.grace);
        if config.metrics.enabled {
            builder = builder.metrics_reporter(config.metrics.clone());
        }
        Ok(builder)
    }

    pub fn generator(mut self, settings: GeneratorSettings) -> Self {
        self.generator = settings;
        self
    }

    /// Delay between generator ticks
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn backpressure(mut self, mode: BackpressureMode) -> Self {
        self.backpressure = mode;
        self
    }

    /// Replace the default cost transformer
    pub fn transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Number of transformer workers (at least 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn transform_timeout(mut self, timeout: Duration) -> Self {
        self.transform_timeout = timeout;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn logger_timeout(mut self, timeout: Duration) -> Self {
        self.logger_timeout = timeout;
        self
    }

    /// Channel A
    pub fn usage_queue(mut self, queue: Arc<dyn Queue<UsageDetail>>) -> Self {
        self.usage = Some(queue);
        self
    }

    /// Channel B
    pub fn costs_queue(mut self, queue: Arc<dyn Queue<UsageCostDetail>>) -> Self {
        self.costs = Some(queue);
        self
    }

    pub fn dead_letters(mut self, store: Arc<dyn DeadLetterStore>) -> Self {
        self.dead_letters = Some(store);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn health(mut self, policy: HealthPolicy) -> Self {
        self.health = policy;
        self
    }

    /// Per-stage shutdown grace period
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Enable the periodic metrics report
    pub fn metrics_reporter(mut self, config: MetricsConfig) -> Self {
        self.metrics = Some(config);
        self
    }

    /// Resolve defaults and validate the generator settings
    pub fn build(self) -> Result<Pipeline> {
        let generator = Arc::new(UsageGenerator::new(self.generator)?);

        let usage = self.usage.unwrap_or_else(|| {
            Arc::new(Channel::<UsageDetail>::new("usage", ChannelConfig::default()))
        });
        let costs = self.costs.unwrap_or_else(|| {
            Arc::new(Channel::<UsageCostDetail>::new("costs", ChannelConfig::default()))
        });

        Ok(Pipeline {
            generator,
            interval: self.interval,
            backpressure: self.backpressure,
            transformer: self
                .transformer
                .unwrap_or_else(|| Arc::new(CostTransformer::default())),
            workers: self.workers,
            transform_timeout: self.transform_timeout,
            sink: self.sink.unwrap_or_else(|| Arc::new(LogSink::new())),
            logger_timeout: self.logger_timeout,
            usage,
            costs,
            dead_letters: self
                .dead_letters
                .unwrap_or_else(|| Arc::new(MemoryDeadLetterStore::new())),
            retry: self.retry,
            health: self.health,
            grace: self.grace,
            metrics: self.metrics,
        })
    }
}

fn record_format(format: OutputFormat) -> RecordFormat {
    match format {
        OutputFormat::Text => RecordFormat::Text,
        OutputFormat::Json => RecordFormat::Json,
    }
}

async fn open_sink(config: &Config) -> Result<Arc<dyn RecordSink>> {
    let format = record_format(config.logger.format);
    let sink: Arc<dyn RecordSink> = match config.logger.sink {
        LoggerSinkKind::Log => Arc::new(LogSink::new()),
        LoggerSinkKind::Stdout => Arc::new(StdoutSink::new(StdoutConfig {
            color: config.logger.color,
            format,
        })),
        LoggerSinkKind::File => {
            let path = config
                .logger
                .path
                .as_deref()
                .ok_or_else(|| ConfigError::missing_field("logger", "path"))?;
            Arc::new(FileSink::open(path, format).await?)
        }
    };
    Ok(sink)
}

async fn open_dead_letters(destination: DeadLetterDestination) -> Result<Arc<dyn DeadLetterStore>> {
    let store: Arc<dyn DeadLetterStore> = match destination {
        DeadLetterDestination::Memory => Arc::new(MemoryDeadLetterStore::new()),
        DeadLetterDestination::File(path) => Arc::new(FileDeadLetterStore::open(path).await?),
    };
    Ok(store)
}

fn channel_config(queue: &QueueConfig) -> ChannelConfig {
    ChannelConfig::with_capacity(queue.capacity)
        .with_enqueue_timeout(queue.enqueue_timeout)
        .with_dequeue_timeout(queue.dequeue_timeout)
        .with_visibility_timeout(queue.visibility_timeout)
}

async fn open_channels(
    config: &Config,
) -> Result<(Arc<dyn Queue<UsageDetail>>, Arc<dyn Queue<UsageCostDetail>>)> {
    let channels = &config.channels;
    let usage_topic = channels.usage_topic();
    let costs_topic = channels.costs_topic();

    match channels.backend {
        ChannelBackend::Local => {
            let usage: Arc<dyn Queue<UsageDetail>> =
                Arc::new(Channel::new(usage_topic, channel_config(&channels.usage)));
            let costs: Arc<dyn Queue<UsageCostDetail>> =
                Arc::new(Channel::new(costs_topic, channel_config(&channels.costs)));
            Ok((usage, costs))
        }
        ChannelBackend::Broker => {
            let broker = MemoryTransport::default();
            broker.declare_topic(usage_topic, channel_config(&channels.usage));
            broker.declare_topic(costs_topic, channel_config(&channels.costs));
            let transport: Arc<dyn Transport> = Arc::new(broker);

            let usage =
                TransportQueue::<UsageDetail>::connect(Arc::clone(&transport), usage_topic).await?;
            let costs = TransportQueue::<UsageCostDetail>::connect(transport, costs_topic).await?;
            tracing::info!(usage_topic, costs_topic, "channels bound to broker topics");
            Ok((Arc::new(usage), Arc::new(costs)))
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// A fully wired pipeline, not yet running
pub struct Pipeline {
    generator: Arc<UsageGenerator>,
    interval: Duration,
    backpressure: BackpressureMode,
    transformer: Arc<dyn Transformer>,
    workers: usize,
    transform_timeout: Duration,
    sink: Arc<dyn RecordSink>,
    logger_timeout: Duration,
    usage: Arc<dyn Queue<UsageDetail>>,
    costs: Arc<dyn Queue<UsageCostDetail>>,
    dead_letters: Arc<dyn DeadLetterStore>,
    retry: RetryPolicy,
    health: HealthPolicy,
    grace: Duration,
    metrics: Option<MetricsConfig>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Usage generator, for reseeding
    pub fn generator(&self) -> &Arc<UsageGenerator> {
        &self.generator
    }

    fn stage_context(&self, kind: StageKind, alerts: &broadcast::Sender<Alert>) -> StageContext {
        StageContext {
            kind,
            metrics: Arc::new(StageMetrics::new()),
            health: Arc::new(HealthMonitor::new(
                kind.as_str(),
                self.health.clone(),
                alerts.clone(),
            )),
            retry: self.retry.clone(),
            dead_letters: Arc::clone(&self.dead_letters),
            hard_stop: CancellationToken::new(),
        }
    }

    /// Spawn every stage on the current tokio runtime
    pub fn start(self) -> RunningPipeline {
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);
        let shutdown = CancellationToken::new();

        // Generator
        let generator_ctx = self.stage_context(StageKind::Generator, &alerts);
        let generator_stage = GeneratorStage {
            ctx: generator_ctx.clone(),
            generator: Arc::clone(&self.generator),
            output: Arc::clone(&self.usage),
            interval: self.interval,
            mode: self.backpressure,
            backpressure: BackpressureLog::new(
                "generator",
                self.usage.name(),
                DEFAULT_SUMMARY_INTERVAL,
            ),
            shutdown: shutdown.clone(),
        };
        let generator_task = tokio::spawn(generator_stage.run());

        // Transformer workers
        let transformer_ctx = self.stage_context(StageKind::Transformer, &alerts);
        let handler = Arc::new(TransformHandler {
            transformer: Arc::clone(&self.transformer),
            output: Arc::clone(&self.costs),
            timeout: self.transform_timeout,
            metrics: Arc::clone(&transformer_ctx.metrics),
            backpressure: BackpressureLog::new(
                "transformer",
                self.costs.name(),
                DEFAULT_SUMMARY_INTERVAL,
            ),
        });
        let transformer_tasks = (0..self.workers)
            .map(|worker| {
                tokio::spawn(run_consumer(
                    transformer_ctx.clone(),
                    worker,
                    Arc::clone(&self.usage),
                    Arc::clone(&handler),
                ))
            })
            .collect();

        // Logger
        let logger_ctx = self.stage_context(StageKind::Logger, &alerts);
        let sink_handler = Arc::new(SinkHandler {
            sink: Arc::clone(&self.sink),
            timeout: self.logger_timeout,
        });
        let logger_task = tokio::spawn(run_consumer(
            logger_ctx.clone(),
            0,
            Arc::clone(&self.costs),
            sink_handler,
        ));

        let metrics = PipelineMetrics {
            generator: Arc::clone(&generator_ctx.metrics),
            transformer: Arc::clone(&transformer_ctx.metrics),
            logger: Arc::clone(&logger_ctx.metrics),
            usage: Arc::clone(&self.usage),
            costs: Arc::clone(&self.costs),
            sink: Arc::clone(&self.sink),
        };

        let reporter = self.metrics.map(|config| {
            let cancel = CancellationToken::new();
            let reporter = MetricsReporter::new(config, metrics.clone());
            let task = tokio::spawn(reporter.run(cancel.clone()));
            (task, cancel)
        });

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            workers = self.workers,
            transformer = self.transformer.name(),
            sink = self.sink.name(),
            dead_letters = self.dead_letters.name(),
            usage_channel = self.usage.name(),
            costs_channel = self.costs.name(),
            "pipeline started"
        );

        RunningPipeline {
            shutdown,
            generator: self.generator,
            generator_task,
            generator_stop: generator_ctx.hard_stop,
            transformer_tasks,
            transformer_stop: transformer_ctx.hard_stop,
            logger_task,
            logger_stop: logger_ctx.hard_stop,
            reporter,
            metrics,
            sink: self.sink,
            dead_letters: self.dead_letters,
            alerts,
            grace: self.grace,
            started: Instant::now(),
        }
    }
}

// =============================================================================
// Running pipeline
// =============================================================================

/// Handle to the spawned stages
pub struct RunningPipeline {
    shutdown: CancellationToken,
    generator: Arc<UsageGenerator>,
    generator_task: JoinHandle<()>,
    generator_stop: CancellationToken,
    transformer_tasks: Vec<JoinHandle<()>>,
    transformer_stop: CancellationToken,
    logger_task: JoinHandle<()>,
    logger_stop: CancellationToken,
    reporter: Option<(JoinHandle<()>, CancellationToken)>,
    metrics: PipelineMetrics,
    sink: Arc<dyn RecordSink>,
    dead_letters: Arc<dyn DeadLetterStore>,
    alerts: broadcast::Sender<Alert>,
    grace: Duration,
    started: Instant,
}

/// Outcome of a shutdown
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    /// Final metrics
    pub metrics: PipelineSnapshot,
    /// Stages that overran the grace period and were hard-stopped
    pub forced: Vec<StageKind>,
    /// Messages still in a channel when it was closed
    pub discarded: usize,
    /// Time between start and stop
    pub uptime: Duration,
}

impl ShutdownReport {
    /// Whether every stage drained in time and nothing was left behind
    pub fn is_clean(&self) -> bool {
        self.forced.is_empty() && self.discarded == 0
    }
}

impl RunningPipeline {
    /// Current metrics
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.metrics.snapshot()
    }

    /// Cloneable metrics handle
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Receive stage paused/resumed alerts
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterStore> {
        &self.dead_letters
    }

    /// Usage generator, for reseeding while running
    pub fn generator(&self) -> &Arc<UsageGenerator> {
        &self.generator
    }

    /// Drain and stop every stage
    pub async fn shutdown(self) -> ShutdownReport {
        tracing::info!("pipeline shutting down");
        let mut forced = Vec::new();
        let mut discarded = 0;

        self.shutdown.cancel();
        let generator_forced = join_stage(
            StageKind::Generator,
            vec![self.generator_task],
            self.grace,
            &self.generator_stop,
        )
        .await;
        if generator_forced {
            forced.push(StageKind::Generator);
        }

        self.metrics.usage.drain();
        let transformer_forced = join_stage(
            StageKind::Transformer,
            self.transformer_tasks,
            self.grace,
            &self.transformer_stop,
        )
        .await;
        if transformer_forced {
            forced.push(StageKind::Transformer);
        }
        discarded += self.metrics.usage.close();

        self.metrics.costs.drain();
        let logger_forced = join_stage(
            StageKind::Logger,
            vec![self.logger_task],
            self.grace,
            &self.logger_stop,
        )
        .await;
        if logger_forced {
            forced.push(StageKind::Logger);
        }
        discarded += self.metrics.costs.close();

        if let Err(e) = self.sink.flush().await {
            tracing::warn!(sink = self.sink.name(), error = %e, "sink flush failed");
        }

        if let Some((task, cancel)) = self.reporter {
            cancel.cancel();
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "metrics reporter panicked");
            }
        }

        let report = ShutdownReport {
            metrics: self.metrics.snapshot(),
            forced,
            discarded,
            uptime: self.started.elapsed(),
        };

        tracing::info!(
            generated = report.metrics.generator.processed,
            transformed = report.metrics.transformer.processed,
            logged = report.metrics.logger.processed,
            dead_lettered = report.metrics.dead_lettered(),
            discarded = report.discarded,
            forced = report.forced.len(),
            uptime_secs = report.uptime.as_secs(),
            "pipeline stopped"
        );
        report
    }
}

/// Wait for a stage's tasks within `grace`, returning true if it was forced
async fn join_stage(
    kind: StageKind,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
    hard_stop: &CancellationToken,
) -> bool {
    let deadline = Instant::now() + grace;
    let mut forced = false;

    for mut task in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(stage = %kind, error = %e, "stage task panicked"),
            Err(_) => {
                if !forced {
                    tracing::warn!(
                        stage = %kind,
                        grace_ms = grace.as_millis() as u64,
                        "stage did not stop within grace period, forcing"
                    );
                    hard_stop.cancel();
                    forced = true;
                }
                if tokio::time::timeout(HARD_STOP_WAIT, &mut task).await.is_err() {
                    task.abort();
                }
            }
        }
    }

    if !forced {
        tracing::info!(stage = %kind, "stage stopped");
    }
    forced
}
