//! Per-connection pipeline built from a producer's options.
//!
//! The transport drives a [`ProducerPipeline`] with connection events and raw
//! lines; each is turned into an entity at the entry and run to completion
//! before the call returns.

use crate::config::{PipelineOptions, ProducerConfig};
use crate::entity::{ConnectionState, ConnectionStatus, Entity, ProtocolCommand};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::executor::{Pipeline, PipelineStats, RunOutcome};
use crate::pipeline::stages::{
    ConvertSample, DeliverAsset, DeliverCommand, DeliverConnectionStatus, DeliverObservation,
    DuplicateFilter, DuplicateState, ExtractTimestamp, IgnoreTimestamp, RateFilter, RateState,
    RelativeTimeBase, Start, TokenMapper, Tokenizer, UpcaseValue,
};
use std::sync::Arc;

pub struct ProducerPipeline {
    name: String,
    device: String,
    options: PipelineOptions,
    context: Arc<PipelineContext>,
    pipeline: Pipeline,
    relative_base: Option<Arc<RelativeTimeBase>>,
    duplicate_state: Option<Arc<DuplicateState>>,
    rate_state: Option<Arc<RateState>>,
}

impl ProducerPipeline {
    /// Create an unbuilt pipeline; call [`build`](Self::build) before feeding it.
    pub fn new(config: &ProducerConfig, context: Arc<PipelineContext>) -> Self {
        Self {
            name: config.name.clone(),
            device: config.device.clone(),
            options: config.options.clone(),
            context,
            pipeline: Pipeline::new(config.name.clone()),
            relative_base: None,
            duplicate_state: None,
            rate_state: None,
        }
    }

    /// Wire and compile the stage graph for the configured options.
    ///
    /// Calling it again on a built pipeline does nothing. A failed build
    /// leaves the pipeline unbuilt.
    pub fn build(&mut self) -> PipelineResult<()> {
        if self.is_built() {
            return Ok(());
        }
        self.options.validate()?;

        let ctx = &self.context;
        let sink = ctx.sink();
        let clock = ctx.clock();
        let mut pipeline = Pipeline::new(self.name.clone());
        let mut relative_base = None;
        let mut duplicate_state = None;

        let start = pipeline.add_stage(Start);
        pipeline.bind(start, DeliverConnectionStatus::new(sink.clone()));
        pipeline.bind(start, DeliverCommand::new(sink.clone()));
        let tokenizer = pipeline.bind(start, Tokenizer);

        let timestamp = if self.options.ignore_timestamps {
            pipeline.bind(tokenizer, IgnoreTimestamp::new(clock.clone()))
        } else if self.options.relative_time {
            let base = Arc::new(RelativeTimeBase::new());
            relative_base = Some(base.clone());
            pipeline.bind(tokenizer, ExtractTimestamp::relative(clock.clone(), base))
        } else {
            pipeline.bind(tokenizer, ExtractTimestamp::new(clock.clone()))
        };

        let mapper = pipeline.bind(
            timestamp,
            TokenMapper::new(self.device.clone(), ctx.lookup().clone()),
        );
        pipeline.bind(mapper, DeliverAsset::new(sink.clone()));

        let mut tail = mapper;
        if self.options.upcase_data_item_value {
            tail = pipeline.bind(tail, UpcaseValue);
        }
        if self.options.filter_duplicates {
            let state_name = self.options.filter_state_name("DuplicateFilter", &self.name);
            let state = ctx.shared_state::<DuplicateState>(&state_name)?;
            duplicate_state = Some(state.clone());
            tail = pipeline.bind(tail, DuplicateFilter::new(state));
        }
        let state_name = self.options.filter_state_name("RateFilter", &self.name);
        let rate_state = ctx.shared_state::<RateState>(&state_name)?;
        tail = pipeline.bind(
            tail,
            RateFilter::new(
                rate_state.clone(),
                ctx.lookup().each_data_item(),
                self.options.default_minimum_period(),
            ),
        );
        if self.options.conversion_required {
            tail = pipeline.bind(tail, ConvertSample);
        }
        pipeline.bind(tail, DeliverObservation::new(sink.clone()));

        pipeline.compile()?;

        tracing::debug!(
            "Producer '{}' built for device '{}': {}",
            self.name,
            self.device,
            pipeline.stage_names().collect::<Vec<_>>().join(" → ")
        );
        self.pipeline = pipeline;
        self.relative_base = relative_base;
        self.duplicate_state = duplicate_state;
        self.rate_state = Some(rate_state);
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.pipeline.is_compiled()
    }

    // ── Transport events ──

    pub fn connecting(&mut self) -> PipelineResult<RunOutcome> {
        self.connection(ConnectionState::Connecting)
    }

    /// Marks the start of a connection; relative timestamps count from here.
    pub fn connected(&mut self) -> PipelineResult<RunOutcome> {
        if let Some(base) = &self.relative_base {
            base.reset(self.context.clock().now());
        }
        self.connection(ConnectionState::Connected)
    }

    /// The device's data items become UNAVAILABLE; filter state follows so
    /// the first value after a reconnect is forwarded.
    pub fn disconnected(&mut self) -> PipelineResult<RunOutcome> {
        let outcome = self.connection(ConnectionState::Disconnected)?;
        for item in self.context.lookup().device_data_items(&self.device) {
            if let Some(state) = &self.duplicate_state {
                state.mark_unavailable(&item.id);
            }
            if let Some(state) = &self.rate_state {
                state.forget(&item.id);
            }
        }
        Ok(outcome)
    }

    /// Run one raw data line.
    pub fn process_data(&mut self, line: &str) -> PipelineResult<RunOutcome> {
        self.pipeline.run(Entity::Data(line.to_string()))
    }

    /// Run one `* name: value` command line. Blank commands are ignored.
    pub fn protocol_command(&mut self, line: &str) -> PipelineResult<RunOutcome> {
        match ProtocolCommand::parse(&self.name, line) {
            Some(command) => self.pipeline.run(Entity::ProtocolCommand(command)),
            None => Ok(RunOutcome::default()),
        }
    }

    /// Route a line to [`protocol_command`](Self::protocol_command) when it
    /// starts with `*`, otherwise to [`process_data`](Self::process_data).
    pub fn dispatch_line(&mut self, line: &str) -> PipelineResult<RunOutcome> {
        if line.trim_start().starts_with('*') {
            self.protocol_command(line)
        } else {
            self.process_data(line)
        }
    }

    fn connection(&mut self, state: ConnectionState) -> PipelineResult<RunOutcome> {
        tracing::info!("Producer '{}' {}", self.name, state);
        let status = ConnectionStatus {
            source: self.name.clone(),
            device: self.device.clone(),
            state,
        };
        self.pipeline.run(Entity::ConnectionStatus(status))
    }

    // ── Accessors ──

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.pipeline.stage_names().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::{Category, DataItem, DeviceModel};
    use crate::entity::{Asset, Observation};
    use crate::pipeline::context::EntitySink;
    use crate::pipeline::error::PipelineError;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        observations: Mutex<Vec<Observation>>,
        assets: Mutex<Vec<Asset>>,
    }

    impl EntitySink for Recorder {
        fn deliver_observation(&self, observation: Observation) {
            self.observations.lock().unwrap().push(observation);
        }

        fn deliver_asset(&self, asset: Asset) {
            self.assets.lock().unwrap().push(asset);
        }
    }

    fn context(recorder: Arc<Recorder>) -> Arc<PipelineContext> {
        let mut model = DeviceModel::new();
        model
            .add_device(
                "LinuxCNC",
                "000",
                vec![DataItem::new("x1", Category::Sample).with_name("Xpos")],
            )
            .unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2021, 1, 22, 12, 0, 0).unwrap());
        Arc::new(PipelineContext::new(
            Arc::new(model),
            recorder,
            Arc::new(clock),
        ))
    }

    fn producer(options: PipelineOptions, recorder: Arc<Recorder>) -> ProducerPipeline {
        let config = ProducerConfig::new("adapter", "LinuxCNC").with_options(options);
        ProducerPipeline::new(&config, context(recorder))
    }

    #[test]
    fn test_default_stages() {
        let mut producer = producer(PipelineOptions::default(), Arc::default());
        producer.build().unwrap();
        assert_eq!(
            producer.stage_names(),
            vec![
                "Start",
                "DeliverConnectionStatus",
                "DeliverCommand",
                "Tokenizer",
                "ExtractTimestamp",
                "TokenMapper",
                "DeliverAsset",
                "RateFilter",
                "DeliverObservation",
            ]
        );
    }

    #[test]
    fn test_options_add_stages() {
        let options = PipelineOptions::new()
            .ignore_timestamps(true)
            .upcase_data_item_value(true)
            .filter_duplicates(true)
            .conversion_required(true);
        let mut producer = producer(options, Arc::default());
        producer.build().unwrap();

        let names = producer.stage_names();
        for stage in ["IgnoreTimestamp", "UpcaseValue", "DuplicateFilter", "ConvertSample"] {
            assert!(names.contains(&stage), "missing {}", stage);
        }
        assert!(!names.contains(&"ExtractTimestamp"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut producer = producer(PipelineOptions::default(), Arc::default());
        producer.build().unwrap();
        let count = producer.stage_names().len();
        producer.build().unwrap();
        assert_eq!(producer.stage_names().len(), count);
    }

    #[test]
    fn test_contradictory_options_fail_build() {
        let options = PipelineOptions::new()
            .ignore_timestamps(true)
            .relative_time(true);
        let mut producer = producer(options, Arc::default());
        assert!(matches!(
            producer.build(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
        assert!(!producer.is_built());
    }

    #[test]
    fn test_run_before_build() {
        let mut producer = producer(PipelineOptions::default(), Arc::default());
        assert!(matches!(
            producer.process_data("2021-01-22T12:33:45.123Z|Xpos|1"),
            Err(PipelineError::NotBuilt)
        ));
    }

    #[test]
    fn test_line_reaches_sink() {
        let recorder = Arc::new(Recorder::default());
        let mut producer = producer(PipelineOptions::default(), recorder.clone());
        producer.build().unwrap();

        let outcome = producer
            .dispatch_line("2021-01-22T12:33:45.123Z|Xpos|100.0")
            .unwrap();
        assert!(outcome.errors.is_empty());

        let observations = recorder.observations.lock().unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].data_item_id(), "x1");
        assert_eq!(producer.stats().entities_run, 1);
    }

    #[test]
    fn test_command_line_bypasses_mapper() {
        let recorder = Arc::new(Recorder::default());
        let mut producer = producer(PipelineOptions::default(), recorder.clone());
        producer.build().unwrap();

        let outcome = producer.dispatch_line("* shdrVersion: 2.0").unwrap();
        assert!(outcome.errors.is_empty());
        assert!(recorder.observations.lock().unwrap().is_empty());
    }
}
