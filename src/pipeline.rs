// In: src/pipeline.rs

//! Configuration-driven runners that wire the stages together:
//!
//!   RecordStream (decode) -> ParticleFilter -> EventSegmenter -> flow
//!
//! Every runner pulls lines lazily; stopping iteration early drops the open
//! input immediately. Each runner has a `*_from_reader` twin that takes an
//! already-open `BufRead` (e.g. a decompressed stream) instead of the
//! configured paths.

use std::io::BufRead;
use std::sync::Arc;

use crate::config::EbeConfig;
use crate::decoder::{RecordDecoder, RecordFormat};
use crate::error::EbeError;
use crate::filter::{ChargedLookup, ParticleFilter};
use crate::flow::{
    self, AggregateFlows, AggregationMode, DifferentialFlows, FlowAccumulator, FlowAggregator,
    FlowVectors,
};
use crate::input::RecordStream;
use crate::segmenter::EventSegmenter;
use crate::types::{Event, Record};

/// A validated, ready-to-run analysis.
#[derive(Debug, Clone)]
pub struct FlowPipeline {
    config: EbeConfig,
    format: RecordFormat,
    filter: ParticleFilter,
    accumulator: FlowAccumulator,
}

impl FlowPipeline {
    /// Validates the config and resolves the input format. `charged_lookup`
    /// is required only when `config.charged` is set.
    pub fn from_config(
        config: &EbeConfig,
        charged_lookup: Option<Arc<dyn ChargedLookup>>,
    ) -> Result<Self, EbeError> {
        config.validate()?;
        let filter = ParticleFilter::from_config(config, charged_lookup)?;
        let accumulator = FlowAccumulator::new(config.vn_min, config.vn_max)?
            .with_min_multiplicity(config.min_multiplicity);
        let format = config.record_format();

        log::info!(
            "flow pipeline: format={}, harmonics={}..={}, inputs={}",
            format.name(),
            config.vn_min,
            config.vn_max,
            if config.reads_stdin() {
                "<stdin>".to_string()
            } else {
                config.files.len().to_string()
            }
        );

        Ok(Self {
            config: config.clone(),
            format,
            filter,
            accumulator,
        })
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    pub fn accumulator(&self) -> FlowAccumulator {
        self.accumulator
    }

    //==============================================================================
    // 1. Events
    //==============================================================================

    fn segment<D: RecordDecoder + 'static>(
        &self,
        records: RecordStream<D>,
    ) -> impl Iterator<Item = Result<Event, EbeError>> + 'static {
        let filter = self.filter.clone();
        let records = records.filter(move |r| match r {
            Ok(record) => filter.accepts(record),
            Err(_) => true,
        });
        EventSegmenter::new(records)
    }

    /// Lazily decoded, filtered events from the configured inputs.
    pub fn events(&self) -> impl Iterator<Item = Result<Event, EbeError>> + 'static {
        self.segment(RecordStream::from_paths(&self.config.files, self.format.decoder()))
    }

    /// Lazily decoded, filtered events from one reader.
    pub fn events_from_reader<R: BufRead + 'static>(
        &self,
        name: &str,
        reader: R,
    ) -> impl Iterator<Item = Result<Event, EbeError>> + 'static {
        self.segment(RecordStream::from_reader(name, reader, self.format.decoder()))
    }

    /// Decoded, filtered records (no segmentation), e.g. for re-emitting a
    /// fixed-width stream in the standard format.
    pub fn records(&self) -> impl Iterator<Item = Result<Record, EbeError>> + 'static {
        let filter = self.filter.clone();
        RecordStream::from_paths(&self.config.files, self.format.decoder()).filter(move |r| {
            match r {
                Ok(record) => filter.accepts(record),
                Err(_) => true,
            }
        })
    }

    //==============================================================================
    // 2. Flow runners
    //==============================================================================

    /// One `FlowVectors` per event, computed lazily.
    pub fn event_by_event(&self) -> impl Iterator<Item = Result<FlowVectors, EbeError>> + 'static {
        flow::event_by_event(self.events(), self.accumulator)
    }

    pub fn event_by_event_from_reader<R: BufRead + 'static>(
        &self,
        name: &str,
        reader: R,
    ) -> impl Iterator<Item = Result<FlowVectors, EbeError>> + 'static {
        flow::event_by_event(self.events_from_reader(name, reader), self.accumulator)
    }

    /// Whole-run average over the configured inputs.
    pub fn average(&self) -> Result<AggregateFlows, EbeError> {
        self.average_events(self.events())
    }

    pub fn average_from_reader<R: BufRead + 'static>(
        &self,
        name: &str,
        reader: R,
    ) -> Result<AggregateFlows, EbeError> {
        self.average_events(self.events_from_reader(name, reader))
    }

    /// Whole-run average over any event source.
    pub fn average_events<I>(&self, events: I) -> Result<AggregateFlows, EbeError>
    where
        I: IntoIterator<Item = Result<Event, EbeError>>,
    {
        let mut aggregator = self.aggregator(AggregationMode::Integrated)?;
        for event in events {
            aggregator.push_event(&event?)?;
        }
        Ok(aggregator.finish_integrated())
    }

    /// pT-differential average over the configured inputs.
    pub fn differential(&self) -> Result<DifferentialFlows, EbeError> {
        self.differential_events(self.events())
    }

    pub fn differential_from_reader<R: BufRead + 'static>(
        &self,
        name: &str,
        reader: R,
    ) -> Result<DifferentialFlows, EbeError> {
        self.differential_events(self.events_from_reader(name, reader))
    }

    /// pT-differential average over any event source.
    pub fn differential_events<I>(&self, events: I) -> Result<DifferentialFlows, EbeError>
    where
        I: IntoIterator<Item = Result<Event, EbeError>>,
    {
        let mut aggregator = self.aggregator(AggregationMode::Differential {
            bin_width: self.config.bin_width,
        })?;
        for event in events {
            aggregator.push_event(&event?)?;
        }
        aggregator.finish_differential()
    }

    fn aggregator(&self, mode: AggregationMode) -> Result<FlowAggregator, EbeError> {
        FlowAggregator::new(self.accumulator, mode, self.config.buffer_capacity)
    }
}
