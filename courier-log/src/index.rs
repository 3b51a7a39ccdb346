//! Offline log indexing with pluggable strategies.
//!
//! The indexer makes one forward pass over a log, feeding every event
//! to every active strategy. Each strategy emits its own channel → type
//! → offsets mapping, namespaced under the strategy's name in the
//! combined [`Index`] artifact. Strategies are statically registered
//! trait objects; there is no dynamic loading.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decode::{DecoderRegistry, PayloadDecoder, RAW_TYPE};
use crate::error::{Error, Result};
use crate::event::LogEvent;
use crate::eventlog::LogReader;

/// One event as presented to indexing strategies.
pub struct EventRecord<'a> {
    /// The decoded log event.
    pub event: &'a LogEvent,
    /// Byte offset of the event's record in the source log.
    pub offset: u64,
    /// Type name from the channel's decoder, or [`RAW_TYPE`].
    pub type_name: &'a str,
    /// Decoded payload value, when a decoder applied.
    pub value: Option<&'a serde_json::Value>,
}

/// Offsets emitted by one strategy: channel → type → ordered offsets.
pub type StrategyIndex = BTreeMap<String, BTreeMap<String, Vec<u64>>>;

/// A named indexing strategy.
///
/// `on_event` observes every event of the scan in file order;
/// `finalize` emits the strategy's offset lists, in whatever order the
/// strategy chooses.
pub trait IndexStrategy: Send {
    /// Name this strategy's output is namespaced under.
    fn name(&self) -> &str;

    /// Observe one event. An error skips the event for this strategy
    /// only; the scan continues.
    fn on_event(&mut self, record: &EventRecord<'_>) -> Result<()>;

    /// Emit the accumulated offsets.
    fn finalize(&mut self) -> StrategyIndex;
}

/// The default strategy: offsets grouped by (channel, type) in file
/// order.
#[derive(Default)]
pub struct TimestampStrategy {
    buckets: StrategyIndex,
}

impl TimestampStrategy {
    /// Create an empty timestamp strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStrategy for TimestampStrategy {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn on_event(&mut self, record: &EventRecord<'_>) -> Result<()> {
        self.buckets
            .entry(record.event.channel.clone())
            .or_default()
            .entry(record.type_name.to_string())
            .or_default()
            .push(record.offset);
        Ok(())
    }

    fn finalize(&mut self) -> StrategyIndex {
        std::mem::take(&mut self.buckets)
    }
}

/// The combined, serializable index artifact: strategy → channel → type
/// → ordered byte offsets into the source log.
///
/// Valid only against the exact file it was built from. Serializes as
/// JSON, keeping offsets as plain integers (JSON numbers cover the full
/// 64-bit offset range needed for multi-gigabyte logs).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    strategies: BTreeMap<String, StrategyIndex>,
}

impl Index {
    /// Offsets recorded by `strategy` for (`channel`, `type_name`).
    #[must_use]
    pub fn offsets(&self, strategy: &str, channel: &str, type_name: &str) -> Option<&[u64]> {
        self.strategies
            .get(strategy)?
            .get(channel)?
            .get(type_name)
            .map(Vec::as_slice)
    }

    /// The full output of one strategy.
    #[must_use]
    pub fn strategy(&self, name: &str) -> Option<&StrategyIndex> {
        self.strategies.get(name)
    }

    /// Whether the index holds no strategies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Serialize the artifact as JSON.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load an artifact previously written with
    /// [`to_writer`](Index::to_writer).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Drives one full scan of a log through a set of strategies.
pub struct Indexer {
    strategies: Vec<Box<dyn IndexStrategy>>,
    decoders: DecoderRegistry,
}

impl Indexer {
    /// Create an indexer with the default [`TimestampStrategy`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(TimestampStrategy::new())],
            decoders: DecoderRegistry::new(),
        }
    }

    /// Add a custom strategy alongside the existing ones.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn IndexStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Register a payload decoder for `channel`.
    #[must_use]
    pub fn with_decoder(
        mut self,
        channel: impl Into<String>,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> Self {
        self.decoders.register(channel, decoder);
        self
    }

    /// Scan the whole log once, feeding every event to every strategy,
    /// and emit the combined index.
    ///
    /// Decoder failures index the event under [`RAW_TYPE`]; a corrupt
    /// record is skipped by resyncing to the next record boundary.
    /// Neither aborts the pass.
    pub fn run(mut self, reader: &mut LogReader) -> Result<Index> {
        reader.seek_to_start();
        let mut scanned: u64 = 0;

        loop {
            let offset = reader.cursor();
            match reader.read_next() {
                Ok(Some(event)) => {
                    scanned += 1;
                    let (type_name, value) = match self.decoders.get(&event.channel) {
                        Some(decoder) => match decoder.decode(&event.payload) {
                            Ok(value) => (decoder.type_name(), Some(value)),
                            Err(error) => {
                                warn!(
                                    channel = %event.channel,
                                    offset,
                                    %error,
                                    "payload decode failed; indexing as raw"
                                );
                                (RAW_TYPE, None)
                            }
                        },
                        None => (RAW_TYPE, None),
                    };
                    let record = EventRecord {
                        event: &event,
                        offset,
                        type_name,
                        value: value.as_ref(),
                    };
                    for strategy in &mut self.strategies {
                        if let Err(error) = strategy.on_event(&record) {
                            warn!(
                                strategy = strategy.name(),
                                channel = %event.channel,
                                offset,
                                %error,
                                "strategy failed on event; skipping"
                            );
                        }
                    }
                }
                Ok(None) => break,
                Err(Error::Corrupt { offset, reason }) => {
                    warn!(offset, %reason, "corrupt record; resyncing");
                    if !reader.resync()? {
                        break;
                    }
                }
                Err(other) => return Err(other),
            }
        }

        let mut index = Index::default();
        for mut strategy in self.strategies {
            let name = strategy.name().to_string();
            if index.strategies.insert(name.clone(), strategy.finalize()).is_some() {
                warn!(strategy = %name, "duplicate strategy name; earlier output replaced");
            }
        }
        debug!(events = scanned, "index build complete");
        Ok(index)
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}
