//! IOC Store, TI Correlator, and feed parsers (spec components 4.C, 4.G).

pub mod correlator;
pub mod feeds;
pub mod ingest;
pub mod ioc;
pub mod store;

pub use correlator::{CorrelationStats, CorrelatorConfig, TiCorrelator, DEFAULT_SUPPRESSION_WINDOW};
pub use ingest::{FeedConfig, FeedIngestor, IngestStats, DEFAULT_RETENTION};
pub use ioc::{normalize_value, FeedSource, Ioc, IocType, ThreatCategory};
pub use store::{IocMatch, IocStats, IocStore};
