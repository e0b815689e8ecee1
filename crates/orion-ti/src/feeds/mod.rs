//! Feed parsers (spec §4.G, concretizing §6's enumerated feeds). Each
//! parser is isolated behind the same narrow trait; a parse failure in
//! one feed never blocks the others.

mod feodo;
mod otx;
mod phishtank;
mod urlhaus;

pub use feodo::FeodoParser;
pub use otx::OtxParser;
pub use phishtank::PhishtankParser;
pub use urlhaus::UrlhausParser;

use crate::ioc::Ioc;
use orion_common::OrionError;

/// A feed-specific parser from raw fetched body to IOC records.
pub trait FeedParser: Send + Sync {
    fn source_name(&self) -> &'static str;
    fn parse(&self, raw: &str) -> Result<Vec<Ioc>, OrionError>;
}
