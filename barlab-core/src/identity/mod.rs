//! Instrument identity: records, groups, and rename resolution.
//!
//! A ticker symbol is not a stable identity — instruments get renamed,
//! relisted, and occasionally recycle symbols. Stable vendor identifiers
//! (composite / share-class FIGIs) tie the symbols together; this module
//! groups them.

pub mod merge;
pub mod resolver;

use crate::config::UniverseFilter;
use chrono::{DateTime, NaiveDate, Utc};

pub use merge::merge_group_bars;
pub use resolver::{resolve, ResolvedUniverse};

/// Vendor instrument type code.
///
/// Identifiers only ever merge within one type: a warrant and the common
/// stock it wraps may share a composite identifier without being the same
/// tradable series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstrumentType {
    CommonStock,
    Adr,
    Etf,
    PreferredStock,
    Warrant,
    Right,
    Fund,
    Unit,
    Other(String),
}

impl InstrumentType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "CS" => InstrumentType::CommonStock,
            "ADRC" => InstrumentType::Adr,
            "ETF" => InstrumentType::Etf,
            "PFD" => InstrumentType::PreferredStock,
            "WARRANT" => InstrumentType::Warrant,
            "RIGHT" => InstrumentType::Right,
            "FUND" => InstrumentType::Fund,
            "UNIT" => InstrumentType::Unit,
            other => InstrumentType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            InstrumentType::CommonStock => "CS",
            InstrumentType::Adr => "ADRC",
            InstrumentType::Etf => "ETF",
            InstrumentType::PreferredStock => "PFD",
            InstrumentType::Warrant => "WARRANT",
            InstrumentType::Right => "RIGHT",
            InstrumentType::Fund => "FUND",
            InstrumentType::Unit => "UNIT",
            InstrumentType::Other(code) => code,
        }
    }
}

/// One row of the instrument master list.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRecord {
    pub ticker: String,
    pub instrument_type: InstrumentType,
    pub active: bool,
    pub composite_id: Option<String>,
    pub share_class_id: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub delisted_at: Option<DateTime<Utc>>,
}

impl InstrumentRecord {
    /// Whether this record survives a universe filter: type matches, and
    /// the instrument is active or was delisted after the cutoff.
    pub fn matches(&self, filter: &UniverseFilter) -> bool {
        if !filter.types.iter().any(|t| t == self.instrument_type.code()) {
            return false;
        }
        if self.active {
            return true;
        }
        match (filter.delisted_after, self.delisted_at) {
            (Some(cutoff), Some(delisted)) => delisted.date_naive() > cutoff,
            (Some(_), None) => true,
            (None, _) => true,
        }
    }
}

/// One member of an identity group, in rename order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub ticker: String,
    pub last_updated: DateTime<Utc>,
    pub delisted_at: Option<DateTime<Utc>>,
}

impl GroupMember {
    /// Last date this member's bars remain authoritative: the earlier of
    /// its last master update and its delisting.
    pub fn cutoff(&self) -> NaiveDate {
        match self.delisted_at {
            Some(delisted) => self.last_updated.min(delisted).date_naive(),
            None => self.last_updated.date_naive(),
        }
    }
}

/// Tickers resolved to one underlying instrument, ordered by
/// `last_updated` ascending; the final member is the current symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityGroup {
    pub group_id: usize,
    pub members: Vec<GroupMember>,
    pub latest_ticker: String,
}

impl IdentityGroup {
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.ticker.as_str())
    }

    pub fn is_rename_chain(&self) -> bool {
        self.members.len() > 1
    }
}
