//! Connected-component resolution over the ticker↔identifier graph.
//!
//! Tickers and identifiers form a bipartite graph (an edge per reported
//! identifier), partitioned by instrument type. Connected components are
//! found by iterative min-label propagation over an explicit index arena:
//! every node starts with its own label, each round pulls every edge
//! endpoint down to the minimum label one hop away, and the loop stops at
//! the first round with no change. Labels only decrease and are bounded
//! below, so the fixed point is always reached.

use super::{GroupMember, IdentityGroup, InstrumentRecord, InstrumentType};
use std::collections::{BTreeMap, HashMap};

/// The resolved universe: identity groups plus a ticker→group index.
#[derive(Debug, Clone)]
pub struct ResolvedUniverse {
    pub groups: Vec<IdentityGroup>,
    /// Identifiers reported under more than one instrument type. Kept
    /// partitioned per type; surfaced for diagnostics.
    pub conflicts: Vec<String>,
    by_ticker: HashMap<String, usize>,
}

impl ResolvedUniverse {
    pub fn group_of(&self, ticker: &str) -> Option<&IdentityGroup> {
        self.by_ticker.get(ticker).map(|&i| &self.groups[i])
    }

    /// Current symbol for a ticker, if it resolves to a group.
    pub fn latest_ticker(&self, ticker: &str) -> Option<&str> {
        self.group_of(ticker).map(|g| g.latest_ticker.as_str())
    }

    /// Expand requested tickers to every symbol in their groups.
    ///
    /// A ticker absent from the universe passes through unchanged: an
    /// instrument with no identifiers is its own singleton group, never
    /// dropped. The result is sorted and de-duplicated.
    pub fn expand(&self, tickers: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ticker in tickers {
            match self.group_of(ticker) {
                Some(group) => out.extend(group.tickers().map(String::from)),
                None => out.push(ticker.clone()),
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// All tickers in the resolved universe, sorted.
    pub fn all_tickers(&self) -> Vec<String> {
        let mut out: Vec<String> = self.by_ticker.keys().cloned().collect();
        out.sort_unstable();
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NodeKey {
    Ticker(InstrumentType, String),
    Identifier(InstrumentType, String),
}

/// Resolve identity groups from the instrument master.
pub fn resolve(records: &[InstrumentRecord]) -> ResolvedUniverse {
    // Deterministic arena: nodes keyed and indexed in sorted order.
    fn intern(index: &mut BTreeMap<NodeKey, usize>, key: NodeKey) -> usize {
        let next = index.len();
        *index.entry(key).or_insert(next)
    }
    let mut node_index: BTreeMap<NodeKey, usize> = BTreeMap::new();

    let mut edges: Vec<(usize, usize)> = Vec::new();
    for rec in records {
        let t = intern(
            &mut node_index,
            NodeKey::Ticker(rec.instrument_type.clone(), rec.ticker.clone()),
        );
        for id in [&rec.composite_id, &rec.share_class_id].into_iter().flatten() {
            let i = intern(
                &mut node_index,
                NodeKey::Identifier(rec.instrument_type.clone(), id.clone()),
            );
            edges.push((t, i));
        }
    }

    // BTreeMap insertion order is arrival order; rebuild indices so that
    // node id == position in sorted key order, making labels reproducible
    // across identical inputs regardless of record order.
    let keys: Vec<NodeKey> = node_index.keys().cloned().collect();
    let remap: HashMap<usize, usize> = node_index
        .values()
        .enumerate()
        .map(|(sorted, &old)| (old, sorted))
        .collect();
    let edges: Vec<(usize, usize)> = edges
        .into_iter()
        .map(|(a, b)| (remap[&a], remap[&b]))
        .collect();

    // Min-label propagation to a fixed point.
    let mut labels: Vec<usize> = (0..keys.len()).collect();
    let mut changed = true;
    while changed {
        changed = false;
        for &(a, b) in &edges {
            let m = labels[a].min(labels[b]);
            if labels[a] != m {
                labels[a] = m;
                changed = true;
            }
            if labels[b] != m {
                labels[b] = m;
                changed = true;
            }
        }
    }

    // Latest master row per (type, ticker) carries the member metadata.
    let mut latest_row: BTreeMap<(InstrumentType, String), &InstrumentRecord> = BTreeMap::new();
    for rec in records {
        latest_row
            .entry((rec.instrument_type.clone(), rec.ticker.clone()))
            .and_modify(|cur| {
                if rec.last_updated > cur.last_updated {
                    *cur = rec;
                }
            })
            .or_insert(rec);
    }

    // Collect ticker nodes per final label.
    let mut by_label: BTreeMap<usize, Vec<&InstrumentRecord>> = BTreeMap::new();
    for (idx, key) in keys.iter().enumerate() {
        if let NodeKey::Ticker(itype, ticker) = key {
            if let Some(rec) = latest_row.get(&(itype.clone(), ticker.clone())) {
                by_label.entry(labels[idx]).or_default().push(rec);
            }
        }
    }

    let mut groups = Vec::with_capacity(by_label.len());
    let mut by_ticker = HashMap::new();
    for (group_id, (_, mut recs)) in by_label.into_iter().enumerate() {
        recs.sort_by(|a, b| {
            a.last_updated
                .cmp(&b.last_updated)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        let members: Vec<GroupMember> = recs
            .iter()
            .map(|r| GroupMember {
                ticker: r.ticker.clone(),
                last_updated: r.last_updated,
                delisted_at: r.delisted_at,
            })
            .collect();
        let latest_ticker = members
            .last()
            .map(|m| m.ticker.clone())
            .unwrap_or_default();
        for member in &members {
            by_ticker.insert(member.ticker.clone(), group_id);
        }
        groups.push(IdentityGroup {
            group_id,
            members,
            latest_ticker,
        });
    }

    ResolvedUniverse {
        groups,
        conflicts: cross_type_conflicts(records),
        by_ticker,
    }
}

/// Identifiers reported under two or more instrument types. Type
/// partitions stay separate; the collision is only reported.
fn cross_type_conflicts(records: &[InstrumentRecord]) -> Vec<String> {
    let mut types_by_id: BTreeMap<&str, Vec<&InstrumentType>> = BTreeMap::new();
    for rec in records {
        for id in [&rec.composite_id, &rec.share_class_id].into_iter().flatten() {
            let entry = types_by_id.entry(id.as_str()).or_default();
            if !entry.contains(&&rec.instrument_type) {
                entry.push(&rec.instrument_type);
            }
        }
    }

    let mut conflicts = Vec::new();
    for (id, types) in types_by_id {
        if types.len() > 1 {
            eprintln!(
                "WARNING: identifier {id} spans {} instrument types; partitions kept separate",
                types.len()
            );
            conflicts.push(id.to_string());
        }
    }
    conflicts
}
