// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Endpoint catalogs and candidate ordering
//!
//! Two catalogs list endpoints per chain: an operator-curated priority catalog and a general
//! catalog. Both are in-memory snapshots refreshed by external loaders at any time, so the
//! candidate list for a chain is rebuilt on every selection and never cached.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use dashmap::DashMap;
use shared_types::{ChainId, Endpoint};
use tracing::{info, warn};

/// Ordered, duplicate-free endpoints for one chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList(Vec<Endpoint>);

impl CandidateList {
    /// Merge the priority and general lists for a chain
    ///
    /// Priority entries come first in their given order, and each is removed from its position
    /// in the general list. Remaining general entries keep their relative order. Duplicates
    /// within either list collapse to the first occurrence.
    pub fn build(priority: &[Endpoint], general: &[Endpoint]) -> Self {
        let mut seen: HashSet<&Endpoint> = HashSet::with_capacity(priority.len() + general.len());
        let merged = priority
            .iter()
            .chain(general)
            .filter(|endpoint| seen.insert(endpoint))
            .cloned()
            .collect();
        Self(merged)
    }

    /// Endpoints in selection order
    pub fn as_slice(&self) -> &[Endpoint] {
        &self.0
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over candidates in selection order
    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.0.iter()
    }
}

impl IntoIterator for CandidateList {
    type Item = Endpoint;
    type IntoIter = std::vec::IntoIter<Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<CandidateList> for Vec<Endpoint> {
    fn from(list: CandidateList) -> Self {
        list.0
    }
}

/// Endpoints per chain
///
/// Each chain's list is replaced atomically; readers get a cheap shared snapshot.
#[derive(Debug, Default)]
pub struct Catalog {
    name: &'static str,
    entries: DashMap<ChainId, Arc<[Endpoint]>>,
}

impl Catalog {
    /// Create an empty catalog; `name` labels log lines
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
        }
    }

    /// Endpoints listed for a chain, empty if none
    pub fn get(&self, chain_id: &ChainId) -> Arc<[Endpoint]> {
        self.entries
            .get(chain_id)
            .map_or_else(|| Arc::from(Vec::new()), |entry| Arc::clone(entry.value()))
    }

    /// Build a catalog from raw strings; see [`parse_catalog`]
    pub fn from_raw<I, E>(name: &'static str, raw: I) -> Self
    where
        I: IntoIterator<Item = (String, E)>,
        E: IntoIterator<Item = String>,
    {
        let catalog = Self::new(name);
        for (chain_id, endpoints) in parse_catalog(raw) {
            catalog.set_chain(chain_id, endpoints);
        }
        catalog
    }

    /// Replace the list for one chain
    pub fn set_chain(&self, chain_id: ChainId, endpoints: Vec<Endpoint>) {
        if endpoints.is_empty() {
            self.entries.remove(&chain_id);
        } else {
            self.entries.insert(chain_id, Arc::from(endpoints));
        }
    }

    /// Replace every chain's list with a new snapshot
    ///
    /// Chains missing from the snapshot are removed.
    pub fn replace(&self, snapshot: HashMap<ChainId, Vec<Endpoint>>) {
        self.entries
            .retain(|chain_id, _| snapshot.get(chain_id).is_some_and(|list| !list.is_empty()));
        let mut endpoint_count = 0;
        for (chain_id, endpoints) in snapshot {
            endpoint_count += endpoints.len();
            self.set_chain(chain_id, endpoints);
        }
        info!(
            catalog = self.name,
            chains = self.entries.len(),
            endpoints = endpoint_count,
            "catalog replaced"
        );
    }

    /// Whether the chain has at least one endpoint
    pub fn contains(&self, chain_id: &ChainId) -> bool {
        self.entries.contains_key(chain_id)
    }

    /// Chains with at least one endpoint
    pub fn chains(&self) -> BTreeSet<ChainId> {
        self.entries.iter().map(|item| item.key().clone()).collect()
    }

    /// Whether no chain has endpoints
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a raw catalog, normalizing chain keys and dropping URLs that do not parse
///
/// Chain keys are normalized as canonical ids; aliases are not resolved here.
pub fn parse_catalog<I, E>(raw: I) -> HashMap<ChainId, Vec<Endpoint>>
where
    I: IntoIterator<Item = (String, E)>,
    E: IntoIterator<Item = String>,
{
    let mut catalog: HashMap<ChainId, Vec<Endpoint>> = HashMap::new();
    for (chain, urls) in raw {
        let Ok(chain_id) = ChainId::new(&chain) else {
            warn!(chain = %chain, "skipping catalog entry with empty chain id");
            continue;
        };
        let entry = catalog.entry(chain_id).or_default();
        for url in urls {
            match Endpoint::parse(&url) {
                Ok(endpoint) => entry.push(endpoint),
                Err(e) => warn!(chain = %chain, error = %e, "skipping invalid endpoint URL"),
            }
        }
    }
    catalog
}

/// Priority and general catalogs
#[derive(Debug)]
pub struct EndpointCatalogs {
    priority: Catalog,
    general: Catalog,
}

impl Default for EndpointCatalogs {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointCatalogs {
    /// Create empty catalogs
    pub fn new() -> Self {
        Self {
            priority: Catalog::new("priority"),
            general: Catalog::new("general"),
        }
    }

    /// Candidate list for a chain, built from the current snapshots
    pub fn candidates(&self, chain_id: &ChainId) -> CandidateList {
        let priority = self.priority.get(chain_id);
        let general = self.general.get(chain_id);
        CandidateList::build(&priority, &general)
    }

    /// Whether either catalog lists endpoints for the chain
    pub fn is_configured(&self, chain_id: &ChainId) -> bool {
        self.priority.contains(chain_id) || self.general.contains(chain_id)
    }

    /// Replace the priority catalog
    pub fn replace_priority(&self, snapshot: HashMap<ChainId, Vec<Endpoint>>) {
        self.priority.replace(snapshot);
    }

    /// Replace the general catalog
    pub fn replace_general(&self, snapshot: HashMap<ChainId, Vec<Endpoint>>) {
        self.general.replace(snapshot);
    }

    /// Replace the priority list for one chain
    pub fn set_priority_chain(&self, chain_id: ChainId, endpoints: Vec<Endpoint>) {
        self.priority.set_chain(chain_id, endpoints);
    }

    /// Replace the general list for one chain
    pub fn set_general_chain(&self, chain_id: ChainId, endpoints: Vec<Endpoint>) {
        self.general.set_chain(chain_id, endpoints);
    }

    /// Merged candidate list for every chain present in either catalog
    pub fn all_candidates(&self) -> BTreeMap<ChainId, CandidateList> {
        let mut chains = self.priority.chains();
        chains.extend(self.general.chains());
        chains
            .into_iter()
            .map(|chain_id| {
                let candidates = self.candidates(&chain_id);
                (chain_id, candidates)
            })
            .collect()
    }

    /// Priority catalog
    pub fn priority(&self) -> &Catalog {
        &self.priority
    }

    /// General catalog
    pub fn general(&self) -> &Catalog {
        &self.general
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
        urls.iter()
            .map(|url| Endpoint::parse(&format!("https://{url}.rpc")).unwrap())
            .collect()
    }

    fn hosts(list: &CandidateList) -> Vec<String> {
        list.iter()
            .map(|endpoint| endpoint.host().unwrap().trim_end_matches(".rpc").to_string())
            .collect()
    }

    #[test]
    fn priority_entry_moves_to_front() {
        let list = CandidateList::build(&endpoints(&["b"]), &endpoints(&["a", "b", "c"]));
        assert_eq!(hosts(&list), ["b", "a", "c"]);
    }

    #[test]
    fn priority_order_is_preserved() {
        let list = CandidateList::build(&endpoints(&["c", "x", "a"]), &endpoints(&["a", "b", "c"]));
        assert_eq!(hosts(&list), ["c", "x", "a", "b"]);
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence() {
        let list = CandidateList::build(&endpoints(&["a", "a"]), &endpoints(&["b", "a", "b"]));
        assert_eq!(hosts(&list), ["a", "b"]);
    }

    #[test]
    fn empty_tiers() {
        assert!(CandidateList::build(&[], &[]).is_empty());
        assert_eq!(hosts(&CandidateList::build(&[], &endpoints(&["a"]))), ["a"]);
        assert_eq!(hosts(&CandidateList::build(&endpoints(&["p"]), &[])), ["p"]);
    }

    #[test]
    fn catalogs_are_rebuilt_per_call() {
        let catalogs = EndpointCatalogs::new();
        let chain = ChainId::from(1);
        catalogs.set_general_chain(chain.clone(), endpoints(&["a", "b"]));
        assert_eq!(hosts(&catalogs.candidates(&chain)), ["a", "b"]);

        catalogs.set_priority_chain(chain.clone(), endpoints(&["b"]));
        assert_eq!(hosts(&catalogs.candidates(&chain)), ["b", "a"]);

        catalogs.set_priority_chain(chain.clone(), Vec::new());
        assert_eq!(hosts(&catalogs.candidates(&chain)), ["a", "b"]);
        assert!(catalogs.candidates(&ChainId::from(2)).is_empty());
    }

    #[test]
    fn replace_drops_missing_chains() {
        let catalog = Catalog::new("test");
        catalog.set_chain(ChainId::from(1), endpoints(&["a"]));
        catalog.set_chain(ChainId::from(2), endpoints(&["b"]));

        catalog.replace(HashMap::from([(ChainId::from(2), endpoints(&["c"]))]));

        assert!(catalog.get(&ChainId::from(1)).is_empty());
        assert_eq!(catalog.get(&ChainId::from(2)).as_ref(), endpoints(&["c"]).as_slice());
        assert_eq!(catalog.chains().len(), 1);
    }

    #[test]
    fn parse_catalog_skips_invalid_entries() {
        let parsed = parse_catalog([
            (
                " 137 ".to_string(),
                vec![
                    "https://polygon-rpc.com".to_string(),
                    "not a url".to_string(),
                    "wss://polygon.ws".to_string(),
                ],
            ),
            (String::new(), vec!["https://ignored.rpc".to_string()]),
        ]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[&ChainId::from(137)].len(), 1);
    }

    #[test]
    fn from_raw_builds_catalog() {
        let catalog = Catalog::from_raw(
            "general",
            [("ETH".to_string(), vec!["https://a.rpc".to_string(), "ftp://b.rpc".to_string()])],
        );
        assert_eq!(catalog.get(&ChainId::new("eth").unwrap()).len(), 1);
        assert!(catalog.get(&ChainId::from(1)).is_empty());
    }

    #[test]
    fn all_candidates_covers_both_catalogs() {
        let catalogs = EndpointCatalogs::new();
        catalogs.set_priority_chain(ChainId::from(10), endpoints(&["p"]));
        catalogs.set_general_chain(ChainId::from(1), endpoints(&["a"]));

        let all = catalogs.all_candidates();
        assert_eq!(all.len(), 2);
        assert_eq!(hosts(&all[&ChainId::from(10)]), ["p"]);
    }
}
