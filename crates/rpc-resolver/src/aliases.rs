// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Chain alias registry
//!
//! Maps human-friendly aliases to canonical chain ids and back. Input that is not a known alias
//! is taken to already be a canonical id; the registry never checks that a chain exists.

use std::collections::{BTreeMap, HashMap, HashSet};

use dashmap::DashMap;
use shared_types::{Alias, ChainId, DEFAULT_ALIASES};
use tracing::{debug, info, warn};

use crate::error::{ResolverError, ResolverResult};

/// Alias snapshot: canonical chain id to its aliases, in display order
pub type AliasTable = BTreeMap<ChainId, Vec<Alias>>;

/// Bidirectional alias mapping
#[derive(Debug, Default)]
pub struct AliasRegistry {
    by_alias: DashMap<String, ChainId>,
    by_chain: DashMap<ChainId, Vec<Alias>>,
}

impl AliasRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry loaded with the built-in alias table
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.replace_table(default_alias_table());
        registry
    }

    /// Create a registry from a snapshot
    pub fn from_table(table: AliasTable) -> Self {
        let registry = Self::new();
        registry.replace_table(table);
        registry
    }

    /// Resolve raw input to a canonical chain id
    ///
    /// The input is trimmed and lower-cased. A known alias resolves to its chain; anything
    /// else is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidChainId`] for empty or whitespace-only input.
    pub fn normalize(&self, input: &str) -> ResolverResult<ChainId> {
        let candidate =
            ChainId::new(input).map_err(|e| ResolverError::invalid_chain_id(input, e))?;

        if let Some(chain_id) = self.by_alias.get(candidate.as_str()) {
            debug!(alias = %candidate, chain_id = %chain_id.value(), "resolved chain alias");
            return Ok(chain_id.clone());
        }
        Ok(candidate)
    }

    /// Aliases registered for a chain, in display order
    pub fn aliases_for(&self, chain_id: &ChainId) -> Vec<Alias> {
        self.by_chain
            .get(chain_id)
            .map(|aliases| aliases.clone())
            .unwrap_or_default()
    }

    /// Every chain that has aliases, sorted by chain id
    pub fn all_aliases(&self) -> AliasTable {
        self.by_chain
            .iter()
            .filter(|item| !item.value().is_empty())
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    /// Replace the whole table with a new snapshot
    ///
    /// Each key is updated atomically, so concurrent lookups see either the old or the new
    /// mapping for any given alias, never a gap. When two chains claim the same alias, the
    /// chain sorting last keeps it.
    pub fn replace_table(&self, table: AliasTable) {
        let (by_alias, by_chain) = index_table(table);

        self.by_alias.retain(|alias, _| by_alias.contains_key(alias));
        self.by_chain.retain(|chain, _| by_chain.contains_key(chain));
        for (alias, chain_id) in by_alias {
            self.by_alias.insert(alias, chain_id);
        }
        for (chain_id, aliases) in by_chain {
            self.by_chain.insert(chain_id, aliases);
        }

        info!(
            chains = self.by_chain.len(),
            aliases = self.by_alias.len(),
            "alias table replaced"
        );
    }

    /// Number of registered aliases
    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    /// Whether no aliases are registered
    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}

/// Build an alias table from raw strings, skipping blank entries
pub fn parse_alias_table<I, A>(raw: I) -> AliasTable
where
    I: IntoIterator<Item = (String, A)>,
    A: IntoIterator<Item = String>,
{
    let mut table = AliasTable::new();
    for (chain, aliases) in raw {
        let Ok(chain_id) = ChainId::new(&chain) else {
            warn!(chain = %chain, "skipping alias entry with empty chain id");
            continue;
        };
        let entry = table.entry(chain_id).or_default();
        for alias in aliases {
            match Alias::new(&alias) {
                Ok(alias) => entry.push(alias),
                Err(_) => warn!(chain = %chain, "skipping empty alias"),
            }
        }
    }
    table
}

/// The built-in alias table
pub fn default_alias_table() -> AliasTable {
    parse_alias_table(DEFAULT_ALIASES.iter().map(|(chain, aliases)| {
        (
            (*chain).to_string(),
            aliases.iter().map(|alias| (*alias).to_string()),
        )
    }))
}

fn index_table(table: AliasTable) -> (HashMap<String, ChainId>, HashMap<ChainId, Vec<Alias>>) {
    let mut by_alias: HashMap<String, ChainId> = HashMap::new();
    for (chain_id, aliases) in &table {
        for alias in aliases {
            if let Some(previous) = by_alias.insert(alias.key().to_string(), chain_id.clone())
                && previous != *chain_id
            {
                warn!(
                    alias = %alias,
                    previous_chain = %previous,
                    chain_id = %chain_id,
                    "alias claimed by more than one chain, keeping the later one"
                );
            }
        }
    }

    let by_chain = table
        .into_iter()
        .map(|(chain_id, aliases)| {
            let mut seen = HashSet::new();
            let owned: Vec<Alias> = aliases
                .into_iter()
                .filter(|alias| by_alias.get(alias.key()) == Some(&chain_id))
                .filter(|alias| seen.insert(alias.key().to_string()))
                .collect();
            (chain_id, owned)
        })
        .collect();

    (by_alias, by_chain)
}
