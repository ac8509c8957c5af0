//! The identity resolver: turns per-clip placeholders into durable
//! identities and rewrites caption text to durable alias tokens.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use tracing::debug;

use memoir_core::config::ResolverConfig;
use memoir_core::error::Result;
use memoir_core::types::{Alias, ClipObservation, IdentityId};
use memoir_graph::MemoryGraph;

use crate::global::resolve_against_graph;
use crate::local::cluster_observation;

/// Result of resolving one clip's observation against the graph.
#[derive(Clone, Debug)]
pub struct ResolvedClip {
    /// Caption statements with `<p{slot}>` rewritten to durable alias
    /// tokens. Placeholders with no embedding evidence are left as written.
    pub statements: Vec<String>,
    /// Canonical identities referenced by the rewritten statements.
    pub mentions: BTreeSet<IdentityId>,
    /// Placeholder tokens that stayed unresolved.
    pub unresolved: Vec<String>,
    pub new_identities: usize,
    pub matched_identities: usize,
}

/// Resolves identities within and across clips.
pub struct IdentityResolver {
    config: ResolverConfig,
    placeholder_regex: Regex,
    name_regex: Regex,
}

impl IdentityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            placeholder_regex: Regex::new(r"<p(\d+)>").unwrap(),
            // "<p0>, who is called Maya" / "<p1> is named Jun Park"
            name_regex: Regex::new(
                r"<p(\d+)>[^.!?]*?\b(?:named|called)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)",
            )
            .unwrap(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// How many local identities the clip's face/voice evidence yields.
    /// The caption generator is told this count so its placeholders stay in
    /// range. Pure function of the observation.
    pub fn local_identity_count(&self, observation: &ClipObservation) -> usize {
        cluster_observation(observation, &self.config).len()
    }

    /// Run local clustering and global resolution for one clip, then bind
    /// caption placeholders to the resolved identities.
    ///
    /// Placeholders that reference a slot with no embedding evidence stay
    /// in the text exactly as written and are excluded from mentions; they
    /// are never fabricated into identity nodes.
    pub fn resolve_clip(
        &self,
        graph: &mut MemoryGraph,
        observation: &ClipObservation,
    ) -> Result<ResolvedClip> {
        let locals = cluster_observation(observation, &self.config);
        let matches =
            resolve_against_graph(graph, observation.clip_id, &locals, &self.config)?;

        let slot_to_identity: HashMap<usize, IdentityId> =
            matches.iter().map(|m| (m.slot, m.identity)).collect();

        let mut statements = Vec::with_capacity(observation.captions.len());
        let mut mentions = BTreeSet::new();
        let mut unresolved = Vec::new();

        for line in &observation.captions {
            // Bind stated names before rewriting, while `<p{slot}>` tokens
            // are still present.
            for caps in self.name_regex.captures_iter(&line.0) {
                let slot: usize = match caps[1].parse() {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                if let (Some(&id), Some(name)) = (slot_to_identity.get(&slot), caps.get(2)) {
                    graph.assign_name(id, name.as_str())?;
                }
            }

            let rewritten = self
                .placeholder_regex
                .replace_all(&line.0, |caps: &regex::Captures<'_>| {
                    let slot: usize = caps[1].parse().unwrap_or(usize::MAX);
                    match slot_to_identity.get(&slot) {
                        Some(&id) => {
                            mentions.insert(graph.canonical_of(id));
                            Alias::local(observation.clip_id, slot).token()
                        }
                        None => {
                            unresolved.push(caps[0].to_string());
                            caps[0].to_string()
                        }
                    }
                })
                .into_owned();
            statements.push(rewritten);
        }

        let new_identities = matches.iter().filter(|m| m.novel).count();
        let matched_identities = matches.len() - new_identities;
        debug!(
            clip = %observation.clip_id,
            locals = matches.len(),
            new = new_identities,
            matched = matched_identities,
            unresolved = unresolved.len(),
            "Clip resolved"
        );

        Ok(ResolvedClip {
            statements,
            mentions,
            unresolved,
            new_identities,
            matched_identities,
        })
    }
}
