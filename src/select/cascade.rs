use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::ResultGraph;

use super::hierarchy::Selection;

pub fn cascade_required(geofiles: bool, tweet_tokens: bool, explicit_token_output: bool) -> bool {
    geofiles || (tweet_tokens && !explicit_token_output)
}

pub fn apply_cascade(graph: &ResultGraph, selection: &mut Selection) -> usize {
    let mut added = 0;
    for sel in &mut selection.tests {
        let test = &graph.tests[sel.test];
        let mut tokens: BTreeSet<usize> = sel.tokens.iter().copied().collect();
        for &tweet in &sel.tweets {
            for id in &test.tweets[tweet].tokens {
                // Unresolved references were already dropped by the resolver.
                let Some(position) = test.token_position(id) else {
                    continue;
                };
                if tokens.insert(position) {
                    sel.cascaded.insert(position);
                    added += 1;
                }
            }
        }
        sel.tokens = tokens.into_iter().collect();
    }
    debug!(added, "cascaded tweet tokens into token selection");
    added
}
