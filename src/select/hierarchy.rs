use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::UnresolvedPolicy;
use crate::error::{ReportError, Result};
use crate::graph::{ResultGraph, Test};

use super::range::Selector;

/// The three selectors of a report. Tweet and token selectors index within
/// each selected test, not across the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub tests: Selector,
    pub tweets: Selector,
    pub tokens: Selector,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            tests: Selector::all(),
            tweets: Selector::none(),
            tokens: Selector::none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    pub include_fails: bool,
    pub unresolved: UnresolvedPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSelection {
    pub test: usize,
    pub tweets: Vec<usize>,
    pub tokens: Vec<usize>,
    pub cascaded: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub test: usize,
    pub tweet: usize,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub tests: Vec<TestSelection>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Selection {
    pub fn tweet_count(&self) -> usize {
        self.tests.iter().map(|sel| sel.tweets.len()).sum()
    }

    pub fn token_count(&self) -> usize {
        self.tests.iter().map(|sel| sel.tokens.len()).sum()
    }
}

pub fn resolve_hierarchy(
    graph: &ResultGraph,
    selectors: &Selectors,
    options: ResolveOptions,
) -> Result<Selection> {
    let mut selection = Selection::default();
    for ordinal in selectors
        .tests
        .resolve_scoped(graph.tests.len(), "tests", None)?
    {
        let test = &graph.tests[ordinal];
        let tokens = selectors
            .tokens
            .resolve_scoped(test.tokens.len(), "tokens", Some(ordinal))?;
        let tweet_ordinals = selectors
            .tweets
            .resolve_scoped(test.tweets.len(), "tweets", Some(ordinal))?;
        let mut tweets = Vec::new();
        for tweet_ordinal in tweet_ordinals {
            let tweet = &test.tweets[tweet_ordinal];
            if !tweet.located && !options.include_fails {
                continue;
            }
            let missing = missing_tokens(test, ordinal, tweet_ordinal);
            if missing.is_empty() {
                tweets.push(tweet_ordinal);
                continue;
            }
            match options.unresolved {
                UnresolvedPolicy::Abort => {
                    let token = missing
                        .into_iter()
                        .next()
                        .map(|reference| reference.token)
                        .unwrap_or_default();
                    return Err(ReportError::UnresolvedTokenReference {
                        test: ordinal,
                        tweet: tweet_ordinal,
                        token,
                    });
                }
                UnresolvedPolicy::Skip => {
                    for reference in &missing {
                        warn!(
                            test = reference.test,
                            tweet = reference.tweet,
                            token = %reference.token,
                            "skipping tweet with unresolved token reference"
                        );
                    }
                    selection.unresolved.extend(missing);
                }
            }
        }
        debug!(
            test = ordinal,
            tweets = tweets.len(),
            tokens = tokens.len(),
            "resolved test selection"
        );
        selection.tests.push(TestSelection {
            test: ordinal,
            tweets,
            tokens,
            cascaded: BTreeSet::new(),
        });
    }
    Ok(selection)
}

fn missing_tokens(test: &Test, ordinal: usize, tweet_ordinal: usize) -> Vec<UnresolvedReference> {
    test.tweets[tweet_ordinal]
        .tokens
        .iter()
        .filter(|id| test.token_position(id).is_none())
        .map(|id| UnresolvedReference {
            test: ordinal,
            tweet: tweet_ordinal,
            token: id.clone(),
        })
        .collect()
}
