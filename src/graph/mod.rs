use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ResultGraph {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub config: Map<String, Value>,
    pub tests: Vec<Test>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Test {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub summary: TestSummary,
    #[serde(default)]
    pub tweets: Vec<Tweet>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(skip)]
    token_lookup: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestSummary {
    #[serde(default)]
    pub tweets: u64,
    #[serde(default)]
    pub located: u64,
    #[serde(default)]
    pub mean_error: Option<f64>,
    #[serde(default)]
    pub median_error: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    #[serde(default)]
    pub id: Option<u64>,
    pub located: bool,
    #[serde(default)]
    pub error: Option<f64>,
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub estimate: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub model: Option<Value>,
}

impl ResultGraph {
    pub fn index_tokens(&mut self) -> Result<()> {
        for (ordinal, test) in self.tests.iter_mut().enumerate() {
            test.index_tokens(ordinal)?;
        }
        Ok(())
    }

    pub fn tweet_count(&self) -> usize {
        self.tests.iter().map(|test| test.tweets.len()).sum()
    }

    pub fn token_count(&self) -> usize {
        self.tests.iter().map(|test| test.tokens.len()).sum()
    }
}

impl Test {
    pub fn index_tokens(&mut self, ordinal: usize) -> Result<()> {
        let mut lookup = HashMap::with_capacity(self.tokens.len());
        for (position, token) in self.tokens.iter().enumerate() {
            if lookup.insert(token.id.clone(), position).is_some() {
                return Err(ReportError::DuplicateToken {
                    test: ordinal,
                    token: token.id.clone(),
                });
            }
        }
        self.token_lookup = lookup;
        Ok(())
    }

    pub fn token_position(&self, id: &str) -> Option<usize> {
        self.token_lookup.get(id).copied()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{graph, test, token, tweet};
    use super::{ResultGraph, Test};
    use crate::error::ReportError;

    #[test]
    fn token_lookup_is_per_test() {
        let graph = graph(vec![
            test(0, vec![], vec![token("a", 1), token("b", 2)]),
            test(1, vec![], vec![token("b", 5)]),
        ]);
        assert_eq!(graph.tests[0].token_position("b"), Some(1));
        assert_eq!(graph.tests[1].token_position("b"), Some(0));
        assert_eq!(graph.tests[1].token_position("a"), None);
        assert_eq!(graph.token_count(), 3);
    }

    #[test]
    fn duplicate_token_ids_within_a_test_are_rejected() {
        let mut dup: Test = test(
            0,
            vec![tweet(true, None, &[])],
            vec![token("a", 1), token("a", 2)],
        );
        let err = dup.index_tokens(4).expect_err("duplicate");
        assert!(matches!(
            err,
            ReportError::DuplicateToken { test: 4, ref token } if token == "a"
        ));
    }

    #[test]
    fn decodes_minimal_json_with_defaults() {
        let mut graph: ResultGraph = serde_json::from_str(
            r#"{"tests":[{"start":"2024-01-01T00:00:00Z","end":"2024-01-02T00:00:00Z",
                "tweets":[{"located":false,"tokens":["x"]}],
                "tokens":[{"id":"x"}]}]}"#,
        )
        .expect("decode");
        graph.index_tokens().expect("index");
        let only = &graph.tests[0];
        assert_eq!(only.summary.tweets, 0);
        assert_eq!(only.tweets[0].error, None);
        assert!(only.tweets[0].estimate.is_none());
        assert_eq!(only.tokens[0].points, 0);
        assert_eq!(only.token_position("x"), Some(0));
        assert!(graph.config.is_empty());
    }
}
