//! Index settings and analysis components
//!
//! Analyzers, token filters and tokenizers are declared here under names that
//! field mappings refer to.

use crate::error::{DslError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Analyzer {
    Custom {
        tokenizer: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        filter: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        char_filter: Vec<String>,
    },
    Standard {
        #[serde(skip_serializing_if = "Option::is_none")]
        stopwords: Option<Vec<String>>,
    },
    Simple,
    Whitespace,
    Keyword,
}

impl Analyzer {
    /// Custom pipeline: one tokenizer followed by named token filters
    pub fn custom<I, S>(tokenizer: impl Into<String>, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Analyzer::Custom {
            tokenizer: tokenizer.into(),
            filter: filters.into_iter().map(Into::into).collect(),
            char_filter: Vec::new(),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if let Analyzer::Custom { tokenizer, .. } = self {
            if tokenizer.trim().is_empty() {
                return Err(DslError::InvalidAnalysis {
                    name: name.to_string(),
                    reason: "custom analyzer needs a tokenizer".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenFilter {
    Lowercase,
    Asciifolding,
    EdgeNgram { min_gram: u32, max_gram: u32 },
    Ngram { min_gram: u32, max_gram: u32 },
    Stop { stopwords: Vec<String> },
    Shingle {
        min_shingle_size: u32,
        max_shingle_size: u32,
    },
    Synonym { synonyms: Vec<String> },
}

impl TokenFilter {
    pub fn edge_ngram(min_gram: u32, max_gram: u32) -> Self {
        TokenFilter::EdgeNgram { min_gram, max_gram }
    }

    pub fn ngram(min_gram: u32, max_gram: u32) -> Self {
        TokenFilter::Ngram { min_gram, max_gram }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            TokenFilter::EdgeNgram { min_gram, max_gram }
            | TokenFilter::Ngram { min_gram, max_gram } => {
                check_grams(name, *min_gram, *max_gram)
            }
            TokenFilter::Shingle {
                min_shingle_size,
                max_shingle_size,
            } if min_shingle_size > max_shingle_size => Err(DslError::InvalidAnalysis {
                name: name.to_string(),
                reason: "min_shingle_size exceeds max_shingle_size".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenChars {
    Letter,
    Digit,
    Whitespace,
    Punctuation,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tokenizer {
    Standard {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_token_length: Option<u32>,
    },
    Whitespace,
    Keyword,
    EdgeNgram {
        min_gram: u32,
        max_gram: u32,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        token_chars: Vec<TokenChars>,
    },
    Ngram {
        min_gram: u32,
        max_gram: u32,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        token_chars: Vec<TokenChars>,
    },
}

impl Tokenizer {
    fn validate(&self, name: &str) -> Result<()> {
        match self {
            Tokenizer::EdgeNgram {
                min_gram, max_gram, ..
            }
            | Tokenizer::Ngram {
                min_gram, max_gram, ..
            } => check_grams(name, *min_gram, *max_gram),
            _ => Ok(()),
        }
    }
}

fn check_grams(name: &str, min_gram: u32, max_gram: u32) -> Result<()> {
    let reason = if min_gram == 0 {
        "min_gram must be positive"
    } else if min_gram > max_gram {
        "min_gram exceeds max_gram"
    } else {
        return Ok(());
    };
    Err(DslError::InvalidAnalysis {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// The `analysis` block of index settings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub analyzer: BTreeMap<String, Analyzer>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<String, TokenFilter>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tokenizer: BTreeMap<String, Tokenizer>,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.analyzer.is_empty() && self.filter.is_empty() && self.tokenizer.is_empty()
    }
}

/// Settings sent with index creation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_shards: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_interval: Option<String>,
    #[serde(skip_serializing_if = "Analysis::is_empty")]
    analysis: Analysis,
}

impl IndexSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = Some(shards);
        self
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = Some(replicas);
        self
    }

    /// e.g. `"1s"`, or `"-1"` to disable periodic refresh
    pub fn with_refresh_interval(mut self, interval: impl Into<String>) -> Self {
        self.refresh_interval = Some(interval.into());
        self
    }

    pub fn with_analyzer(mut self, name: impl Into<String>, analyzer: Analyzer) -> Result<Self> {
        let name = component_name(name)?;
        analyzer.validate(&name)?;
        self.analysis.analyzer.insert(name, analyzer);
        Ok(self)
    }

    pub fn with_token_filter(mut self, name: impl Into<String>, filter: TokenFilter) -> Result<Self> {
        let name = component_name(name)?;
        filter.validate(&name)?;
        self.analysis.filter.insert(name, filter);
        Ok(self)
    }

    pub fn with_tokenizer(mut self, name: impl Into<String>, tokenizer: Tokenizer) -> Result<Self> {
        let name = component_name(name)?;
        tokenizer.validate(&name)?;
        self.analysis.tokenizer.insert(name, tokenizer);
        Ok(self)
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }
}

fn component_name(name: impl Into<String>) -> Result<String> {
    let name = name.into();
    if name.trim().is_empty() {
        return Err(DslError::InvalidAnalysis {
            name,
            reason: "name must not be empty".to_string(),
        });
    }
    Ok(name)
}
