use std::collections::HashSet;

use thiserror::Error;

use crate::config::ProviderConfig;

/// Errors raised while building or indexing the provider registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("No providers configured")]
    NoProviders,

    #[error("Duplicate provider id {id}")]
    DuplicateId { id: u32 },

    #[error("Provider {id} has no responses")]
    EmptyResponses { id: u32 },

    #[error("Provider index {index} out of range (count {count})")]
    OutOfRange { index: usize, count: usize },
}

/// A response backend with a stable identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    id: u32,
    responses: Vec<String>,
}

impl Provider {
    pub fn new(id: u32, responses: Vec<String>) -> Result<Self, ProviderError> {
        if responses.is_empty() {
            return Err(ProviderError::EmptyResponses { id });
        }
        Ok(Self { id, responses })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }
}

/// Ordered, never-empty provider list fixed at startup.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Result<Self, ProviderError> {
        if providers.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let mut seen = HashSet::with_capacity(providers.len());
        for provider in &providers {
            if !seen.insert(provider.id) {
                return Err(ProviderError::DuplicateId { id: provider.id });
            }
        }

        Ok(Self { providers })
    }

    pub fn from_config(configs: &[ProviderConfig]) -> Result<Self, ProviderError> {
        let providers = configs
            .iter()
            .map(|c| Provider::new(c.id, c.responses.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(providers)
    }

    pub fn get(&self, index: usize) -> Result<&Provider, ProviderError> {
        self.providers.get(index).ok_or(ProviderError::OutOfRange {
            index,
            count: self.providers.len(),
        })
    }

    pub fn count(&self) -> usize {
        self.providers.len()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.providers.iter().map(|p| p.id).collect()
    }
}
