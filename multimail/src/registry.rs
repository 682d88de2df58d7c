//! Registry of the providers that passed startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{ServiceProvider, Transport};

/// Insertion-ordered set of available providers, each bound to its adapter.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    order: Vec<ServiceProvider>,
    transports: HashMap<ServiceProvider, Arc<dyn Transport>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the provider it sends through.
    ///
    /// Registering the same provider twice replaces the adapter and keeps the
    /// provider's original position.
    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        let provider = transport.provider();
        if self.transports.insert(provider, transport).is_none() {
            self.order.push(provider);
        }
    }

    /// Check if `provider` is available.
    pub fn is_available(&self, provider: ServiceProvider) -> bool {
        self.transports.contains_key(&provider)
    }

    /// The adapter registered for `provider`.
    pub fn get(&self, provider: ServiceProvider) -> Option<&Arc<dyn Transport>> {
        self.transports.get(&provider)
    }

    /// Available providers in registration order.
    pub fn providers(&self) -> &[ServiceProvider] {
        &self.order
    }

    /// Number of available providers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no provider is available.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.order)
            .finish()
    }
}
