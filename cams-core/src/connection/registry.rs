//! Lookup table from data source type to strategy.

use super::strategies::default_strategy;
use super::{ConnectionDescriptor, ConnectionSource, ConnectionStrategy, compatibility};
use crate::Result;
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of connection strategies keyed by data source type.
///
/// Built once at startup and shared read-only (wrap in `Arc` to share
/// across tasks).
#[derive(Clone, Default)]
pub struct ConnectionStrategyRegistry {
    strategies: HashMap<DataSourceType, Arc<dyn ConnectionStrategy>>,
}

impl std::fmt::Debug for ConnectionStrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.strategies.keys().collect();
        types.sort();
        f.debug_struct("ConnectionStrategyRegistry")
            .field("data_source_types", &types)
            .finish()
    }
}

impl ConnectionStrategyRegistry {
    /// Empty registry for custom wiring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one built-in strategy per data source type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for data_source_type in DataSourceType::ALL {
            registry.register(default_strategy(data_source_type));
        }
        registry
    }

    /// Adds or replaces the strategy for its data source type.
    pub fn register(&mut self, strategy: Arc<dyn ConnectionStrategy>) -> &mut Self {
        self.strategies.insert(strategy.data_source_type(), strategy);
        self
    }

    /// Strategy for a data source type.
    ///
    /// # Errors
    /// Returns `UnsupportedDataSource` when nothing is registered.
    pub fn resolve(&self, data_source_type: DataSourceType) -> Result<Arc<dyn ConnectionStrategy>> {
        self.strategies
            .get(&data_source_type)
            .cloned()
            .ok_or_else(|| CamsError::unsupported_data_source(data_source_type))
    }

    /// Authentication types the registered strategy accepts.
    ///
    /// # Errors
    /// Returns `UnsupportedDataSource` when nothing is registered.
    pub fn supported_authentication_types(
        &self,
        data_source_type: DataSourceType,
    ) -> Result<&'static [AuthenticationType]> {
        Ok(self.resolve(data_source_type)?.supported_authentication_types())
    }

    /// Request-time validation of a (type, authentication) pair.
    ///
    /// # Errors
    /// `UnsupportedDataSource` or `UnsupportedAuthentication`.
    pub fn validate(
        &self,
        data_source_type: DataSourceType,
        authentication_type: AuthenticationType,
    ) -> Result<()> {
        let strategy = self.resolve(data_source_type)?;
        if strategy.supported_authentication_types().contains(&authentication_type)
            && compatibility::is_supported(data_source_type, authentication_type)
        {
            Ok(())
        } else {
            Err(CamsError::unsupported_authentication(
                data_source_type,
                authentication_type,
            ))
        }
    }

    /// Validates the pair and builds the descriptor in one step.
    pub fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        self.validate(source.data_source_type, source.authentication_type)?;
        self.resolve(source.data_source_type)?.build_descriptor(source)
    }

    /// Registered data source types in declaration order.
    pub fn data_source_types(&self) -> Vec<DataSourceType> {
        DataSourceType::ALL
            .into_iter()
            .filter(|t| self.strategies.contains_key(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::strategies::RedisStrategy;

    #[test]
    fn test_defaults_cover_every_type() {
        let registry = ConnectionStrategyRegistry::with_defaults();
        assert_eq!(registry.data_source_types(), DataSourceType::ALL.to_vec());
        for data_source_type in DataSourceType::ALL {
            assert_eq!(
                registry.resolve(data_source_type).unwrap().data_source_type(),
                data_source_type
            );
        }
    }

    #[test]
    fn test_empty_registry_rejects_resolution() {
        let registry = ConnectionStrategyRegistry::new();
        assert!(matches!(
            registry.resolve(DataSourceType::Redis),
            Err(CamsError::UnsupportedDataSource { .. })
        ));
    }

    #[test]
    fn test_register_custom_strategy() {
        let mut registry = ConnectionStrategyRegistry::new();
        registry.register(Arc::new(RedisStrategy));
        assert!(registry.validate(DataSourceType::Redis, AuthenticationType::NoAuth).is_ok());
        assert!(matches!(
            registry.validate(DataSourceType::Redis, AuthenticationType::Kerberos),
            Err(CamsError::UnsupportedAuthentication { .. })
        ));
    }
}
