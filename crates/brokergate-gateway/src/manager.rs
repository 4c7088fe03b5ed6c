//! Registration driven by stored configuration.

use std::sync::Arc;

use tracing::{info, warn};

use brokergate_state::{EndpointConfig, RecordId, StateError, StateStore};

use crate::error::RouteError;
use crate::registry::RouteRegistry;
use crate::route::RouteHandle;

/// Counts from a startup restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RestoreStats {
    pub registered: usize,
    /// Disabled broker endpoints or endpoints.
    pub skipped: usize,
    pub failed: usize,
}

/// Loads endpoint configuration trees and activates them in the registry.
#[derive(Clone)]
pub struct RouteManager {
    store: StateStore,
    registry: Arc<RouteRegistry>,
}

impl RouteManager {
    pub fn new(store: StateStore, registry: Arc<RouteRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Load a broker endpoint with its endpoint and transformation and
    /// activate its route. Fails with `DuplicateRoute` if already active.
    pub fn register_route(&self, broker_endpoint_id: RecordId) -> Result<RouteHandle, RouteError> {
        let config = self.load_enabled(broker_endpoint_id)?;
        let handle = self.registry.add_route(&config)?;
        info!(broker_endpoint = broker_endpoint_id, route = %handle.id, "route registered");
        Ok(handle)
    }

    /// Like [`register_route`](Self::register_route), but swaps in the
    /// freshly loaded configuration if the route is already active.
    pub fn reregister_route(&self, broker_endpoint_id: RecordId) -> Result<RouteHandle, RouteError> {
        let config = self.load_enabled(broker_endpoint_id)?;
        let handle = self.registry.replace_route(&config)?;
        info!(broker_endpoint = broker_endpoint_id, route = %handle.id, "route re-registered");
        Ok(handle)
    }

    /// Register every enabled broker endpoint in the store. Individual
    /// failures are logged and counted; they never stop the restore.
    pub fn restore_routes(&self) -> Result<RestoreStats, RouteError> {
        let mut stats = RestoreStats::default();
        for broker_endpoint in self.store.list_broker_endpoints()? {
            if !broker_endpoint.enabled {
                stats.skipped += 1;
                continue;
            }
            let result = self.load(broker_endpoint.id).and_then(|config| {
                if !config.endpoint.enabled {
                    return Ok(None);
                }
                self.registry.add_route(&config).map(Some)
            });
            match result {
                Ok(Some(_)) => stats.registered += 1,
                Ok(None) => stats.skipped += 1,
                Err(e) => {
                    warn!(
                        broker_endpoint = broker_endpoint.id,
                        name = %broker_endpoint.name,
                        error = %e,
                        "route restore failed"
                    );
                    stats.failed += 1;
                }
            }
        }
        info!(
            registered = stats.registered,
            skipped = stats.skipped,
            failed = stats.failed,
            "routes restored"
        );
        Ok(stats)
    }

    fn load(&self, broker_endpoint_id: RecordId) -> Result<EndpointConfig, RouteError> {
        self.store
            .load_endpoint_config(broker_endpoint_id)
            .map_err(|e| match e {
                StateError::NotFound(what) => RouteError::NotFound(what),
                other => RouteError::Store(other),
            })?
            .ok_or_else(|| RouteError::NotFound(format!("broker endpoint {broker_endpoint_id}")))
    }

    fn load_enabled(&self, broker_endpoint_id: RecordId) -> Result<EndpointConfig, RouteError> {
        let config = self.load(broker_endpoint_id)?;
        let name = &config.broker_endpoint.name;
        if !config.broker_endpoint.enabled {
            return Err(RouteError::InvalidConfiguration(format!(
                "broker endpoint '{name}' is disabled"
            )));
        }
        if !config.endpoint.enabled {
            return Err(RouteError::InvalidConfiguration(format!(
                "endpoint of '{name}' is disabled"
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokergate_state::{Broker, BrokerEndpoint, Endpoint};

    fn manager() -> RouteManager {
        RouteManager::new(
            StateStore::open_in_memory().unwrap(),
            Arc::new(RouteRegistry::default()),
        )
    }

    fn store_config(manager: &RouteManager, name: &str, enabled: bool) -> RecordId {
        let broker = manager
            .store()
            .put_broker(Broker {
                name: "acme".to_string(),
                ..Default::default()
            })
            .unwrap();
        let saved = manager
            .store()
            .save_endpoint_config(EndpointConfig {
                broker_endpoint: BrokerEndpoint {
                    broker_id: broker.id,
                    name: name.to_string(),
                    enabled,
                    ..Default::default()
                },
                endpoint: Endpoint {
                    name: name.to_string(),
                    host: "localhost".to_string(),
                    port: "8081".to_string(),
                    path: "/api/sayhello".to_string(),
                    http_method: "POST".to_string(),
                    endpoint_type: "http".to_string(),
                    enabled: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        saved.broker_endpoint.id
    }

    #[test]
    fn registers_from_store() {
        let manager = manager();
        let id = store_config(&manager, "sayHello", true);

        let handle = manager.register_route(id).unwrap();
        assert_eq!(handle.path, "/api/sayHello");
        assert_eq!(handle.broker_endpoint_id, id);
        assert_eq!(manager.registry().len(), 1);
    }

    #[test]
    fn second_registration_is_duplicate() {
        let manager = manager();
        let id = store_config(&manager, "sayHello", true);
        manager.register_route(id).unwrap();

        assert!(matches!(
            manager.register_route(id),
            Err(RouteError::DuplicateRoute(_))
        ));
        manager.reregister_route(id).unwrap();
        assert_eq!(manager.registry().len(), 1);
    }

    #[test]
    fn same_name_under_another_broker_cannot_take_over() {
        let manager = manager();
        let owner = store_config(&manager, "sayHello", true);
        let other = store_config(&manager, "sayHello", true);
        assert_ne!(owner, other);
        manager.register_route(owner).unwrap();

        assert!(matches!(
            manager.reregister_route(other),
            Err(RouteError::DuplicateRoute(_))
        ));
        assert_eq!(
            manager.registry().get("sayHello").unwrap().broker_endpoint_id,
            owner
        );
    }

    #[test]
    fn missing_broker_endpoint_is_not_found() {
        assert!(matches!(
            manager().register_route(42),
            Err(RouteError::NotFound(_))
        ));
    }

    #[test]
    fn disabled_broker_endpoint_is_rejected() {
        let manager = manager();
        let id = store_config(&manager, "off", false);
        assert!(matches!(
            manager.register_route(id),
            Err(RouteError::InvalidConfiguration(_))
        ));
        assert!(manager.registry().is_empty());
    }

    #[test]
    fn restore_registers_enabled_and_counts_the_rest() {
        let manager = manager();
        store_config(&manager, "one", true);
        store_config(&manager, "two", true);
        store_config(&manager, "off", false);

        let mut broken = EndpointConfig {
            broker_endpoint: BrokerEndpoint {
                broker_id: 1,
                name: "broken".to_string(),
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        broken.endpoint.enabled = true;
        manager.store().save_endpoint_config(broken).unwrap();

        let stats = manager.restore_routes().unwrap();
        assert_eq!(
            stats,
            RestoreStats {
                registered: 2,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(
            manager
                .registry()
                .list()
                .iter()
                .map(|h| h.id.as_str())
                .collect::<Vec<_>>(),
            ["one", "two"]
        );
    }
}
