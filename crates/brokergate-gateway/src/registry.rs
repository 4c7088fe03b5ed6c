//! Live route table.
//!
//! Readers load an `Arc` snapshot of the table and never block. Writers
//! take `write_lock`, build a modified copy and publish it with a single
//! atomic store, so a route is either fully visible or not at all.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use axum::http::Method;
use tracing::{info, warn};

use brokergate_state::EndpointConfig;
use brokergate_transform::ResponseSelection;

use crate::error::RouteError;
use crate::route::{RouteDescriptor, RouteHandle, config_to_route, route_path};

type RouteTable = HashMap<String, Arc<RouteDescriptor>>;

/// Result of matching an inbound call against the table.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Arc<RouteDescriptor>),
    /// The path is bound, but to a different method.
    MethodNotAllowed(Method),
    NotFound,
}

/// Concurrent route table keyed by inbound path.
pub struct RouteRegistry {
    routes: ArcSwap<RouteTable>,
    write_lock: Mutex<()>,
    selection: ResponseSelection,
}

impl RouteRegistry {
    pub fn new(selection: ResponseSelection) -> Self {
        Self {
            routes: ArcSwap::from_pointee(RouteTable::new()),
            write_lock: Mutex::new(()),
            selection,
        }
    }

    pub fn selection(&self) -> ResponseSelection {
        self.selection
    }

    /// Build and activate a route. Fails with `DuplicateRoute` if the id
    /// is already active.
    pub fn add_route(&self, config: &EndpointConfig) -> Result<RouteHandle, RouteError> {
        let route = Arc::new(config_to_route(config, self.selection)?);

        let _guard = self.lock();
        let current = self.routes.load();
        if current.contains_key(&route.path) {
            return Err(RouteError::DuplicateRoute(route.id.clone()));
        }
        let handle = self.publish(&current, route);
        info!(route = %handle.id, path = %handle.path, downstream = %handle.downstream_url, "route added");
        Ok(handle)
    }

    /// Build a route and swap it in, replacing the active route with the
    /// same id. Only the broker endpoint that owns the active route may
    /// replace it; a route from another broker endpoint that happens to
    /// share the name is `DuplicateRoute`.
    pub fn replace_route(&self, config: &EndpointConfig) -> Result<RouteHandle, RouteError> {
        let route = Arc::new(config_to_route(config, self.selection)?);

        let _guard = self.lock();
        let current = self.routes.load();
        let replaced = match current.get(&route.path) {
            Some(active) if active.broker_endpoint_id != route.broker_endpoint_id => {
                warn!(
                    route = %route.id,
                    owner = active.broker_endpoint_id,
                    requested_by = route.broker_endpoint_id,
                    "route is owned by another broker endpoint"
                );
                return Err(RouteError::DuplicateRoute(route.id.clone()));
            }
            Some(_) => true,
            None => false,
        };
        let handle = self.publish(&current, route);
        info!(route = %handle.id, replaced, "route replaced");
        Ok(handle)
    }

    /// Deactivate a route. Requests already dispatched to it run to
    /// completion.
    pub fn remove_route(&self, route_id: &str) -> Option<RouteHandle> {
        let path = route_path(route_id);

        let _guard = self.lock();
        let current = self.routes.load();
        let removed = current.get(&path)?.handle();
        let mut next = RouteTable::clone(&current);
        next.remove(&path);
        self.routes.store(Arc::new(next));

        info!(route = %route_id, "route removed");
        Some(removed)
    }

    /// Match an inbound call. Never blocks on registration.
    pub fn resolve(&self, method: &Method, path: &str) -> Lookup {
        match self.routes.load().get(path) {
            Some(route) if route.method == *method => Lookup::Found(Arc::clone(route)),
            Some(route) => Lookup::MethodNotAllowed(route.method.clone()),
            None => Lookup::NotFound,
        }
    }

    pub fn get(&self, route_id: &str) -> Option<RouteHandle> {
        self.routes
            .load()
            .get(&route_path(route_id))
            .map(|route| route.handle())
    }

    /// Active routes, ordered by id.
    pub fn list(&self) -> Vec<RouteHandle> {
        let mut handles: Vec<RouteHandle> =
            self.routes.load().values().map(|r| r.handle()).collect();
        handles.sort_by(|a, b| a.id.cmp(&b.id));
        handles
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }

    fn publish(&self, current: &RouteTable, route: Arc<RouteDescriptor>) -> RouteHandle {
        let handle = route.handle();
        let mut next = current.clone();
        next.insert(route.path.clone(), route);
        self.routes.store(Arc::new(next));
        handle
    }

    // The guarded data is `()`, so a poisoned lock carries no broken state.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new(ResponseSelection::default())
    }
}
