//! Handler registry: owner of all handler instances
//!
//! Constructed explicitly at startup and shared as an `Arc`. It owns the
//! coordinator (wrapped in its own [`ManagedHandler`]) and the [`HandlerTable`]
//! the coordinator routes over, so a handler registered here is immediately
//! routable and an unregistered one immediately is not.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::coordinator::{Coordinator, COORDINATOR_ID};
use crate::handler::{ActivityLogger, HandlerSnapshot, ManagedHandler, TaskHandler};
use crate::routing::{RoutingCandidate, RoutingOracle};
use crate::task::{ExecutionContext, HandlerResponse, Task};

/// Shared name -> handler map
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: Arc<RwLock<HashMap<String, Arc<ManagedHandler>>>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by handler id, returning the replaced entry
    pub fn insert(&self, handler: Arc<ManagedHandler>) -> Option<Arc<ManagedHandler>> {
        let id = handler.id().to_string();
        self.write().insert(id, handler)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ManagedHandler>> {
        self.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagedHandler>> {
        self.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Handler names in ascending order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Handlers in ascending id order
    pub fn handlers(&self) -> Vec<Arc<ManagedHandler>> {
        let mut handlers: Vec<Arc<ManagedHandler>> = self.read().values().cloned().collect();
        handlers.sort_by(|a, b| a.id().cmp(b.id()));
        handlers
    }

    /// Routing candidates in ascending name order
    pub fn candidates(&self) -> Vec<RoutingCandidate> {
        self.handlers()
            .iter()
            .map(|h| RoutingCandidate::new(h.id(), h.handler().description()))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ManagedHandler>>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ManagedHandler>>> {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Aggregate health over the coordinator and every registered handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemHealth {
    pub total_handlers: usize,
    pub active_handlers: usize,
    pub healthy_handlers: usize,
    pub average_response_time_ms: f64,
    pub total_requests: u64,
    pub success_rate: f64,
}

impl SystemHealth {
    pub fn all_healthy(&self) -> bool {
        self.healthy_handlers == self.total_handlers
    }
}

pub struct HandlerRegistry {
    coordinator: Arc<ManagedHandler>,
    table: HandlerTable,
    activity: ActivityLogger,
}

impl HandlerRegistry {
    pub fn new(oracle: Arc<dyn RoutingOracle>, activity: ActivityLogger) -> Self {
        let table = HandlerTable::new();
        let coordinator = Coordinator::new(table.clone(), oracle);
        let coordinator = Arc::new(ManagedHandler::new(
            Arc::new(coordinator),
            activity.clone(),
        ));

        Self {
            coordinator,
            table,
            activity,
        }
    }

    /// Register a handler, replacing any handler with the same id
    pub fn register_handler(&self, handler: Arc<dyn TaskHandler>) -> Option<Arc<ManagedHandler>> {
        let id = handler.id().to_string();
        if id == COORDINATOR_ID {
            warn!("Registering a handler under the coordinator's id");
        }

        let managed = Arc::new(ManagedHandler::new(handler, self.activity.clone()));
        let replaced = self.table.insert(managed);
        if replaced.is_some() {
            info!(handler_id = %id, "Replaced handler");
        } else {
            info!(handler_id = %id, "Registered handler");
        }
        replaced
    }

    pub fn unregister_handler(&self, name: &str) -> bool {
        let removed = self.table.remove(name).is_some();
        debug!(handler_id = %name, removed, "Unregister handler");
        removed
    }

    pub fn get_handler(&self, name: &str) -> Option<Arc<ManagedHandler>> {
        self.table.get(name)
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.table.names()
    }

    pub fn coordinator(&self) -> &Arc<ManagedHandler> {
        &self.coordinator
    }

    /// Single dispatch entry point; never fails, failures come back as responses
    pub async fn execute_task(
        &self,
        task: &Task,
        context: Option<&ExecutionContext>,
    ) -> HandlerResponse {
        self.coordinator.execute(task, context).await
    }

    fn components(&self) -> Vec<Arc<ManagedHandler>> {
        let mut components = vec![Arc::clone(&self.coordinator)];
        components.extend(self.table.handlers());
        components
    }

    pub fn get_system_health(&self) -> SystemHealth {
        let components = self.components();
        let mut health = SystemHealth {
            total_handlers: components.len(),
            active_handlers: 0,
            healthy_handlers: 0,
            average_response_time_ms: 0.0,
            total_requests: 0,
            success_rate: 1.0,
        };

        let mut errors = 0u64;
        let mut response_time_sum = 0.0;
        for component in &components {
            let (status, metrics) = component.status_and_metrics();
            if status.active {
                health.active_handlers += 1;
            }
            if status.healthy {
                health.healthy_handlers += 1;
            }
            health.total_requests += metrics.total_requests;
            errors += metrics.error_count;
            response_time_sum += metrics.average_response_time_ms;
        }

        if !components.is_empty() {
            health.average_response_time_ms = response_time_sum / components.len() as f64;
        }
        if health.total_requests > 0 {
            health.success_rate = health.total_requests.saturating_sub(errors) as f64
                / health.total_requests as f64;
        }
        health
    }

    /// Run every component's health check, keyed by component id
    pub fn health_check_all(&self) -> BTreeMap<String, bool> {
        self.components()
            .iter()
            .map(|component| (component.id().to_string(), component.health_check()))
            .collect()
    }

    /// Snapshots of the coordinator followed by every handler
    pub fn handler_snapshots(&self) -> Vec<HandlerSnapshot> {
        self.components()
            .iter()
            .map(|component| component.snapshot())
            .collect()
    }
}
