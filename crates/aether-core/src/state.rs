//! Shared application state for the server and the CLI.

use std::sync::Arc;

use crate::catalog::TaskCatalog;
use crate::config::CoreConfig;
use crate::db::Database;
use crate::events::{Broadcaster, EventBus};
use crate::flow::{FlowExecutor, InvokerRegistry};
use crate::prober::LivenessProber;
use crate::registry::AgentRegistry;
use crate::store::{AgentStore, FlowStore, TaskStore};

/// Shared application state, accessible from all handlers and commands.
pub struct AppStateInner {
    pub registry: AgentRegistry,
    pub catalog: TaskCatalog,
    pub flow_store: FlowStore,
    pub executor: FlowExecutor,
    pub prober: LivenessProber,
    pub broadcaster: Broadcaster,
}

impl AppStateInner {
    /// Wire every component over one database, with the HTTP invoker for
    /// `endpoint` tasks.
    pub fn new(db: Database, config: CoreConfig) -> Self {
        let client = reqwest::Client::new();
        let invokers = InvokerRegistry::with_http(client, config.executor.step_timeout);
        Self::with_invokers(db, config, invokers)
    }

    /// Same as `new`, with caller-supplied invokers.
    pub fn with_invokers(db: Database, config: CoreConfig, invokers: InvokerRegistry) -> Self {
        let agent_store = AgentStore::new(db.clone());
        let task_store = TaskStore::new(db.clone());
        let flow_store = FlowStore::new(db);

        let registry = AgentRegistry::new(agent_store.clone(), EventBus::new());
        let catalog = TaskCatalog::new(task_store.clone(), agent_store, flow_store.clone());
        let executor = FlowExecutor::new(
            flow_store.clone(),
            task_store,
            registry.clone(),
            invokers,
            config.executor,
        );
        let prober = LivenessProber::new(registry.clone(), config.prober);
        let broadcaster = Broadcaster::new(registry.clone());

        Self {
            registry,
            catalog,
            flow_store,
            executor,
            prober,
            broadcaster,
        }
    }
}

pub type AppState = Arc<AppStateInner>;
