pub mod breaker;
pub mod config;
pub mod error;
pub mod planner;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod store;
pub mod tool;
pub mod workflow;

pub use breaker::{Breaker, BreakerState};
pub use config::{AppConfig, FlightConfig, MailConfig, MapsConfig};
pub use error::{FailureKind, WorkflowError};
pub use planner::{dispatch, KeywordPlanner, Planner, PlannerError, ToolCall};
pub use provider::{Provider, ProviderManifest};
pub use registry::{LoadError, ProviderSpec, Registry};
pub use store::{Notification, NotificationStore, PreferenceStore, Priority, StoreError};
pub use tool::{Outcome, ParamKind, ParamSpec, Tool, ToolHandler};
pub use workflow::{Context, Node, Stage};

/// The assistant's standard pipeline: trip planning fans out in parallel,
/// then the remaining providers run in order, each seeing everything
/// recorded before it. Built from whichever providers actually loaded: a
/// missing provider shrinks the workflow instead of breaking it, and an
/// empty fan-out is dropped entirely rather than kept as a no-op stage.
pub fn default_workflow(registry: &Registry) -> Option<Node> {
    let planners = Node::parallel(
        "trip_planners",
        ["flight", "commute"]
            .iter()
            .filter_map(|name| registry.get(name))
            .map(Node::leaf)
            .collect(),
    );

    let mut stages: Vec<Stage> = Vec::new();
    if let Some(fanout) = planners {
        stages.push(fanout.into());
    }
    for name in ["notification", "critic", "email", "knowledge", "memory", "wellness"] {
        if let Some(provider) = registry.get(name) {
            stages.push(Node::leaf(provider).into());
        }
    }

    Node::sequential("assistant_workflow", stages)
}
