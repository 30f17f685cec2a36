use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{FailureKind, WorkflowError};
use crate::provider::Provider;
use crate::tool::Outcome;

/// Accumulating state threaded through a workflow run. Each stage's
/// contribution lands under a key namespaced by its provider name, so later
/// stages can read everything written before them and nothing written after.
#[derive(Debug, Clone)]
pub struct Context {
    request: String,
    entries: BTreeMap<String, Outcome>,
}

impl Context {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            entries: BTreeMap::new(),
        }
    }

    /// The request that started this workflow run.
    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn get(&self, key: &str) -> Option<&Outcome> {
        self.entries.get(key)
    }

    /// Record a stage's contribution. Replacing an existing entry is legal
    /// (a provider run twice overwrites its own key) but never silent.
    pub fn record(&mut self, key: impl Into<String>, outcome: Outcome) {
        let key = key.into();
        if self.entries.insert(key.clone(), outcome).is_some() {
            warn!(%key, "context entry replaced");
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The contributions recorded so far, as a JSON object keyed by
    /// provider name. This is what leaf stages receive as their `context`
    /// argument.
    pub fn results(&self) -> Value {
        json!(self.entries)
    }

    /// Full serialized view, request included. The aggregate handed back to
    /// the workflow's caller.
    pub fn to_value(&self) -> Value {
        json!({
            "request": self.request,
            "results": self.entries,
        })
    }
}

/// A sequential child plus its failure policy. Stages default to non-fatal:
/// a failure is recorded in the context and the pipeline moves on.
pub struct Stage {
    node: Node,
    fatal: bool,
}

impl Stage {
    pub fn new(node: Node) -> Self {
        Self { node, fatal: false }
    }

    /// A fatal stage aborts the remainder of the sequence when it fails and
    /// surfaces the failure to the workflow's caller.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl From<Node> for Stage {
    fn from(node: Node) -> Self {
        Stage::new(node)
    }
}

/// One node of a workflow tree: a provider leaf, a concurrent fan-out, or
/// an ordered pipeline. The tree is acyclic and finite by construction.
pub enum Node {
    Leaf(Arc<Provider>),
    Parallel { name: String, children: Vec<Node> },
    Sequential { name: String, stages: Vec<Stage> },
}

impl Node {
    pub fn leaf(provider: Arc<Provider>) -> Node {
        Node::Leaf(provider)
    }

    /// A fan-out over `children`, all dispatched concurrently against the
    /// same snapshot of the incoming context. With no children there is no
    /// node at all; an empty combinator is absent from the workflow rather
    /// than a silent no-op.
    pub fn parallel(name: impl Into<String>, children: Vec<Node>) -> Option<Node> {
        let name = name.into();
        if children.is_empty() {
            warn!(combinator = %name, "no children available, dropping parallel stage");
            return None;
        }
        Some(Node::Parallel { name, children })
    }

    /// An ordered pipeline. Same absence rule as [`Node::parallel`].
    pub fn sequential(name: impl Into<String>, stages: Vec<Stage>) -> Option<Node> {
        let name = name.into();
        if stages.is_empty() {
            warn!(combinator = %name, "no stages available, dropping sequential stage");
            return None;
        }
        Some(Node::Sequential { name, stages })
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Leaf(provider) => provider.name(),
            Node::Parallel { name, .. } => name,
            Node::Sequential { name, .. } => name,
        }
    }

    /// Run the workflow, merging every contribution into `ctx`. The run only
    /// errors when a stage marked fatal fails; all other failures come back
    /// as `Failure` entries in the aggregate.
    pub async fn run(&self, mut ctx: Context) -> Result<Context, WorkflowError> {
        let delta = self.collect(&ctx).await?;
        for (key, outcome) in delta {
            ctx.record(key, outcome);
        }
        Ok(ctx)
    }

    /// Execute against a read-only view of `ctx`, returning the entries this
    /// subtree produced. Boxed because combinators recurse.
    fn collect<'a>(
        &'a self,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Vec<(String, Outcome)>, WorkflowError>> {
        match self {
            Node::Leaf(provider) => async move {
                let outcome = match provider.entry() {
                    Some(tool) => {
                        debug!(provider = %provider.name(), tool = %tool.name(), "dispatching workflow stage");
                        let args = json!({
                            "request": ctx.request(),
                            "context": ctx.results(),
                        });
                        tool.invoke(&args).await
                    }
                    None => Outcome::failure(
                        FailureKind::NotFound,
                        format!("provider `{}` exposes no tools", provider.name()),
                    ),
                };
                Ok(vec![(provider.name().to_string(), outcome)])
            }
            .boxed(),

            // Fail-soft fan-out: every child runs against the same snapshot,
            // the join waits for all of them, and one child's failure never
            // cancels or displaces a sibling's entry.
            Node::Parallel { children, .. } => async move {
                let settled = join_all(children.iter().map(|child| child.collect(ctx))).await;
                let mut merged = Vec::new();
                for result in settled {
                    merged.extend(result?);
                }
                Ok(merged)
            }
            .boxed(),

            Node::Sequential { stages, .. } => async move {
                let mut acc = ctx.clone();
                let mut produced = Vec::new();
                for stage in stages {
                    let delta = stage.node.collect(&acc).await?;
                    if stage.fatal {
                        if let Some((key, Outcome::Failure { message, .. })) =
                            delta.iter().find(|(_, o)| !o.is_success())
                        {
                            return Err(WorkflowError::FatalStage {
                                stage: key.clone(),
                                message: message.clone(),
                            });
                        }
                    }
                    for (key, outcome) in delta {
                        acc.record(key.clone(), outcome.clone());
                        produced.push((key, outcome));
                    }
                }
                Ok(produced)
            }
            .boxed(),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Leaf(p) => f.debug_tuple("Leaf").field(&p.name()).finish(),
            Node::Parallel { name, children } => f
                .debug_struct("Parallel")
                .field("name", name)
                .field("children", &children.iter().map(Node::name).collect::<Vec<_>>())
                .finish(),
            Node::Sequential { name, stages } => f
                .debug_struct("Sequential")
                .field("name", name)
                .field("stages", &stages.iter().map(|s| s.node.name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ParamKind, ParamSpec, Tool, ToolHandler};
    use async_trait::async_trait;

    struct Static(Outcome);

    #[async_trait]
    impl ToolHandler for Static {
        async fn call(&self, _args: &Value) -> Outcome {
            self.0.clone()
        }
    }

    /// Echoes back the context it was handed, so tests can observe exactly
    /// what a stage was allowed to see.
    struct Probe;

    #[async_trait]
    impl ToolHandler for Probe {
        async fn call(&self, args: &Value) -> Outcome {
            Outcome::success(args["context"].clone())
        }
    }

    fn fixed(name: &str, outcome: Outcome) -> Arc<Provider> {
        Arc::new(
            Provider::new(name, format!("{name} provider"), "").with_tool(Tool::new(
                "run",
                "Fixed outcome",
                vec![],
                Static(outcome),
            )),
        )
    }

    fn probe(name: &str) -> Arc<Provider> {
        Arc::new(
            Provider::new(name, format!("{name} probe"), "").with_tool(Tool::new(
                "observe",
                "Echoes visible context",
                vec![ParamSpec::optional("context", ParamKind::Object)],
                Probe,
            )),
        )
    }

    fn ok(name: &str) -> Arc<Provider> {
        fixed(name, Outcome::success(json!(format!("{name} output"))))
    }

    fn failing(name: &str) -> Arc<Provider> {
        fixed(
            name,
            Outcome::failure(FailureKind::Dependency, format!("{name} backend down")),
        )
    }

    #[tokio::test]
    async fn parallel_returns_one_entry_per_child_fail_soft() {
        let node = Node::parallel(
            "fanout",
            vec![
                Node::leaf(ok("a")),
                Node::leaf(failing("b")),
                Node::leaf(ok("c")),
            ],
        )
        .unwrap();

        let ctx = node.run(Context::new("req")).await.unwrap();
        assert_eq!(ctx.len(), 3);
        assert!(ctx.get("a").unwrap().is_success());
        assert_eq!(
            ctx.get("b").unwrap().failure_kind(),
            Some(FailureKind::Dependency)
        );
        assert!(ctx.get("c").unwrap().is_success());
    }

    #[tokio::test]
    async fn parallel_siblings_share_a_snapshot_not_each_other() {
        let node = Node::parallel(
            "fanout",
            vec![Node::leaf(probe("left")), Node::leaf(probe("right"))],
        )
        .unwrap();

        let mut seed = Context::new("req");
        seed.record("earlier", Outcome::success(json!("before the fanout")));

        let ctx = node.run(seed).await.unwrap();
        for name in ["left", "right"] {
            let seen = ctx.get(name).unwrap().value().unwrap();
            assert!(seen.get("earlier").is_some(), "{name} lost prior context");
            assert!(seen.get("left").is_none(), "{name} saw a sibling's output");
            assert!(seen.get("right").is_none(), "{name} saw a sibling's output");
        }
    }

    #[tokio::test]
    async fn sequential_context_is_forward_only() {
        let node = Node::sequential(
            "pipeline",
            vec![
                Node::leaf(ok("first")).into(),
                Node::leaf(probe("second")).into(),
                Node::leaf(probe("third")).into(),
            ],
        )
        .unwrap();

        let ctx = node.run(Context::new("req")).await.unwrap();

        let second_saw = ctx.get("second").unwrap().value().unwrap();
        assert_eq!(second_saw["first"]["value"], "first output");
        assert!(second_saw.get("third").is_none(), "second saw a later stage");

        let third_saw = ctx.get("third").unwrap().value().unwrap();
        assert!(third_saw.get("first").is_some());
        assert!(third_saw.get("second").is_some());
    }

    #[tokio::test]
    async fn sequential_failure_is_recorded_and_pipeline_continues() {
        let node = Node::sequential(
            "pipeline",
            vec![Node::leaf(failing("broken")).into(), Node::leaf(ok("after")).into()],
        )
        .unwrap();

        let ctx = node.run(Context::new("req")).await.unwrap();
        assert_eq!(
            ctx.get("broken").unwrap().failure_kind(),
            Some(FailureKind::Dependency)
        );
        assert!(ctx.get("after").unwrap().is_success());
    }

    #[tokio::test]
    async fn fatal_stage_aborts_the_remainder() {
        let node = Node::sequential(
            "pipeline",
            vec![
                Stage::new(Node::leaf(failing("gate"))).fatal(),
                Node::leaf(ok("unreached")).into(),
            ],
        )
        .unwrap();

        let err = node.run(Context::new("req")).await.unwrap_err();
        match err {
            WorkflowError::FatalStage { stage, message } => {
                assert_eq!(stage, "gate");
                assert!(message.contains("backend down"));
            }
        }
    }

    #[tokio::test]
    async fn nested_parallel_inside_sequential() {
        let fanout = Node::parallel(
            "planners",
            vec![Node::leaf(ok("x")), Node::leaf(failing("y"))],
        )
        .unwrap();
        let node = Node::sequential(
            "pipeline",
            vec![fanout.into(), Node::leaf(probe("tail")).into()],
        )
        .unwrap();

        let ctx = node.run(Context::new("req")).await.unwrap();
        assert_eq!(ctx.len(), 3);

        // The tail stage sees both fan-out results, success and failure alike.
        let tail_saw = ctx.get("tail").unwrap().value().unwrap();
        assert!(tail_saw.get("x").is_some());
        assert_eq!(tail_saw["y"]["status"], "failure");
    }

    #[tokio::test]
    async fn provider_run_twice_overwrites_its_own_key() {
        let node = Node::sequential(
            "pipeline",
            vec![
                Node::leaf(fixed("dup", Outcome::success(json!("first")))).into(),
                Node::leaf(fixed("dup", Outcome::success(json!("second")))).into(),
            ],
        )
        .unwrap();

        let ctx = node.run(Context::new("req")).await.unwrap();
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("dup").unwrap().value(), Some(&json!("second")));
    }

    #[test]
    fn empty_combinators_are_absent_not_noops() {
        assert!(Node::parallel("empty", vec![]).is_none());
        assert!(Node::sequential("empty", vec![]).is_none());
    }

    #[tokio::test]
    async fn toolless_provider_yields_not_found_entry() {
        let bare = Arc::new(Provider::new("bare", "", ""));
        let ctx = Node::leaf(bare).run(Context::new("req")).await.unwrap();
        assert_eq!(
            ctx.get("bare").unwrap().failure_kind(),
            Some(FailureKind::NotFound)
        );
    }
}
