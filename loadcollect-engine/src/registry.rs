//! Typed task dispatch: task specs name a capability by a stable key, the registry
//! maps each capability to the constructor that builds it.

use async_trait::async_trait;
use loadcollect_common::{CollectError, CollectInputs, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Span;

use crate::context::ExecutionContext;
use crate::orchestrator::Collector;

/// Capabilities a task spec can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    MetricsCollect,
}

impl TaskKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "metrics/collect" => Some(TaskKind::MetricsCollect),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            TaskKind::MetricsCollect => "metrics/collect",
        }
    }
}

/// One entry of an action, as written in the experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task: String,
    #[serde(default)]
    pub with: serde_json::Value,
}

#[async_trait]
pub trait Task: Send + Sync {
    fn kind(&self) -> TaskKind;

    async fn run(&self, ctx: &ExecutionContext) -> Result<()>;
}

/// Builds a task from the spec's `with` block.
pub type TaskConstructor = Arc<dyn Fn(serde_json::Value) -> Result<Box<dyn Task>> + Send + Sync>;

#[derive(Default)]
pub struct TaskRegistry {
    constructors: HashMap<TaskKind, TaskConstructor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each kind may be registered once.
    pub fn register(&mut self, kind: TaskKind, constructor: TaskConstructor) -> Result<()> {
        if self.constructors.contains_key(&kind) {
            return Err(CollectError::Config(format!(
                "task {} is already registered",
                kind.as_name()
            )));
        }
        self.constructors.insert(kind, constructor);
        Ok(())
    }

    pub fn is_registered(&self, kind: TaskKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn build(&self, spec: &TaskSpec) -> Result<Box<dyn Task>> {
        let kind = TaskKind::from_name(&spec.task)
            .ok_or_else(|| CollectError::Config(format!("unknown task: {}", spec.task)))?;
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| CollectError::Config(format!("task {} is not registered", spec.task)))?;
        constructor(spec.with.clone())
    }

    /// Build every task of an action up front, so a bad spec fails before
    /// anything runs.
    pub fn build_action(&self, specs: &[TaskSpec], span: Span) -> Result<Action> {
        let tasks = specs.iter().map(|spec| self.build(spec)).collect::<Result<Vec<_>>>()?;
        Ok(Action { tasks, span })
    }
}

/// An ordered list of tasks, run one after another.
pub struct Action {
    tasks: Vec<Box<dyn Task>>,
    span: Span,
}

impl Action {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stops at the first failing task and returns its error unchanged.
    pub async fn run(&self, ctx: &ExecutionContext) -> Result<()> {
        for (index, task) in self.tasks.iter().enumerate() {
            tracing::info!(parent: &self.span, index, task = task.kind().as_name(), "Running task");
            if let Err(e) = task.run(ctx).await {
                tracing::error!(parent: &self.span, index, task = task.kind().as_name(), error = %e, "Task failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

/// A `metrics/collect` task bound to the collector that will execute it.
pub struct CollectTask {
    collector: Arc<Collector>,
    inputs: CollectInputs,
}

impl CollectTask {
    /// Decode and check the task's inputs once, at build time.
    pub fn from_value(collector: Arc<Collector>, with: serde_json::Value) -> Result<Self> {
        let inputs = CollectInputs::from_value(with)?;
        inputs.validate()?;
        Ok(Self { collector, inputs })
    }

    pub fn inputs(&self) -> &CollectInputs {
        &self.inputs
    }
}

#[async_trait]
impl Task for CollectTask {
    fn kind(&self) -> TaskKind {
        TaskKind::MetricsCollect
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<()> {
        self.collector.collect(ctx, self.inputs.clone()).await.map(|_| ())
    }
}

/// Register `metrics/collect`, backed by `collector`.
pub fn register_collect(registry: &mut TaskRegistry, collector: Arc<Collector>) -> Result<()> {
    let constructor: TaskConstructor = Arc::new(move |with: serde_json::Value| -> Result<Box<dyn Task>> {
        let task = CollectTask::from_value(Arc::clone(&collector), with)?;
        Ok(Box::new(task) as Box<dyn Task>)
    });
    registry.register(TaskKind::MetricsCollect, constructor)
}
