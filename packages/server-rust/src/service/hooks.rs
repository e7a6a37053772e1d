//! Hook engine: priority-ordered pre/post chains per operation kind.
//!
//! Hooks are declared with an operation kind and a priority (default 5,
//! lower runs first). [`HookSetBuilder::build`] partitions them into a fixed
//! `phase x kind` table, each chain sorted stably so equal priorities keep
//! declaration order. Running a chain folds the operation through each hook
//! in turn; a hook only starts after the previous one has returned.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use restkit_core::{DispatchResult, OperationKind, Phase, DEFAULT_HOOK_PRIORITY};
use tracing::trace;

use super::operation::Operation;

/// Boxed hook body.
pub type HookFn = Arc<dyn Fn(Operation) -> BoxFuture<'static, DispatchResult<Operation>> + Send + Sync>;

/// A function bound to an operation kind and a priority.
#[derive(Clone)]
pub struct Hook {
    kind: OperationKind,
    priority: u32,
    func: HookFn,
}

impl Hook {
    /// Creates a hook with the default priority.
    pub fn new<F, Fut>(kind: OperationKind, func: F) -> Self
    where
        F: Fn(Operation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Operation>> + Send + 'static,
    {
        Self {
            kind,
            priority: DEFAULT_HOOK_PRIORITY,
            func: Arc::new(move |op| Box::pin(func(op))),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Runs the hook body.
    ///
    /// # Errors
    ///
    /// Returns whatever the hook body rejects with.
    pub async fn call(&self, op: Operation) -> DispatchResult<Operation> {
        (self.func)(op).await
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Collects hooks in declaration order.
#[derive(Debug, Default, Clone)]
pub struct HookSetBuilder {
    pre: Vec<Hook>,
    post: Vec<Hook>,
}

impl HookSetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, phase: Phase, hook: Hook) -> &mut Self {
        match phase {
            Phase::Pre => self.pre.push(hook),
            Phase::Post => self.post.push(hook),
        }
        self
    }

    /// Freezes the hooks into per-kind chains sorted by priority.
    #[must_use]
    pub fn build(self) -> HookSet {
        HookSet {
            pre: partition(self.pre),
            post: partition(self.post),
        }
    }
}

type Chains = [Vec<Hook>; OperationKind::COUNT];

fn partition(hooks: Vec<Hook>) -> Chains {
    let mut chains: Chains = std::array::from_fn(|_| Vec::new());
    for hook in hooks {
        chains[hook.kind.index()].push(hook);
    }
    // `sort_by_key` is stable: equal priorities keep declaration order.
    for chain in &mut chains {
        chain.sort_by_key(Hook::priority);
    }
    chains
}

/// Immutable hook chains of a resource.
#[derive(Debug, Default, Clone)]
pub struct HookSet {
    pre: Chains,
    post: Chains,
}

impl HookSet {
    /// The ordered chain for a phase and kind.
    #[must_use]
    pub fn chain(&self, phase: Phase, kind: OperationKind) -> &[Hook] {
        let chains = match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        };
        &chains[kind.index()]
    }

    /// Total number of hooks across both phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pre.iter().chain(self.post.iter()).map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Folds the operation through the chain matching its kind.
    ///
    /// # Errors
    ///
    /// Stops at the first hook that fails and returns its error.
    pub async fn run(&self, phase: Phase, mut op: Operation) -> DispatchResult<Operation> {
        for hook in self.chain(phase, op.kind()) {
            trace!(
                phase = phase.as_str(),
                operation = %op.kind(),
                priority = hook.priority,
                "running hook"
            );
            op = hook.call(op).await?;
        }
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use restkit_core::{DispatchError, RequestContext};

    use super::*;
    use crate::resource::testing::{memory_resource, resource_with_hooks};

    fn recording(kind: OperationKind, tag: impl Into<String>, log: &Arc<Mutex<Vec<String>>>) -> Hook {
        let log = Arc::clone(log);
        let tag = tag.into();
        Hook::new(kind, move |op| {
            let log = Arc::clone(&log);
            let tag = tag.clone();
            async move {
                log.lock().push(tag);
                Ok(op)
            }
        })
    }

    #[test]
    fn chains_are_filtered_by_kind_and_sorted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = HookSetBuilder::new();
        builder
            .add(Phase::Pre, recording(OperationKind::Create, "c10", &log).with_priority(10))
            .add(Phase::Pre, recording(OperationKind::Read, "r", &log))
            .add(Phase::Pre, recording(OperationKind::Create, "c1", &log).with_priority(1))
            .add(Phase::Post, recording(OperationKind::Create, "post", &log));
        let set = builder.build();

        let priorities: Vec<u32> = set
            .chain(Phase::Pre, OperationKind::Create)
            .iter()
            .map(Hook::priority)
            .collect();
        assert_eq!(priorities, vec![1, 10]);
        assert_eq!(set.chain(Phase::Pre, OperationKind::Read).len(), 1);
        assert_eq!(set.chain(Phase::Post, OperationKind::Create).len(), 1);
        assert!(set.chain(Phase::Post, OperationKind::Remove).is_empty());
        assert_eq!(set.len(), 4);
    }

    #[tokio::test]
    async fn run_folds_in_priority_order_and_threads_the_operation() {
        let mut builder = HookSetBuilder::new();
        builder
            .add(
                Phase::Pre,
                Hook::new(OperationKind::Create, |mut op: Operation| async move {
                    if let Some(payload) = op.payload_mut() {
                        payload["seen"] = serde_json::json!(["ten"]);
                    }
                    Ok(op)
                })
                .with_priority(10),
            )
            .add(
                Phase::Pre,
                Hook::new(OperationKind::Create, |op: Operation| async move {
                    Ok(op.with_payload(serde_json::json!({"seen": ["one"]})))
                })
                .with_priority(1),
            );
        let set = builder.build();

        let resource = memory_resource("widgets");
        let op = Operation::new(resource, OperationKind::Create, RequestContext::default());
        let op = set.run(Phase::Pre, op).await.unwrap();
        assert_eq!(op.payload(), Some(&serde_json::json!({"seen": ["ten"]})));
    }

    #[tokio::test]
    async fn run_stops_at_the_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = HookSetBuilder::new();
        builder
            .add(
                Phase::Pre,
                Hook::new(OperationKind::Read, |_op: Operation| async move {
                    Err(DispatchError::rejected(403, "forbidden"))
                })
                .with_priority(1),
            )
            .add(Phase::Pre, recording(OperationKind::Read, "after", &log).with_priority(2));
        let set = builder.build();

        let op = Operation::new(memory_resource("widgets"), OperationKind::Read, RequestContext::default());
        let err = set.run(Phase::Pre, op).await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn resource_hooks_wait_for_initialization() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = HookSetBuilder::new();
        builder.add(Phase::Pre, recording(OperationKind::List, "list", &log));
        let resource = resource_with_hooks("widgets", builder);

        let op = Operation::new(Arc::clone(&resource), OperationKind::List, RequestContext::default());
        resource.execute_hooks(Phase::Pre, op).await.unwrap();
        assert_eq!(resource.state(), crate::resource::InitState::Ready);
        assert_eq!(*log.lock(), vec!["list".to_string()]);
    }

    proptest! {
        #[test]
        fn chains_are_stably_sorted(priorities in proptest::collection::vec(0u32..8, 0..24)) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut builder = HookSetBuilder::new();
            for (position, priority) in priorities.iter().enumerate() {
                builder.add(
                    Phase::Pre,
                    recording(OperationKind::Update, position.to_string(), &log)
                        .with_priority(*priority),
                );
            }
            let set = builder.build();
            let chain = set.chain(Phase::Pre, OperationKind::Update);

            let mut expected: Vec<(u32, usize)> =
                priorities.iter().copied().zip(0..).collect();
            expected.sort_by_key(|(priority, _)| *priority);

            let observed: Vec<u32> = chain.iter().map(Hook::priority).collect();
            let expected_priorities: Vec<u32> = expected.iter().map(|(p, _)| *p).collect();
            prop_assert_eq!(observed, expected_priorities);

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let op = Operation::new(memory_resource("widgets"), OperationKind::Update, RequestContext::default());
            runtime.block_on(set.run(Phase::Pre, op)).unwrap();
            let ran: Vec<usize> = log.lock().iter().map(|tag| tag.parse().unwrap()).collect();
            let expected_order: Vec<usize> = expected.iter().map(|(_, position)| *position).collect();
            prop_assert_eq!(ran, expected_order);
        }
    }
}
