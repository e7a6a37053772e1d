//! Dispatch core: the six CRUD entry points of a [`Resource`].
//!
//! Each entry point composes the same three steps: the pre-hook chain, the
//! handler (override or default) and the post-hook chain. All of them wait
//! for resource initialization first.

use restkit_core::{DispatchResult, OperationKind, Phase};
use tracing::debug;

use super::handlers::DefaultHandler;
use super::operation::Operation;
use crate::resource::Resource;

impl Resource {
    /// Runs the hook chain for `phase` that matches the operation's kind.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the resource failed to initialize,
    /// or the first hook error.
    pub async fn execute_hooks(&self, phase: Phase, op: Operation) -> DispatchResult<Operation> {
        self.ready().await?;
        self.hooks().run(phase, op).await
    }

    /// Invokes the override installed for the operation's kind, passing it
    /// `default`, or calls `default` directly when there is none.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the resource failed to initialize,
    /// or the handler's error.
    pub async fn execute_handler(
        &self,
        op: Operation,
        default: DefaultHandler,
    ) -> DispatchResult<Operation> {
        self.ready().await?;
        match self.handlers().get(op.kind()) {
            Some(handler) => handler(op, default).await,
            None => default.call(op).await,
        }
    }

    async fn run(&self, op: Operation) -> DispatchResult<Operation> {
        let default = DefaultHandler::for_kind(op.kind());
        let op = self.execute_hooks(Phase::Pre, op).await?;
        let op = self.execute_handler(op, default).await?;
        self.execute_hooks(Phase::Post, op).await
    }

    /// # Errors
    ///
    /// See [`Resource::dispatch`].
    pub async fn read(&self, op: Operation) -> DispatchResult<Operation> {
        debug!(resource = %self.key(), id = ?op.id(), "Handling read");
        self.run(op).await
    }

    /// # Errors
    ///
    /// See [`Resource::dispatch`].
    pub async fn list(&self, op: Operation) -> DispatchResult<Operation> {
        debug!(resource = %self.key(), "Handling list");
        self.run(op).await
    }

    /// # Errors
    ///
    /// See [`Resource::dispatch`].
    pub async fn create(&self, op: Operation) -> DispatchResult<Operation> {
        debug!(resource = %self.key(), "Handling create");
        self.run(op).await
    }

    /// # Errors
    ///
    /// See [`Resource::dispatch`].
    pub async fn update(&self, op: Operation) -> DispatchResult<Operation> {
        debug!(resource = %self.key(), id = ?op.id(), "Handling update");
        self.run(op).await
    }

    /// # Errors
    ///
    /// See [`Resource::dispatch`].
    pub async fn patch(&self, op: Operation) -> DispatchResult<Operation> {
        debug!(resource = %self.key(), id = ?op.id(), "Handling patch");
        self.run(op).await
    }

    /// # Errors
    ///
    /// See [`Resource::dispatch`].
    pub async fn remove(&self, op: Operation) -> DispatchResult<Operation> {
        debug!(resource = %self.key(), id = ?op.id(), "Handling remove");
        self.run(op).await
    }

    /// Routes the operation to the entry point for its kind.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the resource failed to initialize,
    /// otherwise the first error raised by a hook, the handler or the backend.
    pub async fn dispatch(&self, op: Operation) -> DispatchResult<Operation> {
        match op.kind() {
            OperationKind::Read => self.read(op).await,
            OperationKind::List => self.list(op).await,
            OperationKind::Create => self.create(op).await,
            OperationKind::Update => self.update(op).await,
            OperationKind::Patch => self.patch(op).await,
            OperationKind::Remove => self.remove(op).await,
        }
    }
}
