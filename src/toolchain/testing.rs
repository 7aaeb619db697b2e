//! Scripted command runner for unit tests

use crate::toolchain::runner::{CommandOutput, CommandRunner, Invocation, InvokeError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

type Handler = dyn Fn(&Invocation) -> Result<CommandOutput, InvokeError> + Send + Sync;

/// Records every invocation and answers it with a closure
pub(crate) struct ScriptedRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&Invocation) -> Result<CommandOutput, InvokeError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations whose program or first argument matches `needle`
    pub(crate) fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == needle || c.args.first().is_some_and(|a| a == needle))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvokeError> {
        self.calls.lock().unwrap().push(invocation.clone());
        (self.handler)(invocation)
    }
}

/// A spawn failure shaped like a missing executable
pub(crate) fn not_found(invocation: &Invocation) -> InvokeError {
    InvokeError::Spawn {
        command: invocation.command_line(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
    }
}
