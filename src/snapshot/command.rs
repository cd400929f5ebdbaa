//! Single-command steps

use crate::context::Context;
use crate::error::DockenvResult;
use crate::hash::ContentHasher;
use crate::orchestration::Backend;
use crate::runner::Runner;

/// Runs `cmd` with the context mounted and commits the container
#[derive(Debug, Clone)]
pub struct CommandSnapshotter {
    cmd: Vec<String>,
    context: Context,
    runner: Runner,
    comment: String,
}

impl CommandSnapshotter {
    pub fn new(cmd: Vec<String>, context: Context, runner: Runner) -> Self {
        let comment = cmd.join(" ");
        Self {
            cmd,
            context,
            runner,
            comment,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub(crate) fn update_hash(&self, hasher: &mut ContentHasher) -> DockenvResult<()> {
        hasher.args(&self.cmd);
        self.context.update_hash(hasher)
    }

    pub(crate) async fn apply(&self, backend: Backend<'_>, image: &str) -> DockenvResult<String> {
        let runner = self.runner.with_mounts(self.context.mounts("/")?);
        runner.snapshot(backend.runtime, image, &self.cmd, None).await
    }
}
