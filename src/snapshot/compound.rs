//! Sequential composition

use super::Snapshotter;
use crate::error::DockenvResult;
use crate::hash::ContentHasher;
use crate::orchestration::Backend;

/// Applies its members in order, each to the previous member's output
#[derive(Debug, Clone, Default)]
pub struct CompoundSnapshotter {
    members: Vec<Snapshotter>,
}

impl CompoundSnapshotter {
    pub fn new(members: Vec<Snapshotter>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[Snapshotter] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Snapshotter> {
        self.members
    }

    pub fn comment(&self) -> String {
        self.members
            .iter()
            .map(Snapshotter::comment)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn update_hash(&self, hasher: &mut ContentHasher) -> DockenvResult<()> {
        hasher.count(self.members.len() as u64);
        for member in &self.members {
            member.update_hash(hasher)?;
        }
        Ok(())
    }

    pub(crate) async fn apply(&self, backend: Backend<'_>, image: &str) -> DockenvResult<String> {
        let mut current = image.to_string();
        for member in &self.members {
            current = member.apply(backend, &current).await?;
        }
        Ok(current)
    }
}
