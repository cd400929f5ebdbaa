//! Build contexts
//!
//! A context is the declared set of host files and directories a build step
//! may see, keyed by the path they appear at inside the container. Contexts
//! are values: adding an entry returns a new context, so a base context
//! shared by several steps never picks up another step's mounts.

use crate::error::{DockenvError, DockenvResult};
use crate::hash::ContentHasher;
use crate::orchestration::{Mount, MountMode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A single declared input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    /// Host path (file or directory)
    pub source: PathBuf,
    /// Access mode inside the container
    pub mode: MountMode,
}

/// Target path -> host source, ordered by target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    entries: BTreeMap<String, ContextEntry>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a read-only context from `(target, source)` pairs.
    pub fn from_files<I, T, P>(files: I) -> DockenvResult<Self>
    where
        I: IntoIterator<Item = (T, P)>,
        T: Into<String>,
        P: Into<PathBuf>,
    {
        files
            .into_iter()
            .try_fold(Self::new(), |ctx, (target, source)| {
                ctx.with(target, source, MountMode::ReadOnly)
            })
    }

    /// Return a copy of this context with one more entry.
    ///
    /// A target that is already present is a configuration error.
    pub fn with(
        &self,
        target: impl Into<String>,
        source: impl Into<PathBuf>,
        mode: MountMode,
    ) -> DockenvResult<Self> {
        let target = target.into();
        let source = source.into();

        if let Some(existing) = self.entries.get(&target) {
            return Err(DockenvError::ContextConflict {
                target,
                existing: existing.source.clone(),
                new: source,
            });
        }

        let mut entries = self.entries.clone();
        entries.insert(target, ContextEntry { source, mode });
        Ok(Self { entries })
    }

    pub fn contains(&self, target: &str) -> bool {
        self.entries.contains_key(target)
    }

    pub fn get(&self, target: &str) -> Option<&ContextEntry> {
        self.entries.get(target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mounts placing every entry under `container_dir`.
    ///
    /// Absolute targets are mounted as-is. Host paths are made absolute
    /// against the current directory.
    pub fn mounts(&self, container_dir: &str) -> DockenvResult<Vec<Mount>> {
        self.entries
            .iter()
            .map(|(target, entry)| {
                let container_path = Path::new(container_dir)
                    .join(target)
                    .to_string_lossy()
                    .into_owned();
                Ok(Mount::bind(
                    absolute(&entry.source)?,
                    container_path,
                    entry.mode,
                ))
            })
            .collect()
    }

    /// Mix the full recursive content of this context into `hasher`.
    ///
    /// Entries are visited in target order; every source is read.
    pub fn update_hash(&self, hasher: &mut ContentHasher) -> DockenvResult<()> {
        for (target, entry) in &self.entries {
            hasher.frame_str(target);
            hasher.frame_str(entry.mode.as_str());
            hasher.path(&entry.source)?;
        }
        hasher.count(self.entries.len() as u64);
        Ok(())
    }
}

fn absolute(path: &Path) -> DockenvResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| DockenvError::io("getting current directory", e))?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn digest(ctx: &Context) -> crate::hash::Digest {
        let mut hasher = ContentHasher::new();
        ctx.update_hash(&mut hasher).unwrap();
        hasher.finish()
    }

    #[test]
    fn with_returns_new_value() {
        let base = Context::from_files([("a.sh", "/tmp/a.sh")]).unwrap();
        let extended = base
            .with("wrapper.sh", "/tmp/wrapper.sh", MountMode::ReadOnly)
            .unwrap();

        assert_eq!(base.len(), 1);
        assert!(!base.contains("wrapper.sh"));
        assert_eq!(extended.len(), 2);
        assert!(extended.contains("wrapper.sh"));
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let ctx = Context::from_files([("a.sh", "/tmp/a.sh")]).unwrap();
        let err = ctx.with("a.sh", "/tmp/other.sh", MountMode::ReadOnly).unwrap_err();

        match err {
            DockenvError::ContextConflict { target, existing, new } => {
                assert_eq!(target, "a.sh");
                assert_eq!(existing, PathBuf::from("/tmp/a.sh"));
                assert_eq!(new, PathBuf::from("/tmp/other.sh"));
            }
            other => panic!("expected ContextConflict, got {other:?}"),
        }
    }

    #[test]
    fn digest_ignores_insertion_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), "one").unwrap();
        fs::write(dir.path().join("b"), "two").unwrap();

        let ab = Context::from_files([("a", dir.path().join("a")), ("b", dir.path().join("b"))])
            .unwrap();
        let ba = Context::from_files([("b", dir.path().join("b")), ("a", dir.path().join("a"))])
            .unwrap();

        assert_eq!(digest(&ab), digest(&ba));
    }

    #[test]
    fn digest_tracks_target_mode_and_content() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("s.sh");
        fs::write(&script, "echo hi").unwrap();

        let base = Context::from_files([("s.sh", &script)]).unwrap();
        let renamed = Context::from_files([("t.sh", &script)]).unwrap();
        let writable = Context::new()
            .with("s.sh", &script, MountMode::ReadWrite)
            .unwrap();

        let original = digest(&base);
        assert_ne!(original, digest(&renamed));
        assert_ne!(original, digest(&writable));

        fs::write(&script, "echo ho").unwrap();
        assert_ne!(original, digest(&base));
    }

    #[test]
    fn digest_fails_on_missing_source() {
        let ctx = Context::from_files([("gone", "/definitely/not/here")]).unwrap();
        let mut hasher = ContentHasher::new();
        assert!(ctx.update_hash(&mut hasher).is_err());
    }

    #[test]
    fn mounts_join_targets() {
        let ctx = Context::from_files([("a.sh", "/src/a.sh"), ("/init_script", "/src/init.sh")])
            .unwrap();
        let mounts = ctx.mounts("/dockenv_context").unwrap();

        let args: Vec<String> = mounts.iter().map(Mount::volume_arg).collect();
        assert!(args.contains(&"/src/init.sh:/init_script:ro".to_string()));
        assert!(args.contains(&"/src/a.sh:/dockenv_context/a.sh:ro".to_string()));
    }
}
