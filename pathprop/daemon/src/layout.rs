//! Pin directory layout
//!
//! Maps of one pod are pinned together under `<pin root>/<pod identity>`,
//! where the pod identity is the cgroup name cut at its first `.`
//! (`pod1b2c.slice` -> `pod1b2c`).

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Pod identity of a cgroup name
pub fn pod_identity(cgroup: &str) -> Result<String> {
    let name = cgroup.trim_matches('/');
    let pod = match name.find('.') {
        Some(dot) => &name[..dot],
        None => name,
    };
    if pod.is_empty() {
        bail!("Cannot derive a pod identity from cgroup {:?}", cgroup);
    }
    Ok(pod.to_string())
}

/// Filesystem locations used by one loader instance
#[derive(Debug, Clone)]
pub struct PinLayout {
    pod: String,
    pin_dir: PathBuf,
    cgroup_path: PathBuf,
}

impl PinLayout {
    /// Resolve the layout for `cgroup`
    ///
    /// # Arguments
    ///
    /// * `pin_root` - bpffs directory (usually /sys/fs/bpf)
    /// * `cgroup_root` - cgroup v2 mount point
    /// * `cgroup` - cgroup name relative to `cgroup_root`
    pub fn new(pin_root: &Path, cgroup_root: &Path, cgroup: &str) -> Result<Self> {
        let pod = pod_identity(cgroup)?;
        Ok(Self {
            pin_dir: pin_root.join(&pod),
            cgroup_path: cgroup_root.join(cgroup.trim_start_matches('/')),
            pod,
        })
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    pub fn pin_dir(&self) -> &Path {
        &self.pin_dir
    }

    pub fn cgroup_path(&self) -> &Path {
        &self.cgroup_path
    }

    /// Pinned path of map `name`
    pub fn map_path(&self, name: &str) -> PathBuf {
        self.pin_dir.join(name)
    }

    /// Create the pin directory if needed
    pub fn ensure_pin_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.pin_dir)
            .with_context(|| format!("Failed to create pin directory: {:?}", self.pin_dir))
    }

    /// Remove every pinned map of the pod
    pub fn remove(&self) -> Result<()> {
        std::fs::remove_dir_all(&self.pin_dir)
            .with_context(|| format!("Failed to remove pin directory: {:?}", self.pin_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathprop_common::constants::MAP_PATHS;

    #[test]
    fn test_pod_identity_stops_at_first_dot() {
        assert_eq!(pod_identity("pod1b2c.slice").unwrap(), "pod1b2c");
        assert_eq!(pod_identity("a.b.c").unwrap(), "a");
        assert_eq!(pod_identity("plain").unwrap(), "plain");
        assert_eq!(pod_identity("/kubepods/pod9.scope").unwrap(), "kubepods/pod9");
    }

    #[test]
    fn test_pod_identity_rejects_empty_names() {
        assert!(pod_identity("").is_err());
        assert!(pod_identity(".slice").is_err());
    }

    #[test]
    fn test_layout_paths() {
        let layout = PinLayout::new(
            Path::new("/sys/fs/bpf"),
            Path::new("/sys/fs/cgroup/unified"),
            "pod77.slice",
        )
        .unwrap();

        assert_eq!(layout.pod(), "pod77");
        assert_eq!(layout.pin_dir(), Path::new("/sys/fs/bpf/pod77"));
        assert_eq!(
            layout.cgroup_path(),
            Path::new("/sys/fs/cgroup/unified/pod77.slice")
        );
        assert_eq!(
            layout.map_path(MAP_PATHS),
            PathBuf::from("/sys/fs/bpf/pod77/path_map")
        );
    }

    #[test]
    fn test_ensure_and_remove_pin_dir() {
        let root = tempfile::tempdir().unwrap();
        let layout = PinLayout::new(root.path(), root.path(), "pod5.slice").unwrap();

        layout.ensure_pin_dir().unwrap();
        std::fs::write(layout.map_path("svc_id"), b"").unwrap();
        assert!(layout.pin_dir().is_dir());

        layout.remove().unwrap();
        assert!(!layout.pin_dir().exists());
    }

    #[test]
    fn test_remove_missing_dir_reports_path() {
        let root = tempfile::tempdir().unwrap();
        let layout = PinLayout::new(root.path(), root.path(), "gone").unwrap();

        let err = layout.remove().unwrap_err();
        assert!(format!("{:#}", err).contains("gone"));
    }
}
