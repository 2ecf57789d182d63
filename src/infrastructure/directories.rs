use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::{DirectoryConfig, PageConfig};

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub report_path: PathBuf,
    pub snapshot_path: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig, page: &PageConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;
    let db_path = data_dir.join(&cfg.db_filename);
    let report_path = data_dir.join(&page.report_filename);

    let probe_file = data_dir.join(".write-test");
    fs::write(&probe_file, b"ok")
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;
    fs::remove_file(&probe_file)?;

    let snapshot_path = PathBuf::from(&page.snapshot_path);
    if !snapshot_path.is_file() {
        anyhow::bail!("page snapshot {} does not exist", snapshot_path.display());
    }

    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        db_path,
        report_path,
        snapshot_path,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {}", path))?;
    }
    Ok(dir.canonicalize().unwrap_or(dir))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn configs(root: &std::path::Path, snapshot: &std::path::Path) -> (DirectoryConfig, PageConfig) {
        (
            DirectoryConfig {
                logs_dir: root.join("logs").display().to_string(),
                data_dir: root.join("nested/data").display().to_string(),
                db_filename: "marker.db".to_string(),
            },
            PageConfig {
                snapshot_path: snapshot.display().to_string(),
                base_url: "https://www.wanted.co.kr/wdlist".to_string(),
                poll_interval: Duration::from_secs(1),
                report_filename: "marked.html".to_string(),
                run_once: true,
            },
        )
    }

    #[test]
    fn creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let snapshot = root.path().join("page.html");
        fs::write(&snapshot, "<html></html>").unwrap();
        let (dirs, page) = configs(root.path(), &snapshot);

        let paths = ensure_directories(&dirs, &page).unwrap();
        assert!(paths.logs_dir.is_dir());
        assert!(paths.data_dir.is_dir());
        assert_eq!(paths.db_path, paths.data_dir.join("marker.db"));
        assert_eq!(paths.report_path, paths.data_dir.join("marked.html"));
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let (dirs, page) = configs(root.path(), &root.path().join("absent.html"));
        assert!(ensure_directories(&dirs, &page).is_err());
    }
}
