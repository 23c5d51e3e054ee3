// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Layout
//
// One file per artifact inside the data directory:
//
// - `proxy_hosts.txt`: newline-delimited hostnames
// - `domain_ips.json`: JSON object, hostname → IPv4 string
// - `last_public_ip.txt`: raw IPv4 string
//
// ## Crash Recovery
//
// - Atomic writes: each artifact is written to a `.tmp` file and renamed
// - Backup: the previous version of each artifact is kept as `.backup`
// - Recovery: a corrupt artifact falls back to its backup
// - Degradation: if both are unusable the artifact loads empty, which makes
//   the next cycle behave like a first run for it

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::resolver::normalize_hostname;
use crate::traits::state_store::{DomainIpMap, DomainSet, StateSnapshot, StateStore};

/// Domain set artifact
pub const DOMAINS_FILE: &str = "proxy_hosts.txt";

/// Ledger artifact
pub const LEDGER_FILE: &str = "domain_ips.json";

/// Public IP artifact
pub const PUBLIC_IP_FILE: &str = "last_public_ip.txt";

/// File-based state store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use npmdns_core::state::FileStateStore;
/// use npmdns_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/npmdns").await?;
///
///     let mut snapshot = store.load().await?;
///     snapshot.public_ip = Some("203.0.113.7".parse()?);
///     store.save(&snapshot).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(&dir).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(Self { dir })
    }

    /// Directory holding the artifacts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load one artifact, falling back to its backup if the main copy is corrupt
    async fn load_artifact<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Option<T> {
        let path = self.artifact_path(name);

        match Self::read_parsed(&path, &parse).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "State file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(&path);
                match Self::read_parsed(&backup_path, &parse).await {
                    Ok(Some(value)) => {
                        tracing::info!("Recovered {} from backup", name);
                        if let Err(restore_err) = fs::copy(&backup_path, &path).await {
                            tracing::error!(
                                "Failed to restore {} from backup: {}",
                                path.display(),
                                restore_err
                            );
                        }
                        Some(value)
                    }
                    Ok(None) => {
                        tracing::warn!("No backup for {}. Starting with empty state.", name);
                        None
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup of {} also corrupted: {}. Starting with empty state.",
                            name,
                            backup_err
                        );
                        None
                    }
                }
            }
        }
    }

    /// `Ok(None)` when the file does not exist, `Err` when it is unusable
    async fn read_parsed<T>(
        path: &Path,
        parse: &impl Fn(&str) -> Result<T, String>,
    ) -> Result<Option<T>, String> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.to_string()),
        };

        parse(&content).map(Some)
    }

    /// Write one artifact atomically, keeping the previous version as backup
    async fn write_artifact(&self, name: &str, contents: &str) -> Result<(), Error> {
        let path = self.artifact_path(name);
        let temp_path = Self::temp_path(&path);

        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(contents.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if path.exists() {
            if let Err(e) = fs::copy(&path, Self::backup_path(&path)).await {
                tracing::warn!("Failed to create backup of {}: {}", name, e);
            }
        }

        fs::rename(&temp_path, &path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", path.display());
        Ok(())
    }

    async fn remove_artifact(&self, name: &str) -> Result<(), Error> {
        let path = self.artifact_path(name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::state_store(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut temp = path.to_path_buf();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

fn parse_domains(content: &str) -> Result<DomainSet, String> {
    Ok(content
        .lines()
        .map(normalize_hostname)
        .filter(|line| !line.is_empty())
        .collect())
}

fn parse_ledger(content: &str) -> Result<DomainIpMap, String> {
    serde_json::from_str::<DomainIpMap>(content).map_err(|e| e.to_string())
}

fn parse_public_ip(content: &str) -> Result<Ipv4Addr, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("file is empty".to_string());
    }
    trimmed
        .parse()
        .map_err(|e| format!("invalid IPv4 address '{}': {}", trimmed, e))
}

fn render_domains(domains: &DomainSet) -> String {
    domains.iter().map(|d| format!("{}\n", d)).collect()
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<StateSnapshot, Error> {
        let domains = self
            .load_artifact(DOMAINS_FILE, parse_domains)
            .await
            .unwrap_or_default();
        let ledger = self
            .load_artifact(LEDGER_FILE, parse_ledger)
            .await
            .unwrap_or_default();
        let public_ip = self.load_artifact(PUBLIC_IP_FILE, parse_public_ip).await;

        tracing::debug!(
            "Loaded state: {} domains, {} ledger entries, public IP {:?}",
            domains.len(),
            ledger.len(),
            public_ip
        );

        Ok(StateSnapshot {
            domains,
            ledger,
            public_ip,
        })
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), Error> {
        let ledger_json = serde_json::to_string_pretty(&snapshot.ledger)
            .map_err(|e| Error::state_store(format!("Failed to serialize ledger: {}", e)))?;

        self.write_artifact(LEDGER_FILE, &ledger_json).await?;
        self.write_artifact(DOMAINS_FILE, &render_domains(&snapshot.domains))
            .await?;

        match snapshot.public_ip {
            Some(ip) => self.write_artifact(PUBLIC_IP_FILE, &ip.to_string()).await?,
            None => self.remove_artifact(PUBLIC_IP_FILE).await?,
        }

        Ok(())
    }
}
