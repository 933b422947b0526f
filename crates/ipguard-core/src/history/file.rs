// # File History Store
//
// File-based implementation of AddressHistoryStore.
//
// ## File Format
//
// Plain text, one address per line, in assignment order:
//
// ```text
// 203.0.113.7
// 198.51.100.23
// ```
//
// Lines are only ever appended. The file is created empty on first access.
// Blank lines are ignored; lines that do not parse as an IP address are
// skipped with a warning so a hand-edited file never stops monitoring.
//
// ## File Naming
//
// One file per endpoint: `ip_history_<instance suffix>.txt`, where the suffix
// is the last eight characters of the instance id.

use async_trait::async_trait;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::endpoint::Endpoint;
use crate::traits::history_store::{AddressHistoryStore, HistoryStoreFactory};

/// Append-only history file for one endpoint
///
/// The file contents are cached in memory after the first load; the owning
/// monitor is the only writer.
///
/// # Example
///
/// ```rust,no_run
/// use ipguard_core::history::FileHistoryStore;
/// use ipguard_core::traits::AddressHistoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileHistoryStore::new("/var/lib/ipguard/ip_history_abcd1234.txt").await?;
///
///     store.record("203.0.113.7".parse()?).await?;
///     assert_eq!(store.read_all().await?, vec!["203.0.113.7".parse::<std::net::IpAddr>()?]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    addresses: RwLock<Vec<IpAddr>>,
}

impl FileHistoryStore {
    /// Open or create a history file
    ///
    /// Creates parent directories and an empty file when missing.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::history_store(format!(
                    "Failed to create history directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let addresses = Self::load(&path).await?;
        tracing::debug!(
            "Loaded address history {}: {} address(es)",
            path.display(),
            addresses.len()
        );

        Ok(Self {
            path,
            addresses: RwLock::new(addresses),
        })
    }

    /// Path of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// History file name for an endpoint
    pub fn file_name_for(endpoint: &Endpoint) -> String {
        format!("ip_history_{}.txt", endpoint.instance_suffix())
    }

    async fn load(path: &Path) -> Result<Vec<IpAddr>, Error> {
        if !path.exists() {
            fs::File::create(path).await.map_err(|e| {
                Error::history_store(format!(
                    "Failed to create history file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::history_store(format!(
                "Failed to read history file {}: {}",
                path.display(),
                e
            ))
        })?;

        // Appends must start on a fresh line
        if !content.is_empty() && !content.ends_with('\n') {
            append(path, "\n").await?;
        }

        Ok(parse_history(&content, path))
    }

    async fn append_line(&self, address: IpAddr) -> Result<(), Error> {
        append(&self.path, &format!("{}\n", address)).await
    }
}

async fn append(path: &Path, text: &str) -> Result<(), Error> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| {
            Error::history_store(format!(
                "Failed to open history file {}: {}",
                path.display(),
                e
            ))
        })?;

    file.write_all(text.as_bytes()).await.map_err(|e| {
        Error::history_store(format!(
            "Failed to append to history file {}: {}",
            path.display(),
            e
        ))
    })?;

    file.flush().await.map_err(|e| {
        Error::history_store(format!(
            "Failed to flush history file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}

fn parse_history(content: &str, path: &Path) -> Vec<IpAddr> {
    let mut addresses: Vec<IpAddr> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.parse::<IpAddr>() {
            Ok(ip) if !addresses.contains(&ip) => addresses.push(ip),
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(
                    "Skipping invalid address '{}' at {}:{}",
                    line,
                    path.display(),
                    line_no + 1
                );
            }
        }
    }

    addresses
}

#[async_trait]
impl AddressHistoryStore for FileHistoryStore {
    async fn record(&self, address: IpAddr) -> Result<bool, Error> {
        let mut addresses = self.addresses.write().await;
        if addresses.contains(&address) {
            return Ok(false);
        }

        // Durable first, cache second
        self.append_line(address).await?;
        addresses.push(address);

        tracing::trace!("Recorded {} in {}", address, self.path.display());
        Ok(true)
    }

    async fn read_all(&self) -> Result<Vec<IpAddr>, Error> {
        Ok(self.addresses.read().await.clone())
    }

    async fn contains(&self, address: IpAddr) -> Result<bool, Error> {
        Ok(self.addresses.read().await.contains(&address))
    }
}

/// Opens one [`FileHistoryStore`] per endpoint inside a directory
#[derive(Debug, Clone)]
pub struct FileHistoryStoreFactory {
    dir: PathBuf,
}

impl FileHistoryStoreFactory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the history file for an endpoint
    pub fn path_for(&self, endpoint: &Endpoint) -> PathBuf {
        self.dir.join(FileHistoryStore::file_name_for(endpoint))
    }
}

#[async_trait]
impl HistoryStoreFactory for FileHistoryStoreFactory {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn AddressHistoryStore>, Error> {
        let store = FileHistoryStore::new(self.path_for(endpoint)).await?;
        Ok(Box::new(store))
    }
}
