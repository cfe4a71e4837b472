// # IP-to-Service Classifier
//
// Maps an observed public IP address to one of the prioritized access
// services using per-service allow-lists of known egress IP fragments.
//
// ## Document format
//
// ```json
// {
//   "fibreIpAddresses": ["81.223.", "90.187.1"],
//   "cableIpAddresses": ["5.6.7."],
//   "cellularIpAddresses": ["10.20."]
// }
// ```
//
// ## Write discipline
//
// Registration is read-modify-write: the document is re-read immediately
// before each write to minimize lost updates, then replaced atomically via
// temp-file + rename. Racing writers may still lose a fragment (explicitly
// acceptable for this low-frequency manual operation) but the JSON document
// is never left corrupt.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Error;

/// The mutually-exclusive access services, in fixed priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Fibre,
    Cable,
    Cellular,
}

impl ServiceKind {
    /// All services, highest priority first. Classification iterates this
    /// order and the first match wins.
    pub const PRIORITY: [ServiceKind; 3] =
        [ServiceKind::Fibre, ServiceKind::Cable, ServiceKind::Cellular];

    /// Lowercase identifier used in URLs and configuration
    pub fn id(&self) -> &'static str {
        match self {
            ServiceKind::Fibre => "fibre",
            ServiceKind::Cable => "cable",
            ServiceKind::Cellular => "cellular",
        }
    }

    /// Uppercase label used in log records
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Fibre => "FIBRE",
            ServiceKind::Cable => "CABLE",
            ServiceKind::Cellular => "CELLULAR",
        }
    }

}

/// Status of a single service within a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// This service carries the connection right now
    Connected,
    /// A higher- or lower-priority service matched instead
    Standby,
}

impl ServiceStatus {
    fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Connected => "CONNECTED",
            ServiceStatus::Standby => "STANDBY",
        }
    }
}

/// Result of classifying one observed IP address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The matched service; `None` means no allow-list matched
    pub service: Option<ServiceKind>,
}

impl Classification {
    /// Whether a particular service is the active one
    pub fn is_connected(&self, kind: ServiceKind) -> bool {
        self.service == Some(kind)
    }

    /// Status of every service under this classification, priority order
    pub fn statuses(&self) -> [(ServiceKind, ServiceStatus); 3] {
        ServiceKind::PRIORITY.map(|kind| {
            let status = if self.is_connected(kind) {
                ServiceStatus::Connected
            } else {
                ServiceStatus::Standby
            };
            (kind, status)
        })
    }

    /// The log record lines for this classification
    ///
    /// All three services are reported together so the log never shows two
    /// services connected without an intervening record explaining the
    /// transition. An unknown IP collapses to a single line.
    pub fn log_messages(&self) -> Vec<String> {
        if self.service.is_none() {
            return vec!["CONNECTION UNKNOWN".to_string()];
        }
        self.statuses()
            .iter()
            .map(|(kind, status)| format!("{} {}", kind.label(), status.label()))
            .collect()
    }
}

/// The persisted allow-list document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowListDoc {
    #[serde(default, rename = "fibreIpAddresses")]
    pub fibre: Vec<String>,

    #[serde(default, rename = "cableIpAddresses")]
    pub cable: Vec<String>,

    #[serde(default, rename = "cellularIpAddresses")]
    pub cellular: Vec<String>,
}

impl AllowListDoc {
    /// Registered fragments for one service
    pub fn fragments(&self, kind: ServiceKind) -> &[String] {
        match kind {
            ServiceKind::Fibre => &self.fibre,
            ServiceKind::Cable => &self.cable,
            ServiceKind::Cellular => &self.cellular,
        }
    }

    fn fragments_mut(&mut self, kind: ServiceKind) -> &mut Vec<String> {
        match kind {
            ServiceKind::Fibre => &mut self.fibre,
            ServiceKind::Cable => &mut self.cable,
            ServiceKind::Cellular => &mut self.cellular,
        }
    }

    /// Classify an IP against this document: first service in priority
    /// order with any fragment contained in `ip` wins.
    pub fn classify(&self, ip: &str) -> Classification {
        let service = ServiceKind::PRIORITY
            .into_iter()
            .find(|kind| self.fragments(*kind).iter().any(|frag| ip.contains(frag.as_str())));
        Classification { service }
    }
}

/// File-backed allow-list store
///
/// Reads the document fresh on every classification so out-of-band edits
/// (a registration through the HTTP surface, or a hand edit) take effect on
/// the next check cycle without a restart.
#[derive(Debug, Clone)]
pub struct AllowListStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles between clones of this store,
    /// so two in-process registrations never lose each other's fragment.
    /// Writers in other processes still race (accepted for this
    /// low-frequency manual operation) but the rename keeps the document
    /// intact either way.
    write_lock: Arc<Mutex<()>>,
}

impl AllowListStore {
    /// Bind a store to the document path (created empty on first use)
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the underlying document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current document; absent file yields the empty document
    pub async fn load(&self) -> Result<AllowListDoc, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::persistence(format!(
                    "failed to parse allow-list {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AllowListDoc::default()),
            Err(e) => Err(Error::persistence(format!(
                "failed to read allow-list {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// The raw document text, creating it with an empty document if absent
    pub async fn raw_json(&self) -> Result<String, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let doc = AllowListDoc::default();
                self.write_doc(&doc).await?;
                Ok(serde_json::to_string_pretty(&doc)?)
            }
            Err(e) => Err(Error::persistence(format!(
                "failed to read allow-list {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Classify an IP against the current document
    pub async fn classify(&self, ip: &str) -> Result<Classification, Error> {
        Ok(self.load().await?.classify(ip))
    }

    /// Register an IP fragment for a service
    ///
    /// Re-reads the document, appends (ignoring exact duplicates), and
    /// replaces the file atomically.
    pub async fn register_ip(&self, kind: ServiceKind, fragment: &str) -> Result<(), Error> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(Error::config("IP fragment cannot be empty"));
        }

        let _guard = self.write_lock.lock().await;

        // re-read immediately before the write to minimize lost updates
        let mut doc = self.load().await?;
        let fragments = doc.fragments_mut(kind);
        if !fragments.iter().any(|f| f == fragment) {
            fragments.push(fragment.to_string());
        }
        self.write_doc(&doc).await
    }

    /// Write the document atomically (temp-file + rename)
    async fn write_doc(&self, doc: &AllowListDoc) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(doc)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::persistence(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::persistence(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn priority_order_first_match_wins() {
        let doc = AllowListDoc {
            fibre: vec!["1.2.3.".to_string()],
            cable: vec!["1.2.".to_string()],
            cellular: vec![],
        };
        // both fibre and cable fragments match; fibre outranks cable
        let classification = doc.classify("1.2.3.4");
        assert_eq!(classification.service, Some(ServiceKind::Fibre));
        assert!(classification.is_connected(ServiceKind::Fibre));
        assert!(!classification.is_connected(ServiceKind::Cable));
    }

    #[test]
    fn unmatched_ip_is_unknown() {
        let doc = AllowListDoc {
            fibre: vec!["1.2.3.".to_string()],
            cable: vec!["5.6.7.".to_string()],
            cellular: vec![],
        };
        let classification = doc.classify("9.9.9.9");
        assert_eq!(classification.service, None);
        assert_eq!(classification.log_messages(), vec!["CONNECTION UNKNOWN"]);
    }

    #[test]
    fn trio_messages_are_mutually_consistent() {
        let doc = AllowListDoc {
            fibre: vec![],
            cable: vec!["5.6.7.".to_string()],
            cellular: vec![],
        };
        let messages = doc.classify("5.6.7.8").log_messages();
        assert_eq!(
            messages,
            vec!["FIBRE STANDBY", "CABLE CONNECTED", "CELLULAR STANDBY"]
        );
        // exactly one connected line, ever
        let connected = messages.iter().filter(|m| m.ends_with("CONNECTED")).count();
        assert_eq!(connected, 1);
    }

    #[tokio::test]
    async fn register_persists_and_dedupes() {
        let dir = tempdir().unwrap();
        let store = AllowListStore::new(dir.path().join("ips.json"));

        store
            .register_ip(ServiceKind::Cellular, "10.20.")
            .await
            .unwrap();
        store
            .register_ip(ServiceKind::Cellular, "10.20.")
            .await
            .unwrap();

        let doc = store.load().await.unwrap();
        assert_eq!(doc.cellular, vec!["10.20.".to_string()]);

        // survives a fresh store instance
        let store2 = AllowListStore::new(store.path());
        let classification = store2.classify("10.20.30.40").await.unwrap();
        assert_eq!(classification.service, Some(ServiceKind::Cellular));
    }

    #[tokio::test]
    async fn missing_document_classifies_unknown() {
        let dir = tempdir().unwrap();
        let store = AllowListStore::new(dir.path().join("ips.json"));
        let classification = store.classify("1.2.3.4").await.unwrap();
        assert_eq!(classification.service, None);
    }
}
