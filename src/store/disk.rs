use crate::core::error::{FetchError, Result};
use crate::core::store::{DocumentKey, FieldDocument, FieldStore, ReferenceSource, sanitize};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

const SEPARATOR: u8 = 0;
const REFERENCE_PARTITION: &str = "__reference";
const DATES_KEY: &str = "dates";
const SIDS_KEY: &str = "sids";

fn encode_key(key: &DocumentKey) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(key.dname.len() + key.date.len() + 8);
    bytes.extend_from_slice(key.dname.as_bytes());
    bytes.push(SEPARATOR);
    bytes.extend_from_slice(key.date.as_bytes());
    if let Some(time) = &key.time {
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(time.as_bytes());
    }
    bytes
}

fn decode_key(bytes: &[u8]) -> Result<DocumentKey> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| FetchError::StoreUnavailable(format!("malformed key: {e}")))?;
    let mut parts = text.split(SEPARATOR as char);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(dname), Some(date), time) => Ok(DocumentKey {
            dname: dname.to_string(),
            date: date.to_string(),
            time: time.map(str::to_string),
        }),
        _ => Err(FetchError::StoreUnavailable(format!(
            "malformed key: {text:?}"
        ))),
    }
}

fn lock_error<E: std::fmt::Display>(err: E) -> FetchError {
    FetchError::StoreUnavailable(format!("partition registry poisoned: {err}"))
}

/// Persistent field store on a fjall keyspace, one partition per collection.
pub struct DiskStore {
    keyspace: Keyspace,
    partitions: RwLock<HashMap<String, PartitionHandle>>,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = Config::new(path).open()?;
        debug!("Opened store at {}", path.display());
        Ok(Self {
            keyspace,
            partitions: RwLock::new(HashMap::new()),
        })
    }

    /// Partition for `collection`; `None` if it doesn't exist and `create` is false.
    fn partition(&self, collection: &str, create: bool) -> Result<Option<PartitionHandle>> {
        if let Some(handle) = self.partitions.read().map_err(lock_error)?.get(collection) {
            return Ok(Some(handle.clone()));
        }
        if !create && !self.keyspace.partition_exists(collection) {
            return Ok(None);
        }
        let handle = self
            .keyspace
            .open_partition(collection, PartitionCreateOptions::default())?;
        self.partitions
            .write()
            .map_err(lock_error)?
            .insert(collection.to_string(), handle.clone());
        Ok(Some(handle))
    }

    /// Stores a reference list (`dates` or `sids`).
    pub fn put_reference(&self, name: &str, values: &[String]) -> Result<()> {
        let Some(partition) = self.partition(REFERENCE_PARTITION, true)? else {
            return Err(FetchError::StoreUnavailable(
                "reference partition unavailable".to_string(),
            ));
        };
        partition.insert(name, serde_json::to_vec(values)?)?;
        debug!(name, count = values.len(), "Reference PUT");
        Ok(())
    }

    fn get_reference(&self, name: &str) -> Result<Vec<String>> {
        let value = match self.partition(REFERENCE_PARTITION, false)? {
            Some(partition) => partition.get(name)?,
            None => None,
        };
        match value {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(FetchError::StoreUnavailable(format!(
                "reference data '{name}' has not been loaded"
            ))),
        }
    }

    pub fn put_dates(&self, dates: &[String]) -> Result<()> {
        self.put_reference(DATES_KEY, dates)
    }

    pub fn put_sids(&self, sids: &[String]) -> Result<()> {
        self.put_reference(SIDS_KEY, sids)
    }

    /// Syncs the journal to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl FieldStore for DiskStore {
    async fn distinct_dnames(&self, collection: &str) -> Result<Vec<String>> {
        let Some(partition) = self.partition(collection, false)? else {
            return Ok(Vec::new());
        };
        let mut dnames = BTreeSet::new();
        for item in partition.iter() {
            let (key, _) = item?;
            dnames.insert(decode_key(&key)?.dname);
        }
        Ok(dnames.into_iter().collect())
    }

    async fn get(&self, collection: &str, key: &DocumentKey) -> Result<Option<FieldDocument>> {
        let Some(partition) = self.partition(collection, false)? else {
            return Ok(None);
        };
        match partition.get(encode_key(key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => {
                debug!(collection, ?key, "Document MISS");
                Ok(None)
            }
        }
    }

    async fn get_span(
        &self,
        collection: &str,
        dname: &str,
        first: &str,
        last: &str,
    ) -> Result<BTreeMap<String, FieldDocument>> {
        let Some(partition) = self.partition(collection, false)? else {
            return Ok(BTreeMap::new());
        };
        let from = encode_key(&DocumentKey::day(dname, first));
        let to = encode_key(&DocumentKey::day(dname, last));
        let mut span = BTreeMap::new();
        for item in partition.range(from..=to) {
            let (key, value) = item?;
            let key = decode_key(&key)?;
            if key.time.is_some() {
                continue;
            }
            span.insert(key.date, serde_json::from_slice(&value)?);
        }
        debug!(collection, dname, first, last, found = span.len(), "Span read");
        Ok(span)
    }

    async fn upsert(
        &self,
        collection: &str,
        key: DocumentKey,
        document: FieldDocument,
    ) -> Result<()> {
        let Some(partition) = self.partition(collection, true)? else {
            return Err(FetchError::StoreUnavailable(format!(
                "collection '{collection}' unavailable"
            )));
        };
        let document = sanitize(document);
        partition.insert(encode_key(&key), serde_json::to_vec(&document)?)?;
        debug!(collection, ?key, sids = document.len(), "Document UPSERT");
        Ok(())
    }
}

#[async_trait]
impl ReferenceSource for DiskStore {
    async fn trading_dates(&self) -> Result<Vec<String>> {
        self.get_reference(DATES_KEY)
    }

    async fn sids(&self) -> Result<Vec<String>> {
        self.get_reference(SIDS_KEY)
    }
}
