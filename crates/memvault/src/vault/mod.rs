//! Durable encrypted record storage
//!
//! The vault is an append-only log and the sole owner of record bytes at
//! rest. Every record is serialized, sealed with ChaCha20-Poly1305, and
//! appended as one frame; the write is fsynced before `put` returns, so a
//! successful store is durable and a failed one leaves nothing behind.
//!
//! Log layout:
//!
//! ```text
//! header:  "MVLT" | version u16 LE | dimension u16 LE
//! frame:   sealed_len u32 LE | record id (16 bytes) | nonce ‖ ciphertext
//! ```
//!
//! The record id rides in plaintext (callers receive it anyway) so the
//! offset map can be rebuilt without decrypting the whole log. All other
//! record bytes exist on disk only inside the ciphertext. The in-memory
//! indexes are derived from this log and rebuilt by [`VaultStore::replay`]
//! at startup.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::crypto::{self, VaultKey};
use crate::error::{MemvaultError, Result};
use crate::memory::MemoryRecord;

const MAGIC: &[u8; 4] = b"MVLT";
const VERSION: u16 = 1;
const HEADER_LEN: u64 = 8;
/// Frame bytes preceding the sealed payload: length prefix + record id
const FRAME_OVERHEAD: u64 = 4 + 16;

/// Encrypted key→record storage backed by an append-only log.
pub struct VaultStore {
    key: VaultKey,
    dimension: usize,
    inner: Mutex<VaultFile>,
}

struct VaultFile {
    file: File,
    /// id → (offset of sealed payload, sealed payload length)
    offsets: HashMap<Uuid, (u64, u32)>,
    /// End of the last complete frame; appends land here
    end: u64,
}

impl VaultStore {
    /// Open a vault log at `path`, creating it if absent.
    ///
    /// An existing log must have been created with the same embedding
    /// dimension; the dimension is a deployment-lifetime invariant baked
    /// into the header. A truncated trailing frame (torn write from a
    /// crash) is trimmed and logged; everything before it survives.
    pub async fn open(path: &Path, key: VaultKey, dimension: usize) -> Result<Self> {
        if dimension == 0 || dimension > u16::MAX as usize {
            return Err(MemvaultError::Config(format!(
                "embedding dimension {dimension} is out of range"
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let mut offsets = HashMap::new();
        let end;

        if file_len == 0 {
            let mut header = Vec::with_capacity(HEADER_LEN as usize);
            header.extend_from_slice(MAGIC);
            header.extend_from_slice(&VERSION.to_le_bytes());
            header.extend_from_slice(&(dimension as u16).to_le_bytes());
            file.write_all(&header)
                .and_then(|()| file.sync_data())
                .map_err(|e| {
                    MemvaultError::Durability(format!("failed to initialize vault log: {e}"))
                })?;
            end = HEADER_LEN;
        } else {
            let buf = std::fs::read(path)?;
            if buf.len() < HEADER_LEN as usize || &buf[0..4] != MAGIC {
                return Err(MemvaultError::VaultCorrupt(
                    "missing or damaged vault header".to_string(),
                ));
            }
            let version = u16::from_le_bytes([buf[4], buf[5]]);
            if version != VERSION {
                return Err(MemvaultError::VaultCorrupt(format!(
                    "unsupported vault version {version}"
                )));
            }
            let stored_dim = u16::from_le_bytes([buf[6], buf[7]]) as usize;
            if stored_dim != dimension {
                return Err(MemvaultError::Config(format!(
                    "vault was created with dimension {stored_dim}, \
                     configured dimension is {dimension}"
                )));
            }

            let (frames, valid_end) = scan_frames(&buf, HEADER_LEN as usize);
            if valid_end < buf.len() {
                tracing::warn!(
                    "Trimming torn frame at end of vault log ({} stray bytes)",
                    buf.len() - valid_end
                );
                file.set_len(valid_end as u64)?;
            }
            for (id, start, len) in frames {
                offsets.insert(id, (start as u64, len as u32));
            }
            end = valid_end as u64;
        }

        Ok(Self {
            key,
            dimension,
            inner: Mutex::new(VaultFile { file, offsets, end }),
        })
    }

    /// Append a record, fsyncing before returning.
    ///
    /// On a failed write or sync the torn tail is trimmed best-effort and
    /// `Durability` is returned: nothing was committed and the whole store
    /// call can be retried.
    pub async fn put(&self, record: &MemoryRecord) -> Result<()> {
        debug_assert_eq!(record.embedding.len(), self.dimension);

        let bytes = serde_json::to_vec(record)
            .map_err(|e| MemvaultError::Serialization(e.to_string()))?;
        let sealed = crypto::seal(&self.key, &bytes)?;

        let mut frame = Vec::with_capacity(FRAME_OVERHEAD as usize + sealed.len());
        frame.extend_from_slice(&(sealed.len() as u32).to_le_bytes());
        frame.extend_from_slice(record.id.as_bytes());
        frame.extend_from_slice(&sealed);

        let mut inner = self.inner.lock().await;
        if inner.offsets.contains_key(&record.id) {
            return Err(MemvaultError::Internal(format!(
                "duplicate record id {}",
                record.id
            )));
        }

        let write_result = match inner.file.write_all(&frame) {
            Ok(()) => inner.file.sync_data(),
            Err(e) => Err(e),
        };
        if let Err(e) = write_result {
            let end = inner.end;
            let _ = inner.file.set_len(end);
            return Err(MemvaultError::Durability(format!(
                "vault append failed: {e}"
            )));
        }

        let sealed_start = inner.end + FRAME_OVERHEAD;
        inner.offsets.insert(record.id, (sealed_start, sealed.len() as u32));
        inner.end += frame.len() as u64;
        Ok(())
    }

    /// Fetch and decrypt a single record. Unknown ids are `NotFound`;
    /// undecryptable or undecodable bytes are `VaultCorrupt`.
    pub async fn get(&self, id: Uuid) -> Result<MemoryRecord> {
        let sealed = {
            let mut inner = self.inner.lock().await;
            let Some(&(start, len)) = inner.offsets.get(&id) else {
                return Err(MemvaultError::NotFound(id.to_string()));
            };
            read_sealed(&mut inner.file, start, len)?
        };
        self.decode(id, &sealed)
    }

    /// Fetch a batch of records. Missing ids are silently omitted from the
    /// result; that is the documented partial-read contract for batch
    /// hydration. Corruption is still an error, never an omission.
    pub async fn get_many(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, MemoryRecord>> {
        let mut sealed_entries = Vec::with_capacity(ids.len());
        {
            let mut inner = self.inner.lock().await;
            for id in ids {
                let Some(&(start, len)) = inner.offsets.get(id) else {
                    continue;
                };
                let sealed = read_sealed(&mut inner.file, start, len)?;
                sealed_entries.push((*id, sealed));
            }
        }

        let mut records = HashMap::with_capacity(sealed_entries.len());
        for (id, sealed) in sealed_entries {
            records.insert(id, self.decode(id, &sealed)?);
        }
        Ok(records)
    }

    /// Decrypt the full log in append order. Used at startup to rebuild
    /// the derived indexes.
    pub async fn replay(&self) -> Result<Vec<MemoryRecord>> {
        let buf = {
            let mut inner = self.inner.lock().await;
            let len = (inner.end - HEADER_LEN) as usize;
            let mut buf = vec![0u8; len];
            inner.file.seek(SeekFrom::Start(HEADER_LEN))?;
            inner.file.read_exact(&mut buf).map_err(|e| {
                MemvaultError::VaultCorrupt(format!("vault log short read: {e}"))
            })?;
            buf
        };

        let (frames, _) = scan_frames(&buf, 0);
        let mut records = Vec::with_capacity(frames.len());
        for (id, start, len) in frames {
            records.push(self.decode(id, &buf[start..start + len])?);
        }
        Ok(records)
    }

    /// Whether a record id is present
    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner.lock().await.offsets.contains_key(&id)
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.inner.lock().await.offsets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The dimension this vault was created with
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn decode(&self, id: Uuid, sealed: &[u8]) -> Result<MemoryRecord> {
        let bytes = crypto::open(&self.key, sealed)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MemvaultError::VaultCorrupt(format!("record {id} is undecodable: {e}"))
        })
    }
}

fn read_sealed(file: &mut File, start: u64, len: u32) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut sealed = vec![0u8; len as usize];
    file.read_exact(&mut sealed)
        .map_err(|e| MemvaultError::VaultCorrupt(format!("vault log short read: {e}")))?;
    Ok(sealed)
}

/// Walk frames in `buf` starting at `start`.
///
/// Returns the complete frames as (id, sealed offset, sealed length) plus
/// the end of the last complete frame. A partial trailing frame is not an
/// error; the caller decides whether to trim it.
fn scan_frames(buf: &[u8], start: usize) -> (Vec<(Uuid, usize, usize)>, usize) {
    let mut frames = Vec::new();
    let mut pos = start;
    loop {
        if pos + (FRAME_OVERHEAD as usize) > buf.len() {
            break;
        }
        let len = u32::from_le_bytes(buf[pos..pos + 4].try_into().expect("4-byte slice")) as usize;
        let id = Uuid::from_bytes(
            buf[pos + 4..pos + 20]
                .try_into()
                .expect("16-byte slice"),
        );
        let sealed_start = pos + FRAME_OVERHEAD as usize;
        let Some(next) = sealed_start.checked_add(len) else {
            break;
        };
        if next > buf.len() {
            break;
        }
        frames.push((id, sealed_start, len));
        pos = next;
    }
    (frames, pos)
}
