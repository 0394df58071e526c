use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rl_types::{LedgerTimestamp, TxId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// One committed ledger write.
///
/// On-disk format:
/// ```text
/// [4 bytes: entry length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LedgerWrite)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerWrite {
    pub tx_id: TxId,
    pub timestamp: LedgerTimestamp,
    pub key: String,
    /// `None` records a delete.
    pub value: Option<Vec<u8>>,
}

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Flush to the OS after every write and rely on page-cache buffering.
    #[default]
    OsDefault,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct WalWriter {
    file: File,
    offset: u64,
}

/// Result of reading the log back.
#[derive(Debug)]
pub struct Recovery {
    /// Intact entries in append order.
    pub writes: Vec<LedgerWrite>,
    /// Offset just past the last complete entry. Bytes beyond it are a torn
    /// tail.
    pub end: u64,
}

/// Crash-recoverable write-ahead log of ledger writes.
///
/// Writes are serialized with bincode, framed with a length prefix and a
/// CRC32 checksum, and appended to a single file. On recovery the file is
/// read front-to-back; entries that fail the CRC check are skipped and a
/// truncated tail ends recovery (a torn write from a crash). The tail must be
/// cut with [`truncate`](Self::truncate) before appending again, or the next
/// recovery would misframe every later entry.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_mode: SyncMode,
}

impl WriteAheadLog {
    /// Open (or create) the log file at `path`.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter { file, offset }),
            sync_mode,
        })
    }

    /// Append one write. Returns the byte offset of the entry.
    pub fn append(&self, write: &LedgerWrite) -> StoreResult<u64> {
        let payload =
            bincode::serialize(write).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let entry_offset = w.offset;

        if let Err(e) = write_frame(&mut w.file, &frame, self.sync_mode) {
            // A partial frame would swallow every later entry on replay.
            if let Err(cut) = w.file.set_len(entry_offset) {
                warn!(offset = entry_offset, error = %cut, "could not cut failed WAL append");
            }
            return Err(e.into());
        }
        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, key = %write.key, "WAL append");
        Ok(entry_offset)
    }

    /// Read back every intact entry in append order.
    pub fn recover(&self) -> StoreResult<Recovery> {
        let mut data = Vec::new();
        BufReader::new(File::open(&self.path)?).read_to_end(&mut data)?;

        let mut entries = Vec::new();
        let mut offset = 0usize;

        while offset + HEADER_SIZE <= data.len() {
            let header = &data[offset..offset + HEADER_SIZE];
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            let start = offset + HEADER_SIZE;
            if length == 0 || start + length > data.len() {
                warn!(offset, length, "truncated WAL entry; stopping recovery");
                break;
            }

            let payload = &data[start..start + length];
            let actual_crc = crc32fast::hash(payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping entry"
                );
            } else {
                match bincode::deserialize::<LedgerWrite>(payload) {
                    Ok(write) => entries.push(write),
                    Err(e) => warn!(offset, error = %e, "undecodable WAL entry; skipping"),
                }
            }

            offset = start + length;
        }

        debug!(recovered = entries.len(), end = offset, "WAL recovery complete");
        Ok(Recovery {
            writes: entries,
            end: offset as u64,
        })
    }

    /// Drop everything from `len` on. Used to cut a torn tail after recovery.
    pub fn truncate(&self, len: u64) -> StoreResult<()> {
        let mut w = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        w.file.set_len(len)?;
        if self.sync_mode == SyncMode::EveryWrite {
            w.file.sync_all()?;
        }
        warn!(path = %self.path.display(), from = w.offset, to = len, "WAL truncated");
        w.offset = len;
        Ok(())
    }

    /// Current write offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().map(|w| w.offset).unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_frame(file: &mut File, frame: &[u8], sync_mode: SyncMode) -> std::io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync_mode == SyncMode::EveryWrite {
        file.sync_all()?;
    }
    Ok(())
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}
