// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Registry of transactions flagged as exploited.
//!
//! The registry is loaded from a record file up to a given block height and
//! answers whether the coins of a transaction are valid. Readers work on an
//! immutable [`InfractionSet`] snapshot, loads build a new snapshot off to the
//! side and publish it with a single pointer swap, so a partially loaded
//! registry is never observable.

mod record;
mod redeem;

pub use crate::validator::record::*;
pub use crate::validator::redeem::*;

use crate::primitives::TxIdRef;
use crate::settings::Settings;
use log::*;
use parking_lot::{Mutex, RwLock};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, prelude::*, Cursor};
use std::path::{Path, PathBuf};
use triomphe::Arc;

#[cfg(all(feature = "blake3sum", not(feature = "sha256sum")))]
use blake3::Hasher as Blake3;
#[cfg(feature = "sha256sum")]
use sha2::{Digest, Sha256};

#[cfg(not(any(feature = "blake3sum", feature = "sha256sum")))]
compile_error!("either the `blake3sum` or the `sha256sum` feature must be enabled");

/// Some editors prefix UTF-8 files with a byte order mark
const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LoadErr {
    /// The record file could not be read
    FileUnavailable(io::ErrorKind),

    /// The record at the given 1-based line has no parsable height
    InvalidHeight { line: usize },

    /// The version directive at the given line is not a number
    InvalidVersion { line: usize },

    /// The record file declares a format version we don't understand
    UnsupportedVersion(u32),

    /// The record file does not match the configured checksum
    ChecksumMismatch,
}

impl fmt::Display for LoadErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileUnavailable(kind) => write!(f, "infractions file unavailable: {kind}"),
            Self::InvalidHeight { line } => write!(f, "invalid height at line {line}"),
            Self::InvalidVersion { line } => write!(f, "invalid version directive at line {line}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported record format version {v}"),
            Self::ChecksumMismatch => write!(f, "infractions file checksum mismatch"),
        }
    }
}

impl std::error::Error for LoadErr {}

/// Statistics of a completed load.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct LoadReport {
    /// Records indexed
    pub records: usize,

    /// Malformed record lines that were skipped
    pub skipped: usize,

    /// Well formed records above the target height
    pub beyond_height: usize,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoadOutcome {
    /// The registry already covers the requested height
    Unchanged,

    /// A new snapshot was published
    Loaded(LoadReport),
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct InfractionSet {
    infractions: HashMap<String, Vec<InfractionData>>,
    loaded: bool,
    height: u64,
}

impl InfractionSet {
    /// The unloaded set. Every coin is valid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a loaded set from the record lines of `reader`, indexing every
    /// record at or below `target_height`.
    ///
    /// Malformed records are skipped and counted. A record line without a
    /// parsable height fails the whole build.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        target_height: u64,
    ) -> Result<(Self, LoadReport), LoadErr> {
        let mut infractions: HashMap<String, Vec<InfractionData>> = HashMap::new();
        let mut report = LoadReport::default();
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|err| LoadErr::FileUnavailable(err.kind()))?;

            if read == 0 {
                break;
            }

            line_no += 1;

            let decoded = String::from_utf8_lossy(&buf);
            let valid_utf8 = matches!(decoded, Cow::Borrowed(_));
            let mut line: &str = &decoded;

            if line_no == 1 {
                line = line.strip_prefix(BYTE_ORDER_MARK).unwrap_or(line);
            }

            let line = match classify_line(line) {
                RecordLine::Ignored => continue,
                RecordLine::Version(Some(RECORD_FORMAT_VERSION)) => continue,
                RecordLine::Version(Some(v)) => return Err(LoadErr::UnsupportedVersion(v)),
                RecordLine::Version(None) => return Err(LoadErr::InvalidVersion { line: line_no }),
                RecordLine::Record(line) => line,
            };

            let height = block_height(line).ok_or(LoadErr::InvalidHeight { line: line_no })?;

            if height > target_height {
                report.beyond_height += 1;
                continue;
            }

            if !valid_utf8 {
                warn!("Skipping infraction record at line {line_no}: invalid utf-8");
                report.skipped += 1;
                continue;
            }

            match parse_record(line) {
                Ok((_, record)) => {
                    infractions
                        .entry(record.txid.clone())
                        .or_default()
                        .push(record);
                    report.records += 1;
                }

                Err(err) => {
                    warn!("Skipping infraction record at line {line_no}: {err}");
                    report.skipped += 1;
                }
            }
        }

        let set = Self {
            infractions,
            loaded: true,
            height: target_height,
        };

        Ok((set, report))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Number of distinct flagged transactions
    #[must_use]
    pub fn len(&self) -> usize {
        self.infractions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infractions.is_empty()
    }

    pub fn is_coin_valid<T: TxIdRef + ?Sized>(&self, tx_id: &T) -> bool {
        !self.infractions.contains_key(tx_id.tx_id().as_ref())
    }

    /// Infractions of `tx_id` in file order. Empty if there are none.
    pub fn get_infractions<T: TxIdRef + ?Sized>(&self, tx_id: &T) -> &[InfractionData] {
        self.infractions
            .get(tx_id.tx_id().as_ref())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Thread safe infraction registry backed by a record file.
#[derive(Debug)]
pub struct CoinValidator {
    path: PathBuf,
    checksum: Option<String>,
    load_mux: Mutex<()>,
    snapshot: RwLock<Arc<InfractionSet>>,
}

impl CoinValidator {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            checksum: None,
            load_mux: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(InfractionSet::empty())),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let validator = Self::new(settings.infractions_path());

        match settings.validator.infractions_checksum.as_ref() {
            Some(checksum) => validator.with_checksum(checksum),
            None => validator,
        }
    }

    /// Require the record file to match the given hex checksum on every load.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into().to_lowercase());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record file up to `height`.
    ///
    /// Does nothing if the registry already covers `height`. On error the
    /// previously published snapshot stays in place.
    pub fn load(&self, height: u64) -> Result<LoadOutcome, LoadErr> {
        let _guard = self.load_mux.lock();

        if self.covers(height) {
            debug!("Infractions already loaded up to height {height}");
            return Ok(LoadOutcome::Unchanged);
        }

        let bytes = fs::read(&self.path).map_err(|err| {
            error!(
                "Failed to read infractions file {}! Reason: {:#?}",
                self.path.display(),
                err
            );
            LoadErr::FileUnavailable(err.kind())
        })?;

        if let Some(expected) = self.checksum.as_ref() {
            let checksum = file_checksum(&bytes);
            if &checksum != expected {
                error!("Infractions file checksum verification failed! Got: {checksum}, Expected: {expected}");
                return Err(LoadErr::ChecksumMismatch);
            }
        }

        self.build_and_publish(Cursor::new(bytes), height)
    }

    /// Same as [`CoinValidator::load`] but reads records from `reader`
    /// instead of the record file.
    pub fn load_from_reader<R: BufRead>(
        &self,
        reader: R,
        height: u64,
    ) -> Result<LoadOutcome, LoadErr> {
        let _guard = self.load_mux.lock();

        if self.covers(height) {
            return Ok(LoadOutcome::Unchanged);
        }

        self.build_and_publish(reader, height)
    }

    fn covers(&self, height: u64) -> bool {
        let current = self.snapshot();
        current.is_loaded() && height <= current.height()
    }

    fn build_and_publish<R: BufRead>(
        &self,
        reader: R,
        height: u64,
    ) -> Result<LoadOutcome, LoadErr> {
        let (set, report) = InfractionSet::from_reader(reader, height)?;

        if report.skipped > 0 {
            warn!(
                "Skipped {} malformed infraction records while loading up to height {height}",
                report.skipped
            );
        }

        info!(
            "Loaded {} infraction records for {} transactions up to height {height}",
            report.records,
            set.len()
        );

        *self.snapshot.write() = Arc::new(set);
        Ok(LoadOutcome::Loaded(report))
    }

    /// Returns the current snapshot. Queries against it stay consistent even
    /// if the registry is reloaded or cleared in the meantime.
    pub fn snapshot(&self) -> Arc<InfractionSet> {
        self.snapshot.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_loaded()
    }

    pub fn loaded_height(&self) -> u64 {
        self.snapshot().height()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Drops all infractions and returns to the unloaded state.
    pub fn clear(&self) {
        let _guard = self.load_mux.lock();
        *self.snapshot.write() = Arc::new(InfractionSet::empty());
        debug!("Cleared infractions");
    }

    /// Returns `true` if no infractions are recorded for `tx_id`.
    pub fn is_coin_valid<T: TxIdRef + ?Sized>(&self, tx_id: &T) -> bool {
        self.snapshot().is_coin_valid(tx_id)
    }

    pub fn get_infractions<T: TxIdRef + ?Sized>(&self, tx_id: &T) -> Vec<InfractionData> {
        self.snapshot().get_infractions(tx_id).to_vec()
    }

    pub fn redeem_address_verified(
        &self,
        exploited: &[RedeemData],
        recipients: &[RedeemData],
    ) -> bool {
        redeem_address_verified(exploited, recipients)
    }
}

/// Hex checksum of the record file contents
pub fn file_checksum(bytes: &[u8]) -> String {
    #[cfg(all(feature = "blake3sum", not(feature = "sha256sum")))]
    let mut hasher = Blake3::new();

    #[cfg(feature = "sha256sum")]
    let mut hasher = Sha256::new();

    hasher.update(bytes);
    let result = hasher.finalize();

    #[cfg(all(feature = "blake3sum", not(feature = "sha256sum")))]
    let checksum = hex::encode(result.as_bytes());

    #[cfg(feature = "sha256sum")]
    let checksum = hex::encode(result);

    checksum
}
