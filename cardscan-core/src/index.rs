//! Reference index of precomputed card fingerprints.
//!
//! The index is built once (from a persisted [`ReferenceTable`] or from
//! in-memory entries) and is immutable afterwards. Hashes are stored
//! column-wise, one contiguous byte buffer per family, so a match scans a
//! single buffer with a fixed stride.
//!
//! # Persisted format
//!
//! ```text
//! format_version, backend, params, built_at?,
//! card_ids: [id],
//! columns: { perceptual | difference | wavelet: { bit_len, codes: [hex] } },
//! color:   { bit_len, codes: [hex] }
//! ```
//!
//! Tables are written as CBOR or JSON. Loading tries CBOR first, then JSON.
//! Every structural problem is a [`CardscanError::ConfigError`]: an engine
//! must never start with a partially valid index.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CardscanError, Result, CURRENT_TABLE_VERSION};
use crate::family::HashFamily;
use crate::fingerprint::{FingerprintBundle, FingerprintParams};
use crate::hash::{bytes_for_bits, HashCode};

/// On-disk encoding of a reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Cbor,
    Json,
}

impl FromStr for TableFormat {
    type Err = CardscanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cbor" => Ok(Self::Cbor),
            "json" => Ok(Self::Json),
            other => Err(CardscanError::InvalidParameter(format!(
                "unknown table format '{other}' (expected cbor or json)"
            ))),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cbor => f.write_str("cbor"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// One persisted hash column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub bit_len: u32,
    pub codes: Vec<String>,
}

/// Serialized form of a [`ReferenceIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub format_version: u32,
    pub backend: String,
    pub params: FingerprintParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
    pub card_ids: Vec<String>,
    pub columns: BTreeMap<HashFamily, ColumnRecord>,
    pub color: ColumnRecord,
}

impl ReferenceTable {
    /// Parse a table, trying CBOR first then JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Ok(table) = ciborium::from_reader::<Self, _>(bytes) {
            debug!(format = "cbor", "Parsed reference table");
            return Ok(table);
        }

        match serde_json::from_slice(bytes) {
            Ok(table) => {
                debug!(format = "json", "Parsed reference table");
                Ok(table)
            }
            Err(e) => Err(CardscanError::SerializationError(format!(
                "failed to parse reference table (tried CBOR and JSON): {e}"
            ))),
        }
    }

    pub fn to_bytes(&self, format: TableFormat) -> Result<Vec<u8>> {
        match format {
            TableFormat::Cbor => {
                let mut bytes = Vec::new();
                ciborium::into_writer(self, &mut bytes)
                    .map_err(|e| CardscanError::SerializationError(e.to_string()))?;
                Ok(bytes)
            }
            TableFormat::Json => serde_json::to_vec(self)
                .map_err(|e| CardscanError::SerializationError(e.to_string())),
        }
    }
}

/// Fixed-stride column of packed hash codes.
#[derive(Debug, Clone)]
pub struct HashColumn {
    bit_len: u32,
    stride: usize,
    data: Vec<u8>,
}

impl HashColumn {
    fn with_capacity(bit_len: u32, rows: usize) -> Self {
        let stride = bytes_for_bits(bit_len);
        Self {
            bit_len,
            stride,
            data: Vec::with_capacity(stride * rows),
        }
    }

    fn push(&mut self, code: &HashCode) -> Result<()> {
        if code.bit_len() != self.bit_len {
            return Err(CardscanError::HashLengthMismatch {
                expected: self.bit_len,
                actual: code.bit_len(),
            });
        }
        self.data.extend_from_slice(code.as_bytes());
        Ok(())
    }

    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Packed bytes of row `i`.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        let start = i.checked_mul(self.stride)?;
        self.data.get(start..start + self.stride)
    }

    /// Rows in index order.
    pub fn iter(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact(self.stride)
    }

    fn code(&self, i: usize) -> Option<HashCode> {
        self.get(i)
            .and_then(|bytes| HashCode::from_bytes(bytes.to_vec(), self.bit_len).ok())
    }

    fn to_record(&self) -> ColumnRecord {
        ColumnRecord {
            bit_len: self.bit_len,
            codes: self.iter().map(hex::encode).collect(),
        }
    }
}

/// A catalog card and its fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub card_id: String,
    pub fingerprint: FingerprintBundle,
}

impl ReferenceEntry {
    pub fn new(card_id: impl Into<String>, fingerprint: FingerprintBundle) -> Self {
        Self {
            card_id: card_id.into(),
            fingerprint,
        }
    }
}

/// Immutable, columnar table of reference fingerprints.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    backend: String,
    params: FingerprintParams,
    built_at: Option<DateTime<Utc>>,
    card_ids: Vec<String>,
    columns: [HashColumn; 3],
    color: HashColumn,
}

impl ReferenceIndex {
    /// Build an index from in-memory entries, in the given order.
    pub fn from_entries(
        backend: impl Into<String>,
        params: FingerprintParams,
        entries: Vec<ReferenceEntry>,
    ) -> Result<Self> {
        params.validate()?;
        if entries.is_empty() {
            return Err(CardscanError::ConfigError(
                "reference index has no entries".into(),
            ));
        }

        let rows = entries.len();
        let mut columns = HashFamily::ALL
            .map(|_| HashColumn::with_capacity(params.family_bits(), rows));
        let mut color = HashColumn::with_capacity(params.color_bits(), rows);
        let mut card_ids = Vec::with_capacity(rows);

        for entry in entries {
            for family in HashFamily::ALL {
                columns[family.index()]
                    .push(entry.fingerprint.hash(family))
                    .map_err(|e| column_error(family.as_str(), &entry.card_id, e))?;
            }
            color
                .push(entry.fingerprint.color())
                .map_err(|e| column_error("color", &entry.card_id, e))?;
            card_ids.push(entry.card_id);
        }

        check_unique(&card_ids)?;

        Ok(Self {
            backend: backend.into(),
            params,
            built_at: None,
            card_ids,
            columns,
            color,
        })
    }

    /// Validate and load a deserialized table.
    pub fn from_table(table: ReferenceTable) -> Result<Self> {
        if table.format_version != CURRENT_TABLE_VERSION {
            return Err(CardscanError::ConfigError(format!(
                "unsupported reference table version {} (expected {CURRENT_TABLE_VERSION})",
                table.format_version
            )));
        }
        table.params.validate()?;

        let rows = table.card_ids.len();
        if rows == 0 {
            return Err(CardscanError::ConfigError(
                "reference table has no entries".into(),
            ));
        }
        check_unique(&table.card_ids)?;

        let mut records = table.columns;
        let mut columns = Vec::with_capacity(HashFamily::ALL.len());
        for family in HashFamily::ALL {
            let record = records.remove(&family).ok_or_else(|| {
                CardscanError::ConfigError(format!("reference table is missing the {family} column"))
            })?;
            columns.push(decode_column(
                family.as_str(),
                record,
                table.params.family_bits(),
                rows,
            )?);
        }
        let color = decode_column("color", table.color, table.params.color_bits(), rows)?;

        let columns: [HashColumn; 3] = columns
            .try_into()
            .map_err(|_| CardscanError::ConfigError("wrong number of hash columns".into()))?;

        Ok(Self {
            backend: table.backend,
            params: table.params,
            built_at: table.built_at,
            card_ids: table.card_ids,
            columns,
            color,
        })
    }

    /// Read, parse and validate a table file.
    ///
    /// A missing or unreadable file is a configuration error: the engine
    /// cannot run without reference data.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            CardscanError::ConfigError(format!(
                "failed to read reference table {}: {e}",
                path.display()
            ))
        })?;

        let index = Self::from_table(ReferenceTable::from_bytes(&bytes)?)?;

        info!(
            path = %path.display(),
            entries = index.len(),
            backend = %index.backend,
            hash_bits = index.params.family_bits(),
            "Loaded reference index"
        );

        Ok(index)
    }

    /// Fail unless hashes from `backend_id` with `params` are comparable.
    pub fn ensure_compatible(&self, backend_id: &str, params: &FingerprintParams) -> Result<()> {
        if self.backend != backend_id {
            return Err(CardscanError::ConfigError(format!(
                "reference index was built with backend '{}', engine uses '{backend_id}'",
                self.backend
            )));
        }
        if &self.params != params {
            return Err(CardscanError::ConfigError(format!(
                "reference index parameters {:?} differ from engine parameters {:?}",
                self.params, params
            )));
        }
        Ok(())
    }

    pub fn to_table(&self) -> ReferenceTable {
        ReferenceTable {
            format_version: CURRENT_TABLE_VERSION,
            backend: self.backend.clone(),
            params: self.params,
            built_at: self.built_at,
            card_ids: self.card_ids.clone(),
            columns: HashFamily::ALL
                .iter()
                .map(|&family| (family, self.column(family).to_record()))
                .collect(),
            color: self.color.to_record(),
        }
    }

    pub fn save(&self, path: &Path, format: TableFormat) -> Result<()> {
        let bytes = self.to_table().to_bytes(format)?;
        std::fs::write(path, &bytes)?;
        info!(
            path = %path.display(),
            entries = self.len(),
            bytes = bytes.len(),
            %format,
            "Saved reference index"
        );
        Ok(())
    }

    pub fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = Some(built_at);
        self
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn params(&self) -> &FingerprintParams {
        &self.params
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.card_ids.len()
    }

    /// Always false for a constructed index; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.card_ids.is_empty()
    }

    pub fn card_ids(&self) -> &[String] {
        &self.card_ids
    }

    pub fn card_id(&self, i: usize) -> Option<&str> {
        self.card_ids.get(i).map(String::as_str)
    }

    /// Column of one family, parallel to [`Self::card_ids`].
    pub fn column(&self, family: HashFamily) -> &HashColumn {
        &self.columns[family.index()]
    }

    pub fn color_column(&self) -> &HashColumn {
        &self.color
    }

    /// Reconstruct entry `i`.
    pub fn entry(&self, i: usize) -> Option<ReferenceEntry> {
        let card_id = self.card_ids.get(i)?.clone();
        let fingerprint = FingerprintBundle::new(
            self.columns[0].code(i)?,
            self.columns[1].code(i)?,
            self.columns[2].code(i)?,
            self.color.code(i)?,
        );
        Some(ReferenceEntry {
            card_id,
            fingerprint,
        })
    }

    /// Every entry in index order. Entries are copied out of the columns.
    pub fn all_entries(&self) -> impl Iterator<Item = ReferenceEntry> + '_ {
        (0..self.len()).filter_map(|i| self.entry(i))
    }
}

fn column_error(column: &str, card_id: &str, err: CardscanError) -> CardscanError {
    CardscanError::ConfigError(format!("{column} hash of card '{card_id}': {err}"))
}

fn check_unique(card_ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(card_ids.len());
    for id in card_ids {
        if !seen.insert(id.as_str()) {
            return Err(CardscanError::ConfigError(format!(
                "duplicate card id '{id}' in reference data"
            )));
        }
    }
    Ok(())
}

fn decode_column(
    name: &str,
    record: ColumnRecord,
    expected_bits: u32,
    rows: usize,
) -> Result<HashColumn> {
    if record.bit_len != expected_bits {
        return Err(CardscanError::ConfigError(format!(
            "{name} column holds {}-bit hashes, parameters require {expected_bits}",
            record.bit_len
        )));
    }
    if record.codes.len() != rows {
        return Err(CardscanError::ConfigError(format!(
            "{name} column has {} codes for {rows} cards",
            record.codes.len()
        )));
    }

    let mut column = HashColumn::with_capacity(expected_bits, rows);
    for (row, hex_code) in record.codes.iter().enumerate() {
        let code = HashCode::from_hex(hex_code, expected_bits).map_err(|e| {
            CardscanError::ConfigError(format!("{name} column row {row}: {e}"))
        })?;
        column.push(&code)?;
    }
    Ok(column)
}
