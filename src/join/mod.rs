//! Subnet reference table and record enrichment.
//!
//! Harvested records carry zero or more IP address candidates; each
//! candidate is matched against every reference entry and either picks up
//! the entry's scope/label or the `No Match` sentinel. Two join modes:
//! `Enrich` keeps one output row per record with matches flattened into
//! comma-joined scalar fields, `Explode` emits one row per
//! record x candidate x match.

use crate::error::{Rep365Error, Result};
use crate::harvest::schema::{FieldValue, RawRecord};
use std::net::Ipv4Addr;
use std::path::Path;

/// Sentinel recorded for candidates no reference entry covers
pub const NO_MATCH: &str = "No Match";

/// One subnet entry of the reference table
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    /// Subnet base address
    pub network: Ipv4Addr,

    /// Mask length in bits
    pub mask_len: u8,

    /// Octet-prefix shortcut, e.g. "10.120.26." for a /24. Covers only the
    /// whole octets of the mask, which is exactly why the shortcut breaks
    /// for masks not aligned to octet boundaries.
    pub prefix: String,

    /// CIDR form of the subnet, e.g. "10.120.26.0/24"
    pub scope: String,

    /// Human label, e.g. "SCCM Production"
    pub label: String,
}

impl ReferenceEntry {
    pub fn new(subnet: &str, label: &str, default_mask: u8) -> Result<Self> {
        let (addr_part, mask_len) = match subnet.split_once('/') {
            Some((addr, mask)) => {
                let mask: u8 = mask.parse().map_err(|_| {
                    Rep365Error::ReferenceLoad(format!("invalid mask length in '{}'", subnet))
                })?;
                (addr, mask)
            }
            None => (subnet, default_mask),
        };

        if mask_len > 32 {
            return Err(Rep365Error::ReferenceLoad(format!(
                "mask /{} out of range in '{}'",
                mask_len, subnet
            )));
        }

        let network: Ipv4Addr = addr_part.trim().parse().map_err(|_| {
            Rep365Error::ReferenceLoad(format!("invalid subnet address '{}'", addr_part))
        })?;

        let octets = network.octets();
        let whole_octets = (mask_len / 8) as usize;
        let prefix = if whole_octets == 0 {
            String::new()
        } else {
            let mut p = octets[..whole_octets]
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(".");
            p.push('.');
            p
        };

        Ok(Self {
            network,
            mask_len,
            prefix,
            scope: format!("{}/{}", network, mask_len),
            label: label.to_string(),
        })
    }

    /// Canonical masked-integer subnet test
    pub fn contains(&self, candidate: Ipv4Addr) -> bool {
        let mask: u32 = if self.mask_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.mask_len)
        };
        (u32::from(candidate) & mask) == (u32::from(self.network) & mask)
    }

    /// Octet-prefix shortcut test. Agrees with `contains` for octet-aligned
    /// masks; may legitimately diverge otherwise.
    pub fn matches_prefix(&self, candidate: &str) -> bool {
        !self.prefix.is_empty() && candidate.starts_with(&self.prefix)
    }
}

/// How candidates are compared against reference entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// `(candidate & mask) == (network & mask)` — the canonical algorithm
    #[default]
    Masked,
    /// String starts-with on the octet prefix
    OctetPrefix,
}

/// Read-only subnet lookup table, loaded once per run
#[derive(Debug)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceTable {
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    /// Load a reference table from a delimited file with at least a
    /// `subnet` column and a `name` column. Subnets may carry CIDR masks;
    /// bare addresses get `default_mask`. Malformed rows are fatal — a bad
    /// table should stop the run before any harvesting begins.
    pub fn load(path: &Path, default_mask: u8) -> Result<Self> {
        if !path.exists() {
            return Err(Rep365Error::ReferenceLoad(format!(
                "reference table not found: {}",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let subnet_idx = headers.iter().position(|h| h == "subnet").ok_or_else(|| {
            Rep365Error::ReferenceLoad(format!(
                "missing 'subnet' column, found: {:?}",
                headers.iter().collect::<Vec<_>>()
            ))
        })?;
        let name_idx = headers.iter().position(|h| h == "name").ok_or_else(|| {
            Rep365Error::ReferenceLoad(format!(
                "missing 'name' column, found: {:?}",
                headers.iter().collect::<Vec<_>>()
            ))
        })?;

        let mut entries = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let subnet = row.get(subnet_idx).unwrap_or("").trim();
            let name = row.get(name_idx).unwrap_or("").trim();
            if subnet.is_empty() {
                return Err(Rep365Error::ReferenceLoad(format!(
                    "empty subnet on line {}",
                    line + 2
                )));
            }
            entries.push(ReferenceEntry::new(subnet, name, default_mask)?);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// All entries matching a candidate under the given strategy.
    /// Unparseable candidates match nothing under `Masked`.
    pub fn matches(&self, candidate: &str, strategy: MatchStrategy) -> Vec<&ReferenceEntry> {
        match strategy {
            MatchStrategy::Masked => match candidate.trim().parse::<Ipv4Addr>() {
                Ok(addr) => self.entries.iter().filter(|e| e.contains(addr)).collect(),
                Err(_) => Vec::new(),
            },
            MatchStrategy::OctetPrefix => self
                .entries
                .iter()
                .filter(|e| e.matches_prefix(candidate.trim()))
                .collect(),
        }
    }
}

/// Pull IP candidates out of a record field. List fields contribute their
/// entries; text fields split on comma, semicolon, and whitespace.
pub fn extract_candidates(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::List(items) => items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        FieldValue::Text(s) => s
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Output shape of the join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// One output row per record; multiple matches comma-joined
    Enrich,
    /// One output row per record x candidate x match
    Explode,
}

/// What to do with records that carry no candidates at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Pass the record through untouched (match columns empty)
    #[default]
    PassThrough,
    /// Drop the record
    Skip,
}

/// A record after enrichment: ordered scalar fields, ready for export
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    values: Vec<(String, String)>,
}

impl EnrichedRecord {
    pub fn from_pairs(values: Vec<(String, String)>) -> Self {
        Self { values }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.values.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(_, v)| v.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A record exported without any join: raw fields stringified as-is
impl From<&RawRecord> for EnrichedRecord {
    fn from(record: &RawRecord) -> Self {
        Self {
            values: record
                .fields()
                .map(|(n, v)| (n.to_string(), v.to_export_string()))
                .collect(),
        }
    }
}

/// Joins harvested records against the reference table
pub struct Joiner<'a> {
    table: &'a ReferenceTable,
    key_fields: Vec<String>,
    mode: JoinMode,
    strategy: MatchStrategy,
    empty_policy: EmptyPolicy,
}

impl<'a> Joiner<'a> {
    pub fn new(table: &'a ReferenceTable, key_fields: Vec<String>, mode: JoinMode) -> Self {
        Self {
            table,
            key_fields,
            mode,
            strategy: MatchStrategy::default(),
            empty_policy: EmptyPolicy::default(),
        }
    }

    pub fn strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Enrich one record. Every candidate contributes exactly one output
    /// entry per matching reference, or the `No Match` sentinel when
    /// nothing matches.
    pub fn enrich(&self, record: &RawRecord) -> Result<Vec<EnrichedRecord>> {
        let mut candidates = Vec::new();
        for field in &self.key_fields {
            candidates.extend(extract_candidates(record.get(field)?));
        }

        let base: Vec<(String, String)> = record
            .fields()
            .map(|(n, v)| (n.to_string(), v.to_export_string()))
            .collect();

        if candidates.is_empty() {
            return Ok(match self.empty_policy {
                EmptyPolicy::Skip => Vec::new(),
                EmptyPolicy::PassThrough => {
                    let mut values = base;
                    values.push(("address".to_string(), String::new()));
                    values.push(("subnet".to_string(), String::new()));
                    values.push(("subnet_name".to_string(), String::new()));
                    vec![EnrichedRecord::from_pairs(values)]
                }
            });
        }

        // (candidate, scope, label) — one entry per candidate x match,
        // sentinel for candidates nothing covers
        let mut contributions: Vec<(String, String, String)> = Vec::new();
        for candidate in &candidates {
            let matched = self.table.matches(candidate, self.strategy);
            if matched.is_empty() {
                contributions.push((candidate.clone(), NO_MATCH.to_string(), NO_MATCH.to_string()));
            } else {
                for entry in matched {
                    contributions.push((candidate.clone(), entry.scope.clone(), entry.label.clone()));
                }
            }
        }

        match self.mode {
            JoinMode::Enrich => {
                let mut values = base;
                values.push((
                    "address".to_string(),
                    contributions
                        .iter()
                        .map(|(c, _, _)| c.as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                ));
                values.push((
                    "subnet".to_string(),
                    contributions
                        .iter()
                        .map(|(_, s, _)| s.as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                ));
                values.push((
                    "subnet_name".to_string(),
                    contributions
                        .iter()
                        .map(|(_, _, l)| l.as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                ));
                Ok(vec![EnrichedRecord::from_pairs(values)])
            }
            JoinMode::Explode => Ok(contributions
                .into_iter()
                .map(|(candidate, scope, label)| {
                    let mut values = base.clone();
                    values.push(("address".to_string(), candidate));
                    values.push(("subnet".to_string(), scope));
                    values.push(("subnet_name".to_string(), label));
                    EnrichedRecord::from_pairs(values)
                })
                .collect()),
        }
    }
}
