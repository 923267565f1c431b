//! SequenceIssuer: mints business codes from persisted counters.
//!
//! A counter lives at `mdm:sequences:{key}`. Issuing reads the definition,
//! formats the code from `nextNumber`, and writes `nextNumber + 1` back with
//! a compare-and-swap against the exact bytes that were read. A lost race
//! re-reads and retries with exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use openerp_core::{ServiceError, now_rfc3339};
use openerp_kv::{KVError, KVStore};
use openerp_store::CodeIssuer;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{SequenceDefinition, SequencePatch};

const PREFIX: &str = "mdm:sequences:";

/// Widest padding that still fits a `u64` counter.
pub const MAX_PADDING: u32 = 18;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence '{0}' not found")]
    NotFound(String),

    #[error("sequence '{0}' already exists")]
    AlreadyDefined(String),

    #[error("sequence store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("sequence '{key}' still contended after {attempts} attempts")]
    Contention { key: String, attempts: u32 },

    #[error("{0}")]
    Invalid(String),

    #[error("sequence '{0}' is read-only")]
    ReadOnly(String),

    #[error("sequence '{0}' has no numbers left")]
    Exhausted(String),
}

impl From<SequenceError> for ServiceError {
    fn from(err: SequenceError) -> Self {
        let msg = err.to_string();
        match err {
            SequenceError::NotFound(_) => ServiceError::NotFound(msg),
            SequenceError::AlreadyDefined(_) | SequenceError::Exhausted(_) => {
                ServiceError::Conflict(msg)
            }
            SequenceError::StoreUnavailable(_) | SequenceError::Contention { .. } => {
                ServiceError::Unavailable(msg)
            }
            SequenceError::Invalid(_) => ServiceError::Validation(msg),
            SequenceError::ReadOnly(_) => ServiceError::ReadOnly(msg),
        }
    }
}

/// Result of a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    /// Formatted code, e.g. `PS-00001`.
    pub value: String,
    /// The number consumed, before increment.
    pub numeric_value: u64,
}

/// Backoff schedule for compare-and-swap retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): half of the capped
    /// exponential step plus a random share of the other half.
    pub fn delay(&self, attempt: u32) -> Duration {
        let step = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
            .min(self.max_delay);
        let half = step / 2;
        let jitter_us = rand::thread_rng().gen_range(0..=half.as_micros() as u64);
        half + Duration::from_micros(jitter_us)
    }
}

/// Render `n` in base 10, left-padded with `0` to at least `width` digits.
pub fn zero_pad(n: u64, width: u32) -> String {
    format!("{:0width$}", n, width = width as usize)
}

/// The code a definition's current `nextNumber` formats to.
pub fn format_code(def: &SequenceDefinition) -> String {
    format!("{}{}", def.prefix, zero_pad(def.next_number, def.padding))
}

/// Series seeded at startup when missing.
pub fn default_sequences() -> Vec<SequenceDefinition> {
    vec![
        SequenceDefinition::new("PART_PS", "PS-", 5, 1, "報價"),
        SequenceDefinition::new("EMPLOYEE", "JFS", 4, 1, "人事"),
        SequenceDefinition::new("USER", "U", 5, 1, "帳號"),
        SequenceDefinition::new("SUPPLIER", "SUP", 4, 1, "採購"),
        SequenceDefinition::new("PURCHASE_METHOD", "PM", 3, 1, "採購"),
    ]
}

pub struct SequenceIssuer {
    kv: Arc<dyn KVStore>,
    retry: RetryPolicy,
}

impl SequenceIssuer {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self::with_retry(kv, RetryPolicy::default())
    }

    pub fn with_retry(kv: Arc<dyn KVStore>, retry: RetryPolicy) -> Self {
        Self { kv, retry }
    }

    /// Issue the next code of `key`.
    ///
    /// Exactly one counter advance per successful call. A failed call leaves
    /// the counter where it was.
    pub fn issue(&self, key: &str) -> Result<IssuedCode, SequenceError> {
        if key.trim().is_empty() {
            return Err(SequenceError::Invalid("sequence key is required".into()));
        }
        let (issued, _) = self.advance(key, |def| {
            let code = IssuedCode {
                value: format_code(def),
                numeric_value: def.next_number,
            };
            def.next_number = def
                .next_number
                .checked_add(1)
                .ok_or_else(|| SequenceError::Exhausted(key.to_string()))?;
            Ok(code)
        })?;
        debug!("SequenceIssuer: {} issued {}", key, issued.value);
        Ok(issued)
    }

    /// The code the next `issue` would return. Does not advance.
    pub fn preview(&self, key: &str) -> Result<IssuedCode, SequenceError> {
        let (def, _) = self.read(key)?;
        Ok(IssuedCode {
            value: format_code(&def),
            numeric_value: def.next_number,
        })
    }

    pub fn get(&self, key: &str) -> Result<SequenceDefinition, SequenceError> {
        self.read(key).map(|(def, _)| def)
    }

    /// Every definition, sorted by key.
    pub fn list(&self) -> Result<Vec<SequenceDefinition>, SequenceError> {
        let entries = self.kv.scan(PREFIX).map_err(unavailable)?;
        entries
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect()
    }

    /// Create a new series. Fails with `AlreadyDefined` if the key exists.
    pub fn define(&self, mut def: SequenceDefinition) -> Result<SequenceDefinition, SequenceError> {
        def.key = def.key.trim().to_uppercase();
        validate_key(&def.key)?;
        validate_padding(def.padding)?;
        def.start_number = def.next_number;

        let now = now_rfc3339();
        def.created_at = now.clone();
        def.updated_at = now;
        let bytes = encode(&def)?;
        match self.kv.compare_and_swap(&storage_key(&def.key), None, &bytes) {
            Ok(true) => {
                info!("SequenceIssuer: defined {} starting at {}", def.key, format_code(&def));
                Ok(def)
            }
            Ok(false) => Err(SequenceError::AlreadyDefined(def.key)),
            Err(e) => Err(write_err(&def.key, e)),
        }
    }

    /// Change prefix, padding, scope, or move `nextNumber` forward.
    ///
    /// A new prefix or padding could format a later number into a code the
    /// old format already produced (`A1`+`1` and `A`+`11`), so both are
    /// rejected once `nextNumber` has left `startNumber`.
    pub fn update(&self, key: &str, patch: &SequencePatch) -> Result<SequenceDefinition, SequenceError> {
        if let Some(padding) = patch.padding {
            validate_padding(padding)?;
        }
        self.advance(key, |def| {
            let reformat = patch.prefix.as_ref().is_some_and(|p| *p != def.prefix)
                || patch.padding.is_some_and(|p| p != def.padding);
            if reformat && def.next_number != def.start_number {
                return Err(SequenceError::Invalid(format!(
                    "prefix and padding of '{}' are fixed once numbering has started",
                    key
                )));
            }
            if let Some(next) = patch.next_number {
                if next < def.next_number {
                    return Err(SequenceError::Invalid(format!(
                        "nextNumber cannot go back from {} to {}",
                        def.next_number, next
                    )));
                }
                def.next_number = next;
            }
            if let Some(prefix) = &patch.prefix {
                def.prefix = prefix.clone();
            }
            if let Some(padding) = patch.padding {
                def.padding = padding;
            }
            if let Some(scope) = &patch.scope {
                def.scope = scope.clone();
            }
            Ok(())
        })
        .map(|((), def)| def)
    }

    /// Define every default series that is missing. Existing counters are
    /// left untouched. Returns how many were created.
    pub fn ensure_defaults(&self) -> Result<usize, SequenceError> {
        let mut created = 0;
        for def in default_sequences() {
            match self.define(def) {
                Ok(_) => created += 1,
                Err(SequenceError::AlreadyDefined(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    fn read(&self, key: &str) -> Result<(SequenceDefinition, Vec<u8>), SequenceError> {
        let bytes = self
            .kv
            .get(&storage_key(key))
            .map_err(unavailable)?
            .ok_or_else(|| SequenceError::NotFound(key.to_string()))?;
        Ok((decode(key, &bytes)?, bytes))
    }

    /// Read-modify-CAS loop shared by `issue` and `update`. `apply` mutates
    /// the definition and returns the caller's result; it runs again on
    /// every retry against the freshly read definition. Returns that result
    /// together with the definition as written.
    fn advance<R>(
        &self,
        key: &str,
        mut apply: impl FnMut(&mut SequenceDefinition) -> Result<R, SequenceError>,
    ) -> Result<(R, SequenceDefinition), SequenceError> {
        let storage_key = storage_key(key);
        for attempt in 1..=self.retry.max_attempts {
            let (mut def, current) = self.read(key)?;
            let out = apply(&mut def)?;
            def.updated_at = now_rfc3339();
            let next = encode(&def)?;

            match self.kv.compare_and_swap(&storage_key, Some(&current), &next) {
                Ok(true) => return Ok((out, def)),
                Ok(false) => {
                    debug!("SequenceIssuer: {} lost race on attempt {}", key, attempt);
                    if attempt < self.retry.max_attempts {
                        std::thread::sleep(self.retry.delay(attempt));
                    }
                }
                Err(e) => return Err(write_err(key, e)),
            }
        }
        warn!(
            "SequenceIssuer: {} gave up after {} attempts",
            key, self.retry.max_attempts
        );
        Err(SequenceError::Contention {
            key: key.to_string(),
            attempts: self.retry.max_attempts,
        })
    }
}

impl CodeIssuer for SequenceIssuer {
    fn next_code(&self, series: &str) -> Result<String, ServiceError> {
        Ok(self.issue(series)?.value)
    }
}

fn storage_key(key: &str) -> String {
    format!("{}{}", PREFIX, key)
}

fn validate_key(key: &str) -> Result<(), SequenceError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(SequenceError::Invalid(format!(
            "sequence key '{}' must match [A-Z0-9_]+",
            key
        )))
    }
}

fn validate_padding(padding: u32) -> Result<(), SequenceError> {
    if padding > MAX_PADDING {
        return Err(SequenceError::Invalid(format!(
            "padding must be at most {}",
            MAX_PADDING
        )));
    }
    Ok(())
}

fn decode(key: &str, bytes: &[u8]) -> Result<SequenceDefinition, SequenceError> {
    serde_json::from_slice(bytes)
        .map_err(|e| SequenceError::StoreUnavailable(format!("corrupt sequence {}: {}", key, e)))
}

fn encode(def: &SequenceDefinition) -> Result<Vec<u8>, SequenceError> {
    serde_json::to_vec(def).map_err(|e| SequenceError::StoreUnavailable(e.to_string()))
}

fn unavailable(e: KVError) -> SequenceError {
    SequenceError::StoreUnavailable(e.to_string())
}

fn write_err(key: &str, e: KVError) -> SequenceError {
    match e {
        KVError::ReadOnly(_) => SequenceError::ReadOnly(key.to_string()),
        other => SequenceError::StoreUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    use openerp_kv::{OverlayKV, RedbStore};

    /// Passes everything through to redb, but fails writes while `broken`.
    struct FailingKv {
        inner: RedbStore,
        broken: AtomicBool,
    }

    impl KVStore for FailingKv {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
            self.inner.set(key, value)
        }
        fn delete(&self, key: &str) -> Result<(), KVError> {
            self.inner.delete(key)
        }
        fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
            self.inner.batch_set(entries)
        }
        fn compare_and_swap(
            &self,
            key: &str,
            expected: Option<&[u8]>,
            new: &[u8],
        ) -> Result<bool, KVError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(KVError::Storage("disk full".into()));
            }
            self.inner.compare_and_swap(key, expected, new)
        }
        fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
            self.inner.scan(prefix)
        }
        fn is_readonly(&self, key: &str) -> bool {
            self.inner.is_readonly(key)
        }
    }

    fn issuer() -> (SequenceIssuer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(RedbStore::open(&dir.path().join("seq.redb")).unwrap());
        (SequenceIssuer::new(kv), dir)
    }

    #[test]
    fn zero_pad_never_truncates() {
        assert_eq!(zero_pad(5, 5), "00005");
        assert_eq!(zero_pad(123456, 5), "123456");
        assert_eq!(zero_pad(7, 0), "7");
    }

    #[test]
    fn first_part_code() {
        let (seq, _dir) = issuer();
        seq.ensure_defaults().unwrap();
        let issued = seq.issue("PART_PS").unwrap();
        assert_eq!(issued.value, "PS-00001");
        assert_eq!(issued.numeric_value, 1);
        assert_eq!(seq.issue("PART_PS").unwrap().value, "PS-00002");
    }

    #[test]
    fn employee_counter_persists_increment() {
        let (seq, _dir) = issuer();
        seq.define(SequenceDefinition::new("EMPLOYEE", "JFS", 4, 12, "人事")).unwrap();

        let issued = seq.issue("EMPLOYEE").unwrap();
        assert_eq!(
            issued,
            IssuedCode {
                value: "JFS0012".into(),
                numeric_value: 12
            }
        );
        assert_eq!(seq.get("EMPLOYEE").unwrap().next_number, 13);
    }

    #[test]
    fn sequential_issues_are_monotonic_by_one() {
        let (seq, _dir) = issuer();
        seq.define(SequenceDefinition::new("LOT", "L", 3, 40, "")).unwrap();
        let numbers: Vec<u64> = (0..20).map(|_| seq.issue("LOT").unwrap().numeric_value).collect();
        assert_eq!(numbers, (40..60).collect::<Vec<_>>());
        let values: BTreeSet<String> = (0..20).map(|_| seq.issue("LOT").unwrap().value).collect();
        assert_eq!(values.len(), 20);
    }

    #[test]
    fn unknown_key_is_not_found_and_creates_nothing() {
        let (seq, _dir) = issuer();
        assert!(matches!(seq.issue("NOPE"), Err(SequenceError::NotFound(_))));
        assert!(seq.list().unwrap().is_empty());
        assert!(matches!(seq.issue(" "), Err(SequenceError::Invalid(_))));
    }

    #[test]
    fn failed_write_does_not_advance() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(FailingKv {
            inner: RedbStore::open(&dir.path().join("seq.redb")).unwrap(),
            broken: AtomicBool::new(false),
        });
        let seq = SequenceIssuer::new(kv.clone());
        seq.ensure_defaults().unwrap();
        assert_eq!(seq.issue("SUPPLIER").unwrap().value, "SUP0001");

        kv.broken.store(true, Ordering::SeqCst);
        assert!(matches!(
            seq.issue("SUPPLIER"),
            Err(SequenceError::StoreUnavailable(_))
        ));

        kv.broken.store(false, Ordering::SeqCst);
        assert_eq!(seq.issue("SUPPLIER").unwrap().value, "SUP0002");
    }

    #[test]
    fn concurrent_issuers_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KVStore> = Arc::new(RedbStore::open(&dir.path().join("seq.redb")).unwrap());
        let retry = RetryPolicy {
            max_attempts: 10_000,
            base_delay: Duration::from_micros(50),
            max_delay: Duration::from_millis(2),
        };
        // Two issuers over one store, as two request handlers would have.
        let a = SequenceIssuer::with_retry(kv.clone(), retry.clone());
        let b = SequenceIssuer::with_retry(kv, retry);
        a.ensure_defaults().unwrap();

        let codes: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let issuer = if i % 2 == 0 { &a } else { &b };
                    s.spawn(move || {
                        (0..25)
                            .map(|_| issuer.issue("PART_PS").unwrap().value)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let unique: BTreeSet<&String> = codes.iter().collect();
        assert_eq!(unique.len(), 200);
        let expected: BTreeSet<String> = (1..=200).map(|n| format!("PS-{:05}", n)).collect();
        assert_eq!(unique.into_iter().cloned().collect::<BTreeSet<_>>(), expected);
        assert_eq!(a.get("PART_PS").unwrap().next_number, 201);
    }

    #[test]
    fn define_validates_and_rejects_duplicates() {
        let (seq, _dir) = issuer();
        let def = seq.define(SequenceDefinition::new(" po_no ", "PO", 6, 1, "訂單")).unwrap();
        assert_eq!(def.key, "PO_NO");
        assert!(matches!(
            seq.define(SequenceDefinition::new("PO_NO", "X", 1, 1, "")),
            Err(SequenceError::AlreadyDefined(_))
        ));
        assert!(matches!(
            seq.define(SequenceDefinition::new("BAD-KEY", "X", 1, 1, "")),
            Err(SequenceError::Invalid(_))
        ));
        assert!(matches!(
            seq.define(SequenceDefinition::new("WIDE", "X", 19, 1, "")),
            Err(SequenceError::Invalid(_))
        ));
    }

    #[test]
    fn ensure_defaults_keeps_existing_counters() {
        let (seq, _dir) = issuer();
        assert_eq!(seq.ensure_defaults().unwrap(), 5);
        seq.issue("USER").unwrap();
        assert_eq!(seq.ensure_defaults().unwrap(), 0);
        assert_eq!(seq.preview("USER").unwrap().value, "U00002");
        let keys: Vec<String> = seq.list().unwrap().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["EMPLOYEE", "PART_PS", "PURCHASE_METHOD", "SUPPLIER", "USER"]);
    }

    #[test]
    fn preview_does_not_advance() {
        let (seq, _dir) = issuer();
        seq.ensure_defaults().unwrap();
        assert_eq!(seq.preview("PURCHASE_METHOD").unwrap().value, "PM001");
        assert_eq!(seq.preview("PURCHASE_METHOD").unwrap().value, "PM001");
        assert_eq!(seq.issue("PURCHASE_METHOD").unwrap().value, "PM001");
    }

    #[test]
    fn update_only_moves_forward() {
        let (seq, _dir) = issuer();
        seq.ensure_defaults().unwrap();
        let patch = SequencePatch {
            next_number: Some(100),
            prefix: Some("PS".into()),
            ..Default::default()
        };
        let def = seq.update("PART_PS", &patch).unwrap();
        assert_eq!(def.next_number, 100);
        assert_eq!(seq.issue("PART_PS").unwrap().value, "PS00100");

        let back = SequencePatch {
            next_number: Some(5),
            ..Default::default()
        };
        assert!(matches!(seq.update("PART_PS", &back), Err(SequenceError::Invalid(_))));
        assert_eq!(seq.get("PART_PS").unwrap().next_number, 101);
    }

    #[test]
    fn format_is_fixed_once_numbering_started() {
        let (seq, _dir) = issuer();
        seq.define(SequenceDefinition::new("LOT", "A1", 0, 1, "")).unwrap();
        assert_eq!(seq.issue("LOT").unwrap().value, "A11");

        let prefix = SequencePatch {
            prefix: Some("A".into()),
            ..Default::default()
        };
        assert!(matches!(seq.update("LOT", &prefix), Err(SequenceError::Invalid(_))));
        let padding = SequencePatch {
            padding: Some(3),
            ..Default::default()
        };
        assert!(matches!(seq.update("LOT", &padding), Err(SequenceError::Invalid(_))));

        let same = SequencePatch {
            prefix: Some("A1".into()),
            scope: Some("lots".into()),
            ..Default::default()
        };
        assert_eq!(seq.update("LOT", &same).unwrap().scope, "lots");

        let mut issued: BTreeSet<String> = (0..15).map(|_| seq.issue("LOT").unwrap().value).collect();
        issued.insert("A11".into());
        assert_eq!(issued.len(), 16);
    }

    #[test]
    fn define_records_start_number() {
        let (seq, _dir) = issuer();
        let mut def = SequenceDefinition::new("BATCH", "B", 2, 7, "");
        def.start_number = 99;
        assert_eq!(seq.define(def).unwrap().start_number, 7);

        let fresh = SequencePatch {
            prefix: Some("BT".into()),
            next_number: Some(20),
            ..Default::default()
        };
        let def = seq.update("BATCH", &fresh).unwrap();
        assert_eq!(format_code(&def), "BT20");
        let again = SequencePatch {
            prefix: Some("B".into()),
            ..Default::default()
        };
        assert!(matches!(seq.update("BATCH", &again), Err(SequenceError::Invalid(_))));
    }

    #[test]
    fn exhausted_counter_is_conflict() {
        let (seq, _dir) = issuer();
        seq.define(SequenceDefinition::new("MAX", "", 0, u64::MAX, "")).unwrap();
        let err = seq.issue("MAX").unwrap_err();
        assert!(matches!(err, SequenceError::Exhausted(_)));
        assert!(matches!(ServiceError::from(err), ServiceError::Conflict(_)));
    }

    #[test]
    fn file_layer_sequence_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = OverlayKV::new(RedbStore::open(&dir.path().join("seq.redb")).unwrap());
        let def = SequenceDefinition::new("FIXED", "F", 2, 1, "");
        overlay.insert_file_entry("mdm:sequences:FIXED".into(), serde_json::to_vec(&def).unwrap());
        let seq = SequenceIssuer::new(Arc::new(overlay));
        assert!(matches!(seq.issue("FIXED"), Err(SequenceError::ReadOnly(_))));
        assert_eq!(seq.preview("FIXED").unwrap().value, "F01");
    }

    #[test]
    fn error_mapping() {
        let unavailable = ServiceError::from(SequenceError::StoreUnavailable("x".into()));
        assert_eq!(unavailable.status_code().as_u16(), 503);
        let contention = ServiceError::from(SequenceError::Contention {
            key: "K".into(),
            attempts: 8,
        });
        assert_eq!(contention.error_code(), "UNAVAILABLE");
        let missing = ServiceError::from(SequenceError::NotFound("K".into()));
        assert_eq!(missing.status_code().as_u16(), 404);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        for attempt in 1..=20 {
            let d = policy.delay(attempt);
            assert!(d <= policy.max_delay, "attempt {attempt}: {d:?}");
        }
        assert!(policy.delay(1) >= Duration::from_millis(1));
    }
}
