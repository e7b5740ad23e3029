//! Market Data Store
//!
//! Normalizes inbound data frames into a per-symbol [`MarketRecord`] and
//! merges successive frames field by field.
//!
//! # Normalization
//!
//! Canonical numeric fields are parsed into [`Decimal`]. Two fields arrive
//! under more than one name; the primary alias wins:
//!
//! | Field           | Primary    | Fallback        |
//! |-----------------|------------|-----------------|
//! | `changePercent` | `p_change` | `changePercent` |
//! | `volume`        | `tot_vol`  | `volume`        |
//!
//! A field that is missing, `null` or unparseable is absent, never zero.
//! Every other non-null key in the frame is kept as a passthrough field.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::serde::float_option;
use serde::Serialize;
use serde_json::{Map, Value};

/// Symbol key of a market record.
pub type Symbol = String;

/// Raw field map of an inbound data frame.
pub type RawFields = Map<String, Value>;

/// Keys consumed by normalization, including aliases and the symbol itself.
const CANONICAL_KEYS: &[&str] = &[
    "symbol",
    "ltp",
    "change",
    "p_change",
    "changePercent",
    "tot_vol",
    "volume",
    "high",
    "low",
    "open",
    "close",
];

// =============================================================================
// Canonical Fields
// =============================================================================

/// Canonical numeric fields of a market record. Present values serialize
/// as JSON numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFields {
    /// Last traded price.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub ltp: Option<Decimal>,
    /// Absolute change.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub change: Option<Decimal>,
    /// Percent change.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub change_percent: Option<Decimal>,
    /// Traded volume.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<Decimal>,
    /// Session high.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub high: Option<Decimal>,
    /// Session low.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub low: Option<Decimal>,
    /// Session open.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub open: Option<Decimal>,
    /// Previous close.
    #[serde(
        serialize_with = "float_option::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub close: Option<Decimal>,
}

impl MarketFields {
    /// Extract canonical fields from a raw frame, applying aliases.
    #[must_use]
    pub fn from_raw(raw: &RawFields) -> Self {
        Self {
            ltp: number(raw, "ltp"),
            change: number(raw, "change"),
            change_percent: number(raw, "p_change").or_else(|| number(raw, "changePercent")),
            volume: number(raw, "tot_vol").or_else(|| number(raw, "volume")),
            high: number(raw, "high"),
            low: number(raw, "low"),
            open: number(raw, "open"),
            close: number(raw, "close"),
        }
    }

    /// Overwrite fields that are present in `update`.
    pub fn merge(&mut self, update: &Self) {
        merge_field(&mut self.ltp, update.ltp);
        merge_field(&mut self.change, update.change);
        merge_field(&mut self.change_percent, update.change_percent);
        merge_field(&mut self.volume, update.volume);
        merge_field(&mut self.high, update.high);
        merge_field(&mut self.low, update.low);
        merge_field(&mut self.open, update.open);
        merge_field(&mut self.close, update.close);
    }
}

fn merge_field(slot: &mut Option<Decimal>, update: Option<Decimal>) {
    if update.is_some() {
        *slot = update;
    }
}

/// Parse a numeric field that may arrive as a JSON number or a numeric string.
fn number(raw: &RawFields, key: &str) -> Option<Decimal> {
    let text = match raw.get(key)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    let parsed = Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text));
    if parsed.is_err() {
        tracing::debug!(field = key, value = %text, "Ignoring non-numeric market field");
    }
    parsed.ok()
}

// =============================================================================
// Market Record
// =============================================================================

/// Latest known market state for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketRecord {
    /// Symbol this record belongs to. Never changes.
    pub symbol: Symbol,
    /// Canonical numeric fields.
    #[serde(flatten)]
    pub fields: MarketFields,
    /// Non-canonical fields carried through from the raw frames.
    #[serde(flatten)]
    pub extra: RawFields,
}

impl MarketRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            fields: MarketFields::default(),
            extra: Map::new(),
        }
    }

    /// Merge a raw frame onto this record.
    pub fn apply(&mut self, raw: &RawFields) {
        self.fields.merge(&MarketFields::from_raw(raw));

        for (key, value) in raw {
            if value.is_null() || CANONICAL_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

// =============================================================================
// Market Data Store
// =============================================================================

/// Mapping from symbol to its latest merged record.
#[derive(Debug, Clone, Default)]
pub struct MarketDataStore {
    records: HashMap<Symbol, MarketRecord>,
}

impl MarketDataStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or merge the record for `symbol`.
    pub fn ingest(&mut self, symbol: &str, raw: &RawFields) -> &MarketRecord {
        let record = self
            .records
            .entry(symbol.to_string())
            .or_insert_with(|| MarketRecord::new(symbol));
        record.apply(raw);
        record
    }

    /// Delete the record for `symbol`.
    pub fn remove(&mut self, symbol: &str) -> Option<MarketRecord> {
        self.records.remove(symbol)
    }

    /// Delete every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Get the record for `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&MarketRecord> {
        self.records.get(symbol)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by symbol.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Symbol, MarketRecord> {
        self.records
            .iter()
            .map(|(symbol, record)| (symbol.clone(), record.clone()))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn raw(value: Value) -> RawFields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn first_frame_creates_record() {
        let mut store = MarketDataStore::new();

        let record = store.ingest("NSECM:2885", &raw(json!({"ltp": 101.5, "high": 103})));

        assert_eq!(record.symbol, "NSECM:2885");
        assert_eq!(record.fields.ltp, Some(Decimal::new(1015, 1)));
        assert_eq!(record.fields.high, Some(Decimal::from(103)));
        assert_eq!(record.fields.low, None);
    }

    #[test]
    fn later_frame_merges_present_fields_only() {
        let mut store = MarketDataStore::new();

        store.ingest(
            "NSECM:2885",
            &raw(json!({"symbol": "NSECM:2885", "ltp": 101.5, "p_change": 1.2})),
        );
        store.ingest("NSECM:2885", &raw(json!({"symbol": "NSECM:2885", "ltp": 102.0})));

        let record = store.get("NSECM:2885").unwrap();
        assert_eq!(record.fields.ltp, Some(Decimal::new(1020, 1)));
        assert_eq!(record.fields.change_percent, Some(Decimal::new(12, 1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn null_does_not_overwrite() {
        let mut store = MarketDataStore::new();

        store.ingest("A", &raw(json!({"ltp": 10, "note": "x"})));
        store.ingest("A", &raw(json!({"ltp": null, "note": null})));

        let record = store.get("A").unwrap();
        assert_eq!(record.fields.ltp, Some(Decimal::from(10)));
        assert_eq!(record.extra.get("note"), Some(&json!("x")));
    }

    #[test]
    fn zero_is_a_value_not_absence() {
        let mut store = MarketDataStore::new();

        store.ingest("A", &raw(json!({"change": 0})));

        let record = store.get("A").unwrap();
        assert_eq!(record.fields.change, Some(Decimal::ZERO));
        assert_eq!(record.fields.volume, None);
    }

    #[test_case(json!({"p_change": 1.5, "changePercent": 9}), Some(Decimal::new(15, 1)) ; "primary wins")]
    #[test_case(json!({"changePercent": 2.25}), Some(Decimal::new(225, 2)) ; "fallback used")]
    #[test_case(json!({"p_change": null, "changePercent": 3}), Some(Decimal::from(3)) ; "null primary falls back")]
    #[test_case(json!({}), None ; "absent when neither")]
    fn change_percent_aliases(frame: Value, expected: Option<Decimal>) {
        assert_eq!(MarketFields::from_raw(&raw(frame)).change_percent, expected);
    }

    #[test_case(json!({"tot_vol": 1200, "volume": 5}), Some(Decimal::from(1200)) ; "primary wins")]
    #[test_case(json!({"volume": "350"}), Some(Decimal::from(350)) ; "numeric string fallback")]
    #[test_case(json!({"tot_vol": "n/a"}), None ; "unparseable is absent")]
    fn volume_aliases(frame: Value, expected: Option<Decimal>) {
        assert_eq!(MarketFields::from_raw(&raw(frame)).volume, expected);
    }

    #[test]
    fn extra_fields_pass_through() {
        let mut store = MarketDataStore::new();

        store.ingest(
            "A",
            &raw(json!({"symbol": "A", "ltp": 1, "exchange": "NSE", "bids": [[1, 2]]})),
        );

        let record = store.get("A").unwrap();
        assert_eq!(record.extra.get("exchange"), Some(&json!("NSE")));
        assert_eq!(record.extra.get("bids"), Some(&json!([[1, 2]])));
        assert!(!record.extra.contains_key("symbol"));
        assert!(!record.extra.contains_key("ltp"));
    }

    #[test]
    fn remove_and_clear() {
        let mut store = MarketDataStore::new();
        store.ingest("A", &raw(json!({"ltp": 1})));
        store.ingest("B", &raw(json!({"ltp": 2})));

        assert!(store.remove("A").is_some());
        assert!(store.get("A").is_none());
        assert!(store.remove("A").is_none());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_fields_are_numbers() {
        let mut store = MarketDataStore::new();
        store.ingest("NSECM:2885", &raw(json!({"ltp": "101.5", "tot_vol": 1200, "high": -3})));

        let json = serde_json::to_value(store.get("NSECM:2885").unwrap()).unwrap();
        assert!(json["ltp"].is_number());
        assert_eq!(json["ltp"].as_f64(), Some(101.5));
        assert_eq!(json["volume"].as_f64(), Some(1200.0));
        assert_eq!(json["high"].as_f64(), Some(-3.0));
    }

    #[test]
    fn record_serializes_flat() {
        let mut store = MarketDataStore::new();
        store.ingest("NSECM:2885", &raw(json!({"ltp": 102.0, "p_change": 1.2, "ex": "NSE"})));

        let json = serde_json::to_value(store.get("NSECM:2885").unwrap()).unwrap();
        assert_eq!(json["symbol"], "NSECM:2885");
        assert_eq!(json["changePercent"], json!(1.2));
        assert_eq!(json["ltp"], json!(102.0));
        assert_eq!(json["ex"], "NSE");
        assert!(json.get("volume").is_none());
    }

    proptest! {
        #[test]
        fn second_frame_wins_where_present(
            first in prop::collection::vec(prop::option::of(-10_000i64..10_000), 8),
            second in prop::collection::vec(prop::option::of(-10_000i64..10_000), 8),
        ) {
            const KEYS: [&str; 8] = ["ltp", "change", "p_change", "tot_vol", "high", "low", "open", "close"];
            let frame = |values: &[Option<i64>]| -> RawFields {
                KEYS.iter()
                    .zip(values)
                    .filter_map(|(k, &v)| v.map(|v| ((*k).to_string(), json!(v))))
                    .collect()
            };

            let mut store = MarketDataStore::new();
            store.ingest("S", &frame(&first));
            store.ingest("S", &frame(&second));

            let fields = &store.get("S").unwrap().fields;
            let merged = [
                fields.ltp, fields.change, fields.change_percent, fields.volume,
                fields.high, fields.low, fields.open, fields.close,
            ];
            for ((a, b), got) in first.iter().zip(&second).zip(merged) {
                let expected = (*b).or(*a).map(Decimal::from);
                prop_assert_eq!(got, expected);
            }
        }
    }
}
