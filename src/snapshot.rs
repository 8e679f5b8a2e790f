//! Normalized device data.
//!
//! The device reports its configuration as one flat JSON object with numbered field names
//! (`label_entree1`, `label_entree_imp0`, `entree_imp0_disabled`, ...). [`DeviceSnapshot`] reshapes it
//! into nested consumption counters and a fixed, position-addressed list of inputs.
use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Label forced on disabled inputs.
pub const DISABLED_LABEL: &str = "N/A";

/// Number of power metering circuits.
pub const POWER_INPUT_COUNT: usize = 5;

/// Number of pulse counter circuits.
pub const PULSE_INPUT_COUNT: usize = 6;

/// Total number of inputs reported by the device.
pub const INPUT_COUNT: usize = POWER_INPUT_COUNT + PULSE_INPUT_COUNT;

/// Reason why a payload could not be normalized.
///
/// Turned into [`crate::error::ClientError::MalformedResponse`] by the client, which knows the url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeError(String);

impl NormalizeError {
    fn missing(field: &str) -> Self {
        Self(format!("missing field `{field}`"))
    }

    fn mistyped(field: &str, expected: &str) -> Self {
        Self(format!("field `{field}` is not {expected}"))
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tariff-period energy counters kept by the teleinfo (TIC) interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    /// Single rate.
    Base,
    /// Off-peak hours.
    Hc,
    /// Peak hours.
    Hp,
    /// Off-peak, blue days.
    HcB,
    /// Peak, blue days.
    HpB,
    /// Off-peak, white days.
    HcW,
    /// Peak, white days.
    HpW,
    /// Off-peak, red days.
    HcR,
    /// Peak, red days.
    HpR,
}

impl Counter {
    /// All counters, in device order.
    pub const ALL: [Self; 9] = [
        Self::Base,
        Self::Hc,
        Self::Hp,
        Self::HcB,
        Self::HpB,
        Self::HcW,
        Self::HpW,
        Self::HcR,
        Self::HpR,
    ];

    /// Key of the counter, the device field name without its `conso_` prefix.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Hc => "hc",
            Self::Hp => "hp",
            Self::HcB => "hc_b",
            Self::HpB => "hp_b",
            Self::HcW => "hc_w",
            Self::HpW => "hp_w",
            Self::HcR => "hc_r",
            Self::HpR => "hp_r",
        }
    }

    /// Looks a counter up by its key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|counter| counter.key() == key)
    }

    fn source_field(self) -> String {
        format!("conso_{}", self.key())
    }
}

/// Lifetime energy counters in watt-hours, one per [`Counter`].
///
/// Readings are kept as reported, integer counters stay integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumption(BTreeMap<Counter, Number>);

impl Consumption {
    /// Reading of a counter as reported by the device.
    #[must_use]
    pub fn raw(&self, counter: Counter) -> Option<&Number> {
        self.0.get(&counter)
    }

    /// Reading of a counter, converted to a float.
    #[must_use]
    pub fn get(&self, counter: Counter) -> Option<f64> {
        self.raw(counter).and_then(Number::as_f64)
    }

    /// Reading of a counter by key, for instance `"hc_b"`.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<f64> {
        Counter::from_key(key).and_then(|counter| self.get(counter))
    }

    /// Iterates readings in device order.
    pub fn iter(&self) -> impl Iterator<Item = (Counter, &Number)> + '_ {
        self.0.iter().map(|(counter, value)| (*counter, value))
    }

    /// Number of counters, always 9 for a normalized snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no counter is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What an input measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Current clamp measuring electrical power.
    Power,
    /// Pulse counter (water, gas, ...).
    Pulse,
}

/// One metering channel of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDescriptor {
    /// Trimmed user label, or [`DISABLED_LABEL`] when the input is disabled.
    pub label: String,
    /// What the input measures.
    pub kind: InputKind,
    /// Raw `type_imp_*` discriminant for pulse inputs, 0 for power inputs.
    pub type_code: i64,
    /// Disabled inputs are not wired and their values are meaningless.
    pub disabled: bool,
}

impl InputDescriptor {
    /// Power input, never disabled.
    #[must_use]
    pub fn power(label: &str) -> Self {
        Self {
            label: label.trim().to_owned(),
            kind: InputKind::Power,
            type_code: 0,
            disabled: false,
        }
    }

    /// Pulse input; the label is replaced when the input is disabled.
    #[must_use]
    pub fn pulse(label: &str, type_code: i64, disabled: bool) -> Self {
        let label = if disabled { DISABLED_LABEL } else { label.trim() };
        Self {
            label: label.to_owned(),
            kind: InputKind::Pulse,
            type_code,
            disabled,
        }
    }
}

/// Normalized `data.json` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// `option_tarifaire`, passed through.
    pub tariff_option: i64,
    /// `tarif_courant`, passed through.
    pub current_tariff: i64,
    /// `isousc`, subscribed current in amperes.
    pub subscribed_current: i64,
    /// Energy counters.
    pub consumption: Consumption,
    /// Power inputs at positions 0..5, pulse inputs at 5..11.
    pub inputs: Vec<InputDescriptor>,
}

impl DeviceSnapshot {
    /// Normalizes a raw `data.json` payload.
    ///
    /// # Errors
    ///
    /// Will return an error if the payload is not an object, or if any of the expected fields is
    /// missing or has an unexpected type.
    pub fn from_raw(raw: &Value) -> Result<Self, NormalizeError> {
        let fields = raw
            .as_object()
            .ok_or_else(|| NormalizeError("expected a JSON object".to_owned()))?;

        let consumption = Counter::ALL
            .into_iter()
            .map(|counter| Ok((counter, number(fields, &counter.source_field())?)))
            .collect::<Result<BTreeMap<_, _>, NormalizeError>>()?;

        let mut inputs = Vec::with_capacity(INPUT_COUNT);
        // Power labels are numbered from 1, pulse fields from 0.
        for i in 1..=POWER_INPUT_COUNT {
            let label = string(fields, &format!("label_entree{i}"))?;
            inputs.push(InputDescriptor::power(label));
        }
        for i in 0..PULSE_INPUT_COUNT {
            let label = string(fields, &format!("label_entree_imp{i}"))?;
            let type_code = integer(fields, &format!("type_imp_{i}"))?;
            let disabled = truthy(field(fields, &format!("entree_imp{i}_disabled"))?);
            inputs.push(InputDescriptor::pulse(label, type_code, disabled));
        }

        Ok(Self {
            tariff_option: integer(fields, "option_tarifaire")?,
            current_tariff: integer(fields, "tarif_courant")?,
            subscribed_current: integer(fields, "isousc")?,
            consumption: Consumption(consumption),
            inputs,
        })
    }

    /// Input at a given position.
    #[must_use]
    pub fn input(&self, index: usize) -> Option<&InputDescriptor> {
        self.inputs.get(index)
    }
}

/// Raw `inst.json` payload, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InstantSnapshot(Map<String, Value>);

impl InstantSnapshot {
    /// Wraps a raw `inst.json` payload.
    ///
    /// # Errors
    ///
    /// Will return an error if the payload is not a JSON object.
    pub fn from_raw(raw: Value) -> Result<Self, NormalizeError> {
        match raw {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(NormalizeError("expected a JSON object".to_owned())),
        }
    }

    /// Raw value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric value of a field, if present and numeric.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// All fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Unit of data cached by the coordinator and read by every sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResult {
    /// Normalized `data.json`.
    pub config: DeviceSnapshot,
    /// Raw `inst.json`.
    pub values: InstantSnapshot,
}

/// `data.json` of a device with five named power circuits, one water counter and five disabled
/// pulse inputs.
#[cfg(any(test, feature = "simulator"))]
pub(crate) fn sample_payload() -> Value {
    serde_json::json!({
        "option_tarifaire": 4,
        "tarif_courant": 11,
        "isousc": 0,
        "conso_base": 0,
        "conso_hc": 1_234_567,
        "conso_hp": 2_345_678,
        "conso_hc_b": 0,
        "conso_hp_b": 0,
        "conso_hc_w": 0,
        "conso_hp_w": 0,
        "conso_hc_r": 0,
        "conso_hp_r": 0,
        "type_imp_0": 1,
        "type_imp_1": 1,
        "type_imp_2": 1,
        "type_imp_3": 1,
        "type_imp_4": 1,
        "type_imp_5": 1,
        "label_entree1": "Consommation globale",
        "label_entree2": "Cumulus             ",
        "label_entree3": "Cuisine             ",
        "label_entree4": "Prises de Courant",
        "label_entree5": "Informatique        ",
        "label_entree_imp0": "Eau",
        "label_entree_imp1": "Gaz",
        "label_entree_imp2": "Eau Chaude",
        "label_entree_imp3": "Chauffage",
        "label_entree_imp4": "Climatisation",
        "label_entree_imp5": "Piscine",
        "entree_imp0_disabled": 0,
        "entree_imp1_disabled": 1,
        "entree_imp2_disabled": 1,
        "entree_imp3_disabled": 1,
        "entree_imp4_disabled": 1,
        "entree_imp5_disabled": 1
    })
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value, NormalizeError> {
    fields.get(name).ok_or_else(|| NormalizeError::missing(name))
}

fn number(fields: &Map<String, Value>, name: &str) -> Result<Number, NormalizeError> {
    match field(fields, name)? {
        Value::Number(n) => Ok(n.clone()),
        _ => Err(NormalizeError::mistyped(name, "a number")),
    }
}

fn integer(fields: &Map<String, Value>, name: &str) -> Result<i64, NormalizeError> {
    field(fields, name)?
        .as_i64()
        .ok_or_else(|| NormalizeError::mistyped(name, "an integer"))
}

fn string<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a str, NormalizeError> {
    field(fields, name)?
        .as_str()
        .ok_or_else(|| NormalizeError::mistyped(name, "a string"))
}

/// Firmware flags are usually 0/1 integers, but booleans and strings are accepted too.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(items) => !items.is_empty(),
    }
}
