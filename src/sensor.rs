//! Sensor entities projected from the coordinator's cached result.
//!
//! Every sensor is described by a static [`SensorDescription`]; one generic [`Sensor`] reads its value
//! out of a [`CoordinatorState`] according to the description's [`SensorSource`].
use std::fmt;

use serde::Serialize;

use crate::{
    coordinator::CoordinatorState,
    snapshot::{Counter, PollResult},
    DOMAIN, MANUFACTURER, MODEL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Energy,
    Power,
    Water,
    Gas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

/// Units of measurement used by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    #[serde(rename = "Wh")]
    WattHour,
    #[serde(rename = "kWh")]
    KiloWattHour,
    #[serde(rename = "W")]
    Watt,
    #[serde(rename = "m³")]
    CubicMeters,
}

impl Unit {
    /// Symbol of the unit.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::WattHour => "Wh",
            Self::KiloWattHour => "kWh",
            Self::Watt => "W",
            Self::CubicMeters => "m³",
        }
    }

    /// Converts a value expressed in `self` into `target`.
    ///
    /// Returns `None` when the units measure different quantities.
    #[must_use]
    pub fn convert(self, value: f64, target: Self) -> Option<f64> {
        match (self, target) {
            (from, to) if from == to => Some(value),
            (Self::WattHour, Self::KiloWattHour) => Some(value / 1000.0),
            (Self::KiloWattHour, Self::WattHour) => Some(value * 1000.0),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Where a sensor reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    /// Tariff counter of `data.json`.
    Consumption(Counter),
    /// `inst.json` field, named after the input at `input` position.
    Input {
        /// Field of the instantaneous readings.
        key: &'static str,
        /// Position of the input in [`crate::DeviceSnapshot::inputs`].
        input: usize,
    },
}

/// Static description of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub source: SensorSource,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
    pub native_unit: Unit,
    pub suggested_unit: Option<Unit>,
    pub suggested_display_precision: Option<u8>,
}

impl SensorDescription {
    const fn energy(counter: Counter) -> Self {
        Self {
            source: SensorSource::Consumption(counter),
            device_class: DeviceClass::Energy,
            state_class: StateClass::TotalIncreasing,
            native_unit: Unit::WattHour,
            suggested_unit: Some(Unit::KiloWattHour),
            suggested_display_precision: Some(3),
        }
    }

    const fn input(
        key: &'static str,
        input: usize,
        device_class: DeviceClass,
        state_class: StateClass,
        native_unit: Unit,
    ) -> Self {
        Self {
            source: SensorSource::Input { key, input },
            device_class,
            state_class,
            native_unit,
            suggested_unit: None,
            suggested_display_precision: None,
        }
    }

    /// Key of the sensor, unique per device.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self.source {
            SensorSource::Consumption(counter) => counter.key(),
            SensorSource::Input { key, .. } => key,
        }
    }

    /// Unique id of the sensor for a given config entry.
    #[must_use]
    pub fn unique_id(&self, entry_id: &str) -> String {
        match self.source {
            SensorSource::Consumption(counter) => format!("{entry_id}_conso_{}", counter.key()),
            SensorSource::Input { key, .. } => format!("{entry_id}_{key}"),
        }
    }
}

/// Teleinfo tariff counters, one per [`Counter`].
pub static CONSUMPTION_SENSORS: [SensorDescription; 9] = [
    SensorDescription::energy(Counter::Base),
    SensorDescription::energy(Counter::Hc),
    SensorDescription::energy(Counter::Hp),
    SensorDescription::energy(Counter::HcB),
    SensorDescription::energy(Counter::HpB),
    SensorDescription::energy(Counter::HcW),
    SensorDescription::energy(Counter::HpW),
    SensorDescription::energy(Counter::HcR),
    SensorDescription::energy(Counter::HpR),
];

/// Real-time readings, one per input.
pub static INPUT_SENSORS: [SensorDescription; 11] = [
    SensorDescription::input("data1", 0, DeviceClass::Power, StateClass::Measurement, Unit::Watt),
    SensorDescription::input("data2", 1, DeviceClass::Power, StateClass::Measurement, Unit::Watt),
    SensorDescription::input("data3", 2, DeviceClass::Power, StateClass::Measurement, Unit::Watt),
    SensorDescription::input("data4", 3, DeviceClass::Power, StateClass::Measurement, Unit::Watt),
    SensorDescription::input("data5", 4, DeviceClass::Power, StateClass::Measurement, Unit::Watt),
    SensorDescription::input(
        "data6",
        5,
        DeviceClass::Water,
        StateClass::TotalIncreasing,
        Unit::CubicMeters,
    ),
    SensorDescription::input(
        "data7",
        6,
        DeviceClass::Water,
        StateClass::TotalIncreasing,
        Unit::CubicMeters,
    ),
    SensorDescription::input(
        "CIR1_Nrj",
        7,
        DeviceClass::Gas,
        StateClass::TotalIncreasing,
        Unit::CubicMeters,
    ),
    SensorDescription::input(
        "CIR2_Nrj",
        8,
        DeviceClass::Gas,
        StateClass::TotalIncreasing,
        Unit::CubicMeters,
    ),
    SensorDescription::input(
        "CIR3_Nrj",
        9,
        DeviceClass::Gas,
        StateClass::TotalIncreasing,
        Unit::CubicMeters,
    ),
    SensorDescription::input(
        "CIR4_Nrj",
        10,
        DeviceClass::Gas,
        StateClass::TotalIncreasing,
        Unit::CubicMeters,
    ),
];

/// All sensor descriptions, consumption counters first.
pub fn descriptions() -> impl Iterator<Item = &'static SensorDescription> {
    CONSUMPTION_SENSORS.iter().chain(INPUT_SENSORS.iter())
}

/// Value read out of a poll result for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub name: String,
    pub available: bool,
    pub value: Option<f64>,
}

/// Reads a sensor out of a poll result.
///
/// Consumption sensors are named after their key (`hc_b` becomes `HC B`). Input sensors are named after
/// the input label, and are unavailable while the input is disabled.
#[must_use]
pub fn project(description: &SensorDescription, result: &PollResult) -> Projection {
    match description.source {
        SensorSource::Consumption(counter) => Projection {
            name: counter.key().to_uppercase().replace('_', " "),
            available: true,
            value: result.config.consumption.get(counter),
        },
        SensorSource::Input { key, input } => match result.config.input(input) {
            Some(descriptor) => Projection {
                name: descriptor.label.clone(),
                available: !descriptor.disabled,
                value: if descriptor.disabled {
                    None
                } else {
                    result.values.get_f64(key)
                },
            },
            None => Projection {
                name: key.to_owned(),
                available: false,
                value: None,
            },
        },
    }
}

/// Device the sensors belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: (String, String),
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

impl DeviceInfo {
    #[must_use]
    pub fn new(entry_id: &str, name: &str) -> Self {
        Self {
            identifiers: (DOMAIN.to_owned(), entry_id.to_owned()),
            manufacturer: MANUFACTURER.to_owned(),
            model: MODEL.to_owned(),
            name: name.to_owned(),
        }
    }
}

/// State published for a sensor after a coordinator cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub unique_id: String,
    pub name: Option<String>,
    pub available: bool,
    pub native_value: Option<f64>,
    pub unit: Unit,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
}

impl SensorState {
    /// Value in the suggested display unit, rounded to the suggested precision.
    #[must_use]
    pub fn display_value(&self, description: &SensorDescription) -> Option<f64> {
        let value = self.native_value?;
        let value = match description.suggested_unit {
            Some(unit) => description.native_unit.convert(value, unit)?,
            None => value,
        };
        Some(match description.suggested_display_precision {
            Some(precision) => {
                let factor = 10_f64.powi(i32::from(precision));
                (value * factor).round() / factor
            }
            None => value,
        })
    }

    /// Unit of [`Self::display_value`].
    #[must_use]
    pub fn display_unit(description: &SensorDescription) -> Unit {
        description.suggested_unit.unwrap_or(description.native_unit)
    }
}

/// A sensor entity bound to a config entry.
///
/// Keeps the last value it has seen, so a disabled input or a failed cycle does not erase it.
#[derive(Debug, Clone)]
pub struct Sensor {
    description: &'static SensorDescription,
    state: SensorState,
}

impl Sensor {
    #[must_use]
    pub fn new(description: &'static SensorDescription, entry_id: &str) -> Self {
        Self {
            description,
            state: SensorState {
                unique_id: description.unique_id(entry_id),
                name: None,
                available: false,
                native_value: None,
                unit: description.native_unit,
                device_class: description.device_class,
                state_class: description.state_class,
            },
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static SensorDescription {
        self.description
    }

    #[must_use]
    pub const fn state(&self) -> &SensorState {
        &self.state
    }

    /// Updates the sensor after a coordinator cycle and returns its new state.
    pub fn handle_update(&mut self, state: &CoordinatorState, failure_threshold: u32) -> &SensorState {
        let coordinator_available = state.is_available(failure_threshold);
        if let Some(result) = state.data() {
            let projection = project(self.description, result);
            self.state.name = Some(projection.name);
            self.state.available = coordinator_available && projection.available;
            if projection.available {
                self.state.native_value = projection.value;
            }
        } else {
            self.state.available = false;
        }
        &self.state
    }
}

/// Creates the 20 sensors of a config entry.
#[must_use]
pub fn sensors_for_entry(entry_id: &str) -> Vec<Sensor> {
    descriptions()
        .map(|description| Sensor::new(description, entry_id))
        .collect()
}
