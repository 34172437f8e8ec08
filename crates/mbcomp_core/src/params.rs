//! Parameter Store
//!
//! Every control value of the processor lives in one `AtomicU32` (f32 bits)
//! owned by the [`ParameterStore`]. The UI/host writes, the audio thread
//! reads once per block through typed handles that were resolved up front,
//! so the per-block path never does a string lookup or a kind check.
//!
//! # Architecture
//!
//! ```text
//! ParamId ──index()──▶ [AtomicU32; NUM_PARAMS]
//!    │                        ▲
//!    └─ spec() ─ sanitize ────┘  (clamp / snap / round on every write)
//!
//! ProcessorParams (typed handles) ──snapshot()──▶ ParameterSnapshot
//! ```
//!
//! Reads of different parameters within one snapshot are not atomic as a
//! group; a snapshot may mix values from before and after a concurrent
//! write. That is acceptable for control data.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use mbcomp_dsp::{Band, BandFlags, CompressorSettings, DEFAULT_RATIO_INDEX, NUM_BANDS, RATIO_CHOICES};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

pub const NUM_PARAMS: usize = 25;

/// Version written into [`ParameterState`]
pub const STATE_VERSION: u32 = 1;

/// Number of per-band parameter kinds (threshold .. mute)
const PER_BAND_KINDS: usize = 7;

/// External names, in [`ParamId::index`] order
const NAMES: [&str; NUM_PARAMS] = [
    "Threshold_Low_Band",
    "Threshold_Mid_Band",
    "Threshold_High_Band",
    "Attack_Low_Band",
    "Attack_Mid_Band",
    "Attack_High_Band",
    "Release_Low_Band",
    "Release_Mid_Band",
    "Release_High_Band",
    "Ratio_Low_Band",
    "Ratio_Mid_Band",
    "Ratio_High_Band",
    "Bypassed_Low_Band",
    "Bypassed_Mid_Band",
    "Bypassed_High_Band",
    "Solo_Low_Band",
    "Solo_Mid_Band",
    "Solo_High_Band",
    "Mute_Low_Band",
    "Mute_Mid_Band",
    "Mute_High_Band",
    "Low_Mid_Crossover_Freq",
    "Mid_High_Crossover_Freq",
    "Gain_In",
    "Gain_Out",
];

/// Strongly typed parameter identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Threshold(Band),
    Attack(Band),
    Release(Band),
    Ratio(Band),
    Bypassed(Band),
    Solo(Band),
    Mute(Band),
    LowMidCrossover,
    MidHighCrossover,
    GainIn,
    GainOut,
}

impl ParamId {
    /// Dense storage index in `0..NUM_PARAMS`
    pub const fn index(self) -> usize {
        let (kind, band) = match self {
            ParamId::Threshold(band) => (0, band),
            ParamId::Attack(band) => (1, band),
            ParamId::Release(band) => (2, band),
            ParamId::Ratio(band) => (3, band),
            ParamId::Bypassed(band) => (4, band),
            ParamId::Solo(band) => (5, band),
            ParamId::Mute(band) => (6, band),
            ParamId::LowMidCrossover => return 21,
            ParamId::MidHighCrossover => return 22,
            ParamId::GainIn => return 23,
            ParamId::GainOut => return 24,
        };
        kind * NUM_BANDS + band.index()
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index < PER_BAND_KINDS * NUM_BANDS {
            let band = Band::from_index(index % NUM_BANDS)?;
            let id = match index / NUM_BANDS {
                0 => ParamId::Threshold(band),
                1 => ParamId::Attack(band),
                2 => ParamId::Release(band),
                3 => ParamId::Ratio(band),
                4 => ParamId::Bypassed(band),
                5 => ParamId::Solo(band),
                _ => ParamId::Mute(band),
            };
            return Some(id);
        }
        match index {
            21 => Some(ParamId::LowMidCrossover),
            22 => Some(ParamId::MidHighCrossover),
            23 => Some(ParamId::GainIn),
            24 => Some(ParamId::GainOut),
            _ => None,
        }
    }

    /// All parameters in index order
    pub fn iter() -> impl Iterator<Item = ParamId> {
        (0..NUM_PARAMS).filter_map(Self::from_index)
    }

    /// External name, e.g. `"Ratio_Mid_Band"`
    pub fn name(self) -> &'static str {
        NAMES[self.index()]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .and_then(Self::from_index)
    }

    /// Range, step and default of this parameter
    pub fn spec(self) -> ParamSpec {
        match self {
            ParamId::Threshold(_) => ParamSpec::Float {
                min: -60.0,
                max: 12.0,
                step: 1.0,
                default: 0.0,
            },
            ParamId::Attack(_) => ParamSpec::Float {
                min: 5.0,
                max: 500.0,
                step: 1.0,
                default: 50.0,
            },
            ParamId::Release(_) => ParamSpec::Float {
                min: 5.0,
                max: 500.0,
                step: 1.0,
                default: 250.0,
            },
            ParamId::Ratio(_) => ParamSpec::Choice {
                choices: &RATIO_CHOICES,
                default_index: DEFAULT_RATIO_INDEX,
            },
            ParamId::Bypassed(_) | ParamId::Solo(_) | ParamId::Mute(_) => {
                ParamSpec::Bool { default: false }
            }
            ParamId::LowMidCrossover => ParamSpec::Float {
                min: 20.0,
                max: 999.0,
                step: 1.0,
                default: 400.0,
            },
            ParamId::MidHighCrossover => ParamSpec::Float {
                min: 1000.0,
                max: 20000.0,
                step: 1.0,
                default: 2000.0,
            },
            ParamId::GainIn | ParamId::GainOut => ParamSpec::Float {
                min: -24.0,
                max: 24.0,
                step: 0.5,
                default: 0.0,
            },
        }
    }
}

/// Tagged parameter description
///
/// Choice parameters store their selected index; bool parameters store
/// 0.0 or 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSpec {
    Float {
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    },
    Choice {
        choices: &'static [f32],
        default_index: usize,
    },
    Bool {
        default: bool,
    },
}

impl ParamSpec {
    pub fn default_value(&self) -> f32 {
        match *self {
            ParamSpec::Float { default, .. } => default,
            ParamSpec::Choice { default_index, .. } => default_index as f32,
            ParamSpec::Bool { default } => bool_value(default),
        }
    }

    /// Clamp, snap and round a raw value into this parameter's domain
    pub fn sanitize(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default_value();
        }
        match *self {
            ParamSpec::Float { min, max, step, .. } => {
                let clamped = value.clamp(min, max);
                if step > 0.0 {
                    (min + ((clamped - min) / step).round() * step).clamp(min, max)
                } else {
                    clamped
                }
            }
            ParamSpec::Choice { choices, .. } => {
                value.round().clamp(0.0, (choices.len() - 1) as f32)
            }
            ParamSpec::Bool { .. } => bool_value(value >= 0.5),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamSpec::Float { .. } => "float",
            ParamSpec::Choice { .. } => "choice",
            ParamSpec::Bool { .. } => "bool",
        }
    }
}

fn bool_value(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Handle to a float parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatParam {
    id: ParamId,
}

impl FloatParam {
    pub fn id(&self) -> ParamId {
        self.id
    }

    #[inline]
    pub fn get(&self, store: &ParameterStore) -> f32 {
        store.load(self.id.index())
    }
}

/// Handle to a choice parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoiceParam {
    id: ParamId,
    choices: &'static [f32],
}

impl ChoiceParam {
    pub fn id(&self) -> ParamId {
        self.id
    }

    /// Selected index
    #[inline]
    pub fn index(&self, store: &ParameterStore) -> usize {
        store.load(self.id.index()) as usize
    }

    /// Value of the selected choice
    #[inline]
    pub fn get(&self, store: &ParameterStore) -> f32 {
        self.choices[self.index(store).min(self.choices.len() - 1)]
    }
}

/// Handle to a bool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolParam {
    id: ParamId,
}

impl BoolParam {
    pub fn id(&self) -> ParamId {
        self.id
    }

    #[inline]
    pub fn get(&self, store: &ParameterStore) -> bool {
        store.load(self.id.index()) >= 0.5
    }
}

/// Serializable parameter set, keyed by external name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    pub version: u32,
    pub values: BTreeMap<String, f32>,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            values: ParamId::iter()
                .map(|id| (id.name().to_string(), id.spec().default_value()))
                .collect(),
        }
    }
}

/// Lock-free store of all parameter values
pub struct ParameterStore {
    values: [AtomicU32; NUM_PARAMS],
}

impl ParameterStore {
    /// Store with every parameter at its default
    pub fn new() -> Self {
        Self {
            values: core::array::from_fn(|index| {
                let default = ParamId::from_index(index).map_or(0.0, |id| id.spec().default_value());
                AtomicU32::new(default.to_bits())
            }),
        }
    }

    #[inline]
    fn load(&self, index: usize) -> f32 {
        f32::from_bits(self.values[index].load(Ordering::Relaxed))
    }

    /// Write a value; returns the sanitized value actually stored
    pub fn set(&self, id: ParamId, value: f32) -> f32 {
        let sanitized = id.spec().sanitize(value);
        self.values[id.index()].store(sanitized.to_bits(), Ordering::Relaxed);
        sanitized
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.load(id.index())
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> EngineResult<f32> {
        let id = ParamId::from_name(name).ok_or_else(|| EngineError::UnknownParameter(name.to_string()))?;
        Ok(self.set(id, value))
    }

    pub fn get_by_name(&self, name: &str) -> EngineResult<f32> {
        ParamId::from_name(name)
            .map(|id| self.get(id))
            .ok_or_else(|| EngineError::UnknownParameter(name.to_string()))
    }

    pub fn reset_to_defaults(&self) {
        for id in ParamId::iter() {
            self.set(id, id.spec().default_value());
        }
        debug!("Parameters reset to defaults");
    }

    pub fn float(&self, id: ParamId) -> EngineResult<FloatParam> {
        match id.spec() {
            ParamSpec::Float { .. } => Ok(FloatParam { id }),
            _ => Err(kind_mismatch(id, "float")),
        }
    }

    pub fn choice(&self, id: ParamId) -> EngineResult<ChoiceParam> {
        match id.spec() {
            ParamSpec::Choice { choices, .. } => Ok(ChoiceParam { id, choices }),
            _ => Err(kind_mismatch(id, "choice")),
        }
    }

    pub fn boolean(&self, id: ParamId) -> EngineResult<BoolParam> {
        match id.spec() {
            ParamSpec::Bool { .. } => Ok(BoolParam { id }),
            _ => Err(kind_mismatch(id, "bool")),
        }
    }

    /// Capture every value for persistence
    pub fn state(&self) -> ParameterState {
        ParameterState {
            version: STATE_VERSION,
            values: ParamId::iter()
                .map(|id| (id.name().to_string(), self.get(id)))
                .collect(),
        }
    }

    /// Apply a saved state
    ///
    /// The whole state is checked before anything is written: on error the
    /// store is left untouched. Unknown names are skipped with a warning,
    /// parameters missing from the state keep their current value.
    pub fn restore(&self, state: &ParameterState) -> EngineResult<()> {
        if state.version == 0 || state.version > STATE_VERSION {
            return Err(EngineError::InvalidState(format!(
                "Unsupported state version {}",
                state.version
            )));
        }
        if let Some((name, value)) = state.values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::InvalidState(format!(
                "Non-finite value {} for {}",
                value, name
            )));
        }

        let mut applied = 0;
        for (name, value) in &state.values {
            match ParamId::from_name(name) {
                Some(id) => {
                    self.set(id, *value);
                    applied += 1;
                }
                None => warn!("Skipping unknown parameter in saved state: {}", name),
            }
        }

        info!("Restored {} parameters", applied);
        Ok(())
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.state())?)
    }

    pub fn restore_json(&self, json: &str) -> EngineResult<()> {
        let state: ParameterState = serde_json::from_str(json)?;
        self.restore(&state)
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_mismatch(id: ParamId, expected: &'static str) -> EngineError {
    EngineError::ParameterKindMismatch {
        name: id.name(),
        expected,
        found: id.spec().kind_name(),
    }
}

/// Per-band handles
#[derive(Debug, Clone, Copy)]
pub struct BandParams {
    pub threshold: FloatParam,
    pub attack: FloatParam,
    pub release: FloatParam,
    pub ratio: ChoiceParam,
    pub bypassed: BoolParam,
    pub solo: BoolParam,
    pub mute: BoolParam,
}

impl BandParams {
    fn resolve(store: &ParameterStore, band: Band) -> EngineResult<Self> {
        Ok(Self {
            threshold: store.float(ParamId::Threshold(band))?,
            attack: store.float(ParamId::Attack(band))?,
            release: store.float(ParamId::Release(band))?,
            ratio: store.choice(ParamId::Ratio(band))?,
            bypassed: store.boolean(ParamId::Bypassed(band))?,
            solo: store.boolean(ParamId::Solo(band))?,
            mute: store.boolean(ParamId::Mute(band))?,
        })
    }

    fn snapshot(&self, store: &ParameterStore) -> BandSnapshot {
        BandSnapshot {
            settings: CompressorSettings {
                attack_ms: self.attack.get(store),
                release_ms: self.release.get(store),
                threshold_db: self.threshold.get(store),
                ratio: self.ratio.get(store),
            },
            flags: BandFlags {
                bypassed: self.bypassed.get(store),
                solo: self.solo.get(store),
                mute: self.mute.get(store),
            },
        }
    }
}

/// Every handle the processor needs, resolved once
#[derive(Debug, Clone, Copy)]
pub struct ProcessorParams {
    pub bands: [BandParams; NUM_BANDS],
    pub low_mid_crossover: FloatParam,
    pub mid_high_crossover: FloatParam,
    pub gain_in: FloatParam,
    pub gain_out: FloatParam,
}

impl ProcessorParams {
    pub fn resolve(store: &ParameterStore) -> EngineResult<Self> {
        Ok(Self {
            bands: [
                BandParams::resolve(store, Band::Low)?,
                BandParams::resolve(store, Band::Mid)?,
                BandParams::resolve(store, Band::High)?,
            ],
            low_mid_crossover: store.float(ParamId::LowMidCrossover)?,
            mid_high_crossover: store.float(ParamId::MidHighCrossover)?,
            gain_in: store.float(ParamId::GainIn)?,
            gain_out: store.float(ParamId::GainOut)?,
        })
    }

    /// Read all values for one block
    ///
    /// # Real-time Safety
    /// Relaxed atomic loads only.
    #[inline]
    pub fn snapshot(&self, store: &ParameterStore) -> ParameterSnapshot {
        ParameterSnapshot {
            bands: self.bands.map(|band| band.snapshot(store)),
            low_mid_hz: self.low_mid_crossover.get(store),
            mid_high_hz: self.mid_high_crossover.get(store),
            gain_in_db: self.gain_in.get(store),
            gain_out_db: self.gain_out.get(store),
        }
    }
}

/// Compressor settings and routing flags of one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSnapshot {
    pub settings: CompressorSettings,
    pub flags: BandFlags,
}

/// Control values for one processing block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub bands: [BandSnapshot; NUM_BANDS],
    pub low_mid_hz: f32,
    pub mid_high_hz: f32,
    pub gain_in_db: f32,
    pub gain_out_db: f32,
}

impl ParameterSnapshot {
    pub fn flags(&self) -> [BandFlags; NUM_BANDS] {
        self.bands.map(|band| band.flags)
    }

    pub fn band(&self, band: Band) -> &BandSnapshot {
        &self.bands[band.index()]
    }
}
