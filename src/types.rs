use core::ops::RangeInclusive;

/// Power command. `Direction` only adjusts the vanes on units that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    #[default]
    Off,
    On,
    Direction,
}

// The declaration order is the ordinal used to index the per-vendor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    None,
    Cold,
    Dry,
    Fan,
    #[default]
    Auto,
    Heat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FanSpeed {
    None,
    #[default]
    Auto,
    High,
    Med,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VaneMode {
    #[default]
    Auto,
    V1,
    V2,
    V3,
    V4,
    V5,
    Swing,
}

/// The vendor-neutral state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClimateSettings {
    pub action: Action,
    /// Target temperature in whole degrees Celsius.
    pub temperature: i32,
    pub fan_speed: FanSpeed,
    pub mode: Mode,
    pub vane_mode: VaneMode,
}

impl ClimateSettings {
    pub fn is_on(&self) -> bool {
        self.action == Action::On
    }

    /// The target temperature limited to what a vendor can encode.
    pub fn clamped_temperature(&self, range: RangeInclusive<i32>) -> i32 {
        self.temperature.clamp(*range.start(), *range.end())
    }
}
