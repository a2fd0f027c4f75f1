//! Compute device identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RunnerError;

/// Target device for an executable network
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
    /// Neural compute stick
    Myriad,
    /// High density deep learning accelerator
    Hddl,
    Fpga,
    /// Per-layer split across devices, in priority order
    Hetero(Vec<Device>),
    /// Whole requests spread across devices, in priority order
    Multi(Vec<Device>),
}

impl Device {
    /// Get string representation of a single device
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "CPU",
            Device::Gpu => "GPU",
            Device::Myriad => "MYRIAD",
            Device::Hddl => "HDDL",
            Device::Fpga => "FPGA",
            Device::Hetero(_) => "HETERO",
            Device::Multi(_) => "MULTI",
        }
    }

    /// Devices named by a composite identifier, or the device itself
    pub fn members(&self) -> Vec<&Device> {
        match self {
            Device::Hetero(devices) | Device::Multi(devices) => {
                devices.iter().flat_map(|d| d.members()).collect()
            }
            single => vec![single],
        }
    }

    /// Whether this device is, or falls back to, `target`
    pub fn includes(&self, target: &Device) -> bool {
        self.members().into_iter().any(|d| d == target)
    }

    fn parse_single(name: &str) -> Result<Self, RunnerError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CPU" => Ok(Device::Cpu),
            "GPU" => Ok(Device::Gpu),
            "MYRIAD" => Ok(Device::Myriad),
            "HDDL" => Ok(Device::Hddl),
            "FPGA" => Ok(Device::Fpga),
            _ => Err(RunnerError::InvalidDevice(name.trim().to_string())),
        }
    }
}

impl FromStr for Device {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((kind, list)) = s.split_once(':') else {
            return Device::parse_single(s);
        };

        let devices = list
            .split(',')
            .map(Device::parse_single)
            .collect::<Result<Vec<_>, _>>()?;

        match kind.trim().to_ascii_uppercase().as_str() {
            "HETERO" => Ok(Device::Hetero(devices)),
            "MULTI" => Ok(Device::Multi(devices)),
            _ => Err(RunnerError::InvalidDevice(s.to_string())),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Hetero(devices) | Device::Multi(devices) => {
                let names: Vec<&str> = devices.iter().map(Device::as_str).collect();
                write!(f, "{}:{}", self.as_str(), names.join(","))
            }
            single => f.write_str(single.as_str()),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = RunnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}
