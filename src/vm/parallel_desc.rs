// src/vm/parallel_desc.rs
//! Device placement of logical objects
//!
//! A parallel description names the devices an object lives on, written
//! `<machine>:<cpu|gpu>:<first>[-<last>]`, e.g. `0:gpu:0-3`.

use crate::utils::config::ResourceConfig;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Why a device name was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParallelDescError {
    #[error("malformed device name `{0}`, expected <machine>:<cpu|gpu>:<first>[-<last>]")]
    Malformed(String),

    #[error("unknown device type `{kind}` in `{name}`")]
    UnknownDevice { kind: String, name: String },

    #[error("empty device range in `{0}`")]
    EmptyRange(String),

    #[error("{desc} names machine {machine}, only {available} configured")]
    NoSuchMachine {
        desc: String,
        machine: usize,
        available: usize,
    },

    #[error("{desc} needs {device} device {id}, only {available} configured")]
    NoSuchDevice {
        desc: String,
        device: DeviceKind,
        id: usize,
        available: usize,
    },
}

/// Kind of device a parallel description places work on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Gpu => "gpu",
        }
    }

    /// Devices of this kind per host
    pub fn count(&self, resource: &ResourceConfig) -> usize {
        match self {
            DeviceKind::Cpu => resource.cpu_device_num,
            DeviceKind::Gpu => resource.gpu_device_num,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed device placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParallelDesc {
    pub machine: usize,
    pub device: DeviceKind,
    pub first: usize,
    pub last: usize,
}

impl ParallelDesc {
    pub fn device_ids(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }

    pub fn parallel_num(&self) -> usize {
        self.last - self.first + 1
    }

    /// Check the placement against the configured topology
    pub fn check(&self, resource: &ResourceConfig) -> Result<(), ParallelDescError> {
        if self.machine >= resource.machine_num {
            return Err(ParallelDescError::NoSuchMachine {
                desc: self.to_string(),
                machine: self.machine,
                available: resource.machine_num,
            });
        }
        let available = self.device.count(resource);
        if self.last >= available {
            return Err(ParallelDescError::NoSuchDevice {
                desc: self.to_string(),
                device: self.device,
                id: self.last,
                available,
            });
        }
        Ok(())
    }
}

impl FromStr for ParallelDesc {
    type Err = ParallelDescError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParallelDescError::Malformed(s.to_string());

        let mut parts = s.split(':');
        let (Some(machine), Some(device), Some(ids), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let machine = machine.parse().map_err(|_| malformed())?;
        let device = match device {
            "cpu" => DeviceKind::Cpu,
            "gpu" => DeviceKind::Gpu,
            other => {
                return Err(ParallelDescError::UnknownDevice {
                    kind: other.to_string(),
                    name: s.to_string(),
                })
            }
        };
        let (first, last) = match ids.split_once('-') {
            Some((first, last)) => (
                first.parse().map_err(|_| malformed())?,
                last.parse().map_err(|_| malformed())?,
            ),
            None => {
                let id = ids.parse().map_err(|_| malformed())?;
                (id, id)
            }
        };
        if first > last {
            return Err(ParallelDescError::EmptyRange(s.to_string()));
        }

        Ok(Self {
            machine,
            device,
            first,
            last,
        })
    }
}

impl fmt::Display for ParallelDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}:{}:{}", self.machine, self.device, self.first)
        } else {
            write!(f, "{}:{}:{}-{}", self.machine, self.device, self.first, self.last)
        }
    }
}
