// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Registry of mobile test devices.
///
/// Maps device identifiers used in workflow matrices to their physical or
/// virtual descriptors so jobs can be narrowed to one kind of device.
use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;

/// Whether a device is physical hardware or an emulator/simulator.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind
{
    /// Physical device in a device farm.
    Real,
    /// Emulator or simulator image.
    Virtual,
}

impl DeviceKind
{
    /// Both kinds, the default selection for mobile tests.
    pub const ALL: [Self; 2] = [Self::Real, Self::Virtual,];

    /// Lowercase name used in the catalog and on the command line.
    pub fn as_str(self,) -> &'static str
    {
        match self {
            Self::Real => "real",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for DeviceKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        f.write_str(self.as_str(),)
    }
}

impl FromStr for DeviceKind
{
    type Err = Error;

    fn from_str(value: &str,) -> Result<Self, Self::Err,>
    {
        match value.trim() {
            "real" => Ok(Self::Real,),
            "virtual" => Ok(Self::Virtual,),
            other => Err(Error::validation(format!(
                "unknown device type '{other}', expected 'real' or 'virtual'"
            ),),),
        }
    }
}

/// Attributes of one registered device.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq,)]
#[serde(deny_unknown_fields)]
pub struct TestDevice
{
    /// Physical or virtual.
    #[serde(rename = "type")]
    pub kind:    DeviceKind,
    /// Hardware model of a real device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model:   Option<String,>,
    /// OS version installed on the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String,>,
    /// System image of an Android emulator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image:   Option<String,>,
    /// Simulator name of an Apple device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:    Option<String,>,
}

/// Devices keyed by identifier.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq,)]
#[serde(transparent)]
pub struct DeviceRegistry(BTreeMap<String, TestDevice,>,);

impl DeviceRegistry
{
    /// Returns the device registered under `id`.
    pub fn get(&self, id: &str,) -> Option<&TestDevice,>
    {
        self.0.get(id,)
    }

    /// Number of registered devices.
    pub fn len(&self,) -> usize
    {
        self.0.len()
    }

    /// Whether the registry holds no devices.
    pub fn is_empty(&self,) -> bool
    {
        self.0.is_empty()
    }

    /// Returns the registered type of a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] when `id` is not registered.
    pub fn device_type(&self, id: &str,) -> Result<DeviceKind, Error,>
    {
        self.get(id,).map(|device| device.kind,).ok_or_else(|| Error::UnknownDevice {
            id: id.to_owned(),
        },)
    }

    /// Keeps the devices whose registered type is one of `kinds`.
    ///
    /// Order of `devices` is preserved. Identifiers missing from the registry
    /// are dropped and logged.
    ///
    /// # Examples
    ///
    /// ```
    /// use gha_tools::{Catalog, DeviceKind};
    ///
    /// let catalog = Catalog::builtin()?;
    /// let devices = vec!["android_min".to_owned(), "emulator_target".to_owned()];
    /// let virtual_only = catalog.devices.filter_devices(&devices, &[DeviceKind::Virtual],);
    /// assert_eq!(virtual_only, vec!["emulator_target".to_owned()]);
    /// # Ok::<(), gha_tools::Error>(())
    /// ```
    pub fn filter_devices(&self, devices: &[String], kinds: &[DeviceKind],) -> Vec<String,>
    {
        devices
            .iter()
            .filter(|id| match self.get(id,) {
                Some(device,) => kinds.contains(&device.kind,),
                None => {
                    warn!("dropping unregistered test device {}", id);
                    false
                }
            },)
            .cloned()
            .collect()
    }
}

/// Parses a comma separated list of device types such as `real,virtual`.
///
/// Blank entries are ignored.
///
/// # Errors
///
/// Returns [`Error::Validation`] for any entry other than `real` or `virtual`.
pub fn parse_device_kinds(value: &str,) -> Result<Vec<DeviceKind,>, Error,>
{
    let mut kinds = Vec::with_capacity(2,);
    for entry in value.split(',',).map(str::trim,).filter(|entry| !entry.is_empty(),) {
        let kind = entry.parse::<DeviceKind>()?;
        if !kinds.contains(&kind,) {
            kinds.push(kind,);
        }
    }
    Ok(kinds,)
}
