//! Device information record: the telemetry snapshot returned by
//! `GET_INFORMATION`.
//!
//! On the wire the record is a packed little-endian structure of scaled
//! integers ([`RawDeviceInfo`]). [`DeviceInformation`] carries the same data
//! in engineering units.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Serialize, Serializer};

use crate::error::{DeviceError, Result};

/// Size of the packed record.
pub const RECORD_SIZE: usize = 45;

/// Grid code the inverter is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct PowerStandard(pub u8);

impl PowerStandard {
    pub const DEFAULT: Self = Self(0x00);
    pub const G59G83: Self = Self(0x01);
    pub const UL240V: Self = Self(0x02);
    pub const VDE0126: Self = Self(0x03);
    pub const AS4777: Self = Self(0x04);
    pub const AS4777NQ: Self = Self(0x05);
    pub const CQC: Self = Self(0x06);
    pub const ENEL: Self = Self(0x07);
    pub const UL208V: Self = Self(0x08);
    pub const MEXCFE: Self = Self(0x09);
    /// User defined.
    pub const USER: Self = Self(0x0A);
    pub const VDE4105: Self = Self(0x0B);
    pub const EN50438DK: Self = Self(0x0C);
    pub const EN50438IE: Self = Self(0x0D);
    pub const EN50438NL: Self = Self(0x0E);
    pub const EN50438T: Self = Self(0x0F);
    pub const EN50438L: Self = Self(0x10);

    /// Name of a known standard.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::DEFAULT => "Default",
            Self::G59G83 => "G59/G83",
            Self::UL240V => "UL-240V",
            Self::VDE0126 => "VDE0126",
            Self::AS4777 => "AS4777",
            Self::AS4777NQ => "AS4777-NQ",
            Self::CQC => "CQC",
            Self::ENEL => "ENEL",
            Self::UL208V => "UL-208V",
            Self::MEXCFE => "MEX-CFE",
            Self::USER => "User",
            Self::VDE4105 => "VDE4105",
            Self::EN50438DK => "EN50438-DK",
            Self::EN50438IE => "EN50438-IE",
            Self::EN50438NL => "EN50438-NL",
            Self::EN50438T => "EN50438-T",
            Self::EN50438L => "EN50438-L",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for PowerStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}

macro_rules! code {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

code!(
    /// Grid status byte, opaque.
    GridStatus(u8)
);
code!(
    /// Device status code, opaque.
    DeviceStatus(u16)
);
code!(
    /// Device fault code; zero when healthy.
    FaultCode(u16)
);
code!(Product(u8));
code!(SoftwareVersion(u8));
code!(PowerCurve(u8));

/// Inverter serial number, rendered as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SerialNumber(pub [u8; 8]);

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One DC input channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct InputStatus {
    /// Volts.
    pub voltage: f32,
    /// Amperes.
    pub current: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GridInformation {
    /// Volts.
    pub voltage: f32,
    /// Amperes.
    pub current: f32,
    /// Hertz.
    pub frequency: f32,
    pub power_standard: PowerStandard,
    pub grid_status: GridStatus,
}

/// Energy counters in kWh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProductionInformation {
    pub total: f32,
    pub month: f32,
    pub last_month: f32,
    pub today: f32,
    pub yesterday: f32,
}

/// Decoded telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DeviceInformation {
    /// Decoding always yields two channels. Encoding writes zeros for a
    /// missing second channel; channels past the second are not encoded.
    pub inputs: Vec<InputStatus>,
    pub grid: GridInformation,
    pub production: ProductionInformation,
    /// Degrees Celsius.
    pub temperature: f32,
    pub product: Product,
    pub software_version: SoftwareVersion,
    pub serial_number: SerialNumber,
    pub status: DeviceStatus,
    pub error: FaultCode,
    pub power_curve: PowerCurve,
}

impl DeviceInformation {
    /// Decode a packed record. Bytes past the record are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        RawDeviceInfo::decode(buf).map(|raw| Self::from(&raw))
    }

    /// Encode into a packed record.
    pub fn encode(&self) -> Bytes {
        RawDeviceInfo::from(self).to_bytes()
    }
}

/// The record as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDeviceInfo {
    pub v_in: u16,
    pub i_in: u16,
    pub v_grid: u16,
    pub i_grid: u16,
    pub temp: u16,
    pub total_production: u32,
    pub status: u16,
    pub error: u16,
    pub product: u8,
    pub sw_version: u8,
    pub grid_freq: u16,
    pub power_std: u8,
    pub power_curve: u8,
    pub v2_in: u16,
    pub i2_in: u16,
    pub grid_status: u8,
    pub month_prod: u16,
    pub last_month_prod: u16,
    pub today_prod: u16,
    pub yesterday_prod: u16,
    pub serial_no: [u8; 8],
}

impl RawDeviceInfo {
    /// Decode from the front of `buf`.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_SIZE {
            return Err(DeviceError::ShortRecord { len: buf.len() });
        }

        let mut raw = Self {
            v_in: buf.get_u16_le(),
            i_in: buf.get_u16_le(),
            v_grid: buf.get_u16_le(),
            i_grid: buf.get_u16_le(),
            temp: buf.get_u16_le(),
            total_production: buf.get_u32_le(),
            status: buf.get_u16_le(),
            error: buf.get_u16_le(),
            product: buf.get_u8(),
            sw_version: buf.get_u8(),
            grid_freq: buf.get_u16_le(),
            power_std: buf.get_u8(),
            power_curve: buf.get_u8(),
            v2_in: buf.get_u16_le(),
            i2_in: buf.get_u16_le(),
            grid_status: buf.get_u8(),
            month_prod: buf.get_u16_le(),
            last_month_prod: buf.get_u16_le(),
            today_prod: buf.get_u16_le(),
            yesterday_prod: buf.get_u16_le(),
            serial_no: [0; 8],
        };
        buf.copy_to_slice(&mut raw.serial_no);
        Ok(raw)
    }

    /// Append the packed record to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(RECORD_SIZE);
        dst.put_u16_le(self.v_in);
        dst.put_u16_le(self.i_in);
        dst.put_u16_le(self.v_grid);
        dst.put_u16_le(self.i_grid);
        dst.put_u16_le(self.temp);
        dst.put_u32_le(self.total_production);
        dst.put_u16_le(self.status);
        dst.put_u16_le(self.error);
        dst.put_u8(self.product);
        dst.put_u8(self.sw_version);
        dst.put_u16_le(self.grid_freq);
        dst.put_u8(self.power_std);
        dst.put_u8(self.power_curve);
        dst.put_u16_le(self.v2_in);
        dst.put_u16_le(self.i2_in);
        dst.put_u8(self.grid_status);
        dst.put_u16_le(self.month_prod);
        dst.put_u16_le(self.last_month_prod);
        dst.put_u16_le(self.today_prod);
        dst.put_u16_le(self.yesterday_prod);
        dst.put_slice(&self.serial_no);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn tenths(raw: u16) -> f32 {
    f32::from(raw) / 10.0
}

fn to_tenths(value: f32) -> u16 {
    (value * 10.0).round() as u16
}

impl From<&RawDeviceInfo> for DeviceInformation {
    fn from(raw: &RawDeviceInfo) -> Self {
        Self {
            inputs: vec![
                InputStatus {
                    voltage: tenths(raw.v_in),
                    current: tenths(raw.i_in),
                },
                InputStatus {
                    voltage: tenths(raw.v2_in),
                    current: tenths(raw.i2_in),
                },
            ],
            grid: GridInformation {
                voltage: tenths(raw.v_grid),
                current: tenths(raw.i_grid),
                frequency: f32::from(raw.grid_freq) / 100.0,
                power_standard: PowerStandard(raw.power_std),
                grid_status: GridStatus(raw.grid_status),
            },
            production: ProductionInformation {
                total: raw.total_production as f32,
                month: f32::from(raw.month_prod),
                last_month: f32::from(raw.last_month_prod),
                today: tenths(raw.today_prod),
                yesterday: tenths(raw.yesterday_prod),
            },
            temperature: tenths(raw.temp),
            product: Product(raw.product),
            software_version: SoftwareVersion(raw.sw_version),
            serial_number: SerialNumber(raw.serial_no),
            status: DeviceStatus(raw.status),
            error: FaultCode(raw.error),
            power_curve: PowerCurve(raw.power_curve),
        }
    }
}

/// Values outside the wire range saturate.
impl From<&DeviceInformation> for RawDeviceInfo {
    fn from(info: &DeviceInformation) -> Self {
        let first = info.inputs.first().copied().unwrap_or_default();
        let second = info.inputs.get(1).copied().unwrap_or_default();

        Self {
            v_in: to_tenths(first.voltage),
            i_in: to_tenths(first.current),
            v_grid: to_tenths(info.grid.voltage),
            i_grid: to_tenths(info.grid.current),
            temp: to_tenths(info.temperature),
            total_production: info.production.total.round() as u32,
            status: info.status.0,
            error: info.error.0,
            product: info.product.0,
            sw_version: info.software_version.0,
            grid_freq: (info.grid.frequency * 100.0).round() as u16,
            power_std: info.grid.power_standard.0,
            power_curve: info.power_curve.0,
            v2_in: to_tenths(second.voltage),
            i2_in: to_tenths(second.current),
            grid_status: info.grid.grid_status.0,
            month_prod: info.production.month.round() as u16,
            last_month_prod: info.production.last_month.round() as u16,
            today_prod: to_tenths(info.production.today),
            yesterday_prod: to_tenths(info.production.yesterday),
            serial_no: info.serial_number.0,
        }
    }
}
