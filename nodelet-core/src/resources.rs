//! Resource value objects with compile-time unit safety

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::{Error, Result};

/// Memory size value object with compile-time unit safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MemorySize(u64); // bytes

impl MemorySize {
    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from kibibytes
    #[must_use]
    pub const fn from_kb(kb: u64) -> Self {
        Self(kb.saturating_mul(1024))
    }

    /// Create from mebibytes
    #[must_use]
    pub const fn from_mb(mb: u64) -> Self {
        Self(mb.saturating_mul(1024).saturating_mul(1024))
    }

    /// Create from gibibytes
    #[must_use]
    pub const fn from_gb(gb: u64) -> Self {
        Self(
            gb.saturating_mul(1024)
                .saturating_mul(1024)
                .saturating_mul(1024),
        )
    }

    /// Get value in bytes
    #[must_use]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Get value in mebibytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_mb(self) -> f64 {
        self.0 as f64 / (1024.0 * 1024.0)
    }

    /// Get value in gibibytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_gb(self) -> f64 {
        self.0 as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    /// Subtract, failing instead of saturating when `rhs` is larger
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Parse a Kubernetes-style quantity (`"512Mi"`, `"8Gi"`, `"1G"`, `"1048576"`)
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the quantity is malformed or negative
    pub fn parse_quantity(s: &str) -> Result<Self> {
        const SUFFIXES: [(&str, u64); 12] = [
            ("Ki", 1 << 10),
            ("Mi", 1 << 20),
            ("Gi", 1 << 30),
            ("Ti", 1 << 40),
            ("Pi", 1 << 50),
            ("Ei", 1 << 60),
            ("k", 1_000),
            ("M", 1_000_000),
            ("G", 1_000_000_000),
            ("T", 1_000_000_000_000),
            ("P", 1_000_000_000_000_000),
            ("E", 1_000_000_000_000_000_000),
        ];

        let s = s.trim();
        let (number, multiplier) = SUFFIXES
            .iter()
            .find_map(|(suffix, mult)| s.strip_suffix(suffix).map(|n| (n, *mult)))
            .unwrap_or((s, 1));

        let invalid = || Error::invalid_config(format!("invalid memory quantity: {s:?}"));

        if let Ok(whole) = number.parse::<u64>() {
            return whole.checked_mul(multiplier).map(Self).ok_or_else(invalid);
        }

        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let bytes = (value * multiplier as f64).ceil() as u64;
        Ok(Self(bytes))
    }

    /// Render as a Kubernetes quantity string using the largest exact binary suffix
    #[must_use]
    pub fn to_quantity_string(self) -> String {
        const UNITS: [(&str, u64); 4] = [("Ti", 1 << 40), ("Gi", 1 << 30), ("Mi", 1 << 20), ("Ki", 1 << 10)];

        if self.0 == 0 {
            return "0".to_string();
        }

        UNITS
            .iter()
            .find(|(_, size)| self.0 % size == 0)
            .map_or_else(
                || self.0.to_string(),
                |(suffix, size)| format!("{}{suffix}", self.0 / size),
            )
    }
}

impl Add for MemorySize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for MemorySize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl FromStr for MemorySize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_quantity(s)
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const GB: u64 = 1024 * 1024 * 1024;
        const MB: u64 = 1024 * 1024;

        if self.0 >= GB {
            write!(f, "{:.2} GB", self.as_gb())
        } else if self.0 >= MB {
            write!(f, "{:.2} MB", self.as_mb())
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// CPU cores value object, stored as millicores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CpuCores(u64);

impl CpuCores {
    /// `CGroup` CPU period in microseconds (100ms)
    pub const PERIOD_MICROS: i64 = 100_000;

    /// Create from whole cores
    #[must_use]
    pub const fn new(cores: u64) -> Self {
        Self(cores.saturating_mul(1000))
    }

    /// Create from millicores
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Get value in millicores
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Get value as fractional cores
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Subtract, failing when `rhs` is larger
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Convert to `CGroup` quota/period format
    ///
    /// Returns (quota, period) in microseconds
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn to_quota(self) -> (i64, i64) {
        let quota = (self.0 as i64).saturating_mul(Self::PERIOD_MICROS) / 1000;
        (quota, Self::PERIOD_MICROS)
    }

    /// Parse a Kubernetes-style CPU quantity (`"2"`, `"500m"`, `"1.5"`)
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the quantity is malformed or negative
    pub fn parse_quantity(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::invalid_config(format!("invalid cpu quantity: {s:?}"));

        if let Some(millis) = s.strip_suffix('m') {
            return millis.parse::<u64>().map(Self).map_err(|_| invalid());
        }

        let cores: f64 = s.parse().map_err(|_| invalid())?;
        if !cores.is_finite() || cores < 0.0 {
            return Err(invalid());
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (cores * 1000.0).round() as u64;
        Ok(Self(millis))
    }

    /// Render as a Kubernetes quantity string (`"2"` or `"1500m"`)
    #[must_use]
    pub fn to_quantity_string(self) -> String {
        if self.0 % 1000 == 0 {
            (self.0 / 1000).to_string()
        } else {
            format!("{}m", self.0)
        }
    }
}

impl FromStr for CpuCores {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_quantity(s)
    }
}

impl fmt::Display for CpuCores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} cores", self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_size_conversions() {
        let size = MemorySize::from_mb(512);
        assert_eq!(size.as_bytes(), 536_870_912);
        assert_eq!(size.as_mb(), 512.0);
    }

    #[test]
    fn memory_size_display() {
        assert_eq!(format!("{}", MemorySize::from_gb(2)), "2.00 GB");
        assert_eq!(format!("{}", MemorySize::from_mb(512)), "512.00 MB");
        assert_eq!(format!("{}", MemorySize::from_bytes(100)), "100 bytes");
    }

    #[test]
    fn memory_quantity_parsing() {
        assert_eq!(MemorySize::parse_quantity("512Mi").unwrap(), MemorySize::from_mb(512));
        assert_eq!(MemorySize::parse_quantity("8Gi").unwrap(), MemorySize::from_gb(8));
        assert_eq!(
            MemorySize::parse_quantity("1G").unwrap(),
            MemorySize::from_bytes(1_000_000_000)
        );
        assert_eq!(
            MemorySize::parse_quantity("1048576").unwrap(),
            MemorySize::from_mb(1)
        );
        assert_eq!(
            MemorySize::parse_quantity("1.5Gi").unwrap(),
            MemorySize::from_mb(1536)
        );
        assert!(MemorySize::parse_quantity("lots").is_err());
        assert!(MemorySize::parse_quantity("-1Gi").is_err());
        assert!(MemorySize::parse_quantity("").is_err());
    }

    #[test]
    fn memory_quantity_rendering() {
        assert_eq!(MemorySize::from_gb(8).to_quantity_string(), "8Gi");
        assert_eq!(MemorySize::from_mb(1536).to_quantity_string(), "1536Mi");
        assert_eq!(MemorySize::from_bytes(1000).to_quantity_string(), "1000");
        assert_eq!(MemorySize::default().to_quantity_string(), "0");
    }

    #[test]
    fn cpu_quota_conversion() {
        let (quota, period) = CpuCores::new(1).to_quota();
        assert_eq!(quota, 100_000);
        assert_eq!(period, 100_000);

        let (quota, period) = CpuCores::from_millis(500).to_quota();
        assert_eq!(quota, 50_000);
        assert_eq!(period, 100_000);

        let (quota, _) = CpuCores::new(2).to_quota();
        assert_eq!(quota, 200_000);
    }

    #[test]
    fn cpu_quantity_parsing() {
        assert_eq!(CpuCores::parse_quantity("2").unwrap(), CpuCores::new(2));
        assert_eq!(
            CpuCores::parse_quantity("500m").unwrap(),
            CpuCores::from_millis(500)
        );
        assert_eq!(
            CpuCores::parse_quantity("1.5").unwrap(),
            CpuCores::from_millis(1500)
        );
        assert!(CpuCores::parse_quantity("two").is_err());
        assert!(CpuCores::parse_quantity("-1").is_err());
        assert!(CpuCores::parse_quantity("1.5m").is_err());
    }

    #[test]
    fn cpu_quantity_rendering() {
        assert_eq!(CpuCores::new(4).to_quantity_string(), "4");
        assert_eq!(CpuCores::from_millis(3500).to_quantity_string(), "3500m");
    }

    #[test]
    fn checked_subtraction() {
        assert_eq!(
            CpuCores::new(4).checked_sub(CpuCores::from_millis(500)),
            Some(CpuCores::from_millis(3500))
        );
        assert_eq!(CpuCores::new(1).checked_sub(CpuCores::new(2)), None);
        assert_eq!(
            MemorySize::from_gb(1).checked_sub(MemorySize::from_mb(512)),
            Some(MemorySize::from_mb(512))
        );
        assert_eq!(MemorySize::from_mb(1).checked_sub(MemorySize::from_gb(1)), None);
    }
}
