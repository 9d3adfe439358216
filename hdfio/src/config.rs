// SPDX-License-Identifier: MIT

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use crate::FileDriver;
use crate::drivers::*;
use crate::errors::*;
use crate::types::*;

/// Default growth step of the memory driver (64 KiB).
pub const CORE_DEFAULT_INCREMENT: usize = 64 * 1024;

/// Default size of a family member (2 GiB - 1).
pub const FAMILY_DEFAULT_MEMBER_SIZE: u64 = (1 << 31) - 1;

/// User-supplied driver.
pub trait DriverFactory: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether two opens of the same file yield comparable [`FileKey`]s.
    fn has_compare(&self) -> bool {
        true
    }

    fn open(&self, name: &str, flags: AccessFlags) -> DriverResult<Box<dyn FileDriver>>;
}

/// Driver selection stored in a file-access template.
#[derive(Debug, Clone, Default)]
pub enum DriverConfig {
    /// Unbuffered positional I/O.
    #[default]
    Sec2,
    /// Buffered I/O.
    Stdio,
    /// Whole file in memory, optionally written back on flush.
    Core { increment: usize, backing_store: bool },
    /// File striped over members named from a `%d` template.
    Family { member_size: u64 },
    /// Address space partitioned by storage kind over several files.
    Multi(MultiLayout),
    Custom(Arc<dyn DriverFactory>),
}

impl DriverConfig {
    pub fn core(increment: usize, backing_store: bool) -> Self {
        DriverConfig::Core { increment, backing_store }
    }

    pub fn split(meta_suffix: &str, raw_suffix: &str) -> Self {
        DriverConfig::Multi(MultiLayout::split(meta_suffix, raw_suffix))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DriverConfig::Sec2 => "sec2",
            DriverConfig::Stdio => "stdio",
            DriverConfig::Core { .. } => "core",
            DriverConfig::Family { .. } => "family",
            DriverConfig::Multi(_) => "multi",
            DriverConfig::Custom(factory) => factory.name(),
        }
    }

    /// Whether opened drivers can tell two handles to the same file apart.
    pub fn has_compare(&self) -> bool {
        match self {
            DriverConfig::Core { backing_store, .. } => *backing_store,
            DriverConfig::Custom(factory) => factory.has_compare(),
            _ => true,
        }
    }

    pub fn validate(&self) -> DriverResult {
        match self {
            DriverConfig::Core { increment: 0, .. } => {
                Err(DriverError::Invalid("core increment must be positive"))
            }
            DriverConfig::Family { member_size: 0 } => {
                Err(DriverError::Invalid("family member size must be positive"))
            }
            DriverConfig::Multi(layout) => layout.validate(),
            _ => Ok(()),
        }
    }

    pub fn open(&self, name: &str, flags: AccessFlags) -> DriverResult<Box<dyn FileDriver>> {
        self.validate()?;
        let driver: Box<dyn FileDriver> = match self {
            DriverConfig::Sec2 => Box::new(Sec2Driver::open(name, flags)?),
            DriverConfig::Stdio => Box::new(StdioDriver::open(name, flags)?),
            DriverConfig::Core { increment, backing_store } => {
                Box::new(CoreDriver::open(name, flags, *increment, *backing_store)?)
            }
            DriverConfig::Family { member_size } => {
                Box::new(FamilyDriver::open(name, flags, *member_size)?)
            }
            DriverConfig::Multi(layout) => Box::new(MultiDriver::open(name, flags, layout.clone())?),
            DriverConfig::Custom(factory) => factory.open(name, flags)?,
        };
        log::debug!("opened '{name}' with the {} driver ({flags:?})", driver.name());
        Ok(driver)
    }

    fn rank(&self) -> u8 {
        match self {
            DriverConfig::Sec2 => 0,
            DriverConfig::Stdio => 1,
            DriverConfig::Core { .. } => 2,
            DriverConfig::Family { .. } => 3,
            DriverConfig::Multi(_) => 4,
            DriverConfig::Custom(_) => 5,
        }
    }
}

fn factory_addr(factory: &Arc<dyn DriverFactory>) -> usize {
    Arc::as_ptr(factory) as *const () as usize
}

impl PartialEq for DriverConfig {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for DriverConfig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use DriverConfig::*;
        let ord = match (self, other) {
            (
                Core { increment: a, backing_store: b },
                Core { increment: c, backing_store: d },
            ) => (a, b).cmp(&(c, d)),
            (Family { member_size: a }, Family { member_size: b }) => a.cmp(b),
            (Multi(a), Multi(b)) => a.cmp(b),
            (Custom(a), Custom(b)) => factory_addr(a).cmp(&factory_addr(b)),
            _ => self.rank().cmp(&other.rank()),
        };
        Some(ord)
    }
}
