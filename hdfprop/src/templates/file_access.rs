// SPDX-License-Identifier: MIT

use hdfio::config::{CORE_DEFAULT_INCREMENT, DriverConfig, FAMILY_DEFAULT_MEMBER_SIZE};

use crate::errors::*;

/// Cache sizes, allocation alignment and driver choice for opening a file.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct FileAccessProps {
    /// Metadata cache slots; 0 disables the cache.
    pub mdc_nelmts: usize,
    /// Raw-data chunk cache slots.
    pub rdcc_nelmts: usize,
    /// Raw-data chunk cache capacity in bytes.
    pub rdcc_nbytes: usize,
    rdcc_w0: f64,
    /// Allocations of at least this size are aligned.
    pub threshold: u64,
    alignment: u64,
    pub gc_references: bool,
    pub meta_block_size: u64,
    /// Raw-data sieve buffer size; 0 disables the sieve.
    pub sieve_buf_size: usize,
    driver: DriverConfig,
}

impl Default for FileAccessProps {
    fn default() -> Self {
        Self {
            mdc_nelmts: 10330,
            rdcc_nelmts: 521,
            rdcc_nbytes: 1024 * 1024,
            rdcc_w0: 0.75,
            threshold: 1,
            alignment: 1,
            gc_references: false,
            meta_block_size: 2048,
            sieve_buf_size: 64 * 1024,
            driver: DriverConfig::Sec2,
        }
    }
}

impl FileAccessProps {
    /// `(mdc_nelmts, rdcc_nelmts, rdcc_nbytes, rdcc_w0)`.
    pub fn cache(&self) -> (usize, usize, usize, f64) {
        (self.mdc_nelmts, self.rdcc_nelmts, self.rdcc_nbytes, self.rdcc_w0)
    }

    pub fn set_cache(
        &mut self,
        mdc_nelmts: usize,
        rdcc_nelmts: usize,
        rdcc_nbytes: usize,
        rdcc_w0: f64,
    ) -> PropResult {
        if !(0.0..=1.0).contains(&rdcc_w0) {
            return Err(PropError::InvalidArgument("preemption weight must be within [0, 1]"));
        }
        self.mdc_nelmts = mdc_nelmts;
        self.rdcc_nelmts = rdcc_nelmts;
        self.rdcc_nbytes = rdcc_nbytes;
        self.rdcc_w0 = rdcc_w0;
        Ok(())
    }

    /// `(threshold, alignment)`.
    pub fn alignment(&self) -> (u64, u64) {
        (self.threshold, self.alignment)
    }

    pub fn set_alignment(&mut self, threshold: u64, alignment: u64) -> PropResult {
        if alignment == 0 {
            return Err(PropError::InvalidArgument("alignment must be positive"));
        }
        self.threshold = threshold;
        self.alignment = alignment;
        Ok(())
    }

    pub fn driver(&self) -> &DriverConfig {
        &self.driver
    }

    pub fn set_driver(&mut self, driver: DriverConfig) -> PropResult {
        driver.validate()?;
        self.driver = driver;
        Ok(())
    }

    pub fn set_sec2(&mut self) {
        self.driver = DriverConfig::Sec2;
    }

    pub fn set_stdio(&mut self) {
        self.driver = DriverConfig::Stdio;
    }

    /// In-memory driver; `increment` of 0 picks the default step.
    pub fn set_core(&mut self, increment: usize, backing_store: bool) {
        let increment = if increment == 0 { CORE_DEFAULT_INCREMENT } else { increment };
        self.driver = DriverConfig::core(increment, backing_store);
    }

    /// Member size of 0 picks the default.
    pub fn set_family(&mut self, member_size: u64) {
        let member_size = if member_size == 0 { FAMILY_DEFAULT_MEMBER_SIZE } else { member_size };
        self.driver = DriverConfig::Family { member_size };
    }

    /// Metadata and raw data in two files named `<name><suffix>`.
    pub fn set_split(&mut self, meta_suffix: &str, raw_suffix: &str) -> PropResult {
        self.set_driver(DriverConfig::split(meta_suffix, raw_suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = FileAccessProps::default();
        assert_eq!(p.cache(), (10330, 521, 1024 * 1024, 0.75));
        assert_eq!(p.alignment(), (1, 1));
        assert_eq!(p.meta_block_size, 2048);
        assert_eq!(p.sieve_buf_size, 64 * 1024);
        assert_eq!(p.driver(), &DriverConfig::Sec2);
    }

    #[test]
    fn test_cache_weight_range() {
        let mut p = FileAccessProps::default();
        assert!(p.set_cache(0, 0, 0, 1.5).is_err());
        assert!(p.set_cache(0, 0, 0, f64::NAN).is_err());
        p.set_cache(0, 8, 4096, 0.0).unwrap();
        assert_eq!(p.cache(), (0, 8, 4096, 0.0));
    }

    #[test]
    fn test_alignment_positive() {
        let mut p = FileAccessProps::default();
        assert!(p.set_alignment(0, 0).is_err());
        p.set_alignment(4096, 512).unwrap();
        assert_eq!(p.alignment(), (4096, 512));
    }

    #[test]
    fn test_driver_setters() {
        let mut p = FileAccessProps::default();
        p.set_core(0, false);
        assert_eq!(p.driver(), &DriverConfig::core(CORE_DEFAULT_INCREMENT, false));
        p.set_family(1 << 20);
        assert_eq!(p.driver().name(), "family");
        p.set_split(".meta", ".raw").unwrap();
        assert_eq!(p.driver().name(), "multi");
        assert!(p.set_driver(DriverConfig::Family { member_size: 0 }).is_err());
        assert_eq!(p.driver().name(), "multi");
    }
}
