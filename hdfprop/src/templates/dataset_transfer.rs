// SPDX-License-Identifier: MIT

use crate::errors::*;

/// Whether a conversion background buffer is used and preserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackgroundMode {
    #[default]
    No,
    Temp,
    Yes,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct DatasetTransferProps {
    buf_size: usize,
    pub background: BackgroundMode,
    btree_split_ratios: [f64; 3],
    pub hyper_cache: bool,
    pub hyper_cache_limit: usize,
}

impl Default for DatasetTransferProps {
    fn default() -> Self {
        Self {
            buf_size: 1024 * 1024,
            background: BackgroundMode::No,
            btree_split_ratios: [0.1, 0.5, 0.9],
            hyper_cache: true,
            hyper_cache_limit: 0,
        }
    }
}

impl DatasetTransferProps {
    pub fn buffer_size(&self) -> usize {
        self.buf_size
    }

    pub fn set_buffer_size(&mut self, size: usize) -> PropResult {
        if size == 0 {
            return Err(PropError::InvalidArgument("transfer buffer size must be positive"));
        }
        self.buf_size = size;
        Ok(())
    }

    pub fn preserve(&self) -> bool {
        self.background == BackgroundMode::Yes
    }

    pub fn set_preserve(&mut self, preserve: bool) {
        self.background = if preserve { BackgroundMode::Yes } else { BackgroundMode::No };
    }

    /// `[left, middle, right]` split ratios.
    pub fn btree_split_ratios(&self) -> [f64; 3] {
        self.btree_split_ratios
    }

    pub fn set_btree_split_ratios(&mut self, left: f64, middle: f64, right: f64) -> PropResult {
        let ratios = [left, middle, right];
        if ratios.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(PropError::InvalidArgument("split ratios must be within [0, 1]"));
        }
        self.btree_split_ratios = ratios;
        Ok(())
    }

    pub fn set_hyper_cache(&mut self, cache: bool, limit: usize) {
        self.hyper_cache = cache;
        self.hyper_cache_limit = limit;
    }
}
