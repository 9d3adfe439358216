// SPDX-License-Identifier: MIT

use crate::errors::*;

/// Maximum dataset rank.
pub const MAX_RANK: usize = 32;

/// Size of an external segment that extends to the end of the dataset.
pub const UNLIMITED: u64 = u64::MAX;

pub const FILTER_DEFLATE: u16 = 1;

/// Filter may be skipped when it fails.
pub const FILTER_OPTIONAL: u32 = 0x0001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layout {
    Compact,
    #[default]
    Contiguous,
    Chunked,
}

/// One segment of raw data stored outside the file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExternalFile {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Filter {
    pub id: u16,
    pub flags: u32,
    pub name: Option<String>,
    pub cd_values: Vec<u32>,
}

/// Fill value for unwritten elements.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum FillValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

/// Conversion between [`FillValue`] and native element types.
pub trait FillNative: Sized {
    fn to_fill(self) -> FillValue;
    fn from_fill(fill: &FillValue) -> Option<Self>;
}

macro_rules! fill_native_int {
    ($variant:ident, $wide:ty; $($t:ty),+) => {
        $(
            impl FillNative for $t {
                fn to_fill(self) -> FillValue {
                    FillValue::$variant(self as $wide)
                }

                fn from_fill(fill: &FillValue) -> Option<Self> {
                    match fill {
                        FillValue::Int(v) => <$t>::try_from(*v).ok(),
                        FillValue::UInt(v) => <$t>::try_from(*v).ok(),
                        FillValue::Float(v) if v.fract() == 0.0 => {
                            let r = *v as $t;
                            (r as f64 == *v).then_some(r)
                        }
                        _ => None,
                    }
                }
            }
        )+
    };
}

fill_native_int!(Int, i64; i8, i16, i32, i64);
fill_native_int!(UInt, u64; u8, u16, u32, u64);

impl FillNative for f64 {
    fn to_fill(self) -> FillValue {
        FillValue::Float(self)
    }

    fn from_fill(fill: &FillValue) -> Option<Self> {
        match fill {
            FillValue::Int(v) => Some(*v as f64),
            FillValue::UInt(v) => Some(*v as f64),
            FillValue::Float(v) => Some(*v),
            FillValue::Bytes(_) => None,
        }
    }
}

impl FillNative for f32 {
    fn to_fill(self) -> FillValue {
        FillValue::Float(self as f64)
    }

    fn from_fill(fill: &FillValue) -> Option<Self> {
        f64::from_fill(fill).map(|v| v as f32)
    }
}

/// Storage layout, external storage, filters and fill value of a new dataset.
#[derive(Debug, Clone, Default, PartialEq, PartialOrd)]
pub struct DatasetCreateProps {
    layout: Layout,
    chunk_dims: Vec<u64>,
    external: Vec<ExternalFile>,
    filters: Vec<Filter>,
    fill: Option<FillValue>,
}

impl DatasetCreateProps {
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Switching away from chunked storage drops the chunk dimensions.
    pub fn set_layout(&mut self, layout: Layout) {
        if layout != Layout::Chunked {
            self.chunk_dims.clear();
        }
        self.layout = layout;
    }

    /// Sets chunk dimensions and switches to chunked storage.
    pub fn set_chunk(&mut self, dims: &[u64]) -> PropResult {
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(PropError::InvalidArgument("chunk rank must be within 1..=32"));
        }
        if dims.contains(&0) {
            return Err(PropError::InvalidArgument("chunk dimensions must be positive"));
        }
        self.chunk_dims = dims.to_vec();
        self.layout = Layout::Chunked;
        Ok(())
    }

    pub fn chunk(&self) -> PropResult<&[u64]> {
        match self.layout {
            Layout::Chunked => Ok(&self.chunk_dims),
            _ => Err(PropError::InvalidArgument("layout is not chunked")),
        }
    }

    /// Appends an external segment. Only the last segment may be [`UNLIMITED`].
    pub fn add_external(&mut self, name: &str, offset: u64, size: u64) -> PropResult {
        if name.is_empty() {
            return Err(PropError::InvalidArgument("external file name is empty"));
        }
        if self.external.last().is_some_and(|e| e.size == UNLIMITED) {
            return Err(PropError::InvalidArgument(
                "cannot add a segment after an unlimited one",
            ));
        }
        if size != UNLIMITED {
            let total = self
                .external
                .iter()
                .try_fold(size, |acc, e| acc.checked_add(e.size));
            if total.is_none_or(|t| t == UNLIMITED) {
                return Err(PropError::InvalidArgument("total external size overflows"));
            }
        }
        self.external.push(ExternalFile { name: name.to_string(), offset, size });
        Ok(())
    }

    pub fn external(&self) -> &[ExternalFile] {
        &self.external
    }

    /// Appends a filter to the pipeline.
    pub fn add_filter(&mut self, id: u16, flags: u32, name: Option<&str>, cd_values: &[u32]) {
        self.filters.push(Filter {
            id,
            flags,
            name: name.map(str::to_string),
            cd_values: cd_values.to_vec(),
        });
    }

    /// Adds an optional deflate filter at `level`.
    pub fn set_deflate(&mut self, level: u32) -> PropResult {
        if level > 9 {
            return Err(PropError::InvalidArgument("deflate level must be within 0..=9"));
        }
        self.add_filter(FILTER_DEFLATE, FILTER_OPTIONAL, Some("deflate"), &[level]);
        Ok(())
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn set_fill_value(&mut self, fill: FillValue) {
        self.fill = Some(fill);
    }

    pub fn set_fill<T: FillNative>(&mut self, value: T) {
        self.fill = Some(value.to_fill());
    }

    pub fn fill_value(&self) -> Option<&FillValue> {
        self.fill.as_ref()
    }

    /// Fill value converted to `T`; `None` if unset or not representable.
    pub fn fill<T: FillNative>(&self) -> Option<T> {
        self.fill.as_ref().and_then(T::from_fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_forces_layout() {
        let mut p = DatasetCreateProps::default();
        assert_eq!(p.layout(), Layout::Contiguous);
        assert!(p.chunk().is_err());
        assert!(p.set_chunk(&[]).is_err());
        assert!(p.set_chunk(&[4, 0]).is_err());
        p.set_chunk(&[4, 8]).unwrap();
        assert_eq!(p.layout(), Layout::Chunked);
        assert_eq!(p.chunk().unwrap(), &[4, 8]);

        p.set_layout(Layout::Compact);
        assert!(p.chunk().is_err());
    }

    #[test]
    fn test_external_unlimited_last() {
        let mut p = DatasetCreateProps::default();
        p.add_external("a.raw", 0, 100).unwrap();
        p.add_external("b.raw", 16, UNLIMITED).unwrap();
        assert!(p.add_external("c.raw", 0, 1).is_err());
        assert_eq!(p.external().len(), 2);
    }

    #[test]
    fn test_external_overflow() {
        let mut p = DatasetCreateProps::default();
        p.add_external("a.raw", 0, u64::MAX - 10).unwrap();
        assert!(p.add_external("b.raw", 0, 10).is_err());
        assert!(p.add_external("b.raw", 0, 9).is_ok());
    }

    #[test]
    fn test_deflate() {
        let mut p = DatasetCreateProps::default();
        assert!(p.set_deflate(10).is_err());
        p.set_deflate(6).unwrap();
        let f = &p.filters()[0];
        assert_eq!((f.id, f.flags, f.cd_values.as_slice()), (FILTER_DEFLATE, FILTER_OPTIONAL, &[6][..]));
        assert_eq!(f.name.as_deref(), Some("deflate"));
    }

    #[test]
    fn test_fill_conversion() {
        let mut p = DatasetCreateProps::default();
        assert_eq!(p.fill::<i32>(), None);
        p.set_fill(300i32);
        assert_eq!(p.fill::<i64>(), Some(300));
        assert_eq!(p.fill::<u8>(), None);
        assert_eq!(p.fill::<f32>(), Some(300.0));

        p.set_fill(2.5f64);
        assert_eq!(p.fill::<i32>(), None);
        p.set_fill(4.0f32);
        assert_eq!(p.fill::<u16>(), Some(4));
    }
}
