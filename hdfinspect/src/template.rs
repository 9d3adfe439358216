// SPDX-License-Identifier: MIT

//! TOML description of the creation and access templates used by the CLI.
//!
//! ```toml
//! [create]
//! userblock = "1K"
//! sizeof_addr = 8
//!
//! [access]
//! alignment = "4K"
//!
//! [access.driver]
//! kind = "family"
//! member_size = "64M"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use hdfatom::Hid;
use hdfprop::prelude::*;

use crate::size::Bytes;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    #[serde(default)]
    pub create: CreateSection,
    #[serde(default)]
    pub access: AccessSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSection {
    pub userblock: Option<Bytes>,
    pub sizeof_addr: Option<u8>,
    pub sizeof_size: Option<u8>,
    pub sym_internal_k: Option<u32>,
    pub sym_leaf_k: Option<u32>,
    pub istore_k: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessSection {
    #[serde(default)]
    pub driver: DriverSection,
    pub alignment: Option<Bytes>,
    pub threshold: Option<Bytes>,
    pub sieve_buf_size: Option<Bytes>,
    pub meta_block_size: Option<Bytes>,
    pub mdc_nelmts: Option<usize>,
    pub rdcc_nelmts: Option<usize>,
    pub rdcc_nbytes: Option<Bytes>,
    pub rdcc_w0: Option<f64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum DriverSection {
    #[default]
    Sec2,
    Stdio,
    Core {
        #[serde(default)]
        increment: Bytes,
        #[serde(default)]
        backing_store: bool,
    },
    Family {
        #[serde(default)]
        member_size: Bytes,
    },
    Split {
        #[serde(default = "default_meta_suffix")]
        meta_suffix: String,
        #[serde(default = "default_raw_suffix")]
        raw_suffix: String,
    },
}

fn default_meta_suffix() -> String {
    ".meta".to_string()
}

fn default_raw_suffix() -> String {
    ".raw".to_string()
}

impl Template {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let template: Template = toml::from_str(content)?;
        template.validate()?;
        Ok(template)
    }

    /// Checks every value by building the property templates once.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.create_props()?;
        self.access_props()?;
        Ok(())
    }

    pub fn create_props(&self) -> anyhow::Result<FileCreateProps> {
        let c = &self.create;
        let mut props = FileCreateProps::default();
        if let Some(Bytes(size)) = c.userblock {
            props.set_userblock(size)?;
        }
        props.set_sizes(c.sizeof_addr.unwrap_or(0), c.sizeof_size.unwrap_or(0))?;
        props.set_sym_k(c.sym_internal_k.unwrap_or(0), c.sym_leaf_k.unwrap_or(0));
        if let Some(k) = c.istore_k {
            props.set_istore_k(k)?;
        }
        Ok(props)
    }

    pub fn access_props(&self) -> anyhow::Result<FileAccessProps> {
        let a = &self.access;
        let mut props = FileAccessProps::default();
        match &a.driver {
            DriverSection::Sec2 => props.set_sec2(),
            DriverSection::Stdio => props.set_stdio(),
            DriverSection::Core { increment, backing_store } => {
                let increment = usize::try_from(increment.0)?;
                props.set_core(increment, *backing_store);
            }
            DriverSection::Family { member_size } => props.set_family(member_size.0),
            DriverSection::Split { meta_suffix, raw_suffix } => {
                props.set_split(meta_suffix, raw_suffix)?
            }
        }

        let (threshold, alignment) = props.alignment();
        props.set_alignment(
            a.threshold.map_or(threshold, |b| b.0),
            a.alignment.map_or(alignment, |b| b.0),
        )?;

        let (mdc, rdcc_nelmts, rdcc_nbytes, w0) = props.cache();
        let rdcc_nbytes = match a.rdcc_nbytes {
            Some(Bytes(n)) => usize::try_from(n)?,
            None => rdcc_nbytes,
        };
        props.set_cache(
            a.mdc_nelmts.unwrap_or(mdc),
            a.rdcc_nelmts.unwrap_or(rdcc_nelmts),
            rdcc_nbytes,
            a.rdcc_w0.unwrap_or(w0),
        )?;
        if let Some(Bytes(n)) = a.sieve_buf_size {
            props.sieve_buf_size = usize::try_from(n)?;
        }
        if let Some(Bytes(n)) = a.meta_block_size {
            props.meta_block_size = n;
        }
        Ok(props)
    }

    /// Registers both templates as property lists; returns `(fcpl, fapl)`.
    pub fn register(&self, plists: &mut PropertyEngine) -> anyhow::Result<(Hid, Hid)> {
        let fcpl = plists.create_with(self.create_props()?)?;
        let fapl = plists.create_with(self.access_props()?)?;
        Ok((fcpl, fapl))
    }

    pub fn print_summary(&self) {
        println!("[hdfinspect] Template:");
        println!("  - create: {:?}", self.create);
        println!("  - driver: {:?}", self.access.driver);
    }
}
