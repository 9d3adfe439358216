// SPDX-License-Identifier: MIT

//! Typed values carried by lists of the standard classes.

mod dataset_create;
mod dataset_transfer;
mod file_access;
mod file_create;
mod mount;

pub use dataset_create::*;
pub use dataset_transfer::*;
pub use file_access::*;
pub use file_create::*;
pub use mount::*;

use core::cmp::Ordering;

/// Standard classes, children of the root class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateKind {
    FileCreate,
    FileAccess,
    DatasetCreate,
    DatasetTransfer,
    Mount,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 5] = [
        TemplateKind::FileCreate,
        TemplateKind::FileAccess,
        TemplateKind::DatasetCreate,
        TemplateKind::DatasetTransfer,
        TemplateKind::Mount,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            TemplateKind::FileCreate => "file create",
            TemplateKind::FileAccess => "file access",
            TemplateKind::DatasetCreate => "dataset create",
            TemplateKind::DatasetTransfer => "dataset transfer",
            TemplateKind::Mount => "file mount",
        }
    }

    pub fn default_template(self) -> Template {
        match self {
            TemplateKind::FileCreate => Template::FileCreate(FileCreateProps::default()),
            TemplateKind::FileAccess => Template::FileAccess(FileAccessProps::default()),
            TemplateKind::DatasetCreate => Template::DatasetCreate(DatasetCreateProps::default()),
            TemplateKind::DatasetTransfer => {
                Template::DatasetTransfer(DatasetTransferProps::default())
            }
            TemplateKind::Mount => Template::Mount(MountProps::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Template {
    FileCreate(FileCreateProps),
    FileAccess(FileAccessProps),
    DatasetCreate(DatasetCreateProps),
    DatasetTransfer(DatasetTransferProps),
    Mount(MountProps),
}

impl Template {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Template::FileCreate(_) => TemplateKind::FileCreate,
            Template::FileAccess(_) => TemplateKind::FileAccess,
            Template::DatasetCreate(_) => TemplateKind::DatasetCreate,
            Template::DatasetTransfer(_) => TemplateKind::DatasetTransfer,
            Template::Mount(_) => TemplateKind::Mount,
        }
    }

    pub(crate) fn cmp_template(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Gives the engine typed access to one [`Template`] variant.
pub trait TemplateProps: Sized {
    const KIND: TemplateKind;

    fn from_template(t: &Template) -> Option<&Self>;
    fn from_template_mut(t: &mut Template) -> Option<&mut Self>;
    fn into_template(self) -> Template;
}

macro_rules! template_props {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl TemplateProps for $ty {
                const KIND: TemplateKind = TemplateKind::$variant;

                fn from_template(t: &Template) -> Option<&Self> {
                    match t {
                        Template::$variant(p) => Some(p),
                        _ => None,
                    }
                }

                fn from_template_mut(t: &mut Template) -> Option<&mut Self> {
                    match t {
                        Template::$variant(p) => Some(p),
                        _ => None,
                    }
                }

                fn into_template(self) -> Template {
                    Template::$variant(self)
                }
            }
        )+
    };
}

template_props! {
    FileCreate => FileCreateProps,
    FileAccess => FileAccessProps,
    DatasetCreate => DatasetCreateProps,
    DatasetTransfer => DatasetTransferProps,
    Mount => MountProps,
}
