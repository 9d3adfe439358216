// SPDX-License-Identifier: MIT

use core::cmp::Ordering;
use std::collections::BTreeMap;

use hdfatom::Hid;

use crate::property::{ClassHook, Property};
use crate::templates::{Template, TemplateKind};

/// Class storage. `parent` and the engine's class handles refer to records
/// by their key in the record registry.
#[derive(Debug, Clone)]
pub(crate) struct PropertyClass {
    pub parent: Option<Hid>,
    pub name: String,
    pub hashsize: usize,
    pub props: BTreeMap<String, Property>,
    /// Live classes derived from this one.
    pub nclasses: usize,
    /// Live lists created from this class.
    pub nplists: usize,
    /// Public handles bound to this record.
    pub ref_count: usize,
    pub internal: bool,
    pub deleted: bool,
    pub create: Option<ClassHook>,
    pub close: Option<ClassHook>,
    /// Standard template carried by lists of this class.
    pub template: Option<TemplateKind>,
}

impl PropertyClass {
    pub fn new(parent: Option<Hid>, name: &str, hashsize: usize) -> Self {
        Self {
            parent,
            name: name.to_string(),
            hashsize,
            props: BTreeMap::new(),
            nclasses: 0,
            nplists: 0,
            ref_count: 1,
            internal: false,
            deleted: false,
            create: None,
            close: None,
            template: None,
        }
    }

    /// Copy of this class with no dependents and a single handle.
    pub fn duplicate(&self) -> Self {
        Self {
            nclasses: 0,
            nplists: 0,
            ref_count: 1,
            deleted: false,
            ..self.clone()
        }
    }

    pub fn is_releasable(&self) -> bool {
        self.deleted && self.nclasses == 0 && self.nplists == 0
    }

    /// Metadata order, then properties pairwise.
    pub fn cmp_class(&self, other: &Self) -> Ordering {
        let hook = |h: &Option<ClassHook>| h.as_ref().map(|h| h.identity());
        self.name
            .cmp(&other.name)
            .then(self.hashsize.cmp(&other.hashsize))
            .then(self.props.len().cmp(&other.props.len()))
            .then(self.nplists.cmp(&other.nplists))
            .then(self.nclasses.cmp(&other.nclasses))
            .then(self.internal.cmp(&other.internal))
            .then(self.deleted.cmp(&other.deleted))
            .then_with(|| hook(&self.create).cmp(&hook(&other.create)))
            .then_with(|| hook(&self.close).cmp(&hook(&other.close)))
            .then_with(|| cmp_props(&self.props, &other.props))
    }
}

/// Property list storage.
#[derive(Debug, Clone)]
pub(crate) struct PropertyList {
    /// Record of the originating class.
    pub class: Hid,
    pub props: BTreeMap<String, Property>,
    /// Set once the class create callback has run.
    pub class_init: bool,
    pub template: Option<Template>,
}

pub(crate) fn cmp_props(a: &BTreeMap<String, Property>, b: &BTreeMap<String, Property>) -> Ordering {
    a.values()
        .zip(b.values())
        .map(|(x, y)| x.cmp_prop(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}
