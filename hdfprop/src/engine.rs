// SPDX-License-Identifier: MIT

use core::cmp::Ordering;
use std::collections::BTreeMap;

use hdfatom::{AtomGroup, Hid, Registry};

use crate::class::{PropertyClass, PropertyList, cmp_props};
use crate::errors::*;
use crate::property::{ClassHooks, Property, PropertyCallbacks};
use crate::templates::{TemplateKind, TemplateProps};

/// Handles of the classes every engine starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardClasses {
    pub root: Hid,
    pub file_create: Hid,
    pub file_access: Hid,
    pub dataset_create: Hid,
    pub dataset_transfer: Hid,
    pub mount: Hid,
}

impl StandardClasses {
    pub fn get(&self, kind: TemplateKind) -> Hid {
        match kind {
            TemplateKind::FileCreate => self.file_create,
            TemplateKind::FileAccess => self.file_access,
            TemplateKind::DatasetCreate => self.dataset_create,
            TemplateKind::DatasetTransfer => self.dataset_transfer,
            TemplateKind::Mount => self.mount,
        }
    }

    fn contains(&self, id: Hid) -> bool {
        id == self.root || TemplateKind::ALL.iter().any(|k| self.get(*k) == id)
    }
}

/// Where an iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterOutcome {
    /// Positive callback value that ended the walk, or 0 if every property was visited.
    pub value: i32,
    /// Index of the property that stopped the walk, or the property count.
    pub index: usize,
}

/// Property classes and lists, and the handles that name them.
///
/// Class handles point at class records; a record outlives its last handle
/// while lists or derived classes still depend on it.
#[derive(Debug)]
pub struct PropertyEngine {
    records: Registry<PropertyClass>,
    classes: Registry<Hid>,
    lists: Registry<PropertyList>,
    standard: StandardClasses,
}

impl PropertyEngine {
    /// Creates the root class and the standard classes below it.
    pub fn new() -> PropResult<Self> {
        let mut records = Registry::new(AtomGroup::ClassRecord);
        let mut classes = Registry::new(AtomGroup::PropertyClass);

        let mut root = PropertyClass::new(None, "root", 1);
        root.internal = true;
        let root_key = records.register(root)?;
        let root_id = classes.register(root_key)?;

        let mut ids = [Hid::INVALID; TemplateKind::ALL.len()];
        for (slot, kind) in ids.iter_mut().zip(TemplateKind::ALL) {
            let mut class = PropertyClass::new(Some(root_key), kind.class_name(), 1);
            class.internal = true;
            class.template = Some(kind);
            let key = records.register(class)?;
            records.get_mut(root_key)?.nclasses += 1;
            *slot = classes.register(key)?;
        }

        let [file_create, file_access, dataset_create, dataset_transfer, mount] = ids;
        Ok(Self {
            records,
            classes,
            lists: Registry::new(AtomGroup::PropertyList),
            standard: StandardClasses {
                root: root_id,
                file_create,
                file_access,
                dataset_create,
                dataset_transfer,
                mount,
            },
        })
    }

    pub fn standard(&self) -> &StandardClasses {
        &self.standard
    }

    pub fn root(&self) -> Hid {
        self.standard.root
    }

    /// Number of open list handles.
    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// Number of open class handles.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of class records still alive, including orphaned ones.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    // Internal helpers

    fn record_of(&self, class: Hid) -> PropResult<Hid> {
        Ok(*self.classes.get(class)?)
    }

    fn record(&self, key: Hid) -> PropResult<&PropertyClass> {
        Ok(self.records.get(key)?)
    }

    fn record_mut(&mut self, key: Hid) -> PropResult<&mut PropertyClass> {
        Ok(self.records.get_mut(key)?)
    }

    fn props_of(&self, id: Hid) -> PropResult<&BTreeMap<String, Property>> {
        match id.group() {
            Some(AtomGroup::PropertyList) => Ok(&self.lists.get(id)?.props),
            Some(AtomGroup::PropertyClass) => Ok(&self.record(self.record_of(id)?)?.props),
            _ => Err(PropError::InvalidArgument("not a property list or class")),
        }
    }

    /// Frees `key` and then its ancestors, as long as each is deleted and unused.
    fn release_record(&mut self, mut key: Hid) -> PropResult {
        loop {
            if !self.record(key)?.is_releasable() {
                return Ok(());
            }
            let class = self.records.remove(key)?;
            log::trace!("freed property class '{}'", class.name);
            match class.parent {
                Some(parent) => {
                    self.record_mut(parent)?.nclasses -= 1;
                    key = parent;
                }
                None => return Ok(()),
            }
        }
    }

    /// New record copying `key`'s own properties, registered under the same parent.
    fn duplicate_record(&mut self, key: Hid) -> PropResult<Hid> {
        let copy = self.record(key)?.duplicate();
        let parent = copy.parent;
        let new_key = self.records.register(copy)?;
        if let Some(parent) = parent {
            self.record_mut(parent)?.nclasses += 1;
        }
        Ok(new_key)
    }

    fn run_class_create(&mut self, list: Hid, key: Hid) -> PropResult {
        let class = self.record(key)?;
        if let Some(hook) = class.create.clone() {
            let name = class.name.clone();
            if let Err(e) = hook.call(list) {
                let mut l = self.lists.remove(list)?;
                if let Some(close_err) = close_props(&mut l.props) {
                    log::debug!("discarding list of class '{name}': {close_err}");
                }
                self.record_mut(key)?.nplists -= 1;
                self.release_record(key)?;
                return Err(PropError::Callback {
                    op: "class create",
                    name,
                    source: Box::new(e),
                });
            }
        }
        self.lists.get_mut(list)?.class_init = true;
        Ok(())
    }

    // Classes

    /// Derives a class from `parent`.
    pub fn create_class(
        &mut self,
        parent: Hid,
        name: &str,
        buckets: usize,
        hooks: ClassHooks,
    ) -> PropResult<Hid> {
        if name.is_empty() {
            return Err(PropError::InvalidArgument("class name is empty"));
        }
        if buckets == 0 {
            return Err(PropError::InvalidArgument("bucket count must be positive"));
        }
        let (create, close) = hooks.into_hooks()?;
        let parent_key = self.record_of(parent)?;

        let mut class = PropertyClass::new(Some(parent_key), name, buckets);
        class.create = create;
        class.close = close;
        let key = self.records.register(class)?;
        let id = match self.classes.register(key) {
            Ok(id) => id,
            Err(e) => {
                self.records.remove(key)?;
                return Err(e.into());
            }
        };
        self.record_mut(parent_key)?.nclasses += 1;
        Ok(id)
    }

    /// Adds a property to `class`.
    ///
    /// When lists or derived classes already depend on the class, the
    /// property goes into a copy and `class` is rebound to it; the
    /// dependents keep the old property set.
    pub fn register(
        &mut self,
        class: Hid,
        name: &str,
        size: usize,
        default: Option<&[u8]>,
        callbacks: PropertyCallbacks,
    ) -> PropResult {
        let prop = Property::new(name, size, default, callbacks)?;
        let key = self.record_of(class)?;
        let current = self.record(key)?;
        if current.props.contains_key(name) {
            return Err(PropError::Exists(name.to_string()));
        }

        let target = if current.nplists > 0 || current.nclasses > 0 {
            let new_key = self.duplicate_record(key)?;
            self.classes.substitute(class, new_key)?;
            let old = self.record_mut(key)?;
            old.ref_count -= 1;
            if old.ref_count == 0 {
                old.deleted = true;
            }
            log::debug!(
                "class '{}' has dependents, registering '{name}' on a copy",
                old.name
            );
            self.release_record(key)?;
            new_key
        } else {
            key
        };

        self.record_mut(target)?
            .props
            .insert(name.to_string(), prop);
        Ok(())
    }

    /// Removes a property from `class`. Existing lists keep their copies.
    pub fn unregister(&mut self, class: Hid, name: &str) -> PropResult {
        let key = self.record_of(class)?;
        let class = self.record_mut(key)?;
        let prop = class
            .props
            .get(name)
            .ok_or_else(|| PropError::NotFound(name.to_string()))?;
        if let Some(cb) = &prop.callbacks.close {
            let mut scratch = prop.default.clone().unwrap_or_default();
            cb(name, &mut scratch).map_err(|e| PropError::Callback {
                op: "close",
                name: name.to_string(),
                source: Box::new(e),
            })?;
        }
        class.props.remove(name);
        Ok(())
    }

    /// Copies a class; the copy shares the original's parent.
    pub fn copy_class(&mut self, class: Hid) -> PropResult<Hid> {
        let key = self.record_of(class)?;
        let new_key = self.duplicate_record(key)?;
        Ok(self.classes.register(new_key)?)
    }

    pub fn get_class_name(&self, class: Hid) -> PropResult<String> {
        Ok(self.record(self.record_of(class)?)?.name.clone())
    }

    /// New handle on the parent class, `None` for the root.
    pub fn get_class_parent(&mut self, class: Hid) -> PropResult<Option<Hid>> {
        let Some(parent) = self.record(self.record_of(class)?)?.parent else {
            return Ok(None);
        };
        self.record_mut(parent)?.ref_count += 1;
        Ok(Some(self.classes.register(parent)?))
    }

    /// Releases a class handle.
    pub fn close_class(&mut self, class: Hid) -> PropResult {
        if self.standard.contains(class) {
            return Err(PropError::InvalidArgument("built-in classes cannot be closed"));
        }
        let Some(key) = self.classes.dec_ref(class)? else {
            return Ok(());
        };
        let record = self.record_mut(key)?;
        record.ref_count -= 1;
        if record.ref_count == 0 {
            record.deleted = true;
        }
        self.release_record(key)
    }

    // Lists

    /// Instantiates `class`: every property of the class chain is copied and
    /// passed through its create callback, then the class create callback runs.
    pub fn create_list(&mut self, class: Hid) -> PropResult<Hid> {
        let key = self.record_of(class)?;

        let mut props = BTreeMap::new();
        let mut template = None;
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let rec = self.record(k)?;
            if template.is_none() {
                template = rec.template.map(TemplateKind::default_template);
            }
            for (name, prop) in &rec.props {
                if !props.contains_key(name) {
                    props.insert(name.clone(), prop.instantiate());
                }
            }
            cursor = rec.parent;
        }

        for prop in props.values_mut() {
            let cb = prop.callbacks.create.clone();
            prop.run("create", cb)?;
        }

        let id = self.lists.register(PropertyList {
            class: key,
            props,
            class_init: false,
            template,
        })?;
        self.record_mut(key)?.nplists += 1;
        self.run_class_create(id, key)?;
        Ok(id)
    }

    /// New list from one of the standard classes.
    pub fn create_standard(&mut self, kind: TemplateKind) -> PropResult<Hid> {
        self.create_list(self.standard.get(kind))
    }

    /// Deep copy of a list. The class create callback runs for the copy.
    pub fn copy_list(&mut self, list: Hid) -> PropResult<Hid> {
        let src = self.lists.get(list)?;
        let key = src.class;
        let copy = PropertyList {
            class: key,
            props: src.props.clone(),
            class_init: false,
            template: src.template.clone(),
        };
        let id = self.lists.register(copy)?;
        self.record_mut(key)?.nplists += 1;
        self.run_class_create(id, key)?;
        Ok(id)
    }

    /// Copies a list or a class.
    pub fn copy(&mut self, id: Hid) -> PropResult<Hid> {
        match id.group() {
            Some(AtomGroup::PropertyList) => self.copy_list(id),
            Some(AtomGroup::PropertyClass) => self.copy_class(id),
            _ => Err(PropError::InvalidArgument("not a property list or class")),
        }
    }

    /// New handle on the class `list` was created from.
    pub fn get_class(&mut self, list: Hid) -> PropResult<Hid> {
        let key = self.lists.get(list)?.class;
        self.record_mut(key)?.ref_count += 1;
        Ok(self.classes.register(key)?)
    }

    /// Whether `list` was created from `class` or a class derived from it.
    pub fn isa_class(&self, list: Hid, class: Hid) -> PropResult<bool> {
        let target = self.record_of(class)?;
        let mut cursor = Some(self.lists.get(list)?.class);
        while let Some(k) = cursor {
            if k == target {
                return Ok(true);
            }
            cursor = self.record(k)?.parent;
        }
        Ok(false)
    }

    /// Adds a property to one list only. `value` is taken as already initialized.
    pub fn insert(
        &mut self,
        list: Hid,
        name: &str,
        size: usize,
        value: Option<&[u8]>,
        callbacks: PropertyCallbacks,
    ) -> PropResult {
        if callbacks.create.is_some() {
            return Err(PropError::InvalidArgument(
                "inserted properties take no create callback",
            ));
        }
        let mut prop = Property::new(name, size, value, callbacks)?;
        prop.value = prop.default.clone();
        let l = self.lists.get_mut(list)?;
        if l.props.contains_key(name) {
            return Err(PropError::Exists(name.to_string()));
        }
        l.props.insert(name.to_string(), prop);
        Ok(())
    }

    /// Stores `value`, after the set callback (if any) has seen and possibly
    /// rewritten a working copy. A failing callback leaves the old value.
    pub fn set(&mut self, list: Hid, name: &str, value: &[u8]) -> PropResult {
        let l = self.lists.get_mut(list)?;
        let prop = l
            .props
            .get_mut(name)
            .ok_or_else(|| PropError::NotFound(name.to_string()))?;
        if prop.size == 0 {
            return Err(PropError::ZeroSized(name.to_string()));
        }
        if value.len() != prop.size {
            return Err(PropError::SizeMismatch {
                name: name.to_string(),
                expected: prop.size,
                found: value.len(),
            });
        }
        let mut scratch = value.to_vec();
        if let Some(cb) = &prop.callbacks.set {
            cb(list, name, &mut scratch).map_err(|e| PropError::Callback {
                op: "set",
                name: name.to_string(),
                source: Box::new(e),
            })?;
        }
        prop.value = Some(scratch);
        Ok(())
    }

    /// Copies the value into `out` through the get callback (if any).
    pub fn get(&self, list: Hid, name: &str, out: &mut [u8]) -> PropResult {
        let prop = self
            .lists
            .get(list)?
            .props
            .get(name)
            .ok_or_else(|| PropError::NotFound(name.to_string()))?;
        if prop.size == 0 {
            return Err(PropError::ZeroSized(name.to_string()));
        }
        if out.len() != prop.size {
            return Err(PropError::SizeMismatch {
                name: name.to_string(),
                expected: prop.size,
                found: out.len(),
            });
        }
        let mut scratch = prop.value.clone().unwrap_or_else(|| vec![0; prop.size]);
        if let Some(cb) = &prop.callbacks.get {
            cb(list, name, &mut scratch).map_err(|e| PropError::Callback {
                op: "get",
                name: name.to_string(),
                source: Box::new(e),
            })?;
        }
        out.copy_from_slice(&scratch);
        Ok(())
    }

    /// [`get`](Self::get) into a fresh buffer.
    pub fn get_value(&self, list: Hid, name: &str) -> PropResult<Vec<u8>> {
        let mut out = vec![0; self.get_size(list, name)?];
        self.get(list, name, &mut out)?;
        Ok(out)
    }

    /// Runs the close callback, then drops the property from the list.
    pub fn remove(&mut self, list: Hid, name: &str) -> PropResult {
        let l = self.lists.get_mut(list)?;
        let prop = l
            .props
            .get_mut(name)
            .ok_or_else(|| PropError::NotFound(name.to_string()))?;
        let cb = prop.callbacks.close.clone();
        prop.run("close", cb)?;
        l.props.remove(name);
        Ok(())
    }

    /// Releases a list handle. At the last reference the class close callback
    /// and every property close callback run; the first failure is reported
    /// once all have run.
    pub fn close_list(&mut self, list: Hid) -> PropResult {
        if self.lists.ref_count(list)? > 1 {
            self.lists.dec_ref(list)?;
            return Ok(());
        }
        let (key, class_init) = {
            let l = self.lists.get(list)?;
            (l.class, l.class_init)
        };

        let mut first_err = None;
        let class = self.record(key)?;
        if let (true, Some(hook)) = (class_init, class.close.clone()) {
            let name = class.name.clone();
            if let Err(e) = hook.call(list) {
                first_err = Some(PropError::Callback {
                    op: "class close",
                    name,
                    source: Box::new(e),
                });
            }
        }

        let mut l = self.lists.remove(list)?;
        if let Some(e) = close_props(&mut l.props) {
            first_err.get_or_insert(e);
        }

        self.record_mut(key)?.nplists -= 1;
        self.release_record(key)?;
        first_err.map_or(Ok(()), Err)
    }

    /// Adds a reference to a list handle.
    pub fn inc_ref(&mut self, list: Hid) -> PropResult<u32> {
        Ok(self.lists.inc_ref(list)?)
    }

    // Introspection

    /// Whether the list, or the class itself (not its ancestors), has `name`.
    pub fn exist(&self, id: Hid, name: &str) -> PropResult<bool> {
        Ok(self.props_of(id)?.contains_key(name))
    }

    pub fn get_size(&self, id: Hid, name: &str) -> PropResult<usize> {
        self.props_of(id)?
            .get(name)
            .map(|p| p.size)
            .ok_or_else(|| PropError::NotFound(name.to_string()))
    }

    pub fn get_nprops(&self, id: Hid) -> PropResult<usize> {
        Ok(self.props_of(id)?.len())
    }

    /// Calls `cb` for each property from index `start` on.
    ///
    /// A positive return stops the walk successfully, a negative one stops it
    /// with [`PropError::IterationFailed`].
    pub fn iterate(
        &self,
        id: Hid,
        start: usize,
        mut cb: impl FnMut(Hid, &str) -> i32,
    ) -> PropResult<IterOutcome> {
        let props = self.props_of(id)?;
        for (index, name) in props.keys().enumerate().skip(start) {
            match cb(id, name) {
                0 => {}
                value if value > 0 => return Ok(IterOutcome { value, index }),
                value => return Err(PropError::IterationFailed { value, index }),
            }
        }
        Ok(IterOutcome { value: 0, index: props.len() })
    }

    /// Total order over two lists or two classes.
    pub fn compare(&self, a: Hid, b: Hid) -> PropResult<Ordering> {
        match (a.group(), b.group()) {
            (Some(AtomGroup::PropertyList), Some(AtomGroup::PropertyList)) => {
                let (x, y) = (self.lists.get(a)?, self.lists.get(b)?);
                let ord = x
                    .props
                    .len()
                    .cmp(&y.props.len())
                    .then(x.class_init.cmp(&y.class_init))
                    .then_with(|| cmp_props(&x.props, &y.props));
                if ord.is_ne() {
                    return Ok(ord);
                }
                let class_ord = self.record(x.class)?.cmp_class(self.record(y.class)?);
                Ok(class_ord.then_with(|| match (&x.template, &y.template) {
                    (Some(tx), Some(ty)) => tx.cmp_template(ty),
                    (tx, ty) => tx.is_some().cmp(&ty.is_some()),
                }))
            }
            (Some(AtomGroup::PropertyClass), Some(AtomGroup::PropertyClass)) => {
                let x = self.record(self.record_of(a)?)?;
                let y = self.record(self.record_of(b)?)?;
                Ok(x.cmp_class(y))
            }
            _ => Err(PropError::InvalidArgument("can only compare two lists or two classes")),
        }
    }

    pub fn equal(&self, a: Hid, b: Hid) -> PropResult<bool> {
        Ok(self.compare(a, b)?.is_eq())
    }

    // Typed templates

    /// Typed template of a list created from a standard class (or a class derived from one).
    pub fn props<T: TemplateProps>(&self, list: Hid) -> PropResult<&T> {
        self.lists
            .get(list)?
            .template
            .as_ref()
            .and_then(T::from_template)
            .ok_or(PropError::WrongClass { expected: T::KIND.class_name() })
    }

    pub fn props_mut<T: TemplateProps>(&mut self, list: Hid) -> PropResult<&mut T> {
        self.lists
            .get_mut(list)?
            .template
            .as_mut()
            .and_then(T::from_template_mut)
            .ok_or(PropError::WrongClass { expected: T::KIND.class_name() })
    }

    /// Replaces the typed template of `list`.
    pub fn set_props<T: TemplateProps>(&mut self, list: Hid, value: T) -> PropResult {
        *self.props_mut::<T>(list)? = value;
        Ok(())
    }

    /// New standard list holding `value`.
    pub fn create_with<T: TemplateProps>(&mut self, value: T) -> PropResult<Hid> {
        let id = self.create_standard(T::KIND)?;
        self.set_props(id, value)?;
        Ok(id)
    }
}

/// Runs every close callback; all are attempted and the first error is returned.
fn close_props(props: &mut BTreeMap<String, Property>) -> Option<PropError> {
    let mut first_err = None;
    for prop in props.values_mut() {
        let cb = prop.callbacks.close.clone();
        if let Err(e) = prop.run("close", cb) {
            first_err.get_or_insert(e);
        }
    }
    first_err
}
