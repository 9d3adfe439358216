// SPDX-License-Identifier: MIT

use core::any::Any;
use core::cmp::Ordering;
use core::fmt;
use std::rc::Rc;

use hdfatom::Hid;

use crate::errors::*;

/// Create/close callback: receives the property name and its value buffer.
pub type PropCallback = Rc<dyn Fn(&str, &mut [u8]) -> PropResult>;

/// Set/get callback: also receives the list handle.
pub type PropAccessCallback = Rc<dyn Fn(Hid, &str, &mut [u8]) -> PropResult>;

/// Class-level create/close callback.
pub type ClassCallback = Rc<dyn Fn(Hid, Option<&dyn Any>) -> PropResult>;

/// Opaque user data handed back to class callbacks.
pub type CallbackData = Rc<dyn Any>;

/// Optional per-property callbacks.
#[derive(Clone, Default)]
pub struct PropertyCallbacks {
    pub create: Option<PropCallback>,
    pub set: Option<PropAccessCallback>,
    pub get: Option<PropAccessCallback>,
    pub close: Option<PropCallback>,
}

impl PropertyCallbacks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_create(mut self, f: impl Fn(&str, &mut [u8]) -> PropResult + 'static) -> Self {
        self.create = Some(Rc::new(f));
        self
    }

    pub fn with_set(mut self, f: impl Fn(Hid, &str, &mut [u8]) -> PropResult + 'static) -> Self {
        self.set = Some(Rc::new(f));
        self
    }

    pub fn with_get(mut self, f: impl Fn(Hid, &str, &mut [u8]) -> PropResult + 'static) -> Self {
        self.get = Some(Rc::new(f));
        self
    }

    pub fn with_close(mut self, f: impl Fn(&str, &mut [u8]) -> PropResult + 'static) -> Self {
        self.close = Some(Rc::new(f));
        self
    }

    /// Presence and identity of each callback, in create/set/get/close order.
    fn identity(&self) -> [Option<usize>; 4] {
        [
            self.create.as_ref().map(rc_addr),
            self.set.as_ref().map(rc_addr),
            self.get.as_ref().map(rc_addr),
            self.close.as_ref().map(rc_addr),
        ]
    }
}

impl fmt::Debug for PropertyCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyCallbacks")
            .field("create", &self.create.is_some())
            .field("set", &self.set.is_some())
            .field("get", &self.get.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

/// Address of the shared allocation, used to order callbacks by identity.
pub(crate) fn rc_addr<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

#[derive(Clone, Debug)]
pub(crate) struct Property {
    pub name: String,
    pub size: usize,
    pub value: Option<Vec<u8>>,
    pub default: Option<Vec<u8>>,
    pub callbacks: PropertyCallbacks,
}

impl Property {
    pub fn new(
        name: &str,
        size: usize,
        default: Option<&[u8]>,
        callbacks: PropertyCallbacks,
    ) -> PropResult<Self> {
        if name.is_empty() {
            return Err(PropError::InvalidArgument("property name is empty"));
        }
        let default = match (size, default) {
            (0, None) => None,
            (0, Some(d)) if d.is_empty() => None,
            (0, Some(_)) => {
                return Err(PropError::InvalidArgument("zero-sized property cannot take a value"));
            }
            (_, None) => {
                return Err(PropError::InvalidArgument("property needs a default value"));
            }
            (size, Some(d)) if d.len() != size => {
                return Err(PropError::SizeMismatch {
                    name: name.to_string(),
                    expected: size,
                    found: d.len(),
                });
            }
            (_, Some(d)) => Some(d.to_vec()),
        };
        Ok(Self { name: name.to_string(), size, value: None, default, callbacks })
    }

    /// Copy for a new list: value starts out as the default.
    pub fn instantiate(&self) -> Self {
        let mut p = self.clone();
        p.value = self.default.clone();
        p
    }

    /// Runs a create/close style callback on the current value.
    pub fn run(&mut self, op: &'static str, cb: Option<PropCallback>) -> PropResult {
        let Some(cb) = cb else {
            return Ok(());
        };
        let mut scratch = self.value.clone().unwrap_or_default();
        cb(&self.name, &mut scratch).map_err(|e| PropError::Callback {
            op,
            name: self.name.clone(),
            source: Box::new(e),
        })?;
        if self.size > 0 {
            self.value = Some(scratch);
        }
        Ok(())
    }

    /// Total order: name, size, value, default, then callback identity.
    pub fn cmp_prop(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.size.cmp(&other.size))
            .then_with(|| self.value.cmp(&other.value))
            .then_with(|| self.default.cmp(&other.default))
            .then_with(|| self.callbacks.identity().cmp(&other.callbacks.identity()))
    }
}

/// Class-level hook and its user data.
#[derive(Clone)]
pub struct ClassHook {
    pub func: ClassCallback,
    pub data: Option<CallbackData>,
}

impl ClassHook {
    pub(crate) fn call(&self, id: Hid) -> PropResult {
        (self.func)(id, self.data.as_deref())
    }

    pub(crate) fn identity(&self) -> (usize, Option<usize>) {
        (rc_addr(&self.func), self.data.as_ref().map(rc_addr))
    }
}

impl fmt::Debug for ClassHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHook")
            .field("data", &self.data.is_some())
            .finish()
    }
}

/// Class create/close callbacks as passed to `create_class`.
#[derive(Clone, Default)]
pub struct ClassHooks {
    pub create: Option<ClassCallback>,
    pub create_data: Option<CallbackData>,
    pub close: Option<ClassCallback>,
    pub close_data: Option<CallbackData>,
}

impl ClassHooks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, f: impl Fn(Hid, Option<&dyn Any>) -> PropResult + 'static) -> Self {
        self.create = Some(Rc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(Hid, Option<&dyn Any>) -> PropResult + 'static) -> Self {
        self.close = Some(Rc::new(f));
        self
    }

    /// Splits into validated hooks; data without a callback is rejected.
    pub(crate) fn into_hooks(self) -> PropResult<(Option<ClassHook>, Option<ClassHook>)> {
        fn pair(
            func: Option<ClassCallback>,
            data: Option<CallbackData>,
        ) -> PropResult<Option<ClassHook>> {
            match (func, data) {
                (None, Some(_)) => Err(PropError::InvalidArgument(
                    "callback data supplied without a callback",
                )),
                (None, None) => Ok(None),
                (Some(func), data) => Ok(Some(ClassHook { func, data })),
            }
        }
        Ok((pair(self.create, self.create_data)?, pair(self.close, self.close_data)?))
    }
}
