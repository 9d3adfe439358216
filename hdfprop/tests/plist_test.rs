// SPDX-License-Identifier: MIT

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

use hdfprop::prelude::*;

fn engine() -> PropertyEngine {
    PropertyEngine::new().unwrap()
}

fn u32_bytes(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

fn read_u32(e: &PropertyEngine, list: Hid, name: &str) -> u32 {
    let mut buf = [0u8; 4];
    e.get(list, name, &mut buf).unwrap();
    u32::from_le_bytes(buf)
}

#[test]
fn test_list_inherits_class_chain() {
    let mut e = engine();
    let root = e.root();
    let base = e.create_class(root, "base", 8, ClassHooks::none()).unwrap();
    e.register(base, "a", 4, Some(&u32_bytes(1)), PropertyCallbacks::none()).unwrap();
    let derived = e.create_class(base, "derived", 8, ClassHooks::none()).unwrap();
    e.register(derived, "b", 4, Some(&u32_bytes(2)), PropertyCallbacks::none()).unwrap();

    let list = e.create_list(derived).unwrap();
    assert_eq!(e.get_nprops(list).unwrap(), 2);
    assert_eq!(read_u32(&e, list, "a"), 1);
    assert_eq!(read_u32(&e, list, "b"), 2);

    // Classes only report their own properties.
    assert!(!e.exist(derived, "a").unwrap());
    assert!(e.exist(base, "a").unwrap());
}

#[test]
fn test_derived_class_shadows_parent() {
    let mut e = engine();
    let root = e.root();
    let base = e.create_class(root, "base", 8, ClassHooks::none()).unwrap();
    e.register(base, "x", 4, Some(&u32_bytes(1)), PropertyCallbacks::none()).unwrap();
    let derived = e.create_class(base, "derived", 8, ClassHooks::none()).unwrap();
    // `base` now has a dependent, so it is copied before the next register.
    e.register(derived, "x", 4, Some(&u32_bytes(9)), PropertyCallbacks::none()).unwrap();

    let list = e.create_list(derived).unwrap();
    assert_eq!(e.get_nprops(list).unwrap(), 1);
    assert_eq!(read_u32(&e, list, "x"), 9);
}

#[test]
fn test_register_after_instantiation_copies_class() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    e.register(class, "a", 4, Some(&u32_bytes(1)), PropertyCallbacks::none()).unwrap();
    let old_list = e.create_list(class).unwrap();
    let records = e.record_count();

    e.register(class, "b", 4, Some(&u32_bytes(2)), PropertyCallbacks::none()).unwrap();
    assert_eq!(e.record_count(), records + 1);

    assert_eq!(e.get_nprops(old_list).unwrap(), 1);
    assert!(!e.exist(old_list, "b").unwrap());
    let new_list = e.create_list(class).unwrap();
    assert_eq!(e.get_nprops(new_list).unwrap(), 2);
    assert!(e.exist(class, "b").unwrap());

    // The old record goes away with its last list.
    e.close_list(old_list).unwrap();
    assert_eq!(e.record_count(), records);
}

#[test]
fn test_register_duplicate_rejected() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    e.register(class, "a", 4, Some(&u32_bytes(1)), PropertyCallbacks::none()).unwrap();
    let err = e.register(class, "a", 4, Some(&u32_bytes(1)), PropertyCallbacks::none());
    assert!(matches!(err, Err(PropError::Exists(_))));
}

#[test]
fn test_set_callback_rewrites_value() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    let clamp = PropertyCallbacks::none().with_set(|_, _, value| {
        let v = u32::from_le_bytes(value[..4].try_into().unwrap());
        value.copy_from_slice(&v.min(100).to_le_bytes());
        Ok(())
    });
    e.register(class, "level", 4, Some(&u32_bytes(0)), clamp).unwrap();

    let list = e.create_list(class).unwrap();
    e.set(list, "level", &u32_bytes(500)).unwrap();
    assert_eq!(read_u32(&e, list, "level"), 100);
}

#[test]
fn test_failed_set_keeps_old_value() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    let reject = PropertyCallbacks::none().with_set(|_, _, value| {
        if value[0] == 0xff { Err(PropError::Other("rejected")) } else { Ok(()) }
    });
    e.register(class, "v", 4, Some(&u32_bytes(7)), reject).unwrap();

    let list = e.create_list(class).unwrap();
    let err = e.set(list, "v", &[0xff; 4]).unwrap_err();
    assert!(matches!(err, PropError::Callback { op: "set", .. }));
    assert_eq!(read_u32(&e, list, "v"), 7);
}

#[test]
fn test_get_callback_sees_copy_only() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    let bump = PropertyCallbacks::none().with_get(|_, _, value| {
        value[0] = value[0].wrapping_add(1);
        Ok(())
    });
    e.register(class, "v", 1, Some(&[5]), bump).unwrap();
    let list = e.create_list(class).unwrap();
    assert_eq!(e.get_value(list, "v").unwrap(), vec![6]);
    assert_eq!(e.get_value(list, "v").unwrap(), vec![6]);
}

#[test]
fn test_size_checks() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    e.register(class, "flag", 0, None, PropertyCallbacks::none()).unwrap();
    e.register(class, "v", 4, Some(&u32_bytes(0)), PropertyCallbacks::none()).unwrap();
    let list = e.create_list(class).unwrap();

    assert!(matches!(e.set(list, "flag", &[]), Err(PropError::ZeroSized(_))));
    assert!(matches!(e.get(list, "flag", &mut []), Err(PropError::ZeroSized(_))));
    assert!(matches!(e.set(list, "v", &[1, 2]), Err(PropError::SizeMismatch { .. })));
    assert!(matches!(e.set(list, "missing", &[1]), Err(PropError::NotFound(_))));
    assert_eq!(e.get_size(list, "flag").unwrap(), 0);
}

#[test]
fn test_create_callback_failure_creates_nothing() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    let fail = PropertyCallbacks::none().with_create(|_, _| Err(PropError::Other("nope")));
    e.register(class, "v", 1, Some(&[0]), fail).unwrap();

    let lists = e.list_count();
    assert!(e.create_list(class).is_err());
    assert_eq!(e.list_count(), lists);

    // No list depends on the class, so registering does not copy it.
    let records = e.record_count();
    e.register(class, "w", 1, Some(&[0]), PropertyCallbacks::none()).unwrap();
    assert_eq!(e.record_count(), records);
}

#[test]
fn test_class_create_hook_failure_releases_list() {
    let mut e = engine();
    let root = e.root();
    let hooks = ClassHooks::none().on_create(|_, _| Err(PropError::Other("refused")));
    let class = e.create_class(root, "c", 8, hooks).unwrap();
    let lists = e.list_count();
    let err = e.create_list(class).unwrap_err();
    assert!(matches!(err, PropError::Callback { op: "class create", .. }));
    assert_eq!(e.list_count(), lists);
}

#[test]
fn test_zero_sized_property_runs_callbacks() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    let created = Rc::new(Cell::new(0u32));
    let closed = Rc::new(Cell::new(0u32));
    let (c, d) = (created.clone(), closed.clone());
    let callbacks = PropertyCallbacks::none()
        .with_create(move |_, value| {
            assert!(value.is_empty());
            c.set(c.get() + 1);
            Ok(())
        })
        .with_close(move |_, _| {
            d.set(d.get() + 1);
            Ok(())
        });
    e.register(class, "marker", 0, None, callbacks).unwrap();

    let list = e.create_list(class).unwrap();
    assert_eq!(created.get(), 1);
    assert!(matches!(e.set(list, "marker", &[]), Err(PropError::ZeroSized(_))));
    assert!(matches!(e.get(list, "marker", &mut []), Err(PropError::ZeroSized(_))));

    e.close_list(list).unwrap();
    assert_eq!((created.get(), closed.get()), (1, 1));
}

#[test]
fn test_class_create_hook_failure_closes_properties() {
    let mut e = engine();
    let root = e.root();
    let hooks = ClassHooks::none().on_create(|_, _| Err(PropError::Other("refused")));
    let class = e.create_class(root, "c", 8, hooks).unwrap();
    let closed = Rc::new(RefCell::new(Vec::new()));
    for name in ["a", "b"] {
        let log = closed.clone();
        let callbacks = PropertyCallbacks::none()
            .with_create(|_, _| Ok(()))
            .with_close(move |prop, _| {
                log.borrow_mut().push(prop.to_string());
                Ok(())
            });
        e.register(class, name, 1, Some(&[0]), callbacks).unwrap();
    }
    // A failing close callback does not stop the others.
    let refuse = PropertyCallbacks::none().with_close(|_, _| Err(PropError::Other("busy")));
    e.register(class, "c", 1, Some(&[0]), refuse).unwrap();

    assert!(matches!(
        e.create_list(class),
        Err(PropError::Callback { op: "class create", .. })
    ));
    assert_eq!(*closed.borrow(), ["a", "b"]);
}

#[test]
fn test_class_hooks_receive_data() {
    let mut e = engine();
    let root = e.root();
    let seen = Rc::new(Cell::new(0u32));
    let created = seen.clone();
    let closed = seen.clone();
    let hooks = ClassHooks {
        create_data: Some(Rc::new(10u32)),
        close_data: Some(Rc::new(100u32)),
        ..ClassHooks::none()
    }
    .on_create(move |_, data| {
        let n = data.and_then(|d| d.downcast_ref::<u32>()).copied().unwrap_or(0);
        created.set(created.get() + n);
        Ok(())
    })
    .on_close(move |_, data| {
        let n = data.and_then(|d| d.downcast_ref::<u32>()).copied().unwrap_or(0);
        closed.set(closed.get() + n);
        Ok(())
    });
    let class = e.create_class(root, "c", 8, hooks).unwrap();

    let list = e.create_list(class).unwrap();
    let copy = e.copy(list).unwrap();
    assert_eq!(seen.get(), 20);
    e.close_list(list).unwrap();
    e.close_list(copy).unwrap();
    assert_eq!(seen.get(), 220);
}

#[test]
fn test_close_runs_every_close_callback() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ["a", "b", "c"] {
        let log = log.clone();
        let cb = PropertyCallbacks::none().with_close(move |n, _| {
            log.borrow_mut().push(n.to_string());
            if n == "a" { Err(PropError::Other("close failed")) } else { Ok(()) }
        });
        e.register(class, name, 1, Some(&[0]), cb).unwrap();
    }
    let list = e.create_list(class).unwrap();
    let err = e.close_list(list).unwrap_err();
    assert!(matches!(err, PropError::Callback { op: "close", .. }));
    assert_eq!(*log.borrow(), ["a", "b", "c"]);
    assert!(e.get_nprops(list).is_err());
}

#[test]
fn test_close_with_extra_reference() {
    let mut e = engine();
    let list = e.create_standard(TemplateKind::Mount).unwrap();
    e.inc_ref(list).unwrap();
    e.close_list(list).unwrap();
    assert!(e.mount_props(list).is_ok());
    e.close_list(list).unwrap();
    assert!(e.mount_props(list).is_err());
}

#[test]
fn test_insert_and_remove() {
    let mut e = engine();
    let list = e.create_standard(TemplateKind::DatasetTransfer).unwrap();
    let closed = Rc::new(Cell::new(false));
    let flag = closed.clone();
    let cb = PropertyCallbacks::none().with_close(move |_, _| {
        flag.set(true);
        Ok(())
    });
    e.insert(list, "extra", 2, Some(&[1, 2]), cb).unwrap();
    assert_eq!(e.get_value(list, "extra").unwrap(), vec![1, 2]);
    assert!(e.insert(list, "extra", 2, Some(&[1, 2]), PropertyCallbacks::none()).is_err());

    let with_create = PropertyCallbacks::none().with_create(|_, _| Ok(()));
    assert!(e.insert(list, "other", 1, Some(&[0]), with_create).is_err());

    e.remove(list, "extra").unwrap();
    assert!(closed.get());
    assert!(!e.exist(list, "extra").unwrap());
    assert!(matches!(e.remove(list, "extra"), Err(PropError::NotFound(_))));
}

#[test]
fn test_unregister_keeps_list_copies() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    e.register(class, "a", 1, Some(&[3]), PropertyCallbacks::none()).unwrap();
    let list = e.create_list(class).unwrap();
    e.unregister(class, "a").unwrap();
    assert!(!e.exist(class, "a").unwrap());
    assert_eq!(e.get_value(list, "a").unwrap(), vec![3]);
}

#[test]
fn test_iterate_stops_and_resumes() {
    let mut e = engine();
    let root = e.root();
    let class = e.create_class(root, "c", 8, ClassHooks::none()).unwrap();
    for name in ["a", "b", "c", "d"] {
        e.register(class, name, 1, Some(&[0]), PropertyCallbacks::none()).unwrap();
    }
    let list = e.create_list(class).unwrap();

    let mut visited = Vec::new();
    let out = e
        .iterate(list, 0, |_, name| {
            visited.push(name.to_string());
            if name == "b" { 7 } else { 0 }
        })
        .unwrap();
    assert_eq!(out, IterOutcome { value: 7, index: 1 });
    assert_eq!(visited, ["a", "b"]);

    let out = e.iterate(list, out.index + 1, |_, _| 0).unwrap();
    assert_eq!(out, IterOutcome { value: 0, index: 4 });

    let err = e.iterate(class, 0, |_, name| if name == "c" { -1 } else { 0 });
    assert_eq!(err, Err(PropError::IterationFailed { value: -1, index: 2 }));
}

#[test]
fn test_compare_lists() {
    let mut e = engine();
    let a = e.create_standard(TemplateKind::FileCreate).unwrap();
    let b = e.create_standard(TemplateKind::FileCreate).unwrap();
    assert!(e.equal(a, b).unwrap());

    e.props_mut::<FileCreateProps>(b).unwrap().set_userblock(512).unwrap();
    assert_eq!(e.compare(a, b).unwrap(), Ordering::Less);
    assert_eq!(e.compare(b, a).unwrap(), Ordering::Greater);

    let copy = e.copy(b).unwrap();
    assert!(e.equal(b, copy).unwrap());

    e.insert(copy, "x", 1, Some(&[0]), PropertyCallbacks::none()).unwrap();
    assert_eq!(e.compare(b, copy).unwrap(), Ordering::Less);

    let class = e.standard().file_create;
    assert!(e.compare(a, class).is_err());
}

#[test]
fn test_compare_classes() {
    let mut e = engine();
    let root = e.root();
    let a = e.create_class(root, "a", 8, ClassHooks::none()).unwrap();
    let b = e.create_class(root, "b", 8, ClassHooks::none()).unwrap();
    assert_eq!(e.compare(a, b).unwrap(), Ordering::Less);
    let a2 = e.copy(a).unwrap();
    assert!(e.equal(a, a2).unwrap());
}

#[test]
fn test_typed_templates() {
    let mut e = engine();
    let mut fapl = FileAccessProps::default();
    fapl.set_core(4096, false);
    fapl.set_alignment(1024, 512).unwrap();
    let id = e.create_with(fapl.clone()).unwrap();
    assert_eq!(e.file_access(id).unwrap(), &fapl);
    assert!(e.file_create(id).is_err());

    let dcpl = e.create_standard(TemplateKind::DatasetCreate).unwrap();
    e.props_mut::<DatasetCreateProps>(dcpl).unwrap().set_chunk(&[16, 16]).unwrap();
    assert_eq!(e.dataset_create(dcpl).unwrap().layout(), Layout::Chunked);
}

#[test]
fn test_class_lifecycle_frees_orphans() {
    let mut e = engine();
    let base_records = e.record_count();
    let root = e.root();
    let parent = e.create_class(root, "parent", 8, ClassHooks::none()).unwrap();
    let child = e.create_class(parent, "child", 8, ClassHooks::none()).unwrap();
    let list = e.create_list(child).unwrap();

    e.close_class(parent).unwrap();
    e.close_class(child).unwrap();
    assert_eq!(e.record_count(), base_records + 2);

    e.close_list(list).unwrap();
    assert_eq!(e.record_count(), base_records);
    assert_eq!(e.class_count(), 6);
}
