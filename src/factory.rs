//! Object factory: allocation, change tracking and composition.
//!
//! One factory owns the numbering space of one document session. Objects
//! created through it (or materialized lazily from a loaded file) carry a
//! weak back-reference to it; mutation flows through [`IndirectObject`]
//! handles, which mark the owning factory's modified set directly.
//!
//! Factories compose: attaching a child factory (for importing an object
//! graph from another document) places the child's numbers after the
//! parent's in one shared numbering space. The enumeration shift for any
//! factory in the attachment tree is the number of slots allocated by every
//! factory that precedes it in depth-first order.

use crate::error::{Error, Result};
use crate::object::{Dict, ObjectRef, Value};
use crate::parser::{self, Resolve};
use crate::writer;
use crate::xref::Context;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

// Factory identity survives across documents in one process; shifts and
// ownership checks key on it.
static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

/// One entry of [`ObjectFactory::list_modified_objects`]: everything the
/// writer needs to emit the object into an update segment.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    /// Object number in the saving factory's combined numbering space
    pub num: u32,
    /// Generation number (already bumped for tombstones)
    pub gen: u16,
    /// Whether this record frees the object instead of rewriting it
    pub is_free: bool,
    /// Serialized `N G obj ... endobj` body; `None` for free records
    pub body: Option<Vec<u8>>,
}

struct FactoryInner {
    id: u64,
    /// Next object number to assign; allocated slots = this - 1
    next_obj_num: u32,
    modified: BTreeMap<u32, IndirectObject>,
    removed: BTreeSet<u32>,
    attached: Vec<ObjectFactory>,
    shift_cache: HashMap<u64, Option<u64>>,
    registry: HashMap<ObjectRef, IndirectObject>,
    context: Option<Context>,
}

/// Handle to a factory. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ObjectFactory {
    inner: Rc<RefCell<FactoryInner>>,
}

struct IndirectInner {
    num: u32,
    gen: u16,
    value: Value,
    factory: Weak<RefCell<FactoryInner>>,
    factory_id: u64,
}

/// Handle to an indirect object owned by a factory.
///
/// Clones share identity; mutation through [`modify`](Self::modify) or
/// [`touch`](Self::touch) marks the object in its factory's modified set.
#[derive(Clone)]
pub struct IndirectObject {
    inner: Rc<RefCell<IndirectInner>>,
}

impl IndirectObject {
    fn new(num: u32, gen: u16, value: Value, factory: &ObjectFactory) -> Self {
        Self {
            inner: Rc::new(RefCell::new(IndirectInner {
                num,
                gen,
                value,
                factory: Rc::downgrade(&factory.inner),
                factory_id: factory.id(),
            })),
        }
    }

    /// This object's number and generation.
    pub fn reference(&self) -> ObjectRef {
        let inner = self.inner.borrow();
        ObjectRef::new(inner.num, inner.gen)
    }

    /// Object number.
    pub fn num(&self) -> u32 {
        self.inner.borrow().num
    }

    /// Generation number.
    pub fn gen(&self) -> u16 {
        self.inner.borrow().gen
    }

    /// Identity of the owning factory.
    pub fn factory_id(&self) -> u64 {
        self.inner.borrow().factory_id
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Value {
        self.inner.borrow().value.clone()
    }

    /// Whether two handles refer to the same object.
    pub fn same_object(&self, other: &IndirectObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Mutate the value in place and mark the object modified.
    pub fn modify(&self, f: impl FnOnce(&mut Value)) -> Result<()> {
        f(&mut self.inner.borrow_mut().value);
        self.touch()
    }

    /// Replace the value wholesale and mark the object modified.
    pub fn set_value(&self, value: Value) -> Result<()> {
        self.inner.borrow_mut().value = value;
        self.touch()
    }

    /// Mark the object modified without changing it.
    pub fn touch(&self) -> Result<()> {
        let factory = self.owning_factory()?;
        factory.mark_as_modified(self)
    }

    fn owning_factory(&self) -> Result<ObjectFactory> {
        let weak = self.inner.borrow().factory.clone();
        weak.upgrade()
            .map(|inner| ObjectFactory { inner })
            .ok_or_else(|| Error::Logic("object outlived its factory".to_string()))
    }
}

impl std::fmt::Debug for IndirectObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("IndirectObject")
            .field("num", &inner.num)
            .field("gen", &inner.gen)
            .field("value", &inner.value.type_name())
            .finish()
    }
}

impl ObjectFactory {
    /// Create a factory whose first assigned object number is
    /// `starting_object_count` (at least 1; slot 0 is the free-list head).
    pub fn create_factory(starting_object_count: u32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FactoryInner {
                id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
                next_obj_num: starting_object_count.max(1),
                modified: BTreeMap::new(),
                removed: BTreeSet::new(),
                attached: Vec::new(),
                shift_cache: HashMap::new(),
                registry: HashMap::new(),
                context: None,
            })),
        }
    }

    /// Unique identity of this factory.
    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    /// The next object number this factory would assign. One more than the
    /// number of slots it occupies in the numbering space.
    pub fn object_count(&self) -> u32 {
        self.inner.borrow().next_obj_num
    }

    pub(crate) fn set_object_count(&self, count: u32) {
        self.inner.borrow_mut().next_obj_num = count.max(1);
    }

    pub(crate) fn install_context(&self, ctx: Context) {
        self.inner.borrow_mut().context = Some(ctx);
    }

    pub(crate) fn context(&self) -> Option<Context> {
        self.inner.borrow().context.clone()
    }

    /// Create a new object holding `value`, born modified.
    pub fn new_object(&self, value: Value) -> IndirectObject {
        let num = {
            let mut inner = self.inner.borrow_mut();
            let num = inner.next_obj_num;
            inner.next_obj_num += 1;
            num
        };
        let obj = IndirectObject::new(num, 0, value, self);
        self.inner.borrow_mut().modified.insert(num, obj.clone());
        obj
    }

    /// Create a new stream object wrapping raw (already encoded) bytes.
    pub fn new_stream_object(&self, data: impl Into<bytes::Bytes>) -> IndirectObject {
        let data = data.into();
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Value::Integer(data.len() as i64));
        self.new_object(Value::Stream { dict, data })
    }

    /// Mark an object of this factory as modified. Idempotent.
    ///
    /// # Errors
    ///
    /// `Logic` if the object belongs to a different factory.
    pub fn mark_as_modified(&self, obj: &IndirectObject) -> Result<()> {
        self.check_ownership(obj)?;
        self.inner.borrow_mut().modified.insert(obj.num(), obj.clone());
        Ok(())
    }

    /// Mark an object of this factory as removed. Idempotent; the save
    /// emits a free-list tombstone with a bumped generation.
    pub fn remove(&self, obj: &IndirectObject) -> Result<()> {
        self.check_ownership(obj)?;
        let num = obj.num();
        let mut inner = self.inner.borrow_mut();
        inner.modified.insert(num, obj.clone());
        inner.removed.insert(num);
        Ok(())
    }

    fn check_ownership(&self, obj: &IndirectObject) -> Result<()> {
        if obj.factory_id() != self.id() {
            return Err(Error::Logic(format!(
                "object {} belongs to factory {}, not factory {}",
                obj.reference(),
                obj.factory_id(),
                self.id()
            )));
        }
        Ok(())
    }

    /// Whether this factory or any attached factory carries changes.
    pub fn is_modified(&self) -> bool {
        let attached = {
            let inner = self.inner.borrow();
            if !inner.modified.is_empty() {
                return true;
            }
            inner.attached.clone()
        };
        attached.iter().any(|f| f.is_modified())
    }

    /// Attach a child factory, appending its numbering space after this
    /// factory's (and after previously attached children). Attaching self
    /// or an already-attached factory is a no-op.
    pub fn attach(&self, factory: &ObjectFactory) {
        if factory.id() == self.id() {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.attached.iter().any(|f| f.id() == factory.id()) {
            return;
        }
        inner.attached.push(factory.clone());
        inner.shift_cache.clear();
    }

    /// Slots occupied by this factory and its whole attachment subtree.
    fn subtree_slots(&self) -> u64 {
        let (own, attached) = {
            let inner = self.inner.borrow();
            ((inner.next_obj_num - 1) as u64, inner.attached.clone())
        };
        own + attached.iter().map(|f| f.subtree_slots()).sum::<u64>()
    }

    /// Slots in the combined numbering space rooted at this factory,
    /// plus one for the free-list head. This is the `/Size` of a save.
    pub fn combined_size(&self) -> u64 {
        self.subtree_slots() + 1
    }

    /// Enumeration shift of `target` within this factory's attachment
    /// subtree, or `None` if the target is not attached (directly or
    /// transitively). Memoized until the next save or attach.
    pub fn calculate_shift(&self, target: &ObjectFactory) -> Option<u64> {
        self.calculate_shift_by_id(target.id())
    }

    fn calculate_shift_by_id(&self, target_id: u64) -> Option<u64> {
        if self.id() == target_id {
            return Some(0);
        }
        if let Some(cached) = self.inner.borrow().shift_cache.get(&target_id) {
            return *cached;
        }

        let (own, attached) = {
            let inner = self.inner.borrow();
            ((inner.next_obj_num - 1) as u64, inner.attached.clone())
        };

        let mut shift = own;
        let mut result = None;
        for child in &attached {
            if let Some(inner_shift) = child.calculate_shift_by_id(target_id) {
                result = Some(shift + inner_shift);
                break;
            }
            shift += child.subtree_slots();
        }

        self.inner.borrow_mut().shift_cache.insert(target_id, result);
        result
    }

    /// Enumeration shift of `target`, failing if it was never attached —
    /// which would mean serializing a reference into a numbering space the
    /// saving factory knows nothing about.
    pub fn get_enumeration_shift(&self, target: &ObjectFactory) -> Result<u64> {
        self.calculate_shift(target).ok_or_else(|| {
            Error::Logic(format!(
                "factory {} is not attached to the saving factory {}",
                target.id(),
                self.id()
            ))
        })
    }

    /// Drop memoized shifts, recursively. Required after every save:
    /// appended segments change the numbering space of future saves.
    pub fn clean_enumeration_shift_cache(&self) {
        let attached = {
            let mut inner = self.inner.borrow_mut();
            inner.shift_cache.clear();
            inner.attached.clone()
        };
        for child in &attached {
            child.clean_enumeration_shift_cache();
        }
    }

    /// Enumerate every modified object of this factory and its attachment
    /// subtree as update records in ascending shifted-number order.
    ///
    /// Removed objects yield free records with their generation bumped and
    /// no payload; everything else yields a serialized object body with
    /// nested references renumbered into this factory's combined space.
    pub fn list_modified_objects(&self) -> Result<Vec<UpdateRecord>> {
        let mut records = BTreeMap::new();
        self.collect_update_records(self, &mut records)?;
        Ok(records.into_values().collect())
    }

    fn collect_update_records(
        &self,
        root: &ObjectFactory,
        out: &mut BTreeMap<u32, UpdateRecord>,
    ) -> Result<()> {
        let shift = root.get_enumeration_shift(self)? as u32;

        let (modified, removed, attached) = {
            let inner = self.inner.borrow();
            (
                inner.modified.clone(),
                inner.removed.clone(),
                inner.attached.clone(),
            )
        };

        for (num, obj) in modified {
            let shifted = num + shift;
            let record = if removed.contains(&num) {
                UpdateRecord { num: shifted, gen: obj.gen() + 1, is_free: true, body: None }
            } else {
                let body =
                    writer::serialize_indirect(shifted, obj.gen(), &obj.value(), self, root)?;
                UpdateRecord { num: shifted, gen: obj.gen(), is_free: false, body: Some(body) }
            };
            out.insert(shifted, record);
        }

        for child in &attached {
            child.collect_update_records(root, out)?;
        }

        Ok(())
    }

    /// Fetch the handle for an object: the modified set first, then the
    /// loaded-object registry, then a lazy parse at the cross-reference
    /// offset (cached for the rest of the session).
    pub fn fetch(&self, r: ObjectRef) -> Result<IndirectObject> {
        {
            let inner = self.inner.borrow();
            if let Some(obj) = inner.modified.get(&r.num) {
                if obj.gen() != r.gen {
                    return Err(Error::Malformed(format!(
                        "object {} requested, live object has generation {}",
                        r,
                        obj.gen()
                    )));
                }
                return Ok(obj.clone());
            }
            if let Some(obj) = inner.registry.get(&r) {
                return Ok(obj.clone());
            }
        }

        let ctx = self.context().ok_or_else(|| {
            Error::Malformed(format!("reference {} has no loaded document to resolve in", r))
        })?;

        let offset = ctx.table.get_offset(r)?;
        let (parsed_ref, value) = parser::read_indirect_at(&ctx.buf, offset as usize, self)?;
        if parsed_ref != r {
            return Err(Error::corrupted(
                offset as usize,
                format!("cross-reference table points {} at object {}", r, parsed_ref),
            ));
        }

        let obj = IndirectObject::new(r.num, r.gen, value, self);
        self.inner.borrow_mut().registry.insert(r, obj.clone());
        Ok(obj)
    }

    /// Resolve a reference to a value snapshot.
    pub fn resolve(&self, r: ObjectRef) -> Result<Value> {
        Ok(self.fetch(r)?.value())
    }

    /// Deep-copy an object graph from another factory into this one.
    ///
    /// The copy is memoized by source identity: a node referenced from
    /// several places is cloned once and shared, and reference cycles
    /// terminate instead of recursing forever. Nested references are
    /// rewritten into this factory's local numbering.
    pub fn make_clone(&self, obj: &IndirectObject) -> Result<IndirectObject> {
        let source = obj.owning_factory()?;
        let mut processed = HashMap::new();
        let r = self.clone_indirect(&source, obj.reference(), &mut processed)?;
        self.fetch(r)
    }

    fn clone_indirect(
        &self,
        source: &ObjectFactory,
        src_ref: ObjectRef,
        processed: &mut HashMap<(u64, u32), ObjectRef>,
    ) -> Result<ObjectRef> {
        let key = (source.id(), src_ref.num);
        if let Some(&mapped) = processed.get(&key) {
            return Ok(mapped);
        }

        // Allocate the target slot before descending so cycles resolve to it
        let target = self.new_object(Value::Null);
        let target_ref = target.reference();
        processed.insert(key, target_ref);

        let value = source.resolve(src_ref)?;
        let cloned = self.clone_value(&value, source, processed)?;
        target.set_value(cloned)?;

        Ok(target_ref)
    }

    fn clone_value(
        &self,
        value: &Value,
        source: &ObjectFactory,
        processed: &mut HashMap<(u64, u32), ObjectRef>,
    ) -> Result<Value> {
        match value {
            Value::Reference(r) => {
                Ok(Value::Reference(self.clone_indirect(source, *r, processed)?))
            },
            Value::Array(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(self.clone_value(item, source, processed)?);
                }
                Ok(Value::Array(cloned))
            },
            Value::Dictionary(dict) => {
                let mut cloned = Dict::new();
                for (key, item) in dict {
                    cloned.insert(key.clone(), self.clone_value(item, source, processed)?);
                }
                Ok(Value::Dictionary(cloned))
            },
            Value::Stream { dict, data } => {
                let mut cloned = Dict::new();
                for (key, item) in dict {
                    cloned.insert(key.clone(), self.clone_value(item, source, processed)?);
                }
                Ok(Value::Stream { dict: cloned, data: data.clone() })
            },
            other => Ok(other.clone()),
        }
    }

    /// Tear down the session: drop the modified set, loaded-object
    /// registry, attachments, caches and the load context.
    ///
    /// Object back-references are weak, so this is not needed for memory
    /// safety; it releases the source buffer and marks the session over.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.modified.clear();
        inner.removed.clear();
        inner.attached.clear();
        inner.shift_cache.clear();
        inner.registry.clear();
        inner.context = None;
    }
}

impl Resolve for ObjectFactory {
    fn resolve_ref(&self, r: ObjectRef) -> Result<Value> {
        self.resolve(r)
    }
}

impl std::fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObjectFactory")
            .field("id", &inner.id)
            .field("next_obj_num", &inner.next_obj_num)
            .field("modified", &inner.modified.len())
            .field("attached", &inner.attached.len())
            .finish()
    }
}
