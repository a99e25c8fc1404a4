//! Heap-allocated runtime values: objects, arrays and delegates.

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{metadata::token::Token, value::Value, Error, Result};

/// Reference to a heap object
pub type ObjectRef = Arc<Object>;
/// Reference to a heap array
pub type ArrayRef = Arc<Array>;

/// An instance of a registered class or (boxed) value type.
///
/// Field storage is a flat slot vector laid out by the type registry: base type fields come
/// first, then the fields the type declares itself. Slots are addressed by
/// [`crate::metadata::members::FieldDef::slot`].
#[derive(Debug)]
pub struct Object {
    type_token: Token,
    fields: RwLock<Vec<Value>>,
}

impl Object {
    /// Allocates a new object of `type_token` with the given initial slot values
    #[must_use]
    pub fn new(type_token: Token, fields: Vec<Value>) -> ObjectRef {
        Arc::new(Object {
            type_token,
            fields: RwLock::new(fields),
        })
    }

    /// The runtime type of this object
    #[must_use]
    pub fn type_token(&self) -> Token {
        self.type_token
    }

    /// Number of field slots
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the field storage is poisoned.
    pub fn slot_count(&self) -> Result<usize> {
        Ok(read_lock!(self.fields)?.len())
    }

    /// Reads the value in `slot`
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] for a slot beyond the object's layout, or
    /// [`Error::LockError`] if the field storage is poisoned.
    pub fn load(&self, slot: usize) -> Result<Value> {
        let fields = read_lock!(self.fields)?;
        fields.get(slot).cloned().ok_or(Error::IndexOutOfRange {
            index: slot,
            len: fields.len(),
        })
    }

    /// Writes `value` into `slot`
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] for a slot beyond the object's layout, or
    /// [`Error::LockError`] if the field storage is poisoned.
    pub fn store(&self, slot: usize, value: Value) -> Result<()> {
        let mut fields = write_lock!(self.fields)?;
        let len = fields.len();
        match fields.get_mut(slot) {
            Some(target) => {
                *target = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index: slot, len }),
        }
    }

    /// Copies all slots into a new object of the same type.
    ///
    /// This is how value types keep value semantics: boxing, unboxing and storing a value
    /// type copies it instead of sharing the underlying allocation.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the field storage is poisoned.
    pub fn shallow_copy(&self) -> Result<ObjectRef> {
        let fields = read_lock!(self.fields)?;
        Ok(Object::new(self.type_token, fields.clone()))
    }

    /// A snapshot of every slot
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the field storage is poisoned.
    pub fn snapshot(&self) -> Result<Vec<Value>> {
        Ok(read_lock!(self.fields)?.clone())
    }
}

/// A single-dimensional, zero-based array.
#[derive(Debug)]
pub struct Array {
    type_token: Token,
    element_type: Token,
    items: RwLock<Vec<Value>>,
}

impl Array {
    /// Creates a new array; `type_token` is the constructed array type of `element_type`
    #[must_use]
    pub fn new(type_token: Token, element_type: Token, items: Vec<Value>) -> ArrayRef {
        Arc::new(Array {
            type_token,
            element_type,
            items: RwLock::new(items),
        })
    }

    /// The constructed array type
    #[must_use]
    pub fn type_token(&self) -> Token {
        self.type_token
    }

    /// The element type
    #[must_use]
    pub fn element_type(&self) -> Token {
        self.element_type
    }

    /// Number of elements
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the storage is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(read_lock!(self.items)?.len())
    }

    /// Returns true if the array has no elements
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the storage is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(read_lock!(self.items)?.is_empty())
    }

    /// Reads the element at `index`
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] or [`Error::LockError`].
    pub fn get(&self, index: usize) -> Result<Value> {
        let items = read_lock!(self.items)?;
        items.get(index).cloned().ok_or(Error::IndexOutOfRange {
            index,
            len: items.len(),
        })
    }

    /// Writes the element at `index`
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] or [`Error::LockError`].
    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        let mut items = write_lock!(self.items)?;
        let len = items.len();
        match items.get_mut(index) {
            Some(target) => {
                *target = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index, len }),
        }
    }

    /// A snapshot of every element
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the storage is poisoned.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        Ok(read_lock!(self.items)?.clone())
    }
}

/// The native function a delegate target runs
pub type Callable = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// An immutable, possibly multicast, delegate value.
///
/// Combining and removing targets returns new delegates; the invocation list of an existing
/// delegate never changes.
#[derive(Clone)]
pub struct Delegate {
    handler_type: Token,
    targets: Arc<[Callable]>,
}

impl Delegate {
    /// Creates a single-target delegate of `handler_type`
    pub fn new<F>(handler_type: Token, target: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Delegate {
            handler_type,
            targets: Arc::from(vec![Arc::new(target) as Callable]),
        }
    }

    /// The delegate type
    #[must_use]
    pub fn handler_type(&self) -> Token {
        self.handler_type
    }

    /// Number of targets in the invocation list
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if the invocation list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Returns a delegate whose invocation list is `self` followed by `other`
    #[must_use]
    pub fn combine(&self, other: &Delegate) -> Delegate {
        let targets: Vec<Callable> = self
            .targets
            .iter()
            .chain(other.targets.iter())
            .cloned()
            .collect();

        Delegate {
            handler_type: self.handler_type,
            targets: Arc::from(targets),
        }
    }

    /// Returns a delegate without the last occurrence of `other`'s invocation list, or `None`
    /// when nothing remains
    #[must_use]
    pub fn remove(&self, other: &Delegate) -> Option<Delegate> {
        let mut targets: Vec<Callable> = self.targets.to_vec();

        for needle in other.targets.iter().rev() {
            if let Some(position) = targets
                .iter()
                .rposition(|candidate| Arc::ptr_eq(candidate, needle))
            {
                targets.remove(position);
            }
        }

        if targets.is_empty() {
            None
        } else {
            Some(Delegate {
                handler_type: self.handler_type,
                targets: Arc::from(targets),
            })
        }
    }

    /// Invokes every target in order and returns the result of the last one.
    ///
    /// # Errors
    /// The first error raised by a target stops the invocation and is returned unchanged.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        let mut result = Value::Void;
        for target in self.targets.iter() {
            result = target(args)?;
        }
        Ok(result)
    }

    /// Identity comparison of the invocation lists
    #[must_use]
    pub fn ptr_eq(&self, other: &Delegate) -> bool {
        self.targets.len() == other.targets.len()
            && self
                .targets
                .iter()
                .zip(other.targets.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("handler_type", &self.handler_type)
            .field("targets", &self.targets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_object_load_store() {
        let object = Object::new(Token(0x02000001), vec![Value::I4(1), Value::Null]);
        assert_eq!(object.load(0).unwrap(), Value::I4(1));

        object.store(1, Value::from("text")).unwrap();
        assert_eq!(object.load(1).unwrap(), Value::from("text"));

        assert!(matches!(
            object.load(2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_shallow_copy_is_independent() {
        let object = Object::new(Token(0x02000001), vec![Value::I4(1)]);
        let copy = object.shallow_copy().unwrap();

        copy.store(0, Value::I4(2)).unwrap();
        assert_eq!(object.load(0).unwrap(), Value::I4(1));
        assert_eq!(copy.load(0).unwrap(), Value::I4(2));
        assert_eq!(copy.type_token(), object.type_token());
    }

    #[test]
    fn test_array_access() {
        let array = Array::new(Token(0x1B000001), Token(0xF0000008), vec![Value::I4(5)]);
        assert_eq!(array.len().unwrap(), 1);
        array.set(0, Value::I4(6)).unwrap();
        assert_eq!(array.get(0).unwrap(), Value::I4(6));
        assert!(array.get(3).is_err());
    }

    #[test]
    fn test_delegate_multicast() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first_calls = calls.clone();
        let first = Delegate::new(Token(0x02000009), move |_| {
            first_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::I4(1))
        });
        let second = Delegate::new(Token(0x02000009), |_| Ok(Value::I4(2)));

        let combined = first.combine(&second);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined.invoke(&[]).unwrap(), Value::I4(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let reduced = combined.remove(&second).unwrap();
        assert!(reduced.ptr_eq(&first));
        assert!(reduced.remove(&first).is_none());
    }
}
