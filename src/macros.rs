#![allow(unused_macros)]

/// Helper macro for reading locked items, mapping lock poisoning to [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let data = read_lock!(my_rwlock)?;
///  println!("{}", data.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for writing to locked items, mapping lock poisoning to [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut data = write_lock!(my_rwlock)?;
///  data.push(42);
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::LockError)
    };
}

/// Implements identity-based equality and hashing for a descriptor type.
///
/// Descriptors compare by [`crate::descriptor::MemberId`] only, never structurally, so two
/// descriptors for the same underlying member are interchangeable cache keys.
///
/// ```rust, ignore
///  impl_member_identity!(FieldDescriptor);
/// ```
macro_rules! impl_member_identity {
    ($descriptor:ty) => {
        impl PartialEq for $descriptor {
            fn eq(&self, other: &Self) -> bool {
                crate::descriptor::Member::identity(self)
                    == crate::descriptor::Member::identity(other)
            }
        }

        impl Eq for $descriptor {}

        impl std::hash::Hash for $descriptor {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(&crate::descriptor::Member::identity(self), state);
            }
        }
    };
}
