//! Interning and lightweight id primitives shared across the effect-analysis crates.

mod interner;
#[cfg(test)]
mod interner_tests;

pub use interner::{Interner, Symbol};

/// Declares a `Copy` newtype id backed by `u32`, with `from_raw`/`as_u32`/`index`.
///
/// Every analysis id in this workspace (expression, scope, definition) is one
/// of these: a stable handle into a side table, never a pointer into the tree.
#[macro_export]
macro_rules! new_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        $vis struct $name(u32);

        impl $name {
            #[inline]
            $vis fn from_raw(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            $vis fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            $vis fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}
