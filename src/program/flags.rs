//! Access flags and visibility.

use bitflags::bitflags;

bitflags! {
    /// Class access flags, using the class-file encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassFlags: u32 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared final.
        const FINAL = 0x0010;
        /// Is an interface.
        const INTERFACE = 0x0200;
        /// Declared abstract.
        const ABSTRACT = 0x0400;
        /// Generated by a compiler.
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Method access flags, using the class-file encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u32 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared private.
        const PRIVATE = 0x0002;
        /// Declared protected.
        const PROTECTED = 0x0004;
        /// Declared static.
        const STATIC = 0x0008;
        /// Declared final.
        const FINAL = 0x0010;
        /// Declared synchronized.
        const SYNCHRONIZED = 0x0020;
        /// Compiler generated bridge forwarding to another method.
        const BRIDGE = 0x0040;
        /// Implemented natively.
        const NATIVE = 0x0100;
        /// Declared abstract.
        const ABSTRACT = 0x0400;
        /// Generated by a compiler.
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Field access flags, using the class-file encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u32 {
        /// Declared public.
        const PUBLIC = 0x0001;
        /// Declared private.
        const PRIVATE = 0x0002;
        /// Declared protected.
        const PROTECTED = 0x0004;
        /// Declared static.
        const STATIC = 0x0008;
        /// Declared final.
        const FINAL = 0x0010;
        /// Declared volatile.
        const VOLATILE = 0x0040;
        /// Declared transient.
        const TRANSIENT = 0x0080;
        /// Generated by a compiler.
        const SYNTHETIC = 0x1000;
    }
}

/// Member visibility, ordered from least to most visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter)]
pub enum Visibility {
    /// Only the declaring class.
    Private,
    /// The declaring package.
    PackagePrivate,
    /// The declaring package and subclasses.
    Protected,
    /// Everyone.
    Public,
}

impl Visibility {
    fn from_bits(public: bool, protected: bool, private: bool) -> Self {
        if public {
            Visibility::Public
        } else if protected {
            Visibility::Protected
        } else if private {
            Visibility::Private
        } else {
            Visibility::PackagePrivate
        }
    }
}

impl MethodFlags {
    /// Visibility encoded in these flags.
    #[must_use]
    pub fn visibility(self) -> Visibility {
        Visibility::from_bits(
            self.contains(Self::PUBLIC),
            self.contains(Self::PROTECTED),
            self.contains(Self::PRIVATE),
        )
    }
}

impl FieldFlags {
    /// Visibility encoded in these flags.
    #[must_use]
    pub fn visibility(self) -> Visibility {
        Visibility::from_bits(
            self.contains(Self::PUBLIC),
            self.contains(Self::PROTECTED),
            self.contains(Self::PRIVATE),
        )
    }
}

/// Where a class comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Part of the program being optimized.
    Program,
    /// Available for compilation only, never rewritten.
    Classpath,
    /// Provided by the runtime.
    Library,
}
