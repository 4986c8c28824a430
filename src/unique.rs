//! Type variables and the per-unit supply that creates them.
//!
//! # Uniqueness
//! A [`TyVar`] is unique with respect to the [`VarSupply`] that produced it:
//! two variables drawn from the same supply are equal if and only if one is a
//! copy of the other. Variables from different supplies must never meet, so
//! every compilation unit owns exactly one supply and threads it explicitly
//! through lowering and inference.
//!
//! # Names
//! Variables render in base 26 over the lowercase alphabet, where `a` is the
//! zero digit: `a`, `b`, ..., `z`, `ba`, `bb`, ... This matches the order in
//! which they are created, which keeps diagnostics stable between runs.
//!
//! # Exhaustion
//! Indices are `u64` and issued sequentially, so a supply could only repeat
//! a variable after `2^64` calls to [`VarSupply::fresh`]. Even at one call
//! per nanosecond that takes over 500 years for a single unit.

/// A monomorphic type variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TyVar(u64);

impl TyVar {
    /// Directly creates the variable with the given index.
    ///
    /// Only scheme rendering and tests should need this; inference draws
    /// variables from a [`VarSupply`].
    pub const fn from_index(index: u64) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u64 {
        self.0
    }
}

impl From<TyVar> for u64 {
    fn from(value: TyVar) -> Self {
        value.0
    }
}

impl std::fmt::Debug for TyVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{self}")
    }
}

impl std::fmt::Display for TyVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&base26(self.0))
    }
}

/// Renders `n` with `a` as the zero digit.
fn base26(mut n: u64) -> String {
    let mut digits = Vec::new();

    loop {
        digits.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;

        if n == 0 {
            break;
        }
    }

    digits.iter().rev().collect()
}

/// A generator of fresh [`TyVar`] values.
#[derive(Debug, Clone, Default)]
pub struct VarSupply {
    next: u64,
}

impl VarSupply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a variable that no earlier call on `self` returned.
    pub fn fresh(&mut self) -> TyVar {
        let var = TyVar(self.next);
        self.next += 1;
        var
    }

    /// The number of variables produced so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}
