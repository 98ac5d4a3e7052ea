//! Term representation for Horn-clause programs.
//!
//! Terms are immutable values. A term is an atom (a symbolic or numeric
//! constant), a logic variable, or a compound of a functor applied to
//! argument terms. Only a [`Substitution`](crate::Substitution) changes what
//! a variable denotes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

/// Source of globally unique variable ids. Renamed clause variables always
/// mint ids above every variable already constructed, which keeps the
/// variable-to-variable binding direction in unification deterministic.
static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// A logic variable.
///
/// Equality and hashing use the numeric id only, never the display name:
/// two variables named `X` created by separate [`Var::fresh`] calls are
/// distinct, while clones of one variable are equal. This is what scopes a
/// variable to a single clause instantiation.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Var {
    id: u64,
    name: String,
}

impl Var {
    /// Mints a new variable with a globally unique id and the given display
    /// name.
    #[must_use]
    pub fn fresh(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    /// The display name. Purely cosmetic; identity lives in [`Var::id`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unique id. Higher ids were created later.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// A new variable with the same display name and a fresh id. Used when
    /// a stored clause is renamed for a unification attempt.
    pub(crate) fn renamed(&self) -> Self {
        Self::fresh(self.name.clone())
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Var {}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// Deserialization keeps the global id counter above every id read back in,
// so variables minted later never collide with a stored clause's variables.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Var {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Raw {
            id: u64,
            name: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        NEXT_VAR_ID.fetch_max(raw.id.saturating_add(1), Ordering::Relaxed);
        Ok(Self {
            id: raw.id,
            name: raw.name,
        })
    }
}

/// A constant value: a symbolic name or a numeric literal.
///
/// Equality is value equality. Numbers compare as `f64`, which is why
/// [`Atom`] (and therefore [`Term`]) implements `PartialEq` but not `Eq`;
/// nothing in the engine keys on terms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Atom {
    /// A symbolic constant such as `juan` or `acta_nacimiento`.
    Symbol(String),
    /// A numeric constant such as a fee amount.
    Number(f64),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(name) => f.write_str(name),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Self::Symbol(name.to_string())
    }
}

impl From<String> for Atom {
    fn from(name: String) -> Self {
        Self::Symbol(name)
    }
}

impl From<f64> for Atom {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A term: an atom, a variable, or a functor applied to argument terms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Term {
    /// A constant.
    Atom(Atom),
    /// A logic variable.
    Var(Var),
    /// A functor name with an ordered argument list; arity is the list
    /// length.
    Compound(String, Vec<Term>),
}

impl Term {
    /// A symbolic constant term.
    #[must_use]
    pub fn atom(name: impl Into<String>) -> Self {
        Self::Atom(Atom::Symbol(name.into()))
    }

    /// A numeric constant term.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Atom(Atom::Number(value))
    }

    /// A variable term referring to an existing variable. Does not mint a
    /// new id; use [`Var::fresh`] for that.
    #[must_use]
    pub fn var(var: &Var) -> Self {
        Self::Var(var.clone())
    }

    /// A compound term.
    #[must_use]
    pub fn compound(functor: impl Into<String>, args: impl IntoIterator<Item = Term>) -> Self {
        Self::Compound(functor.into(), args.into_iter().collect())
    }

    /// The predicate signature of a callable term: `(functor, arity)` for a
    /// compound, `(name, 0)` for a symbolic atom. Variables and numbers have
    /// no signature and can never match a stored clause.
    #[must_use]
    pub fn signature(&self) -> Option<(&str, usize)> {
        match self {
            Self::Atom(Atom::Symbol(name)) => Some((name, 0)),
            Self::Compound(functor, args) => Some((functor, args.len())),
            Self::Atom(Atom::Number(_)) | Self::Var(_) => None,
        }
    }

    /// Collects every variable into `out`, preserving first-occurrence
    /// order.
    pub fn collect_variables(&self, out: &mut IndexSet<Var>) {
        match self {
            Self::Atom(_) => {}
            Self::Var(var) => {
                out.insert(var.clone());
            }
            Self::Compound(_, args) => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }

    /// Every variable occurring in the term, in first-occurrence order.
    #[must_use]
    pub fn variables(&self) -> IndexSet<Var> {
        let mut out = IndexSet::new();
        self.collect_variables(&mut out);
        out
    }

    /// Whether the term contains no variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        match self {
            Self::Atom(_) => true,
            Self::Var(_) => false,
            Self::Compound(_, args) => args.iter().all(Term::is_ground),
        }
    }
}

impl From<Var> for Term {
    fn from(var: Var) -> Self {
        Self::Var(var)
    }
}

impl From<&Var> for Term {
    fn from(var: &Var) -> Self {
        Self::Var(var.clone())
    }
}

impl From<Atom> for Term {
    fn from(atom: Atom) -> Self {
        Self::Atom(atom)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(atom) => atom.fmt(f),
            Self::Var(var) => var.fmt(f),
            Self::Compound(functor, args) => {
                write!(f, "{functor}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}
