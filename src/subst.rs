//! Persistent substitutions: the only mechanism that gives a variable a
//! value.
//!
//! Every operation is pure and returns a new [`Substitution`]; backtracking
//! in the solver restores an earlier state by simply dropping the newer
//! value. Bindings live in an [`IndexMap`] so iteration and rendering follow
//! insertion order deterministically.

use std::fmt;

use indexmap::IndexMap;

use crate::term::{Term, Var};
use crate::unify::UnifyError;

/// An immutable mapping from variables to terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: IndexMap<Var, Term>,
}

impl Substitution {
    /// The empty substitution.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no variable is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The term directly bound to `var`, if any. Does not follow chains;
    /// see [`Substitution::resolve`].
    #[must_use]
    pub fn lookup(&self, var: &Var) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// Iterates over the bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Term)> {
        self.bindings.iter()
    }

    /// Dereferences the top of `term`: follows variable-to-term chains until
    /// reaching a non-variable term or an unbound variable. Compound
    /// arguments are left untouched; see [`Substitution::apply`] for full
    /// application.
    #[must_use]
    pub fn resolve<'a>(&'a self, mut term: &'a Term) -> &'a Term {
        while let Term::Var(var) = term {
            match self.bindings.get(var) {
                Some(bound) => term = bound,
                None => break,
            }
        }
        term
    }

    /// Applies the substitution recursively until fixpoint: the result
    /// contains no variable bound in this substitution.
    #[must_use]
    pub fn apply(&self, term: &Term) -> Term {
        match self.resolve(term) {
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|arg| self.apply(arg)).collect(),
            ),
            resolved => resolved.clone(),
        }
    }

    /// Returns a new substitution extended with `var -> term`.
    ///
    /// # Errors
    ///
    /// The occurs check is always on: binding fails with
    /// [`UnifyError::OccursCheck`] when `term`, dereferenced under this
    /// substitution, contains `var`. That failure drives backtracking like
    /// any other unification failure.
    ///
    /// # Panics
    ///
    /// Panics if `var` is already bound. The unifier resolves both sides
    /// before binding, so it only ever binds unbound variables.
    pub fn bind(&self, var: Var, term: Term) -> Result<Self, UnifyError> {
        assert!(
            self.lookup(&var).is_none(),
            "bind requires an unbound variable"
        );
        if occurs(&var, &term, self) {
            return Err(UnifyError::OccursCheck { var, term });
        }
        let mut bindings = self.bindings.clone();
        bindings.insert(var, term);
        Ok(Self { bindings })
    }

    /// Composes two substitutions: applying the result is equivalent to
    /// applying `self` first, then `other`. For a variable bound by both,
    /// `self`'s binding rewritten under `other` wins, which is exactly what
    /// sequential application does.
    ///
    /// The caller must not compose substitutions whose union introduces a
    /// cyclic binding (for example `{X -> f(Y)}` with `{Y -> X}`); the
    /// engine itself only ever extends substitutions through the
    /// occurs-checked [`Substitution::bind`].
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        let mut bindings = IndexMap::with_capacity(self.bindings.len() + other.bindings.len());
        for (var, term) in &self.bindings {
            bindings.insert(var.clone(), other.apply(term));
        }
        for (var, term) in &other.bindings {
            if !bindings.contains_key(var) {
                bindings.insert(var.clone(), term.clone());
            }
        }
        Self { bindings }
    }
}

/// Whether `var` occurs in `term` once every variable in `term` is
/// dereferenced under `subst`.
fn occurs(var: &Var, term: &Term, subst: &Substitution) -> bool {
    match subst.resolve(term) {
        Term::Var(resolved) => resolved == var,
        Term::Atom(_) => false,
        Term::Compound(_, args) => args.iter().any(|arg| occurs(var, arg, subst)),
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (var, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var} -> {term}")?;
        }
        f.write_str("}")
    }
}
