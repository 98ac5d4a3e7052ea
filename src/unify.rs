//! Robinson unification over terms, with the occurs check always on.

use thiserror::Error;

use crate::subst::Substitution;
use crate::term::{Term, Var};

/// Why a unification attempt failed.
///
/// Both variants are expected, local outcomes: the solver treats them as
/// "this clause does not apply" and backtracks. They never surface to a
/// caller as errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnifyError {
    /// Binding the variable would build an infinite term.
    #[error("occurs check: {var} occurs in {term}")]
    OccursCheck {
        /// The variable that occurs in its own binding.
        var: Var,
        /// The term the variable was about to be bound to.
        term: Term,
    },
    /// The terms disagree structurally: different constants, different
    /// functors or arities, or a constant against a compound.
    #[error("cannot unify {left} with {right}")]
    Clash {
        /// Left term as resolved at the point of failure.
        left: Term,
        /// Right term as resolved at the point of failure.
        right: Term,
    },
}

/// Computes the most general unifier of `a` and `b` under an existing
/// substitution, returning the extended substitution.
///
/// Both terms are first dereferenced under `subst`. Equal constants and
/// identical variables succeed without new bindings; an unbound variable
/// binds to the other side (occurs-checked); compounds with matching
/// functor and arity unify argument pairs left-to-right, each pair seeing
/// the bindings made by earlier pairs. Everything else clashes.
///
/// Two distinct unbound variables bind deterministically: the one created
/// later (higher id) binds to the one created earlier. Renamed clause
/// variables are always younger than the query's variables, so answers
/// resolve toward the variables the caller asked about.
///
/// # Errors
///
/// [`UnifyError::Clash`] when the terms disagree structurally,
/// [`UnifyError::OccursCheck`] when unification would build an infinite
/// term. The solver treats both as "this clause does not apply".
pub fn unify(a: &Term, b: &Term, subst: &Substitution) -> Result<Substitution, UnifyError> {
    let left = subst.resolve(a);
    let right = subst.resolve(b);
    match (left, right) {
        (Term::Atom(x), Term::Atom(y)) if x == y => Ok(subst.clone()),
        (Term::Var(v), Term::Var(w)) if v == w => Ok(subst.clone()),
        (Term::Var(v), Term::Var(w)) => {
            if v.id() > w.id() {
                subst.bind(v.clone(), Term::Var(w.clone()))
            } else {
                subst.bind(w.clone(), Term::Var(v.clone()))
            }
        }
        (Term::Var(v), other) | (other, Term::Var(v)) => subst.bind(v.clone(), other.clone()),
        (Term::Compound(f, xs), Term::Compound(g, ys)) if f == g && xs.len() == ys.len() => {
            let mut current = subst.clone();
            for (x, y) in xs.iter().zip(ys.iter()) {
                current = unify(x, y, &current)?;
            }
            Ok(current)
        }
        (l, r) => Err(UnifyError::Clash {
            left: l.clone(),
            right: r.clone(),
        }),
    }
}
