//! Clause storage: facts and rules indexed by predicate signature.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::solve::Solutions;
use crate::term::{Term, Var};

/// A predicate signature: functor name plus arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    /// Functor name.
    pub name: String,
    /// Number of arguments.
    pub arity: usize,
}

impl Signature {
    /// Builds a signature.
    #[must_use]
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A Horn clause: a head and zero or more body goals. An empty body makes
/// the clause a fact.
///
/// A clause's variables are private to it: the solver renames them fresh
/// every time the clause is selected, so the same stored clause can take
/// part in many branches of one search without capture.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clause {
    /// The conclusion.
    pub head: Term,
    /// The conditions, resolved left to right.
    pub body: Vec<Term>,
}

impl Clause {
    /// An unconditional clause.
    #[must_use]
    pub fn fact(head: Term) -> Self {
        Self {
            head,
            body: Vec::new(),
        }
    }

    /// A conditional clause.
    #[must_use]
    pub fn rule(head: Term, body: impl IntoIterator<Item = Term>) -> Self {
        Self {
            head,
            body: body.into_iter().collect(),
        }
    }

    /// Whether the body is empty.
    #[must_use]
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// A structurally identical clause with every variable replaced by a
    /// freshly minted one. Occurrences of one variable map to one fresh
    /// variable, so sharing within the clause is preserved.
    #[must_use]
    pub fn rename_fresh(&self) -> Self {
        let mut mapping: IndexMap<Var, Var> = IndexMap::new();
        Self {
            head: rename_term(&self.head, &mut mapping),
            body: self
                .body
                .iter()
                .map(|goal| rename_term(goal, &mut mapping))
                .collect(),
        }
    }
}

fn rename_term(term: &Term, mapping: &mut IndexMap<Var, Var>) -> Term {
    match term {
        Term::Atom(_) => term.clone(),
        Term::Var(var) => Term::Var(
            mapping
                .entry(var.clone())
                .or_insert_with(|| var.renamed())
                .clone(),
        ),
        Term::Compound(functor, args) => Term::Compound(
            functor.clone(),
            args.iter().map(|arg| rename_term(arg, mapping)).collect(),
        ),
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.head.fmt(f)?;
        if !self.body.is_empty() {
            f.write_str(" :- ")?;
            for (i, goal) in self.body.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                goal.fmt(f)?;
            }
        }
        f.write_str(".")
    }
}

/// An ill-formed clause handed to the database. This is the one fatal error
/// of the engine: it is reported at load time, never deferred to query
/// time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClauseError {
    /// The head is a variable or a number and names no predicate.
    #[error("clause head must name a predicate, got `{0}`")]
    InvalidHead(Term),
    /// A body goal is a variable or a number and names no predicate.
    #[error("body goal must name a predicate, got `{0}`")]
    InvalidGoal(Term),
}

/// The clause database: an ordered map from predicate signature to the
/// clauses stored under it, in insertion order.
///
/// Insertion order is the search order, so it determines the order in which
/// solutions are produced. The database is append-only during a reasoning
/// session and never mutated by resolution, which makes it safe to share
/// across queries. It is also `Clone`, so a caller can layer
/// session-specific facts onto a shared base without touching it.
#[derive(Debug, Clone, Default)]
pub struct ClauseDatabase {
    clauses: IndexMap<Signature, Vec<Clause>>,
}

impl ClauseDatabase {
    /// An empty database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clauses: IndexMap::new(),
        }
    }

    /// Builds a database from facts and rules, validating every clause.
    /// Facts are appended before rules, so for a predicate defined by both,
    /// facts are tried first.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClauseError`] encountered; the database is not
    /// partially usable after a failure.
    pub fn load(
        facts: impl IntoIterator<Item = Clause>,
        rules: impl IntoIterator<Item = Clause>,
    ) -> Result<Self, ClauseError> {
        let mut db = Self::new();
        for clause in facts.into_iter().chain(rules) {
            db.add_clause(clause)?;
        }
        log::debug!(
            "knowledge base loaded: {} clauses over {} predicates",
            db.len(),
            db.clauses.len()
        );
        Ok(db)
    }

    /// Appends a clause under its head's signature.
    ///
    /// # Errors
    ///
    /// Fails when the head or a body goal does not name a predicate.
    pub fn add_clause(&mut self, clause: Clause) -> Result<(), ClauseError> {
        let signature = clause
            .head
            .signature()
            .map(|(name, arity)| Signature::new(name, arity));
        let Some(signature) = signature else {
            return Err(ClauseError::InvalidHead(clause.head));
        };
        for goal in &clause.body {
            if goal.signature().is_none() {
                return Err(ClauseError::InvalidGoal(goal.clone()));
            }
        }
        log::trace!("add {signature}: {clause}");
        self.clauses.entry(signature).or_default().push(clause);
        Ok(())
    }

    /// The clauses stored for `(functor, arity)`, in insertion order. An
    /// unknown predicate yields an empty slice, not an error: it simply has
    /// no solutions.
    #[must_use]
    pub fn clauses_for(&self, functor: &str, arity: usize) -> &[Clause] {
        self.clauses
            .get(&Signature::new(functor, arity))
            .map_or(&[], Vec::as_slice)
    }

    /// Iterates over `(signature, clauses)` pairs in first-insertion order
    /// of the signatures.
    pub fn iter(&self) -> impl Iterator<Item = (&Signature, &[Clause])> {
        self.clauses
            .iter()
            .map(|(signature, clauses)| (signature, clauses.as_slice()))
    }

    /// Total number of stored clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.values().map(Vec::len).sum()
    }

    /// Whether the database holds no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Runs a query: proves the conjunction of `goals` against this
    /// database, lazily producing one [`Answer`](crate::Answer) per
    /// solution.
    #[must_use]
    pub fn query(&self, goals: Vec<Term>) -> Solutions<'_> {
        Solutions::new(self, goals)
    }

    /// Whether at least one solution exists. Stops at the first one.
    #[must_use]
    pub fn ask(&self, goals: Vec<Term>) -> bool {
        self.query(goals).next().is_some()
    }
}
