//! # Hornlog
//!
//! A micro SLD resolution engine implementation in Rust.
//!
//! ## Features
//!
//! - Backward chaining over Horn clauses with chronological backtracking
//! - Robinson unification with the occurs check always on
//! - Lazy, resumable solution streams with derivation traces
//!
//! ## Example
//!
//! ```rust
//! use hornlog::{Clause, ClauseDatabase, Term, Var};
//!
//! let x = Var::fresh("X");
//! let y = Var::fresh("Y");
//! let z = Var::fresh("Z");
//! let db = ClauseDatabase::load(
//!     [
//!         Clause::fact(Term::compound("padre", [Term::atom("juan"), Term::atom("pedro")])),
//!         Clause::fact(Term::compound("padre", [Term::atom("pedro"), Term::atom("luis")])),
//!     ],
//!     [Clause::rule(
//!         Term::compound("abuelo", [Term::var(&x), Term::var(&z)]),
//!         [
//!             Term::compound("padre", [Term::var(&x), Term::var(&y)]),
//!             Term::compound("padre", [Term::var(&y), Term::var(&z)]),
//!         ],
//!     )],
//! )?;
//!
//! let quien = Var::fresh("Quien");
//! let goal = Term::compound("abuelo", [Term::var(&quien), Term::atom("luis")]);
//! let answer = db.query(vec![goal]).next().unwrap();
//! assert_eq!(answer.get(&quien), Some(&Term::atom("juan")));
//! # Ok::<(), hornlog::ClauseError>(())
//! ```

/// Clause storage.
pub mod database;
/// Textual clause and query syntax.
#[cfg(feature = "parsing")]
pub mod parse;
/// SLD resolution.
pub mod solve;
/// Substitutions.
pub mod subst;
/// Terms, atoms and variables.
pub mod term;
/// Unification.
pub mod unify;

pub use database::{Clause, ClauseDatabase, ClauseError, Signature};
#[cfg(feature = "parsing")]
pub use parse::{parse_clause, parse_program, parse_query, parse_term, ParseError};
pub use solve::{Answer, DerivationStep, Solutions};
pub use subst::Substitution;
pub use term::{Atom, Term, Var};
pub use unify::{unify, UnifyError};
