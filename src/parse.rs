//! Textual syntax for clauses and queries.
//!
//! The grammar is the familiar Prolog subset: atoms are lowercase words,
//! single-quoted strings or numbers, variables start with an uppercase
//! letter or `_`, and `%` comments run to the end of the line. Variables
//! are scoped to the clause (or the query) they appear in, and every
//! occurrence of `_` is a distinct variable.
//!
//! ```
//! use hornlog::{parse_program, parse_query, ClauseDatabase};
//!
//! let clauses = parse_program(
//!     "
//!     padre(juan, pedro).
//!     padre(pedro, luis).
//!     abuelo(X, Z) :- padre(X, Y), padre(Y, Z).
//!     ",
//! )?;
//! let mut db = ClauseDatabase::new();
//! for clause in clauses {
//!     db.add_clause(clause)?;
//! }
//! assert!(db.ask(parse_query("abuelo(juan, luis).")?));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, multispace1},
    combinator::{all_consuming, map, opt, value},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish, IResult,
};
use thiserror::Error;

use crate::database::Clause;
use crate::term::{Term, Var};

/// A syntax error in textual input, reported at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input could not be parsed at the reported position.
    #[error("syntax error near `{near}`")]
    Syntax {
        /// A short excerpt starting where parsing failed.
        near: String,
    },
}

/// Parses a single term.
///
/// # Errors
///
/// Fails when the input is not exactly one term.
pub fn parse_term(input: &str) -> Result<Term, ParseError> {
    let (_, raw) = all_consuming(terminated(term, ws))(input)
        .finish()
        .map_err(syntax_error)?;
    Ok(scope_term(&raw, &mut IndexMap::new()))
}

/// Parses one clause, `head.` or `head :- goal, goal.`.
///
/// The clause is syntactic only; [`ClauseDatabase::add_clause`] is what
/// rejects heads and goals that name no predicate.
///
/// [`ClauseDatabase::add_clause`]: crate::ClauseDatabase::add_clause
///
/// # Errors
///
/// Fails when the input is not exactly one terminated clause.
pub fn parse_clause(input: &str) -> Result<Clause, ParseError> {
    let (_, parsed) = all_consuming(terminated(clause, ws))(input)
        .finish()
        .map_err(syntax_error)?;
    Ok(parsed)
}

/// Parses a whole program: any number of clauses, in order.
///
/// # Errors
///
/// Fails at the first ill-formed clause.
pub fn parse_program(input: &str) -> Result<Vec<Clause>, ParseError> {
    let (_, clauses) = all_consuming(terminated(many0(clause), ws))(input)
        .finish()
        .map_err(syntax_error)?;
    Ok(clauses)
}

/// Parses a query: a comma-separated conjunction of goals, with an
/// optional final `.`. All goals share one variable scope.
///
/// # Errors
///
/// Fails when the input is not exactly one conjunction.
pub fn parse_query(input: &str) -> Result<Vec<Term>, ParseError> {
    let (_, raw) = all_consuming(terminated(
        separated_list1(preceded(ws, char(',')), term),
        tuple((opt(preceded(ws, char('.'))), ws)),
    ))(input)
    .finish()
    .map_err(syntax_error)?;
    let mut scope = IndexMap::new();
    Ok(raw.iter().map(|goal| scope_term(goal, &mut scope)).collect())
}

fn syntax_error(err: nom::error::Error<&str>) -> ParseError {
    let mut near: String = err.input.chars().take(24).collect();
    if err.input.len() > near.len() {
        near.push_str("...");
    }
    ParseError::Syntax { near }
}

/// Replaces same-named variables with one shared identity inside a scope.
/// `_` is anonymous and never enters the scope.
fn scope_term(term: &Term, scope: &mut IndexMap<String, Var>) -> Term {
    match term {
        Term::Atom(_) => term.clone(),
        Term::Var(var) if var.name() == "_" => term.clone(),
        Term::Var(var) => Term::Var(
            scope
                .entry(var.name().to_string())
                .or_insert_with(|| var.clone())
                .clone(),
        ),
        Term::Compound(functor, args) => Term::Compound(
            functor.clone(),
            args.iter().map(|arg| scope_term(arg, scope)).collect(),
        ),
    }
}

/// Whitespace and `%` line comments.
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(char('%'), opt(is_not("\n")))),
        ))),
    )(input)
}

fn clause(input: &str) -> IResult<&str, Clause> {
    let (input, head) = term(input)?;
    let (input, _) = ws(input)?;
    let (input, body) = opt(preceded(
        tag(":-"),
        separated_list1(preceded(ws, char(',')), term),
    ))(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char('.')(input)?;

    let mut scope = IndexMap::new();
    let head = scope_term(&head, &mut scope);
    let parsed = match body {
        Some(goals) => Clause::rule(head, goals.iter().map(|goal| scope_term(goal, &mut scope))),
        None => Clause::fact(head),
    };
    Ok((input, parsed))
}

fn term(input: &str) -> IResult<&str, Term> {
    let (input, _) = ws(input)?;
    alt((compound, variable_term, symbol_term, number_term))(input)
}

fn compound(input: &str) -> IResult<&str, Term> {
    let (input, functor) = name(input)?;
    let (input, _) = char('(')(input)?;
    let (input, args) = separated_list1(preceded(ws, char(',')), term)(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, Term::Compound(functor, args)))
}

fn variable_term(input: &str) -> IResult<&str, Term> {
    let (input, name) = variable_name(input)?;
    Ok((input, Term::Var(Var::fresh(name))))
}

fn symbol_term(input: &str) -> IResult<&str, Term> {
    map(name, Term::atom)(input)
}

fn number_term(input: &str) -> IResult<&str, Term> {
    let (rest, value) = double(input)?;
    // `3anios` is not a number followed by an atom, it is a syntax error.
    if rest
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }
    Ok((rest, Term::number(value)))
}

/// A functor or symbol name: a lowercase word, or anything single-quoted.
fn name(input: &str) -> IResult<&str, String> {
    map(alt((single_quoted, lower_word)), String::from)(input)
}

fn single_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), is_not("'"), char('\''))(input)
}

fn lower_word(input: &str) -> IResult<&str, &str> {
    word(input, |first| first.is_ascii_lowercase())
}

fn variable_name(input: &str) -> IResult<&str, &str> {
    word(input, |first| first.is_ascii_uppercase() || first == '_')
}

fn word(input: &str, starts: impl Fn(char) -> bool) -> IResult<&str, &str> {
    match input.chars().next() {
        Some(first) if starts(first) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Alpha,
            )))
        }
    }
    let end = input
        .char_indices()
        .skip(1)
        .find(|(_, ch)| !ch.is_ascii_alphanumeric() && *ch != '_')
        .map_or(input.len(), |(i, _)| i);
    Ok((&input[end..], &input[..end]))
}
