//! Backward-chaining SLD resolution, exposed as a lazy iterator.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::database::{Clause, ClauseDatabase};
use crate::subst::Substitution;
use crate::term::{Term, Var};
use crate::unify::unify;

/// One clause selection recorded in a successful derivation.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivationStep {
    /// The selected goal was closed directly against a stored fact.
    Fact {
        /// The goal as it looked when selected, current bindings applied.
        goal: Term,
        /// The matching fact.
        fact: Term,
    },
    /// The selected goal matched a rule head; the rule's body became the
    /// next subgoals.
    Rule {
        /// The goal as it looked when selected, current bindings applied.
        goal: Term,
        /// The head of the rule instance the goal unified with.
        head: Term,
    },
}

impl fmt::Display for DerivationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact { goal, fact } => write!(f, "{goal} matched fact {fact}"),
            Self::Rule { goal, head } => write!(f, "{goal} expanded by rule {head}"),
        }
    }
}

/// One solution to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The query's free variables, in first-occurrence order, mapped to
    /// their values under the solving substitution: ground terms, or still
    /// unbound variables when the query under-constrains them. A query
    /// without variables solves with an empty mapping.
    pub bindings: IndexMap<Var, Term>,
    /// The clause selections that produced this solution, in order.
    pub derivation: Vec<DerivationStep>,
}

impl Answer {
    /// The value for `var`, if it was a free variable of the query.
    #[must_use]
    pub fn get(&self, var: &Var) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// The value for the first query variable carrying this display name.
    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<&Term> {
        self.bindings
            .iter()
            .find(|(var, _)| var.name() == name)
            .map(|(_, term)| term)
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bindings.is_empty() {
            return f.write_str("true");
        }
        for (i, (var, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var} = {term}")?;
        }
        Ok(())
    }
}

/// A choice point: a resolvent, the substitution that reached it, and a
/// cursor over the untried candidate clauses for its first goal.
#[derive(Debug)]
struct Frame<'db> {
    goals: Vec<Term>,
    subst: Substitution,
    candidates: &'db [Clause],
    next: usize,
    trace: Vec<DerivationStep>,
}

/// A lazy stream of solutions for one query.
///
/// `Solutions` is an [`Iterator`]: each `next` call resumes the depth-first
/// search exactly where the previous solution left off, backtracking through
/// an explicit stack of choice points. Clauses are tried in insertion order
/// and body goals left to right, so the same database and query always yield
/// the same solutions in the same order. Dropping the iterator cancels the
/// search; re-running a query means building a new one.
///
/// There is no depth limit and no cycle detection beyond the occurs check:
/// a program that recurses without reaching a base case makes `next` run
/// forever. That incompleteness is inherent to SLD resolution. A caller
/// needing a bound puts one around the iterator — `take(n)` when n solutions
/// suffice, or an external step or wall-clock budget.
#[derive(Debug)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Solutions<'db> {
    db: &'db ClauseDatabase,
    query_vars: Vec<Var>,
    stack: Vec<Frame<'db>>,
}

impl<'db> Solutions<'db> {
    pub(crate) fn new(db: &'db ClauseDatabase, goals: Vec<Term>) -> Self {
        let mut vars = IndexSet::new();
        for goal in &goals {
            goal.collect_variables(&mut vars);
        }
        log::debug!("query: {}", render_goals(&goals));
        let subst = Substitution::new();
        let candidates = match goals.first() {
            Some(goal) => candidates_for(db, goal, &subst),
            None => &[],
        };
        let stack = vec![Frame {
            goals,
            subst,
            candidates,
            next: 0,
            trace: Vec::new(),
        }];
        Self {
            db,
            query_vars: vars.into_iter().collect(),
            stack,
        }
    }
}

impl Iterator for Solutions<'_> {
    type Item = Answer;

    fn next(&mut self) -> Option<Answer> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return None;
            };

            // Only the empty query builds a frame with an empty resolvent;
            // every other solution is emitted before a frame is pushed.
            if frame.goals.is_empty() {
                let subst = std::mem::take(&mut frame.subst);
                let trace = std::mem::take(&mut frame.trace);
                self.stack.pop();
                return Some(project(&self.query_vars, &subst, trace));
            }

            if frame.next >= frame.candidates.len() {
                log::trace!("backtrack: {}", frame.subst.apply(&frame.goals[0]));
                self.stack.pop();
                continue;
            }

            let candidates = frame.candidates;
            let index = frame.next;
            frame.next += 1;

            let renamed = candidates[index].rename_fresh();
            let goal = &frame.goals[0];
            match unify(goal, &renamed.head, &frame.subst) {
                Ok(subst) => {
                    let selected = frame.subst.apply(goal);
                    let step = if renamed.body.is_empty() {
                        DerivationStep::Fact {
                            goal: selected,
                            fact: renamed.head,
                        }
                    } else {
                        DerivationStep::Rule {
                            goal: selected,
                            head: renamed.head,
                        }
                    };
                    let mut goals = renamed.body;
                    goals.extend_from_slice(&frame.goals[1..]);
                    let mut trace = frame.trace.clone();
                    trace.push(step);
                    if goals.is_empty() {
                        log::debug!("solution: {subst}");
                        return Some(project(&self.query_vars, &subst, trace));
                    }
                    let candidates = candidates_for(self.db, &goals[0], &subst);
                    self.stack.push(Frame {
                        goals,
                        subst,
                        candidates,
                        next: 0,
                        trace,
                    });
                }
                Err(reason) => {
                    log::trace!("candidate rejected: {reason}");
                }
            }
        }
    }
}

/// The stored clauses a goal can resolve against. A goal whose dereferenced
/// form has no signature (an unbound variable, a number) has no candidates
/// and simply fails its branch.
fn candidates_for<'db>(
    db: &'db ClauseDatabase,
    goal: &Term,
    subst: &Substitution,
) -> &'db [Clause] {
    match subst.resolve(goal).signature() {
        Some((name, arity)) => db.clauses_for(name, arity),
        None => &[],
    }
}

/// Restricts a solving substitution to the query's own variables.
fn project(query_vars: &[Var], subst: &Substitution, derivation: Vec<DerivationStep>) -> Answer {
    let bindings = query_vars
        .iter()
        .map(|var| (var.clone(), subst.apply(&Term::Var(var.clone()))))
        .collect();
    Answer {
        bindings,
        derivation,
    }
}

fn render_goals(goals: &[Term]) -> String {
    goals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn padre(parent: &str, child: &str) -> Clause {
        Clause::fact(Term::compound(
            "padre",
            [Term::atom(parent), Term::atom(child)],
        ))
    }

    /// padre(juan, pedro). padre(pedro, luis).
    /// abuelo(X, Z) :- padre(X, Y), padre(Y, Z).
    fn family_db() -> ClauseDatabase {
        let x = Var::fresh("X");
        let y = Var::fresh("Y");
        let z = Var::fresh("Z");
        ClauseDatabase::load(
            [padre("juan", "pedro"), padre("pedro", "luis")],
            [Clause::rule(
                Term::compound("abuelo", [Term::var(&x), Term::var(&z)]),
                [
                    Term::compound("padre", [Term::var(&x), Term::var(&y)]),
                    Term::compound("padre", [Term::var(&y), Term::var(&z)]),
                ],
            )],
        )
        .unwrap()
    }

    fn colors_db() -> ClauseDatabase {
        ClauseDatabase::load(
            ["rojo", "verde", "azul"]
                .map(|color| Clause::fact(Term::compound("color", [Term::atom(color)]))),
            [],
        )
        .unwrap()
    }

    #[test]
    fn test_ground_query_matching_fact_yields_one_empty_binding() {
        let db = family_db();
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "padre",
                [Term::atom("juan"), Term::atom("pedro")],
            )])
            .collect();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].bindings.is_empty());
        assert_eq!(answers[0].to_string(), "true");
    }

    #[test]
    fn test_rule_chaining_proves_ground_goal() {
        let db = family_db();
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "abuelo",
                [Term::atom("juan"), Term::atom("luis")],
            )])
            .collect();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].bindings.is_empty());
    }

    #[test]
    fn test_rule_chaining_binds_query_variable() {
        let db = family_db();
        let x = Var::fresh("X");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "abuelo",
                [Term::var(&x), Term::atom("luis")],
            )])
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(&x), Some(&Term::atom("juan")));
        assert_eq!(answers[0].to_string(), "X = juan");
    }

    #[test]
    fn test_answers_restrict_to_query_variables() {
        let db = family_db();
        let x = Var::fresh("X");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "abuelo",
                [Term::var(&x), Term::atom("luis")],
            )])
            .collect();
        // The rule's own Y and Z never leak into the answer.
        let keys: Vec<&Var> = answers[0].bindings.keys().collect();
        assert_eq!(keys, vec![&x]);
    }

    #[test]
    fn test_backtracking_enumerates_facts_in_insertion_order() {
        let db = colors_db();
        let x = Var::fresh("X");
        let values: Vec<Term> = db
            .query(vec![Term::compound("color", [Term::var(&x)])])
            .map(|answer| answer.get(&x).cloned().unwrap())
            .collect();
        assert_eq!(
            values,
            vec![Term::atom("rojo"), Term::atom("verde"), Term::atom("azul")]
        );
    }

    #[test]
    fn test_unknown_predicate_yields_no_solutions() {
        let db = family_db();
        let x = Var::fresh("X");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound("vigencia", [Term::var(&x)])])
            .collect();
        assert!(answers.is_empty());
    }

    #[test]
    fn test_repeated_query_is_deterministic() {
        let db = family_db();
        let x = Var::fresh("X");
        let z = Var::fresh("Z");
        let goal = Term::compound("abuelo", [Term::var(&x), Term::var(&z)]);
        // Renamed rule instances differ between runs, so compare what the
        // caller sees: the projected bindings, in order.
        let first: Vec<IndexMap<Var, Term>> = db
            .query(vec![goal.clone()])
            .map(|answer| answer.bindings)
            .collect();
        let second: Vec<IndexMap<Var, Term>> = db
            .query(vec![goal])
            .map(|answer| answer.bindings)
            .collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_conjunction_threads_bindings_across_goals() {
        let db = family_db();
        let y = Var::fresh("Y");
        let z = Var::fresh("Z");
        let answers: Vec<Answer> = db
            .query(vec![
                Term::compound("padre", [Term::atom("juan"), Term::var(&y)]),
                Term::compound("padre", [Term::var(&y), Term::var(&z)]),
            ])
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(&y), Some(&Term::atom("pedro")));
        assert_eq!(answers[0].get(&z), Some(&Term::atom("luis")));
    }

    #[test]
    fn test_solutions_follow_rule_order() {
        let w = Var::fresh("W");
        let x = Var::fresh("X");
        let y = Var::fresh("Y");
        let db = ClauseDatabase::load(
            [
                Clause::fact(Term::compound("residente", [Term::atom("ana")])),
                Clause::fact(Term::compound("foraneo_autorizado", [Term::atom("ben")])),
            ],
            [
                Clause::rule(
                    Term::compound("apto", [Term::var(&x)]),
                    [Term::compound("residente", [Term::var(&x)])],
                ),
                Clause::rule(
                    Term::compound("apto", [Term::var(&y)]),
                    [Term::compound("foraneo_autorizado", [Term::var(&y)])],
                ),
            ],
        )
        .unwrap();
        let names: Vec<Term> = db
            .query(vec![Term::compound("apto", [Term::var(&w)])])
            .map(|answer| answer.get(&w).cloned().unwrap())
            .collect();
        assert_eq!(names, vec![Term::atom("ana"), Term::atom("ben")]);
    }

    #[test]
    fn test_solutions_are_lazy_over_an_infinite_program() {
        init_logs();
        let x = Var::fresh("X");
        let db = ClauseDatabase::load(
            [Clause::fact(Term::compound("nat", [Term::atom("z")]))],
            [Clause::rule(
                Term::compound("nat", [Term::compound("s", [Term::var(&x)])]),
                [Term::compound("nat", [Term::var(&x)])],
            )],
        )
        .unwrap();

        let n = Var::fresh("N");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound("nat", [Term::var(&n)])])
            .take(4)
            .collect();

        let mut expected = Term::atom("z");
        let mut depths = Vec::new();
        for answer in &answers {
            assert_eq!(answer.get(&n), Some(&expected));
            depths.push(answer.derivation.len());
            expected = Term::compound("s", [expected]);
        }
        assert_eq!(depths, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_query_is_vacuously_true_exactly_once() {
        let db = family_db();
        let answers: Vec<Answer> = db.query(Vec::new()).collect();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].bindings.is_empty());
        assert!(answers[0].derivation.is_empty());
    }

    #[test]
    fn test_variable_goal_fails_cleanly() {
        let db = family_db();
        let x = Var::fresh("X");
        assert_eq!(db.query(vec![Term::var(&x)]).count(), 0);
    }

    #[test]
    fn test_under_constrained_query_reports_unbound_variables() {
        let v = Var::fresh("V");
        let db = ClauseDatabase::load(
            [Clause::fact(Term::compound(
                "igual",
                [Term::var(&v), Term::var(&v)],
            ))],
            [],
        )
        .unwrap();
        let a = Var::fresh("A");
        let b = Var::fresh("B");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound("igual", [Term::var(&a), Term::var(&b)])])
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get(&a), Some(&Term::var(&a)));
        assert_eq!(answers[0].get(&b), Some(&Term::var(&a)));
    }

    #[test]
    fn test_occurs_check_rejection_just_fails_the_branch() {
        let v = Var::fresh("V");
        let db = ClauseDatabase::load(
            [Clause::fact(Term::compound(
                "p",
                [Term::compound("f", [Term::var(&v)]), Term::var(&v)],
            ))],
            [],
        )
        .unwrap();
        let y = Var::fresh("Y");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound("p", [Term::var(&y), Term::var(&y)])])
            .collect();
        assert!(answers.is_empty());
    }

    #[test]
    fn test_derivation_traces_facts_and_rules() {
        let db = family_db();
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "abuelo",
                [Term::atom("juan"), Term::atom("luis")],
            )])
            .collect();
        let derivation = &answers[0].derivation;
        assert_eq!(derivation.len(), 3);

        let DerivationStep::Rule { goal, head } = &derivation[0] else {
            panic!("first step should expand the rule");
        };
        assert_eq!(
            goal,
            &Term::compound("abuelo", [Term::atom("juan"), Term::atom("luis")])
        );
        assert_eq!(head.signature(), Some(("abuelo", 2)));

        let DerivationStep::Fact { goal, fact } = &derivation[1] else {
            panic!("second step should match a fact");
        };
        assert_eq!(fact, &Term::compound("padre", [Term::atom("juan"), Term::atom("pedro")]));
        let Term::Compound(_, args) = goal else {
            panic!("selected goal should stay compound");
        };
        assert_eq!(args[0], Term::atom("juan"));
        assert!(matches!(args[1], Term::Var(_)));

        let DerivationStep::Fact { goal, fact } = &derivation[2] else {
            panic!("third step should match a fact");
        };
        let expected = Term::compound("padre", [Term::atom("pedro"), Term::atom("luis")]);
        assert_eq!(goal, &expected);
        assert_eq!(fact, &expected);
        assert!(derivation[2].to_string().contains("matched fact"));
    }

    #[test]
    fn test_ask_reports_existence_only() {
        let db = colors_db();
        let x = Var::fresh("X");
        assert!(db.ask(vec![Term::compound("color", [Term::var(&x)])]));
        assert!(db.ask(vec![Term::compound("color", [Term::atom("verde")])]));
        assert!(!db.ask(vec![Term::compound("color", [Term::atom("negro")])]));
    }

    #[test]
    fn test_session_facts_enable_queries_on_a_cloned_database() {
        let u = Var::fresh("U");
        let base = ClauseDatabase::load(
            [],
            [Clause::rule(
                Term::compound("puede_tramitar", [Term::var(&u)]),
                [Term::compound("reside_en_ensenada", [Term::var(&u)])],
            )],
        )
        .unwrap();
        let goal = Term::compound("puede_tramitar", [Term::atom("usuario_actual")]);
        assert!(!base.ask(vec![goal.clone()]));

        let mut session = base.clone();
        session
            .add_clause(Clause::fact(Term::compound(
                "reside_en_ensenada",
                [Term::atom("usuario_actual")],
            )))
            .unwrap();
        assert!(session.ask(vec![goal.clone()]));
        assert!(!base.ask(vec![goal]));
    }

    #[test]
    fn test_procedure_knowledge_base_end_to_end() {
        init_logs();
        let t = Var::fresh("T");
        let p = Var::fresh("P");
        let r = Var::fresh("R");
        let facts = [
            Clause::fact(Term::compound(
                "es_tramite_valido",
                [Term::atom("acta_nacimiento")],
            )),
            Clause::fact(Term::compound(
                "es_tramite_valido",
                [Term::atom("licencia_conducir")],
            )),
            Clause::fact(Term::compound(
                "subtipo_de",
                [
                    Term::atom("acta_nacimiento_primera_vez"),
                    Term::atom("acta_nacimiento"),
                ],
            )),
            Clause::fact(Term::compound(
                "requiere",
                [
                    Term::atom("acta_nacimiento"),
                    Term::atom("identificacion_oficial"),
                ],
            )),
            Clause::fact(Term::compound(
                "requiere",
                [
                    Term::atom("licencia_conducir"),
                    Term::atom("comprobante_domicilio"),
                ],
            )),
            Clause::fact(Term::compound(
                "costo",
                [
                    Term::atom("licencia_conducir"),
                    Term::atom("3_anios"),
                    Term::number(1077.80),
                ],
            )),
            Clause::fact(Term::compound(
                "costo",
                [
                    Term::atom("acta_nacimiento"),
                    Term::atom("copia_certificada"),
                    Term::number(150.0),
                ],
            )),
        ];
        // A subtype inherits the requirements of its parent procedure.
        let rules = [Clause::rule(
            Term::compound("requiere", [Term::var(&t), Term::var(&r)]),
            [
                Term::compound("subtipo_de", [Term::var(&t), Term::var(&p)]),
                Term::compound("requiere", [Term::var(&p), Term::var(&r)]),
            ],
        )];
        let db = ClauseDatabase::load(facts, rules).unwrap();

        let requisito = Var::fresh("Requisito");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "requiere",
                [
                    Term::atom("acta_nacimiento_primera_vez"),
                    Term::var(&requisito),
                ],
            )])
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(
            answers[0].get(&requisito),
            Some(&Term::atom("identificacion_oficial"))
        );

        let descripcion = Var::fresh("Descripcion");
        let monto = Var::fresh("Monto");
        let answers: Vec<Answer> = db
            .query(vec![Term::compound(
                "costo",
                [
                    Term::atom("licencia_conducir"),
                    Term::var(&descripcion),
                    Term::var(&monto),
                ],
            )])
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].get_named("Descripcion"), Some(&Term::atom("3_anios")));
        assert_eq!(answers[0].get_named("Monto"), Some(&Term::number(1077.80)));
        assert_eq!(answers[0].to_string(), "Descripcion = 3_anios, Monto = 1077.8");

        assert!(db.ask(vec![Term::compound(
            "es_tramite_valido",
            [Term::atom("licencia_conducir")],
        )]));
        assert!(!db.ask(vec![Term::compound(
            "es_tramite_valido",
            [Term::atom("pasaporte")],
        )]));
    }
}
