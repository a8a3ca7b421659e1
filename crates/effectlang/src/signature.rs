//! The built-in operator signature table (§6 "Built-in signature table").
//!
//! A signature is a function from arity to an `Effect` (§3). Most built-ins
//! in this table are *propagate* operators: the operator itself introduces
//! no effect of its own, but whatever effect its arguments carry must flow
//! through to the result. That shape is expressible as a single,
//! arity-independent scheme: a self-referential unary arrow
//! `(x) -> x`, with `x` a single quantified effect variable. A call site
//! with more than one argument unifies against this scheme via the
//! tuple-unpacking rule (§4.D): the N actual argument effects are combined
//! kind-wise into one concrete effect standing in for `x`, which is exactly
//! the arrow-fixpoint shape the hashed-variable canonicalization (§4.D.1,
//! §9) exists to make unifiable across different arities and call sites.
//!
//! `assign` is handled specially by the inferrer rather than through this
//! table, because its signature depends on the name being assigned to
//! (which this table, a pure function of operator name and arity, cannot
//! see) -- see `crate::infer`.
//!
//! The iterator/quantifier operators (`map`, `filter`, `forall`, `exists`,
//! `fold`) are recognized here by name (`is_iterator_op`) but don't get a
//! propagate scheme: their first argument is a lambda, and the effect it
//! contributes has to come from unifying that lambda's arrow shape against
//! a fresh element variable, then combining the result with the remaining
//! arguments by kind -- a two-step process the flat signature-table shape
//! above can't express. See `crate::infer::Inferrer::infer_iterator_application`.

use crate::effect::{Effect, EffectScheme};
use std::collections::BTreeSet;

/// Operators with a pure, arity-independent propagate signature: the
/// result's effect is exactly the kind-wise combination of the arguments'
/// effects. Grouped by the §6 table.
const ARITHMETIC: &[&str] = &["iadd", "isub", "imul", "idiv", "imod", "ipow", "iuminus"];
const COMPARISON: &[&str] = &["eq", "neq", "ilt", "ilte", "igt", "igte"];
const LOGICAL: &[&str] = &["and", "or", "not", "iff", "implies"];
const CONSTRUCTORS: &[&str] = &["set", "seq", "tuple", "record"];
/// Structural control-flow combinators (§4.E "Lazy operators"): their
/// scheduling semantics belong to the evaluator, but the inferrer still
/// assigns them a propagate signature combining every branch's effect.
const STRUCTURAL: &[&str] = &["actionAny", "actionAll", "then", "ite"];
/// Quantifiers and iterators -- not in the propagate table; handled by the
/// inferrer directly (see the module doc comment).
const ITERATORS: &[&str] = &["map", "filter", "forall", "exists", "fold"];

/// Look up the built-in signature for `op` at the given call-site `arity`,
/// instantiated as a fresh-named scheme ready for the caller to freshen
/// further (or use as-is; the name `x` below is itself opaque and gets
/// renamed by instantiation at each call site).
///
/// Returns `None` for names not in the propagate table -- either an
/// iterator (`is_iterator_op`, handled by the inferrer directly) or a
/// user-defined name the inferrer then falls back to `lookup` for (§4.E).
pub fn builtin_scheme(op: &str, _arity: usize) -> Option<EffectScheme> {
    if is_propagate_builtin(op) {
        Some(propagate_scheme())
    } else {
        None
    }
}

/// Whether `op` is one of the iterator/quantifier built-ins, which the
/// inferrer dispatches to `infer_iterator_application` instead of the
/// generic propagate path.
pub(crate) fn is_iterator_op(op: &str) -> bool {
    ITERATORS.contains(&op)
}

fn is_propagate_builtin(op: &str) -> bool {
    ARITHMETIC.contains(&op)
        || COMPARISON.contains(&op)
        || LOGICAL.contains(&op)
        || CONSTRUCTORS.contains(&op)
        || STRUCTURAL.contains(&op)
}

fn propagate_scheme() -> EffectScheme {
    let mut effect_vars = BTreeSet::new();
    effect_vars.insert("x".to_string());
    EffectScheme {
        effect_vars,
        entity_vars: BTreeSet::new(),
        effect: Effect::Arrow {
            params: vec![Effect::Quantified("x".into())],
            result: Box::new(Effect::Quantified("x".into())),
        },
    }
}
