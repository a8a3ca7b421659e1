//! The unifier (§4.D): structural unification of effects and of variable
//! sets, with occurs-check, kind compatibility/domination, and arity
//! unpacking for variadic operators.

use crate::effect::{Effect, EffectComponent, Kind, Variables};
use crate::simplify::{print_effect, print_variables, simplify_effect, simplify_variables};
use crate::subst::{BindError, Substitution};
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum UnifyError {
    #[error("expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("can't unify different kinds of effects")]
    IncompatibleEffectKinds,
    #[error("variable sets disagree: {a} vs {b}")]
    VariableSetMismatch { a: String, b: String },
    #[error("unification of two unions not supported")]
    UnionOfUnions,
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// `unify(e1, e2) -> substitution | error` (§4.D).
pub fn unify(e1: &Effect, e2: &Effect) -> Result<Substitution, UnifyError> {
    let s1 = simplify_effect(e1);
    let s2 = simplify_effect(e2);

    if print_effect(&s1) == print_effect(&s2) {
        return Ok(Substitution::empty());
    }

    match (&s1, &s2) {
        (Effect::Quantified(name), other) | (other, Effect::Quantified(name)) => {
            Ok(Substitution::bind_effect(name, other.clone())?)
        }
        (Effect::Arrow { .. }, Effect::Arrow { .. }) => unify_arrows(&s1, &s2),
        (Effect::Concrete(c1), Effect::Concrete(c2)) => unify_concrete(c1, c2),
        _ => Err(UnifyError::IncompatibleEffectKinds),
    }
}

/// The arrow-fixpoint canonicalization of §4.D.1: if a unary arrow's single
/// parameter prints equal to its result and is concrete, rename every
/// quantified name inside each component to a synthetic `#`-joined "hash"
/// variable, recording the renaming as a substitution. This lets a variadic
/// signature's self-referential `(x) -> x` template unify consistently
/// regardless of how many distinct quantified names its components
/// accumulated through tuple-unpacking at different call sites.
fn canonicalize_self_arrow(effect: &Effect) -> (Effect, Substitution) {
    let (params, result) = match effect.as_arrow() {
        Some((p, r)) if p.len() == 1 => (p, r),
        _ => return (effect.clone(), Substitution::empty()),
    };
    if print_effect(&params[0]) != print_effect(result) {
        return (effect.clone(), Substitution::empty());
    }
    let components = match &params[0] {
        Effect::Concrete(components) => components,
        _ => return (effect.clone(), Substitution::empty()),
    };

    let mut subst = Substitution::empty();
    let mut canonical = Vec::with_capacity(components.len());
    for c in components {
        let names = quantified_names_in(&c.variables);
        if names.is_empty() {
            canonical.push(c.clone());
            continue;
        }
        let hash_name = names.join("#");
        for n in &names {
            if n != &hash_name {
                let binding =
                    Substitution::bind_entity(n, Variables::Quantified(hash_name.clone()))
                        .expect("hash name is fresh, cannot occur in itself");
                subst = subst
                    .compose(&binding)
                    .expect("hash renaming never conflicts with itself");
            }
        }
        canonical.push(EffectComponent {
            kind: c.kind,
            variables: Variables::Quantified(hash_name),
        });
    }
    let canon_param = Effect::Concrete(canonical);
    let canon = Effect::Arrow {
        params: vec![canon_param.clone()],
        result: Box::new(canon_param),
    };
    (canon, subst)
}

/// Quantified names appearing in `vars`, in first-seen order, duplicates
/// removed. Concrete state-var names never contribute a hash component.
fn quantified_names_in(vars: &Variables) -> Vec<String> {
    let mut names = Vec::new();
    collect_quantified_names(vars, &mut names);
    names
}

fn collect_quantified_names(vars: &Variables, out: &mut Vec<String>) {
    match vars {
        Variables::Concrete(_) => {}
        Variables::Quantified(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Variables::Union(members) => {
            for m in members {
                collect_quantified_names(m, out);
            }
        }
    }
}

fn unify_arrows(e1: &Effect, e2: &Effect) -> Result<Substitution, UnifyError> {
    let (canon1, hash1) = canonicalize_self_arrow(e1);
    let (canon2, hash2) = canonicalize_self_arrow(e2);
    let mut subst = hash1.compose(&hash2)?;

    let (p1, r1) = canon1.as_arrow().expect("canonicalize preserves arrow shape");
    let (p2, r2) = canon2.as_arrow().expect("canonicalize preserves arrow shape");

    let (p1, p2) = if p1.len() == p2.len() {
        (p1.to_vec(), p2.to_vec())
    } else {
        tuple_unpack(p1, p2)?
    };

    for (a, b) in p1.iter().zip(p2.iter()) {
        let a = subst.apply_effect(a);
        let b = subst.apply_effect(b);
        let s = unify(&a, &b)?;
        subst = subst.compose(&s)?;
    }

    let r1 = subst.apply_effect(r1);
    let r2 = subst.apply_effect(r2);
    let s = unify(&r1, &r2)?;
    subst = subst.compose(&s)?;

    Ok(subst)
}

/// Arity-unpacking (§4.D "Tuple unpacking"). Succeeds only if the shorter
/// list has length 1 and its element is concrete; the longer list's
/// components are combined kind-wise into unions, standing in for the
/// missing parameters.
fn tuple_unpack(p1: &[Effect], p2: &[Effect]) -> Result<(Vec<Effect>, Vec<Effect>), UnifyError> {
    let mismatch = || UnifyError::ArityMismatch {
        expected: p1.len(),
        got: p2.len(),
    };
    if p1.len() == 1 && p2.len() != 1 {
        if !matches!(simplify_effect(&p1[0]), Effect::Concrete(_)) {
            return Err(mismatch());
        }
        let combined = combine_by_kind(p2).ok_or_else(mismatch)?;
        Ok((vec![p1[0].clone()], vec![combined]))
    } else if p2.len() == 1 && p1.len() != 1 {
        if !matches!(simplify_effect(&p2[0]), Effect::Concrete(_)) {
            return Err(mismatch());
        }
        let combined = combine_by_kind(p1).ok_or_else(mismatch)?;
        Ok((vec![combined], vec![p2[0].clone()]))
    } else {
        Err(mismatch())
    }
}

/// Combine a list of concrete effects into one, unioning each kind's
/// variable sets across the list. Used by tuple-unpacking and by variadic
/// propagate-style built-in signatures (`and`, `or`, `actionAll`, ...).
pub(crate) fn combine_by_kind(effects: &[Effect]) -> Option<Effect> {
    let mut by_kind: BTreeMap<Kind, Vec<Variables>> = BTreeMap::new();
    for e in effects {
        match simplify_effect(e) {
            Effect::Concrete(components) => {
                for c in components {
                    by_kind.entry(c.kind).or_default().push(c.variables);
                }
            }
            _ => return None,
        }
    }
    let components = by_kind
        .into_iter()
        .map(|(kind, vars)| EffectComponent {
            kind,
            variables: simplify_variables(&Variables::Union(vars)),
        })
        .collect();
    Some(simplify_effect(&Effect::Concrete(components)))
}

enum Interaction {
    Compatible,
    /// The component on the named side is dominated: nullify its variables.
    Dominates(Side),
}

#[derive(Clone, Copy)]
enum Side {
    A,
    B,
}

/// The kind interaction table of §4.D.2. Only ever called with `a != b`.
fn interaction(a: Kind, b: Kind) -> Interaction {
    use Kind::*;
    match (a, b) {
        (Read, Update) | (Update, Read) => Interaction::Compatible,
        (Read, Temporal) | (Temporal, Read) => Interaction::Compatible,
        (Update, Temporal) => Interaction::Dominates(Side::B),
        (Temporal, Update) => Interaction::Dominates(Side::A),
        (Read, Read) | (Update, Update) | (Temporal, Temporal) => {
            unreachable!("same-kind pairs handled separately by the caller")
        }
    }
}

fn unify_concrete(
    c1: &[EffectComponent],
    c2: &[EffectComponent],
) -> Result<Substitution, UnifyError> {
    let by_kind = |components: &[EffectComponent]| -> BTreeMap<Kind, Variables> {
        components
            .iter()
            .map(|c| (c.kind, c.variables.clone()))
            .collect()
    };
    let k1 = by_kind(c1);
    let k2 = by_kind(c2);

    let mut subst = Substitution::empty();

    for (&ka, va) in &k1 {
        for (&kb, vb) in &k2 {
            if ka == kb {
                let a = subst.apply_variables(va);
                let b = subst.apply_variables(vb);
                let s = unify_variables(&a, &b)?;
                subst = subst.compose(&s)?;
            } else {
                match interaction(ka, kb) {
                    Interaction::Compatible => {}
                    Interaction::Dominates(side) => {
                        let dominated = match side {
                            Side::A => va,
                            Side::B => vb,
                        };
                        let a = subst.apply_variables(dominated);
                        let s = unify_variables(&a, &Variables::empty())?;
                        subst = subst.compose(&s)?;
                    }
                }
            }
        }
    }

    for (&kind, vars) in k1.iter().chain(k2.iter()) {
        let present_in_both = k1.contains_key(&kind) && k2.contains_key(&kind);
        if present_in_both {
            continue;
        }
        let a = subst.apply_variables(vars);
        let s = unify_variables(&a, &Variables::empty())?;
        subst = subst.compose(&s)?;
    }

    Ok(subst)
}

/// Unifier for `Variables` (§4.D "Unifier for Variables").
pub fn unify_variables(a: &Variables, b: &Variables) -> Result<Substitution, UnifyError> {
    let a = simplify_variables(a);
    let b = simplify_variables(b);

    match (&a, &b) {
        (Variables::Concrete(va), Variables::Concrete(vb)) => {
            let mut na: Vec<&str> = va.iter().map(|s| s.name.as_str()).collect();
            let mut nb: Vec<&str> = vb.iter().map(|s| s.name.as_str()).collect();
            na.sort();
            nb.sort();
            if na == nb {
                Ok(Substitution::empty())
            } else {
                Err(UnifyError::VariableSetMismatch {
                    a: print_variables(&a),
                    b: print_variables(&b),
                })
            }
        }
        (Variables::Quantified(na), Variables::Quantified(nb)) if na == nb => {
            Ok(Substitution::empty())
        }
        (Variables::Quantified(name), other) | (other, Variables::Quantified(name)) => {
            Ok(Substitution::bind_entity(name, other.clone())?)
        }
        (Variables::Union(members), Variables::Concrete(_)) => {
            let mut subst = Substitution::empty();
            for m in members {
                let m = subst.apply_variables(m);
                let target = subst.apply_variables(&b);
                let s = unify_variables(&m, &target)?;
                subst = subst.compose(&s)?;
            }
            Ok(subst)
        }
        (Variables::Concrete(_), Variables::Union(_)) => unify_variables(&b, &a),
        (Variables::Union(_), Variables::Union(_)) => Err(UnifyError::UnionOfUnions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::StateVar;
    use crate::ir::DefId;

    fn sv(name: &str) -> StateVar {
        StateVar {
            name: name.to_string(),
            ref_id: DefId::from_raw(0),
        }
    }

    #[test]
    fn identical_pure_effects_unify_with_empty_substitution() {
        let s = unify(&Effect::pure(), &Effect::pure()).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn quantified_binds_to_concrete() {
        let s = unify(&Effect::Quantified("e0".into()), &Effect::read(sv("s"))).unwrap();
        assert_eq!(
            s.apply_effect(&Effect::Quantified("e0".into())),
            Effect::read(sv("s"))
        );
    }

    #[test]
    fn read_and_update_components_are_compatible_when_both_present() {
        // Read and Update are compatible where *both* effects carry both
        // kinds; the cross-kind pair requires no action and each same-kind
        // pair unifies normally.
        let a = Effect::Concrete(vec![
            EffectComponent {
                kind: Kind::Read,
                variables: Variables::Concrete(vec![sv("s")]),
            },
            EffectComponent {
                kind: Kind::Update,
                variables: Variables::Quantified("u".into()),
            },
        ]);
        let b = Effect::Concrete(vec![
            EffectComponent {
                kind: Kind::Read,
                variables: Variables::Concrete(vec![sv("s")]),
            },
            EffectComponent {
                kind: Kind::Update,
                variables: Variables::Concrete(vec![sv("t")]),
            },
        ]);
        let s = unify(&a, &b).unwrap();
        assert_eq!(
            s.apply_variables(&Variables::Quantified("u".into())),
            Variables::Concrete(vec![sv("t")])
        );
    }

    #[test]
    fn kind_present_in_only_one_side_must_nullify_or_fail() {
        // A concrete, nonempty variable set can never unify with the
        // empty set, so a Read-only effect can't unify with an
        // Update-only effect: Read is absent from the Update side and
        // nullifying a nonempty concrete set fails.
        let read_only = Effect::Concrete(vec![EffectComponent {
            kind: Kind::Read,
            variables: Variables::Concrete(vec![sv("s")]),
        }]);
        let update_only = Effect::Concrete(vec![EffectComponent {
            kind: Kind::Update,
            variables: Variables::Concrete(vec![sv("t")]),
        }]);
        assert!(unify(&read_only, &update_only).is_err());
    }

    #[test]
    fn update_dominates_temporal() {
        let update = Effect::Concrete(vec![EffectComponent {
            kind: Kind::Update,
            variables: Variables::Concrete(vec![sv("s")]),
        }]);
        let temporal = Effect::Concrete(vec![EffectComponent {
            kind: Kind::Temporal,
            variables: Variables::Quantified("v0".into()),
        }]);
        let s = unify(&update, &temporal).unwrap();
        assert_eq!(
            s.apply_variables(&Variables::Quantified("v0".into())),
            Variables::Concrete(vec![])
        );
    }

    #[test]
    fn variable_set_mismatch_fails() {
        let a = Variables::Concrete(vec![sv("s")]);
        let b = Variables::Concrete(vec![sv("t")]);
        assert!(matches!(
            unify_variables(&a, &b),
            Err(UnifyError::VariableSetMismatch { .. })
        ));
    }

    #[test]
    fn union_of_unions_is_unsupported() {
        let a = Variables::Union(vec![
            Variables::Quantified("a".into()),
            Variables::Quantified("b".into()),
        ]);
        let b = Variables::Union(vec![
            Variables::Quantified("c".into()),
            Variables::Quantified("d".into()),
        ]);
        assert!(matches!(unify_variables(&a, &b), Err(UnifyError::UnionOfUnions)));
    }

    #[test]
    fn occurs_check_propagates_as_unify_error() {
        let cyclic = Effect::Arrow {
            params: vec![Effect::Quantified("e0".into())],
            result: Box::new(Effect::pure()),
        };
        assert!(matches!(
            unify(&Effect::Quantified("e0".into()), &cyclic),
            Err(UnifyError::Bind(BindError::Cyclic { .. }))
        ));
    }

    #[test]
    fn tuple_unpacking_combines_longer_list_by_kind() {
        let signature = Effect::Arrow {
            params: vec![Effect::Quantified("x".into())],
            result: Box::new(Effect::Quantified("x".into())),
        };
        let actual = Effect::Arrow {
            params: vec![Effect::read(sv("s")), Effect::update(sv("t"))],
            result: Box::new(Effect::Quantified("r".into())),
        };
        let s = unify(&signature, &actual).unwrap();
        let result = s.apply_effect(&Effect::Quantified("r".into()));
        let result = simplify_effect(&result);
        assert_eq!(print_effect(&result), "[Read{s}, Update{t}]");
    }

    #[test]
    fn unification_is_symmetric_up_to_names() {
        let a = Effect::Quantified("e0".into());
        let b = Effect::read(sv("s"));
        let forward = unify(&a, &b).unwrap();
        let backward = unify(&b, &a).unwrap();
        assert_eq!(
            forward.apply_effect(&a),
            backward.apply_effect(&a)
        );
    }
}
