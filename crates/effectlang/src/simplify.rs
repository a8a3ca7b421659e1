//! Simplification and canonical printing (§4.C).

use crate::effect::{Effect, EffectComponent, Kind, Variables};
use std::collections::BTreeMap;

/// Rewrite an effect into canonical form: merge duplicate same-kind
/// components within a concrete effect, and simplify each component's
/// variable set. Arrow structure itself is never flattened.
pub fn simplify_effect(effect: &Effect) -> Effect {
    match effect {
        Effect::Quantified(name) => Effect::Quantified(name.clone()),
        Effect::Arrow { params, result } => Effect::Arrow {
            params: params.iter().map(simplify_effect).collect(),
            result: Box::new(simplify_effect(result)),
        },
        Effect::Concrete(components) => {
            let mut by_kind: BTreeMap<Kind, Vec<Variables>> = BTreeMap::new();
            for c in components {
                by_kind
                    .entry(c.kind)
                    .or_default()
                    .push(simplify_variables(&c.variables));
            }
            let merged: Vec<EffectComponent> = Kind::ALL
                .into_iter()
                .filter_map(|kind| {
                    let vars = by_kind.remove(&kind)?;
                    let combined = if vars.len() == 1 {
                        vars.into_iter().next().unwrap()
                    } else {
                        simplify_variables(&Variables::Union(vars))
                    };
                    Some(EffectComponent {
                        kind,
                        variables: combined,
                    })
                })
                .collect();
            Effect::Concrete(merged)
        }
    }
}

/// `flatten_unions` plus the empty/singleton canonicalization of
/// Invariant 4.
pub fn simplify_variables(vars: &Variables) -> Variables {
    match flatten_unions(vars) {
        Variables::Union(members) if members.is_empty() => Variables::Concrete(Vec::new()),
        Variables::Union(mut members) if members.len() == 1 => members.remove(0),
        other => other,
    }
}

fn flatten_unions(vars: &Variables) -> Variables {
    match vars {
        Variables::Concrete(names) => {
            let mut sorted = names.clone();
            sorted.sort();
            sorted.dedup_by(|a, b| a.name == b.name);
            Variables::Concrete(sorted)
        }
        Variables::Quantified(name) => Variables::Quantified(name.clone()),
        Variables::Union(members) => {
            let mut flat = Vec::new();
            for m in members {
                match flatten_unions(m) {
                    Variables::Union(inner) => flat.extend(inner),
                    Variables::Concrete(names) if names.is_empty() => {}
                    other => flat.push(other),
                }
            }
            let mut dedup: Vec<Variables> = Vec::new();
            for v in flat {
                if !dedup.contains(&v) {
                    dedup.push(v);
                }
            }
            Variables::Union(dedup)
        }
    }
}

/// The canonical stable string form used as a fast-equality short-circuit
/// during unification (§4.C). Component kinds print in Read/Update/Temporal
/// order; variable names print state-vars lexicographically, then
/// quantified names lexicographically.
pub fn print_effect(effect: &Effect) -> String {
    match effect {
        Effect::Quantified(name) => format!("?{name}"),
        Effect::Arrow { params, result } => {
            let ps: Vec<String> = params.iter().map(print_effect).collect();
            format!("({}) -> {}", ps.join(", "), print_effect(result))
        }
        Effect::Concrete(components) => {
            let mut sorted = components.clone();
            sorted.sort_by_key(|c| c.kind);
            let parts: Vec<String> = sorted
                .iter()
                .map(|c| format!("{}{}", c.kind.as_str(), print_variables(&c.variables)))
                .collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

pub fn print_variables(vars: &Variables) -> String {
    match vars {
        Variables::Concrete(names) => {
            let mut ns: Vec<&str> = names.iter().map(|s| s.name.as_str()).collect();
            ns.sort();
            format!("{{{}}}", ns.join(","))
        }
        Variables::Quantified(name) => format!("?{name}"),
        Variables::Union(members) => {
            // Sort the members themselves, not their rendered strings --
            // `{a}` sorts after `?z` as text (ASCII `{` > `?`), which would
            // put quantified names before state-var groups. Two-level key:
            // concrete groups first, then quantified names, each
            // lexicographic within its own group.
            let mut rendered: Vec<(u8, String)> = members
                .iter()
                .map(|m| (union_sort_key(m), print_variables(m)))
                .collect();
            rendered.sort();
            let parts: Vec<String> = rendered.into_iter().map(|(_, s)| s).collect();
            format!("({})", parts.join(" | "))
        }
    }
}

/// Sort key for a `Union` member: concrete (state-var) groups before
/// quantified names, per the fixed print order above.
fn union_sort_key(vars: &Variables) -> u8 {
    match vars {
        Variables::Concrete(_) => 0,
        Variables::Quantified(_) | Variables::Union(_) => 1,
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
    fn merges_duplicate_same_kind_components() {
        let e = Effect::Concrete(vec![
            EffectComponent {
                kind: Kind::Read,
                variables: Variables::Concrete(vec![sv("s")]),
            },
            EffectComponent {
                kind: Kind::Read,
                variables: Variables::Concrete(vec![sv("t")]),
            },
        ]);
        let simplified = simplify_effect(&e);
        match simplified {
            Effect::Concrete(components) => {
                assert_eq!(components.len(), 1);
                assert_eq!(print_variables(&components[0].variables), "{s,t}");
            }
            _ => panic!("expected concrete effect"),
        }
    }

    #[test]
    fn flatten_unions_drops_empty_members_and_dedups() {
        let v = Variables::Union(vec![
            Variables::Concrete(vec![]),
            Variables::Quantified("a".into()),
            Variables::Quantified("a".into()),
        ]);
        assert_eq!(simplify_variables(&v), Variables::Quantified("a".into()));
    }

    #[test]
    fn union_of_nothing_becomes_empty_concrete() {
        let v = Variables::Union(vec![Variables::Concrete(vec![])]);
        assert_eq!(simplify_variables(&v), Variables::Concrete(vec![]));
    }

    #[test]
    fn print_orders_kinds_read_update_temporal() {
        let e = Effect::Concrete(vec![
            EffectComponent {
                kind: Kind::Temporal,
                variables: Variables::Concrete(vec![sv("s")]),
            },
            EffectComponent {
                kind: Kind::Read,
                variables: Variables::Concrete(vec![sv("t")]),
            },
        ]);
        assert_eq!(print_effect(&e), "[Read{t}, Temporal{s}]");
    }

    #[test]
    fn print_orders_variable_names_lexicographically() {
        let v = Variables::Concrete(vec![sv("b"), sv("a")]);
        assert_eq!(print_variables(&v), "{a,b}");
    }

    #[test]
    fn print_orders_concrete_members_before_quantified_in_a_union() {
        let v = Variables::Union(vec![
            Variables::Quantified("z".into()),
            Variables::Concrete(vec![sv("a")]),
        ]);
        assert_eq!(print_variables(&v), "({a} | ?z)");
    }

    #[test]
    fn canonical_print_equal_for_structurally_equal_arrows() {
        let a = Effect::Arrow {
            params: vec![Effect::read(sv("s"))],
            result: Box::new(Effect::pure()),
        };
        let b = Effect::Arrow {
            params: vec![Effect::read(sv("s"))],
            result: Box::new(Effect::pure()),
        };
        assert_eq!(print_effect(&simplify_effect(&a)), print_effect(&simplify_effect(&b)));
    }
}
