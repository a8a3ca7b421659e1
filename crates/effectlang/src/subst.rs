//! Substitution algebra (§4.B): ordered bindings over two disjoint kinds of
//! name, with `apply`, `compose` and occurs-checked `bind`.

use crate::effect::{free_entity_vars_in_variables, free_effect_vars, Effect, EffectComponent, Variables};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NameKind {
    EffectVar,
    EntityVar,
}

#[derive(Clone, PartialEq, Debug)]
pub enum BindingValue {
    Effect(Effect),
    Variables(Variables),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Binding {
    pub kind: NameKind,
    pub name: String,
    pub value: BindingValue,
}

#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum BindError {
    #[error("cyclical binding: {name} occurs in its own value")]
    Cyclic { name: String },
    #[error("inconsistent substitution for {name}")]
    Inconsistent { name: String },
}

/// An ordered sequence of bindings (§4.B). Ordering matters only during
/// `compose`: a binding added later was built after seeing the effect of
/// every earlier one.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Substitution {
    bindings: Vec<Binding>,
}

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn singleton(kind: NameKind, name: String, value: BindingValue) -> Self {
        Substitution {
            bindings: vec![Binding { kind, name, value }],
        }
    }

    /// `bind(name, value)` for an effect-level name, after occurs-check
    /// (Invariant 5).
    pub fn bind_effect(name: &str, value: Effect) -> Result<Substitution, BindError> {
        if let Effect::Quantified(other) = &value {
            if other == name {
                return Ok(Substitution::empty());
            }
        }
        if free_effect_vars(&value).contains(name) {
            return Err(BindError::Cyclic {
                name: name.to_string(),
            });
        }
        Ok(Substitution::singleton(
            NameKind::EffectVar,
            name.to_string(),
            BindingValue::Effect(value),
        ))
    }

    /// `bind(name, value)` for an entity-level (variable-set) name.
    pub fn bind_entity(name: &str, value: Variables) -> Result<Substitution, BindError> {
        if let Variables::Quantified(other) = &value {
            if other == name {
                return Ok(Substitution::empty());
            }
        }
        if free_entity_vars_in_variables(&value).contains(name) {
            return Err(BindError::Cyclic {
                name: name.to_string(),
            });
        }
        Ok(Substitution::singleton(
            NameKind::EntityVar,
            name.to_string(),
            BindingValue::Variables(value),
        ))
    }

    /// Substitute every bound name in `effect` simultaneously.
    pub fn apply_effect(&self, effect: &Effect) -> Effect {
        match effect {
            Effect::Concrete(components) => Effect::Concrete(
                components
                    .iter()
                    .map(|c| EffectComponent {
                        kind: c.kind,
                        variables: self.apply_variables(&c.variables),
                    })
                    .collect(),
            ),
            Effect::Arrow { params, result } => Effect::Arrow {
                params: params.iter().map(|p| self.apply_effect(p)).collect(),
                result: Box::new(self.apply_effect(result)),
            },
            Effect::Quantified(name) => self
                .bindings
                .iter()
                .find(|b| b.kind == NameKind::EffectVar && &b.name == name)
                .map(|b| match &b.value {
                    BindingValue::Effect(e) => e.clone(),
                    BindingValue::Variables(_) => {
                        unreachable!("effect-var binding holding a Variables value")
                    }
                })
                .unwrap_or_else(|| effect.clone()),
        }
    }

    /// Substitute every bound name in `vars` simultaneously.
    pub fn apply_variables(&self, vars: &Variables) -> Variables {
        match vars {
            Variables::Concrete(_) => vars.clone(),
            Variables::Union(members) => {
                Variables::Union(members.iter().map(|m| self.apply_variables(m)).collect())
            }
            Variables::Quantified(name) => self
                .bindings
                .iter()
                .find(|b| b.kind == NameKind::EntityVar && &b.name == name)
                .map(|b| match &b.value {
                    BindingValue::Variables(v) => v.clone(),
                    BindingValue::Effect(_) => {
                        unreachable!("entity-var binding holding an Effect value")
                    }
                })
                .unwrap_or_else(|| vars.clone()),
        }
    }

    fn apply_to_binding(&self, b: &Binding) -> Binding {
        Binding {
            kind: b.kind,
            name: b.name.clone(),
            value: match &b.value {
                BindingValue::Effect(e) => BindingValue::Effect(self.apply_effect(e)),
                BindingValue::Variables(v) => BindingValue::Variables(self.apply_variables(v)),
            },
        }
    }

    /// `compose(self, other)`: apply `self` to every value in `other`, then
    /// concatenate, deduplicating by `(kind, name)` with first occurrence
    /// winning. Fails if that would re-bind a name to an inconsistent value.
    pub fn compose(&self, other: &Substitution) -> Result<Substitution, BindError> {
        let mut bindings = self.bindings.clone();
        for raw in &other.bindings {
            let applied = self.apply_to_binding(raw);
            match bindings
                .iter()
                .find(|b| b.kind == applied.kind && b.name == applied.name)
            {
                Some(existing) => {
                    if existing.value != applied.value {
                        return Err(BindError::Inconsistent {
                            name: applied.name.clone(),
                        });
                    }
                }
                None => bindings.push(applied),
            }
        }
        Ok(Substitution { bindings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DefId;

    fn sv(name: &str) -> crate::effect::StateVar {
        crate::effect::StateVar {
            name: name.to_string(),
            ref_id: DefId::from_raw(0),
        }
    }

    #[test]
    fn apply_substitutes_quantified_effect_var() {
        let s = Substitution::bind_effect("e0", Effect::pure()).unwrap();
        assert_eq!(s.apply_effect(&Effect::Quantified("e0".into())), Effect::pure());
    }

    #[test]
    fn apply_leaves_unbound_names_untouched() {
        let s = Substitution::bind_effect("e0", Effect::pure()).unwrap();
        assert_eq!(
            s.apply_effect(&Effect::Quantified("e1".into())),
            Effect::Quantified("e1".into())
        );
    }

    #[test]
    fn occurs_check_rejects_self_reference() {
        let cyclic = Effect::Arrow {
            params: vec![Effect::Quantified("e0".into())],
            result: Box::new(Effect::pure()),
        };
        let err = Substitution::bind_effect("e0", cyclic).unwrap_err();
        assert_eq!(err, BindError::Cyclic { name: "e0".into() });
    }

    #[test]
    fn occurs_check_allows_trivial_self_binding() {
        let s = Substitution::bind_effect("e0", Effect::Quantified("e0".into())).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn entity_occurs_check_rejects_self_reference() {
        let cyclic = Variables::Union(vec![Variables::Quantified("v0".into())]);
        let err = Substitution::bind_entity("v0", cyclic).unwrap_err();
        assert_eq!(err, BindError::Cyclic { name: "v0".into() });
    }

    #[test]
    fn compose_later_binding_sees_earlier_result() {
        let s1 = Substitution::bind_effect("e0", Effect::read(sv("s"))).unwrap();
        let s2 = Substitution::bind_effect("e1", Effect::Quantified("e0".into())).unwrap();
        let composed = s1.compose(&s2).unwrap();
        assert_eq!(
            composed.apply_effect(&Effect::Quantified("e1".into())),
            Effect::read(sv("s"))
        );
    }

    #[test]
    fn compose_rejects_inconsistent_rebinding() {
        let s1 = Substitution::bind_effect("e0", Effect::read(sv("s"))).unwrap();
        let s2 = Substitution::bind_effect("e0", Effect::read(sv("t"))).unwrap();
        assert!(s1.compose(&s2).is_err());
    }

    #[test]
    fn compose_allows_consistent_rebinding() {
        let s1 = Substitution::bind_effect("e0", Effect::read(sv("s"))).unwrap();
        let s2 = Substitution::bind_effect("e0", Effect::read(sv("s"))).unwrap();
        assert!(s1.compose(&s2).is_ok());
    }

    #[test]
    fn apply_idempotent_after_composition() {
        let s1 = Substitution::bind_effect("e0", Effect::read(sv("s"))).unwrap();
        let s2 = Substitution::bind_effect("e1", Effect::Quantified("e0".into())).unwrap();
        let s = s1.compose(&s2).unwrap();
        let e = Effect::Quantified("e1".into());
        let once = s.apply_effect(&e);
        let twice = s.apply_effect(&once);
        assert_eq!(once, twice);
    }
}
