//! The effect algebra (§3): `Effect`, `EffectComponent`, `Variables`,
//! `StateVar` and `EffectScheme`.

use crate::ir::DefId;
use std::collections::BTreeSet;

/// A mutable state variable declared at module scope (`var x : T`).
///
/// Two state variables compare equal iff their names are equal; `ref_id`
/// is carried only for diagnostics, never for comparison (§3).
#[derive(Clone, Debug)]
pub struct StateVar {
    pub name: String,
    pub ref_id: DefId,
}

impl PartialEq for StateVar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for StateVar {}

impl PartialOrd for StateVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for StateVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Kind {
    Read,
    Update,
    Temporal,
}

impl Kind {
    /// All kinds in the printing / iteration order fixed by §4.C.
    pub const ALL: [Kind; 3] = [Kind::Read, Kind::Update, Kind::Temporal];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Read => "Read",
            Kind::Update => "Update",
            Kind::Temporal => "Temporal",
        }
    }
}

/// A set of state-variable names, possibly quantified or a union of sets
/// awaiting simplification.
#[derive(Clone, PartialEq, Debug)]
pub enum Variables {
    Concrete(Vec<StateVar>),
    Quantified(String),
    Union(Vec<Variables>),
}

impl Variables {
    pub fn empty() -> Self {
        Variables::Concrete(Vec::new())
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct EffectComponent {
    pub kind: Kind,
    pub variables: Variables,
}

/// The central object of the core (§3).
#[derive(Clone, PartialEq, Debug)]
pub enum Effect {
    Concrete(Vec<EffectComponent>),
    Arrow {
        params: Vec<Effect>,
        result: Box<Effect>,
    },
    Quantified(String),
}

impl Effect {
    pub fn pure() -> Self {
        Effect::Concrete(Vec::new())
    }

    pub fn read(var: StateVar) -> Self {
        Effect::Concrete(vec![EffectComponent {
            kind: Kind::Read,
            variables: Variables::Concrete(vec![var]),
        }])
    }

    pub fn update(var: StateVar) -> Self {
        Effect::Concrete(vec![EffectComponent {
            kind: Kind::Update,
            variables: Variables::Concrete(vec![var]),
        }])
    }

    pub fn as_arrow(&self) -> Option<(&[Effect], &Effect)> {
        match self {
            Effect::Arrow { params, result } => Some((params, result)),
            _ => None,
        }
    }
}

/// A universally-quantified effect: the storage form of an inference
/// result (§3 "Scheme").
#[derive(Clone, PartialEq, Debug)]
pub struct EffectScheme {
    pub effect_vars: BTreeSet<String>,
    pub entity_vars: BTreeSet<String>,
    pub effect: Effect,
}

impl EffectScheme {
    /// A scheme with no quantified names -- the common case for literals,
    /// consts, and any fully concrete result.
    pub fn monomorphic(effect: Effect) -> Self {
        EffectScheme {
            effect_vars: BTreeSet::new(),
            entity_vars: BTreeSet::new(),
            effect,
        }
    }
}

/// Free effect-level quantified names occurring in `effect` (Invariant 2:
/// these live in a namespace disjoint from entity-level names).
pub fn free_effect_vars(effect: &Effect) -> BTreeSet<String> {
    match effect {
        Effect::Quantified(name) => {
            let mut set = BTreeSet::new();
            set.insert(name.clone());
            set
        }
        Effect::Concrete(_) => BTreeSet::new(),
        Effect::Arrow { params, result } => {
            let mut set = free_effect_vars(result);
            for p in params {
                set.extend(free_effect_vars(p));
            }
            set
        }
    }
}

/// Free entity-level (variable-set) quantified names occurring in `effect`.
pub fn free_entity_vars(effect: &Effect) -> BTreeSet<String> {
    match effect {
        Effect::Quantified(_) => BTreeSet::new(),
        Effect::Concrete(components) => {
            let mut set = BTreeSet::new();
            for c in components {
                set.extend(free_entity_vars_in_variables(&c.variables));
            }
            set
        }
        Effect::Arrow { params, result } => {
            let mut set = free_entity_vars(result);
            for p in params {
                set.extend(free_entity_vars(p));
            }
            set
        }
    }
}

pub fn free_entity_vars_in_variables(vars: &Variables) -> BTreeSet<String> {
    match vars {
        Variables::Concrete(_) => BTreeSet::new(),
        Variables::Quantified(name) => {
            let mut set = BTreeSet::new();
            set.insert(name.clone());
            set
        }
        Variables::Union(members) => {
            let mut set = BTreeSet::new();
            for m in members {
                set.extend(free_entity_vars_in_variables(m));
            }
            set
        }
    }
}
