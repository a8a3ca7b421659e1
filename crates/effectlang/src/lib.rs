//! Effect inference engine and unification kernel over an IR of
//! modules/definitions/expressions.
//!
//! The pipeline is: build an `Ir` (typically from a parser external to this
//! crate), build a `ScopeTree` over it (`scope::build_module_scope`), then
//! run `infer::infer_module` to get a scheme for every expression id and
//! every operator definition.

pub mod effect;
pub mod error;
pub mod infer;
pub mod ir;
pub mod scope;
pub mod signature;
pub mod simplify;
pub mod subst;
pub mod unify;

pub use effect::{
    free_effect_vars, free_entity_vars, free_entity_vars_in_variables, Effect, EffectComponent,
    EffectScheme, Kind, StateVar, Variables,
};
pub use error::{Error, InferError};
pub use infer::{infer_module, InferenceLimits, InferenceResult};
pub use ir::{
    DefKind, Definition, ExprId, ExprNode, Expression, Ir, Module, ModuleId, OpQualifier, Position,
    ScopeId, SourceSpan, TypeTag, Visibility,
};
pub use scope::{
    build_module_scope, Binding, BindingKind, LookupFacility, LookupResult, ScopeTree,
};
pub use signature::builtin_scheme;
pub use simplify::{print_effect, print_variables, simplify_effect, simplify_variables};
pub use subst::{BindError, Substitution};
pub use unify::{unify, unify_variables, UnifyError};
