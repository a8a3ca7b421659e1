//! The inferrer (§4.E): the post-order driver that walks the IR and fills
//! in an effect scheme for every expression id and every operator
//! definition, recording per-id errors rather than aborting on them.
//!
//! `assign` is special-cased here rather than in the signature table
//! (`crate::signature`): its effect depends on which state variable its
//! first argument names, information a pure name/arity signature lookup
//! can't see. The iterator/quantifier built-ins (`map`/`filter`/`forall`/
//! `exists`/`fold`) are special-cased here too, for the same reason as
//! `assign`: their first argument's arrow shape has to be unified against a
//! fresh element variable and combined with the remaining arguments, not
//! looked up as a flat name/arity signature.

use crate::effect::{Effect, EffectScheme, StateVar, Variables};
use crate::error::{Error, InferError};
use crate::ir::{DefId, DefKind, ExprId, Expression, Ir, ModuleId};
use crate::scope::{BindingKind, LookupFacility, LookupResult};
use crate::signature::{builtin_scheme, is_iterator_op};
use crate::subst::Substitution;
use crate::unify::{combine_by_kind, unify};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Resource limits on a single inference run (ambient configuration, not
/// part of the effect algebra itself).
#[derive(Clone, Copy, Debug)]
pub struct InferenceLimits {
    /// Recursion ceiling for the post-order walk; exceeding it is a fatal
    /// engine fault (`InferError::RecursionLimitExceeded`), distinct from
    /// the per-id errors collected in `InferenceResult::errors`.
    pub max_recursion_depth: usize,
}

impl Default for InferenceLimits {
    fn default() -> Self {
        InferenceLimits {
            max_recursion_depth: 512,
        }
    }
}

/// The outcome of inferring one module: a scheme for every expression id
/// that was reached, a scheme for every operator definition (the table
/// other modules' calls are resolved against), and any per-id errors.
///
/// Sibling isolation (§7): an id appears in exactly one of `schemes`/
/// `errors`, never both, and never neither -- a definition whose body
/// failed has no entry in `def_schemes` either.
#[derive(Clone, Debug, Default)]
pub struct InferenceResult {
    pub schemes: IndexMap<ExprId, EffectScheme>,
    pub def_schemes: IndexMap<DefId, EffectScheme>,
    pub errors: IndexMap<ExprId, Error>,
}

/// Run effect inference over every definition of `module`, in dependency
/// order (§5: deterministic, and independent of which sibling definition
/// happens to be declared first -- a definition referencing a later
/// sibling must still resolve).
pub fn infer_module(
    ir: &Ir,
    module: ModuleId,
    scopes: &dyn LookupFacility,
    limits: InferenceLimits,
) -> Result<InferenceResult, InferError> {
    let mut inferrer = Inferrer::new(ir, scopes, limits);
    let defs = ir.module(module).definitions.clone();
    for def_id in dependency_order(ir, scopes, &defs) {
        inferrer.infer_definition(def_id, 0)?;
    }
    Ok(InferenceResult {
        schemes: inferrer.schemes,
        def_schemes: inferrer.def_schemes,
        errors: inferrer.errors,
    })
}

/// Orders `defs` so that a definition is processed only after every other
/// member of `defs` it refers to by name (§5). Mutually-recursive
/// definitions (an SCC with more than one member) keep their original
/// relative order within the group -- a real forward reference *inside* a
/// recursive group can't be resolved by reordering, that's orthogonal to
/// the plain sibling-forward-reference case this exists for.
fn dependency_order(ir: &Ir, scopes: &dyn LookupFacility, defs: &[DefId]) -> Vec<DefId> {
    let known: HashSet<DefId> = defs.iter().copied().collect();
    let mut finder = SccFinder {
        ir,
        scopes,
        known,
        index: 0,
        stack: Vec::new(),
        on_stack: HashSet::new(),
        indices: HashMap::new(),
        lowlinks: HashMap::new(),
        sccs: Vec::new(),
    };
    for &def_id in defs {
        if !finder.indices.contains_key(&def_id) {
            finder.strongconnect(def_id);
        }
    }
    finder.sccs.into_iter().flatten().collect()
}

/// Tarjan's strongly-connected-components algorithm over the "refers to"
/// relation between a module's definitions.
struct SccFinder<'a> {
    ir: &'a Ir,
    scopes: &'a dyn LookupFacility,
    known: HashSet<DefId>,
    index: usize,
    stack: Vec<DefId>,
    on_stack: HashSet<DefId>,
    indices: HashMap<DefId, usize>,
    lowlinks: HashMap<DefId, usize>,
    /// Completed SCCs, in the order they close -- which is reverse
    /// topological order: a leaf (no unresolved dependencies) closes before
    /// anything that depends on it, exactly the order `infer_module` needs.
    sccs: Vec<Vec<DefId>>,
}

impl<'a> SccFinder<'a> {
    fn strongconnect(&mut self, def_id: DefId) {
        self.indices.insert(def_id, self.index);
        self.lowlinks.insert(def_id, self.index);
        self.index += 1;
        self.stack.push(def_id);
        self.on_stack.insert(def_id);

        let mut refs = Vec::new();
        if let Some(body) = self.ir.def(def_id).body() {
            collect_def_refs(self.ir, self.scopes, body, &self.known, &mut refs);
        }
        for r in refs {
            if !self.indices.contains_key(&r) {
                self.strongconnect(r);
                let rl = self.lowlinks[&r];
                let ml = self.lowlinks.get_mut(&def_id).unwrap();
                *ml = (*ml).min(rl);
            } else if self.on_stack.contains(&r) {
                let ri = self.indices[&r];
                let ml = self.lowlinks.get_mut(&def_id).unwrap();
                *ml = (*ml).min(ri);
            }
        }

        if self.lowlinks[&def_id] == self.indices[&def_id] {
            let mut scc = Vec::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.remove(&w);
                scc.push(w);
                if w == def_id {
                    break;
                }
            }
            self.sccs.push(scc);
        }
    }
}

/// Collects every definition id in `known` that `body` refers to
/// (transitively, through the whole expression tree under it) via a
/// `NameRef` resolving to a `Val`/`Def` binding. A name resolving outside
/// `known` (an extended module, a var, a param) contributes no edge.
fn collect_def_refs(
    ir: &Ir,
    scopes: &dyn LookupFacility,
    body: ExprId,
    known: &HashSet<DefId>,
    out: &mut Vec<DefId>,
) {
    let node = ir.expr(body);
    if let Expression::NameRef(name) = &node.expr {
        if let LookupResult::Found(binding) = scopes.lookup(name, node.scope_id) {
            if matches!(binding.kind, BindingKind::Val | BindingKind::Def) {
                if let Some(d) = binding.def_id {
                    if known.contains(&d) && !out.contains(&d) {
                        out.push(d);
                    }
                }
            }
        }
    }
    for child in ir.children_of(body) {
        collect_def_refs(ir, scopes, child, known, out);
    }
}

struct Inferrer<'a> {
    ir: &'a Ir,
    scopes: &'a dyn LookupFacility,
    limits: InferenceLimits,
    substitution: Substitution,
    next_effect_var: u64,
    next_entity_var: u64,
    /// Memoizes the quantified effect-var name standing in for an opdef
    /// parameter, so two occurrences of the same parameter inside its own
    /// body share one name (and so the definition's own signature, built
    /// after its body is inferred, can refer back to them).
    opdef_param_vars: HashMap<(DefId, String), String>,
    /// One frame per lambda currently being descended into, mapping each of
    /// its parameter names to the single fresh effect var standing in for
    /// it -- the lambda analogue of `opdef_param_vars`, scoped to one
    /// lambda node (and its nested lambdas) instead of a stable `DefId`,
    /// since lambda params carry none (§4.A).
    lambda_param_stack: Vec<HashMap<String, String>>,
    schemes: IndexMap<ExprId, EffectScheme>,
    def_schemes: IndexMap<DefId, EffectScheme>,
    errors: IndexMap<ExprId, Error>,
}

impl<'a> Inferrer<'a> {
    fn new(ir: &'a Ir, scopes: &'a dyn LookupFacility, limits: InferenceLimits) -> Self {
        Inferrer {
            ir,
            scopes,
            limits,
            substitution: Substitution::empty(),
            next_effect_var: 0,
            next_entity_var: 0,
            opdef_param_vars: HashMap::new(),
            lambda_param_stack: Vec::new(),
            schemes: IndexMap::new(),
            def_schemes: IndexMap::new(),
            errors: IndexMap::new(),
        }
    }

    /// Fresh effect-level names use the `e` prefix, entity-level names use
    /// `v`; the disjoint prefixes trivially satisfy the disjoint-namespace
    /// requirement between the two kinds of quantified name (§3).
    fn fresh_effect_var(&mut self) -> String {
        let n = self.next_effect_var;
        self.next_effect_var += 1;
        format!("e{n}")
    }

    fn fresh_entity_var(&mut self) -> String {
        let n = self.next_entity_var;
        self.next_entity_var += 1;
        format!("v{n}")
    }

    fn opdef_param_var(&mut self, def_id: DefId, name: &str) -> String {
        let key = (def_id, name.to_string());
        if let Some(existing) = self.opdef_param_vars.get(&key) {
            existing.clone()
        } else {
            let fresh = self.fresh_effect_var();
            self.opdef_param_vars.insert(key, fresh.clone());
            fresh
        }
    }

    /// Replace every quantified name in `scheme` with a fresh one, giving
    /// an `Effect` ready to unify against a specific call site.
    fn instantiate(&mut self, scheme: &EffectScheme) -> Effect {
        let mut subst = Substitution::empty();
        for name in &scheme.effect_vars {
            let fresh = self.fresh_effect_var();
            let binding = Substitution::bind_effect(name, Effect::Quantified(fresh))
                .expect("a fresh name cannot occur in its own binding");
            subst = subst
                .compose(&binding)
                .expect("fresh instantiation names never collide with each other");
        }
        for name in &scheme.entity_vars {
            let fresh = self.fresh_entity_var();
            let binding = Substitution::bind_entity(name, Variables::Quantified(fresh))
                .expect("a fresh name cannot occur in its own binding");
            subst = subst
                .compose(&binding)
                .expect("fresh instantiation names never collide with each other");
        }
        subst.apply_effect(&scheme.effect)
    }

    /// Quantify over every free name remaining in `effect`. This is the
    /// generalization half of instantiate/generalize (§3 "Scheme"); every
    /// stored scheme in this crate is built this way.
    fn generalize(&self, effect: &Effect) -> EffectScheme {
        EffectScheme {
            effect_vars: crate::effect::free_effect_vars(effect),
            entity_vars: crate::effect::free_entity_vars(effect),
            effect: effect.clone(),
        }
    }

    fn record_error(&mut self, id: ExprId, location: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(id, Error::new(location, message));
    }

    fn scheme_of(&self, id: ExprId) -> EffectScheme {
        self.schemes
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("infer: no scheme recorded for {id:?} (post-order invariant violated)"))
    }

    fn infer_definition(&mut self, def_id: DefId, depth: usize) -> Result<(), InferError> {
        let def = self.ir.def(def_id).clone();
        match &def.kind {
            DefKind::Opdef { params, body, .. } => {
                self.infer_expr(*body, depth + 1)?;
                if let Some(body_scheme) = self.schemes.get(body).cloned() {
                    let signature = if params.is_empty() {
                        // A zero-arity opdef is referenced as a plain value
                        // (§4.E), so its signature is its body's scheme as-is.
                        body_scheme
                    } else {
                        let param_effects: Vec<Effect> = params
                            .iter()
                            .map(|p| Effect::Quantified(self.opdef_param_var(def_id, p)))
                            .collect();
                        self.generalize(&Effect::Arrow {
                            params: param_effects,
                            result: Box::new(body_scheme.effect),
                        })
                    };
                    self.def_schemes.insert(def_id, signature);
                }
                // else: the body failed to infer (sibling isolation, §7) --
                // no signature is recorded for this definition either.
            }
            DefKind::Assume { condition } => {
                self.infer_expr(*condition, depth + 1)?;
            }
            DefKind::Const
            | DefKind::Var
            | DefKind::Typedef
            | DefKind::Import
            | DefKind::NestedModule(_)
            | DefKind::Instance => {}
        }
        Ok(())
    }

    fn infer_expr(&mut self, id: ExprId, depth: usize) -> Result<(), InferError> {
        if depth > self.limits.max_recursion_depth {
            return Err(InferError::RecursionLimitExceeded {
                limit: self.limits.max_recursion_depth,
            });
        }
        if !self.ir.expressions.contains_key(&id) {
            return Err(InferError::DanglingExprId(id));
        }

        let node = self.ir.expr(id).clone();
        let children = self.ir.children_of(id);

        // A lambda's parameters get one shared quantified var per name for
        // the whole body, pushed before descending so every occurrence
        // inside sees the same name -- the lambda analogue of
        // `opdef_param_var`, scoped to this one lambda node.
        let lambda_param_vars = if let Expression::Lambda { params, .. } = &node.expr {
            let mut frame = HashMap::new();
            let vars: Vec<String> = params
                .iter()
                .map(|p| {
                    let v = self.fresh_effect_var();
                    frame.insert(p.clone(), v.clone());
                    v
                })
                .collect();
            self.lambda_param_stack.push(frame);
            Some(vars)
        } else {
            None
        };

        for child in &children {
            self.infer_expr(*child, depth + 1)?;
        }

        if lambda_param_vars.is_some() {
            self.lambda_param_stack.pop();
        }

        // Sibling isolation (§7): a node whose child failed contributes no
        // scheme of its own -- it's recorded as failed too, wrapping the
        // first failing child's error with a context frame, rather than
        // computing a spurious result from a missing child.
        if let Some(failed_child) = children.iter().find(|c| self.errors.contains_key(c)) {
            let child_error = self.errors[failed_child].clone();
            self.errors.insert(
                id,
                child_error.wrap(
                    expr_location(&node.expr),
                    "skipped: a child expression failed to infer",
                ),
            );
            return Ok(());
        }

        let scheme = match &node.expr {
            Expression::LiteralInt(_) | Expression::LiteralBool(_) | Expression::LiteralStr(_) => {
                Some(EffectScheme::monomorphic(Effect::pure()))
            }
            Expression::NameRef(name) => self.infer_name_ref(id, name, node.scope_id),
            Expression::Application { opcode, args } if opcode == "assign" => {
                self.infer_assign(id, args, node.scope_id)
            }
            Expression::Application { opcode, args } if is_iterator_op(opcode) => {
                self.infer_iterator_application(id, opcode, args)
            }
            Expression::Application { opcode, args } => {
                self.infer_application(id, opcode, args, node.scope_id)
            }
            Expression::Lambda { body, .. } => {
                let param_vars = lambda_param_vars
                    .expect("lambda_param_vars is set above whenever node.expr is Lambda");
                let body_scheme = self.scheme_of(*body);
                let arrow = Effect::Arrow {
                    params: param_vars.iter().cloned().map(Effect::Quantified).collect(),
                    result: Box::new(body_scheme.effect),
                };
                // Restrict the scheme's quantifiers to exactly this
                // lambda's own parameters (§4.E): other free names in the
                // body's effect stay free, they aren't this lambda's to
                // generalize over.
                Some(EffectScheme {
                    effect_vars: param_vars.into_iter().collect(),
                    entity_vars: BTreeSet::new(),
                    effect: arrow,
                })
            }
            Expression::LetIn { def, body } => {
                if let Some(def_body) = self.ir.def(*def).body() {
                    let scheme = self.scheme_of(def_body);
                    self.def_schemes.insert(*def, scheme);
                }
                Some(self.scheme_of(*body))
            }
        };

        if let Some(scheme) = scheme {
            self.schemes.insert(id, scheme);
        }
        Ok(())
    }

    fn infer_name_ref(&mut self, id: ExprId, name: &str, scope: crate::ir::ScopeId) -> Option<EffectScheme> {
        match self.scopes.lookup(name, scope) {
            LookupResult::Found(binding) => match binding.kind {
                BindingKind::Param => {
                    let var_name = match binding.def_id {
                        Some(def_id) => self.opdef_param_var(def_id, name),
                        // Lambda params carry no def_id (§4.A); look up the
                        // shared var pushed for this occurrence's enclosing
                        // lambda, innermost first.
                        None => self
                            .lambda_param_stack
                            .iter()
                            .rev()
                            .find_map(|frame| frame.get(name).cloned())
                            .unwrap_or_else(|| self.fresh_effect_var()),
                    };
                    let mut effect_vars = BTreeSet::new();
                    effect_vars.insert(var_name.clone());
                    Some(EffectScheme {
                        effect_vars,
                        entity_vars: BTreeSet::new(),
                        effect: Effect::Quantified(var_name),
                    })
                }
                BindingKind::Const | BindingKind::Typedef => {
                    Some(EffectScheme::monomorphic(Effect::pure()))
                }
                BindingKind::Var => {
                    let ref_id = binding.def_id.unwrap_or_else(|| DefId::from_raw(0));
                    Some(EffectScheme::monomorphic(Effect::read(StateVar {
                        name: name.to_string(),
                        ref_id,
                    })))
                }
                BindingKind::Val | BindingKind::Def => {
                    match binding.def_id.and_then(|d| self.def_schemes.get(&d).cloned()) {
                        Some(s) => Some(s),
                        None => {
                            self.record_error(
                                id,
                                name,
                                "referenced definition has no recorded effect (forward reference?)",
                            );
                            None
                        }
                    }
                }
            },
            LookupResult::NotFound => {
                self.record_error(id, name, "name not found in scope");
                None
            }
        }
    }

    fn infer_application(
        &mut self,
        id: ExprId,
        opcode: &str,
        args: &[ExprId],
        scope: crate::ir::ScopeId,
    ) -> Option<EffectScheme> {
        let arg_effects: Vec<Effect> = args
            .iter()
            .map(|a| {
                let scheme = self.scheme_of(*a);
                self.instantiate(&scheme)
            })
            .collect();

        let result_var = self.fresh_effect_var();
        let actual = Effect::Arrow {
            params: arg_effects,
            result: Box::new(Effect::Quantified(result_var.clone())),
        };

        let signature_scheme = builtin_scheme(opcode, args.len()).or_else(|| match self
            .scopes
            .lookup(opcode, scope)
        {
            LookupResult::Found(binding) => binding.def_id.and_then(|d| self.def_schemes.get(&d).cloned()),
            LookupResult::NotFound => None,
        });

        let signature_scheme = match signature_scheme {
            Some(s) => s,
            None => {
                self.record_error(id, opcode, "operator has no known signature");
                return None;
            }
        };
        let signature_effect = self.instantiate(&signature_scheme);

        let actual = self.substitution.apply_effect(&actual);
        let signature_effect = self.substitution.apply_effect(&signature_effect);

        match unify(&actual, &signature_effect) {
            Ok(s) => match self.substitution.compose(&s) {
                Ok(composed) => {
                    self.substitution = composed;
                    let result_effect =
                        self.substitution.apply_effect(&Effect::Quantified(result_var));
                    Some(self.generalize(&result_effect))
                }
                Err(e) => {
                    self.record_error(id, opcode, format!("inconsistent substitution: {e}"));
                    None
                }
            },
            Err(e) => {
                self.record_error(id, opcode, format!("could not unify operator signature: {e}"));
                None
            }
        }
    }

    /// Iterator/quantifier built-ins (§6): the first argument is the
    /// lambda applied to each element. Its arrow shape is unified against a
    /// fresh element variable `(elem) -> elem` rather than folded into
    /// `crate::signature`'s blanket propagate table, because the result
    /// combines the lambda's body effect with the remaining arguments by
    /// kind, not by simple unification against one shared parameter.
    fn infer_iterator_application(
        &mut self,
        id: ExprId,
        opcode: &str,
        args: &[ExprId],
    ) -> Option<EffectScheme> {
        if args.is_empty() {
            self.record_error(
                id,
                opcode,
                "iterator operator requires at least a lambda argument",
            );
            return None;
        }

        let lambda_scheme = self.scheme_of(args[0]);
        let instantiated = self.instantiate(&lambda_scheme);
        let lambda_effect = self.substitution.apply_effect(&instantiated);

        let elem = self.fresh_effect_var();
        let elem_signature = self.substitution.apply_effect(&Effect::Arrow {
            params: vec![Effect::Quantified(elem.clone())],
            result: Box::new(Effect::Quantified(elem)),
        });

        let unified = match unify(&lambda_effect, &elem_signature) {
            Ok(s) => s,
            Err(e) => {
                self.record_error(
                    id,
                    opcode,
                    format!("{opcode}'s first argument must be a one-parameter lambda: {e}"),
                );
                return None;
            }
        };
        self.substitution = match self.substitution.compose(&unified) {
            Ok(composed) => composed,
            Err(e) => {
                self.record_error(id, opcode, format!("inconsistent substitution: {e}"));
                return None;
            }
        };

        // The lambda's own contribution to the result is whatever its body
        // does beyond its own parameter: the arrow's result side, now that
        // the parameter side has been unified against the fresh element
        // variable above.
        let resolved_lambda = self.substitution.apply_effect(&lambda_effect);
        let lambda_body_effect = match resolved_lambda.as_arrow() {
            Some((_, result)) => result.clone(),
            None => Effect::pure(),
        };

        let mut combined_inputs = vec![lambda_body_effect];
        for a in &args[1..] {
            let scheme = self.scheme_of(*a);
            combined_inputs.push(self.instantiate(&scheme));
        }

        match combine_by_kind(&combined_inputs) {
            Some(combined) => Some(self.generalize(&combined)),
            None => {
                self.record_error(id, opcode, "could not combine iterator argument effects");
                None
            }
        }
    }

    fn infer_assign(&mut self, id: ExprId, args: &[ExprId], _scope: crate::ir::ScopeId) -> Option<EffectScheme> {
        if args.len() != 2 {
            self.record_error(id, "assign", "assign takes exactly 2 arguments");
            return None;
        }
        let target = self.ir.expr(args[0]).clone();
        let target_name = match &target.expr {
            Expression::NameRef(name) => name.clone(),
            _ => {
                self.record_error(
                    id,
                    "assign",
                    "assign's first argument must be a variable reference",
                );
                return None;
            }
        };
        let state_var = match self.scopes.lookup(&target_name, target.scope_id) {
            LookupResult::Found(binding) if binding.kind == BindingKind::Var => StateVar {
                name: target_name,
                ref_id: binding.def_id.unwrap_or_else(|| DefId::from_raw(0)),
            },
            _ => {
                self.record_error(
                    id,
                    "assign",
                    "assign's first argument must resolve to a declared var",
                );
                return None;
            }
        };

        let value_scheme = self.scheme_of(args[1]);
        let value_effect = self.instantiate(&value_scheme);
        let target_effect = Effect::update(state_var);

        match combine_by_kind(&[target_effect, value_effect]) {
            Some(combined) => Some(self.generalize(&combined)),
            None => {
                self.record_error(
                    id,
                    "assign",
                    "assign's second argument must be a concrete effect",
                );
                None
            }
        }
    }
}

fn expr_location(expr: &Expression) -> String {
    match expr {
        Expression::LiteralInt(_) | Expression::LiteralBool(_) | Expression::LiteralStr(_) => {
            "<literal>".to_string()
        }
        Expression::NameRef(name) => name.clone(),
        Expression::Application { opcode, .. } => opcode.clone(),
        Expression::Lambda { .. } => "<lambda>".to_string(),
        Expression::LetIn { .. } => "<let>".to_string(),
    }
}
