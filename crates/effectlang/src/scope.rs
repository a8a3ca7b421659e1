//! IR & scoping (§4.A): the scope tree built from module structure, and
//! the `lookup`/`children_of` queries the inferrer depends on.
//!
//! `children_of` lives on `Ir` itself (`crate::ir`); this module owns scope
//! construction and the lookup facility's canonical implementation.

use crate::ir::{DefId, DefKind, Expression, Ir, ModuleId, ScopeId};
use indexmap::IndexMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BindingKind {
    Param,
    Const,
    Var,
    Val,
    Def,
    Typedef,
}

#[derive(Clone, Copy, Debug)]
pub struct Binding {
    pub kind: BindingKind,
    /// The defining expression/definition id, when the binding resolves to
    /// one (params bind to the param's own synthetic identity, carried by
    /// `def_id` pointing back at the opdef/lambda that introduced it).
    pub def_id: Option<DefId>,
}

#[derive(Clone, Copy, Debug)]
pub enum LookupResult {
    Found(Binding),
    NotFound,
}

/// Consumed by the inferrer (§6): given a name and a scope, resolve its
/// binding. Must be total -- every well-formed reference yields exactly
/// one answer, and an unresolved name is a well-formed `NotFound`, not a
/// panic.
pub trait LookupFacility {
    fn lookup(&self, name: &str, scope: ScopeId) -> LookupResult;
}

struct ScopeNode {
    parent: Option<ScopeId>,
    bindings: IndexMap<String, Binding>,
}

/// The canonical `LookupFacility` implementation: a tree of scopes built
/// from a module's definitions, with child scopes introduced for opdef and
/// lambda parameter lists. Innermost scope wins (§4.A).
pub struct ScopeTree {
    scopes: IndexMap<ScopeId, ScopeNode>,
    next_id: u32,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree {
            scopes: IndexMap::new(),
            next_id: 0,
        }
    }

    fn fresh_id(&mut self) -> ScopeId {
        let id = ScopeId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn new_root(&mut self) -> ScopeId {
        let id = self.fresh_id();
        self.scopes.insert(
            id,
            ScopeNode {
                parent: None,
                bindings: IndexMap::new(),
            },
        );
        id
    }

    pub fn new_child(&mut self, parent: ScopeId) -> ScopeId {
        let id = self.fresh_id();
        self.scopes.insert(
            id,
            ScopeNode {
                parent: Some(parent),
                bindings: IndexMap::new(),
            },
        );
        id
    }

    pub fn bind(&mut self, scope: ScopeId, name: impl Into<String>, binding: Binding) {
        self.scopes
            .get_mut(&scope)
            .unwrap_or_else(|| panic!("ScopeTree::bind: no such scope {scope:?}"))
            .bindings
            .insert(name.into(), binding);
    }
}

impl LookupFacility for ScopeTree {
    fn lookup(&self, name: &str, scope: ScopeId) -> LookupResult {
        let mut current = Some(scope);
        while let Some(s) = current {
            let node = &self.scopes[&s];
            if let Some(b) = node.bindings.get(name) {
                return LookupResult::Found(*b);
            }
            current = node.parent;
        }
        LookupResult::NotFound
    }
}

fn def_binding_kind(kind: &DefKind) -> BindingKind {
    match kind {
        DefKind::Const => BindingKind::Const,
        DefKind::Var => BindingKind::Var,
        DefKind::Opdef { qualifier, .. } => match qualifier {
            crate::ir::OpQualifier::Val | crate::ir::OpQualifier::Pureval => BindingKind::Val,
            _ => BindingKind::Def,
        },
        DefKind::Typedef => BindingKind::Typedef,
        DefKind::Assume | DefKind::Import | DefKind::NestedModule(_) | DefKind::Instance => {
            BindingKind::Def
        }
    }
}

/// Build the scope tree for `module` and stamp every expression's
/// `scope_id` field in `ir` to match. Returns the module's root scope.
///
/// Module-level definitions share one root scope (nested defs shadow
/// outer ones only by virtue of being looked up from a nested scope nested
/// inside it -- module-level names themselves do not shadow each other).
/// Each opdef and lambda introduces one child scope binding its own
/// parameters; a lambda's parameters shadow outer bindings only inside its
/// own body (§4.A contract).
pub fn build_module_scope(tree: &mut ScopeTree, ir: &mut Ir, module: ModuleId) -> ScopeId {
    let root = tree.new_root();
    let def_ids = ir.module(module).definitions.clone();

    for def_id in &def_ids {
        let def = ir.def(*def_id);
        tree.bind(
            root,
            def.name.clone(),
            Binding {
                kind: def_binding_kind(&def.kind),
                def_id: Some(*def_id),
            },
        );
    }

    for def_id in &def_ids {
        assign_def_scope(tree, ir, *def_id, root);
    }

    root
}

fn assign_def_scope(tree: &mut ScopeTree, ir: &mut Ir, def_id: DefId, outer: ScopeId) {
    let def = ir.def(def_id).clone();
    match &def.kind {
        DefKind::Opdef { params, body, .. } => {
            let scope = if params.is_empty() {
                outer
            } else {
                let scope = tree.new_child(outer);
                for p in params {
                    tree.bind(
                        scope,
                        p.clone(),
                        Binding {
                            kind: BindingKind::Param,
                            def_id: Some(def_id),
                        },
                    );
                }
                scope
            };
            assign_expr_scope(tree, ir, *body, scope);
        }
        DefKind::Assume { condition } => {
            assign_expr_scope(tree, ir, *condition, outer);
        }
        _ => {}
    }
}

fn assign_expr_scope(tree: &mut ScopeTree, ir: &mut Ir, expr_id: crate::ir::ExprId, scope: ScopeId) {
    ir.expressions
        .get_mut(&expr_id)
        .unwrap_or_else(|| panic!("assign_expr_scope: no expression node for {expr_id:?}"))
        .scope_id = scope;

    let expr = ir.expr(expr_id).expr.clone();
    match expr {
        Expression::LiteralInt(_) | Expression::LiteralBool(_) | Expression::LiteralStr(_) => {}
        Expression::NameRef(_) => {}
        Expression::Application { args, .. } => {
            for a in args {
                assign_expr_scope(tree, ir, a, scope);
            }
        }
        Expression::Lambda { params, body } => {
            let inner = if params.is_empty() {
                scope
            } else {
                let inner = tree.new_child(scope);
                for p in &params {
                    tree.bind(
                        inner,
                        p.clone(),
                        Binding {
                            kind: BindingKind::Param,
                            // Lambdas aren't top-level definitions; their
                            // defining id is the body expr they introduce,
                            // matching the `e_<param>_<body_id>` naming
                            // convention used by the inferrer (§4.E).
                            def_id: None,
                        },
                    );
                }
                inner
            };
            assign_expr_scope(tree, ir, body, inner);
        }
        Expression::LetIn { def, body } => {
            assign_def_scope(tree, ir, def, scope);
            // `def`'s own name is visible to `body`: extend with a scope
            // binding just that name, nested inside the enclosing one.
            let inner = tree.new_child(scope);
            let d = ir.def(def).clone();
            tree.bind(
                inner,
                d.name.clone(),
                Binding {
                    kind: def_binding_kind(&d.kind),
                    def_id: Some(def),
                },
            );
            assign_expr_scope(tree, ir, body, inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Definition, ExprNode, Module, SourceSpan};

    fn fresh_ids() -> (
        impl FnMut() -> crate::ir::ModuleId,
        impl FnMut() -> crate::ir::DefId,
        impl FnMut() -> crate::ir::ExprId,
    ) {
        let mut m = 0u32;
        let mut d = 0u32;
        let mut e = 0u32;
        (
            move || {
                let id = crate::ir::ModuleId::from_raw(m);
                m += 1;
                id
            },
            move || {
                let id = crate::ir::DefId::from_raw(d);
                d += 1;
                id
            },
            move || {
                let id = crate::ir::ExprId::from_raw(e);
                e += 1;
                id
            },
        )
    }

    #[test]
    fn lookup_finds_module_level_const() {
        let (mut next_module, mut next_def, mut next_expr) = fresh_ids();
        let module_id = next_module();
        let const_id = next_def();
        let body = next_expr();

        let mut ir = Ir::new();
        ir.expressions.insert(
            body,
            ExprNode {
                id: body,
                expr: Expression::LiteralInt(1),
                scope_id: ScopeId::from_raw(0),
                span: SourceSpan::DUMMY,
            },
        );
        ir.definitions.insert(
            const_id,
            Definition {
                id: const_id,
                name: "N".into(),
                kind: DefKind::Const,
                type_tag: None,
                span: SourceSpan::DUMMY,
            },
        );
        ir.modules.insert(
            module_id,
            Module {
                id: module_id,
                name: "M".into(),
                definitions: vec![const_id],
                extends: vec![],
            },
        );

        let mut tree = ScopeTree::new();
        let root = build_module_scope(&mut tree, &mut ir, module_id);

        match tree.lookup("N", root) {
            LookupResult::Found(b) => assert_eq!(b.kind, BindingKind::Const),
            LookupResult::NotFound => panic!("expected N to resolve"),
        }
    }

    #[test]
    fn lookup_reports_not_found_for_unknown_name() {
        let mut tree = ScopeTree::new();
        let root = tree.new_root();
        assert!(matches!(tree.lookup("missing", root), LookupResult::NotFound));
    }

    #[test]
    fn lambda_param_shadows_outer_binding_only_inside_body() {
        let mut tree = ScopeTree::new();
        let outer = tree.new_root();
        tree.bind(
            outer,
            "x",
            Binding {
                kind: BindingKind::Const,
                def_id: None,
            },
        );
        let inner = tree.new_child(outer);
        tree.bind(
            inner,
            "x",
            Binding {
                kind: BindingKind::Param,
                def_id: None,
            },
        );

        match tree.lookup("x", inner) {
            LookupResult::Found(b) => assert_eq!(b.kind, BindingKind::Param),
            LookupResult::NotFound => panic!(),
        }
        match tree.lookup("x", outer) {
            LookupResult::Found(b) => assert_eq!(b.kind, BindingKind::Const),
            LookupResult::NotFound => panic!(),
        }
    }
}
