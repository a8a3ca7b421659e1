//! The tree of modules/definitions/expressions the inferrer walks, plus the
//! source-location side table a producer decorates it with.
//!
//! Every node carries a stable numeric id (§3). Ids, not pointers, are the
//! handle used to attach analysis results; this crate never builds a shared
//! mutable object graph.

use effectlang_intern::new_id;
use indexmap::IndexMap;

new_id! {
    /// Stable id of a `Module` node.
    pub struct ModuleId;
}
new_id! {
    /// Stable id of a `Definition` node (const/var/opdef/...).
    pub struct DefId;
}
new_id! {
    /// Stable id of an `Expression` node.
    pub struct ExprId;
}
new_id! {
    /// Stable id of a scope in the scope tree (see `crate::scope`).
    pub struct ScopeId;
}

/// A position in source text, 0-indexed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

/// A half-open source span, produced by the (external, out of scope) parser.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SourceSpan {
    pub start: Position,
    pub end: Position,
}

impl SourceSpan {
    /// A placeholder span for IR built by hand in tests, where no real
    /// source text exists to point at.
    pub const DUMMY: SourceSpan = SourceSpan {
        start: Position { line: 0, col: 0 },
        end: Position { line: 0, col: 0 },
    };
}

/// Value-level type tag carried on const/var/opdef declarations. The core
/// does not check value types; this is transported, not consumed.
#[derive(Clone, PartialEq, Debug)]
pub enum TypeTag {
    Int,
    Str,
    Bool,
    /// An untyped operator/value whose parameter arities are only known,
    /// e.g. from a `.tla`-style `CONSTANT Op(_, _)` declaration.
    Untyped(Vec<usize>),
    Set(Box<TypeTag>),
    Seq(Box<TypeTag>),
    Fun(Box<TypeTag>, Box<TypeTag>),
    Oper(Vec<TypeTag>, Box<TypeTag>),
    Tuple(Vec<TypeTag>),
    Record(Vec<(String, TypeTag)>),
    Union(String, Vec<(String, Vec<(String, TypeTag)>)>),
}

/// The qualifier on an operator definition; effect inference ignores it
/// (§4.E: "the qualifier does not affect effect inference") but it is part
/// of the IR data model.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpQualifier {
    Val,
    Def,
    Defrec,
    Pureval,
    Puredef,
    Action,
    Run,
    Temporal,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Visibility {
    Public,
    Private,
}

/// One of the definition forms named in §3. `Const`/`Var` never carry a
/// body; `Opdef` always does (a let-bound opdef's body is its right-hand
/// side). The remaining forms (typedef/assume/import/nested module/
/// instance) are tracked by kind only -- their contents are outside the
/// effect algebra's reach.
#[derive(Clone, Debug)]
pub enum DefKind {
    Const,
    Var,
    Opdef {
        qualifier: OpQualifier,
        visibility: Visibility,
        params: Vec<String>,
        body: ExprId,
    },
    Typedef,
    Assume { condition: ExprId },
    Import,
    NestedModule(ModuleId),
    Instance,
}

#[derive(Clone, Debug)]
pub struct Definition {
    pub id: DefId,
    pub name: String,
    pub kind: DefKind,
    pub type_tag: Option<TypeTag>,
    pub span: SourceSpan,
}

impl Definition {
    pub fn body(&self) -> Option<ExprId> {
        match &self.kind {
            DefKind::Opdef { body, .. } => Some(*body),
            DefKind::Assume { condition } => Some(*condition),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub definitions: Vec<DefId>,
    pub extends: Vec<ModuleId>,
}

/// One of the expression forms named in §3.
#[derive(Clone, Debug)]
pub enum Expression {
    LiteralInt(i64),
    LiteralBool(bool),
    LiteralStr(String),
    NameRef(String),
    /// `opcode(a1, .., an)`. `opcode` is either a built-in name consulted
    /// in the signature table, or a user-defined name resolved via lookup.
    Application { opcode: String, args: Vec<ExprId> },
    Lambda { params: Vec<String>, body: ExprId },
    /// `(def) e` -- a local opdef whose scope is the remainder of the
    /// enclosing block.
    LetIn { def: DefId, body: ExprId },
}

#[derive(Clone, Debug)]
pub struct ExprNode {
    pub id: ExprId,
    pub expr: Expression,
    /// The scope in which names inside this expression are looked up.
    pub scope_id: ScopeId,
    pub span: SourceSpan,
}

/// The full IR: modules, definitions and expressions, each keyed by their
/// stable id. `IndexMap` keeps insertion order, which is parse order --
/// the deterministic ordering §5 requires between sibling expressions.
#[derive(Clone, Debug, Default)]
pub struct Ir {
    pub modules: IndexMap<ModuleId, Module>,
    pub definitions: IndexMap<DefId, Definition>,
    pub expressions: IndexMap<ExprId, ExprNode>,
}

impl Ir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        self.expressions
            .get(&id)
            .unwrap_or_else(|| panic!("Ir::expr: no expression node for {id:?}"))
    }

    pub fn def(&self, id: DefId) -> &Definition {
        self.definitions
            .get(&id)
            .unwrap_or_else(|| panic!("Ir::def: no definition node for {id:?}"))
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        self.modules
            .get(&id)
            .unwrap_or_else(|| panic!("Ir::module: no module node for {id:?}"))
    }

    /// Ordered child expression ids, for the post-order driver in
    /// `crate::infer`. Leaves (literals, name refs) have none.
    pub fn children_of(&self, id: ExprId) -> Vec<ExprId> {
        match &self.expr(id).expr {
            Expression::LiteralInt(_) | Expression::LiteralBool(_) | Expression::LiteralStr(_) => {
                Vec::new()
            }
            Expression::NameRef(_) => Vec::new(),
            Expression::Application { args, .. } => args.clone(),
            Expression::Lambda { body, .. } => vec![*body],
            Expression::LetIn { def, body } => {
                let mut children = Vec::new();
                if let Some(def_body) = self.def(*def).body() {
                    children.push(def_body);
                }
                children.push(*body);
                children
            }
        }
    }
}
