use crate::type_spec::TypeSpec;

/// A dense id assigned to every statement and expression node at parse
/// time. The analyzer and code generator key their per-node results
/// (resolved type, freshness) off this id in side tables rather than
/// mutating the node in place, which keeps the AST plain data that can be
/// shared by reference across compiler stages.
pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinOp {
    pub kind: BinOpKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone)]
pub struct ExprNode {
    pub id: NodeId,
    pub line: u32,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub value: ExprNode,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<StmtNode>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Ident(String),
    Binary {
        op: BinOpKind,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Unary {
        op: UnOp,
        operand: Box<ExprNode>,
    },
    Assign {
        target: Box<ExprNode>,
        value: Box<ExprNode>,
    },
    CompoundAssign {
        op: BinOpKind,
        target: Box<ExprNode>,
        value: Box<ExprNode>,
    },
    IncDec {
        op: IncDecOp,
        prefix: bool,
        target: Box<ExprNode>,
    },
    Call {
        callee: String,
        args: Vec<Arg>,
    },
    FieldAccess {
        object: Box<ExprNode>,
        field: String,
    },
    Index {
        object: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    OptionalCheck {
        operand: Box<ExprNode>,
    },
    If {
        cond: Box<ExprNode>,
        then_branch: Block,
        else_branch: Option<Block>,
        is_value_form: bool,
    },
    While {
        cond: Box<ExprNode>,
        body: Block,
        is_value_form: bool,
    },
    For {
        init: Option<Box<StmtNode>>,
        cond: Option<Box<ExprNode>>,
        update: Option<Box<StmtNode>>,
        body: Block,
        is_value_form: bool,
    },
    Tuple(Vec<ExprNode>),
    ObjectLiteral(Vec<(String, ExprNode)>),
    ArrayLiteral(Vec<ExprNode>),
    HashLiteral(Vec<(ExprNode, ExprNode)>),
    /// `[]: ElemName` — an empty array literal whose element type cannot
    /// be inferred from context.
    TypedEmptyArray(String),
    /// `[:]: KeyName, ValName`
    TypedEmptyHash(String, String),
}

#[derive(Debug, Clone)]
pub struct StmtNode {
    pub id: NodeId,
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_spec: TypeSpec,
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeSpec>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct StructFieldDef {
    pub name: String,
    pub type_spec: Option<TypeSpec>,
    pub is_const: bool,
    pub is_weak: bool,
    pub default: Option<ExprNode>,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub is_class: bool,
    pub fields: Vec<StructFieldDef>,
}

#[derive(Debug, Clone)]
pub enum ExternItem {
    Func {
        name: String,
        params: Vec<Param>,
        return_type: Option<TypeSpec>,
    },
    Var {
        name: String,
        type_spec: TypeSpec,
    },
    Let {
        name: String,
        type_spec: TypeSpec,
    },
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(ExprNode),
    Decl {
        name: String,
        is_const: bool,
        type_spec: Option<TypeSpec>,
        value: Option<ExprNode>,
    },
    Break(Option<ExprNode>),
    Continue(Option<ExprNode>),
    Return(Option<ExprNode>),
    FuncDef(FuncDef),
    TypeDef(TypeDef),
    ExternBlock(Vec<ExternItem>),
}

/// A whole compilation unit: an ordered list of top-level statements
/// (declarations, type definitions, function definitions, extern blocks,
/// and — unusually but legally — loose top-level expressions/lets).
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub stmts: Vec<StmtNode>,
}

/// Hands out increasing `NodeId`s during a single parse.
#[derive(Default)]
pub struct NodeIdGen(NodeId);

impl NodeIdGen {
    pub fn next(&mut self) -> NodeId {
        let id = self.0;
        self.0 += 1;
        id
    }
}
