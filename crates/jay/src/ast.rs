//! ESTree-shaped AST consumed by the compile layer.
//!
//! The node set matches the ECMAScript-3/5 statement and expression subset
//! this interpreter evaluates. Every enum is internally tagged on the ESTree
//! `"type"` field, so a `Program` produced by any ESTree-compliant parser
//! (acorn, esprima) deserializes directly with serde:
//!
//! ```
//! let json = r#"{
//!     "type": "Program", "start": 0, "end": 6,
//!     "body": [{
//!         "type": "ExpressionStatement", "start": 0, "end": 6,
//!         "expression": {
//!             "type": "BinaryExpression", "start": 0, "end": 5,
//!             "operator": "+",
//!             "left": {"type": "Literal", "start": 0, "end": 1, "value": 1},
//!             "right": {"type": "Literal", "start": 4, "end": 5, "value": 2}
//!         }
//!     }]
//! }"#;
//! let program: jay::ast::Program = serde_json::from_str(json).unwrap();
//! assert_eq!(program.body.len(), 1);
//! ```
//!
//! Node positions are byte offsets into the original source (`start..end`),
//! matching acorn's `ranges` output. Function nodes rely on them to slice
//! the source text for `toString`/`valueOf`.

use serde::{Deserialize, Serialize};
use strum::Display;

/// A complete parsed program: the ESTree `Program` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<StmtNode>,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

/// A statement together with its source range.
///
/// The range lives on the wrapper so the `Stmt` enum itself stays free of
/// bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StmtNode {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
    #[serde(flatten)]
    pub stmt: Stmt,
}

/// An expression together with its source range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprNode {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
    #[serde(flatten)]
    pub expr: Expr,
}

/// An identifier in a binding position (function name, label, property key).
///
/// Identifiers in expression position are `Expr::Identifier`; this struct is
/// for the places ESTree guarantees an `Identifier` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

/// A braced statement list: function bodies, `try` blocks, block statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<StmtNode>,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

/// One declarator in a `var` statement: `x` or `x = init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclarator {
    pub id: ExprNode,
    #[serde(default)]
    pub init: Option<ExprNode>,
}

/// A `var` declaration statement (the only `kind` this subset knows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub declarations: Vec<VariableDeclarator>,
    #[serde(default = "default_var_kind")]
    pub kind: String,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

fn default_var_kind() -> String {
    "var".to_owned()
}

/// The init slot of a `for` statement or the left side of `for-in`:
/// either a `var` declaration or a plain expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForTarget {
    Declaration(VariableDeclaration),
    Expression(ExprNode),
}

/// One `case`/`default` clause of a `switch` statement.
///
/// `test` is `None` for the `default` clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    #[serde(default)]
    pub test: Option<ExprNode>,
    pub consequent: Vec<StmtNode>,
}

/// The `catch (param) { ... }` clause of a `try` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: ExprNode,
    pub body: Block,
}

/// An object-literal property: `key: value`, `get key() {}`, `set key(v) {}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub key: ExprNode,
    pub value: ExprNode,
    pub kind: PropertyKind,
}

/// How an object-literal property defines its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Plain `key: value` data property.
    Init,
    /// `get key() { ... }` accessor.
    Get,
    /// `set key(v) { ... }` accessor.
    Set,
}

/// A statement node, tagged with its ESTree `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
    /// An expression used as a statement; its value feeds the
    /// last-expression-value slot at the top level.
    #[serde(rename = "ExpressionStatement")]
    Expression { expression: ExprNode },
    #[serde(rename = "BlockStatement")]
    Block { body: Vec<StmtNode> },
    /// A lone `;`. Produces no value.
    #[serde(rename = "EmptyStatement")]
    Empty,
    /// `debugger;` is parsed and evaluates as an empty statement.
    #[serde(rename = "DebuggerStatement")]
    Debugger,
    #[serde(rename = "VariableDeclaration")]
    Variable {
        declarations: Vec<VariableDeclarator>,
        #[serde(default = "default_var_kind")]
        kind: String,
    },
    /// A function declaration. `params` are ESTree nodes rather than bare
    /// identifiers so that non-identifier patterns (destructuring, which
    /// this subset excludes) are rejected by the compiler with a proper
    /// syntax error instead of failing to deserialize.
    #[serde(rename = "FunctionDeclaration")]
    FunctionDecl {
        #[serde(default)]
        id: Option<Ident>,
        params: Vec<ExprNode>,
        body: Block,
    },
    #[serde(rename = "IfStatement")]
    If {
        test: ExprNode,
        consequent: Box<StmtNode>,
        #[serde(default)]
        alternate: Option<Box<StmtNode>>,
    },
    /// Classic three-clause `for`. All clauses optional; a missing test
    /// means the loop runs until `break`.
    #[serde(rename = "ForStatement")]
    For {
        #[serde(default)]
        init: Option<Box<ForTarget>>,
        #[serde(default)]
        test: Option<ExprNode>,
        #[serde(default)]
        update: Option<ExprNode>,
        body: Box<StmtNode>,
    },
    /// `for (left in right) body` — enumerates property keys of `right`.
    #[serde(rename = "ForInStatement")]
    ForIn {
        left: Box<ForTarget>,
        right: ExprNode,
        body: Box<StmtNode>,
    },
    #[serde(rename = "WhileStatement")]
    While { test: ExprNode, body: Box<StmtNode> },
    /// `do body while (test);` — the body always runs at least once.
    #[serde(rename = "DoWhileStatement")]
    DoWhile { body: Box<StmtNode>, test: ExprNode },
    #[serde(rename = "BreakStatement")]
    Break {
        #[serde(default)]
        label: Option<Ident>,
    },
    #[serde(rename = "ContinueStatement")]
    Continue {
        #[serde(default)]
        label: Option<Ident>,
    },
    #[serde(rename = "ReturnStatement")]
    Return {
        #[serde(default)]
        argument: Option<ExprNode>,
    },
    /// `with (object) body` — overlays the object's enumerable properties
    /// on a fresh child scope for the duration of the body.
    #[serde(rename = "WithStatement")]
    With { object: ExprNode, body: Box<StmtNode> },
    #[serde(rename = "SwitchStatement")]
    Switch {
        discriminant: ExprNode,
        cases: Vec<SwitchCase>,
    },
    #[serde(rename = "LabeledStatement")]
    Labeled { label: Ident, body: Box<StmtNode> },
    #[serde(rename = "ThrowStatement")]
    Throw { argument: ExprNode },
    #[serde(rename = "TryStatement")]
    Try {
        block: Block,
        #[serde(default)]
        handler: Option<CatchClause>,
        #[serde(default)]
        finalizer: Option<Block>,
    },
}

/// An expression node, tagged with its ESTree `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    #[serde(rename = "Identifier")]
    Identifier { name: String },
    #[serde(rename = "Literal")]
    Literal {
        value: LitValue,
        #[serde(default)]
        raw: Option<String>,
    },
    #[serde(rename = "ThisExpression")]
    This,
    /// Array literal. `None` elements are elisions (`[1, , 3]`) and read
    /// back as `undefined`.
    #[serde(rename = "ArrayExpression")]
    Array { elements: Vec<Option<ExprNode>> },
    #[serde(rename = "ObjectExpression")]
    Object { properties: Vec<Property> },
    /// A function expression; `id` is the optional name a named function
    /// expression binds for its own body.
    #[serde(rename = "FunctionExpression")]
    Function {
        #[serde(default)]
        id: Option<Ident>,
        params: Vec<ExprNode>,
        body: Block,
    },
    #[serde(rename = "UnaryExpression")]
    Unary {
        operator: UnaryOp,
        argument: Box<ExprNode>,
    },
    /// `++x`, `x++`, `--x`, `x--`. The argument must decompose into an
    /// lvalue; the compiler rejects anything else.
    #[serde(rename = "UpdateExpression")]
    Update {
        operator: UpdateOp,
        argument: Box<ExprNode>,
        prefix: bool,
    },
    #[serde(rename = "BinaryExpression")]
    Binary {
        operator: BinaryOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    /// `&&` / `||` with short-circuit evaluation; the right operand thunk
    /// only runs when the left side does not decide the result.
    #[serde(rename = "LogicalExpression")]
    Logical {
        operator: LogicalOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    #[serde(rename = "AssignmentExpression")]
    Assignment {
        operator: AssignOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    /// `obj.key` (`computed: false`) or `obj[key]` (`computed: true`).
    #[serde(rename = "MemberExpression")]
    Member {
        object: Box<ExprNode>,
        property: Box<ExprNode>,
        computed: bool,
    },
    #[serde(rename = "ConditionalExpression")]
    Conditional {
        test: Box<ExprNode>,
        consequent: Box<ExprNode>,
        alternate: Box<ExprNode>,
    },
    #[serde(rename = "CallExpression")]
    Call {
        callee: Box<ExprNode>,
        arguments: Vec<ExprNode>,
    },
    #[serde(rename = "NewExpression")]
    New {
        callee: Box<ExprNode>,
        #[serde(default)]
        arguments: Vec<ExprNode>,
    },
    /// Comma operator: evaluates all, yields the last.
    #[serde(rename = "SequenceExpression")]
    Sequence { expressions: Vec<ExprNode> },
}

/// A literal's value, matching the polymorphic ESTree `value` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LitValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Binary operators applied by the binary-expression thunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "==")]
    #[strum(serialize = "==")]
    Eq,
    #[serde(rename = "!=")]
    #[strum(serialize = "!=")]
    NotEq,
    #[serde(rename = "===")]
    #[strum(serialize = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    #[strum(serialize = "!==")]
    StrictNotEq,
    #[serde(rename = "<")]
    #[strum(serialize = "<")]
    Lt,
    #[serde(rename = "<=")]
    #[strum(serialize = "<=")]
    LtE,
    #[serde(rename = ">")]
    #[strum(serialize = ">")]
    Gt,
    #[serde(rename = ">=")]
    #[strum(serialize = ">=")]
    GtE,
    #[serde(rename = "<<")]
    #[strum(serialize = "<<")]
    LShift,
    #[serde(rename = ">>")]
    #[strum(serialize = ">>")]
    RShift,
    /// Unsigned right shift, `>>>`.
    #[serde(rename = ">>>")]
    #[strum(serialize = ">>>")]
    URShift,
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Add,
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Sub,
    #[serde(rename = "*")]
    #[strum(serialize = "*")]
    Mul,
    #[serde(rename = "/")]
    #[strum(serialize = "/")]
    Div,
    #[serde(rename = "%")]
    #[strum(serialize = "%")]
    Mod,
    #[serde(rename = "|")]
    #[strum(serialize = "|")]
    BitOr,
    #[serde(rename = "^")]
    #[strum(serialize = "^")]
    BitXor,
    #[serde(rename = "&")]
    #[strum(serialize = "&")]
    BitAnd,
    #[serde(rename = "in")]
    #[strum(serialize = "in")]
    In,
    #[serde(rename = "instanceof")]
    #[strum(serialize = "instanceof")]
    Instanceof,
}

/// `&&` and `||`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum LogicalOp {
    #[serde(rename = "&&")]
    #[strum(serialize = "&&")]
    And,
    #[serde(rename = "||")]
    #[strum(serialize = "||")]
    Or,
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    #[strum(serialize = "-")]
    Neg,
    #[serde(rename = "+")]
    #[strum(serialize = "+")]
    Pos,
    #[serde(rename = "!")]
    #[strum(serialize = "!")]
    Not,
    #[serde(rename = "~")]
    #[strum(serialize = "~")]
    BitNot,
    #[serde(rename = "typeof")]
    #[strum(serialize = "typeof")]
    TypeOf,
    #[serde(rename = "void")]
    #[strum(serialize = "void")]
    Void,
    /// `delete` needs an lvalue decomposition rather than an evaluated
    /// operand; the compiler special-cases it.
    #[serde(rename = "delete")]
    #[strum(serialize = "delete")]
    Delete,
}

/// `++` and `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum UpdateOp {
    #[serde(rename = "++")]
    #[strum(serialize = "++")]
    Incr,
    #[serde(rename = "--")]
    #[strum(serialize = "--")]
    Decr,
}

/// Assignment operators, simple and compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum AssignOp {
    #[serde(rename = "=")]
    #[strum(serialize = "=")]
    Assign,
    #[serde(rename = "+=")]
    #[strum(serialize = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    #[strum(serialize = "-=")]
    SubAssign,
    #[serde(rename = "*=")]
    #[strum(serialize = "*=")]
    MulAssign,
    #[serde(rename = "/=")]
    #[strum(serialize = "/=")]
    DivAssign,
    #[serde(rename = "%=")]
    #[strum(serialize = "%=")]
    ModAssign,
    #[serde(rename = "<<=")]
    #[strum(serialize = "<<=")]
    LShiftAssign,
    #[serde(rename = ">>=")]
    #[strum(serialize = ">>=")]
    RShiftAssign,
    #[serde(rename = ">>>=")]
    #[strum(serialize = ">>>=")]
    URShiftAssign,
    #[serde(rename = "&=")]
    #[strum(serialize = "&=")]
    BitAndAssign,
    #[serde(rename = "^=")]
    #[strum(serialize = "^=")]
    BitXorAssign,
    #[serde(rename = "|=")]
    #[strum(serialize = "|=")]
    BitOrAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment applies before storing,
    /// `None` for plain `=`.
    #[must_use]
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            Self::Assign => None,
            Self::AddAssign => Some(BinaryOp::Add),
            Self::SubAssign => Some(BinaryOp::Sub),
            Self::MulAssign => Some(BinaryOp::Mul),
            Self::DivAssign => Some(BinaryOp::Div),
            Self::ModAssign => Some(BinaryOp::Mod),
            Self::LShiftAssign => Some(BinaryOp::LShift),
            Self::RShiftAssign => Some(BinaryOp::RShift),
            Self::URShiftAssign => Some(BinaryOp::URShift),
            Self::BitAndAssign => Some(BinaryOp::BitAnd),
            Self::BitXorAssign => Some(BinaryOp::BitXor),
            Self::BitOrAssign => Some(BinaryOp::BitOr),
        }
    }
}
