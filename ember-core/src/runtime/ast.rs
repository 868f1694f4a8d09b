//! Statement and expression trees executed by the interpreter

use crate::flow::Label;
use crate::ident::{self, Identifier};
use crate::runtime::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    Local(usize),
    Add(Box<Expr>, Box<Expr>),
    Less(Box<Expr>, Box<Expr>),
    /// Direct call of a registered function
    Call(Identifier, Vec<Expr>),
    /// Late-bound operation through the function's call site `index`
    Dynamic(usize, Vec<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Const(Value::Int(value))
    }

    pub fn local(slot: usize) -> Self {
        Expr::Local(slot)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::Add(Box::new(left), Box::new(right))
    }

    pub fn less(left: Expr, right: Expr) -> Self {
        Expr::Less(Box::new(left), Box::new(right))
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call(ident::intern(name), args)
    }

    pub fn dynamic(site: usize, args: Vec<Expr>) -> Self {
        Expr::Dynamic(site, args)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        slot: usize,
        value: Expr,
    },
    Label(Label),
    Goto {
        label: Label,
        value: Option<Expr>,
    },
    /// Jump when `cond` is falsy
    GotoUnless {
        cond: Expr,
        label: Label,
    },
    Return(Expr),
    /// Suspend with `value`; on resume the sent value goes to `store`
    Yield {
        value: Expr,
        store: Option<usize>,
    },
    YieldBreak,
}

impl Stmt {
    pub fn assign(slot: usize, value: Expr) -> Self {
        Stmt::Assign { slot, value }
    }

    pub fn goto(label: Label) -> Self {
        Stmt::Goto { label, value: None }
    }

    pub fn goto_unless(cond: Expr, label: Label) -> Self {
        Stmt::GotoUnless { cond, label }
    }

    pub fn yield_value(value: Expr, store: Option<usize>) -> Self {
        Stmt::Yield { value, store }
    }

    /// Labels this statement may jump to
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Stmt::Goto { label, .. } | Stmt::GotoUnless { label, .. } => Some(*label),
            _ => None,
        }
    }
}
