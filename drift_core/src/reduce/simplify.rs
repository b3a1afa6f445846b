//! The simplifier catalog.
//!
//! Each simplifier proposes zero or more whole-program candidates for one
//! node; the engine tests them against the interestingness predicate and
//! commits the first that survives. Late simplifiers only run after the
//! first full fixed-point iteration.

use super::visit::{
    inline_local, map_exprs, replace_expr, replace_stmts, stmt_window, with_expr, with_stmt,
};
use crate::{
    literal::default_expr,
    prog::{
        CallExpr, DeclStmt, Expr, FuncKind, IfStmt, Lit, LitKind, Program, Receiver, Stmt, UnOp,
        VarIdent,
    },
    ty::{PrimKind, TypeId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stmt,
    Expr,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRef {
    Func(usize),
    Type(TypeId),
    Static(usize),
    Param { func: usize, param: usize },
    AggField { ty: TypeId, field: usize },
    IfaceMethod(usize),
}

#[derive(Debug, Clone)]
pub enum Node {
    Stmt(usize),
    Expr(usize),
    Member(MemberRef),
}

/// Allocator for reducer-introduced local names; saved and restored around
/// failed candidate attempts so committed programs stay deterministic.
#[derive(Debug, Clone, Copy)]
pub struct NameAlloc {
    pub next: usize,
}

impl NameAlloc {
    pub fn fresh(&mut self) -> String {
        let name = format!("var{}", self.next);
        self.next += 1;
        name
    }
}

type Apply = fn(&Program, &Node, &mut NameAlloc) -> Vec<Program>;

pub struct Simplifier {
    pub name: &'static str,
    /// Lower fires earlier; statement removal is 1 so shrinking dominates.
    pub priority: u8,
    pub late: bool,
    pub target: Target,
    pub apply: Apply,
}

/// The catalog, ordered by priority.
pub fn catalog() -> &'static [Simplifier] {
    static CATALOG: &[Simplifier] = &[
        Simplifier {
            name: "remove statement",
            priority: 1,
            late: false,
            target: Target::Stmt,
            apply: remove_stmt,
        },
        Simplifier {
            name: "statement to invocation",
            priority: 2,
            late: false,
            target: Target::Stmt,
            apply: stmt_to_invocation,
        },
        Simplifier {
            name: "drop declaration initializer",
            priority: 3,
            late: false,
            target: Target::Stmt,
            apply: decl_drop_init,
        },
        Simplifier {
            name: "ref declaration to value",
            priority: 3,
            late: false,
            target: Target::Stmt,
            apply: ref_decl_to_value,
        },
        Simplifier {
            name: "reduce if",
            priority: 3,
            late: false,
            target: Target::Stmt,
            apply: reduce_if,
        },
        Simplifier {
            name: "extract if condition",
            priority: 6,
            late: false,
            target: Target::Stmt,
            apply: if_cond_to_local,
        },
        Simplifier {
            name: "reduce loop",
            priority: 3,
            late: false,
            target: Target::Stmt,
            apply: loop_to_body,
        },
        Simplifier {
            name: "reduce try-finally",
            priority: 3,
            late: false,
            target: Target::Stmt,
            apply: reduce_try,
        },
        Simplifier {
            name: "flatten block",
            priority: 3,
            late: false,
            target: Target::Stmt,
            apply: flatten_block,
        },
        Simplifier {
            name: "combine declaration and assignment",
            priority: 4,
            late: false,
            target: Target::Stmt,
            apply: combine_decl_assign,
        },
        Simplifier {
            name: "inline trivial local",
            priority: 4,
            late: false,
            target: Target::Stmt,
            apply: inline_trivial_local,
        },
        Simplifier {
            name: "inline call",
            priority: 7,
            late: true,
            target: Target::Stmt,
            apply: inline_call,
        },
        Simplifier {
            name: "extract call argument",
            priority: 8,
            late: true,
            target: Target::Stmt,
            apply: extract_call_arg,
        },
        Simplifier {
            name: "reduce binary",
            priority: 2,
            late: false,
            target: Target::Expr,
            apply: reduce_binary,
        },
        Simplifier {
            name: "drop cast",
            priority: 2,
            late: false,
            target: Target::Expr,
            apply: drop_cast,
        },
        Simplifier {
            name: "drop unary",
            priority: 2,
            late: false,
            target: Target::Expr,
            apply: drop_unary,
        },
        Simplifier {
            name: "shrink array initializer",
            priority: 3,
            late: false,
            target: Target::Expr,
            apply: shrink_array_init,
        },
        Simplifier {
            name: "simplify constant",
            priority: 9,
            late: true,
            target: Target::Expr,
            apply: simplify_constant,
        },
        Simplifier {
            name: "remove method",
            priority: 1,
            late: false,
            target: Target::Member,
            apply: remove_method,
        },
        Simplifier {
            name: "remove interface method",
            priority: 2,
            late: false,
            target: Target::Member,
            apply: remove_interface_method,
        },
        Simplifier {
            name: "remove type",
            priority: 2,
            late: false,
            target: Target::Member,
            apply: remove_type,
        },
        Simplifier {
            name: "reduce static field",
            priority: 3,
            late: false,
            target: Target::Member,
            apply: reduce_static_field,
        },
        Simplifier {
            name: "remove aggregate field",
            priority: 4,
            late: false,
            target: Target::Member,
            apply: remove_agg_field,
        },
        Simplifier {
            name: "remove parameter",
            priority: 5,
            late: false,
            target: Target::Member,
            apply: remove_param,
        },
        Simplifier {
            name: "make method void",
            priority: 6,
            late: false,
            target: Target::Member,
            apply: make_method_void,
        },
        Simplifier {
            name: "devirtualize method",
            priority: 9,
            late: true,
            target: Target::Member,
            apply: move_to_static,
        },
    ];
    CATALOG
}

/// Enumerate member nodes in a stable order.
pub fn collect_members(prog: &Program) -> Vec<MemberRef> {
    let mut out = Vec::new();
    for (i, f) in prog.funcs.iter().enumerate() {
        if !f.is_entry {
            out.push(MemberRef::Func(i));
        }
    }
    for ty in prog.universe.declared_types() {
        out.push(MemberRef::Type(ty.id()));
    }
    for i in 0..prog.statics.len() {
        out.push(MemberRef::Static(i));
    }
    for (i, f) in prog.funcs.iter().enumerate() {
        if f.is_entry {
            continue;
        }
        for j in 0..f.params.len() {
            out.push(MemberRef::Param { func: i, param: j });
        }
    }
    for ty in prog.universe.declared_types() {
        if let Some(s) = ty.as_struct() {
            for j in 0..s.fields().len() {
                out.push(MemberRef::AggField {
                    ty: ty.id(),
                    field: j,
                });
            }
        }
    }
    for i in 0..prog.interface_methods.len() {
        out.push(MemberRef::IfaceMethod(i));
    }
    out
}

fn stmt_node(node: &Node) -> Option<usize> {
    match node {
        Node::Stmt(i) => Some(*i),
        _ => None,
    }
}

fn expr_node(node: &Node) -> Option<usize> {
    match node {
        Node::Expr(i) => Some(*i),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Statement simplifiers
// ---------------------------------------------------------------------

fn remove_stmt(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    replace_stmts(prog, idx, 1, Vec::new()).into_iter().collect()
}

fn stmt_to_invocation(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let calls = match with_stmt(prog, idx, |s| {
        if matches!(s, Stmt::Expr(Expr::Call(_))) {
            return Vec::new();
        }
        let mut calls = Vec::new();
        for e in super::visit::stmt_exprs(s) {
            e.for_each(&mut |sub| {
                if let Expr::Call(_) = sub {
                    calls.push(sub.clone());
                }
            });
        }
        calls
    }) {
        Some(c) => c,
        None => return Vec::new(),
    };
    calls
        .into_iter()
        .filter_map(|c| replace_stmts(prog, idx, 1, vec![Stmt::Expr(c)]))
        .collect()
}

fn decl_drop_init(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let decl = match with_stmt(prog, idx, |s| match s {
        Stmt::Decl(d) if d.init.is_some() && !prog.universe.ty_of(d.ty).is_ref() => {
            Some(d.clone())
        }
        _ => None,
    }) {
        Some(Some(d)) => d,
        _ => return Vec::new(),
    };
    let stmt = Stmt::Decl(DeclStmt {
        init: None,
        ..decl
    });
    replace_stmts(prog, idx, 1, vec![stmt]).into_iter().collect()
}

fn ref_decl_to_value(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let rewritten = match with_stmt(prog, idx, |s| match s {
        Stmt::Decl(d) => {
            let inner = prog.universe.ty_of(d.ty).as_ref().map(|r| r.inner())?;
            let init = match &d.init {
                Some(Expr::Ref(e)) => (**e).clone(),
                _ => return None,
            };
            Some(Stmt::Decl(DeclStmt {
                name: d.name.clone(),
                ty: inner,
                init: Some(init),
            }))
        }
        _ => None,
    }) {
        Some(Some(s)) => s,
        _ => return Vec::new(),
    };
    replace_stmts(prog, idx, 1, vec![rewritten])
        .into_iter()
        .collect()
}

fn reduce_if(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let i = match with_stmt(prog, idx, |s| match s {
        Stmt::If(i) => Some(i.clone()),
        _ => None,
    }) {
        Some(Some(i)) => i,
        _ => return Vec::new(),
    };
    let mut out = Vec::new();
    if let Some(cand) = replace_stmts(prog, idx, 1, i.then.clone()) {
        out.push(cand);
    }
    if let Some(els) = &i.els {
        if let Some(cand) = replace_stmts(prog, idx, 1, els.clone()) {
            out.push(cand);
        }
        // Narrow flip: only when the then-branch is already empty.
        if i.then.is_empty() {
            let flipped = Stmt::If(IfStmt {
                cond: Expr::Unary(UnOp::Not, Box::new(i.cond.clone())),
                then: els.clone(),
                els: None,
            });
            if let Some(cand) = replace_stmts(prog, idx, 1, vec![flipped]) {
                out.push(cand);
            }
        }
    }
    out
}

fn if_cond_to_local(prog: &Program, node: &Node, names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let i = match with_stmt(prog, idx, |s| match s {
        Stmt::If(i) if !matches!(i.cond, Expr::Var(_)) => Some(i.clone()),
        _ => None,
    }) {
        Some(Some(i)) => i,
        _ => return Vec::new(),
    };
    let bool_ty = prog.universe.get_primitive(PrimKind::Bool);
    let name = names.fresh();
    let decl = Stmt::Decl(DeclStmt {
        name: name.clone().into_boxed_str(),
        ty: bool_ty,
        init: Some(i.cond.clone()),
    });
    let rewritten = Stmt::If(IfStmt {
        cond: Expr::Var(name.into_boxed_str()),
        then: i.then,
        els: i.els,
    });
    replace_stmts(prog, idx, 1, vec![decl, rewritten])
        .into_iter()
        .collect()
}

fn loop_to_body(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let l = match with_stmt(prog, idx, |s| match s {
        Stmt::Loop(l) => Some(l.clone()),
        _ => None,
    }) {
        Some(Some(l)) => l,
        _ => return Vec::new(),
    };
    let int_ty = prog.universe.get_primitive(PrimKind::Int);
    let decl = Stmt::Decl(DeclStmt {
        name: l.var.clone(),
        ty: int_ty,
        init: Some(Expr::Lit(Lit {
            ty: int_ty,
            kind: LitKind::Int(0),
        })),
    });
    let mut repl = vec![decl];
    repl.extend(l.body.clone());
    replace_stmts(prog, idx, 1, vec![Stmt::Block(repl)])
        .into_iter()
        .collect()
}

fn reduce_try(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let t = match with_stmt(prog, idx, |s| match s {
        Stmt::TryFinally(t) => Some(t.clone()),
        _ => None,
    }) {
        Some(Some(t)) => t,
        _ => return Vec::new(),
    };
    let mut both = t.body.clone();
    both.extend(t.finally.clone());
    let mut rev = t.finally.clone();
    rev.extend(t.body.clone());
    [t.body.clone(), t.finally.clone(), both, rev]
        .into_iter()
        .filter_map(|repl| replace_stmts(prog, idx, 1, repl))
        .collect()
}

fn flatten_block(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let inner = match with_stmt(prog, idx, |s| match s {
        Stmt::Block(stmts) => Some(stmts.clone()),
        _ => None,
    }) {
        Some(Some(stmts)) => stmts,
        _ => return Vec::new(),
    };
    replace_stmts(prog, idx, 1, inner).into_iter().collect()
}

fn combine_decl_assign(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let (first, second) = match stmt_window(prog, idx) {
        Some((f, Some(s))) => (f, s),
        _ => return Vec::new(),
    };
    let decl = match first {
        Stmt::Decl(d) if d.init.is_none() => d,
        _ => return Vec::new(),
    };
    let assign = match second {
        Stmt::Assign(a) => a,
        _ => return Vec::new(),
    };
    match &assign.lhs {
        Expr::Var(n) if *n == decl.name && assign.op == crate::prog::AssignOp::Assign => {}
        _ => return Vec::new(),
    }
    let combined = Stmt::Decl(DeclStmt {
        init: Some(assign.rhs),
        ..decl
    });
    replace_stmts(prog, idx, 2, vec![combined])
        .into_iter()
        .collect()
}

fn inline_trivial_local(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let decl = match with_stmt(prog, idx, |s| match s {
        Stmt::Decl(d) => Some(d.clone()),
        _ => None,
    }) {
        Some(Some(d)) => d,
        _ => return Vec::new(),
    };
    let value = match &decl.init {
        Some(v @ Expr::Var(_)) | Some(v @ Expr::StaticRef(_)) | Some(v @ Expr::Lit(_)) => {
            v.clone()
        }
        // `ref T a = ref x;`: uses of `a` are uses of `x`.
        Some(Expr::Ref(inner)) if matches!(**inner, Expr::Var(_) | Expr::StaticRef(_)) => {
            (**inner).clone()
        }
        _ => return Vec::new(),
    };
    inline_local(prog, idx, &decl.name, &value)
        .into_iter()
        .collect()
}

/// Replace `f(a, b)` at a statement with f's lifted body: parameters
/// become fresh locals, the callee's locals are alpha-renamed, and a
/// trailing `return e;` becomes a local the call expression reads.
fn inline_call(prog: &Program, node: &Node, names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let call = match with_stmt(prog, idx, |s| first_call(s)) {
        Some(Some(c)) => c,
        _ => return Vec::new(),
    };
    if !matches!(call.receiver, Receiver::None | Receiver::PrimaryClass) {
        return Vec::new();
    }
    let callee = match prog.func(&call.callee) {
        Some(f) if matches!(f.kind, FuncKind::Static) && !f.is_entry => f.clone(),
        _ => return Vec::new(),
    };
    // At most one return, and only as the final top-level statement.
    let mut returns = 0;
    for s in &callee.body {
        count_returns(s, &mut returns);
    }
    let terminal_ret = matches!(callee.body.last(), Some(Stmt::Return(_)));
    if returns > 1 || (returns == 1 && !terminal_ret) {
        return Vec::new();
    }
    if call.args.len() != callee.params.len() {
        return Vec::new();
    }

    let mut repl = Vec::new();
    let mut rename = crate::HashMap::new();
    for (p, arg) in callee.params.iter().zip(&call.args) {
        let fresh = names.fresh();
        rename.insert(p.name.to_string(), fresh.clone());
        let (ty, init) = match arg {
            Expr::Ref(inner) => (p.ty, Some(Expr::Ref(inner.clone()))),
            other => (p.ty, Some(other.clone())),
        };
        repl.push(Stmt::Decl(DeclStmt {
            name: fresh.into_boxed_str(),
            ty,
            init,
        }));
    }
    let mut body = callee.body.clone();
    let ret_value = match body.last() {
        Some(Stmt::Return(v)) => {
            let v = v.clone();
            body.pop();
            v
        }
        _ => None,
    };
    for s in &mut body {
        alpha_rename(s, &mut rename, names);
    }

    repl.extend(body);
    match ret_value {
        Some(mut v) => {
            rename_expr(&mut v, &rename);
            let fresh = names.fresh();
            let ret_ty = match callee.ret {
                Some(r) => prog
                    .universe
                    .ty_of(r)
                    .as_ref()
                    .map(|rr| rr.inner())
                    .unwrap_or(r),
                None => return Vec::new(),
            };
            let v = match v {
                Expr::Ref(inner) => *inner,
                other => other,
            };
            repl.push(Stmt::Decl(DeclStmt {
                name: fresh.clone().into_boxed_str(),
                ty: ret_ty,
                init: Some(v),
            }));
            // The statement keeps its shape, reading the lifted result.
            let rewritten = match with_stmt(prog, idx, |s| {
                let mut s = s.clone();
                replace_call_with(&mut s, &call, Expr::Var(fresh.into_boxed_str()));
                s
            }) {
                Some(s) => s,
                None => return Vec::new(),
            };
            repl.push(rewritten);
        }
        None => {
            // Void callee: only sensible when the call is the statement.
            let is_bare = with_stmt(prog, idx, |s| {
                matches!(s, Stmt::Expr(Expr::Call(c)) if *c == call)
            })
            .unwrap_or(false);
            if !is_bare {
                return Vec::new();
            }
        }
    }
    replace_stmts(prog, idx, 1, repl).into_iter().collect()
}

fn first_call(stmt: &Stmt) -> Option<CallExpr> {
    let mut found = None;
    for e in super::visit::stmt_exprs(stmt) {
        e.for_each(&mut |sub| {
            if found.is_none() {
                if let Expr::Call(c) = sub {
                    found = Some(c.clone());
                }
            }
        });
    }
    found
}

fn count_returns(stmt: &Stmt, n: &mut usize) {
    if matches!(stmt, Stmt::Return(_)) {
        *n += 1;
    }
    for block in stmt.child_blocks() {
        for s in block {
            count_returns(s, n);
        }
    }
}

fn alpha_rename(
    stmt: &mut Stmt,
    rename: &mut crate::HashMap<String, String>,
    names: &mut NameAlloc,
) {
    match stmt {
        Stmt::Decl(d) => {
            let fresh = names.fresh();
            rename.insert(d.name.to_string(), fresh.clone());
            d.name = fresh.into_boxed_str();
        }
        Stmt::Loop(l) => {
            let fresh = names.fresh();
            rename.insert(l.var.to_string(), fresh.clone());
            l.var = fresh.into_boxed_str();
        }
        _ => {}
    }
    for e in super::visit::stmt_exprs_mut(stmt) {
        rename_expr(e, rename);
    }
    for block in stmt.child_blocks_mut() {
        for s in block {
            alpha_rename(s, rename, names);
        }
    }
}

fn rename_expr(expr: &mut Expr, rename: &crate::HashMap<String, String>) {
    if let Expr::Var(n) = expr {
        if let Some(new) = rename.get(&n.to_string()) {
            *n = new.clone().into_boxed_str();
        }
    }
    for child in super::visit::expr_children_mut(expr) {
        rename_expr(child, rename);
    }
}

fn replace_call_with(stmt: &mut Stmt, call: &CallExpr, value: Expr) {
    fn in_expr(e: &mut Expr, call: &CallExpr, value: &Expr, done: &mut bool) {
        if *done {
            return;
        }
        if let Expr::Call(c) = e {
            if c == call {
                *e = value.clone();
                *done = true;
                return;
            }
        }
        for child in super::visit::expr_children_mut(e) {
            in_expr(child, call, value, done);
        }
    }
    let mut done = false;
    for e in super::visit::stmt_exprs_mut(stmt) {
        in_expr(e, call, &value, &mut done);
    }
    for block in stmt.child_blocks_mut() {
        for s in block {
            if !done {
                replace_call_with(s, call, value.clone());
            }
        }
    }
}

/// Extract one argument of some invocation into a preceding local; the
/// fallback when inlining the whole call loses the bug.
fn extract_call_arg(prog: &Program, node: &Node, names: &mut NameAlloc) -> Vec<Program> {
    let idx = match stmt_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let call = match with_stmt(prog, idx, |s| first_call(s)) {
        Some(Some(c)) => c,
        _ => return Vec::new(),
    };
    let callee = match prog.func(&call.callee) {
        Some(f) if f.params.len() == call.args.len() => f.clone(),
        _ => return Vec::new(),
    };
    let mut out = Vec::new();
    for (j, arg) in call.args.iter().enumerate() {
        if matches!(arg, Expr::Ref(_) | Expr::Var(_) | Expr::Lit(_)) {
            continue;
        }
        let ty = callee.params[j].ty;
        let fresh = names.fresh();
        let decl = Stmt::Decl(DeclStmt {
            name: fresh.clone().into_boxed_str(),
            ty,
            init: Some(arg.clone()),
        });
        let mut new_call = call.clone();
        new_call.args[j] = Expr::Var(fresh.into_boxed_str());
        let rewritten = match with_stmt(prog, idx, |s| {
            let mut s = s.clone();
            replace_call_with(&mut s, &call, Expr::Call(new_call.clone()));
            s
        }) {
            Some(s) => s,
            None => continue,
        };
        if let Some(cand) = replace_stmts(prog, idx, 1, vec![decl, rewritten]) {
            out.push(cand);
        }
    }
    out
}

// ---------------------------------------------------------------------
// Expression simplifiers
// ---------------------------------------------------------------------

fn reduce_binary(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match expr_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let sides = match with_expr(prog, idx, |e| match e {
        Expr::Binary(_, l, r) => Some(((**l).clone(), (**r).clone())),
        _ => None,
    }) {
        Some(Some(s)) => s,
        _ => return Vec::new(),
    };
    [sides.0, sides.1]
        .into_iter()
        .filter_map(|side| replace_expr(prog, idx, side))
        .collect()
}

fn drop_cast(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match expr_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let inner = match with_expr(prog, idx, |e| match e {
        Expr::Cast(_, inner) => Some((**inner).clone()),
        _ => None,
    }) {
        Some(Some(inner)) => inner,
        _ => return Vec::new(),
    };
    replace_expr(prog, idx, inner).into_iter().collect()
}

fn drop_unary(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match expr_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let inner = match with_expr(prog, idx, |e| match e {
        Expr::Unary(_, inner) => Some((**inner).clone()),
        Expr::IncDec { target, .. } => Some((**target).clone()),
        _ => None,
    }) {
        Some(Some(inner)) => inner,
        _ => return Vec::new(),
    };
    replace_expr(prog, idx, inner).into_iter().collect()
}

fn shrink_array_init(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match expr_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let shrunk = match with_expr(prog, idx, |e| match e {
        Expr::NewArray(ty, elems) if elems.len() > 1 => {
            Some(Expr::NewArray(*ty, vec![elems[0].clone()]))
        }
        _ => None,
    }) {
        Some(Some(e)) => e,
        _ => return Vec::new(),
    };
    replace_expr(prog, idx, shrunk).into_iter().collect()
}

fn simplify_constant(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let idx = match expr_node(node) {
        Some(i) => i,
        None => return Vec::new(),
    };
    let lit = match with_expr(prog, idx, |e| match e {
        Expr::Lit(l) => Some(l.clone()),
        _ => None,
    }) {
        Some(Some(l)) => l,
        _ => return Vec::new(),
    };
    let signed = prog
        .universe
        .ty_of(lit.ty)
        .prim_kind()
        .map(|k| k.signed())
        .unwrap_or(false);
    let replacements: Vec<LitKind> = match &lit.kind {
        LitKind::Int(v) if ![0, 1, -1].contains(v) => {
            let mut r = vec![LitKind::Int(0), LitKind::Int(1)];
            if signed {
                r.push(LitKind::Int(-1));
            }
            r
        }
        LitKind::Float(v) if *v != 0.0 && *v != 1.0 && *v != -1.0 => {
            vec![
                LitKind::Float(0.0),
                LitKind::Float(1.0),
                LitKind::Float(-1.0),
            ]
        }
        _ => return Vec::new(),
    };
    replacements
        .into_iter()
        .filter_map(|kind| {
            replace_expr(
                prog,
                idx,
                Expr::Lit(Lit {
                    ty: lit.ty,
                    kind,
                }),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------
// Member simplifiers
// ---------------------------------------------------------------------

fn member_node(node: &Node) -> Option<&MemberRef> {
    match node {
        Node::Member(m) => Some(m),
        _ => None,
    }
}

fn remove_method(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let i = match member_node(node) {
        Some(MemberRef::Func(i)) => *i,
        _ => return Vec::new(),
    };
    let mut cand = prog.clone();
    cand.funcs.remove(i);
    vec![cand]
}

fn remove_interface_method(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let k = match member_node(node) {
        Some(MemberRef::IfaceMethod(k)) => *k,
        _ => return Vec::new(),
    };
    let mut cand = prog.clone();
    let m = cand.interface_methods.remove(k);
    cand.funcs.retain(|f| {
        !(f.name == m.name && matches!(f.kind, FuncKind::Instance { iface: Some(i), .. } if i == m.iface))
    });
    vec![cand]
}

fn remove_type(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let id = match member_node(node) {
        Some(MemberRef::Type(id)) => *id,
        _ => return Vec::new(),
    };
    let mut cand = prog.clone();
    cand.universe.remove_type(id);
    cand.funcs
        .retain(|f| !matches!(f.kind, FuncKind::Instance { on, .. } if on == id));
    cand.interface_methods.retain(|m| m.iface != id);
    cand.statics.retain(|s| s.var.ty != id);
    vec![cand]
}

fn reduce_static_field(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let i = match member_node(node) {
        Some(MemberRef::Static(i)) => *i,
        _ => return Vec::new(),
    };
    let mut out = Vec::new();
    let mut removed = prog.clone();
    removed.statics.remove(i);
    out.push(removed);

    let default = default_expr(&prog.universe, prog.statics[i].var.ty);
    if prog.statics[i].init != default {
        let mut dropped = prog.clone();
        dropped.statics[i].init = default;
        out.push(dropped);
    }
    out
}

fn remove_agg_field(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let (ty, field) = match member_node(node) {
        Some(MemberRef::AggField { ty, field }) => (*ty, *field),
        _ => return Vec::new(),
    };
    let mut cand = prog.clone();
    match cand.universe.ty_of_mut(ty).as_struct_mut() {
        Some(s) if field < s.fields().len() => s.remove_field(field),
        _ => return Vec::new(),
    }
    super::visit::map_exprs(&mut cand, &mut |e| {
        if let Expr::New(t, args) = e {
            if *t == ty && field < args.len() {
                args.remove(field);
            }
        }
    });
    for s in &mut cand.statics {
        if let Expr::New(t, args) = &mut s.init {
            if *t == ty && field < args.len() {
                args.remove(field);
            }
        }
    }
    vec![cand]
}

fn remove_param(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let (func, param) = match member_node(node) {
        Some(MemberRef::Param { func, param }) => (*func, *param),
        _ => return Vec::new(),
    };
    let name = prog.funcs[func].name.clone();
    let arity = prog.funcs[func].params.len();
    if param >= arity {
        return Vec::new();
    }
    let mut cand = prog.clone();
    for f in &mut cand.funcs {
        if f.name == name && f.params.len() == arity {
            f.params.remove(param);
        }
    }
    for m in &mut cand.interface_methods {
        if m.name == name && m.params.len() == arity {
            m.params.remove(param);
        }
    }
    map_exprs(&mut cand, &mut |e| {
        if let Expr::Call(c) = e {
            if c.callee == name && c.args.len() == arity {
                c.args.remove(param);
            }
        }
    });
    vec![cand]
}

fn make_method_void(prog: &Program, node: &Node, _names: &mut NameAlloc) -> Vec<Program> {
    let i = match member_node(node) {
        Some(MemberRef::Func(i)) => *i,
        _ => return Vec::new(),
    };
    if prog.funcs[i].ret.is_none() {
        return Vec::new();
    }
    let name = prog.funcs[i].name.clone();
    let mut cand = prog.clone();
    for f in &mut cand.funcs {
        if f.name == name {
            f.ret = None;
            for s in &mut f.body {
                strip_return_values(s);
            }
        }
    }
    for m in &mut cand.interface_methods {
        if m.name == name {
            m.ret = None;
        }
    }
    vec![cand]
}

fn strip_return_values(stmt: &mut Stmt) {
    if let Stmt::Return(v) = stmt {
        *v = None;
    }
    for block in stmt.child_blocks_mut() {
        for s in block {
            strip_return_values(s);
        }
    }
}

/// Turn an instance method into a static one on the primary class with an
/// explicit receiver parameter.
fn move_to_static(prog: &Program, node: &Node, names: &mut NameAlloc) -> Vec<Program> {
    let i = match member_node(node) {
        Some(MemberRef::Func(i)) => *i,
        _ => return Vec::new(),
    };
    let on = match prog.funcs[i].kind {
        FuncKind::Instance { on, iface: None } => on,
        _ => return Vec::new(),
    };
    let name = prog.funcs[i].name.clone();
    let this_name = names.fresh();
    let mut cand = prog.clone();
    {
        let f = &mut cand.funcs[i];
        f.kind = FuncKind::Static;
        f.params.insert(
            0,
            VarIdent::new(this_name.clone(), on, 0),
        );
        for s in &mut f.body {
            replace_this(s, &this_name);
        }
    }
    map_exprs(&mut cand, &mut |e| {
        if let Expr::Call(c) = e {
            if c.callee == name {
                if let Receiver::Expr(recv) = c.receiver.clone() {
                    c.args.insert(0, *recv);
                    c.receiver = Receiver::PrimaryClass;
                }
            }
        }
    });
    vec![cand]
}

fn replace_this(stmt: &mut Stmt, this_name: &str) {
    fn in_expr(e: &mut Expr, this_name: &str) {
        if matches!(e, Expr::This) {
            *e = Expr::Var(this_name.to_string().into_boxed_str());
            return;
        }
        for child in super::visit::expr_children_mut(e) {
            in_expr(child, this_name);
        }
    }
    for e in super::visit::stmt_exprs_mut(stmt) {
        in_expr(e, this_name);
    }
    for block in stmt.child_blocks_mut() {
        for s in block {
            replace_this(s, this_name);
        }
    }
}
