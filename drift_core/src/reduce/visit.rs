//! Tree addressing for the reducer.
//!
//! Statements and expressions are addressed by their preorder index over
//! the whole program (function bodies in order, child blocks after their
//! owning statement). Rewrites clone the program and splice at one index,
//! so every candidate is an independent tree.

use crate::prog::{Expr, Program, Stmt};

/// Total number of statements, in the same order `with_stmt`/`replace_stmt`
/// use.
pub fn count_stmts(prog: &Program) -> usize {
    prog.funcs.iter().map(|f| f.descendants()).sum()
}

/// Read the statement at preorder index `idx`.
pub fn with_stmt<R>(prog: &Program, idx: usize, f: impl FnOnce(&Stmt) -> R) -> Option<R> {
    let mut counter = 0;
    let mut f = Some(f);
    let mut out = None;
    for func in &prog.funcs {
        if visit_list(&func.body, &mut counter, idx, &mut f, &mut out) {
            break;
        }
    }
    out
}

fn visit_list<R>(
    stmts: &[Stmt],
    counter: &mut usize,
    idx: usize,
    f: &mut Option<impl FnOnce(&Stmt) -> R>,
    out: &mut Option<R>,
) -> bool {
    for stmt in stmts {
        if *counter == idx {
            *out = Some((f.take().unwrap())(stmt));
            return true;
        }
        *counter += 1;
        for block in stmt.child_blocks() {
            if visit_list(block, counter, idx, f, out) {
                return true;
            }
        }
    }
    false
}

/// The statement at `idx` and, when present, its successor in the same
/// list (for window rewrites like decl/assign fusion).
pub fn stmt_window(prog: &Program, idx: usize) -> Option<(Stmt, Option<Stmt>)> {
    let mut counter = 0;
    let mut out = None;
    for func in &prog.funcs {
        if window_list(&func.body, &mut counter, idx, &mut out) {
            break;
        }
    }
    out
}

fn window_list(
    stmts: &[Stmt],
    counter: &mut usize,
    idx: usize,
    out: &mut Option<(Stmt, Option<Stmt>)>,
) -> bool {
    for (i, stmt) in stmts.iter().enumerate() {
        if *counter == idx {
            *out = Some((stmt.clone(), stmts.get(i + 1).cloned()));
            return true;
        }
        *counter += 1;
        for block in stmt.child_blocks() {
            if window_list(block, counter, idx, out) {
                return true;
            }
        }
    }
    false
}

/// Clone the program with statements `[idx, idx + take)` replaced by
/// `repl`. Returns `None` when the index is out of range.
pub fn replace_stmts(prog: &Program, idx: usize, take: usize, repl: Vec<Stmt>) -> Option<Program> {
    let mut cand = prog.clone();
    let mut counter = 0;
    let mut repl = Some((take, repl));
    let mut done = false;
    for func in &mut cand.funcs {
        if splice_list(&mut func.body, &mut counter, idx, &mut repl, &mut done) {
            break;
        }
    }
    if done {
        Some(cand)
    } else {
        None
    }
}

fn splice_list(
    stmts: &mut Vec<Stmt>,
    counter: &mut usize,
    idx: usize,
    repl: &mut Option<(usize, Vec<Stmt>)>,
    done: &mut bool,
) -> bool {
    let mut i = 0;
    while i < stmts.len() {
        if *counter == idx {
            let (take, repl) = repl.take().unwrap();
            let end = (i + take).min(stmts.len());
            stmts.splice(i..end, repl);
            *done = true;
            return true;
        }
        *counter += 1;
        for block in stmts[i].child_blocks_mut() {
            if splice_list(block, counter, idx, repl, done) {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Remove a trivially-initialized declaration at `idx` and substitute its
/// initializer for every later use in the enclosing block.
pub fn inline_local(prog: &Program, idx: usize, name: &str, value: &Expr) -> Option<Program> {
    let mut cand = prog.clone();
    let mut counter = 0;
    let mut done = false;
    for func in &mut cand.funcs {
        if inline_in_list(&mut func.body, &mut counter, idx, name, value, &mut done) {
            break;
        }
    }
    if done {
        Some(cand)
    } else {
        None
    }
}

fn inline_in_list(
    stmts: &mut Vec<Stmt>,
    counter: &mut usize,
    idx: usize,
    name: &str,
    value: &Expr,
    done: &mut bool,
) -> bool {
    let mut i = 0;
    while i < stmts.len() {
        if *counter == idx {
            stmts.remove(i);
            for later in stmts[i..].iter_mut() {
                substitute_var(later, name, value);
            }
            *done = true;
            return true;
        }
        *counter += 1;
        for block in stmts[i].child_blocks_mut() {
            if inline_in_list(block, counter, idx, name, value, done) {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Replace every `Var(name)` in the statement subtree with `value`.
pub fn substitute_var(stmt: &mut Stmt, name: &str, value: &Expr) {
    for e in stmt_exprs_mut(stmt) {
        substitute_in_expr(e, name, value);
    }
    for block in stmt.child_blocks_mut() {
        for s in block {
            substitute_var(s, name, value);
        }
    }
}

fn substitute_in_expr(expr: &mut Expr, name: &str, value: &Expr) {
    if let Expr::Var(n) = expr {
        if &**n == name {
            *expr = value.clone();
            return;
        }
    }
    for child in expr_children_mut(expr) {
        substitute_in_expr(child, name, value);
    }
}

/// Top-level expressions owned directly by a statement (not those inside
/// child blocks).
pub fn stmt_exprs_mut(stmt: &mut Stmt) -> Vec<&mut Expr> {
    match stmt {
        Stmt::Decl(d) => d.init.as_mut().into_iter().collect(),
        Stmt::Assign(a) => vec![&mut a.lhs, &mut a.rhs],
        Stmt::Expr(e) => vec![e],
        Stmt::If(i) => vec![&mut i.cond],
        Stmt::Return(r) => r.as_mut().into_iter().collect(),
        Stmt::Block(_) | Stmt::TryFinally(_) | Stmt::Loop(_) => Vec::new(),
    }
}

pub fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::Decl(d) => d.init.as_ref().into_iter().collect(),
        Stmt::Assign(a) => vec![&a.lhs, &a.rhs],
        Stmt::Expr(e) => vec![e],
        Stmt::If(i) => vec![&i.cond],
        Stmt::Return(r) => r.as_ref().into_iter().collect(),
        Stmt::Block(_) | Stmt::TryFinally(_) | Stmt::Loop(_) => Vec::new(),
    }
}

/// Direct children of an expression, in the same order the preorder
/// counters use.
pub fn expr_children_mut(expr: &mut Expr) -> Vec<&mut Expr> {
    match expr {
        Expr::Lit(_) | Expr::Var(_) | Expr::StaticRef(_) | Expr::This => Vec::new(),
        Expr::Field(base, _) => vec![base],
        Expr::Index(base, idxs) => {
            let mut v: Vec<&mut Expr> = vec![base];
            v.extend(idxs.iter_mut());
            v
        }
        Expr::Unary(_, e) | Expr::Cast(_, e) | Expr::Ref(e) | Expr::ConsoleWrite(e) => vec![e],
        Expr::Binary(_, l, r) => vec![l, r],
        Expr::Call(call) => {
            let mut v: Vec<&mut Expr> = Vec::new();
            if let crate::prog::Receiver::Expr(recv) = &mut call.receiver {
                v.push(recv);
            }
            v.extend(call.args.iter_mut());
            v
        }
        Expr::New(_, args) | Expr::NewArray(_, args) => args.iter_mut().collect(),
        Expr::IncDec { target, .. } => vec![target],
        Expr::Checksum { value, .. } => vec![value],
    }
}

pub fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Lit(_) | Expr::Var(_) | Expr::StaticRef(_) | Expr::This => Vec::new(),
        Expr::Field(base, _) => vec![base],
        Expr::Index(base, idxs) => {
            let mut v: Vec<&Expr> = vec![base];
            v.extend(idxs.iter());
            v
        }
        Expr::Unary(_, e) | Expr::Cast(_, e) | Expr::Ref(e) | Expr::ConsoleWrite(e) => vec![e],
        Expr::Binary(_, l, r) => vec![l, r],
        Expr::Call(call) => {
            let mut v: Vec<&Expr> = Vec::new();
            if let crate::prog::Receiver::Expr(recv) = &call.receiver {
                v.push(recv);
            }
            v.extend(call.args.iter());
            v
        }
        Expr::New(_, args) | Expr::NewArray(_, args) => args.iter().collect(),
        Expr::IncDec { target, .. } => vec![target],
        Expr::Checksum { value, .. } => vec![value],
    }
}

/// Total number of expression nodes, preorder.
pub fn count_exprs(prog: &Program) -> usize {
    let mut count = 0;
    for_each_expr(prog, &mut |_| count += 1);
    count
}

pub fn for_each_expr(prog: &Program, f: &mut dyn FnMut(&Expr)) {
    fn walk_stmt(stmt: &Stmt, f: &mut dyn FnMut(&Expr)) {
        for e in stmt_exprs(stmt) {
            e.for_each(f);
        }
        for block in stmt.child_blocks() {
            for s in block {
                walk_stmt(s, f);
            }
        }
    }
    for func in &prog.funcs {
        for stmt in &func.body {
            walk_stmt(stmt, f);
        }
    }
}

/// Read the expression at preorder index `idx`.
pub fn with_expr<R>(prog: &Program, idx: usize, f: impl FnOnce(&Expr) -> R) -> Option<R> {
    let mut counter = 0;
    let mut f = Some(f);
    let mut out = None;
    for_each_expr(prog, &mut |e| {
        if counter == idx {
            if let Some(f) = f.take() {
                out = Some(f(e));
            }
        }
        counter += 1;
    });
    out
}

/// Clone the program with the expression at `idx` replaced by `repl`.
pub fn replace_expr(prog: &Program, idx: usize, repl: Expr) -> Option<Program> {
    let mut cand = prog.clone();
    let mut counter = 0;
    let mut repl = Some(repl);

    fn walk_stmt(
        stmt: &mut Stmt,
        counter: &mut usize,
        idx: usize,
        repl: &mut Option<Expr>,
    ) -> bool {
        for e in stmt_exprs_mut(stmt) {
            if walk_expr(e, counter, idx, repl) {
                return true;
            }
        }
        for block in stmt.child_blocks_mut() {
            for s in block {
                if walk_stmt(s, counter, idx, repl) {
                    return true;
                }
            }
        }
        false
    }

    fn walk_expr(e: &mut Expr, counter: &mut usize, idx: usize, repl: &mut Option<Expr>) -> bool {
        if *counter == idx {
            *e = repl.take().unwrap();
            return true;
        }
        *counter += 1;
        for child in expr_children_mut(e) {
            if walk_expr(child, counter, idx, repl) {
                return true;
            }
        }
        false
    }

    let mut done = false;
    'outer: for func in &mut cand.funcs {
        for stmt in &mut func.body {
            if walk_stmt(stmt, &mut counter, idx, &mut repl) {
                done = true;
                break 'outer;
            }
        }
    }
    if done {
        Some(cand)
    } else {
        None
    }
}

/// Apply `f` to every expression node in place, bottom-up.
pub fn map_exprs(prog: &mut Program, f: &mut dyn FnMut(&mut Expr)) {
    fn walk_stmt(stmt: &mut Stmt, f: &mut dyn FnMut(&mut Expr)) {
        for e in stmt_exprs_mut(stmt) {
            walk_expr(e, f);
        }
        for block in stmt.child_blocks_mut() {
            for s in block {
                walk_stmt(s, f);
            }
        }
    }
    fn walk_expr(e: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
        for child in expr_children_mut(e) {
            walk_expr(child, f);
        }
        f(e);
    }
    for func in &mut prog.funcs {
        for stmt in &mut func.body {
            walk_stmt(stmt, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;

    #[test]
    fn stmt_indexing_is_consistent() {
        let p = crate::gen::gen_program(13, &GenConfig::default(), true);
        let n = count_stmts(&p);
        assert!(n > 0);
        for idx in [0, n / 2, n - 1] {
            assert!(with_stmt(&p, idx, |_| ()).is_some());
        }
        assert!(with_stmt(&p, n, |_| ()).is_none());
    }

    #[test]
    fn replace_stmt_drops_exactly_one() {
        let p = crate::gen::gen_program(13, &GenConfig::default(), true);
        let n = count_stmts(&p);
        let idx = n / 2;
        let removed_kind = with_stmt(&p, idx, |s| s.descendants()).unwrap();
        let cand = replace_stmts(&p, idx, 1, Vec::new()).unwrap();
        assert_eq!(count_stmts(&cand), n - removed_kind);
    }

    #[test]
    fn expr_indexing_is_consistent() {
        let p = crate::gen::gen_program(13, &GenConfig::default(), true);
        let n = count_exprs(&p);
        assert!(n > 0);
        assert!(with_expr(&p, n - 1, |_| ()).is_some());
        assert!(with_expr(&p, n, |_| ()).is_none());
    }
}
