//! Block and statement generation.

use super::{assign, call, expr, lvalue, GenContext, ScopeFrame};
use crate::{
    checksum,
    config::GenConfig,
    prog::{Expr, IfStmt, LoopStmt, Stmt, TryStmt, VarIdent},
    rng::choose_weighted,
    ty::PrimKind,
    RngType,
};
use rand::prelude::*;

/// Statement count target for a fresh block.
pub fn block_stmt_target(rng: &mut RngType, config: &GenConfig) -> usize {
    choose_weighted(rng, &config.block_stmt_count_weights) + 1
}

/// Generate one block. `root` marks a function body: only root blocks
/// synthesize a trailing return, and only non-root blocks may emit
/// spontaneous returns.
pub fn gen_block(
    ctx: &mut GenContext,
    rng: &mut RngType,
    preseeded: Vec<VarIdent>,
    root: bool,
    target: usize,
) -> Vec<Stmt> {
    ctx.scopes.push(ScopeFrame { vars: preseeded });

    let mut stmts = Vec::new();
    let mut returned = false;
    loop {
        let enough = stmts.len() >= target;
        let need_more =
            root && ctx.cur_func == 0 && ctx.stmt_total < ctx.config.program_min_stmts;
        if enough && !need_more {
            break;
        }
        let remaining = target.saturating_sub(stmts.len()).max(1);
        let stmt = gen_statement(ctx, rng, root, remaining);
        ctx.stmt_total += 1;
        let is_return = matches!(stmt, Stmt::Return(_));
        stmts.push(stmt);
        if is_return {
            returned = true;
            break;
        }
    }

    if ctx.checksum {
        let sites = checksum::frame_checksums(ctx);
        if returned {
            let ret = stmts.pop().unwrap();
            stmts.extend(sites);
            stmts.push(ret);
        } else {
            stmts.extend(sites);
        }
    }

    if root && !returned && ctx.cur().ret.is_some() {
        let ret = gen_return(ctx, rng);
        stmts.push(ret);
    }

    ctx.scopes.pop();
    stmts
}

fn gen_statement(ctx: &mut GenContext, rng: &mut RngType, root: bool, remaining: usize) -> Stmt {
    loop {
        let kind = choose_weighted(rng, &ctx.config.stmt_kind_weights);
        let compound = matches!(kind, 0 | 3 | 4 | 5);
        if compound && !ctx.config.recursion.allow(rng, ctx.scopes.len()) {
            return assign::gen_assign(ctx, rng);
        }
        match kind {
            0 => {
                let target = block_stmt_target(rng, ctx.config).min(remaining);
                let body = gen_block(ctx, rng, Vec::new(), false, target);
                return Stmt::Block(body);
            }
            1 => return assign::gen_assign(ctx, rng),
            2 => {
                if let Some(bound) = call::gen_call(ctx, rng, None, None) {
                    return Stmt::Expr(bound.expr);
                }
                return assign::gen_assign(ctx, rng);
            }
            3 => return gen_if(ctx, rng, remaining),
            4 => return gen_try_finally(ctx, rng, remaining),
            5 => return gen_loop(ctx, rng, remaining),
            _ => {
                // Spontaneous returns never appear at root level or inside
                // a finally block.
                if root || ctx.finally_depth > 0 {
                    continue;
                }
                return gen_return(ctx, rng);
            }
        }
    }
}

fn gen_if(ctx: &mut GenContext, rng: &mut RngType, remaining: usize) -> Stmt {
    let cond = gen_condition(ctx, rng);
    let target = block_stmt_target(rng, ctx.config).min(remaining);
    let then = gen_block(ctx, rng, Vec::new(), false, target);
    let els = if rng.gen() {
        let target = block_stmt_target(rng, ctx.config).min(remaining);
        Some(gen_block(ctx, rng, Vec::new(), false, target))
    } else {
        None
    };
    Stmt::If(IfStmt { cond, then, els })
}

/// A non-constant bool guard; literals are retried a bounded number of
/// times since the host compiler folds them (and flags unreachable code).
fn gen_condition(ctx: &mut GenContext, rng: &mut RngType) -> Expr {
    let bool_ty = ctx.universe.get_primitive(PrimKind::Bool);
    let mut cond = expr::gen_expr(ctx, rng, bool_ty);
    for _ in 0..ctx.config.if_cond_retries {
        if !cond.is_literal() {
            break;
        }
        cond = expr::gen_expr(ctx, rng, bool_ty);
    }
    cond
}

fn gen_try_finally(ctx: &mut GenContext, rng: &mut RngType, remaining: usize) -> Stmt {
    let budget = remaining.max(2);
    let try_target = rng.gen_range(1..budget);
    let finally_target = budget - try_target;
    let body = gen_block(ctx, rng, Vec::new(), false, try_target);
    ctx.finally_depth += 1;
    let finally = gen_block(ctx, rng, Vec::new(), false, finally_target);
    ctx.finally_depth -= 1;
    Stmt::TryFinally(TryStmt { body, finally })
}

fn gen_loop(ctx: &mut GenContext, rng: &mut RngType, remaining: usize) -> Stmt {
    let int_ty = ctx.universe.get_primitive(PrimKind::Int);
    let name = ctx.next_var();
    // The induction variable lives in the body scope, one level deeper
    // than the loop statement itself.
    let escape = -(ctx.scope_depth() + 1);
    let induction = VarIdent::new(name.clone(), int_ty, escape).read_only();
    let target = block_stmt_target(rng, ctx.config).min(remaining);
    let body = gen_block(ctx, rng, vec![induction], false, target);
    Stmt::Loop(LoopStmt {
        var: name.into_boxed_str(),
        bound: ctx.config.loop_bound,
        body,
    })
}

/// Build the return statement for the current function.
pub fn gen_return(ctx: &mut GenContext, rng: &mut RngType) -> Stmt {
    let ret = match ctx.cur().ret {
        None => return Stmt::Return(None),
        Some(ret) => ret,
    };
    if let Some(inner) = ctx.universe.ty_of(ret).as_ref().map(|r| r.inner()) {
        // Returning by ref: the source must outlive the frame, rank >= 1.
        if rng.gen_ratio(1, 5) {
            if let Some(bound) = call::gen_call(ctx, rng, Some(inner), Some(1)) {
                return Stmt::Return(Some(Expr::Ref(Box::new(bound.expr))));
            }
        }
        let lv = lvalue::gen_lvalue(ctx, rng, inner, 1);
        return Stmt::Return(Some(Expr::Ref(Box::new(lv.expr))));
    }
    let value = expr::gen_expr(ctx, rng, ret);
    Stmt::Return(Some(value))
}
