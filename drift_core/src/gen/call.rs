//! Call generation and transitive call-count bookkeeping.
//!
//! The call graph is forward-only: a function may only invoke functions
//! with a strictly greater id, so no recursion is ever possible. Every
//! bound call folds the callee's transitive counts into the caller, and a
//! budget on that total keeps the dynamic call tree small.

use super::{expr, lvalue, GenContext};
use crate::{
    prog::{CallExpr, Expr, FuncId, FuncKind, Receiver, VarIdent},
    ty::TypeId,
    HashMap, RngType,
};
use rand::prelude::*;

/// A bound call expression. `ref_escape` is the conservative rank of the
/// returned ref: the minimum rank over all by-ref arguments, `i32::MAX`
/// when none were passed (the ref can then only originate in a static).
pub struct CallBound {
    pub expr: Expr,
    pub ref_escape: i32,
}

/// Generate a call. `want` constrains the (dereferenced) return type;
/// `ref_min` requests the result as a ref l-value whose rank must be at
/// least the given bound, which in turn bounds every by-ref argument.
pub fn gen_call(
    ctx: &mut GenContext,
    rng: &mut RngType,
    want: Option<TypeId>,
    ref_min: Option<i32>,
) -> Option<CallBound> {
    let cur_total = ctx.cur().total_calls();
    let may_new = ctx.funcs.len() < ctx.config.max_funcs
        && cur_total < ctx.config.max_total_calls
        && rng.gen_bool(ctx.config.new_callee_prob);
    if may_new {
        let forced = want.map(|t| {
            Some(match ref_min {
                Some(_) => ctx.universe.ref_of(t),
                None => t,
            })
        });
        let ids = ctx.gen_new_callee(rng, forced);
        if let Some(bound) = bind_group(ctx, rng, &ids, want, ref_min) {
            return Some(bound);
        }
        // Over budget: the fresh function stays in the program, uncalled.
    }

    let groups = candidate_groups(ctx, want, ref_min);
    let group = groups.choose(rng)?.clone();
    bind_group(ctx, rng, &group, want, ref_min)
}

/// Callable candidates: single functions with id greater than the current
/// one, plus interface-method groups whose every implementation is ahead
/// of the current function.
fn candidate_groups(
    ctx: &GenContext,
    want: Option<TypeId>,
    ref_min: Option<i32>,
) -> Vec<Vec<FuncId>> {
    let cur = ctx.cur_func;
    let cur_total = ctx.cur().total_calls();
    let mut groups: Vec<Vec<FuncId>> = Vec::new();
    let mut iface_groups: HashMap<&str, Vec<FuncId>> = HashMap::new();

    for (id, f) in ctx.funcs.iter().enumerate() {
        if f.is_entry {
            continue;
        }
        if let FuncKind::Instance { iface: Some(_), .. } = f.kind {
            iface_groups.entry(&f.name).or_default().push(id);
            continue;
        }
        if id > cur
            && ret_compatible(ctx, f.ret, want, ref_min)
            && cur_total + 1 + f.total_calls() <= ctx.config.max_total_calls
        {
            groups.push(vec![id]);
        }
    }

    for (_, ids) in iface_groups {
        // Dispatch could land on any implementation, so all of them must
        // be ahead of the caller and all count against the budget.
        if ids.iter().any(|&id| id <= cur) {
            continue;
        }
        if !ret_compatible(ctx, ctx.funcs[ids[0]].ret, want, ref_min) {
            continue;
        }
        let cost: u64 = ids
            .iter()
            .map(|&id| 1 + ctx.funcs[id].total_calls())
            .sum();
        if cur_total + cost <= ctx.config.max_total_calls {
            groups.push(ids);
        }
    }
    // Map iteration order is not deterministic; candidate order must be.
    groups.sort_by_key(|g| g[0]);
    groups
}

fn ret_compatible(
    ctx: &GenContext,
    ret: Option<TypeId>,
    want: Option<TypeId>,
    ref_min: Option<i32>,
) -> bool {
    let want = match want {
        None => return ref_min.is_none(),
        Some(w) => w,
    };
    let ret = match ret {
        None => return false,
        Some(r) => r,
    };
    let (eff, is_ref) = match ctx.universe.ty_of(ret).as_ref() {
        Some(r) => (r.inner(), true),
        None => (ret, false),
    };
    if ref_min.is_some() {
        is_ref && eff == want
    } else {
        ctx.universe.is_assignable(eff, want)
    }
}

fn bind_group(
    ctx: &mut GenContext,
    rng: &mut RngType,
    ids: &[FuncId],
    want: Option<TypeId>,
    ref_min: Option<i32>,
) -> Option<CallBound> {
    let cur_total = ctx.cur().total_calls();
    let cost: u64 = ids.iter().map(|&id| 1 + ctx.funcs[id].total_calls()).sum();
    if cur_total + cost > ctx.config.max_total_calls {
        return None;
    }
    if !ret_compatible(ctx, ctx.funcs[ids[0]].ret, want, ref_min) {
        return None;
    }

    let name = ctx.funcs[ids[0]].name.clone();
    let params = ctx.funcs[ids[0]].params.clone();
    let ret = ctx.funcs[ids[0]].ret;

    let receiver = if ids.len() > 1 {
        let iface = ctx
            .interface_methods
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.iface)?;
        Receiver::Expr(Box::new(expr::gen_expr(ctx, rng, iface)))
    } else {
        match ctx.funcs[ids[0]].kind {
            FuncKind::Static => {
                if matches!(ctx.cur().kind, FuncKind::Static) {
                    if rng.gen() {
                        Receiver::None
                    } else {
                        Receiver::PrimaryClass
                    }
                } else {
                    Receiver::PrimaryClass
                }
            }
            FuncKind::Instance { on, .. } => {
                Receiver::Expr(Box::new(expr::gen_expr(ctx, rng, on)))
            }
        }
    };

    let (args, args_min_escape) = gen_args(ctx, rng, &params, ref_min.unwrap_or(i32::MIN));
    for &id in ids {
        ctx.note_call(id);
    }

    let mut call = Expr::Call(CallExpr {
        callee: name,
        receiver,
        args,
    });

    if let (Some(w), None) = (want, ref_min) {
        let eff = match ctx.universe.ty_of(ret.unwrap()).as_ref() {
            Some(r) => r.inner(),
            None => ret.unwrap(),
        };
        let eff_prim = ctx.universe.ty_of(eff).prim_kind();
        if eff != w && eff_prim.is_some() {
            call = Expr::Cast(w, Box::new(call));
        }
    }

    Some(CallBound {
        expr: call,
        ref_escape: args_min_escape,
    })
}

/// Arguments per parameter. By-ref parameters take an l-value of the inner
/// type whose rank is at least `ref_floor`; the minimum over them bounds
/// where the call's returned ref may escape.
fn gen_args(
    ctx: &mut GenContext,
    rng: &mut RngType,
    params: &[VarIdent],
    ref_floor: i32,
) -> (Vec<Expr>, i32) {
    let mut min_escape = i32::MAX;
    let mut args = Vec::with_capacity(params.len());
    for p in params {
        match ctx.universe.ty_of(p.ty).as_ref().map(|r| r.inner()) {
            Some(inner) => {
                let lv = lvalue::gen_lvalue(ctx, rng, inner, ref_floor);
                min_escape = min_escape.min(lv.escape);
                args.push(Expr::Ref(Box::new(lv.expr)));
            }
            None => args.push(expr::gen_expr(ctx, rng, p.ty)),
        }
    }
    (args, min_escape)
}
