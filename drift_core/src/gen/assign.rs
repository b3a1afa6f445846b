//! Assignment statement generation.

use super::{expr, lvalue, GenContext};
use crate::{
    prog::{AssignOp, AssignStmt, DeclStmt, Expr, Lit, LitKind, Stmt, VarIdent},
    ty::{PrimKind, TypeId},
    RngType,
};
use rand::prelude::*;

/// Generate an assignment-flavored statement: a fresh declaration, a plain
/// or compound assignment to an existing l-value, a ref rebind, or an
/// increment/decrement.
pub fn gen_assign(ctx: &mut GenContext, rng: &mut RngType) -> Stmt {
    if rng.gen_bool(ctx.config.new_local_prob) {
        return gen_new_var(ctx, rng);
    }

    let lv = match lvalue::pick_lvalue(ctx, rng, None, i32::MIN) {
        Some(lv) => lv,
        None => return gen_new_var(ctx, rng),
    };

    if lv.is_ref_var && rng.gen_bool(ctx.config.ref_reassign_prob) {
        // Rebind the ref; the new referent must outlive the old rank.
        if let Some(src) = lvalue::pick_lvalue(ctx, rng, Some(lv.ty), lv.escape) {
            return Stmt::Assign(AssignStmt {
                lhs: lv.expr,
                op: AssignOp::Assign,
                rhs: Expr::Ref(Box::new(src.expr)),
            });
        }
    }

    let prim = ctx.universe.ty_of(lv.ty).prim_kind();
    if let Some(kind) = prim {
        if kind != PrimKind::Bool && rng.gen_ratio(1, 10) {
            return Stmt::Expr(Expr::IncDec {
                target: Box::new(lv.expr),
                inc: rng.gen(),
                prefix: rng.gen(),
            });
        }
        if rng.gen_bool(ctx.config.compound_assign_prob) {
            if let Some(stmt) = gen_compound(ctx, rng, lv.expr.clone(), lv.ty, kind) {
                return stmt;
            }
        }
    }

    let rhs = expr::gen_expr(ctx, rng, lv.ty);
    Stmt::Assign(AssignStmt {
        lhs: lv.expr,
        op: AssignOp::Assign,
        rhs,
    })
}

fn gen_compound(
    ctx: &mut GenContext,
    rng: &mut RngType,
    lhs: Expr,
    ty: TypeId,
    kind: PrimKind,
) -> Option<Stmt> {
    let ops: &[AssignOp] = match kind {
        PrimKind::Bool => &[AssignOp::And, AssignOp::Or, AssignOp::Xor],
        PrimKind::Float | PrimKind::Double => &[AssignOp::Add, AssignOp::Sub, AssignOp::Mul],
        // Compound arithmetic on char requires conversions the subset
        // avoids.
        PrimKind::Char => return None,
        _ => &[
            AssignOp::Add,
            AssignOp::Sub,
            AssignOp::Mul,
            AssignOp::Div,
            AssignOp::Rem,
            AssignOp::And,
            AssignOp::Or,
            AssignOp::Xor,
            AssignOp::Shl,
            AssignOp::Shr,
        ],
    };
    let op = *ops.choose(rng).unwrap();

    let int_ty = ctx.universe.get_primitive(PrimKind::Int);
    let rhs = if matches!(op, AssignOp::Shl | AssignOp::Shr) {
        // Shift counts are always int.
        expr::gen_expr(ctx, rng, int_ty)
    } else {
        let raw = expr::gen_expr(ctx, rng, ty);
        if op.is_div_rem() && kind.is_integral() {
            guard_divisor(ty, int_ty, raw)
        } else {
            raw
        }
    };
    Some(Stmt::Assign(AssignStmt { lhs, op, rhs }))
}

/// `(T)((rhs) | 1)`: forces every integral divisor to be odd or at least
/// nonzero, so generated programs never divide by zero.
pub fn guard_divisor(ty: TypeId, int_ty: TypeId, rhs: Expr) -> Expr {
    let one = Expr::Lit(Lit {
        ty: int_ty,
        kind: LitKind::Int(1),
    });
    Expr::Cast(
        ty,
        Box::new(Expr::Binary(
            crate::prog::BinOp::Or,
            Box::new(rhs),
            Box::new(one),
        )),
    )
}

fn gen_new_var(ctx: &mut GenContext, rng: &mut RngType) -> Stmt {
    let ty = ctx
        .universe
        .pick_type(rng, ctx.config.pick_ref_prob);

    if let Some(inner) = ctx.universe.ty_of(ty).as_ref().map(|r| r.inner()) {
        // `ref T x = ref <lvalue>;`. Anything visible here outlives this
        // scope, so no lower bound on the referent's rank.
        if let Some(src) = lvalue::pick_lvalue(ctx, rng, Some(inner), i32::MIN) {
            let name = ctx.next_var();
            let var = VarIdent {
                name: name.clone().into_boxed_str(),
                ty,
                ref_escape_scope: src.escape,
                read_only: false,
            };
            ctx.scopes.last_mut().unwrap().vars.push(var);
            return Stmt::Decl(DeclStmt {
                name: name.into_boxed_str(),
                ty,
                init: Some(Expr::Ref(Box::new(src.expr))),
            });
        }
        // No referent available; fall through to a plain variable of the
        // inner type.
        return gen_plain_var(ctx, rng, inner);
    }

    gen_plain_var(ctx, rng, ty)
}

fn gen_plain_var(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId) -> Stmt {
    if rng.gen_bool(ctx.config.new_var_is_local_prob) {
        let rhs = expr::gen_expr(ctx, rng, ty);
        let name = ctx.next_var();
        let escape = -ctx.scope_depth();
        let var = VarIdent::new(name.clone(), ty, escape);
        ctx.scopes.last_mut().unwrap().vars.push(var);
        Stmt::Decl(DeclStmt {
            name: name.into_boxed_str(),
            ty,
            init: Some(rhs),
        })
    } else {
        let var = ctx.statics.generate_new_field(
            rng,
            &mut ctx.universe,
            ctx.config,
            Some(ty),
        );
        let rhs = expr::gen_expr(ctx, rng, ty);
        Stmt::Assign(AssignStmt {
            lhs: Expr::StaticRef(var.name),
            op: AssignOp::Assign,
            rhs,
        })
    }
}
