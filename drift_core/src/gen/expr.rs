//! Type-directed expression generation.
//!
//! Operand kinds for unary and binary operators follow the host language's
//! numeric promotion rules exactly (see [`PrimKind::binary_promoted`] and
//! [`PrimKind::unary_promoted`]); whenever the promoted result kind differs
//! from the requested kind, the expression is wrapped in a cast.

use super::{assign::guard_divisor, call, lvalue, GenContext};
use crate::{
    literal::gen_literal,
    prog::{BinOp, Expr, UnOp},
    rng::choose_weighted,
    ty::{PrimKind, TypeId, TypeKind},
    RngType,
};
use rand::prelude::*;

const INTEGRALS: [PrimKind; 9] = [
    PrimKind::SByte,
    PrimKind::Byte,
    PrimKind::Short,
    PrimKind::UShort,
    PrimKind::Int,
    PrimKind::UInt,
    PrimKind::Long,
    PrimKind::ULong,
    PrimKind::Char,
];

const SHIFT_CARRIERS: [PrimKind; 4] = [
    PrimKind::Int,
    PrimKind::UInt,
    PrimKind::Long,
    PrimKind::ULong,
];

/// Generate an expression whose static type is exactly `ty` (for
/// primitives) or assignable to `ty` (aggregates and interfaces).
pub fn gen_expr(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId) -> Expr {
    ctx.expr_depth += 1;
    let e = gen_expr_inner(ctx, rng, ty);
    ctx.expr_depth -= 1;
    e
}

fn gen_expr_inner(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId) -> Expr {
    let kind = ctx.universe.ty_of(ty).kind();
    let prim = ctx.universe.ty_of(ty).prim_kind();
    let deep = !ctx.config.recursion.allow(rng, ctx.expr_depth);

    for _ in 0..8 {
        match choose_weighted(rng, &ctx.config.expr_kind_weights) {
            0 => {
                if let Some(e) = lvalue::pick_readable(ctx, rng, ty) {
                    return e;
                }
            }
            1 => return gen_literal(rng, &ctx.universe, ctx.config, ty),
            2 => {
                if let Some(k) = prim {
                    if !deep {
                        return gen_unary(ctx, rng, ty, k);
                    }
                }
            }
            3 => {
                if let Some(k) = prim {
                    if !deep {
                        return gen_binary(ctx, rng, ty, k);
                    }
                }
            }
            4 => {
                if !deep {
                    if let Some(bound) = call::gen_call(ctx, rng, Some(ty), None) {
                        return bound.expr;
                    }
                }
            }
            5 | 6 => {
                if let Some(k) = prim {
                    if k != PrimKind::Bool {
                        if let Some(lv) = lvalue::pick_lvalue(ctx, rng, Some(ty), i32::MIN) {
                            return Expr::IncDec {
                                target: Box::new(lv.expr),
                                inc: rng.gen(),
                                prefix: rng.gen(),
                            };
                        }
                    }
                }
            }
            _ => {
                if !deep && kind != TypeKind::Prim {
                    return gen_new_object(ctx, rng, ty);
                }
            }
        }
    }
    gen_literal(rng, &ctx.universe, ctx.config, ty)
}

fn gen_new_object(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId) -> Expr {
    match ctx.universe.ty_of(ty).kind() {
        TypeKind::Struct => {
            let field_tys: Vec<TypeId> = ctx
                .universe
                .ty_of(ty)
                .checked_as_struct()
                .fields()
                .iter()
                .map(|f| f.ty)
                .collect();
            let args = field_tys
                .into_iter()
                .map(|fty| gen_expr(ctx, rng, fty))
                .collect();
            Expr::New(ty, args)
        }
        TypeKind::Interface => {
            let impls = ctx.universe.implementers_of(ty).to_vec();
            match impls.choose(rng) {
                Some(&agg) => gen_new_object(ctx, rng, agg),
                None => gen_literal(rng, &ctx.universe, ctx.config, ty),
            }
        }
        TypeKind::Array => {
            let elem = ctx.universe.ty_of(ty).checked_as_array().elem();
            let e = gen_expr(ctx, rng, elem);
            Expr::NewArray(ty, vec![e])
        }
        _ => gen_literal(rng, &ctx.universe, ctx.config, ty),
    }
}

fn gen_unary(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId, kind: PrimKind) -> Expr {
    match kind {
        PrimKind::Bool => {
            let operand = gen_expr(ctx, rng, ty);
            if operand.is_literal() {
                return operand;
            }
            Expr::Unary(UnOp::Not, Box::new(operand))
        }
        PrimKind::Float | PrimKind::Double => {
            let op = *[UnOp::Plus, UnOp::Neg].choose(rng).unwrap();
            let operand = gen_expr(ctx, rng, ty);
            if operand.is_literal() {
                return operand;
            }
            Expr::Unary(op, Box::new(operand))
        }
        _ => {
            let op = *[UnOp::Plus, UnOp::Neg, UnOp::BitNot].choose(rng).unwrap();
            let operand_kind = pick_unary_operand(rng, op, kind);
            let operand_ty = ctx.universe.get_primitive(operand_kind);
            let operand = gen_expr(ctx, rng, operand_ty);
            if operand.is_literal() {
                // A folded constant could overflow the requested kind once
                // cast; drop the operator instead.
                return gen_literal(rng, &ctx.universe, ctx.config, ty);
            }
            let result = unary_result(op, operand_kind);
            let e = Expr::Unary(op, Box::new(operand));
            if result == kind {
                e
            } else {
                Expr::Cast(ty, Box::new(e))
            }
        }
    }
}

fn pick_unary_operand(rng: &mut RngType, op: UnOp, want: PrimKind) -> PrimKind {
    // Prefer the requested kind when the operator accepts it.
    let valid = |k: PrimKind| !(op == UnOp::Neg && k == PrimKind::ULong);
    if valid(want) && rng.gen_ratio(4, 5) {
        return want;
    }
    loop {
        let k = *INTEGRALS.choose(rng).unwrap();
        if valid(k) {
            return k;
        }
    }
}

fn unary_result(op: UnOp, operand: PrimKind) -> PrimKind {
    if op == UnOp::Neg && operand == PrimKind::UInt {
        return PrimKind::Long;
    }
    operand.unary_promoted()
}

fn gen_binary(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId, kind: PrimKind) -> Expr {
    match kind {
        PrimKind::Bool => gen_bool_binary(ctx, rng, ty),
        PrimKind::Float | PrimKind::Double => gen_float_binary(ctx, rng, ty, kind),
        _ => gen_integral_binary(ctx, rng, ty, kind),
    }
}

fn gen_bool_binary(ctx: &mut GenContext, rng: &mut RngType, bool_ty: TypeId) -> Expr {
    if rng.gen_ratio(3, 5) {
        // Relational over a numeric operand pair.
        let op = *[
            BinOp::Eq,
            BinOp::Ne,
            BinOp::Lt,
            BinOp::Le,
            BinOp::Gt,
            BinOp::Ge,
        ]
        .choose(rng)
        .unwrap();
        let (a, b) = pick_operand_kinds(ctx, rng);
        let (lhs, rhs) = gen_operands(ctx, rng, a, b);
        match reject_const_pair(ctx, rng, lhs, rhs, a) {
            Some((lhs, rhs)) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
            None => gen_literal(rng, &ctx.universe, ctx.config, bool_ty),
        }
    } else {
        let op = *[
            BinOp::LogAnd,
            BinOp::LogOr,
            BinOp::And,
            BinOp::Or,
            BinOp::Xor,
            BinOp::Eq,
            BinOp::Ne,
        ]
        .choose(rng)
        .unwrap();
        let lhs = gen_expr(ctx, rng, bool_ty);
        let rhs = gen_expr(ctx, rng, bool_ty);
        match reject_const_pair(ctx, rng, lhs, rhs, PrimKind::Bool) {
            Some((lhs, rhs)) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
            None => gen_literal(rng, &ctx.universe, ctx.config, bool_ty),
        }
    }
}

fn gen_float_binary(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId, kind: PrimKind) -> Expr {
    // No float division: the zero guard is an integral `| 1`, and float
    // remainders are NaN bait.
    let op = *[BinOp::Add, BinOp::Sub, BinOp::Mul].choose(rng).unwrap();
    // Mixing in an integral operand is fine, the pair promotes to the
    // float kind anyway.
    let other = if rng.gen_bool(ctx.config.mixed_operands_prob) {
        *INTEGRALS.choose(rng).unwrap()
    } else {
        kind
    };
    let result = PrimKind::binary_promoted(kind, other).unwrap();
    let (lhs, rhs) = if rng.gen() {
        gen_operands(ctx, rng, kind, other)
    } else {
        gen_operands(ctx, rng, other, kind)
    };
    match reject_const_pair(ctx, rng, lhs, rhs, kind) {
        Some((lhs, rhs)) => {
            let e = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            if result == kind {
                e
            } else {
                Expr::Cast(ty, Box::new(e))
            }
        }
        None => gen_literal(rng, &ctx.universe, ctx.config, ty),
    }
}

fn gen_integral_binary(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId, kind: PrimKind) -> Expr {
    let op = *[
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Rem,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
        BinOp::Shl,
        BinOp::Shr,
    ]
    .choose(rng)
    .unwrap();

    if op.is_shift() {
        let carrier = *SHIFT_CARRIERS.choose(rng).unwrap();
        let carrier_ty = ctx.universe.get_primitive(carrier);
        let int_ty = ctx.universe.get_primitive(PrimKind::Int);
        let lhs = gen_expr(ctx, rng, carrier_ty);
        let rhs = gen_expr(ctx, rng, int_ty);
        let (lhs, rhs) = match reject_const_pair(ctx, rng, lhs, rhs, carrier) {
            Some(pair) => pair,
            None => return gen_literal(rng, &ctx.universe, ctx.config, ty),
        };
        let e = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        return if carrier == kind {
            e
        } else {
            Expr::Cast(ty, Box::new(e))
        };
    }

    let (a, b) = pick_operand_kinds(ctx, rng);
    let result = PrimKind::binary_promoted(a, b).unwrap();
    let (lhs, rhs) = gen_operands(ctx, rng, a, b);
    let (lhs, mut rhs) = match reject_const_pair(ctx, rng, lhs, rhs, a) {
        Some(pair) => pair,
        None => return gen_literal(rng, &ctx.universe, ctx.config, ty),
    };
    if op.is_div_rem() {
        let b_ty = ctx.universe.get_primitive(b);
        let int_ty = ctx.universe.get_primitive(PrimKind::Int);
        rhs = guard_divisor(b_ty, int_ty, rhs);
    }
    let e = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    if result == kind {
        e
    } else {
        Expr::Cast(ty, Box::new(e))
    }
}

/// A valid operand kind pair: identical kinds most of the time, otherwise
/// any pair the promotion table accepts.
fn pick_operand_kinds(ctx: &GenContext, rng: &mut RngType) -> (PrimKind, PrimKind) {
    let a = *INTEGRALS.choose(rng).unwrap();
    if !rng.gen_bool(ctx.config.mixed_operands_prob) {
        return (a, a);
    }
    let candidates: Vec<PrimKind> = INTEGRALS
        .iter()
        .copied()
        .filter(|&b| PrimKind::binary_promoted(a, b).is_some())
        .collect();
    (a, *candidates.choose(rng).unwrap())
}

fn gen_operands(
    ctx: &mut GenContext,
    rng: &mut RngType,
    a: PrimKind,
    b: PrimKind,
) -> (Expr, Expr) {
    let a_ty = ctx.universe.get_primitive(a);
    let b_ty = ctx.universe.get_primitive(b);
    let lhs = gen_expr(ctx, rng, a_ty);
    let rhs = gen_expr(ctx, rng, b_ty);
    (lhs, rhs)
}

/// The compiler folds `literal op literal` and may reject the fold
/// (overflow in a constant expression), so such pairs are repaired by
/// swapping one side for a variable path, or rejected outright.
fn reject_const_pair(
    ctx: &mut GenContext,
    rng: &mut RngType,
    lhs: Expr,
    rhs: Expr,
    lhs_kind: PrimKind,
) -> Option<(Expr, Expr)> {
    if !lhs.is_literal() || !rhs.is_literal() {
        return Some((lhs, rhs));
    }
    let lhs_ty = ctx.universe.get_primitive(lhs_kind);
    lvalue::pick_readable(ctx, rng, lhs_ty).map(|path| (path, rhs))
}
