//! L-value enumeration and selection under the ref-escape discipline.

use super::GenContext;
use crate::{
    prog::{Expr, FuncKind, Lit, LitKind, VarIdent},
    ty::{PrimKind, TypeId, TypeKind},
    universe::TypeUniverse,
    RngType,
};
use rand::prelude::*;

/// An assignable path together with its type and lifetime rank.
#[derive(Debug, Clone)]
pub struct LValue {
    pub expr: Expr,
    /// Effective type; by-ref variables are lifted to their inner type.
    pub ty: TypeId,
    pub escape: i32,
    pub read_only: bool,
    /// Whether the root is a ref variable (enables ref rebinding).
    pub is_ref_var: bool,
}

/// Every path reachable from visible variables, statics and (in instance
/// methods) `this` fields. Paths through class fields or array elements
/// live on the heap and escape everywhere.
pub fn collect_lvalues(ctx: &GenContext, want: Option<TypeId>, min_escape: i32) -> Vec<LValue> {
    let mut out = Vec::new();
    let universe = &ctx.universe;
    let max_depth = ctx.config.max_path_depth;

    for frame in &ctx.scopes {
        for var in &frame.vars {
            add_var_paths(universe, var, Expr::Var(var.name.clone()), max_depth, &mut out);
        }
    }
    for field in ctx.statics.fields() {
        add_var_paths(
            universe,
            &field.var,
            Expr::StaticRef(field.var.name.clone()),
            max_depth,
            &mut out,
        );
    }
    if let FuncKind::Instance { on, .. } = ctx.cur().kind {
        let s = universe.ty_of(on).checked_as_struct();
        // In a class method `this` points into the heap; in a struct
        // method it behaves like an ordinary parameter.
        let escape = if s.is_class() { i32::MAX } else { 0 };
        for f in s.fields() {
            add_paths(
                universe,
                Expr::Field(Box::new(Expr::This), f.name.clone()),
                f.ty,
                escape,
                false,
                max_depth,
                &mut out,
            );
        }
    }

    out.retain(|lv| {
        lv.escape >= min_escape && want.map(|t| lv.ty == t).unwrap_or(true)
    });
    out
}

fn add_var_paths(
    universe: &TypeUniverse,
    var: &VarIdent,
    base: Expr,
    max_depth: usize,
    out: &mut Vec<LValue>,
) {
    if let Some(r) = universe.ty_of(var.ty).as_ref() {
        // A ref variable reads and writes through to its referent; its
        // rank was recorded when the ref was taken.
        out.push(LValue {
            expr: base.clone(),
            ty: r.inner(),
            escape: var.ref_escape_scope,
            read_only: var.read_only,
            is_ref_var: true,
        });
        descend(
            universe,
            base,
            r.inner(),
            var.ref_escape_scope,
            var.read_only,
            max_depth,
            out,
        );
    } else {
        add_paths(
            universe,
            base,
            var.ty,
            var.ref_escape_scope,
            var.read_only,
            max_depth,
            out,
        );
    }
}

fn add_paths(
    universe: &TypeUniverse,
    expr: Expr,
    ty: TypeId,
    escape: i32,
    read_only: bool,
    depth_left: usize,
    out: &mut Vec<LValue>,
) {
    out.push(LValue {
        expr: expr.clone(),
        ty,
        escape,
        read_only,
        is_ref_var: false,
    });
    descend(universe, expr, ty, escape, read_only, depth_left, out);
}

fn descend(
    universe: &TypeUniverse,
    expr: Expr,
    ty: TypeId,
    escape: i32,
    read_only: bool,
    depth_left: usize,
    out: &mut Vec<LValue>,
) {
    if depth_left == 0 {
        return;
    }
    match universe.ty_of(ty).kind() {
        TypeKind::Struct => {
            let s = universe.ty_of(ty).checked_as_struct();
            let (field_escape, field_ro) = if s.is_class() {
                (i32::MAX, false)
            } else {
                (escape, read_only)
            };
            for f in s.fields().to_vec() {
                add_paths(
                    universe,
                    Expr::Field(Box::new(expr.clone()), f.name.clone()),
                    f.ty,
                    field_escape,
                    field_ro,
                    depth_left - 1,
                    out,
                );
            }
        }
        TypeKind::Array => {
            let arr = universe.ty_of(ty).checked_as_array();
            let int_ty = universe.get_primitive(PrimKind::Int);
            let indices = (0..arr.rank())
                .map(|_| {
                    Expr::Lit(Lit {
                        ty: int_ty,
                        kind: LitKind::Int(0),
                    })
                })
                .collect();
            add_paths(
                universe,
                Expr::Index(Box::new(expr), indices),
                arr.elem(),
                i32::MAX,
                false,
                depth_left - 1,
                out,
            );
        }
        _ => {}
    }
}

/// Pick a writable l-value of type `want` (any type if `None`) with rank at
/// least `min_escape`.
pub fn pick_lvalue(
    ctx: &GenContext,
    rng: &mut RngType,
    want: Option<TypeId>,
    min_escape: i32,
) -> Option<LValue> {
    let mut candidates = collect_lvalues(ctx, want, min_escape);
    candidates.retain(|lv| !lv.read_only);
    candidates.choose(rng).cloned()
}

/// Like [`pick_lvalue`], but guaranteed to succeed: if nothing matches, a
/// fresh static of the wanted type is created (statics outrank everything).
pub fn gen_lvalue(ctx: &mut GenContext, rng: &mut RngType, ty: TypeId, min_escape: i32) -> LValue {
    if let Some(lv) = pick_lvalue(ctx, rng, Some(ty), min_escape) {
        return lv;
    }
    let var = ctx
        .statics
        .generate_new_field(rng, &mut ctx.universe, ctx.config, Some(ty));
    LValue {
        expr: Expr::StaticRef(var.name),
        ty,
        escape: i32::MAX,
        read_only: false,
        is_ref_var: false,
    }
}

/// A readable path of exactly `want`, or of any aggregate implementing it
/// when `want` is an interface.
pub fn pick_readable(ctx: &GenContext, rng: &mut RngType, want: TypeId) -> Option<Expr> {
    let mut candidates = collect_lvalues(ctx, Some(want), i32::MIN);
    if ctx.universe.ty_of(want).kind() == TypeKind::Interface {
        for &agg in ctx.universe.implementers_of(want) {
            candidates.extend(collect_lvalues(ctx, Some(agg), i32::MIN));
        }
    }
    candidates.choose(rng).map(|lv| lv.expr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GenConfig, gen::ScopeFrame, statics::StaticsPool};
    use rand::SeedableRng;

    fn dummy_ctx(config: &GenConfig) -> (GenContext<'_>, crate::RngType) {
        let mut rng = crate::RngType::seed_from_u64(9);
        let universe = TypeUniverse::generate(&mut rng, config);
        let mut ctx = GenContext {
            config,
            universe,
            statics: StaticsPool::new(),
            funcs: vec![crate::prog::Func {
                name: "M0".to_string().into_boxed_str(),
                ret: None,
                params: Vec::new(),
                body: Vec::new(),
                kind: FuncKind::Static,
                call_counts: crate::HashMap::new(),
                is_entry: false,
            }],
            interface_methods: Vec::new(),
            scopes: Vec::new(),
            cur_func: 0,
            var_counter: 0,
            method_counter: 1,
            site_counter: 0,
            finally_depth: 0,
            stmt_total: 0,
            expr_depth: 0,
            checksum: false,
        };
        ctx.scopes.push(ScopeFrame::default());
        (ctx, rng)
    }

    #[test]
    fn escape_filter_drops_locals() {
        let config = GenConfig::default();
        let (mut ctx, mut rng) = dummy_ctx(&config);
        let int = ctx.universe.get_primitive(PrimKind::Int);
        ctx.scopes.last_mut().unwrap().vars.push(VarIdent::new("var0", int, -1));

        let all = collect_lvalues(&ctx, Some(int), i32::MIN);
        assert!(all.iter().any(|lv| matches!(&lv.expr, Expr::Var(n) if &**n == "var0")));
        let escaping = collect_lvalues(&ctx, Some(int), 1);
        assert!(escaping.is_empty());

        // gen_lvalue must fall back to a fresh static when the rank bound
        // filters everything out.
        let lv = gen_lvalue(&mut ctx, &mut rng, int, 1);
        assert_eq!(lv.escape, i32::MAX);
        assert!(matches!(lv.expr, Expr::StaticRef(_)));
    }

    #[test]
    fn readonly_vars_are_never_picked() {
        let config = GenConfig::default();
        let (mut ctx, mut rng) = dummy_ctx(&config);
        let int = ctx.universe.get_primitive(PrimKind::Int);
        ctx.scopes
            .last_mut()
            .unwrap()
            .vars
            .push(VarIdent::new("var0", int, -1).read_only());
        for _ in 0..20 {
            if let Some(lv) = pick_lvalue(&ctx, &mut rng, Some(int), i32::MIN) {
                assert!(!matches!(&lv.expr, Expr::Var(n) if &**n == "var0"));
            }
        }
    }
}
