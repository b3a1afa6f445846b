//! Checksum instrumentation.
//!
//! Every primitive-typed leaf path reachable from a variable gets one call
//! site recording (site id, value); site ids grow monotonically over the
//! whole program, so a pair of runs can be matched site by site.

use crate::{
    gen::GenContext,
    prog::{Expr, Lit, LitKind, Stmt, VarIdent},
    ty::{PrimKind, TypeId, TypeKind},
    universe::TypeUniverse,
};

/// Checksum statements for every variable of the innermost scope frame.
pub fn frame_checksums(ctx: &mut GenContext) -> Vec<Stmt> {
    let vars: Vec<VarIdent> = ctx.scopes.last().unwrap().vars.clone();
    let mut out = Vec::new();
    for var in &vars {
        out.extend(checksums_for_var(ctx, var, false));
    }
    out
}

/// Checksum statements for one variable: one site per primitive leaf.
pub fn checksums_for_var(ctx: &mut GenContext, var: &VarIdent, is_static: bool) -> Vec<Stmt> {
    let base = if is_static {
        Expr::StaticRef(var.name.clone())
    } else {
        Expr::Var(var.name.clone())
    };
    // Ref variables checksum their referent.
    let ty = ctx
        .universe
        .ty_of(var.ty)
        .as_ref()
        .map(|r| r.inner())
        .unwrap_or(var.ty);

    let mut paths = Vec::new();
    prim_leaf_paths(&ctx.universe, base, ty, ctx.config.max_path_depth, &mut paths);

    paths
        .into_iter()
        .map(|value| {
            Stmt::Expr(Expr::Checksum {
                site: ctx.next_site().into_boxed_str(),
                value: Box::new(value),
            })
        })
        .collect()
}

fn prim_leaf_paths(
    universe: &TypeUniverse,
    expr: Expr,
    ty: TypeId,
    depth_left: usize,
    out: &mut Vec<Expr>,
) {
    match universe.ty_of(ty).kind() {
        TypeKind::Prim => out.push(expr),
        TypeKind::Struct if depth_left > 0 => {
            let s = universe.ty_of(ty).checked_as_struct();
            for f in s.fields() {
                prim_leaf_paths(
                    universe,
                    Expr::Field(Box::new(expr.clone()), f.name.clone()),
                    f.ty,
                    depth_left - 1,
                    out,
                );
            }
        }
        TypeKind::Array if depth_left > 0 => {
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
            prim_leaf_paths(
                universe,
                Expr::Index(Box::new(expr), indices),
                arr.elem(),
                depth_left - 1,
                out,
            );
        }
        // The runtime type behind an interface is unknown statically, so
        // interface-typed paths are not observed.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GenConfig, prog::Program};

    fn checksum_sites(p: &Program) -> Vec<String> {
        let mut sites = Vec::new();
        for f in &p.funcs {
            for s in &f.body {
                collect_sites(s, &mut sites);
            }
        }
        sites
    }

    fn collect_sites(stmt: &Stmt, out: &mut Vec<String>) {
        if let Stmt::Expr(Expr::Checksum { site, .. }) = stmt {
            out.push(site.to_string());
        }
        for block in stmt.child_blocks() {
            for s in block {
                collect_sites(s, out);
            }
        }
    }

    #[test]
    fn site_ids_are_unique_and_monotonic_per_function() {
        let p = crate::gen::gen_program(77, &GenConfig::default(), true);
        let sites = checksum_sites(&p);
        assert!(!sites.is_empty());
        let mut seen = crate::HashSet::new();
        for s in &sites {
            assert!(s.starts_with("c_"));
            assert!(seen.insert(s.clone()), "duplicate checksum site {}", s);
        }
    }

    #[test]
    fn disabling_checksum_emits_no_sites() {
        let p = crate::gen::gen_program(77, &GenConfig::default(), false);
        assert!(checksum_sites(&p).is_empty());
        assert!(!p.uses_runtime);
    }
}
