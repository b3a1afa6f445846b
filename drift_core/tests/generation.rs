//! End-to-end properties of generated programs.

use drift_core::{
    config::GenConfig,
    gen::gen_program,
    prog::{AssignOp, BinOp, DeclStmt, Expr, Lit, LitKind, Program, Stmt},
    reduce::visit,
    ty::TypeKind,
};

const SEEDS: [u64; 6] = [0, 1, 42, 1019, 0xdead_beef, u64::MAX];

#[test]
fn generation_is_deterministic() {
    let config = GenConfig::default();
    for seed in SEEDS {
        let a = gen_program(seed, &config, true).display().to_string();
        let b = gen_program(seed, &config, true).display().to_string();
        assert_eq!(a, b, "seed {} is not deterministic", seed);
    }
}

#[test]
fn different_seeds_differ() {
    let config = GenConfig::default();
    let a = gen_program(1, &config, true).display().to_string();
    let b = gen_program(2, &config, true).display().to_string();
    assert_ne!(a, b);
}

#[test]
fn program_reaches_minimum_statement_count() {
    let config = GenConfig::default();
    for seed in SEEDS {
        let p = gen_program(seed, &config, true);
        assert!(
            p.stmt_count() >= config.program_min_stmts,
            "seed {} produced only {} statements",
            seed,
            p.stmt_count()
        );
    }
}

/// Calls may only target functions with a strictly greater id, so the
/// call graph can never contain a cycle.
#[test]
fn call_graph_is_forward_only() {
    let config = GenConfig::default();
    for seed in SEEDS {
        let p = gen_program(seed, &config, true);
        for (id, func) in p.funcs.iter().enumerate() {
            if func.is_entry {
                continue;
            }
            let mut callees = Vec::new();
            for stmt in &func.body {
                collect_callees(stmt, &mut callees);
            }
            for callee in callees {
                for (target_id, target) in p.funcs.iter().enumerate() {
                    if target.name == callee && !target.is_entry {
                        assert!(
                            target_id > id,
                            "seed {}: {} (id {}) calls {} (id {})",
                            seed,
                            func.name,
                            id,
                            callee,
                            target_id
                        );
                    }
                }
            }
        }
    }
}

fn collect_callees(stmt: &Stmt, out: &mut Vec<Box<str>>) {
    for e in stmt_exprs(stmt) {
        e.for_each(&mut |sub| {
            if let Expr::Call(c) = sub {
                out.push(c.callee.clone());
            }
        });
    }
    for block in stmt.child_blocks() {
        for s in block {
            collect_callees(s, out);
        }
    }
}

fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::Decl(d) => d.init.as_ref().into_iter().collect(),
        Stmt::Assign(a) => vec![&a.lhs, &a.rhs],
        Stmt::Expr(e) => vec![e],
        Stmt::If(i) => vec![&i.cond],
        Stmt::Return(r) => r.as_ref().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Every divisor is wrapped in `(T)((rhs) | 1)`, so no generated program
/// can divide by zero.
#[test]
fn divisors_are_guarded() {
    let config = GenConfig::default();
    for seed in SEEDS {
        let p = gen_program(seed, &config, true);
        visit::for_each_expr(&p, &mut |e| {
            if let Expr::Binary(op, _, rhs) = e {
                if op.is_div_rem() {
                    assert!(is_guard(rhs), "seed {}: unguarded divisor {:?}", seed, rhs);
                }
            }
        });
        for func in &p.funcs {
            for stmt in &func.body {
                check_assign_divisors(stmt, seed);
            }
        }
    }
}

fn check_assign_divisors(stmt: &Stmt, seed: u64) {
    if let Stmt::Assign(a) = stmt {
        if matches!(a.op, AssignOp::Div | AssignOp::Rem) {
            assert!(
                is_guard(&a.rhs),
                "seed {}: unguarded compound divisor {:?}",
                seed,
                a.rhs
            );
        }
    }
    for block in stmt.child_blocks() {
        for s in block {
            check_assign_divisors(s, seed);
        }
    }
}

fn is_guard(e: &Expr) -> bool {
    match e {
        Expr::Cast(_, inner) => matches!(
            &**inner,
            Expr::Binary(BinOp::Or, _, one)
                if matches!(&**one, Expr::Lit(Lit { kind: LitKind::Int(1), .. }))
        ),
        _ => false,
    }
}

/// A returned ref must outlive the returning frame: it is rooted in a
/// static, a by-ref parameter, or the heap.
#[test]
fn ref_returns_outlive_the_frame() {
    let config = GenConfig::default();
    for seed in SEEDS {
        let p = gen_program(seed, &config, true);
        for func in &p.funcs {
            let is_ref_ret = func
                .ret
                .map(|r| p.universe.ty_of(r).is_ref())
                .unwrap_or(false);
            if !is_ref_ret {
                continue;
            }
            let ref_params: Vec<&str> = func
                .params
                .iter()
                .filter(|param| p.universe.ty_of(param.ty).is_ref())
                .map(|param| &*param.name)
                .collect();
            for stmt in &func.body {
                check_ref_returns(stmt, &ref_params, seed);
            }
        }
    }
}

fn check_ref_returns(stmt: &Stmt, ref_params: &[&str], seed: u64) {
    if let Stmt::Return(Some(Expr::Ref(e))) = stmt {
        assert!(
            escapes_frame(e, ref_params),
            "seed {}: ref return of frame-local value {:?}",
            seed,
            e
        );
    }
    for block in stmt.child_blocks() {
        for s in block {
            check_ref_returns(s, ref_params, seed);
        }
    }
}

fn escapes_frame(e: &Expr, ref_params: &[&str]) -> bool {
    match e {
        Expr::StaticRef(_) => true,
        Expr::Var(n) => ref_params.contains(&&**n),
        // Array elements and class fields live on the heap; paths into
        // plain struct locals never reach here by construction.
        Expr::Index(..) => true,
        Expr::Field(base, _) => escapes_frame(base, ref_params) || field_base_is_heap(base),
        Expr::Call(_) => true,
        _ => false,
    }
}

fn field_base_is_heap(base: &Expr) -> bool {
    // Conservative: a field path is accepted if its root is itself an
    // escaping location; bare local roots are only legal for class
    // (heap) bases, which the generator tracks via escape ranks.
    matches!(base, Expr::Var(_) | Expr::Field(..) | Expr::Index(..) | Expr::StaticRef(_))
}

/// With instrumentation on, every primitive local declared in a block is
/// observed by a checksum site in that same block.
#[test]
fn checksums_cover_primitive_locals() {
    let config = GenConfig::default();
    for seed in SEEDS {
        let p = gen_program(seed, &config, true);
        for func in &p.funcs {
            if func.is_entry {
                continue;
            }
            check_block_coverage(&p, &func.body, seed);
        }
    }
}

fn check_block_coverage(p: &Program, block: &[Stmt], seed: u64) {
    for stmt in block {
        if let Stmt::Decl(DeclStmt { name, ty, .. }) = stmt {
            let effective = p
                .universe
                .ty_of(*ty)
                .as_ref()
                .map(|r| r.inner())
                .unwrap_or(*ty);
            if p.universe.ty_of(effective).kind() == TypeKind::Prim {
                assert!(
                    block_checksums_var(block, name),
                    "seed {}: local {} has no checksum site in its block",
                    seed,
                    name
                );
            }
        }
        for child in stmt.child_blocks() {
            check_block_coverage(p, child, seed);
        }
    }
}

fn block_checksums_var(block: &[Stmt], name: &str) -> bool {
    block.iter().any(|s| {
        if let Stmt::Expr(Expr::Checksum { value, .. }) = s {
            let mut found = false;
            value.for_each(&mut |e| {
                if matches!(e, Expr::Var(n) if &**n == name) {
                    found = true;
                }
            });
            found
        } else {
            false
        }
    })
}

/// Statics checksummed by the entry point carry site ids that continue
/// the in-function numbering.
#[test]
fn entry_checksums_every_primitive_static() {
    let config = GenConfig::default();
    let p = gen_program(99, &config, true);
    let entry = p.entry();
    for field in &p.statics {
        if p.universe.ty_of(field.var.ty).kind() != TypeKind::Prim {
            continue;
        }
        let observed = entry.body.iter().any(|s| {
            if let Stmt::Expr(Expr::Checksum { value, .. }) = s {
                matches!(&**value, Expr::StaticRef(n) if *n == field.var.name)
            } else {
                false
            }
        });
        assert!(observed, "static {} is never checksummed", field.var.name);
    }
}
