//! Interestingness-preserving program reduction.
//!
//! The reducer never commits a candidate the predicate rejected: every
//! rewrite clones the program, the predicate judges the clone, and only
//! surviving clones replace the current tree. A coarse pass (declaration
//! lifting plus binary-search statement deletion) runs once; the fine pass
//! drives the simplifier catalog to a fixed point.

pub mod simplify;
pub mod visit;

use crate::{
    literal::default_expr,
    prog::{AssignStmt, DeclStmt, Expr, Program, Stmt},
    RngType,
};
use rand::prelude::*;
use simplify::{collect_members, Node, NameAlloc, Simplifier, Target};

pub struct Reducer<F: FnMut(&Program) -> bool> {
    prog: Program,
    pred: F,
    rng: RngType,
    names: NameAlloc,
}

impl<F: FnMut(&Program) -> bool> Reducer<F> {
    /// `pred` must already hold for `prog`; reduction preserves it.
    pub fn new(prog: Program, pred: F) -> Self {
        let rng = RngType::seed_from_u64(prog.seed);
        let names = NameAlloc {
            next: max_var_counter(&prog),
        };
        Self {
            prog,
            pred,
            rng,
            names,
        }
    }

    pub fn reduce(mut self) -> Program {
        self.coarse_lift();
        debug_info!("coarse lift done, {} stmts", self.prog.stmt_count());
        self.coarse_remove();
        debug_info!("coarse removal done, {} stmts", self.prog.stmt_count());
        self.fine_pass();
        debug_info!("fine pass done, {} stmts", self.prog.stmt_count());
        self.prog
    }

    /// Replace each initialized declaration with an assignment and lift a
    /// default-initialized declaration to the top of the method, so the
    /// statement remover can delete pieces of def-use chains.
    fn coarse_lift(&mut self) {
        for i in 0..self.prog.funcs.len() {
            if self.prog.funcs[i].is_entry {
                continue;
            }
            let mut cand = self.prog.clone();
            if !lift_decls(&mut cand, i) {
                continue;
            }
            if (self.pred)(&cand) {
                self.prog = cand;
            }
        }
    }

    /// Binary-search deletion of statement runs, biggest methods first.
    fn coarse_remove(&mut self) {
        let mut order: Vec<usize> = (0..self.prog.funcs.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.prog.funcs[i].descendants()));
        for func in order {
            self.bisect_block(BlockPath {
                func,
                steps: Vec::new(),
            });
        }
    }

    fn bisect_block(&mut self, path: BlockPath) {
        let len = match with_block(&self.prog, &path, |b| b.len()) {
            Some(len) => len,
            None => return,
        };
        self.bisect_range(&path, 0, len);

        // Descend into whatever survived.
        let len = with_block(&self.prog, &path, |b| b.len()).unwrap_or(0);
        for si in 0..len {
            let blocks =
                with_block(&self.prog, &path, |b| b[si].child_blocks().len()).unwrap_or(0);
            for bi in 0..blocks {
                let mut sub = path.clone();
                sub.steps.push((si, bi));
                self.bisect_block(sub);
            }
        }
    }

    fn bisect_range(&mut self, path: &BlockPath, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let mut cand = self.prog.clone();
        let ok = with_block_mut(&mut cand, path, |b| {
            if start + len > b.len() {
                return false;
            }
            b.drain(start..start + len);
            true
        })
        .unwrap_or(false);
        if ok && (self.pred)(&cand) {
            self.prog = cand;
            return;
        }
        if len == 1 {
            return;
        }
        // Later half first, so committed deletions never shift the
        // earlier half's indices.
        let half = len / 2;
        self.bisect_range(path, start + half, len - half);
        self.bisect_range(path, start, half);
    }

    fn fine_pass(&mut self) {
        let mut catalog: Vec<&Simplifier> = simplify::catalog().iter().collect();
        catalog.sort_by_key(|s| s.priority);

        let mut iteration = 0usize;
        loop {
            let late = iteration > 0;
            let mut changed = false;
            changed |= self.pass(Target::Stmt, &catalog, late);
            changed |= self.pass(Target::Expr, &catalog, late);
            changed |= self.pass(Target::Member, &catalog, late);
            iteration += 1;
            if !changed && late {
                break;
            }
        }
    }

    fn pass(&mut self, target: Target, catalog: &[&Simplifier], late: bool) -> bool {
        let mut changed = false;
        'restart: loop {
            let mut nodes = self.enumerate(target);
            nodes.shuffle(&mut self.rng);
            for node in nodes {
                let saved_names = self.names;
                let lists: Vec<Vec<Program>> = catalog
                    .iter()
                    .filter(|s| s.target == target && (!s.late || late))
                    .map(|s| (s.apply)(&self.prog, &node, &mut self.names))
                    .collect();
                let longest = lists.iter().map(|l| l.len()).max().unwrap_or(0);
                // Round-robin across the simplifiers' candidate streams.
                for j in 0..longest {
                    for list in &lists {
                        if let Some(cand) = list.get(j) {
                            if (self.pred)(cand) {
                                self.prog = cand.clone();
                                changed = true;
                                continue 'restart;
                            }
                        }
                    }
                }
                self.names = saved_names;
            }
            break;
        }
        changed
    }

    fn enumerate(&self, target: Target) -> Vec<Node> {
        match target {
            Target::Stmt => (0..visit::count_stmts(&self.prog)).map(Node::Stmt).collect(),
            Target::Expr => (0..visit::count_exprs(&self.prog)).map(Node::Expr).collect(),
            Target::Member => collect_members(&self.prog)
                .into_iter()
                .map(Node::Member)
                .collect(),
        }
    }
}

/// Post-reduction runtime simplification: drop the runtime object plumbing
/// and turn every checksum site into a plain console write.
pub fn runtime_simplification(prog: &mut Program) {
    prog.uses_runtime = false;
    visit::map_exprs(prog, &mut |e| {
        if let Expr::Checksum { value, .. } = e {
            *e = Expr::ConsoleWrite(value.clone());
        }
    });
}

#[derive(Debug, Clone)]
struct BlockPath {
    func: usize,
    steps: Vec<(usize, usize)>,
}

fn with_block<R>(prog: &Program, path: &BlockPath, f: impl FnOnce(&Vec<Stmt>) -> R) -> Option<R> {
    let mut list: &Vec<Stmt> = &prog.funcs[path.func].body;
    for &(si, bi) in &path.steps {
        if si >= list.len() {
            return None;
        }
        list = list[si].child_blocks().into_iter().nth(bi)?;
    }
    Some(f(list))
}

fn with_block_mut<R>(
    prog: &mut Program,
    path: &BlockPath,
    f: impl FnOnce(&mut Vec<Stmt>) -> R,
) -> Option<R> {
    let mut list: &mut Vec<Stmt> = &mut prog.funcs[path.func].body;
    for &(si, bi) in &path.steps {
        if si >= list.len() {
            return None;
        }
        list = list[si].child_blocks_mut().into_iter().nth(bi)?;
    }
    Some(f(list))
}

fn lift_decls(prog: &mut Program, func: usize) -> bool {
    let mut lifted: Vec<DeclStmt> = Vec::new();
    let universe = prog.universe.clone();

    fn walk(
        stmts: &mut Vec<Stmt>,
        lifted: &mut Vec<DeclStmt>,
        universe: &crate::universe::TypeUniverse,
    ) {
        let mut i = 0;
        while i < stmts.len() {
            let replace = match &stmts[i] {
                Stmt::Decl(d)
                    if !universe.ty_of(d.ty).is_ref()
                        && !matches!(d.init, Some(Expr::Ref(_))) =>
                {
                    Some(d.clone())
                }
                _ => None,
            };
            if let Some(d) = replace {
                lifted.push(DeclStmt {
                    name: d.name.clone(),
                    ty: d.ty,
                    init: Some(default_expr(universe, d.ty)),
                });
                match d.init {
                    Some(init) => {
                        stmts[i] = Stmt::Assign(AssignStmt {
                            lhs: Expr::Var(d.name),
                            op: crate::prog::AssignOp::Assign,
                            rhs: init,
                        });
                    }
                    None => {
                        stmts.remove(i);
                        continue;
                    }
                }
            }
            for block in stmts[i].child_blocks_mut() {
                walk(block, lifted, universe);
            }
            i += 1;
        }
    }

    walk(&mut prog.funcs[func].body, &mut lifted, &universe);
    if lifted.is_empty() {
        return false;
    }
    let decls: Vec<Stmt> = lifted.into_iter().map(Stmt::Decl).collect();
    prog.funcs[func].body.splice(0..0, decls);
    true
}

fn max_var_counter(prog: &Program) -> usize {
    let mut max = 0;
    let mut note = |name: &str| {
        if let Some(rest) = name.strip_prefix("var") {
            if let Ok(n) = rest.parse::<usize>() {
                max = max.max(n + 1);
            }
        }
    };
    fn walk(stmt: &Stmt, note: &mut dyn FnMut(&str)) {
        match stmt {
            Stmt::Decl(d) => note(&d.name),
            Stmt::Loop(l) => note(&l.var),
            _ => {}
        }
        for block in stmt.child_blocks() {
            for s in block {
                walk(s, note);
            }
        }
    }
    for func in &prog.funcs {
        for stmt in &func.body {
            walk(stmt, &mut note);
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GenConfig,
        prog::{
            AssignOp, AssignStmt, CallExpr, Func, FuncKind, IfStmt, Lit, LitKind, Receiver,
            StaticField, VarIdent,
        },
        statics::StaticsPool,
        universe::TypeUniverse,
        HashMap,
    };
    use rand::SeedableRng;

    /// A primary-class-only program with the given body for `M0`.
    fn program_with_body(body: Vec<Stmt>, statics: Vec<StaticField>) -> Program {
        let mut rng = RngType::seed_from_u64(0);
        let config = GenConfig {
            min_aggregates: 1,
            max_aggregates: 1,
            min_interfaces: 0,
            max_interfaces: 0,
            extra_array_types: 0,
            ..GenConfig::default()
        };
        let universe = TypeUniverse::generate(&mut rng, &config);
        let m0 = Func {
            name: "M0".to_string().into_boxed_str(),
            ret: None,
            params: Vec::new(),
            body,
            kind: FuncKind::Static,
            call_counts: HashMap::new(),
            is_entry: false,
        };
        let entry = Func {
            name: "Main".to_string().into_boxed_str(),
            ret: None,
            params: Vec::new(),
            body: vec![Stmt::Expr(Expr::Call(CallExpr {
                callee: "M0".to_string().into_boxed_str(),
                receiver: Receiver::None,
                args: Vec::new(),
            }))],
            kind: FuncKind::Static,
            call_counts: HashMap::new(),
            is_entry: true,
        };
        Program {
            universe,
            statics,
            funcs: vec![m0, entry],
            interface_methods: Vec::new(),
            seed: 0,
            uses_runtime: false,
        }
    }

    fn int_static(universe: &TypeUniverse, name: &str) -> StaticField {
        let int = universe.get_primitive(crate::ty::PrimKind::Int);
        StaticField {
            var: VarIdent::new(name, int, i32::MAX),
            init: Expr::Lit(Lit {
                ty: int,
                kind: LitKind::Int(0),
            }),
        }
    }

    fn assign_const(universe: &TypeUniverse, target: &str, value: i128) -> Stmt {
        let int = universe.get_primitive(crate::ty::PrimKind::Int);
        Stmt::Assign(AssignStmt {
            lhs: Expr::StaticRef(target.to_string().into_boxed_str()),
            op: AssignOp::Assign,
            rhs: Expr::Lit(Lit {
                ty: int,
                kind: LitKind::Int(value),
            }),
        })
    }

    fn assigns_value(prog: &Program, value: i128) -> bool {
        let mut found = false;
        visit::for_each_expr(prog, &mut |e| {
            if matches!(e, Expr::Lit(Lit { kind: LitKind::Int(v), .. }) if *v == value) {
                found = true;
            }
        });
        found
    }

    #[test]
    fn if_reduces_to_interesting_branch() {
        let mut rng = RngType::seed_from_u64(1);
        let config = GenConfig::default();
        let mut universe = TypeUniverse::generate(&mut rng, &config);
        let bool_ty = universe.get_primitive(crate::ty::PrimKind::Bool);
        let mut pool = StaticsPool::new();
        let cond_var = pool.generate_new_field(&mut rng, &mut universe, &config, Some(bool_ty));

        let prog = {
            let mut statics = pool.into_fields();
            let a = int_static(&universe, "s_a");
            let b = int_static(&universe, "s_b");
            statics.push(a);
            statics.push(b);
            let body = vec![Stmt::If(IfStmt {
                cond: Expr::StaticRef(cond_var.name.clone()),
                then: vec![assign_const(&universe, "s_a", 42)],
                els: Some(vec![assign_const(&universe, "s_b", 7)]),
            })];
            let mut p = program_with_body(body, statics);
            p.universe = universe.clone();
            p
        };

        let pred = |p: &Program| assigns_value(p, 42) && !assigns_value(p, 7);
        assert!(pred(&prog));
        let reduced = Reducer::new(prog, pred).reduce();
        assert!(pred(&reduced));
        // The if statement itself must be gone, only the then-branch
        // assignment survives.
        let m0 = reduced.func("M0").unwrap();
        assert_eq!(m0.body.len(), 1);
        assert!(matches!(&m0.body[0], Stmt::Assign(_)));
    }

    #[test]
    fn binary_search_removal_converges_to_needle() {
        let mut rng = RngType::seed_from_u64(2);
        let config = GenConfig::default();
        let universe = TypeUniverse::generate(&mut rng, &config);
        let statics = vec![int_static(&universe, "s_0")];
        let body: Vec<Stmt> = (1..=64)
            .map(|i| assign_const(&universe, "s_0", i as i128 * 1000))
            .collect();
        let mut prog = program_with_body(body, statics);
        prog.universe = universe;

        let pred = |p: &Program| assigns_value(p, 42_000);
        assert!(pred(&prog));

        let mut reducer = Reducer::new(prog, pred);
        reducer.coarse_remove();
        let m0 = reducer.prog.func("M0").unwrap();
        assert!(pred(&reducer.prog));
        // Binary search over 64 statements keeps the needle plus at most
        // log-many stragglers.
        assert!(
            m0.body.len() <= 7,
            "expected <= 7 surviving statements, got {}",
            m0.body.len()
        );
    }

    #[test]
    fn fixed_point_is_idempotent() {
        let mut rng = RngType::seed_from_u64(3);
        let config = GenConfig::default();
        let universe = TypeUniverse::generate(&mut rng, &config);
        let statics = vec![int_static(&universe, "s_0")];
        let body = vec![
            assign_const(&universe, "s_0", 42),
            assign_const(&universe, "s_0", 5),
            Stmt::Block(vec![assign_const(&universe, "s_0", 6)]),
        ];
        let mut prog = program_with_body(body, statics);
        prog.universe = universe;

        let pred = |p: &Program| assigns_value(p, 42);
        let reduced = Reducer::new(prog, pred).reduce();
        assert!(pred(&reduced));
        let again = Reducer::new(reduced.clone(), pred).reduce();
        assert_eq!(
            again.display().to_string(),
            reduced.display().to_string()
        );
    }

    #[test]
    fn runtime_simplification_rewrites_checksums() {
        let p = crate::gen::gen_program(21, &GenConfig::default(), true);
        let mut p = p;
        runtime_simplification(&mut p);
        assert!(!p.uses_runtime);
        let mut any_checksum = false;
        let mut any_write = false;
        visit::for_each_expr(&p, &mut |e| match e {
            Expr::Checksum { .. } => any_checksum = true,
            Expr::ConsoleWrite(_) => any_write = true,
            _ => {}
        });
        assert!(!any_checksum);
        assert!(any_write);
        let src = p.display().to_string();
        assert!(src.contains("System.Console.WriteLine("));
        assert!(!src.contains("s_rt"));
    }

    #[test]
    fn lifting_enables_removal_of_initializers() {
        let mut rng = RngType::seed_from_u64(4);
        let config = GenConfig::default();
        let universe = TypeUniverse::generate(&mut rng, &config);
        let int = universe.get_primitive(crate::ty::PrimKind::Int);
        let statics = vec![int_static(&universe, "s_0")];
        let body = vec![
            Stmt::Decl(DeclStmt {
                name: "var0".to_string().into_boxed_str(),
                ty: int,
                init: Some(Expr::Lit(Lit {
                    ty: int,
                    kind: LitKind::Int(5),
                })),
            }),
            assign_const(&universe, "s_0", 42),
        ];
        let mut prog = program_with_body(body, statics);
        prog.universe = universe;

        let pred = |p: &Program| assigns_value(p, 42);
        let mut reducer = Reducer::new(prog, pred);
        reducer.coarse_lift();
        let m0 = reducer.prog.func("M0").unwrap();
        assert!(matches!(
            &m0.body[0],
            Stmt::Decl(DeclStmt { init: Some(Expr::Lit(Lit { kind: LitKind::Int(0), .. })), .. })
        ));
        assert!(matches!(&m0.body[1], Stmt::Assign(_)));
    }
}
