//! Type-directed program synthesis.
//!
//! [`gen_program`] drives everything: it builds the type universe, then
//! function 0, growing further functions on demand when call sites decide
//! to synthesize a new callee. All randomness flows through the one
//! `RngType` passed in, so a seed fully determines the output.

use crate::{
    checksum,
    config::GenConfig,
    prog::{
        CallExpr, Expr, Func, FuncId, FuncKind, InterfaceMethod, Program, Receiver, Stmt, VarIdent,
    },
    statics::StaticsPool,
    ty::TypeId,
    universe::TypeUniverse,
    HashMap, RngType,
};
use rand::prelude::*;

pub mod assign;
pub mod block;
pub mod call;
pub mod expr;
pub mod lvalue;

/// One lexical scope: the variables declared in it.
#[derive(Debug, Default)]
pub struct ScopeFrame {
    pub vars: Vec<VarIdent>,
}

/// All state of one generation run.
pub struct GenContext<'a> {
    pub(crate) config: &'a GenConfig,
    pub(crate) universe: TypeUniverse,
    pub(crate) statics: StaticsPool,
    pub(crate) funcs: Vec<Func>,
    pub(crate) interface_methods: Vec<InterfaceMethod>,
    /// Scope stack of the function currently being generated.
    pub(crate) scopes: Vec<ScopeFrame>,
    pub(crate) cur_func: FuncId,
    /// Monotonic counters for local names, method names and checksum sites.
    pub(crate) var_counter: usize,
    pub(crate) method_counter: usize,
    pub(crate) site_counter: usize,
    /// Non-zero while generating a finally block; returns are forbidden.
    pub(crate) finally_depth: usize,
    /// Statements emitted so far over the whole program.
    pub(crate) stmt_total: usize,
    /// Expression nesting depth, for recursion rejection.
    pub(crate) expr_depth: usize,
    pub(crate) checksum: bool,
}

impl<'a> GenContext<'a> {
    fn new(rng: &mut RngType, config: &'a GenConfig, checksum: bool) -> Self {
        Self {
            config,
            universe: TypeUniverse::generate(rng, config),
            statics: StaticsPool::new(),
            funcs: Vec::new(),
            interface_methods: Vec::new(),
            scopes: Vec::new(),
            cur_func: 0,
            var_counter: 0,
            method_counter: 0,
            site_counter: 0,
            finally_depth: 0,
            stmt_total: 0,
            expr_depth: 0,
            checksum,
        }
    }

    #[inline]
    pub(crate) fn cur(&self) -> &Func {
        &self.funcs[self.cur_func]
    }

    /// Depth of the current scope stack; locals declared now get escape
    /// scope `-depth`.
    #[inline]
    pub(crate) fn scope_depth(&self) -> i32 {
        self.scopes.len() as i32
    }

    pub(crate) fn next_var(&mut self) -> String {
        let name = format!("var{}", self.var_counter);
        self.var_counter += 1;
        name
    }

    pub(crate) fn next_site(&mut self) -> String {
        let site = format!("c_{}", self.site_counter);
        self.site_counter += 1;
        site
    }

    fn next_method(&mut self) -> String {
        let name = format!("M{}", self.method_counter);
        self.method_counter += 1;
        name
    }

    /// Record one call from the current function to `callee`, folding the
    /// callee's transitive counts into the caller's.
    pub(crate) fn note_call(&mut self, callee: FuncId) {
        let callee_counts: Vec<(FuncId, u64)> = self.funcs[callee]
            .call_counts
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect();
        let counts = &mut self.funcs[self.cur_func].call_counts;
        *counts.entry(callee).or_default() += 1;
        for (g, n) in callee_counts {
            *counts.entry(g).or_default() += n;
        }
    }

    /// Generate a whole new function and return its id. The caller's scope
    /// stack is stashed away while the callee's body is produced.
    pub(crate) fn gen_func(
        &mut self,
        rng: &mut RngType,
        kind: FuncKind,
        name: String,
        ret: Option<TypeId>,
        params: Vec<VarIdent>,
    ) -> FuncId {
        let id = self.funcs.len();
        self.funcs.push(Func {
            name: name.into_boxed_str(),
            ret,
            params: params.clone(),
            body: Vec::new(),
            kind,
            call_counts: HashMap::new(),
            is_entry: false,
        });

        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_cur = self.cur_func;
        let saved_finally = self.finally_depth;
        let saved_depth = self.expr_depth;
        self.cur_func = id;
        self.finally_depth = 0;
        self.expr_depth = 0;

        let target = block::block_stmt_target(rng, self.config);
        let body = block::gen_block(self, rng, params, true, target);
        self.funcs[id].body = body;

        self.scopes = saved_scopes;
        self.cur_func = saved_cur;
        self.finally_depth = saved_finally;
        self.expr_depth = saved_depth;
        id
    }

    /// Random signature for a fresh callee: parameter count from the
    /// configured distribution, each possibly by-ref, and a return type
    /// that may itself be by-ref.
    pub(crate) fn gen_signature(
        &mut self,
        rng: &mut RngType,
        forced_ret: Option<Option<TypeId>>,
    ) -> (Option<TypeId>, Vec<VarIdent>) {
        let ret = match forced_ret {
            Some(r) => r,
            None => {
                if rng.gen_bool(self.config.void_ret_prob) {
                    None
                } else {
                    let by_ref_prob = if rng.gen_bool(self.config.ret_ref_prob) {
                        1.0
                    } else {
                        0.0
                    };
                    Some(self.universe.pick_type(rng, by_ref_prob))
                }
            }
        };
        let count = crate::rng::choose_weighted(rng, &self.config.param_count_weights);
        let mut params = Vec::with_capacity(count);
        for i in 0..count {
            let ty = self
                .universe
                .pick_type(rng, self.config.param_ref_prob);
            let escape = if self.universe.ty_of(ty).is_ref() { 1 } else { 0 };
            params.push(VarIdent::new(format!("arg{}", i), ty, escape));
        }
        (ret, params)
    }

    /// Synthesize a brand-new callee of a random kind. For interface
    /// methods this creates one implementation per implementer and returns
    /// them all; the first entry is the one the call site should use for
    /// naming.
    pub(crate) fn gen_new_callee(
        &mut self,
        rng: &mut RngType,
        forced_ret: Option<Option<TypeId>>,
    ) -> Vec<FuncId> {
        let name = self.next_method();
        let (ret, params) = self.gen_signature(rng, forced_ret);

        if rng.gen_bool(self.config.instance_method_prob) {
            if rng.gen_bool(self.config.interface_method_prob) {
                let candidates: Vec<TypeId> = self
                    .universe
                    .interfaces()
                    .iter()
                    .copied()
                    .filter(|&i| !self.universe.implementers_of(i).is_empty())
                    .collect();
                if let Some(&iface) = candidates.choose(rng) {
                    let impls: Vec<TypeId> = self.universe.implementers_of(iface).to_vec();
                    self.interface_methods.push(InterfaceMethod {
                        iface,
                        name: name.clone().into_boxed_str(),
                        ret,
                        params: params.clone(),
                    });
                    let mut ids = Vec::with_capacity(impls.len());
                    for agg in impls {
                        ids.push(self.gen_func(
                            rng,
                            FuncKind::Instance {
                                on: agg,
                                iface: Some(iface),
                            },
                            name.clone(),
                            ret,
                            params.clone(),
                        ));
                    }
                    return ids;
                }
            }
            let aggs = self.universe.aggregates().to_vec();
            if let Some(&agg) = aggs.choose(rng) {
                return vec![self.gen_func(
                    rng,
                    FuncKind::Instance {
                        on: agg,
                        iface: None,
                    },
                    name,
                    ret,
                    params,
                )];
            }
        }
        vec![self.gen_func(rng, FuncKind::Static, name, ret, params)]
    }
}

/// Generate a complete program from `seed`.
pub fn gen_program(seed: u64, config: &GenConfig, checksum: bool) -> Program {
    let mut rng = RngType::seed_from_u64(seed);
    let mut ctx = GenContext::new(&mut rng, config, checksum);

    let name = ctx.next_method();
    ctx.gen_func(&mut rng, FuncKind::Static, name, None, Vec::new());

    let entry = gen_entry(&mut ctx);
    ctx.funcs.push(entry);

    Program {
        universe: ctx.universe,
        statics: ctx.statics.into_fields(),
        funcs: ctx.funcs,
        interface_methods: ctx.interface_methods,
        seed,
        uses_runtime: checksum,
    }
}

/// The synthetic entry point: store the injected runtime object, invoke
/// function 0, then checksum every static field.
fn gen_entry(ctx: &mut GenContext) -> Func {
    let mut body = vec![Stmt::Expr(Expr::Call(CallExpr {
        callee: ctx.funcs[0].name.clone(),
        receiver: Receiver::None,
        args: Vec::new(),
    }))];
    if ctx.checksum {
        let statics: Vec<VarIdent> = ctx.statics.fields().iter().map(|f| f.var.clone()).collect();
        for var in &statics {
            let site_stmts = checksum::checksums_for_var(ctx, var, true);
            body.extend(site_stmts);
        }
    }
    Func {
        name: "Main".to_string().into_boxed_str(),
        ret: None,
        params: Vec::new(),
        body,
        kind: FuncKind::Static,
        call_counts: HashMap::new(),
        is_entry: true,
    }
}
