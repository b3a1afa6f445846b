//! Tuning knobs of the program synthesizer.

use crate::rng::Recursion;

/// All probabilities and distribution tables used during generation.
///
/// Weight arrays are accumulated, ready for
/// [`choose_weighted`](crate::rng::choose_weighted).
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Number of aggregate (struct/class) types to generate.
    pub min_aggregates: usize,
    pub max_aggregates: usize,
    /// Number of interface types to generate.
    pub min_interfaces: usize,
    pub max_interfaces: usize,
    /// Probability that an aggregate is a class rather than a struct.
    pub make_class_prob: f64,
    /// Aggregate field count distribution, weight index i means i + 1 fields.
    pub field_count_weights: Vec<u64>,
    /// Probability that an aggregate field is an array.
    pub field_array_prob: f64,
    /// Probability that a given aggregate implements a given interface.
    pub implement_prob: f64,
    /// Standalone array types added to the pool beyond field types.
    pub extra_array_types: usize,
    /// Probability that an extra array type gets rank 2 instead of 1.
    pub array_rank2_prob: f64,

    /// Function parameter count distribution, index i means i parameters.
    pub param_count_weights: Vec<u64>,
    /// Probability that a parameter is by-ref.
    pub param_ref_prob: f64,
    /// Probability that a function returns void.
    pub void_ret_prob: f64,
    /// Probability that a non-void return type is by-ref.
    pub ret_ref_prob: f64,
    /// Hard cap on the number of generated functions.
    pub max_funcs: usize,
    /// Probability that a call site synthesizes a brand-new callee.
    pub new_callee_prob: f64,
    /// Budget on one function's transitive invocation count.
    pub max_total_calls: u64,
    /// Probability that a new callee is an instance method.
    pub instance_method_prob: f64,
    /// Probability that a new instance method is declared on an interface.
    pub interface_method_prob: f64,

    /// Block statement count distribution, index i means i + 1 statements.
    pub block_stmt_count_weights: Vec<u64>,
    /// Minimum statement total for the whole program; the root block of
    /// function 0 keeps producing statements until this is reached.
    pub program_min_stmts: usize,
    /// Statement kind weights: block, assign, call, if, try-finally, loop,
    /// return.
    pub stmt_kind_weights: [u64; 7],
    /// Expression kind weights: member access, literal, unary, binary, call,
    /// increment, decrement, new object.
    pub expr_kind_weights: [u64; 8],

    /// Probability that an assignment declares a new variable.
    pub new_local_prob: f64,
    /// Probability that a new variable is a local rather than a static.
    pub new_var_is_local_prob: f64,
    /// Probability that picking a type wraps it in a by-ref.
    pub pick_ref_prob: f64,
    /// Probability that assigning to a ref l-value rebinds the ref.
    pub ref_reassign_prob: f64,
    /// Probability of a compound assignment operator over plain `=`.
    pub compound_assign_prob: f64,
    /// Probability that binary operands mix two different primitive kinds.
    pub mixed_operands_prob: f64,

    /// Probability that a primitive literal is a special value
    /// (0, 1, -1, min, max) instead of uniform.
    pub special_literal_prob: f64,
    /// Maximum depth when enumerating member-access paths.
    pub max_path_depth: usize,
    /// Attempts at a non-literal `if` condition before giving up.
    pub if_cond_retries: usize,
    /// Bound of generated counted loops.
    pub loop_bound: u8,

    pub recursion: Recursion,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            min_aggregates: 1,
            max_aggregates: 5,
            min_interfaces: 0,
            max_interfaces: 2,
            make_class_prob: 0.5,
            field_count_weights: vec![30, 65, 80, 90, 96, 100],
            field_array_prob: 0.1,
            implement_prob: 0.5,
            extra_array_types: 2,
            array_rank2_prob: 0.05,

            param_count_weights: vec![20, 50, 75, 90, 100],
            param_ref_prob: 0.25,
            void_ret_prob: 0.2,
            ret_ref_prob: 0.1,
            max_funcs: 40,
            new_callee_prob: 0.07,
            max_total_calls: 1000,
            instance_method_prob: 0.15,
            interface_method_prob: 0.25,

            block_stmt_count_weights: vec![15, 40, 60, 75, 85, 92, 96, 99, 100],
            program_min_stmts: 30,
            stmt_kind_weights: [10, 50, 60, 80, 85, 95, 100],
            expr_kind_weights: [42, 62, 69, 87, 97, 98, 99, 100],

            new_local_prob: 0.3,
            new_var_is_local_prob: 0.8,
            pick_ref_prob: 0.1,
            ref_reassign_prob: 0.25,
            compound_assign_prob: 0.3,
            mixed_operands_prob: 0.3,

            special_literal_prob: 0.5,
            max_path_depth: 3,
            if_cond_retries: 20,
            loop_bound: 2,

            recursion: Recursion::default(),
        }
    }
}
