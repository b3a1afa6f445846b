//! Random literals for every type in the universe.

use crate::{
    config::GenConfig,
    prog::{Expr, Lit, LitKind},
    ty::{PrimKind, TypeId, TypeKind},
    universe::TypeUniverse,
    RngType,
};
use rand::prelude::*;

/// Produce a random literal expression of type `ty`.
///
/// Primitives are biased toward the special values 0, 1, -1, min and max;
/// arrays get a fixed length of one with a zero element; aggregates are
/// constructed with one literal per field; interfaces construct a random
/// implementer.
pub fn gen_literal(
    rng: &mut RngType,
    universe: &TypeUniverse,
    config: &GenConfig,
    ty: TypeId,
) -> Expr {
    match universe.ty_of(ty).kind() {
        TypeKind::Prim => Expr::Lit(gen_prim_literal(
            rng,
            ty,
            universe.ty_of(ty).prim_kind().unwrap(),
            config,
        )),
        TypeKind::Array => {
            let elem = universe.ty_of(ty).checked_as_array().elem();
            Expr::NewArray(ty, vec![zero_expr(universe, elem)])
        }
        TypeKind::Struct => {
            let fields: Vec<TypeId> = universe
                .ty_of(ty)
                .checked_as_struct()
                .fields()
                .iter()
                .map(|f| f.ty)
                .collect();
            let args = fields
                .into_iter()
                .map(|fty| gen_literal(rng, universe, config, fty))
                .collect();
            Expr::New(ty, args)
        }
        TypeKind::Interface => {
            let impls = universe.implementers_of(ty);
            let &agg = impls.choose(rng).expect("interface without implementers");
            gen_literal(rng, universe, config, agg)
        }
        TypeKind::Ref => panic!("no literal for by-ref type"),
    }
}

fn gen_prim_literal(rng: &mut RngType, ty: TypeId, kind: PrimKind, config: &GenConfig) -> Lit {
    let lit_kind = match kind {
        PrimKind::Bool => LitKind::Bool(rng.gen()),
        PrimKind::Float | PrimKind::Double => {
            if rng.gen_bool(config.special_literal_prob) {
                LitKind::Float(*[0.0, 1.0, -1.0].choose(rng).unwrap())
            } else {
                LitKind::Float((rng.gen::<f64>() - 0.5) * 2e3)
            }
        }
        PrimKind::Char => {
            if rng.gen_bool(config.special_literal_prob) {
                LitKind::Char(*[0u16, 1, u16::MAX].choose(rng).unwrap())
            } else {
                LitKind::Char(rng.gen())
            }
        }
        _ => {
            let (min, max) = kind.range();
            let val = if rng.gen_bool(config.special_literal_prob) {
                let mut specials = vec![0i128, 1, min, max];
                if kind.signed() {
                    specials.push(-1);
                }
                *specials.choose(rng).unwrap()
            } else {
                rng.gen_range(min..=max)
            };
            LitKind::Int(val)
        }
    };
    Lit { ty, kind: lit_kind }
}

/// The zero value of a primitive, or an empty-ish default for the rest.
pub fn zero_expr(universe: &TypeUniverse, ty: TypeId) -> Expr {
    let kind = match universe.ty_of(ty).prim_kind() {
        Some(PrimKind::Bool) => LitKind::Bool(false),
        Some(PrimKind::Float) | Some(PrimKind::Double) => LitKind::Float(0.0),
        Some(PrimKind::Char) => LitKind::Char(0),
        Some(_) => LitKind::Int(0),
        None => LitKind::Default,
    };
    Expr::Lit(Lit { ty, kind })
}

/// Initializer used when the reducer lifts a declaration to the top of a
/// method: primitive zeros, `default(T)` for everything else.
pub fn default_expr(universe: &TypeUniverse, ty: TypeId) -> Expr {
    zero_expr(universe, ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn literals_are_well_typed() {
        let mut rng = RngType::seed_from_u64(3);
        let config = GenConfig::default();
        let universe = TypeUniverse::generate(&mut rng, &config);
        for kind in crate::ty::ALL_PRIMS {
            let ty = universe.get_primitive(kind);
            for _ in 0..50 {
                match gen_literal(&mut rng, &universe, &config, ty) {
                    Expr::Lit(lit) => {
                        assert_eq!(lit.ty, ty);
                        if let LitKind::Int(v) = lit.kind {
                            let (min, max) = kind.range();
                            assert!(v >= min && v <= max);
                        }
                    }
                    other => panic!("primitive literal produced {:?}", other),
                }
            }
        }
    }

    #[test]
    fn aggregate_literal_covers_every_field() {
        let mut rng = RngType::seed_from_u64(11);
        let config = GenConfig::default();
        let universe = TypeUniverse::generate(&mut rng, &config);
        for &agg in universe.aggregates() {
            let n = universe.ty_of(agg).checked_as_struct().fields().len();
            match gen_literal(&mut rng, &universe, &config, agg) {
                Expr::New(ty, args) => {
                    assert_eq!(ty, agg);
                    assert_eq!(args.len(), n);
                }
                other => panic!("aggregate literal produced {:?}", other),
            }
        }
    }

    #[test]
    fn array_literal_has_single_zero_element() {
        let mut rng = RngType::seed_from_u64(5);
        let config = GenConfig::default();
        let mut universe = TypeUniverse::generate(&mut rng, &config);
        let int = universe.get_primitive(PrimKind::Int);
        let arr = universe.array_of(int, 1);
        match gen_literal(&mut rng, &universe, &config, arr) {
            Expr::NewArray(ty, elems) => {
                assert_eq!(ty, arr);
                assert_eq!(elems.len(), 1);
            }
            other => panic!("array literal produced {:?}", other),
        }
    }
}
