//! The finite pool of types available to one generated program.

use crate::{
    config::GenConfig,
    rng::choose_weighted,
    ty::{ArrayTy, FieldDef, InterfaceTy, PrimKind, PrimTy, StructTy, Type, TypeId, ALL_PRIMS},
    HashMap, HashSet, RngType,
};
use rand::prelude::*;

/// All types of one program: primitives, generated aggregates and
/// interfaces, array types, and interned by-ref views.
#[derive(Debug, Clone, Default)]
pub struct TypeUniverse {
    tys: Vec<Type>,
    prims: HashMap<PrimKind, TypeId>,
    aggregates: Vec<TypeId>,
    interfaces: Vec<TypeId>,
    arrays: Vec<TypeId>,
    refs: HashMap<TypeId, TypeId>,
    implementers: HashMap<TypeId, Vec<TypeId>>,
    removed: HashSet<TypeId>,
}

impl TypeUniverse {
    /// Build the type pool for a fresh program.
    pub fn generate(rng: &mut RngType, config: &GenConfig) -> Self {
        let mut universe = Self::default();
        for kind in ALL_PRIMS {
            let id = universe.tys.len();
            universe.tys.push(PrimTy::new(id, kind).into());
            universe.prims.insert(kind, id);
        }

        let num_ifaces = rng.gen_range(config.min_interfaces..=config.max_interfaces);
        for i in 0..num_ifaces {
            let id = universe.tys.len();
            universe.tys.push(InterfaceTy::new(id, format!("I{}", i)).into());
            universe.interfaces.push(id);
            universe.implementers.insert(id, Vec::new());
        }

        let num_aggs = rng.gen_range(config.min_aggregates..=config.max_aggregates);
        for i in 0..num_aggs {
            universe.gen_aggregate(rng, config, i);
        }

        for _ in 0..config.extra_array_types {
            let elem = universe.pick_element_type(rng);
            let rank = if rng.gen_bool(config.array_rank2_prob) {
                2
            } else {
                1
            };
            universe.array_of(elem, rank);
        }

        universe
    }

    fn gen_aggregate(&mut self, rng: &mut RngType, config: &GenConfig, index: usize) {
        let is_class = rng.gen_bool(config.make_class_prob);
        let num_fields = choose_weighted(rng, &config.field_count_weights) + 1;
        let mut fields = Vec::with_capacity(num_fields);
        for f in 0..num_fields {
            let ty = if rng.gen_bool(config.field_array_prob) {
                let elem = self.pick_element_type(rng);
                self.array_of(elem, 1)
            } else {
                // Forward reference only: primitives or aggregates that
                // already exist, so the field graph stays acyclic.
                self.pick_field_type(rng)
            };
            fields.push(FieldDef {
                name: format!("F{}", f).into_boxed_str(),
                ty,
            });
        }
        let mut implements = Vec::new();
        for iface in self.interfaces.clone() {
            if rng.gen_bool(config.implement_prob) {
                implements.push(iface);
            }
        }
        let id = self.tys.len();
        for iface in &implements {
            self.implementers.get_mut(iface).unwrap().push(id);
        }
        self.tys.push(
            StructTy::new(id, format!("S{}", index), is_class, fields, implements).into(),
        );
        self.aggregates.push(id);
    }

    fn pick_field_type(&self, rng: &mut RngType) -> TypeId {
        if !self.aggregates.is_empty() && rng.gen_ratio(1, 4) {
            *self.aggregates.choose(rng).unwrap()
        } else {
            self.prims[ALL_PRIMS.choose(rng).unwrap()]
        }
    }

    fn pick_element_type(&self, rng: &mut RngType) -> TypeId {
        self.pick_field_type(rng)
    }

    /// Intern the array type over `elem` with the given rank.
    pub fn array_of(&mut self, elem: TypeId, rank: u8) -> TypeId {
        if let Some(existing) = self.arrays.iter().copied().find(|&id| {
            let arr = self.tys[id].checked_as_array();
            arr.elem() == elem && arr.rank() == rank
        }) {
            return existing;
        }
        let id = self.tys.len();
        let elem_name = self.tys[elem].name().to_owned();
        self.tys.push(ArrayTy::new(id, &elem_name, elem, rank).into());
        self.arrays.push(id);
        id
    }

    /// Intern the by-ref view of `inner`. `inner` must not itself be a ref.
    pub fn ref_of(&mut self, inner: TypeId) -> TypeId {
        debug_assert!(!self.tys[inner].is_ref());
        if let Some(&id) = self.refs.get(&inner) {
            return id;
        }
        let id = self.tys.len();
        let inner_name = self.tys[inner].name().to_owned();
        self.tys
            .push(crate::ty::RefTy::new(id, &inner_name, inner).into());
        self.refs.insert(inner, id);
        id
    }

    #[inline(always)]
    pub fn ty_of(&self, id: TypeId) -> &Type {
        &self.tys[id]
    }

    pub fn ty_of_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.tys[id]
    }

    #[inline(always)]
    pub fn get_primitive(&self, kind: PrimKind) -> TypeId {
        self.prims[&kind]
    }

    #[inline(always)]
    pub fn aggregates(&self) -> &[TypeId] {
        &self.aggregates
    }

    #[inline(always)]
    pub fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }

    #[inline(always)]
    pub fn arrays(&self) -> &[TypeId] {
        &self.arrays
    }

    pub fn implementers_of(&self, iface: TypeId) -> &[TypeId] {
        self.implementers
            .get(&iface)
            .map(|v| &v[..])
            .unwrap_or(&[])
    }

    /// Live (not reduced-away) declared types, in declaration order.
    pub fn declared_types(&self) -> impl Iterator<Item = &Type> {
        self.interfaces
            .iter()
            .chain(self.aggregates.iter())
            .filter(|id| !self.removed.contains(*id))
            .map(|&id| &self.tys[id])
    }

    pub fn is_removed(&self, id: TypeId) -> bool {
        self.removed.contains(&id)
    }

    /// Drop a declared type from the printed program. The caller is
    /// responsible for making sure nothing references it anymore.
    pub fn remove_type(&mut self, id: TypeId) {
        self.removed.insert(id);
        for impls in self.implementers.values_mut() {
            impls.retain(|&s| s != id);
        }
    }

    /// Pick a variable type: primitives most of the time, aggregates,
    /// arrays and implemented interfaces the rest. With `by_ref_prob`,
    /// the picked type is wrapped in a by-ref view.
    pub fn pick_type(&mut self, rng: &mut RngType, by_ref_prob: f64) -> TypeId {
        const WEIGHTS: [u64; 4] = [60, 85, 95, 100];
        let id = loop {
            match choose_weighted(rng, &WEIGHTS) {
                0 => break self.prims[ALL_PRIMS.choose(rng).unwrap()],
                1 => {
                    if let Some(&id) = self.aggregates.choose(rng) {
                        break id;
                    }
                }
                2 => {
                    if let Some(&id) = self.arrays.choose(rng) {
                        break id;
                    }
                }
                _ => {
                    let with_impls: Vec<TypeId> = self
                        .interfaces
                        .iter()
                        .copied()
                        .filter(|i| !self.implementers_of(*i).is_empty())
                        .collect();
                    if let Some(&id) = with_impls.choose(rng) {
                        break id;
                    }
                }
            }
        };
        if by_ref_prob > 0.0 && rng.gen_bool(by_ref_prob) {
            self.ref_of(id)
        } else {
            id
        }
    }

    /// Pick a primitive type satisfying `pred`.
    pub fn pick_primitive(
        &self,
        rng: &mut RngType,
        pred: impl Fn(PrimKind) -> bool,
    ) -> Option<TypeId> {
        let candidates: Vec<PrimKind> = ALL_PRIMS.iter().copied().filter(|k| pred(*k)).collect();
        candidates.choose(rng).map(|k| self.prims[k])
    }

    /// Whether an expression of type `from` can appear where `to` is
    /// expected without an explicit cast: identity, implicit numeric
    /// widening, or class/struct-to-implemented-interface.
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        let from_ty = self.ty_of(from);
        let to_ty = self.ty_of(to);
        match (from_ty.prim_kind(), to_ty.prim_kind()) {
            (Some(a), Some(b)) => a.widens_to(b),
            _ => from_ty
                .as_struct()
                .map(|s| s.implements().contains(&to))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn universe() -> TypeUniverse {
        let mut rng = RngType::seed_from_u64(42);
        TypeUniverse::generate(&mut rng, &GenConfig::default())
    }

    #[test]
    fn primitives_always_present() {
        let u = universe();
        for kind in ALL_PRIMS {
            let id = u.get_primitive(kind);
            assert_eq!(u.ty_of(id).prim_kind(), Some(kind));
        }
    }

    #[test]
    fn field_graph_is_forward_only() {
        let u = universe();
        for &agg in u.aggregates() {
            let s = u.ty_of(agg).checked_as_struct();
            for f in s.fields() {
                let fty = u.ty_of(f.ty);
                assert!(!fty.is_ref());
                if fty.kind() == crate::ty::TypeKind::Struct {
                    assert!(f.ty < agg, "field type must be declared earlier");
                }
            }
        }
    }

    #[test]
    fn refs_are_interned_and_flat() {
        let mut u = universe();
        let int = u.get_primitive(PrimKind::Int);
        let r1 = u.ref_of(int);
        let r2 = u.ref_of(int);
        assert_eq!(r1, r2);
        assert_eq!(u.ty_of(r1).checked_as_ref().inner(), int);
    }

    #[test]
    fn implementers_match_implements() {
        let u = universe();
        for &iface in u.interfaces() {
            for &agg in u.implementers_of(iface) {
                let s = u.ty_of(agg).checked_as_struct();
                assert!(s.implements().contains(&iface));
            }
        }
    }
}
