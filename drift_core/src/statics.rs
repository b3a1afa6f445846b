//! Pool of process-global variables, generated on demand.

use crate::{
    config::GenConfig,
    literal::gen_literal,
    prog::{StaticField, VarIdent},
    ty::TypeId,
    universe::TypeUniverse,
    RngType,
};
use rand::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct StaticsPool {
    fields: Vec<StaticField>,
    next_id: usize,
}

impl StaticsPool {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn fields(&self) -> &[StaticField] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<StaticField> {
        self.fields
    }

    /// Return an existing static of type `ty` (any type if `None`), or
    /// generate a fresh one.
    pub fn pick_static(
        &mut self,
        rng: &mut RngType,
        universe: &mut TypeUniverse,
        config: &GenConfig,
        ty: Option<TypeId>,
    ) -> VarIdent {
        let matching: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| ty.map(|t| f.var.ty == t).unwrap_or(true))
            .map(|(i, _)| i)
            .collect();
        if let Some(&idx) = matching.choose(rng) {
            return self.fields[idx].var.clone();
        }
        self.generate_new_field(rng, universe, config, ty)
    }

    /// Generate a new static field named `s_<n>` with a seeded literal
    /// initializer. Statics escape everywhere, so their rank is `i32::MAX`.
    pub fn generate_new_field(
        &mut self,
        rng: &mut RngType,
        universe: &mut TypeUniverse,
        config: &GenConfig,
        ty: Option<TypeId>,
    ) -> VarIdent {
        let ty = ty.unwrap_or_else(|| universe.pick_type(rng, 0.0));
        let init = gen_literal(rng, universe, config, ty);
        let var = VarIdent::new(format!("s_{}", self.next_id), ty, i32::MAX);
        self.next_id += 1;
        self.fields.push(StaticField {
            var: var.clone(),
            init,
        });
        var
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn pick_reuses_matching_type() {
        let mut rng = RngType::seed_from_u64(1);
        let config = GenConfig::default();
        let mut universe = TypeUniverse::generate(&mut rng, &config);
        let mut pool = StaticsPool::new();
        let int = universe.get_primitive(crate::ty::PrimKind::Int);
        let first = pool.generate_new_field(&mut rng, &mut universe, &config, Some(int));
        let again = pool.pick_static(&mut rng, &mut universe, &config, Some(int));
        assert_eq!(first.name, again.name);
        assert_eq!(pool.fields().len(), 1);
    }

    #[test]
    fn names_are_monotonic() {
        let mut rng = RngType::seed_from_u64(2);
        let config = GenConfig::default();
        let mut universe = TypeUniverse::generate(&mut rng, &config);
        let mut pool = StaticsPool::new();
        for i in 0..5 {
            let v = pool.generate_new_field(&mut rng, &mut universe, &config, None);
            assert_eq!(&*v.name, &format!("s_{}", i));
            assert_eq!(v.ref_escape_scope, i32::MAX);
        }
    }
}
