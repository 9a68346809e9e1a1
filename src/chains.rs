use pdbtbx::*;

/// Per-residue access to the B-factor column, which AlphaFold uses for pLDDT.
pub trait ChainExt {
    /// Mean atom B-factor of every residue, in chain order.
    fn residue_b_factors(&self) -> Vec<f64>;

    /// Set every atom of the `i`-th residue to `values[i]`.
    fn set_residue_b_factors(&mut self, values: &[f64]) -> Result<(), String>;
}

impl ChainExt for Chain {
    fn residue_b_factors(&self) -> Vec<f64> {
        self.residues()
            .map(|res| {
                let (sum, count) = res
                    .atoms()
                    .fold((0.0, 0usize), |(sum, count), atom| {
                        (sum + atom.b_factor(), count + 1)
                    });
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect()
    }

    fn set_residue_b_factors(&mut self, values: &[f64]) -> Result<(), String> {
        if values.len() != self.residue_count() {
            return Err(format!(
                "chain {} has {} residues but {} values were given",
                self.id(),
                self.residue_count(),
                values.len()
            ));
        }
        for (res, value) in self.residues_mut().zip(values) {
            for atom in res.atoms_mut() {
                atom.set_b_factor(*value)?;
            }
        }
        Ok(())
    }
}
