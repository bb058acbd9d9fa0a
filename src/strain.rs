//! Registry of the strains of one disease.
//!
//! Strains are identified by their genotype. Transmission workers look strains up and add new
//! ones concurrently, so the table sits behind a lock and adding is insert-or-lookup: two
//! threads that produce the same genotype get the same `StrainId`.

use crate::hashing::HashMap;
use crate::StrainId;
use parking_lot::Mutex;
use rand::Rng;

pub type Genotype = Vec<u32>;

#[derive(Debug, Clone, PartialEq)]
pub struct Strain {
    pub id: StrainId,
    pub parent: Option<StrainId>,
    pub genotype: Genotype,
    pub transmissibility: f64,
}

#[derive(Debug, Default)]
struct StrainTableInner {
    strains: Vec<Strain>,
    by_genotype: HashMap<Genotype, StrainId>,
}

#[derive(Debug, Default)]
pub struct StrainTable {
    inner: Mutex<StrainTableInner>,
}

impl StrainTable {
    pub fn new() -> Self {
        StrainTable::default()
    }

    /// Returns the id of the strain with `genotype`, adding it first if it is new.
    pub fn add(
        &self,
        genotype: Genotype,
        transmissibility: f64,
        parent: Option<StrainId>,
    ) -> StrainId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.by_genotype.get(&genotype) {
            return id;
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = StrainId(inner.strains.len() as u32);
        inner.by_genotype.insert(genotype.clone(), id);
        inner.strains.push(Strain {
            id,
            parent,
            genotype,
            transmissibility,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.inner.lock().strains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: StrainId) -> Option<Strain> {
        self.inner.lock().strains.get(id.0 as usize).cloned()
    }

    /// Copies `id`'s genotype with one site changed to a different symbol of the alphabet and
    /// registers the result. Strains with an empty genotype or a single-symbol alphabet cannot
    /// mutate and are returned unchanged.
    pub fn point_mutation<R: Rng + ?Sized>(
        &self,
        id: StrainId,
        alphabet: u32,
        rng: &mut R,
    ) -> StrainId {
        let Some(strain) = self.get(id) else {
            return id;
        };
        if strain.genotype.is_empty() || alphabet < 2 {
            return id;
        }
        let mut genotype = strain.genotype;
        let site = rng.random_range(0..genotype.len());
        // Skip over the current symbol so the draw always changes the site.
        let symbol = rng.random_range(0..alphabet - 1);
        genotype[site] = if symbol >= genotype[site] { symbol + 1 } else { symbol };
        self.add(genotype, strain.transmissibility, Some(id))
    }
}
