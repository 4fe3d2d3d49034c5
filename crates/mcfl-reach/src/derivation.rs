//! Derivation table: accepted derivations, their interned nonterminals and the
//! boundary index used for concatenate matching.

use crate::graph::{Path, Vertex};
use ahash::AHashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonterminalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationId(pub u32);

impl DerivationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A nonterminal together with the vertex-pair segments it spans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Derivation {
    pub nonterminal: NonterminalId,
    pub segments: Vec<Path>,
}

impl Derivation {
    pub fn new(nonterminal: NonterminalId, segments: Vec<Path>) -> Self {
        Self {
            nonterminal,
            segments,
        }
    }

    pub fn dimension(&self) -> usize {
        self.segments.len()
    }
}

// ============================================================================
// Nonterminal interning
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Nonterminals {
    names: Vec<String>,
    ids: AHashMap<String, NonterminalId>,
}

impl Nonterminals {
    pub fn intern(&mut self, name: &str) -> NonterminalId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = NonterminalId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<NonterminalId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: NonterminalId) -> &str {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }

    pub fn iter(&self) -> impl Iterator<Item = (NonterminalId, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (NonterminalId(i as u32), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryRole {
    Start,
    End,
}

/// `(nonterminal, segment, start|end, vertex)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryKey {
    pub nonterminal: NonterminalId,
    pub segment: usize,
    pub role: BoundaryRole,
    pub vertex: Vertex,
}

impl BoundaryKey {
    pub fn new(nonterminal: NonterminalId, segment: usize, role: BoundaryRole, vertex: Vertex) -> Self {
        Self {
            nonterminal,
            segment,
            role,
            vertex,
        }
    }
}

/// Accepted derivations in acceptance order. The order doubles as the FIFO
/// worklist of the solver.
#[derive(Debug, Clone, Default)]
pub struct DerivationTable {
    nonterminals: Nonterminals,
    derivations: Vec<Derivation>,
    lookup: AHashMap<Derivation, DerivationId>,
    by_nonterminal: AHashMap<NonterminalId, Vec<DerivationId>>,
    boundary: AHashMap<BoundaryKey, Vec<DerivationId>>,
}

impl DerivationTable {
    pub fn with_nonterminals(nonterminals: Nonterminals) -> Self {
        Self {
            nonterminals,
            ..Self::default()
        }
    }

    /// Inserts `derivation` unless present; returns its id and whether it is new.
    pub fn insert(&mut self, derivation: Derivation) -> (DerivationId, bool) {
        if let Some(&id) = self.lookup.get(&derivation) {
            return (id, false);
        }
        let id = DerivationId(self.derivations.len() as u32);
        for (segment, path) in derivation.segments.iter().enumerate() {
            for (role, vertex) in [(BoundaryRole::Start, path.start), (BoundaryRole::End, path.end)] {
                self.boundary
                    .entry(BoundaryKey::new(derivation.nonterminal, segment, role, vertex))
                    .or_default()
                    .push(id);
            }
        }
        self.by_nonterminal
            .entry(derivation.nonterminal)
            .or_default()
            .push(id);
        self.lookup.insert(derivation.clone(), id);
        self.derivations.push(derivation);
        (id, true)
    }

    pub fn get(&self, id: DerivationId) -> Option<&Derivation> {
        self.derivations.get(id.index())
    }

    pub fn boundary(&self, key: &BoundaryKey) -> &[DerivationId] {
        self.boundary.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn of_nonterminal(&self, nonterminal: NonterminalId) -> &[DerivationId] {
        self.by_nonterminal
            .get(&nonterminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Segment lists derived for `name`, in acceptance order.
    pub fn derivations_of(&self, name: &str) -> Vec<&[Path]> {
        let Some(nt) = self.nonterminals.get(name) else {
            return Vec::new();
        };
        self.of_nonterminal(nt)
            .iter()
            .filter_map(|&id| self.get(id))
            .map(|d| d.segments.as_slice())
            .collect()
    }

    pub fn nonterminals(&self) -> &Nonterminals {
        &self.nonterminals
    }

    pub fn len(&self) -> usize {
        self.derivations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derivations.is_empty()
    }
}

impl fmt::Display for DerivationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.derivations {
            write!(f, "{}(", self.nonterminals.name(d.nonterminal))?;
            for (i, p) in d.segments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            writeln!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_structurally() {
        let mut names = Nonterminals::default();
        let s = names.intern("S");
        assert_eq!(names.intern("S"), s);
        let mut table = DerivationTable::with_nonterminals(names);

        let d = Derivation::new(s, vec![Path::from((0, 1))]);
        let (first, fresh) = table.insert(d.clone());
        assert!(fresh);
        let (again, fresh) = table.insert(d);
        assert!(!fresh);
        assert_eq!(first, again);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn boundary_index_covers_both_ends_of_every_segment() {
        let mut names = Nonterminals::default();
        let p = names.intern("P");
        let mut table = DerivationTable::with_nonterminals(names);
        let (id, _) = table.insert(Derivation::new(p, vec![Path::from((0, 1)), Path::from((4, 5))]));

        let key = |segment, role, vertex| BoundaryKey::new(p, segment, role, Vertex(vertex));
        assert_eq!(table.boundary(&key(0, BoundaryRole::Start, 0)), &[id]);
        assert_eq!(table.boundary(&key(1, BoundaryRole::End, 5)), &[id]);
        assert!(table.boundary(&key(1, BoundaryRole::Start, 0)).is_empty());
        assert_eq!(table.derivations_of("P").len(), 1);
        assert!(table.derivations_of("Q").is_empty());
    }
}
