//! Exact maximum clique search.
//!
//! Bron–Kerbosch with Tomita pivoting. Exponential in the worst case, but
//! consistency graphs are sparse once outliers are present and groups stay
//! small (one group per robot pair or landmark).

/// Symmetric adjacency matrix over `n` vertices.
#[derive(Clone, Debug, Default)]
pub struct ConsistencyGraph {
    adjacency: Vec<Vec<bool>>,
}

impl ConsistencyGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// True if there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Append an isolated vertex and return its index.
    pub fn add_vertex(&mut self) -> usize {
        for row in &mut self.adjacency {
            row.push(false);
        }
        let n = self.adjacency.len() + 1;
        self.adjacency.push(vec![false; n]);
        n - 1
    }

    /// Remove vertex `v`; higher indices shift down by one.
    pub fn remove_vertex(&mut self, v: usize) {
        if v >= self.adjacency.len() {
            return;
        }
        self.adjacency.remove(v);
        for row in &mut self.adjacency {
            row.remove(v);
        }
    }

    /// Connect `a` and `b`.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b || a >= self.len() || b >= self.len() {
            return;
        }
        self.adjacency[a][b] = true;
        self.adjacency[b][a] = true;
    }

    /// True if `a` and `b` are connected.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(a)
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(false)
    }

    fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[v]
            .iter()
            .enumerate()
            .filter_map(|(u, &connected)| connected.then_some(u))
    }

    /// Largest clique among `candidates`, sorted ascending.
    ///
    /// Ties are broken in favor of the clique found first, which prefers
    /// lower (older) vertex indices.
    pub fn max_clique(&self, candidates: &[usize]) -> Vec<usize> {
        let mut best = Vec::new();
        let mut r = Vec::new();
        let p: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&v| v < self.len())
            .collect();
        self.expand(&mut r, p, Vec::new(), &mut best);
        best.sort_unstable();
        best
    }

    fn expand(&self, r: &mut Vec<usize>, p: Vec<usize>, x: Vec<usize>, best: &mut Vec<usize>) {
        if p.is_empty() {
            if x.is_empty() && r.len() > best.len() {
                *best = r.clone();
            }
            return;
        }
        // Bound: cannot beat the current best
        if r.len() + p.len() <= best.len() {
            return;
        }

        // Pivot with the most neighbors in P
        let pivot = p
            .iter()
            .chain(x.iter())
            .copied()
            .max_by_key(|&u| p.iter().filter(|&&v| self.has_edge(u, v)).count())
            .unwrap_or(p[0]);

        let branch: Vec<usize> = p
            .iter()
            .copied()
            .filter(|&v| !self.has_edge(pivot, v))
            .collect();

        let mut p = p;
        let mut x = x;
        for v in branch {
            let neighbors: Vec<usize> = self.neighbors(v).collect();
            let p_next: Vec<usize> = p.iter().copied().filter(|u| neighbors.contains(u)).collect();
            let x_next: Vec<usize> = x.iter().copied().filter(|u| neighbors.contains(u)).collect();

            r.push(v);
            self.expand(r, p_next, x_next, best);
            r.pop();

            p.retain(|&u| u != v);
            x.push(v);
        }
    }
}
