// Duplicate detector - exact and near-duplicate symbol bodies
//
// Exact: equal SHA-256 over the normalized token stream.
// Near: Jaccard similarity over token shingles. Candidate pairs come from
// prefix filtering on a global rarest-first shingle order, so two bodies that
// cannot reach the threshold never get compared. Pairs are scored on rayon and
// joined with a union-find afterwards.

use crate::config::DuplicateConfig;
use crate::context::{CancelToken, Cancelled};
use crate::discovery::content_hash;
use crate::graph::{Graph, NodeId, Symbol};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateKind {
    Exact,
    Near,
}

/// Two clustered bodies and their similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub a: NodeId,
    pub b: NodeId,
    pub score: f64,
}

/// Two or more symbols with the same or nearly the same body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub kind: DuplicateKind,

    /// Members in node order
    pub members: Vec<NodeId>,

    /// 1.0 for exact clusters, the weakest linking pair for near clusters
    pub similarity: f64,

    /// Linking pairs, `a < b`
    pub pairs: Vec<DuplicatePair>,

    /// Members disagree on their parameter lists
    pub signatures_differ: bool,
}

impl DuplicateCluster {
    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.binary_search(id).is_ok()
    }

    /// Reported score between two members, if they are a linking pair
    pub fn score(&self, a: &NodeId, b: &NodeId) -> Option<f64> {
        self.pairs
            .iter()
            .find(|p| (&p.a == a && &p.b == b) || (&p.a == b && &p.b == a))
            .map(|p| p.score)
    }
}

/// A body eligible for comparison
struct Body<'g> {
    symbol: &'g Symbol,
    id: NodeId,
}

pub struct DuplicateDetector {
    threshold: f64,
    shingle_size: usize,
    min_body_tokens: usize,
}

impl DuplicateDetector {
    pub fn new(config: &DuplicateConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            shingle_size: config.shingle_size.max(1),
            min_body_tokens: config.min_body_tokens,
        }
    }

    /// Find exact then near clusters over function and class bodies
    pub fn detect(&self, graph: &Graph, cancel: &CancelToken) -> Result<Vec<DuplicateCluster>, Cancelled> {
        let mut bodies: Vec<Body> = graph
            .symbols()
            .filter(|s| s.kind.has_comparable_body() && s.body_tokens.len() >= self.min_body_tokens)
            .map(|symbol| Body {
                id: symbol.id(),
                symbol,
            })
            .collect();
        bodies.sort_by(|a, b| a.id.cmp(&b.id));
        info!("Comparing {} symbol bodies", bodies.len());

        let (mut clusters, clustered) = self.exact_clusters(&bodies);
        cancel.check()?;

        let rest: Vec<&Body> = bodies
            .iter()
            .enumerate()
            .filter(|(idx, _)| !clustered.contains(idx))
            .map(|(_, body)| body)
            .collect();
        clusters.extend(self.near_clusters(&rest, cancel)?);

        let clusters = drop_nested(graph, clusters);
        debug!("Found {} duplicate clusters", clusters.len());
        Ok(clusters)
    }

    fn exact_clusters(&self, bodies: &[Body]) -> (Vec<DuplicateCluster>, BTreeSet<usize>) {
        let mut by_hash: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, body) in bodies.iter().enumerate() {
            let hash = content_hash(body.symbol.body_tokens.join(" ").as_bytes());
            by_hash.entry(hash).or_default().push(idx);
        }

        let mut clusters = Vec::new();
        let mut clustered = BTreeSet::new();
        for group in by_hash.into_values().filter(|g| g.len() >= 2) {
            let members: Vec<&Body> = group.iter().map(|&idx| &bodies[idx]).collect();
            let mut pairs = Vec::new();
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    pairs.push(DuplicatePair {
                        a: a.id.clone(),
                        b: b.id.clone(),
                        score: 1.0,
                    });
                }
            }
            clusters.push(DuplicateCluster {
                kind: DuplicateKind::Exact,
                members: members.iter().map(|b| b.id.clone()).collect(),
                similarity: 1.0,
                pairs,
                signatures_differ: signatures_differ(&members),
            });
            clustered.extend(group);
        }
        (clusters, clustered)
    }

    fn near_clusters(&self, bodies: &[&Body], cancel: &CancelToken) -> Result<Vec<DuplicateCluster>, Cancelled> {
        if bodies.len() < 2 {
            return Ok(Vec::new());
        }

        let mut sets: Vec<Vec<u64>> = bodies
            .iter()
            .map(|b| shingles(&b.symbol.body_tokens, self.shingle_size))
            .collect();

        // Rarest shingles first, so prefixes are short and selective
        let mut frequency: HashMap<u64, usize> = HashMap::new();
        for set in &sets {
            for shingle in set {
                *frequency.entry(*shingle).or_default() += 1;
            }
        }
        for set in &mut sets {
            set.sort_by_key(|s| (frequency[s], *s));
        }

        let mut index: HashMap<u64, Vec<usize>> = HashMap::new();
        let mut candidates: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (idx, set) in sets.iter().enumerate() {
            for shingle in &set[..self.prefix_len(set.len())] {
                let seen = index.entry(*shingle).or_default();
                for &other in seen.iter() {
                    if self.sizes_compatible(sets[other].len(), set.len()) {
                        candidates.insert((other, idx));
                    }
                }
                seen.push(idx);
            }
        }
        debug!("{} candidate pairs after prefix filtering", candidates.len());

        let sorted: Vec<Vec<u64>> = sets
            .into_iter()
            .map(|mut s| {
                s.sort_unstable();
                s
            })
            .collect();

        let candidates: Vec<(usize, usize)> = candidates.into_iter().collect();
        let scored: Vec<(usize, usize, f64)> = candidates
            .par_iter()
            .map(|&(a, b)| {
                cancel.check()?;
                Ok((a, b, jaccard(&sorted[a], &sorted[b])))
            })
            .collect::<Result<Vec<_>, Cancelled>>()?
            .into_iter()
            .filter(|(_, _, score)| *score >= self.threshold)
            .collect();

        let mut forest = UnionFind::new(bodies.len());
        for (a, b, _) in &scored {
            forest.union(*a, *b);
        }

        let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in 0..bodies.len() {
            components.entry(forest.find(idx)).or_default().push(idx);
        }

        let mut clusters = Vec::new();
        for component in components.into_values().filter(|c| c.len() >= 2) {
            let root = forest.find(component[0]);
            let mut pairs: Vec<DuplicatePair> = scored
                .iter()
                .filter(|(a, _, _)| forest.find(*a) == root)
                .map(|&(a, b, score)| {
                    let (a, b) = ordered(&bodies[a].id, &bodies[b].id);
                    DuplicatePair { a, b, score }
                })
                .collect();
            pairs.sort_by(|x, y| (&x.a, &x.b).cmp(&(&y.a, &y.b)));

            let members: Vec<&Body> = component.iter().map(|&idx| bodies[idx]).collect();
            let mut ids: Vec<NodeId> = members.iter().map(|b| b.id.clone()).collect();
            ids.sort();
            clusters.push(DuplicateCluster {
                kind: DuplicateKind::Near,
                members: ids,
                similarity: pairs.iter().map(|p| p.score).fold(1.0, f64::min),
                pairs,
                signatures_differ: signatures_differ(&members),
            });
        }
        Ok(clusters)
    }

    /// Two sets reaching the threshold must share one of the first `|S| - ceil(t|S|) + 1` shingles
    fn prefix_len(&self, len: usize) -> usize {
        let required = (self.threshold * len as f64).ceil() as usize;
        (len + 1).saturating_sub(required).clamp(1, len.max(1)).min(len)
    }

    fn sizes_compatible(&self, a: usize, b: usize) -> bool {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        small as f64 >= self.threshold * large as f64
    }
}

fn ordered(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

fn signatures_differ(members: &[&Body]) -> bool {
    let signatures: BTreeSet<Option<&str>> = members
        .iter()
        .map(|b| b.symbol.signature.as_deref())
        .collect();
    signatures.len() > 1
}

/// Hashed windows of `size` tokens; short bodies are one shingle
fn shingles(tokens: &[String], size: usize) -> Vec<u64> {
    let hash = |window: &[String]| {
        let mut hasher = DefaultHasher::new();
        window.hash(&mut hasher);
        hasher.finish()
    };
    let mut set: Vec<u64> = if tokens.len() <= size {
        vec![hash(tokens)]
    } else {
        tokens.windows(size).map(hash).collect()
    };
    set.sort_unstable();
    set.dedup();
    set
}

/// Jaccard similarity of two sorted, deduplicated sets
pub fn jaccard(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let (mut i, mut j, mut inter) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                inter += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}

/// Clusters whose members all sit inside the members of one other cluster
/// (the methods of two duplicated classes) add nothing
fn drop_nested(graph: &Graph, clusters: Vec<DuplicateCluster>) -> Vec<DuplicateCluster> {
    let owner: HashMap<&NodeId, usize> = clusters
        .iter()
        .enumerate()
        .flat_map(|(idx, c)| c.members.iter().map(move |m| (m, idx)))
        .collect();

    let nested: BTreeSet<usize> = clusters
        .iter()
        .enumerate()
        .filter(|(idx, cluster)| {
            let parents: BTreeSet<Option<usize>> = cluster
                .members
                .iter()
                .map(|m| {
                    graph
                        .symbol(m)
                        .and_then(|s| s.parent.as_ref())
                        .and_then(|p| owner.get(p).copied())
                })
                .collect();
            parents.len() == 1
                && matches!(parents.iter().next(), Some(Some(other)) if other != idx)
                && cluster
                    .members
                    .iter()
                    .filter_map(|m| graph.symbol(m).and_then(|s| s.parent.as_ref()))
                    .collect::<BTreeSet<_>>()
                    .len()
                    == cluster.members.len()
        })
        .map(|(idx, _)| idx)
        .collect();

    let mut kept: Vec<DuplicateCluster> = clusters
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !nested.contains(idx))
        .map(|(_, c)| c)
        .collect();
    kept.sort_by(|a, b| (&a.members, a.kind).cmp(&(&b.members, b.kind)));
    kept
}

/// Disjoint sets with path halving and union by size
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::discovery::{Language, SourceFile};
    use crate::graph::GraphBuilder;
    use crate::parser::extract;

    fn graph_of(files: &[(&str, &str)]) -> Graph {
        let config = Config::default();
        let mut builder = GraphBuilder::new(&config);
        for (path, text) in files {
            let file = SourceFile::from_text(*path, Language::Python, text);
            builder.add_file(&file, &extract(&file));
        }
        builder.build().unwrap()
    }

    fn detector() -> DuplicateDetector {
        DuplicateDetector::new(&Config::default().duplicates)
    }

    fn long_body(header: &str) -> String {
        let mut text = format!("{}\n", header);
        for i in 0..30 {
            text.push_str(&format!("    total = total + step_{} * weight\n", i));
        }
        text.push_str("    return total\n");
        text
    }

    const FORMAT_DATE: &str = "def format_date(d):\n    parts = [d.year, d.month, d.day]\n    return \"-\".join(str(p) for p in parts)\n";

    #[test]
    fn test_exact_cluster_ignores_layout_and_comments() {
        let other = "def format_date(d):\n    # same thing\n    parts = [d.year,   d.month, d.day]\n    return \"-\".join(str(p) for p in parts)\n";
        let graph = graph_of(&[("a.py", FORMAT_DATE), ("b.py", other)]);
        let clusters = detector().detect(&graph, &CancelToken::new()).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].kind, DuplicateKind::Exact);
        assert_eq!(clusters[0].members.len(), 2);
        assert_eq!(clusters[0].similarity, 1.0);
        assert!(!clusters[0].signatures_differ);
    }

    #[test]
    fn test_own_name_is_masked() {
        let renamed = FORMAT_DATE.replace("format_date", "render_date");
        let graph = graph_of(&[("a.py", FORMAT_DATE), ("b.py", &renamed)]);
        let clusters = detector().detect(&graph, &CancelToken::new()).unwrap();
        assert_eq!(clusters[0].kind, DuplicateKind::Exact);
    }

    #[test]
    fn test_near_cluster_with_different_parameters() {
        let a = long_body("def accumulate(total, weight):");
        let b = long_body("def accumulate(total, weight, scale=1):");
        let graph = graph_of(&[("a.py", &a), ("b.py", &b)]);
        let clusters = detector().detect(&graph, &CancelToken::new()).unwrap();

        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.kind, DuplicateKind::Near);
        assert!(cluster.similarity >= 0.8 && cluster.similarity < 1.0);
        assert!(cluster.signatures_differ);
    }

    #[test]
    fn test_pair_scores_are_symmetric() {
        let a = long_body("def accumulate(total, weight):");
        let b = long_body("def accumulate(total, weight, scale=1):");
        let graph = graph_of(&[("a.py", &a), ("b.py", &b)]);
        let cluster = detector().detect(&graph, &CancelToken::new()).unwrap().remove(0);

        let (x, y) = (&cluster.members[0], &cluster.members[1]);
        assert_eq!(cluster.score(x, y), cluster.score(y, x));
        assert!(cluster.score(x, y).is_some());
    }

    #[test]
    fn test_short_and_unrelated_bodies_do_not_cluster() {
        let graph = graph_of(&[
            ("a.py", "def tiny():\n    return 1\n"),
            ("b.py", "def tiny():\n    return 1\n"),
            ("c.py", &long_body("def accumulate(total, weight):")),
            ("d.py", "def unrelated(x):\n    if x > 10:\n        return x * x - 3\n    raise ValueError(\"bad input value\")\n"),
        ]);
        let clusters = detector().detect(&graph, &CancelToken::new()).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_methods_of_duplicated_classes_are_not_repeated() {
        let class = "class Exporter:\n    def export(self, rows):\n        out = []\n        for row in rows:\n            out.append(\",\".join(row))\n        return \"\\n\".join(out)\n";
        let graph = graph_of(&[("a.py", class), ("b.py", class)]);
        let clusters = detector().detect(&graph, &CancelToken::new()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0]
            .members
            .iter()
            .all(|m| matches!(m, NodeId::Symbol { name, .. } if name == "Exporter")));
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&[1, 2, 3], &[1, 2, 3]), 1.0);
        assert_eq!(jaccard(&[1, 2], &[3, 4]), 0.0);
        assert_eq!(jaccard(&[1, 2, 3], &[2, 3, 4]), 0.5);
    }

    #[test]
    fn test_union_find() {
        let mut sets = UnionFind::new(4);
        sets.union(0, 1);
        sets.union(2, 3);
        assert_eq!(sets.find(0), sets.find(1));
        assert_ne!(sets.find(1), sets.find(2));
    }
}
