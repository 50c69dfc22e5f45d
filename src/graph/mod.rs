//! 图结构参考基因组：节点数组 + 带权有向边。
//!
//! 节点以数组下标寻址，边只保存目标节点的下标，从而避免所有权环。
//! 不变量：`nodes[i].id == i`。

pub mod io;
pub mod sim;
pub mod topo;

use anyhow::{bail, Result};

use crate::util::dna::Base;
use crate::util::twobit::TwoBitSequence;

/// 有向边：目标节点下标 + 遍历概率（仅作参考，不影响正确性）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub dest: u32,
    pub prob: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub id: u32,
    pub seq: Vec<Base>,
    /// 序列含 N 时为 None
    pub seq_two_bit: Option<TwoBitSequence>,
    pub next: Vec<Edge>,
    pub prev: Vec<Edge>,
}

impl Node {
    pub fn new(id: u32, seq: Vec<Base>) -> Self {
        let seq_two_bit = TwoBitSequence::pack(&seq).ok();
        Self {
            id,
            seq,
            seq_two_bit,
            next: Vec::new(),
            prev: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenomeGraph {
    pub nodes: Vec<Node>,
}

impl GenomeGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { nodes: Vec::with_capacity(n) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: u32) -> &Node {
        &self.nodes[id as usize]
    }

    /// 在 `id` 处放入节点。
    ///
    /// 数组不够长时以空占位节点补齐（`Vec` 按倍数扩容）；
    /// 若该位置已有非空序列则报错。
    pub fn add_node(&mut self, id: u32, seq: Vec<Base>) -> Result<u32> {
        let idx = id as usize;
        if idx >= self.nodes.len() {
            let start = self.nodes.len();
            self.nodes.extend((start..=idx).map(|i| Node::new(i as u32, Vec::new())));
        } else if !self.nodes[idx].seq.is_empty() {
            bail!("node {} already holds a sequence of length {}", id, self.nodes[idx].seq.len());
        }
        let slot = &mut self.nodes[idx];
        slot.seq_two_bit = TwoBitSequence::pack(&seq).ok();
        slot.seq = seq;
        Ok(id)
    }

    /// 追加到末尾，返回新节点的 id
    pub fn push_node(&mut self, seq: Vec<Base>) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node::new(id, seq));
        id
    }

    /// 添加边 u -> v，同时登记到 `u.next` 与 `v.prev`
    pub fn add_edge(&mut self, u: u32, v: u32, prob: f32) -> Result<()> {
        let n = self.nodes.len();
        if u as usize >= n || v as usize >= n {
            bail!("edge {} -> {} references a node outside the graph ({} nodes)", u, v, n);
        }
        self.nodes[u as usize].next.push(Edge { dest: v, prob });
        self.nodes[v as usize].prev.push(Edge { dest: u, prob });
        Ok(())
    }

    /// 将节点所有出边的权重设为 1/出度，并同步到对应的入边
    pub fn set_even_weights(&mut self, u: u32) {
        let out_degree = self.nodes[u as usize].next.len();
        if out_degree == 0 {
            return;
        }
        let prob = 1.0 / out_degree as f32;
        let dests: Vec<u32> = self.nodes[u as usize].next.iter().map(|e| e.dest).collect();
        for e in self.nodes[u as usize].next.iter_mut() {
            e.prob = prob;
        }
        for d in dests {
            for e in self.nodes[d as usize].prev.iter_mut() {
                if e.dest == u {
                    e.prob = prob;
                }
            }
        }
    }

    pub fn total_bases(&self) -> usize {
        self.nodes.iter().map(Node::len).sum()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.next.len()).sum()
    }

    pub fn is_topologically_sorted(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.next.iter().all(|e| e.dest > n.id))
    }

    /// 沿节点路径拼出 [target_start, target_end) 的序列。
    ///
    /// `target_start` 是第一个节点内的偏移，`target_end` 是最后一个节点内的（不含）偏移。
    pub fn path_sequence(&self, path: &[u32], target_start: usize, target_end: usize) -> Result<Vec<Base>> {
        if path.is_empty() {
            return Ok(Vec::new());
        }
        for pair in path.windows(2) {
            if !self.node(pair[0]).next.iter().any(|e| e.dest == pair[1]) {
                bail!("path step {} -> {} is not an edge of the graph", pair[0], pair[1]);
            }
        }
        let last = path.len() - 1;
        let mut out = Vec::new();
        for (i, &id) in path.iter().enumerate() {
            let seq = &self.node(id).seq;
            let start = if i == 0 { target_start } else { 0 };
            let end = if i == last { target_end } else { seq.len() };
            if start > end || end > seq.len() {
                bail!("range {}..{} is outside node {} (length {})", start, end, id, seq.len());
            }
            out.extend_from_slice(&seq[start..end]);
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::dna::{from_ascii_seq, to_string};

    /// n0="ATG" -> n1="CG" -> {n2="A" -> n4, n3="T" -> n4, n1 -> n4}, n4="TAA"
    pub(crate) fn five_node_graph() -> GenomeGraph {
        let mut g = GenomeGraph::new();
        for s in ["ATG", "CG", "A", "T", "TAA"] {
            g.push_node(from_ascii_seq(s.as_bytes()));
        }
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(1, 2, 0.0).unwrap();
        g.add_edge(1, 3, 0.0).unwrap();
        g.add_edge(1, 4, 0.0).unwrap();
        g.add_edge(2, 4, 1.0).unwrap();
        g.add_edge(3, 4, 1.0).unwrap();
        g.set_even_weights(1);
        g
    }

    #[test]
    fn add_node_grows_and_rejects_duplicates() {
        let mut g = GenomeGraph::new();
        g.add_node(3, from_ascii_seq(b"ACGT")).unwrap();
        assert_eq!(g.len(), 4);
        assert!(g.nodes[1].is_empty());
        assert_eq!(g.nodes[3].id, 3);
        g.add_node(1, from_ascii_seq(b"GG")).unwrap();
        assert!(g.add_node(3, from_ascii_seq(b"T")).is_err());
        assert!(g.nodes.iter().enumerate().all(|(i, n)| n.id as usize == i));
    }

    #[test]
    fn edges_are_bidirectional() {
        let g = five_node_graph();
        assert_eq!(g.edge_count(), 6);
        assert_eq!(g.nodes[4].prev.len(), 3);
        assert_eq!(g.nodes[1].next.len(), 3);
        for e in &g.nodes[1].next {
            assert!((e.prob - 1.0 / 3.0).abs() < 1e-6);
        }
        assert!(g.nodes[4].prev.iter().any(|e| e.dest == 1 && (e.prob - 1.0 / 3.0).abs() < 1e-6));
    }

    #[test]
    fn add_edge_rejects_missing_node() {
        let mut g = five_node_graph();
        assert!(g.add_edge(0, 9, 1.0).is_err());
    }

    #[test]
    fn two_bit_cache_absent_for_n() {
        let mut g = GenomeGraph::new();
        let a = g.push_node(from_ascii_seq(b"ACNT"));
        let b = g.push_node(from_ascii_seq(b"ACGT"));
        assert!(g.node(a).seq_two_bit.is_none());
        assert!(g.node(b).seq_two_bit.is_some());
    }

    #[test]
    fn path_sequence_spans_nodes() {
        let g = five_node_graph();
        let seq = g.path_sequence(&[0, 1, 2, 4], 1, 2).unwrap();
        assert_eq!(to_string(&seq), "TGCGATA");
        assert!(g.path_sequence(&[0, 2], 0, 1).is_err());
        assert!(g.is_topologically_sorted());
    }
}
