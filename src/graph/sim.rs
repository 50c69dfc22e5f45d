use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::GenomeGraph;
use crate::align::result::Read;
use crate::util::dna::{self, Base};

const MAX_ATTEMPTS: usize = 1000;

/// 模拟 read 及其真实来源
#[derive(Debug, Clone)]
pub struct SimulatedRead {
    pub read: Read,
    pub pos_strand: bool,
    pub path: Vec<u32>,
    /// 第一个节点内的起始偏移
    pub target_start: usize,
    /// 最后一个节点内的结束偏移（不含）
    pub target_end: usize,
}

/// 按出边权重选择后继；权重全为 0 时均匀选择
fn pick_next(graph: &GenomeGraph, node: u32, rng: &mut StdRng) -> Option<u32> {
    let next = &graph.node(node).next;
    if next.is_empty() {
        return None;
    }
    let total: f32 = next.iter().map(|e| e.prob.max(0.0)).sum();
    if total <= 0.0 {
        return Some(next[rng.gen_range(0..next.len())].dest);
    }
    let mut r = rng.gen::<f32>() * total;
    for e in next {
        r -= e.prob.max(0.0);
        if r <= 0.0 {
            return Some(e.dest);
        }
    }
    next.last().map(|e| e.dest)
}

/// 从随机节点的随机位置出发，沿随机路径取 `len` 个碱基。
/// 路径走不够长或含 N 时返回 None。
pub fn random_path_read(graph: &GenomeGraph, len: usize, rng: &mut StdRng) -> Option<(Vec<Base>, Vec<u32>, usize, usize)> {
    if graph.is_empty() || len == 0 {
        return None;
    }
    let mut node = rng.gen_range(0..graph.len()) as u32;
    if graph.node(node).is_empty() {
        return None;
    }
    let start = rng.gen_range(0..graph.node(node).len());
    let mut pos = start;
    let mut seq = Vec::with_capacity(len);
    let mut path = vec![node];
    loop {
        let node_seq = &graph.node(node).seq;
        let take = (len - seq.len()).min(node_seq.len() - pos);
        seq.extend_from_slice(&node_seq[pos..pos + take]);
        if seq.len() == len {
            if seq.iter().any(|b| !b.is_packable()) {
                return None;
            }
            return Some((seq, path, start, pos + take));
        }
        node = pick_next(graph, node, rng)?;
        path.push(node);
        pos = 0;
    }
}

/// 生成 `n` 条长度为 `len` 的模拟 read，`seed` 固定时结果可复现。
pub fn simulate_reads(graph: &GenomeGraph, n: usize, len: usize, seed: u64, both_strands: bool) -> Vec<SimulatedRead> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);
    let mut attempts = 0usize;
    while out.len() < n && attempts < n * MAX_ATTEMPTS {
        attempts += 1;
        let Some((seq, path, target_start, target_end)) = random_path_read(graph, len, &mut rng) else {
            continue;
        };
        let pos_strand = !both_strands || rng.gen_bool(0.5);
        let bases = if pos_strand { seq } else { dna::revcomp(&seq) };
        let path_str: Vec<String> = path.iter().map(u32::to_string).collect();
        let name = format!(
            "read{}_{}_{}_{}_{}",
            out.len(),
            path_str.join(":"),
            target_start,
            target_end,
            if pos_strand { '+' } else { '-' }
        );
        out.push(SimulatedRead {
            read: Read { name, qual: vec![b'I'; bases.len()], seq: bases },
            pos_strand,
            path,
            target_start,
            target_end,
        });
    }
    if out.len() < n {
        log::warn!("only {} of {} reads of length {} could be simulated", out.len(), n, len);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::five_node_graph;

    #[test]
    fn simulated_reads_follow_paths() {
        let g = five_node_graph();
        let reads = simulate_reads(&g, 50, 3, 7, true);
        assert_eq!(reads.len(), 50);
        for sim in &reads {
            let truth = g.path_sequence(&sim.path, sim.target_start, sim.target_end).unwrap();
            let expected = if sim.pos_strand { truth } else { dna::revcomp(&truth) };
            assert_eq!(sim.read.seq, expected, "{}", sim.read.name);
            assert_eq!(sim.read.qual.len(), 3);
        }
    }

    #[test]
    fn simulation_is_reproducible() {
        let g = five_node_graph();
        let a = simulate_reads(&g, 10, 4, 42, true);
        let b = simulate_reads(&g, 10, 4, 42, true);
        let na: Vec<&str> = a.iter().map(|s| s.read.name.as_str()).collect();
        let nb: Vec<&str> = b.iter().map(|s| s.read.name.as_str()).collect();
        assert_eq!(na, nb);
    }
}
