use crate::graph::{GenomeGraph, Node};
use crate::index::{kmer_code, unpack_coord, SeedIndex};
use crate::util::dna::Base;
use crate::util::twobit::{count_left_matches, count_right_matches};

use super::workspace::{StrandQuery, Workspace};

/// 种子链中的一段：read 上 [query_start, query_start + length) 与节点
/// `target_id` 上 [target_start, target_start + length) 完全相同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedPart {
    pub target_id: u32,
    pub target_start: u32,
    pub query_start: u32,
    pub length: u32,
}

/// 跨节点的精确匹配种子。
///
/// `parts[i + 1]` 紧接在 `parts[i]` 之后：read 上连续，图上沿一条边进入下一个节点的起点。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub parts: Vec<SeedPart>,
    pub pos_strand: bool,
    pub total_length: u32,
}

impl Seed {
    #[inline]
    pub fn query_start(&self) -> usize {
        self.parts[0].query_start as usize
    }

    #[inline]
    pub fn query_end(&self) -> usize {
        self.query_start() + self.total_length as usize
    }

    #[inline]
    pub fn first(&self) -> &SeedPart {
        &self.parts[0]
    }

    #[inline]
    pub fn last(&self) -> &SeedPart {
        &self.parts[self.parts.len() - 1]
    }

    /// 链结构检查；违反说明扩展逻辑有误
    pub fn assert_chain(&self, graph: &GenomeGraph) {
        assert!(!self.parts.is_empty(), "seed without parts");
        let sum: u32 = self.parts.iter().map(|p| p.length).sum();
        assert_eq!(sum, self.total_length, "seed total length out of sync with its parts");
        for w in self.parts.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            let a_node = graph.node(a.target_id);
            assert!(
                (a.target_start + a.length) as usize == a_node.len()
                    && b.target_start == 0
                    && a.query_start + a.length == b.query_start
                    && a_node.next.iter().any(|e| e.dest == b.target_id),
                "malformed seed chain: {:?} -> {:?}",
                a,
                b
            );
        }
    }
}

/// 从 read 位置 `q`、节点位置 `t` 开始向右的匹配长度
fn right_matches(query: &mut StrandQuery, q: usize, node: &Node, t: usize) -> usize {
    if let Some(tb) = node.seq_two_bit.as_ref() {
        if let Some((enc, shift)) = query.phased(q, t) {
            return count_right_matches(enc, q + shift, tb, t);
        }
    }
    query.bases[q..]
        .iter()
        .zip(&node.seq[t..])
        .take_while(|(a, b)| a == b && a.is_packable())
        .count()
}

/// 以 read 位置 `q`、节点位置 `t` 结尾（包含）向左的匹配长度
fn left_matches(query: &mut StrandQuery, q: usize, node: &Node, t: usize) -> usize {
    if let Some(tb) = node.seq_two_bit.as_ref() {
        if let Some((enc, shift)) = query.phased(q, t) {
            // 填充碱基不属于 read
            return count_left_matches(enc, q + shift, tb, t).min(q + 1);
        }
    }
    (0..=q.min(t))
        .take_while(|&d| {
            let a = query.bases[q - d];
            a == node.seq[t - d] && a.is_packable()
        })
        .count()
}

/// 最后一段恰好结束于节点末尾时，沿每个后继继续向右延伸。
/// 每条路径得到一个尾部（不含当前段），无法延伸时尾部为当前已收集的部分。
fn collect_right(
    graph: &GenomeGraph,
    query: &mut StrandQuery,
    node: &Node,
    q_end: usize,
    cur: &mut Vec<SeedPart>,
    out: &mut Vec<Vec<SeedPart>>,
) {
    if !extend_right_parts(graph, query, node, q_end, cur, out) {
        out.push(cur.clone());
    }
}

/// 空节点以长度 0 的段留在链中，穿过它之后没有匹配则不产生尾部
fn extend_right_parts(
    graph: &GenomeGraph,
    query: &mut StrandQuery,
    node: &Node,
    q_end: usize,
    cur: &mut Vec<SeedPart>,
    out: &mut Vec<Vec<SeedPart>>,
) -> bool {
    if q_end >= query.len() {
        return false;
    }
    let mut extended = false;
    for e in &node.next {
        let succ = graph.node(e.dest);
        let m = if succ.is_empty() { 0 } else { right_matches(query, q_end, succ, 0) };
        if m == 0 && !succ.is_empty() {
            continue;
        }
        cur.push(SeedPart {
            target_id: succ.id,
            target_start: 0,
            query_start: q_end as u32,
            length: m as u32,
        });
        if succ.is_empty() {
            extended |= extend_right_parts(graph, query, succ, q_end, cur, out);
        } else {
            extended = true;
            if m == succ.len() {
                collect_right(graph, query, succ, q_end + m, cur, out);
            } else {
                out.push(cur.clone());
            }
        }
        cur.pop();
    }
    extended
}

/// 第一段恰好从节点起点开始时，沿前驱向左延伸。
/// 只有前驱最后一个碱基与 read 上紧邻的碱基相同才继续，尽早剪枝。
/// `cur` 按从右到左的顺序收集，输出时翻转为从左到右。
fn collect_left(
    graph: &GenomeGraph,
    query: &mut StrandQuery,
    node: &Node,
    q_start: usize,
    cur: &mut Vec<SeedPart>,
    out: &mut Vec<Vec<SeedPart>>,
) {
    if !extend_left_parts(graph, query, node, q_start, cur, out) {
        out.push(cur.iter().rev().copied().collect());
    }
}

fn extend_left_parts(
    graph: &GenomeGraph,
    query: &mut StrandQuery,
    node: &Node,
    q_start: usize,
    cur: &mut Vec<SeedPart>,
    out: &mut Vec<Vec<SeedPart>>,
) -> bool {
    if q_start == 0 {
        return false;
    }
    let before: Base = query.bases[q_start - 1];
    let mut extended = false;
    for e in &node.prev {
        let pred = graph.node(e.dest);
        if pred.is_empty() {
            cur.push(SeedPart {
                target_id: pred.id,
                target_start: 0,
                query_start: q_start as u32,
                length: 0,
            });
            extended |= extend_left_parts(graph, query, pred, q_start, cur, out);
            cur.pop();
            continue;
        }
        match pred.seq.last() {
            Some(&b) if b == before && b.is_packable() => {}
            _ => continue,
        }
        let m = left_matches(query, q_start - 1, pred, pred.len() - 1);
        extended = true;
        cur.push(SeedPart {
            target_id: pred.id,
            target_start: (pred.len() - m) as u32,
            query_start: (q_start - m) as u32,
            length: m as u32,
        });
        if m == pred.len() {
            collect_left(graph, query, pred, q_start - m, cur, out);
        } else {
            out.push(cur.iter().rev().copied().collect());
        }
        cur.pop();
    }
    extended
}

/// 找出 read 两条链上的全部最大精确匹配种子，结果按 `total_length` 降序（稳定）存入 `ws.seeds`。
pub fn find_seeds(graph: &GenomeGraph, index: &SeedIndex, ws: &mut Workspace) {
    let k = index.seed_len();
    let step_one = index.step() == 1;
    let Workspace {
        fwd,
        rev,
        seeds,
        seed_pool,
        seen,
        ..
    } = ws;

    let mut heads: Vec<Vec<SeedPart>> = Vec::new();
    let mut tails: Vec<Vec<SeedPart>> = Vec::new();
    let mut cur: Vec<SeedPart> = Vec::new();

    for pos_strand in [true, false] {
        let query: &mut StrandQuery = if pos_strand { &mut *fwd } else { &mut *rev };
        let n = query.len();
        if n < k {
            continue;
        }
        for q in 0..=n - k {
            let Some(code) = kmer_code(&query.bases[q..q + k]) else {
                continue;
            };
            for &coord in index.lookup(code) {
                let (node_id, t) = unpack_coord(coord);
                let node = graph.node(node_id);
                let t = t as usize;
                // 前一个窗口已经找到同一个最大种子
                if step_one
                    && q > 0
                    && t > 0
                    && query.bases[q - 1] == node.seq[t - 1]
                    && node.seq[t - 1].is_packable()
                {
                    continue;
                }

                let right = right_matches(query, q, node, t);
                let left = if q > 0 && t > 0 { left_matches(query, q - 1, node, t - 1) } else { 0 };
                let core = SeedPart {
                    target_id: node_id,
                    target_start: (t - left) as u32,
                    query_start: (q - left) as u32,
                    length: (left + right) as u32,
                };

                heads.clear();
                if core.target_start == 0 {
                    cur.clear();
                    collect_left(graph, query, node, core.query_start as usize, &mut cur, &mut heads);
                } else {
                    heads.push(Vec::new());
                }

                tails.clear();
                if t + right == node.len() {
                    cur.clear();
                    collect_right(graph, query, node, q + right, &mut cur, &mut tails);
                } else {
                    tails.push(Vec::new());
                }

                for head in &heads {
                    for tail in &tails {
                        let mut parts = seed_pool.take_parts();
                        parts.extend_from_slice(head);
                        parts.push(core);
                        parts.extend_from_slice(tail);
                        parts.retain(|p| p.length > 0 || graph.node(p.target_id).is_empty());
                        let total_length: u32 = parts.iter().map(|p| p.length).sum();
                        if (total_length as usize) < k || !seen.insert((pos_strand, parts.clone())) {
                            seed_pool.put_parts(parts);
                            continue;
                        }
                        seeds.push(Seed { parts, pos_strand, total_length });
                    }
                }
            }
        }
    }

    seeds.sort_by(|a, b| b.total_length.cmp(&a.total_length));
}

/// 判断最长精确匹配为 `seed_len` 的比对是否还可能超过当前最优得分。
///
/// 若 read 上最长的连续匹配只有 `seed_len`，则比对中每 `seed_len` 个匹配碱基之间至少有一处断点
/// （错配、插入或缺失）。对每个断点数 `b` 取匹配碱基数的上限，两端未比对的部分按软剪切计 0 分，
/// 得到得分上界。种子按长度降序处理，一旦返回 false，后面的种子都可以跳过。
pub fn seed_could_be_better(
    seed_len: usize,
    best_score: i64,
    perfect_score: i64,
    read_len: usize,
    max_match: i64,
    max_mismatch: i64,
    gap_penalty: i64,
) -> bool {
    if seed_len == 0 {
        return false;
    }
    if seed_len >= read_len {
        return perfect_score > best_score;
    }
    let l = seed_len as i64;
    let n = read_len as i64;
    // 占用 read 碱基的断点：错配或插入
    let consuming = max_mismatch.max(-gap_penalty);
    let mut bound = i64::MIN;
    // b = ceil(n / l) 之后匹配数不再增加
    for b in 0..=(n + l - 1) / l {
        let runs = (b + 1) * l;
        let by_mismatch = runs.min(n - b) * max_match + b * consuming;
        let by_deletion = runs.min(n) * max_match - b * gap_penalty;
        bound = bound.max(by_mismatch).max(by_deletion);
    }
    bound.min(perfect_score) > best_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::five_node_graph;
    use crate::util::dna::from_ascii_seq;

    fn seeds_for(graph: &GenomeGraph, k: usize, read: &[u8]) -> Vec<Seed> {
        let index = SeedIndex::build(graph, k, 1).unwrap();
        let mut ws = Workspace::new(0);
        ws.begin_read(&from_ascii_seq(read));
        find_seeds(graph, &index, &mut ws);
        for s in &ws.seeds {
            s.assert_chain(graph);
        }
        ws.seeds.clone()
    }

    fn linear_graph(parts: &[&str]) -> GenomeGraph {
        let mut g = GenomeGraph::new();
        for p in parts {
            g.push_node(from_ascii_seq(p.as_bytes()));
        }
        for i in 1..parts.len() {
            g.add_edge(i as u32 - 1, i as u32, 1.0).unwrap();
        }
        g
    }

    #[test]
    fn seed_spans_successors() {
        let g = five_node_graph();
        let seeds = seeds_for(&g, 3, b"TGCGAT");
        let best = &seeds[0];
        assert!(best.pos_strand);
        assert_eq!(best.total_length, 6);
        let ids: Vec<u32> = best.parts.iter().map(|p| p.target_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 4]);
        assert_eq!(best.first().target_start, 1);
        assert_eq!(best.query_end(), 6);
    }

    #[test]
    fn seed_extends_left_into_predecessors() {
        let g = linear_graph(&["GGACGT", "TA", "CCATG"]);
        // the seed crosses both node boundaries
        let seeds = seeds_for(&g, 4, b"CGTTACCAT");
        let best = &seeds[0];
        assert_eq!(best.total_length, 9);
        let ids: Vec<u32> = best.parts.iter().map(|p| p.target_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(best.first().target_start, 3);
        assert_eq!(best.query_start(), 0);
    }

    #[test]
    fn left_extension_prunes_on_mismatching_predecessor() {
        let mut g = linear_graph(&["AAAC", "GTTTG"]);
        let other = g.push_node(from_ascii_seq(b"CCCA"));
        g.add_edge(other, 1, 1.0).unwrap();
        let seeds = seeds_for(&g, 4, b"ACGTTTG");
        let best = &seeds[0];
        assert_eq!(best.total_length, 7);
        assert_eq!(best.first().target_id, 0);
        assert!(seeds.iter().all(|s| s.parts.iter().all(|p| p.target_id != other)));
    }

    #[test]
    fn reverse_strand_seeds() {
        let g = linear_graph(&["ACGTTGCATGCA"]);
        let seeds = seeds_for(&g, 5, b"CATGCAACGT");
        // revcomp = ACGTTGCATG
        let best = &seeds[0];
        assert!(!best.pos_strand);
        assert_eq!(best.total_length, 10);
        assert_eq!(best.first().target_start, 0);
    }

    #[test]
    fn seeds_are_ranked_and_deterministic() {
        let g = five_node_graph();
        let a = seeds_for(&g, 2, b"ATGCGTTAA");
        let b = seeds_for(&g, 2, b"ATGCGTTAA");
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].total_length >= w[1].total_length));
        assert_eq!(a[0].total_length, 9);
        // no duplicates
        for (i, x) in a.iter().enumerate() {
            for y in &a[i + 1..] {
                assert!(!(x.pos_strand == y.pos_strand && x.parts == y.parts));
            }
        }
    }

    #[test]
    fn read_with_n_uses_scalar_path() {
        let g = linear_graph(&["ACGTACGGTCAT"]);
        let seeds = seeds_for(&g, 4, b"CGTACGNTCAT");
        let best = &seeds[0];
        assert_eq!(best.total_length, 6);
        assert_eq!(best.first().target_start, 1);
    }

    #[test]
    fn seed_passes_through_empty_node() {
        let g = linear_graph(&["GGACGT", "", "CCATG"]);
        let seeds = seeds_for(&g, 4, b"ACGTCCAT");
        let best = &seeds[0];
        assert!(best.pos_strand);
        assert_eq!(best.total_length, 8);
        let ids: Vec<u32> = best.parts.iter().map(|p| p.target_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(best.parts[1].length, 0);
        assert_eq!(best.first().target_start, 2);
        // found from both the left and the right hit, kept once
        assert_eq!(seeds.iter().filter(|s| s.pos_strand && s.total_length == 8).count(), 1);
    }

    #[test]
    fn short_read_has_no_seeds() {
        let g = five_node_graph();
        assert!(seeds_for(&g, 4, b"ATG").is_empty());
    }

    #[test]
    fn pruning_predicate() {
        // perfect alignment already found: nothing beats it
        assert!(!seed_could_be_better(10, 200, 200, 100, 2, -1, 2));
        assert!(seed_could_be_better(100, 150, 200, 100, 2, -1, 2));
        // a 2-base seed in a 100-base read leaves at least 33 breaks
        assert!(!seed_could_be_better(2, 150, 200, 100, 2, -1, 5));
        assert!(seed_could_be_better(50, 150, 200, 100, 2, -1, 5));
        assert!(!seed_could_be_better(0, -10, 200, 100, 2, -1, 5));
    }

    #[test]
    fn pruning_bound_allows_clipped_remainder() {
        // 16M 1X 16M 1S scores 32 * 90 - 330 = 2550
        assert!(seed_could_be_better(16, 2220, 3060, 34, 90, -330, 600));
        assert!(!seed_could_be_better(16, 2550, 3060, 34, 90, -330, 600));
        // cheap gaps: all 17 bases match around two deletions
        assert!(seed_could_be_better(8, 160, 170, 17, 10, -1000, 1));
        assert!(!seed_could_be_better(8, 168, 170, 17, 10, -1000, 1));
    }
}
