//! 种子两侧的图遍历扩展。
//!
//! 从锚点出发沿出边（右侧）或入边（左侧）累积目标序列，直到达到扩展预算
//! 或没有更多的边，然后在终点上运行一次扩展 DP；分支之间保留得分最高者。

use crate::graph::GenomeGraph;
use crate::util::dna::Base;

use super::sw::{extend_dp, Cigar, DpMatrix, DpMode, ScoreMatrix};
use super::workspace::TraversalScratch;

/// 单侧扩展的打分参数
#[derive(Debug, Clone, Copy)]
pub struct FlankParams<'a> {
    pub scores: &'a ScoreMatrix,
    pub gap_penalty: i64,
    pub mode: DpMode,
    /// 局部模式下的锚点初值（种子得分）
    pub h0: i64,
    /// 最多收集的目标碱基数
    pub budget: usize,
}

/// 单侧扩展结果，全部按 read 的正向（从左到右）给出
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlankResult {
    pub score: i64,
    pub ops: Vec<Cigar>,
    /// 锚点节点之外经过的节点，按路径顺序
    pub nodes: Vec<u32>,
    /// 右侧：最后一个节点内的结束偏移（不含）；左侧：第一个节点内的起始偏移
    pub offset: usize,
    pub query_consumed: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

struct Walk<'a> {
    graph: &'a GenomeGraph,
    dir: Direction,
    query: &'a [Base],
    params: FlankParams<'a>,
    target: &'a mut Vec<Base>,
    bounds: &'a mut Vec<(u32, usize)>,
    dp: &'a mut DpMatrix,
    best: Option<(i64, Vec<Cigar>, usize, usize, Vec<(u32, usize)>)>,
}

impl Walk<'_> {
    fn descend(&mut self, node: u32) {
        let len = self.target.len();
        let graph = self.graph;
        let n = graph.node(node);
        let edges = match self.dir {
            Direction::Right => &n.next,
            Direction::Left => &n.prev,
        };
        if len >= self.params.budget || edges.is_empty() {
            self.terminal();
            return;
        }
        for e in edges {
            let next = graph.node(e.dest);
            let take = (self.params.budget - len).min(next.len());
            match self.dir {
                Direction::Right => self.target.extend_from_slice(&next.seq[..take]),
                Direction::Left => self.target.extend(next.seq[next.len() - take..].iter().rev()),
            }
            self.bounds.push((e.dest, self.target.len()));
            self.descend(e.dest);
            self.bounds.pop();
            self.target.truncate(len);
        }
    }

    fn terminal(&mut self) {
        let p = self.params;
        let res = extend_dp(&self.target[..], self.query, p.scores, p.gap_penalty, p.mode, p.h0, &mut *self.dp);
        if self.best.as_ref().map_or(true, |b| res.score > b.0) {
            // 只保留真正用到的节点；尾部未消耗碱基的节点不计入路径
            let used = self.bounds.iter().position(|&(_, end)| end >= res.target_end).unwrap_or(0);
            let path = self.bounds[..=used].to_vec();
            self.best = Some((res.score, res.ops, res.target_end, res.query_end, path));
        }
    }
}

fn run(
    graph: &GenomeGraph,
    dir: Direction,
    anchor: u32,
    anchor_take: usize,
    query: &[Base],
    params: FlankParams<'_>,
    dp: &mut DpMatrix,
    target: &mut Vec<Base>,
    bounds: &mut Vec<(u32, usize)>,
) -> (i64, Vec<Cigar>, usize, usize, Vec<(u32, usize)>) {
    bounds.clear();
    bounds.push((anchor, target.len()));
    debug_assert_eq!(target.len(), anchor_take);
    let mut walk = Walk {
        graph,
        dir,
        query,
        params,
        target,
        bounds,
        dp,
        best: None,
    };
    walk.descend(anchor);
    walk.best.unwrap_or_default()
}

/// 从锚点节点 `anchor` 的偏移 `anchor_end`（不含）开始向右扩展 `query`
pub fn extend_right(
    graph: &GenomeGraph,
    anchor: u32,
    anchor_end: usize,
    query: &[Base],
    params: FlankParams<'_>,
    dp: &mut DpMatrix,
    scratch: &mut TraversalScratch,
) -> FlankResult {
    let node = graph.node(anchor);
    let take = (node.len() - anchor_end).min(params.budget);
    let TraversalScratch { target, bounds, .. } = scratch;
    target.clear();
    target.extend_from_slice(&node.seq[anchor_end..anchor_end + take]);

    let (score, ops, consumed, query_consumed, path) =
        run(graph, Direction::Right, anchor, take, query, params, dp, target, bounds);

    let (nodes, offset) = if path.len() <= 1 {
        (Vec::new(), anchor_end + consumed)
    } else {
        let before = path[path.len() - 2].1;
        (path[1..].iter().map(|&(id, _)| id).collect(), consumed - before)
    };
    FlankResult {
        score,
        ops,
        nodes,
        offset,
        query_consumed,
    }
}

/// 以锚点节点 `anchor` 的偏移 `anchor_start` 为右端向左扩展 `query`。
/// `query` 按正向给出，扩展从它的最后一个碱基开始。
pub fn extend_left(
    graph: &GenomeGraph,
    anchor: u32,
    anchor_start: usize,
    query: &[Base],
    params: FlankParams<'_>,
    dp: &mut DpMatrix,
    scratch: &mut TraversalScratch,
) -> FlankResult {
    let node = graph.node(anchor);
    let take = anchor_start.min(params.budget);
    let TraversalScratch {
        target,
        bounds,
        query: rev_query,
    } = scratch;
    target.clear();
    target.extend(node.seq[anchor_start - take..anchor_start].iter().rev());
    rev_query.clear();
    rev_query.extend(query.iter().rev());

    let (score, mut ops, consumed, query_consumed, path) =
        run(graph, Direction::Left, anchor, take, &rev_query[..], params, dp, target, bounds);
    ops.reverse();

    let (nodes, offset) = if path.len() <= 1 {
        (Vec::new(), anchor_start - consumed)
    } else {
        let before = path[path.len() - 2].1;
        let (last, _) = path[path.len() - 1];
        let mut nodes: Vec<u32> = path[1..].iter().map(|&(id, _)| id).collect();
        nodes.reverse();
        (nodes, graph.node(last).len() - (consumed - before))
    };
    FlankResult {
        score,
        ops,
        nodes,
        offset,
        query_consumed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::sw::{ops_to_cigar, ScoreMatrix};
    use crate::graph::tests::five_node_graph;
    use crate::util::dna::from_ascii_seq;

    fn params(scores: &ScoreMatrix, mode: DpMode, budget: usize) -> FlankParams<'_> {
        FlankParams {
            scores,
            gap_penalty: 3,
            mode,
            h0: 10,
            budget,
        }
    }

    #[test]
    fn right_flank_picks_best_branch() {
        let g = five_node_graph();
        let sc = ScoreMatrix::simple(2, 4);
        let mut dp = DpMatrix::new();
        let mut scratch = TraversalScratch::default();
        // anchor ends after "CG" in node 1; flank "TTA" follows node 3 then node 4
        let q = from_ascii_seq(b"TTA");
        let r = extend_right(&g, 1, 2, &q, params(&sc, DpMode::Local, 5), &mut dp, &mut scratch);
        assert_eq!(r.score, 6);
        assert_eq!(ops_to_cigar(&r.ops), "3M");
        assert_eq!(r.nodes, vec![3, 4]);
        assert_eq!(r.offset, 2);
        assert_eq!(r.query_consumed, 3);
    }

    #[test]
    fn right_flank_within_anchor() {
        let g = five_node_graph();
        let sc = ScoreMatrix::simple(2, 4);
        let mut dp = DpMatrix::new();
        let mut scratch = TraversalScratch::default();
        let q = from_ascii_seq(b"A");
        let r = extend_right(&g, 4, 1, &q, params(&sc, DpMode::Local, 4), &mut dp, &mut scratch);
        assert_eq!(r.score, 2);
        assert!(r.nodes.is_empty());
        assert_eq!(r.offset, 2);
    }

    #[test]
    fn left_flank_walks_predecessors() {
        let g = five_node_graph();
        let sc = ScoreMatrix::simple(2, 4);
        let mut dp = DpMatrix::new();
        let mut scratch = TraversalScratch::default();
        // seed starts at node 4 offset 0; read before it is "TGCGA" = n0[1..] + n1 + n2
        let q = from_ascii_seq(b"TGCGA");
        let r = extend_left(&g, 4, 0, &q, params(&sc, DpMode::Local, 8), &mut dp, &mut scratch);
        assert_eq!(r.score, 10);
        assert_eq!(ops_to_cigar(&r.ops), "5M");
        assert_eq!(r.nodes, vec![0, 1, 2]);
        assert_eq!(r.offset, 1);
        assert_eq!(r.query_consumed, 5);
    }

    #[test]
    fn local_flank_stops_at_divergence() {
        let g = five_node_graph();
        let sc = ScoreMatrix::simple(2, 4);
        let mut dp = DpMatrix::new();
        let mut scratch = TraversalScratch::default();
        // "GG" diverges from every continuation after "ATG"
        let q = from_ascii_seq(b"CGGG");
        let r = extend_right(&g, 0, 3, &q, params(&sc, DpMode::Local, 6), &mut dp, &mut scratch);
        assert_eq!(r.score, 4);
        assert_eq!(r.nodes, vec![1]);
        assert_eq!(r.offset, 2);
        assert_eq!(r.query_consumed, 2);
    }

    #[test]
    fn global_flank_consumes_whole_query() {
        let g = five_node_graph();
        let sc = ScoreMatrix::simple(2, 4);
        let mut dp = DpMatrix::new();
        let mut scratch = TraversalScratch::default();
        let q = from_ascii_seq(b"CGA");
        let r = extend_right(&g, 0, 3, &q, params(&sc, DpMode::Global, 3), &mut dp, &mut scratch);
        assert_eq!(r.score, 6);
        assert_eq!(r.query_consumed, 3);
        assert_eq!(r.nodes, vec![1, 2]);
        assert_eq!(r.offset, 1);
    }

    #[test]
    fn empty_flank() {
        let g = five_node_graph();
        let sc = ScoreMatrix::simple(2, 4);
        let mut dp = DpMatrix::new();
        let mut scratch = TraversalScratch::default();
        let r = extend_left(&g, 0, 0, &[], params(&sc, DpMode::Local, 0), &mut dp, &mut scratch);
        assert_eq!(r, FlankResult::default());
    }
}
