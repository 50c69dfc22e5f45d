use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::util::dna::{Base, SIGMA};

const TRACE_STOP: u8 = 0;
const TRACE_DIAG: u8 = 1;
/// 只消耗 target：缺失
const TRACE_UP: u8 = 2;
/// 只消耗 query：插入
const TRACE_LEFT: u8 = 3;

/// 碱基对打分矩阵（A, C, G, T, N）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    pub scores: [[i64; SIGMA]; SIGMA],
}

impl ScoreMatrix {
    /// 人-黑猩猩比对常用的 5x5 矩阵
    pub fn human_chimp() -> Self {
        Self {
            scores: [
                [90, -330, -236, -356, -208],
                [-330, 100, -318, -236, -196],
                [-236, -318, 100, -330, -196],
                [-356, -236, -330, 90, -208],
                [-208, -196, -196, -208, -202],
            ],
        }
    }

    /// 匹配得 `match_score`，错配与 N 扣 `mismatch_penalty`
    pub fn simple(match_score: i64, mismatch_penalty: i64) -> Self {
        let mut scores = [[-mismatch_penalty; SIGMA]; SIGMA];
        for (i, row) in scores.iter_mut().enumerate().take(4) {
            row[i] = match_score;
        }
        Self { scores }
    }

    #[inline]
    pub fn score(&self, a: Base, b: Base) -> i64 {
        self.scores[a.score_index()][b.score_index()]
    }

    /// A/C/G/T 自身配对的最高分
    pub fn max_match(&self) -> i64 {
        (0..4).map(|i| self.scores[i][i]).max().unwrap_or(0)
    }

    /// A/C/G/T 之间错配的最高分（通常为负）
    pub fn max_mismatch(&self) -> i64 {
        let mut best = i64::MIN;
        for i in 0..4 {
            for j in 0..4 {
                if i != j {
                    best = best.max(self.scores[i][j]);
                }
            }
        }
        best
    }

    /// 序列与自身完全匹配的得分
    pub fn perfect_score(&self, seq: &[Base]) -> i64 {
        seq.iter().map(|&b| self.score(b, b)).sum()
    }
}

impl Default for ScoreMatrix {
    fn default() -> Self {
        Self::human_chimp()
    }
}

/// 扩展动态规划的两种模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DpMode {
    /// Smith-Waterman 风格：以种子得分为初值，分数跌到 0 以下的格子截断为 0 且不再延伸，
    /// 从全局最大格子回溯
    Local,
    /// Needleman-Wunsch 风格：总是从最后一个格子回溯
    Global,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CigarOp {
    Match,
    Insertion,
    Deletion,
    SoftClip,
}

impl CigarOp {
    pub fn as_char(self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
            CigarOp::SoftClip => 'S',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' => Some(CigarOp::Match),
            'I' => Some(CigarOp::Insertion),
            'D' => Some(CigarOp::Deletion),
            'S' => Some(CigarOp::SoftClip),
            _ => None,
        }
    }

    #[inline]
    pub fn consumes_query(self) -> bool {
        !matches!(self, CigarOp::Deletion)
    }

    #[inline]
    pub fn consumes_target(self) -> bool {
        matches!(self, CigarOp::Match | CigarOp::Deletion)
    }
}

/// 游程编码的比对操作
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cigar {
    pub op: CigarOp,
    pub len: u32,
}

/// 追加操作，与末尾同类操作合并
pub fn push_op(ops: &mut Vec<Cigar>, op: CigarOp, len: u32) {
    if len == 0 {
        return;
    }
    if let Some(last) = ops.last_mut() {
        if last.op == op {
            last.len += len;
            return;
        }
    }
    ops.push(Cigar { op, len });
}

pub fn extend_ops(ops: &mut Vec<Cigar>, more: &[Cigar]) {
    for c in more {
        push_op(ops, c.op, c.len);
    }
}

pub fn ops_to_cigar(ops: &[Cigar]) -> String {
    let mut cigar = String::new();
    for c in ops {
        let _ = write!(&mut cigar, "{}{}", c.len, c.op.as_char());
    }
    cigar
}

pub fn parse_cigar(cigar: &str) -> Vec<Cigar> {
    let mut result = Vec::new();
    let mut num = 0u32;
    for ch in cigar.chars() {
        if let Some(d) = ch.to_digit(10) {
            num = num * 10 + d;
        } else {
            if let Some(op) = CigarOp::from_char(ch) {
                push_op(&mut result, op, num);
            }
            num = 0;
        }
    }
    result
}

pub fn query_len(ops: &[Cigar]) -> usize {
    ops.iter().filter(|c| c.op.consumes_query()).map(|c| c.len as usize).sum()
}

pub fn target_len(ops: &[Cigar]) -> usize {
    ops.iter().filter(|c| c.op.consumes_target()).map(|c| c.len as usize).sum()
}

/// 扩展结果：`target_end` / `query_end` 为从锚点算起消耗的碱基数
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DpResult {
    pub score: i64,
    pub ops: Vec<Cigar>,
    pub target_end: usize,
    pub query_end: usize,
}

/// DP 打分 / 回溯矩阵，可跨调用复用，容量按倍数增长
#[derive(Debug, Default)]
pub struct DpMatrix {
    score: Vec<i64>,
    trace: Vec<u8>,
    cols: usize,
    grow_count: usize,
}

impl DpMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cells: usize) -> Self {
        Self {
            score: vec![0; cells],
            trace: vec![TRACE_STOP; cells],
            cols: 0,
            grow_count: 0,
        }
    }

    /// 当前可容纳的格子数
    pub fn capacity(&self) -> usize {
        self.score.len()
    }

    /// 扩容次数，用于观察池的复用效果
    pub fn grow_count(&self) -> usize {
        self.grow_count
    }

    fn ensure(&mut self, rows: usize, cols: usize) {
        let need = rows * cols;
        if need > self.score.len() {
            let mut cap = self.score.len().max(64);
            while cap < need {
                cap *= 2;
            }
            self.score.resize(cap, 0);
            self.trace.resize(cap, TRACE_STOP);
            self.grow_count += 1;
        }
        self.cols = cols;
        assert!(self.score.len() >= need, "DP matrix holds {} cells, {} requested", self.score.len(), need);
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.cols + j
    }
}

/// 从锚点 (0, 0) 出发，将 `query` 扩展比对到 `target` 上。
///
/// 两条序列都按远离种子的方向排列（左侧扩展由调用方预先反转）。
/// `Local` 模式下 `h0` 为种子得分，返回的 `score` 为相对 `h0` 的增益（不为负）。
pub fn extend_dp(
    target: &[Base],
    query: &[Base],
    scores: &ScoreMatrix,
    gap_penalty: i64,
    mode: DpMode,
    h0: i64,
    mat: &mut DpMatrix,
) -> DpResult {
    if query.is_empty() && mode == DpMode::Local {
        return DpResult::default();
    }
    let rows = target.len() + 1;
    let cols = query.len() + 1;
    mat.ensure(rows, cols);

    let (bi, bj, score) = match mode {
        DpMode::Local => fill_local(target, query, scores, gap_penalty, h0.max(1), mat),
        DpMode::Global => fill_global(target, query, scores, gap_penalty, mat),
    };

    let ops = traceback(mat, bi, bj);
    DpResult {
        score,
        ops,
        target_end: bi,
        query_end: bj,
    }
}

#[inline]
fn alive(t: &[u8], cols: usize, i: usize, j: usize) -> bool {
    (i == 0 && j == 0) || t[i * cols + j] != TRACE_STOP
}

fn fill_local(
    target: &[Base],
    query: &[Base],
    scores: &ScoreMatrix,
    gap: i64,
    h0: i64,
    mat: &mut DpMatrix,
) -> (usize, usize, i64) {
    let cols = mat.cols;
    let h = &mut mat.score;
    let t = &mut mat.trace;
    h[0] = h0;
    t[0] = TRACE_STOP;
    let mut best = h0;
    let (mut best_i, mut best_j) = (0usize, 0usize);

    for j in 1..cols {
        let v = h[j - 1] - gap;
        if alive(t, cols, 0, j - 1) && v > 0 {
            h[j] = v;
            t[j] = TRACE_LEFT;
        } else {
            h[j] = 0;
            t[j] = TRACE_STOP;
        }
    }

    for i in 1..=target.len() {
        let row = i * cols;
        let up0 = h[row - cols] - gap;
        if alive(t, cols, i - 1, 0) && up0 > 0 {
            h[row] = up0;
            t[row] = TRACE_UP;
        } else {
            h[row] = 0;
            t[row] = TRACE_STOP;
        }

        for j in 1..cols {
            let mut val = i64::MIN;
            let mut tr = TRACE_STOP;
            if alive(t, cols, i - 1, j - 1) {
                val = h[row - cols + j - 1] + scores.score(target[i - 1], query[j - 1]);
                tr = TRACE_DIAG;
            }
            if alive(t, cols, i - 1, j) {
                let v = h[row - cols + j] - gap;
                if v > val {
                    val = v;
                    tr = TRACE_UP;
                }
            }
            if alive(t, cols, i, j - 1) {
                let v = h[row + j - 1] - gap;
                if v > val {
                    val = v;
                    tr = TRACE_LEFT;
                }
            }
            if tr == TRACE_STOP || val <= 0 {
                h[row + j] = 0;
                t[row + j] = TRACE_STOP;
                continue;
            }
            h[row + j] = val;
            t[row + j] = tr;
            if val > best {
                best = val;
                best_i = i;
                best_j = j;
            }
        }
    }
    (best_i, best_j, best - h0)
}

fn fill_global(target: &[Base], query: &[Base], scores: &ScoreMatrix, gap: i64, mat: &mut DpMatrix) -> (usize, usize, i64) {
    let cols = mat.cols;
    let h = &mut mat.score;
    let t = &mut mat.trace;

    h[0] = 0;
    t[0] = TRACE_STOP;
    for j in 1..cols {
        h[j] = h[j - 1] - gap;
        t[j] = TRACE_LEFT;
    }
    for i in 1..=target.len() {
        let row = i * cols;
        h[row] = h[row - cols] - gap;
        t[row] = TRACE_UP;
        for j in 1..cols {
            let mut val = h[row - cols + j - 1] + scores.score(target[i - 1], query[j - 1]);
            let mut tr = TRACE_DIAG;
            let up = h[row - cols + j] - gap;
            if up > val {
                val = up;
                tr = TRACE_UP;
            }
            let left = h[row + j - 1] - gap;
            if left > val {
                val = left;
                tr = TRACE_LEFT;
            }
            h[row + j] = val;
            t[row + j] = tr;
        }
    }
    let last_i = target.len();
    let last_j = cols - 1;
    (last_i, last_j, h[last_i * cols + last_j])
}

fn traceback(mat: &DpMatrix, mut i: usize, mut j: usize) -> Vec<Cigar> {
    let mut rev: Vec<Cigar> = Vec::new();
    while i > 0 || j > 0 {
        match mat.trace[mat.idx(i, j)] {
            TRACE_DIAG => {
                push_op(&mut rev, CigarOp::Match, 1);
                i -= 1;
                j -= 1;
            }
            TRACE_UP => {
                push_op(&mut rev, CigarOp::Deletion, 1);
                i -= 1;
            }
            TRACE_LEFT => {
                push_op(&mut rev, CigarOp::Insertion, 1);
                j -= 1;
            }
            _ => panic!("traceback reached a dead cell at ({}, {})", i, j),
        }
    }
    rev.reverse();
    rev
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna::from_ascii_seq;

    fn simple() -> ScoreMatrix {
        ScoreMatrix::simple(2, 1)
    }

    fn run(target: &[u8], query: &[u8], mode: DpMode, h0: i64) -> DpResult {
        let mut mat = DpMatrix::new();
        extend_dp(&from_ascii_seq(target), &from_ascii_seq(query), &simple(), 2, mode, h0, &mut mat)
    }

    #[test]
    fn local_perfect_extension() {
        let res = run(b"ACGT", b"ACGT", DpMode::Local, 10);
        assert_eq!(res.score, 8);
        assert_eq!(ops_to_cigar(&res.ops), "4M");
        assert_eq!((res.target_end, res.query_end), (4, 4));
    }

    #[test]
    fn local_stops_at_running_max() {
        let res = run(b"ACGTTTTT", b"ACGTGGGG", DpMode::Local, 10);
        assert_eq!(res.score, 8);
        assert_eq!(ops_to_cigar(&res.ops), "4M");
        assert_eq!(res.query_end, 4);
    }

    #[test]
    fn local_insertion() {
        let res = run(b"AACCGGTT", b"AACCAGGTT", DpMode::Local, 10);
        assert_eq!(res.score, 14);
        assert_eq!(ops_to_cigar(&res.ops), "4M1I4M");
        assert_eq!((res.target_end, res.query_end), (8, 9));
    }

    #[test]
    fn local_deletion() {
        let res = run(b"AACCAGGTT", b"AACCGGTT", DpMode::Local, 10);
        assert_eq!(res.score, 14);
        assert_eq!(ops_to_cigar(&res.ops), "4M1D4M");
        assert_eq!((res.target_end, res.query_end), (9, 8));
    }

    #[test]
    fn local_dead_cells_never_extend() {
        let res = run(b"TTTT", b"AAAA", DpMode::Local, 1);
        assert_eq!(res.score, 0);
        assert!(res.ops.is_empty());
        assert_eq!((res.target_end, res.query_end), (0, 0));
    }

    #[test]
    fn local_empty_query() {
        let res = run(b"ACGT", b"", DpMode::Local, 5);
        assert_eq!(res, DpResult::default());
    }

    #[test]
    fn global_traces_from_final_cell() {
        let res = run(b"ACGT", b"ACCT", DpMode::Global, 0);
        assert_eq!(res.score, 5);
        assert_eq!(ops_to_cigar(&res.ops), "4M");

        let res = run(b"ACGTAA", b"ACGT", DpMode::Global, 0);
        assert_eq!(res.score, 4);
        assert_eq!(ops_to_cigar(&res.ops), "4M2D");
        assert_eq!((res.target_end, res.query_end), (6, 4));
    }

    #[test]
    fn matrix_is_reused_and_grows_geometrically() {
        let mut mat = DpMatrix::new();
        let s = simple();
        let q = from_ascii_seq(b"ACGTACGTAC");
        extend_dp(&q, &q, &s, 2, DpMode::Local, 1, &mut mat);
        assert_eq!(mat.capacity(), 128);
        assert_eq!(mat.grow_count(), 1);
        extend_dp(&q[..5], &q[..5], &s, 2, DpMode::Local, 1, &mut mat);
        assert_eq!(mat.grow_count(), 1);
        let long = from_ascii_seq(&[b'A'; 40]);
        extend_dp(&long, &long, &s, 2, DpMode::Global, 0, &mut mat);
        assert!(mat.capacity() >= 41 * 41);
        assert_eq!(mat.capacity() % 128, 0);
        assert_eq!(mat.grow_count(), 2);
    }

    #[test]
    fn score_matrix_helpers() {
        let hc = ScoreMatrix::human_chimp();
        assert_eq!(hc.max_match(), 100);
        assert_eq!(hc.max_mismatch(), -236);
        let s = simple();
        assert_eq!(s.score(Base::A, Base::A), 2);
        assert_eq!(s.score(Base::A, Base::N), -1);
        assert_eq!(s.score(Base::N, Base::N), -1);
        assert_eq!(s.perfect_score(&from_ascii_seq(b"ACGT")), 8);
    }

    #[test]
    fn cigar_helpers() {
        let mut ops = Vec::new();
        push_op(&mut ops, CigarOp::SoftClip, 2);
        push_op(&mut ops, CigarOp::Match, 3);
        push_op(&mut ops, CigarOp::Match, 4);
        push_op(&mut ops, CigarOp::Deletion, 0);
        push_op(&mut ops, CigarOp::Insertion, 1);
        assert_eq!(ops_to_cigar(&ops), "2S7M1I");
        assert_eq!(parse_cigar("2S7M1I"), ops);
        assert_eq!(query_len(&ops), 10);
        assert_eq!(target_len(&ops), 7);
    }
}
