//! 种子-扩展比对：种子查找、图遍历扩展 DP、多线程流水线。

pub mod pipeline;
pub mod result;
pub mod seed;
pub mod sw;
pub mod traverse;
pub mod workspace;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::graph::GenomeGraph;
use crate::index::{SeedIndex, MAX_SEED_LEN, MIN_SEED_LEN};
use crate::util::dna::Base;

pub use pipeline::{align_all, align_stream, CancelToken, PipelineStats};
pub use result::{AlignmentResult, Read};
pub use seed::{find_seeds, seed_could_be_better, Seed, SeedPart};
pub use sw::{Cigar, CigarOp, DpMode, ScoreMatrix};
pub use workspace::Workspace;

use sw::{extend_ops, push_op};
use traverse::{extend_left, extend_right, FlankParams};

/// 比对参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignOpt {
    pub seed_len: usize,
    /// 索引步长
    pub step: usize,
    pub scores: ScoreMatrix,
    /// 每个空位碱基扣除的分数（正数）
    pub gap_penalty: i64,
    /// 覆盖局部模式下默认的扩展余量 `perfect_score / gap_penalty`
    pub extension_slack: Option<usize>,
    /// 低于此分数的 read 报告为未比对
    pub min_score: i64,
    pub mode: DpMode,
    pub threads: usize,
    /// 输入 / 输出队列的容量
    pub queue_capacity: usize,
}

impl Default for AlignOpt {
    fn default() -> Self {
        Self {
            seed_len: 16,
            step: 1,
            scores: ScoreMatrix::default(),
            gap_penalty: 600,
            extension_slack: None,
            min_score: 10_000,
            mode: DpMode::Local,
            threads: 1,
            queue_capacity: 1024,
        }
    }
}

impl AlignOpt {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&self.seed_len) {
            bail!(
                "seed length {} is outside the supported range {}..={}",
                self.seed_len,
                MIN_SEED_LEN,
                MAX_SEED_LEN
            );
        }
        if self.step == 0 {
            bail!("index step size must be at least 1");
        }
        if self.gap_penalty <= 0 {
            bail!("gap penalty must be positive, got {}", self.gap_penalty);
        }
        if self.threads == 0 {
            bail!("at least one worker thread is required");
        }
        if self.queue_capacity == 0 {
            bail!("queue capacity must be at least 1");
        }
        Ok(())
    }

    /// 为 `flank_len` 个 query 碱基收集的目标碱基数
    pub fn extension_budget(&self, flank_len: usize, perfect_score: i64) -> usize {
        if flank_len == 0 {
            return 0;
        }
        match self.mode {
            DpMode::Global => flank_len,
            DpMode::Local => {
                let slack = self
                    .extension_slack
                    .unwrap_or_else(|| (perfect_score.max(0) / self.gap_penalty) as usize);
                flank_len + slack
            }
        }
    }
}

/// 在一张图及其种子索引上比对 read；自身只读，可被多个线程共享
pub struct GraphAligner<'a> {
    graph: &'a GenomeGraph,
    index: &'a SeedIndex,
    opt: &'a AlignOpt,
}

impl<'a> GraphAligner<'a> {
    pub fn new(graph: &'a GenomeGraph, index: &'a SeedIndex, opt: &'a AlignOpt) -> Self {
        Self { graph, index, opt }
    }

    /// 比对一条 read，返回得分最高的结果（可能为未比对）
    pub fn align(&self, read: &Read, ws: &mut Workspace) -> AlignmentResult {
        ws.begin_read(&read.seq);
        find_seeds(self.graph, self.index, ws);

        let opt = self.opt;
        let read_len = read.seq.len();
        let max_match = opt.scores.max_match();
        let max_mismatch = opt.scores.max_mismatch();

        let mut best: Option<AlignmentResult> = None;
        let mut best_score = i64::MIN;

        let seeds = std::mem::take(&mut ws.seeds);
        {
            let Workspace {
                fwd, rev, dp, scratch, ..
            } = &mut *ws;
            let perfect_fwd = opt.scores.perfect_score(&fwd.bases);
            let perfect_rev = opt.scores.perfect_score(&rev.bases);

            for seed in &seeds {
                let (bases, perfect): (&[Base], i64) = if seed.pos_strand {
                    (fwd.bases.as_slice(), perfect_fwd)
                } else {
                    (rev.bases.as_slice(), perfect_rev)
                };
                if !seed_could_be_better(
                    seed.total_length as usize,
                    best_score,
                    perfect,
                    read_len,
                    max_match,
                    max_mismatch,
                    opt.gap_penalty,
                ) {
                    break;
                }
                seed.assert_chain(self.graph);

                let qs = seed.query_start();
                let qe = seed.query_end();
                let seed_score = opt.scores.perfect_score(&bases[qs..qe]);
                let first = *seed.first();
                let last = *seed.last();

                let left = extend_left(
                    self.graph,
                    first.target_id,
                    first.target_start as usize,
                    &bases[..qs],
                    FlankParams {
                        scores: &opt.scores,
                        gap_penalty: opt.gap_penalty,
                        mode: opt.mode,
                        h0: seed_score,
                        budget: opt.extension_budget(qs, perfect),
                    },
                    dp,
                    scratch,
                );
                let right = extend_right(
                    self.graph,
                    last.target_id,
                    (last.target_start + last.length) as usize,
                    &bases[qe..],
                    FlankParams {
                        scores: &opt.scores,
                        gap_penalty: opt.gap_penalty,
                        mode: opt.mode,
                        h0: seed_score + left.score,
                        budget: opt.extension_budget(read_len - qe, perfect),
                    },
                    dp,
                    scratch,
                );

                let total = left.score + seed_score + right.score;
                if total <= best_score {
                    continue;
                }
                best_score = total;

                let query_start = qs - left.query_consumed;
                let query_end = qe + right.query_consumed;
                let mut cigar = Vec::with_capacity(left.ops.len() + right.ops.len() + 3);
                push_op(&mut cigar, CigarOp::SoftClip, query_start as u32);
                extend_ops(&mut cigar, &left.ops);
                push_op(&mut cigar, CigarOp::Match, seed.total_length);
                extend_ops(&mut cigar, &right.ops);
                push_op(&mut cigar, CigarOp::SoftClip, (read_len - query_end) as u32);

                let mut path = left.nodes;
                for p in &seed.parts {
                    path.push(p.target_id);
                }
                path.extend_from_slice(&right.nodes);

                let (seq, qual) = if seed.pos_strand {
                    (read.seq.clone(), read.qual.clone())
                } else {
                    (rev.bases.clone(), read.qual.iter().rev().copied().collect())
                };

                best = Some(AlignmentResult {
                    query_name: read.name.clone(),
                    pos_strand: seed.pos_strand,
                    score: total,
                    path,
                    target_start: left.offset,
                    target_end: right.offset,
                    query_start,
                    query_end,
                    cigar,
                    seq,
                    qual,
                });
            }
        }
        ws.seeds = seeds;
        ws.finish_read();

        match best {
            Some(aln) if aln.score >= opt.min_score => aln,
            Some(aln) => {
                log::debug!("{}: best score {} below minimum {}", read.name, aln.score, opt.min_score);
                AlignmentResult::unmapped(read, aln.score)
            }
            None => {
                log::debug!("{}: no seeds", read.name);
                AlignmentResult::unmapped(read, 0)
            }
        }
    }
}
