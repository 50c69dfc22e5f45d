//! 每个工作线程私有的可复用缓冲区。
//!
//! DP 矩阵、种子链、图遍历的临时序列以及 read 的 2-bit 编码都在这里复用，
//! 不在线程之间共享，热路径上没有锁。

use std::collections::HashSet;

use super::seed::{Seed, SeedPart};
use super::sw::DpMatrix;
use crate::util::dna::{self, Base};
use crate::util::twobit::{TwoBitSequence, BASES_PER_WORD};

/// 初始 DP 矩阵大小（格子数），约可容纳 150bp 的侧翼
const INITIAL_DP_CELLS: usize = 1 << 16;

/// 单条链方向上的 read 编码。
///
/// 两段 2-bit 序列比较要求起点在字内偏移一致，因此按需为每个偏移量
/// 生成一份前置填充的打包序列：`shifted[s]` 中 read 的第 `q` 个碱基位于 `q + s`。
#[derive(Debug, Default)]
pub struct StrandQuery {
    pub bases: Vec<Base>,
    packable: bool,
    shifted: Vec<TwoBitSequence>,
    built: [bool; BASES_PER_WORD],
}

impl StrandQuery {
    pub fn new() -> Self {
        Self {
            bases: Vec::new(),
            packable: false,
            shifted: (0..BASES_PER_WORD).map(|_| TwoBitSequence::new()).collect(),
            built: [false; BASES_PER_WORD],
        }
    }

    pub fn load(&mut self, bases: &[Base]) {
        self.bases.clear();
        self.bases.extend_from_slice(bases);
        self.reset();
    }

    pub fn load_revcomp(&mut self, bases: &[Base]) {
        dna::revcomp_into(bases, &mut self.bases);
        self.reset();
    }

    fn reset(&mut self) {
        self.packable = self.bases.iter().all(|b| b.is_packable());
        self.built = [false; BASES_PER_WORD];
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// 可以走 2-bit 快速比较（read 中不含 N）
    #[inline]
    pub fn is_packable(&self) -> bool {
        self.packable
    }

    /// 返回使 read 位置 `q` 与目标位置 `t` 处于相同字内偏移的编码及偏移量
    pub fn phased(&mut self, q: usize, t: usize) -> Option<(&TwoBitSequence, usize)> {
        if !self.packable {
            return None;
        }
        let shift = (t % BASES_PER_WORD + BASES_PER_WORD - q % BASES_PER_WORD) % BASES_PER_WORD;
        if !self.built[shift] {
            // read 已确认只含 A/C/G/T，打包不会失败
            self.shifted[shift].pack_into(&self.bases, shift).ok()?;
            self.built[shift] = true;
        }
        Some((&self.shifted[shift], shift))
    }
}

/// 种子链的空闲列表
#[derive(Debug, Default)]
pub struct SeedPool {
    free: Vec<Vec<SeedPart>>,
}

impl SeedPool {
    pub fn take_parts(&mut self) -> Vec<SeedPart> {
        self.free.pop().unwrap_or_default()
    }

    pub fn put_parts(&mut self, mut parts: Vec<SeedPart>) {
        parts.clear();
        self.free.push(parts);
    }

    /// 回收种子中的 parts 缓冲区
    pub fn recycle(&mut self, seeds: &mut Vec<Seed>) {
        for seed in seeds.drain(..) {
            self.put_parts(seed.parts);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

/// 图遍历时累积的目标序列与节点边界
#[derive(Debug, Default)]
pub struct TraversalScratch {
    /// 远离种子方向排列的目标碱基（左侧扩展时为反向）
    pub target: Vec<Base>,
    /// (节点 id, 该节点之后 target 的累计长度)
    pub bounds: Vec<(u32, usize)>,
    /// 反向排列的左侧 query
    pub query: Vec<Base>,
}

/// 工作线程私有的全部可复用状态
#[derive(Debug)]
pub struct Workspace {
    pub worker_id: usize,
    pub fwd: StrandQuery,
    pub rev: StrandQuery,
    pub seeds: Vec<Seed>,
    pub seed_pool: SeedPool,
    pub seen: HashSet<(bool, Vec<SeedPart>)>,
    pub dp: DpMatrix,
    pub scratch: TraversalScratch,
    pub reads_processed: usize,
}

impl Workspace {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            fwd: StrandQuery::new(),
            rev: StrandQuery::new(),
            seeds: Vec::new(),
            seed_pool: SeedPool::default(),
            seen: HashSet::new(),
            dp: DpMatrix::with_capacity(INITIAL_DP_CELLS),
            scratch: TraversalScratch::default(),
            reads_processed: 0,
        }
    }

    /// 载入一条 read 的正 / 反链编码，回收上一条 read 的种子
    pub fn begin_read(&mut self, seq: &[Base]) {
        self.seed_pool.recycle(&mut self.seeds);
        self.seen.clear();
        self.fwd.load(seq);
        self.rev.load_revcomp(seq);
    }

    /// 一条 read 处理完毕
    pub fn finish_read(&mut self) {
        self.seed_pool.recycle(&mut self.seeds);
        self.reads_processed += 1;
    }
}
