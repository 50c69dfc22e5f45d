//! k-mer 种子索引：打包后的 k-mer → 图坐标列表。
//!
//! 坐标编码为 `(node << 32) | position`。索引在图加载后构建一次，之后只读。

use anyhow::{bail, Result};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::graph::GenomeGraph;
use crate::util::dna::Base;

pub const MIN_SEED_LEN: usize = 2;
/// 一个 u64 最多容纳 32 个 2-bit 碱基
pub const MAX_SEED_LEN: usize = 32;

#[inline]
pub fn pack_coord(node: u32, pos: u32) -> u64 {
    ((node as u64) << 32) | pos as u64
}

#[inline]
pub fn unpack_coord(code: u64) -> (u32, u32) {
    ((code >> 32) as u32, code as u32)
}

/// 将不超过 32 个碱基打包为右对齐的 u64；含 N / Gap 时返回 None
pub fn kmer_code(bases: &[Base]) -> Option<u64> {
    debug_assert!(bases.len() <= MAX_SEED_LEN);
    let mut code = 0u64;
    for &b in bases {
        code = (code << 2) | b.two_bit()?;
    }
    Some(code)
}

#[inline]
fn kmer_mask(seed_len: usize) -> u64 {
    if seed_len >= MAX_SEED_LEN {
        u64::MAX
    } else {
        (1u64 << (2 * seed_len)) - 1
    }
}

pub struct SeedIndex {
    seed_len: usize,
    step: usize,
    map: HashMap<u64, Vec<u64>>,
}

impl SeedIndex {
    /// 为图中每个起点为 `step` 倍数的 `seed_len` 窗口建立索引。
    ///
    /// 完全落在节点内的窗口直接滚动计算；跨越节点边界的窗口由当前节点尾部
    /// 与后继节点头部拼接而成，后继仍不够长时继续递归。含 N 的窗口跳过。
    pub fn build(graph: &GenomeGraph, seed_len: usize, step: usize) -> Result<Self> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed_len) {
            bail!(
                "seed length {} is outside the supported range {}..={}",
                seed_len,
                MIN_SEED_LEN,
                MAX_SEED_LEN
            );
        }
        if step == 0 {
            bail!("index step size must be at least 1");
        }

        // 各节点并行扫描，按节点顺序合并，保证坐标列表的顺序确定
        let per_node: Vec<Vec<(u64, u64)>> = (0..graph.len() as u32)
            .into_par_iter()
            .map(|id| node_entries(graph, id, seed_len, step))
            .collect();

        let mut map: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut total = 0usize;
        for entries in per_node {
            total += entries.len();
            for (code, coord) in entries {
                map.entry(code).or_default().push(coord);
            }
        }
        log::info!(
            "seed index: {} distinct {}-mers, {} positions (step {})",
            map.len(),
            seed_len,
            total,
            step
        );
        Ok(Self { seed_len, step, map })
    }

    #[inline]
    pub fn seed_len(&self) -> usize {
        self.seed_len
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    /// 不同 k-mer 的数量
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn total_positions(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    #[inline]
    pub fn lookup(&self, code: u64) -> &[u64] {
        self.map.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 单个节点的全部 (k-mer, 坐标) 条目，按起点升序
fn node_entries(graph: &GenomeGraph, id: u32, seed_len: usize, step: usize) -> Vec<(u64, u64)> {
    let seq = &graph.node(id).seq;
    let mut out = Vec::new();
    let mask = kmer_mask(seed_len);

    let mut code = 0u64;
    let mut valid = 0usize;
    for (j, &b) in seq.iter().enumerate() {
        match b.two_bit() {
            Some(c) => {
                code = ((code << 2) | c) & mask;
                valid += 1;
            }
            None => {
                code = 0;
                valid = 0;
            }
        }
        if valid >= seed_len {
            let start = j + 1 - seed_len;
            if start % step == 0 {
                out.push((code, pack_coord(id, start as u32)));
            }
        }
    }

    // windows that run past the end of the node
    let first_crossing = seq.len().saturating_sub(seed_len - 1);
    let mut window: Vec<Base> = Vec::with_capacity(seed_len);
    let mut codes: Vec<u64> = Vec::new();
    for start in first_crossing..seq.len() {
        if start % step != 0 {
            continue;
        }
        let tail = &seq[start..];
        if tail.iter().any(|b| !b.is_packable()) {
            continue;
        }
        window.clear();
        window.extend_from_slice(tail);
        codes.clear();
        extend_across(graph, id, seed_len - tail.len(), &mut window, &mut codes);
        codes.sort_unstable();
        codes.dedup();
        for &c in &codes {
            out.push((c, pack_coord(id, start as u32)));
        }
    }
    out
}

/// 在 `node` 的后继上补齐 `needed` 个碱基，每条路径得到一个 k-mer。
/// 空节点直接穿过；图无环，递归必然终止。
fn extend_across(graph: &GenomeGraph, node: u32, needed: usize, window: &mut Vec<Base>, codes: &mut Vec<u64>) {
    for e in &graph.node(node).next {
        let succ = graph.node(e.dest);
        if succ.is_empty() {
            extend_across(graph, e.dest, needed, window, codes);
            continue;
        }
        let take = needed.min(succ.len());
        let before = window.len();
        window.extend_from_slice(&succ.seq[..take]);
        if take == needed {
            if let Some(c) = kmer_code(window) {
                codes.push(c);
            }
        } else if window[before..].iter().all(|b| b.is_packable()) {
            extend_across(graph, e.dest, needed - take, window, codes);
        }
        window.truncate(before);
    }
}
