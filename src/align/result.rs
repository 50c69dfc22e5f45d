use serde::{Deserialize, Serialize};
use std::fmt;

use super::sw::{ops_to_cigar, Cigar};
use crate::util::dna::{self, Base};

/// 输入 read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {
    pub name: String,
    pub seq: Vec<Base>,
    pub qual: Vec<u8>,
}

/// 单条 read 的比对结果，类似 BWA 的 mem_alnreg_t，但参考坐标是图上的节点路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub query_name: String,
    /// 是否与正链比对（false 表示反向互补）
    pub pos_strand: bool,
    pub score: i64,
    /// 依次经过的节点 id；未比对上时为空
    pub path: Vec<u32>,
    /// 第一个节点内的起始偏移
    pub target_start: usize,
    /// 最后一个节点内的结束偏移（不含）
    pub target_end: usize,
    /// read 上的区间 [query_start, query_end)，按比对方向计
    pub query_start: usize,
    pub query_end: usize,
    pub cigar: Vec<Cigar>,
    /// 按比对方向的序列与质量（反链时为反向互补 / 反转）
    pub seq: Vec<Base>,
    pub qual: Vec<u8>,
}

impl AlignmentResult {
    pub fn unmapped(read: &Read, best_score: i64) -> Self {
        Self {
            query_name: read.name.clone(),
            pos_strand: true,
            score: best_score,
            path: Vec::new(),
            target_start: 0,
            target_end: 0,
            query_start: 0,
            query_end: 0,
            cigar: Vec::new(),
            seq: read.seq.clone(),
            qual: read.qual.clone(),
        }
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        !self.path.is_empty()
    }
}

impl fmt::Display for AlignmentResult {
    /// 制表符分隔的调试格式：
    /// name strand score path tstart tend qstart qend cigar seq qual
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "*".to_string()
        } else {
            self.path.iter().map(u32::to_string).collect::<Vec<_>>().join(":")
        };
        let cigar = if self.cigar.is_empty() { "*".to_string() } else { ops_to_cigar(&self.cigar) };
        let qual = if self.qual.is_empty() {
            "*".to_string()
        } else {
            String::from_utf8_lossy(&self.qual).into_owned()
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.query_name,
            if !self.is_mapped() {
                '*'
            } else if self.pos_strand {
                '+'
            } else {
                '-'
            },
            self.score,
            path,
            self.target_start,
            self.target_end,
            self.query_start,
            self.query_end,
            cigar,
            dna::to_string(&self.seq),
            qual
        )
    }
}
