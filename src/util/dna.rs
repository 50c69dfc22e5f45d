use serde::{Deserialize, Serialize};

/// 碱基字母表。仅 A/C/G/T 可以打包为 2-bit；N 与 Gap 不参与种子索引。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Base {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
    N = 4,
    Gap = 5,
}

/// 打分矩阵的维度（A, C, G, T, N）
pub const SIGMA: usize = 5;

impl Base {
    #[inline]
    pub fn from_ascii(b: u8) -> Base {
        match b.to_ascii_uppercase() {
            b'A' => Base::A,
            b'C' => Base::C,
            b'G' => Base::G,
            b'T' | b'U' => Base::T,
            b'-' => Base::Gap,
            _ => Base::N, // map others to N
        }
    }

    #[inline]
    pub fn to_ascii(self) -> u8 {
        match self {
            Base::A => b'A',
            Base::C => b'C',
            Base::G => b'G',
            Base::T => b'T',
            Base::N => b'N',
            Base::Gap => b'-',
        }
    }

    /// 2-bit 编码，N / Gap 返回 None
    #[inline]
    pub fn two_bit(self) -> Option<u64> {
        match self {
            Base::A => Some(0),
            Base::C => Some(1),
            Base::G => Some(2),
            Base::T => Some(3),
            Base::N | Base::Gap => None,
        }
    }

    #[inline]
    pub fn from_two_bit(code: u64) -> Base {
        match code & 3 {
            0 => Base::A,
            1 => Base::C,
            2 => Base::G,
            _ => Base::T,
        }
    }

    #[inline]
    pub fn is_packable(self) -> bool {
        self.two_bit().is_some()
    }

    #[inline]
    pub fn complement(self) -> Base {
        match self {
            Base::A => Base::T,
            Base::C => Base::G,
            Base::G => Base::C,
            Base::T => Base::A,
            other => other,
        }
    }

    /// 打分矩阵下标；Gap 不应出现在比对输入中，按 N 处理
    #[inline]
    pub fn score_index(self) -> usize {
        match self {
            Base::Gap => Base::N as usize,
            b => b as usize,
        }
    }
}

pub fn from_ascii_seq(seq: &[u8]) -> Vec<Base> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        match b {
            b'\n' | b'\r' | b' ' | b'\t' => {}
            _ => out.push(Base::from_ascii(b)),
        }
    }
    out
}

pub fn to_ascii_seq(seq: &[Base]) -> Vec<u8> {
    seq.iter().map(|b| b.to_ascii()).collect()
}

pub fn to_string(seq: &[Base]) -> String {
    seq.iter().map(|b| b.to_ascii() as char).collect()
}

pub fn revcomp(seq: &[Base]) -> Vec<Base> {
    let mut out = Vec::with_capacity(seq.len());
    revcomp_into(seq, &mut out);
    out
}

/// 反向互补写入已有缓冲区（保留容量）
pub fn revcomp_into(seq: &[Base], out: &mut Vec<Base>) {
    out.clear();
    out.extend(seq.iter().rev().map(|b| b.complement()));
}
