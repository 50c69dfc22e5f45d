use anyhow::{anyhow, Result};

use super::dna::Base;

/// 每个 u64 字存放的碱基数
pub const BASES_PER_WORD: usize = 32;

/// 2-bit 打包序列。
///
/// 第 `pos` 个碱基位于 `words[pos / 32]`，左移量为 `64 - 2 * (pos % 32 + 1)`，
/// 即每个字中第一个碱基占据最高的两位。末尾未使用的位保持为 0。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoBitSequence {
    words: Vec<u64>,
    len: usize,
}

#[inline]
fn shift_of(pos: usize) -> u32 {
    (64 - 2 * (pos % BASES_PER_WORD + 1)) as u32
}

impl TwoBitSequence {
    pub fn new() -> Self {
        Self { words: Vec::new(), len: 0 }
    }

    pub fn with_capacity(bases: usize) -> Self {
        Self {
            words: Vec::with_capacity((bases + BASES_PER_WORD - 1) / BASES_PER_WORD),
            len: 0,
        }
    }

    /// 打包碱基序列；出现 A/C/G/T 以外的碱基时返回错误
    pub fn pack(bases: &[Base]) -> Result<Self> {
        Self::with_offset(bases, 0)
    }

    /// 在序列前填充 `shift` 个占位碱基后打包，使 `bases[i]` 落在位置 `i + shift`
    pub fn with_offset(bases: &[Base], shift: usize) -> Result<Self> {
        let mut out = Self::with_capacity(bases.len() + shift);
        out.pack_into(bases, shift)?;
        Ok(out)
    }

    /// 复用已有存储重新打包
    pub fn pack_into(&mut self, bases: &[Base], shift: usize) -> Result<()> {
        self.clear();
        for _ in 0..shift {
            self.push_code(0);
        }
        for (i, &b) in bases.iter().enumerate() {
            let code = b
                .two_bit()
                .ok_or_else(|| anyhow!("cannot pack base {:?} at position {} into two bits", b, i))?;
            self.push_code(code);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.words.clear();
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// O(1) 解码
    #[inline]
    pub fn get(&self, pos: usize) -> Base {
        Base::from_two_bit(self.code(pos))
    }

    #[inline]
    pub fn code(&self, pos: usize) -> u64 {
        assert!(pos < self.len, "two-bit position {} out of range (len {})", pos, self.len);
        (self.words[pos / BASES_PER_WORD] >> shift_of(pos)) & 3
    }

    #[inline]
    fn push_code(&mut self, code: u64) {
        if self.len % BASES_PER_WORD == 0 {
            self.words.push(0);
        }
        let last = self.words.len() - 1;
        self.words[last] |= code << shift_of(self.len);
        self.len += 1;
    }

    pub fn push(&mut self, base: Base) -> Result<()> {
        let code = base
            .two_bit()
            .ok_or_else(|| anyhow!("cannot pack base {:?} into two bits", base))?;
        self.push_code(code);
        Ok(())
    }

    pub fn append(&mut self, other: &TwoBitSequence) {
        if self.len % BASES_PER_WORD == 0 {
            // word-aligned: whole words can be copied
            self.words.extend_from_slice(&other.words);
            self.len += other.len;
            return;
        }
        for pos in 0..other.len {
            self.push_code(other.code(pos));
        }
    }

    pub fn concat(a: &TwoBitSequence, b: &TwoBitSequence) -> TwoBitSequence {
        let mut out = TwoBitSequence::with_capacity(a.len + b.len);
        out.append(a);
        out.append(b);
        out
    }

    /// 复制 [start, end) 区间
    pub fn copy_range(&self, start: usize, end: usize) -> TwoBitSequence {
        assert!(start <= end && end <= self.len, "invalid range {}..{} (len {})", start, end, self.len);
        let mut out = TwoBitSequence::with_capacity(end - start);
        for pos in start..end {
            out.push_code(self.code(pos));
        }
        out
    }

    pub fn to_bases(&self) -> Vec<Base> {
        (0..self.len).map(|pos| self.get(pos)).collect()
    }
}

#[inline]
fn check_phase(start_a: usize, start_b: usize) {
    assert_eq!(
        start_a % BASES_PER_WORD,
        start_b % BASES_PER_WORD,
        "two-bit comparison requires equal word offsets ({} vs {})",
        start_a,
        start_b
    );
}

/// 从 `start_a` / `start_b` 开始向右连续相同的碱基数。
///
/// 两个起点在字内的偏移必须一致，否则 panic。
pub fn count_right_matches(a: &TwoBitSequence, start_a: usize, b: &TwoBitSequence, start_b: usize) -> usize {
    check_phase(start_a, start_b);
    if start_a >= a.len || start_b >= b.len {
        return 0;
    }
    let max = (a.len - start_a).min(b.len - start_b);
    let off = start_a % BASES_PER_WORD;
    let mut wa = start_a / BASES_PER_WORD;
    let mut wb = start_b / BASES_PER_WORD;

    let diff = (a.words[wa] ^ b.words[wb]) << (2 * off);
    let mut matched = if diff != 0 {
        (diff.leading_zeros() / 2) as usize
    } else {
        let mut m = BASES_PER_WORD - off;
        loop {
            wa += 1;
            wb += 1;
            if m >= max || wa >= a.words.len() || wb >= b.words.len() {
                break;
            }
            let d = a.words[wa] ^ b.words[wb];
            if d == 0 {
                m += BASES_PER_WORD;
            } else {
                m += (d.leading_zeros() / 2) as usize;
                break;
            }
        }
        m
    };
    if matched > max {
        matched = max;
    }
    matched
}

/// 以 `start_a` / `start_b` 为终点（包含）向左连续相同的碱基数。
///
/// 与 [`count_right_matches`] 相同的前提条件。
pub fn count_left_matches(a: &TwoBitSequence, start_a: usize, b: &TwoBitSequence, start_b: usize) -> usize {
    check_phase(start_a, start_b);
    if start_a >= a.len || start_b >= b.len {
        return 0;
    }
    let max = start_a.min(start_b) + 1;
    let off = start_a % BASES_PER_WORD;
    let mut wa = start_a / BASES_PER_WORD;
    let mut wb = start_b / BASES_PER_WORD;

    // drop the bases after the compared offset
    let diff = (a.words[wa] ^ b.words[wb]) >> (2 * (BASES_PER_WORD - 1 - off));
    let matched = if diff != 0 {
        (diff.trailing_zeros() / 2) as usize
    } else {
        let mut m = off + 1;
        while m < max && wa > 0 && wb > 0 {
            wa -= 1;
            wb -= 1;
            let d = a.words[wa] ^ b.words[wb];
            if d == 0 {
                m += BASES_PER_WORD;
            } else {
                m += (d.trailing_zeros() / 2) as usize;
                break;
            }
        }
        m
    };
    matched.min(max)
}
