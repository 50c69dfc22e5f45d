//! 多线程比对流水线。
//!
//! 生产者线程把 read 放入有界输入队列，N 个工作线程各自持有一个 [`Workspace`]，
//! 结果写入有界输出队列，由调用线程交给 sink。图与索引通过作用域线程按引用共享。
//! 输出顺序不保证与输入一致。

use anyhow::{anyhow, Result};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{AlignOpt, AlignmentResult, GraphAligner, Read, Workspace};
use crate::graph::GenomeGraph;
use crate::index::SeedIndex;

/// 跨线程的取消标志
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub reads_in: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub elapsed: Duration,
    /// 是否被提前取消
    pub cancelled: bool,
}

/// 流式比对 `reads`，每条结果交给 `sink`。
///
/// 读取错误与 sink 错误都会终止运行并返回；取消时返回已经产出的统计。
pub fn align_stream<I, F>(
    graph: &GenomeGraph,
    index: &SeedIndex,
    opt: &AlignOpt,
    reads: I,
    cancel: &CancelToken,
    mut sink: F,
) -> Result<PipelineStats>
where
    I: IntoIterator<Item = Result<Read>>,
    I::IntoIter: Send,
    F: FnMut(AlignmentResult) -> Result<()>,
{
    opt.validate()?;
    let start = Instant::now();
    let workers = opt.threads;
    let available = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    if workers > available {
        log::warn!("{} worker threads requested but only {} cores available", workers, available);
    }

    let aligner = GraphAligner::new(graph, index, opt);
    let (read_tx, read_rx) = bounded::<Read>(opt.queue_capacity);
    let (res_tx, res_rx) = bounded::<AlignmentResult>(opt.queue_capacity);
    let reads = reads.into_iter();

    let mut stats = thread::scope(|s| -> Result<PipelineStats> {
        let producer = s.spawn(move || -> Result<usize> {
            let mut sent = 0usize;
            for item in reads {
                if cancel.is_cancelled() {
                    break;
                }
                let read = item?;
                if read_tx.send(read).is_err() {
                    break;
                }
                sent += 1;
            }
            Ok(sent)
        });

        let aligner = &aligner;
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = read_rx.clone();
            let tx = res_tx.clone();
            handles.push(s.spawn(move || {
                let mut ws = Workspace::new(id);
                while let Ok(read) = rx.recv() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if tx.send(aligner.align(&read, &mut ws)).is_err() {
                        break;
                    }
                }
                log::debug!(
                    "worker {} done: {} reads, DP matrix grown {} times",
                    id,
                    ws.reads_processed,
                    ws.dp.grow_count()
                );
            }));
        }
        drop(read_rx);
        drop(res_tx);

        let mut stats = PipelineStats::default();
        let mut sink_err = None;
        for aln in res_rx.iter() {
            if sink_err.is_some() {
                // 继续取空队列，让工作线程退出
                continue;
            }
            if aln.is_mapped() {
                stats.mapped += 1;
            } else {
                stats.unmapped += 1;
            }
            if let Err(e) = sink(aln) {
                cancel.cancel();
                sink_err = Some(e);
            }
        }

        for h in handles {
            h.join().map_err(|_| anyhow!("alignment worker panicked"))?;
        }
        let produced = producer.join().map_err(|_| anyhow!("read producer panicked"))??;
        if let Some(e) = sink_err {
            return Err(e);
        }
        stats.reads_in = produced;
        Ok(stats)
    })?;

    stats.elapsed = start.elapsed();
    stats.cancelled = cancel.is_cancelled();
    log::info!(
        "aligned {} reads ({} mapped, {} unmapped) with {} workers in {:.2?}{}",
        stats.reads_in,
        stats.mapped,
        stats.unmapped,
        workers,
        stats.elapsed,
        if stats.cancelled { " (cancelled)" } else { "" }
    );
    Ok(stats)
}

/// 比对一批内存中的 read，收集全部结果
pub fn align_all(graph: &GenomeGraph, index: &SeedIndex, opt: &AlignOpt, reads: Vec<Read>) -> Result<Vec<AlignmentResult>> {
    let mut out = Vec::with_capacity(reads.len());
    align_stream(graph, index, opt, reads.into_iter().map(Ok), &CancelToken::new(), |aln| {
        out.push(aln);
        Ok(())
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::sw::ScoreMatrix;
    use crate::graph::tests::five_node_graph;
    use crate::util::dna::from_ascii_seq;

    fn opt(threads: usize) -> AlignOpt {
        AlignOpt {
            seed_len: 3,
            scores: ScoreMatrix::simple(2, 4),
            gap_penalty: 3,
            min_score: 1,
            threads,
            queue_capacity: 2,
            ..AlignOpt::default()
        }
    }

    fn reads() -> Vec<Read> {
        ["ATGCGAT", "GCGTTAA", "CCCCCC", "TGCGTA", "ATGCGTTAA"]
            .iter()
            .enumerate()
            .map(|(i, s)| Read {
                name: format!("r{}", i),
                seq: from_ascii_seq(s.as_bytes()),
                qual: vec![b'I'; s.len()],
            })
            .collect()
    }

    #[test]
    fn stats_count_every_read() {
        let g = five_node_graph();
        let o = opt(3);
        let index = SeedIndex::build(&g, o.seed_len, o.step).unwrap();
        let mut n = 0;
        let stats = align_stream(&g, &index, &o, reads().into_iter().map(Ok), &CancelToken::new(), |_| {
            n += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 5);
        assert_eq!(stats.reads_in, 5);
        assert_eq!(stats.mapped + stats.unmapped, 5);
        assert_eq!(stats.unmapped, 1);
        assert!(!stats.cancelled);
    }

    #[test]
    fn cancelled_run_stops_early() {
        let g = five_node_graph();
        let o = opt(2);
        let index = SeedIndex::build(&g, o.seed_len, o.step).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let stats = align_stream(&g, &index, &o, reads().into_iter().map(Ok), &cancel, |_| Ok(())).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.reads_in, 0);
    }

    #[test]
    fn read_error_is_propagated() {
        let g = five_node_graph();
        let o = opt(2);
        let index = SeedIndex::build(&g, o.seed_len, o.step).unwrap();
        let mut input: Vec<Result<Read>> = reads().into_iter().map(Ok).collect();
        input.insert(2, Err(anyhow!("truncated record")));
        let err = align_stream(&g, &index, &o, input, &CancelToken::new(), |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("truncated record"));
    }

    #[test]
    fn sink_error_is_propagated() {
        let g = five_node_graph();
        let o = opt(2);
        let index = SeedIndex::build(&g, o.seed_len, o.step).unwrap();
        let err = align_stream(&g, &index, &o, reads().into_iter().map(Ok), &CancelToken::new(), |_| {
            Err(anyhow!("disk full"))
        })
        .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn invalid_options_rejected() {
        let g = five_node_graph();
        let o = AlignOpt { threads: 0, ..opt(1) };
        let index = SeedIndex::build(&g, 3, 1).unwrap();
        assert!(align_all(&g, &index, &o, reads()).is_err());
    }
}
