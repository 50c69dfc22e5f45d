use gsw_rust::align::{align_all, align_stream, AlignOpt, AlignmentResult, CancelToken};
use gsw_rust::graph::sim::simulate_reads;
use gsw_rust::graph::GenomeGraph;
use gsw_rust::index::SeedIndex;
use gsw_rust::util::dna::Base;

fn lcg_bases(len: usize, mut x: u32) -> Vec<Base> {
    let bases = [Base::A, Base::C, Base::G, Base::T];
    (0..len)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            bases[(x >> 16) as usize % 4]
        })
        .collect()
}

/// 线性骨架上每 40 个碱基一个 SNP 气泡
fn bubble_graph(blocks: usize) -> GenomeGraph {
    let mut g = GenomeGraph::new();
    let mut tails: Vec<u32> = Vec::new();
    for i in 0..blocks {
        let body = g.push_node(lcg_bases(39, 7 + i as u32));
        for &t in &tails {
            g.add_edge(t, body, 0.5).unwrap();
        }
        let r = g.push_node(vec![Base::A]);
        let a = g.push_node(vec![Base::G]);
        g.add_edge(body, r, 0.5).unwrap();
        g.add_edge(body, a, 0.5).unwrap();
        tails = vec![r, a];
    }
    g
}

fn sorted(mut v: Vec<AlignmentResult>) -> Vec<AlignmentResult> {
    v.sort_by(|a, b| a.query_name.cmp(&b.query_name));
    v
}

#[test]
fn worker_count_does_not_change_results() {
    let g = bubble_graph(50);
    let opt = AlignOpt {
        seed_len: 12,
        min_score: 0,
        queue_capacity: 8,
        ..AlignOpt::default()
    };
    let index = SeedIndex::build(&g, opt.seed_len, opt.step).unwrap();
    let reads: Vec<_> = simulate_reads(&g, 200, 60, 11, true).into_iter().map(|s| s.read).collect();
    assert_eq!(reads.len(), 200);

    let single = sorted(align_all(&g, &index, &AlignOpt { threads: 1, ..opt.clone() }, reads.clone()).unwrap());
    let multi = sorted(align_all(&g, &index, &AlignOpt { threads: 4, ..opt.clone() }, reads).unwrap());
    assert_eq!(single.len(), 200);
    assert_eq!(single, multi);
    assert!(single.iter().all(AlignmentResult::is_mapped));
}

#[test]
fn streaming_stats_match_output() {
    let g = bubble_graph(10);
    let opt = AlignOpt {
        seed_len: 12,
        min_score: 0,
        threads: 3,
        queue_capacity: 4,
        ..AlignOpt::default()
    };
    let index = SeedIndex::build(&g, opt.seed_len, opt.step).unwrap();
    let reads = simulate_reads(&g, 50, 40, 3, false).into_iter().map(|s| Ok(s.read));
    let mut lines = Vec::new();
    let stats = align_stream(&g, &index, &opt, reads, &CancelToken::new(), |aln| {
        lines.push(aln.to_string());
        Ok(())
    })
    .unwrap();
    assert_eq!(stats.reads_in, 50);
    assert_eq!(stats.mapped + stats.unmapped, lines.len());
    assert_eq!(lines.len(), 50);
    assert!(lines.iter().all(|l| l.split('\t').count() == 11));
}
