//! # gsw-rust
//!
//! 面向图结构参考基因组的种子-扩展短序列比对器。
//!
//! 参考基因组是一张有向无环图：节点保存序列片段，带权边表示可选的变异路径。
//! 本 crate 提供：
//!
//! - **2-bit 编码**：按字打包的 DNA 序列与按字比较的匹配长度计算
//! - **基因组图**：节点数组 + 邻接表、文本格式读写、逐连通分量的拓扑排序
//! - **种子索引**：k-mer → 图坐标，窗口可跨越节点边界
//! - **种子扩展**：沿前驱 / 后继把精确匹配延伸为跨节点的最大种子
//! - **图比对**：种子两侧的图遍历 + 局部 / 全局扩展 DP
//! - **并发**：有界队列 + 工作线程私有的可复用缓冲区
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use gsw_rust::align::{align_all, AlignOpt, Read};
//! use gsw_rust::graph::io::read_graph;
//! use gsw_rust::index::SeedIndex;
//! use gsw_rust::util::dna;
//!
//! let mut graph = read_graph("ref.graph").unwrap();
//! graph.topological_sort().unwrap();
//! let opt = AlignOpt::default();
//! let index = SeedIndex::build(&graph, opt.seed_len, opt.step).unwrap();
//!
//! let reads = vec![Read {
//!     name: "r1".to_string(),
//!     seq: dna::from_ascii_seq(b"ACGTACGTAGCTGATCGTAG"),
//!     qual: vec![b'I'; 20],
//! }];
//! for aln in align_all(&graph, &index, &opt, reads).unwrap() {
//!     println!("{}", aln);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`]：FASTQ 读写
//! - [`graph`]：基因组图、文本格式、拓扑排序、模拟 read
//! - [`index`]：k-mer 种子索引
//! - [`align`]：种子扩展、扩展 DP、比对流水线
//! - [`util`]：DNA 碱基与 2-bit 编码

pub mod io;
pub mod index;
pub mod util;
pub mod align;
pub mod graph;
