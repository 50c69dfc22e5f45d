use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;

use gsw_rust::align::{self, AlignOpt, CancelToken, DpMode, ScoreMatrix};
use gsw_rust::graph::{io as graph_io, sim};
use gsw_rust::index::SeedIndex;
use gsw_rust::io::fastq;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "gsw-rust", author, version, about = "Seed-and-extend read aligner for graph genomes", arg_required_else_help = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Local,
    Global,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Topologically sort a graph and write it back out
    Sort {
        /// Input graph file
        graph: String,
        /// Output graph file
        #[arg(short, long)]
        out: String,
    },
    /// Align FASTQ reads against a graph
    Align {
        /// Graph file
        #[arg(short = 'g', long = "graph")]
        graph: String,
        /// Reads FASTQ file
        reads: String,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        #[arg(short = 'k', long = "seed-len", default_value_t = 16)]
        seed_len: usize,
        #[arg(long = "step", default_value_t = 1)]
        step: usize,
        /// Uniform match score; the human/chimp matrix is used when omitted
        #[arg(long = "match")]
        match_score: Option<i64>,
        #[arg(long = "mismatch", default_value_t = 330)]
        mismatch_penalty: i64,
        #[arg(long = "gap", default_value_t = 600)]
        gap_penalty: i64,
        #[arg(long = "slack")]
        extension_slack: Option<usize>,
        #[arg(long = "min-score", default_value_t = 10_000)]
        min_score: i64,
        #[arg(long = "mode", value_enum, default_value_t = ModeArg::Local)]
        mode: ModeArg,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        #[arg(long = "queue", default_value_t = 1024)]
        queue_capacity: usize,
        /// Skip sorting when the graph is already in topological order
        #[arg(long = "presorted")]
        presorted: bool,
    },
    /// Sample reads from random paths through a graph
    Simulate {
        graph: String,
        #[arg(short = 'n', long = "count", default_value_t = 1000)]
        count: usize,
        #[arg(short = 'l', long = "length", default_value_t = 100)]
        length: usize,
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        /// Also emit reverse-complemented reads
        #[arg(long = "both-strands")]
        both_strands: bool,
        #[arg(short, long)]
        out: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Sort { graph, out } => run_sort(&graph, &out),
        Commands::Align {
            graph,
            reads,
            out,
            seed_len,
            step,
            match_score,
            mismatch_penalty,
            gap_penalty,
            extension_slack,
            min_score,
            mode,
            threads,
            queue_capacity,
            presorted,
        } => {
            let opt = AlignOpt {
                seed_len,
                step,
                scores: match match_score {
                    Some(m) => ScoreMatrix::simple(m, mismatch_penalty),
                    None => ScoreMatrix::human_chimp(),
                },
                gap_penalty,
                extension_slack,
                min_score,
                mode: match mode {
                    ModeArg::Local => DpMode::Local,
                    ModeArg::Global => DpMode::Global,
                },
                threads,
                queue_capacity,
            };
            run_align(&graph, &reads, out.as_deref(), &opt, presorted)
        }
        Commands::Simulate {
            graph,
            count,
            length,
            seed,
            both_strands,
            out,
        } => run_simulate(&graph, count, length, seed, both_strands, out.as_deref()),
    }
}

fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).map_err(|e| anyhow::anyhow!("cannot create output '{}': {}", p, e))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    })
}

fn run_sort(graph_path: &str, out_path: &str) -> Result<()> {
    let mut graph = graph_io::read_graph(graph_path)?;
    graph.topological_sort()?;
    graph_io::write_graph(&graph, out_path)
}

fn run_align(graph_path: &str, reads_path: &str, out_path: Option<&str>, opt: &AlignOpt, presorted: bool) -> Result<()> {
    opt.validate()?;
    let mut graph = graph_io::read_graph(graph_path)?;
    if !presorted {
        graph.topological_sort()?;
    } else if !graph.is_topologically_sorted() {
        anyhow::bail!("graph '{}' is not in topological order; drop --presorted", graph_path);
    }
    let index = SeedIndex::build(&graph, opt.seed_len, opt.step)?;

    let fq = std::fs::File::open(reads_path)
        .map_err(|e| anyhow::anyhow!("cannot open reads FASTQ '{}': {}", reads_path, e))?;
    let reader = fastq::FastqReader::new(std::io::BufReader::new(fq));
    let mut out = open_output(out_path)?;

    align::align_stream(&graph, &index, opt, reader, &CancelToken::new(), |aln| {
        writeln!(out, "{}", aln)?;
        Ok(())
    })?;
    out.flush()?;
    Ok(())
}

fn run_simulate(
    graph_path: &str,
    count: usize,
    length: usize,
    seed: u64,
    both_strands: bool,
    out_path: Option<&str>,
) -> Result<()> {
    let graph = graph_io::read_graph(graph_path)?;
    let reads = sim::simulate_reads(&graph, count, length, seed, both_strands);
    let mut out = open_output(out_path)?;
    for r in &reads {
        fastq::write_record(&mut out, &r.read)?;
    }
    out.flush()?;
    log::info!("wrote {} simulated reads", reads.len());
    Ok(())
}
