//! 图的文本格式：
//!
//! ```text
//! >0
//! ATG
//! >1
//! CG
//! 0	1	1
//! 1
//! ```
//!
//! `>id` 开始一个节点，随后若干行序列；每个节点一行尾部记录
//! `nodeId\tweight1\tdestId1\tweight2\tdestId2...`。行首为数字的行即尾部记录。

use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufRead, Write};

use super::GenomeGraph;
use crate::util::dna::{self, Base};

const LINE_WIDTH: usize = 50;

pub fn read_graph(path: &str) -> Result<GenomeGraph> {
    let fh = std::fs::File::open(path).map_err(|e| anyhow!("cannot open graph file '{}': {}", path, e))?;
    let graph = read_graph_from(std::io::BufReader::new(fh)).with_context(|| format!("while reading graph '{}'", path))?;
    log::info!(
        "graph '{}': {} nodes, {} edges, {} bases",
        path,
        graph.len(),
        graph.edge_count(),
        graph.total_bases()
    );
    Ok(graph)
}

pub fn read_graph_from<R: BufRead>(mut reader: R) -> Result<GenomeGraph> {
    let mut graph = GenomeGraph::new();
    let mut current: Option<(u32, Vec<Base>)> = None;
    let mut edges: Vec<(u32, u32, f32, usize)> = Vec::new();
    let mut buf = String::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('>') {
            if let Some((id, seq)) = current.take() {
                graph.add_node(id, seq)?;
            }
            let token = rest.split_whitespace().next().unwrap_or("");
            let id: u32 = token
                .parse()
                .map_err(|_| anyhow!("line {}: node header '{}' is not a numeric id", line_no, line))?;
            current = Some((id, Vec::new()));
        } else if line.as_bytes()[0].is_ascii_digit() {
            let mut fields = line.split_whitespace();
            let src: u32 = fields
                .next()
                .unwrap_or("")
                .parse()
                .map_err(|_| anyhow!("line {}: bad node id in edge line", line_no))?;
            let rest: Vec<&str> = fields.collect();
            if rest.len() % 2 != 0 {
                bail!("line {}: edge line must hold weight/destination pairs", line_no);
            }
            for pair in rest.chunks(2) {
                let prob: f32 = pair[0]
                    .parse()
                    .map_err(|_| anyhow!("line {}: bad edge weight '{}'", line_no, pair[0]))?;
                let dest: u32 = pair[1]
                    .parse()
                    .map_err(|_| anyhow!("line {}: bad destination '{}'", line_no, pair[1]))?;
                edges.push((src, dest, prob, line_no));
            }
        } else {
            match current.as_mut() {
                Some((_, seq)) => seq.extend(dna::from_ascii_seq(line.as_bytes())),
                None => bail!("line {}: sequence found before any '>' header", line_no),
            }
        }
    }
    if let Some((id, seq)) = current.take() {
        graph.add_node(id, seq)?;
    }

    for (src, dest, prob, line_no) in edges {
        graph
            .add_edge(src, dest, prob)
            .with_context(|| format!("line {}", line_no))?;
    }
    Ok(graph)
}

pub fn write_graph(graph: &GenomeGraph, path: &str) -> Result<()> {
    let fh = std::fs::File::create(path).map_err(|e| anyhow!("cannot create graph file '{}': {}", path, e))?;
    let mut out = std::io::BufWriter::new(fh);
    write_graph_to(graph, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn write_graph_to<W: Write>(graph: &GenomeGraph, out: &mut W) -> Result<()> {
    for node in &graph.nodes {
        writeln!(out, ">{}", node.id)?;
        for chunk in node.seq.chunks(LINE_WIDTH) {
            out.write_all(&dna::to_ascii_seq(chunk))?;
            out.write_all(b"\n")?;
        }
    }
    for node in &graph.nodes {
        write!(out, "{}", node.id)?;
        for e in &node.next {
            write!(out, "\t{}\t{}", e.prob, e.dest)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
