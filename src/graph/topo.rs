use anyhow::{bail, Result};
use std::collections::VecDeque;

use super::{Edge, GenomeGraph, Node};

/// 按弱连通分量划分节点（忽略边方向的泛洪填充）。
///
/// 使用显式栈 + visited，异常输入不会导致无限递归。
/// 分量按最小节点下标排序，分量内节点按下标升序。
pub fn weakly_connected_components(graph: &GenomeGraph) -> Vec<Vec<u32>> {
    let n = graph.len();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    let mut stack: Vec<u32> = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut comp = Vec::new();
        visited[start] = true;
        stack.push(start as u32);
        while let Some(u) = stack.pop() {
            comp.push(u);
            let node = graph.node(u);
            for e in node.next.iter().chain(node.prev.iter()) {
                let v = e.dest as usize;
                if !visited[v] {
                    visited[v] = true;
                    stack.push(e.dest);
                }
            }
        }
        comp.sort_unstable();
        components.push(comp);
    }
    components
}

/// 在单个分量内执行 Kahn 算法，入度 = `prev.len()`。
/// 若存在环（无法输出全部节点）则返回错误。
fn kahn_order(graph: &GenomeGraph, comp: &[u32], in_degree: &mut [usize], out: &mut Vec<u32>) -> Result<()> {
    let mut queue: VecDeque<u32> = VecDeque::new();
    for &u in comp {
        in_degree[u as usize] = graph.node(u).prev.len();
        if in_degree[u as usize] == 0 {
            queue.push_back(u);
        }
    }

    let before = out.len();
    while let Some(u) = queue.pop_front() {
        out.push(u);
        for e in &graph.node(u).next {
            let d = &mut in_degree[e.dest as usize];
            *d -= 1;
            if *d == 0 {
                queue.push_back(e.dest);
            }
        }
    }

    let emitted = out.len() - before;
    if emitted != comp.len() {
        bail!(
            "graph is not acyclic: component starting at node {} has {} nodes but only {} could be ordered",
            comp[0],
            comp.len(),
            emitted
        );
    }
    Ok(())
}

/// 计算拓扑序（旧 id 序列），不修改图。
pub fn topological_order(graph: &GenomeGraph) -> Result<Vec<u32>> {
    let components = weakly_connected_components(graph);
    let mut in_degree = vec![0usize; graph.len()];
    let mut order = Vec::with_capacity(graph.len());
    for comp in &components {
        kahn_order(graph, comp, &mut in_degree, &mut order)?;
    }
    log::debug!("topological order over {} weakly-connected components", components.len());
    Ok(order)
}

impl GenomeGraph {
    /// 拓扑排序并按新顺序重建节点数组：重新分配 id，所有边的下标指向新数组。
    ///
    /// 返回新顺序下的旧 id（`order[new_id] == old_id`）。
    pub fn topological_sort(&mut self) -> Result<Vec<u32>> {
        let order = topological_order(self)?;
        let mut new_id = vec![0u32; order.len()];
        for (pos, &old) in order.iter().enumerate() {
            new_id[old as usize] = pos as u32;
        }

        let remap = |edges: &[Edge]| -> Vec<Edge> {
            edges
                .iter()
                .map(|e| Edge { dest: new_id[e.dest as usize], prob: e.prob })
                .collect()
        };

        let mut old_nodes: Vec<Option<Node>> = std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(order.len());
        for (pos, &old) in order.iter().enumerate() {
            // order is a permutation, every slot is taken exactly once
            let mut node = match old_nodes[old as usize].take() {
                Some(n) => n,
                None => unreachable!("node {} emitted twice by topological order", old),
            };
            node.id = pos as u32;
            node.next = remap(&node.next);
            node.prev = remap(&node.prev);
            nodes.push(node);
        }
        self.nodes = nodes;
        log::info!("graph topologically sorted: {} nodes", self.nodes.len());
        Ok(order)
    }
}
