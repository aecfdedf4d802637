//! Chain compilation: step inclusion, validation and ordering.
//!
//! Compilation works backwards from the final items. A step is included when
//! it produces something a final item or an included step needs; the producer
//! of each needed item is chosen like this:
//! - non-overridable producers win
//! - overridable producers are used only when no other producer exists
//! - weak producers are wired in when included for another reason, but never
//!   pull a step into the chain themselves
//!
//! Validation then checks producer uniqueness, required producers and cycles
//! before the dependency counts the executor schedules by are computed.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt::Write as _;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::builder::chain::StepInfo;
use crate::builder::errors::ChainBuildError;
use crate::core::item::ItemId;
use crate::core::step::{Produce, StepDescriptor};

/// Output of [`compile`].
pub(crate) struct CompiledGraph {
    /// Included steps, in registration order.
    pub steps: Vec<StepInfo>,
    /// Every item type an included step touches, plus the chain boundaries.
    pub items: Vec<ItemId>,
    /// Ids of registered steps left out of the chain.
    pub pruned: Vec<String>,
}

static NO_PRODUCERS: Producers = Producers {
    entries: Vec::new(),
};

/// Registered producers of one item, in registration order.
#[derive(Default)]
struct Producers {
    entries: Vec<(usize, Produce)>,
}

impl Producers {
    /// The producers a consumer of this item is wired to.
    fn selected(&self) -> impl Iterator<Item = &(usize, Produce)> {
        let has_real = self.entries.iter().any(|(_, p)| !p.overridable);
        self.entries
            .iter()
            .filter(move |(_, p)| p.overridable != has_real)
    }
}

fn producers_of<'a>(producers: &'a HashMap<ItemId, Producers>, item: &ItemId) -> &'a Producers {
    producers.get(item).unwrap_or(&NO_PRODUCERS)
}

pub(crate) fn compile(
    steps: &[StepDescriptor],
    initial: &[ItemId],
    finals: &[ItemId],
) -> Result<CompiledGraph, ChainBuildError> {
    let initial: HashSet<ItemId> = initial.iter().copied().collect();
    let producers = producer_map(steps, &initial)?;

    // Inclusion fixpoint from the final items.
    let mut included = vec![false; steps.len()];
    let mut queue = VecDeque::new();
    let mut include = |idx: usize, queue: &mut VecDeque<usize>| {
        if !included[idx] {
            included[idx] = true;
            queue.push_back(idx);
        }
    };
    for item in finals {
        for (idx, produce) in producers_of(&producers, item).selected() {
            if !produce.weak {
                include(*idx, &mut queue);
            }
        }
    }
    // upstream[step] = producer step -> first item linking them
    let mut upstream: Vec<BTreeMap<usize, ItemId>> = vec![BTreeMap::new(); steps.len()];
    while let Some(idx) = queue.pop_front() {
        for consume in steps[idx].consumes() {
            for (producer, produce) in producers_of(&producers, &consume.item).selected() {
                upstream[idx].entry(*producer).or_insert(consume.item);
                if !produce.weak {
                    include(*producer, &mut queue);
                }
            }
        }
    }
    for (idx, deps) in upstream.iter_mut().enumerate() {
        if included[idx] {
            deps.retain(|producer, _| included[*producer]);
        } else {
            deps.clear();
        }
    }

    check_required(steps, &initial, &included, &producers)?;
    check_cycles(steps, &included, &upstream)?;

    // Compiled indices follow registration order.
    let compiled_index: HashMap<usize, usize> = (0..steps.len())
        .filter(|&idx| included[idx])
        .enumerate()
        .map(|(compiled, idx)| (idx, compiled))
        .collect();

    let mut infos: Vec<StepInfo> = steps
        .iter()
        .filter(|step| included[step.index()])
        .map(|step| StepInfo::new(step.clone(), upstream[step.index()].len()))
        .collect();
    for (idx, deps) in upstream.iter().enumerate() {
        if let Some(&consumer) = compiled_index.get(&idx) {
            for producer in deps.keys() {
                infos[compiled_index[producer]].dependents.push(consumer);
            }
        }
    }

    let mut items: Vec<ItemId> = Vec::new();
    let mut seen = HashSet::new();
    let step_items = infos.iter().flat_map(|info| {
        let descriptor = info.descriptor();
        descriptor
            .consumes()
            .iter()
            .map(|c| c.item)
            .chain(descriptor.produces().iter().map(|p| p.item))
    });
    for item in step_items.chain(initial.iter().copied()).chain(finals.iter().copied()) {
        if seen.insert(item) {
            items.push(item);
        }
    }

    let pruned = steps
        .iter()
        .filter(|step| !included[step.index()])
        .map(|step| step.id().to_string())
        .collect();

    Ok(CompiledGraph {
        steps: infos,
        items,
        pruned,
    })
}

/// Map every item to its producers, rejecting duplicate simple producers and
/// steps that produce a simple initial item.
fn producer_map(
    steps: &[StepDescriptor],
    initial: &HashSet<ItemId>,
) -> Result<HashMap<ItemId, Producers>, ChainBuildError> {
    let mut producers: HashMap<ItemId, Producers> = HashMap::new();

    for step in steps {
        for produce in step.produces() {
            let item = produce.item;
            if item.is_multi() {
                producers.entry(item).or_default().entries.push((step.index(), *produce));
                continue;
            }
            if initial.contains(&item) {
                return Err(ChainBuildError::InitialProduced {
                    item: item.to_string(),
                    step: step.id().to_string(),
                    location: step.location().to_string(),
                });
            }
            let entry = producers.entry(item).or_default();
            if let Some((first, _)) = entry
                .entries
                .iter()
                .find(|(_, p)| p.overridable == produce.overridable)
            {
                let first = &steps[*first];
                return Err(ChainBuildError::DuplicateProducer {
                    item: item.to_string(),
                    first: first.id().to_string(),
                    first_location: first.location().to_string(),
                    second: step.id().to_string(),
                    second_location: step.location().to_string(),
                    overridable: produce.overridable,
                });
            }
            entry.entries.push((step.index(), *produce));
        }
    }

    Ok(producers)
}

/// Every required consumption needs a producer: an included one for included
/// steps, any registered one for the rest. Initial items count as produced.
fn check_required(
    steps: &[StepDescriptor],
    initial: &HashSet<ItemId>,
    included: &[bool],
    producers: &HashMap<ItemId, Producers>,
) -> Result<(), ChainBuildError> {
    for step in steps {
        let idx = step.index();
        for consume in step.consumes() {
            if consume.optional || initial.contains(&consume.item) {
                continue;
            }
            let satisfied = match producers.get(&consume.item) {
                Some(p) if included[idx] => p.selected().any(|(producer, _)| included[*producer]),
                Some(_) => true,
                None => false,
            };
            if !satisfied {
                return Err(ChainBuildError::MissingProducer {
                    item: consume.item.to_string(),
                    step: step.id().to_string(),
                });
            }
        }
    }
    Ok(())
}

fn check_cycles(
    steps: &[StepDescriptor],
    included: &[bool],
    upstream: &[BTreeMap<usize, ItemId>],
) -> Result<(), ChainBuildError> {
    let mut graph: DiGraph<usize, ItemId> = DiGraph::new();
    let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
    for idx in (0..steps.len()).filter(|&idx| included[idx]) {
        nodes.insert(idx, graph.add_node(idx));
    }
    for (consumer, deps) in upstream.iter().enumerate() {
        for (producer, item) in deps {
            graph.add_edge(nodes[producer], nodes[&consumer], *item);
        }
    }

    let mut cycles: Vec<Vec<usize>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort();

    let Some(members) = cycles.into_iter().next() else {
        return Ok(());
    };

    let mut path = Vec::new();
    for &consumer in &members {
        for (producer, item) in &upstream[consumer] {
            if members.contains(producer) {
                path.push((steps[*producer].id().to_string(), item.to_string()));
            }
        }
    }
    path.sort();
    path.dedup();

    Err(ChainBuildError::Cycle {
        steps: members.iter().map(|&idx| steps[idx].id().to_string()).collect(),
        path,
    })
}

/// Render compiled steps as a Graphviz digraph.
///
/// Edges follow the flow of items, `producer -> dependent`. Start steps and
/// end steps are ranked together so the graph reads left to right.
pub(crate) fn render_dot(steps: &[StepInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {{");
    let _ = writeln!(out, "    node [shape=rectangle];");
    let _ = writeln!(out, "    rankdir=LR;");
    let _ = writeln!(out);

    let start: Vec<&StepInfo> = steps.iter().filter(|s| s.dependency_count() == 0).collect();
    let end: Vec<&StepInfo> = steps.iter().filter(|s| s.dependents().is_empty()).collect();
    for group in [&start, &end] {
        if group.is_empty() {
            continue;
        }
        let _ = write!(out, "    {{ rank = same;");
        for step in group {
            let _ = write!(out, " {};", quote(step.id()));
        }
        let _ = writeln!(out, " }};");
    }
    let _ = writeln!(out);

    for step in steps {
        for &dependent in step.dependents() {
            let _ = writeln!(
                out,
                "    {} -> {};",
                quote(step.id()),
                quote(steps[dependent].id())
            );
        }
    }
    let _ = writeln!(out, "}}");
    out
}

fn quote(id: &str) -> String {
    format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\""))
}
