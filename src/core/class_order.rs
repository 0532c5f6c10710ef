//! Dependency ordering for class definitions
//!
//! A class must be defined after its superclass and its interfaces whenever
//! those are defined in the same file. Among the classes that are ready at a
//! given step, the one earliest in the current order goes first, so a list
//! that already satisfies every constraint is left unchanged.

use crate::core::dex_file::DexFile;
use crate::core::item::Handle;
use crate::core::items::{ClassDefItem, TypeIdItem};
use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::warn;

/// Arena ids of the file's class definitions in dependency order.
pub(crate) fn dependency_order(file: &DexFile) -> Vec<u32> {
    let section = &file.class_defs;
    let handles: Vec<Handle<ClassDefItem>> = section.handles().collect();

    let mut defined: AHashMap<Handle<TypeIdItem>, usize> = AHashMap::with_capacity(handles.len());
    for (rank, handle) in handles.iter().enumerate() {
        defined.entry(section.get(*handle).class).or_insert(rank);
    }

    let mut pending = vec![0usize; handles.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); handles.len()];
    for (rank, handle) in handles.iter().enumerate() {
        let class = section.get(*handle);
        let mut deps: Vec<usize> = class
            .dependencies(file)
            .into_iter()
            .filter_map(|ty| defined.get(&ty).copied())
            .filter(|&dep| dep != rank)
            .collect();
        deps.sort_unstable();
        deps.dedup();
        pending[rank] = deps.len();
        for dep in deps {
            dependents[dep].push(rank);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == 0)
        .map(|(rank, _)| Reverse(rank))
        .collect();

    let mut placed = vec![false; handles.len()];
    let mut order = Vec::with_capacity(handles.len());
    while let Some(Reverse(rank)) = ready.pop() {
        placed[rank] = true;
        order.push(handles[rank].id());
        for &next in &dependents[rank] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() < handles.len() {
        let cyclic = handles.len() - order.len();
        warn!(
            "{} class definitions form an inheritance cycle; keeping their current order",
            cyclic
        );
        for (rank, handle) in handles.iter().enumerate() {
            if !placed[rank] {
                order.push(handle.id());
            }
        }
    }
    order
}
