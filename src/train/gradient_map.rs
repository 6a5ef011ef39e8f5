use std::ops::Range;

use super::ConfigError;
use crate::feedforward::Net;

/// What part of a layer's coefficient block an accumulator covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorKind {
    /// Connections from the previous layer.
    Weights,
    Bias,
}

/// One gradient accumulator: a contiguous span of the gradient vector owned by a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator {
    /// Position of the accumulator in its network's list.
    pub id: usize,
    /// Layer the span belongs to.
    pub level: usize,
    pub kind: AccumulatorKind,
    pub span: Range<usize>,
}

impl Accumulator {
    /// Lists the accumulators of `net`, layer by layer, weights before biases.
    pub fn of(net: &Net) -> Vec<Accumulator> {
        let mut accumulators = Vec::with_capacity(2 * net.layers.len());

        for level in 1..net.layers.len() {
            let start = net.weight_index[level];
            let weights_end = start + net.layers[level].size * net.layers[level - 1].size;
            let end = net.weight_index[level + 1];

            accumulators.push(Accumulator {
                id: accumulators.len(),
                level,
                kind: AccumulatorKind::Weights,
                span: start..weights_end,
            });
            if weights_end < end {
                accumulators.push(Accumulator {
                    id: accumulators.len(),
                    level,
                    kind: AccumulatorKind::Bias,
                    span: weights_end..end,
                });
            }
        }

        accumulators
    }
}

/// Links every accumulator of a master network to the matching accumulator of each worker.
///
/// Built once when a multi-threaded trainer starts; afterwards `GradientMap::merge` moves
/// the workers' gradients into the master's in one pass.
#[derive(Debug, Clone)]
pub struct GradientMap {
    master: Vec<Accumulator>,
    /// `links[a][w]` is the id of worker `w`'s accumulator matching master accumulator `a`.
    links: Vec<Vec<usize>>,
    workers: Vec<Vec<Accumulator>>,
}

impl GradientMap {
    /// Builds the map from the master network and its worker clones.
    ///
    /// # Returns
    /// * `Ok(GradientMap)` if every worker's accumulators line up with the master's;
    /// * `Err(ConfigError::IncongruentWorker)` naming the first worker that doesn't.
    pub fn new(master: &Net, workers: &[&Net]) -> Result<Self, ConfigError> {
        let master_list = Accumulator::of(master);
        let mut worker_lists = Vec::with_capacity(workers.len());

        for (index, worker) in workers.iter().enumerate() {
            let list = Accumulator::of(worker);
            let congruent = list.len() == master_list.len()
                && list
                    .iter()
                    .zip(master_list.iter())
                    .all(|(w, m)| w.kind == m.kind && w.span.len() == m.span.len());
            if !congruent {
                return Err(ConfigError::IncongruentWorker(index));
            }
            worker_lists.push(list);
        }

        // Topologies are identical, so accumulators match by position
        let links = master_list
            .iter()
            .map(|m| worker_lists.iter().map(|list| list[m.id].id).collect())
            .collect();

        Ok(Self {
            master: master_list,
            links,
            workers: worker_lists,
        })
    }

    /// Accumulators of the master network.
    pub fn accumulators(&self) -> &[Accumulator] {
        &self.master
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Adds each worker's gradients to the master's and zeroes the worker's.
    ///
    /// `workers` must be given in the order the map was built with.
    pub fn merge(&self, master: &mut [f64], workers: &mut [&mut [f64]]) {
        debug_assert_eq!(workers.len(), self.workers.len());

        for (accumulator, links) in self.master.iter().zip(self.links.iter()) {
            let target = &mut master[accumulator.span.clone()];

            for ((gradients, list), &link) in workers
                .iter_mut()
                .zip(self.workers.iter())
                .zip(links.iter())
            {
                let source = &mut gradients[list[link].span.clone()];
                for (t, s) in target.iter_mut().zip(source.iter_mut()) {
                    *t += *s;
                    *s = 0.0;
                }
            }
        }
    }
}
