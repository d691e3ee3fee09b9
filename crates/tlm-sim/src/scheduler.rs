//! Step loops: one per scheduling strategy.
//!
//! Every strategy runs the same stage sequence per timestep:
//!
//! ```text
//! S (signal, master only) | C | Q | N (master publishes time, logs)
//! ```
//!
//! Threaded strategies separate the stages with a [`StageBarrier`]. The
//! calling thread is always the master.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use rayon::prelude::*;
use tlm_components::Component;
use tlm_core::SimClock;
use tlm_graph::Node;

use crate::barrier::{RunControl, StageBarrier};
use crate::error::{SimError, SimResult};
use crate::options::SchedulerStrategy;

/// Exclusive handle on one child for the length of a run.
pub(crate) type Slot<'a> = &'a mut (dyn Component + 'static);

/// Children split by stage, signal components already in dependency order.
pub(crate) struct StageSets<'a> {
    pub signal: Vec<Slot<'a>>,
    pub c: Vec<Slot<'a>>,
    pub q: Vec<Slot<'a>>,
}

impl StageSets<'_> {
    pub fn len(&self) -> usize {
        self.signal.len() + self.c.len() + self.q.len()
    }
}

/// Hand out disjoint `&mut` handles for the listed children.
///
/// # Arguments
/// * `components` - all children of the system
/// * `signal`, `c`, `q` - indices into `components`, one stage each
pub(crate) fn stage_partition<'a>(
    components: &'a mut [Box<dyn Component>],
    signal: &[usize],
    c: &[usize],
    q: &[usize],
) -> StageSets<'a> {
    let mut slots: Vec<Option<Slot<'a>>> =
        components.iter_mut().map(|comp| Some(comp.as_mut())).collect();
    let mut take = |ids: &[usize]| -> Vec<Slot<'a>> {
        ids.iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect()
    };
    StageSets {
        signal: take(signal),
        c: take(c),
        q: take(q),
    }
}

/// Time grid of one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StepPlan {
    pub start: f64,
    pub timestep: f64,
    pub steps: usize,
}

impl StepPlan {
    /// Time at the start of step `i`, computed from the index so no
    /// rounding error accumulates.
    pub fn time_at(&self, i: usize) -> f64 {
        self.start + i as f64 * self.timestep
    }
}

/// The N stage: publishes time and records node rows.
///
/// Row `i` holds the node values at the start of step `i`, so after step
/// `i` completes the master records row `i + 1`. Rows past the allocated
/// space are ignored.
pub(crate) struct StepLogger<'n> {
    nodes: &'n [Arc<Node>],
    clock: &'n SimClock,
    plan: StepPlan,
    rows: usize,
    logged: usize,
}

impl<'n> StepLogger<'n> {
    pub fn new(
        nodes: &'n [Arc<Node>],
        clock: &'n SimClock,
        plan: StepPlan,
        rows: usize,
        logged: usize,
    ) -> Self {
        Self {
            nodes,
            clock,
            plan,
            rows,
            logged,
        }
    }

    pub fn finish_step(&mut self, step: usize) {
        self.clock.set(self.plan.time_at(step + 1));
        let row = step + 1;
        if row < self.rows {
            log_row(self.nodes, row);
            self.logged = row + 1;
        }
    }

    /// Rows fully written so far.
    pub fn logged(&self) -> usize {
        self.logged
    }
}

pub(crate) fn log_row(nodes: &[Arc<Node>], row: usize) {
    for node in nodes {
        node.log_data(row);
    }
}

/// Run `plan.steps` timesteps with the chosen strategy.
///
/// Component failures and cancellation are reported through `control`;
/// the only error returned here is a thread pool that could not be built.
pub(crate) fn run_steps(
    strategy: SchedulerStrategy,
    threads: usize,
    sets: StageSets<'_>,
    plan: StepPlan,
    logger: &mut StepLogger<'_>,
    control: &RunControl,
) -> SimResult<()> {
    let threads = threads.max(1);
    tracing::debug!(
        %strategy,
        threads,
        components = sets.len(),
        steps = plan.steps,
        "starting step loop"
    );
    match strategy {
        SchedulerStrategy::Serial => run_serial(sets, plan, logger, control),
        SchedulerStrategy::StaticPartition => {
            run_static_partition(sets, threads, plan, logger, control)
        }
        SchedulerStrategy::WorkStealing => run_work_stealing(sets, threads, plan, logger, control),
        SchedulerStrategy::TaskPool => run_task_pool(sets, threads, plan, logger, control)?,
    }
    Ok(())
}

/// Step every component of one stage in order.
///
/// # Returns
/// `false` once the run has to stop.
fn step_stage(stage: &mut [Slot<'_>], stop_t: f64, control: &RunControl) -> bool {
    for comp in stage.iter_mut() {
        if control.should_stop() {
            return false;
        }
        if let Err(e) = comp.simulate_to(stop_t) {
            control.fail(comp.name(), e);
            return false;
        }
    }
    !control.should_stop()
}

fn run_serial(
    sets: StageSets<'_>,
    plan: StepPlan,
    logger: &mut StepLogger<'_>,
    control: &RunControl,
) {
    let StageSets {
        mut signal,
        mut c,
        mut q,
    } = sets;
    for i in 0..plan.steps {
        let stop_t = plan.time_at(i + 1);
        if !step_stage(&mut signal, stop_t, control)
            || !step_stage(&mut c, stop_t, control)
            || !step_stage(&mut q, stop_t, control)
        {
            return;
        }
        logger.finish_step(i);
    }
}

/// Components one thread owns for the whole run.
struct Partition<'a> {
    c: Vec<Slot<'a>>,
    q: Vec<Slot<'a>>,
}

fn deal<'a>(components: Vec<Slot<'a>>, parts: usize) -> Vec<Vec<Slot<'a>>> {
    let mut dealt: Vec<Vec<Slot<'a>>> = (0..parts).map(|_| Vec::new()).collect();
    for (i, comp) in components.into_iter().enumerate() {
        dealt[i % parts].push(comp);
    }
    dealt
}

fn run_static_partition(
    sets: StageSets<'_>,
    threads: usize,
    plan: StepPlan,
    logger: &mut StepLogger<'_>,
    control: &RunControl,
) {
    let StageSets { mut signal, c, q } = sets;
    let mut parts: Vec<Partition<'_>> = deal(c, threads)
        .into_iter()
        .zip(deal(q, threads))
        .map(|(c, q)| Partition { c, q })
        .collect();
    let barrier = StageBarrier::new(threads);
    let mut master = parts.remove(0);

    std::thread::scope(|scope| {
        for mut part in parts {
            let barrier = &barrier;
            scope.spawn(move || static_thread(&mut part, None, barrier, plan, control));
        }
        static_thread(
            &mut master,
            Some((&mut signal, logger)),
            &barrier,
            plan,
            control,
        );
    });
}

/// One thread of the static partition. The master also runs the signal
/// stage and the N stage.
fn static_thread(
    part: &mut Partition<'_>,
    mut master: Option<(&mut Vec<Slot<'_>>, &mut StepLogger<'_>)>,
    barrier: &StageBarrier,
    plan: StepPlan,
    control: &RunControl,
) {
    for i in 0..plan.steps {
        let stop_t = plan.time_at(i + 1);
        if let Some((signal, _)) = master.as_mut() {
            step_stage(signal, stop_t, control);
        }
        if !barrier.wait(control) {
            return;
        }
        step_stage(&mut part.c, stop_t, control);
        if !barrier.wait(control) {
            return;
        }
        step_stage(&mut part.q, stop_t, control);
        if !barrier.wait(control) {
            return;
        }
        if let Some((_, logger)) = master.as_mut() {
            logger.finish_step(i);
        }
        if !barrier.wait(control) {
            return;
        }
    }
}

type StealQueue<'a> = Mutex<VecDeque<Slot<'a>>>;

fn lock_queue<'q, 'a>(queue: &'q StealQueue<'a>) -> MutexGuard<'q, VecDeque<Slot<'a>>> {
    queue.lock().unwrap_or_else(|e| e.into_inner())
}

fn steal_queues<'a>(components: Vec<Slot<'a>>, threads: usize) -> Vec<StealQueue<'a>> {
    deal(components, threads)
        .into_iter()
        .map(|part| Mutex::new(VecDeque::from(part)))
        .collect()
}

/// Drain own queue from the front, then steal from the back of the
/// neighbours, `(id + 1 + i) % n` in turn. Finished components go to
/// `done`.
fn drain_stealing<'a>(
    id: usize,
    queues: &[StealQueue<'a>],
    done: &mut Vec<Slot<'a>>,
    stop_t: f64,
    control: &RunControl,
) {
    let n = queues.len();
    loop {
        if control.should_stop() {
            return;
        }
        let own = lock_queue(&queues[id]).pop_front();
        let next = own.or_else(|| {
            (0..n.saturating_sub(1)).find_map(|i| lock_queue(&queues[(id + 1 + i) % n]).pop_back())
        });
        let Some(comp) = next else {
            return;
        };
        let result = comp.simulate_to(stop_t);
        if let Err(e) = result {
            control.fail(comp.name(), e);
        }
        done.push(comp);
    }
}

/// Hand the finished components back to the thread's own queue for the
/// next step.
fn refill<'a>(queue: &StealQueue<'a>, done: &mut Vec<Slot<'a>>) {
    lock_queue(queue).extend(done.drain(..));
}

fn run_work_stealing(
    sets: StageSets<'_>,
    threads: usize,
    plan: StepPlan,
    logger: &mut StepLogger<'_>,
    control: &RunControl,
) {
    let StageSets { mut signal, c, q } = sets;
    let c_queues = steal_queues(c, threads);
    let q_queues = steal_queues(q, threads);
    let barrier = StageBarrier::new(threads);

    std::thread::scope(|scope| {
        for id in 1..threads {
            let (barrier, c_queues, q_queues) = (&barrier, &c_queues, &q_queues);
            scope.spawn(move || stealing_thread(id, None, c_queues, q_queues, barrier, plan, control));
        }
        stealing_thread(
            0,
            Some((&mut signal, logger)),
            &c_queues,
            &q_queues,
            &barrier,
            plan,
            control,
        );
    });
}

fn stealing_thread<'a>(
    id: usize,
    mut master: Option<(&mut Vec<Slot<'_>>, &mut StepLogger<'_>)>,
    c_queues: &[StealQueue<'a>],
    q_queues: &[StealQueue<'a>],
    barrier: &StageBarrier,
    plan: StepPlan,
    control: &RunControl,
) {
    let mut done_c = Vec::new();
    let mut done_q = Vec::new();
    for i in 0..plan.steps {
        let stop_t = plan.time_at(i + 1);
        if let Some((signal, _)) = master.as_mut() {
            step_stage(signal, stop_t, control);
        }
        if !barrier.wait(control) {
            return;
        }
        drain_stealing(id, c_queues, &mut done_c, stop_t, control);
        if !barrier.wait(control) {
            return;
        }
        drain_stealing(id, q_queues, &mut done_q, stop_t, control);
        if !barrier.wait(control) {
            return;
        }
        if let Some((_, logger)) = master.as_mut() {
            logger.finish_step(i);
        }
        refill(&c_queues[id], &mut done_c);
        refill(&q_queues[id], &mut done_q);
        if !barrier.wait(control) {
            return;
        }
    }
}

/// Step every component of one stage on the current rayon pool.
fn par_stage(stage: &mut [Slot<'_>], stop_t: f64, control: &RunControl) -> bool {
    stage.par_iter_mut().for_each(|comp| {
        if control.should_stop() {
            return;
        }
        if let Err(e) = comp.simulate_to(stop_t) {
            control.fail(comp.name(), e);
        }
    });
    !control.should_stop()
}

fn run_task_pool(
    sets: StageSets<'_>,
    threads: usize,
    plan: StepPlan,
    logger: &mut StepLogger<'_>,
    control: &RunControl,
) -> SimResult<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("tlm-worker-{i}"))
        .build()
        .map_err(|e| SimError::ThreadPool {
            message: e.to_string(),
        })?;
    let StageSets {
        mut signal,
        mut c,
        mut q,
    } = sets;
    pool.install(|| {
        for i in 0..plan.steps {
            let stop_t = plan.time_at(i + 1);
            if !step_stage(&mut signal, stop_t, control)
                || !par_stage(&mut c, stop_t, control)
                || !par_stage(&mut q, stop_t, control)
            {
                return;
            }
            logger.finish_step(i);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::CancelToken;
    use tlm_components::{ComponentBase, ComponentKind, ComponentResult};

    /// Counts its own steps.
    struct Counter {
        base: ComponentBase,
        kind: ComponentKind,
        steps: usize,
    }

    impl Counter {
        fn boxed(name: &str, kind: ComponentKind) -> Box<dyn Component> {
            Box::new(Self {
                base: ComponentBase::new(name),
                kind,
                steps: 0,
            })
        }
    }

    impl Component for Counter {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ComponentBase {
            &mut self.base
        }

        fn type_name(&self) -> &str {
            "Counter"
        }

        fn kind(&self) -> ComponentKind {
            self.kind
        }

        fn initialize(&mut self) -> ComponentResult<()> {
            Ok(())
        }

        fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
            self.steps += 1;
            Ok(())
        }
    }

    fn counters(n: usize) -> Vec<Box<dyn Component>> {
        (0..n)
            .map(|i| {
                let kind = if i % 2 == 0 {
                    ComponentKind::C
                } else {
                    ComponentKind::Q
                };
                Counter::boxed(&format!("k{i}"), kind)
            })
            .collect()
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let mut comps = counters(6);
        let sets = stage_partition(&mut comps, &[], &[0, 2, 4], &[1, 3, 5]);
        assert_eq!(sets.c.len(), 3);
        assert_eq!(sets.q.len(), 3);
        assert_eq!(sets.q[1].name(), "k3");
    }

    #[test]
    fn every_strategy_steps_each_component_once_per_step() {
        for strategy in SchedulerStrategy::ALL {
            let mut comps = counters(7);
            let clock = SimClock::new(0.0);
            let plan = StepPlan {
                start: 0.0,
                timestep: 1e-3,
                steps: 25,
            };
            let control = RunControl::new(CancelToken::new());
            let mut logger = StepLogger::new(&[], &clock, plan, 0, 0);
            let sets = stage_partition(&mut comps, &[], &[0, 2, 4, 6], &[1, 3, 5]);
            run_steps(strategy, 3, sets, plan, &mut logger, &control).unwrap();

            assert!(!control.should_stop());
            assert!((clock.time() - 0.025).abs() < 1e-12, "{strategy}");
            for comp in &comps {
                assert!(
                    (comp.base().time() - 0.025).abs() < 1e-12,
                    "{strategy}: {} ended at {}",
                    comp.name(),
                    comp.base().time()
                );
            }
        }
    }

    #[test]
    fn plan_times_do_not_drift() {
        let plan = StepPlan {
            start: 1.0,
            timestep: 0.1,
            steps: 10,
        };
        assert_eq!(plan.time_at(0), 1.0);
        assert!((plan.time_at(10) - 2.0).abs() < 1e-15);
    }
}
