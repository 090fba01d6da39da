use crate::data::{
    Combination, CourseGroup, OutcomeReason, ScheduleRequest, ScoredCombination, SearchBudget,
    SearchOutcome, SearchStats, Section,
};
use crate::error::{Result, ScheduleError};
use crate::metrics::ScheduleMetrics;
use crate::overlap::OccupancyMap;
use crate::ranker::{Scored, rank};
use crate::score::{ScoreModel, TimeRange};
use itertools::Itertools;
use log::{debug, info, trace, warn};
use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Generates the best section combinations for a request.
///
/// Input problems are reported before any search work; a timeout or an empty
/// result is a normal outcome carried in the returned [`SearchOutcome`].
pub fn generate(request: &ScheduleRequest) -> Result<SearchOutcome> {
    let start_time = Instant::now();
    let budget = request.budget.unwrap_or_default();

    if request.courses.is_empty() {
        return Err(ScheduleError::NoCoursesRequested);
    }
    if request.sections.is_empty() {
        return Err(ScheduleError::EmptyCourseGroup);
    }
    if request.max_results == 0 {
        return Err(ScheduleError::InvalidMaxResults);
    }
    request.sections.check_codes()?;

    let group: Cow<'_, CourseGroup> = match &request.shift {
        Some(shift) => Cow::Owned(request.sections.with_shift(shift)),
        None => Cow::Borrowed(&request.sections),
    };
    let levels = candidate_levels(&request.courses, &group)?;

    info!(
        "Searching {} courses over {} candidate sections \
         (shift: {}, time limit: {}ms, leaf cap: {}, parallel: {})",
        levels.len(),
        levels.iter().map(|level| level.len()).sum::<usize>(),
        request.shift.as_deref().unwrap_or("any"),
        budget.time_limit_ms,
        budget.max_leaves,
        budget.parallel
    );

    let range = TimeRange::detect(&group);
    trace!(
        "Offered time range: {:.2}h - {:.2}h",
        range.min_start_hour, range.max_end_hour
    );

    let model = ScoreModel::new(request.preferences, range);
    let enumerator = CombinationEnumerator::new(levels, model, budget);
    let search = enumerator.run()?;

    let mut stats = search.stats;
    stats.elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!("Search finished: {stats}");
    if stats.timed_out {
        warn!("Search budget exhausted; results are partial");
    }

    let found = search.leaves.len();
    let results: Vec<ScoredCombination> = rank(search.leaves, request.max_results)
        .into_iter()
        .map(|leaf| ScoredCombination {
            sections: enumerator.combination(&leaf.picks),
            metrics: leaf.metrics,
            score: leaf.score,
        })
        .collect();

    if let (Some(best), Some(worst)) = (results.first(), results.last()) {
        info!("Returning the best {} of {} valid combinations", results.len(), found);
        debug!("Score range: {:.2} - {:.2}", worst.score, best.score);
    }

    let exhaustive_and_empty = results.is_empty() && !stats.timed_out;
    let reason = exhaustive_and_empty.then_some(OutcomeReason::NoFeasibleCombination);
    Ok(SearchOutcome {
        results,
        reason,
        stats,
    })
}

/// Candidate lists for each required code, in lexicographic code order.
fn candidate_levels<'g>(
    courses: &[String],
    group: &'g CourseGroup,
) -> Result<Vec<&'g [Section]>> {
    courses
        .iter()
        .map(String::as_str)
        .sorted()
        .dedup()
        .map(|code| {
            group
                .get(code)
                .filter(|sections| !sections.is_empty())
                .ok_or_else(|| ScheduleError::NoSectionsFor(code.to_string()))
        })
        .collect()
}

/// A complete combination found during the search, kept as per-level indices.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub picks: Vec<usize>,
    pub metrics: ScheduleMetrics,
    pub score: f64,
}

impl Scored for Leaf {
    fn score(&self) -> f64 {
        self.score
    }
}

/// Leaves in discovery order plus the run's counters.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub leaves: Vec<Leaf>,
    pub stats: SearchStats,
}

/// Node and leaf counters shared by every worker of one search.
///
/// The first worker to see the budget exhausted raises `stop`; the others
/// observe it at their next node.
#[derive(Debug)]
struct SharedBudget {
    deadline: Option<Instant>,
    max_nodes: u64,
    max_leaves: usize,
    nodes: AtomicU64,
    leaves: AtomicUsize,
    stop: AtomicBool,
}

impl SharedBudget {
    fn new(budget: &SearchBudget) -> Self {
        Self {
            deadline: Instant::now().checked_add(budget.time_limit()),
            max_nodes: budget.max_nodes.unwrap_or(u64::MAX),
            max_leaves: budget.max_leaves,
            nodes: AtomicU64::new(0),
            leaves: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        }
    }

    /// Checks the budget and, if it allows, counts one more explored node.
    fn enter_node(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return false;
        }
        let expired = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
        let admitted = !expired
            && self.leaves.load(Ordering::Relaxed) < self.max_leaves
            && reserve(&self.nodes, self.max_nodes);
        if !admitted {
            self.stop.store(true, Ordering::Relaxed);
        }
        admitted
    }

    /// Reserves a slot for one leaf under the leaf cap.
    fn claim_leaf(&self) -> bool {
        let claimed = reserve_leaf(&self.leaves, self.max_leaves);
        if !claimed {
            self.stop.store(true, Ordering::Relaxed);
        }
        claimed
    }

    fn exhausted(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Increments `counter` unless it already reached `cap`.
fn reserve(counter: &AtomicU64, cap: u64) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n < cap).then_some(n + 1))
        .is_ok()
}

fn reserve_leaf(counter: &AtomicUsize, cap: usize) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n < cap).then_some(n + 1))
        .is_ok()
}

/// Per-worker state threaded through the recursion.
struct SearchContext<'s> {
    budget: &'s SharedBudget,
    picks: Vec<usize>,
    occupancy: OccupancyMap,
    leaves: Vec<Leaf>,
    pruned_by_shift: u64,
    pruned_by_overlap: u64,
}

impl<'s> SearchContext<'s> {
    fn new(budget: &'s SharedBudget, depth: usize) -> Self {
        Self {
            budget,
            picks: Vec::with_capacity(depth),
            occupancy: OccupancyMap::new(),
            leaves: Vec::new(),
            pruned_by_shift: 0,
            pruned_by_overlap: 0,
        }
    }
}

/// Depth-first backtracking over course levels with shift and overlap pruning.
#[derive(Debug)]
pub struct CombinationEnumerator<'a> {
    levels: Vec<&'a [Section]>,
    model: ScoreModel,
    budget: SearchBudget,
}

impl<'a> CombinationEnumerator<'a> {
    /// `levels` holds one non-empty candidate list per course, in search order.
    pub fn new(levels: Vec<&'a [Section]>, model: ScoreModel, budget: SearchBudget) -> Self {
        Self { levels, model, budget }
    }

    /// Runs the search until it is exhaustive or the budget runs out.
    pub fn run(&self) -> Result<SearchResult> {
        let shared = SharedBudget::new(&self.budget);
        let contexts = if self.budget.parallel && self.levels.len() > 1 {
            self.run_parallel(&shared)?
        } else {
            let mut ctx = SearchContext::new(&shared, self.levels.len());
            if self.descend(0, &mut ctx).is_break() {
                debug!("Sequential search stopped by budget");
            }
            vec![ctx]
        };

        let mut stats = SearchStats {
            nodes_explored: shared.nodes.load(Ordering::Relaxed),
            timed_out: shared.exhausted(),
            ..SearchStats::default()
        };
        let mut leaves = Vec::new();
        for ctx in contexts {
            stats.pruned_by_shift += ctx.pruned_by_shift;
            stats.pruned_by_overlap += ctx.pruned_by_overlap;
            leaves.extend(ctx.leaves);
        }
        stats.leaves_found = leaves.len();
        Ok(SearchResult { leaves, stats })
    }

    /// Splits the first level into contiguous chunks, one scoped thread each.
    ///
    /// Contexts come back in branch order, so concatenated leaves match the
    /// sequential discovery order.
    fn run_parallel<'s>(&self, shared: &'s SharedBudget) -> Result<Vec<SearchContext<'s>>> {
        if !shared.enter_node() {
            return Ok(Vec::new());
        }
        let first_level = self.levels[0];
        let workers = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let chunk_size = first_level.len().div_ceil(workers).max(1);
        debug!(
            "Parallel search: {} first-level branches across {} workers",
            first_level.len(),
            first_level.len().div_ceil(chunk_size)
        );

        std::thread::scope(|scope| {
            let handles: Vec<_> = first_level
                .chunks(chunk_size)
                .enumerate()
                .map(|(chunk_index, chunk)| {
                    let offset = chunk_index * chunk_size;
                    scope.spawn(move || {
                        let mut ctx = SearchContext::new(shared, self.levels.len());
                        for (i, section) in chunk.iter().enumerate() {
                            if self.branch(0, offset + i, section, &mut ctx).is_break() {
                                break;
                            }
                        }
                        ctx
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| ScheduleError::Internal("search worker panicked".to_string()))
                })
                .collect()
        })
    }

    fn descend(&self, depth: usize, ctx: &mut SearchContext<'_>) -> ControlFlow<()> {
        if !ctx.budget.enter_node() {
            return ControlFlow::Break(());
        }
        if depth == self.levels.len() {
            return self.record_leaf(ctx);
        }
        for (index, candidate) in self.levels[depth].iter().enumerate() {
            self.branch(depth, index, candidate, ctx)?;
        }
        ControlFlow::Continue(())
    }

    /// Tries one candidate at `depth`: prune, claim, recurse, rewind.
    fn branch(
        &self,
        depth: usize,
        index: usize,
        candidate: &Section,
        ctx: &mut SearchContext<'_>,
    ) -> ControlFlow<()> {
        if let Some(&first) = ctx.picks.first() {
            if candidate.shift != self.levels[0][first].shift {
                ctx.pruned_by_shift += 1;
                return ControlFlow::Continue(());
            }
        }
        if ctx.occupancy.conflicts(candidate) {
            ctx.pruned_by_overlap += 1;
            return ControlFlow::Continue(());
        }

        let checkpoint = ctx.occupancy.claim(candidate);
        ctx.picks.push(index);
        let flow = self.descend(depth + 1, ctx);
        ctx.picks.pop();
        ctx.occupancy.rewind(checkpoint);
        flow
    }

    fn record_leaf(&self, ctx: &mut SearchContext<'_>) -> ControlFlow<()> {
        if !ctx.budget.claim_leaf() {
            return ControlFlow::Break(());
        }
        let metrics = ScheduleMetrics::calculate(self.sections(&ctx.picks));
        let score = self.model.evaluate(&metrics);
        ctx.leaves.push(Leaf {
            picks: ctx.picks.clone(),
            metrics,
            score,
        });
        ControlFlow::Continue(())
    }

    fn sections<'p>(&'p self, picks: &'p [usize]) -> impl Iterator<Item = &'a Section> + 'p {
        picks.iter().zip(&self.levels).map(|(&index, &level)| &level[index])
    }

    /// Materializes a leaf's picks into owned sections.
    pub fn combination(&self, picks: &[usize]) -> Combination {
        self.sections(picks).cloned().collect()
    }
}
