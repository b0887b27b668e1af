//! Seeded random fact trajectories run through the engine, checking the
//! progression properties after every evaluation.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use progression_engine::{
    Catalog, EngineConfig, EvaluationResult, FactBag, FactKey, FactKind, FactValue, MemoryStore,
    ProgressionEngine, ProgressionSnapshot, Role, evaluate_unlocks,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

const START_DATE: (i32, u32, u32) = (2025, 1, 1);

#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    pub seed: u64,
    pub role: Role,
    pub days: u32,
    pub evaluations: usize,
    pub unlocked: usize,
    pub total_points: u32,
    pub level: u32,
    pub best_streak: u32,
    pub violations: Vec<String>,
}

impl SimulationRun {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Random walk over a user's facts. Counts mostly grow, sometimes shrink,
/// and any fact may go missing for a day.
struct Trajectory {
    rng: ChaCha8Rng,
    keys: Vec<FactKey>,
    values: BTreeMap<FactKey, FactValue>,
}

impl Trajectory {
    fn new(seed: u64, role: Role, keys: Vec<FactKey>) -> Self {
        let salt = match role {
            Role::Investor => 0x1111,
            Role::Syndicator => 0x2222,
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed ^ salt),
            keys,
            values: BTreeMap::new(),
        }
    }

    fn next_facts(&mut self) -> FactBag {
        for key in &self.keys {
            let next = match (key.kind(), self.values.get(key).copied()) {
                (FactKind::Flag, Some(FactValue::Flag(true))) => FactValue::Flag(true),
                (FactKind::Flag, _) => FactValue::Flag(self.rng.gen_bool(0.2)),
                (FactKind::Count, Some(FactValue::Count(current))) => {
                    if self.rng.gen_bool(0.05) {
                        FactValue::Count(current / 2)
                    } else {
                        FactValue::Count(current + self.rng.gen_range(0..=4))
                    }
                }
                (FactKind::Count, _) => FactValue::Count(self.rng.gen_range(0..=2)),
            };
            self.values.insert(*key, next);
        }

        self.values
            .iter()
            .filter(|_| !self.rng.gen_bool(0.1))
            .map(|(key, value)| (*key, *value))
            .collect()
    }

    fn step_days(&mut self) -> u64 {
        match self.rng.gen_range(0..10) {
            0 => 0,
            1 | 2 => self.rng.gen_range(2..=4),
            _ => 1,
        }
    }

    fn pick<'a>(&mut self, keys: &'a [FactKey]) -> Option<&'a FactKey> {
        if keys.is_empty() {
            return None;
        }
        keys.get(self.rng.gen_range(0..keys.len()))
    }

    fn coin(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Run one seeded trajectory of `days` evaluations for `role`.
pub fn run_simulation(config: &EngineConfig, seed: u64, role: Role, days: u32) -> Result<SimulationRun> {
    let engine = ProgressionEngine::with_config(MemoryStore::new(), config.clone())?;
    let catalog = engine.catalog();
    let keys: Vec<FactKey> = catalog.required_facts(role).into_iter().collect();
    let mut trajectory = Trajectory::new(seed, role, keys.clone());
    let user_id = format!("sim-{seed}-{role}");

    let (year, month, day) = START_DATE;
    let mut today = NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
    let mut run = SimulationRun {
        seed,
        role,
        days,
        evaluations: 0,
        unlocked: 0,
        total_points: 0,
        level: 0,
        best_streak: 0,
        violations: Vec::new(),
    };

    for day_index in 0..days {
        let facts = trajectory.next_facts();
        let prior = engine
            .snapshot(&user_id)
            .unwrap_or_default()
            .unwrap_or_else(|| ProgressionSnapshot::empty(&user_id));
        let now = start_of_day(today);

        let result = engine.evaluate(&user_id, role, &facts, now);
        let repeat = engine.evaluate(&user_id, role, &facts, now);
        run.evaluations += 2;

        let mut violations = Vec::new();
        check_monotonic(&prior, &result, &mut violations);
        check_points_and_level(catalog, role, &result, &mut violations);
        check_streak(&prior, today, &result, &mut violations);
        check_idempotent(catalog, role, &facts, &result, &repeat, &mut violations);
        check_pending(catalog, role, &prior, &result, &mut violations);
        check_next_steps(catalog, &facts, &result, config.next_step_limit, &mut violations);
        if let Some(key) = trajectory.pick(&keys) {
            check_fault_isolation(catalog, role, &facts, *key, &mut violations);
        }

        if trajectory.coin() && result.new_achievement.is_some() {
            engine.acknowledge_new_achievement(&user_id).unwrap_or_default();
            let after = engine.evaluate(&user_id, role, &facts, now);
            run.evaluations += 1;
            if after.new_achievement.is_some() || after.pending_count != 0 {
                violations.push("new achievement fired again after acknowledgement".to_string());
            }
        }

        run.best_streak = run.best_streak.max(result.streak);
        run.unlocked = result.snapshot.unlocked.len();
        run.total_points = result.total_points;
        run.level = result.progress.level;
        run.violations.extend(
            violations
                .into_iter()
                .map(|violation| format!("day {day_index} ({today}): {violation}")),
        );

        today = today
            .checked_add_days(Days::new(trajectory.step_days()))
            .unwrap_or(today);
    }

    log::debug!(
        "simulation seed {seed} for {role}: {} violation(s)",
        run.violations.len()
    );
    Ok(run)
}

fn check_monotonic(prior: &ProgressionSnapshot, result: &EvaluationResult, out: &mut Vec<String>) {
    for (id, record) in &prior.unlocked {
        match result.snapshot.unlocked.get(id) {
            None => out.push(format!("`{id}` was unlocked and is now missing")),
            Some(now) if now.unlocked_at != record.unlocked_at => {
                out.push(format!("`{id}` first-unlock time changed"));
            }
            Some(_) => {}
        }
    }
}

fn check_points_and_level(
    catalog: &Catalog,
    role: Role,
    result: &EvaluationResult,
    out: &mut Vec<String>,
) {
    let expected = result
        .snapshot
        .unlocked_ids()
        .filter_map(|id| catalog.lookup(role, id))
        .map(|achievement| achievement.points)
        .sum::<u32>();
    if result.total_points != expected {
        out.push(format!(
            "total points {} but unlocked achievements sum to {expected}",
            result.total_points
        ));
    }

    let Some(level) = &result.level else {
        out.push("no level resolved".to_string());
        return;
    };
    if level.min_points > result.total_points {
        out.push(format!(
            "level {} needs {} points but user has {}",
            level.level, level.min_points, result.total_points
        ));
    }
    if let Some(next) = catalog
        .levels(role)
        .into_iter()
        .find(|candidate| candidate.min_points > level.min_points)
        && next.min_points <= result.total_points
    {
        out.push(format!(
            "level {} reported while {} points reach level {}",
            level.level, result.total_points, next.level
        ));
    }
    if !(0.0..=100.0).contains(&result.progress.percent) {
        out.push(format!("progress {} outside [0, 100]", result.progress.percent));
    }
}

fn check_streak(
    prior: &ProgressionSnapshot,
    today: NaiveDate,
    result: &EvaluationResult,
    out: &mut Vec<String>,
) {
    let expected = match prior.last_active_date.map(|last| (today - last).num_days()) {
        Some(0) => prior.streak,
        Some(1) => prior.streak.saturating_add(1),
        _ => 1,
    };
    if result.streak != expected {
        out.push(format!("streak {} but expected {expected}", result.streak));
    }
    if result.snapshot.last_active_date != Some(today) {
        out.push("last active date not moved to today".to_string());
    }
}

fn check_idempotent(
    catalog: &Catalog,
    role: Role,
    facts: &FactBag,
    first: &EvaluationResult,
    repeat: &EvaluationResult,
    out: &mut Vec<String>,
) {
    if evaluate_unlocks(catalog, role, facts) != evaluate_unlocks(catalog, role, facts) {
        out.push("unlock evaluation is not deterministic".to_string());
    }
    if first.snapshot.unlocked != repeat.snapshot.unlocked
        || first.total_points != repeat.total_points
        || first.streak != repeat.streak
    {
        out.push("re-evaluating the same facts changed the result".to_string());
    }
}

fn check_pending(
    catalog: &Catalog,
    role: Role,
    prior: &ProgressionSnapshot,
    result: &EvaluationResult,
    out: &mut Vec<String>,
) {
    let newly: BTreeSet<&str> = result
        .snapshot
        .unlocked_ids()
        .filter(|id| !prior.is_unlocked(id) && catalog.lookup(role, id).is_some())
        .collect();
    let first_pending = catalog
        .achievements_for(role)
        .into_iter()
        .find(|achievement| {
            result
                .snapshot
                .unlocked
                .get(&achievement.id)
                .is_some_and(|record| !record.acknowledged)
        });

    if !newly.is_empty() && result.new_achievement.is_none() {
        out.push(format!("{} new unlock(s) but no event", newly.len()));
    }
    if result.new_achievement.as_ref() != first_pending {
        out.push("event is not the first pending achievement in catalog order".to_string());
    }
}

fn check_next_steps(
    catalog: &Catalog,
    facts: &FactBag,
    result: &EvaluationResult,
    limit: usize,
    out: &mut Vec<String>,
) {
    let steps = result.next_steps.steps();
    if steps.len() > limit {
        out.push(format!("{} next steps exceed the limit of {limit}", steps.len()));
    }
    if steps.windows(2).any(|pair| pair[0].priority > pair[1].priority) {
        out.push("next steps are not sorted by priority".to_string());
    }
    for step in steps {
        let completed = catalog
            .next_steps
            .iter()
            .find(|def| def.step.id == step.id)
            .is_some_and(|def| def.complete_when.is_satisfied(facts));
        if completed {
            out.push(format!("completed step `{}` still suggested", step.id));
        }
    }
}

fn check_fault_isolation(
    catalog: &Catalog,
    role: Role,
    facts: &FactBag,
    key: FactKey,
    out: &mut Vec<String>,
) {
    let mut missing = facts.clone();
    missing.remove(key);
    let mut zeroed = facts.clone();
    zeroed.insert(
        key,
        match key.kind() {
            FactKind::Flag => FactValue::Flag(false),
            FactKind::Count => FactValue::Count(0),
        },
    );

    for def in catalog.by_role(role) {
        if def.unlock.required_facts().contains(&key) {
            continue;
        }
        if def.unlock.is_satisfied(&missing) != def.unlock.is_satisfied(&zeroed) {
            out.push(format!(
                "`{}` changed when unrelated fact `{key}` went missing",
                def.achievement.id
            ));
        }
    }
}
