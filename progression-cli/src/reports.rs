use anyhow::Result;
use colored::Colorize;
use progression_engine::{
    Catalog, EvaluationResult, FactFailure, PersistenceStatus, Role, StepPlan,
};
use serde::Serialize;
use std::io::Write;

use crate::simulate::SimulationRun;

#[derive(Debug, Serialize)]
struct EvaluationReport<'a> {
    #[serde(flatten)]
    result: &'a EvaluationResult,
    unavailable_facts: Vec<UnavailableFact<'a>>,
}

#[derive(Debug, Serialize)]
struct UnavailableFact<'a> {
    fact: &'a str,
    reason: &'a str,
}

pub fn write_evaluation_console(
    out: &mut dyn Write,
    result: &EvaluationResult,
    failures: &[FactFailure],
) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{} {} ({})",
        "🏆 Progression for".bright_cyan().bold(),
        result.user_id.bold(),
        result.role
    )?;
    writeln!(out, "{}", "==============================".cyan())?;

    let progress = &result.progress;
    writeln!(out, "Points: {}", result.total_points.to_string().green())?;
    writeln!(out, "Level {}: {}", progress.level, progress.title.bold())?;
    match (&progress.next_title, progress.points_to_next) {
        (Some(next), Some(remaining)) => writeln!(
            out,
            "Progress: {}% ({remaining} points to {next})",
            progress.whole_percent()
        )?,
        _ => writeln!(out, "Progress: top level reached")?,
    }
    writeln!(out, "Streak: {} day(s)", result.streak)?;
    writeln!(out)?;

    if let Some(achievement) = &result.new_achievement {
        writeln!(
            out,
            "{} {} (+{} points)",
            "🎉 New achievement:".bright_yellow().bold(),
            achievement.title.bold(),
            achievement.points
        )?;
        if result.pending_count > 1 {
            writeln!(out, "   {} more waiting", result.pending_count - 1)?;
        }
        writeln!(out)?;
    }

    writeln!(
        out,
        "Achievements: {}/{}",
        result.unlocked_count(),
        result.achievements.len()
    )?;
    for status in &result.achievements {
        let marker = if status.is_unlocked() {
            "✅".green()
        } else {
            "⬜".normal()
        };
        writeln!(
            out,
            "  {marker} {:24} {:>4} pts  {:?}",
            status.achievement.id, status.achievement.points, status.achievement.rarity
        )?;
    }
    writeln!(out)?;

    match &result.next_steps {
        StepPlan::AllCaughtUp { completed } => {
            writeln!(out, "Next steps: all caught up ({completed} done)")?;
        }
        StepPlan::Pending {
            steps, remaining, ..
        } => {
            writeln!(out, "Next steps ({remaining} open):")?;
            for step in steps {
                writeln!(out, "  • {} → {}", step.title, step.action_ref)?;
            }
        }
    }

    if !failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Unavailable facts:".yellow())?;
        for failure in failures {
            writeln!(out, "  • {}: {}", failure.fact, failure.message)?;
        }
    }

    match &result.persistence {
        PersistenceStatus::Saved => {}
        PersistenceStatus::Failed(reason) => {
            writeln!(out, "{} {reason}", "⚠️  Snapshot not saved:".red())?;
        }
        PersistenceStatus::Skipped(reason) => {
            writeln!(out, "{} {reason}", "⚠️  Stored progress unreadable:".red())?;
        }
    }
    Ok(())
}

pub fn write_evaluation_json(
    out: &mut dyn Write,
    result: &EvaluationResult,
    failures: &[FactFailure],
) -> Result<()> {
    let report = EvaluationReport {
        result,
        unavailable_facts: failures
            .iter()
            .map(|failure| UnavailableFact {
                fact: failure.fact.as_str(),
                reason: &failure.message,
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_catalog_console(out: &mut dyn Write, catalog: &Catalog, role: Role) -> Result<()> {
    writeln!(
        out,
        "{} {role} (version {})",
        "📚 Catalog for".bright_cyan().bold(),
        catalog.fingerprint()
    )?;
    writeln!(out, "{}", "==============================".cyan())?;

    writeln!(out, "Achievements:")?;
    for achievement in catalog.achievements_for(role) {
        writeln!(
            out,
            "  {:24} {:>4} pts  {:<10} {}",
            achievement.id,
            achievement.points,
            format!("{:?}", achievement.rarity),
            achievement.title
        )?;
    }

    writeln!(out, "Levels:")?;
    for level in catalog.levels(role) {
        writeln!(
            out,
            "  {:>2} {:24} from {} pts",
            level.level, level.title, level.min_points
        )?;
    }

    writeln!(out, "Next steps:")?;
    for def in catalog.steps_by_role(role) {
        writeln!(
            out,
            "  [{}] {:20} {}",
            def.step.priority, def.step.id, def.step.title
        )?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CatalogReport<'a> {
    role: Role,
    version: String,
    achievements: Vec<&'a progression_engine::Achievement>,
    levels: Vec<&'a progression_engine::LevelThreshold>,
    next_steps: Vec<&'a progression_engine::NextStep>,
}

pub fn write_catalog_json(out: &mut dyn Write, catalog: &Catalog, role: Role) -> Result<()> {
    let report = CatalogReport {
        role,
        version: catalog.fingerprint(),
        achievements: catalog.achievements_for(role),
        levels: catalog.levels(role),
        next_steps: catalog.steps_by_role(role).map(|def| &def.step).collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_simulation_console(out: &mut dyn Write, runs: &[SimulationRun]) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Simulation Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==============================".cyan())?;

    let passed = runs.iter().filter(|run| run.passed()).count();
    writeln!(out, "Total runs: {}", runs.len())?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (runs.len() - passed).to_string().red())?;
    writeln!(out)?;

    for run in runs {
        let status = if run.passed() {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(out, "{status} seed {} ({})", run.seed, run.role)?;
        writeln!(
            out,
            "   Evaluations: {}  Unlocked: {}  Points: {}  Level: {}  Best streak: {}",
            run.evaluations, run.unlocked, run.total_points, run.level, run.best_streak
        )?;
        if !run.violations.is_empty() {
            writeln!(out, "   Violations:")?;
            for violation in &run.violations {
                writeln!(out, "     • {}", violation.red())?;
            }
        }
    }
    Ok(())
}

pub fn write_simulation_json(out: &mut dyn Write, runs: &[SimulationRun]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, runs)?;
    writeln!(out)?;
    Ok(())
}
