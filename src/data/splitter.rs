// ============================================================
// Layer 4 — Task Filter & Train/Validation Splitter
// ============================================================
// Selects the episode files that belong to a task, shuffles
// them, and splits them into training and validation lists.
//
// Task selection:
//   Every task name maps to a regex searched in the file name,
//   e.g. "box_open" → forward_\d*1\.json (forward skill, box env).
//   Composite tasks are unions of simple patterns. A task
//   registered with `None` matches every file.
//
// Split modes:
//   - fraction:  first floor(n * train_fraction) → train, rest → val
//   - few-shot:  first k → train, next 10 → val, rest unused
//
// Shuffling uses the RNG handed in by the caller, so a fixed
// seed gives the same split on every run.
//
// Reference: rand crate documentation (SliceRandom)
//            regex crate documentation

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rand::{seq::SliceRandom, Rng};
use regex::Regex;
use serde::Serialize;

use crate::data::loader::list_episode_files;
use crate::domain::error::SplitError;
use crate::domain::meta::{EpisodeMeta, Environment};

/// Validation episodes kept after the training shots in few-shot mode
pub const FEW_SHOT_VAL_SIZE: usize = 10;

/// Prefix marking simulation task names, stripped before lookup
const SIM_PREFIX: &str = "sim_";

// ─── Task Registry ────────────────────────────────────────────────────────────
/// Maps task names to file-matching patterns.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, Option<Regex>>,
}

impl TaskRegistry {
    /// An empty registry, for callers with their own task naming
    pub fn empty() -> Self {
        Self { tasks: HashMap::new() }
    }

    /// The built-in task set.
    ///
    /// Composite tasks hold out one skill. In multi-task mode they
    /// train on everything else; in few-shot mode they select only
    /// the held-out skill, whose first k episodes become the shots.
    pub fn builtin(few_shot: bool) -> Result<Self, SplitError> {
        let mut reg = Self::empty();

        for (env, fwd, bwd) in [
            (Environment::Box,        "box_open",       "box_close"),
            (Environment::Door,       "door_open",      "door_close"),
            (Environment::ToiletSeat, "toilet_seat_up", "toilet_seat_down"),
            (Environment::Grill,      "grill_open",     "grill_close"),
        ] {
            let digit = env.digit();
            reg.register(fwd, Some(format!(r"forward_\d*{digit}\.json$").as_str()))?;
            reg.register(bwd, Some(format!(r"backward_\d*{digit}\.json$").as_str()))?;
            reg.register(env.name(), Some(format!(r"[a-zA-Z_]*\d*{digit}\.json$").as_str()))?;
        }

        let composites: [(&str, &str, &str); 4] = if few_shot {
            [
                ("bo_bc_tc",       r"demo_forward_\d*3\.json$",  ""),
                ("bo_bc_go_gc_tc", r"demo_forward_\d*3\.json$",  ""),
                ("go_gc_to_tc_bc", r"demo_forward_\d*1\.json$",  ""),
                ("go_gc_to_tc_bo", r"demo_backward_\d*1\.json$", ""),
            ]
        } else {
            [
                ("bo_bc_tc",       r"demo_backward_\d*3\.json$", "1"),
                ("bo_bc_go_gc_tc", r"demo_backward_\d*3\.json$", "15"),
                ("go_gc_to_tc_bc", r"demo_backward_\d*1\.json$", "53"),
                ("go_gc_to_tc_bo", r"demo_forward_\d*1\.json$",  "53"),
            ]
        };
        for (name, held_out, full_envs) in composites {
            // One alternative per fully included environment, then the held-out skill
            let mut alts: Vec<String> = full_envs
                .chars()
                .map(|d| format!(r"[a-zA-Z_]*\d*{d}\.json$"))
                .collect();
            alts.push(held_out.to_string());
            reg.register(name, Some(alts.join("|").as_str()))?;
        }

        reg.register("all", None)?;
        Ok(reg)
    }

    /// Register (or replace) a task. `None` matches every file.
    pub fn register(&mut self, name: &str, pattern: Option<&str>) -> Result<(), SplitError> {
        let regex = pattern.map(Regex::new).transpose()?;
        self.tasks.insert(name.to_string(), regex);
        Ok(())
    }

    /// Resolve a task name, stripping a leading "sim_" first.
    pub fn lookup(&self, task_name: &str) -> Result<Option<&Regex>, SplitError> {
        let key = task_name.strip_prefix(SIM_PREFIX).unwrap_or(task_name);
        self.tasks
            .get(key)
            .map(Option::as_ref)
            .ok_or_else(|| SplitError::UnknownTask {
                name:  task_name.to_string(),
                known: self.task_names().join(", "),
            })
    }

    /// Keep the files whose name matches the task's pattern.
    pub fn filter(&self, task_name: &str, files: Vec<PathBuf>) -> Result<Vec<PathBuf>, SplitError> {
        let Some(pattern) = self.lookup(task_name)? else {
            return Ok(files);
        };
        Ok(files
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| pattern.is_match(n))
            })
            .collect())
    }

    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ─── Split Types ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Proportion for training, e.g. 0.8 = 80%
    pub train_fraction: f64,
    /// Few-shot count; overrides the fraction when set
    pub few_shot: Option<usize>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { train_fraction: 0.8, few_shot: None }
    }
}

/// An episode file together with the metadata parsed from its name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeRef {
    pub path: PathBuf,
    pub meta: EpisodeMeta,
}

impl EpisodeRef {
    pub fn new(path: PathBuf) -> Self {
        let meta = EpisodeMeta::from_path(&path);
        Self { path, meta }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSplit {
    pub train:      Vec<EpisodeRef>,
    pub validation: Vec<EpisodeRef>,
    /// Matched files left out (few-shot remainder)
    pub unused: usize,
}

impl TaskSplit {
    /// Count of episodes per "env/skill" label in a list
    pub fn composition(list: &[EpisodeRef]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for ep in list {
            *counts.entry(ep.meta.label()).or_insert(0) += 1;
        }
        counts
    }
}

// ─── Splitting ────────────────────────────────────────────────────────────────
/// Filter `dir` by task, shuffle with `rng` and split per `cfg`.
pub fn split_task_files<R: Rng + ?Sized>(
    dir:       &Path,
    task_name: &str,
    registry:  &TaskRegistry,
    cfg:       &SplitConfig,
    rng:       &mut R,
) -> Result<TaskSplit, SplitError> {
    // Unknown task names fail before the directory is touched
    registry.lookup(task_name)?;

    let candidates = list_episode_files(dir)?;
    let matched    = registry.filter(task_name, candidates)?;

    if matched.is_empty() {
        return Err(SplitError::NoMatchingFiles {
            dir:  dir.to_path_buf(),
            task: task_name.to_string(),
        });
    }

    // Metadata is parsed once here and travels with the path
    let episodes: Vec<EpisodeRef> = matched.into_iter().map(EpisodeRef::new).collect();

    let split = match cfg.few_shot {
        Some(k) => {
            let (train, validation, rest) = split_few_shot(episodes, k, rng);
            TaskSplit { train, validation, unused: rest.len() }
        }
        None => {
            let (train, validation) = split_train_val(episodes, cfg.train_fraction, rng)?;
            TaskSplit { train, validation, unused: 0 }
        }
    };

    tracing::info!(
        "Task '{}': {} train, {} validation, {} unused",
        task_name,
        split.train.len(),
        split.validation.len(),
        split.unused,
    );
    tracing::debug!("Train composition: {:?}", TaskSplit::composition(&split.train));

    Ok(split)
}

/// Randomly shuffle `samples` and split into (train, validation).
///
/// The split index is floor(len * train_fraction).
pub fn split_train_val<T, R: Rng + ?Sized>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    rng:            &mut R,
) -> Result<(Vec<T>, Vec<T>), SplitError> {
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(SplitError::InvalidFraction(train_fraction));
    }

    // Fisher-Yates shuffle — every permutation is equally likely
    samples.shuffle(rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).floor() as usize;
    let split_at = split_at.min(total);

    // split_off(n) removes elements [n..] from the Vec and returns them
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    Ok((samples, val))
}

/// Shuffle and take `k` training shots plus the next
/// FEW_SHOT_VAL_SIZE items for validation. Returns (train, val, unused).
pub fn split_few_shot<T, R: Rng + ?Sized>(
    mut samples: Vec<T>,
    k:           usize,
    rng:         &mut R,
) -> (Vec<T>, Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let train_end = k.min(samples.len());
    let val_end   = (train_end + FEW_SHOT_VAL_SIZE).min(samples.len());

    let unused = samples.split_off(val_end);
    let val    = samples.split_off(train_end);
    (samples, val, unused)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;
    use std::fs;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// 4 environments × 2 directions × `per` episodes each
    fn make_dataset(per: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for digit in ['1', '2', '3', '5'] {
            for dir_name in ["forward", "backward"] {
                for i in 0..per {
                    let name = format!("demo_{dir_name}_{i}{digit}.json");
                    fs::write(dir.path().join(name), "{}").unwrap();
                }
            }
        }
        dir
    }

    fn names(list: &[EpisodeRef]) -> HashSet<String> {
        list.iter()
            .map(|e| e.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val) = split_train_val(items, 0.8, &mut rng()).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(), 20);
    }

    #[test]
    fn test_split_floors_the_index() {
        let items: Vec<usize> = (0..9).collect();
        let (train, val) = split_train_val(items, 0.8, &mut rng()).unwrap();
        // 9 * 0.8 = 7.2 → 7
        assert_eq!(train.len(), 7);
        assert_eq!(val.len(), 2);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val) = split_train_val(items, 0.7, &mut rng()).unwrap();
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_fraction() {
        let err = split_train_val(vec![1, 2, 3], 1.5, &mut rng()).unwrap_err();
        assert!(matches!(err, SplitError::InvalidFraction(_)));
    }

    #[test]
    fn test_same_seed_same_split() {
        let items: Vec<usize> = (0..30).collect();
        let a = split_train_val(items.clone(), 0.8, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = split_train_val(items, 0.8, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_few_shot_sizes() {
        let (train, val, unused) = split_few_shot((0..40).collect::<Vec<_>>(), 5, &mut rng());
        assert_eq!((train.len(), val.len(), unused.len()), (5, 10, 25));

        // Fewer files than shots: everything goes to training
        let (train, val, unused) = split_few_shot((0..3).collect::<Vec<_>>(), 5, &mut rng());
        assert_eq!((train.len(), val.len(), unused.len()), (3, 0, 0));
    }

    #[test]
    fn test_sim_prefix_is_stripped() {
        let reg = TaskRegistry::builtin(false).unwrap();
        assert!(reg.lookup("sim_box_open").unwrap().is_some());
        assert!(reg.lookup("all").unwrap().is_none());
    }

    #[test]
    fn test_unknown_task() {
        let reg = TaskRegistry::builtin(false).unwrap();
        match reg.lookup("fly_away") {
            Err(SplitError::UnknownTask { name, known }) => {
                assert_eq!(name, "fly_away");
                assert!(known.contains("box_open"));
                assert!(known.contains("toilet_seat_up"));
                assert!(known.contains("toilet_seat,"));
            }
            other => panic!("expected UnknownTask, got {other:?}"),
        }
    }

    #[test]
    fn test_box_open_selects_forward_box_only() {
        let data  = make_dataset(5);
        let reg   = TaskRegistry::builtin(false).unwrap();
        let cfg   = SplitConfig::default();
        let split = split_task_files(data.path(), "box_open", &reg, &cfg, &mut rng()).unwrap();

        assert_eq!(split.train.len() + split.validation.len(), 5);
        assert_eq!(split.train.len(), 4);
        for ep in split.train.iter().chain(&split.validation) {
            assert_eq!(ep.meta.label(), "box/open");
        }
    }

    #[test]
    fn test_split_is_disjoint_and_covers_matches() {
        let data  = make_dataset(6);
        let reg   = TaskRegistry::builtin(false).unwrap();
        let cfg   = SplitConfig::default();
        let split = split_task_files(data.path(), "bo_bc_tc", &reg, &cfg, &mut rng()).unwrap();

        let train = names(&split.train);
        let val   = names(&split.validation);
        assert!(train.is_disjoint(&val));

        // Both box directions (12) plus toilet backward (6)
        let union: HashSet<_> = train.union(&val).cloned().collect();
        assert_eq!(union.len(), 18);
        assert!(union.iter().all(|n| n.ends_with("1.json") || n.starts_with("demo_backward")));
    }

    #[test]
    fn test_few_shot_composite_selects_held_out_skill() {
        let data = make_dataset(20);
        let reg  = TaskRegistry::builtin(true).unwrap();
        let cfg  = SplitConfig { train_fraction: 0.8, few_shot: Some(3) };
        let split = split_task_files(data.path(), "go_gc_to_tc_bo", &reg, &cfg, &mut rng()).unwrap();

        assert_eq!(split.train.len(), 3);
        assert_eq!(split.validation.len(), 10);
        assert_eq!(split.unused, 7);
        assert!(names(&split.train).is_disjoint(&names(&split.validation)));
        for ep in split.train.iter().chain(&split.validation) {
            assert_eq!(ep.meta.label(), "box/close");
        }
    }

    #[test]
    fn test_no_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("demo_forward_02.json"), "{}").unwrap();
        let reg = TaskRegistry::builtin(false).unwrap();
        let err = split_task_files(dir.path(), "grill", &reg, &SplitConfig::default(), &mut rng())
            .unwrap_err();
        assert!(matches!(err, SplitError::NoMatchingFiles { .. }));
    }
}
