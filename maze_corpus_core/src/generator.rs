use std::collections::HashSet;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{Bit, FeatureLayout, ValidatedConfig, corpus::Step};

/// Minimum number of redraws for a single maze before giving up.
///
/// The actual limit grows with the number of excluded mazes, see [`redraw_limit`].
pub const MAX_MAZE_REDRAWS: usize = 1 << 20;

/// Redraws allowed per excluded maze.
const REDRAWS_PER_EXCLUDED: usize = 64;

/// Redraw count after which a single maze is reported as slow to generate.
const SLOW_REDRAW_THRESHOLD: usize = 1 << 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error(
        "Unable to find a unique maze segment after {attempts} attempts ({accepted} segments already accepted)"
    )]
    UnableToFindUniqueSegment { attempts: usize, accepted: usize },
}

/// Number of redraws allowed while `excluded` mazes are taken.
///
/// With `f` free mazes out of `excluded + f`, one draw succeeds with probability
/// `f / (excluded + f)`, so a miss takes at most `excluded + 1` draws on average.
/// The limit is 64 times that.
pub fn redraw_limit(excluded: usize) -> usize {
    excluded
        .saturating_add(1)
        .saturating_mul(REDRAWS_PER_EXCLUDED)
        .max(MAX_MAZE_REDRAWS)
}

/// One generated maze: an entry room followed by its interior rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MazeSegment {
    steps: Vec<Step>,
}

impl MazeSegment {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The concatenated input features of every room, used as the uniqueness key.
    pub fn key(&self) -> Vec<Bit> {
        self.steps
            .iter()
            .flat_map(|step| step.features.iter().copied())
            .collect()
    }

    /// The concatenated targets of every room.
    pub fn targets(&self) -> Vec<Bit> {
        self.steps
            .iter()
            .flat_map(|step| step.target.iter().copied())
            .collect()
    }
}

/// Draws mark vectors, door choices and whole mazes from a single seeded stream.
///
/// Output depends on both the seed and the order of calls.
#[derive(Debug)]
pub struct MazeGenerator {
    rng: StdRng,
    layout: FeatureLayout,
    interior_length: usize,
}

impl MazeGenerator {
    pub fn new(config: &ValidatedConfig) -> Self {
        Self::from_seed(
            config.random_seed(),
            config.layout(),
            config.maze_interior_sequence_length(),
        )
    }

    pub fn from_seed(seed: i64, layout: FeatureLayout, interior_length: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed as u64),
            layout,
            interior_length,
        }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    /// Draws a mark vector of `num_room_marks` bits, redrawing until at least one is set.
    pub fn gen_marks(&mut self) -> Vec<Bit> {
        loop {
            let marks: Vec<Bit> = (0..self.layout.num_room_marks)
                .map(|_| self.rng.random_range(0..=1))
                .collect();
            if marks.contains(&1) {
                return marks;
            }
        }
    }

    /// Draws a door index in `[0, num_doors)`. Never the wait slot.
    pub fn gen_door(&mut self) -> usize {
        self.rng.random_range(0..self.layout.num_doors)
    }

    /// Draws one maze without checking it against anything.
    pub fn draw_maze(&mut self) -> MazeSegment {
        let mut steps = Vec::with_capacity(self.interior_length + 1);
        let marks = self.gen_marks();
        let door = self.gen_door();
        steps.push(Step::maze_entry(&self.layout, &marks, door));
        for _ in 0..self.interior_length {
            let marks = self.gen_marks();
            let door = self.gen_door();
            steps.push(Step::maze_interior(&self.layout, &marks, door));
        }
        MazeSegment { steps }
    }

    /// Draws whole mazes until one's input features are not in `exclude`.
    pub fn gen_unique_maze(
        &mut self,
        exclude: &HashSet<Vec<Bit>>,
    ) -> Result<MazeSegment, GenerationError> {
        let limit = redraw_limit(exclude.len());
        for attempt in 1..=limit {
            let maze = self.draw_maze();
            if !exclude.contains(&maze.key()) {
                if attempt > 1 {
                    debug!(attempt, "Maze accepted after redraws");
                }
                return Ok(maze);
            }
            if attempt == SLOW_REDRAW_THRESHOLD {
                warn!(
                    attempt,
                    accepted = exclude.len(),
                    "Maze generation is redrawing heavily; the mark space is nearly exhausted"
                );
            }
        }
        Err(GenerationError::UnableToFindUniqueSegment {
            attempts: limit,
            accepted: exclude.len(),
        })
    }
}
