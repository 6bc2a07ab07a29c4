use serde::{Deserialize, Serialize};
use tracing::info;

use crate::FeatureLayout;

/// Reasons a requested configuration cannot produce a corpus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Number of room marks must be positive, got {0}")]
    NonPositiveRoomMarks(i64),
    #[error("Number of doors must be positive, got {0}")]
    NonPositiveDoors(i64),
    #[error("Number of doors ({num_doors}) cannot exceed number of room marks ({num_room_marks})")]
    MarksLessThanDoors { num_room_marks: i64, num_doors: i64 },
    #[error("{name} cannot be negative, got {value}")]
    NegativeValue { name: &'static str, value: i64 },
    #[error(
        "Insufficient number of room marks: {required_bits} needed to keep {mazes} mazes distinct, {available_bits} available"
    )]
    InsufficientMarkCapacity {
        required_bits: usize,
        available_bits: usize,
        mazes: usize,
    },
}

/// Requested generation parameters, as read from the command line or a config file.
///
/// Values are signed so that out-of-range requests are reported rather than
/// rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    pub num_room_marks: i64,
    pub num_doors: i64,
    pub maze_interior_sequence_length: i64,
    pub num_context_mazes: i64,
    pub num_independent_mazes: i64,
    pub random_seed: i64,
    pub verbose: bool,
}

impl Default for MazeConfig {
    fn default() -> Self {
        MazeConfig {
            num_room_marks: 5,
            num_doors: 3,
            maze_interior_sequence_length: 5,
            num_context_mazes: 5,
            num_independent_mazes: 5,
            random_seed: 4517,
            verbose: false,
        }
    }
}

/// A configuration that passed every feasibility check. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedConfig {
    num_room_marks: usize,
    num_doors: usize,
    maze_interior_sequence_length: usize,
    num_context_mazes: usize,
    num_independent_mazes: usize,
    random_seed: i64,
    verbose: bool,
}

impl MazeConfig {
    /// Checks that the requested sizes can produce a corpus.
    ///
    /// Checks run in a fixed order and the first failure is returned: room marks,
    /// doors, non-negative counts, mark capacity, then doors against marks.
    ///
    /// The capacity check guarantees enough distinct non-zero entry marks exist
    /// for every requested maze, so the uniqueness redraw loop always terminates.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        if self.num_room_marks <= 0 {
            return Err(ConfigError::NonPositiveRoomMarks(self.num_room_marks));
        }
        if self.num_doors <= 0 {
            return Err(ConfigError::NonPositiveDoors(self.num_doors));
        }
        let maze_interior_sequence_length = non_negative(
            "maze_interior_sequence_length",
            self.maze_interior_sequence_length,
        )?;
        let num_context_mazes = non_negative("num_context_mazes", self.num_context_mazes)?;
        let num_independent_mazes =
            non_negative("num_independent_mazes", self.num_independent_mazes)?;

        let num_room_marks = self.num_room_marks as usize;
        let mazes = num_context_mazes.saturating_add(num_independent_mazes);
        let required_bits = required_mark_bits(mazes.saturating_add(1));
        if required_bits > num_room_marks {
            return Err(ConfigError::InsufficientMarkCapacity {
                required_bits,
                available_bits: num_room_marks,
                mazes,
            });
        }
        if self.num_room_marks < self.num_doors {
            return Err(ConfigError::MarksLessThanDoors {
                num_room_marks: self.num_room_marks,
                num_doors: self.num_doors,
            });
        }

        Ok(ValidatedConfig {
            num_room_marks,
            num_doors: self.num_doors as usize,
            maze_interior_sequence_length,
            num_context_mazes,
            num_independent_mazes,
            random_seed: self.random_seed,
            verbose: self.verbose,
        })
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|_| ConfigError::NegativeValue { name, value })
}

/// Smallest bit count `i` with `2^i >= n`, counting from one bit.
fn required_mark_bits(n: usize) -> usize {
    let mut capacity: usize = 2;
    let mut bits = 1;
    while capacity < n {
        capacity = capacity.saturating_mul(2);
        bits += 1;
    }
    bits
}

impl ValidatedConfig {
    /// Width of each room mark vector.
    #[inline]
    pub fn num_room_marks(&self) -> usize {
        self.num_room_marks
    }

    /// Number of doors in every room. Targets carry one extra slot for wait.
    #[inline]
    pub fn num_doors(&self) -> usize {
        self.num_doors
    }

    /// Interior rooms following each maze entry.
    #[inline]
    pub fn maze_interior_sequence_length(&self) -> usize {
        self.maze_interior_sequence_length
    }

    #[inline]
    pub fn num_context_mazes(&self) -> usize {
        self.num_context_mazes
    }

    #[inline]
    pub fn num_independent_mazes(&self) -> usize {
        self.num_independent_mazes
    }

    /// Seed for the single random stream used by the whole run.
    #[inline]
    pub fn random_seed(&self) -> i64 {
        self.random_seed
    }

    #[inline]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Returns the feature layout shared by every step of the corpus.
    pub fn layout(&self) -> FeatureLayout {
        FeatureLayout::new(self.num_doors, self.num_room_marks)
    }

    /// Steps in every sequence: context begin, maze entry, interior rooms, context end.
    #[inline]
    pub fn sequence_steps(&self) -> usize {
        self.maze_interior_sequence_length + 3
    }

    /// Steps in a bare maze segment: entry plus interior rooms.
    #[inline]
    pub fn maze_steps(&self) -> usize {
        self.maze_interior_sequence_length + 1
    }

    /// Number of training sequences.
    ///
    /// One context sequence per door, one context maze per door and context maze,
    /// then one sequence per independent maze.
    pub fn train_count(&self) -> usize {
        self.num_doors + self.num_doors * self.num_context_mazes + self.num_independent_mazes
    }

    /// Number of test sequences: every independent maze under every door.
    pub fn test_count(&self) -> usize {
        self.num_doors * self.num_independent_mazes
    }

    /// Logs the resolved parameters.
    pub fn log_parameters(&self) {
        info!(
            num_room_marks = self.num_room_marks,
            num_doors = self.num_doors,
            maze_interior_sequence_length = self.maze_interior_sequence_length,
            num_context_mazes = self.num_context_mazes,
            num_independent_mazes = self.num_independent_mazes,
            random_seed = self.random_seed,
            "Parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = MazeConfig::default().validate().unwrap();
        assert_eq!(config.sequence_steps(), 8);
        assert_eq!(config.train_count(), 23);
        assert_eq!(config.test_count(), 15);
        assert_eq!(config.layout().input_width(), 21);
        assert_eq!(config.layout().output_width(), 4);
    }

    #[test]
    fn rejects_non_positive_sizes() {
        let config = MazeConfig {
            num_room_marks: 0,
            ..MazeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveRoomMarks(0)));

        let config = MazeConfig {
            num_doors: -1,
            ..MazeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveDoors(-1)));
    }

    #[test]
    fn rejects_more_doors_than_marks() {
        let config = MazeConfig {
            num_room_marks: 2,
            num_doors: 3,
            num_context_mazes: 1,
            num_independent_mazes: 1,
            ..MazeConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MarksLessThanDoors {
                num_room_marks: 2,
                num_doors: 3
            })
        );
    }

    #[test]
    fn rejects_negative_counts() {
        let config = MazeConfig {
            num_independent_mazes: -4,
            ..MazeConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NegativeValue {
                name: "num_independent_mazes",
                value: -4
            })
        );
    }

    #[test]
    fn rejects_insufficient_mark_capacity() {
        let config = MazeConfig {
            num_room_marks: 2,
            num_context_mazes: 10,
            num_independent_mazes: 10,
            ..MazeConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InsufficientMarkCapacity {
                required_bits: 5,
                available_bits: 2,
                mazes: 20
            })
        );
    }

    #[test]
    fn capacity_boundary() {
        // 3 mazes + 1 fits in 2 bits; 4 mazes + 1 does not.
        assert_eq!(required_mark_bits(4), 2);
        assert_eq!(required_mark_bits(5), 3);
        assert_eq!(required_mark_bits(1), 1);

        let fits = MazeConfig {
            num_room_marks: 2,
            num_doors: 2,
            num_context_mazes: 2,
            num_independent_mazes: 1,
            ..MazeConfig::default()
        };
        assert!(fits.validate().is_ok());
    }

    #[test]
    fn empty_pools_are_valid() {
        let config = MazeConfig {
            num_context_mazes: 0,
            num_independent_mazes: 0,
            ..MazeConfig::default()
        };
        let config = config.validate().unwrap();
        assert_eq!(config.train_count(), 3);
        assert_eq!(config.test_count(), 0);
    }
}
