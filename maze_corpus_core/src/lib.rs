use std::ops::Range;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod corpus;
pub mod describe;
pub mod generator;
pub mod serialize;
pub mod tensor;

pub use config::{ConfigError, MazeConfig, ValidatedConfig};
pub use corpus::{Corpus, CorpusBuilder, Dataset, MazePool, Sequence, Step, generate};
pub use generator::{GenerationError, MazeGenerator, MazeSegment};
pub use serialize::{DatasetArtifacts, ParseError};
pub use tensor::{Shape, Tensor3, TensorError};

/// A single on/off value in an input feature or output target vector.
pub type Bit = u8;

/// Width of the room type field at the start of every input vector.
pub const ROOM_TYPE_WIDTH: usize = 5;

/// Umbrella error for a full generate-and-write run.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The structural category of one step in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    ContextBegin,
    MazeEntry,
    MazeInterior,
    ContextEnd,
    Empty,
}

impl Default for RoomType {
    fn default() -> Self {
        RoomType::Empty
    }
}

impl RoomType {
    pub const ALL: [RoomType; 5] = [
        RoomType::ContextBegin,
        RoomType::MazeEntry,
        RoomType::MazeInterior,
        RoomType::ContextEnd,
        RoomType::Empty,
    ];

    /// Returns the fixed type field for this room. Empty rooms leave the field all zero.
    pub fn code(self) -> [Bit; ROOM_TYPE_WIDTH] {
        match self {
            RoomType::ContextBegin => [1, 0, 0, 0, 0],
            RoomType::MazeEntry => [0, 1, 0, 0, 0],
            RoomType::MazeInterior => [0, 0, 1, 0, 0],
            RoomType::ContextEnd => [0, 0, 0, 1, 0],
            RoomType::Empty => [0, 0, 0, 0, 0],
        }
    }

    /// Decodes a type field back into a room type.
    ///
    /// Returns `None` if the slice has the wrong width or matches no known code.
    pub fn from_code(code: &[Bit]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|room| room.code().as_slice() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            RoomType::ContextBegin => "context_begin_room",
            RoomType::MazeEntry => "maze_entry",
            RoomType::MazeInterior => "maze_interior",
            RoomType::ContextEnd => "context_end_room",
            RoomType::Empty => "empty_room",
        }
    }

    /// Maze rooms always demand a door choice, never a wait.
    #[inline]
    pub fn is_maze(self) -> bool {
        matches!(self, RoomType::MazeEntry | RoomType::MazeInterior)
    }
}

/// The output choice for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Door(usize),
    Wait,
}

/// Describes how input features and output targets are laid out for a given
/// number of doors and room marks.
///
/// Input vectors are `[room type][context doors][entry marks][interior marks][context end]`.
/// Output vectors are one-hot over `num_doors` doors plus a trailing wait slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureLayout {
    pub num_doors: usize,
    pub num_room_marks: usize,
}

impl FeatureLayout {
    pub fn new(num_doors: usize, num_room_marks: usize) -> Self {
        FeatureLayout {
            num_doors,
            num_room_marks,
        }
    }

    #[inline]
    pub fn input_width(&self) -> usize {
        ROOM_TYPE_WIDTH + 2 * self.num_doors + 2 * self.num_room_marks
    }

    #[inline]
    pub fn output_width(&self) -> usize {
        self.num_doors + 1
    }

    /// Index of the reserved wait slot in a target vector.
    #[inline]
    pub fn wait_index(&self) -> usize {
        self.num_doors
    }

    pub fn room_type(&self) -> Range<usize> {
        0..ROOM_TYPE_WIDTH
    }

    pub fn context_doors(&self) -> Range<usize> {
        let start = ROOM_TYPE_WIDTH;
        start..start + self.num_doors
    }

    pub fn entry_marks(&self) -> Range<usize> {
        let start = self.context_doors().end;
        start..start + self.num_room_marks
    }

    pub fn interior_marks(&self) -> Range<usize> {
        let start = self.entry_marks().end;
        start..start + self.num_room_marks
    }

    pub fn context_end(&self) -> Range<usize> {
        let start = self.interior_marks().end;
        start..start + self.num_doors
    }

    /// Returns an all-zero input vector with only the room type field filled in.
    pub fn room_features(&self, room: RoomType) -> Vec<Bit> {
        let mut features = vec![0; self.input_width()];
        features[self.room_type()].copy_from_slice(&room.code());
        features
    }

    /// Renders an action as a one-hot target vector.
    ///
    /// # Panics
    ///
    /// Panics if a door index is not below `num_doors`.
    pub fn target(&self, action: Action) -> Vec<Bit> {
        let index = match action {
            Action::Door(door) => {
                assert!(
                    door < self.num_doors,
                    "Door {} out of range for {} doors",
                    door,
                    self.num_doors
                );
                door
            }
            Action::Wait => self.wait_index(),
        };
        let mut target = vec![0; self.output_width()];
        target[index] = 1;
        target
    }

    /// Decodes a one-hot target vector. Returns `None` unless exactly one bit is set.
    pub fn action(&self, target: &[Bit]) -> Option<Action> {
        if target.len() != self.output_width() {
            return None;
        }
        let mut set = target.iter().enumerate().filter(|(_, bit)| **bit != 0);
        let (index, _) = set.next()?;
        if set.next().is_some() {
            return None;
        }
        if index == self.wait_index() {
            Some(Action::Wait)
        } else {
            Some(Action::Door(index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_segments_are_contiguous() {
        let layout = FeatureLayout::new(3, 5);
        assert_eq!(layout.room_type(), 0..5);
        assert_eq!(layout.context_doors(), 5..8);
        assert_eq!(layout.entry_marks(), 8..13);
        assert_eq!(layout.interior_marks(), 13..18);
        assert_eq!(layout.context_end(), 18..21);
        assert_eq!(layout.input_width(), 21);
        assert_eq!(layout.output_width(), 4);
    }

    #[test]
    fn room_codes_decode() {
        for room in RoomType::ALL {
            assert_eq!(RoomType::from_code(&room.code()), Some(room));
        }
        assert_eq!(RoomType::from_code(&[1, 1, 0, 0, 0]), None);
        assert_eq!(RoomType::from_code(&[0, 0, 0]), None);
        assert_eq!(RoomType::Empty.code(), [0; ROOM_TYPE_WIDTH]);
    }

    #[test]
    fn targets_are_one_hot() {
        let layout = FeatureLayout::new(3, 5);
        assert_eq!(layout.target(Action::Door(1)), vec![0, 1, 0, 0]);
        assert_eq!(layout.target(Action::Wait), vec![0, 0, 0, 1]);
        assert_eq!(layout.action(&[0, 0, 1, 0]), Some(Action::Door(2)));
        assert_eq!(layout.action(&[0, 0, 0, 1]), Some(Action::Wait));
        assert_eq!(layout.action(&[0, 1, 1, 0]), None);
        assert_eq!(layout.action(&[0, 0, 0, 0]), None);
    }

    #[test]
    #[should_panic]
    fn target_rejects_out_of_range_door() {
        FeatureLayout::new(3, 5).target(Action::Door(3));
    }
}
