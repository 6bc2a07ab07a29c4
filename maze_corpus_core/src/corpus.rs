use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Action, Bit, CorpusError, FeatureLayout, RoomType, ValidatedConfig,
    generator::{GenerationError, MazeGenerator, MazeSegment},
    tensor::{Tensor3, TensorError},
};

/// One room in a sequence: its type, input features and one-hot target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub room: RoomType,
    pub features: Vec<Bit>,
    pub target: Vec<Bit>,
}

impl Step {
    fn new(layout: &FeatureLayout, room: RoomType, action: Action) -> Self {
        Step {
            room,
            features: layout.room_features(room),
            target: layout.target(action),
        }
    }

    /// Marks `door` as the one to remember; the target is that same door.
    pub fn context_begin(layout: &FeatureLayout, door: usize) -> Self {
        let mut step = Step::new(layout, RoomType::ContextBegin, Action::Door(door));
        step.features[layout.context_doors().start + door] = 1;
        step
    }

    /// Turns the whole context end segment on ("choose now"); the target is the remembered door.
    pub fn context_end(layout: &FeatureLayout, door: usize) -> Self {
        let mut step = Step::new(layout, RoomType::ContextEnd, Action::Door(door));
        step.features[layout.context_end()].fill(1);
        step
    }

    pub fn maze_entry(layout: &FeatureLayout, marks: &[Bit], door: usize) -> Self {
        let mut step = Step::new(layout, RoomType::MazeEntry, Action::Door(door));
        step.features[layout.entry_marks()].copy_from_slice(marks);
        step
    }

    pub fn maze_interior(layout: &FeatureLayout, marks: &[Bit], door: usize) -> Self {
        let mut step = Step::new(layout, RoomType::MazeInterior, Action::Door(door));
        step.features[layout.interior_marks()].copy_from_slice(marks);
        step
    }

    /// Padding room: nothing on, target is wait.
    pub fn empty(layout: &FeatureLayout) -> Self {
        Step::new(layout, RoomType::Empty, Action::Wait)
    }
}

/// An ordered list of steps. All sequences in a corpus have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub steps: Vec<Step>,
}

impl Sequence {
    /// Context-only sequence: begin, end, then wait padding up to `sequence_steps`.
    pub fn context(layout: &FeatureLayout, door: usize, sequence_steps: usize) -> Self {
        let mut steps = vec![
            Step::context_begin(layout, door),
            Step::context_end(layout, door),
        ];
        steps.extend((2..sequence_steps).map(|_| Step::empty(layout)));
        Sequence { steps }
    }

    /// A maze wrapped between a context begin and end for `door`.
    pub fn context_maze(layout: &FeatureLayout, door: usize, maze: &MazeSegment) -> Self {
        let mut steps = Vec::with_capacity(maze.steps().len() + 2);
        steps.push(Step::context_begin(layout, door));
        steps.extend_from_slice(maze.steps());
        steps.push(Step::context_end(layout, door));
        Sequence { steps }
    }

    /// A bare maze followed by two wait rooms.
    pub fn independent_maze(layout: &FeatureLayout, maze: &MazeSegment) -> Self {
        let mut steps = maze.steps().to_vec();
        steps.push(Step::empty(layout));
        steps.push(Step::empty(layout));
        Sequence { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Input and output tensors for one split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    pub x: Tensor3<Bit>,
    pub y: Tensor3<Bit>,
}

impl Corpus {
    pub fn from_sequences(
        layout: &FeatureLayout,
        sequence_steps: usize,
        sequences: &[Sequence],
    ) -> Result<Self, TensorError> {
        let x = Tensor3::from_rows(
            sequence_steps,
            layout.input_width(),
            sequences
                .iter()
                .map(|seq| seq.steps.iter().map(|step| step.features.as_slice())),
        )?;
        let y = Tensor3::from_rows(
            sequence_steps,
            layout.output_width(),
            sequences
                .iter()
                .map(|seq| seq.steps.iter().map(|step| step.target.as_slice())),
        )?;
        Ok(Corpus { x, y })
    }

    pub fn count(&self) -> usize {
        self.x.shape().count
    }
}

/// Training and test corpora from one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub train: Corpus,
    pub test: Corpus,
}

/// Which pool a generated maze belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Context,
    Independent,
}

/// Accepted mazes, split by use, with a shared uniqueness index.
#[derive(Debug, Default)]
pub struct MazePool {
    context: Vec<MazeSegment>,
    independent: Vec<MazeSegment>,
    seen: HashSet<Vec<Bit>>,
}

impl MazePool {
    pub fn context(&self) -> &[MazeSegment] {
        &self.context
    }

    pub fn independent(&self) -> &[MazeSegment] {
        &self.independent
    }

    pub fn len(&self) -> usize {
        self.context.len() + self.independent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of every accepted maze across both pools.
    pub fn keys(&self) -> &HashSet<Vec<Bit>> {
        &self.seen
    }

    fn accept(&mut self, kind: PoolKind, maze: MazeSegment) {
        self.seen.insert(maze.key());
        match kind {
            PoolKind::Context => self.context.push(maze),
            PoolKind::Independent => self.independent.push(maze),
        }
        debug!(?kind, accepted = self.len(), "Maze added to pool");
    }
}

/// Owns everything one run mutates: the random stream and the maze pools.
#[derive(Debug)]
pub struct CorpusBuilder {
    config: ValidatedConfig,
    generator: MazeGenerator,
    pool: MazePool,
}

impl CorpusBuilder {
    pub fn new(config: ValidatedConfig) -> Self {
        let generator = MazeGenerator::new(&config);
        CorpusBuilder {
            config,
            generator,
            pool: MazePool::default(),
        }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Assembles the training and test corpora.
    pub fn build(self) -> Result<Dataset, CorpusError> {
        self.build_with_pool().map(|(dataset, _)| dataset)
    }

    /// Assembles both corpora and also returns the pools the mazes came from.
    ///
    /// Composition order is fixed, since it decides how the random stream is consumed:
    /// context sequences, context pool, context-maze sequences, independent pool,
    /// independent sequences, then the test cross product.
    pub fn build_with_pool(mut self) -> Result<(Dataset, MazePool), CorpusError> {
        let layout = self.config.layout();
        let steps = self.config.sequence_steps();
        let num_doors = self.config.num_doors();

        let mut train = Vec::with_capacity(self.config.train_count());
        train.extend((0..num_doors).map(|door| Sequence::context(&layout, door, steps)));

        self.fill_pool(PoolKind::Context, self.config.num_context_mazes())?;
        for door in 0..num_doors {
            for maze in self.pool.context() {
                train.push(Sequence::context_maze(&layout, door, maze));
            }
        }

        self.fill_pool(PoolKind::Independent, self.config.num_independent_mazes())?;
        train.extend(
            self.pool
                .independent()
                .iter()
                .map(|maze| Sequence::independent_maze(&layout, maze)),
        );

        let mut test = Vec::with_capacity(self.config.test_count());
        for door in 0..num_doors {
            for maze in self.pool.independent() {
                test.push(Sequence::context_maze(&layout, door, maze));
            }
        }

        let train = Corpus::from_sequences(&layout, steps, &train)?;
        let test = Corpus::from_sequences(&layout, steps, &test)?;
        info!(
            x_shape = %train.x.shape(),
            y_shape = %train.y.shape(),
            "Training data"
        );
        info!(
            x_shape = %test.x.shape(),
            y_shape = %test.y.shape(),
            "Testing data"
        );
        Ok((Dataset { train, test }, self.pool))
    }

    fn fill_pool(&mut self, kind: PoolKind, count: usize) -> Result<(), GenerationError> {
        for _ in 0..count {
            let maze = self.generator.gen_unique_maze(self.pool.keys())?;
            self.pool.accept(kind, maze);
        }
        Ok(())
    }
}

/// Generates both corpora for a validated configuration.
pub fn generate(config: &ValidatedConfig) -> Result<Dataset, CorpusError> {
    CorpusBuilder::new(config.clone()).build()
}
