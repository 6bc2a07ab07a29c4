use std::fmt;

use crate::{Action, Bit, FeatureLayout, RoomType, corpus::Corpus, tensor::Tensor3};

/// Human-readable dump of a corpus, one line per step.
///
/// Works from the tensors alone, so it can describe a decoded artifact as well
/// as a freshly generated corpus.
pub struct CorpusReport<'a> {
    title: &'a str,
    corpus: &'a Corpus,
    layout: FeatureLayout,
}

impl<'a> CorpusReport<'a> {
    pub fn new(title: &'a str, corpus: &'a Corpus, layout: FeatureLayout) -> Self {
        CorpusReport {
            title,
            corpus,
            layout,
        }
    }
}

struct Bits<'a>(&'a [Bit]);

impl fmt::Display for Bits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, bit) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", bit)?;
        }
        write!(f, "]")
    }
}

fn shape_line(f: &mut fmt::Formatter<'_>, name: &str, tensor: &Tensor3<Bit>) -> fmt::Result {
    let shape = tensor.shape();
    writeln!(
        f,
        "{} = [ {} , {} , {} ]",
        name, shape.count, shape.steps, shape.width
    )
}

impl fmt::Display for CorpusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = &self.layout;
        writeln!(f, "{}:", self.title)?;
        shape_line(f, "X_shape", &self.corpus.x)?;
        shape_line(f, "y_shape", &self.corpus.y)?;
        for seq in 0..self.corpus.count() {
            writeln!(f, "maze = {}", seq)?;
            for (input, output) in self.corpus.x.sequence(seq).zip(self.corpus.y.sequence(seq)) {
                let room = RoomType::from_code(&input[layout.room_type()]);
                let name = room.map_or("unknown", RoomType::name);
                write!(
                    f,
                    "input: {{ room = {} ({:<18}) marks = {} {} {} {} }}",
                    Bits(&input[layout.room_type()]),
                    name,
                    Bits(&input[layout.context_doors()]),
                    Bits(&input[layout.entry_marks()]),
                    Bits(&input[layout.interior_marks()]),
                    Bits(&input[layout.context_end()]),
                )?;
                write!(f, " output = {}", Bits(output))?;
                match layout.action(output) {
                    Some(Action::Door(door)) => writeln!(f, " (door {})", door)?,
                    Some(Action::Wait) => writeln!(f, " (wait)")?,
                    None => writeln!(f, " (invalid)")?,
                }
            }
        }
        Ok(())
    }
}
