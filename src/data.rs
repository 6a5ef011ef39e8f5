//! Training sets consumed by the trainers

use std::{error::Error, fmt};

/// A set of `(input, ideal)` pairs.
///
/// Sets are read-only while training, so several worker threads can read one set through
/// shared references without contention.
pub trait TrainingSet: Send + Sync {
    /// Length of every input.
    fn input_size(&self) -> usize;

    /// Length of every ideal output.
    fn ideal_size(&self) -> usize;

    /// Number of pairs.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns pair number `index` as `(input, ideal)`.
    fn pair(&self, index: usize) -> (&[f64], &[f64]);

    /// Whether pairs can be read in any order, from any thread.
    ///
    /// Non-indexable sets are only read front to back by a single reader.
    fn is_indexable(&self) -> bool {
        true
    }
}

/// In-memory training set.
///
/// All inputs are joined into one buffer, and so are all ideal outputs:
/// `inputs = [input_1][input_2] ... [input_N]`.
#[derive(Debug, Clone)]
pub struct BasicTrainingSet {
    input_size: usize,
    ideal_size: usize,
    inputs: Box<[f64]>,
    ideals: Box<[f64]>,
}

impl BasicTrainingSet {
    /// Builds a set from joined inputs and joined ideal outputs.
    ///
    /// # Returns
    /// * `Ok(BasicTrainingSet)` if both buffers hold the same number of whole samples;
    /// * `Err(DataError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use flatprop::data::{BasicTrainingSet, TrainingSet};
    /// let set = BasicTrainingSet::new(2, 1, vec![0.0, 0.0, 1.0, 1.0], vec![0.0, 1.0]).unwrap();
    /// assert_eq!(set.len(), 2);
    /// assert_eq!(set.pair(1), (&[1.0, 1.0][..], &[1.0][..]));
    /// ```
    pub fn new(
        input_size: usize,
        ideal_size: usize,
        inputs: Vec<f64>,
        ideals: Vec<f64>,
    ) -> Result<Self, DataError> {
        if input_size == 0 || ideal_size == 0 {
            return Err(DataError::ZeroWidth);
        }
        if inputs.len() % input_size != 0 {
            return Err(DataError::RaggedInputs(inputs.len(), input_size));
        }
        if ideals.len() % ideal_size != 0 {
            return Err(DataError::RaggedIdeals(ideals.len(), ideal_size));
        }
        let samples = inputs.len() / input_size;
        if ideals.len() / ideal_size != samples {
            return Err(DataError::SampleCountMismatch(samples, ideals.len() / ideal_size));
        }

        Ok(Self {
            input_size,
            ideal_size,
            inputs: inputs.into_boxed_slice(),
            ideals: ideals.into_boxed_slice(),
        })
    }

    /// Flattens a list of samples into a set.
    ///
    /// # Returns
    /// * `Ok(BasicTrainingSet)` if every sample has `input_size` inputs and `ideal_size` ideals;
    /// * `Err(DataError)` naming the first offending sample otherwise.
    pub fn from_pairs(
        samples: Vec<(Vec<f64>, Vec<f64>)>,
        input_size: usize,
        ideal_size: usize,
    ) -> Result<Self, DataError> {
        let samples_count = samples.len();

        let mut inputs = Vec::with_capacity(samples_count * input_size);
        let mut ideals = Vec::with_capacity(samples_count * ideal_size);

        for (i, (input, ideal)) in samples.into_iter().enumerate() {
            if input.len() != input_size {
                return Err(DataError::WrongSampleInputsCount((i, input_size, input.len())));
            }
            inputs.extend(input);

            if ideal.len() != ideal_size {
                return Err(DataError::WrongSampleIdealsCount((i, ideal_size, ideal.len())));
            }
            ideals.extend(ideal);
        }

        Self::new(input_size, ideal_size, inputs, ideals)
    }
}

impl TrainingSet for BasicTrainingSet {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn ideal_size(&self) -> usize {
        self.ideal_size
    }

    fn len(&self) -> usize {
        self.inputs.len() / self.input_size
    }

    fn pair(&self, index: usize) -> (&[f64], &[f64]) {
        (
            &self.inputs[index * self.input_size..(index + 1) * self.input_size],
            &self.ideals[index * self.ideal_size..(index + 1) * self.ideal_size],
        )
    }
}

/// Wraps a set whose source can only be consumed front to back, e.g. a single stream cursor.
///
/// Single-threaded trainers accept it; the multi-threaded trainer refuses it at construction.
#[derive(Debug, Clone)]
pub struct SequentialTrainingSet<S>(pub S);

impl<S: TrainingSet> TrainingSet for SequentialTrainingSet<S> {
    fn input_size(&self) -> usize {
        self.0.input_size()
    }

    fn ideal_size(&self) -> usize {
        self.0.ideal_size()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn pair(&self, index: usize) -> (&[f64], &[f64]) {
        self.0.pair(index)
    }

    fn is_indexable(&self) -> bool {
        false
    }
}

/// Error structure for training set construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    ZeroWidth,
    RaggedInputs(usize, usize),
    RaggedIdeals(usize, usize),
    SampleCountMismatch(usize, usize),
    WrongSampleInputsCount((usize, usize, usize)),
    WrongSampleIdealsCount((usize, usize, usize)),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            DataError::ZeroWidth => write!(f, "Inputs and ideals must have at least one value!"),
            DataError::RaggedInputs(len, width) => write!(
                f,
                "{} input values can't be split into samples of {}!",
                len, width
            ),
            DataError::RaggedIdeals(len, width) => write!(
                f,
                "{} ideal values can't be split into samples of {}!",
                len, width
            ),
            DataError::SampleCountMismatch(inputs, ideals) => write!(
                f,
                "Got {} input samples, but {} ideal samples!",
                inputs, ideals
            ),
            DataError::WrongSampleInputsCount((i, expected, got)) => write!(
                f,
                "Expected {} input(s), but samples[{}] got {}!",
                expected, i, got
            ),
            DataError::WrongSampleIdealsCount((i, expected, got)) => write!(
                f,
                "Expected {} ideal output(s), but samples[{}] got {}!",
                expected, i, got
            ),
        }
    }
}

impl Error for DataError {}
