//! Aggregation of per-window feature matrices into per-item summaries.
//!
//! Templates are configured once and never mutated by aggregation: binding a
//! template yields a [`Binding`] that names its columns and output, and every
//! call to [`AggregatorTemplate::aggregate`] returns a fresh value.

use serde::{Deserialize, Serialize};

use crate::descriptor::{AggregatorDefinition, FeatureDescriptor};
use crate::error::CoreError;
use crate::matrix::FeatureMatrix;

/// Upper bound on the output width of a histogram.
pub const MAX_HISTOGRAM_CELLS: usize = 1 << 16;
const DEFAULT_BINS: usize = 10;

/// Index of a template inside its container.
pub type TemplateId = usize;

/// Aggregated value for one binding; `None` when there was nothing to summarise.
pub type Aggregate = Option<Vec<f64>>;

/// Per-feature statistic, applied dimension by dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Statistic {
    Mean,
    StandardDeviation,
    Maximum,
    Minimum,
}

/// Statistic computed jointly over several features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum JointStatistic {
    /// Two-dimensional image moments over (dimension, window).
    AreaMoments,
    /// Joint histogram with `bins` bins per collapsed dimension.
    MultipleFeatureHistogram { bins: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericAggregator {
    definition: AggregatorDefinition,
    statistic: Statistic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecificAggregator {
    definition: AggregatorDefinition,
    statistic: JointStatistic,
    features: Vec<String>,
}

/// An aggregation strategy, generic (once per feature) or specific (jointly
/// over a named feature list).
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorTemplate {
    Generic(GenericAggregator),
    Specific(SpecificAggregator),
}

/// A feature column made available to aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnabledFeature {
    pub column: usize,
    pub descriptor: FeatureDescriptor,
}

/// A template applied to concrete matrix columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub template: TemplateId,
    pub columns: Vec<usize>,
    pub descriptor: FeatureDescriptor,
}

impl Statistic {
    fn label(self) -> &'static str {
        match self {
            Self::Mean => "Average",
            Self::StandardDeviation => "Standard Deviation",
            Self::Maximum => "Maximum",
            Self::Minimum => "Minimum",
        }
    }

    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Self::Mean => mean(values),
            Self::StandardDeviation => sample_variance(values).sqrt(),
            Self::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

impl AggregatorTemplate {
    /// Every built-in template, in default configuration.
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        vec![
            Self::generic(Statistic::Mean),
            Self::generic(Statistic::StandardDeviation),
            Self::generic(Statistic::Maximum),
            Self::generic(Statistic::Minimum),
            Self::specific(JointStatistic::AreaMoments),
            Self::specific(JointStatistic::MultipleFeatureHistogram { bins: DEFAULT_BINS }),
        ]
    }

    /// Looks a built-in template up by its definition name.
    ///
    /// # Errors
    /// Returns an error if no template has that name.
    ///
    /// # Example
    /// ```
    /// use mf_core::aggregator::AggregatorTemplate;
    /// let t = AggregatorTemplate::by_name("Standard Deviation").unwrap();
    /// assert!(t.definition().is_generic);
    /// assert!(AggregatorTemplate::by_name("Median").is_err());
    /// ```
    pub fn by_name(name: &str) -> Result<Self, CoreError> {
        Self::catalog()
            .into_iter()
            .find(|t| t.definition().name == name)
            .ok_or_else(|| CoreError::config(format!("unknown aggregator '{name}'")))
    }

    #[must_use]
    pub fn generic(statistic: Statistic) -> Self {
        let (name, description) = match statistic {
            Statistic::Mean => ("Mean", "Mean of each dimension across all windows."),
            Statistic::StandardDeviation => (
                "Standard Deviation",
                "Sample standard deviation of each dimension across all windows.",
            ),
            Statistic::Maximum => ("Maximum", "Largest value of each dimension across all windows."),
            Statistic::Minimum => ("Minimum", "Smallest value of each dimension across all windows."),
        };
        Self::Generic(GenericAggregator {
            definition: AggregatorDefinition::new(name, description, true, &[]),
            statistic,
        })
    }

    #[must_use]
    pub fn specific(statistic: JointStatistic) -> Self {
        let definition = match statistic {
            JointStatistic::AreaMoments => AggregatorDefinition::new(
                "Area Moments",
                "Treats the selected features as an image (dimension by window) and \
                 computes its mass, centroid and second and third central moments.",
                false,
                &[],
            ),
            JointStatistic::MultipleFeatureHistogram { .. } => AggregatorDefinition::new(
                "Multiple Feature Histogram",
                "Joint histogram of the selected features, normalised by window count.",
                false,
                &["Number of bins per dimension"],
            ),
        };
        Self::Specific(SpecificAggregator {
            definition,
            statistic,
            features: Vec::new(),
        })
    }

    #[must_use]
    pub fn definition(&self) -> &AggregatorDefinition {
        match self {
            Self::Generic(g) => &g.definition,
            Self::Specific(s) => &s.definition,
        }
    }

    /// Configures the template from strings.
    ///
    /// Generic templates take neither features nor parameters. Specific ones
    /// need at least one feature name; the histogram takes an optional bin
    /// count.
    ///
    /// # Errors
    /// Returns [`CoreError::Configuration`] describing the offending input.
    pub fn set_parameters(&mut self, feature_names: &[String], params: &[String]) -> Result<(), CoreError> {
        let name = self.definition().name.clone();
        match self {
            Self::Generic(_) => {
                if !feature_names.is_empty() {
                    return Err(CoreError::config(format!(
                        "'{name}' applies to every enabled feature and takes no feature list"
                    )));
                }
                if !params.is_empty() {
                    return Err(CoreError::config(format!("'{name}' takes no parameters")));
                }
            }
            Self::Specific(s) => {
                if feature_names.is_empty() {
                    return Err(CoreError::config(format!("'{name}' needs at least one feature")));
                }
                if let Some(dup) = feature_names
                    .iter()
                    .enumerate()
                    .find_map(|(i, f)| feature_names[..i].contains(f).then_some(f))
                {
                    return Err(CoreError::config(format!("'{name}' lists '{dup}' twice")));
                }
                s.statistic = match s.statistic {
                    JointStatistic::AreaMoments => {
                        if !params.is_empty() {
                            return Err(CoreError::config(format!("'{name}' takes no parameters")));
                        }
                        JointStatistic::AreaMoments
                    }
                    JointStatistic::MultipleFeatureHistogram { bins } => match params {
                        [] => JointStatistic::MultipleFeatureHistogram { bins },
                        [raw] => JointStatistic::MultipleFeatureHistogram {
                            bins: parse_bins(&name, raw)?,
                        },
                        _ => {
                            return Err(CoreError::config(format!(
                                "'{name}' takes one parameter, got {}",
                                params.len()
                            )));
                        }
                    },
                };
                s.features = feature_names.to_vec();
            }
        }
        Ok(())
    }

    /// Binds the template to the enabled features.
    ///
    /// A generic template yields one binding per feature. A specific template
    /// yields a single binding over its named features.
    ///
    /// # Errors
    /// Returns [`CoreError::Configuration`] if a specific template has no
    /// features or names one that is not enabled.
    pub fn bind(&self, id: TemplateId, features: &[EnabledFeature]) -> Result<Vec<Binding>, CoreError> {
        match self {
            Self::Generic(g) => Ok(features
                .iter()
                .map(|f| Binding {
                    template: id,
                    columns: vec![f.column],
                    descriptor: FeatureDescriptor::new(
                        format!("{} Overall {}", f.descriptor.name, g.statistic.label()),
                        format!(
                            "{} {}",
                            g.definition.description, f.descriptor.description
                        )
                        .trim_end(),
                        false,
                        f.descriptor.dimensions,
                    ),
                })
                .collect()),
            Self::Specific(s) => {
                if s.features.is_empty() {
                    return Err(CoreError::config(format!(
                        "'{}' has no features configured",
                        s.definition.name
                    )));
                }
                let mut columns = Vec::with_capacity(s.features.len());
                let mut widths = Vec::with_capacity(s.features.len());
                for name in &s.features {
                    let f = features
                        .iter()
                        .find(|f| &f.descriptor.name == name)
                        .ok_or_else(|| {
                            CoreError::config(format!(
                                "'{}' needs feature '{name}', which is not enabled",
                                s.definition.name
                            ))
                        })?;
                    columns.push(f.column);
                    widths.push(f.descriptor.dimensions);
                }
                let dimensions = match s.statistic {
                    JointStatistic::AreaMoments => 10,
                    JointStatistic::MultipleFeatureHistogram { bins } => {
                        if widths.contains(&0) {
                            0
                        } else {
                            histogram_cells(bins, widths.iter().sum()).unwrap_or(0)
                        }
                    }
                };
                Ok(vec![Binding {
                    template: id,
                    columns,
                    descriptor: FeatureDescriptor::new(
                        format!("{} {}", s.definition.name, s.features.join(" ")),
                        s.definition.description.clone(),
                        false,
                        dimensions,
                    ),
                }])
            }
        }
    }

    /// Summarises `columns` of `matrix`.
    ///
    /// Windows before the burn-in offset of the columns are ignored, and
    /// dimensions follow the widths of the last window.
    ///
    /// # Errors
    /// Returns [`CoreError::Configuration`] if a column is out of range or the
    /// histogram would exceed [`MAX_HISTOGRAM_CELLS`].
    pub fn aggregate(&self, matrix: &FeatureMatrix, columns: &[usize]) -> Result<Aggregate, CoreError> {
        if let Some(&bad) = columns.iter().find(|&&c| c >= matrix.feature_count()) {
            return Err(CoreError::config(format!(
                "'{}' bound to column {bad} but the matrix has {} features",
                self.definition().name,
                matrix.feature_count()
            )));
        }
        match self {
            Self::Generic(g) => Ok(columns
                .first()
                .and_then(|&c| generic_summary(g.statistic, matrix, c))),
            Self::Specific(s) => match s.statistic {
                JointStatistic::AreaMoments => Ok(Some(area_moments(matrix, columns).to_vec())),
                JointStatistic::MultipleFeatureHistogram { bins } => {
                    histogram(&s.definition.name, matrix, columns, bins)
                }
            },
        }
    }
}

fn parse_bins(name: &str, raw: &str) -> Result<usize, CoreError> {
    let bins: usize = raw.trim().parse().map_err(|_| {
        CoreError::config(format!("'{name}': bin count '{raw}' is not a positive integer"))
    })?;
    if bins == 0 {
        return Err(CoreError::config(format!("'{name}': bin count must be at least 1")));
    }
    Ok(bins)
}

fn histogram_cells(bins: usize, dimensions: usize) -> Option<usize> {
    let exp = u32::try_from(dimensions).ok()?;
    bins.checked_pow(exp).filter(|&n| n <= MAX_HISTOGRAM_CELLS)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Sample variance (n - 1); 0 for fewer than two values.
#[must_use]
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1.0)
}

fn generic_summary(statistic: Statistic, matrix: &FeatureMatrix, column: usize) -> Aggregate {
    let start = matrix.first_present(column)?;
    // Width of the latest window carrying a value.
    let width = (start..matrix.window_count())
        .rev()
        .find_map(|w| matrix.get(w, column))
        .map_or(0, <[f64]>::len);
    if width == 0 {
        return None;
    }
    let mut out = Vec::with_capacity(width);
    let mut values = Vec::with_capacity(matrix.window_count() - start);
    for d in 0..width {
        values.clear();
        values.extend((start..matrix.window_count()).filter_map(|w| matrix.value(w, column, d)));
        out.push(if values.is_empty() {
            0.0
        } else {
            statistic.apply(&values)
        });
    }
    Some(out)
}

/// Mass, centroid and central moments of the (dimension, window) image.
///
/// x is the collapsed dimension index, y the window index. Absent cells past
/// the burn-in offset weigh 0.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::many_single_char_names)]
pub fn area_moments(matrix: &FeatureMatrix, columns: &[usize]) -> [f64; 10] {
    let offset = matrix.burn_in(columns);
    let cells = matrix.collapse(columns);
    let cell = |w: usize, (f, d): (usize, usize)| matrix.value(w, f, d).unwrap_or(0.0);

    let mut mass = 0.0;
    for w in offset..matrix.window_count() {
        for &c in &cells {
            mass += cell(w, c);
        }
    }
    if mass == 0.0 {
        return [0.0; 10];
    }

    let (mut x, mut y) = (0.0, 0.0);
    let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
    let (mut xxx, mut xxy, mut xyy, mut yyy) = (0.0, 0.0, 0.0, 0.0);
    for w in offset..matrix.window_count() {
        let i = w as f64;
        for (j, &c) in cells.iter().enumerate() {
            let j = j as f64;
            let t = cell(w, c) / mass;
            x += t * j;
            y += t * i;
            xx += t * j * j;
            xy += t * j * i;
            yy += t * i * i;
            xxx += t * j * j * j;
            xxy += t * j * j * i;
            xyy += t * j * i * i;
            yyy += t * i * i * i;
        }
    }

    [
        mass,
        x,
        y,
        xx - x * x,
        xy - x * y,
        yy - y * y,
        xxx - 3.0 * x * xx + 2.0 * x * x * x,
        xxy - 2.0 * x * xy - y * xx + 2.0 * x * x * y,
        xyy - 2.0 * y * xy - x * yy + 2.0 * x * y * y,
        yyy - 3.0 * y * yy + 2.0 * y * y * y,
    ]
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn histogram(name: &str, matrix: &FeatureMatrix, columns: &[usize], bins: usize) -> Result<Aggregate, CoreError> {
    let offset = matrix.burn_in(columns);
    let cells = matrix.collapse(columns);
    if cells.is_empty() || offset >= matrix.window_count() {
        return Ok(None);
    }
    let size = histogram_cells(bins, cells.len()).ok_or_else(|| {
        CoreError::config(format!(
            "'{name}': {bins} bins over {} dimensions exceeds {MAX_HISTOGRAM_CELLS} cells",
            cells.len()
        ))
    })?;

    let windows = offset..matrix.window_count();
    let bounds: Vec<(f64, f64)> = cells
        .iter()
        .map(|&(f, d)| {
            windows
                .clone()
                .filter_map(|w| matrix.value(w, f, d))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
        })
        .collect();

    let mut counts = vec![0.0; size];
    for w in windows.clone() {
        let mut index = 0;
        let mut stride = 1;
        for (&(f, d), &(lo, hi)) in cells.iter().zip(&bounds) {
            let v = matrix.value(w, f, d).unwrap_or(lo);
            let bin = if hi > lo {
                (((v - lo) / (hi - lo)) * bins as f64).floor() as usize
            } else {
                0
            };
            index += bin.min(bins - 1) * stride;
            stride *= bins;
        }
        counts[index] += 1.0;
    }

    let total = windows.len() as f64;
    Ok(Some(counts.into_iter().map(|c| c / total).collect()))
}
