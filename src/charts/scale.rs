//! Scales
//! Domain-to-range mappings built fresh for every render from the data
//! being drawn. Nothing here outlives a single chart.

/// Vertical headroom above the tallest value.
pub const HEADROOM: f64 = 1.1;

/// Continuous linear mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// `[0, max * headroom]`, falling back to `[0, 1]` when there is nothing
    /// positive to show.
    pub fn from_max(max: f64, headroom: f64) -> Self {
        let top = if max.is_finite() && max > 0.0 {
            max * headroom
        } else {
            1.0
        };
        Self::new((0.0, top), (0.0, 1.0))
    }

    /// Domain spanning the values; widened by one unit when it collapses to
    /// a single value.
    pub fn from_extent(values: impl IntoIterator<Item = f64>) -> Self {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let domain = if lo > hi {
            (0.0, 1.0)
        } else if lo == hi {
            (lo - 1.0, hi + 1.0)
        } else {
            (lo, hi)
        };
        Self::new(domain, (0.0, 1.0))
    }

    pub fn with_range(self, range: (f64, f64)) -> Self {
        Self { range, ..self }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }
}

/// Evenly divided categorical axis with inner padding.
#[derive(Debug, Clone, PartialEq)]
pub struct BandScale {
    labels: Vec<String>,
    range: (f64, f64),
    padding: f64,
}

impl BandScale {
    pub fn new(labels: Vec<String>, range: (f64, f64), padding: f64) -> Self {
        Self {
            labels,
            range,
            padding: padding.clamp(0.0, 0.9),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn step(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        (self.range.1 - self.range.0) / self.labels.len() as f64
    }

    /// Width of one band after padding.
    pub fn bandwidth(&self) -> f64 {
        self.step() * (1.0 - self.padding)
    }

    /// Start of the band at `index`.
    pub fn start(&self, index: usize) -> f64 {
        self.range.0 + self.step() * (index as f64 + self.padding / 2.0)
    }

    pub fn position(&self, label: &str) -> Option<f64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.start(i))
    }

    /// Band containing `value`, used to label axis ticks.
    pub fn label_at(&self, value: f64) -> Option<&str> {
        let step = self.step();
        if step <= 0.0 || value < self.range.0 {
            return None;
        }
        let index = ((value - self.range.0) / step).floor() as usize;
        self.labels.get(index).map(String::as_str)
    }
}

/// Axis tick text: `1.2M`, `3.4K`, or the plain number.
pub fn format_count(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if magnitude >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{}", value.round())
    }
}
