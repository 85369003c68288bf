use serde::{Deserialize, Serialize};

/// An index selection into a dataset's extent.
///
/// A single-variant selection addresses axis 0 of a one-dimensional
/// dataset; [`Selection::Multi`] carries one selection per dimension for
/// n-dimensional targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// The whole extent along the dimension.
    All,
    /// A single index.
    Index(u64),
    /// A half-open range `[start, end)`.
    Slice { start: u64, end: u64 },
    /// An explicit list of indices.
    Points(Vec<u64>),
    /// A boolean mask; `true` positions are selected.
    Mask(Vec<bool>),
    /// One selection per dimension.
    Multi(Vec<Selection>),
}

impl Selection {
    /// Convenience constructor for `[start, end)`.
    pub fn slice(start: u64, end: u64) -> Self {
        Selection::Slice { start, end }
    }

    /// The minimum per-dimension extents a dataset must have to contain
    /// this selection.
    ///
    /// An index yields `index + 1`; a range yields its upper bound; a
    /// points or mask list yields one past its highest selected position; a
    /// composite selection recurses per dimension. `All` and an empty list
    /// impose no bound (`None`).
    pub fn upper_bounds(&self) -> Vec<Option<u64>> {
        match self {
            Selection::Multi(dims) => dims.iter().map(Selection::upper_bound).collect(),
            single => vec![single.upper_bound()],
        }
    }

    fn upper_bound(&self) -> Option<u64> {
        match self {
            Selection::All => None,
            Selection::Index(i) => Some(i + 1),
            Selection::Slice { end, .. } => Some(*end),
            Selection::Points(points) => points.iter().max().map(|m| m + 1),
            Selection::Mask(mask) => mask
                .iter()
                .rposition(|&selected| selected)
                .map(|p| p as u64 + 1),
            // Nested composites are not addressable along a single axis.
            Selection::Multi(_) => None,
        }
    }

    /// Expand this single-dimension selection into explicit indices along a
    /// dimension of the given extent, in selection order.
    pub fn expand(&self, extent: u64) -> Vec<u64> {
        match self {
            Selection::All => (0..extent).collect(),
            Selection::Index(i) => vec![*i],
            Selection::Slice { start, end } => (*start..*end).collect(),
            Selection::Points(points) => points.clone(),
            Selection::Mask(mask) => mask
                .iter()
                .enumerate()
                .filter_map(|(i, &selected)| selected.then_some(i as u64))
                .collect(),
            Selection::Multi(_) => Vec::new(),
        }
    }

    /// Per-dimension views of this selection for a target of `ndim`
    /// dimensions. A non-composite selection addresses axis 0 and selects
    /// everything along the remaining axes.
    pub fn per_dim(&self, ndim: usize) -> Vec<Selection> {
        let mut dims = match self {
            Selection::Multi(dims) => dims.clone(),
            single => vec![single.clone()],
        };
        while dims.len() < ndim {
            dims.push(Selection::All);
        }
        dims
    }
}
